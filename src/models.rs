use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Read-status codes stored in `user_books.readStatus`.
///
/// The integer codes are fixed by the schema: 0 means no status has been set
/// for this user (or the book is not in their library at all), 1 the user has
/// read the book, 2 the user owns it but has not read it, 3 the user wants to
/// read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    Unset,
    Read,
    Unread,
    WantToRead,
}

impl ReadStatus {
    pub fn code(self) -> i64 {
        match self {
            ReadStatus::Unset => 0,
            ReadStatus::Read => 1,
            ReadStatus::Unread => 2,
            ReadStatus::WantToRead => 3,
        }
    }

    /// Unknown stored codes collapse to `Unset` instead of failing the row.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ReadStatus::Read,
            2 => ReadStatus::Unread,
            3 => ReadStatus::WantToRead,
            _ => ReadStatus::Unset,
        }
    }

    /// Statuses the unread view counts as "not yet started".
    pub fn is_unstarted(self) -> bool {
        matches!(self, ReadStatus::Unset | ReadStatus::Unread)
    }

    pub fn label(self) -> &'static str {
        match self {
            ReadStatus::Unset => "Not in Library",
            ReadStatus::Read => "Read",
            ReadStatus::Unread => "Not Read",
            ReadStatus::WantToRead => "Want to Read",
        }
    }
}

/// Account types stored in `userinfo.userType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Member,
    Librarian,
}

impl UserRole {
    pub fn code(self) -> i64 {
        match self {
            UserRole::Member => 1,
            UserRole::Librarian => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(UserRole::Member),
            2 => Some(UserRole::Librarian),
            _ => None,
        }
    }
}

/// Identity of the logged-in user. Produced by `login` and passed explicitly
/// to every user-scoped operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub role: UserRole,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Author {
    pub author_id: i64,
    pub name: String,
    pub surname: String,
    pub website: Option<String>,
}

/// A catalog row annotated with the acting user's personal data. The catalog
/// fields are shared across users; status, rating, comments and release date
/// come from the `user_books` join and default to unset when no association
/// row exists.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Book {
    pub book_id: i64,
    pub author_id: i64,
    pub title: String,
    pub author_name: String,
    pub year: i64,
    pub number_of_pages: i64,
    pub cover: Option<String>,
    pub about: Option<String>,
    pub read_status: ReadStatus,
    pub rating: u8,
    pub comments: Option<String>,
    pub release_date: Option<NaiveDate>,
}

impl Book {
    pub fn rating_stars(&self) -> String {
        if self.rating == 0 {
            return "Not Rated".to_string();
        }
        (0..5u8)
            .map(|slot| if slot < self.rating { '★' } else { '☆' })
            .collect()
    }

    /// One-line summary used by list views.
    pub fn display_line(&self) -> String {
        format!(
            "{} by {} ({}) - {} - {}",
            self.title,
            self.author_name,
            self.year,
            self.read_status.label(),
            self.rating_stars()
        )
    }
}
