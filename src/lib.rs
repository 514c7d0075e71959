use chrono::{Duration, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::mpsc;

pub mod config;
pub mod covers;
pub mod db;
pub mod models;

use config::Config;
use covers::CoverArt;
use models::{Author, Book, ReadStatus, Session, UserRole};

/// Process-wide application state handed to every command. Holds the
/// configuration only; each command opens and drops its own connection.
pub struct AppState {
  config: Config,
}

impl AppState {
  pub fn new(config: Config) -> Self {
    AppState { config }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  fn open_db(&self) -> Result<Connection, String> {
    db::open_db(&self.config).map_err(|err| err.to_string())
  }
}

/// Everything needed to put a book on the acting user's shelf. The author is
/// referenced by name and created on first use; the catalog row is reused
/// when (title, author, year) already exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBook {
  pub title: String,
  pub author_name: String,
  pub author_surname: String,
  pub author_website: Option<String>,
  pub year: i64,
  pub number_of_pages: i64,
  pub cover: Option<String>,
  pub about: Option<String>,
  pub read_status: ReadStatus,
  pub rating: u8,
  pub comments: Option<String>,
  pub release_date: Option<NaiveDate>,
}

/// Edit form payload: shared catalog fields plus the acting user's personal
/// fields, applied in one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookUpdate {
  pub title: String,
  pub year: i64,
  pub number_of_pages: i64,
  pub about: Option<String>,
  pub read_status: ReadStatus,
  pub rating: u8,
  pub comments: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
  value.map(str::trim).filter(|trimmed| !trimmed.is_empty())
}

fn validate_rating(rating: u8) -> Result<(), String> {
  if rating > 5 {
    return Err(format!("rating must be between 0 and 5, got {}", rating));
  }
  Ok(())
}

fn book_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
  let release_date: Option<String> = row.get(11)?;
  Ok(Book {
    book_id: row.get(0)?,
    author_id: row.get(1)?,
    title: row.get(2)?,
    year: row.get(3)?,
    number_of_pages: row.get(4)?,
    cover: row.get(5)?,
    about: row.get(6)?,
    author_name: row.get(7)?,
    read_status: ReadStatus::from_code(row.get(8)?),
    rating: row.get::<_, i64>(9)?.clamp(0, 5) as u8,
    comments: row.get(10)?,
    release_date: release_date
      .and_then(|value| NaiveDate::parse_from_str(&value, "%Y-%m-%d").ok()),
  })
}

fn author_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Author> {
  Ok(Author {
    author_id: row.get(0)?,
    name: row.get(1)?,
    surname: row.get(2)?,
    website: row.get(3)?,
  })
}

fn collect_books(
  conn: &Connection,
  sql: &str,
  query_params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Book>, String> {
  let mut stmt = conn.prepare(sql).map_err(|err| err.to_string())?;
  let rows = stmt
    .query_map(query_params, book_from_row)
    .map_err(|err| err.to_string())?;

  let mut books = Vec::new();
  for row in rows {
    books.push(row.map_err(|err| err.to_string())?);
  }
  Ok(books)
}

fn collect_authors(
  conn: &Connection,
  sql: &str,
  query_params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Author>, String> {
  let mut stmt = conn.prepare(sql).map_err(|err| err.to_string())?;
  let rows = stmt
    .query_map(query_params, author_from_row)
    .map_err(|err| err.to_string())?;

  let mut authors = Vec::new();
  for row in rows {
    authors.push(row.map_err(|err| err.to_string())?);
  }
  Ok(authors)
}

/// Exact-match credential check. Returns the session for the matched account
/// or `None` when no row matches. This is placeholder auth, not a security
/// boundary.
pub fn login(state: &AppState, username: &str, password: &str) -> Result<Option<Session>, String> {
  let conn = state.open_db()?;
  let row = conn
    .query_row(
      "SELECT userId, userType FROM userinfo WHERE username = ?1 AND password = ?2",
      params![username, password],
      |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
    )
    .optional()
    .map_err(|err| err.to_string())?;

  match row {
    Some((user_id, type_code)) => match UserRole::from_code(type_code) {
      Some(role) => {
        log::info!("user {} logged in", user_id);
        Ok(Some(Session { user_id, role }))
      }
      None => Err(format!("unknown user type {} for user {}", type_code, user_id)),
    },
    None => Ok(None),
  }
}

pub fn create_user(
  state: &AppState,
  username: &str,
  password: &str,
  role: UserRole,
) -> Result<i64, String> {
  if username.trim().is_empty() || password.is_empty() {
    return Err("username and password must not be empty".to_string());
  }
  let conn = state.open_db()?;
  conn
    .execute(
      "INSERT INTO userinfo (username, password, userType) VALUES (?1, ?2, ?3)",
      params![username.trim(), password, role.code()],
    )
    .map_err(|err| err.to_string())?;
  Ok(conn.last_insert_rowid())
}

/// Every catalog row annotated with the acting user's status and rating,
/// defaulting to unset where no association exists. Ordered by title.
pub fn list_books(state: &AppState, session: &Session) -> Result<Vec<Book>, String> {
  let conn = state.open_db()?;
  collect_books(
    &conn,
    "SELECT b.bookId, b.authorId, b.title, b.year, b.numberOfPages, b.cover, b.about, \
       a.name || ' ' || a.surname AS authorName, \
       COALESCE(ub.readStatus, 0) AS readStatus, \
       COALESCE(ub.rating, 0) AS rating, \
       ub.comments, ub.releaseDate \
     FROM books b \
     JOIN authors a ON b.authorId = a.authorId \
     LEFT JOIN user_books ub ON b.bookId = ub.bookId AND ub.userId = ?1 \
     ORDER BY b.title",
    params![session.user_id],
  )
}

pub fn get_book(state: &AppState, session: &Session, book_id: i64) -> Result<Option<Book>, String> {
  let conn = state.open_db()?;
  conn
    .query_row(
      "SELECT b.bookId, b.authorId, b.title, b.year, b.numberOfPages, b.cover, b.about, \
         a.name || ' ' || a.surname AS authorName, \
         COALESCE(ub.readStatus, 0) AS readStatus, \
         COALESCE(ub.rating, 0) AS rating, \
         ub.comments, ub.releaseDate \
       FROM books b \
       JOIN authors a ON b.authorId = a.authorId \
       LEFT JOIN user_books ub ON b.bookId = ub.bookId AND ub.userId = ?1 \
       WHERE b.bookId = ?2",
      params![session.user_id, book_id],
      book_from_row,
    )
    .optional()
    .map_err(|err| err.to_string())
}

/// Books the acting user rated 4 or higher.
pub fn favorite_books(state: &AppState, session: &Session) -> Result<Vec<Book>, String> {
  let conn = state.open_db()?;
  collect_books(
    &conn,
    "SELECT b.bookId, b.authorId, b.title, b.year, b.numberOfPages, b.cover, b.about, \
       a.name || ' ' || a.surname AS authorName, \
       ub.readStatus, ub.rating, ub.comments, ub.releaseDate \
     FROM books b \
     JOIN authors a ON b.authorId = a.authorId \
     JOIN user_books ub ON b.bookId = ub.bookId \
     WHERE ub.userId = ?1 AND ub.rating >= 4 \
     ORDER BY ub.rating DESC, b.title",
    params![session.user_id],
  )
}

/// Catalog rows whose status for the acting user is still in the
/// not-yet-started set (unset or explicitly not read).
pub fn unread_books(state: &AppState, session: &Session) -> Result<Vec<Book>, String> {
  let conn = state.open_db()?;
  collect_books(
    &conn,
    "SELECT b.bookId, b.authorId, b.title, b.year, b.numberOfPages, b.cover, b.about, \
       a.name || ' ' || a.surname AS authorName, \
       COALESCE(ub.readStatus, 0) AS readStatus, \
       COALESCE(ub.rating, 0) AS rating, \
       ub.comments, ub.releaseDate \
     FROM books b \
     JOIN authors a ON b.authorId = a.authorId \
     LEFT JOIN user_books ub ON b.bookId = ub.bookId AND ub.userId = ?1 \
     WHERE COALESCE(ub.readStatus, 0) IN (0, 2) \
     ORDER BY b.title",
    params![session.user_id],
  )
}

/// Want-to-read entries whose release date is today or later, soonest first.
pub fn upcoming_releases(state: &AppState, session: &Session) -> Result<Vec<Book>, String> {
  let conn = state.open_db()?;
  let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
  collect_books(
    &conn,
    "SELECT b.bookId, b.authorId, b.title, b.year, b.numberOfPages, b.cover, b.about, \
       a.name || ' ' || a.surname AS authorName, \
       ub.readStatus, ub.rating, ub.comments, ub.releaseDate \
     FROM books b \
     JOIN authors a ON b.authorId = a.authorId \
     JOIN user_books ub ON b.bookId = ub.bookId \
     WHERE ub.userId = ?1 AND ub.releaseDate >= ?2 AND ub.readStatus = 3 \
     ORDER BY ub.releaseDate",
    params![session.user_id, today],
  )
}

pub fn list_authors(state: &AppState) -> Result<Vec<Author>, String> {
  let conn = state.open_db()?;
  collect_authors(
    &conn,
    "SELECT authorId, name, surname, website FROM authors ORDER BY surname, name",
    params![],
  )
}

pub fn search_authors(state: &AppState, term: &str) -> Result<Vec<Author>, String> {
  let conn = state.open_db()?;
  let pattern = format!("%{}%", term);
  collect_authors(
    &conn,
    "SELECT authorId, name, surname, website FROM authors \
     WHERE name LIKE ?1 OR surname LIKE ?1 \
     ORDER BY surname, name",
    params![pattern],
  )
}

/// Authors with at least one book the acting user rated 4 or higher.
pub fn favorite_authors(state: &AppState, session: &Session) -> Result<Vec<Author>, String> {
  let conn = state.open_db()?;
  collect_authors(
    &conn,
    "SELECT DISTINCT a.authorId, a.name, a.surname, a.website \
     FROM authors a \
     JOIN books b ON a.authorId = b.authorId \
     JOIN user_books ub ON b.bookId = ub.bookId \
     WHERE ub.userId = ?1 AND ub.rating >= 4 \
     ORDER BY a.surname, a.name",
    params![session.user_id],
  )
}

pub fn add_author(
  state: &AppState,
  name: &str,
  surname: &str,
  website: Option<&str>,
) -> Result<i64, String> {
  if name.trim().is_empty() || surname.trim().is_empty() {
    return Err("author name and surname must not be blank".to_string());
  }
  let conn = state.open_db()?;
  conn
    .execute(
      "INSERT INTO authors (name, surname, website) VALUES (?1, ?2, ?3)",
      params![name.trim(), surname.trim(), non_empty(website)],
    )
    .map_err(|err| err.to_string())?;
  Ok(conn.last_insert_rowid())
}

fn author_id_or_insert(
  conn: &Connection,
  name: &str,
  surname: &str,
  website: Option<&str>,
) -> rusqlite::Result<i64> {
  let existing: Option<i64> = conn
    .query_row(
      "SELECT authorId FROM authors WHERE name = ?1 AND surname = ?2",
      params![name, surname],
      |row| row.get(0),
    )
    .optional()?;
  if let Some(author_id) = existing {
    return Ok(author_id);
  }

  conn.execute(
    "INSERT INTO authors (name, surname, website) VALUES (?1, ?2, ?3)",
    params![name, surname, non_empty(website)],
  )?;
  let author_id = conn.last_insert_rowid();
  log::info!("created author {} {} with id {}", name, surname, author_id);
  Ok(author_id)
}

/// Exact (name, surname) lookup, inserting on miss. Calling twice with the
/// same pair returns the same identifier.
pub fn find_or_create_author(
  state: &AppState,
  name: &str,
  surname: &str,
  website: Option<&str>,
) -> Result<i64, String> {
  let name = name.trim();
  let surname = surname.trim();
  if name.is_empty() || surname.is_empty() {
    return Err("author name and surname must not be blank".to_string());
  }
  let conn = state.open_db()?;
  author_id_or_insert(&conn, name, surname, website).map_err(|err| err.to_string())
}

fn effective_release_date(status: ReadStatus, given: Option<NaiveDate>) -> Option<NaiveDate> {
  match given {
    Some(date) => Some(date),
    // A want-to-read entry gets a tracking date one week out when the form
    // left it blank.
    None if status == ReadStatus::WantToRead => Some(Utc::now().date_naive() + Duration::weeks(1)),
    None => None,
  }
}

/// Put a book on the acting user's shelf. Runs as one transaction: the author
/// is found or created, the catalog row is reused on a (title, author, year)
/// match or inserted, and the user's association row is upserted. Either all
/// of it lands or none of it does.
pub fn add_book(state: &AppState, session: &Session, book: &NewBook) -> Result<i64, String> {
  validate_rating(book.rating)?;
  if book.title.trim().is_empty() {
    return Err("title must not be blank".to_string());
  }
  if book.author_name.trim().is_empty() || book.author_surname.trim().is_empty() {
    return Err("author name and surname must not be blank".to_string());
  }

  let mut conn = state.open_db()?;
  let tx = conn.transaction().map_err(|err| err.to_string())?;

  let author_id = author_id_or_insert(
    &tx,
    book.author_name.trim(),
    book.author_surname.trim(),
    book.author_website.as_deref(),
  )
  .map_err(|err| err.to_string())?;

  let existing: Option<i64> = tx
    .query_row(
      "SELECT bookId FROM books WHERE title = ?1 AND authorId = ?2 AND year = ?3",
      params![book.title, author_id, book.year],
      |row| row.get(0),
    )
    .optional()
    .map_err(|err| err.to_string())?;

  let book_id = match existing {
    Some(book_id) => {
      log::info!("book already in catalog: {}", book.title);
      book_id
    }
    None => {
      tx.execute(
        "INSERT INTO books (authorId, title, year, numberOfPages, cover, about) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
          author_id,
          book.title,
          book.year,
          book.number_of_pages,
          non_empty(book.cover.as_deref()),
          non_empty(book.about.as_deref()),
        ],
      )
      .map_err(|err| err.to_string())?;
      tx.last_insert_rowid()
    }
  };

  let release_date = effective_release_date(book.read_status, book.release_date)
    .map(|date| date.format("%Y-%m-%d").to_string());
  tx.execute(
    "INSERT INTO user_books (userId, bookId, readStatus, rating, comments, releaseDate) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
     ON CONFLICT(userId, bookId) DO UPDATE SET \
       readStatus = excluded.readStatus, \
       rating = excluded.rating, \
       comments = excluded.comments, \
       releaseDate = excluded.releaseDate",
    params![
      session.user_id,
      book_id,
      book.read_status.code(),
      book.rating as i64,
      non_empty(book.comments.as_deref()),
      release_date,
    ],
  )
  .map_err(|err| err.to_string())?;

  tx.commit().map_err(|err| err.to_string())?;
  log::info!("added {} to user {}'s library", book.title, session.user_id);
  Ok(book_id)
}

/// Update the shared catalog fields and the acting user's association fields
/// in the same transaction.
pub fn update_book(
  state: &AppState,
  session: &Session,
  book_id: i64,
  update: &BookUpdate,
) -> Result<(), String> {
  validate_rating(update.rating)?;
  if update.title.trim().is_empty() {
    return Err("title must not be blank".to_string());
  }

  let mut conn = state.open_db()?;
  let tx = conn.transaction().map_err(|err| err.to_string())?;

  tx.execute(
    "UPDATE books SET title = ?1, year = ?2, numberOfPages = ?3, about = ?4 WHERE bookId = ?5",
    params![
      update.title,
      update.year,
      update.number_of_pages,
      non_empty(update.about.as_deref()),
      book_id,
    ],
  )
  .map_err(|err| err.to_string())?;

  tx.execute(
    "INSERT INTO user_books (userId, bookId, readStatus, rating, comments) \
     VALUES (?1, ?2, ?3, ?4, ?5) \
     ON CONFLICT(userId, bookId) DO UPDATE SET \
       readStatus = excluded.readStatus, \
       rating = excluded.rating, \
       comments = excluded.comments",
    params![
      session.user_id,
      book_id,
      update.read_status.code(),
      update.rating as i64,
      non_empty(update.comments.as_deref()),
    ],
  )
  .map_err(|err| err.to_string())?;

  tx.commit().map_err(|err| err.to_string())
}

/// Remove a book from the acting user's library only. The catalog row and
/// other users' associations stay.
pub fn remove_book(state: &AppState, session: &Session, book_id: i64) -> Result<bool, String> {
  let conn = state.open_db()?;
  let deleted = conn
    .execute(
      "DELETE FROM user_books WHERE bookId = ?1 AND userId = ?2",
      params![book_id, session.user_id],
    )
    .map_err(|err| err.to_string())?;
  if deleted > 0 {
    log::info!("removed book {} from user {}'s library", book_id, session.user_id);
  }
  Ok(deleted > 0)
}

pub fn set_read_status(
  state: &AppState,
  session: &Session,
  book_id: i64,
  status: ReadStatus,
) -> Result<(), String> {
  let conn = state.open_db()?;
  conn
    .execute(
      "INSERT INTO user_books (userId, bookId, readStatus) VALUES (?1, ?2, ?3) \
       ON CONFLICT(userId, bookId) DO UPDATE SET readStatus = excluded.readStatus",
      params![session.user_id, book_id, status.code()],
    )
    .map_err(|err| err.to_string())?;
  Ok(())
}

pub fn set_rating(
  state: &AppState,
  session: &Session,
  book_id: i64,
  rating: u8,
) -> Result<(), String> {
  validate_rating(rating)?;
  let conn = state.open_db()?;
  conn
    .execute(
      "INSERT INTO user_books (userId, bookId, rating) VALUES (?1, ?2, ?3) \
       ON CONFLICT(userId, bookId) DO UPDATE SET rating = excluded.rating",
      params![session.user_id, book_id, rating as i64],
    )
    .map_err(|err| err.to_string())?;
  Ok(())
}

/// Change the catalog cover path. Affects every user.
pub fn set_book_cover(state: &AppState, book_id: i64, cover_path: &str) -> Result<bool, String> {
  let conn = state.open_db()?;
  let updated = conn
    .execute(
      "UPDATE books SET cover = ?1 WHERE bookId = ?2",
      params![non_empty(Some(cover_path)), book_id],
    )
    .map_err(|err| err.to_string())?;
  Ok(updated > 0)
}

/// Resolve and load the displayable cover for a book. A missing book, a
/// missing file and an undecodable file all come back as a placeholder.
pub fn load_book_cover(
  state: &AppState,
  session: &Session,
  book_id: i64,
) -> Result<CoverArt, String> {
  match get_book(state, session, book_id)? {
    Some(book) => Ok(covers::load_cover(
      book.book_id,
      book.cover.as_deref(),
      state.config(),
    )),
    None => Ok(CoverArt::Placeholder(format!(
      "Book with ID {} not found",
      book_id
    ))),
  }
}

/// Run a command off the caller's thread so the UI stays responsive; the
/// result arrives on the returned channel when the work completes. Started
/// work always runs to completion, there is no cancellation.
pub fn spawn_task<T, F>(task: F) -> mpsc::Receiver<T>
where
  F: FnOnce() -> T + Send + 'static,
  T: Send + 'static,
{
  let (sender, receiver) = mpsc::channel();
  std::thread::spawn(move || {
    let _ = sender.send(task());
  });
  receiver
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration as StdDuration;

  fn temp_state() -> AppState {
    let dir = std::env::temp_dir().join(format!("mylibrary-lib-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    AppState::new(Config {
      db_path: dir.join("library.db"),
      ..Config::default()
    })
  }

  fn login_as(state: &AppState, username: &str) -> Session {
    create_user(state, username, "secret", UserRole::Member).unwrap();
    login(state, username, "secret")
      .unwrap()
      .expect("seeded user should log in")
  }

  fn draft(title: &str) -> NewBook {
    NewBook {
      title: title.to_string(),
      author_name: "Frank".to_string(),
      author_surname: "Herbert".to_string(),
      author_website: None,
      year: 1965,
      number_of_pages: 412,
      cover: None,
      about: None,
      read_status: ReadStatus::Read,
      rating: 0,
      comments: None,
      release_date: None,
    }
  }

  fn count(state: &AppState, sql: &str) -> i64 {
    let conn = state.open_db().unwrap();
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
  }

  #[test]
  fn login_checks_exact_credentials() {
    let state = temp_state();
    create_user(&state, "ada", "pw", UserRole::Member).unwrap();

    let session = login(&state, "ada", "pw").unwrap().unwrap();
    assert_eq!(session.role, UserRole::Member);
    assert!(session.user_id > 0);

    assert!(login(&state, "ada", "wrong").unwrap().is_none());
    assert!(login(&state, "nobody", "pw").unwrap().is_none());
  }

  #[test]
  fn login_returns_the_stored_role() {
    let state = temp_state();
    create_user(&state, "root", "pw", UserRole::Librarian).unwrap();
    let session = login(&state, "root", "pw").unwrap().unwrap();
    assert_eq!(session.role, UserRole::Librarian);
  }

  #[test]
  fn find_or_create_author_is_idempotent() {
    let state = temp_state();
    let first = find_or_create_author(&state, "Ursula", "Le Guin", Some("")).unwrap();
    let second = find_or_create_author(&state, "Ursula", "Le Guin", None).unwrap();
    assert_eq!(first, second);
    assert_eq!(count(&state, "SELECT COUNT(*) FROM authors"), 1);

    // Blank website is stored as NULL, not as an empty string.
    let authors = list_authors(&state).unwrap();
    assert_eq!(authors[0].website, None);
  }

  #[test]
  fn blank_author_names_are_rejected() {
    let state = temp_state();
    assert!(find_or_create_author(&state, "  ", "Le Guin", None).is_err());
    assert!(add_author(&state, "Ursula", "", None).is_err());
  }

  #[test]
  fn add_book_twice_reuses_catalog_row_and_updates_association() {
    let state = temp_state();
    let session = login_as(&state, "ada");

    let mut book = draft("Dune");
    book.rating = 2;
    let first_id = add_book(&state, &session, &book).unwrap();

    book.rating = 5;
    let second_id = add_book(&state, &session, &book).unwrap();

    assert_eq!(first_id, second_id);
    assert_eq!(count(&state, "SELECT COUNT(*) FROM books"), 1);
    assert_eq!(count(&state, "SELECT COUNT(*) FROM user_books"), 1);

    let stored = get_book(&state, &session, first_id).unwrap().unwrap();
    assert_eq!(stored.rating, 5);
  }

  #[test]
  fn add_book_rejects_out_of_range_rating() {
    let state = temp_state();
    let session = login_as(&state, "ada");

    let mut book = draft("Dune");
    book.rating = 6;
    assert!(add_book(&state, &session, &book).is_err());
    assert_eq!(count(&state, "SELECT COUNT(*) FROM books"), 0);
    assert_eq!(count(&state, "SELECT COUNT(*) FROM user_books"), 0);
  }

  #[test]
  fn remove_book_only_touches_the_acting_users_association() {
    let state = temp_state();
    let ada = login_as(&state, "ada");
    let ben = login_as(&state, "ben");

    let book_id = add_book(&state, &ada, &draft("Dune")).unwrap();
    let mut bens_copy = draft("Dune");
    bens_copy.read_status = ReadStatus::Unread;
    assert_eq!(add_book(&state, &ben, &bens_copy).unwrap(), book_id);
    assert_eq!(count(&state, "SELECT COUNT(*) FROM user_books"), 2);

    assert!(remove_book(&state, &ada, book_id).unwrap());
    assert_eq!(count(&state, "SELECT COUNT(*) FROM books"), 1);
    assert_eq!(count(&state, "SELECT COUNT(*) FROM user_books"), 1);

    let bens_view = get_book(&state, &ben, book_id).unwrap().unwrap();
    assert_eq!(bens_view.read_status, ReadStatus::Unread);

    // Second removal finds nothing to delete.
    assert!(!remove_book(&state, &ada, book_id).unwrap());
  }

  #[test]
  fn favorites_require_a_rating_of_four_or_more() {
    let state = temp_state();
    let session = login_as(&state, "ada");

    let mut liked = draft("Dune");
    liked.rating = 3;
    let book_id = add_book(&state, &session, &liked).unwrap();
    assert!(favorite_books(&state, &session).unwrap().is_empty());
    assert!(favorite_authors(&state, &session).unwrap().is_empty());

    set_rating(&state, &session, book_id, 5).unwrap();
    let favorites = favorite_books(&state, &session).unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].rating, 5);

    let authors = favorite_authors(&state, &session).unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].surname, "Herbert");
  }

  #[test]
  fn unread_covers_unset_and_explicitly_not_read() {
    let state = temp_state();
    let ada = login_as(&state, "ada");
    let ben = login_as(&state, "ben");

    let mut not_read = draft("Emma");
    not_read.read_status = ReadStatus::Unread;
    add_book(&state, &ada, &not_read).unwrap();

    let mut finished = draft("Dune");
    finished.read_status = ReadStatus::Read;
    add_book(&state, &ada, &finished).unwrap();

    // A catalog row Ada never touched counts as unset for her.
    add_book(&state, &ben, &draft("Zorba")).unwrap();

    let titles: Vec<String> = unread_books(&state, &ada)
      .unwrap()
      .into_iter()
      .map(|book| book.title)
      .collect();
    assert_eq!(titles, vec!["Emma".to_string(), "Zorba".to_string()]);
  }

  #[test]
  fn upcoming_requires_want_to_read_and_a_future_date() {
    let state = temp_state();
    let session = login_as(&state, "ada");

    let mut wanted = draft("Dune Messiah");
    wanted.read_status = ReadStatus::WantToRead;
    add_book(&state, &session, &wanted).unwrap();

    let mut stale = draft("Children of Dune");
    stale.read_status = ReadStatus::WantToRead;
    stale.release_date = Some(Utc::now().date_naive() - Duration::days(30));
    add_book(&state, &session, &stale).unwrap();

    let mut finished = draft("Dune");
    finished.read_status = ReadStatus::Read;
    finished.release_date = Some(Utc::now().date_naive() + Duration::days(30));
    add_book(&state, &session, &finished).unwrap();

    let upcoming = upcoming_releases(&state, &session).unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].title, "Dune Messiah");
  }

  #[test]
  fn want_to_read_defaults_release_date_one_week_out() {
    let state = temp_state();
    let session = login_as(&state, "ada");

    let mut wanted = draft("Dune Messiah");
    wanted.read_status = ReadStatus::WantToRead;
    let book_id = add_book(&state, &session, &wanted).unwrap();

    let stored = get_book(&state, &session, book_id).unwrap().unwrap();
    assert_eq!(
      stored.release_date,
      Some(Utc::now().date_naive() + Duration::weeks(1))
    );

    // Other statuses get no implicit date.
    let plain_id = add_book(&state, &session, &draft("Dune")).unwrap();
    let plain = get_book(&state, &session, plain_id).unwrap().unwrap();
    assert_eq!(plain.release_date, None);
  }

  #[test]
  fn update_book_changes_catalog_and_association_together() {
    let state = temp_state();
    let session = login_as(&state, "ada");
    let book_id = add_book(&state, &session, &draft("Dune")).unwrap();

    let update = BookUpdate {
      title: "Dune (revised)".to_string(),
      year: 1966,
      number_of_pages: 500,
      about: Some("Spice".to_string()),
      read_status: ReadStatus::Read,
      rating: 4,
      comments: Some("great".to_string()),
    };
    update_book(&state, &session, book_id, &update).unwrap();

    let stored = get_book(&state, &session, book_id).unwrap().unwrap();
    assert_eq!(stored.title, "Dune (revised)");
    assert_eq!(stored.year, 1966);
    assert_eq!(stored.number_of_pages, 500);
    assert_eq!(stored.about.as_deref(), Some("Spice"));
    assert_eq!(stored.rating, 4);
    assert_eq!(stored.comments.as_deref(), Some("great"));
  }

  #[test]
  fn update_of_a_missing_book_leaves_no_orphan_association() {
    let state = temp_state();
    let session = login_as(&state, "ada");

    let update = BookUpdate {
      title: "Ghost".to_string(),
      year: 2000,
      number_of_pages: 1,
      about: None,
      read_status: ReadStatus::Read,
      rating: 0,
      comments: None,
    };
    // The association upsert hits the foreign key on books and the whole
    // transaction rolls back.
    assert!(update_book(&state, &session, 999, &update).is_err());
    assert_eq!(count(&state, "SELECT COUNT(*) FROM user_books"), 0);
  }

  #[test]
  fn status_and_rating_upserts_create_the_association_row() {
    let state = temp_state();
    let ada = login_as(&state, "ada");
    let ben = login_as(&state, "ben");

    let book_id = add_book(&state, &ada, &draft("Dune")).unwrap();

    // Ben has no association row yet; setting a status creates one.
    set_read_status(&state, &ben, book_id, ReadStatus::WantToRead).unwrap();
    let bens_view = get_book(&state, &ben, book_id).unwrap().unwrap();
    assert_eq!(bens_view.read_status, ReadStatus::WantToRead);

    set_rating(&state, &ben, book_id, 4).unwrap();
    assert!(set_rating(&state, &ben, book_id, 9).is_err());
    let bens_view = get_book(&state, &ben, book_id).unwrap().unwrap();
    assert_eq!(bens_view.rating, 4);
  }

  #[test]
  fn list_books_is_ordered_by_title_and_annotated_per_user() {
    let state = temp_state();
    let ada = login_as(&state, "ada");
    let ben = login_as(&state, "ben");

    let mut zen = draft("Zen");
    zen.rating = 5;
    add_book(&state, &ada, &zen).unwrap();
    add_book(&state, &ada, &draft("Abba")).unwrap();

    let books = list_books(&state, &ada).unwrap();
    let titles: Vec<&str> = books.iter().map(|book| book.title.as_str()).collect();
    assert_eq!(titles, vec!["Abba", "Zen"]);
    assert_eq!(books[1].rating, 5);

    // Ben sees the shared catalog but none of Ada's personal data.
    let bens_books = list_books(&state, &ben).unwrap();
    assert_eq!(bens_books.len(), 2);
    assert_eq!(bens_books[1].rating, 0);
    assert_eq!(bens_books[1].read_status, ReadStatus::Unset);
  }

  #[test]
  fn get_book_returns_none_for_unknown_id() {
    let state = temp_state();
    let session = login_as(&state, "ada");
    assert!(get_book(&state, &session, 12345).unwrap().is_none());
  }

  #[test]
  fn set_book_cover_updates_the_shared_catalog_row() {
    let state = temp_state();
    let session = login_as(&state, "ada");
    let book_id = add_book(&state, &session, &draft("Dune")).unwrap();

    assert!(set_book_cover(&state, book_id, "covers/dune.jpg").unwrap());
    let stored = get_book(&state, &session, book_id).unwrap().unwrap();
    assert_eq!(stored.cover.as_deref(), Some("covers/dune.jpg"));

    assert!(!set_book_cover(&state, 999, "x.jpg").unwrap());
  }

  #[test]
  fn load_book_cover_degrades_to_placeholder() {
    let state = temp_state();
    let session = login_as(&state, "ada");

    match load_book_cover(&state, &session, 77).unwrap() {
      CoverArt::Placeholder(message) => assert!(message.contains("77")),
      CoverArt::Image(_) => panic!("expected placeholder for missing book"),
    }

    let book_id = add_book(&state, &session, &draft("Dune")).unwrap();
    match load_book_cover(&state, &session, book_id).unwrap() {
      CoverArt::Placeholder(message) => {
        assert!(message.contains(&covers::default_cover_name(book_id)))
      }
      CoverArt::Image(_) => panic!("expected placeholder for missing file"),
    }
  }

  #[test]
  fn spawn_task_delivers_the_result_on_a_channel() {
    let state = temp_state();
    let session = login_as(&state, "ada");
    add_book(&state, &session, &draft("Dune")).unwrap();

    let receiver = spawn_task(move || list_books(&state, &session));
    let books = receiver
      .recv_timeout(StdDuration::from_secs(10))
      .expect("background task should finish")
      .unwrap();
    assert_eq!(books.len(), 1);
  }
}
