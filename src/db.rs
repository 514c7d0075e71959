use crate::config::Config;
use rusqlite::{Connection, Result};
use std::fs;

/// Schema bootstrap. Column names follow the shared catalog schema:
/// `authors`, `books`, a `user_books` association keyed on (userId, bookId)
/// for upsert-on-conflict, and `userinfo` backing the credential check.
const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS authors (
        authorId INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        surname TEXT NOT NULL,
        website TEXT
    );

    CREATE TABLE IF NOT EXISTS books (
        bookId INTEGER PRIMARY KEY AUTOINCREMENT,
        authorId INTEGER NOT NULL,
        title TEXT NOT NULL,
        year INTEGER NOT NULL,
        numberOfPages INTEGER NOT NULL,
        cover TEXT,
        about TEXT,
        FOREIGN KEY(authorId) REFERENCES authors(authorId)
    );

    CREATE TABLE IF NOT EXISTS user_books (
        userId INTEGER NOT NULL,
        bookId INTEGER NOT NULL,
        readStatus INTEGER NOT NULL DEFAULT 0,
        rating INTEGER NOT NULL DEFAULT 0,
        comments TEXT,
        releaseDate TEXT,
        PRIMARY KEY (userId, bookId),
        FOREIGN KEY(userId) REFERENCES userinfo(userId) ON DELETE CASCADE,
        FOREIGN KEY(bookId) REFERENCES books(bookId) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS userinfo (
        userId INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        userType INTEGER NOT NULL DEFAULT 1
    );
";

/// Open the configured database, creating the file and schema on first use.
/// Every repository call opens its own connection and drops it when done.
pub fn open_db(config: &Config) -> Result<Connection> {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).ok();
        }
    }

    let conn = Connection::open(&config.db_path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::open_db;
    use crate::config::Config;

    #[test]
    fn open_creates_schema_and_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("mylibrary-db-{}", uuid::Uuid::new_v4()));
        let config = Config {
            db_path: dir.join("nested").join("library.db"),
            ..Config::default()
        };

        let conn = open_db(&config).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                 AND name IN ('authors', 'books', 'user_books', 'userinfo')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);

        // Second open against the same file must be a no-op.
        drop(conn);
        open_db(&config).unwrap();
    }
}
