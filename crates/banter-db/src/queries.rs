use crate::models::{MessageRow, StoredMessage, UserRow};
use crate::{Database, StoreError};
use rusqlite::Connection;

impl Database {
    // -- Users --

    /// Insert a new user. Uniqueness is enforced by the store's UNIQUE
    /// constraint, not pre-checked here.
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            match conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            ) {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateUsername)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    // -- Messages --

    /// Persist a message and return the canonical stored record.
    /// The store assigns both the id and the timestamp.
    pub fn insert_message(&self, author_id: &str, text: &str) -> Result<StoredMessage, StoreError> {
        self.with_conn(|conn| {
            let stored = conn.query_row(
                "INSERT INTO messages (author_id, text) VALUES (?1, ?2)
                 RETURNING id, text, created_at",
                (author_id, text),
                |row| {
                    Ok(StoredMessage {
                        id: row.get(0)?,
                        text: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )?;
            Ok(stored)
        })
    }

    /// Full history, author username joined in, ascending by insert order.
    pub fn list_all(&self) -> Result<Vec<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.author_id, u.username, m.text, m.created_at
                 FROM messages m
                 JOIN users u ON m.author_id = u.id
                 ORDER BY m.created_at ASC, m.id ASC",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        author_id: row.get(1)?,
                        author_username: row.get(2)?,
                        text: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_user_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<UserRow>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, StoreError>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, StoreError> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn db_with_user(username: &str) -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4().to_string();
        db.create_user(&id, username, "hash").unwrap();
        (db, id)
    }

    #[test]
    fn create_and_fetch_user() {
        let (db, id) = db_with_user("alice");

        let user = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "alice");
        assert_eq!(user.password, "hash");

        assert!(db.get_user_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_rejected() {
        let (db, _) = db_with_user("alice");

        let err = db
            .create_user(&Uuid::new_v4().to_string(), "alice", "other-hash")
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername));
    }

    #[test]
    fn unknown_author_insert_fails() {
        let db = Database::open_in_memory().unwrap();

        let err = db.insert_message("no-such-user", "hi").unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn insert_returns_store_assigned_record() {
        let (db, id) = db_with_user("alice");

        let stored = db.insert_message(&id, "hello").unwrap();
        assert_eq!(stored.text, "hello");
        assert!(stored.id > 0);
        assert!(!stored.created_at.is_empty());
    }

    #[test]
    fn history_preserves_append_order() {
        let (db, id) = db_with_user("alice");

        let first = db.insert_message(&id, "first").unwrap();
        let second = db.insert_message(&id, "second").unwrap();
        assert!(second.id > first.id);

        let rows = db.list_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text, "first");
        assert_eq!(rows[1].text, "second");
        assert!(rows[0].timestamp() <= rows[1].timestamp());
    }

    #[test]
    fn history_joins_author_username() {
        let (db, id) = db_with_user("alice");
        db.insert_message(&id, "hi").unwrap();

        let rows = db.list_all().unwrap();
        assert_eq!(rows[0].author_username, "alice");
        assert_eq!(rows[0].author_id, id);
    }
}
