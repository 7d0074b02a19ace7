//! Note repository implementation

use crate::error::{Error, Result};
use crate::models::{Note, NoteId};
use libsql::{params, Connection, Row};

use super::rows::{int, nullable_text, opt_parse, opt_text, parse, text};

const NOTE_COLUMNS: &str = "id, user_id, folder_id, title, content, created_at, updated_at";

/// Trait for note storage operations (async)
#[allow(async_fn_in_trait)]
pub trait NoteRepository {
    /// Create a new note created and modified at `now`
    async fn create(&self, user_id: &str, title: &str, content: &str, now: i64) -> Result<Note>;

    /// Insert a fully-formed note (caller chooses id and timestamps)
    async fn insert(&self, note: &Note) -> Result<Note>;

    /// Get a note by ID
    async fn get(&self, id: &NoteId) -> Result<Option<Note>>;

    /// Get a note by ID only if it belongs to `user_id`
    async fn get_owned(&self, id: &NoteId, user_id: &str) -> Result<Option<Note>>;

    /// List a user's notes, newest first
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Note>>;

    /// Update title and body, returning the stored note
    async fn update(&self, id: &NoteId, title: &str, content: &str, now: i64) -> Result<Note>;

    /// Replace title and body with an explicit modification time
    async fn overwrite(
        &self,
        id: &NoteId,
        title: &str,
        content: &str,
        updated_at: i64,
    ) -> Result<()>;

    /// Delete a note, tombstoning every sync link that pointed at it
    async fn delete(&self, id: &NoteId, now: i64) -> Result<()>;
}

/// libSQL implementation of `NoteRepository`
pub struct LibSqlNoteRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlNoteRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a note from a database row
    fn parse_note(row: &Row) -> Result<Note> {
        Ok(Note {
            id: parse(&text(row, 0)?, "notes.id")?,
            user_id: text(row, 1)?,
            folder_id: opt_parse(opt_text(row, 2)?, "notes.folder_id")?,
            title: text(row, 3)?,
            content: text(row, 4)?,
            created_at: int(row, 5)?,
            updated_at: int(row, 6)?,
        })
    }

    async fn query_notes(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<Vec<Note>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next().await? {
            notes.push(Self::parse_note(&row)?);
        }
        Ok(notes)
    }
}

fn validate_title(title: &str) -> Result<&str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput("note title cannot be empty".into()));
    }
    Ok(title)
}

impl NoteRepository for LibSqlNoteRepository<'_> {
    async fn create(&self, user_id: &str, title: &str, content: &str, now: i64) -> Result<Note> {
        let note = Note::new(user_id, validate_title(title)?, content, now);
        self.insert(&note).await
    }

    async fn insert(&self, note: &Note) -> Result<Note> {
        let title = validate_title(&note.title)?;
        let folder_id = note.folder_id.map(|id| id.as_str());

        self.conn
            .execute(
                "INSERT INTO notes (id, user_id, folder_id, title, content, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    note.id.as_str(),
                    note.user_id.as_str(),
                    nullable_text(folder_id.as_deref()),
                    title,
                    note.content.as_str(),
                    note.created_at,
                    note.updated_at
                ],
            )
            .await?;

        Ok(Note {
            title: title.to_string(),
            ..note.clone()
        })
    }

    async fn get(&self, id: &NoteId) -> Result<Option<Note>> {
        let sql = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?");
        Ok(self.query_notes(&sql, [id.as_str()]).await?.into_iter().next())
    }

    async fn get_owned(&self, id: &NoteId, user_id: &str) -> Result<Option<Note>> {
        let sql = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ? AND user_id = ?");
        Ok(self
            .query_notes(&sql, params![id.as_str(), user_id])
            .await?
            .into_iter()
            .next())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Note>> {
        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id = ? ORDER BY created_at DESC, id DESC"
        );
        self.query_notes(&sql, [user_id]).await
    }

    async fn update(&self, id: &NoteId, title: &str, content: &str, now: i64) -> Result<Note> {
        self.overwrite(id, title, content, now).await?;
        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn overwrite(
        &self,
        id: &NoteId,
        title: &str,
        content: &str,
        updated_at: i64,
    ) -> Result<()> {
        let title = validate_title(title)?;
        let rows = self
            .conn
            .execute(
                "UPDATE notes SET title = ?, content = ?, updated_at = ? WHERE id = ?",
                params![title, content, updated_at, id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: &NoteId, now: i64) -> Result<()> {
        let tx = self.conn.transaction().await?;
        match tombstone_and_delete(&tx, id, now).await {
            Ok(()) => tx.commit().await?,
            Err(error) => {
                tx.rollback().await?;
                return Err(error);
            }
        }
        Ok(())
    }
}

/// The link outlives the note so the next pass can delete the remote file.
/// Its note reference is cleared by the foreign key.
async fn tombstone_and_delete(conn: &Connection, id: &NoteId, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE sync_links SET deleted_at = ?, updated_at = ? WHERE note_id = ?",
        params![now, now, id.as_str()],
    )
    .await?;

    let rows = conn
        .execute("DELETE FROM notes WHERE id = ?", [id.as_str()])
        .await?;
    if rows == 0 {
        return Err(Error::NotFound(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_and_get() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        let note = repo.create("u1", "  Hello  ", "world", 7).await.unwrap();
        assert_eq!(note.title, "Hello");
        assert_eq!((note.created_at, note.updated_at), (7, 7));

        let fetched = repo.get(&note.id).await.unwrap().unwrap();
        assert_eq!(fetched, note);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_rejects_blank_title() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        let error = repo.create("u1", "   ", "body", 7).await.unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_owned_filters_by_user() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        let note = repo.create("alice", "Mine", "", 7).await.unwrap();
        assert!(repo.get_owned(&note.id, "alice").await.unwrap().is_some());
        assert!(repo.get_owned(&note.id, "bob").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_for_user() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        repo.insert(&Note::new("u1", "A", "", 1)).await.unwrap();
        repo.insert(&Note::new("u1", "B", "", 2)).await.unwrap();
        repo.insert(&Note::new("u2", "C", "", 3)).await.unwrap();

        let notes = repo.list_for_user("u1").await.unwrap();
        let titles: Vec<_> = notes.iter().map(|note| note.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_overwrite_sets_explicit_timestamp() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        let note = repo.insert(&Note::new("u1", "A", "old", 10)).await.unwrap();
        repo.overwrite(&note.id, "B", "new", 99).await.unwrap();

        let fetched = repo.get(&note.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "B");
        assert_eq!(fetched.content, "new");
        assert_eq!(fetched.updated_at, 99);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_overwrite_missing_note() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        let error = repo.overwrite(&NoteId::new(), "A", "", 1).await.unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        let note = repo.create("u1", "To delete", "", 7).await.unwrap();
        repo.delete(&note.id, 8).await.unwrap();

        assert!(repo.get(&note.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(&note.id, 8).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_stamps_given_time() {
        let db = setup().await;
        let repo = LibSqlNoteRepository::new(db.connection());

        let note = repo.create("u1", "A", "old", 10).await.unwrap();
        let updated = repo.update(&note.id, "B", "new", 42).await.unwrap();

        assert_eq!(updated.created_at, 10);
        assert_eq!(updated.updated_at, 42);
        assert_eq!(updated.content, "new");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_delete_leaves_links_untouched() {
        let db = setup().await;
        let conn = db.connection();
        let repo = LibSqlNoteRepository::new(conn);
        let note = repo.create("u1", "Kept", "", 1).await.unwrap();

        conn.execute(
            "INSERT INTO sync_connections (id, user_id, repo_owner, repo_name, created_at, updated_at)
             VALUES ('c1', 'u1', 'octo', 'notes', 1, 1)",
            (),
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO sync_links (id, connection_id, note_id, file_path, last_fingerprint, created_at, updated_at)
             VALUES ('l1', 'c1', ?, 'notes/Kept.md', 'sha256:00', 1, 1)",
            [note.id.as_str()],
        )
        .await
        .unwrap();
        conn.execute(
            "CREATE TRIGGER block_note_delete BEFORE DELETE ON notes
             BEGIN SELECT RAISE(ABORT, 'note deletes disabled'); END",
            (),
        )
        .await
        .unwrap();

        assert!(repo.delete(&note.id, 5).await.is_err());

        let mut rows = conn
            .query("SELECT note_id, deleted_at FROM sync_links WHERE id = 'l1'", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(opt_text(&row, 0).unwrap(), Some(note.id.as_str()));
        assert_eq!(crate::db::rows::opt_int(&row, 1).unwrap(), None);
        assert!(repo.get(&note.id).await.unwrap().is_some());
    }
}
