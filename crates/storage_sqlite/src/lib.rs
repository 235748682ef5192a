use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Note, NoteId, NoteStore, SyncStatus};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::debug;

pub const CURRENT_DB_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("note id must not be empty")]
    EmptyId,
    #[error("note `{0}` not found")]
    NotFound(NoteId),
    #[error("corrupt note row: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFilter {
    Active,
    Archived,
    All,
}

/// Local note store backing the card engine.
#[derive(Debug, Clone)]
pub struct SqliteNoteStore {
    pool: SqlitePool,
}

impl SqliteNoteStore {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!(
            "sqlite://{}",
            path.as_ref().to_string_lossy()
        ))?
        .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                is_archived INTEGER NOT NULL DEFAULT 0,
                parent_id TEXT,
                original_parent_id TEXT,
                sync_status TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_notes_parent ON notes(parent_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO metadata(key, value)
            VALUES ('schema_version', ?1)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(CURRENT_DB_SCHEMA_VERSION.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn schema_version(&self) -> Result<u32> {
        let row = sqlx::query("SELECT value FROM metadata WHERE key = 'schema_version'")
            .fetch_one(&self.pool)
            .await?;
        row.get::<String, _>("value")
            .parse::<u32>()
            .map_err(|err| StoreError::Corrupt(format!("schema_version: {err}")))
    }

    pub async fn put_note(&self, note: &Note) -> Result<()> {
        ensure_id(&note.id)?;
        sqlx::query(
            r#"
            INSERT INTO notes(
                id, title, content, is_archived, parent_id, original_parent_id, sync_status,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                is_archived = excluded.is_archived,
                parent_id = excluded.parent_id,
                original_parent_id = excluded.original_parent_id,
                sync_status = excluded.sync_status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(note.id.as_str())
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.is_archived)
        .bind(note.parent_id.as_ref().map(NoteId::as_str))
        .bind(note.original_parent_id.as_ref().map(NoteId::as_str))
        .bind(note.sync_status.map(SyncStatus::as_str))
        .bind(note.created_at.to_rfc3339())
        .bind(note.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_note(&self, id: &NoteId) -> Result<Option<Note>> {
        let row = sqlx::query(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(map_note_row).transpose()
    }

    pub async fn list_notes(&self, filter: ArchiveFilter) -> Result<Vec<Note>> {
        let clause = match filter {
            ArchiveFilter::Active => "WHERE is_archived = 0",
            ArchiveFilter::Archived => "WHERE is_archived = 1",
            ArchiveFilter::All => "",
        };
        let rows = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes {clause} ORDER BY updated_at DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(map_note_row).collect()
    }

    pub async fn list_children(&self, parent_id: &NoteId) -> Result<Vec<Note>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {NOTE_COLUMNS} FROM notes
            WHERE parent_id = ?1 AND is_archived = 0
            ORDER BY updated_at DESC, id ASC
            "#
        ))
        .bind(parent_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(map_note_row).collect()
    }

    /// Archives a note, remembering its parent link so a restore can put it
    /// back. Returns `false` when the id is unknown.
    pub async fn archive(&self, id: &NoteId) -> Result<bool> {
        ensure_id(id)?;
        let result = sqlx::query(
            r#"
            UPDATE notes SET
                original_parent_id = CASE WHEN is_archived = 0 THEN parent_id ELSE original_parent_id END,
                parent_id = CASE WHEN is_archived = 0 THEN NULL ELSE parent_id END,
                is_archived = 1,
                updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        let archived = result.rows_affected() > 0;
        debug!(note_id = %id, archived, "archive note");
        Ok(archived)
    }

    pub async fn restore(&self, id: &NoteId) -> Result<()> {
        ensure_id(id)?;
        let result = sqlx::query(
            r#"
            UPDATE notes SET
                parent_id = original_parent_id,
                original_parent_id = NULL,
                is_archived = 0,
                updated_at = ?2
            WHERE id = ?1 AND is_archived = 1
            "#,
        )
        .bind(id.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    pub async fn delete(&self, id: &NoteId) -> Result<bool> {
        ensure_id(id)?;
        let result = sqlx::query("DELETE FROM notes WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected() > 0;
        debug!(note_id = %id, deleted, "delete note");
        Ok(deleted)
    }
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn archive_note(&self, id: &NoteId) -> anyhow::Result<bool> {
        Ok(self.archive(id).await?)
    }

    async fn delete_note(&self, id: &NoteId) -> anyhow::Result<bool> {
        Ok(self.delete(id).await?)
    }
}

const NOTE_COLUMNS: &str = "id, title, content, is_archived, parent_id, original_parent_id, \
                            sync_status, created_at, updated_at";

fn ensure_id(id: &NoteId) -> Result<()> {
    if id.is_empty() {
        return Err(StoreError::EmptyId);
    }
    Ok(())
}

fn map_note_row(row: SqliteRow) -> Result<Note> {
    let sync_status = row
        .get::<Option<String>, _>("sync_status")
        .map(|raw| {
            SyncStatus::parse(&raw).ok_or_else(|| StoreError::Corrupt(format!("sync_status `{raw}`")))
        })
        .transpose()?;
    Ok(Note {
        id: NoteId::new(row.get::<String, _>("id")),
        title: row.get("title"),
        content: row.get("content"),
        is_archived: row.get("is_archived"),
        parent_id: row.get::<Option<String>, _>("parent_id").map(NoteId::new),
        original_parent_id: row
            .get::<Option<String>, _>("original_parent_id")
            .map(NoteId::new),
        sync_status,
        created_at: parse_rfc3339(row.get::<String, _>("created_at"))?,
        updated_at: parse_rfc3339(row.get::<String, _>("updated_at"))?,
    })
}

fn parse_rfc3339(value: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt(format!("timestamp `{value}`: {err}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::tempdir;

    use super::*;

    fn note(id: &str) -> Note {
        let mut note = Note::new(format!("title {id}"), "# body");
        note.id = NoteId::new(id);
        note
    }

    #[tokio::test]
    async fn stores_and_lists_notes() {
        let store = SqliteNoteStore::in_memory().await.expect("store");
        assert_eq!(
            store.schema_version().await.expect("schema version"),
            CURRENT_DB_SCHEMA_VERSION
        );

        let mut synced = note("a");
        synced.sync_status = Some(SyncStatus::Synced);
        store.put_note(&synced).await.expect("put a");
        store.put_note(&note("b")).await.expect("put b");

        let loaded = store
            .get_note(&NoteId::new("a"))
            .await
            .expect("get")
            .expect("present");
        assert_eq!(loaded.sync_status, Some(SyncStatus::Synced));
        assert_eq!(loaded.content, "# body");
        assert_eq!(store.list_notes(ArchiveFilter::Active).await.expect("list").len(), 2);
        assert!(store.get_note(&NoteId::new("zzz")).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn archive_detaches_child_and_restore_reattaches() {
        let store = SqliteNoteStore::in_memory().await.expect("store");
        store.put_note(&note("p")).await.expect("parent");
        store
            .put_note(&note("c").with_parent(NoteId::new("p")))
            .await
            .expect("child");
        assert_eq!(store.list_children(&NoteId::new("p")).await.expect("kids").len(), 1);

        assert!(store.archive(&NoteId::new("c")).await.expect("archive"));
        // A second archive must not lose the remembered parent.
        assert!(store.archive(&NoteId::new("c")).await.expect("archive again"));

        let archived = store.list_notes(ArchiveFilter::Archived).await.expect("list");
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].parent_id, None);
        assert_eq!(archived[0].original_parent_id, Some(NoteId::new("p")));
        assert!(store.list_children(&NoteId::new("p")).await.expect("kids").is_empty());

        store.restore(&NoteId::new("c")).await.expect("restore");
        let restored = store
            .get_note(&NoteId::new("c"))
            .await
            .expect("get")
            .expect("present");
        assert!(!restored.is_archived);
        assert_eq!(restored.parent_id, Some(NoteId::new("p")));
        assert_eq!(restored.original_parent_id, None);
    }

    #[tokio::test]
    async fn unknown_and_empty_ids() {
        let store = SqliteNoteStore::in_memory().await.expect("store");
        assert!(!store.archive(&NoteId::new("missing")).await.expect("archive"));
        assert!(!store.delete(&NoteId::new("missing")).await.expect("delete"));
        assert!(matches!(
            store.archive(&NoteId::default()).await,
            Err(StoreError::EmptyId)
        ));
        assert!(matches!(
            store.restore(&NoteId::new("missing")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn implements_note_store_for_the_card_engine() {
        let store = SqliteNoteStore::in_memory().await.expect("store");
        store.put_note(&note("a")).await.expect("put");
        let dyn_store: Arc<dyn NoteStore> = Arc::new(store.clone());

        assert!(dyn_store.archive_note(&NoteId::new("a")).await.expect("archive"));
        assert!(dyn_store.delete_note(&NoteId::new("a")).await.expect("delete"));
        assert!(!dyn_store.delete_note(&NoteId::new("a")).await.expect("delete again"));
        assert!(dyn_store.delete_note(&NoteId::default()).await.is_err());
        assert!(store.list_notes(ArchiveFilter::All).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn file_backed_store_persists_across_connections() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("notes.db");
        {
            let store = SqliteNoteStore::connect(&path).await.expect("connect");
            store.put_note(&note("kept")).await.expect("put");
        }
        let store = SqliteNoteStore::connect(&path).await.expect("reconnect");
        assert!(store.get_note(&NoteId::new("kept")).await.expect("get").is_some());
    }
}
