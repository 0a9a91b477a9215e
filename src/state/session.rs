use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Result as SqlResult};
use std::path::{Path, PathBuf};
use tracing::info;

use super::data::{SessionContext, UserId};

/// The SessionStore keeps the logged-in user locally in SQLite.
/// It is the host's collaborator: the gallery core never reads it,
/// the host loads a `SessionContext` and passes it in explicitly.
pub struct SessionStore {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl SessionStore {
    /// Open the session database in the user's data directory:
    /// - Linux: ~/.local/share/profile-gallery/session.db
    /// - macOS: ~/Library/Application Support/profile-gallery/session.db
    /// - Windows: %APPDATA%\profile-gallery\session.db
    pub fn new() -> SqlResult<Self> {
        let db_path = Self::default_path()
            .ok_or_else(|| rusqlite::Error::InvalidPath(PathBuf::from("profile-gallery")))?;
        Self::open(&db_path)
    }

    /// Open (or create) the session database at `db_path`
    pub fn open(db_path: &Path) -> SqlResult<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|_| rusqlite::Error::InvalidPath(parent.to_path_buf()))?;
        }

        let conn = Connection::open(db_path)?;
        info!("📁 Session database opened at: {}", db_path.display());

        let store = SessionStore {
            conn,
            db_path: Some(db_path.to_path_buf()),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store, nothing is written to disk
    pub fn open_in_memory() -> SqlResult<Self> {
        let store = SessionStore {
            conn: Connection::open_in_memory()?,
            db_path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Get the path where the database should be stored
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
        path.push("profile-gallery");
        path.push("session.db");
        Some(path)
    }

    fn init_schema(&self) -> SqlResult<()> {
        // Single-row table: id is pinned to 1
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS session (
                id              INTEGER PRIMARY KEY CHECK (id = 1),
                user_id         INTEGER NOT NULL,
                auth_token      TEXT NOT NULL,
                saved_at        INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Persist the current session, replacing any previous one
    pub fn save(&self, session: &SessionContext) -> SqlResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO session (id, user_id, auth_token, saved_at)
             VALUES (1, ?1, ?2, ?3)",
            rusqlite::params![session.owner_id.0, &session.auth_token, Utc::now().timestamp()],
        )?;
        info!("🔑 Session saved for user {}", session.owner_id);
        Ok(())
    }

    /// Load the saved session, if the user is logged in
    pub fn load(&self) -> SqlResult<Option<SessionContext>> {
        self.conn
            .query_row(
                "SELECT user_id, auth_token FROM session WHERE id = 1",
                [],
                |row| {
                    Ok(SessionContext {
                        owner_id: UserId(row.get(0)?),
                        auth_token: row.get(1)?,
                    })
                },
            )
            .optional()
    }

    /// Forget the saved session (logout)
    pub fn clear(&self) -> SqlResult<()> {
        self.conn.execute("DELETE FROM session", [])?;
        Ok(())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}
