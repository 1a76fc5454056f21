//! `SQLite` backend for registrations and guild configuration.
//!
//! `rusqlite` is blocking, so every statement runs on tokio's blocking pool
//! while the connection mutex is held.

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::traits::{RegistrationStore, RestrictionStore};
use crate::models::{GuildConfig, GuildId, RegisteredGuild};
use crate::{Error, Result, current_timestamp};

/// SQLite-based guild store.
#[derive(Clone)]
pub struct SqliteGuildStore {
    /// Database connection (mutex for interior mutability).
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGuildStore {
    /// Opens (or creates) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                    operation: "create_database_dir".to_string(),
                    cause: e.to_string(),
                })?;
            }
        }

        let conn = Connection::open(path.as_ref()).map_err(|e| Error::OperationFailed {
            operation: "open_guild_database".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_connection(conn)
    }

    /// Creates an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_guild_database_memory".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_connection(conn)
    }

    /// Returns the default database path under the user's data directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "guildsync")
            .map(|dirs| dirs.data_dir().join("guildsync.db"))
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS registered_guilds (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                avatar_url TEXT,
                locale TEXT NOT NULL DEFAULT 'en-US',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS guild_members (
                guild_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                PRIMARY KEY (guild_id, user_id),
                FOREIGN KEY (guild_id) REFERENCES registered_guilds(guild_id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_guild_members_user ON guild_members(user_id);

            CREATE TABLE IF NOT EXISTS guild_configs (
                guild_id TEXT PRIMARY KEY,
                restricted INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL
            );
            ",
        )
        .map_err(|e| Error::OperationFailed {
            operation: "initialize_guild_schema".to_string(),
            cause: e.to_string(),
        })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_connection<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|e| Error::OperationFailed {
                operation: "lock_connection".to_string(),
                cause: e.to_string(),
            })?;
            f(&guard).map_err(|e| Error::OperationFailed {
                operation: operation.to_string(),
                cause: e.to_string(),
            })
        })
        .await
        .map_err(|e| Error::OperationFailed {
            operation: operation.to_string(),
            cause: e.to_string(),
        })?
    }

    /// Inserts or updates a registered guild.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    pub async fn register_guild(
        &self,
        guild_id: &GuildId,
        name: &str,
        avatar_url: Option<&str>,
        locale: &str,
    ) -> Result<RegisteredGuild> {
        let guild = RegisteredGuild {
            id: 0,
            guild_id: guild_id.clone(),
            name: name.to_string(),
            avatar_url: avatar_url.map(str::to_string),
            locale: locale.to_string(),
        };
        let now = timestamp();

        let row = guild.clone();
        let id = self
            .with_connection("register_guild", move |conn| {
                conn.query_row(
                    r"
                    INSERT INTO registered_guilds
                        (guild_id, name, avatar_url, locale, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                    ON CONFLICT(guild_id) DO UPDATE SET
                        name = excluded.name,
                        avatar_url = excluded.avatar_url,
                        locale = excluded.locale,
                        updated_at = excluded.updated_at
                    RETURNING id
                    ",
                    params![
                        row.guild_id.as_str(),
                        row.name,
                        row.avatar_url,
                        row.locale,
                        now
                    ],
                    |r| r.get::<_, i64>(0),
                )
            })
            .await?;

        tracing::info!(guild_id = %guild_id, id, "Guild registered");
        Ok(RegisteredGuild { id, ..guild })
    }

    /// Links a user to a registered guild.
    ///
    /// # Errors
    ///
    /// Returns an error if the guild is not registered or storage cannot be
    /// accessed.
    pub async fn add_member(&self, guild_id: &GuildId, user_id: &str) -> Result<()> {
        let guild_id = guild_id.as_str().to_string();
        let user_id = user_id.to_string();
        self.with_connection("add_guild_member", move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO guild_members (guild_id, user_id) VALUES (?1, ?2)",
                params![guild_id, user_id],
            )
            .map(|_| ())
        })
        .await
    }

    /// Sets a guild's restriction flag.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    pub async fn set_restricted(&self, guild_id: &GuildId, restricted: bool) -> Result<()> {
        let id = guild_id.as_str().to_string();
        let now = timestamp();
        self.with_connection("set_restricted", move |conn| {
            conn.execute(
                r"
                INSERT INTO guild_configs (guild_id, restricted, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(guild_id) DO UPDATE SET
                    restricted = excluded.restricted,
                    updated_at = excluded.updated_at
                ",
                params![id, restricted, now],
            )
            .map(|_| ())
        })
        .await?;

        tracing::info!(guild_id = %guild_id, restricted, "Guild restriction updated");
        Ok(())
    }
}

fn timestamp() -> i64 {
    i64::try_from(current_timestamp()).unwrap_or(i64::MAX)
}

#[async_trait]
impl RegistrationStore for SqliteGuildStore {
    async fn list_registered_guilds(&self, user_id: &str) -> Result<Vec<RegisteredGuild>> {
        let user_id = user_id.to_string();
        self.with_connection("list_registered_guilds", move |conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT g.id, g.guild_id, g.name, g.avatar_url, g.locale
                FROM registered_guilds g
                JOIN guild_members m ON m.guild_id = g.guild_id
                WHERE m.user_id = ?1
                ORDER BY g.id
                ",
            )?;
            let rows = stmt.query_map(params![user_id], |r| {
                Ok(RegisteredGuild {
                    id: r.get(0)?,
                    guild_id: GuildId::new(r.get::<_, String>(1)?),
                    name: r.get(2)?,
                    avatar_url: r.get(3)?,
                    locale: r.get(4)?,
                })
            })?;
            rows.collect()
        })
        .await
    }
}

#[async_trait]
impl RestrictionStore for SqliteGuildStore {
    async fn guild_config(&self, guild_id: &GuildId) -> Result<Option<GuildConfig>> {
        let id = guild_id.clone();
        self.with_connection("get_guild_config", move |conn| {
            conn.query_row(
                "SELECT restricted FROM guild_configs WHERE guild_id = ?1",
                params![id.as_str()],
                |r| r.get::<_, bool>(0),
            )
            .optional()
            .map(|restricted| {
                restricted.map(|restricted| GuildConfig {
                    guild_id: id,
                    restricted,
                })
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_list_for_member() {
        let store = SqliteGuildStore::in_memory().unwrap();
        let guild_id = GuildId::new("81384788765712384");

        let registered = store
            .register_guild(&guild_id, "API", Some("https://cdn.example/a.png"), "de")
            .await
            .unwrap();
        assert!(registered.id > 0);

        store.add_member(&guild_id, "alice").await.unwrap();

        let alice = store.list_registered_guilds("alice").await.unwrap();
        assert_eq!(alice, vec![registered]);
        assert!(store.list_registered_guilds("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_twice_keeps_id() {
        let store = SqliteGuildStore::in_memory().unwrap();
        let guild_id = GuildId::new("1");
        let first = store.register_guild(&guild_id, "Old", None, "en-US").await.unwrap();
        let second = store.register_guild(&guild_id, "New", None, "en-US").await.unwrap();
        assert_eq!(first.id, second.id);

        store.add_member(&guild_id, "alice").await.unwrap();
        store.add_member(&guild_id, "alice").await.unwrap();
        let alice = store.list_registered_guilds("alice").await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].name, "New");
    }

    #[tokio::test]
    async fn test_member_of_unregistered_guild_fails() {
        let store = SqliteGuildStore::in_memory().unwrap();
        let result = store.add_member(&GuildId::new("404"), "alice").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_guild_config() {
        let store = SqliteGuildStore::in_memory().unwrap();
        let guild_id = GuildId::new("1");
        assert!(store.guild_config(&guild_id).await.unwrap().is_none());

        store.set_restricted(&guild_id, true).await.unwrap();
        assert!(store.guild_config(&guild_id).await.unwrap().unwrap().restricted);

        store.set_restricted(&guild_id, false).await.unwrap();
        assert!(!store.guild_config(&guild_id).await.unwrap().unwrap().restricted);
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("guildsync.db");
        let guild_id = GuildId::new("7");

        {
            let store = SqliteGuildStore::new(&path).unwrap();
            store.register_guild(&guild_id, "Seven", None, "en-US").await.unwrap();
            store.add_member(&guild_id, "alice").await.unwrap();
        }

        let reopened = SqliteGuildStore::new(&path).unwrap();
        let alice = reopened.list_registered_guilds("alice").await.unwrap();
        assert_eq!(alice.len(), 1);
    }
}
