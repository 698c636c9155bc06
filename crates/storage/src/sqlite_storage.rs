//! SQLite storage backend for snaphunt.
//!
//! Catalog, user and evidence rows live in plain relational tables created on
//! open. This is the storage backend used by the server.

use async_trait::async_trait;
use chrono::Utc;
use snaphunt_core::{
    Coordinate, Evidence, EvidenceId, ImageId, ImageSet, NewEvidence, SetId, SetImage, Time,
    User, UserId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use super::trait_::{NewSet, Result, Storage, StorageError};

/// SQLite storage implementation.
#[derive(Clone)]
pub struct SqliteStorage {
    /// Database connection pool
    pool: sqlx::SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if missing) the database at `url`, e.g.
    /// `sqlite://snaphunt.db`.
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.init_schema().await?;

        info!(url, "Opened SQLite storage");
        Ok(storage)
    }

    /// Open the database file at `path`.
    pub async fn new_from_path(path: &Path) -> Result<Self> {
        let path = path
            .to_str()
            .ok_or_else(|| StorageError::InvalidPath(path.display().to_string()))?;
        Self::new(&format!("sqlite://{path}")).await
    }

    /// Create an in-memory SQLite storage for testing.
    ///
    /// Every pooled connection to `:memory:` would get its own database, so
    /// the pool is pinned to a single connection that never expires.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.init_schema().await?;

        Ok(storage)
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                time_limit INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS imgs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                set_id INTEGER NOT NULL REFERENCES sets(id),
                path TEXT NOT NULL,
                title TEXT NOT NULL,
                seq_no INTEGER NOT NULL,
                lat REAL NOT NULL,
                lng REAL NOT NULL,
                hint TEXT,
                UNIQUE (set_id, seq_no)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS evidence (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                img_id INTEGER NOT NULL REFERENCES imgs(id),
                user_id INTEGER NOT NULL REFERENCES users(id),
                path TEXT NOT NULL,
                lat REAL NOT NULL,
                lng REAL NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // Create indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_imgs_set ON imgs(set_id, seq_no)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_evidence_user ON evidence(user_id, img_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Check if the database is healthy.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    fn row_to_user(row: &SqliteRow) -> Result<User> {
        Ok(User {
            id: UserId(row.try_get("id")?),
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
        })
    }

    fn row_to_set(row: &SqliteRow) -> Result<ImageSet> {
        Ok(ImageSet {
            id: SetId(row.try_get("id")?),
            name: row.try_get("name")?,
            time_limit_secs: row.try_get("time_limit")?,
        })
    }

    fn row_to_image(row: &SqliteRow) -> Result<SetImage> {
        let seq_no: i64 = row.try_get("seq_no")?;
        Ok(SetImage {
            id: ImageId(row.try_get("id")?),
            set_id: SetId(row.try_get("set_id")?),
            path: row.try_get("path")?,
            title: row.try_get("title")?,
            seq_no: u32::try_from(seq_no)
                .map_err(|_| StorageError::Other(format!("bad sequence number {seq_no}")))?,
            location: Coordinate::new(row.try_get("lat")?, row.try_get("lng")?),
            hint: row.try_get("hint")?,
        })
    }

    fn row_to_evidence(row: &SqliteRow) -> Result<Evidence> {
        Ok(Evidence {
            id: EvidenceId(row.try_get("id")?),
            image_id: ImageId(row.try_get("img_id")?),
            user_id: UserId(row.try_get("user_id")?),
            path: row.try_get("path")?,
            location: Coordinate::new(row.try_get("lat")?, row.try_get("lng")?),
            created_at: row.try_get::<Time, _>("created_at")?,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl Storage for SqliteStorage {
    // === User operations ===

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                debug!(username, "Registered user");
                Ok(User {
                    id: UserId(done.last_insert_rowid()),
                    username: username.to_string(),
                    password_hash: password_hash.to_string(),
                })
            }
            Err(e) if is_unique_violation(&e) => {
                Err(StorageError::Conflict(format!("username '{username}' already exists")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username, password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    // === Catalog operations ===

    async fn create_set(&self, set: &NewSet) -> Result<ImageSet> {
        let mut tx = self.pool.begin().await?;

        let set_id = sqlx::query("INSERT INTO sets (name, time_limit) VALUES (?, ?)")
            .bind(&set.name)
            .bind(set.time_limit)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        for img in &set.imgs {
            let result = sqlx::query(
                "INSERT INTO imgs (set_id, path, title, seq_no, lat, lng, hint)
                VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(set_id)
            .bind(&img.path)
            .bind(&img.title)
            .bind(i64::from(img.seq_no))
            .bind(img.lat)
            .bind(img.lng)
            .bind(&img.hint)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(StorageError::Conflict(format!(
                        "set '{}' has duplicate sequence number {}",
                        set.name, img.seq_no
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;

        info!(set = set_id, name = %set.name, images = set.imgs.len(), "Imported set");
        Ok(ImageSet {
            id: SetId(set_id),
            name: set.name.clone(),
            time_limit_secs: set.time_limit,
        })
    }

    async fn list_sets(&self) -> Result<Vec<ImageSet>> {
        let rows = sqlx::query("SELECT id, name, time_limit FROM sets ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_set).collect()
    }

    async fn load_set(&self, id: SetId) -> Result<Option<ImageSet>> {
        let row = sqlx::query("SELECT id, name, time_limit FROM sets WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_set).transpose()
    }

    async fn list_set_images(&self, id: SetId) -> Result<Vec<SetImage>> {
        let rows = sqlx::query(
            "SELECT id, set_id, path, title, seq_no, lat, lng, hint
            FROM imgs WHERE set_id = ? ORDER BY seq_no",
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_image).collect()
    }

    async fn load_image(&self, id: ImageId) -> Result<Option<SetImage>> {
        let row = sqlx::query(
            "SELECT id, set_id, path, title, seq_no, lat, lng, hint FROM imgs WHERE id = ?",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_image).transpose()
    }

    // === Evidence operations ===

    async fn create_evidence(&self, evidence: &NewEvidence) -> Result<Evidence> {
        let created_at = Utc::now();
        let id = sqlx::query(
            "INSERT INTO evidence (img_id, user_id, path, lat, lng, created_at)
            VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(evidence.image_id.get())
        .bind(evidence.user_id.get())
        .bind(&evidence.path)
        .bind(evidence.location.lat)
        .bind(evidence.location.lng)
        .bind(created_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        debug!(evidence = id, image = %evidence.image_id, user = %evidence.user_id, "Stored evidence");
        Ok(Evidence {
            id: EvidenceId(id),
            image_id: evidence.image_id,
            user_id: evidence.user_id,
            path: evidence.path.clone(),
            location: evidence.location,
            created_at,
        })
    }

    async fn load_evidence(&self, id: EvidenceId) -> Result<Option<Evidence>> {
        let row = sqlx::query(
            "SELECT id, img_id, user_id, path, lat, lng, created_at FROM evidence WHERE id = ?",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_evidence).transpose()
    }
}
