//! SQLite adapter for the `vcb-core` catalog store port.
//!
//! Two tables: `users` (the allow-list) and `videos` (the ordered catalog).
//! Every renumbering mutation runs inside one transaction, so readers never
//! observe a gapped theme-number range. In-place shifts go through a
//! sign-flip two-step (`theme_number = -(theme_number + 1)`, then flip back)
//! because SQLite checks the UNIQUE constraint row by row during an UPDATE.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};

use vcb_core::{
    domain::{User, UserId, VideoEntry},
    renumber,
    store::CatalogStore,
    Error, Result,
};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS users (
    id         INTEGER PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS videos (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    theme_number INTEGER NOT NULL UNIQUE,
    title        TEXT NOT NULL,
    link         TEXT NOT NULL
);
";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database file and ensure the schema.
    ///
    /// The pool is capped at one connection: mutations read the current count
    /// before writing, and a single connection makes them queue on checkout
    /// instead of racing into SQLite's lock-upgrade path.
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(map_err)?;
        Self::init(pool).await
    }

    /// In-memory database for tests. The pool is capped at one connection so
    /// every query sees the same `:memory:` instance.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(map_err)?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await.map_err(map_err)?;
        Ok(Self { pool })
    }

    /// Explicit shutdown; waits for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_video(row: &sqlx::sqlite::SqliteRow) -> VideoEntry {
        VideoEntry {
            number: row.get::<i64, _>("theme_number") as u32,
            title: row.get("title"),
            link: row.get("link"),
        }
    }
}

fn map_err(e: sqlx::Error) -> Error {
    Error::Store(e.to_string())
}

/// `%`/`_`/`\` in a search keyword are literal text, not LIKE wildcards.
fn escape_like(keyword: &str) -> String {
    keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn add_user(&self, user: &User) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO users (id, first_name, last_name) VALUES (?1, ?2, ?3)")
            .bind(user.id.0)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn user_ids(&self) -> Result<Vec<UserId>> {
        let rows = sqlx::query("SELECT id FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(rows.iter().map(|r| UserId(r.get::<i64, _>("id"))).collect())
    }

    async fn users_detailed(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT id, first_name, last_name FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(rows
            .iter()
            .map(|r| User {
                id: UserId(r.get::<i64, _>("id")),
                first_name: r.get("first_name"),
                last_name: r.get("last_name"),
            })
            .collect())
    }

    async fn remove_user(&self, id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn insert_video(
        &self,
        requested: Option<u32>,
        title: &str,
        link: &str,
    ) -> Result<VideoEntry> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM videos")
            .fetch_one(&mut *tx)
            .await
            .map_err(map_err)?
            .get("n");
        let number = renumber::placement(requested, count as u32);

        if i64::from(number) <= count {
            // Shift everything at or above the slot up by one.
            sqlx::query(
                "UPDATE videos SET theme_number = -(theme_number + 1) WHERE theme_number >= ?1",
            )
            .bind(i64::from(number))
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
            sqlx::query("UPDATE videos SET theme_number = -theme_number WHERE theme_number < 0")
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
        }

        sqlx::query("INSERT INTO videos (theme_number, title, link) VALUES (?1, ?2, ?3)")
            .bind(i64::from(number))
            .bind(title)
            .bind(link)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        tx.commit().await.map_err(map_err)?;
        Ok(VideoEntry {
            number,
            title: title.to_string(),
            link: link.to_string(),
        })
    }

    async fn delete_video_by_number(&self, number: u32) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let removed = sqlx::query("DELETE FROM videos WHERE theme_number = ?1")
            .bind(i64::from(number))
            .execute(&mut *tx)
            .await
            .map_err(map_err)?
            .rows_affected();
        if removed == 0 {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE videos SET theme_number = -(theme_number - 1) WHERE theme_number > ?1",
        )
        .bind(i64::from(number))
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;
        sqlx::query("UPDATE videos SET theme_number = -theme_number WHERE theme_number < 0")
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        tx.commit().await.map_err(map_err)?;
        Ok(true)
    }

    async fn delete_video_by_link(&self, link: &str) -> Result<u32> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let removed = sqlx::query("DELETE FROM videos WHERE link = ?1")
            .bind(link)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?
            .rows_affected();
        if removed == 0 {
            return Ok(0);
        }

        // Renumber the remainder once, not once per removed entry.
        let ids: Vec<i64> = sqlx::query("SELECT id FROM videos ORDER BY theme_number")
            .fetch_all(&mut *tx)
            .await
            .map_err(map_err)?
            .iter()
            .map(|r| r.get("id"))
            .collect();
        for (i, id) in ids.into_iter().enumerate() {
            sqlx::query("UPDATE videos SET theme_number = -(?1) WHERE id = ?2")
                .bind((i + 1) as i64)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
        }
        sqlx::query("UPDATE videos SET theme_number = -theme_number WHERE theme_number < 0")
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        tx.commit().await.map_err(map_err)?;
        Ok(removed as u32)
    }

    async fn videos_ordered(&self) -> Result<Vec<VideoEntry>> {
        let rows =
            sqlx::query("SELECT theme_number, title, link FROM videos ORDER BY theme_number")
                .fetch_all(&self.pool)
                .await
                .map_err(map_err)?;
        Ok(rows.iter().map(Self::row_to_video).collect())
    }

    async fn search_videos_by_title(&self, keyword: &str) -> Result<Vec<VideoEntry>> {
        let pattern = format!("%{}%", escape_like(keyword));
        let rows = sqlx::query(
            "SELECT theme_number, title, link FROM videos \
             WHERE title LIKE ?1 ESCAPE '\\' ORDER BY theme_number",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(rows.iter().map(Self::row_to_video).collect())
    }
}
