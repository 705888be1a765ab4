//! Accounts and their uploaded invoices, persisted in SQLite

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub render_token: String,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create an account
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: &'a str,
    pub render_token: &'a str,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct StoredFile {
    pub file_name: String,
    pub file_key: String,
    /// `DD-MM-YYYY`
    pub uploaded_date: String,
}

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        tracing::info!("Connecting to database: {}", database_url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Single-connection in-memory store
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                render_token TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS uploaded_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL REFERENCES users(username),
                file_name TEXT NOT NULL,
                file_key TEXT NOT NULL,
                uploaded_date TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_uploaded_files_user ON uploaded_files(username)
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Returns false when the username is already taken
    pub async fn create(&self, user: &NewUser<'_>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, first_name, last_name, password_hash, render_token, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(username) DO NOTHING
            "#,
        )
        .bind(user.username)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.password_hash)
        .bind(user.render_token)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn find(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT username, first_name, last_name, password_hash, render_token, created_at
            FROM users WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn update_render_token(&self, username: &str, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET render_token = ? WHERE username = ?")
            .bind(token)
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Removes the account and its file records; false if it did not exist
    pub async fn delete(&self, username: &str) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM uploaded_files WHERE username = ?")
            .bind(username)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE username = ?")
            .bind(username)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn add_file(&self, username: &str, file: &StoredFile) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO uploaded_files (username, file_name, file_key, uploaded_date)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(&file.file_name)
        .bind(&file.file_key)
        .bind(&file.uploaded_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All files of a user in upload order
    pub async fn files(&self, username: &str) -> Result<Vec<StoredFile>, sqlx::Error> {
        sqlx::query_as::<_, StoredFile>(
            r#"
            SELECT file_name, file_key, uploaded_date
            FROM uploaded_files WHERE username = ? ORDER BY id
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
    }

    /// First upload with the given name
    pub async fn find_file(
        &self,
        username: &str,
        file_name: &str,
    ) -> Result<Option<StoredFile>, sqlx::Error> {
        sqlx::query_as::<_, StoredFile>(
            r#"
            SELECT file_name, file_key, uploaded_date
            FROM uploaded_files WHERE username = ? AND file_name = ?
            ORDER BY id LIMIT 1
            "#,
        )
        .bind(username)
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await
    }
}
