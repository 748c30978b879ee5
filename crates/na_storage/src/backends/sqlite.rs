use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use na_core::{Article, ArticleStorage, Error, Result, StoredArticle, StoredSummary};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:articles.db";

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        url TEXT UNIQUE,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        source TEXT NOT NULL,
        published_at TEXT,
        sentiment REAL,
        authors TEXT NOT NULL DEFAULT '[]',
        image TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS summaries (
        id TEXT PRIMARY KEY,
        article_id TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
        summary_text TEXT NOT NULL,
        relevance_score REAL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_summaries_article_id ON summaries(article_id)",
];

pub struct SQLiteStorage {
    pool: SqlitePool,
}

fn db_err(context: &str) -> impl Fn(sqlx::Error) -> Error + '_ {
    move |e| Error::Database(format!("{}: {}", context, e))
}

impl SQLiteStorage {
    /// Connect to `url` (`sqlite:path`, `sqlite::memory:` or a bare path),
    /// creating the file and running migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = if url.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(url).map_err(db_err("Invalid database url"))?
        } else {
            SqliteConnectOptions::new().filename(url)
        }
        .create_if_missing(true)
        .foreign_keys(true);

        // every connection to an in-memory database sees a different database
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(db_err("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }

        tracing::debug!("SQLite storage ready at {}", url);
        Ok(Self { pool })
    }
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Database(format!("Invalid id {}: {}", value, e)))
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| Error::Database(format!("Failed to parse date {}: {}", value, e)))
}

/// The single row of an `INSERT .. RETURNING`. The statement is read to
/// completion with `fetch_all` so the write is committed before we return.
fn returned_row<'a>(rows: &'a [SqliteRow], what: &str) -> Result<&'a SqliteRow> {
    rows.first()
        .ok_or_else(|| Error::Database(format!("Storing the {} returned no row", what)))
}

fn article_from_row(row: &SqliteRow) -> Result<StoredArticle> {
    let authors: String = row.get("authors");
    let published_at: Option<String> = row.get("published_at");
    Ok(StoredArticle {
        id: parse_uuid(row.get("id"))?,
        article: Article {
            title: row.get("title"),
            content: row.get("content"),
            source: row.get("source"),
            url: row.get::<Option<String>, _>("url").unwrap_or_default(),
            published_at: published_at.as_deref().map(parse_time).transpose()?,
            sentiment: row.get("sentiment"),
            authors: serde_json::from_str(&authors)?,
            image: row.get("image"),
            relevance_score: None,
        },
        created_at: parse_time(row.get("created_at"))?,
    })
}

fn summary_from_row(row: &SqliteRow) -> Result<StoredSummary> {
    Ok(StoredSummary {
        id: parse_uuid(row.get("id"))?,
        article_id: parse_uuid(row.get("article_id"))?,
        summary_text: row.get("summary_text"),
        relevance_score: row.get::<Option<f64>, _>("relevance_score").map(|s| s as f32),
        created_at: parse_time(row.get("created_at"))?,
    })
}

#[async_trait]
impl ArticleStorage for SQLiteStorage {
    async fn store_article(&self, article: &Article) -> Result<StoredArticle> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let url = (!article.url.is_empty()).then_some(article.url.as_str());
        let authors = serde_json::to_string(&article.authors)?;

        let rows = sqlx::query(
            r#"
            INSERT INTO articles
            (id, url, title, content, source, published_at, sentiment, authors, image, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                source = excluded.source,
                published_at = excluded.published_at,
                sentiment = excluded.sentiment,
                authors = excluded.authors,
                image = excluded.image,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(id.to_string())
        .bind(url)
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.source)
        .bind(article.published_at.map(|d| d.to_rfc3339()))
        .bind(article.sentiment)
        .bind(authors)
        .bind(article.image.as_deref())
        .bind(&now)
        .bind(&now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to store article"))?;

        returned_row(&rows, "article").and_then(article_from_row)
    }

    async fn store_summary(&self, article_id: Uuid, summary_text: &str, relevance_score: Option<f32>) -> Result<StoredSummary> {
        let rows = sqlx::query(
            r#"
            INSERT INTO summaries (id, article_id, summary_text, relevance_score, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(article_id.to_string())
        .bind(summary_text)
        .bind(relevance_score.map(f64::from))
        .bind(Utc::now().to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                Error::NotFound(format!("article {}", article_id))
            }
            e => Error::Database(format!("Failed to store summary: {}", e)),
        })?;

        returned_row(&rows, "summary").and_then(summary_from_row)
    }

    async fn list_articles(&self, skip: usize, limit: usize) -> Result<Vec<StoredArticle>> {
        let rows = sqlx::query("SELECT * FROM articles ORDER BY rowid DESC LIMIT ? OFFSET ?")
            .bind(limit as i64)
            .bind(skip as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to list articles"))?;

        rows.iter().map(article_from_row).collect()
    }

    async fn get_article(&self, id: Uuid) -> Result<Option<StoredArticle>> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to get article"))?;

        row.as_ref().map(article_from_row).transpose()
    }

    async fn summaries_for(&self, article_id: Uuid) -> Result<Vec<StoredSummary>> {
        let rows = sqlx::query("SELECT * FROM summaries WHERE article_id = ? ORDER BY rowid")
            .bind(article_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to get summaries"))?;

        rows.iter().map(summary_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sqlite_storage() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let storage = SQLiteStorage::connect(db_path.to_str().unwrap()).await.unwrap();

        let mut article = Article::new("Visa rules change", "Body", "The Daily", "http://a");
        article.authors = vec!["Jane Doe".to_string()];
        article.published_at = Some(Utc::now());
        let first = storage.store_article(&article).await.unwrap();
        assert_eq!(first.article.authors, vec!["Jane Doe".to_string()]);

        article.title = "Visa rules change again".to_string();
        let again = storage.store_article(&article).await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.article.title, "Visa rules change again");

        let other = storage.store_article(&Article::new("Other", "Body", "S", "http://b")).await.unwrap();
        let listed = storage.list_articles(0, 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, other.id);

        let summary = storage.store_summary(first.id, "Short summary", Some(8.0)).await.unwrap();
        assert_eq!(summary.article_id, first.id);
        let summaries = storage.summaries_for(first.id).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].summary_text, "Short summary");
        assert_eq!(summaries[0].relevance_score, Some(8.0));

        assert!(storage.get_article(other.id).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sqlite_writes_visible_to_next_read() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("visible.db");
        let storage = SQLiteStorage::connect(db_path.to_str().unwrap()).await.unwrap();

        for i in 0..50 {
            let url = format!("http://example.com/{}", i);
            let stored = storage.store_article(&Article::new("Title", "Body", "S", &url)).await.unwrap();
            assert!(storage.get_article(stored.id).await.unwrap().is_some(), "article {} not visible", i);

            storage.store_summary(stored.id, "summary", None).await.unwrap();
            assert_eq!(storage.summaries_for(stored.id).await.unwrap().len(), 1, "summary {} not visible", i);
        }
        assert_eq!(storage.list_articles(0, 100).await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_sqlite_summary_requires_article() {
        let storage = SQLiteStorage::connect("sqlite::memory:").await.unwrap();
        let err = storage.store_summary(Uuid::new_v4(), "orphan", None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
