//! Document store backed by SQLite.
//!
//! Each lead collection is a table holding one JSON document per row plus
//! the two server-assigned columns (`id`, `created_at`). Duplicate
//! prevention lives here as unique indexes over `json_extract` expressions,
//! so concurrent identical submissions resolve to exactly one insert and
//! one constraint violation.

use chrono::{SecondsFormat, Utc};
use mobc::{Manager, Pool};
use rusqlite::{params, Connection, Result as SqliteResult};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;

/// Closed set of collection names. The admin-delete handler refuses any
/// name outside this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    NewsletterSubscriptions,
    ContactMessages,
    AiAssessmentLeads,
    RoiCalculatorLeads,
    ConsultationLeads,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::NewsletterSubscriptions,
        Collection::ContactMessages,
        Collection::AiAssessmentLeads,
        Collection::RoiCalculatorLeads,
        Collection::ConsultationLeads,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::NewsletterSubscriptions => "newsletter_subscriptions",
            Collection::ContactMessages => "contact_messages",
            Collection::AiAssessmentLeads => "ai_assessment_leads",
            Collection::RoiCalculatorLeads => "roi_calculator_leads",
            Collection::ConsultationLeads => "consultation_leads",
        }
    }

    pub fn from_name(name: &str) -> Option<Collection> {
        Collection::ALL
            .into_iter()
            .find(|collection| collection.as_str() == name)
    }
}

/// Server timestamp in the wire format used everywhere: ISO-8601 UTC with
/// millisecond precision and a trailing `Z`.
pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct SqliteManager {
    db_path: String,
}

impl SqliteManager {
    pub fn new(db_path: String) -> Self {
        debug!("creating SqliteManager for path: {}", db_path);
        Self { db_path }
    }
}

#[async_trait::async_trait]
impl Manager for SqliteManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let conn = Connection::open(&self.db_path)?;

        // Some PRAGMAs return a result row; query_row swallows it.
        let exec_pragma = |conn: &Connection, pragma: &str| -> Result<(), rusqlite::Error> {
            match conn.execute(pragma, []) {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::ExecuteReturnedResults) => {
                    conn.query_row(pragma, [], |_| Ok(()))
                }
                Err(e) => Err(e),
            }
        };

        exec_pragma(&conn, "PRAGMA journal_mode=WAL")?;
        exec_pragma(&conn, "PRAGMA synchronous=NORMAL")?;
        exec_pragma(&conn, "PRAGMA foreign_keys=ON")?;
        exec_pragma(&conn, "PRAGMA busy_timeout=5000")?;

        init_schema(&conn)?;
        Ok(conn)
    }

    async fn check(&self, conn: Self::Connection) -> Result<Self::Connection, Self::Error> {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(conn)
    }
}

fn init_schema(conn: &Connection) -> SqliteResult<()> {
    for collection in Collection::ALL {
        let table = collection.as_str();
        conn.execute(
            &format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    created_at TEXT NOT NULL,
                    document TEXT NOT NULL
                )
                "#
            ),
            [],
        )?;
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_created_at \
                 ON {table}(created_at DESC)"
            ),
            [],
        )?;
    }

    create_unique_indexes(conn)?;
    Ok(())
}

fn create_unique_indexes(conn: &Connection) -> SqliteResult<()> {
    // One active subscription per address. Emails are lowercased by the
    // handler before insert and lookup.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_newsletter_subscriptions_email \
         ON newsletter_subscriptions(json_extract(document, '$.email'))",
        [],
    )?;

    // One pending booking per (email, date, time) slot. The consultation
    // handler normalizes absent date/time to empty strings so undated
    // bookings are covered too.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_consultation_leads_pending_slot \
         ON consultation_leads(\
             json_extract(document, '$.email'), \
             json_extract(document, '$.preferred_date'), \
             json_extract(document, '$.preferred_time')\
         ) WHERE json_extract(document, '$.status') = 'pending'",
        [],
    )?;

    Ok(())
}

pub type DbPool = Pool<SqliteManager>;

pub async fn create_db_pool(db_path: &Path) -> Result<DbPool, StoreError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Sqlite(rusqlite::Error::InvalidPath(e.to_string().into())))?;
        }
    }

    let manager = SqliteManager::new(db_path.to_string_lossy().into_owned());
    let pool = Pool::builder().max_open(10).max_idle(5).build(manager);

    info!("✓ SQLite connection pool created: {}", db_path.display());
    Ok(pool)
}

/// Typed operations over the collections. Safe for concurrent use; all
/// state lives in the pool.
#[derive(Clone)]
pub struct Store {
    pool: DbPool,
}

impl Store {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Startup probe; surfaces pool/auth failures before the server binds.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let conn = self.pool.get().await?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// Persists a document, assigning `id` and `created_at` server-side.
    /// Returns the stored document. A unique-index rejection surfaces as
    /// `StoreError::Duplicate`.
    pub async fn insert(
        &self,
        collection: Collection,
        mut document: Map<String, Value>,
    ) -> Result<Value, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = now_utc_string();
        document.insert("id".to_string(), Value::String(id.clone()));
        document.insert("created_at".to_string(), Value::String(created_at.clone()));

        let body = serde_json::to_string(&Value::Object(document.clone()))?;
        let conn = self.pool.get().await?;
        conn.execute(
            &format!(
                "INSERT INTO {} (id, created_at, document) VALUES (?1, ?2, ?3)",
                collection.as_str()
            ),
            params![id, created_at, body],
        )?;

        debug!("inserted document {} into {}", id, collection.as_str());
        Ok(Value::Object(document))
    }

    /// Looks a document up by one of its fields. `field` is matched inside
    /// the stored JSON except for `id`, which hits the primary key.
    pub async fn find_one(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Option<Value>, StoreError> {
        let conn = self.pool.get().await?;
        let found: Option<String> = if field == "id" {
            conn.query_row(
                &format!(
                    "SELECT document FROM {} WHERE id = ?1 LIMIT 1",
                    collection.as_str()
                ),
                params![value],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(ignore_no_rows)?
        } else {
            conn.query_row(
                &format!(
                    "SELECT document FROM {} \
                     WHERE json_extract(document, ?1) = ?2 LIMIT 1",
                    collection.as_str()
                ),
                params![format!("$.{field}"), value],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(ignore_no_rows)?
        };

        match found {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// Ordered, capped listing of a collection's documents.
    pub async fn list(
        &self,
        collection: Collection,
        sort_by: &str,
        descending: bool,
        limit: i64,
    ) -> Result<Vec<Value>, StoreError> {
        let conn = self.pool.get().await?;
        let direction = if descending { "DESC" } else { "ASC" };

        let mut documents = Vec::new();
        if sort_by == "created_at" {
            let mut stmt = conn.prepare(&format!(
                "SELECT document FROM {} ORDER BY created_at {} LIMIT ?1",
                collection.as_str(),
                direction
            ))?;
            let rows = stmt.query_map(params![limit], |row| row.get::<_, String>(0))?;
            for row in rows {
                documents.push(serde_json::from_str(&row?)?);
            }
        } else {
            let mut stmt = conn.prepare(&format!(
                "SELECT document FROM {} \
                 ORDER BY json_extract(document, ?1) {} LIMIT ?2",
                collection.as_str(),
                direction
            ))?;
            let rows = stmt.query_map(params![format!("$.{sort_by}"), limit], |row| {
                row.get::<_, String>(0)
            })?;
            for row in rows {
                documents.push(serde_json::from_str(&row?)?);
            }
        }

        Ok(documents)
    }

    pub async fn count(&self, collection: Collection) -> Result<i64, StoreError> {
        let conn = self.pool.get().await?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", collection.as_str()),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Physically removes one document. Returns the deleted count (0 or 1).
    pub async fn delete_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<usize, StoreError> {
        let conn = self.pool.get().await?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", collection.as_str()),
            params![id],
        )?;
        Ok(deleted)
    }

    /// Physically removes every document in the collection.
    pub async fn delete_all(&self, collection: Collection) -> Result<usize, StoreError> {
        let conn = self.pool.get().await?;
        let deleted = conn.execute(&format!("DELETE FROM {}", collection.as_str()), [])?;
        debug!("cleared {} rows from {}", deleted, collection.as_str());
        Ok(deleted)
    }
}

fn ignore_no_rows<T>(err: rusqlite::Error) -> Result<Option<T>, rusqlite::Error> {
    match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    }
}
