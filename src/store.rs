use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};
use tracing::debug;

use crate::config::StorageConfig;
use crate::models::Listing;

/// Durable keyed record of every listing ever ingested.
///
/// Each operation is atomic on its own; the pipeline never needs a
/// cross-listing transaction.
pub trait JobStore {
    /// True iff a listing with this id has ever been inserted.
    fn exists(&self, id: &str) -> Result<bool>;
    /// Insert if absent. Inserting an id that already exists is a no-op and
    /// leaves the stored row untouched.
    fn insert(&self, listing: &Listing) -> Result<()>;
    /// Flip `notified` to true. Unknown or already-notified ids are a no-op.
    fn mark_notified(&self, id: &str) -> Result<()>;
    /// Every stored listing, most recently discovered first.
    fn all(&self) -> Result<Vec<Listing>>;
    fn count(&self) -> Result<u64>;
}

/// Select a store backend from configuration.
pub fn open_store(config: &StorageConfig) -> Result<Box<dyn JobStore>> {
    match config {
        StorageConfig::Sqlite { path } => Ok(Box::new(SqliteStore::open(path)?)),
        StorageConfig::Dynamo { table_name, region } => {
            Ok(Box::new(DynamoStore::new(table_name, region)?))
        }
    }
}

pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let store = Self { path };
        store.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT,
                url TEXT NOT NULL,
                description TEXT,
                posted_at TEXT,
                salary_min REAL,
                salary_max REAL,
                first_seen TEXT NOT NULL DEFAULT (datetime('now')),
                notified INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )?;
        Ok(store)
    }

    // One connection per logical operation; nothing holds the file open
    // between calls.
    fn conn(&self) -> Result<Connection> {
        Connection::open(&self.path)
            .with_context(|| format!("Failed to open database at {}", self.path.display()))
    }

    fn row_to_listing(row: &rusqlite::Row) -> rusqlite::Result<Listing> {
        Ok(Listing {
            id: row.get(0)?,
            title: row.get(1)?,
            company: row.get(2)?,
            location: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            url: row.get(4)?,
            description: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            posted_at: row.get(6)?,
            salary_min: row.get(7)?,
            salary_max: row.get(8)?,
            first_seen: row.get(9)?,
            notified: row.get(10)?,
        })
    }
}

impl JobStore for SqliteStore {
    fn exists(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let result = conn.query_row("SELECT 1 FROM jobs WHERE id = ?1", [id], |_row| Ok(()));
        match result {
            Ok(()) => Ok(true),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn insert(&self, listing: &Listing) -> Result<()> {
        // Upsert-with-ignore keeps a racing duplicate insert from surfacing as
        // a constraint violation; the existing row (first_seen, notified)
        // stays untouched.
        self.conn()?.execute(
            "INSERT OR IGNORE INTO jobs
             (id, title, company, location, url, description, posted_at,
              salary_min, salary_max, first_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                     COALESCE(?10, datetime('now')))",
            params![
                listing.id,
                listing.title,
                listing.company,
                listing.location,
                listing.url,
                listing.description,
                listing.posted_at,
                listing.salary_min,
                listing.salary_max,
                listing.first_seen,
            ],
        )?;
        Ok(())
    }

    fn mark_notified(&self, id: &str) -> Result<()> {
        let updated = self
            .conn()?
            .execute("UPDATE jobs SET notified = 1 WHERE id = ?1", [id])?;
        if updated == 0 {
            debug!(%id, "mark_notified for unknown listing");
        }
        Ok(())
    }

    fn all(&self) -> Result<Vec<Listing>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, company, location, url, description, posted_at,
                    salary_min, salary_max, first_seen, notified
             FROM jobs
             ORDER BY first_seen DESC",
        )?;
        let rows = stmt.query_map([], Self::row_to_listing)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to load listings")
    }

    fn count(&self) -> Result<u64> {
        let count: i64 =
            self.conn()?
                .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Hosted key-value backend behind the same contract as [`SqliteStore`].
///
/// The real implementation lands here when the tracker moves onto managed
/// infrastructure; until then selecting it fails fast at startup.
#[derive(Debug)]
pub struct DynamoStore {
    #[allow(dead_code)]
    table_name: String,
    #[allow(dead_code)]
    region: String,
}

impl DynamoStore {
    pub fn new(table_name: &str, region: &str) -> Result<Self> {
        bail!(
            "DynamoDB storage is not implemented yet (table '{}', region '{}'); \
             set DB_TYPE=sqlite",
            table_name,
            region
        )
    }
}

impl JobStore for DynamoStore {
    fn exists(&self, _id: &str) -> Result<bool> {
        bail!("DynamoDB storage is not implemented yet")
    }

    fn insert(&self, _listing: &Listing) -> Result<()> {
        bail!("DynamoDB storage is not implemented yet")
    }

    fn mark_notified(&self, _id: &str) -> Result<()> {
        bail!("DynamoDB storage is not implemented yet")
    }

    fn all(&self) -> Result<Vec<Listing>> {
        bail!("DynamoDB storage is not implemented yet")
    }

    fn count(&self) -> Result<u64> {
        bail!("DynamoDB storage is not implemented yet")
    }
}
