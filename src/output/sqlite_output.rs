//! SQLite-based output handler implementation
//!
//! Each run is appended to the database: one `runs` row plus its links,
//! companies and skipped profiles. The `companies_with_email` view is the
//! emails dataset.

use crate::output::traits::{OutputHandler, OutputResult, RunOutput};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// SQL schema for the harvest database
pub const SCHEMA_SQL: &str = r#"
-- One row per harvest run
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    portal TEXT NOT NULL,
    sector TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    pages_scraped INTEGER NOT NULL,
    lost_pages TEXT NOT NULL,
    stop_reason TEXT,
    links_collected INTEGER NOT NULL,
    profiles_found INTEGER NOT NULL,
    profiles_with_email INTEGER NOT NULL,
    skipped INTEGER NOT NULL,
    config_hash TEXT
);

-- Profile links in discovery order
CREATE TABLE IF NOT EXISTS profile_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    normalized_url TEXT NOT NULL,
    page INTEGER NOT NULL,
    UNIQUE(run_id, normalized_url)
);

-- Harvested company records
CREATE TABLE IF NOT EXISTS companies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    profile_url TEXT NOT NULL,
    name TEXT,
    country TEXT,
    address TEXT,
    website TEXT,
    email TEXT,
    email_source TEXT NOT NULL,
    all_emails TEXT NOT NULL,
    UNIQUE(run_id, profile_url)
);

CREATE INDEX IF NOT EXISTS idx_companies_run ON companies(run_id);
CREATE INDEX IF NOT EXISTS idx_companies_email ON companies(email);

-- Profiles that could not be fetched
CREATE TABLE IF NOT EXISTS skipped_profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    reason TEXT NOT NULL
);

CREATE VIEW IF NOT EXISTS companies_with_email AS
    SELECT run_id, name, email, country, website, profile_url
    FROM companies
    WHERE email IS NOT NULL;
"#;

/// SQLite-based output handler
pub struct SqliteOutputHandler {
    conn: Mutex<Connection>,
}

impl SqliteOutputHandler {
    /// Opens or creates the database at `path` and ensures the schema exists
    pub fn open(path: &Path) -> OutputResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> OutputResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> OutputResult<Self> {
        conn.execute_batch(
            "
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn insert_run(&self, run: &RunOutput<'_>) -> OutputResult<i64> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = conn.transaction()?;
        let summary = run.summary;

        let lost_pages = summary
            .lost_pages
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");

        tx.execute(
            "INSERT INTO runs (portal, sector, started_at, finished_at, pages_scraped, lost_pages,
                               stop_reason, links_collected, profiles_found, profiles_with_email,
                               skipped, config_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                summary.portal,
                summary.sector,
                summary.started_at.to_rfc3339(),
                summary.finished_at.to_rfc3339(),
                summary.pages_scraped,
                lost_pages,
                summary.stop_reason.map(|r| r.as_str()),
                summary.links_collected as i64,
                summary.profiles_found as i64,
                summary.profiles_with_email as i64,
                summary.skipped as i64,
                summary.config_hash,
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO profile_links (run_id, url, normalized_url, page)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for link in run.links {
                stmt.execute(params![run_id, link.url, link.key, link.page])?;
            }

            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO companies (run_id, profile_url, name, country, address,
                                                  website, email, email_source, all_emails)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for record in run.records {
                stmt.execute(params![
                    run_id,
                    record.profile_url,
                    record.name,
                    record.country,
                    record.address,
                    record.website,
                    record.email,
                    record.email_source.as_str(),
                    record.all_emails.join(";"),
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO skipped_profiles (run_id, url, reason) VALUES (?1, ?2, ?3)",
            )?;
            for skipped in run.skipped {
                stmt.execute(params![run_id, skipped.url, skipped.reason])?;
            }
        }

        tx.commit()?;
        Ok(run_id)
    }
}

impl OutputHandler for SqliteOutputHandler {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn write_run(&self, run: &RunOutput<'_>) -> OutputResult<()> {
        let run_id = self.insert_run(run)?;
        debug!(
            "Stored run {} with {} links and {} companies",
            run_id,
            run.links.len(),
            run.records.len()
        );
        Ok(())
    }
}
