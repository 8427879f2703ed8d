use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::models::{
    ApplicationStatus, ConfirmedPosting, FieldKind, PostingId, PostingRecord, PostingSource, Snapshot,
    SuggestionEntry,
};
use crate::suggest::{PLACEHOLDER_COMPANY, PLACEHOLDER_TITLE};

/// Where confirmed postings go. The engine only ever writes through `persist`.
pub trait PostingStore {
    fn persist(&self, posting: &ConfirmedPosting, snapshot: Option<&Snapshot>) -> Result<PostingId>;

    /// Every confirmed company and title, for seeding the suggestion index.
    fn suggestion_corpus(&self) -> Result<Vec<SuggestionEntry>>;
}

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

const POSTING_COLUMNS: &str = "p.id, p.company_name, p.job_title, p.location, p.description, p.job_url,
     p.source, p.external_id, p.status, p.notes, p.applied_at, p.created_at, p.updated_at,
     EXISTS(SELECT 1 FROM posting_snapshots s WHERE s.posting_id = p.id)";

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Fresh, initialized database that lives only as long as the value.
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_path() -> PathBuf {
        match directories::ProjectDirs::from("", "", "jobclip") {
            Some(dirs) => dirs.data_dir().join("jobclip.db"),
            None => PathBuf::from("jobclip.db"),
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS postings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_name TEXT NOT NULL,
                job_title TEXT NOT NULL,
                location TEXT,
                description TEXT,
                job_url TEXT NOT NULL,
                source TEXT NOT NULL CHECK (source IN ('linkedin', 'glassdoor', 'indeed', 'unknown')),
                external_id TEXT,
                status TEXT NOT NULL DEFAULT 'applied' CHECK (status IN ('applied', 'interview', 'rejected', 'offer')),
                notes TEXT,
                applied_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS posting_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                posting_id INTEGER NOT NULL UNIQUE REFERENCES postings(id),
                html TEXT NOT NULL,
                final_url TEXT NOT NULL,
                captured_at TEXT NOT NULL
            );

            CREATE TRIGGER IF NOT EXISTS posting_snapshots_write_once
            BEFORE UPDATE ON posting_snapshots
            BEGIN
                SELECT RAISE(ABORT, 'snapshots are write-once');
            END;

            CREATE INDEX IF NOT EXISTS idx_postings_status ON postings(status);
            CREATE INDEX IF NOT EXISTS idx_postings_source ON postings(source);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='postings'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Database not initialized. Run 'jobclip init' first."));
        }
        Ok(())
    }

    pub fn list_postings(
        &self,
        status: Option<ApplicationStatus>,
        source: Option<PostingSource>,
    ) -> Result<Vec<PostingRecord>> {
        let mut sql = format!("SELECT {} FROM postings p WHERE 1=1", POSTING_COLUMNS);
        let mut params: Vec<&'static str> = vec![];

        if let Some(s) = status {
            params.push(s.as_str());
            sql.push_str(&format!(" AND p.status = ?{}", params.len()));
        }
        if let Some(s) = source {
            params.push(s.as_str());
            sql.push_str(&format!(" AND p.source = ?{}", params.len()));
        }
        sql.push_str(" ORDER BY p.applied_at DESC, p.id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), Self::row_to_record)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list postings")
    }

    pub fn get_posting(&self, id: PostingId) -> Result<Option<PostingRecord>> {
        let sql = format!("SELECT {} FROM postings p WHERE p.id = ?1", POSTING_COLUMNS);
        self.conn
            .query_row(&sql, [id.0], Self::row_to_record)
            .optional()
            .with_context(|| format!("Failed to load posting #{}", id))
    }

    pub fn get_snapshot(&self, id: PostingId) -> Result<Option<Snapshot>> {
        self.conn
            .query_row(
                "SELECT html, final_url, captured_at FROM posting_snapshots WHERE posting_id = ?1",
                [id.0],
                |row| {
                    Ok(Snapshot {
                        html: row.get(0)?,
                        final_url: row.get(1)?,
                        captured_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("Failed to load snapshot for posting #{}", id))
    }

    /// Returns false when no such posting exists.
    pub fn set_status(&self, id: PostingId, status: ApplicationStatus) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE postings SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now(), id.0],
        )?;
        Ok(changed > 0)
    }

    /// Removes a posting together with its snapshot. Returns false when absent.
    pub fn delete_posting(&self, id: PostingId) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM posting_snapshots WHERE posting_id = ?1", [id.0])?;
        let removed = tx.execute("DELETE FROM postings WHERE id = ?1", [id.0])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<PostingRecord> {
        Ok(PostingRecord {
            id: PostingId(row.get(0)?),
            posting: ConfirmedPosting {
                company_name: row.get(1)?,
                job_title: row.get(2)?,
                location: row.get(3)?,
                description: row.get(4)?,
                job_url: row.get(5)?,
                source: parse_column(row, 6)?,
                external_id: row.get(7)?,
                status: parse_column(row, 8)?,
                notes: row.get(9)?,
                applied_at: row.get(10)?,
                created_at: row.get(11)?,
                updated_at: row.get(12)?,
            },
            has_snapshot: row.get(13)?,
        })
    }
}

fn parse_column<T: FromStr<Err = String>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

impl PostingStore for Database {
    fn persist(&self, posting: &ConfirmedPosting, snapshot: Option<&Snapshot>) -> Result<PostingId> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO postings (company_name, job_title, location, description, job_url, source,
                                   external_id, status, notes, applied_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                posting.company_name,
                posting.job_title,
                posting.location,
                posting.description,
                posting.job_url,
                posting.source.as_str(),
                posting.external_id,
                posting.status.as_str(),
                posting.notes,
                posting.applied_at,
                posting.created_at,
                posting.updated_at,
            ],
        )
        .context("Failed to insert posting")?;
        let id = tx.last_insert_rowid();

        if let Some(snapshot) = snapshot {
            tx.execute(
                "INSERT INTO posting_snapshots (posting_id, html, final_url, captured_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, snapshot.html, snapshot.final_url, snapshot.captured_at],
            )
            .context("Failed to store snapshot")?;
        }
        tx.commit()?;

        debug!(id, snapshot = snapshot.is_some(), "posting stored");
        Ok(PostingId(id))
    }

    fn suggestion_corpus(&self) -> Result<Vec<SuggestionEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT company_name, job_title, MAX(applied_at, updated_at) FROM postings",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, DateTime<Utc>>(2)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (company, title, used_at) = row.context("Failed to read suggestion corpus")?;
            if company != PLACEHOLDER_COMPANY {
                entries.push(SuggestionEntry {
                    kind: FieldKind::Company,
                    value: company,
                    used_at,
                });
            }
            if title != PLACEHOLDER_TITLE {
                entries.push(SuggestionEntry {
                    kind: FieldKind::Title,
                    value: title,
                    used_at,
                });
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn posting(company: &str, title: &str, source: PostingSource) -> ConfirmedPosting {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        ConfirmedPosting {
            company_name: company.to_string(),
            job_title: title.to_string(),
            location: Some("Toronto, ON".to_string()),
            description: Some("Build things.".to_string()),
            job_url: "https://www.linkedin.com/jobs/view/123456789/".to_string(),
            source,
            external_id: Some("123456789".to_string()),
            status: ApplicationStatus::Applied,
            notes: None,
            applied_at: at,
            created_at: at,
            updated_at: at,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            html: "<html><h1>Senior Backend Engineer</h1></html>".to_string(),
            final_url: "https://www.linkedin.com/jobs/view/123456789/".to_string(),
            captured_at: Utc.with_ymd_and_hms(2026, 3, 1, 11, 59, 0).unwrap(),
        }
    }

    #[test]
    fn test_persist_round_trips_posting_and_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let original = posting("Acme Corp", "Senior Backend Engineer", PostingSource::LinkedIn);
        let id = db.persist(&original, Some(&snapshot())).unwrap();

        let record = db.get_posting(id).unwrap().unwrap();
        assert_eq!(record.posting, original);
        assert!(record.has_snapshot);
        assert_eq!(db.get_snapshot(id).unwrap(), Some(snapshot()));
    }

    #[test]
    fn test_manual_posting_has_no_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .persist(&posting("Initech", "Analyst", PostingSource::Unknown), None)
            .unwrap();
        assert!(!db.get_posting(id).unwrap().unwrap().has_snapshot);
        assert_eq!(db.get_snapshot(id).unwrap(), None);
    }

    #[test]
    fn test_snapshots_are_write_once() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .persist(&posting("Acme Corp", "Engineer", PostingSource::LinkedIn), Some(&snapshot()))
            .unwrap();
        let update = db.conn.execute(
            "UPDATE posting_snapshots SET html = 'tampered' WHERE posting_id = ?1",
            [id.0],
        );
        assert!(update.is_err());
        assert_eq!(db.get_snapshot(id).unwrap().unwrap().html, snapshot().html);
    }

    #[test]
    fn test_list_filters_by_status_and_source() {
        let db = Database::open_in_memory().unwrap();
        let a = db.persist(&posting("Acme", "Engineer", PostingSource::LinkedIn), None).unwrap();
        db.persist(&posting("Hooli", "Engineer", PostingSource::Indeed), None).unwrap();
        assert!(db.set_status(a, ApplicationStatus::Interview).unwrap());

        assert_eq!(db.list_postings(None, None).unwrap().len(), 2);
        let interviews = db.list_postings(Some(ApplicationStatus::Interview), None).unwrap();
        assert_eq!(interviews.len(), 1);
        assert_eq!(interviews[0].id, a);
        let indeed = db.list_postings(None, Some(PostingSource::Indeed)).unwrap();
        assert_eq!(indeed[0].posting.company_name, "Hooli");
        assert!(db
            .list_postings(Some(ApplicationStatus::Interview), Some(PostingSource::Indeed))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_delete_removes_snapshot_too() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .persist(&posting("Acme", "Engineer", PostingSource::LinkedIn), Some(&snapshot()))
            .unwrap();
        assert!(db.delete_posting(id).unwrap());
        assert!(db.get_posting(id).unwrap().is_none());
        assert!(db.get_snapshot(id).unwrap().is_none());
        assert!(!db.delete_posting(id).unwrap());
        assert!(!db.set_status(id, ApplicationStatus::Offer).unwrap());
    }

    #[test]
    fn test_corpus_skips_placeholders() {
        let db = Database::open_in_memory().unwrap();
        db.persist(&posting(PLACEHOLDER_COMPANY, "Data Engineer", PostingSource::Unknown), None)
            .unwrap();
        db.persist(&posting("Globex", PLACEHOLDER_TITLE, PostingSource::Unknown), None)
            .unwrap();

        let corpus = db.suggestion_corpus().unwrap();
        let values: Vec<(FieldKind, &str)> = corpus.iter().map(|e| (e.kind, e.value.as_str())).collect();
        assert_eq!(values, vec![(FieldKind::Title, "Data Engineer"), (FieldKind::Company, "Globex")]);
    }

    #[test]
    fn test_uninitialized_database_is_reported() {
        let db = Database {
            conn: Connection::open_in_memory().unwrap(),
            path: PathBuf::from(":memory:"),
        };
        let err = db.ensure_initialized().unwrap_err();
        assert!(err.to_string().contains("jobclip init"));
        db.init().unwrap();
        db.ensure_initialized().unwrap();
    }
}
