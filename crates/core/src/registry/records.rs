//! Shared parser record storage.
//!
//! Provides bulk upsert, full replacement, and domain-keyed lookup for
//! extraction script records. All multi-row writes run inside a single
//! transaction so readers observe the old or the new registry as a whole,
//! never a partially written one.

use super::connection::RegistryDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A shared extraction script record.
///
/// `id` is the originating script filename and is unique across the
/// registry. `domains` holds the hostnames (or hostname suffixes) the
/// script declared for itself, normalized at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserRecord {
    pub id: String,
    pub domains: Vec<String>,
    pub script: String,
}

impl ParserRecord {
    /// Build a record, normalizing the declared domains.
    ///
    /// Domains are lowercased and trimmed; duplicates and entries that are
    /// not plain hostnames (anything with a scheme, path separator, or
    /// whitespace) are dropped. The result is sorted so two records with
    /// the same domain set always compare equal.
    pub fn new(
        id: impl Into<String>,
        domains: impl IntoIterator<Item = String>,
        script: impl Into<String>,
    ) -> Self {
        let mut normalized: Vec<String> =
            domains.into_iter().filter_map(|d| normalize_domain(&d)).collect();
        normalized.sort();
        normalized.dedup();
        Self { id: id.into(), domains: normalized, script: script.into() }
    }
}

/// Result of a bulk upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Records inserted or rewritten.
    pub changed: usize,
    /// Records skipped because script and domains were already current.
    pub unchanged: usize,
}

/// Normalize one declared domain, or reject it.
fn normalize_domain(raw: &str) -> Option<String> {
    let domain = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return None;
    }
    if domain.chars().any(|c| c == '/' || c == ':' || c.is_whitespace()) {
        return None;
    }
    Some(domain)
}

/// Fingerprint a script body for cheap change detection.
fn script_fingerprint(script: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(script.as_bytes());
    hex::encode(hasher.finalize())
}

/// Row data prepared outside the connection closure.
struct PreparedRow {
    id: String,
    script: String,
    fingerprint: String,
    domains_json: String,
    domains: Vec<String>,
}

fn prepare_rows(records: &[ParserRecord]) -> Result<Vec<PreparedRow>, Error> {
    records
        .iter()
        .map(|record| {
            let domains_json = serde_json::to_string(&record.domains)
                .map_err(|e| Error::InvalidInput(e.to_string()))?;
            Ok(PreparedRow {
                id: record.id.clone(),
                script: record.script.clone(),
                fingerprint: script_fingerprint(&record.script),
                domains_json,
                domains: record.domains.clone(),
            })
        })
        .collect()
}

fn insert_row(
    tx: &rusqlite::Transaction<'_>,
    row: &PreparedRow,
    now: &str,
) -> Result<(), rusqlite::Error> {
    tx.execute(
        "INSERT INTO parsers (id, script, script_sha256, domains_json, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            script = excluded.script,
            script_sha256 = excluded.script_sha256,
            domains_json = excluded.domains_json,
            updated_at = excluded.updated_at",
        params![row.id, row.script, row.fingerprint, row.domains_json, now],
    )?;
    tx.execute("DELETE FROM parser_domains WHERE parser_id = ?1", params![row.id])?;
    for domain in &row.domains {
        tx.execute(
            "INSERT OR IGNORE INTO parser_domains (domain, parser_id) VALUES (?1, ?2)",
            params![domain, row.id],
        )?;
    }
    Ok(())
}

fn record_from_row(row: &rusqlite::Row<'_>) -> Result<(String, String, String), rusqlite::Error> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode_record(id: String, script: String, domains_json: &str) -> Result<ParserRecord, Error> {
    let domains: Vec<String> = serde_json::from_str(domains_json)
        .map_err(|e| Error::MalformedRecord(format!("{id}: {e}")))?;
    Ok(ParserRecord { id, domains, script })
}

impl RegistryDb {
    /// Merge a batch of records into the registry by id.
    ///
    /// Records whose script fingerprint and domain set already match the
    /// stored row are skipped, so re-applying the same batch is a no-op.
    /// The whole batch commits in one transaction.
    pub async fn upsert_parsers(&self, records: &[ParserRecord]) -> Result<UpsertOutcome, Error> {
        let rows = prepare_rows(records)?;
        self.conn
            .call(move |conn| -> Result<UpsertOutcome, Error> {
                let tx = conn.transaction()?;
                let now = chrono::Utc::now().to_rfc3339();
                let mut changed = 0usize;
                let mut unchanged = 0usize;

                for row in &rows {
                    let existing = match tx.query_row(
                        "SELECT script_sha256, domains_json FROM parsers WHERE id = ?1",
                        params![row.id],
                        |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
                    ) {
                        Ok(v) => Some(v),
                        Err(rusqlite::Error::QueryReturnedNoRows) => None,
                        Err(e) => return Err(e.into()),
                    };

                    if let Some((fingerprint, domains_json)) = existing
                        && fingerprint == row.fingerprint
                        && domains_json == row.domains_json
                    {
                        unchanged += 1;
                        continue;
                    }

                    insert_row(&tx, row, &now)?;
                    changed += 1;
                }

                tx.commit()?;
                Ok(UpsertOutcome { changed, unchanged })
            })
            .await
            .map_err(Error::from)
    }

    /// Replace the entire registry with the given records.
    ///
    /// Delete-all plus insert-all inside one transaction; concurrent
    /// readers see the old snapshot or the new one, never an empty
    /// intermediate state. Returns the number of records written.
    pub async fn replace_parsers(&self, records: &[ParserRecord]) -> Result<usize, Error> {
        let rows = prepare_rows(records)?;
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                let now = chrono::Utc::now().to_rfc3339();

                tx.execute("DELETE FROM parsers", [])?;
                for row in &rows {
                    insert_row(&tx, row, &now)?;
                }

                let written = rows.len();
                tx.commit()?;
                Ok(written)
            })
            .await
            .map_err(Error::from)
    }

    /// Get a record by id.
    ///
    /// Returns None if the id doesn't exist in the registry.
    pub async fn parser(&self, id: &str) -> Result<Option<ParserRecord>, Error> {
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ParserRecord>, Error> {
                let result = conn.query_row(
                    "SELECT id, script, domains_json FROM parsers WHERE id = ?1",
                    params![id],
                    record_from_row,
                );

                match result {
                    Ok((id, script, domains_json)) => {
                        Ok(Some(decode_record(id, script, &domains_json)?))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Get every record declaring the given domain, ordered by id.
    ///
    /// The ordering makes resolution deterministic when several records
    /// declare the same domain: callers take the first.
    pub async fn parsers_for_domain(&self, domain: &str) -> Result<Vec<ParserRecord>, Error> {
        let domain = domain.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<ParserRecord>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT p.id, p.script, p.domains_json
                     FROM parsers p
                     JOIN parser_domains d ON d.parser_id = p.id
                     WHERE d.domain = ?1
                     ORDER BY p.id ASC",
                )?;

                let rows = stmt.query_map(params![domain], record_from_row)?;
                let mut records = Vec::new();
                for row in rows {
                    let (id, script, domains_json) = row?;
                    records.push(decode_record(id, script, &domains_json)?);
                }
                Ok(records)
            })
            .await
            .map_err(Error::from)
    }

    /// Enumerate all records, ordered by id.
    pub async fn all_parsers(&self) -> Result<Vec<ParserRecord>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<ParserRecord>, Error> {
                let mut stmt =
                    conn.prepare("SELECT id, script, domains_json FROM parsers ORDER BY id ASC")?;
                let rows = stmt.query_map([], record_from_row)?;
                let mut records = Vec::new();
                for row in rows {
                    let (id, script, domains_json) = row?;
                    records.push(decode_record(id, script, &domains_json)?);
                }
                Ok(records)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of shared records in the registry.
    pub async fn parser_count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM parsers", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete all shared records.
    ///
    /// Returns the number of deleted records. Domain rows go with them
    /// via ON DELETE CASCADE. Per-user overrides are untouched.
    pub async fn clear_parsers(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM parsers", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_record(id: &str, domains: &[&str]) -> ParserRecord {
        ParserRecord::new(
            id,
            domains.iter().map(|d| d.to_string()),
            format!("parserFactory.register([\"{}\"], class {{}});", domains.join("\",\"")),
        )
    }

    #[test]
    fn test_domain_normalization() {
        let record = ParserRecord::new(
            "Example.js",
            vec![
                "Example.COM".to_string(),
                "example.com".to_string(),
                "  spaced.net ".to_string(),
                "https://url.com".to_string(),
                "bad domain".to_string(),
                String::new(),
                "trailing.dot.org.".to_string(),
            ],
            "",
        );
        assert_eq!(record.domains, vec!["example.com", "spaced.net", "trailing.dot.org"]);
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = RegistryDb::open_in_memory().await.unwrap();
        let record = make_test_record("RoyalRoad.js", &["royalroad.com"]);

        let outcome = db.upsert_parsers(std::slice::from_ref(&record)).await.unwrap();
        assert_eq!(outcome.changed, 1);
        assert_eq!(outcome.unchanged, 0);

        let stored = db.parser("RoyalRoad.js").await.unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = RegistryDb::open_in_memory().await.unwrap();
        let result = db.parser("Nonexistent.js").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_upsert_idempotent() {
        let db = RegistryDb::open_in_memory().await.unwrap();
        let records = vec![
            make_test_record("A.js", &["a.com"]),
            make_test_record("B.js", &["b.com", "b.net"]),
        ];

        let first = db.upsert_parsers(&records).await.unwrap();
        assert_eq!(first.changed, 2);

        let second = db.upsert_parsers(&records).await.unwrap();
        assert_eq!(second.changed, 0);
        assert_eq!(second.unchanged, 2);
        assert_eq!(db.parser_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_rewrites_changed_domains() {
        let db = RegistryDb::open_in_memory().await.unwrap();
        db.upsert_parsers(&[make_test_record("A.js", &["old.com"])]).await.unwrap();

        let outcome = db.upsert_parsers(&[make_test_record("A.js", &["new.com"])]).await.unwrap();
        assert_eq!(outcome.changed, 1);

        assert!(db.parsers_for_domain("old.com").await.unwrap().is_empty());
        let found = db.parsers_for_domain("new.com").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "A.js");
        assert_eq!(db.parser_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_removes_stale_records() {
        let db = RegistryDb::open_in_memory().await.unwrap();
        db.upsert_parsers(&[
            make_test_record("A.js", &["a.com"]),
            make_test_record("B.js", &["b.com"]),
        ])
        .await
        .unwrap();

        let written = db.replace_parsers(&[make_test_record("C.js", &["c.com"])]).await.unwrap();
        assert_eq!(written, 1);

        assert_eq!(db.parser_count().await.unwrap(), 1);
        assert!(db.parser("A.js").await.unwrap().is_none());
        assert!(db.parsers_for_domain("b.com").await.unwrap().is_empty());
        assert_eq!(db.parsers_for_domain("c.com").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_domain_lookup_ordered_by_id() {
        let db = RegistryDb::open_in_memory().await.unwrap();
        db.upsert_parsers(&[
            make_test_record("Zeta.js", &["shared.com"]),
            make_test_record("Alpha.js", &["shared.com"]),
        ])
        .await
        .unwrap();

        let found = db.parsers_for_domain("shared.com").await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, "Alpha.js");
        assert_eq!(found[1].id, "Zeta.js");
    }

    #[tokio::test]
    async fn test_clear() {
        let db = RegistryDb::open_in_memory().await.unwrap();
        db.upsert_parsers(&[
            make_test_record("A.js", &["a.com"]),
            make_test_record("B.js", &["b.com"]),
        ])
        .await
        .unwrap();

        let deleted = db.clear_parsers().await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(db.parser_count().await.unwrap(), 0);
        assert!(db.parsers_for_domain("a.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_parsers_sorted() {
        let db = RegistryDb::open_in_memory().await.unwrap();
        db.upsert_parsers(&[
            make_test_record("B.js", &["b.com"]),
            make_test_record("A.js", &["a.com"]),
        ])
        .await
        .unwrap();

        let all = db.all_parsers().await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["A.js", "B.js"]);
    }
}
