//! Per-user parser overrides.
//!
//! An override binds a script to a (owner, hostname) pair. During
//! resolution an override shadows any shared record for that owner;
//! other users never see it.

use super::connection::RegistryDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

/// A per-user override record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomParserRecord {
    pub owner_id: i64,
    /// Lowercased hostname the override applies to.
    pub target_key: String,
    pub script: String,
    pub updated_at: String,
}

/// Extract the override key (hostname) from a submitted URL.
fn hostname_key(target_url: &str) -> Result<String, Error> {
    let parsed =
        Url::parse(target_url).map_err(|e| Error::InvalidUrl(format!("{target_url}: {e}")))?;
    match parsed.host_str() {
        Some(host) => Ok(host.to_ascii_lowercase()),
        None => Err(Error::InvalidUrl(format!("{target_url}: no hostname"))),
    }
}

impl RegistryDb {
    /// Insert or update an override for the hostname of `target_url`.
    ///
    /// Last write wins. Returns the stored record.
    pub async fn upsert_custom_parser(
        &self,
        owner_id: i64,
        target_url: &str,
        script: &str,
    ) -> Result<CustomParserRecord, Error> {
        let record = CustomParserRecord {
            owner_id,
            target_key: hostname_key(target_url)?,
            script: script.to_string(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        };

        let row = record.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO custom_parsers (owner_id, target_key, script, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(owner_id, target_key) DO UPDATE SET
                        script = excluded.script,
                        updated_at = excluded.updated_at",
                    params![row.owner_id, row.target_key, row.script, row.updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(record)
    }

    /// Get one owner's override for a hostname key.
    ///
    /// Returns None when the owner has no override for that key.
    pub async fn custom_parser(
        &self,
        owner_id: i64,
        target_key: &str,
    ) -> Result<Option<CustomParserRecord>, Error> {
        let target_key = target_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CustomParserRecord>, Error> {
                let result = conn.query_row(
                    "SELECT owner_id, target_key, script, updated_at
                     FROM custom_parsers
                     WHERE owner_id = ?1 AND target_key = ?2",
                    params![owner_id, target_key],
                    |row| {
                        Ok(CustomParserRecord {
                            owner_id: row.get(0)?,
                            target_key: row.get(1)?,
                            script: row.get(2)?,
                            updated_at: row.get(3)?,
                        })
                    },
                );

                match result {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = RegistryDb::open_in_memory().await.unwrap();

        let stored = db
            .upsert_custom_parser(42, "https://Example.COM/novel/1", "// custom")
            .await
            .unwrap();
        assert_eq!(stored.target_key, "example.com");

        let found = db.custom_parser(42, "example.com").await.unwrap().unwrap();
        assert_eq!(found.script, "// custom");
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let db = RegistryDb::open_in_memory().await.unwrap();
        db.upsert_custom_parser(42, "https://example.com/a", "// v1").await.unwrap();
        db.upsert_custom_parser(42, "https://example.com/b", "// v2").await.unwrap();

        let found = db.custom_parser(42, "example.com").await.unwrap().unwrap();
        assert_eq!(found.script, "// v2");
    }

    #[tokio::test]
    async fn test_scoped_to_owner() {
        let db = RegistryDb::open_in_memory().await.unwrap();
        db.upsert_custom_parser(1, "https://example.com", "// mine").await.unwrap();

        assert!(db.custom_parser(2, "example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let db = RegistryDb::open_in_memory().await.unwrap();

        let bare = db.upsert_custom_parser(1, "example.com", "// x").await;
        assert!(matches!(bare, Err(Error::InvalidUrl(_))));

        let hostless = db.upsert_custom_parser(1, "data:text/plain,hello", "// x").await;
        assert!(matches!(hostless, Err(Error::InvalidUrl(_))));
    }
}
