//! Registry manifest export and import.
//!
//! A manifest is the registry boiled down to `{script id -> declared
//! domains}`. Exporting one captures the current domain coverage;
//! importing one rebuilds the registry from script files on disk without
//! re-executing domain discovery.

use std::collections::BTreeMap;
use std::path::Path;

use super::connection::RegistryDb;
use super::records::ParserRecord;
use crate::Error;

/// Script id to declared-domains mapping, sorted by id.
pub type DomainManifest = BTreeMap<String, Vec<String>>;

/// Snapshot the registry as a manifest.
pub async fn export_manifest(db: &RegistryDb) -> Result<DomainManifest, Error> {
    let records = db.all_parsers().await?;
    Ok(records.into_iter().map(|r| (r.id, r.domains)).collect())
}

/// Read the script file behind every manifest entry.
///
/// Fails on the first unreadable file so an import never starts from a
/// partial corpus.
fn read_manifest_scripts(
    manifest: &DomainManifest,
    scripts_dir: &Path,
) -> Result<Vec<ParserRecord>, Error> {
    let mut records = Vec::with_capacity(manifest.len());
    for (id, domains) in manifest {
        let path = scripts_dir.join(id);
        let script = std::fs::read_to_string(&path).map_err(|e| Error::ManifestScript {
            id: id.clone(),
            reason: format!("{}: {e}", path.display()),
        })?;
        records.push(ParserRecord::new(id.clone(), domains.iter().cloned(), script));
    }
    Ok(records)
}

/// Rebuild the registry from a manifest plus a directory of script files.
///
/// This is the destructive path: the previous registry is replaced as a
/// whole. Every referenced script must be readable before anything is
/// written, so a bad manifest leaves the store untouched. Returns the
/// number of records written.
pub async fn import_manifest(
    db: &RegistryDb,
    manifest: &DomainManifest,
    scripts_dir: &Path,
) -> Result<usize, Error> {
    let records = read_manifest_scripts(manifest, scripts_dir)?;
    db.replace_parsers(&records).await
}
