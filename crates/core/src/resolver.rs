//! Domain resolution for matching page URLs to parser records.
//!
//! Matching is resolution, not search: a record applies when one of the
//! candidate hostnames derived from the page URL is equal to one of the
//! record's declared domains. Substring comparison is deliberately absent;
//! `fakeexample.com` must never resolve to a record for `example.com`.

use crate::Error;
use crate::registry::{CustomParserRecord, ParserRecord, RegistryDb};
use url::Url;

/// Ordered lookup candidates for a hostname.
///
/// 1. The hostname itself, lowercased.
/// 2. The www-toggled form: strip a leading `www.`, or prepend one.
/// 3. Parent domains: repeatedly drop the leftmost label, keeping only
///    remainders with at least two labels (never a bare TLD).
///
/// Duplicates are removed preserving first occurrence, so the most
/// specific candidate always comes first.
pub fn candidates(hostname: &str) -> Vec<String> {
    let host = hostname.trim().trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    out.push(host.clone());

    if let Some(without_www) = host.strip_prefix("www.") {
        out.push(without_www.to_string());
    } else {
        out.push(format!("www.{host}"));
    }

    let parts: Vec<&str> = host.split('.').collect();
    for i in 1..parts.len() {
        let parent = parts[i..].join(".");
        if parent.contains('.') {
            out.push(parent);
        }
    }

    let mut seen = std::collections::HashSet::new();
    out.retain(|candidate| seen.insert(candidate.clone()));
    out
}

fn hostname_of(page_url: &str) -> Option<String> {
    Url::parse(page_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// A record produced by resolution.
#[derive(Debug, Clone)]
pub enum ResolvedParser {
    /// Shared registry record.
    Shared(ParserRecord),
    /// Per-user override, shadowing the shared registry for its owner.
    Custom(CustomParserRecord),
}

impl ResolvedParser {
    pub fn script(&self) -> &str {
        match self {
            ResolvedParser::Shared(record) => &record.script,
            ResolvedParser::Custom(record) => &record.script,
        }
    }

    /// Short identifier for logs.
    pub fn label(&self) -> String {
        match self {
            ResolvedParser::Shared(record) => format!("shared:{}", record.id),
            ResolvedParser::Custom(record) => {
                format!("custom:{}/{}", record.owner_id, record.target_key)
            }
        }
    }
}

/// Resolves page URLs to parser records against the registry.
///
/// Resolution is read-only and deterministic: candidates are tried in
/// order and the first domain with any records wins, ties within a domain
/// broken by record id.
#[derive(Clone)]
pub struct DomainResolver {
    db: RegistryDb,
}

impl DomainResolver {
    pub fn new(db: RegistryDb) -> Self {
        Self { db }
    }

    /// Resolve against the shared registry only.
    ///
    /// Returns None when the URL has no hostname or no candidate matches.
    pub async fn resolve(&self, page_url: &str) -> Result<Option<ParserRecord>, Error> {
        let Some(host) = hostname_of(page_url) else {
            return Ok(None);
        };

        for candidate in candidates(&host) {
            let mut matches = self.db.parsers_for_domain(&candidate).await?;
            if !matches.is_empty() {
                return Ok(Some(matches.remove(0)));
            }
        }
        Ok(None)
    }

    /// Resolve with per-user overrides considered first.
    ///
    /// The owner's custom records are checked against the full candidate
    /// list before the shared registry is consulted at all, so an override
    /// shadows a shared record for that owner only.
    pub async fn resolve_for_user(
        &self,
        owner_id: Option<i64>,
        page_url: &str,
    ) -> Result<Option<ResolvedParser>, Error> {
        let Some(host) = hostname_of(page_url) else {
            return Ok(None);
        };
        let candidates = candidates(&host);

        if let Some(owner) = owner_id {
            for candidate in &candidates {
                if let Some(custom) = self.db.custom_parser(owner, candidate).await? {
                    return Ok(Some(ResolvedParser::Custom(custom)));
                }
            }
        }

        for candidate in &candidates {
            let mut matches = self.db.parsers_for_domain(candidate).await?;
            if !matches.is_empty() {
                return Ok(Some(ResolvedParser::Shared(matches.remove(0))));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, domains: &[&str]) -> ParserRecord {
        ParserRecord::new(id, domains.iter().map(|d| d.to_string()), "// script")
    }

    #[test]
    fn test_candidates_strips_www() {
        let got = candidates("www.royalroad.com");
        assert_eq!(got, vec!["www.royalroad.com", "royalroad.com"]);
    }

    #[test]
    fn test_candidates_prepends_www() {
        let got = candidates("royalroad.com");
        assert_eq!(got, vec!["royalroad.com", "www.royalroad.com"]);
    }

    #[test]
    fn test_candidates_parent_domains() {
        let got = candidates("m.wuxiaworld.com");
        assert_eq!(got, vec!["m.wuxiaworld.com", "www.m.wuxiaworld.com", "wuxiaworld.com"]);
    }

    #[test]
    fn test_candidates_never_bare_tld() {
        for candidate in candidates("a.b.example.org") {
            assert!(candidate.contains('.'), "bare label leaked: {candidate}");
            assert_ne!(candidate, "org");
        }
    }

    #[test]
    fn test_candidates_keep_two_label_suffix() {
        let got = candidates("www.example.co.uk");
        assert!(got.contains(&"co.uk".to_string()));
        assert!(!got.contains(&"uk".to_string()));
    }

    #[test]
    fn test_candidates_lowercase_and_trim() {
        let got = candidates("  WWW.Example.COM.  ");
        assert_eq!(got[0], "www.example.com");
    }

    #[test]
    fn test_candidates_empty_hostname() {
        assert!(candidates("").is_empty());
        assert!(candidates("   ").is_empty());
    }

    async fn seeded_db(records: &[ParserRecord]) -> RegistryDb {
        let db = RegistryDb::open_in_memory().await.unwrap();
        db.upsert_parsers(records).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_resolve_exact() {
        let db = seeded_db(&[record("RoyalRoad.js", &["royalroad.com"])]).await;
        let resolver = DomainResolver::new(db);

        let found = resolver.resolve("https://royalroad.com/fiction/1").await.unwrap().unwrap();
        assert_eq!(found.id, "RoyalRoad.js");
    }

    #[tokio::test]
    async fn test_resolve_www_toggle() {
        let db = seeded_db(&[record("RoyalRoad.js", &["royalroad.com"])]).await;
        let resolver = DomainResolver::new(db);

        let found = resolver.resolve("https://www.royalroad.com/fiction/1").await.unwrap();
        assert_eq!(found.unwrap().id, "RoyalRoad.js");
    }

    #[tokio::test]
    async fn test_resolve_parent_domain() {
        let db = seeded_db(&[record("Wuxia.js", &["wuxiaworld.com"])]).await;
        let resolver = DomainResolver::new(db);

        let found = resolver.resolve("https://m.wuxiaworld.com/novel/1").await.unwrap();
        assert_eq!(found.unwrap().id, "Wuxia.js");
    }

    #[tokio::test]
    async fn test_no_substring_match() {
        let db = seeded_db(&[record("Example.js", &["example.com"])]).await;
        let resolver = DomainResolver::new(db);

        let found = resolver.resolve("https://fakeexample.com/page").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_resolve_prefers_most_specific_candidate() {
        let db = seeded_db(&[
            record("Site.js", &["site.com"]),
            record("News.js", &["news.site.com"]),
        ])
        .await;
        let resolver = DomainResolver::new(db);

        let found = resolver.resolve("https://news.site.com/x").await.unwrap();
        assert_eq!(found.unwrap().id, "News.js");
    }

    #[tokio::test]
    async fn test_resolve_ties_break_by_id() {
        let db = seeded_db(&[
            record("Zeta.js", &["shared.com"]),
            record("Alpha.js", &["shared.com"]),
        ])
        .await;
        let resolver = DomainResolver::new(db);

        let found = resolver.resolve("https://shared.com/").await.unwrap();
        assert_eq!(found.unwrap().id, "Alpha.js");
    }

    #[tokio::test]
    async fn test_resolve_unparseable_url() {
        let db = seeded_db(&[]).await;
        let resolver = DomainResolver::new(db);

        assert!(resolver.resolve("not a url").await.unwrap().is_none());
        assert!(resolver.resolve("data:text/plain,x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_custom_shadows_shared() {
        let db = seeded_db(&[record("Shared.js", &["example.com"])]).await;
        db.upsert_custom_parser(7, "https://example.com/novel", "// override")
            .await
            .unwrap();
        let resolver = DomainResolver::new(db);

        let for_owner =
            resolver.resolve_for_user(Some(7), "https://www.example.com/x").await.unwrap();
        assert!(matches!(for_owner, Some(ResolvedParser::Custom(_))));

        let for_other =
            resolver.resolve_for_user(Some(8), "https://www.example.com/x").await.unwrap();
        assert!(matches!(for_other, Some(ResolvedParser::Shared(_))));

        let anonymous = resolver.resolve_for_user(None, "https://www.example.com/x").await.unwrap();
        assert!(matches!(anonymous, Some(ResolvedParser::Shared(_))));
    }

    #[tokio::test]
    async fn test_resolved_parser_label() {
        let shared = ResolvedParser::Shared(record("A.js", &["a.com"]));
        assert_eq!(shared.label(), "shared:A.js");

        let custom = ResolvedParser::Custom(CustomParserRecord {
            owner_id: 7,
            target_key: "a.com".to_string(),
            script: String::new(),
            updated_at: String::new(),
        });
        assert_eq!(custom.label(), "custom:7/a.com");
    }
}
