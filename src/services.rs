use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{info, warn};
use url::Url;

use crate::domain::normalize_domain;

// Include the default service map at compile time
const DEFAULT_SERVICE_MAP_BYTES: &[u8] = include_bytes!("../default_service_map.txt");

pub const SERVICE_MAP_FILE: &str = "service_map.txt";
pub const FALLBACK_SERVICE: &str = "12ft";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Service {
    pub id: &'static str,
    pub name: &'static str,
}

pub const KNOWN_SERVICES: &[Service] = &[
    Service { id: "scribe", name: "Scribe.rip" },
    Service { id: "12ft", name: "12ft.io" },
    Service { id: "archive.is", name: "Archive.is" },
    Service { id: "archive.ph", name: "Archive.ph" },
];

static MEDIUM_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(www\.)?medium\.com/").expect("medium prefix pattern is valid")
});

/// Display name for a service id; unknown ids display as themselves.
pub fn service_name(id: &str) -> &str {
    KNOWN_SERVICES
        .iter()
        .find(|service| service.id == id)
        .map(|service| service.name)
        .unwrap_or(id)
}

pub fn is_known_service(id: &str) -> bool {
    KNOWN_SERVICES.iter().any(|service| service.id == id)
}

/// Build the redirect target for `url` on `service`.
pub fn bypass_url(url: &str, service: &str) -> String {
    match service {
        "scribe" => match Url::parse(url) {
            Ok(parsed) => format!("https://scribe.rip{}", parsed.path()),
            Err(_) => format!("https://scribe.rip/{}", MEDIUM_PREFIX.replace(url, "")),
        },
        "archive.is" => format!("https://archive.is/{}", url),
        "archive.ph" => format!("https://archive.ph/{}", url),
        _ => format!("https://12ft.io/{}", url),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassTarget {
    pub redirect_url: String,
    pub service_name: String,
    pub service_id: String,
}

impl BypassTarget {
    pub fn new(url: &str, service: &str) -> Self {
        Self {
            redirect_url: bypass_url(url, service),
            service_name: service_name(service).to_string(),
            service_id: service.to_string(),
        }
    }
}

/// Ordered domain to service table. Lookups are first-match-wins in
/// declaration order, so this stays a list.
#[derive(Debug, Clone)]
pub struct ServiceMap {
    entries: Vec<(String, String)>,
}

impl ServiceMap {
    pub fn embedded() -> Result<Self> {
        let content = std::str::from_utf8(DEFAULT_SERVICE_MAP_BYTES)
            .context("Failed to decode embedded default service map")?;

        let mut entries = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            match parse_line(line) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => {
                    warn!(action = "parse", component = "embedded_service_map", line_number = line_num + 1, error = %e, "Invalid service map line")
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Service map file not found: {:?}", path);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read service map {:?}", path))?;
        let mut entries = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            match parse_line(line) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => anyhow::bail!("Invalid service map line {}: {}", line_num + 1, e),
            }
        }
        Ok(Self { entries })
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let start_time = Instant::now();
        info!(
            action = "start",
            component = "service_map_loading",
            "Starting service map loading"
        );

        let map = match path {
            Some(path) => {
                info!(action = "load", component = "service_map_file", file_path = ?path, "Loading service map from specified file");
                Self::from_file(path)?
            }
            None => {
                info!(action = "load", component = "embedded_service_map", "Using embedded default service map");
                Self::embedded()?
            }
        };

        info!(
            action = "complete",
            component = "service_map_loading",
            entry_count = map.entries.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Service map loaded"
        );
        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Default service for `url`: exact hostname match, then substring
    /// match, then the fallback service. Unparseable URLs get the fallback.
    pub fn lookup_default(&self, url: &str) -> BypassTarget {
        let hostname = match Url::parse(url) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) => normalize_domain(host),
                None => return BypassTarget::new(url, FALLBACK_SERVICE),
            },
            Err(e) => {
                warn!(action = "parse", component = "service_lookup", error = %e, "Unparseable URL, using fallback service");
                return BypassTarget::new(url, FALLBACK_SERVICE);
            }
        };

        let matched = self
            .entries
            .iter()
            .find(|(domain, _)| hostname == *domain)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(domain, _)| hostname.contains(domain.as_str()))
            });

        match matched {
            Some((_, service)) => BypassTarget::new(url, service),
            None => BypassTarget::new(url, FALLBACK_SERVICE),
        }
    }
}

fn parse_line(line: &str) -> Result<Option<(String, String)>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(domain), Some(service), None) => {
            if !is_known_service(service) {
                warn!(action = "parse", component = "service_map", domain, service, "Unknown service id, redirects will use the 12ft template");
            }
            Ok(Some((domain.to_lowercase(), service.to_string())))
        }
        _ => anyhow::bail!("expected `domain service`, got {:?}", line),
    }
}

pub fn init_default_service_map() -> Result<()> {
    let default_file = Path::new(SERVICE_MAP_FILE);

    if default_file.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first if you want to reinitialize.",
            SERVICE_MAP_FILE
        );
    }

    let default_content = std::str::from_utf8(DEFAULT_SERVICE_MAP_BYTES)
        .context("Failed to decode embedded default service map")?;

    fs::write(default_file, default_content)?;
    println!("Created {} with default service map", SERVICE_MAP_FILE);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn map() -> ServiceMap {
        ServiceMap::embedded().unwrap()
    }

    #[test]
    fn embedded_map_keeps_declaration_order() {
        let map = map();
        assert_eq!(map.len(), 24);
        assert_eq!(map.entries[0], ("medium.com".to_string(), "scribe".to_string()));
        assert_eq!(map.entries[23], ("espn.com".to_string(), "12ft".to_string()));
    }

    #[test]
    fn exact_match_with_www_stripped() {
        let target = map().lookup_default("https://www.WSJ.com/articles/x");
        assert_eq!(target.service_id, "archive.ph");
        assert_eq!(target.service_name, "Archive.ph");
        assert_eq!(
            target.redirect_url,
            "https://archive.ph/https://www.WSJ.com/articles/x"
        );
    }

    #[test]
    fn exact_match_beats_earlier_substring_match() {
        let map = ServiceMap {
            entries: vec![
                ("ft.com".to_string(), "archive.is".to_string()),
                ("microsoft.com".to_string(), "12ft".to_string()),
            ],
        };
        assert_eq!(map.lookup_default("https://microsoft.com/a").service_id, "12ft");
        assert_eq!(map.lookup_default("https://ft.com/a").service_id, "archive.is");
    }

    #[test]
    fn substring_match_takes_first_entry() {
        // No exact entry, so "ft.com" (declared before anything else that
        // matches) wins.
        let target = map().lookup_default("https://www.microsoft.com/news");
        assert_eq!(target.service_id, "archive.is");
    }

    #[test]
    fn substring_match_in_table_order() {
        let target = map().lookup_default("https://cooking.nytimes.com/recipes/1");
        assert_eq!(target.service_id, "12ft");

        let target = map().lookup_default("https://blog.medium.com/some-post");
        assert_eq!(target.service_id, "scribe");
        assert_eq!(target.redirect_url, "https://scribe.rip/some-post");
    }

    #[test]
    fn unknown_domain_falls_back() {
        let target = map().lookup_default("https://example.org/a");
        assert_eq!(target.service_id, "12ft");
        assert_eq!(target.redirect_url, "https://12ft.io/https://example.org/a");
    }

    #[test]
    fn unparseable_url_falls_back() {
        let target = map().lookup_default("not a url");
        assert_eq!(target.service_id, FALLBACK_SERVICE);
        assert_eq!(target.service_name, "12ft.io");
        assert_eq!(target.redirect_url, "https://12ft.io/not a url");
    }

    #[test]
    fn scribe_fallback_strips_medium_prefix() {
        assert_eq!(
            bypass_url("https://medium.com/@a/post-1", "scribe"),
            "https://scribe.rip/@a/post-1"
        );
        assert_eq!(
            bypass_url("http://www.medium.com/p", "scribe").as_str(),
            "https://scribe.rip/p"
        );
        assert_eq!(
            bypass_url("medium.com/@a/post", "scribe"),
            "https://scribe.rip/medium.com/@a/post"
        );
    }

    #[test]
    fn unknown_service_uses_12ft_template_and_own_name() {
        assert_eq!(bypass_url("https://a.com/", "outline"), "https://12ft.io/https://a.com/");
        assert_eq!(service_name("outline"), "outline");
        assert_eq!(service_name("archive.is"), "Archive.is");
    }

    #[test]
    fn user_file_replaces_table_and_rejects_bad_lines() {
        let mut good = tempfile::NamedTempFile::new().unwrap();
        writeln!(good, "# custom\nexample.org archive.is\n").unwrap();
        let map = ServiceMap::from_file(good.path()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.lookup_default("https://example.org/").service_id, "archive.is");
        assert_eq!(map.lookup_default("https://nytimes.com/").service_id, "12ft");

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "example.org archive.is\nbroken").unwrap();
        let err = ServiceMap::from_file(bad.path()).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
    }

    #[test]
    fn missing_user_file_is_an_error() {
        assert!(ServiceMap::load(Some(Path::new("/nonexistent/service_map.txt"))).is_err());
    }
}
