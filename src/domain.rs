use anyhow::{Context, Result};
use url::Url;

/// Prefix `https://` unless the input already carries an http(s) scheme.
pub fn format_url(input: &str) -> String {
    let input = input.trim();
    if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    }
}

/// Lowercase a hostname and strip a leading `www.`.
pub fn normalize_domain(host: &str) -> String {
    let host = host.to_lowercase();
    match host.strip_prefix("www.") {
        Some(stripped) => stripped.to_string(),
        None => host,
    }
}

/// Normalized domain of an already formatted URL.
pub fn domain_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
    let host = parsed
        .host_str()
        .with_context(|| format!("URL has no host: {}", url))?;
    Ok(normalize_domain(host))
}
