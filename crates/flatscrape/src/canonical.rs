//! Listing URL canonicalization.
//!
//! The canonical URL is the stable form used for duplicate detection and
//! storage. A domain rule rebuilds it from the listing id; without a rule
//! (or when the rule does not match) the query string and fragment are
//! dropped. This operation is fail-open: anything unparsable comes back
//! unchanged and is rejected later by [`validate_canonical`].

use crate::config::UrlCleaningRule;
use crate::error::{ScrapeError, ScrapeResult};
use url::Url;

/// Placeholder substituted in a rule's rebuild template.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Canonicalize `url`, using `rule` when it matches.
pub fn canonicalize(url: &str, rule: Option<&UrlCleaningRule>) -> String {
    if let Some(rule) = rule {
        if let Some(rebuilt) = apply_rule(url, rule) {
            return rebuilt;
        }
        tracing::debug!(
            "url cleaning pattern '{}' did not match {url}, stripping query instead",
            rule.extract_pattern
        );
    }

    strip_query_and_fragment(url).unwrap_or_else(|| url.to_string())
}

/// Reject canonical URLs without a scheme or host.
pub fn validate_canonical(url: &str) -> ScrapeResult<()> {
    let parsed = Url::parse(url).map_err(|e| ScrapeError::InvalidUrl(format!("{url}: {e}")))?;
    if parsed.scheme().is_empty() || parsed.host_str().map_or(true, str::is_empty) {
        return Err(ScrapeError::InvalidUrl(format!(
            "{url}: missing scheme or host"
        )));
    }
    Ok(())
}

fn apply_rule(url: &str, rule: &UrlCleaningRule) -> Option<String> {
    let id = rule.extract_regex()?.captures(url)?.get(1)?.as_str();
    Some(rule.clean_pattern.replace(ID_PLACEHOLDER, id))
}

fn strip_query_and_fragment(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url.trim()).ok()?;
    parsed.set_query(None);
    parsed.set_fragment(None);
    Some(parsed.to_string())
}
