//! Resolve a configured selector against a parsed document.
//!
//! Four addressing schemes are supported. `id` and `class` walk the element
//! tree directly so that identifiers which are not valid CSS (leading digits,
//! colons) still match. `css` uses the `scraper` selector engine.
//!
//! `xpath` is an approximation, not an XPath engine: the expression is turned
//! into a CSS selector by deleting `[` and `]` and by replacing each `//`
//! with a descendant combinator. This differs from deleting `//` outright,
//! which would turn `//div//h1` into `divh1`; here it becomes `div h1`.
//! Predicates such as `//span[@class='x']` produce invalid CSS and resolve to
//! `None`. Prefer `css` for anything beyond plain tag paths.

use crate::config::{SelectorKind, SelectorSpec};
use scraper::{ElementRef, Html, Selector};

/// Resolve `spec` to the visible text of the first matching element.
///
/// Never fails: a malformed selector or a missing element yields `None`.
pub fn resolve(document: &Html, spec: &SelectorSpec) -> Option<String> {
    let value = spec.value.trim();
    if value.is_empty() {
        return None;
    }

    match &spec.kind {
        SelectorKind::Id => find_first(document, |el| el.value().id() == Some(value)),
        SelectorKind::Class => {
            let wanted: Vec<&str> = value.split_whitespace().collect();
            find_first(document, |el| {
                wanted
                    .iter()
                    .all(|w| el.value().classes().any(|c| c == *w))
            })
        }
        SelectorKind::Css => select_first(document, value),
        SelectorKind::XPath => select_first(document, &xpath_to_css(value)),
        SelectorKind::Unknown(kind) => {
            tracing::warn!("unknown selector type: {kind}");
            None
        }
    }
}

/// Degrade an XPath expression to a CSS selector. Lossy; see module docs.
pub fn xpath_to_css(xpath: &str) -> String {
    let stripped = xpath.replace("//", " ").replace(['[', ']'], "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an element: text nodes trimmed and joined by one space.
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn find_first<P>(document: &Html, predicate: P) -> Option<String>
where
    P: Fn(&ElementRef<'_>) -> bool,
{
    let all = Selector::parse("*").ok()?;
    document
        .select(&all)
        .find(|el| predicate(el))
        .map(|el| element_text(&el))
}

fn select_first(document: &Html, css: &str) -> Option<String> {
    let selector = match Selector::parse(css) {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!("invalid selector '{css}': {e:?}");
            return None;
        }
    };
    document
        .select(&selector)
        .next()
        .map(|el| element_text(&el))
}
