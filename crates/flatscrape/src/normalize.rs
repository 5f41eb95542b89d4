//! Text cleanup and numeric coercion for extracted field values.
//!
//! Values on listing pages are rents, deposits, areas and room counts in a
//! mix of locales: `1.500,00 €`, `€950`, `1,234.5`. [`clean`] strips currency
//! symbols, collapses whitespace, drops thousands separators and turns the
//! remaining decimal commas into dots. [`to_number`] then reads the first
//! numeric run. Signs and exponents are not handled; the inputs are positive
//! amounts.

use serde::{Deserialize, Serialize};

/// Currency symbols removed by [`clean`].
pub const CURRENCY_SYMBOLS: &[char] = &['€', '$', '£', '¥'];

/// Fields coerced to numbers. Everything else stays text.
pub const NUMERIC_FIELDS: &[&str] = &["warm_rent", "deposit", "area", "rooms", "price"];

/// A normalized field value. Serializes as a bare JSON number or string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }
}

/// Clean raw extracted text.
///
/// Currency symbols go first so that `950 €` does not leave a trailing
/// space behind. Thousands separators (`.` or `,` followed by exactly three
/// digits) are removed until none remain, and only then are commas mapped to
/// dots. `clean(clean(t)) == clean(t)` for every input.
pub fn clean(text: &str) -> String {
    let without_currency: String = text
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c))
        .collect();

    let collapsed = without_currency
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut chars: Vec<char> = collapsed.chars().collect();
    loop {
        let stripped = strip_thousands_separators(&chars);
        if stripped.len() == chars.len() {
            break;
        }
        chars = stripped;
    }

    chars
        .into_iter()
        .map(|c| if c == ',' { '.' } else { c })
        .collect()
}

/// Parse the first numeric run of the cleaned text.
///
/// A numeric run is a maximal sequence of ASCII digits and dots. Only the
/// first run is considered: `None` when there is no run or it is not a
/// valid float (`1.2.3`, or the lone dot of `ca. 50`).
pub fn to_number(text: &str) -> Option<f64> {
    let cleaned = clean(text);
    let run = first_numeric_run(&cleaned)?;
    run.parse::<f64>().ok()
}

/// Whether a logical field is coerced to a number.
pub fn is_numeric_field(name: &str) -> bool {
    NUMERIC_FIELDS.contains(&name)
}

/// Normalize the raw text resolved for a field.
///
/// Empty text after cleaning is treated as a miss. Numeric fields that do
/// not parse keep their cleaned text.
pub fn normalize_field(name: &str, raw: &str) -> Option<FieldValue> {
    let cleaned = clean(raw);
    if cleaned.is_empty() {
        return None;
    }

    if is_numeric_field(name) {
        if let Some(n) = to_number(&cleaned) {
            return Some(FieldValue::Number(n));
        }
        tracing::debug!("field {name}: '{cleaned}' is not numeric, keeping text");
    }

    Some(FieldValue::Text(cleaned))
}

fn strip_thousands_separators(chars: &[char]) -> Vec<char> {
    chars
        .iter()
        .enumerate()
        .filter(|(i, c)| !(matches!(c, '.' | ',') && digit_run_after(chars, *i) == 3))
        .map(|(_, c)| *c)
        .collect()
}

fn digit_run_after(chars: &[char], i: usize) -> usize {
    chars[i + 1..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .count()
}

fn first_numeric_run(text: &str) -> Option<&str> {
    let is_run_byte = |b: u8| b.is_ascii_digit() || b == b'.';
    let start = text.bytes().position(is_run_byte)?;
    let len = text[start..]
        .bytes()
        .take_while(|b| is_run_byte(*b))
        .count();
    Some(&text[start..start + len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_whitespace_and_currency() {
        assert_eq!(clean("  950\n\t €  "), "950");
        assert_eq!(clean("Nice   Flat"), "Nice Flat");
        assert_eq!(clean("$ 1\u{a0}200"), "1 200");
        assert_eq!(clean(""), "");
    }

    #[test]
    fn test_clean_thousands_before_decimal_comma() {
        assert_eq!(clean("1.234,56"), "1234.56");
        assert_eq!(clean("1,234.56"), "1234.56");
        assert_eq!(clean("1.234.567,89 €"), "1234567.89");
        assert_eq!(clean("2,5 Zimmer"), "2.5 Zimmer");
        assert_eq!(clean("12,3456"), "12.3456");
    }

    #[test]
    fn test_clean_is_idempotent() {
        let samples = [
            "1.234,56",
            "€950",
            "950 €",
            "1,.234",
            "1,2.345",
            "5 € 3",
            "  a  ,  b ",
            "1.2345.678",
            "ca. 50 m²",
            "1.500,00 €",
            "n/a",
            ",123,456",
            "Kaltmiete: 1.050,- €",
        ];
        for s in samples {
            let once = clean(s);
            assert_eq!(clean(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number("1.234,56"), Some(1234.56));
        assert_eq!(to_number("€950"), Some(950.0));
        assert_eq!(to_number("n/a"), None);
        assert_eq!(to_number("1.500,00 €"), Some(1500.0));
        assert_eq!(to_number("ca. 50 m²"), None);
        assert_eq!(to_number("3 Zimmer"), Some(3.0));
        assert_eq!(to_number("2,5"), Some(2.5));
        assert_eq!(to_number("-"), None);
    }

    #[test]
    fn test_to_number_rejects_malformed_run() {
        // The first run is taken as-is; "1.2.3" is not a float.
        assert_eq!(to_number("v1.2.3 then 5"), None);
    }

    #[test]
    fn test_normalize_numeric_field() {
        assert_eq!(
            normalize_field("warm_rent", "950 €"),
            Some(FieldValue::Number(950.0))
        );
        assert_eq!(
            normalize_field("price", "1.500,00 €"),
            Some(FieldValue::Number(1500.0))
        );
        // Non-numeric text in a numeric field is kept, not discarded.
        assert_eq!(
            normalize_field("deposit", "auf Anfrage"),
            Some(FieldValue::Text("auf Anfrage".into()))
        );
        assert_eq!(
            normalize_field("area", "ca. 50 m²"),
            Some(FieldValue::Text("ca. 50 m²".into()))
        );
    }

    #[test]
    fn test_normalize_text_field_and_empty() {
        assert_eq!(
            normalize_field("title", "  Nice \n Flat "),
            Some(FieldValue::Text("Nice Flat".into()))
        );
        assert_eq!(normalize_field("title", "   "), None);
        assert_eq!(normalize_field("warm_rent", " € "), None);
    }

    #[test]
    fn test_field_value_accessors() {
        let n = FieldValue::Number(2.5);
        let t = FieldValue::Text("Altbau".into());
        assert_eq!(n.as_number(), Some(2.5));
        assert_eq!(n.as_text(), None);
        assert_eq!(t.as_text(), Some("Altbau"));
        assert_eq!(t.as_number(), None);
    }

    #[test]
    fn test_field_value_serializes_bare() {
        let v = serde_json::to_value(FieldValue::Number(950.0)).unwrap();
        assert_eq!(v, serde_json::json!(950.0));
        let v = serde_json::to_value(FieldValue::Text("x".into())).unwrap();
        assert_eq!(v, serde_json::json!("x"));
    }
}
