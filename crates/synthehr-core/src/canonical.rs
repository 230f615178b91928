use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::document::{NodeKind, NodeVisitor, TYPE_FIELD, into_sequence, walk_mut};

/// Fields that must hold a sequence on every record that carries them.
const SEQUENCE_FIELDS: [&str; 2] = ["links", "participations"];

static ISO_BASIC: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<y>\d{4})(?P<mo>\d{2})(?P<d>\d{2})T(?P<h>\d{2})(?P<mi>\d{2})(?P<s>\d{2})(?:[.,](?P<frac>\d+))?(?P<tz>Z|[+-]\d{2}:?\d{2})$",
    )
    .ok()
});

/// Normalize a raw document into canonical form, in place.
///
/// - `ITEM_TABLE` records become `ITEM_TREE`, with `rows` renamed to `items`.
/// - `links`/`participations` on any record, `content` on `COMPOSITION` and
///   `items` on `SECTION` always hold sequences.
/// - Compact `DV_DATE_TIME` values are rewritten to extended ISO-8601.
/// - Numeric-string `DV_QUANTITY` magnitudes become JSON numbers.
///
/// Unknown tags are left untouched. Running it twice is a no-op.
pub fn canonicalize(root: &mut Value) -> &mut Value {
    walk_mut(root, &mut Canonicalizer);
    root
}

struct Canonicalizer;

impl NodeVisitor for Canonicalizer {
    fn visit(&mut self, kind: NodeKind, record: &mut Map<String, Value>) {
        let kind = match kind {
            NodeKind::ItemTable => {
                migrate_item_table(record);
                NodeKind::ItemTree
            }
            other => other,
        };

        for field in SEQUENCE_FIELDS {
            sequence_field(record, field);
        }

        match kind {
            NodeKind::Composition => sequence_field(record, "content"),
            NodeKind::Section => sequence_field(record, "items"),
            NodeKind::DvDateTime => {
                if let Some(Value::String(value)) = record.get_mut("value") {
                    if let Some(normalized) = normalize_date_time(value) {
                        *value = normalized;
                    }
                }
            }
            NodeKind::DvQuantity => {
                if let Some(magnitude) = record.get_mut("magnitude") {
                    if let Some(number) = magnitude.as_str().and_then(parse_magnitude) {
                        *magnitude = Value::Number(number);
                    }
                }
            }
            _ => {}
        }
    }
}

fn migrate_item_table(record: &mut Map<String, Value>) {
    if let Some(tag) = NodeKind::ItemTree.tag() {
        record.insert(TYPE_FIELD.to_string(), Value::String(tag.to_string()));
    }
    if let Some(rows) = record.remove("rows") {
        record.insert("items".to_string(), into_sequence(rows));
    }
}

fn sequence_field(record: &mut Map<String, Value>, field: &str) {
    if let Some(value) = record.get_mut(field) {
        if !value.is_array() {
            *value = into_sequence(value.take());
        }
    }
}

/// Rewrite a compact ISO-8601 basic timestamp (`YYYYMMDDThhmmss[.f+](Z|±hhmm)`)
/// to extended form with exactly three fractional digits.
///
/// Returns `None` when the value does not match the compact pattern.
pub fn normalize_date_time(value: &str) -> Option<String> {
    let caps = ISO_BASIC.as_ref()?.captures(value.trim())?;
    let frac = caps.name("frac").map(|m| m.as_str()).unwrap_or("");
    let millis: String = frac.chars().chain(std::iter::repeat('0')).take(3).collect();

    let tz = &caps["tz"];
    let tz = if tz.len() == 5 {
        format!("{}:{}", &tz[..3], &tz[3..])
    } else {
        tz.to_string()
    };

    Some(format!(
        "{}-{}-{}T{}:{}:{}.{millis}{tz}",
        &caps["y"], &caps["mo"], &caps["d"], &caps["h"], &caps["mi"], &caps["s"]
    ))
}

/// Parse a numeric-string magnitude. Whole values become integers.
pub fn parse_magnitude(raw: &str) -> Option<Number> {
    let parsed: f64 = raw.trim().parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    if parsed.fract() == 0.0 && parsed.abs() < i64::MAX as f64 {
        return Some(Number::from(parsed as i64));
    }
    Number::from_f64(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_utc_timestamp() {
        assert_eq!(
            normalize_date_time("20240115T103000Z").as_deref(),
            Some("2024-01-15T10:30:00.000Z")
        );
    }

    #[test]
    fn compact_offset_gets_colon() {
        assert_eq!(
            normalize_date_time("20240115T103000+0200").as_deref(),
            Some("2024-01-15T10:30:00.000+02:00")
        );
        assert_eq!(
            normalize_date_time("20240115T103000-05:30").as_deref(),
            Some("2024-01-15T10:30:00.000-05:30")
        );
    }

    #[test]
    fn fraction_is_truncated_or_padded() {
        assert_eq!(
            normalize_date_time("20240115T103000.123456Z").as_deref(),
            Some("2024-01-15T10:30:00.123Z")
        );
        assert_eq!(
            normalize_date_time("20240115T103000,5Z").as_deref(),
            Some("2024-01-15T10:30:00.500Z")
        );
    }

    #[test]
    fn extended_values_do_not_match() {
        assert_eq!(normalize_date_time("2024-01-15T10:30:00.000Z"), None);
        assert_eq!(normalize_date_time("yesterday"), None);
        assert_eq!(normalize_date_time("20240115T103000"), None);
    }

    #[test]
    fn magnitudes() {
        assert_eq!(parse_magnitude("7"), Some(Number::from(7)));
        assert_eq!(parse_magnitude(" 7.0 "), Some(Number::from(7)));
        assert_eq!(parse_magnitude("7.25"), Number::from_f64(7.25));
        assert_eq!(parse_magnitude("seven"), None);
        assert_eq!(parse_magnitude("NaN"), None);
    }
}
