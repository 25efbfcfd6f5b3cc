//! This module turns resolved entries into JSON output.

use crate::parser::BibEntry;
use slog::debug;

/// Serialize the entries to JSON, pretty-printed or compact.
pub fn render(entries: &[BibEntry], pretty: bool) -> Result<String, String> {
    debug!(
        slog_scope::logger(),
        "Rendering {} entries to JSON...",
        entries.len()
    );

    let result = if pretty {
        serde_json::to_string_pretty(entries)
    } else {
        serde_json::to_string(entries)
    };

    match result {
        Ok(json) => Ok(json),
        Err(e) => Err(format!("error serializing entries—{}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample() -> Vec<BibEntry> {
        vec![BibEntry {
            entry_type: "book".to_string(),
            key: "b1".to_string(),
            fields: BTreeMap::from([
                ("author".to_string(), "X".to_string()),
                ("title".to_string(), "Root".to_string()),
            ]),
        }]
    }

    #[test]
    fn compact_shape() {
        let json = render(&sample(), false).unwrap();
        assert_eq!(
            json,
            r#"[{"type":"book","key":"b1","fields":{"author":"X","title":"Root"}}]"#
        );
    }

    #[test]
    fn pretty_contains_fields() {
        let json = render(&sample(), true).unwrap();
        assert!(json.contains("\"type\": \"book\""));
        assert!(json.contains("\"title\": \"Root\""));
    }
}
