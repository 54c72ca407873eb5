use permitwalk_core::{Error, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Read permit identifiers from a JSON file.
///
/// The file holds an array whose items are identifier strings, or objects
/// whose values are identifiers. Identifiers are trimmed, blanks dropped,
/// duplicates removed keeping the first occurrence, then `limit` applied.
pub fn load_identifiers(path: &Path, limit: Option<usize>) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read identifiers from {}: {}", path.display(), e))
    })?;
    let ids = parse_identifiers(&content, limit)?;
    info!(path = %path.display(), count = ids.len(), "Identifiers loaded");
    Ok(ids)
}

pub fn parse_identifiers(content: &str, limit: Option<usize>) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(content)?;
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(Error::Validation(format!(
                "identifier input must be a JSON array, got {}",
                kind(&other)
            )))
        }
    };

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for item in items {
        for id in flatten(item) {
            if seen.insert(id.clone()) {
                ids.push(id);
            } else {
                debug!(permit = %id, "Duplicate identifier skipped");
            }
        }
    }

    if let Some(limit) = limit {
        ids.truncate(limit);
    }
    Ok(ids)
}

fn flatten(item: Value) -> Vec<String> {
    match item {
        Value::Object(map) => map.into_iter().filter_map(|(_, v)| scalar(v)).collect(),
        other => scalar(other).into_iter().collect(),
    }
}

/// Strings and numbers count as identifiers; anything else is ignored.
fn scalar(value: Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            debug!(value = kind(&other), "Ignoring non-identifier input value");
            return None;
        }
    };
    (!id.is_empty()).then_some(id)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_strings_and_objects_flattened() {
        let ids = parse_identifiers(
            r#"["BP-1", {"permit": "BP-2"}, " BP-3 ", {"permit": 2024001}]"#,
            None,
        )
        .unwrap();
        assert_eq!(ids, vec!["BP-1", "BP-2", "BP-3", "2024001"]);
    }

    #[test]
    fn test_dedupe_keeps_first_seen_order() {
        let ids = parse_identifiers(
            r#"["B", "A", {"permit": "B"}, "C", "A"]"#,
            None,
        )
        .unwrap();
        assert_eq!(ids, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_limit_applies_after_dedupe() {
        let ids = parse_identifiers(r#"["A", "A", "B", "C"]"#, Some(2)).unwrap();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn test_blanks_and_nulls_dropped() {
        let ids = parse_identifiers(r#"["", "  ", null, {"permit": null}, "X"]"#, None).unwrap();
        assert_eq!(ids, vec!["X"]);
    }

    #[test]
    fn test_non_array_rejected() {
        let err = parse_identifiers(r#"{"permit": "BP-1"}"#, None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(matches!(parse_identifiers("not json", None), Err(Error::Json(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"[{{"permit": "BP-9"}}, "BP-10"]"#).unwrap();
        let ids = load_identifiers(file.path(), None).unwrap();
        assert_eq!(ids, vec!["BP-9", "BP-10"]);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = load_identifiers(Path::new("/nonexistent/permits.json"), None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
