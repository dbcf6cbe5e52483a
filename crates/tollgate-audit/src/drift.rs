use std::collections::BTreeSet;

use serde_json::{Map, Value};

const PLACEHOLDER_TOKENS: [&str; 6] = [
    "NONE",
    "NULL",
    "TODO",
    "CHANGE_ME",
    "PLACEHOLDER",
    "YOUR_KEY_HERE",
];
const PLACEHOLDER_MARKERS: [&str; 2] = ["YOUR_KEY_HERE", "INSERT_SECRET"];

/// Returns every baseline key path absent from `actual`.
///
/// A missing subtree is expanded to its leaf paths. Present keys are not
/// compared by value.
pub fn find_missing_keys(baseline: &Map<String, Value>, actual: &Value) -> BTreeSet<String> {
    let mut missing = BTreeSet::new();
    collect_missing(baseline, actual.as_object(), "", &mut missing);
    missing
}

fn collect_missing(
    baseline: &Map<String, Value>,
    actual: Option<&Map<String, Value>>,
    prefix: &str,
    missing: &mut BTreeSet<String>,
) {
    for (key, value) in baseline {
        let path = format!("{prefix}{key}");
        match actual.and_then(|actual| actual.get(key)) {
            None => push_missing_subtree(&path, value, missing),
            Some(Value::Object(actual_child)) => {
                if let Value::Object(baseline_child) = value {
                    collect_missing(baseline_child, Some(actual_child), &format!("{path}."), missing);
                }
            }
            Some(_) => {}
        }
    }
}

fn push_missing_subtree(path: &str, value: &Value, missing: &mut BTreeSet<String>) {
    match value {
        Value::Object(children) if !children.is_empty() => {
            for (key, child) in children {
                push_missing_subtree(&format!("{path}.{key}"), child, missing);
            }
        }
        _ => {
            missing.insert(path.to_string());
        }
    }
}

/// Returns `key (TAG)` entries for unset or placeholder values in `baseline`.
pub fn find_integrity_defects(baseline: &Map<String, Value>) -> BTreeSet<String> {
    let mut defects = BTreeSet::new();
    collect_defects(baseline, "", &mut defects);
    defects
}

fn collect_defects(map: &Map<String, Value>, prefix: &str, defects: &mut BTreeSet<String>) {
    for (key, value) in map {
        let path = format!("{prefix}{key}");
        match value {
            Value::Object(child) => collect_defects(child, &format!("{path}."), defects),
            other => {
                if let Some(tag) = integrity_tag(other) {
                    defects.insert(format!("{path} ({tag})"));
                }
            }
        }
    }
}

fn integrity_tag(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("NULL".to_string()),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Some("EMPTY".to_string());
            }
            let upper = trimmed.to_ascii_uppercase();
            if let Some(token) = PLACEHOLDER_TOKENS.iter().find(|token| **token == upper) {
                return Some((*token).to_string());
            }
            PLACEHOLDER_MARKERS
                .iter()
                .any(|marker| upper.contains(marker))
                .then(|| "PLACEHOLDER".to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{find_integrity_defects, find_missing_keys};
    use serde_json::{json, Map, Value};

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    fn sorted(keys: std::collections::BTreeSet<String>) -> Vec<String> {
        keys.into_iter().collect()
    }

    #[test]
    fn unit_missing_subtree_expands_to_leaves() {
        let baseline = object(json!({"a": 1, "b": {"c": 2, "d": {"e": 3}}, "f": {}}));
        let keys = sorted(find_missing_keys(&baseline, &json!({"a": "other"})));
        assert_eq!(keys, vec!["b.c", "b.d.e", "f"]);
    }

    #[test]
    fn unit_present_scalar_against_mapping_is_not_flagged() {
        let baseline = object(json!({"db": {"host": "x"}}));
        assert!(find_missing_keys(&baseline, &json!({"db": "postgres://"})).is_empty());
    }

    #[test]
    fn unit_non_object_actual_reports_every_leaf() {
        let baseline = object(json!({"a": 1, "b": {"c": 2}}));
        let keys = sorted(find_missing_keys(&baseline, &Value::Null));
        assert_eq!(keys, vec!["a", "b.c"]);
    }

    #[test]
    fn functional_integrity_tags_cover_null_empty_tokens_and_markers() {
        let baseline = object(json!({
            "a": null,
            "b": "   ",
            "c": " todo ",
            "d": "sk-YOUR_KEY_HERE-123",
            "e": "please insert_secret here",
            "f": "YOUR_KEY_HERE",
            "g": "https://example.com",
            "h": 0,
            "nested": {"token": "placeholder", "ok": "value"}
        }));
        let keys = sorted(find_integrity_defects(&baseline));
        assert_eq!(
            keys,
            vec![
                "a (NULL)",
                "b (EMPTY)",
                "c (TODO)",
                "d (PLACEHOLDER)",
                "e (PLACEHOLDER)",
                "f (YOUR_KEY_HERE)",
                "nested.token (PLACEHOLDER)",
            ]
        );
    }

    #[test]
    fn regression_example_values_never_trigger_integrity() {
        let baseline = object(json!({"host": "example.com/api", "sample": "EXAMPLE"}));
        assert!(find_integrity_defects(&baseline).is_empty());
    }
}
