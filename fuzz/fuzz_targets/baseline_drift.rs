#![no_main]

use libfuzzer_sys::fuzz_target;
use tollgate_audit::{find_integrity_defects, find_missing_keys, parse_baseline, BaselineFormat};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let Some((baseline, actual)) = text.split_once('\u{0}') else {
        return;
    };
    let Ok(baseline) = parse_baseline(BaselineFormat::Unknown, baseline) else {
        return;
    };
    let Some(baseline) = baseline.as_object() else {
        return;
    };
    let actual = parse_baseline(BaselineFormat::Unknown, actual).unwrap_or_default();

    let missing = find_missing_keys(baseline, &actual);
    let against_self = find_missing_keys(baseline, &serde_json::Value::Object(baseline.clone()));
    assert!(against_self.is_empty());
    assert!(missing.iter().all(|key| !key.is_empty()));
    let _ = find_integrity_defects(baseline);
});
