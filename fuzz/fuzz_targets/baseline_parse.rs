#![no_main]

use libfuzzer_sys::fuzz_target;
use tollgate_audit::{parse_baseline, parse_dotenv, BaselineFormat};

const FORMATS: [BaselineFormat; 7] = [
    BaselineFormat::Json,
    BaselineFormat::Yaml,
    BaselineFormat::Dotenv,
    BaselineFormat::Properties,
    BaselineFormat::MavenPom,
    BaselineFormat::Dockerfile,
    BaselineFormat::Unknown,
];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let text = String::from_utf8_lossy(rest);
    let format = FORMATS[usize::from(selector) % FORMATS.len()];
    let _ = parse_baseline(format, &text);
    for (key, _) in parse_dotenv(&text) {
        assert!(!key.is_empty());
    }
});
