use std::path::Path;

use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::AuditError;

const POM_SCALAR_FIELDS: [&str; 6] = [
    "groupId",
    "artifactId",
    "version",
    "packaging",
    "name",
    "description",
];
/// Sections whose nested `groupId`/`version`/`name` tags do not describe the
/// project itself. Outer sections come first so nested ones are already gone.
const POM_NESTED_SECTIONS: [&str; 17] = [
    "dependencyManagement",
    "profiles",
    "build",
    "reporting",
    "parent",
    "dependencies",
    "plugins",
    "modules",
    "developers",
    "contributors",
    "organization",
    "licenses",
    "scm",
    "repositories",
    "pluginRepositories",
    "distributionManagement",
    "mailingLists",
];

/// Enumerates the baseline formats recognised by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineFormat {
    Json,
    Yaml,
    Dotenv,
    Properties,
    MavenPom,
    Dockerfile,
    Unknown,
}

impl BaselineFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            BaselineFormat::Json => "json",
            BaselineFormat::Yaml => "yaml",
            BaselineFormat::Dotenv => "dotenv",
            BaselineFormat::Properties => "properties",
            BaselineFormat::MavenPom => "pom",
            BaselineFormat::Dockerfile => "dockerfile",
            BaselineFormat::Unknown => "json-or-yaml",
        }
    }

    pub fn detect(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.contains("dockerfile") {
            Self::Dockerfile
        } else if name.ends_with(".json") {
            Self::Json
        } else if name.ends_with(".yaml") || name.ends_with(".yml") {
            Self::Yaml
        } else if is_dotenv_name(&name) {
            Self::Dotenv
        } else if name.ends_with(".properties") {
            Self::Properties
        } else if name.ends_with(".xml") {
            Self::MavenPom
        } else {
            Self::Unknown
        }
    }
}

pub(crate) fn is_dotenv_name(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    lower.starts_with(".env") || lower.ends_with(".env")
}

/// Parses baseline text into a JSON tree.
pub fn parse_baseline(format: BaselineFormat, text: &str) -> Result<Value, AuditError> {
    match format {
        BaselineFormat::Json => parse_json(text),
        BaselineFormat::Yaml => parse_yaml(text),
        BaselineFormat::Dotenv => Ok(Value::Object(string_map(parse_dotenv(text)))),
        BaselineFormat::Properties => Ok(Value::Object(string_map(parse_properties(text)))),
        BaselineFormat::MavenPom => parse_maven_pom(text).map(Value::Object),
        BaselineFormat::Dockerfile => Ok(Value::Object(string_map(parse_dockerfile(text)))),
        BaselineFormat::Unknown => parse_json(text).or_else(|json_error| {
            parse_yaml(text).map_err(|yaml_error| AuditError::Parse {
                format: BaselineFormat::Unknown.as_str(),
                message: format!("json: {json_error}; yaml: {yaml_error}"),
            })
        }),
    }
}

fn string_map(entries: Vec<(String, String)>) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect()
}

fn parse_json(text: &str) -> Result<Value, AuditError> {
    serde_json::from_str(text).map_err(|error| AuditError::Parse {
        format: BaselineFormat::Json.as_str(),
        message: error.to_string(),
    })
}

fn parse_yaml(text: &str) -> Result<Value, AuditError> {
    let value = serde_yaml::from_str::<serde_yaml::Value>(text).map_err(|error| {
        AuditError::Parse {
            format: BaselineFormat::Yaml.as_str(),
            message: error.to_string(),
        }
    })?;
    Ok(yaml_to_json(value))
}

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(flag) => Value::Bool(flag),
        serde_yaml::Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Value::Number(int.into())
            } else if let Some(uint) = number.as_u64() {
                Value::Number(uint.into())
            } else {
                number
                    .as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(text) => Value::String(text),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(key, value)| (yaml_key_to_string(key), yaml_to_json(value)))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key_to_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(text) => text,
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Bool(flag) => flag.to_string(),
        serde_yaml::Value::Number(number) => number.to_string(),
        other => serde_yaml::to_string(&other)
            .map(|text| text.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Parses `KEY=VALUE` lines. Blank lines and `#` comments are skipped, an
/// `export ` prefix is dropped, and matching surrounding quotes are removed.
pub fn parse_dotenv(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn parse_properties(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                return None;
            }
            let (key, value) = match line.find(['=', ':']) {
                Some(index) => (&line[..index], &line[index + 1..]),
                None => (line, ""),
            };
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

const POM_COMMENT_PATTERN: &str = r"(?s)<!--.*?-->";
const POM_LEAF_PATTERN: &str = r"<([A-Za-z_][\w.\-]*)(?:\s[^>]*)?>([^<]*)</([A-Za-z_][\w.\-]*)\s*>|<([A-Za-z_][\w.\-]*)\s*/>";

fn compile_pom_pattern(pattern: &str) -> Result<Regex, AuditError> {
    Regex::new(pattern).map_err(|error| AuditError::Parse {
        format: BaselineFormat::MavenPom.as_str(),
        message: error.to_string(),
    })
}

fn section_pattern(tag: &str) -> Result<Regex, AuditError> {
    compile_pom_pattern(&format!(
        r"(?s)<{tag}(?:\s[^>]*)?>.*?</{tag}\s*>|<{tag}\s*/>"
    ))
}

fn parse_maven_pom(text: &str) -> Result<Map<String, Value>, AuditError> {
    if !text.contains("<project") {
        return Err(AuditError::Parse {
            format: BaselineFormat::MavenPom.as_str(),
            message: "missing <project> root element".to_string(),
        });
    }
    let leaf_pattern = compile_pom_pattern(POM_LEAF_PATTERN)?;
    let mut body = compile_pom_pattern(POM_COMMENT_PATTERN)?
        .replace_all(text, "")
        .into_owned();
    for section in POM_NESTED_SECTIONS {
        body = section_pattern(section)?.replace_all(&body, "").into_owned();
    }

    let mut fields = Map::new();
    let properties = section_pattern("properties")?;
    if let Some(block) = properties.find(&body) {
        for captures in leaf_pattern.captures_iter(block.as_str()) {
            if let Some(tag) = captures.get(4) {
                fields.insert(format!("prop.{}", tag.as_str()), Value::String(String::new()));
                continue;
            }
            let (Some(open), Some(value), Some(close)) =
                (captures.get(1), captures.get(2), captures.get(3))
            else {
                continue;
            };
            if open.as_str() == close.as_str() && open.as_str() != "properties" {
                fields.insert(
                    format!("prop.{}", open.as_str()),
                    Value::String(value.as_str().trim().to_string()),
                );
            }
        }
    }
    let body = properties.replace_all(&body, "").into_owned();

    for captures in leaf_pattern.captures_iter(&body) {
        let (Some(open), Some(value), Some(close)) =
            (captures.get(1), captures.get(2), captures.get(3))
        else {
            continue;
        };
        let tag = open.as_str();
        if tag != close.as_str() || !POM_SCALAR_FIELDS.contains(&tag) {
            continue;
        }
        fields
            .entry(tag.to_string())
            .or_insert_with(|| Value::String(value.as_str().trim().to_string()));
    }
    Ok(fields)
}

/// Collects `ENV` declarations in both the `ENV key value` and
/// `ENV key=value ...` forms. Backslash continuations are joined first.
fn parse_dockerfile(text: &str) -> Vec<(String, String)> {
    let mut instructions = Vec::new();
    let mut pending = String::new();
    for line in text.lines() {
        let trimmed = line.trim_end();
        if pending.is_empty() && trimmed.trim_start().starts_with('#') {
            continue;
        }
        if let Some(continued) = trimmed.strip_suffix('\\') {
            pending.push_str(continued);
            pending.push(' ');
            continue;
        }
        pending.push_str(trimmed);
        instructions.push(std::mem::take(&mut pending));
    }
    if !pending.is_empty() {
        instructions.push(pending);
    }

    let mut entries = Vec::new();
    for instruction in instructions {
        let instruction = instruction.trim();
        let Some((keyword, rest)) = instruction.split_once(char::is_whitespace) else {
            continue;
        };
        if !keyword.eq_ignore_ascii_case("ENV") {
            continue;
        }
        let rest = rest.trim();
        let first_token = rest.split_whitespace().next().unwrap_or_default();
        if first_token.contains('=') {
            for token in split_shell_words(rest) {
                if let Some((key, value)) = token.split_once('=') {
                    if !key.is_empty() {
                        entries.push((key.to_string(), value.to_string()));
                    }
                }
            }
        } else if let Some((key, value)) = rest.split_once(char::is_whitespace) {
            entries.push((key.to_string(), unquote(value.trim()).to_string()));
        } else if !rest.is_empty() {
            entries.push((rest.to_string(), String::new()));
        }
    }
    entries
}

/// Splits on whitespace outside quotes, dropping the quote characters.
fn split_shell_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some(open), ch) if ch == open => quote = None,
            (None, '"' | '\'') => quote = Some(ch),
            (_, '\\') => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            (None, ch) if ch.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            (_, ch) => current.push(ch),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::{parse_baseline, parse_dotenv, BaselineFormat};
    use serde_json::json;
    use std::path::Path;

    #[test]
    fn unit_detect_uses_file_name() {
        let cases = [
            ("config/app.json", BaselineFormat::Json),
            ("values.YML", BaselineFormat::Yaml),
            (".env.production", BaselineFormat::Dotenv),
            ("staging.env", BaselineFormat::Dotenv),
            ("application.properties", BaselineFormat::Properties),
            ("pom.xml", BaselineFormat::MavenPom),
            ("Dockerfile.prod", BaselineFormat::Dockerfile),
            ("docker/api.dockerfile", BaselineFormat::Dockerfile),
            ("settings.conf", BaselineFormat::Unknown),
        ];
        for (path, expected) in cases {
            assert_eq!(BaselineFormat::detect(Path::new(path)), expected, "{path}");
        }
    }

    #[test]
    fn unit_dotenv_strips_export_and_quotes() {
        let parsed = parse_dotenv(
            "# comment\n\nexport API_KEY=\"abc\"\nNAME='svc'\nEMPTY=   \nMIXED=\"x'\nnot a pair\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("API_KEY".to_string(), "abc".to_string()),
                ("NAME".to_string(), "svc".to_string()),
                ("EMPTY".to_string(), String::new()),
                ("MIXED".to_string(), "\"x'".to_string()),
            ]
        );
    }

    #[test]
    fn unit_yaml_non_string_keys_are_stringified() {
        let value = parse_baseline(BaselineFormat::Yaml, "1: one\ntrue: yes\nnested:\n  a: 2\n")
            .expect("yaml");
        assert_eq!(value, json!({"1": "one", "true": "yes", "nested": {"a": 2}}));
    }

    #[test]
    fn functional_properties_accept_equals_and_colon() {
        let value = parse_baseline(
            BaselineFormat::Properties,
            "! bang comment\n# hash comment\nserver.port=8080\nspring.url: jdbc:postgresql://db\nflag\n",
        )
        .expect("properties");
        assert_eq!(
            value,
            json!({
                "server.port": "8080",
                "spring.url": "jdbc:postgresql://db",
                "flag": ""
            })
        );
    }

    #[test]
    fn functional_pom_reads_project_fields_and_properties_only() {
        let pom = r#"<?xml version="1.0"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <!-- <version>9.9.9</version> -->
  <parent>
    <groupId>org.springframework.boot</groupId>
    <artifactId>spring-boot-starter-parent</artifactId>
    <version>3.2.0</version>
  </parent>
  <groupId>com.acme</groupId>
  <artifactId>orders</artifactId>
  <version>1.4.0</version>
  <packaging>jar</packaging>
  <name>Orders Service</name>
  <properties>
    <java.version>17</java.version>
    <db.password></db.password>
    <flag/>
  </properties>
  <dependencies>
    <dependency>
      <groupId>org.postgresql</groupId>
      <artifactId>postgresql</artifactId>
      <version>42.7.0</version>
    </dependency>
  </dependencies>
  <build>
    <plugins>
      <plugin><artifactId>maven-surefire-plugin</artifactId></plugin>
    </plugins>
  </build>
</project>
"#;
        let value = parse_baseline(BaselineFormat::MavenPom, pom).expect("pom");
        assert_eq!(
            value,
            json!({
                "groupId": "com.acme",
                "artifactId": "orders",
                "version": "1.4.0",
                "packaging": "jar",
                "name": "Orders Service",
                "prop.java.version": "17",
                "prop.db.password": "",
                "prop.flag": ""
            })
        );
    }

    #[test]
    fn unit_pom_without_project_root_fails() {
        assert!(parse_baseline(BaselineFormat::MavenPom, "<settings/>").is_err());
    }

    #[test]
    fn functional_dockerfile_env_forms() {
        let dockerfile = "FROM rust:1.80\n# ENV IGNORED=1\nENV APP_ENV production\nenv A=1 B=\"two words\" \\\n    C=3\nRUN echo done\n";
        let value = parse_baseline(BaselineFormat::Dockerfile, dockerfile).expect("dockerfile");
        assert_eq!(
            value,
            json!({"APP_ENV": "production", "A": "1", "B": "two words", "C": "3"})
        );
    }

    #[test]
    fn unit_unknown_extension_falls_back_to_yaml() {
        let value = parse_baseline(BaselineFormat::Unknown, "a: 1\n").expect("yaml fallback");
        assert_eq!(value, json!({"a": 1}));
        let value = parse_baseline(BaselineFormat::Unknown, r#"{"a": 1}"#).expect("json");
        assert_eq!(value, json!({"a": 1}));
        assert!(parse_baseline(BaselineFormat::Unknown, "a: [1,\n").is_err());
    }
}
