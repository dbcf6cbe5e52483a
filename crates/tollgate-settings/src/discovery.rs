use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_SCHEMA_PROJECT_NAME: &str = "Enterprise Readiness Hub";

const MAX_DISCOVERY_DEPTH: usize = 8;
const IGNORED_DIRECTORIES: [&str; 4] = ["node_modules", "target", ".venv", ".git"];

struct Marker {
    path: &'static str,
    kind: &'static str,
    hint: &'static str,
}

// Earlier markers win unless the project was only seen as a plain service.
const MARKERS: [Marker; 8] = [
    Marker { path: "package.json", kind: "frontend", hint: "React/Node" },
    Marker { path: "pom.xml", kind: "backend", hint: "Spring Boot" },
    Marker { path: "pyproject.toml", kind: "backend", hint: "Python" },
    Marker { path: "requirements.txt", kind: "backend", hint: "Python" },
    Marker { path: "Dockerfile", kind: "service", hint: "Containerized" },
    Marker { path: "docker-compose.yml", kind: "orchestration", hint: "Docker Compose" },
    Marker { path: "k8s", kind: "infrastructure", hint: "Kubernetes" },
    Marker { path: ".github/workflows", kind: "ci", hint: "GitHub Actions" },
];

/// A project inferred from marker files in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredProject {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    pub hint: String,
    pub repo: String,
}

/// Scans `root` for polyglot project markers.
///
/// Projects are keyed by the name of the directory holding the marker; the
/// workspace root itself is named after its resolved directory name, or
/// `root-project` when that is empty. A `.github/workflows` marker belongs
/// to the directory containing `.github`.
pub fn discover_workspace_projects(root: &Path) -> Result<BTreeMap<String, DiscoveredProject>> {
    let mut entries = Vec::new();
    collect_entries(root, root, 0, &mut entries)
        .with_context(|| format!("failed to scan workspace {}", root.display()))?;
    entries.sort();

    let mut discovered = BTreeMap::<String, DiscoveredProject>::new();
    for marker in &MARKERS {
        let marker_path = Path::new(marker.path);
        let depth = marker_path.components().count();
        for relative in entries.iter().filter(|entry| entry.ends_with(marker_path)) {
            let Some(project_relative) = relative.ancestors().nth(depth) else {
                continue;
            };
            let project_dir = root.join(project_relative);
            let name = project_name(&project_dir);
            let replace = discovered
                .get(&name)
                .map_or(true, |existing| existing.kind == "service");
            if replace {
                discovered.insert(
                    name.clone(),
                    DiscoveredProject {
                        kind: marker.kind.to_string(),
                        path: display_relative(project_relative),
                        hint: marker.hint.to_string(),
                        repo: format!("auto/{name}"),
                    },
                );
            }
        }
    }
    tracing::debug!(root = %root.display(), projects = discovered.len(), "workspace discovery finished");
    Ok(discovered)
}

fn collect_entries(root: &Path, dir: &Path, depth: usize, out: &mut Vec<PathBuf>) -> Result<()> {
    if depth > MAX_DISCOVERY_DEPTH {
        return Ok(());
    }
    let listing =
        std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in listing {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if IGNORED_DIRECTORIES.contains(&file_name.as_ref()) {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
        let is_dir = entry
            .file_type()
            .with_context(|| format!("failed to stat {}", path.display()))?
            .is_dir();
        out.push(relative);
        if is_dir {
            collect_entries(root, &path, depth + 1, out)?;
        }
    }
    Ok(())
}

fn project_name(project_dir: &Path) -> String {
    let resolved = project_dir
        .canonicalize()
        .unwrap_or_else(|_| project_dir.to_path_buf());
    resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "root-project".to_string())
}

fn display_relative(relative: &Path) -> String {
    if relative.as_os_str().is_empty() {
        ".".to_string()
    } else {
        relative.to_string_lossy().into_owned()
    }
}

fn template_for(project: &DiscoveredProject) -> &'static str {
    match (project.kind.as_str(), project.hint.as_str()) {
        ("backend", "Spring Boot") => "src/main/resources/application-staging.yml",
        ("backend", _) => "config.yaml",
        ("infrastructure", _) => "values.yaml",
        _ => "config/staging.json",
    }
}

/// Builds a starter `readiness_schema.json` document from discovered
/// projects, falling back to a single sample project.
pub fn default_schema_document(discovered: &BTreeMap<String, DiscoveredProject>) -> Value {
    let mut projects = serde_json::Map::new();
    for (name, project) in discovered {
        let template = if project.path == "." {
            template_for(project).to_string()
        } else {
            format!("{}/{}", project.path, template_for(project))
        };
        projects.insert(
            name.clone(),
            json!({
                "repo": project.repo,
                "type_hint": project.hint,
                "environments": {
                    "staging": {
                        "health_url": format!("http://localhost:8080/{name}/health"),
                        "db_url": "none",
                        "config_template": template,
                    }
                }
            }),
        );
    }
    if projects.is_empty() {
        projects.insert(
            "frontend".to_string(),
            json!({
                "repo": "owner/frontend-react-app",
                "environments": {
                    "staging": {
                        "health_url": "http://localhost:8080/frontend/health",
                        "db_url": "none",
                        "config_template": "frontend-react-app/config/staging.json",
                    }
                }
            }),
        );
    }
    json!({
        "project_name": DEFAULT_SCHEMA_PROJECT_NAME,
        "projects": projects,
        "mandatory_env_vars": ["COHERE_API_KEY", "GITHUB_TOKEN"],
        "timeouts": {"health_check_seconds": 10},
    })
}

/// Writes a starter schema to `path` and returns the written document.
pub fn generate_default_config(
    path: &Path,
    discovered: &BTreeMap<String, DiscoveredProject>,
) -> Result<Value> {
    let document = default_schema_document(discovered);
    let mut encoded =
        serde_json::to_string_pretty(&document).context("failed to encode default schema")?;
    encoded.push('\n');
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, encoded)
        .map_err(|error| anyhow!("failed to write {}: {error}", path.display()))?;
    tracing::info!(path = %path.display(), projects = discovered.len(), "default readiness schema generated");
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::{default_schema_document, discover_workspace_projects, generate_default_config};
    use crate::schema::load_schema_with_env;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn functional_discovery_classifies_marker_directories() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("web")).expect("web");
        fs::write(root.join("web/package.json"), "{}").expect("package.json");
        fs::create_dir_all(root.join("api")).expect("api");
        fs::write(root.join("api/Dockerfile"), "FROM scratch").expect("Dockerfile");
        fs::write(root.join("api/pom.xml"), "<project/>").expect("pom.xml");
        fs::create_dir_all(root.join("deploy/k8s")).expect("k8s");

        let discovered = discover_workspace_projects(root).expect("discover");

        assert_eq!(discovered["web"].kind, "frontend");
        assert_eq!(discovered["api"].kind, "backend");
        assert_eq!(discovered["api"].hint, "Spring Boot");
        assert_eq!(discovered["api"].repo, "auto/api");
        assert_eq!(discovered["deploy"].kind, "infrastructure");
    }

    #[test]
    fn regression_discovery_ignores_vendored_directories() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("node_modules/left-pad")).expect("node_modules");
        fs::write(root.join("node_modules/left-pad/package.json"), "{}").expect("package.json");
        fs::create_dir_all(root.join("target/debug")).expect("target");
        fs::write(root.join("target/debug/Dockerfile"), "").expect("Dockerfile");

        let discovered = discover_workspace_projects(root).expect("discover");
        assert!(discovered.is_empty(), "unexpected: {discovered:?}");
    }

    #[test]
    fn functional_workflows_marker_names_repository_root() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("shop");
        fs::create_dir_all(root.join(".github/workflows")).expect("workflows");

        let discovered = discover_workspace_projects(&root).expect("discover");
        assert_eq!(discovered["shop"].kind, "ci");
        assert_eq!(discovered["shop"].path, ".");
    }

    #[test]
    fn functional_default_document_falls_back_to_sample_project() {
        let document = default_schema_document(&BTreeMap::new());
        assert_eq!(document["project_name"], "Enterprise Readiness Hub");
        assert!(document["projects"]["frontend"]["environments"]["staging"].is_object());
    }

    #[test]
    fn integration_generated_schema_loads_cleanly() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("workspace");
        fs::create_dir_all(root.join("svc")).expect("svc");
        fs::write(root.join("svc/pyproject.toml"), "[project]").expect("pyproject");
        let discovered = discover_workspace_projects(&root).expect("discover");

        let path = temp.path().join("out/readiness_schema.json");
        generate_default_config(&path, &discovered).expect("generate");

        let schema =
            load_schema_with_env(&path, true, |_| Some("set".to_string())).expect("load");
        let project = &schema.projects["svc"];
        assert_eq!(project.type_hint.as_deref(), Some("Python"));
        assert_eq!(
            project.environments["staging"].config_template,
            "svc/config.yaml"
        );
    }
}
