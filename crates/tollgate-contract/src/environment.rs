use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Deployment target resolved from a project and environment name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    pub health_url: String,
    #[serde(default)]
    pub db_url: Option<String>,
    pub config_template: String,
    #[serde(default)]
    pub repo: Option<String>,
}

impl EnvironmentDescriptor {
    /// Returns the database URL when one is configured. Blank values and the
    /// literal `none` count as unconfigured.
    pub fn database_url(&self) -> Option<&str> {
        self.db_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty() && !url.eq_ignore_ascii_case("none"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentDescriptor>,
}

/// Project → environment lookup table consumed by the evaluation core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentCatalog {
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectEntry>,
}

impl EnvironmentCatalog {
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn project_names(&self) -> Vec<String> {
        self.projects.keys().cloned().collect()
    }

    /// Resolves an environment, filling `repo` from the project when the
    /// environment does not name one.
    pub fn resolve(&self, project: &str, environment: &str) -> Option<EnvironmentDescriptor> {
        let entry = self.projects.get(project)?;
        let mut descriptor = entry.environments.get(environment)?.clone();
        if descriptor.repo.is_none() {
            descriptor.repo = entry.repo.clone();
        }
        Some(descriptor)
    }

    pub fn repo_for(&self, project: &str) -> Option<&str> {
        self.projects
            .get(project)
            .and_then(|entry| entry.repo.as_deref())
    }

    /// Finds the first environment named `environment` in any project.
    pub fn find_environment(&self, environment: &str) -> Option<EnvironmentDescriptor> {
        self.projects
            .keys()
            .find_map(|project| self.resolve(project, environment))
    }
}
