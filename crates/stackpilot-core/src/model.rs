//! Data model for the Portainer resources the engine works with.
//!
//! Everything here is transient: environments, stacks and images are
//! re-fetched from the instance on every run, nothing is persisted.

use serde::{Deserialize, Serialize};

/// A compute endpoint registered within a Portainer instance.
#[derive(Debug, Clone, Deserialize)]
pub struct Environment {
    #[serde(rename = "Id")]
    pub id: i64,

    #[serde(rename = "Name", default)]
    pub name: String,
}

/// A deployed stack within an environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Stack {
    #[serde(rename = "Id")]
    pub id: i64,

    #[serde(rename = "Name")]
    pub name: String,

    /// Present when the stack is deployed from a git repository rather
    /// than from inline file content.
    #[serde(rename = "GitConfig", default)]
    pub git_config: Option<StackGitConfig>,

    /// KEY=VALUE pairs, passed back verbatim on redeploy.
    #[serde(rename = "Env", default)]
    pub env: Vec<String>,

    #[serde(rename = "Webhook", default)]
    pub webhook: Option<String>,
}

/// Git deployment source of a stack.
#[derive(Debug, Clone, Deserialize)]
pub struct StackGitConfig {
    #[serde(rename = "ReferenceName", default)]
    pub reference_name: String,

    #[serde(rename = "Authentication", default)]
    pub authentication: Option<GitAuth>,
}

/// Git credentials attached to a stack's git config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitAuth {
    #[serde(rename = "Username", default)]
    pub username: Option<String>,

    #[serde(rename = "Password", default)]
    pub password: Option<String>,

    #[serde(rename = "GitCredentialID", default)]
    pub credential_id: Option<i64>,
}

impl GitAuth {
    /// Portainer expects `RepositoryAuthentication` to be set when either a
    /// username/password pair or a stored git credential is supplied.
    /// Empty strings count as absent.
    pub fn requires_authentication(&self) -> bool {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        (has(&self.username) && has(&self.password)) || self.credential_id.is_some()
    }
}

/// Result of an image freshness probe for a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    Skipped,
    NeedsUpdate,
}

impl RefreshOutcome {
    /// Parse the `Status` string reported by Portainer. Matching is
    /// case-insensitive; any value outside the known set maps to
    /// `NeedsUpdate`, so unknown statuses fail open towards a redeploy.
    pub fn from_status(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "updated" => Self::Updated,
            "skipped" => Self::Skipped,
            _ => Self::NeedsUpdate,
        }
    }

    /// True when the stack's images are current and no redeploy is needed.
    pub fn is_current(self) -> bool {
        matches!(self, Self::Updated | Self::Skipped)
    }
}

/// A container image as reported by the environment's Docker endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Image {
    #[serde(rename = "Id", alias = "id", default)]
    pub id: String,

    #[serde(rename = "Tags", alias = "tags", default)]
    pub tags: Vec<String>,

    /// Whether any stack in the environment still references this image.
    #[serde(rename = "Used", alias = "used", default)]
    pub used: bool,
}

impl Image {
    /// First tag if present, otherwise the raw id.
    pub fn display_name(&self) -> &str {
        self.tags
            .first()
            .map(String::as_str)
            .filter(|tag| !tag.is_empty())
            .unwrap_or(&self.id)
    }
}

/// Body of the content-based stack update (PUT /api/stacks/{id}).
#[derive(Debug, Clone, Serialize)]
pub struct StackUpdateRequest {
    #[serde(rename = "StackFileContent")]
    pub stack_file_content: String,

    #[serde(rename = "Env")]
    pub env: Vec<String>,

    /// Portainer expects the environment id in the body under `id`.
    #[serde(rename = "id")]
    pub id: i64,

    #[serde(rename = "PullImage")]
    pub pull_image: bool,

    #[serde(rename = "Prune")]
    pub prune: bool,

    #[serde(rename = "Webhook")]
    pub webhook: Option<String>,
}

/// Body of the git redeploy (PUT /api/stacks/{id}/git/redeploy).
#[derive(Debug, Clone, Serialize)]
pub struct GitRedeployRequest {
    #[serde(rename = "PullImage")]
    pub pull_image: bool,

    #[serde(rename = "RepositoryAuthentication")]
    pub repository_authentication: bool,

    #[serde(rename = "RepositoryGitCredentialID")]
    pub repository_git_credential_id: Option<i64>,

    #[serde(rename = "RepositoryPassword")]
    pub repository_password: Option<String>,

    #[serde(rename = "RepositoryReferenceName")]
    pub repository_reference_name: String,

    #[serde(rename = "RepositoryUsername")]
    pub repository_username: Option<String>,

    #[serde(rename = "Env")]
    pub env: Vec<String>,

    #[serde(rename = "Prune")]
    pub prune: bool,
}
