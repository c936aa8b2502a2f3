// ABOUTME: Resolved run context captured once from the process environment.
// ABOUTME: Carries pipeline identity, git provenance, GitLab access, and credential variables.

use crate::types::RunId;
use std::collections::HashMap;

/// Token used to call the GitLab API, with the header it must be sent in.
#[derive(Clone, PartialEq, Eq)]
pub enum GitLabToken {
    /// `CI_JOB_TOKEN` inside a pipeline.
    Job(String),
    /// `GITLAB_API_TOKEN` for manual runs.
    Private(String),
}

impl GitLabToken {
    pub fn header_name(&self) -> &'static str {
        match self {
            GitLabToken::Job(_) => "JOB-TOKEN",
            GitLabToken::Private(_) => "PRIVATE-TOKEN",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            GitLabToken::Job(v) | GitLabToken::Private(v) => v,
        }
    }
}

impl std::fmt::Debug for GitLabToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GitLabToken({}: <redacted>)", self.header_name())
    }
}

/// Everything needed to reach a project's pipeline artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitLabAccess {
    pub api_url: String,
    pub project_id: String,
    pub token: GitLabToken,
}

/// Immutable snapshot of the environment a single invocation runs in.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    pub commit_sha: String,
    pub branch: Option<String>,
    pub commit_message: String,
    pub pipeline_url: Option<String>,
    pub actor: String,
    pub deployment_env: Option<String>,
    gitlab: Result<GitLabAccess, String>,
    vars: HashMap<String, String>,
}

impl RunContext {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let run_id = match get("CI_PIPELINE_ID") {
            Some(raw) => RunId::new(&raw).unwrap_or_else(|e| {
                tracing::warn!("ignoring CI_PIPELINE_ID {raw:?}: {e}");
                RunId::local()
            }),
            None => RunId::local(),
        };

        let token = get("CI_JOB_TOKEN")
            .map(GitLabToken::Job)
            .or_else(|| get("GITLAB_API_TOKEN").map(GitLabToken::Private));

        let gitlab = match (token, get("CI_PROJECT_ID"), get("CI_API_V4_URL")) {
            (None, _, _) => {
                Err("set CI_JOB_TOKEN (in a pipeline) or GITLAB_API_TOKEN (manual runs)".to_string())
            }
            (Some(token), Some(project_id), Some(api_url)) => Ok(GitLabAccess {
                api_url: api_url.trim_end_matches('/').to_string(),
                project_id,
                token,
            }),
            (Some(_), _, _) => Err("CI_PROJECT_ID and CI_API_V4_URL must be set".to_string()),
        };

        Self {
            run_id,
            commit_sha: get("CI_COMMIT_SHA").unwrap_or_else(|| "local".to_string()),
            branch: get("CI_COMMIT_BRANCH"),
            commit_message: get("CI_COMMIT_MESSAGE").unwrap_or_default(),
            pipeline_url: get("CI_PIPELINE_URL"),
            actor: get("GITLAB_USER_LOGIN")
                .or_else(|| get("USER"))
                .unwrap_or_else(|| "unknown".to_string()),
            deployment_env: get("DEPLOYMENT_ENV"),
            gitlab,
            vars,
        }
    }

    /// Value of an environment variable as captured at startup; empty counts as unset.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub(crate) fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Whether `DEPLOYMENT_ENV=local` selects the local configuration overlay.
    pub fn uses_local_overrides(&self) -> bool {
        self.deployment_env.as_deref() == Some("local")
    }

    /// GitLab API access, or the reason it is unavailable.
    pub fn gitlab(&self) -> Result<&GitLabAccess, &str> {
        self.gitlab.as_ref().map_err(String::as_str)
    }

    /// Branch name for display, `unknown` outside a pipeline.
    pub fn branch_or_unknown(&self) -> &str {
        self.branch.as_deref().unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_outside_pipeline() {
        let ctx = RunContext::from_vars(HashMap::new());
        assert!(ctx.run_id.is_local());
        assert_eq!(ctx.commit_sha, "local");
        assert_eq!(ctx.actor, "unknown");
        assert!(ctx.gitlab().is_err());
    }

    #[test]
    fn job_token_wins_over_private_token() {
        let ctx = RunContext::from_vars(vars(&[
            ("CI_JOB_TOKEN", "job"),
            ("GITLAB_API_TOKEN", "private"),
            ("CI_PROJECT_ID", "42"),
            ("CI_API_V4_URL", "https://gitlab.example.com/api/v4/"),
        ]));
        let access = ctx.gitlab().unwrap();
        assert_eq!(access.token.header_name(), "JOB-TOKEN");
        assert_eq!(access.api_url, "https://gitlab.example.com/api/v4");
    }

    #[test]
    fn token_without_project_is_unavailable() {
        let ctx = RunContext::from_vars(vars(&[("GITLAB_API_TOKEN", "private")]));
        assert!(ctx.gitlab().unwrap_err().contains("CI_PROJECT_ID"));
    }

    #[test]
    fn empty_variables_count_as_unset() {
        let ctx = RunContext::from_vars(vars(&[("PPM_USER", ""), ("GITLAB_USER_LOGIN", "alice")]));
        assert_eq!(ctx.var("PPM_USER"), None);
        assert_eq!(ctx.actor, "alice");
    }
}
