//! Provisioning-tool configuration (`cdk.json`).
//!
//! Only the `context` object is read:
//!
//! ```json
//! {
//!   "context": {
//!     "@aws-cdk/core:bootstrapQualifier": "hnb659fds",
//!     "repo": { "repo_name": "staticsite", "repo_desc": "Static site sources" },
//!     "pipeline": { "pipeline_name": "staticsite-pipeline" }
//!   }
//! }
//! ```

use crate::{ConfigError, ConfigResult};
use regex::Regex;
use serde::Deserialize;
use sitepipe_core::BootstrapRoles;
use std::path::Path;
use std::sync::LazyLock;

pub const QUALIFIER_KEY: &str = "@aws-cdk/core:bootstrapQualifier";

static QUALIFIER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,10}$").unwrap());

static PIPELINE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.@_-]{1,100}$").unwrap());

static REPO_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,100}$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSettings {
    pub name: String,
    pub description: String,
}

/// Values shared with the provisioning tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub bootstrap_qualifier: String,
    pub repo: RepoSettings,
    pub pipeline_name: String,
}

impl ToolConfig {
    pub fn roles(&self) -> BootstrapRoles {
        BootstrapRoles::new(&self.bootstrap_qualifier)
    }
}

#[derive(Deserialize)]
struct RawToolFile {
    context: Option<RawContext>,
}

#[derive(Deserialize)]
struct RawContext {
    #[serde(rename = "@aws-cdk/core:bootstrapQualifier")]
    bootstrap_qualifier: Option<String>,
    repo: Option<RawRepo>,
    pipeline: Option<RawPipeline>,
}

#[derive(Deserialize)]
struct RawRepo {
    repo_name: Option<String>,
    repo_desc: Option<String>,
}

#[derive(Deserialize)]
struct RawPipeline {
    pipeline_name: Option<String>,
}

fn required<T>(value: Option<T>, field: &str) -> ConfigResult<T> {
    value.ok_or_else(|| ConfigError::MissingField(field.to_string()))
}

/// Parse the tool configuration from JSON.
pub fn parse_tool_config(json: &str) -> ConfigResult<ToolConfig> {
    let raw: RawToolFile = serde_json::from_str(json)?;
    let context = required(raw.context, "context")?;

    let qualifier = required(
        context.bootstrap_qualifier,
        &format!("context.{}", QUALIFIER_KEY),
    )?;
    if !QUALIFIER_REGEX.is_match(&qualifier) {
        return Err(ConfigError::invalid(
            format!("context.{}", QUALIFIER_KEY),
            "qualifiers are 1-10 letters, digits, '-' or '_'",
        ));
    }

    let repo = required(context.repo, "context.repo")?;
    let repo_name = required(repo.repo_name, "context.repo.repo_name")?;
    if !REPO_NAME_REGEX.is_match(&repo_name) {
        return Err(ConfigError::invalid(
            "context.repo.repo_name",
            "repository names are 1-100 letters, digits, '.', '-' or '_'",
        ));
    }
    let repo_desc = required(repo.repo_desc, "context.repo.repo_desc")?;

    let pipeline = required(context.pipeline, "context.pipeline")?;
    let pipeline_name = required(pipeline.pipeline_name, "context.pipeline.pipeline_name")?;
    if !PIPELINE_NAME_REGEX.is_match(&pipeline_name) {
        return Err(ConfigError::invalid(
            "context.pipeline.pipeline_name",
            "pipeline names are 1-100 letters, digits, '.', '@', '-' or '_'",
        ));
    }

    Ok(ToolConfig {
        bootstrap_qualifier: qualifier,
        repo: RepoSettings {
            name: repo_name,
            description: repo_desc,
        },
        pipeline_name,
    })
}

pub fn load_tool_config(path: &Path) -> ConfigResult<ToolConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_tool_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepipe_core::Environment;

    const VALID: &str = r#"{
        "app": "sitepipe synth",
        "context": {
            "@aws-cdk/core:bootstrapQualifier": "hnb659fds",
            "repo": {"repo_name": "staticsite", "repo_desc": "Static site sources"},
            "pipeline": {"pipeline_name": "staticsite-pipeline"}
        }
    }"#;

    #[test]
    fn test_parse_tool_config() {
        let config = parse_tool_config(VALID).unwrap();
        assert_eq!(config.bootstrap_qualifier, "hnb659fds");
        assert_eq!(config.repo.name, "staticsite");
        assert_eq!(config.repo.description, "Static site sources");
        assert_eq!(config.pipeline_name, "staticsite-pipeline");
    }

    #[test]
    fn test_roles_use_qualifier() {
        let config = parse_tool_config(VALID).unwrap();
        let env = Environment::new("111111111111", "us-east-1");
        assert_eq!(
            config.roles().deploy_role_name(&env),
            "cdk-hnb659fds-deploy-role-111111111111-us-east-1"
        );
    }

    #[test]
    fn test_missing_qualifier() {
        let json = r#"{"context": {
            "repo": {"repo_name": "r", "repo_desc": "d"},
            "pipeline": {"pipeline_name": "p"}
        }}"#;
        match parse_tool_config(json).unwrap_err() {
            ConfigError::MissingField(field) => {
                assert_eq!(field, "context.@aws-cdk/core:bootstrapQualifier")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_nested_field() {
        let json = r#"{"context": {
            "@aws-cdk/core:bootstrapQualifier": "q1",
            "repo": {"repo_name": "r"},
            "pipeline": {"pipeline_name": "p"}
        }}"#;
        match parse_tool_config(json).unwrap_err() {
            ConfigError::MissingField(field) => assert_eq!(field, "context.repo.repo_desc"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_context() {
        let err = parse_tool_config(r#"{"app": "x"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "context"));
    }

    #[test]
    fn test_invalid_qualifier() {
        let json = VALID.replace("hnb659fds", "way-too-long-qualifier");
        assert!(matches!(
            parse_tool_config(&json).unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_invalid_pipeline_name() {
        let json = VALID.replace("staticsite-pipeline", "has spaces");
        assert!(parse_tool_config(&json).is_err());
    }
}
