//! Project configuration parsing (`config/project.yaml`).

use crate::profiles::CredentialSource;
use crate::{ConfigError, ConfigResult};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use sitepipe_core::Environment;
use sitepipe_core::iam::{Effect, PolicyStatement};
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::warn;

static ACCOUNT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{12}$").unwrap());

static REGION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-gov|-iso[a-z]*)?-[a-z]+-\d+$").unwrap());

/// Longest deployment name. The stage stack name
/// `staticsiteDeployment{Name}-staticsiteDeployment{Name}` must fit in 128 characters.
pub const MAX_DEPLOYMENT_NAME_LEN: usize = 43;

// Deployment names become profile names, stage ids, action names and bucket suffixes.
static DEPLOYMENT_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^[A-Za-z]([A-Za-z0-9-]{{0,{}}}[A-Za-z0-9])?$",
        MAX_DEPLOYMENT_NAME_LEN - 2
    ))
    .unwrap()
});

static BUCKET_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,46}$").unwrap());

// Full S3 bucket name, checked once the deployment suffix is applied.
static BUCKET_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").unwrap());

/// A named deployment target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    /// Deployment name (e.g., "dev"). Also the credentials profile name.
    pub name: String,
    pub env: Environment,
}

/// Commands and permissions of the synth build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthSettings {
    pub install_commands: Vec<String>,
    pub build_commands: Vec<String>,
    pub synth_command: String,
    /// Extra statements attached to the synth build role.
    pub additional_policy: Vec<PolicyStatement>,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            install_commands: Vec::new(),
            build_commands: vec!["cargo install --locked --path crates/sitepipe-cli".to_string()],
            synth_command: "sitepipe synth --output cdk.out".to_string(),
            additional_policy: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Deployment that hosts the pipeline itself.
    pub account: String,
    pub branch: String,
    pub credential_source: CredentialSource,
    pub synth: SynthSettings,
}

/// Static site hosting settings shared by every deployment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct SiteSettings {
    /// Content bucket name is `{prefix}-{deployment}`; generated when unset.
    pub bucket_name_prefix: Option<String>,
    /// Access-logs bucket name is `{prefix}-{deployment}`; generated when unset.
    pub logs_bucket_name_prefix: Option<String>,
    pub index_document: String,
    pub error_document: Option<String>,
    pub access_log_prefix: String,
    pub distribution_log_prefix: String,
    pub certificate_arn: Option<String>,
    pub aliases: Vec<String>,
    /// Directory produced by `npm run build` and synced to the bucket.
    pub build_directory: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            bucket_name_prefix: None,
            logs_bucket_name_prefix: None,
            index_document: "index.html".to_string(),
            error_document: Some("index.html".to_string()),
            access_log_prefix: "gatsbystaticsite".to_string(),
            distribution_log_prefix: "cfront-staticsite".to_string(),
            certificate_arn: None,
            aliases: Vec::new(),
            build_directory: "public".to_string(),
        }
    }
}

impl SiteSettings {
    pub fn bucket_name(&self, deployment: &str) -> Option<String> {
        self.bucket_name_prefix
            .as_ref()
            .map(|prefix| format!("{}-{}", prefix, deployment.to_lowercase()))
    }

    pub fn logs_bucket_name(&self, deployment: &str) -> Option<String> {
        self.logs_bucket_name_prefix
            .as_ref()
            .map(|prefix| format!("{}-{}", prefix, deployment.to_lowercase()))
    }
}

/// The parsed and validated project configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Deployment targets in file order; this is the pipeline stage order.
    pub deployments: Vec<DeploymentTarget>,
    pub pipeline: PipelineSettings,
    pub site: SiteSettings,
}

impl ProjectConfig {
    pub fn deployment(&self, name: &str) -> Option<&DeploymentTarget> {
        self.deployments.iter().find(|d| d.name == name)
    }

    /// Environment of the deployment hosting the pipeline.
    pub fn pipeline_env(&self) -> ConfigResult<&Environment> {
        self.deployment(&self.pipeline.account)
            .map(|d| &d.env)
            .ok_or_else(|| {
                ConfigError::InvalidReference(format!(
                    "Pipeline.Account '{}' is not a deployment",
                    self.pipeline.account
                ))
            })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawProject {
    deployment: Option<serde_yaml::Mapping>,
    pipeline: Option<RawPipeline>,
    #[serde(default)]
    site: SiteSettings,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawAccount {
    #[serde(deserialize_with = "account_number")]
    account_number: String,
    region: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawPipeline {
    account: Option<String>,
    branch: Option<String>,
    credential_source: Option<String>,
    #[serde(default)]
    synth: RawSynth,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawSynth {
    install_commands: Option<Vec<String>>,
    build_commands: Option<Vec<String>>,
    synth_command: Option<String>,
    #[serde(default)]
    additional_policy: Vec<RawStatement>,
}

#[derive(Deserialize)]
struct RawStatement {
    effect: String,
    actions: Vec<String>,
    #[serde(default)]
    resources: Vec<String>,
}

// Unquoted account numbers arrive as YAML integers.
fn account_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected an account number, found {:?}",
            other
        ))),
    }
}

/// Parse a project configuration from YAML text.
pub fn parse_project(yaml: &str) -> ConfigResult<ProjectConfig> {
    let raw: RawProject = serde_yaml::from_str(yaml)?;

    let mapping = raw
        .deployment
        .ok_or_else(|| ConfigError::MissingField("Deployment".to_string()))?;
    let mut deployments = Vec::with_capacity(mapping.len());
    let mut names = HashSet::new();
    for (key, value) in mapping {
        let name = key
            .as_str()
            .ok_or_else(|| ConfigError::invalid("Deployment", "deployment names must be strings"))?
            .to_string();
        if !names.insert(name.to_lowercase()) {
            return Err(ConfigError::Duplicate(format!("deployment '{}'", name)));
        }
        let account: RawAccount = serde_yaml::from_value(value)?;
        deployments.push(parse_deployment(name, account)?);
    }
    if deployments.is_empty() {
        return Err(ConfigError::MissingField(
            "Deployment (at least one deployment target)".to_string(),
        ));
    }

    let pipeline_raw = raw
        .pipeline
        .ok_or_else(|| ConfigError::MissingField("Pipeline".to_string()))?;
    let pipeline = parse_pipeline_settings(pipeline_raw, &deployments)?;

    validate_site(&raw.site)?;
    for deployment in &deployments {
        validate_bucket_names(&raw.site, &deployment.name)?;
    }

    let pipeline_region = deployments
        .iter()
        .find(|d| d.name == pipeline.account)
        .map(|d| d.env.region.clone());
    for deployment in &deployments {
        if Some(&deployment.env.region) != pipeline_region.as_ref() {
            return Err(ConfigError::invalid(
                format!("Deployment.{}.Region", deployment.name),
                "every deployment must share the pipeline's region",
            ));
        }
    }

    Ok(ProjectConfig {
        deployments,
        pipeline,
        site: raw.site,
    })
}

/// Read and parse a project configuration file.
pub fn load_project(path: &Path) -> ConfigResult<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_project(&content)
}

fn parse_deployment(name: String, account: RawAccount) -> ConfigResult<DeploymentTarget> {
    if !DEPLOYMENT_NAME_REGEX.is_match(&name) {
        return Err(ConfigError::invalid(
            format!("Deployment.{}", name),
            format!(
                "names must start with a letter, end with a letter or digit, use only letters, digits and '-', and be at most {} characters long",
                MAX_DEPLOYMENT_NAME_LEN
            ),
        ));
    }
    if !ACCOUNT_REGEX.is_match(&account.account_number) {
        return Err(ConfigError::invalid(
            format!("Deployment.{}.AccountNumber", name),
            format!(
                "'{}' is not a 12 digit account number (quote it if it has leading zeros)",
                account.account_number
            ),
        ));
    }
    if !REGION_REGEX.is_match(&account.region) {
        return Err(ConfigError::invalid(
            format!("Deployment.{}.Region", name),
            format!("'{}' is not a region name", account.region),
        ));
    }
    Ok(DeploymentTarget {
        name,
        env: Environment::new(account.account_number, account.region),
    })
}

fn parse_pipeline_settings(
    raw: RawPipeline,
    deployments: &[DeploymentTarget],
) -> ConfigResult<PipelineSettings> {
    let account = match raw.account {
        Some(account) => {
            if !deployments.iter().any(|d| d.name == account) {
                return Err(ConfigError::InvalidReference(format!(
                    "Pipeline.Account '{}' is not a deployment",
                    account
                )));
            }
            account
        }
        None => deployments[0].name.clone(),
    };

    let credential_source = match raw.credential_source {
        Some(source) => source
            .parse()
            .map_err(|e: String| ConfigError::invalid("Pipeline.CredentialSource", e))?,
        None => CredentialSource::default(),
    };

    let defaults = SynthSettings::default();
    let mut additional_policy = Vec::with_capacity(raw.synth.additional_policy.len());
    for (index, statement) in raw.synth.additional_policy.into_iter().enumerate() {
        let field = format!("Pipeline.Synth.AdditionalPolicy[{}]", index);
        let effect: Effect = statement
            .effect
            .parse()
            .map_err(|e: String| ConfigError::invalid(&field, e))?;
        if statement.actions.is_empty() {
            return Err(ConfigError::MissingField(format!("{}.actions", field)));
        }
        if statement.resources.is_empty() {
            return Err(ConfigError::MissingField(format!("{}.resources", field)));
        }
        if effect == Effect::Allow && statement.actions.iter().any(|a| a == "*") {
            warn!(statement = %field, "additional synth policy allows every action");
        }
        let stmt = PolicyStatement {
            effect,
            ..PolicyStatement::new()
        }
        .with_actions(statement.actions)
        .with_resources(statement.resources);
        additional_policy.push(stmt);
    }

    let synth_command = raw.synth.synth_command.unwrap_or(defaults.synth_command);
    if synth_command.trim().is_empty() {
        return Err(ConfigError::invalid(
            "Pipeline.Synth.SynthCommand",
            "must not be empty",
        ));
    }

    Ok(PipelineSettings {
        account,
        branch: raw.branch.unwrap_or_else(|| "master".to_string()),
        credential_source,
        synth: SynthSettings {
            install_commands: raw
                .synth
                .install_commands
                .unwrap_or(defaults.install_commands),
            build_commands: raw.synth.build_commands.unwrap_or(defaults.build_commands),
            synth_command,
            additional_policy,
        },
    })
}

fn validate_bucket_names(site: &SiteSettings, deployment: &str) -> ConfigResult<()> {
    for (field, name) in [
        ("Site.BucketNamePrefix", site.bucket_name(deployment)),
        ("Site.LogsBucketNamePrefix", site.logs_bucket_name(deployment)),
    ] {
        if let Some(name) = name {
            if !BUCKET_NAME_REGEX.is_match(&name) {
                return Err(ConfigError::invalid(
                    field,
                    format!(
                        "bucket name '{}' for deployment '{}' must be 3 to 63 lowercase letters, digits, '.' or '-'",
                        name, deployment
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn validate_site(site: &SiteSettings) -> ConfigResult<()> {
    for (field, prefix) in [
        ("Site.BucketNamePrefix", &site.bucket_name_prefix),
        ("Site.LogsBucketNamePrefix", &site.logs_bucket_name_prefix),
    ] {
        if let Some(prefix) = prefix {
            if !BUCKET_PREFIX_REGEX.is_match(prefix) {
                return Err(ConfigError::invalid(
                    field,
                    format!("'{}' is not a valid bucket name prefix", prefix),
                ));
            }
        }
    }
    if site.bucket_name_prefix.is_some() && site.bucket_name_prefix == site.logs_bucket_name_prefix
    {
        return Err(ConfigError::Duplicate(
            "Site.BucketNamePrefix equals Site.LogsBucketNamePrefix".to_string(),
        ));
    }
    if site.index_document.is_empty() {
        return Err(ConfigError::invalid("Site.IndexDocument", "must not be empty"));
    }
    if !site.aliases.is_empty() && site.certificate_arn.is_none() {
        return Err(ConfigError::MissingField(
            "Site.CertificateArn (required when Site.Aliases is set)".to_string(),
        ));
    }
    if let Some(arn) = &site.certificate_arn {
        if !arn.starts_with("arn:aws:acm:us-east-1:") {
            return Err(ConfigError::invalid(
                "Site.CertificateArn",
                "CloudFront certificates must be ACM certificates in us-east-1",
            ));
        }
    }
    if site.build_directory.is_empty() {
        return Err(ConfigError::invalid("Site.BuildDirectory", "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = r#"
Deployment:
  dev:
    AccountNumber: "111111111111"
    Region: us-east-1
  sandbox:
    AccountNumber: 222222222222
    Region: us-east-1
Pipeline:
  Synth:
    AdditionalPolicy:
      - effect: ALLOW
        actions: ["route53:ListHostedZones"]
        resources: ["*"]
      - effect: DENY
        actions: ["s3:DeleteBucket"]
        resources: ["*"]
"#;

    #[test]
    fn test_parse_project_keeps_deployment_order() {
        let project = parse_project(PROJECT).unwrap();
        let names: Vec<&str> = project.deployments.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["dev", "sandbox"]);
        assert_eq!(project.deployments[1].env.account, "222222222222");
        assert_eq!(project.pipeline.account, "dev");
        assert_eq!(project.pipeline.branch, "master");
        assert_eq!(project.pipeline_env().unwrap().account, "111111111111");
    }

    #[test]
    fn test_parse_additional_policy() {
        let project = parse_project(PROJECT).unwrap();
        let policy = &project.pipeline.synth.additional_policy;
        assert_eq!(policy.len(), 2);
        assert_eq!(policy[0].effect, Effect::Allow);
        assert_eq!(policy[0].actions, vec!["route53:ListHostedZones"]);
        assert_eq!(policy[1].effect, Effect::Deny);
    }

    #[test]
    fn test_defaults_applied() {
        let project = parse_project(PROJECT).unwrap();
        assert_eq!(project.site.index_document, "index.html");
        assert_eq!(project.site.build_directory, "public");
        assert_eq!(project.site.access_log_prefix, "gatsbystaticsite");
        assert_eq!(project.site.distribution_log_prefix, "cfront-staticsite");
        assert_eq!(project.site.bucket_name("dev"), None);
        assert_eq!(
            project.pipeline.synth.synth_command,
            "sitepipe synth --output cdk.out"
        );
        assert_eq!(project.pipeline.credential_source, CredentialSource::Ec2InstanceMetadata);
    }

    #[test]
    fn test_bucket_names_suffixed_per_deployment() {
        let site = SiteSettings {
            bucket_name_prefix: Some("staticsite202104".to_string()),
            ..SiteSettings::default()
        };
        assert_eq!(site.bucket_name("Sandbox").unwrap(), "staticsite202104-sandbox");
    }

    fn single_deployment(name: &str, site: &str) -> String {
        format!(
            "Deployment:\n  {}:\n    AccountNumber: \"111111111111\"\n    Region: us-east-1\nPipeline: {{}}\n{}",
            name, site
        )
    }

    #[test]
    fn test_underscore_deployment_name_rejected() {
        let yaml = single_deployment("dev_a", "Site:\n  BucketNamePrefix: staticsite202104\n");
        let err = parse_project(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert!(err.to_string().contains("dev_a"));
    }

    #[test]
    fn test_deployment_name_length() {
        let longest = format!("a{}", "b".repeat(MAX_DEPLOYMENT_NAME_LEN - 1));
        let project = parse_project(&single_deployment(&longest, "")).unwrap();
        assert_eq!(project.deployments[0].name, longest);

        let too_long = format!("a{}", "b".repeat(63));
        assert!(matches!(
            parse_project(&single_deployment(&too_long, "")).unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_trailing_hyphen_deployment_name_rejected() {
        assert!(parse_project(&single_deployment("dev-", "")).is_err());
        parse_project(&single_deployment("us-west-2", "")).unwrap();
    }

    #[test]
    fn test_bucket_name_over_limit_rejected() {
        let site = format!("Site:\n  BucketNamePrefix: {}\n", "s".repeat(40));
        let name = format!("d{}", "e".repeat(29));
        let err = parse_project(&single_deployment(&name, &site)).unwrap_err();
        match err {
            ConfigError::InvalidValue { field, .. } => assert_eq!(field, "Site.BucketNamePrefix"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_bucket_name_within_limit_accepted() {
        let site = "Site:\n  BucketNamePrefix: staticsite202104\n  LogsBucketNamePrefix: logs-202104\n";
        let name = format!("a{}", "b".repeat(MAX_DEPLOYMENT_NAME_LEN - 1));
        let project = parse_project(&single_deployment(&name, site)).unwrap();
        let bucket = project.site.bucket_name(&name).unwrap();
        assert!(bucket.len() <= 63);
    }

    #[test]
    fn test_missing_deployment_section() {
        let err = parse_project("Pipeline: {}\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn test_missing_pipeline_section() {
        let yaml = "Deployment:\n  dev:\n    AccountNumber: \"111111111111\"\n    Region: us-east-1\n";
        assert!(matches!(
            parse_project(yaml).unwrap_err(),
            ConfigError::MissingField(_)
        ));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            parse_project("Deployment: [unclosed").unwrap_err(),
            ConfigError::Yaml(_)
        ));
    }

    #[test]
    fn test_invalid_account_number() {
        let yaml = "Deployment:\n  dev:\n    AccountNumber: \"1234\"\n    Region: us-east-1\nPipeline: {}\n";
        assert!(matches!(
            parse_project(yaml).unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_invalid_region() {
        let yaml = "Deployment:\n  dev:\n    AccountNumber: \"111111111111\"\n    Region: moon\nPipeline: {}\n";
        assert!(matches!(
            parse_project(yaml).unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_unknown_pipeline_account() {
        let yaml = "Deployment:\n  dev:\n    AccountNumber: \"111111111111\"\n    Region: us-east-1\nPipeline:\n  Account: prod\n";
        assert!(matches!(
            parse_project(yaml).unwrap_err(),
            ConfigError::InvalidReference(_)
        ));
    }

    #[test]
    fn test_mixed_regions_rejected() {
        let yaml = r#"
Deployment:
  dev:
    AccountNumber: "111111111111"
    Region: us-east-1
  sandbox:
    AccountNumber: "222222222222"
    Region: eu-west-1
Pipeline: {}
"#;
        assert!(matches!(
            parse_project(yaml).unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_bad_policy_effect() {
        let yaml = r#"
Deployment:
  dev:
    AccountNumber: "111111111111"
    Region: us-east-1
Pipeline:
  Synth:
    AdditionalPolicy:
      - effect: PERMIT
        actions: ["s3:GetObject"]
        resources: ["*"]
"#;
        assert!(matches!(
            parse_project(yaml).unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_aliases_require_certificate() {
        let yaml = r#"
Deployment:
  dev:
    AccountNumber: "111111111111"
    Region: us-east-1
Pipeline: {}
Site:
  Aliases: [www.example.com]
"#;
        assert!(matches!(
            parse_project(yaml).unwrap_err(),
            ConfigError::MissingField(_)
        ));
    }

    #[test]
    fn test_unknown_site_key_rejected() {
        let yaml = r#"
Deployment:
  dev:
    AccountNumber: "111111111111"
    Region: us-east-1
Pipeline: {}
Site:
  IndexDoc: index.html
"#;
        assert!(matches!(parse_project(yaml).unwrap_err(), ConfigError::Yaml(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_project(Path::new("/nonexistent/project.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
