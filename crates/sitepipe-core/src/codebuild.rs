//! CodeBuild projects driven by CodePipeline.

use serde_json::json;

use crate::stack::Properties;
use crate::{LogicalId, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComputeType {
    #[default]
    Small,
    Medium,
    Large,
    X2Large,
}

impl std::fmt::Display for ComputeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputeType::Small => write!(f, "BUILD_GENERAL1_SMALL"),
            ComputeType::Medium => write!(f, "BUILD_GENERAL1_MEDIUM"),
            ComputeType::Large => write!(f, "BUILD_GENERAL1_LARGE"),
            ComputeType::X2Large => write!(f, "BUILD_GENERAL1_2XLARGE"),
        }
    }
}

/// Curated CodeBuild Linux images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinuxBuildImage {
    #[default]
    Standard5_0,
    Standard6_0,
    Standard7_0,
}

impl std::fmt::Display for LinuxBuildImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinuxBuildImage::Standard5_0 => write!(f, "aws/codebuild/standard:5.0"),
            LinuxBuildImage::Standard6_0 => write!(f, "aws/codebuild/standard:6.0"),
            LinuxBuildImage::Standard7_0 => write!(f, "aws/codebuild/standard:7.0"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnvironment {
    pub compute_type: ComputeType,
    pub image: LinuxBuildImage,
    pub privileged: bool,
}

/// Files handed back to the pipeline as the action's output artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifacts {
    pub base_directory: String,
    pub files: Vec<String>,
}

/// An inline `buildspec` (version 0.2), rendered as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSpec {
    pub install: Vec<String>,
    pub build: Vec<String>,
    pub artifacts: Option<BuildArtifacts>,
}

impl BuildSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_install<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.install.extend(commands.into_iter().map(Into::into));
        self
    }

    pub fn with_build<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build.extend(commands.into_iter().map(Into::into));
        self
    }

    pub fn with_artifacts(mut self, base_directory: impl Into<String>) -> Self {
        self.artifacts = Some(BuildArtifacts {
            base_directory: base_directory.into(),
            files: vec!["**/*".to_string()],
        });
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut phases = serde_json::Map::new();
        if !self.install.is_empty() {
            phases.insert("install".to_string(), json!({"commands": self.install}));
        }
        phases.insert("build".to_string(), json!({"commands": self.build}));

        let mut spec = serde_json::Map::new();
        spec.insert("version".to_string(), json!("0.2"));
        spec.insert("phases".to_string(), serde_json::Value::Object(phases));
        if let Some(artifacts) = &self.artifacts {
            spec.insert(
                "artifacts".to_string(),
                json!({"base-directory": artifacts.base_directory, "files": artifacts.files}),
            );
        }
        serde_json::Value::Object(spec)
    }
}

/// `AWS::CodeBuild::Project` whose source and artifacts come from CodePipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub description: Option<String>,
    pub environment: BuildEnvironment,
    pub build_spec: BuildSpec,
    pub service_role: LogicalId,
    pub encryption_key: Option<LogicalId>,
}

impl Project {
    pub fn new(build_spec: BuildSpec, service_role: &LogicalId) -> Self {
        Self {
            description: None,
            environment: BuildEnvironment::default(),
            build_spec,
            service_role: service_role.clone(),
            encryption_key: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_environment(mut self, environment: BuildEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_encryption_key(mut self, key: &LogicalId) -> Self {
        self.encryption_key = Some(key.clone());
        self
    }

    pub(crate) fn properties(&self) -> Properties {
        Properties::new()
            .set_opt("Description", self.description.as_ref().map(|d| json!(d)))
            .set(
                "Source",
                json!({"Type": "CODEPIPELINE", "BuildSpec": self.build_spec.to_json().to_string()}),
            )
            .set("Artifacts", json!({"Type": "CODEPIPELINE"}))
            .set(
                "Environment",
                json!({
                    "Type": "LINUX_CONTAINER",
                    "ComputeType": self.environment.compute_type.to_string(),
                    "Image": self.environment.image.to_string(),
                    "PrivilegedMode": self.environment.privileged,
                    "ImagePullCredentialsType": "CODEBUILD",
                }),
            )
            .set(
                "ServiceRole",
                json!(Value::get_att(&self.service_role, "Arn")),
            )
            .set_opt(
                "EncryptionKey",
                self.encryption_key
                    .as_ref()
                    .map(|key| json!(Value::get_att(key, "Arn"))),
            )
    }
}
