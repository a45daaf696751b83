//! Stacks: independently deployable groups of resources.

use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::cloudfront::{Distribution, OriginAccessIdentity};
use crate::codebuild::Project;
use crate::codecommit::Repository;
use crate::iam::{Policy, Role};
use crate::kms::{Alias, Key};
use crate::pipeline::Pipeline;
use crate::s3::{Bucket, BucketPolicy};
use crate::template::{Template, TemplateOutput, TemplateResource};
use crate::{ConstructPath, Environment, Error, LogicalId, Result, Tags, Value};

/// Resource properties, rendered as a JSON object without null entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(serde_json::Map<String, serde_json::Value>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: serde_json::Value) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn set_opt(self, key: &str, value: Option<serde_json::Value>) -> Self {
        match value {
            Some(value) => self.set(key, value),
            None => self,
        }
    }

    pub fn into_value(self) -> serde_json::Value {
        serde_json::Value::Object(self.0)
    }
}

/// What happens to the physical resource when it leaves the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    Retain,
    Destroy,
}

impl std::fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemovalPolicy::Retain => write!(f, "Retain"),
            RemovalPolicy::Destroy => write!(f, "Delete"),
        }
    }
}

/// Every resource type a stack can hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Bucket(Bucket),
    BucketPolicy(BucketPolicy),
    OriginAccessIdentity(OriginAccessIdentity),
    Distribution(Box<Distribution>),
    Repository(Repository),
    Project(Box<Project>),
    Pipeline(Box<Pipeline>),
    Role(Role),
    Policy(Policy),
    Key(Key),
    Alias(Alias),
}

impl ResourceKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::Bucket(_) => "AWS::S3::Bucket",
            ResourceKind::BucketPolicy(_) => "AWS::S3::BucketPolicy",
            ResourceKind::OriginAccessIdentity(_) => {
                "AWS::CloudFront::CloudFrontOriginAccessIdentity"
            }
            ResourceKind::Distribution(_) => "AWS::CloudFront::Distribution",
            ResourceKind::Repository(_) => "AWS::CodeCommit::Repository",
            ResourceKind::Project(_) => "AWS::CodeBuild::Project",
            ResourceKind::Pipeline(_) => "AWS::CodePipeline::Pipeline",
            ResourceKind::Role(_) => "AWS::IAM::Role",
            ResourceKind::Policy(_) => "AWS::IAM::Policy",
            ResourceKind::Key(_) => "AWS::KMS::Key",
            ResourceKind::Alias(_) => "AWS::KMS::Alias",
        }
    }

    /// Whether the type accepts a `Tags` property.
    pub fn taggable(&self) -> bool {
        !matches!(
            self,
            ResourceKind::BucketPolicy(_)
                | ResourceKind::OriginAccessIdentity(_)
                | ResourceKind::Policy(_)
                | ResourceKind::Alias(_)
        )
    }

    fn properties(&self) -> Properties {
        match self {
            ResourceKind::Bucket(b) => b.properties(),
            ResourceKind::BucketPolicy(p) => p.properties(),
            ResourceKind::OriginAccessIdentity(o) => o.properties(),
            ResourceKind::Distribution(d) => d.properties(),
            ResourceKind::Repository(r) => r.properties(),
            ResourceKind::Project(p) => p.properties(),
            ResourceKind::Pipeline(p) => p.properties(),
            ResourceKind::Role(r) => Properties::new()
                .set_opt("RoleName", r.role_name.as_ref().map(|n| json!(n)))
                .set_opt("Description", r.description.as_ref().map(|d| json!(d)))
                .set("AssumeRolePolicyDocument", json!(r.assume_role_policy())),
            ResourceKind::Policy(p) => Properties::new()
                .set("PolicyName", json!(p.policy_name))
                .set("PolicyDocument", json!(p.document))
                .set(
                    "Roles",
                    json!(p.roles.iter().map(Value::reference).collect::<Vec<_>>()),
                ),
            ResourceKind::Key(k) => k.properties(),
            ResourceKind::Alias(a) => a.properties(),
        }
    }

    /// Logical ids this resource names directly in its properties.
    fn references(&self) -> Vec<&LogicalId> {
        match self {
            ResourceKind::Bucket(b) => {
                let mut refs = Vec::new();
                if let Some(logging) = &b.access_logging {
                    refs.push(&logging.destination);
                }
                if let crate::s3::BucketEncryption::Kms(key) = &b.encryption {
                    refs.push(key);
                }
                refs
            }
            ResourceKind::BucketPolicy(p) => vec![&p.bucket],
            ResourceKind::Distribution(d) => {
                let mut refs = vec![d.origin_bucket(), &d.origin_access_identity];
                if let Some(logging) = &d.logging {
                    refs.push(&logging.bucket);
                }
                refs
            }
            ResourceKind::Project(p) => {
                let mut refs = vec![&p.service_role];
                refs.extend(p.encryption_key.iter());
                refs
            }
            ResourceKind::Pipeline(p) => {
                let mut refs = vec![&p.role, &p.artifact_bucket];
                refs.extend(p.encryption_key.iter());
                refs
            }
            ResourceKind::Policy(p) => p.roles.iter().collect(),
            ResourceKind::Alias(a) => vec![&a.target],
            ResourceKind::OriginAccessIdentity(_)
            | ResourceKind::Repository(_)
            | ResourceKind::Role(_)
            | ResourceKind::Key(_) => Vec::new(),
        }
    }

    /// Resource ids named by intrinsic values inside policy documents.
    fn policy_references(&self) -> Vec<&str> {
        match self {
            ResourceKind::BucketPolicy(p) => p.document.references(),
            ResourceKind::Policy(p) => p.document.references(),
            ResourceKind::Key(k) => k.policy.references(),
            _ => Vec::new(),
        }
    }
}

/// A resource declared in a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Stack-relative construct path the logical id was derived from.
    pub path: ConstructPath,
    pub kind: ResourceKind,
    pub removal_policy: Option<RemovalPolicy>,
    pub depends_on: BTreeSet<LogicalId>,
}

/// An output declared by a stack, readable by later pipeline actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutput {
    /// Name of the stack that declares the output.
    pub stack_name: String,
    /// Output key in the template.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OutputDef {
    value: Value,
    description: Option<String>,
}

/// A CloudFormation stack under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    /// Deployed stack name.
    pub name: String,
    /// Construct path of the stack itself.
    pub path: ConstructPath,
    pub env: Environment,
    pub description: Option<String>,
    resources: BTreeMap<LogicalId, Resource>,
    outputs: BTreeMap<String, OutputDef>,
    dependencies: BTreeSet<String>,
}

impl Stack {
    pub fn new(path: ConstructPath, name: impl Into<String>, env: Environment) -> Self {
        Self {
            name: name.into(),
            path,
            env,
            description: None,
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            dependencies: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a resource at `scope`, a path relative to this stack.
    pub fn add(&mut self, scope: ConstructPath, kind: ResourceKind) -> Result<LogicalId> {
        let id = LogicalId::from_path(&scope)?;
        if self.resources.contains_key(&id) {
            return Err(Error::Duplicate(format!(
                "resource '{}' in stack '{}'",
                scope, self.name
            )));
        }
        debug!(stack = %self.name, path = %scope, id = %id, kind = kind.type_name(), "adding resource");
        self.resources.insert(
            id.clone(),
            Resource {
                path: scope,
                kind,
                removal_policy: None,
                depends_on: BTreeSet::new(),
            },
        );
        Ok(id)
    }

    pub fn set_removal_policy(&mut self, id: &LogicalId, policy: RemovalPolicy) -> Result<()> {
        self.resource_mut(id)?.removal_policy = Some(policy);
        Ok(())
    }

    /// Record an ordering dependency that properties alone do not express.
    pub fn add_depends_on(&mut self, id: &LogicalId, dependency: &LogicalId) -> Result<()> {
        if !self.resources.contains_key(dependency) {
            return Err(Error::NotFound(format!(
                "resource '{}' in stack '{}'",
                dependency, self.name
            )));
        }
        self.resource_mut(id)?.depends_on.insert(dependency.clone());
        Ok(())
    }

    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        value: Value,
        description: Option<String>,
    ) -> Result<StackOutput> {
        let name = name.into();
        if !name.chars().all(|c| c.is_ascii_alphanumeric()) || name.is_empty() {
            return Err(Error::InvalidInput(format!(
                "output name must be alphanumeric: '{}'",
                name
            )));
        }
        if self.outputs.contains_key(&name) {
            return Err(Error::Duplicate(format!(
                "output '{}' in stack '{}'",
                name, self.name
            )));
        }
        self.outputs
            .insert(name.clone(), OutputDef { value, description });
        Ok(StackOutput {
            stack_name: self.name.clone(),
            name,
        })
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    /// Deploy `other` before this stack.
    pub fn add_dependency(&mut self, other: &str) {
        self.dependencies.insert(other.to_string());
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(String::as_str)
    }

    pub fn get(&self, id: &LogicalId) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn resources(&self) -> impl Iterator<Item = (&LogicalId, &Resource)> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn contains_id(&self, id: &str) -> bool {
        self.resources.keys().any(|known| known.as_str() == id)
    }

    fn resource_mut(&mut self, id: &LogicalId) -> Result<&mut Resource> {
        let stack = &self.name;
        self.resources
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("resource '{}' in stack '{}'", id, stack)))
    }

    /// Render the CloudFormation template, with `tags` on every taggable resource.
    pub fn to_template(&self, tags: &Tags) -> Result<Template> {
        let mut resources = BTreeMap::new();
        for (id, resource) in &self.resources {
            for reference in resource.kind.references() {
                if !self.resources.contains_key(reference) {
                    return Err(Error::NotFound(format!(
                        "'{}' references unknown resource '{}' in stack '{}'",
                        id, reference, self.name
                    )));
                }
            }

            for reference in resource.kind.policy_references() {
                if !self.contains_id(reference) {
                    return Err(Error::NotFound(format!(
                        "policy of '{}' references unknown resource '{}' in stack '{}'",
                        id, reference, self.name
                    )));
                }
            }

            let mut properties = resource.kind.properties();
            if resource.kind.taggable() && !tags.is_empty() {
                properties = properties.set("Tags", tags.to_json());
            }
            resources.insert(
                id.clone(),
                TemplateResource {
                    resource_type: resource.kind.type_name().to_string(),
                    properties: properties.into_value(),
                    depends_on: resource.depends_on.iter().cloned().collect(),
                    deletion_policy: resource.removal_policy.map(|p| p.to_string()),
                    update_replace_policy: resource.removal_policy.map(|p| p.to_string()),
                },
            );
        }

        for (name, output) in &self.outputs {
            for reference in output.value.references() {
                if !self.contains_id(reference) {
                    return Err(Error::NotFound(format!(
                        "output '{}' references unknown resource '{}' in stack '{}'",
                        name, reference, self.name
                    )));
                }
            }
        }

        let outputs = self
            .outputs
            .iter()
            .map(|(name, output)| {
                (
                    name.clone(),
                    TemplateOutput {
                        description: output.description.clone(),
                        value: output.value.clone(),
                    },
                )
            })
            .collect();

        Ok(Template::new(self.description.clone(), resources, outputs))
    }
}
