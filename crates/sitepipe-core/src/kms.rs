//! KMS keys for pipeline artifact encryption.

use serde_json::json;

use crate::iam::PolicyDocument;
use crate::stack::Properties;
use crate::{LogicalId, Value};

/// `AWS::KMS::Key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub description: Option<String>,
    pub enable_key_rotation: bool,
    pub policy: PolicyDocument,
}

impl Key {
    pub fn new(policy: PolicyDocument) -> Self {
        Self {
            description: None,
            enable_key_rotation: true,
            policy,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) fn properties(&self) -> Properties {
        Properties::new()
            .set_opt("Description", self.description.as_ref().map(|d| json!(d)))
            .set("EnableKeyRotation", json!(self.enable_key_rotation))
            .set("KeyPolicy", json!(self.policy))
    }
}

/// `AWS::KMS::Alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub target: LogicalId,
}

impl Alias {
    /// `name` is prefixed with `alias/` unless it already is.
    pub fn new(name: impl Into<String>, target: &LogicalId) -> Self {
        let name = name.into();
        let name = if name.starts_with("alias/") {
            name
        } else {
            format!("alias/{}", name)
        };
        Self {
            name,
            target: target.clone(),
        }
    }

    pub(crate) fn properties(&self) -> Properties {
        Properties::new()
            .set("AliasName", json!(self.name))
            .set("TargetKeyId", json!(Value::get_att(&self.target, "Arn")))
    }
}
