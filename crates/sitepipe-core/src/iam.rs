//! IAM policy statements, documents, roles and inline policies.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::{LogicalId, Value};

pub const POLICY_VERSION: &str = "2012-10-17";

/// Whether a statement allows or denies its actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::Allow => write!(f, "Allow"),
            Effect::Deny => write!(f, "Deny"),
        }
    }
}

impl std::str::FromStr for Effect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ALLOW" => Ok(Effect::Allow),
            "DENY" => Ok(Effect::Deny),
            _ => Err(format!("Unknown policy effect: {}", s)),
        }
    }
}

/// Who a statement applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// A service principal, e.g. `codebuild.amazonaws.com`.
    Service(String),
    /// An account root or role ARN.
    Aws(Value),
    /// An S3 canonical user id, used for CloudFront origin access identities.
    CanonicalUser(Value),
}

impl Principal {
    pub fn service(name: impl Into<String>) -> Self {
        Principal::Service(name.into())
    }

    fn kind(&self) -> &'static str {
        match self {
            Principal::Service(_) => "Service",
            Principal::Aws(_) => "AWS",
            Principal::CanonicalUser(_) => "CanonicalUser",
        }
    }

    fn value(&self) -> Value {
        match self {
            Principal::Service(name) => Value::literal(name.clone()),
            Principal::Aws(v) | Principal::CanonicalUser(v) => v.clone(),
        }
    }
}

/// Serializes as a single element when there is one value, a list otherwise.
struct OneOrMany<'a, T>(&'a [T]);

impl<T: Serialize> Serialize for OneOrMany<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            [single] => single.serialize(serializer),
            many => many.serialize(serializer),
        }
    }
}

struct PrincipalBlock<'a>(&'a [Principal]);

impl Serialize for PrincipalBlock<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut grouped: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
        for principal in self.0 {
            grouped
                .entry(principal.kind())
                .or_default()
                .push(principal.value());
        }
        let mut map = serializer.serialize_map(Some(grouped.len()))?;
        for (kind, values) in &grouped {
            map.serialize_entry(kind, &OneOrMany(values))?;
        }
        map.end()
    }
}

/// A single statement of a policy document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyStatement {
    pub sid: Option<String>,
    pub effect: Effect,
    pub principals: Vec<Principal>,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow() -> Self {
        Self::new()
    }

    pub fn deny() -> Self {
        Self {
            effect: Effect::Deny,
            ..Self::default()
        }
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn with_resource(mut self, resource: impl Into<Value>) -> Self {
        self.resources.push(resource.into());
        self
    }

    pub fn with_resources<I, V>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.resources.extend(resources.into_iter().map(Into::into));
        self
    }

    /// Resource ids named by the principal and resource values.
    pub fn references(&self) -> Vec<&str> {
        self.principals
            .iter()
            .filter_map(|principal| match principal {
                Principal::Aws(v) | Principal::CanonicalUser(v) => Some(v),
                Principal::Service(_) => None,
            })
            .chain(self.resources.iter())
            .flat_map(Value::references)
            .collect()
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principals.push(principal);
        self
    }

    pub fn with_canonical_user_principal(self, canonical_user_id: Value) -> Self {
        self.with_principal(Principal::CanonicalUser(canonical_user_id))
    }
}

impl Serialize for PolicyStatement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(sid) = &self.sid {
            map.serialize_entry("Sid", sid)?;
        }
        map.serialize_entry("Effect", &self.effect)?;
        if !self.principals.is_empty() {
            map.serialize_entry("Principal", &PrincipalBlock(&self.principals))?;
        }
        map.serialize_entry("Action", &OneOrMany(&self.actions))?;
        if !self.resources.is_empty() {
            map.serialize_entry("Resource", &OneOrMany(&self.resources))?;
        }
        map.end()
    }
}

/// A versioned list of statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDocument {
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self { statements }
    }

    pub fn add_statement(&mut self, statement: PolicyStatement) {
        self.statements.push(statement);
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn references(&self) -> Vec<&str> {
        self.statements
            .iter()
            .flat_map(PolicyStatement::references)
            .collect()
    }
}

impl Serialize for PolicyDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("Version", POLICY_VERSION)?;
        map.serialize_entry("Statement", &self.statements)?;
        map.end()
    }
}

/// `AWS::IAM::Role`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub role_name: Option<String>,
    pub description: Option<String>,
    pub assumed_by: Principal,
}

impl Role {
    pub fn assumed_by(principal: Principal) -> Self {
        Self {
            role_name: None,
            description: None,
            assumed_by: principal,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn assume_role_policy(&self) -> PolicyDocument {
        PolicyDocument::new(vec![
            PolicyStatement::allow()
                .with_action("sts:AssumeRole")
                .with_principal(self.assumed_by.clone()),
        ])
    }
}

/// `AWS::IAM::Policy` attached inline to roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub policy_name: String,
    pub document: PolicyDocument,
    pub roles: Vec<LogicalId>,
}

impl Policy {
    pub fn new(policy_name: impl Into<String>, document: PolicyDocument) -> Self {
        Self {
            policy_name: policy_name.into(),
            document,
            roles: Vec::new(),
        }
    }

    pub fn attach_to(mut self, role: &LogicalId) -> Self {
        self.roles.push(role.clone());
        self
    }
}
