//! Deployment environments and bootstrap role naming.

use serde::{Deserialize, Serialize};

/// Target account and region for a stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Environment {
    pub account: String,
    pub region: String,
}

impl Environment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }

    /// Root principal ARN of the account.
    pub fn root_arn(&self) -> String {
        format!("arn:aws:iam::{}:root", self.account)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "aws://{}/{}", self.account, self.region)
    }
}

/// Names of the roles created when an account/region pair is bootstrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapRoles {
    qualifier: String,
}

impl BootstrapRoles {
    pub fn new(qualifier: impl Into<String>) -> Self {
        Self {
            qualifier: qualifier.into(),
        }
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    /// Role assumed by CloudFormation while it executes a change set.
    pub fn cfn_exec_role_name(&self, env: &Environment) -> String {
        format!(
            "cdk-{}-cfn-exec-role-{}-{}",
            self.qualifier, env.account, env.region
        )
    }

    pub fn cfn_exec_role_arn(&self, env: &Environment) -> String {
        role_arn(&env.account, &self.cfn_exec_role_name(env))
    }

    /// Role the pipeline assumes to create and execute change sets.
    pub fn deploy_role_name(&self, env: &Environment) -> String {
        format!(
            "cdk-{}-deploy-role-{}-{}",
            self.qualifier, env.account, env.region
        )
    }

    pub fn deploy_role_arn(&self, env: &Environment) -> String {
        role_arn(&env.account, &self.deploy_role_name(env))
    }
}

fn role_arn(account: &str, name: &str) -> String {
    format!("arn:aws:iam::{}:role/{}", account, name)
}
