//! One deployment target: a stage holding the static site stack.

use crate::SynthResult;
use crate::static_site::{StaticSite, StaticSiteProps};
use sitepipe_config::{DeploymentTarget, SiteSettings};
use sitepipe_core::{ConstructPath, Environment, Stack, StackOutput};
use tracing::info;

const STAGE_ID_PREFIX: &str = "staticsiteDeployment";

/// CloudFormation stack name limit.
pub const MAX_STACK_NAME_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationStage {
    /// Construct id, e.g. `staticsiteDeploymentDev`. Also the pipeline stage name.
    pub id: String,
    /// Deployment name from the project configuration.
    pub name: String,
    pub env: Environment,
    pub stack: Stack,
    pub site: StaticSite,
}

impl ApplicationStage {
    pub fn new(deployment: &DeploymentTarget, site: &SiteSettings) -> SynthResult<Self> {
        let id = stage_id(&deployment.name);
        let stack_path = ConstructPath::root(&id).child(&id);
        let stack_name = format!("{}-{}", id, id);
        if stack_name.len() > MAX_STACK_NAME_LEN {
            return Err(sitepipe_core::Error::InvalidInput(format!(
                "stack name '{}' exceeds {} characters",
                stack_name, MAX_STACK_NAME_LEN
            ))
            .into());
        }

        let mut stack = Stack::new(stack_path, stack_name, deployment.env.clone())
            .with_description(format!(
                "Static site for the {} deployment",
                deployment.name
            ));
        let props = StaticSiteProps::from_settings(site, &deployment.name);
        let site = StaticSite::build(&mut stack, StaticSite::DEFAULT_ID, &props)?;

        info!(stage = %id, stack = %stack.name, env = %deployment.env, "application stage created");

        Ok(Self {
            id,
            name: deployment.name.clone(),
            env: deployment.env.clone(),
            stack,
            site,
        })
    }

    pub fn stack_name(&self) -> &str {
        &self.stack.name
    }

    /// Pascal-cased deployment name, used to suffix per-stage action names.
    pub fn suffix(&self) -> &str {
        &self.id[STAGE_ID_PREFIX.len()..]
    }

    pub fn source_bucket_name(&self) -> &StackOutput {
        &self.site.source_bucket_name
    }

    pub fn distribution_id(&self) -> &StackOutput {
        &self.site.distribution_id
    }
}

/// `staticsiteDeployment` followed by the Pascal-cased deployment name.
///
/// `-` splits words, so `us-west-prod` becomes `staticsiteDeploymentUsWestProd`.
pub fn stage_id(deployment: &str) -> String {
    let mut id = String::from(STAGE_ID_PREFIX);
    for word in deployment.split('-').filter(|w| !w.is_empty()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            id.extend(first.to_uppercase());
            id.push_str(chars.as_str());
        }
    }
    id
}
