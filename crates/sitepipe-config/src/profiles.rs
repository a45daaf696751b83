//! Credentials-profile rendering.
//!
//! One profile per deployment target, each assuming that account's
//! CloudFormation execution role:
//!
//! ```text
//! [profile dev]
//! role_arn = arn:aws:iam::111111111111:role/cdk-hnb659fds-cfn-exec-role-111111111111-us-east-1
//! region = us-east-1
//! credential_source = Ec2InstanceMetadata
//! ```

use crate::ConfigResult;
use crate::project::DeploymentTarget;
use sitepipe_core::BootstrapRoles;
use std::path::Path;
use tracing::info;

/// Where the CLI gets the base credentials used to assume the role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CredentialSource {
    #[default]
    Ec2InstanceMetadata,
    EcsContainer,
    Environment,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::Ec2InstanceMetadata => write!(f, "Ec2InstanceMetadata"),
            CredentialSource::EcsContainer => write!(f, "EcsContainer"),
            CredentialSource::Environment => write!(f, "Environment"),
        }
    }
}

impl std::str::FromStr for CredentialSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ec2instancemetadata" => Ok(CredentialSource::Ec2InstanceMetadata),
            "ecscontainer" => Ok(CredentialSource::EcsContainer),
            "environment" => Ok(CredentialSource::Environment),
            _ => Err(format!("Unknown credential source: {}", s)),
        }
    }
}

/// A named profile assuming a deployment account's execution role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub role_arn: String,
    pub region: String,
    pub credential_source: CredentialSource,
}

impl Profile {
    fn section_header(&self) -> String {
        if self.name == "default" {
            "[default]".to_string()
        } else {
            format!("[profile {}]", self.name)
        }
    }

    /// `aws configure set` commands that recreate this profile on a build host.
    pub fn configure_commands(&self) -> Vec<String> {
        vec![
            format!(
                "aws configure set role_arn {} --profile {}",
                self.role_arn, self.name
            ),
            format!(
                "aws configure set region {} --profile {}",
                self.region, self.name
            ),
            format!(
                "aws configure set credential_source {} --profile {}",
                self.credential_source, self.name
            ),
        ]
    }
}

/// Build one profile per deployment, in deployment order.
pub fn profiles_for(
    deployments: &[DeploymentTarget],
    roles: &BootstrapRoles,
    credential_source: CredentialSource,
) -> Vec<Profile> {
    deployments
        .iter()
        .map(|deployment| Profile {
            name: deployment.name.clone(),
            role_arn: roles.cfn_exec_role_arn(&deployment.env),
            region: deployment.env.region.clone(),
            credential_source,
        })
        .collect()
}

/// Render profiles in the shared config file format.
pub fn render_profiles(profiles: &[Profile]) -> String {
    let mut out = String::new();
    for (index, profile) in profiles.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&format!(
            "{}\nrole_arn = {}\nregion = {}\ncredential_source = {}\n",
            profile.section_header(),
            profile.role_arn,
            profile.region,
            profile.credential_source
        ));
    }
    out
}

/// Write the profile file, creating parent directories.
pub fn write_profiles(path: &Path, profiles: &[Profile]) -> ConfigResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_profiles(profiles))?;
    info!(path = %path.display(), profiles = profiles.len(), "wrote credentials profiles");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepipe_core::Environment;

    fn deployments() -> Vec<DeploymentTarget> {
        vec![
            DeploymentTarget {
                name: "dev".to_string(),
                env: Environment::new("111111111111", "us-east-1"),
            },
            DeploymentTarget {
                name: "sandbox".to_string(),
                env: Environment::new("222222222222", "us-east-1"),
            },
        ]
    }

    #[test]
    fn test_one_profile_per_deployment() {
        let roles = BootstrapRoles::new("hnb659fds");
        let profiles = profiles_for(&deployments(), &roles, CredentialSource::default());
        assert_eq!(profiles.len(), 2);
        assert_eq!(
            profiles[1].role_arn,
            "arn:aws:iam::222222222222:role/cdk-hnb659fds-cfn-exec-role-222222222222-us-east-1"
        );
        assert_eq!(profiles[1].region, "us-east-1");
    }

    #[test]
    fn test_render_profiles() {
        let roles = BootstrapRoles::new("q1");
        let rendered = render_profiles(&profiles_for(
            &deployments(),
            &roles,
            CredentialSource::Ec2InstanceMetadata,
        ));
        let expected = "\
[profile dev]
role_arn = arn:aws:iam::111111111111:role/cdk-q1-cfn-exec-role-111111111111-us-east-1
region = us-east-1
credential_source = Ec2InstanceMetadata

[profile sandbox]
role_arn = arn:aws:iam::222222222222:role/cdk-q1-cfn-exec-role-222222222222-us-east-1
region = us-east-1
credential_source = Ec2InstanceMetadata
";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_default_profile_header() {
        let profile = Profile {
            name: "default".to_string(),
            role_arn: "arn:aws:iam::1:role/r".to_string(),
            region: "us-east-1".to_string(),
            credential_source: CredentialSource::EcsContainer,
        };
        assert!(render_profiles(&[profile]).starts_with("[default]\n"));
    }

    #[test]
    fn test_configure_commands() {
        let roles = BootstrapRoles::new("q1");
        let profiles = profiles_for(&deployments(), &roles, CredentialSource::default());
        let commands = profiles[0].configure_commands();
        assert_eq!(commands.len(), 3);
        assert!(commands[0].starts_with("aws configure set role_arn arn:aws:iam::111111111111:role/"));
        assert!(commands[0].ends_with("--profile dev"));
        assert_eq!(
            commands[2],
            "aws configure set credential_source Ec2InstanceMetadata --profile dev"
        );
    }

    #[test]
    fn test_credential_source_from_str() {
        assert_eq!(
            "EcsContainer".parse::<CredentialSource>().unwrap(),
            CredentialSource::EcsContainer
        );
        assert!("instance".parse::<CredentialSource>().is_err());
    }

    #[test]
    fn test_write_profiles_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".aws").join("config");
        let roles = BootstrapRoles::new("q1");
        write_profiles(&path, &profiles_for(&deployments(), &roles, CredentialSource::default()))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("[profile ").count(), 2);
    }
}
