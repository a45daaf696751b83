//! Configuration loading for sitepipe.
//!
//! This crate handles parsing of:
//! - The project configuration (`config/project.yaml`)
//! - The tag map applied to every resource (`tags.json`)
//! - The provisioning tool configuration (`cdk.json`)
//! - Rendering and writing the credentials-profile file

pub mod error;
pub mod profiles;
pub mod project;
pub mod tags;
pub mod tool;

pub use error::{ConfigError, ConfigResult};
pub use profiles::{CredentialSource, Profile};
pub use project::{DeploymentTarget, PipelineSettings, ProjectConfig, SiteSettings, SynthSettings};
pub use tool::{RepoSettings, ToolConfig};
