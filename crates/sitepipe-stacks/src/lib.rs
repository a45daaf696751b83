//! Constructs that assemble the static site and its delivery pipeline.
//!
//! A `PipelineStack` owns one `ApplicationStage` per deployment target, each
//! holding a stack with a `StaticSite`. `CloudAssembly` renders them all into
//! CloudFormation templates plus a manifest.

pub mod application_stage;
pub mod assembly;
pub mod audit;
pub mod error;
pub mod pipeline_stack;
pub mod static_site;

pub use application_stage::ApplicationStage;
pub use assembly::{CloudAssembly, Manifest, StackArtifact};
pub use error::{SynthError, SynthResult};
pub use pipeline_stack::PipelineStack;
pub use static_site::{StaticSite, StaticSiteProps};
