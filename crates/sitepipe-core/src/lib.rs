//! Core resource model for sitepipe.
//!
//! This crate contains:
//! - Construct paths and logical identifiers
//! - Deployment environments and bootstrap role naming
//! - Intrinsic values (`Ref`, `Fn::GetAtt`, `Fn::Join`, `Fn::Sub`)
//! - Resource descriptors (IAM, S3, CloudFront, KMS, CodeCommit, CodeBuild, CodePipeline)
//! - Stacks, tags and CloudFormation template rendering

pub mod cloudfront;
pub mod codebuild;
pub mod codecommit;
pub mod env;
pub mod error;
pub mod iam;
pub mod id;
pub mod kms;
pub mod pipeline;
pub mod s3;
pub mod stack;
pub mod tags;
pub mod template;
pub mod value;

pub use env::{BootstrapRoles, Environment};
pub use error::{Error, Result};
pub use id::{ConstructPath, LogicalId};
pub use stack::{Resource, Stack, StackOutput};
pub use tags::Tags;
pub use template::Template;
pub use value::Value;
