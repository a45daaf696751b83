//! Origin access checks for CloudFront-served buckets.
//!
//! For every distribution in a stack:
//! - the origin bucket blocks all public access and is not KMS encrypted;
//! - at least one bucket policy statement grants the distribution's origin
//!   access identity read access;
//! - every allow statement on the origin bucket names only that identity,
//!   grants only read/list actions, and targets exactly the bucket ARN and its
//!   object namespace.

use crate::static_site::ORIGIN_READ_ACTIONS;
use crate::{SynthError, SynthResult};
use sitepipe_core::cloudfront::OriginAccessIdentity;
use sitepipe_core::iam::{Effect, Principal};
use sitepipe_core::s3::{bucket_arn, bucket_objects_arn};
use sitepipe_core::stack::ResourceKind;
use sitepipe_core::{LogicalId, Stack};
use tracing::debug;

pub fn check_origin_access(stack: &Stack) -> SynthResult<()> {
    for (id, resource) in stack.resources() {
        if let ResourceKind::Distribution(distribution) = &resource.kind {
            check_distribution(
                stack,
                id,
                distribution.origin_bucket(),
                &distribution.origin_access_identity,
            )?;
        }
    }
    Ok(())
}

fn check_distribution(
    stack: &Stack,
    distribution: &LogicalId,
    origin: &LogicalId,
    oai: &LogicalId,
) -> SynthResult<()> {
    let fail = |message: String| {
        SynthError::Audit(format!(
            "stack '{}', distribution '{}': {}",
            stack.name, distribution, message
        ))
    };

    let Some(ResourceKind::Bucket(bucket)) = stack.get(origin).map(|r| &r.kind) else {
        return Err(fail(format!("origin '{}' is not a bucket in this stack", origin)));
    };
    if !bucket.blocks_all_public_access() {
        return Err(fail(format!(
            "origin bucket '{}' does not block all public access",
            origin
        )));
    }
    if bucket.encryption.uses_kms() {
        return Err(fail(format!(
            "origin bucket '{}' uses KMS encryption, which an origin access identity cannot read",
            origin
        )));
    }
    if !matches!(
        stack.get(oai).map(|r| &r.kind),
        Some(ResourceKind::OriginAccessIdentity(_))
    ) {
        return Err(fail(format!(
            "'{}' is not an origin access identity in this stack",
            oai
        )));
    }

    let expected_principal = Principal::CanonicalUser(OriginAccessIdentity::canonical_user_id(oai));
    let expected_resources = [bucket_arn(origin), bucket_objects_arn(origin)];
    let mut granted = false;

    let policies = stack.resources().filter_map(|(_, r)| match &r.kind {
        ResourceKind::BucketPolicy(policy) if &policy.bucket == origin => Some(policy),
        _ => None,
    });
    for policy in policies {
        for statement in &policy.document.statements {
            if statement.effect == Effect::Deny {
                continue;
            }
            if statement.principals != [expected_principal.clone()] {
                return Err(fail(format!(
                    "bucket '{}' grants access to a principal other than the origin access identity",
                    origin
                )));
            }
            if let Some(action) = statement
                .actions
                .iter()
                .find(|a| !ORIGIN_READ_ACTIONS.contains(&a.as_str()))
            {
                return Err(fail(format!(
                    "bucket '{}' grants non-read action '{}'",
                    origin, action
                )));
            }
            let scoped = statement.resources.len() == expected_resources.len()
                && expected_resources
                    .iter()
                    .all(|r| statement.resources.contains(r));
            if !scoped {
                return Err(fail(format!(
                    "bucket '{}' policy is not scoped to the bucket and its objects",
                    origin
                )));
            }
            granted = true;
        }
    }

    if !granted {
        return Err(fail(format!(
            "no bucket policy grants the origin access identity read on '{}'",
            origin
        )));
    }
    debug!(stack = %stack.name, distribution = %distribution, "origin access verified");
    Ok(())
}
