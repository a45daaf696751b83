//! S3 content bucket served through a CloudFront distribution.

use sitepipe_config::SiteSettings;
use sitepipe_core::cloudfront::{
    AllowedMethods, Behavior, CachePolicy, Distribution, OriginAccessIdentity, PriceClass,
    SecurityPolicyProtocol,
};
use sitepipe_core::iam::{PolicyDocument, PolicyStatement};
use sitepipe_core::s3::{
    BlockPublicAccess, Bucket, BucketEncryption, BucketPolicy, bucket_arn, bucket_objects_arn,
};
use sitepipe_core::stack::{RemovalPolicy, ResourceKind};
use sitepipe_core::{ConstructPath, LogicalId, Stack, StackOutput, Value};
use tracing::debug;

/// Read-only actions granted to the origin access identity.
pub const ORIGIN_READ_ACTIONS: [&str; 3] = ["s3:GetBucket*", "s3:GetObject*", "s3:List*"];

pub const SOURCE_BUCKET_OUTPUT: &str = "sourceBucketName";
pub const DISTRIBUTION_ID_OUTPUT: &str = "distributionId";
pub const DISTRIBUTION_DOMAIN_OUTPUT: &str = "distributionDomainName";

/// Per-deployment inputs of a static site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSiteProps {
    pub bucket_name: Option<String>,
    pub logs_bucket_name: Option<String>,
    pub index_document: String,
    pub error_document: Option<String>,
    pub access_log_prefix: String,
    pub distribution_log_prefix: String,
    pub certificate_arn: Option<String>,
    pub aliases: Vec<String>,
}

impl StaticSiteProps {
    pub fn from_settings(site: &SiteSettings, deployment: &str) -> Self {
        Self {
            bucket_name: site.bucket_name(deployment),
            logs_bucket_name: site.logs_bucket_name(deployment),
            index_document: site.index_document.clone(),
            error_document: site.error_document.clone(),
            access_log_prefix: site.access_log_prefix.clone(),
            distribution_log_prefix: site.distribution_log_prefix.clone(),
            certificate_arn: site.certificate_arn.clone(),
            aliases: site.aliases.clone(),
        }
    }
}

impl Default for StaticSiteProps {
    fn default() -> Self {
        Self::from_settings(&SiteSettings::default(), "")
    }
}

/// Logical ids of the resources a static site added to its stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSite {
    pub path: ConstructPath,
    pub logs_bucket: LogicalId,
    pub bucket: LogicalId,
    pub origin_access_identity: LogicalId,
    pub distribution: LogicalId,
    pub bucket_policy: LogicalId,
    pub source_bucket_name: StackOutput,
    pub distribution_id: StackOutput,
}

impl StaticSite {
    pub const DEFAULT_ID: &'static str = "staticsite";

    /// Add the site's resources to `stack` under the construct `id`.
    ///
    /// Resources are added in dependency order: access-logs bucket, content
    /// bucket, origin access identity, distribution, bucket policy.
    pub fn build(
        stack: &mut Stack,
        id: &str,
        props: &StaticSiteProps,
    ) -> sitepipe_core::Result<Self> {
        let path = ConstructPath::root(id);

        let mut logs = Bucket::new()
            .with_encryption(BucketEncryption::S3Managed)
            .with_block_public_access(BlockPublicAccess::BLOCK_ALL)
            .as_log_destination();
        if let Some(name) = &props.logs_bucket_name {
            logs = logs.with_name(name);
        }
        let logs_bucket = stack.add(
            path.child("accesslogsbucket"),
            ResourceKind::Bucket(logs),
        )?;

        // An origin access identity cannot decrypt SSE-KMS objects.
        let mut content = Bucket::new()
            .with_encryption(BucketEncryption::S3Managed)
            .with_block_public_access(BlockPublicAccess::BLOCK_ALL)
            .versioned(true)
            .with_website(&props.index_document, props.error_document.clone())
            .with_access_logging(&logs_bucket, Some(props.access_log_prefix.clone()));
        if let Some(name) = &props.bucket_name {
            content = content.with_name(name);
        }
        let bucket = stack.add(path.child("S3bucket"), ResourceKind::Bucket(content))?;
        stack.set_removal_policy(&bucket, RemovalPolicy::Destroy)?;

        let origin_access_identity = stack.add(
            path.child("oai"),
            ResourceKind::OriginAccessIdentity(OriginAccessIdentity::new(
                "cloudfront access to S3",
            )),
        )?;

        let behavior = Behavior::s3_origin(&bucket)
            .with_allowed_methods(AllowedMethods::GetHeadOptions)
            .with_cache_policy(CachePolicy::CachingOptimized);
        let mut distribution = Distribution::new(behavior, &origin_access_identity)
            .with_logging(
                &logs_bucket,
                Some(props.distribution_log_prefix.clone()),
                false,
            )
            .with_price_class(PriceClass::PriceClassAll)
            .with_default_root_object(&props.index_document);
        if let Some(arn) = &props.certificate_arn {
            distribution = distribution
                .with_certificate(arn, SecurityPolicyProtocol::TlsV1_2_2019)
                .with_aliases(props.aliases.clone());
        }
        let distribution = stack.add(
            path.child("staticsitedistribution"),
            ResourceKind::Distribution(Box::new(distribution)),
        )?;

        let statement = PolicyStatement::allow()
            .with_actions(ORIGIN_READ_ACTIONS)
            .with_resources([bucket_arn(&bucket), bucket_objects_arn(&bucket)])
            .with_canonical_user_principal(OriginAccessIdentity::canonical_user_id(
                &origin_access_identity,
            ));
        let bucket_policy = stack.add(
            path.child("S3bucket").child("Policy"),
            ResourceKind::BucketPolicy(BucketPolicy::new(
                &bucket,
                PolicyDocument::new(vec![statement]),
            )),
        )?;

        let source_bucket_name = stack.add_output(
            SOURCE_BUCKET_OUTPUT,
            Value::reference(&bucket),
            Some("Content bucket synced by the deploy action".to_string()),
        )?;
        let distribution_id = stack.add_output(
            DISTRIBUTION_ID_OUTPUT,
            Value::reference(&distribution),
            Some("Distribution invalidated after each sync".to_string()),
        )?;
        stack.add_output(
            DISTRIBUTION_DOMAIN_OUTPUT,
            Value::get_att(&distribution, "DomainName"),
            None,
        )?;

        debug!(stack = %stack.name, site = %path, "static site added");

        Ok(Self {
            path,
            logs_bucket,
            bucket,
            origin_access_identity,
            distribution,
            bucket_policy,
            source_bucket_name,
            distribution_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepipe_core::iam::Principal;
    use sitepipe_core::{Environment, Tags};

    fn site_stack(props: &StaticSiteProps) -> (Stack, StaticSite) {
        let mut stack = Stack::new(
            ConstructPath::root("stage").child("app"),
            "stage-app",
            Environment::new("111111111111", "us-east-1"),
        );
        let site = StaticSite::build(&mut stack, StaticSite::DEFAULT_ID, props).unwrap();
        (stack, site)
    }

    #[test]
    fn test_resource_types() {
        let (stack, _) = site_stack(&StaticSiteProps::default());
        let template = stack.to_template(&Tags::new()).unwrap();
        assert_eq!(template.resources_of_type("AWS::S3::Bucket").count(), 2);
        assert_eq!(template.resources_of_type("AWS::S3::BucketPolicy").count(), 1);
        assert_eq!(
            template
                .resources_of_type("AWS::CloudFront::CloudFrontOriginAccessIdentity")
                .count(),
            1
        );
        assert_eq!(
            template
                .resources_of_type("AWS::CloudFront::Distribution")
                .count(),
            1
        );
    }

    #[test]
    fn test_bucket_policy_grants_only_oai_read() {
        let (stack, site) = site_stack(&StaticSiteProps::default());
        let ResourceKind::BucketPolicy(policy) = &stack.get(&site.bucket_policy).unwrap().kind
        else {
            panic!("expected a bucket policy");
        };
        assert_eq!(policy.bucket, site.bucket);
        assert_eq!(policy.document.statements.len(), 1);
        let statement = &policy.document.statements[0];
        assert_eq!(
            statement.principals,
            vec![Principal::CanonicalUser(
                OriginAccessIdentity::canonical_user_id(&site.origin_access_identity)
            )]
        );
        assert_eq!(statement.actions, ORIGIN_READ_ACTIONS.to_vec());
        assert_eq!(
            statement.resources,
            vec![bucket_arn(&site.bucket), bucket_objects_arn(&site.bucket)]
        );
    }

    #[test]
    fn test_content_bucket_settings() {
        let (stack, site) = site_stack(&StaticSiteProps::default());
        let resource = stack.get(&site.bucket).unwrap();
        let ResourceKind::Bucket(bucket) = &resource.kind else {
            panic!("expected a bucket");
        };
        assert!(bucket.blocks_all_public_access());
        assert!(!bucket.encryption.uses_kms());
        assert!(bucket.versioned);
        assert_eq!(resource.removal_policy, Some(RemovalPolicy::Destroy));
        assert_eq!(
            bucket.access_logging.as_ref().map(|l| &l.destination),
            Some(&site.logs_bucket)
        );
    }

    #[test]
    fn test_bucket_names_from_settings() {
        let settings = SiteSettings {
            bucket_name_prefix: Some("staticsite202104".to_string()),
            logs_bucket_name_prefix: Some("access-logs-bucket-202104".to_string()),
            ..SiteSettings::default()
        };
        let props = StaticSiteProps::from_settings(&settings, "Sandbox");
        let (stack, site) = site_stack(&props);
        let template = stack.to_template(&Tags::new()).unwrap();
        let content = &template.resources[&site.bucket].properties;
        assert_eq!(content["BucketName"], "staticsite202104-sandbox");
        let logs = &template.resources[&site.logs_bucket].properties;
        assert_eq!(logs["BucketName"], "access-logs-bucket-202104-sandbox");
    }

    #[test]
    fn test_distribution_config() {
        let (stack, site) = site_stack(&StaticSiteProps::default());
        let template = stack.to_template(&Tags::new()).unwrap();
        let config = &template.resources[&site.distribution].properties["DistributionConfig"];
        assert_eq!(
            config["DefaultCacheBehavior"]["AllowedMethods"],
            serde_json::json!(["GET", "HEAD", "OPTIONS"])
        );
        assert_eq!(
            config["DefaultCacheBehavior"]["CachePolicyId"],
            "658327ea-f89d-4fab-a63d-7e88639e58f6"
        );
        assert_eq!(
            config["DefaultCacheBehavior"]["ViewerProtocolPolicy"],
            "redirect-to-https"
        );
        assert_eq!(config["PriceClass"], "PriceClass_All");
        assert_eq!(config["IPV6Enabled"], true);
        assert_eq!(config["Logging"]["IncludeCookies"], false);
        assert_eq!(config["Logging"]["Prefix"], "cfront-staticsite");
        assert_eq!(config["ViewerCertificate"]["CloudFrontDefaultCertificate"], true);
    }

    #[test]
    fn test_certificate_sets_tls_policy() {
        let props = StaticSiteProps {
            certificate_arn: Some(
                "arn:aws:acm:us-east-1:111111111111:certificate/abc".to_string(),
            ),
            aliases: vec!["www.example.com".to_string()],
            ..StaticSiteProps::default()
        };
        let (stack, site) = site_stack(&props);
        let template = stack.to_template(&Tags::new()).unwrap();
        let config = &template.resources[&site.distribution].properties["DistributionConfig"];
        assert_eq!(
            config["ViewerCertificate"]["MinimumProtocolVersion"],
            "TLSv1.2_2019"
        );
        assert_eq!(config["Aliases"][0], "www.example.com");
    }

    #[test]
    fn test_outputs() {
        let (stack, site) = site_stack(&StaticSiteProps::default());
        assert_eq!(site.source_bucket_name.name, SOURCE_BUCKET_OUTPUT);
        assert_eq!(site.source_bucket_name.stack_name, "stage-app");
        assert!(stack.has_output(DISTRIBUTION_ID_OUTPUT));
        assert!(stack.has_output(DISTRIBUTION_DOMAIN_OUTPUT));
    }

    #[test]
    fn test_same_site_twice_is_rejected() {
        let (mut stack, _) = site_stack(&StaticSiteProps::default());
        assert!(
            StaticSite::build(&mut stack, StaticSite::DEFAULT_ID, &StaticSiteProps::default())
                .is_err()
        );
    }
}
