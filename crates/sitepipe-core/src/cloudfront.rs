//! CloudFront distribution and origin access identity descriptors.

use serde_json::json;

use crate::s3::bucket_regional_domain_name;
use crate::stack::Properties;
use crate::{LogicalId, Value};

/// `AWS::CloudFront::CloudFrontOriginAccessIdentity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginAccessIdentity {
    pub comment: String,
}

impl OriginAccessIdentity {
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
        }
    }

    /// Canonical user id to grant in bucket policies.
    pub fn canonical_user_id(oai: &LogicalId) -> Value {
        Value::get_att(oai, "S3CanonicalUserId")
    }

    pub(crate) fn properties(&self) -> Properties {
        Properties::new().set(
            "CloudFrontOriginAccessIdentityConfig",
            json!({"Comment": self.comment}),
        )
    }
}

/// HTTP methods the behavior forwards to the origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AllowedMethods {
    GetHead,
    #[default]
    GetHeadOptions,
    All,
}

impl AllowedMethods {
    pub fn methods(&self) -> &'static [&'static str] {
        match self {
            AllowedMethods::GetHead => &["GET", "HEAD"],
            AllowedMethods::GetHeadOptions => &["GET", "HEAD", "OPTIONS"],
            AllowedMethods::All => &["GET", "HEAD", "OPTIONS", "PUT", "PATCH", "POST", "DELETE"],
        }
    }

    fn cached_methods(&self) -> &'static [&'static str] {
        match self {
            AllowedMethods::GetHead => &["GET", "HEAD"],
            AllowedMethods::GetHeadOptions | AllowedMethods::All => &["GET", "HEAD", "OPTIONS"],
        }
    }
}

/// Managed cache policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    #[default]
    CachingOptimized,
    CachingOptimizedForUncompressedObjects,
    CachingDisabled,
}

impl CachePolicy {
    pub fn id(&self) -> &'static str {
        match self {
            CachePolicy::CachingOptimized => "658327ea-f89d-4fab-a63d-7e88639e58f6",
            CachePolicy::CachingOptimizedForUncompressedObjects => {
                "b2884449-e4de-46a7-ac36-70bc7f1ddd6d"
            }
            CachePolicy::CachingDisabled => "4135ea2d-6df8-44a3-9df3-4b5a84be39ad",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewerProtocolPolicy {
    AllowAll,
    #[default]
    RedirectToHttps,
    HttpsOnly,
}

impl std::fmt::Display for ViewerProtocolPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewerProtocolPolicy::AllowAll => write!(f, "allow-all"),
            ViewerProtocolPolicy::RedirectToHttps => write!(f, "redirect-to-https"),
            ViewerProtocolPolicy::HttpsOnly => write!(f, "https-only"),
        }
    }
}

/// Minimum TLS version offered to viewers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecurityPolicyProtocol {
    TlsV1_2016,
    TlsV1_2_2018,
    #[default]
    TlsV1_2_2019,
    TlsV1_2_2021,
}

impl std::fmt::Display for SecurityPolicyProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityPolicyProtocol::TlsV1_2016 => write!(f, "TLSv1_2016"),
            SecurityPolicyProtocol::TlsV1_2_2018 => write!(f, "TLSv1.2_2018"),
            SecurityPolicyProtocol::TlsV1_2_2019 => write!(f, "TLSv1.2_2019"),
            SecurityPolicyProtocol::TlsV1_2_2021 => write!(f, "TLSv1.2_2021"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriceClass {
    PriceClass100,
    PriceClass200,
    #[default]
    PriceClassAll,
}

impl std::fmt::Display for PriceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceClass::PriceClass100 => write!(f, "PriceClass_100"),
            PriceClass::PriceClass200 => write!(f, "PriceClass_200"),
            PriceClass::PriceClassAll => write!(f, "PriceClass_All"),
        }
    }
}

/// Default cache behavior pointing at an S3 origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Behavior {
    pub origin_bucket: LogicalId,
    pub allowed_methods: AllowedMethods,
    pub cache_policy: CachePolicy,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub compress: bool,
}

impl Behavior {
    pub fn s3_origin(bucket: &LogicalId) -> Self {
        Self {
            origin_bucket: bucket.clone(),
            allowed_methods: AllowedMethods::default(),
            cache_policy: CachePolicy::default(),
            viewer_protocol_policy: ViewerProtocolPolicy::default(),
            compress: true,
        }
    }

    pub fn with_allowed_methods(mut self, methods: AllowedMethods) -> Self {
        self.allowed_methods = methods;
        self
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    pub fn with_viewer_protocol_policy(mut self, policy: ViewerProtocolPolicy) -> Self {
        self.viewer_protocol_policy = policy;
        self
    }

    fn origin_id(&self) -> String {
        format!("{}Origin", self.origin_bucket)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionLogging {
    pub bucket: LogicalId,
    pub prefix: Option<String>,
    pub include_cookies: bool,
}

/// `AWS::CloudFront::Distribution` with a single S3 origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub comment: Option<String>,
    pub enabled: bool,
    pub ipv6_enabled: bool,
    pub price_class: PriceClass,
    pub default_root_object: Option<String>,
    pub behavior: Behavior,
    pub origin_access_identity: LogicalId,
    pub logging: Option<DistributionLogging>,
    pub certificate_arn: Option<String>,
    pub minimum_protocol_version: SecurityPolicyProtocol,
    pub aliases: Vec<String>,
}

impl Distribution {
    pub fn new(behavior: Behavior, origin_access_identity: &LogicalId) -> Self {
        Self {
            comment: None,
            enabled: true,
            ipv6_enabled: true,
            price_class: PriceClass::default(),
            default_root_object: None,
            behavior,
            origin_access_identity: origin_access_identity.clone(),
            logging: None,
            certificate_arn: None,
            minimum_protocol_version: SecurityPolicyProtocol::default(),
            aliases: Vec::new(),
        }
    }

    pub fn with_logging(
        mut self,
        bucket: &LogicalId,
        prefix: Option<String>,
        include_cookies: bool,
    ) -> Self {
        self.logging = Some(DistributionLogging {
            bucket: bucket.clone(),
            prefix,
            include_cookies,
        });
        self
    }

    pub fn with_price_class(mut self, price_class: PriceClass) -> Self {
        self.price_class = price_class;
        self
    }

    pub fn with_default_root_object(mut self, object: impl Into<String>) -> Self {
        self.default_root_object = Some(object.into()).filter(|o: &String| !o.is_empty());
        self
    }

    pub fn with_certificate(
        mut self,
        certificate_arn: impl Into<String>,
        minimum_protocol_version: SecurityPolicyProtocol,
    ) -> Self {
        self.certificate_arn = Some(certificate_arn.into());
        self.minimum_protocol_version = minimum_protocol_version;
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    /// The bucket this distribution serves from.
    pub fn origin_bucket(&self) -> &LogicalId {
        &self.behavior.origin_bucket
    }

    fn viewer_certificate(&self) -> serde_json::Value {
        match &self.certificate_arn {
            Some(arn) => json!({
                "AcmCertificateArn": arn,
                "SslSupportMethod": "sni-only",
                "MinimumProtocolVersion": self.minimum_protocol_version.to_string(),
            }),
            None => json!({"CloudFrontDefaultCertificate": true}),
        }
    }

    pub(crate) fn properties(&self) -> Properties {
        let behavior = &self.behavior;
        let origin_access = Value::join(
            "",
            vec![
                Value::literal("origin-access-identity/cloudfront/"),
                Value::reference(&self.origin_access_identity),
            ],
        );

        let mut config = Properties::new()
            .set("Enabled", json!(self.enabled))
            .set("IPV6Enabled", json!(self.ipv6_enabled))
            .set("HttpVersion", json!("http2"))
            .set("PriceClass", json!(self.price_class.to_string()))
            .set_opt("Comment", self.comment.as_ref().map(|c| json!(c)))
            .set_opt(
                "DefaultRootObject",
                self.default_root_object.as_ref().map(|o| json!(o)),
            )
            .set(
                "Origins",
                json!([{
                    "Id": behavior.origin_id(),
                    "DomainName": bucket_regional_domain_name(&behavior.origin_bucket),
                    "S3OriginConfig": {"OriginAccessIdentity": origin_access},
                }]),
            )
            .set(
                "DefaultCacheBehavior",
                json!({
                    "TargetOriginId": behavior.origin_id(),
                    "ViewerProtocolPolicy": behavior.viewer_protocol_policy.to_string(),
                    "AllowedMethods": behavior.allowed_methods.methods(),
                    "CachedMethods": behavior.allowed_methods.cached_methods(),
                    "CachePolicyId": behavior.cache_policy.id(),
                    "Compress": behavior.compress,
                }),
            )
            .set("ViewerCertificate", self.viewer_certificate());

        if !self.aliases.is_empty() {
            config = config.set("Aliases", json!(self.aliases));
        }
        if let Some(logging) = &self.logging {
            let mut log = serde_json::Map::new();
            log.insert(
                "Bucket".to_string(),
                json!(bucket_regional_domain_name(&logging.bucket)),
            );
            log.insert("IncludeCookies".to_string(), json!(logging.include_cookies));
            if let Some(prefix) = &logging.prefix {
                log.insert("Prefix".to_string(), json!(prefix));
            }
            config = config.set("Logging", serde_json::Value::Object(log));
        }

        Properties::new().set("DistributionConfig", config.into_value())
    }
}
