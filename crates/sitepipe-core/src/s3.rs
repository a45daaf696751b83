//! S3 bucket and bucket policy descriptors.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::iam::PolicyDocument;
use crate::stack::Properties;
use crate::{LogicalId, Value};

/// Server-side encryption applied to new objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BucketEncryption {
    /// SSE-S3 (`AES256`).
    #[default]
    S3Managed,
    /// SSE-KMS with the AWS managed `aws/s3` key.
    KmsManaged,
    /// SSE-KMS with a key declared in the same stack.
    Kms(LogicalId),
}

impl BucketEncryption {
    pub fn uses_kms(&self) -> bool {
        !matches!(self, BucketEncryption::S3Managed)
    }

    fn to_json(&self) -> serde_json::Value {
        let rule = match self {
            BucketEncryption::S3Managed => json!({"SSEAlgorithm": "AES256"}),
            BucketEncryption::KmsManaged => json!({"SSEAlgorithm": "aws:kms"}),
            BucketEncryption::Kms(key) => json!({
                "SSEAlgorithm": "aws:kms",
                "KMSMasterKeyID": Value::get_att(key, "Arn"),
            }),
        };
        json!({
            "ServerSideEncryptionConfiguration": [
                {"ServerSideEncryptionByDefault": rule}
            ]
        })
    }
}

/// The four public-access-block switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockPublicAccess {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

impl BlockPublicAccess {
    pub const BLOCK_ALL: BlockPublicAccess = BlockPublicAccess {
        block_public_acls: true,
        block_public_policy: true,
        ignore_public_acls: true,
        restrict_public_buckets: true,
    };

    pub fn is_block_all(&self) -> bool {
        *self == Self::BLOCK_ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectOwnership {
    BucketOwnerPreferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CannedAcl {
    LogDeliveryWrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteConfiguration {
    pub index_document: String,
    pub error_document: Option<String>,
}

/// Where the bucket's server access logs are delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogging {
    pub destination: LogicalId,
    pub prefix: Option<String>,
}

/// `AWS::S3::Bucket`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    pub bucket_name: Option<String>,
    pub encryption: BucketEncryption,
    pub block_public_access: Option<BlockPublicAccess>,
    pub versioned: bool,
    pub website: Option<WebsiteConfiguration>,
    pub access_logging: Option<AccessLogging>,
    pub object_ownership: Option<ObjectOwnership>,
    pub access_control: Option<CannedAcl>,
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.bucket_name = Some(name.into());
        self
    }

    pub fn with_encryption(mut self, encryption: BucketEncryption) -> Self {
        self.encryption = encryption;
        self
    }

    pub fn with_block_public_access(mut self, block: BlockPublicAccess) -> Self {
        self.block_public_access = Some(block);
        self
    }

    pub fn versioned(mut self, versioned: bool) -> Self {
        self.versioned = versioned;
        self
    }

    pub fn with_website(
        mut self,
        index_document: impl Into<String>,
        error_document: Option<String>,
    ) -> Self {
        self.website = Some(WebsiteConfiguration {
            index_document: index_document.into(),
            error_document,
        });
        self
    }

    pub fn with_access_logging(mut self, destination: &LogicalId, prefix: Option<String>) -> Self {
        self.access_logging = Some(AccessLogging {
            destination: destination.clone(),
            prefix,
        });
        self
    }

    /// Accept log-delivery ACL grants from S3 server access logging and CloudFront.
    pub fn as_log_destination(mut self) -> Self {
        self.object_ownership = Some(ObjectOwnership::BucketOwnerPreferred);
        self.access_control = Some(CannedAcl::LogDeliveryWrite);
        self
    }

    /// Whether every public-access switch is on.
    pub fn blocks_all_public_access(&self) -> bool {
        self.block_public_access
            .is_some_and(|block| block.is_block_all())
    }

    pub(crate) fn properties(&self) -> Properties {
        let mut props = Properties::new()
            .set_opt("BucketName", self.bucket_name.as_ref().map(|n| json!(n)))
            .set("BucketEncryption", self.encryption.to_json())
            .set_opt(
                "PublicAccessBlockConfiguration",
                self.block_public_access.map(|b| json!(b)),
            )
            .set_opt("AccessControl", self.access_control.map(|acl| json!(acl)))
            .set_opt(
                "OwnershipControls",
                self.object_ownership
                    .map(|o| json!({"Rules": [{"ObjectOwnership": o}]})),
            );
        if self.versioned {
            props = props.set("VersioningConfiguration", json!({"Status": "Enabled"}));
        }
        if let Some(website) = &self.website {
            let mut config = serde_json::Map::new();
            config.insert("IndexDocument".to_string(), json!(website.index_document));
            if let Some(error) = &website.error_document {
                config.insert("ErrorDocument".to_string(), json!(error));
            }
            props = props.set("WebsiteConfiguration", serde_json::Value::Object(config));
        }
        if let Some(logging) = &self.access_logging {
            let mut config = serde_json::Map::new();
            config.insert(
                "DestinationBucketName".to_string(),
                json!(Value::reference(&logging.destination)),
            );
            if let Some(prefix) = &logging.prefix {
                config.insert("LogFilePrefix".to_string(), json!(prefix));
            }
            props = props.set("LoggingConfiguration", serde_json::Value::Object(config));
        }
        props
    }
}

/// The bucket's ARN.
pub fn bucket_arn(bucket: &LogicalId) -> Value {
    Value::get_att(bucket, "Arn")
}

/// ARN covering every object key in the bucket.
pub fn bucket_objects_arn(bucket: &LogicalId) -> Value {
    Value::join("", vec![bucket_arn(bucket), Value::literal("/*")])
}

pub fn bucket_regional_domain_name(bucket: &LogicalId) -> Value {
    Value::get_att(bucket, "RegionalDomainName")
}

/// `AWS::S3::BucketPolicy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPolicy {
    pub bucket: LogicalId,
    pub document: PolicyDocument,
}

impl BucketPolicy {
    pub fn new(bucket: &LogicalId, document: PolicyDocument) -> Self {
        Self {
            bucket: bucket.clone(),
            document,
        }
    }

    pub(crate) fn properties(&self) -> Properties {
        Properties::new()
            .set("Bucket", json!(Value::reference(&self.bucket)))
            .set("PolicyDocument", json!(self.document))
    }
}
