//! Construct paths and logical identifiers.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Maximum length CloudFormation accepts for a logical id.
const MAX_LOGICAL_ID_LEN: usize = 255;
const HASH_LEN: usize = 8;

/// Position of a construct in the construct tree, root first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstructPath(Vec<String>);

impl ConstructPath {
    /// A path with a single top-level component.
    pub fn root(id: impl Into<String>) -> Self {
        Self(vec![id.into()])
    }

    /// Extend this path by one child id.
    pub fn child(&self, id: impl Into<String>) -> Self {
        let mut components = self.0.clone();
        components.push(id.into());
        Self(components)
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The id of the innermost construct.
    pub fn id(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl std::fmt::Display for ConstructPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl<S: Into<String>> FromIterator<S> for ConstructPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A CloudFormation logical resource id.
///
/// Derived deterministically from the stack-relative construct path so that
/// re-running synthesis yields the same ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct LogicalId(String);

impl LogicalId {
    /// Use `raw` verbatim. Must be non-empty ASCII alphanumeric.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() || raw.len() > MAX_LOGICAL_ID_LEN {
            return Err(Error::InvalidInput(format!(
                "logical id must be 1-{} characters: '{}'",
                MAX_LOGICAL_ID_LEN, raw
            )));
        }
        if !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidInput(format!(
                "logical id must be alphanumeric: '{}'",
                raw
            )));
        }
        Ok(Self(raw))
    }

    /// Build a logical id from a stack-relative construct path.
    ///
    /// Single alphanumeric components are used as-is. Deeper paths get the
    /// concatenated components followed by an 8 character md5 suffix of the
    /// full path, so `staticsite/S3bucket` and `staticsiteS3/bucket` differ.
    pub fn from_path(path: &ConstructPath) -> Result<Self> {
        let components = path.components();
        match components {
            [] => Err(Error::InvalidInput("empty construct path".to_string())),
            [single] if single.chars().all(|c| c.is_ascii_alphanumeric()) => {
                Self::new(single.clone())
            }
            _ => {
                let human: String = components
                    .iter()
                    .flat_map(|c| c.chars())
                    .filter(char::is_ascii_alphanumeric)
                    .take(MAX_LOGICAL_ID_LEN - HASH_LEN)
                    .collect();
                let digest = md5::compute(path.to_string().as_bytes());
                let hash = format!("{:X}", digest);
                Self::new(format!("{}{}", human, &hash[..HASH_LEN]))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_extends_path() {
        let path = ConstructPath::root("stage").child("site").child("bucket");
        assert_eq!(path.to_string(), "stage/site/bucket");
        assert_eq!(path.id(), Some("bucket"));
    }

    #[test]
    fn test_single_component_is_verbatim() {
        let id = LogicalId::from_path(&ConstructPath::root("Pipeline")).unwrap();
        assert_eq!(id.as_str(), "Pipeline");
    }

    #[test]
    fn test_nested_path_gets_hash_suffix() {
        let path: ConstructPath = ["staticsite", "S3bucket"].into_iter().collect();
        let id = LogicalId::from_path(&path).unwrap();
        assert!(id.as_str().starts_with("staticsiteS3bucket"));
        assert_eq!(id.as_str().len(), "staticsiteS3bucket".len() + 8);
        assert!(id.as_str()[18..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ids_are_stable_and_distinct() {
        let a: ConstructPath = ["staticsite", "S3bucket"].into_iter().collect();
        let b: ConstructPath = ["staticsiteS3", "bucket"].into_iter().collect();
        assert_eq!(
            LogicalId::from_path(&a).unwrap(),
            LogicalId::from_path(&a).unwrap()
        );
        assert_ne!(
            LogicalId::from_path(&a).unwrap(),
            LogicalId::from_path(&b).unwrap()
        );
    }

    #[test]
    fn test_non_alphanumeric_stripped() {
        let path: ConstructPath = ["site-a", "bucket_logs"].into_iter().collect();
        let id = LogicalId::from_path(&path).unwrap();
        assert!(id.as_str().starts_with("siteabucketlogs"));
    }

    #[test]
    fn test_rejects_invalid_raw_id() {
        assert!(LogicalId::new("").is_err());
        assert!(LogicalId::new("has-dash").is_err());
        assert!(LogicalId::new("x".repeat(256)).is_err());
        assert!(LogicalId::from_path(&ConstructPath::default()).is_err());
    }
}
