//! Tag map parsing (`tags.json`).

use crate::{ConfigError, ConfigResult};
use sitepipe_core::Tags;
use std::collections::BTreeMap;
use std::path::Path;

const MAX_KEY_LEN: usize = 128;
const MAX_VALUE_LEN: usize = 256;

/// Parse a flat JSON object of tag key to tag value.
pub fn parse_tags(json: &str) -> ConfigResult<Tags> {
    let raw: BTreeMap<String, String> = serde_json::from_str(json)?;
    for (key, value) in &raw {
        validate_tag(key, value)?;
    }
    Ok(Tags::from(raw))
}

pub fn load_tags(path: &Path) -> ConfigResult<Tags> {
    let content = std::fs::read_to_string(path)?;
    parse_tags(&content)
}

fn validate_tag(key: &str, value: &str) -> ConfigResult<()> {
    if key.is_empty() {
        return Err(ConfigError::invalid("tags", "tag keys must not be empty"));
    }
    if key.chars().count() > MAX_KEY_LEN {
        return Err(ConfigError::invalid(
            format!("tags.{}", key),
            format!("tag keys are limited to {} characters", MAX_KEY_LEN),
        ));
    }
    if key.to_lowercase().starts_with("aws:") {
        return Err(ConfigError::invalid(
            format!("tags.{}", key),
            "the aws: prefix is reserved",
        ));
    }
    if value.chars().count() > MAX_VALUE_LEN {
        return Err(ConfigError::invalid(
            format!("tags.{}", key),
            format!("tag values are limited to {} characters", MAX_VALUE_LEN),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_tags() {
        let tags = parse_tags(r#"{"project": "staticsite", "owner": "web"}"#).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.get("project"), Some("staticsite"));
        let keys: Vec<_> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["owner", "project"]);
    }

    #[test]
    fn test_empty_object() {
        assert!(parse_tags("{}").unwrap().is_empty());
    }

    #[test]
    fn test_non_string_value_rejected() {
        let err = parse_tags(r#"{"cost-center": 42}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_reserved_prefix_rejected() {
        let err = parse_tags(r#"{"AWS:createdBy": "me"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_length_limits() {
        let long_key = "k".repeat(129);
        let json = format!(r#"{{"{}": "v"}}"#, long_key);
        assert!(parse_tags(&json).is_err());

        let long_value = "v".repeat(257);
        let json = format!(r#"{{"key": "{}"}}"#, long_value);
        assert!(parse_tags(&json).is_err());

        let json = format!(r#"{{"{}": "{}"}}"#, "k".repeat(128), "v".repeat(256));
        assert!(parse_tags(&json).is_ok());
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(parse_tags(r#"{"": "v"}"#).is_err());
    }

    #[test]
    fn test_load_tags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"team": "platform"}}"#).unwrap();
        let tags = load_tags(file.path()).unwrap();
        assert_eq!(tags.get("team"), Some("platform"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_tags(Path::new("/nonexistent/tags.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
