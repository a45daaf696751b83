//! Template values and intrinsic functions.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::LogicalId;

/// A property value that the deployment engine resolves at deploy time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A literal string.
    Literal(String),
    /// `{"Ref": "..."}` to a resource or pseudo parameter.
    Ref(String),
    /// `{"Fn::GetAtt": [resource, attribute]}`.
    GetAtt(LogicalId, String),
    /// `{"Fn::Join": [separator, [parts]]}`.
    Join(String, Vec<Value>),
    /// `{"Fn::Sub": "template"}` with `${AWS::...}` style placeholders.
    Sub(String),
}

impl Value {
    pub fn literal(s: impl Into<String>) -> Self {
        Value::Literal(s.into())
    }

    pub fn reference(id: &LogicalId) -> Self {
        Value::Ref(id.to_string())
    }

    pub fn get_att(id: &LogicalId, attribute: impl Into<String>) -> Self {
        Value::GetAtt(id.clone(), attribute.into())
    }

    pub fn join(separator: impl Into<String>, parts: Vec<Value>) -> Self {
        Value::Join(separator.into(), parts)
    }

    pub fn sub(template: impl Into<String>) -> Self {
        Value::Sub(template.into())
    }

    pub fn account_id() -> Self {
        Value::Ref("AWS::AccountId".to_string())
    }

    pub fn region() -> Self {
        Value::Ref("AWS::Region".to_string())
    }

    /// Resource ids this value depends on. Pseudo parameters are skipped.
    pub fn references(&self) -> Vec<&str> {
        match self {
            Value::Ref(target) if !target.starts_with("AWS::") => vec![target.as_str()],
            Value::GetAtt(id, _) => vec![id.as_str()],
            Value::Join(_, parts) => parts.iter().flat_map(Value::references).collect(),
            Value::Literal(_) | Value::Ref(_) | Value::Sub(_) => Vec::new(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Literal(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Literal(s)
    }
}

struct JoinArgs<'a>(&'a str, &'a [Value]);

impl Serialize for JoinArgs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(self.0)?;
        seq.serialize_element(self.1)?;
        seq.end()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Literal(s) => serializer.serialize_str(s),
            Value::Ref(target) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", target)?;
                map.end()
            }
            Value::GetAtt(id, attribute) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::GetAtt", &[id.as_str(), attribute.as_str()])?;
                map.end()
            }
            Value::Join(separator, parts) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::Join", &JoinArgs(separator, parts))?;
                map.end()
            }
            Value::Sub(template) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::Sub", template)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(raw: &str) -> LogicalId {
        LogicalId::new(raw).unwrap()
    }

    #[test]
    fn test_literal_serializes_as_string() {
        let v = serde_json::to_value(Value::literal("index.html")).unwrap();
        assert_eq!(v, json!("index.html"));
    }

    #[test]
    fn test_intrinsics_serialize() {
        let bucket = id("Bucket");
        assert_eq!(
            serde_json::to_value(Value::reference(&bucket)).unwrap(),
            json!({"Ref": "Bucket"})
        );
        assert_eq!(
            serde_json::to_value(Value::get_att(&bucket, "Arn")).unwrap(),
            json!({"Fn::GetAtt": ["Bucket", "Arn"]})
        );
        assert_eq!(
            serde_json::to_value(Value::join(
                "",
                vec![Value::get_att(&bucket, "Arn"), "/*".into()]
            ))
            .unwrap(),
            json!({"Fn::Join": ["", [{"Fn::GetAtt": ["Bucket", "Arn"]}, "/*"]]})
        );
    }

    #[test]
    fn test_references_collects_nested_ids() {
        let v = Value::join(
            "",
            vec![
                Value::get_att(&id("A"), "Arn"),
                Value::literal("/"),
                Value::reference(&id("B")),
                Value::account_id(),
            ],
        );
        assert_eq!(v.references(), vec!["A", "B"]);
    }
}
