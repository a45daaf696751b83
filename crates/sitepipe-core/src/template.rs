//! CloudFormation template documents.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::{LogicalId, Result, Value};

pub const FORMAT_VERSION: &str = "2010-09-09";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateResource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(rename = "Properties")]
    pub properties: serde_json::Value,
    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<LogicalId>,
    #[serde(rename = "DeletionPolicy", skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    #[serde(rename = "UpdateReplacePolicy", skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateOutput {
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Value")]
    pub value: Value,
}

/// A rendered stack template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: &'static str,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<LogicalId, TemplateResource>,
    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, TemplateOutput>,
}

impl Template {
    pub fn new(
        description: Option<String>,
        resources: BTreeMap<LogicalId, TemplateResource>,
        outputs: BTreeMap<String, TemplateOutput>,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            description,
            resources,
            outputs,
        }
    }

    /// Resources of the given CloudFormation type.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a LogicalId, &'a TemplateResource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_template_shape() {
        let template = Template::new(None, BTreeMap::new(), BTreeMap::new());
        let v = serde_json::to_value(&template).unwrap();
        assert_eq!(v, json!({"AWSTemplateFormatVersion": "2010-09-09", "Resources": {}}));
        assert!(template.to_json_pretty().unwrap().ends_with("}\n"));
    }

    #[test]
    fn test_resources_of_type() {
        let mut resources = BTreeMap::new();
        for (id, ty) in [("A", "AWS::S3::Bucket"), ("B", "AWS::IAM::Role")] {
            resources.insert(
                LogicalId::new(id).unwrap(),
                TemplateResource {
                    resource_type: ty.to_string(),
                    properties: json!({}),
                    depends_on: Vec::new(),
                    deletion_policy: None,
                    update_replace_policy: None,
                },
            );
        }
        let template = Template::new(None, resources, BTreeMap::new());
        let buckets: Vec<_> = template.resources_of_type("AWS::S3::Bucket").collect();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].0.as_str(), "A");
    }
}
