//! CodeCommit repository descriptor.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::stack::Properties;

/// `AWS::CodeCommit::Repository`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub description: Option<String>,
}

impl Repository {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            name: name.into(),
            description,
        }
    }

    pub(crate) fn properties(&self) -> Properties {
        Properties::new()
            .set("RepositoryName", json!(self.name))
            .set_opt(
                "RepositoryDescription",
                self.description.as_ref().map(|d| json!(d)),
            )
    }
}
