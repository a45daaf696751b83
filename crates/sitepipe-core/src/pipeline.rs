//! Pipeline, stage and action definitions.

use serde_json::json;
use std::collections::{BTreeMap, HashSet};

use crate::stack::Properties;
use crate::{Error, LogicalId, Result, Value};

pub const CHANGE_SET_CAPABILITIES: &str = "CAPABILITY_NAMED_IAM,CAPABILITY_AUTO_EXPAND";

/// A named artifact passed between actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Artifact(String);

impl Artifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// `Artifact::path` form used by CloudFormation actions.
    pub fn path(&self, file: &str) -> String {
        format!("{}::{}", self.0, file)
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a pipeline variable, e.g. `#{Namespace.sourceBucketName}`.
pub fn variable(namespace: &str, name: &str) -> String {
    format!("#{{{}.{}}}", namespace, name)
}

/// Change set operation performed by a CloudFormation action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSetMode {
    /// Create or replace the change set from a template in an input artifact.
    Replace {
        template: Artifact,
        template_file: String,
        /// Role CloudFormation assumes while executing the change set.
        execution_role_arn: String,
    },
    /// Execute a previously prepared change set.
    Execute,
}

/// What an action does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Check out a branch from a CodeCommit repository.
    CodeCommitSource {
        repository: LogicalId,
        branch: String,
        output: Artifact,
        /// Emit a clone reference instead of a zip so builds get full git metadata.
        clone_output: bool,
    },
    /// Run a CodeBuild project.
    CodeBuild {
        project: LogicalId,
        inputs: Vec<Artifact>,
        outputs: Vec<Artifact>,
        /// Plain-text environment variables; values may be pipeline variables.
        env: BTreeMap<String, String>,
    },
    /// Wait for a human to approve.
    ManualApproval { comment: Option<String> },
    /// Prepare or execute a CloudFormation change set.
    CloudFormation {
        stack_name: String,
        change_set_name: String,
        mode: ChangeSetMode,
    },
}

/// An action within a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub name: String,
    /// Actions with equal run order run in parallel, lower first.
    pub run_order: u32,
    /// Variable namespace the action's outputs are published under.
    pub namespace: Option<String>,
    /// Role the pipeline assumes to perform the action.
    pub role_arn: Option<String>,
    pub kind: ActionKind,
}

impl Action {
    pub fn new(name: impl Into<String>, run_order: u32, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            run_order,
            namespace: None,
            role_arn: None,
            kind,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    pub fn is_manual_approval(&self) -> bool {
        matches!(self.kind, ActionKind::ManualApproval { .. })
    }

    pub fn is_change_set_execute(&self) -> bool {
        matches!(
            self.kind,
            ActionKind::CloudFormation {
                mode: ChangeSetMode::Execute,
                ..
            }
        )
    }

    pub fn input_artifacts(&self) -> Vec<&Artifact> {
        match &self.kind {
            ActionKind::CodeBuild { inputs, .. } => inputs.iter().collect(),
            ActionKind::CloudFormation {
                mode: ChangeSetMode::Replace { template, .. },
                ..
            } => vec![template],
            _ => Vec::new(),
        }
    }

    pub fn output_artifacts(&self) -> Vec<&Artifact> {
        match &self.kind {
            ActionKind::CodeCommitSource { output, .. } => vec![output],
            ActionKind::CodeBuild { outputs, .. } => outputs.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Pipeline variables referenced by this action's configuration.
    pub fn referenced_namespaces(&self) -> Vec<&str> {
        let ActionKind::CodeBuild { env, .. } = &self.kind else {
            return Vec::new();
        };
        env.values()
            .filter_map(|v| v.strip_prefix("#{"))
            .filter_map(|v| v.split_once('.'))
            .map(|(namespace, _)| namespace)
            .collect()
    }

    fn type_id(&self) -> serde_json::Value {
        let (category, provider) = match &self.kind {
            ActionKind::CodeCommitSource { .. } => ("Source", "CodeCommit"),
            ActionKind::CodeBuild { .. } => ("Build", "CodeBuild"),
            ActionKind::ManualApproval { .. } => ("Approval", "Manual"),
            ActionKind::CloudFormation { .. } => ("Deploy", "CloudFormation"),
        };
        json!({"Category": category, "Owner": "AWS", "Provider": provider, "Version": "1"})
    }

    fn configuration(&self) -> serde_json::Value {
        match &self.kind {
            ActionKind::CodeCommitSource {
                repository,
                branch,
                clone_output,
                ..
            } => {
                let mut config = json!({
                    "RepositoryName": Value::get_att(repository, "Name"),
                    "BranchName": branch,
                    "PollForSourceChanges": true,
                });
                if *clone_output {
                    config["OutputArtifactFormat"] = json!("CODEBUILD_CLONE_REF");
                }
                config
            }
            ActionKind::CodeBuild {
                project,
                inputs,
                env,
                ..
            } => {
                let mut config = json!({"ProjectName": Value::reference(project)});
                if inputs.len() > 1 {
                    config["PrimarySource"] = json!(inputs[0].name());
                }
                if !env.is_empty() {
                    let vars: Vec<serde_json::Value> = env
                        .iter()
                        .map(|(name, value)| {
                            json!({"name": name, "type": "PLAINTEXT", "value": value})
                        })
                        .collect();
                    config["EnvironmentVariables"] = json!(serde_json::Value::Array(vars).to_string());
                }
                config
            }
            ActionKind::ManualApproval { comment } => match comment {
                Some(comment) => json!({"CustomData": comment}),
                None => json!({}),
            },
            ActionKind::CloudFormation {
                stack_name,
                change_set_name,
                mode,
            } => match mode {
                ChangeSetMode::Replace {
                    template,
                    template_file,
                    execution_role_arn,
                } => json!({
                    "ActionMode": "CHANGE_SET_REPLACE",
                    "StackName": stack_name,
                    "ChangeSetName": change_set_name,
                    "TemplatePath": template.path(template_file),
                    "Capabilities": CHANGE_SET_CAPABILITIES,
                    "RoleArn": execution_role_arn,
                }),
                ChangeSetMode::Execute => json!({
                    "ActionMode": "CHANGE_SET_EXECUTE",
                    "StackName": stack_name,
                    "ChangeSetName": change_set_name,
                }),
            },
        }
    }

    fn to_json(&self) -> serde_json::Value {
        let mut action = json!({
            "Name": self.name,
            "ActionTypeId": self.type_id(),
            "Configuration": self.configuration(),
            "RunOrder": self.run_order,
        });
        let inputs: Vec<serde_json::Value> = self
            .input_artifacts()
            .iter()
            .map(|a| json!({"Name": a.name()}))
            .collect();
        if !inputs.is_empty() {
            action["InputArtifacts"] = json!(inputs);
        }
        let outputs: Vec<serde_json::Value> = self
            .output_artifacts()
            .iter()
            .map(|a| json!({"Name": a.name()}))
            .collect();
        if !outputs.is_empty() {
            action["OutputArtifacts"] = json!(outputs);
        }
        if let Some(namespace) = &self.namespace {
            action["Namespace"] = json!(namespace);
        }
        if let Some(role_arn) = &self.role_arn {
            action["RoleArn"] = json!(role_arn);
        }
        action
    }
}

/// A stage in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Stage name.
    pub name: String,
    /// Actions, in any order; `run_order` decides sequencing.
    pub actions: Vec<Action>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Append an action after everything already in the stage.
    pub fn add_action_after(&mut self, name: impl Into<String>, kind: ActionKind) -> &mut Action {
        let run_order = self.next_run_order();
        self.actions.push(Action::new(name, run_order, kind));
        let last = self.actions.len() - 1;
        &mut self.actions[last]
    }

    pub fn next_run_order(&self) -> u32 {
        self.actions.iter().map(|a| a.run_order).max().unwrap_or(0) + 1
    }

    /// Whether every change set execution waits on a manual approval.
    pub fn requires_approval(&self) -> bool {
        let executes: Vec<u32> = self
            .actions
            .iter()
            .filter(|a| a.is_change_set_execute())
            .map(|a| a.run_order)
            .collect();
        if executes.is_empty() {
            return false;
        }
        executes.iter().all(|execute| {
            self.actions
                .iter()
                .any(|a| a.is_manual_approval() && a.run_order < *execute)
        })
    }

    /// Namespaces published by actions in this stage.
    pub fn namespaces(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|a| a.namespace.as_deref())
            .collect()
    }

    fn to_json(&self) -> serde_json::Value {
        let mut actions: Vec<&Action> = self.actions.iter().collect();
        actions.sort_by_key(|a| a.run_order);
        json!({
            "Name": self.name,
            "Actions": actions.iter().map(|a| a.to_json()).collect::<Vec<_>>(),
        })
    }
}

/// `AWS::CodePipeline::Pipeline`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    /// Pipeline name (e.g., "staticsite-pipeline").
    pub name: String,
    pub role: LogicalId,
    pub artifact_bucket: LogicalId,
    pub encryption_key: Option<LogicalId>,
    pub restart_on_update: bool,
    /// Pipeline stages, in execution order.
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, role: &LogicalId, artifact_bucket: &LogicalId) -> Self {
        Self {
            name: name.into(),
            role: role.clone(),
            artifact_bucket: artifact_bucket.clone(),
            encryption_key: None,
            restart_on_update: true,
            stages: Vec::new(),
        }
    }

    pub fn with_encryption_key(mut self, key: &LogicalId) -> Self {
        self.encryption_key = Some(key.clone());
        self
    }

    pub fn add_stage(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Check names, artifact flow and variable references.
    ///
    /// Artifacts and namespaces must be produced by an earlier stage, or by an
    /// action with a lower run order in the same stage.
    pub fn validate(&self) -> Result<()> {
        if self.stages.len() < 2 {
            return Err(Error::InvalidInput(format!(
                "pipeline '{}' needs at least two stages",
                self.name
            )));
        }

        let mut stage_names = HashSet::new();
        let mut produced: HashSet<&str> = HashSet::new();
        let mut published: HashSet<&str> = HashSet::new();

        for stage in &self.stages {
            if !stage_names.insert(stage.name.as_str()) {
                return Err(Error::Duplicate(format!("pipeline stage '{}'", stage.name)));
            }
            if stage.actions.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "stage '{}' has no actions",
                    stage.name
                )));
            }

            let mut action_names = HashSet::new();
            let mut actions: Vec<&Action> = stage.actions.iter().collect();
            actions.sort_by_key(|a| a.run_order);

            let mut pending_outputs: Vec<&str> = Vec::new();
            let mut pending_namespaces: Vec<&str> = Vec::new();
            let mut current_order = None;

            for action in actions {
                if !action_names.insert(action.name.as_str()) {
                    return Err(Error::Duplicate(format!(
                        "action '{}' in stage '{}'",
                        action.name, stage.name
                    )));
                }
                if current_order != Some(action.run_order) {
                    produced.extend(pending_outputs.drain(..));
                    published.extend(pending_namespaces.drain(..));
                    current_order = Some(action.run_order);
                }
                for input in action.input_artifacts() {
                    if !produced.contains(input.name()) {
                        return Err(Error::NotFound(format!(
                            "artifact '{}' consumed by '{}/{}' is not produced earlier",
                            input, stage.name, action.name
                        )));
                    }
                }
                for namespace in action.referenced_namespaces() {
                    if !published.contains(namespace) {
                        return Err(Error::NotFound(format!(
                            "namespace '{}' referenced by '{}/{}' is not published earlier",
                            namespace, stage.name, action.name
                        )));
                    }
                }
                for output in action.output_artifacts() {
                    if produced.contains(output.name()) || pending_outputs.contains(&output.name())
                    {
                        return Err(Error::Duplicate(format!("artifact '{}'", output)));
                    }
                    pending_outputs.push(output.name());
                }
                if let Some(namespace) = action.namespace.as_deref() {
                    if published.contains(namespace) || pending_namespaces.contains(&namespace) {
                        return Err(Error::Duplicate(format!("namespace '{}'", namespace)));
                    }
                    pending_namespaces.push(namespace);
                }
            }
            produced.extend(pending_outputs);
            published.extend(pending_namespaces);
        }
        Ok(())
    }

    pub(crate) fn properties(&self) -> Properties {
        let mut store = json!({"Type": "S3", "Location": Value::reference(&self.artifact_bucket)});
        if let Some(key) = &self.encryption_key {
            store["EncryptionKey"] = json!({"Type": "KMS", "Id": Value::get_att(key, "Arn")});
        }
        Properties::new()
            .set("Name", json!(self.name))
            .set("RoleArn", json!(Value::get_att(&self.role, "Arn")))
            .set("RestartExecutionOnUpdate", json!(self.restart_on_update))
            .set("ArtifactStore", store)
            .set(
                "Stages",
                json!(self.stages.iter().map(Stage::to_json).collect::<Vec<_>>()),
            )
    }
}
