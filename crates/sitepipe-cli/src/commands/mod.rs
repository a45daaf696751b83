//! CLI command implementations.

pub mod synth;

use anyhow::{Context, Result};
use sitepipe_config::project::load_project;
use sitepipe_config::tags::load_tags;
use sitepipe_config::tool::load_tool_config;
use sitepipe_config::{ProjectConfig, ToolConfig};
use sitepipe_core::Tags;
use sitepipe_stacks::{CloudAssembly, PipelineStack};
use std::path::PathBuf;
use tracing::debug;

/// Locations of the three input files.
pub struct ConfigPaths {
    pub project: PathBuf,
    pub tags: PathBuf,
    pub tool_config: PathBuf,
}

impl ConfigPaths {
    pub fn load_project(&self) -> Result<ProjectConfig> {
        let project = load_project(&self.project)
            .with_context(|| format!("failed to load {}", self.project.display()))?;
        debug!(path = %self.project.display(), deployments = project.deployments.len(), "loaded project");
        Ok(project)
    }

    pub fn load_tool_config(&self) -> Result<ToolConfig> {
        load_tool_config(&self.tool_config)
            .with_context(|| format!("failed to load {}", self.tool_config.display()))
    }

    pub fn load_tags(&self) -> Result<Tags> {
        load_tags(&self.tags).with_context(|| format!("failed to load {}", self.tags.display()))
    }
}

fn build_pipeline(paths: &ConfigPaths) -> Result<PipelineStack> {
    let project = paths.load_project()?;
    let tool = paths.load_tool_config()?;
    PipelineStack::build(&project, &tool).context("failed to build the pipeline stack")
}

pub(crate) fn synthesize(paths: &ConfigPaths) -> Result<(PipelineStack, CloudAssembly)> {
    let pipeline = build_pipeline(paths)?;
    let tags = paths.load_tags()?;
    let assembly =
        CloudAssembly::synthesize(&pipeline, &tags).context("failed to synthesize templates")?;
    Ok((pipeline, assembly))
}

/// One-line summary of a configuration that synthesizes cleanly.
pub fn check(paths: &ConfigPaths) -> Result<String> {
    let (pipeline, assembly) = synthesize(paths)?;
    Ok(format!(
        "Configuration is valid: {} deployments, {} stacks",
        pipeline.stages.len(),
        assembly.stacks.len()
    ))
}

pub fn validate(paths: &ConfigPaths) -> Result<()> {
    match check(paths) {
        Ok(summary) => {
            println!("{}", summary);
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Name, environment and template file of each stack, in deployment order.
pub fn stack_listing(assembly: &CloudAssembly) -> serde_json::Value {
    assembly
        .stacks
        .iter()
        .map(|stack| {
            serde_json::json!({
                "name": stack.stack_name,
                "environment": stack.environment,
                "templateFile": stack.template_file(),
            })
        })
        .collect()
}

pub fn list(paths: &ConfigPaths, json: bool) -> Result<()> {
    let (_, assembly) = synthesize(paths)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stack_listing(&assembly))?);
    } else {
        for name in assembly.stack_names() {
            println!("{}", name);
        }
    }
    Ok(())
}
