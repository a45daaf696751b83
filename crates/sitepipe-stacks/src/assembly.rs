//! Cloud assembly: rendered templates plus the manifest describing them.
//!
//! Layout written by [`CloudAssembly::write_to`]:
//!
//! ```text
//! cdk.out/
//! ├── manifest.json
//! ├── staticapppipelinestack.template.json
//! └── staticsiteDeploymentDev-staticsiteDeploymentDev.template.json
//! ```

use crate::audit::check_origin_access;
use crate::{PipelineStack, SynthResult};
use serde::Serialize;
use sitepipe_core::{Stack, Tags, Template};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: &str = "1.0.0";

const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub version: String,
    pub artifacts: BTreeMap<String, ArtifactManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactManifest {
    #[serde(rename = "type")]
    pub artifact_type: String,
    /// `aws://{account}/{region}`.
    pub environment: String,
    pub properties: ArtifactProperties,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactProperties {
    pub template_file: String,
}

/// A rendered stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackArtifact {
    pub stack_name: String,
    pub environment: String,
    pub template: Template,
    pub dependencies: Vec<String>,
}

impl StackArtifact {
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.stack_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloudAssembly {
    /// Stacks in deployment order: the pipeline first, then each stage.
    pub stacks: Vec<StackArtifact>,
}

impl CloudAssembly {
    /// Audit and render every stack of the pipeline.
    pub fn synthesize(pipeline: &PipelineStack, tags: &Tags) -> SynthResult<Self> {
        let stacks = pipeline
            .stacks()
            .map(|stack| render(stack, tags))
            .collect::<SynthResult<Vec<_>>>()?;
        info!(stacks = stacks.len(), tags = tags.len(), "synthesized cloud assembly");
        Ok(Self { stacks })
    }

    pub fn stack(&self, name: &str) -> Option<&StackArtifact> {
        self.stacks.iter().find(|s| s.stack_name == name)
    }

    pub fn stack_names(&self) -> impl Iterator<Item = &str> {
        self.stacks.iter().map(|s| s.stack_name.as_str())
    }

    pub fn manifest(&self) -> Manifest {
        let artifacts = self
            .stacks
            .iter()
            .map(|stack| {
                (
                    stack.stack_name.clone(),
                    ArtifactManifest {
                        artifact_type: STACK_ARTIFACT_TYPE.to_string(),
                        environment: stack.environment.clone(),
                        properties: ArtifactProperties {
                            template_file: stack.template_file(),
                        },
                        dependencies: stack.dependencies.clone(),
                    },
                )
            })
            .collect();
        Manifest {
            version: MANIFEST_VERSION.to_string(),
            artifacts,
        }
    }

    /// File name and contents of every file in the assembly.
    pub fn files(&self) -> SynthResult<Vec<(String, String)>> {
        let mut manifest = serde_json::to_string_pretty(&self.manifest())?;
        manifest.push('\n');
        let mut files = vec![(MANIFEST_FILE.to_string(), manifest)];
        for stack in &self.stacks {
            files.push((stack.template_file(), stack.template.to_json_pretty()?));
        }
        Ok(files)
    }

    /// Write the assembly into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> SynthResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for (name, contents) in self.files()? {
            let path = dir.join(&name);
            std::fs::write(&path, contents)?;
            debug!(path = %path.display(), "wrote assembly file");
            written.push(path);
        }
        info!(dir = %dir.display(), files = written.len(), "wrote cloud assembly");
        Ok(written)
    }
}

fn render(stack: &Stack, tags: &Tags) -> SynthResult<StackArtifact> {
    check_origin_access(stack)?;
    let template = stack.to_template(tags)?;
    info!(stack = %stack.name, env = %stack.env, resources = template.resources.len(), "rendered stack");
    Ok(StackArtifact {
        stack_name: stack.name.clone(),
        environment: stack.env.to_string(),
        template,
        dependencies: stack.dependencies().map(str::to_string).collect(),
    })
}
