//! Commands that write to disk.

use super::{ConfigPaths, synthesize};
use anyhow::{Context, Result};
use sitepipe_config::profiles::{profiles_for, write_profiles};
use std::path::Path;
use tracing::info;

pub fn run(paths: &ConfigPaths, output: &Path, profiles_path: &Path) -> Result<()> {
    let (pipeline, assembly) = synthesize(paths)?;
    write_profiles(profiles_path, &pipeline.profiles)
        .with_context(|| format!("failed to write {}", profiles_path.display()))?;
    let written = assembly
        .write_to(output)
        .with_context(|| format!("failed to write assembly to {}", output.display()))?;
    info!(
        output = %output.display(),
        files = written.len(),
        profiles = pipeline.profiles.len(),
        "synth complete"
    );
    Ok(())
}

pub fn profiles(paths: &ConfigPaths, profiles_path: &Path) -> Result<()> {
    let project = paths.load_project()?;
    let tool = paths.load_tool_config()?;
    let profiles = profiles_for(
        &project.deployments,
        &tool.roles(),
        project.pipeline.credential_source,
    );
    write_profiles(profiles_path, &profiles)
        .with_context(|| format!("failed to write {}", profiles_path.display()))?;
    println!(
        "Wrote {} profiles to {}",
        profiles.len(),
        profiles_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{PROJECT, config_in};

    #[test]
    fn test_run_writes_profiles_and_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let paths = config_in(dir.path(), PROJECT);
        let output = dir.path().join("cdk.out");
        let profiles_path = dir.path().join(".aws").join("config");

        run(&paths, &output, &profiles_path).unwrap();

        let profiles = std::fs::read_to_string(&profiles_path).unwrap();
        assert!(profiles.contains("[profile dev]"));
        assert!(profiles.contains("[profile sandbox]"));
        assert!(profiles.contains("arn:aws:iam::222222222222:role/cdk-hnb659fds-cfn-exec-role-222222222222-us-east-1"));

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(output.join("manifest.json")).unwrap())
                .unwrap();
        assert_eq!(manifest["artifacts"].as_object().unwrap().len(), 3);
        assert!(output.join("staticapppipelinestack.template.json").exists());
    }

    #[test]
    fn test_run_writes_nothing_on_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let project = PROJECT.replace("\"222222222222\"", "\"2222\"");
        let paths = config_in(dir.path(), &project);
        let output = dir.path().join("cdk.out");
        let profiles_path = dir.path().join("profiles");

        assert!(run(&paths, &output, &profiles_path).is_err());
        assert!(!output.exists());
        assert!(!profiles_path.exists());
    }

    #[test]
    fn test_profiles_command() {
        let dir = tempfile::tempdir().unwrap();
        let paths = config_in(dir.path(), PROJECT);
        let profiles_path = dir.path().join("config");
        profiles(&paths, &profiles_path).unwrap();
        let written = std::fs::read_to_string(&profiles_path).unwrap();
        assert_eq!(written.matches("[profile ").count(), 2);
    }
}
