//! The self-mutating delivery pipeline and its supporting resources.

use crate::application_stage::ApplicationStage;
use crate::SynthResult;
use sitepipe_config::profiles::profiles_for;
use sitepipe_config::{Profile, ProjectConfig, ToolConfig};
use sitepipe_core::codebuild::{BuildEnvironment, BuildSpec, ComputeType, LinuxBuildImage, Project};
use sitepipe_core::codecommit::Repository;
use sitepipe_core::iam::{Policy, PolicyDocument, PolicyStatement, Principal, Role};
use sitepipe_core::kms::{Alias, Key};
use sitepipe_core::pipeline::{
    Action, ActionKind, Artifact, CHANGE_SET_CAPABILITIES, ChangeSetMode, Pipeline, Stage,
    variable,
};
use sitepipe_core::s3::{
    BlockPublicAccess, Bucket, BucketEncryption, BucketPolicy, bucket_arn, bucket_objects_arn,
};
use sitepipe_core::stack::{RemovalPolicy, ResourceKind};
use sitepipe_core::{BootstrapRoles, ConstructPath, LogicalId, Stack, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

pub const STACK_NAME: &str = "staticapppipelinestack";

pub const SOURCE_STAGE: &str = "Source";
pub const BUILD_STAGE: &str = "Build";
pub const UPDATE_STAGE: &str = "UpdatePipeline";

const SOURCE_ARTIFACT: &str = "SourceArtifact";
const ASSEMBLY_ARTIFACT: &str = "CloudAssemblyArtifact";
const ASSEMBLY_DIR: &str = "cdk.out";
const CHANGE_SET_NAME: &str = "PipelineChange";

const ARTIFACT_READ_ACTIONS: [&str; 3] = ["s3:GetObject*", "s3:GetBucket*", "s3:List*"];
const ARTIFACT_WRITE_ACTIONS: [&str; 3] = ["s3:DeleteObject*", "s3:PutObject*", "s3:Abort*"];
const KEY_USE_ACTIONS: [&str; 5] = [
    "kms:Decrypt",
    "kms:DescribeKey",
    "kms:Encrypt",
    "kms:ReEncrypt*",
    "kms:GenerateDataKey*",
];

/// The pipeline stack plus the application stages it deploys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStack {
    pub stack: Stack,
    pub repository: LogicalId,
    pub pipeline: LogicalId,
    /// Deployment stages in pipeline order.
    pub stages: Vec<ApplicationStage>,
    /// Credentials profiles configured on the synth build host.
    pub profiles: Vec<Profile>,
}

/// KMS key and bucket holding pipeline artifacts.
struct ArtifactStore {
    key: LogicalId,
    bucket: LogicalId,
}

impl ArtifactStore {
    fn read_write_statements(&self) -> Vec<PolicyStatement> {
        vec![
            PolicyStatement::allow()
                .with_actions(ARTIFACT_READ_ACTIONS)
                .with_actions(ARTIFACT_WRITE_ACTIONS)
                .with_resources([bucket_arn(&self.bucket), bucket_objects_arn(&self.bucket)]),
            PolicyStatement::allow()
                .with_actions(KEY_USE_ACTIONS)
                .with_resource(Value::get_att(&self.key, "Arn")),
        ]
    }
}

impl PipelineStack {
    pub fn build(project: &ProjectConfig, tool: &ToolConfig) -> SynthResult<Self> {
        let env = project.pipeline_env()?.clone();
        let roles = tool.roles();
        let profiles = profiles_for(
            &project.deployments,
            &roles,
            project.pipeline.credential_source,
        );
        let mut stages = project
            .deployments
            .iter()
            .map(|deployment| ApplicationStage::new(deployment, &project.site))
            .collect::<SynthResult<Vec<_>>>()?;
        // Stage stacks are deployed by this pipeline.
        for stage in &mut stages {
            stage.stack.add_dependency(STACK_NAME);
        }

        let mut stack = Stack::new(ConstructPath::root(STACK_NAME), STACK_NAME, env.clone())
            .with_description(format!(
                "Delivery pipeline {} for repository {}",
                tool.pipeline_name, tool.repo.name
            ));

        let repository = stack.add(
            ConstructPath::root(&tool.repo.name),
            ResourceKind::Repository(Repository::new(
                &tool.repo.name,
                Some(tool.repo.description.clone()),
            )),
        )?;

        let deploy_role_arns: BTreeSet<String> = stages
            .iter()
            .map(|stage| roles.deploy_role_arn(&stage.env))
            .collect();
        let root = ConstructPath::root("Pipeline");
        let store = add_artifact_store(&mut stack, &root, tool, &env.root_arn(), &deploy_role_arns)?;

        let pipeline_role = stack.add(
            root.child("Role"),
            ResourceKind::Role(Role::assumed_by(Principal::service(
                "codepipeline.amazonaws.com",
            ))),
        )?;

        let repo_pull = PolicyStatement::allow()
            .with_action("codecommit:GitPull")
            .with_resource(Value::get_att(&repository, "Arn"));

        // Build
        let synth = &project.pipeline.synth;
        let install = synth
            .install_commands
            .iter()
            .cloned()
            .chain(profiles.iter().flat_map(Profile::configure_commands));
        let build = synth
            .build_commands
            .iter()
            .cloned()
            .chain(std::iter::once(synth.synth_command.clone()));
        let synth_spec = BuildSpec::new()
            .with_install(install)
            .with_build(build)
            .with_artifacts(ASSEMBLY_DIR);
        let mut synth_statements = vec![repo_pull.clone()];
        synth_statements.extend(synth.additional_policy.iter().cloned());
        let synth_project = add_project(
            &mut stack,
            &root.child(BUILD_STAGE).child("Synth"),
            synth_spec,
            BuildEnvironment {
                compute_type: ComputeType::Large,
                image: LinuxBuildImage::Standard5_0,
                privileged: true,
            },
            &store,
            synth_statements,
        )?;

        // UpdatePipeline
        let exec_role_arn = roles.cfn_exec_role_arn(&env);
        let mutate_spec = BuildSpec::new().with_build([format!(
            "aws cloudformation deploy --template-file {stack}.template.json --stack-name {stack} \
             --role-arn {role} --capabilities {caps} --no-fail-on-empty-changeset",
            stack = STACK_NAME,
            role = exec_role_arn,
            caps = CHANGE_SET_CAPABILITIES.replace(',', " "),
        )]);
        let mutate_statements = vec![
            PolicyStatement::allow()
                .with_actions([
                    "cloudformation:DescribeStacks",
                    "cloudformation:DescribeStackEvents",
                    "cloudformation:CreateChangeSet",
                    "cloudformation:DescribeChangeSet",
                    "cloudformation:ExecuteChangeSet",
                    "cloudformation:DeleteChangeSet",
                    "cloudformation:GetTemplateSummary",
                ])
                .with_resource(Value::sub(format!(
                    "arn:${{AWS::Partition}}:cloudformation:${{AWS::Region}}:${{AWS::AccountId}}:stack/{}/*",
                    STACK_NAME
                ))),
            PolicyStatement::allow()
                .with_action("iam:PassRole")
                .with_resource(exec_role_arn.as_str()),
        ];
        let mutate_project = add_project(
            &mut stack,
            &root.child(UPDATE_STAGE).child("SelfMutate"),
            mutate_spec,
            BuildEnvironment::default(),
            &store,
            mutate_statements,
        )?;

        let source = Artifact::new(SOURCE_ARTIFACT);
        let assembly = Artifact::new(ASSEMBLY_ARTIFACT);

        let mut pipeline = Pipeline::new(&tool.pipeline_name, &pipeline_role, &store.bucket)
            .with_encryption_key(&store.key);
        pipeline.add_stage(Stage::new(SOURCE_STAGE).with_action(Action::new(
            "Checkout",
            1,
            ActionKind::CodeCommitSource {
                repository: repository.clone(),
                branch: project.pipeline.branch.clone(),
                output: source.clone(),
                clone_output: true,
            },
        )));
        pipeline.add_stage(Stage::new(BUILD_STAGE).with_action(Action::new(
            "Synth",
            1,
            ActionKind::CodeBuild {
                project: synth_project.clone(),
                inputs: vec![source.clone()],
                outputs: vec![assembly.clone()],
                env: BTreeMap::new(),
            },
        )));
        pipeline.add_stage(Stage::new(UPDATE_STAGE).with_action(Action::new(
            "SelfMutate",
            1,
            ActionKind::CodeBuild {
                project: mutate_project.clone(),
                inputs: vec![assembly.clone()],
                outputs: Vec::new(),
                env: BTreeMap::new(),
            },
        )));

        let mut projects = vec![synth_project, mutate_project];
        for stage in &stages {
            let (pipeline_stage, shell_project) = add_deployment_stage(
                &mut stack,
                &root,
                stage,
                &roles,
                &project.site.build_directory,
                &source,
                &assembly,
                &store,
                &repo_pull,
            )?;
            pipeline.add_stage(pipeline_stage);
            projects.push(shell_project);
        }
        pipeline.validate()?;

        let pipeline_id = stack.add(
            root.child("Resource"),
            ResourceKind::Pipeline(Box::new(pipeline)),
        )?;

        let mut pipeline_statements = store.read_write_statements();
        pipeline_statements.push(
            PolicyStatement::allow()
                .with_actions([
                    "codecommit:GetBranch",
                    "codecommit:GetCommit",
                    "codecommit:UploadArchive",
                    "codecommit:GetUploadArchiveStatus",
                    "codecommit:CancelUploadArchive",
                ])
                .with_resource(Value::get_att(&repository, "Arn")),
        );
        pipeline_statements.push(
            PolicyStatement::allow()
                .with_actions(["codebuild:BatchGetBuilds", "codebuild:StartBuild", "codebuild:StopBuild"])
                .with_resources(projects.iter().map(|p| Value::get_att(p, "Arn"))),
        );
        pipeline_statements.push(
            PolicyStatement::allow()
                .with_action("sts:AssumeRole")
                .with_resources(deploy_role_arns.iter().map(String::as_str)),
        );
        let pipeline_policy = stack.add(
            root.child("Role").child("DefaultPolicy"),
            ResourceKind::Policy(
                Policy::new("PipelineRoleDefaultPolicy", PolicyDocument::new(pipeline_statements))
                    .attach_to(&pipeline_role),
            ),
        )?;
        stack.add_depends_on(&pipeline_id, &pipeline_policy)?;

        info!(
            stack = %stack.name,
            pipeline = %tool.pipeline_name,
            stages = stages.len(),
            resources = stack.len(),
            "pipeline stack created"
        );

        Ok(Self {
            stack,
            repository,
            pipeline: pipeline_id,
            stages,
            profiles,
        })
    }

    /// The pipeline stack followed by every stage stack, in deployment order.
    pub fn stacks(&self) -> impl Iterator<Item = &Stack> {
        std::iter::once(&self.stack).chain(self.stages.iter().map(|stage| &stage.stack))
    }

    pub fn pipeline(&self) -> Option<&Pipeline> {
        match self.stack.get(&self.pipeline).map(|r| &r.kind) {
            Some(ResourceKind::Pipeline(pipeline)) => Some(pipeline),
            _ => None,
        }
    }
}

fn add_artifact_store(
    stack: &mut Stack,
    root: &ConstructPath,
    tool: &ToolConfig,
    account_root_arn: &str,
    deploy_role_arns: &BTreeSet<String>,
) -> SynthResult<ArtifactStore> {
    let mut key_policy = PolicyDocument::new(vec![
        PolicyStatement::allow()
            .with_sid("KeyAdministration")
            .with_action("kms:*")
            .with_resource("*")
            .with_principal(Principal::Aws(Value::literal(account_root_arn))),
    ]);
    let mut deploy_decrypt = PolicyStatement::allow()
        .with_sid("DeployRolesDecrypt")
        .with_actions(["kms:Decrypt", "kms:DescribeKey"])
        .with_resource("*");
    for arn in deploy_role_arns {
        deploy_decrypt = deploy_decrypt.with_principal(Principal::Aws(Value::literal(arn)));
    }
    key_policy.add_statement(deploy_decrypt);

    let key = stack.add(
        root.child("ArtifactsBucketEncryptionKey"),
        ResourceKind::Key(
            Key::new(key_policy)
                .with_description(format!("Artifact encryption for {}", tool.pipeline_name)),
        ),
    )?;
    stack.set_removal_policy(&key, RemovalPolicy::Destroy)?;
    stack.add(
        root.child("ArtifactsBucketEncryptionKeyAlias"),
        ResourceKind::Alias(Alias::new(
            format!("codepipeline-{}", alias_name(&tool.pipeline_name)),
            &key,
        )),
    )?;

    let bucket = stack.add(
        root.child("ArtifactsBucket"),
        ResourceKind::Bucket(
            Bucket::new()
                .with_encryption(BucketEncryption::Kms(key.clone()))
                .with_block_public_access(BlockPublicAccess::BLOCK_ALL),
        ),
    )?;
    stack.set_removal_policy(&bucket, RemovalPolicy::Retain)?;

    let mut deploy_read = PolicyStatement::allow()
        .with_actions(ARTIFACT_READ_ACTIONS)
        .with_resources([bucket_arn(&bucket), bucket_objects_arn(&bucket)]);
    for arn in deploy_role_arns {
        deploy_read = deploy_read.with_principal(Principal::Aws(Value::literal(arn)));
    }
    stack.add(
        root.child("ArtifactsBucket").child("Policy"),
        ResourceKind::BucketPolicy(BucketPolicy::new(
            &bucket,
            PolicyDocument::new(vec![deploy_read]),
        )),
    )?;

    Ok(ArtifactStore { key, bucket })
}

/// Lowercase, with characters not allowed in alias names replaced by `-`.
fn alias_name(pipeline_name: &str) -> String {
    pipeline_name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Add a CodeBuild project with its own service role under `path`.
fn add_project(
    stack: &mut Stack,
    path: &ConstructPath,
    spec: BuildSpec,
    environment: BuildEnvironment,
    store: &ArtifactStore,
    statements: Vec<PolicyStatement>,
) -> SynthResult<LogicalId> {
    let role = stack.add(
        path.child("Role"),
        ResourceKind::Role(Role::assumed_by(Principal::service("codebuild.amazonaws.com"))),
    )?;

    let mut document = PolicyDocument::new(vec![
        PolicyStatement::allow()
            .with_actions([
                "logs:CreateLogGroup",
                "logs:CreateLogStream",
                "logs:PutLogEvents",
            ])
            .with_resource(Value::sub(
                "arn:${AWS::Partition}:logs:${AWS::Region}:${AWS::AccountId}:log-group:/aws/codebuild/*",
            )),
    ]);
    for statement in store.read_write_statements().into_iter().chain(statements) {
        document.add_statement(statement);
    }
    let policy_name = format!("{}RoleDefaultPolicy", role);
    stack.add(
        path.child("Role").child("DefaultPolicy"),
        ResourceKind::Policy(Policy::new(policy_name, document).attach_to(&role)),
    )?;

    let project = Project::new(spec, &role)
        .with_environment(environment)
        .with_encryption_key(&store.key)
        .with_description(format!("Pipeline step {}", path));
    Ok(stack.add(
        path.child("Project"),
        ResourceKind::Project(Box::new(project)),
    )?)
}

/// Prepare, approve and execute the stage's change set, then sync the site.
#[allow(clippy::too_many_arguments)]
fn add_deployment_stage(
    stack: &mut Stack,
    root: &ConstructPath,
    stage: &ApplicationStage,
    roles: &BootstrapRoles,
    build_directory: &str,
    source: &Artifact,
    assembly: &Artifact,
    store: &ArtifactStore,
    repo_pull: &PolicyStatement,
) -> SynthResult<(Stage, LogicalId)> {
    let stack_name = stage.stack_name().to_string();
    let deploy_role_arn = roles.deploy_role_arn(&stage.env);
    let namespace = format!("{}Outputs", stage.id);

    let mut pipeline_stage = Stage::new(&stage.id)
        .with_action(
            Action::new(
                "Prepare",
                1,
                ActionKind::CloudFormation {
                    stack_name: stack_name.clone(),
                    change_set_name: CHANGE_SET_NAME.to_string(),
                    mode: ChangeSetMode::Replace {
                        template: assembly.clone(),
                        template_file: format!("{}.template.json", stack_name),
                        execution_role_arn: roles.cfn_exec_role_arn(&stage.env),
                    },
                },
            )
            .with_role_arn(&deploy_role_arn),
        )
        .with_action(Action::new(
            "ManualApproval",
            2,
            ActionKind::ManualApproval {
                comment: Some(format!("Approve deployment of {} to {}", stack_name, stage.env)),
            },
        ))
        .with_action(
            Action::new(
                "Deploy",
                3,
                ActionKind::CloudFormation {
                    stack_name: stack_name.clone(),
                    change_set_name: CHANGE_SET_NAME.to_string(),
                    mode: ChangeSetMode::Execute,
                },
            )
            .with_namespace(&namespace)
            .with_role_arn(&deploy_role_arn),
        );

    let action_name = format!("deployToS3{}", stage.suffix());
    let spec = BuildSpec::new().with_build([
        "npm install".to_string(),
        "npm run build".to_string(),
        format!(
            "aws s3 sync ./{} s3://${}/ --delete",
            build_directory,
            stage.source_bucket_name().name
        ),
        format!(
            "aws cloudfront create-invalidation --distribution-id ${} --paths \"/*\"",
            stage.distribution_id().name
        ),
    ]);
    let statements = vec![
        repo_pull.clone(),
        PolicyStatement::allow()
            .with_actions(["s3:PutObject", "s3:ListBucket", "s3:DeleteObject"])
            .with_resource("*"),
        PolicyStatement::allow()
            .with_action("cloudfront:CreateInvalidation")
            .with_resource("*"),
    ];
    let project = add_project(
        stack,
        &root.child(&stage.id).child(&action_name),
        spec,
        BuildEnvironment::default(),
        store,
        statements,
    )?;

    let env = [stage.source_bucket_name(), stage.distribution_id()]
        .into_iter()
        .map(|output| (output.name.clone(), variable(&namespace, &output.name)))
        .collect();
    pipeline_stage.add_action_after(
        action_name,
        ActionKind::CodeBuild {
            project: project.clone(),
            inputs: vec![source.clone()],
            outputs: Vec::new(),
            env,
        },
    );

    Ok((pipeline_stage, project))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepipe_config::project::parse_project;
    use sitepipe_config::tool::parse_tool_config;
    use sitepipe_core::Tags;

    const PROJECT: &str = r#"
Deployment:
  dev:
    AccountNumber: "111111111111"
    Region: us-east-1
  sandbox:
    AccountNumber: "222222222222"
    Region: us-east-1
Pipeline:
  Synth:
    AdditionalPolicy:
      - effect: ALLOW
        actions: ["ssm:GetParameter"]
        resources: ["*"]
"#;

    const TOOL: &str = r#"{"context": {
        "@aws-cdk/core:bootstrapQualifier": "hnb659fds",
        "repo": {"repo_name": "staticsite", "repo_desc": "Static site sources"},
        "pipeline": {"pipeline_name": "staticsite-pipeline"}
    }}"#;

    fn build() -> PipelineStack {
        let project = parse_project(PROJECT).unwrap();
        let tool = parse_tool_config(TOOL).unwrap();
        PipelineStack::build(&project, &tool).unwrap()
    }

    fn policy_of<'a>(stack: &'a Stack, path: &ConstructPath) -> &'a PolicyDocument {
        let id = LogicalId::from_path(path).unwrap();
        match &stack.get(&id).unwrap().kind {
            ResourceKind::Policy(policy) => &policy.document,
            other => panic!("expected a policy, found {}", other.type_name()),
        }
    }

    #[test]
    fn test_stage_stacks_depend_on_pipeline_stack() {
        let built = build();
        assert_eq!(built.stack.dependencies().count(), 0);
        for stage in &built.stages {
            assert_eq!(stage.stack.dependencies().collect::<Vec<_>>(), vec![STACK_NAME]);
        }
    }

    #[test]
    fn test_stage_order() {
        let built = build();
        let pipeline = built.pipeline().unwrap();
        let names: Vec<_> = pipeline.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Source",
                "Build",
                "UpdatePipeline",
                "staticsiteDeploymentDev",
                "staticsiteDeploymentSandbox"
            ]
        );
        assert_eq!(pipeline.name, "staticsite-pipeline");
        assert!(pipeline.encryption_key.is_some());
    }

    #[test]
    fn test_deployment_stages_gated_by_approval() {
        let built = build();
        let pipeline = built.pipeline().unwrap();
        for stage in &built.stages {
            let pipeline_stage = pipeline.stage(&stage.id).unwrap();
            assert!(pipeline_stage.requires_approval());
            let mut actions: Vec<_> = pipeline_stage.actions.iter().collect();
            actions.sort_by_key(|a| a.run_order);
            let names: Vec<_> = actions.iter().map(|a| a.name.as_str()).collect();
            let shell = format!("deployToS3{}", stage.suffix());
            assert_eq!(names, vec!["Prepare", "ManualApproval", "Deploy", shell.as_str()]);
            assert_eq!(actions[3].run_order, 4);
        }
    }

    #[test]
    fn test_shell_action_reads_own_stage_outputs() {
        let built = build();
        let pipeline = built.pipeline().unwrap();
        let mut seen = BTreeSet::new();
        for stage in &built.stages {
            let pipeline_stage = pipeline.stage(&stage.id).unwrap();
            let own = pipeline_stage.namespaces();
            assert_eq!(own.len(), 1);
            assert!(seen.insert(own[0].to_string()), "namespace reused across stages");

            let shell = pipeline_stage
                .actions
                .iter()
                .find(|a| a.name.starts_with("deployToS3"))
                .unwrap();
            let referenced = shell.referenced_namespaces();
            assert!(!referenced.is_empty());
            assert!(referenced.iter().all(|ns| own.contains(ns)));

            let ActionKind::CodeBuild { env, .. } = &shell.kind else {
                panic!("shell action must be a CodeBuild action");
            };
            assert_eq!(
                env["sourceBucketName"],
                variable(own[0], &stage.source_bucket_name().name)
            );
            assert_eq!(stage.source_bucket_name().stack_name, stage.stack_name());
            assert!(env.contains_key("distributionId"));
        }
    }

    #[test]
    fn test_change_sets_use_bootstrap_roles() {
        let built = build();
        let pipeline = built.pipeline().unwrap();
        let prepare = pipeline
            .stage("staticsiteDeploymentSandbox")
            .unwrap()
            .actions
            .iter()
            .find(|a| a.name == "Prepare")
            .unwrap();
        assert_eq!(
            prepare.role_arn.as_deref(),
            Some("arn:aws:iam::222222222222:role/cdk-hnb659fds-deploy-role-222222222222-us-east-1")
        );
        let ActionKind::CloudFormation {
            mode: ChangeSetMode::Replace { execution_role_arn, template_file, .. },
            ..
        } = &prepare.kind
        else {
            panic!("expected a change set replace action");
        };
        assert_eq!(
            execution_role_arn,
            "arn:aws:iam::222222222222:role/cdk-hnb659fds-cfn-exec-role-222222222222-us-east-1"
        );
        assert_eq!(
            template_file,
            "staticsiteDeploymentSandbox-staticsiteDeploymentSandbox.template.json"
        );
    }

    #[test]
    fn test_profiles_per_deployment() {
        let built = build();
        assert_eq!(built.profiles.len(), 2);
        assert_eq!(built.profiles[0].name, "dev");
        assert_eq!(
            built.profiles[1].role_arn,
            "arn:aws:iam::222222222222:role/cdk-hnb659fds-cfn-exec-role-222222222222-us-east-1"
        );
    }

    #[test]
    fn test_synth_installs_profiles() {
        let built = build();
        let id = LogicalId::from_path(
            &ConstructPath::root("Pipeline")
                .child(BUILD_STAGE)
                .child("Synth")
                .child("Project"),
        )
        .unwrap();
        let ResourceKind::Project(project) = &built.stack.get(&id).unwrap().kind else {
            panic!("expected the synth project");
        };
        let install = &project.build_spec.install;
        for profile in &built.profiles {
            for command in profile.configure_commands() {
                assert!(install.contains(&command));
            }
        }
        assert!(project.environment.privileged);
        assert_eq!(project.environment.compute_type, ComputeType::Large);
        assert_eq!(
            project.build_spec.build.last().map(String::as_str),
            Some("sitepipe synth --output cdk.out")
        );
    }

    #[test]
    fn test_synth_role_gets_additional_policy() {
        let built = build();
        let document = policy_of(
            &built.stack,
            &ConstructPath::root("Pipeline")
                .child(BUILD_STAGE)
                .child("Synth")
                .child("Role")
                .child("DefaultPolicy"),
        );
        assert!(
            document
                .statements
                .iter()
                .any(|s| s.actions == vec!["ssm:GetParameter".to_string()])
        );
    }

    #[test]
    fn test_shell_role_statements() {
        let built = build();
        let document = policy_of(
            &built.stack,
            &ConstructPath::root("Pipeline")
                .child("staticsiteDeploymentDev")
                .child("deployToS3Dev")
                .child("Role")
                .child("DefaultPolicy"),
        );
        let actions: Vec<&str> = document
            .statements
            .iter()
            .flat_map(|s| s.actions.iter().map(String::as_str))
            .collect();
        for expected in [
            "s3:PutObject",
            "s3:ListBucket",
            "s3:DeleteObject",
            "cloudfront:CreateInvalidation",
        ] {
            assert!(actions.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn test_artifact_key_trusts_deploy_roles() {
        let built = build();
        let template = built.stack.to_template(&Tags::new()).unwrap();
        let (_, key) = template.resources_of_type("AWS::KMS::Key").next().unwrap();
        let rendered = key.properties["KeyPolicy"].to_string();
        assert!(rendered.contains("cdk-hnb659fds-deploy-role-111111111111-us-east-1"));
        assert!(rendered.contains("cdk-hnb659fds-deploy-role-222222222222-us-east-1"));
        assert!(rendered.contains("arn:aws:iam::111111111111:root"));
    }

    #[test]
    fn test_stacks_in_deployment_order() {
        let built = build();
        let names: Vec<_> = built.stacks().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                STACK_NAME,
                "staticsiteDeploymentDev-staticsiteDeploymentDev",
                "staticsiteDeploymentSandbox-staticsiteDeploymentSandbox"
            ]
        );
    }

    #[test]
    fn test_pipeline_template_renders() {
        let built = build();
        let template = built.stack.to_template(&Tags::new()).unwrap();
        let (_, pipeline) = template
            .resources_of_type("AWS::CodePipeline::Pipeline")
            .next()
            .unwrap();
        assert_eq!(pipeline.depends_on.len(), 1);
        assert_eq!(pipeline.properties["RestartExecutionOnUpdate"], true);
        assert_eq!(
            pipeline.properties["Stages"][0]["Actions"][0]["Configuration"]["BranchName"],
            "master"
        );
    }

    #[test]
    fn test_alias_name() {
        assert_eq!(alias_name("Static.Site@Pipeline"), "static-site-pipeline");
    }
}
