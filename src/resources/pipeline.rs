//! SW-010: Build pipeline resource — builds the application image from a
//! source repository and pushes it to an image repository.

use super::{tags, PIPELINE_ID};
use crate::core::types::{
    PipelineSpec, PseudoParameter, ResourceKind, ResourceNode, StackSpec, Value,
};

pub const BUILD_IMAGE: &str = "aws/codebuild/amazonlinux2-x86_64-standard:3.0";
pub const IMAGE_TAG: &str = "latest";

/// Image repository name derived from the source repository.
pub fn repository_name(pipeline: &PipelineSpec) -> String {
    pipeline.repo.to_ascii_lowercase()
}

/// Build the pipeline node. Pipelines sit outside the network and depend on
/// nothing; the application consumes their `ImageUri`.
pub fn node(spec: &StackSpec, pipeline: &PipelineSpec) -> ResourceNode {
    let repository = repository_name(pipeline);
    let head_ref = format!("^refs/heads/{}$", pipeline.branch);
    ResourceNode::new(PIPELINE_ID, ResourceKind::BuildPipeline)
        .property(
            "Source",
            Value::map([
                ("Type", Value::from("GITHUB")),
                ("Owner", Value::from(pipeline.owner.as_str())),
                ("Repo", Value::from(pipeline.repo.as_str())),
                ("BuildSpec", Value::from(pipeline.build_spec_path.as_str())),
                ("Webhook", Value::from(true)),
                (
                    "WebhookFilters",
                    Value::list([Value::map([
                        ("Event", "PUSH"),
                        ("HeadRef", head_ref.as_str()),
                    ])]),
                ),
            ]),
        )
        .property(
            "Environment",
            Value::map([
                ("ComputeType", Value::from("BUILD_GENERAL1_SMALL")),
                ("Image", Value::from(BUILD_IMAGE)),
                // docker-in-docker needs a privileged build container
                ("PrivilegedMode", Value::from(true)),
                (
                    "EnvironmentVariables",
                    // the buildspec assembles the registry uri from these
                    Value::map([
                        ("AWS_DEFAULT_REGION", Value::from(PseudoParameter::Region)),
                        ("AWS_ACCOUNT_ID", Value::from(PseudoParameter::AccountId)),
                        ("IMAGE_REPO_NAME", Value::from(repository.as_str())),
                        ("IMAGE_TAG", Value::from(IMAGE_TAG)),
                    ]),
                ),
            ]),
        )
        .property(
            "Cache",
            Value::map([
                ("Type", Value::from("LOCAL")),
                ("Modes", Value::list(["LOCAL_DOCKER_LAYER_CACHE"])),
            ]),
        )
        .property(
            "Repository",
            Value::map([
                ("RepositoryName", Value::from(repository.as_str())),
                ("ImageScanOnPush", Value::from(true)),
            ]),
        )
        .property("Tags", tags(&spec.name, "pipeline"))
}
