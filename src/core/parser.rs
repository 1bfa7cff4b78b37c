//! SW-006: Stack config parsing and validation.
//!
//! Parses stack.yaml and validates it into a `StackSpec`:
//! - computeSize and dbSize are required and must be known sizes
//! - desiredCount must be within 1..=10
//! - pipelineRepo fields must be non-empty and need the container strategy
//! - the stack name must be a valid stack name

use super::types::*;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

pub const DEFAULT_STACK_NAME: &str = "bitbucket";
pub const DEFAULT_BRANCH: &str = "master";
pub const MAX_DESIRED_COUNT: i64 = 10;

/// Validation error for one configuration field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn stack_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").expect("stack name pattern compiles")
    })
}

/// Parse a stack.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<StackConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse a stack.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<StackConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a parsed config. Returns every problem found, or the typed spec.
pub fn validate_config(config: &StackConfig) -> Result<StackSpec, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let name = match config.name.as_deref() {
        None => DEFAULT_STACK_NAME.to_string(),
        Some(name) => {
            if !stack_name_pattern().is_match(name) {
                errors.push(ValidationError::new(
                    "name",
                    format!(
                        "'{}' must start with a letter and contain only letters, digits and hyphens (max 128)",
                        name
                    ),
                ));
            }
            name.to_string()
        }
    };

    let compute_size = required(&config.compute_size, "computeSize", &mut errors);
    let db_size = required(&config.db_size, "dbSize", &mut errors);

    let strategy = match config.deployment_strategy.as_deref() {
        None => Some(DeploymentStrategy::default()),
        Some(s) => s
            .parse::<DeploymentStrategy>()
            .map_err(|e| errors.push(ValidationError::new("deploymentStrategy", e)))
            .ok(),
    };

    let desired_count = match config.desired_count {
        None => 1,
        Some(n) if (1..=MAX_DESIRED_COUNT).contains(&n) => n as u32,
        Some(n) => {
            errors.push(ValidationError::new(
                "desiredCount",
                format!("must be between 1 and {}, got {}", MAX_DESIRED_COUNT, n),
            ));
            1
        }
    };

    if let Some(image) = &config.image {
        if image.trim().is_empty() {
            errors.push(ValidationError::new("image", "must not be empty"));
        }
    }

    let pipeline = config.pipeline_repo.as_ref().map(|repo| {
        for (field, value) in [
            ("pipelineRepo.owner", &repo.owner),
            ("pipelineRepo.repo", &repo.repo),
            ("pipelineRepo.buildSpecPath", &repo.build_spec_path),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError::new(field, "must not be empty"));
            }
        }
        if repo.branch.as_deref().is_some_and(|b| b.trim().is_empty()) {
            errors.push(ValidationError::new("pipelineRepo.branch", "must not be empty"));
        }
        if strategy == Some(DeploymentStrategy::Vm) {
            errors.push(ValidationError::new(
                "pipelineRepo",
                "a build pipeline produces container images and requires deploymentStrategy: container",
            ));
        }
        if config.image.is_some() {
            errors.push(ValidationError::new(
                "image",
                "cannot be set together with pipelineRepo; the pipeline supplies the image",
            ));
        }
        PipelineSpec {
            owner: repo.owner.clone(),
            repo: repo.repo.clone(),
            build_spec_path: repo.build_spec_path.clone(),
            branch: repo
                .branch
                .clone()
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
        }
    });

    match (compute_size, db_size, strategy) {
        (Some(compute_size), Some(db_size), Some(strategy)) if errors.is_empty() => {
            Ok(StackSpec {
                name,
                compute_size,
                db_size,
                strategy,
                image: config
                    .image
                    .clone()
                    .unwrap_or_else(|| strategy.default_image().to_string()),
                desired_count,
                pipeline,
            })
        }
        _ => Err(errors),
    }
}

/// Parse a required enumerated field, recording a problem when it is absent
/// or unknown.
fn required<T>(value: &Option<String>, field: &str, errors: &mut Vec<ValidationError>) -> Option<T>
where
    T: std::str::FromStr<Err = String>,
{
    match value.as_deref() {
        None => {
            errors.push(ValidationError::new(field, format!("{} is required", field)));
            None
        }
        Some(s) => s
            .parse::<T>()
            .map_err(|e| errors.push(ValidationError::new(field, e)))
            .ok(),
    }
}
