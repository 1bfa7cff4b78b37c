//! SW-001: Core types — resource nodes, values, stack configuration, locks.
//!
//! Resource nodes are plain identity + property bags. Values are either
//! literals or references to another node's computed attributes; references
//! are resolved only at emission time.

use indexmap::{IndexMap, IndexSet};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Resource kinds
// ============================================================================

/// Kind of a resource node. Decides the template type and which computed
/// attributes the node publishes for others to reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Network,
    Datastore,
    FileStorage,
    ContainerService,
    InstanceGroup,
    BuildPipeline,
}

impl ResourceKind {
    /// Resource type string understood by the deployment tool.
    pub fn template_type(self) -> &'static str {
        match self {
            Self::Network => "AWS::EC2::VPC",
            Self::Datastore => "AWS::RDS::DBCluster",
            Self::FileStorage => "AWS::EFS::FileSystem",
            Self::ContainerService => "AWS::ECS::Service",
            Self::InstanceGroup => "AWS::AutoScaling::AutoScalingGroup",
            Self::BuildPipeline => "AWS::CodeBuild::Project",
        }
    }

    /// Attributes known only after provisioning. `Id` is the primary
    /// identifier and is always first.
    pub fn computed_attributes(self) -> &'static [&'static str] {
        match self {
            Self::Network => &[
                "Id",
                "CidrBlock",
                "PublicSubnets",
                "PrivateSubnets",
                "LoadBalancerSecurityGroup",
                "ApplicationSecurityGroup",
            ],
            Self::Datastore => &["Id", "Endpoint.Address", "Endpoint.Port", "SecretArn"],
            Self::FileStorage => &["Id", "Arn"],
            Self::ContainerService => &["Id", "Name", "LoadBalancerDnsName"],
            Self::InstanceGroup => &["Id", "LoadBalancerDnsName"],
            Self::BuildPipeline => &["Id", "RepositoryUri", "ImageUri"],
        }
    }

    /// Whether `attribute` is published by this kind.
    pub fn publishes(self, attribute: &str) -> bool {
        self.computed_attributes().contains(&attribute)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Datastore => write!(f, "datastore"),
            Self::FileStorage => write!(f, "file_storage"),
            Self::ContainerService => write!(f, "container_service"),
            Self::InstanceGroup => write!(f, "instance_group"),
            Self::BuildPipeline => write!(f, "build_pipeline"),
        }
    }
}

// ============================================================================
// Values
// ============================================================================

/// "Use this attribute of that resource", resolved at emission time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub target: String,
    pub attribute: String,
}

impl Reference {
    pub fn new(target: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.attribute)
    }
}

/// Values the deployment tool supplies for the stack as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoParameter {
    Region,
    AccountId,
    StackName,
}

impl PseudoParameter {
    /// Name the deployment tool resolves.
    pub fn name(self) -> &'static str {
        match self {
            Self::Region => "AWS::Region",
            Self::AccountId => "AWS::AccountId",
            Self::StackName => "AWS::StackName",
        }
    }
}

impl fmt::Display for PseudoParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(i64),
    Bool(bool),
    Reference(Reference),
    /// Stack-wide value known only at deployment; not a graph edge.
    Pseudo(PseudoParameter),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// Parts concatenated by the deployment tool. Used for strings that
    /// embed references (connection URLs, bootstrap scripts).
    Join(Vec<Value>),
}

impl Value {
    /// Shorthand for a reference value.
    pub fn reference(target: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::Reference(Reference::new(target, attribute))
    }

    /// Build a map value from `(key, value)` pairs, preserving order.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list value.
    pub fn list<V: Into<Value>, I: IntoIterator<Item = V>>(items: I) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a join value.
    pub fn join<V: Into<Value>, I: IntoIterator<Item = V>>(parts: I) -> Self {
        Self::Join(parts.into_iter().map(Into::into).collect())
    }

    /// All references reachable from this value, depth-first.
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Self::Reference(r) => out.push(r),
            Self::List(items) | Self::Join(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            Self::Map(entries) => {
                for v in entries.values() {
                    v.collect_references(out);
                }
            }
            Self::String(_) | Self::Number(_) | Self::Bool(_) | Self::Pseudo(_) => {}
        }
    }
}

impl From<PseudoParameter> for Value {
    fn from(p: PseudoParameter) -> Self {
        Self::Pseudo(p)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(i64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Self::Reference(r)
    }
}

// ============================================================================
// Resource nodes
// ============================================================================

/// One infrastructure resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    /// Logical id, unique within a graph
    pub id: String,

    /// Resource kind
    pub kind: ResourceKind,

    /// Properties (order-preserving)
    pub properties: IndexMap<String, Value>,

    /// Explicit dependencies, in addition to those implied by references
    pub depends_on: IndexSet<String>,
}

impl ResourceNode {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            properties: IndexMap::new(),
            depends_on: IndexSet::new(),
        }
    }

    /// Set a property (builder style).
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add an explicit dependency (builder style).
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.insert(id.into());
        self
    }

    /// References in property order.
    pub fn references(&self) -> Vec<&Reference> {
        self.properties
            .values()
            .flat_map(|v| v.references())
            .collect()
    }

    /// Every id this node depends on: explicit entries first, then
    /// reference targets, without duplicates.
    pub fn dependencies(&self) -> IndexSet<&str> {
        let mut deps: IndexSet<&str> = self.depends_on.iter().map(String::as_str).collect();
        for r in self.references() {
            deps.insert(r.target.as_str());
        }
        deps
    }
}

/// A named value exported by the template.
#[derive(Debug, Clone, PartialEq)]
pub struct StackOutput {
    pub value: Value,
    pub description: Option<String>,
}

impl StackOutput {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            description: None,
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

// ============================================================================
// Stack configuration (stack.yaml)
// ============================================================================

/// Raw stack configuration as written by the user. Every field is optional
/// here so that validation can report all problems at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StackConfig {
    /// Stack name (default "bitbucket")
    #[serde(default)]
    pub name: Option<String>,

    /// Application compute size: small, medium, large, xlarge
    #[serde(default)]
    pub compute_size: Option<String>,

    /// Database size: small, medium, large
    #[serde(default)]
    pub db_size: Option<String>,

    /// vm or container (default container)
    #[serde(default)]
    pub deployment_strategy: Option<String>,

    /// Image used when no pipeline is configured
    #[serde(default)]
    pub image: Option<String>,

    /// Number of application instances/tasks (1..=10, default 1)
    #[serde(default)]
    pub desired_count: Option<i64>,

    /// Build pipeline source; its output image feeds the application
    #[serde(default)]
    pub pipeline_repo: Option<PipelineRepo>,
}

/// Source repository of the container build pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PipelineRepo {
    pub owner: String,
    pub repo: String,
    pub build_spec_path: String,

    /// Branch whose pushes trigger builds (default "master")
    #[serde(default)]
    pub branch: Option<String>,
}

/// Application compute sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeSize {
    Small,
    Medium,
    Large,
    XLarge,
}

impl ComputeSize {
    /// Instance type for the vm strategy.
    pub fn instance_type(self) -> &'static str {
        match self {
            Self::Small => "t3.medium",
            Self::Medium => "t3.large",
            Self::Large => "t3.xlarge",
            Self::XLarge => "t3.2xlarge",
        }
    }

    /// Task `(cpu units, memory MiB)` for the container strategy.
    pub fn task_resources(self) -> (u32, u32) {
        match self {
            Self::Small => (1024, 2048),
            Self::Medium => (2048, 4096),
            Self::Large => (4096, 8192),
            Self::XLarge => (4096, 16384),
        }
    }
}

impl FromStr for ComputeSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            "xlarge" => Ok(Self::XLarge),
            other => Err(format!(
                "unknown compute size '{}' (expected small, medium, large, xlarge)",
                other
            )),
        }
    }
}

/// Datastore sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbSize {
    Small,
    Medium,
    Large,
}

impl DbSize {
    pub fn instance_class(self) -> &'static str {
        match self {
            Self::Small => "db.t3.medium",
            Self::Medium => "db.r5.large",
            Self::Large => "db.r5.xlarge",
        }
    }
}

impl FromStr for DbSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            other => Err(format!(
                "unknown database size '{}' (expected small, medium, large)",
                other
            )),
        }
    }
}

/// How the application runs: autoscaled VMs or a container service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeploymentStrategy {
    Vm,
    #[default]
    Container,
}

impl DeploymentStrategy {
    /// Image used when neither `image` nor a pipeline is configured.
    pub fn default_image(self) -> &'static str {
        match self {
            Self::Vm => {
                "{{resolve:ssm:/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2}}"
            }
            Self::Container => "atlassian/bitbucket-server:7.1",
        }
    }
}

impl FromStr for DeploymentStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vm" => Ok(Self::Vm),
            "container" => Ok(Self::Container),
            other => Err(format!(
                "unknown deployment strategy '{}' (expected vm, container)",
                other
            )),
        }
    }
}

impl fmt::Display for DeploymentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vm => write!(f, "vm"),
            Self::Container => write!(f, "container"),
        }
    }
}

/// Validated configuration consumed by the composition root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSpec {
    pub name: String,
    pub compute_size: ComputeSize,
    pub db_size: DbSize,
    pub strategy: DeploymentStrategy,
    pub image: String,
    pub desired_count: u32,
    pub pipeline: Option<PipelineSpec>,
}

/// Validated pipeline source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec {
    pub owner: String,
    pub repo: String,
    pub build_spec_path: String,
    pub branch: String,
}

// ============================================================================
// Lock file
// ============================================================================

/// Record of the last synthesized template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackLock {
    /// Schema version
    pub schema: String,

    /// Stack name
    pub stack: String,

    /// When the lock was generated
    pub generated_at: String,

    /// Generator version
    pub generator: String,

    /// BLAKE3 hash of the rendered template
    pub template_hash: String,

    /// Per-resource state, in emission order
    pub resources: IndexMap<String, ResourceLock>,
}

/// Per-resource lock entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLock {
    /// Template resource type
    #[serde(rename = "type")]
    pub resource_type: String,

    /// BLAKE3 hash of the emitted resource entry
    pub hash: String,
}

// ============================================================================
// Plan
// ============================================================================

/// Action the deployment tool will take on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update,
    Destroy,
    NoOp,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::Destroy => write!(f, "DESTROY"),
            Self::NoOp => write!(f, "NO-OP"),
        }
    }
}

/// A single planned change.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub resource_id: String,
    pub resource_type: String,
    pub action: PlanAction,
    pub description: String,
}

/// Difference between a fresh template and the last lock.
#[derive(Debug, Clone)]
pub struct ChangePlan {
    pub name: String,
    pub changes: Vec<PlannedChange>,
    pub to_create: u32,
    pub to_update: u32,
    pub to_destroy: u32,
    pub unchanged: u32,
}

// ============================================================================
// Provenance events
// ============================================================================

/// Provenance event for the JSONL event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    SynthStarted {
        stack: String,
        run_id: String,
        generator: String,
    },
    ResourceEmitted {
        stack: String,
        resource: String,
        resource_type: String,
        hash: String,
    },
    SynthCompleted {
        stack: String,
        run_id: String,
        resources: u32,
        template_hash: String,
    },
    SynthFailed {
        stack: String,
        run_id: String,
        error: String,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}

// ============================================================================
// Tests
// ============================================================================
