//! Resource builders — one module per node of the Bitbucket stack.
//!
//! Each builder turns the validated `StackSpec` into a single resource node.
//! Cross-resource wiring is expressed with references to the ids below;
//! nothing here knows the order in which nodes are emitted.

pub mod datastore;
pub mod network;
pub mod pipeline;
pub mod service;
pub mod storage;

/// Logical id of the network node.
pub const NETWORK_ID: &str = "Network";
/// Logical id of the database cluster node.
pub const DATABASE_ID: &str = "Database";
/// Logical id of the shared file system node.
pub const FILE_SYSTEM_ID: &str = "FileSystem";
/// Logical id of the load-balanced application node.
pub const APPLICATION_ID: &str = "Application";
/// Logical id of the build pipeline node.
pub const PIPELINE_ID: &str = "Pipeline";

/// Port the Bitbucket server listens on.
pub const APP_PORT: u32 = 7990;
/// Public listener port of the load balancer.
pub const HTTP_PORT: u32 = 80;
pub const POSTGRES_PORT: u32 = 5432;
pub const NFS_PORT: u32 = 2049;

/// Database and user name of the application schema.
pub const DATABASE_NAME: &str = "bitbucket";
/// Where Bitbucket keeps repositories and attachments.
pub const BITBUCKET_HOME: &str = "/var/atlassian/application-data/bitbucket";

use crate::core::types::Value;

/// Ingress rule admitting `port` from `peer`, given as `(key, value)` such as
/// `("CidrIp", ...)` or `("SourceSecurityGroupId", ...)`.
pub(crate) fn ingress(port: u32, peer: (&str, Value), description: &str) -> Value {
    Value::map([
        ("IpProtocol", Value::from("tcp")),
        ("FromPort", Value::from(port)),
        ("ToPort", Value::from(port)),
        (peer.0, peer.1),
        ("Description", Value::from(description)),
    ])
}

/// Ingress rule admitting `port` only from the application's security group.
pub(crate) fn ingress_from_application(port: u32, description: &str) -> Value {
    ingress(
        port,
        (
            "SourceSecurityGroupId",
            Value::reference(NETWORK_ID, "ApplicationSecurityGroup"),
        ),
        description,
    )
}

/// Common tags; the stack name ties resources to one deployment.
pub(crate) fn tags(stack: &str, component: &str) -> Value {
    Value::list([
        Value::map([("Key", "stack"), ("Value", stack)]),
        Value::map([("Key", "component"), ("Value", component)]),
    ])
}

#[cfg(test)]
pub(crate) fn test_spec() -> crate::core::types::StackSpec {
    use crate::core::types::{ComputeSize, DbSize, DeploymentStrategy, StackSpec};
    StackSpec {
        name: "bitbucket".to_string(),
        compute_size: ComputeSize::Small,
        db_size: DbSize::Small,
        strategy: DeploymentStrategy::Container,
        image: DeploymentStrategy::Container.default_image().to_string(),
        desired_count: 1,
        pipeline: None,
    }
}
