//! SW-009: Storage resource — encrypted shared file system for Bitbucket home.

use super::{ingress_from_application, tags, FILE_SYSTEM_ID, NETWORK_ID, NFS_PORT};
use crate::core::types::{ResourceKind, ResourceNode, StackSpec, Value};

/// Build the file system node with mount targets in the private subnets.
pub fn node(spec: &StackSpec) -> ResourceNode {
    ResourceNode::new(FILE_SYSTEM_ID, ResourceKind::FileStorage)
        .property("Encrypted", true)
        .property("PerformanceMode", "generalPurpose")
        .property("ThroughputMode", "bursting")
        .property("VpcId", Value::reference(NETWORK_ID, "Id"))
        .property("MountTargetSubnets", Value::reference(NETWORK_ID, "PrivateSubnets"))
        .property(
            "SecurityGroupIngress",
            Value::list([ingress_from_application(
                NFS_PORT,
                "allow connections from the server to the file system",
            )]),
        )
        .property("RemovalPolicy", "Delete")
        .property("FileSystemTags", tags(&spec.name, "storage"))
}
