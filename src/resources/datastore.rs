//! SW-008: Datastore resource — Aurora PostgreSQL cluster with a generated
//! master password.

use super::{
    ingress_from_application, tags, DATABASE_ID, DATABASE_NAME, NETWORK_ID, POSTGRES_PORT,
};
use crate::core::types::{ResourceKind, ResourceNode, StackSpec, Value};

pub const ENGINE: &str = "aurora-postgresql";
pub const ENGINE_VERSION: &str = "11.7";

/// Build the database node. Placed in the private subnets of the network.
pub fn node(spec: &StackSpec) -> ResourceNode {
    ResourceNode::new(DATABASE_ID, ResourceKind::Datastore)
        .property("Engine", ENGINE)
        .property("EngineVersion", ENGINE_VERSION)
        .property("DatabaseName", DATABASE_NAME)
        .property("DBInstanceClass", spec.db_size.instance_class())
        .property("Port", POSTGRES_PORT)
        .property(
            "MasterCredentials",
            Value::map([
                ("Username", Value::from(DATABASE_NAME)),
                (
                    "GenerateSecretString",
                    Value::map([
                        ("PasswordLength", Value::from(30u32)),
                        ("ExcludePunctuation", Value::from(true)),
                        ("IncludeSpace", Value::from(false)),
                    ]),
                ),
            ]),
        )
        .property("VpcId", Value::reference(NETWORK_ID, "Id"))
        .property("SubnetIds", Value::reference(NETWORK_ID, "PrivateSubnets"))
        .property(
            "SecurityGroupIngress",
            Value::list([ingress_from_application(
                POSTGRES_PORT,
                "allow connections from the server to the database",
            )]),
        )
        .property("RemovalPolicy", "Delete")
        .property("Tags", tags(&spec.name, "database"))
}
