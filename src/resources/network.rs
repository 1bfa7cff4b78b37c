//! SW-007: Network resource — VPC with public and private subnets.

use super::{ingress, tags, APP_PORT, HTTP_PORT, NETWORK_ID};
use crate::core::types::{ResourceKind, ResourceNode, StackSpec, Value};

/// Address range of the VPC.
pub const CIDR_BLOCK: &str = "10.0.0.0/16";

/// Build the network node. It depends on nothing.
pub fn node(spec: &StackSpec) -> ResourceNode {
    ResourceNode::new(NETWORK_ID, ResourceKind::Network)
        .property("CidrBlock", CIDR_BLOCK)
        .property("EnableDnsHostnames", true)
        .property("EnableDnsSupport", true)
        .property("MaxAzs", 2u32)
        .property(
            "SubnetConfiguration",
            Value::list([
                subnet("Public", "PUBLIC"),
                subnet("Private", "PRIVATE"),
            ]),
        )
        .property("SecurityGroups", security_groups())
        .property("Tags", tags(&spec.name, "network"))
}

/// Groups are chained: the internet reaches the load balancer, and only the
/// load balancer reaches the application. Datastore and storage admit the
/// application group, published as `ApplicationSecurityGroup`.
fn security_groups() -> Value {
    Value::map([
        (
            "LoadBalancer",
            Value::map([
                ("Description", Value::from("allow access to the bitbucket load balancer")),
                (
                    "Ingress",
                    Value::list([ingress(
                        HTTP_PORT,
                        ("CidrIp", Value::from("0.0.0.0/0")),
                        "allow connections to the load balancer from the internet",
                    )]),
                ),
            ]),
        ),
        (
            "Application",
            Value::map([
                ("Description", Value::from("allow access to the bitbucket server")),
                (
                    "Ingress",
                    Value::list([ingress(
                        APP_PORT,
                        ("SourceSecurityGroup", Value::from("LoadBalancer")),
                        "allow connections from the load balancer to the server",
                    )]),
                ),
            ]),
        ),
    ])
}

fn subnet(name: &str, subnet_type: &str) -> Value {
    Value::map([
        ("Name", Value::from(name)),
        ("SubnetType", Value::from(subnet_type)),
        ("CidrMask", Value::from(24u32)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_spec as spec;
    use indexmap::IndexMap;

    #[test]
    fn test_sw007_network_is_a_root() {
        let n = node(&spec());
        assert_eq!(n.id, "Network");
        assert_eq!(n.kind, ResourceKind::Network);
        assert!(n.dependencies().is_empty());
    }

    #[test]
    fn test_sw007_network_subnets() {
        let n = node(&spec());
        match &n.properties["SubnetConfiguration"] {
            Value::List(items) => assert_eq!(items.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(n.properties["CidrBlock"], Value::from(CIDR_BLOCK));
    }

    #[test]
    fn test_sw007_security_groups_chained() {
        let n = node(&spec());
        let Value::Map(groups) = &n.properties["SecurityGroups"] else {
            panic!("security groups is not a map");
        };
        let rule = |group: &str| -> IndexMap<String, Value> {
            let Value::Map(g) = &groups[group] else {
                panic!("group is not a map");
            };
            let Value::List(rules) = &g["Ingress"] else {
                panic!("ingress is not a list");
            };
            let Value::Map(r) = &rules[0] else {
                panic!("rule is not a map");
            };
            r.clone()
        };
        let lb = rule("LoadBalancer");
        assert_eq!(lb["FromPort"], Value::from(80u32));
        assert_eq!(lb["CidrIp"], Value::from("0.0.0.0/0"));
        let app = rule("Application");
        assert_eq!(app["FromPort"], Value::from(7990u32));
        assert_eq!(app["SourceSecurityGroup"], Value::from("LoadBalancer"));
        assert!(!app.contains_key("CidrIp"));
        assert!(n.kind.publishes("ApplicationSecurityGroup"));
    }
}
