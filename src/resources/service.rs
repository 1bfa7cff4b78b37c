//! SW-011: Application resource — Bitbucket Server behind a public load
//! balancer, run either as a container service or as an autoscaled VM group.
//!
//! Both variants wire the same things: database endpoint and password secret,
//! the shared file system, and the image (literal or pipeline output).

use super::{
    tags, APPLICATION_ID, APP_PORT, BITBUCKET_HOME, DATABASE_ID, DATABASE_NAME, FILE_SYSTEM_ID,
    HTTP_PORT, NETWORK_ID,
};
use crate::core::types::{DeploymentStrategy, ResourceKind, ResourceNode, StackSpec, Value};

pub const BITBUCKET_VERSION: &str = "7.1.1";
pub const HEALTH_CHECK_PATH: &str = "/status";

/// Build the application node for the configured strategy. `image` is either
/// a literal image or a reference to the pipeline's output.
pub fn node(spec: &StackSpec, image: Value) -> ResourceNode {
    match spec.strategy {
        DeploymentStrategy::Container => container_node(spec, image),
        DeploymentStrategy::Vm => instance_group_node(spec, image),
    }
}

fn container_node(spec: &StackSpec, image: Value) -> ResourceNode {
    let (cpu, memory) = spec.compute_size.task_resources();
    base(
        ResourceNode::new(APPLICATION_ID, ResourceKind::ContainerService),
        spec,
    )
    .property("LaunchType", "FARGATE")
    .property("Cpu", cpu)
    .property("Memory", memory)
    .property(
        "ContainerDefinition",
        Value::map([
            ("Name", Value::from("bitbucket")),
            ("Image", image),
            ("PortMappings", Value::list([Value::map([("ContainerPort", APP_PORT)])])),
            (
                "Environment",
                Value::map([
                    ("JDBC_DRIVER", Value::from("org.postgresql.Driver")),
                    ("JDBC_URL", jdbc_url()),
                    ("JDBC_USER", Value::from(DATABASE_NAME)),
                ]),
            ),
            (
                "Secrets",
                Value::map([("JDBC_PASSWORD", Value::reference(DATABASE_ID, "SecretArn"))]),
            ),
            (
                "MountPoints",
                Value::list([Value::map([
                    ("FileSystemId", Value::reference(FILE_SYSTEM_ID, "Id")),
                    ("ContainerPath", Value::from(BITBUCKET_HOME)),
                ])]),
            ),
        ]),
    )
}

fn instance_group_node(spec: &StackSpec, image: Value) -> ResourceNode {
    base(
        ResourceNode::new(APPLICATION_ID, ResourceKind::InstanceGroup),
        spec,
    )
    .property("InstanceType", spec.compute_size.instance_type())
    .property("ImageId", image)
    .property("MinSize", spec.desired_count)
    .property("MaxSize", spec.desired_count)
    .property(
        "ManagedPolicies",
        Value::list(["service-role/AmazonEC2RoleforSSM"]),
    )
    .property(
        "SecretReadAccess",
        Value::list([Value::reference(DATABASE_ID, "SecretArn")]),
    )
    .property("UserData", bootstrap_script())
}

/// Properties shared by both variants: placement, sizing, load balancer.
fn base(node: ResourceNode, spec: &StackSpec) -> ResourceNode {
    node
        // mount targets must exist before the first instance boots
        .depends_on(FILE_SYSTEM_ID)
        .property("VpcId", Value::reference(NETWORK_ID, "Id"))
        .property("Subnets", Value::reference(NETWORK_ID, "PrivateSubnets"))
        .property(
            "SecurityGroups",
            Value::list([Value::reference(NETWORK_ID, "ApplicationSecurityGroup")]),
        )
        .property("DesiredCount", spec.desired_count)
        .property("LoadBalancer", load_balancer())
        .property("Tags", tags(&spec.name, "application"))
}

fn load_balancer() -> Value {
    Value::map([
        ("Scheme", Value::from("internet-facing")),
        ("Subnets", Value::reference(NETWORK_ID, "PublicSubnets")),
        (
            "SecurityGroups",
            Value::list([Value::reference(NETWORK_ID, "LoadBalancerSecurityGroup")]),
        ),
        (
            "Listener",
            Value::map([
                ("Port", Value::from(HTTP_PORT)),
                ("Protocol", Value::from("HTTP")),
            ]),
        ),
        (
            "TargetGroup",
            Value::map([
                ("Port", Value::from(APP_PORT)),
                ("Protocol", Value::from("HTTP")),
                (
                    "HealthCheck",
                    Value::map([
                        ("Path", Value::from(HEALTH_CHECK_PATH)),
                        ("IntervalSeconds", Value::from(15u32)),
                        ("TimeoutSeconds", Value::from(10u32)),
                        ("HealthyThresholdCount", Value::from(3u32)),
                        ("UnhealthyThresholdCount", Value::from(2u32)),
                    ]),
                ),
            ]),
        ),
    ])
}

fn jdbc_url() -> Value {
    Value::join([
        Value::from("jdbc:postgresql://"),
        Value::reference(DATABASE_ID, "Endpoint.Address"),
        Value::from(":"),
        Value::reference(DATABASE_ID, "Endpoint.Port"),
        Value::from(format!("/{}", DATABASE_NAME)),
    ])
}

/// Machine bootstrap for the vm strategy. Passed through untouched except
/// for the embedded file system id, database endpoint and secret.
fn bootstrap_script() -> Value {
    let properties = format!("{}/bitbucket.properties", BITBUCKET_HOME);
    let unit = "/etc/systemd/system/bitbucket.service";
    let mut parts: Vec<Value> = vec![Value::from(
        [
            "#!/bin/bash",
            "set -ex",
            "yum update -y",
            "yum install -y git curl jq ca-certificates java-11-amazon-corretto amazon-efs-utils",
            format!("echo \"BITBUCKET_HOME={}\" >> /etc/environment", BITBUCKET_HOME).as_str(),
            "echo \"BITBUCKET_INSTALL_DIR=/opt/atlassian/bitbucket\" >> /etc/environment",
            format!("echo \"BITBUCKET_VERSION={}\" >> /etc/environment", BITBUCKET_VERSION).as_str(),
            "echo \"AWS_REGION=$(curl -s 169.254.169.254/latest/dynamic/instance-identity/document | jq -r '.region')\" >> /etc/environment",
            "echo \"JAVA_HOME=/usr/lib/jvm/java-11-amazon-corretto.x86_64\" >> /etc/environment",
            "echo \"JRE_HOME=/etc/alternatives/jre\" >> /etc/environment",
            "source /etc/environment",
            // the preinstalled cli does not infer a region
            "aws configure set default.region ${AWS_REGION}",
            "mkdir -p /var/atlassian",
            "mount -t efs -o tls ",
        ]
        .join("\n"),
    )];
    parts.push(Value::reference(FILE_SYSTEM_ID, "Id"));
    parts.push(Value::from(":/ /var/atlassian\necho \""));
    parts.push(Value::reference(FILE_SYSTEM_ID, "Id"));
    parts.push(Value::from(
        [
            ":/ /var/atlassian efs _netdev,tls,iam 0 0\" >> /etc/fstab",
            "mkdir -p $BITBUCKET_HOME $BITBUCKET_INSTALL_DIR",
            "curl -L --silent https://product-downloads.atlassian.com/software/stash/downloads/atlassian-bitbucket-$BITBUCKET_VERSION.tar.gz | tar -xz --strip-components=1 -C \"$BITBUCKET_INSTALL_DIR\"",
            format!(
                "printf '[Unit]\\nDescription=Atlassian Bitbucket Server Service\\nAfter=syslog.target network.target\\n\\n[Service]\\nEnvironmentFile=/etc/environment\\nType=forking\\nExecStart=%s/bin/start-bitbucket.sh\\nExecStop=%s/bin/stop-bitbucket.sh\\n\\n[Install]\\nWantedBy=multi-user.target\\n' \"$BITBUCKET_INSTALL_DIR\" \"$BITBUCKET_INSTALL_DIR\" > {}",
                unit
            ).as_str(),
            format!("echo \"jdbc.driver=org.postgresql.Driver\" > {}", properties).as_str(),
            "echo \"jdbc.url=jdbc:postgresql://",
        ]
        .join("\n"),
    ));
    parts.push(Value::reference(DATABASE_ID, "Endpoint.Address"));
    parts.push(Value::from(":"));
    parts.push(Value::reference(DATABASE_ID, "Endpoint.Port"));
    parts.push(Value::from(format!(
        "/{}\" >> {}\necho \"jdbc.user={}\" >> {}\necho \"jdbc.password=$(aws secretsmanager get-secret-value --secret-id '",
        DATABASE_NAME, properties, DATABASE_NAME, properties
    )));
    parts.push(Value::reference(DATABASE_ID, "SecretArn"));
    parts.push(Value::from(format!(
        "' --query SecretString --output text)\" >> {}\nsystemctl enable bitbucket.service && systemctl start bitbucket.service\n",
        properties
    )));
    Value::Join(parts)
}
