//! SW-012: Composition root — the Bitbucket stack as one frozen graph.
//!
//! Network first, then database, file system, optional pipeline, and the
//! load-balanced application that wires all of them together.

use super::error::{Result, StackError};
use super::graph::{DependencyGraph, FrozenGraph};
use super::parser;
use super::types::{StackConfig, StackOutput, StackSpec, Value};
use crate::resources::{self, APPLICATION_ID, PIPELINE_ID};

/// Output exposing the public URL of the load balancer.
pub const URL_OUTPUT: &str = "BitbucketUrl";

/// Validate `config` and build the frozen stack graph.
pub fn compose(config: &StackConfig) -> Result<FrozenGraph> {
    let spec = parser::validate_config(config).map_err(|errors| StackError::ConfigValidation {
        problems: errors.iter().map(|e| e.to_string()).collect(),
    })?;
    compose_spec(&spec)
}

/// Build the frozen stack graph from an already validated spec.
pub fn compose_spec(spec: &StackSpec) -> Result<FrozenGraph> {
    let graph = build_graph(spec)?;
    graph.freeze()
}

/// Build the unfrozen graph. Exposed so callers can extend the stack before
/// freezing it.
pub fn build_graph(spec: &StackSpec) -> Result<DependencyGraph> {
    let mut graph = DependencyGraph::new();
    graph.set_description(format!(
        "Bitbucket Server stack '{}' ({} strategy)",
        spec.name, spec.strategy
    ));

    graph.add_node(resources::network::node(spec))?;
    graph.add_node(resources::datastore::node(spec))?;
    graph.add_node(resources::storage::node(spec))?;

    let image = match &spec.pipeline {
        Some(pipeline) => {
            graph.add_node(resources::pipeline::node(spec, pipeline))?;
            Value::reference(PIPELINE_ID, "ImageUri")
        }
        None => Value::from(spec.image.as_str()),
    };
    graph.add_node(resources::service::node(spec, image))?;

    graph.add_output(
        URL_OUTPUT,
        StackOutput::new(Value::join([
            Value::from("http://"),
            Value::reference(APPLICATION_ID, "LoadBalancerDnsName"),
        ]))
        .description("Public URL of the Bitbucket server"),
    )?;

    tracing::debug!(stack = %spec.name, nodes = graph.len(), "composed stack");
    Ok(graph)
}
