//! SW-005: Template emission — serialize a frozen graph for the deployment tool.
//!
//! Nodes are visited in topological order. Each node's properties are
//! resolved against the attributes registered by the nodes before it, then
//! the node registers its own computed attributes.

use super::binder::{self, ComputedAttributes};
use super::error::{Result, StackError};
use super::graph::FrozenGraph;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;
use std::str::FromStr;

/// Template format version understood by the deployment tool.
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// The emitted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// One entry per resource node, in topological order
    #[serde(rename = "Resources")]
    pub resources: IndexMap<String, TemplateResource>,

    #[serde(rename = "Outputs", default, skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, TemplateOutput>,
}

/// One resource entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateResource {
    #[serde(rename = "Type")]
    pub resource_type: String,

    /// Explicit dependencies only; references carry their own ordering
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(rename = "Properties")]
    pub properties: serde_json::Map<String, Json>,
}

/// One exported output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateOutput {
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "Value")]
    pub value: Json,
}

/// Rendering format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [Self::Json, Self::Yaml];

    /// File extension used for written templates.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(format!("unknown format '{}' (expected json, yaml)", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl Template {
    /// Render to a string. Output is byte-identical for equal templates.
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => {
                let mut out = serde_json::to_string_pretty(self)
                    .map_err(|e| StackError::Render(format!("JSON serialize error: {}", e)))?;
                out.push('\n');
                Ok(out)
            }
            OutputFormat::Yaml => serde_yaml_ng::to_string(self)
                .map_err(|e| StackError::Render(format!("YAML serialize error: {}", e))),
        }
    }
}

/// Emit a frozen graph as a template.
pub fn emit(graph: &FrozenGraph) -> Result<Template> {
    let mut attrs = ComputedAttributes::new();
    let mut resources = IndexMap::with_capacity(graph.len());

    for node in graph.nodes_in_order() {
        let properties = binder::resolve_properties(&node.properties, &attrs, &node.id)?;
        resources.insert(
            node.id.clone(),
            TemplateResource {
                resource_type: node.kind.template_type().to_string(),
                depends_on: node.depends_on.iter().cloned().collect(),
                properties,
            },
        );
        attrs.register_kind(&node.id, node.kind);
        tracing::debug!(resource = %node.id, kind = %node.kind, "emitted resource");
    }

    let mut outputs = IndexMap::with_capacity(graph.outputs().len());
    for (name, output) in graph.outputs() {
        outputs.insert(
            name.clone(),
            TemplateOutput {
                description: output.description.clone(),
                value: binder::resolve(&output.value, &attrs, name)?,
            },
        );
    }

    tracing::debug!(
        resources = resources.len(),
        outputs = outputs.len(),
        attributes = attrs.len(),
        "template emitted"
    );

    Ok(Template {
        format_version: TEMPLATE_FORMAT_VERSION.to_string(),
        description: graph.description().map(str::to_string),
        resources,
        outputs,
    })
}
