//! SW-002: Error taxonomy for composition, freezing and emission.
//!
//! Every error is fatal: they come from static misconfiguration or from a
//! broken internal invariant, never from a transient condition.

use thiserror::Error;

/// Errors raised by the composition engine.
#[derive(Debug, Error)]
pub enum StackError {
    /// Input configuration is missing fields or out of range.
    #[error("invalid configuration: {}", .problems.join("; "))]
    ConfigValidation { problems: Vec<String> },

    /// A node or output id was added twice.
    #[error("duplicate id '{0}'")]
    DuplicateId(String),

    /// An id is not a valid logical id.
    #[error("invalid id '{0}': must start with a letter, contain only letters and digits, and be at most 255 characters")]
    InvalidId(String),

    /// A reference or explicit dependency names an id not in the graph.
    #[error("'{from}' references unknown resource '{target}'{}", describe_attribute(.attribute))]
    DanglingReference {
        from: String,
        target: String,
        attribute: Option<String>,
    },

    /// A reference names an attribute the target kind never publishes.
    #[error("'{from}' references attribute '{attribute}' which {kind} resource '{target}' does not publish")]
    UnknownAttribute {
        from: String,
        target: String,
        kind: String,
        attribute: String,
    },

    /// The dependency graph is not acyclic. `nodes` lists the cycle in
    /// dependency order.
    #[error("dependency cycle detected: {}", cycle_path(.nodes))]
    Cycle { nodes: Vec<String> },

    /// A reference was resolved before its target was emitted.
    #[error("internal error: '{from}' needs {target}.{attribute} before '{target}' was emitted")]
    UnresolvedAttribute {
        from: String,
        target: String,
        attribute: String,
    },

    /// Serializing the template failed.
    #[error("render error: {0}")]
    Render(String),
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, StackError>;

fn describe_attribute(attribute: &Option<String>) -> String {
    attribute
        .as_ref()
        .map(|a| format!(" (attribute {})", a))
        .unwrap_or_default()
}

fn cycle_path(nodes: &[String]) -> String {
    let mut path: Vec<&str> = nodes.iter().map(String::as_str).collect();
    if let Some(first) = nodes.first() {
        path.push(first);
    }
    path.join(" -> ")
}
