//! SW-003: Dependency graph — insertion, reference integrity, topological order.
//!
//! Nodes are kept in insertion order. `freeze` consumes the builder, checks
//! every reference and explicit dependency, then orders the nodes with a
//! three-colour DFS. Dependencies are visited in insertion order, so the
//! resulting order only depends on how the graph was built.

use super::error::{Result, StackError};
use super::types::{ResourceNode, StackOutput};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

fn logical_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9]{0,254}$").expect("logical id pattern compiles")
    })
}

/// Whether `id` is usable as a template logical id.
pub fn is_valid_id(id: &str) -> bool {
    logical_id_pattern().is_match(id)
}

/// Mutable graph under construction.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    description: Option<String>,
    nodes: IndexMap<String, ResourceNode>,
    outputs: IndexMap<String, StackOutput>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the template description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Add a node. Fails if the id is taken or malformed.
    pub fn add_node(&mut self, node: ResourceNode) -> Result<()> {
        if !is_valid_id(&node.id) {
            return Err(StackError::InvalidId(node.id));
        }
        if self.nodes.contains_key(&node.id) {
            return Err(StackError::DuplicateId(node.id));
        }
        tracing::debug!(id = %node.id, kind = %node.kind, "added node");
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Declare a template output.
    pub fn add_output(&mut self, name: impl Into<String>, output: StackOutput) -> Result<()> {
        let name = name.into();
        if !is_valid_id(&name) {
            return Err(StackError::InvalidId(name));
        }
        if self.outputs.contains_key(&name) {
            return Err(StackError::DuplicateId(name));
        }
        self.outputs.insert(name, output);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Validate references and compute the topological order.
    pub fn freeze(self) -> Result<FrozenGraph> {
        self.check_references()?;
        let order = topological_sort(&self.nodes)?;
        tracing::debug!(nodes = order.len(), "graph frozen");
        Ok(FrozenGraph {
            description: self.description,
            nodes: self.nodes,
            outputs: self.outputs,
            order,
        })
    }

    fn check_references(&self) -> Result<()> {
        for node in self.nodes.values() {
            for dep in &node.depends_on {
                if !self.nodes.contains_key(dep) {
                    return Err(StackError::DanglingReference {
                        from: node.id.clone(),
                        target: dep.clone(),
                        attribute: None,
                    });
                }
            }
            for r in node.references() {
                self.check_reference(&node.id, &r.target, &r.attribute)?;
            }
        }
        for (name, output) in &self.outputs {
            for r in output.value.references() {
                self.check_reference(name, &r.target, &r.attribute)?;
            }
        }
        Ok(())
    }

    fn check_reference(&self, from: &str, target: &str, attribute: &str) -> Result<()> {
        let Some(target_node) = self.nodes.get(target) else {
            return Err(StackError::DanglingReference {
                from: from.to_string(),
                target: target.to_string(),
                attribute: Some(attribute.to_string()),
            });
        };
        if !target_node.kind.publishes(attribute) {
            return Err(StackError::UnknownAttribute {
                from: from.to_string(),
                target: target.to_string(),
                kind: target_node.kind.to_string(),
                attribute: attribute.to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Post-order DFS over dependency edges. Assumes every dependency exists.
fn topological_sort(nodes: &IndexMap<String, ResourceNode>) -> Result<Vec<String>> {
    let edges: Vec<Vec<usize>> = nodes
        .values()
        .map(|node| {
            let mut deps: Vec<usize> = node
                .dependencies()
                .into_iter()
                .filter_map(|d| nodes.get_index_of(d))
                .collect();
            deps.sort_unstable();
            deps
        })
        .collect();

    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());

    for start in 0..nodes.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        if let Err(cycle) = visit(start, &edges, &mut marks, &mut order) {
            let names = cycle
                .into_iter()
                .filter_map(|i| nodes.get_index(i).map(|(id, _)| id.clone()))
                .collect();
            return Err(StackError::Cycle { nodes: names });
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|i| nodes.get_index(i).map(|(id, _)| id.clone()))
        .collect())
}

/// Iterative DFS from `start`, so depth is bounded by the heap rather than
/// the thread stack. The frame stack doubles as the current path; on a back
/// edge the path suffix from the revisited node is the cycle.
fn visit(
    start: usize,
    edges: &[Vec<usize>],
    marks: &mut [Mark],
    order: &mut Vec<usize>,
) -> std::result::Result<(), Vec<usize>> {
    // (node, index of the next edge to follow)
    let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
    marks[start] = Mark::Visiting;

    while let Some(frame) = stack.last_mut() {
        let (idx, next) = *frame;
        let Some(&dep) = edges[idx].get(next) else {
            stack.pop();
            marks[idx] = Mark::Done;
            order.push(idx);
            continue;
        };
        frame.1 += 1;
        match marks[dep] {
            Mark::Done => {}
            Mark::Visiting => {
                let from = stack.iter().position(|&(n, _)| n == dep).unwrap_or(0);
                return Err(stack[from..].iter().map(|&(n, _)| n).collect());
            }
            Mark::Unvisited => {
                marks[dep] = Mark::Visiting;
                stack.push((dep, 0));
            }
        }
    }
    Ok(())
}

/// Validated, ordered, read-only graph.
#[derive(Debug, Clone)]
pub struct FrozenGraph {
    description: Option<String>,
    nodes: IndexMap<String, ResourceNode>,
    outputs: IndexMap<String, StackOutput>,
    order: Vec<String>,
}

impl FrozenGraph {
    /// Node ids, every node after all of its dependencies.
    pub fn topological_order(&self) -> &[String] {
        &self.order
    }

    /// Nodes in topological order.
    pub fn nodes_in_order(&self) -> impl Iterator<Item = &ResourceNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node(&self, id: &str) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    pub fn outputs(&self) -> &IndexMap<String, StackOutput> {
        &self.outputs
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
