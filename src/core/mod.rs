//! Core composition logic — types, graph, binding, emission, composition.

pub mod binder;
pub mod compose;
pub mod emitter;
pub mod error;
pub mod graph;
pub mod parser;
pub mod planner;
pub mod state;
pub mod types;
