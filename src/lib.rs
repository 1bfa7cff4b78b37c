//! Stackwright — declare a graph of managed cloud resources for a
//! self-hosted Bitbucket Server and emit a deployable template.
//!
//! Build a graph, freeze it, emit it. Provisioning is left to the
//! deployment tool that consumes the template.

pub mod cli;
pub mod core;
pub mod provenance;
pub mod resources;
