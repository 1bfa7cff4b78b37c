//! Provenance — BLAKE3 fingerprints and the synth event log.

pub mod eventlog;
pub mod hasher;
