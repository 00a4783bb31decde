//! End-to-end integration suite for the Aegis kernel.
//!
//! `end_to_end_scenarios` drives full task flows through the pipeline, the
//! swarm and the policy layer; `invariants` pins the properties that must
//! hold for every reachable state of the public APIs.

mod end_to_end_scenarios;
mod invariants;
