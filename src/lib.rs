//! Optim - live test execution logs and job status
//!
//! This library provides the streaming core of the test workbench: a registry
//! of shared server-sent-event connections keyed by stream kind and test case,
//! the per-connection lifecycle with liveness tracking and retry, and the
//! projection of stream state into display labels. The CLI and the REST
//! collaborator client are built on top of it.

pub mod cli;
pub mod client;
pub mod config;
pub mod entries;
pub mod logging;
pub mod projection;
pub mod registry;
pub mod stream;
