//! # Load-Test Client Library
//!
//! A headless client for driving the state-relay server: it registers its
//! listen port, pushes synthetic player updates at a configurable rate,
//! and counts the snapshot broadcasts that come back. Useful both as a
//! smoke test against a running relay and as the sender side of load
//! experiments with many concurrent client processes.

pub mod network;
