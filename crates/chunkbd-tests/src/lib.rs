//! chunkbd test & validation infrastructure.
//!
//! Integration suites exercising the bucket engine together with the
//! recovery collaborator: request decomposition across bucket boundaries,
//! device restart and remote recovery, and the per-bucket concurrency
//! contract. Shared fixtures live in [`harness`].

pub mod harness;

mod recovery_tests;
