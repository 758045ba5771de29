#![doc = "markpigeon-core: publish synchronisation logic for markpigeon."]

//! This crate contains the publish pipeline: the local bundle model,
//! local-vs-remote diff planning, repository and pages provisioning, and the
//! bounded-concurrency upload executor, all written against the abstract
//! remote-store capability trait in [`contract`].
//!
//! The real GitHub client and all CLI glue live in the `markpigeon` binary
//! crate.
//!
//! # Usage
//! Add this as a dependency for shared publishing, planning and sync code.

pub mod backoff;
pub mod bundle;
pub mod cancel;
pub mod config;
pub mod contract;
pub mod error;
pub mod executor;
pub mod plan;
pub mod provision;
pub mod publish;
pub mod url;
