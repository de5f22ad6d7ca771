//! deploy-verify: post-deployment liveness verification.
//!
//! Applies an infrastructure definition, reads the endpoint it exposes from
//! the provisioning outputs, and polls that endpoint with a bounded number of
//! sequential HTTP probes until it answers 200 or the budget runs out.

pub mod check;
pub mod config;
pub mod error;
pub mod fakes;
pub mod probe;
pub mod provision;
pub mod target;
pub mod verify;

pub use check::{run_check, CheckReport};
pub use error::*;
pub use target::TargetUrl;
pub use verify::{ProbeFailure, RetryPolicy, Verdict, Verifier};
