//! Capabilities the core calls out to: the runner doing the actual search
//! work and the digest mailer, plus their HTTP adapters.

pub mod digest;
pub mod http;
pub mod runner;

pub use digest::{DigestError, DigestSender};
pub use http::{HttpDigestSender, HttpRunner};
pub use runner::{ProgressReporter, RunContext, RunFailure, Runner};
