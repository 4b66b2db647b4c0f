//! Core types shared by the scan orchestration crates.

pub mod auth;
pub mod engine;
pub mod error;
pub mod model;
pub mod patterns;

pub use engine::{EngineSettings, ScanIdentity, TeardownMode};
pub use error::{Result, ZapError};
pub use model::{AuthenticationStep, FieldValue, ReportFormat, ScanConfig};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
