//! Runtime glue that wires configuration, telemetry, and the poll driver.

pub mod config;
pub mod runner;
pub mod telemetry;

pub use config::{ControlConfig, ControlConfigBuilder, ControlConfigParams};
pub use runner::PollDriver;
pub use telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
