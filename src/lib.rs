pub mod net;
pub mod runtime;
pub mod tasks;

pub use net::control::{ControlError, RemoteControl};
pub use net::persistent::PersistentSocket;
pub use net::socket::{Command, ControlChannel, ControlDialer, WsDialer};
pub use runtime::config::{ControlConfig, ControlConfigBuilder, ControlConfigParams};
pub use runtime::runner::PollDriver;
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
pub use tasks::periodic::run_every;
pub use tasks::pile::drain_bounded;
pub use tasks::retry::{retry_forever, RetryForever};
