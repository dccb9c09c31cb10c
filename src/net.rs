//! Control-plane networking: the websocket transport seam, the self-healing
//! persistent socket, and the remote pause/resume/restart surface.

pub mod control;
pub mod persistent;
pub mod socket;

#[cfg(test)]
pub(crate) mod testing;

pub use control::{ControlError, RemoteControl};
pub use persistent::PersistentSocket;
pub use socket::{Command, ControlChannel, ControlDialer, WsDialer};
