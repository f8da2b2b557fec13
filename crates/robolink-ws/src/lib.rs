//! WebSocket transport for RoboLink
//!
//! Implements the core [`robolink_core::Transport`] trait over `tungstenite`
//! with a non-blocking TCP stream. The WebSocket handshake and the read pump
//! both advance incrementally from `poll_event`, so the cooperative main
//! loop never suspends on the network.

mod transport;

pub use transport::WsTransport;
