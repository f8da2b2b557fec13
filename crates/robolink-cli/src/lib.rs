//! RoboLink host composition
//!
//! The workstation analog of the robot firmware's top level: simulated
//! sensor drivers and actuator stubs wired to a [`robolink_core::RobotLink`]
//! over the WebSocket transport, driven by one cooperative main loop.

pub mod actuators;
pub mod app;
pub mod cli;
pub mod error;
pub mod sensors;
