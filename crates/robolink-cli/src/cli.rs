//! Command-line interface definitions and parsing

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "robolink", author, version, about = "Companion-robot telemetry and command link", long_about = None)]
pub struct Cli {
    /// WebSocket server host
    #[arg(long, env = "ROBOLINK_SERVER", default_value = "127.0.0.1")]
    pub server: String,

    /// WebSocket server port
    #[arg(long, env = "ROBOLINK_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Stable robot identifier announced in the init frame
    #[arg(long, env = "ROBOLINK_ROBOT_ID", default_value = "robot-001")]
    pub robot_id: String,

    /// Heartbeat interval in milliseconds
    #[arg(long, default_value_t = 30_000)]
    pub heartbeat_ms: u64,

    /// Reconnect backoff in milliseconds
    #[arg(long, default_value_t = 5_000)]
    pub reconnect_ms: u64,

    /// Main loop rate in Hz
    #[arg(long, default_value_t = 20)]
    pub tick_hz: u32,

    /// Seconds between sensor sweeps
    #[arg(long, default_value_t = 2)]
    pub sample_secs: u64,

    /// Exit after this many seconds (runs until killed when absent)
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Let the simulated sensors wander into alert territory now and then
    #[arg(long)]
    pub misbehave: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
