//! RoboLink CLI entry point

use clap::Parser;
use tracing::info;

use robolink_cli::{app, cli::Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    info!(
        server = %cli.server,
        port = cli.port,
        robot_id = %cli.robot_id,
        "starting robolink"
    );

    app::run(cli)?;
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
