//! Host composition: sensors and actuators wired to the link
//!
//! The workstation analog of the firmware's `setup()`/`loop()`: build the
//! link over the WebSocket transport, register callbacks, then run one
//! cooperative loop that polls the link and sweeps the sensor suite.

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use robolink_core::{LinkConfig, MonotonicClock, RobotLink};
use robolink_ws::WsTransport;

use crate::actuators::ActuatorBank;
use crate::cli::Cli;
use crate::error::Result;
use crate::sensors::{standard_suite, Sensor};

/// Build the link, wire the callbacks, and run the main loop until the
/// optional duration elapses.
pub fn run(cli: Cli) -> Result<()> {
    let config = LinkConfig::new(cli.server.clone(), cli.port, cli.robot_id.clone())
        .with_heartbeat_interval_ms(cli.heartbeat_ms)
        .with_reconnect_interval_ms(cli.reconnect_ms);

    let mut link = RobotLink::new(
        config,
        Box::new(WsTransport::new()),
        Box::new(MonotonicClock::new()),
    )?;

    let actuators = Rc::new(RefCell::new(ActuatorBank::new()));
    let actuators_cb = Rc::clone(&actuators);
    link.set_on_actuator_command(move |ctx, envelope| {
        match actuators_cb.borrow_mut().handle(&envelope.payload) {
            Ok(()) => ctx.send_ack(envelope.id.clone()),
            Err(reason) => {
                tracing::warn!(%reason, "actuator command rejected");
                ctx.send_error(reason);
            }
        }
    });
    link.set_on_connect(|_ctx| tracing::info!("registered with server"));
    link.set_on_disconnect(|| tracing::warn!("link lost, reconnecting"));
    link.set_on_error(|err| tracing::warn!(%err, "link error"));

    let mut sensors = standard_suite(cli.misbehave);
    for sensor in &mut sensors {
        sensor.begin();
    }

    link.connect();

    let tick = Duration::from_millis(1_000 / u64::from(cli.tick_hz.max(1)));
    let sample_every = Duration::from_secs(cli.sample_secs.max(1));
    let started = Instant::now();
    let mut next_sweep = Instant::now();

    loop {
        link.poll();

        if link.is_connected() && Instant::now() >= next_sweep {
            sweep(&mut link, &mut sensors);
            next_sweep += sample_every;
        }

        if let Some(seconds) = cli.duration_secs {
            if started.elapsed() >= Duration::from_secs(seconds) {
                tracing::info!(stats = ?link.stats(), "duration elapsed, shutting down");
                link.disconnect();
                return Ok(());
            }
        }

        thread::sleep(tick);
    }
}

/// Read every sensor once and push the readings into the link. Failed sends
/// already went through the error callback; the sweep keeps going.
fn sweep(link: &mut RobotLink, sensors: &mut [Box<dyn Sensor>]) {
    for sensor in sensors.iter_mut() {
        for sample in sensor.read() {
            if let Err(err) = link.send_sensor_data(sample.sensor_type, sample.value, sample.unit)
            {
                tracing::debug!(%err, sensor = sample.sensor_type, "telemetry dropped");
            }
        }
    }
}
