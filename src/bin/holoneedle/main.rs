//! Demo driver for the holoneedle pipeline: wires a coefficient source
//! into the display state machine, paces the control loop, and records
//! marker poses and manual offsets through the buffered sinks.

use clap::Parser;
use holoneedle::{
    args::{NeedleArgs, SourceTask},
    coefficients::CoefficientSource,
    config::NeedleConfig,
    debounce::Debounce,
    dummy_source::DummySource,
    mesh::NullMeshBuilder,
    needle_display::{NeedleDisplay, TickOutcome},
    replay_source::ReplaySource,
    session::RecordingSession,
};

use log::{debug, error, info};
use std::error::Error;
use std::time::{Duration, Instant};

// Example:
// cargo run --bin holoneedle --
//                            --subject subject_4
//                            --outdir  data
//                            synthetic
//                            --duration  20
//                            --amplitude 2.5

fn main() {
    env_logger::init();
    let args = NeedleArgs::parse();

    if let Err(err) = run(args) {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run(args: NeedleArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => NeedleConfig::from_path(path)?,
        None => NeedleConfig::default(),
    };
    if let Some(rate) = args.update_rate {
        config.update_rate_hz = rate;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(subject) = args.subject {
        config.subject = subject;
    }

    let mut session =
        RecordingSession::create(&config.output_dir, &config.subject, config.flush_period)?;
    session.start_trial(0, 0)?;

    let mut display = NeedleDisplay::new(config.geometry, NullMeshBuilder::default())?;

    match args.command {
        SourceTask::Synthetic(cmd) => {
            let mut source = DummySource::start(config.update_rate_hz, cmd.amplitude);
            let outcome = drive(
                &mut display,
                &mut source,
                &mut session,
                &config,
                Some(Duration::from_secs_f64(cmd.duration_secs)),
            );
            source.stop();
            session.close_all();
            outcome
        }
        SourceTask::Replay(cmd) => {
            let mut source = ReplaySource::open(&cmd.infile)?;
            let outcome = drive(&mut display, &mut source, &mut session, &config, None);
            session.close_all();
            outcome
        }
    }
}

/// Runs the control loop until the duration elapses (synthetic) or the
/// source dries up for a full second (replay).
fn drive(
    display: &mut NeedleDisplay<NullMeshBuilder>,
    source: &mut dyn CoefficientSource,
    session: &mut RecordingSession,
    config: &NeedleConfig,
    duration: Option<Duration>,
) -> Result<(), Box<dyn Error>> {
    let tick_interval = Duration::from_secs_f64(1.0 / config.update_rate_hz.max(1.0));
    let sleeper = spin_sleep::SpinSleeper::default();

    // sample markers at half the tick rate, like the record period of the
    // live rig
    let mut record_gate = Debounce::new(tick_interval * 2);
    let mut phase_gate = Debounce::new(Duration::from_secs_f64(match duration {
        Some(total) => total.as_secs_f64() / 3.0,
        None => 5.0,
    }));
    let mut phase = 0;
    // skip the initial fire; the display starts in the straight state
    phase_gate.fire();
    if duration.is_none() {
        // a replay never idles in the straight state (which rebuilds every
        // tick), so start on the shape condition where drain is observable
        display.set_state_shape();
        phase = 1;
    }

    let started = Instant::now();
    let mut idle_ticks = 0u32;

    loop {
        if let Some(total) = duration {
            if started.elapsed() >= total {
                break;
            }
        } else if idle_ticks as f64 * tick_interval.as_secs_f64() > 1.0 {
            info!("replay source drained");
            break;
        }

        // walk the demo through the three shape-display modes
        if phase_gate.fire() {
            phase += 1;
            match phase {
                1 => display.set_state_shape(),
                _ => {
                    let _ = display.set_state_project();
                }
            }
        }

        match display.tick(source) {
            TickOutcome::Rebuilt(shape) => {
                idle_ticks = 0;
                debug!(
                    "rebuilt tube with {} rings (projection: {})",
                    shape.mesh.rings,
                    shape.projection.is_some()
                );
            }
            TickOutcome::TipMoved(pos) => {
                idle_ticks = 0;
                debug!("tip marker at ({:.4}, {:.4}, {:.4})", pos.x, pos.y, pos.z);
            }
            TickOutcome::Idle => idle_ticks += 1,
        }

        if record_gate.fire() {
            record_markers(display, session, started)?;
        }

        sleeper.sleep(tick_interval);
    }

    Ok(())
}

/// Writes one marker-pose row: elapsed time, then pose + quaternion for
/// the phantom, needle and headset markers. The demo stands in the
/// needle-marker slot with the reconstructed tip pose; the other two
/// markers are static in this rig.
fn record_markers(
    display: &NeedleDisplay<NullMeshBuilder>,
    session: &mut RecordingSession,
    started: Instant,
) -> Result<(), Box<dyn Error>> {
    let Some(markers) = session.markers() else {
        return Ok(());
    };
    if markers.is_closed() {
        return Ok(());
    }

    let tip = display.centerline().tip();
    let identity = ["0", "0", "0", "1", "0", "0", "0"];

    let mut row: Vec<String> = Vec::with_capacity(holoneedle::session::MARKER_COLUMNS);
    row.push(format!("{:.6}", started.elapsed().as_secs_f64()));
    row.extend(identity.iter().map(|v| v.to_string()));
    row.push(format!("{:.6}", tip.x));
    row.push(format!("{:.6}", tip.y));
    row.push(format!("{:.6}", tip.z));
    row.extend(["1", "0", "0", "0"].iter().map(|v| v.to_string()));
    row.extend(identity.iter().map(|v| v.to_string()));

    markers.add_data(&row)?;
    Ok(())
}
