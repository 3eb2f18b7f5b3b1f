//! A synthetic coefficient source for bench runs without the sensing rig.
//!
//! Spawns a background thread that sweeps a plausible bend back and forth
//! through the needle's working range, adds a little measurement jitter,
//! and publishes the result into a [`LatchedCoefficients`] at a fixed
//! frame rate. Control messages adjust it while running.

use rand::prelude::*;
use std::thread;
use std::time::Duration;

use log::info;
use std::sync::mpsc;

use crate::coefficients::{CoefficientSource, CurvatureModel, LatchedCoefficients};

/// How fast the synthetic bend sweeps, in radians of phase per second.
const SWEEP_RATE: f64 = 0.4;

enum Signal {
    Amplitude(f64),
    Stop,
}

/// A [`CoefficientSource`] producing synthetic sensor frames.
pub struct DummySource {
    handle: Option<thread::JoinHandle<()>>,
    tx: mpsc::Sender<Signal>,
    latch: LatchedCoefficients,
}

impl DummySource {
    /// Starts the generator thread publishing `rate_hz` frames per second
    /// with curvature swings of roughly `amplitude` 1/m.
    pub fn start(rate_hz: f64, amplitude: f64) -> Self {
        let (tx, rx) = mpsc::channel::<Signal>();
        let latch = LatchedCoefficients::new();
        let th_latch = latch.clone();
        let frame_interval = Duration::from_secs_f64(1.0 / rate_hz.max(1.0));

        let handle = thread::spawn(move || {
            let mut rng = thread_rng();
            let mut amplitude = amplitude;
            let mut phase: f64 = 0.0;
            let mut running = true;
            while running {
                if let Ok(received) = rx.try_recv() {
                    match received {
                        Signal::Amplitude(new_amplitude) => amplitude = new_amplitude,
                        Signal::Stop => running = false,
                    }
                }

                let bend = amplitude * (phase).sin();
                let noise = (amplitude.abs() * 0.02).max(1e-6);
                let model = CurvatureModel {
                    ax: bend * 0.4 + rng.gen_range(-noise..noise),
                    bx: bend + rng.gen_range(-noise..noise),
                    ay: -bend * 0.25 + rng.gen_range(-noise..noise),
                    by: amplitude * 0.5 * (phase * 0.7).cos() + rng.gen_range(-noise..noise),
                };
                th_latch.publish(model);

                phase += SWEEP_RATE * frame_interval.as_secs_f64();
                thread::sleep(frame_interval);
            }
        });

        info!("synthetic coefficient source running at {rate_hz} Hz");
        DummySource {
            handle: Some(handle),
            tx,
            latch,
        }
    }

    /// Adjusts the curvature swing of frames generated from now on.
    pub fn set_amplitude(&self, amplitude: f64) {
        // panic if the send fails; the generator thread should outlive us
        self.tx.send(Signal::Amplitude(amplitude)).unwrap();
    }

    /// Stops the generator thread and waits for it to exit.
    pub fn stop(&mut self) {
        if self.handle.is_none() {
            return;
        }
        let _ = self.tx.send(Signal::Stop);
        if let Some(thread) = self.handle.take() {
            thread.join().unwrap();
        }
        info!("synthetic coefficient source stopped");
    }
}

impl CoefficientSource for DummySource {
    fn take(&mut self) -> Option<CurvatureModel> {
        self.latch.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn publishes_finite_frames() {
        let mut source = DummySource::start(200.0, 2.0);

        let deadline = Instant::now() + Duration::from_secs(2);
        let model = loop {
            if let Some(model) = source.take() {
                break model;
            }
            assert!(Instant::now() < deadline, "no frame within two seconds");
            thread::sleep(Duration::from_millis(1));
        };
        assert!(model.is_finite());

        source.stop();
    }

    #[test]
    fn amplitude_can_change_mid_run() {
        let mut source = DummySource::start(200.0, 2.0);
        source.set_amplitude(0.1);

        // frames keep flowing after the adjustment
        thread::sleep(Duration::from_millis(30));
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(model) = source.take() {
                assert!(model.is_finite());
                break;
            }
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }
        source.stop();
    }

    #[test]
    fn stop_joins_and_silences_the_source() {
        let mut source = DummySource::start(200.0, 1.0);
        thread::sleep(Duration::from_millis(20));
        source.stop();

        // drain whatever was latched before the stop
        let _ = source.take();
        thread::sleep(Duration::from_millis(20));
        assert!(source.take().is_none());

        // a second stop is harmless
        source.stop();
    }
}
