//! holoneedle is the host-side shape pipeline of an augmented-reality
//! needle-tracking research platform. A fiber-instrumented biopsy needle
//! reports its bending as two linear curvature-versus-arc-length fits, one
//! per bending plane; this crate integrates those fits into a 3-D
//! centerline every sensor frame, feeds the result to an external tube
//! mesh builder for display, and in parallel persists high-rate pose and
//! telemetry samples to append-only files without ever blocking the
//! control loop on disk I/O.
//!
//! The two halves are independent: the reconstructor is a pure function
//! driven by the display state machine in [`needle_display`], and the
//! recording side is a set of buffered sinks in [`recorder`], each with
//! its own background writer thread that drains on close.

#![warn(missing_docs)]
pub mod args;
pub mod coefficients;
pub mod config;
pub mod data_writer;
pub mod debounce;
pub mod dummy_source;
pub mod frame_decoder;
pub mod mesh;
pub mod needle_display;
pub mod reconstructor;
pub mod recorder;
pub mod replay_source;
pub mod session;
