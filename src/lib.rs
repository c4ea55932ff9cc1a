//! Seismic P-Wave Detection Engine
//!
//! A real-time detector that turns a raw triaxial accelerometer stream from
//! a handheld device into discrete seismic events classified by severity.
//! Built for early warning: catch the compressional first arrival before the
//! destructive S-wave, while rejecting the overwhelmingly common non-seismic
//! motion of a phone being carried, tapped, or left on a vibrating surface.
//!
//! # Design Philosophy
//!
//! - **Evidence before alerts**: a trigger candidate must sustain an
//!   STA/LTA excursion *and* survive a rejection cascade (axis coherence,
//!   dominant frequency, autocorrelation periodicity, energy distribution)
//!   before anything is emitted.
//! - **Noise-adaptive**: the trigger ratio rises with the measured baseline
//!   variance, so a phone on a washing machine needs a stronger excursion
//!   than a phone on a shelf.
//! - **Orientation-independent**: a slow gravity tracker subtracts the
//!   static field, so pocket, cradle, and face-down placements all look the
//!   same to the band-pass stage.
//! - **Battery-aware**: O(1) per sample, fixed memory, no allocation after
//!   construction. Suitable for a continuous low-power sampling thread.
//!
//! # Core Modules
//!
//! - `types`: configuration, events, telemetry, shared enums
//! - `gravity`: low-pass gravity tracking and subtraction
//! - `filters`: 1–15 Hz Butterworth band-pass plus polish high-pass
//! - `ring`: fixed-capacity windowed statistics
//! - `trigger`: IDLE/CONFIRM/TRIGGERED machine and rejection cascade
//! - `detector`: the assembled streaming pipeline
//! - `ffi`: C ABI for mobile host bridges
//!
//! # Example
//!
//! ```
//! use pwave_sensing::{SeismicDetector, SeismicEvent};
//!
//! let mut detector = SeismicDetector::new(
//!     Box::new(|event: &SeismicEvent| {
//!         println!("{:?}: peak {:.3} g", event.level, event.peak_g);
//!     }),
//!     None,
//! );
//!
//! // Feed samples in g at the configured rate (50 Hz by default).
//! detector.process_sample(0.01, -0.02, -1.003, 1_000);
//! ```
//!
//! Timestamps are caller-supplied monotonic milliseconds; the engine never
//! consults a clock, which keeps replay and testing deterministic.

pub mod detector;
pub mod filters;
pub mod gravity;
pub mod ring;
pub mod trigger;
pub mod types;

// C FFI for mobile host bridges
pub mod ffi;



// Re-export the operational surface
pub use detector::{DebugCallback, EventCallback, SeismicDetector, TELEMETRY_DECIMATION};

pub use types::{
    AlertLevel, Config, DebugTelemetry, DetectorState, RejectCode, SeismicEvent,
    CALIB_WINDOW_MAX, LTA_WINDOW_MAX, PERIODICITY_WINDOW_MAX, STA_WINDOW_MAX,
};

pub use filters::{AxisFilter, BandPassFilter, Biquad, PolishHighPass};

pub use gravity::GravityEstimator;

pub use ring::Ring;

pub use trigger::{autocorrelation_peak, TriggerEngine, TriggerStep};

// FFI surface
pub use ffi::{
    seismic_engine_create, seismic_engine_destroy, seismic_engine_process_sample,
    seismic_engine_reset, seismic_engine_set_trigger, seismic_engine_version, SeismicDebugFn,
    SeismicEngine, SeismicEventFn, SeismicStatus,
};
