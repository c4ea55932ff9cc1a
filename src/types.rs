//! Core data types for the P-wave detection engine.
//!
//! This module defines the configuration, the event and telemetry payloads,
//! and the small enums shared across the pipeline. Types are designed to
//! minimize allocation and make intent obvious: if a concept exists, it gets
//! a type, and nothing crosses a module boundary as a raw tuple.
//!
//! All acceleration values are in g (9.81 m/s²), frequencies in Hz, and
//! timestamps in monotonic milliseconds supplied by the caller.

use serde::{Deserialize, Serialize};

/// Hard capacity of the short-term-average ring, in samples.
pub const STA_WINDOW_MAX: usize = 100;

/// Hard capacity of the long-term-average ring, in samples.
pub const LTA_WINDOW_MAX: usize = 1000;

/// Hard capacity of the noise-calibration ring, in samples.
pub const CALIB_WINDOW_MAX: usize = 5000;

/// Hard capacity of the periodicity (autocorrelation) ring, in samples.
pub const PERIODICITY_WINDOW_MAX: usize = 200;

/// Detection parameters for one processing session.
///
/// A configuration is applied atomically via `SeismicDetector::update_config`
/// and stays fixed between applications. Illegal values (zero windows, zero
/// sample rate) are clamped at application time rather than rejected; the
/// detector never fails to accept a configuration.
///
/// Window lengths are expressed in samples at `sample_rate_hz`. The defaults
/// assume 50 Hz sampling, where the STA window is 0.5 s, the LTA window 10 s,
/// and the calibration window 50 s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Accelerometer sampling rate in Hz. The band-pass coefficients are
    /// recomputed when this changes from the 50 Hz default.
    pub sample_rate_hz: f32,

    /// Coefficient of the second-stage polish high-pass, range (0, 1).
    /// 0.98 puts the corner near 0.16 Hz at 50 Hz sampling.
    pub hp_alpha: f32,

    /// Short-term average window, samples. Clamped to [1, STA_WINDOW_MAX].
    pub sta_window: u32,

    /// Long-term average window, samples. Clamped to [1, LTA_WINDOW_MAX].
    /// Detection is disarmed until this window has filled once.
    pub lta_window: u32,

    /// Base STA/LTA ratio that opens a trigger candidate.
    pub sta_lta_trigger: f32,

    /// STA/LTA ratio below which a running event closes.
    pub sta_lta_detrigger: f32,

    /// Floor on the LTA (in g) below which the detector stays disarmed.
    /// Prevents ratio blow-ups on a perfectly still baseline.
    pub min_amplitude_g: f32,

    /// Consecutive above-threshold samples required before a candidate is
    /// examined by the rejection cascade.
    pub min_sustained: u32,

    /// Minimum allowed ratio of the weakest to the strongest per-axis peak.
    /// A genuine wavefront excites all three axes; a knock rings one.
    pub axis_coherence_min: f32,

    /// Dead samples after any event emission or rejection.
    pub cooldown: u32,

    /// Lower bound of the admissible dominant frequency, Hz.
    pub pwave_freq_min: f32,

    /// Upper bound of the admissible dominant frequency, Hz.
    pub pwave_freq_max: f32,

    /// Baseline-variance window, samples. Clamped to [1, CALIB_WINDOW_MAX].
    pub calib_window: u32,

    /// Lower clamp of the noise-adaptive trigger ratio.
    pub adaptive_trig_min: f32,

    /// Upper clamp of the noise-adaptive trigger ratio.
    pub adaptive_trig_max: f32,

    /// Normalized autocorrelation peak at or above which a candidate is
    /// rejected as periodic (gait, elevator, vehicle).
    pub periodicity_thresh: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50.0,
            hp_alpha: 0.98,
            sta_window: 25,     // 0.5 s
            lta_window: 500,    // 10 s
            sta_lta_trigger: 4.5,
            sta_lta_detrigger: 1.5,
            min_amplitude_g: 0.012,
            min_sustained: 15,  // 0.3 s
            axis_coherence_min: 0.4,
            cooldown: 500,      // 10 s
            pwave_freq_min: 1.0,
            pwave_freq_max: 15.0,
            calib_window: 2500, // 50 s
            adaptive_trig_min: 3.5,
            adaptive_trig_max: 8.0,
            periodicity_thresh: 0.6,
        }
    }
}

impl Config {
    /// Sample interval in seconds.
    pub fn dt(&self) -> f32 {
        1.0 / self.sample_rate_hz
    }
}

/// Severity of an emitted seismic event, ordered by peak acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AlertLevel {
    /// Below the tremor floor; not emitted in practice.
    None = 0,
    /// Barely perceptible shaking, peak ≥ 0.01 g.
    Tremor = 1,
    /// Clearly felt shaking, peak ≥ 0.05 g.
    Moderate = 2,
    /// Strong shaking, peak ≥ 0.15 g.
    Severe = 3,
    /// Violent shaking, peak ≥ 0.40 g.
    Critical = 4,
}

impl AlertLevel {
    /// Classify a peak acceleration magnitude (in g) into an alert level.
    pub fn from_peak_g(peak_g: f32) -> Self {
        match peak_g {
            p if p >= 0.40 => AlertLevel::Critical,
            p if p >= 0.15 => AlertLevel::Severe,
            p if p >= 0.05 => AlertLevel::Moderate,
            p if p >= 0.01 => AlertLevel::Tremor,
            _ => AlertLevel::None,
        }
    }

    /// Stable numeric code for telemetry and FFI consumers.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::None => "none",
            AlertLevel::Tremor => "tremor",
            AlertLevel::Moderate => "moderate",
            AlertLevel::Severe => "severe",
            AlertLevel::Critical => "critical",
        }
    }
}

/// Reason a trigger candidate was discarded by the rejection cascade.
///
/// Checks run in declaration order; the first failure wins and is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RejectCode {
    /// No rejection recorded.
    None = 0,
    /// One axis dominated the per-axis peak amplitudes (knock, tap).
    AxisCoherence = 1,
    /// Estimated dominant frequency outside the P-wave band.
    Frequency = 2,
    /// Autocorrelation found a strong cyclic component (gait, machinery).
    Periodicity = 3,
    /// One axis carried almost all of the summed squared energy.
    EnergyDistribution = 4,
}

impl RejectCode {
    /// Stable numeric code for telemetry and FFI consumers.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Phase of the trigger state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DetectorState {
    /// Watching the ratio; no candidate open.
    Idle = 0,
    /// Ratio above threshold; accumulating evidence for the cascade.
    Confirming = 1,
    /// An event is in progress; waiting for the de-trigger edge.
    Triggered = 2,
}

impl DetectorState {
    /// Stable numeric code for telemetry and FFI consumers.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A detected seismic event.
///
/// Emitted twice per event: once on the trigger edge (ratio sustained above
/// the adaptive threshold and the cascade passed) and once on the de-trigger
/// edge (ratio fell below the exit threshold). Both emissions share
/// `time_ms`; the de-trigger emission carries the final duration and peak.
/// There is no explicit edge tag; consumers pair emissions by order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeismicEvent {
    /// Severity classified from the peak magnitude observed so far.
    pub level: AlertLevel,
    /// Largest filtered magnitude observed during the event, in g.
    pub peak_g: f32,
    /// STA/LTA ratio at the moment of emission.
    pub sta_lta: f32,
    /// Dominant frequency estimated from zero crossings, Hz.
    pub freq_hz: f32,
    /// Timestamp of the first above-threshold sample, ms.
    pub time_ms: u64,
    /// Event length in samples at the moment of emission.
    pub duration: u32,
}

/// One snapshot of the detector internals, for debug surfaces.
///
/// Emitted at most once per ten processed samples, and only once the LTA
/// window has filled. While the LTA sits below the amplitude floor the
/// detector is disarmed and the snapshot carries `ratio = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DebugTelemetry {
    /// Magnitude of the raw input vector, in g.
    pub raw_mag: f32,
    /// Magnitude of the gravity-compensated, band-passed vector, in g.
    pub filt_mag: f32,
    /// Short-term average of the filtered magnitude.
    pub sta: f32,
    /// Long-term average of the filtered magnitude.
    pub lta: f32,
    /// STA/LTA ratio, or 0 while disarmed.
    pub ratio: f32,
    /// Variance of the filtered magnitude over the calibration window.
    pub baseline_var: f32,
    /// Noise-adaptive trigger threshold in effect for this sample.
    pub adaptive_trigger: f32,
    /// Current state machine phase.
    pub state: DetectorState,
    /// Most recent rejection, cleared when an event completes.
    pub reject: RejectCode,
    /// Caller-supplied timestamp of the sample, ms.
    pub ts_ms: u64,
}
