//! Trigger state machine and rejection cascade.
//!
//! The STA/LTA ratio drives a three-phase machine:
//!
//! - **Idle**: the ratio sits under the adaptive threshold; nothing is open.
//! - **Confirming**: the ratio crossed the threshold. Evidence accumulates
//!   sample by sample (peak magnitude, per-axis peaks and energies, zero
//!   crossings of the X axis). Once the crossing has sustained for the
//!   configured count, the candidate faces the rejection cascade exactly
//!   once: the first failing check cancels it, a clean pass fires the
//!   trigger edge.
//! - **Triggered**: an event is running. Duration and peak keep updating
//!   until the ratio falls under the exit threshold, which fires the
//!   de-trigger edge carrying the final shape.
//!
//! The cascade encodes what distinguishes a wavefront from handheld-device
//! life: taps ring a single axis, sway sits under the P-wave band, gait and
//! machinery repeat, pocket knocks dump their energy into one component.

use crate::ring::Ring;
use crate::types::{AlertLevel, Config, DetectorState, RejectCode, SeismicEvent};

/// Fraction of total squared energy a single axis may carry before the
/// candidate is discarded as single-axis dominated.
pub const ENERGY_DOMINANCE_LIMIT: f32 = 0.85;

/// Minimum live samples in the periodicity ring before autocorrelation is
/// meaningful. Below this (always the case under ~15 Hz sampling) the
/// periodicity check silently skips.
pub const AUTOCORR_MIN_SAMPLES: usize = 60;

/// Cyclic-disturbance band probed by the autocorrelation, Hz.
/// 1.5–2.5 Hz covers the fundamental gait frequency and most machinery.
pub const CYCLIC_FREQ_MIN_HZ: f32 = 1.5;
pub const CYCLIC_FREQ_MAX_HZ: f32 = 2.5;

/// Gain converting baseline standard deviation (g) into extra trigger ratio.
pub const VARIANCE_TRIGGER_GAIN: f32 = 100.0;

/// Outcome of advancing the trigger machine by one armed sample.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerStep {
    /// No edge crossed this sample.
    Quiet,
    /// Candidate survived the cascade; the event opens.
    Trigger(SeismicEvent),
    /// Ratio fell under the exit threshold; the event closes.
    Detrigger(SeismicEvent),
    /// Candidate failed the cascade and was discarded.
    Rejected(RejectCode),
}

/// State machine plus candidate evidence accumulators.
#[derive(Debug, Clone)]
pub struct TriggerEngine {
    state: DetectorState,
    sustained: u32,
    duration: u32,
    peak: f32,
    event_start_ms: u64,
    zero_crossings: u32,
    prev_sign_positive: bool,
    axis_peak: [f32; 3],
    axis_energy: [f32; 3],
    last_reject: RejectCode,
}

impl TriggerEngine {
    pub fn new() -> Self {
        Self {
            state: DetectorState::Idle,
            sustained: 0,
            duration: 0,
            peak: 0.0,
            event_start_ms: 0,
            zero_crossings: 0,
            prev_sign_positive: false,
            axis_peak: [0.0; 3],
            axis_energy: [0.0; 3],
            last_reject: RejectCode::None,
        }
    }

    /// Current machine phase.
    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Most recent rejection; cleared when an event completes.
    pub fn last_reject(&self) -> RejectCode {
        self.last_reject
    }

    /// Advance by one armed sample.
    ///
    /// `ratio` is STA/LTA, `adaptive_trigger` the threshold in effect,
    /// `magnitude` the filtered vector norm, `filtered` the per-axis
    /// filtered values it was computed from. `periodicity` is the
    /// magnitude-history ring the autocorrelation reads.
    pub fn step<const N: usize>(
        &mut self,
        config: &Config,
        ratio: f32,
        adaptive_trigger: f32,
        magnitude: f32,
        filtered: [f32; 3],
        ts_ms: u64,
        periodicity: &Ring<N>,
    ) -> TriggerStep {
        match self.state {
            DetectorState::Idle => {
                if ratio >= adaptive_trigger {
                    self.open_candidate(magnitude, filtered, ts_ms);
                }
                TriggerStep::Quiet
            }
            DetectorState::Confirming => {
                if ratio < adaptive_trigger {
                    // Transient: the crossing did not hold.
                    self.state = DetectorState::Idle;
                    return TriggerStep::Quiet;
                }
                self.accumulate(magnitude, filtered);
                if self.sustained >= config.min_sustained {
                    let code = self.evaluate_cascade(config, periodicity);
                    if code != RejectCode::None {
                        self.last_reject = code;
                        self.state = DetectorState::Idle;
                        return TriggerStep::Rejected(code);
                    }
                    self.state = DetectorState::Triggered;
                    self.duration = self.sustained;
                    return TriggerStep::Trigger(self.build_event(config, ratio));
                }
                TriggerStep::Quiet
            }
            DetectorState::Triggered => {
                self.duration += 1;
                self.peak = self.peak.max(magnitude);
                if ratio < config.sta_lta_detrigger {
                    let event = self.build_event(config, ratio);
                    self.clear();
                    return TriggerStep::Detrigger(event);
                }
                TriggerStep::Quiet
            }
        }
    }

    /// Seed the evidence accumulators from the crossing sample.
    fn open_candidate(&mut self, magnitude: f32, filtered: [f32; 3], ts_ms: u64) {
        self.state = DetectorState::Confirming;
        self.sustained = 1;
        self.peak = magnitude;
        self.event_start_ms = ts_ms;
        self.zero_crossings = 0;
        self.prev_sign_positive = filtered[0] >= 0.0;
        self.axis_peak = [filtered[0].abs(), filtered[1].abs(), filtered[2].abs()];
        self.axis_energy = [
            filtered[0] * filtered[0],
            filtered[1] * filtered[1],
            filtered[2] * filtered[2],
        ];
    }

    /// Fold one above-threshold sample into the open candidate.
    fn accumulate(&mut self, magnitude: f32, filtered: [f32; 3]) {
        self.sustained += 1;
        self.peak = self.peak.max(magnitude);
        for axis in 0..3 {
            self.axis_peak[axis] = self.axis_peak[axis].max(filtered[axis].abs());
            self.axis_energy[axis] += filtered[axis] * filtered[axis];
        }
        let sign_positive = filtered[0] >= 0.0;
        if sign_positive != self.prev_sign_positive {
            self.zero_crossings += 1;
        }
        self.prev_sign_positive = sign_positive;
    }

    /// Run the rejection cascade over the accumulated evidence.
    ///
    /// Checks run in a fixed order; the first failure wins and is the one
    /// reported.
    fn evaluate_cascade<const N: usize>(
        &self,
        config: &Config,
        periodicity: &Ring<N>,
    ) -> RejectCode {
        let mx = self.axis_peak[0].max(self.axis_peak[1]).max(self.axis_peak[2]);
        let mn = self.axis_peak[0].min(self.axis_peak[1]).min(self.axis_peak[2]);
        if mx > 0.0 && mn / mx < config.axis_coherence_min {
            return RejectCode::AxisCoherence;
        }

        let span_s = self.sustained as f32 * config.dt();
        if span_s > 0.0 {
            let freq = self.zero_crossings as f32 / (2.0 * span_s);
            if freq < config.pwave_freq_min || freq > config.pwave_freq_max {
                return RejectCode::Frequency;
            }
        }

        if periodicity.is_full() {
            let peak = autocorrelation_peak(periodicity, config.sample_rate_hz);
            if peak >= config.periodicity_thresh {
                return RejectCode::Periodicity;
            }
        }

        let total_energy = self.axis_energy.iter().sum::<f32>();
        if total_energy > 0.0 {
            let max_energy = self.axis_energy[0]
                .max(self.axis_energy[1])
                .max(self.axis_energy[2]);
            if max_energy / total_energy > ENERGY_DOMINANCE_LIMIT {
                return RejectCode::EnergyDistribution;
            }
        }

        RejectCode::None
    }

    /// Event snapshot at the current accumulator values.
    fn build_event(&self, config: &Config, ratio: f32) -> SeismicEvent {
        let span_s = self.sustained as f32 * config.dt();
        let freq_hz = if span_s > 0.0 {
            self.zero_crossings as f32 / (2.0 * span_s)
        } else {
            0.0
        };
        SeismicEvent {
            level: AlertLevel::from_peak_g(self.peak),
            peak_g: self.peak,
            sta_lta: ratio,
            freq_hz,
            time_ms: self.event_start_ms,
            duration: self.duration,
        }
    }

    /// Drop the candidate and the reject memory; back to Idle.
    pub fn clear(&mut self) {
        self.state = DetectorState::Idle;
        self.sustained = 0;
        self.duration = 0;
        self.peak = 0.0;
        self.event_start_ms = 0;
        self.zero_crossings = 0;
        self.prev_sign_positive = false;
        self.axis_peak = [0.0; 3];
        self.axis_energy = [0.0; 3];
        self.last_reject = RejectCode::None;
    }
}

impl Default for TriggerEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Peak normalized autocorrelation of the ring contents over the cyclic band.
///
/// Lags span `[⌊Fs/2.5⌋, ⌊Fs/1.5⌋]`, the 1.5–2.5 Hz fundamental of gait and
/// most rotating machinery, bounded by half the window. Returns 0 when the
/// window is shorter than `AUTOCORR_MIN_SAMPLES` or carries almost no
/// variance.
pub fn autocorrelation_peak<const N: usize>(ring: &Ring<N>, sample_rate_hz: f32) -> f32 {
    let n = ring.len();
    if n < AUTOCORR_MIN_SAMPLES {
        return 0.0;
    }

    let mut mean = 0.0f32;
    for i in 0..n {
        mean += ring.at(i);
    }
    mean /= n as f32;

    let mut variance = 0.0f32;
    for i in 0..n {
        let d = ring.at(i) - mean;
        variance += d * d;
    }
    if variance < 1e-10 {
        return 0.0;
    }

    let lag_min = (sample_rate_hz / CYCLIC_FREQ_MAX_HZ) as usize;
    let lag_max = (sample_rate_hz / CYCLIC_FREQ_MIN_HZ) as usize;

    let mut best = 0.0f32;
    let mut lag = lag_min;
    while lag <= lag_max && lag < n / 2 {
        let mut corr = 0.0f32;
        for i in 0..n - lag {
            corr += (ring.at(i) - mean) * (ring.at(i + lag) - mean);
        }
        best = best.max(corr / variance);
        lag += 1;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PERIODICITY_WINDOW_MAX;
    use std::f32::consts::PI;

    fn empty_ring() -> Ring<PERIODICITY_WINDOW_MAX> {
        Ring::new()
    }

    /// Ring full of the magnitude envelope of a 2 Hz oscillation at 50 Hz.
    fn gait_ring() -> Ring<PERIODICITY_WINDOW_MAX> {
        let mut ring = empty_ring();
        for i in 0..PERIODICITY_WINDOW_MAX {
            let t = i as f32 * 0.02;
            ring.push(0.1 * (2.0 * PI * 2.0 * t).sin().abs());
        }
        ring
    }

    fn noise_ring() -> Ring<PERIODICITY_WINDOW_MAX> {
        let mut ring = empty_ring();
        let mut x: u64 = 0x9e37_79b9_7f4a_7c15;
        for _ in 0..PERIODICITY_WINDOW_MAX {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            ring.push((x % 1000) as f32 / 10_000.0);
        }
        ring
    }

    /// Drive the engine through a clean confirming run with the given
    /// per-sample filtered vector generator, returning the first non-quiet
    /// step outcome.
    fn run_confirmation(
        config: &Config,
        ring: &Ring<PERIODICITY_WINDOW_MAX>,
        filtered_at: impl Fn(u32) -> [f32; 3],
    ) -> TriggerStep {
        let mut engine = TriggerEngine::new();
        for i in 0..config.min_sustained + 1 {
            let f = filtered_at(i);
            let mag = (f[0] * f[0] + f[1] * f[1] + f[2] * f[2]).sqrt();
            let step = engine.step(config, 10.0, 5.0, mag, f, 1000 + u64::from(i) * 20, ring);
            if step != TriggerStep::Quiet {
                return step;
            }
        }
        TriggerStep::Quiet
    }

    #[test]
    fn test_idle_below_threshold_stays_idle() {
        let config = Config::default();
        let mut engine = TriggerEngine::new();
        let ring = empty_ring();
        let step = engine.step(&config, 2.0, 5.0, 0.05, [0.03; 3], 0, &ring);
        assert_eq!(step, TriggerStep::Quiet);
        assert_eq!(engine.state(), DetectorState::Idle);
    }

    #[test]
    fn test_crossing_opens_candidate() {
        let config = Config::default();
        let mut engine = TriggerEngine::new();
        let ring = empty_ring();
        engine.step(&config, 6.0, 5.0, 0.05, [0.03; 3], 42, &ring);
        assert_eq!(engine.state(), DetectorState::Confirming);
    }

    #[test]
    fn test_transient_crossing_returns_to_idle() {
        let config = Config::default();
        let mut engine = TriggerEngine::new();
        let ring = empty_ring();
        engine.step(&config, 6.0, 5.0, 0.05, [0.03; 3], 0, &ring);
        let step = engine.step(&config, 3.0, 5.0, 0.01, [0.01; 3], 20, &ring);
        assert_eq!(step, TriggerStep::Quiet);
        assert_eq!(engine.state(), DetectorState::Idle);
        // No cooldown-worthy outcome for a transient.
        assert_eq!(engine.last_reject(), RejectCode::None);
    }

    #[test]
    fn test_single_axis_candidate_rejected_for_coherence() {
        let config = Config::default();
        let ring = empty_ring();
        let step = run_confirmation(&config, &ring, |i| {
            // All energy on X, alternating sign to stay in-band.
            let x = if i % 2 == 0 { 0.2 } else { -0.2 };
            [x, 0.002, 0.002]
        });
        assert_eq!(step, TriggerStep::Rejected(RejectCode::AxisCoherence));
    }

    #[test]
    fn test_zero_crossing_free_candidate_rejected_for_frequency() {
        let config = Config::default();
        let ring = empty_ring();
        // Constant positive X: zero crossings stay 0, estimated frequency 0 Hz.
        let step = run_confirmation(&config, &ring, |_| [0.1, 0.09, 0.11]);
        assert_eq!(step, TriggerStep::Rejected(RejectCode::Frequency));
    }

    #[test]
    fn test_chattering_candidate_rejected_for_frequency() {
        let config = Config::default();
        let ring = empty_ring();
        // Sign flip every sample: 25 Hz estimate, above the band.
        let step = run_confirmation(&config, &ring, |i| {
            let x = if i % 2 == 0 { 0.1 } else { -0.1 };
            [x, 0.08, 0.09]
        });
        assert_eq!(step, TriggerStep::Rejected(RejectCode::Frequency));
    }

    #[test]
    fn test_periodic_background_rejected() {
        let config = Config::default();
        let ring = gait_ring();
        // In-band, coherent candidate; only the periodicity check can fail.
        let step = run_confirmation(&config, &ring, |i| {
            let x = if (i / 4) % 2 == 0 { 0.1 } else { -0.1 };
            [x, 0.09, 0.11]
        });
        assert_eq!(step, TriggerStep::Rejected(RejectCode::Periodicity));
    }

    #[test]
    fn test_energy_dominance_rejected() {
        let config = Config::default();
        let ring = empty_ring();
        // X alternates at an in-band rate and keeps accumulating energy;
        // Y and Z show one early peak (passing coherence) then fall silent.
        let step = run_confirmation(&config, &ring, |i| {
            let x = if (i / 2) % 2 == 0 { 0.1 } else { -0.1 };
            let side = if i == 0 { 0.05 } else { 0.001 };
            [x, side, side]
        });
        assert_eq!(step, TriggerStep::Rejected(RejectCode::EnergyDistribution));
    }

    #[test]
    fn test_clean_candidate_fires_and_closes() {
        let config = Config::default();
        let ring = noise_ring();
        let mut engine = TriggerEngine::new();

        // In-band coherent shaking: sign flip every 4 samples ≈ 6.25 Hz.
        let mut fired = None;
        for i in 0..config.min_sustained + 1 {
            let x: f32 = if (i / 4) % 2 == 0 { 0.1 } else { -0.1 };
            let f = [x, 0.09, 0.11];
            let mag = (f[0] * f[0] + f[1] * f[1] + f[2] * f[2]).sqrt();
            match engine.step(&config, 10.0, 5.0, mag, f, 5000 + u64::from(i) * 20, &ring) {
                TriggerStep::Trigger(ev) => fired = Some(ev),
                TriggerStep::Quiet => {}
                other => panic!("unexpected step {other:?}"),
            }
        }
        let opened = fired.expect("candidate should fire");
        assert_eq!(engine.state(), DetectorState::Triggered);
        assert_eq!(opened.time_ms, 5000);
        assert_eq!(opened.duration, config.min_sustained);
        assert!(opened.freq_hz >= config.pwave_freq_min);
        assert!(opened.freq_hz <= config.pwave_freq_max);
        assert_eq!(opened.level, AlertLevel::Severe); // peak ≈ 0.17 g

        // Ratio collapse closes the event with the same start time.
        let mut closed = None;
        for i in 0..10u32 {
            let ts = 6000 + u64::from(i) * 20;
            if let TriggerStep::Detrigger(ev) =
                engine.step(&config, 0.5, 5.0, 0.01, [0.005; 3], ts, &ring)
            {
                closed = Some(ev);
                break;
            }
        }
        let closed = closed.expect("event should close");
        assert_eq!(closed.time_ms, opened.time_ms);
        assert!(closed.duration > opened.duration);
        assert_eq!(engine.state(), DetectorState::Idle);
        assert_eq!(engine.last_reject(), RejectCode::None);
    }

    #[test]
    fn test_triggered_tracks_growing_peak() {
        let config = Config::default();
        let ring = noise_ring();
        let mut engine = TriggerEngine::new();
        for i in 0..config.min_sustained + 1 {
            let x = if (i / 4) % 2 == 0 { 0.1 } else { -0.1 };
            engine.step(&config, 10.0, 5.0, 0.17, [x, 0.09, 0.11], 0, &ring);
        }
        assert_eq!(engine.state(), DetectorState::Triggered);

        // Stronger shaking while triggered raises the reported peak.
        engine.step(&config, 8.0, 5.0, 0.55, [0.3, 0.3, 0.3], 400, &ring);
        if let TriggerStep::Detrigger(ev) =
            engine.step(&config, 0.5, 5.0, 0.01, [0.005; 3], 420, &ring)
        {
            assert!(ev.peak_g >= 0.55);
            assert_eq!(ev.level, AlertLevel::Critical);
        } else {
            panic!("expected de-trigger");
        }
    }

    #[test]
    fn test_reject_memory_persists_until_event_completes() {
        let config = Config::default();
        let ring = empty_ring();
        let mut engine = TriggerEngine::new();
        for i in 0..config.min_sustained {
            engine.step(&config, 10.0, 5.0, 0.2, [0.2, 0.002, 0.002], u64::from(i), &ring);
        }
        assert_eq!(engine.last_reject(), RejectCode::AxisCoherence);
        assert_eq!(engine.state(), DetectorState::Idle);

        // The memory survives idling and a fresh candidate opening.
        engine.step(&config, 2.0, 5.0, 0.01, [0.005; 3], 99, &ring);
        assert_eq!(engine.last_reject(), RejectCode::AxisCoherence);
    }

    #[test]
    fn test_autocorrelation_short_window_skips() {
        let mut ring: Ring<PERIODICITY_WINDOW_MAX> = Ring::new();
        for i in 0..AUTOCORR_MIN_SAMPLES - 1 {
            ring.push((i % 10) as f32);
        }
        assert_eq!(autocorrelation_peak(&ring, 50.0), 0.0);
    }

    #[test]
    fn test_autocorrelation_flat_window_skips() {
        let mut ring: Ring<PERIODICITY_WINDOW_MAX> = Ring::new();
        for _ in 0..PERIODICITY_WINDOW_MAX {
            ring.push(0.25);
        }
        assert_eq!(autocorrelation_peak(&ring, 50.0), 0.0);
    }

    #[test]
    fn test_autocorrelation_flags_gait_band_cycle() {
        let ring = gait_ring();
        let peak = autocorrelation_peak(&ring, 50.0);
        // An exactly periodic window correlates at (n - lag)/n at the
        // period lag, ~0.875 here; comfortably past the 0.6 rejection bar.
        assert!(peak > 0.8, "gait envelope should self-correlate, got {peak}");
    }

    #[test]
    fn test_autocorrelation_ignores_noise() {
        let ring = noise_ring();
        let peak = autocorrelation_peak(&ring, 50.0);
        assert!(peak < 0.4, "noise should not correlate, got {peak}");
    }

    #[test]
    fn test_autocorrelation_ignores_out_of_band_cycle() {
        // 6 Hz envelope repeats every ~8.3 samples; the probed lags (20–33)
        // land between multiples unevenly, but a fast cycle still aliases
        // into them, so probe a slow 0.4 Hz cycle instead: period 125
        // samples, longer than every probed lag and half the window.
        let mut ring: Ring<PERIODICITY_WINDOW_MAX> = Ring::new();
        for i in 0..PERIODICITY_WINDOW_MAX {
            let t = i as f32 * 0.02;
            ring.push(0.1 * (2.0 * PI * 0.4 * t).sin());
        }
        let peak = autocorrelation_peak(&ring, 50.0);
        assert!(peak < 0.95, "slow sway must not look like gait, got {peak}");
    }
}
