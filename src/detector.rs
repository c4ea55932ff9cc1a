//! The streaming P-wave detector.
//!
//! `SeismicDetector` owns every pipeline stage and drives one sample at a
//! time through them:
//!
//! 1. gravity separation (orientation independence)
//! 2. per-axis band-pass and polish high-pass
//! 3. vector magnitude
//! 4. the four windowed statistics rings (STA, LTA, calibration, periodicity)
//! 5. the trigger state machine and rejection cascade
//! 6. event and telemetry callbacks
//!
//! Everything is single-threaded and synchronous: one producer pushes
//! samples in timestamp order, callbacks run inline on that thread, and no
//! allocation happens after construction. Callbacks must not call back into
//! the detector.
//!
//! The detector never evaluates the STA/LTA ratio until the LTA window has
//! filled once, and stays disarmed while the LTA sits under the configured
//! amplitude floor; a still phone on a desk produces ratios that mean
//! nothing. After any emission or rejection a cooldown swallows the next
//! `cooldown` samples entirely (filters and rings freeze, the total counter
//! keeps advancing).

use tracing::{debug, info};

use crate::filters::AxisFilter;
use crate::gravity::GravityEstimator;
use crate::ring::Ring;
use crate::trigger::{TriggerEngine, TriggerStep, VARIANCE_TRIGGER_GAIN};
use crate::types::{
    Config, DebugTelemetry, DetectorState, RejectCode, SeismicEvent, CALIB_WINDOW_MAX,
    LTA_WINDOW_MAX, PERIODICITY_WINDOW_MAX, STA_WINDOW_MAX,
};

/// Telemetry is emitted at most once per this many processed samples.
pub const TELEMETRY_DECIMATION: u64 = 10;

/// Seconds of magnitude history the periodicity ring holds.
const PERIODICITY_SPAN_S: f32 = 4.0;

/// Receives every emitted event, inline on the producer thread.
pub type EventCallback = Box<dyn FnMut(&SeismicEvent)>;

/// Receives decimated internals snapshots, inline on the producer thread.
pub type DebugCallback = Box<dyn FnMut(&DebugTelemetry)>;

/// Streaming triaxial P-wave detector.
pub struct SeismicDetector {
    config: Config,

    // Pipeline stages
    gravity: GravityEstimator,
    filters: [AxisFilter; 3],
    sta: Ring<STA_WINDOW_MAX>,
    lta: Ring<LTA_WINDOW_MAX>,
    calib: Ring<CALIB_WINDOW_MAX>,
    periodicity: Ring<PERIODICITY_WINDOW_MAX>,
    trigger: TriggerEngine,

    // Sample bookkeeping
    cooldown_remaining: u32,
    total_samples: u64,

    // Sinks
    on_event: EventCallback,
    on_debug: Option<DebugCallback>,
}

impl SeismicDetector {
    /// Build a detector with the default 50 Hz configuration.
    pub fn new(on_event: EventCallback, on_debug: Option<DebugCallback>) -> Self {
        Self::with_config(Config::default(), on_event, on_debug)
    }

    /// Build a detector with an explicit configuration.
    pub fn with_config(
        config: Config,
        on_event: EventCallback,
        on_debug: Option<DebugCallback>,
    ) -> Self {
        let mut detector = Self {
            config: Config::default(),
            gravity: GravityEstimator::new(),
            filters: [AxisFilter::default(); 3],
            sta: Ring::new(),
            lta: Ring::new(),
            calib: Ring::new(),
            periodicity: Ring::new(),
            trigger: TriggerEngine::new(),
            cooldown_remaining: 0,
            total_samples: 0,
            on_event,
            on_debug,
        };
        detector.apply_config(config);
        detector
    }

    /// Swap the configuration.
    ///
    /// Ring capacities are re-bound; a ring is cleared only when its
    /// capacity actually changed, so re-applying an identical configuration
    /// keeps the accumulated windows. A sample-rate change swaps in freshly
    /// designed band-pass coefficients (and clears the filter delay lines).
    pub fn update_config(&mut self, config: Config) {
        self.apply_config(config);
    }

    /// The configuration currently in effect (after clamping).
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Push one raw accelerometer sample, in g, with a caller-supplied
    /// monotonic timestamp in milliseconds.
    ///
    /// Infallible: every input is absorbed. Non-finite values are not
    /// filtered and will propagate through the filter state; feed the
    /// detector sensor values you trust.
    pub fn process_sample(&mut self, ax: f32, ay: f32, az: f32, ts_ms: u64) {
        self.total_samples += 1;
        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
            return;
        }

        // Orientation-independent body acceleration.
        self.gravity.update([ax, ay, az]);
        let linear = self.gravity.linear([ax, ay, az]);

        // Band isolation per axis.
        let hp_alpha = self.config.hp_alpha;
        let filtered = [
            self.filters[0].process(linear[0], hp_alpha),
            self.filters[1].process(linear[1], hp_alpha),
            self.filters[2].process(linear[2], hp_alpha),
        ];
        let filt_mag =
            (filtered[0] * filtered[0] + filtered[1] * filtered[1] + filtered[2] * filtered[2])
                .sqrt();

        self.sta.push(filt_mag);
        self.lta.push(filt_mag);
        self.calib.push(filt_mag);
        self.periodicity.push(filt_mag);

        // No baseline yet: the ratio is meaningless until one full LTA
        // window exists.
        if !self.lta.is_full() {
            return;
        }

        let sta = self.sta.avg();
        let lta = self.lta.avg();
        let baseline_var = self.calib.var();
        let adaptive_trigger = (self.config.sta_lta_trigger
            + baseline_var.sqrt() * VARIANCE_TRIGGER_GAIN)
            .clamp(self.config.adaptive_trig_min, self.config.adaptive_trig_max);

        let raw_mag = (ax * ax + ay * ay + az * az).sqrt();

        // Too quiet to arm: ratios over a near-zero LTA explode on nothing.
        if lta < self.config.min_amplitude_g {
            if self.total_samples % TELEMETRY_DECIMATION == 0 {
                self.emit_telemetry(
                    raw_mag,
                    filt_mag,
                    sta,
                    lta,
                    0.0,
                    baseline_var,
                    adaptive_trigger,
                    ts_ms,
                );
            }
            return;
        }

        let ratio = sta / lta;
        if self.total_samples % TELEMETRY_DECIMATION == 0 {
            self.emit_telemetry(
                raw_mag,
                filt_mag,
                sta,
                lta,
                ratio,
                baseline_var,
                adaptive_trigger,
                ts_ms,
            );
        }

        match self.trigger.step(
            &self.config,
            ratio,
            adaptive_trigger,
            filt_mag,
            filtered,
            ts_ms,
            &self.periodicity,
        ) {
            TriggerStep::Quiet => {}
            TriggerStep::Trigger(event) => {
                debug!(
                    level = event.level.as_str(),
                    peak_g = event.peak_g,
                    ratio = event.sta_lta,
                    freq_hz = event.freq_hz,
                    "seismic trigger"
                );
                (self.on_event)(&event);
            }
            TriggerStep::Detrigger(event) => {
                debug!(
                    level = event.level.as_str(),
                    peak_g = event.peak_g,
                    duration = event.duration,
                    "seismic de-trigger"
                );
                (self.on_event)(&event);
                self.cooldown_remaining = self.config.cooldown;
            }
            TriggerStep::Rejected(code) => {
                debug!(?code, ratio, adaptive_trigger, "candidate rejected");
                self.cooldown_remaining = self.config.cooldown;
            }
        }
    }

    /// Clear every stage: filters, rings, state machine, counters, gravity
    /// back to the face-up guess. A full cooldown follows, as after an
    /// event, so the pipeline re-settles before detection resumes.
    pub fn reset(&mut self) {
        self.gravity.reset();
        for f in &mut self.filters {
            f.reset();
        }
        self.sta.reset();
        self.lta.reset();
        self.calib.reset();
        self.periodicity.reset();
        self.trigger.clear();
        self.cooldown_remaining = self.config.cooldown;
        self.total_samples = 0;
        info!("detector reset");
    }

    /// Current state machine phase.
    pub fn state(&self) -> DetectorState {
        self.trigger.state()
    }

    /// Most recent rejection, cleared when an event completes.
    pub fn last_reject(&self) -> RejectCode {
        self.trigger.last_reject()
    }

    /// Total samples pushed since construction or reset, cooldown included.
    pub fn samples_seen(&self) -> u64 {
        self.total_samples
    }

    /// Samples remaining in the current cooldown, if any.
    pub fn cooldown_remaining(&self) -> u32 {
        self.cooldown_remaining
    }

    fn apply_config(&mut self, config: Config) {
        let mut config = config;
        // Clamp instead of failing: the detector accepts any configuration.
        if !(config.sample_rate_hz >= 1.0) {
            config.sample_rate_hz = 1.0;
        }
        if config.adaptive_trig_max < config.adaptive_trig_min {
            config.adaptive_trig_max = config.adaptive_trig_min;
        }

        let rate_changed = config.sample_rate_hz != self.config.sample_rate_hz;
        if rate_changed {
            for f in &mut self.filters {
                f.rebind_rate(config.sample_rate_hz);
            }
        }

        self.sta.set_cap(config.sta_window as usize);
        self.lta.set_cap(config.lta_window as usize);
        self.calib.set_cap(config.calib_window as usize);
        self.periodicity
            .set_cap((PERIODICITY_SPAN_S * config.sample_rate_hz) as usize);

        info!(
            sample_rate_hz = config.sample_rate_hz,
            sta_window = self.sta.capacity(),
            lta_window = self.lta.capacity(),
            calib_window = self.calib.capacity(),
            periodicity_window = self.periodicity.capacity(),
            "configuration applied"
        );
        self.config = config;
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_telemetry(
        &mut self,
        raw_mag: f32,
        filt_mag: f32,
        sta: f32,
        lta: f32,
        ratio: f32,
        baseline_var: f32,
        adaptive_trigger: f32,
        ts_ms: u64,
    ) {
        if let Some(on_debug) = self.on_debug.as_mut() {
            let snapshot = DebugTelemetry {
                raw_mag,
                filt_mag,
                sta,
                lta,
                ratio,
                baseline_var,
                adaptive_trigger,
                state: self.trigger.state(),
                reject: self.trigger.last_reject(),
                ts_ms,
            };
            on_debug(&snapshot);
        }
    }
}

impl std::fmt::Debug for SeismicDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeismicDetector")
            .field("config", &self.config)
            .field("state", &self.trigger.state())
            .field("total_samples", &self.total_samples)
            .field("cooldown_remaining", &self.cooldown_remaining)
            .finish_non_exhaustive()
    }
}
