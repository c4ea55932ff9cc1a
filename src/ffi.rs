//! C FFI bindings for host-platform integration.
//!
//! This module exposes the detection engine over a C ABI so mobile runtimes
//! can drive it through their native bridges: create an engine with two
//! function-pointer callbacks, feed it samples from the platform sensor
//! callback, destroy it on teardown.
//!
//! Memory safety:
//! - The returned engine pointer must be freed with `seismic_engine_destroy()`.
//! - NULL checks are performed on all inputs.
//!
//! Thread safety:
//! - The engine is NOT thread-safe. Drive it from a single sampling thread,
//!   or wrap calls in the host's own mutex.
//! - Callbacks are invoked inline from `seismic_engine_process_sample` on
//!   whatever thread called it, with the caller's `user_data` passed back
//!   verbatim. Callbacks must not call back into the engine.

use std::os::raw::{c_char, c_void};

use crate::detector::SeismicDetector;
use crate::types::{DebugTelemetry, SeismicEvent};

/// Event sink: `(level, peak_g, sta_lta, freq_hz, time_ms, duration, user_data)`.
pub type SeismicEventFn = Option<
    unsafe extern "C" fn(
        level: i32,
        peak_g: f32,
        sta_lta: f32,
        freq_hz: f32,
        time_ms: u64,
        duration: u32,
        user_data: *mut c_void,
    ),
>;

/// Telemetry sink: the flattened `DebugTelemetry` fields plus `user_data`.
pub type SeismicDebugFn = Option<
    unsafe extern "C" fn(
        raw_mag: f32,
        filt_mag: f32,
        sta: f32,
        lta: f32,
        ratio: f32,
        baseline_var: f32,
        adaptive_trigger: f32,
        state: i32,
        reject: i32,
        ts_ms: u64,
        user_data: *mut c_void,
    ),
>;

/// Opaque handle to a detection engine instance.
pub struct SeismicEngine {
    detector: SeismicDetector,
}

/// Result status codes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeismicStatus {
    /// Operation succeeded.
    Ok = 0,
    /// Null pointer provided.
    NullPointer = 1,
    /// Invalid parameter value.
    InvalidParameter = 2,
}

// The raw user pointer travels into the callback closures. Copy keeps the
// two closures independent; the caller owns the pointee and its lifetime.
#[derive(Clone, Copy)]
struct UserData(*mut c_void);

/// Create a detection engine.
///
/// `on_event` receives every trigger and de-trigger emission; `on_debug`
/// (optional, may be NULL) receives decimated telemetry snapshots.
/// `user_data` is passed through to both, unmodified.
///
/// # Safety
/// - `on_event` must be a valid function pointer (NULL returns NULL).
/// - `user_data` must stay valid for the lifetime of the engine.
/// - The returned pointer must be freed with `seismic_engine_destroy()`.
#[no_mangle]
pub unsafe extern "C" fn seismic_engine_create(
    on_event: SeismicEventFn,
    on_debug: SeismicDebugFn,
    user_data: *mut c_void,
) -> *mut SeismicEngine {
    let event_fn = match on_event {
        Some(f) => f,
        None => return std::ptr::null_mut(),
    };

    let event_ctx = UserData(user_data);
    let event_cb = Box::new(move |e: &SeismicEvent| {
        // Contract: the pointer stays valid for the engine's lifetime.
        unsafe {
            event_fn(
                i32::from(e.level.code()),
                e.peak_g,
                e.sta_lta,
                e.freq_hz,
                e.time_ms,
                e.duration,
                event_ctx.0,
            );
        }
    });

    let debug_cb = on_debug.map(|debug_fn| {
        let debug_ctx = UserData(user_data);
        Box::new(move |t: &DebugTelemetry| {
            unsafe {
                debug_fn(
                    t.raw_mag,
                    t.filt_mag,
                    t.sta,
                    t.lta,
                    t.ratio,
                    t.baseline_var,
                    t.adaptive_trigger,
                    i32::from(t.state.code()),
                    i32::from(t.reject.code()),
                    t.ts_ms,
                    debug_ctx.0,
                );
            }
        }) as Box<dyn FnMut(&DebugTelemetry)>
    });

    tracing::info!("seismic engine created");
    let engine = Box::new(SeismicEngine {
        detector: SeismicDetector::new(event_cb, debug_cb),
    });
    Box::into_raw(engine)
}

/// Destroy an engine instance.
///
/// # Safety
/// - `engine` must be a pointer from `seismic_engine_create()`, or NULL.
/// - Must not be called twice for the same pointer.
#[no_mangle]
pub unsafe extern "C" fn seismic_engine_destroy(engine: *mut SeismicEngine) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
        tracing::info!("seismic engine destroyed");
    }
}

/// Feed one accelerometer sample (in g) with a monotonic timestamp (ms).
///
/// Callbacks fire inline from this call.
///
/// # Safety
/// - `engine` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn seismic_engine_process_sample(
    engine: *mut SeismicEngine,
    ax: f32,
    ay: f32,
    az: f32,
    ts_ms: u64,
) -> SeismicStatus {
    if engine.is_null() {
        return SeismicStatus::NullPointer;
    }
    (*engine).detector.process_sample(ax, ay, az, ts_ms);
    SeismicStatus::Ok
}

/// Clear all detection state and enter a settling cooldown.
///
/// # Safety
/// - `engine` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn seismic_engine_reset(engine: *mut SeismicEngine) -> SeismicStatus {
    if engine.is_null() {
        return SeismicStatus::NullPointer;
    }
    (*engine).detector.reset();
    SeismicStatus::Ok
}

/// Override the base STA/LTA trigger ratio.
///
/// Exposed so host debug screens can tighten or relax sensitivity without
/// shipping a whole configuration across the boundary. Window capacities
/// are untouched, so accumulated statistics survive.
///
/// # Safety
/// - `engine` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn seismic_engine_set_trigger(
    engine: *mut SeismicEngine,
    sta_lta_trigger: f32,
) -> SeismicStatus {
    if engine.is_null() {
        return SeismicStatus::NullPointer;
    }
    if !sta_lta_trigger.is_finite() || sta_lta_trigger <= 0.0 {
        return SeismicStatus::InvalidParameter;
    }
    let engine = &mut *engine;
    let mut config = engine.detector.config().clone();
    config.sta_lta_trigger = sta_lta_trigger;
    engine.detector.update_config(config);
    tracing::info!(sta_lta_trigger, "trigger ratio overridden");
    SeismicStatus::Ok
}

/// Engine version as a static NUL-terminated string; never free it.
#[no_mangle]
pub extern "C" fn seismic_engine_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    unsafe extern "C" fn count_events(
        _level: i32,
        _peak_g: f32,
        _sta_lta: f32,
        _freq_hz: f32,
        _time_ms: u64,
        _duration: u32,
        user_data: *mut c_void,
    ) {
        let counter = &mut *(user_data as *mut u32);
        *counter += 1;
    }

    unsafe extern "C" fn count_telemetry(
        _raw_mag: f32,
        _filt_mag: f32,
        _sta: f32,
        _lta: f32,
        _ratio: f32,
        _baseline_var: f32,
        _adaptive_trigger: f32,
        _state: i32,
        _reject: i32,
        _ts_ms: u64,
        user_data: *mut c_void,
    ) {
        let counter = &mut *(user_data as *mut u32);
        *counter += 1;
    }

    #[test]
    fn test_create_requires_event_callback() {
        let engine = unsafe { seismic_engine_create(None, None, std::ptr::null_mut()) };
        assert!(engine.is_null());
    }

    #[test]
    fn test_null_engine_is_reported() {
        unsafe {
            assert_eq!(
                seismic_engine_process_sample(std::ptr::null_mut(), 0.0, 0.0, -1.0, 0),
                SeismicStatus::NullPointer
            );
            assert_eq!(
                seismic_engine_reset(std::ptr::null_mut()),
                SeismicStatus::NullPointer
            );
            assert_eq!(
                seismic_engine_set_trigger(std::ptr::null_mut(), 5.0),
                SeismicStatus::NullPointer
            );
        }
    }

    #[test]
    fn test_lifecycle_and_sample_flow() {
        let mut events: u32 = 0;
        unsafe {
            let engine = seismic_engine_create(
                Some(count_events),
                None,
                &mut events as *mut u32 as *mut c_void,
            );
            assert!(!engine.is_null());
            for i in 0..100u64 {
                assert_eq!(
                    seismic_engine_process_sample(engine, 0.01, 0.0, -1.0, i * 20),
                    SeismicStatus::Ok
                );
            }
            // Still baseline: nothing fires.
            assert_eq!(events, 0);
            assert_eq!(seismic_engine_reset(engine), SeismicStatus::Ok);
            seismic_engine_destroy(engine);
        }
    }

    #[test]
    fn test_telemetry_callback_receives_snapshots() {
        // Both callbacks share the same counter; nothing fires on a still
        // baseline, so only telemetry increments it.
        let mut snapshots: u32 = 0;
        unsafe {
            let engine = seismic_engine_create(
                Some(count_events),
                Some(count_telemetry),
                &mut snapshots as *mut u32 as *mut c_void,
            );
            for i in 0..600u64 {
                seismic_engine_process_sample(engine, 0.0, 0.0, -1.0, i * 20);
            }
            assert!(snapshots > 0);
            seismic_engine_destroy(engine);
        }
    }

    #[test]
    fn test_set_trigger_validates_input() {
        let mut events: u32 = 0;
        unsafe {
            let engine = seismic_engine_create(
                Some(count_events),
                None,
                &mut events as *mut u32 as *mut c_void,
            );
            assert_eq!(seismic_engine_set_trigger(engine, 6.0), SeismicStatus::Ok);
            assert_eq!(
                seismic_engine_set_trigger(engine, -1.0),
                SeismicStatus::InvalidParameter
            );
            assert_eq!(
                seismic_engine_set_trigger(engine, f32::NAN),
                SeismicStatus::InvalidParameter
            );
            seismic_engine_destroy(engine);
        }
    }

    #[test]
    fn test_version_string_is_static_and_terminated() {
        let version = seismic_engine_version();
        let s = unsafe { CStr::from_ptr(version) }.to_str().unwrap();
        assert_eq!(s, env!("CARGO_PKG_VERSION"));
    }
}
