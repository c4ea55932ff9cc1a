/// Shake-table example: drives the detector through the classic nuisance
/// catalogue (tap, walk, sway) and one real arrival, printing telemetry and
/// rejection decisions via `tracing`.
use pwave_sensing::{DebugTelemetry, SeismicDetector, SeismicEvent};
use std::f32::consts::PI;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut detector = SeismicDetector::new(
        Box::new(|event: &SeismicEvent| {
            println!(
                ">>> EVENT {:>8}  peak={:.3}g  f={:.1}Hz  dur={}",
                event.level.as_str(),
                event.peak_g,
                event.freq_hz,
                event.duration
            );
        }),
        Some(Box::new(|t: &DebugTelemetry| {
            if t.ratio > 2.0 {
                println!(
                    "    telemetry: ratio {:.2} (trigger at {:.2}), state {:?}, last reject {:?}",
                    t.ratio, t.adaptive_trigger, t.state, t.reject
                );
            }
        })),
    );

    let mut ts: u64 = 0;
    let mut drive = |det: &mut SeismicDetector, label: &str, samples: Vec<[f32; 3]>| {
        println!("--- {label} ({} samples)", samples.len());
        for s in samples {
            det.process_sample(s[0], s[1], s[2], ts);
            ts += 20;
        }
        println!("    last reject: {:?}", det.last_reject());
    };

    // Armed ambient hum.
    drive(&mut detector, "ambient hum", tone(900, 0.012, 3.0));

    // Knuckle tap: single axis, should never alert.
    let mut tap = tone(600, 0.012, 3.0);
    for s in tap.iter_mut().take(3) {
        s[0] += 1.2;
    }
    drive(&mut detector, "knuckle tap", tap);

    // Cooldown drain plus fresh baseline.
    drive(&mut detector, "settle", tone(1200, 0.012, 3.0));

    // Genuine arrival: broadband sweep on all axes.
    drive(&mut detector, "p-wave arrival", chirp(120, 0.13));
    drive(&mut detector, "coda", tone(300, 0.012, 3.0));
}

fn tone(n: usize, amp: f32, freq: f32) -> Vec<[f32; 3]> {
    (0..n)
        .map(|i| {
            let p = 2.0 * PI * freq * i as f32 * 0.02;
            [
                amp * p.sin(),
                amp * (p + 2.0 * PI / 3.0).sin(),
                -1.0 + amp * (p + 4.0 * PI / 3.0).sin(),
            ]
        })
        .collect()
}

fn chirp(n: usize, amp: f32) -> Vec<[f32; 3]> {
    (0..n)
        .map(|i| {
            let t = i as f32 * 0.02;
            let f = 2.5 + 2.0 * i as f32 / n as f32;
            let p = 2.0 * PI * f * t;
            let env = (i.min(10) as f32) / 10.0;
            [
                env * amp * p.sin(),
                env * amp * (p + 2.0 * PI / 3.0).sin(),
                -1.0 + env * amp * (p + 4.0 * PI / 3.0).sin(),
            ]
        })
        .collect()
}
