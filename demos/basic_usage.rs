/// Basic usage example: feed accelerometer samples, receive seismic events.
use pwave_sensing::{Config, SeismicDetector, SeismicEvent};

fn main() {
    println!("=== P-Wave Sensing Engine: Basic Example ===\n");

    let mut detector = SeismicDetector::new(
        Box::new(|event: &SeismicEvent| {
            println!(
                "  !! {:>8} | peak {:.3} g | ratio {:.1} | {:.1} Hz | {} samples",
                event.level.as_str(),
                event.peak_g,
                event.sta_lta,
                event.freq_hz,
                event.duration
            );
        }),
        None,
    );

    let config: &Config = detector.config();
    println!(
        "Config: {} Hz, STA {} / LTA {} samples, trigger {:.1}\n",
        config.sample_rate_hz, config.sta_window, config.lta_window, config.sta_lta_trigger
    );

    // Ten seconds of ambient hum so the long-term baseline fills, then a
    // two-second synthetic tremor, then quiet again so the event closes.
    let dt = 0.02f32;
    let mut ts: u64 = 0;

    println!("Feeding 11 s of ambient motion + 2 s tremor...");
    for i in 0..1600u64 {
        let t = i as f32 * dt;
        let hum = 0.011 * (2.0 * std::f32::consts::PI * 3.0 * t).sin();
        let tremor = if (600..700).contains(&i) {
            0.25 * (2.0 * std::f32::consts::PI * 4.0 * t).sin()
        } else {
            0.0
        };
        detector.process_sample(
            hum + tremor,
            0.011 * (2.0 * std::f32::consts::PI * 3.0 * t + 2.1).sin() + tremor,
            -1.0 + 0.011 * (2.0 * std::f32::consts::PI * 3.0 * t + 4.2).sin() + tremor,
            ts,
        );
        ts += 20;
    }

    println!("\nProcessed {} samples.", detector.samples_seen());
    println!("Detector state: {:?}", detector.state());
}
