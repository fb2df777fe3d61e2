use log::{LevelFilter, Log, Metadata, Record};

use pidloop::PidBuilder;

/// Minimal stderr logger so the controller's diagnostics are visible.
/// A real host would route these into its own logging facility.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn main() {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(LevelFilter::Trace);

    // -----------------------------------------------------------------------
    // Controller: heading hold for a steered actor
    // -----------------------------------------------------------------------
    // Output is a normalized rudder command in [-1, 1]; the control law
    // runs at 20 Hz regardless of the frame rate, with a 4-sample output
    // average to smooth the command handed to the plant.
    let mut heading_pid = PidBuilder::new()
        .kp(0.04)
        .ki(0.002)
        .kd(0.01)
        .output_max(1.0)
        .output_min(-1.0)
        .period(0.05)
        .averaging_window(4)
        .build();

    // -----------------------------------------------------------------------
    // Plant: first-order yaw response
    // -----------------------------------------------------------------------
    let max_turn_rate = 45.0_f64; // deg/s at full rudder
    let yaw_lag = 0.4_f64; // s, rudder-to-rate time constant

    let mut heading = 0.0_f64; // deg
    let mut turn_rate = 0.0_f64; // deg/s
    let mut time = 0.0_f64;

    // Variable frame clock: ~60 Hz with jitter and an occasional long
    // frame, so the periodic gating actually has work to do.
    let frame_dts = [0.016, 0.018, 0.015, 0.017, 0.033, 0.016];

    let mut calculations = 0_u32;
    let mut frames = 0_u32;
    let mut worst_error = 0.0_f64;

    while time < 12.0 {
        let dt = frame_dts[frames as usize % frame_dts.len()];
        frames += 1;
        time += dt;

        // Setpoint steps at t = 6 s; the measurement-based derivative
        // path keeps the rudder command free of the resulting kick.
        let target = if time < 6.0 { 90.0 } else { 180.0 };

        if heading_pid.tick_if_enabled(target, heading, dt) {
            calculations += 1;
        }

        let rudder = heading_pid.average_output();
        turn_rate += (rudder * max_turn_rate - turn_rate) * (dt / yaw_lag);
        heading += turn_rate * dt;

        if time > 4.0 && time < 6.0 {
            worst_error = worst_error.max((target - heading).abs());
        }
    }

    // -----------------------------------------------------------------------
    // Print results
    // -----------------------------------------------------------------------
    println!();
    println!("==========================================================");
    println!("  HEADING-HOLD STEERING DEMO");
    println!("==========================================================");
    println!();
    println!("  Frames ticked:        {frames:>6}");
    println!("  PID calculations:     {calculations:>6}  (gated to 20 Hz)");
    println!("  Final heading:        {heading:>9.2} deg  (target 180.00)");
    println!("  Final rudder:         {:>9.3}", heading_pid.average_output());
    println!("  Tracking error, settled window: {worst_error:.2} deg");
    println!();
}
