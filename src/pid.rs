use std::collections::VecDeque;

use log::{trace, warn};

// ---------------------------------------------------------------------------
// PID Controller (single axis, rate-gated)
// ---------------------------------------------------------------------------

/// Values within this radius of zero are treated as zero (gains, dt).
const ZERO_TOLERANCE: f64 = 1e-5;

fn nearly_zero(v: f64) -> bool {
    v == 0.0 || (v > -ZERO_TOLERANCE && v < ZERO_TOLERANCE)
}

/// Accumulate `dt` into `buffer`; on reaching `capacity`, subtract it
/// (carrying the remainder) and report the overflow.
fn accumulate(buffer: &mut f64, dt: f64, capacity: f64) -> bool {
    *buffer += dt;
    if *buffer >= capacity {
        *buffer -= capacity;
        return true;
    }
    false
}

/// A single-axis PID controller with clamped output, integral anti-windup,
/// and optional fixed-rate ticking.
///
/// The host owns the instance and drives it either directly with
/// [`update`](Pid::update) / [`update_from_error`](Pid::update_from_error),
/// or through [`tick`](Pid::tick), which banks frame time and runs the
/// control law at a fixed `period` independent of the caller's frame rate.
/// Retrieve results via [`last_output`](Pid::last_output) or the smoothed
/// [`average_output`](Pid::average_output).
///
/// Tunables are plain public fields and may be changed between calls. Use
/// [`set_period`](Pid::set_period) rather than writing `period` directly so
/// the integral and derivative gains rescale with the time step.
#[derive(Debug, Clone)]
pub struct Pid {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Upper bound of the controlled value. `output_max >= output_min` is
    /// the caller's responsibility; it is not checked.
    pub output_max: f64,
    pub output_min: f64,
    /// Nominal control period, s. `<= 0` disables gating (every tick
    /// calculates). Change on the fly via `set_period`.
    pub period: f64,
    enabled: bool,
    tick_accum: f64,
    integral: f64,
    prev_output: f64,
    prev_input: f64,
    prev_error: f64,
    avg_window: usize,
    avg_buffer: VecDeque<f64>,
}

impl Default for Pid {
    fn default() -> Self {
        Self {
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            output_max: 1.0,
            output_min: 0.0,
            period: 0.2,
            enabled: true,
            tick_accum: 0.0,
            integral: 0.0,
            prev_output: 0.0,
            prev_input: 0.0,
            prev_error: 0.0,
            avg_window: 1,
            avg_buffer: VecDeque::from(vec![0.0]),
        }
    }
}

impl Pid {
    pub fn new(kp: f64, ki: f64, kd: f64, output_max: f64, output_min: f64, period: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            output_max,
            output_min,
            period,
            ..Self::default()
        }
    }

    /// Restore transient state (accumulators, cached values, averaging
    /// window) to initial. Configuration is untouched; the controller is
    /// left enabled.
    pub fn reset(&mut self) {
        self.enabled = true;
        self.tick_accum = 0.0;
        self.integral = 0.0;
        self.prev_output = 0.0;
        self.prev_input = 0.0;
        self.prev_error = 0.0;
        self.reset_averaging_buffer();
    }

    // -----------------------------------------------------------------------
    // One-shot calculation
    // -----------------------------------------------------------------------

    /// Run the control law once against a setpoint and a measured value.
    ///
    /// The derivative term differentiates the measured input, not the
    /// error, so a step change in the setpoint produces no derivative
    /// kick. Returns the clamped output.
    pub fn update(&mut self, setpoint: f64, measured: f64, dt: f64) -> f64 {
        if nearly_zero(dt) {
            warn!("pid update skipped: dt {dt} is nearly zero");
            return 0.0;
        }

        let error = setpoint - measured;
        let output = self.proportional(error)
            + self.integrate(error, dt)
            + self.derivative_on_measurement(measured, dt);

        self.prev_error = error;
        self.prev_input = measured;

        self.clamp_and_record(output)
    }

    /// Run the control law once against a pre-computed error.
    ///
    /// Susceptible to derivative kick: the derivative term differentiates
    /// the error signal directly, so a step change in the setpoint shows
    /// up as a large transient. Prefer [`update`](Pid::update) when the
    /// raw measurement is available.
    pub fn update_from_error(&mut self, error: f64, dt: f64) -> f64 {
        if nearly_zero(dt) {
            warn!("pid update skipped: dt {dt} is nearly zero");
            return 0.0;
        }

        let output = self.proportional(error)
            + self.integrate(error, dt)
            + self.derivative_on_error(error, dt);

        self.prev_error = error;

        self.clamp_and_record(output)
    }

    fn proportional(&self, error: f64) -> f64 {
        if nearly_zero(self.kp) {
            return 0.0;
        }
        self.kp * error
    }

    fn integrate(&mut self, error: f64, dt: f64) -> f64 {
        if nearly_zero(self.ki) {
            // frozen, not cleared
            return self.integral;
        }

        // Gain applied at accumulation time: retuning ki mid-flight does
        // not rescale mass already accumulated.
        self.integral += self.ki * error * dt;

        // Anti-windup: the accumulator never leaves the output bounds.
        self.integral = self.clamp_output(self.integral);
        self.integral
    }

    /// Kick-prone form: differentiates the error signal.
    fn derivative_on_error(&self, error: f64, dt: f64) -> f64 {
        if dt < 0.0 || nearly_zero(dt) || nearly_zero(self.kd) {
            return 0.0;
        }
        self.kd * (error - self.prev_error) / dt
    }

    /// Kick-resistant form: d(error)/dt == -d(input)/dt when the setpoint
    /// holds, and the setpoint never appears in the term.
    fn derivative_on_measurement(&self, measured: f64, dt: f64) -> f64 {
        if dt < 0.0 || nearly_zero(dt) || nearly_zero(self.kd) {
            return 0.0;
        }
        -self.kd * (measured - self.prev_input) / dt
    }

    // Manual bounds check: f64::clamp panics when min > max, and flipped
    // bounds are explicitly the caller's problem here, not a panic.
    fn clamp_output(&self, value: f64) -> f64 {
        if value > self.output_max {
            self.output_max
        } else if value < self.output_min {
            self.output_min
        } else {
            value
        }
    }

    fn clamp_and_record(&mut self, output: f64) -> f64 {
        let clamped = self.clamp_output(output);
        self.prev_output = clamped;
        if self.avg_window > 1 {
            self.avg_buffer.push_back(clamped);
            self.avg_buffer.pop_front();
        }
        clamped
    }

    // -----------------------------------------------------------------------
    // Periodic ticking
    // -----------------------------------------------------------------------

    /// Bank `dt` toward the next control period and calculate when it
    /// elapses. Returns true if a calculation ran this call.
    ///
    /// With `period <= 0` every call calculates with the raw `dt`. A
    /// single `dt` larger than the period runs the law immediately over
    /// the full interval, at the degraded real rate; this may produce
    /// unstable results.
    pub fn tick(&mut self, setpoint: f64, measured: f64, dt: f64) -> bool {
        if self.period > 0.0 {
            if dt > self.period {
                trace!(
                    "tick interval {dt:.4}s exceeds control period {:.4}s; may produce unstable results",
                    self.period
                );
                // Caller stalled past a whole period: run at the real
                // (slower) rate rather than dropping time. Banking dt
                // against a capacity of dt leaves the accumulator as-is.
                accumulate(&mut self.tick_accum, dt, dt);
                self.update(setpoint, measured, dt);
                return true;
            }
            if accumulate(&mut self.tick_accum, dt, self.period) {
                self.update(setpoint, measured, self.period);
                return true;
            }
            return false;
        }

        // No period configured: calculate every call.
        self.update(setpoint, measured, dt);
        true
    }

    /// Error-input variant of [`tick`](Pid::tick); susceptible to
    /// derivative kick like [`update_from_error`](Pid::update_from_error).
    pub fn tick_from_error(&mut self, error: f64, dt: f64) -> bool {
        if self.period > 0.0 {
            if dt > self.period {
                trace!(
                    "tick interval {dt:.4}s exceeds control period {:.4}s; may produce unstable results",
                    self.period
                );
                accumulate(&mut self.tick_accum, dt, dt);
                self.update_from_error(error, dt);
                return true;
            }
            if accumulate(&mut self.tick_accum, dt, self.period) {
                self.update_from_error(error, self.period);
                return true;
            }
            return false;
        }

        self.update_from_error(error, dt);
        true
    }

    /// [`tick`](Pid::tick) gated on the enabled flag; a disabled
    /// controller banks nothing and returns false.
    pub fn tick_if_enabled(&mut self, setpoint: f64, measured: f64, dt: f64) -> bool {
        if self.enabled {
            return self.tick(setpoint, measured, dt);
        }
        false
    }

    pub fn tick_if_enabled_from_error(&mut self, error: f64, dt: f64) -> bool {
        if self.enabled {
            return self.tick_from_error(error, dt);
        }
        false
    }

    // -----------------------------------------------------------------------
    // Enable / disable
    // -----------------------------------------------------------------------

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the controller. Re-enabling (an actual
    /// false→true transition, not a repeated true) re-initializes
    /// transient state; `clear_integral` chooses whether the integral
    /// seed starts from zero or from the last output.
    pub fn set_enabled(&mut self, enabled: bool, clear_integral: bool) {
        if !self.enabled && enabled {
            self.initialize(clear_integral);
        }
        self.enabled = enabled;
    }

    fn initialize(&mut self, clear_integral: bool) {
        self.integral = if clear_integral { 0.0 } else { self.prev_output };
        self.integral = self.clamp_output(self.integral);

        // NOTE: reset() re-zeros the integral seeded above. Kept as-is:
        // re-enable transients of existing tunings depend on it.
        self.reset();
    }

    // -----------------------------------------------------------------------
    // Live reconfiguration
    // -----------------------------------------------------------------------

    /// Change the control period, rescaling `ki` and `kd` so the
    /// continuous-time gain response is preserved across the new
    /// discretization step. The rescale only applies when both the old
    /// and new periods are defined (> 0); the new period is stored
    /// regardless.
    pub fn set_period(&mut self, period: f64) {
        if period > 0.0
            && !nearly_zero(period)
            && self.period > 0.0
            && !nearly_zero(self.period)
        {
            let ratio = period / self.period;
            self.ki *= ratio;
            self.kd /= ratio;
        }

        self.period = period;
    }

    /// Resize the output averaging window. History is discarded; the
    /// window refills with zeros.
    pub fn set_averaging_window(&mut self, window: usize) {
        self.avg_window = window;
        self.reset_averaging_buffer();
    }

    fn reset_averaging_buffer(&mut self) {
        self.avg_buffer.clear();
        self.avg_buffer.resize(self.avg_window, 0.0);
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Last clamped output produced by either calculation path.
    pub fn last_output(&self) -> f64 {
        self.prev_output
    }

    /// Error used by the last calculation.
    pub fn last_error(&self) -> f64 {
        self.prev_error
    }

    /// Measured value from the last setpoint-style calculation. Only
    /// meaningful on that path; raw-error calculations never update it.
    pub fn last_input(&self) -> f64 {
        self.prev_input
    }

    pub fn integral_accumulation(&self) -> f64 {
        self.integral
    }

    pub fn averaging_window(&self) -> usize {
        self.avg_window
    }

    /// Mean of the last `averaging_window` outputs, or the last output
    /// directly when the window is 1 (or unset).
    pub fn average_output(&self) -> f64 {
        if self.avg_window <= 1 {
            return self.prev_output;
        }

        let sum: f64 = self.avg_buffer.iter().take(self.avg_window).sum();
        sum / self.avg_window as f64
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct PidBuilder {
    kp: f64,
    ki: f64,
    kd: f64,
    output_max: f64,
    output_min: f64,
    period: f64,
    averaging_window: usize,
}

impl PidBuilder {
    pub fn new() -> Self {
        let d = Pid::default();
        Self {
            kp: d.kp,
            ki: d.ki,
            kd: d.kd,
            output_max: d.output_max,
            output_min: d.output_min,
            period: d.period,
            averaging_window: d.avg_window,
        }
    }

    pub fn kp(mut self, v: f64) -> Self { self.kp = v; self }
    pub fn ki(mut self, v: f64) -> Self { self.ki = v; self }
    pub fn kd(mut self, v: f64) -> Self { self.kd = v; self }
    pub fn output_max(mut self, v: f64) -> Self { self.output_max = v; self }
    pub fn output_min(mut self, v: f64) -> Self { self.output_min = v; self }
    pub fn period(mut self, v: f64) -> Self { self.period = v; self }
    pub fn averaging_window(mut self, v: usize) -> Self { self.averaging_window = v; self }

    pub fn build(self) -> Pid {
        let mut pid = Pid::new(
            self.kp,
            self.ki,
            self.kd,
            self.output_max,
            self.output_min,
            self.period,
        );
        pid.set_averaging_window(self.averaging_window);
        pid
    }
}

impl Default for PidBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
