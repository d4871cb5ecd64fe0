use crate::error::{Error, Result};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

pub const DEFLECTION_MIN: i32 = -128;
pub const DEFLECTION_MAX: i32 = 127;

/// Deflection magnitude at which the interval reaches zero.
const FULL_SCALE: f64 = 128.0;

/// Acceleration curve of one channel, in time units (1 unit = 1 ms by default).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionProfile {
    min_interval: f64,
    max_interval: f64,
}

impl MotionProfile {
    pub const POINTER: MotionProfile = MotionProfile {
        min_interval: 9.0,
        max_interval: 21.0,
    };

    pub const SCROLL: MotionProfile = MotionProfile {
        min_interval: 40.0,
        max_interval: 160.0,
    };

    pub fn new(name: &'static str, min_interval: f64, max_interval: f64) -> Result<Self> {
        let valid = min_interval.is_finite()
            && max_interval.is_finite()
            && min_interval >= 0.0
            && min_interval <= max_interval;
        if !valid {
            return Err(Error::InvalidProfile {
                name,
                min: min_interval,
                max: max_interval,
            });
        }
        Ok(Self {
            min_interval,
            max_interval,
        })
    }

    pub fn min_interval(&self) -> f64 {
        self.min_interval
    }

    pub fn max_interval(&self) -> f64 {
        self.max_interval
    }

    pub fn range(&self) -> f64 {
        self.max_interval - self.min_interval
    }

    pub fn slope(&self) -> f64 {
        self.range() / FULL_SCALE
    }

    /// Time until the next step at deflection `d`. Zero at full deflection.
    pub fn interval(&self, d: i32) -> f64 {
        self.range() - self.slope() * f64::from(d.unsigned_abs())
    }
}

/// Shared deflection cell. Written by input readers, read by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct Deflection(Arc<AtomicI32>);

impl Deflection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value wins; out-of-range samples are clamped. Returns the stored value.
    pub fn set(&self, value: i32) -> i32 {
        let value = value.clamp(DEFLECTION_MIN, DEFLECTION_MAX);
        self.0.store(value, Ordering::SeqCst);
        value
    }

    /// Center only if the cell still holds `expected`.
    pub fn clear_if(&self, expected: i32) {
        if expected != 0 {
            let _ = self
                .0
                .compare_exchange(expected, 0, Ordering::SeqCst, Ordering::SeqCst);
        }
    }

    pub fn get(&self) -> i32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// One axis of motion: a deflection sample plus a countdown to the next step.
#[derive(Debug)]
pub struct AxisChannel {
    profile: MotionProfile,
    deflection: Deflection,
    timer: f64,
}

impl AxisChannel {
    pub fn new(profile: MotionProfile) -> Self {
        let mut channel = Self {
            profile,
            deflection: Deflection::new(),
            timer: 0.0,
        };
        channel.reset();
        channel
    }

    /// Handle for the ingestion side to write this channel's deflection.
    pub fn handle(&self) -> Deflection {
        self.deflection.clone()
    }

    pub fn set_deflection(&self, value: i32) {
        self.deflection.set(value);
    }

    #[cfg(test)]
    pub fn deflection(&self) -> i32 {
        self.deflection.get()
    }

    #[cfg(test)]
    pub fn timer(&self) -> f64 {
        self.timer
    }

    pub fn reset(&mut self) {
        self.set_deflection(0);
        self.timer = self.profile.min_interval;
    }

    /// Advance by one tick. Returns the step for this tick: -1, 0 or +1.
    pub fn evaluate(&mut self, tick: f64) -> i32 {
        self.timer -= tick;
        if self.timer > 0.0 {
            return 0;
        }

        let deflection = self.deflection.get();
        if deflection != 0 {
            self.timer = self.profile.interval(deflection);
            deflection.signum()
        } else {
            // Idle re-poll runs at the fastest active cadence.
            self.timer = self.profile.min_interval;
            0
        }
    }
}
