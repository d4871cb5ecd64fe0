use crate::axis::MotionProfile;
use crate::error::{Error, Result};
use clap::Parser;
use std::time::Duration;

/// Linux gamepad-stick-to-mouse injector (evdev/uinput).
/// Left stick drives the pointer, right stick drives the scroll wheel.
#[derive(Parser, Debug)]
#[command(name = "stickmouse")]
pub struct Config {
    /// Input device path or event number (repeatable). Prompts when omitted.
    #[arg(short, long)]
    pub device: Vec<String>,

    /// List input devices and exit
    #[arg(short, long, default_value_t = false)]
    pub list: bool,

    /// Grab input devices exclusively while active
    #[arg(long, default_value_t = false)]
    pub grab: bool,

    /// Scheduler tick in milliseconds (one time unit)
    #[arg(long, default_value_t = 1.0)]
    pub tick_ms: f64,

    /// Pointer step interval at full deflection, in ticks
    #[arg(long, default_value_t = 9.0)]
    pub pointer_min: f64,

    /// Pointer step interval near center, in ticks
    #[arg(long, default_value_t = 21.0)]
    pub pointer_max: f64,

    /// Scroll step interval at full deflection, in ticks
    #[arg(long, default_value_t = 40.0)]
    pub scroll_min: f64,

    /// Scroll step interval near center, in ticks
    #[arg(long, default_value_t = 160.0)]
    pub scroll_max: f64,

    /// Verbose logging (unknown events, scheduler lag)
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

/// Checked runtime settings derived from the command line.
#[derive(Debug, Clone, Copy)]
pub struct MotionSettings {
    pub tick: Duration,
    /// Tick length in generator time units (milliseconds).
    pub tick_units: f64,
    pub pointer: MotionProfile,
    pub scroll: MotionProfile,
}

impl Config {
    pub fn validate(&self) -> Result<MotionSettings> {
        if !self.tick_ms.is_finite() || self.tick_ms <= 0.0 {
            return Err(Error::InvalidTick(self.tick_ms));
        }
        let tick = Duration::from_nanos((self.tick_ms * 1e6).round() as u64);
        if tick.is_zero() {
            return Err(Error::InvalidTick(self.tick_ms));
        }
        // Profiles are in ticks on the command line, generators run in ms.
        let pointer = MotionProfile::new(
            "pointer",
            self.pointer_min * self.tick_ms,
            self.pointer_max * self.tick_ms,
        )?;
        let scroll = MotionProfile::new(
            "scroll",
            self.scroll_min * self.tick_ms,
            self.scroll_max * self.tick_ms,
        )?;
        Ok(MotionSettings {
            tick,
            tick_units: self.tick_ms,
            pointer,
            scroll,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_builtin_profiles() {
        let config = Config::parse_from(["stickmouse"]);
        let settings = config.validate().unwrap();
        assert_eq!(settings.tick, Duration::from_millis(1));
        assert_eq!(settings.tick_units, 1.0);
        assert_eq!(settings.pointer, MotionProfile::POINTER);
        assert_eq!(settings.scroll, MotionProfile::SCROLL);
        assert!(config.device.is_empty());
    }

    #[test]
    fn profiles_scale_with_tick() {
        let config = Config::parse_from(["stickmouse", "--tick-ms", "0.5"]);
        let settings = config.validate().unwrap();
        assert_eq!(settings.tick, Duration::from_micros(500));
        assert_eq!(settings.pointer.min_interval(), 4.5);
        assert_eq!(settings.scroll.max_interval(), 80.0);
    }

    #[test]
    fn repeated_devices() {
        let config = Config::parse_from(["stickmouse", "-d", "3", "--device", "/dev/input/event4"]);
        assert_eq!(config.device, vec!["3", "/dev/input/event4"]);
    }

    #[test]
    fn rejects_bad_tick_and_inverted_profile() {
        let config = Config::parse_from(["stickmouse", "--tick-ms", "0"]);
        assert!(matches!(config.validate(), Err(Error::InvalidTick(_))));

        // rounds to zero nanoseconds
        let config = Config::parse_from(["stickmouse", "--tick-ms", "0.0000004"]);
        assert!(matches!(config.validate(), Err(Error::InvalidTick(_))));

        let config = Config::parse_from(["stickmouse", "--scroll-min", "200"]);
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidProfile { name: "scroll", .. })
        ));
    }
}
