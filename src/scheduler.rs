use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Something the scheduler advances once per tick.
pub trait Tick {
    fn tick(&mut self) -> Result<()>;

    /// Drop in-flight motion state. Called when the pause toggle flips.
    fn reset(&mut self) {}
}

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep_until(&self, deadline: Instant);
}

/// Wall clock using spin_sleep for sub-millisecond wake-ups.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinClock;

impl Clock for SpinClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            spin_sleep::sleep(remaining);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Drives generators at a fixed rate. Every deadline is computed from the
/// start instant and the tick index, so per-tick overhead never accumulates.
pub struct MotionScheduler<C: Clock> {
    clock: C,
    tick: Duration,
    generators: Vec<Box<dyn Tick>>,
    pause: Option<&'static AtomicBool>,
    paused: bool,
    state: SchedulerState,
    tick_count: u64,
    late_ticks: u64,
}

impl<C: Clock> MotionScheduler<C> {
    pub fn new(clock: C, tick: Duration) -> Self {
        Self {
            clock,
            tick,
            generators: Vec::new(),
            pause: None,
            paused: false,
            state: SchedulerState::Idle,
            tick_count: 0,
            late_ticks: 0,
        }
    }

    /// Generators tick in registration order.
    pub fn register(&mut self, generator: Box<dyn Tick>) {
        self.generators.push(generator);
    }

    /// While `flag` is set generators are not ticked; every flip resets them.
    pub fn pause_with(&mut self, flag: &'static AtomicBool) {
        self.pause = Some(flag);
    }

    #[cfg(test)]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Iterations that found their deadline already passed.
    pub fn late_ticks(&self) -> u64 {
        self.late_ticks
    }

    fn deadline(&self, t0: Instant, index: u64) -> Instant {
        let nanos = u64::try_from(self.tick.as_nanos()).unwrap_or(u64::MAX);
        t0 + Duration::from_nanos(nanos.saturating_mul(index))
    }

    /// Run until `stop` is set or a generator fails. A failed generator stops
    /// the scheduler for good; its error is returned to the caller.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        if self.state != SchedulerState::Idle {
            return Err(Error::SchedulerStopped);
        }

        let t0 = self.clock.now();
        self.tick_count = 0;
        self.state = SchedulerState::Running;
        log::debug!(
            "Scheduler running: {} generator(s), tick {:?}",
            self.generators.len(),
            self.tick
        );

        let result = self.run_loop(t0, stop);
        self.state = SchedulerState::Stopped;
        result
    }

    fn run_loop(&mut self, t0: Instant, stop: &AtomicBool) -> Result<()> {
        let tick_nanos = self.tick.as_nanos().max(1);

        while !stop.load(Ordering::SeqCst) {
            let paused = self.pause.is_some_and(|flag| flag.load(Ordering::SeqCst));
            if paused != self.paused {
                self.paused = paused;
                log::info!("Motion {}", if paused { "paused" } else { "resumed" });
                for generator in &mut self.generators {
                    generator.reset();
                }
            }

            if !paused {
                for generator in &mut self.generators {
                    generator.tick()?;
                }
            }

            self.tick_count += 1;
            let deadline = self.deadline(t0, self.tick_count);
            let now = self.clock.now();
            if deadline > now {
                self.clock.sleep_until(deadline);
                continue;
            }

            // Late: run the next tick immediately, but drop whole slots we
            // fell behind so the loop never bursts to catch up.
            self.late_ticks += 1;
            let missed = (now - deadline).as_nanos() / tick_nanos;
            if missed > 0 {
                let missed = u64::try_from(missed).unwrap_or(u64::MAX);
                log::debug!("Scheduler fell {} tick(s) behind, skipping", missed);
                self.tick_count = self.tick_count.saturating_add(missed);
            }
        }

        Ok(())
    }
}
