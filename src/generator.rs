use crate::axis::{AxisChannel, Deflection, MotionProfile};
use crate::error::{Error, Result};
use crate::scheduler::Tick;
use std::io;

/// Receives one combined `(dx, dy)` frame per tick that moved.
pub type EmitFn = Box<dyn FnMut(i32, i32) -> io::Result<()>>;

/// Two axis channels sharing one profile, emitting combined motion frames.
pub struct MotionGenerator {
    name: &'static str,
    profile: MotionProfile,
    tick: f64,
    x: AxisChannel,
    y: AxisChannel,
    emit: EmitFn,
}

impl MotionGenerator {
    pub fn new(name: &'static str, profile: MotionProfile, tick: f64, emit: EmitFn) -> Self {
        Self {
            name,
            profile,
            tick,
            x: AxisChannel::new(profile),
            y: AxisChannel::new(profile),
            emit,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn profile(&self) -> MotionProfile {
        self.profile
    }

    #[cfg(test)]
    pub fn x(&self) -> &AxisChannel {
        &self.x
    }

    #[cfg(test)]
    pub fn y(&self) -> &AxisChannel {
        &self.y
    }

    /// Deflection handles for the (x, y) channels.
    pub fn handles(&self) -> (Deflection, Deflection) {
        (self.x.handle(), self.y.handle())
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }
}

impl Tick for MotionGenerator {
    fn tick(&mut self) -> Result<()> {
        let dx = self.x.evaluate(self.tick);
        let dy = self.y.evaluate(self.tick);
        if dx == 0 && dy == 0 {
            return Ok(());
        }

        log::trace!("{}: step ({:+}, {:+})", self.name, dx, dy);
        (self.emit)(dx, dy).map_err(|source| Error::Output {
            generator: self.name,
            source,
        })
    }

    fn reset(&mut self) {
        MotionGenerator::reset(self);
    }
}
