use crate::error::{Error, Result};
use crate::generator::EmitFn;
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, BusType, EventType, InputEvent, InputId, Key, RelativeAxisType};
use std::cell::RefCell;
use std::io;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputAxis {
    PointerX,
    PointerY,
    ScrollX,
    ScrollY,
}

impl OutputAxis {
    fn rel(self) -> RelativeAxisType {
        match self {
            OutputAxis::PointerX => RelativeAxisType::REL_X,
            OutputAxis::PointerY => RelativeAxisType::REL_Y,
            OutputAxis::ScrollX => RelativeAxisType::REL_HWHEEL_HI_RES,
            OutputAxis::ScrollY => RelativeAxisType::REL_WHEEL_HI_RES,
        }
    }
}

/// Destination for relative motion. Writes become visible as one frame on `sync`.
pub trait OutputSink {
    fn write(&mut self, axis: OutputAxis, delta: i32) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

/// Generator callback writing `(dx, dy)` onto two axes of a shared sink,
/// followed by exactly one sync.
pub fn frame_emitter<S: OutputSink + 'static>(
    sink: Rc<RefCell<S>>,
    x_axis: OutputAxis,
    y_axis: OutputAxis,
) -> EmitFn {
    Box::new(move |dx, dy| {
        let mut sink = sink.borrow_mut();
        if dx != 0 {
            sink.write(x_axis, dx)?;
        }
        if dy != 0 {
            sink.write(y_axis, dy)?;
        }
        sink.sync()
    })
}

/// Relative events waiting for the next sync. Carries no SYN of its own.
#[derive(Debug, Default)]
struct FrameBatch(Vec<InputEvent>);

impl FrameBatch {
    fn push(&mut self, axis: OutputAxis, delta: i32) {
        self.0
            .push(InputEvent::new(EventType::RELATIVE, axis.rel().0, delta));
    }

    fn events(&self) -> &[InputEvent] {
        &self.0
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

pub struct VirtualMouse {
    device: VirtualDevice,
    pending: FrameBatch,
}

impl VirtualMouse {
    pub fn new() -> Result<Self> {
        Self::build().map_err(Error::VirtualDevice)
    }

    fn build() -> io::Result<Self> {
        // Relative axes are ignored by some consumers unless the device
        // also reports at least one button.
        let mut keys = AttributeSet::<Key>::new();
        keys.insert(Key::BTN_LEFT);
        keys.insert(Key::BTN_RIGHT);
        keys.insert(Key::BTN_MIDDLE);

        let mut axes = AttributeSet::<RelativeAxisType>::new();
        for axis in [
            OutputAxis::PointerX,
            OutputAxis::PointerY,
            OutputAxis::ScrollX,
            OutputAxis::ScrollY,
        ] {
            axes.insert(axis.rel());
        }

        let device = VirtualDeviceBuilder::new()?
            .name("stickmouse Pointer")
            .input_id(InputId::new(BusType::BUS_VIRTUAL, 0x1234, 0x5679, 1))
            .with_keys(&keys)?
            .with_relative_axes(&axes)?
            .build()?;

        log::info!("Created virtual mouse");

        Ok(Self {
            device,
            pending: FrameBatch::default(),
        })
    }
}

impl OutputSink for VirtualMouse {
    fn write(&mut self, axis: OutputAxis, delta: i32) -> io::Result<()> {
        self.pending.push(axis, delta);
        Ok(())
    }

    /// `emit` terminates the batch with SYN_REPORT.
    fn sync(&mut self) -> io::Result<()> {
        let result = self.device.emit(self.pending.events());
        self.pending.clear();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        ops: Vec<Option<(OutputAxis, i32)>>,
        fail_sync: bool,
    }

    impl OutputSink for Recorder {
        fn write(&mut self, axis: OutputAxis, delta: i32) -> io::Result<()> {
            self.ops.push(Some((axis, delta)));
            Ok(())
        }

        fn sync(&mut self) -> io::Result<()> {
            if self.fail_sync {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            self.ops.push(None);
            Ok(())
        }
    }

    #[test]
    fn frame_pairs_both_axes_with_one_sync() {
        let sink = Rc::new(RefCell::new(Recorder::default()));
        let mut emit = frame_emitter(Rc::clone(&sink), OutputAxis::PointerX, OutputAxis::PointerY);
        emit(1, -1).unwrap();
        assert_eq!(
            sink.borrow().ops,
            vec![
                Some((OutputAxis::PointerX, 1)),
                Some((OutputAxis::PointerY, -1)),
                None
            ]
        );
    }

    #[test]
    fn zero_component_is_not_written() {
        let sink = Rc::new(RefCell::new(Recorder::default()));
        let mut emit = frame_emitter(Rc::clone(&sink), OutputAxis::ScrollX, OutputAxis::ScrollY);
        emit(0, 1).unwrap();
        emit(-1, 0).unwrap();
        assert_eq!(
            sink.borrow().ops,
            vec![
                Some((OutputAxis::ScrollY, 1)),
                None,
                Some((OutputAxis::ScrollX, -1)),
                None
            ]
        );
    }

    #[test]
    fn sync_failure_propagates() {
        let sink = Rc::new(RefCell::new(Recorder {
            fail_sync: true,
            ..Recorder::default()
        }));
        let mut emit = frame_emitter(sink, OutputAxis::PointerX, OutputAxis::PointerY);
        assert_eq!(emit(1, 0).unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn batch_holds_only_motion_events() {
        let mut batch = FrameBatch::default();
        batch.push(OutputAxis::PointerX, 1);
        batch.push(OutputAxis::ScrollY, -1);

        let events = batch.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.event_type() == EventType::RELATIVE));
        assert_eq!(events[0].code(), RelativeAxisType::REL_X.0);
        assert_eq!(events[1].code(), RelativeAxisType::REL_WHEEL_HI_RES.0);
        assert_eq!(events[1].value(), -1);

        batch.clear();
        assert!(batch.events().is_empty());
    }

    #[test]
    fn scroll_uses_high_resolution_wheel() {
        assert_eq!(OutputAxis::ScrollY.rel(), RelativeAxisType::REL_WHEEL_HI_RES);
        assert_eq!(OutputAxis::ScrollX.rel(), RelativeAxisType::REL_HWHEEL_HI_RES);
    }
}
