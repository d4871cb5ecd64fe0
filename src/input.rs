use crate::axis::Deflection;
use crate::error::{Error, Result};
use evdev::{AbsoluteAxisType, Device, EventType};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

/// Raw stick values are centered on this.
const STICK_CENTER: i32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisTarget {
    PointerX,
    PointerY,
    ScrollX,
    ScrollY,
}

impl AxisTarget {
    const ALL: [AxisTarget; 4] = [
        AxisTarget::PointerX,
        AxisTarget::PointerY,
        AxisTarget::ScrollX,
        AxisTarget::ScrollY,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// What one device last stored into each shared binding.
#[derive(Debug, Default, Clone, Copy)]
pub struct LastWritten([i32; 4]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Type, code and value all zero: frame boundary, nothing to do.
    Sync,
    Axis(AxisTarget, i32),
    Unsupported,
}

/// Map one raw event onto a deflection update.
/// Vertical axes are inverted relative to horizontal ones.
pub fn map_event(kind: u16, code: u16, value: i32) -> Ingest {
    if kind == 0 && code == 0 && value == 0 {
        return Ingest::Sync;
    }
    if kind != EventType::ABSOLUTE.0 {
        return Ingest::Unsupported;
    }

    match AbsoluteAxisType(code) {
        AbsoluteAxisType::ABS_X => Ingest::Axis(AxisTarget::PointerX, value - STICK_CENTER),
        AbsoluteAxisType::ABS_Y => Ingest::Axis(AxisTarget::PointerY, STICK_CENTER - value),
        AbsoluteAxisType::ABS_RX => Ingest::Axis(AxisTarget::ScrollX, value - STICK_CENTER),
        AbsoluteAxisType::ABS_RY => Ingest::Axis(AxisTarget::ScrollY, STICK_CENTER - value),
        _ => Ingest::Unsupported,
    }
}

/// Deflection handles an input device writes into.
#[derive(Debug, Clone)]
pub struct AxisBindings {
    pub pointer_x: Deflection,
    pub pointer_y: Deflection,
    pub scroll_x: Deflection,
    pub scroll_y: Deflection,
}

impl AxisBindings {
    fn cell(&self, target: AxisTarget) -> &Deflection {
        match target {
            AxisTarget::PointerX => &self.pointer_x,
            AxisTarget::PointerY => &self.pointer_y,
            AxisTarget::ScrollX => &self.scroll_x,
            AxisTarget::ScrollY => &self.scroll_y,
        }
    }

    pub fn apply(&self, target: AxisTarget, value: i32, last: &mut LastWritten) {
        last.0[target.index()] = self.cell(target).set(value);
    }

    /// Center the axes a departing device still owns. Values another
    /// device wrote since are left alone.
    pub fn release(&self, last: &LastWritten) {
        for target in AxisTarget::ALL {
            self.cell(target).clear_if(last.0[target.index()]);
        }
    }

    pub fn center(&self) {
        for cell in [&self.pointer_x, &self.pointer_y, &self.scroll_x, &self.scroll_y] {
            cell.set(0);
        }
    }
}

pub struct InputReader {
    device: Device,
    path: PathBuf,
    bindings: AxisBindings,
    last: LastWritten,
    grab: bool,
    grabbed: bool,
    paused: bool,
}

impl InputReader {
    pub fn open(path: &Path, bindings: AxisBindings, grab: bool) -> Result<Self> {
        let device = Device::open(path).map_err(|source| Error::DeviceOpen {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!(
            "Opened input device: {} ({})",
            device.name().unwrap_or("unknown"),
            path.display()
        );

        let mut reader = Self {
            device,
            path: path.to_path_buf(),
            bindings,
            last: LastWritten::default(),
            grab,
            grabbed: false,
            paused: false,
        };
        reader.set_grabbed(grab);
        Ok(reader)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn set_grabbed(&mut self, want: bool) {
        if want == self.grabbed {
            return;
        }
        let result = if want {
            self.device.grab()
        } else {
            self.device.ungrab()
        };
        match result {
            Ok(()) => self.grabbed = want,
            Err(e) => log::warn!(
                "Failed to {} {}: {}",
                if want { "grab" } else { "ungrab" },
                self.path.display(),
                e
            ),
        }
    }

    /// Pick up the process-wide pause toggle (SIGUSR1 via `stickmouse toggle`).
    fn sync_pause(&mut self) {
        let paused = crate::PAUSED.load(Ordering::SeqCst);
        if paused == self.paused {
            return;
        }
        self.paused = paused;
        if paused {
            self.bindings.center();
            self.set_grabbed(false);
            log::info!("Paused {}", self.path.display());
        } else {
            self.set_grabbed(self.grab);
            log::info!("Resumed {}", self.path.display());
        }
    }

    /// Run the blocking event loop. Call from a dedicated thread.
    pub fn run(&mut self) {
        loop {
            if crate::QUIT.load(Ordering::SeqCst) {
                break;
            }
            self.sync_pause();

            let events: Vec<_> = match self.device.fetch_events() {
                Ok(iter) => iter.collect(),
                Err(e) => {
                    // Signals interrupt the blocking read; loop back to
                    // observe QUIT/PAUSED.
                    if e.kind() == std::io::ErrorKind::Interrupted {
                        continue;
                    }
                    if e.raw_os_error() == Some(libc::ENODEV) {
                        log::error!("Input device {} disconnected", self.path.display());
                        self.bindings.release(&self.last);
                        return;
                    }
                    log::error!("Error reading {}: {}", self.path.display(), e);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                    continue;
                }
            };

            self.sync_pause();
            if self.paused {
                continue;
            }

            for ev in &events {
                match map_event(ev.event_type().0, ev.code(), ev.value()) {
                    Ingest::Axis(target, value) => {
                        self.bindings.apply(target, value, &mut self.last)
                    }
                    Ingest::Sync => {}
                    Ingest::Unsupported => log::debug!(
                        "{}: ignoring event type {} code {} value {}",
                        self.path.display(),
                        ev.event_type().0,
                        ev.code(),
                        ev.value()
                    ),
                }
            }
        }

        self.set_grabbed(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABS: u16 = EventType::ABSOLUTE.0;

    fn bindings() -> AxisBindings {
        AxisBindings {
            pointer_x: Deflection::new(),
            pointer_y: Deflection::new(),
            scroll_x: Deflection::new(),
            scroll_y: Deflection::new(),
        }
    }

    #[test]
    fn horizontal_axes_are_offset_from_center() {
        assert_eq!(
            map_event(ABS, AbsoluteAxisType::ABS_X.0, 255),
            Ingest::Axis(AxisTarget::PointerX, 127)
        );
        assert_eq!(
            map_event(ABS, AbsoluteAxisType::ABS_RX.0, 0),
            Ingest::Axis(AxisTarget::ScrollX, -128)
        );
    }

    #[test]
    fn vertical_axes_are_inverted() {
        assert_eq!(
            map_event(ABS, AbsoluteAxisType::ABS_Y.0, 0),
            Ingest::Axis(AxisTarget::PointerY, 128)
        );
        assert_eq!(
            map_event(ABS, AbsoluteAxisType::ABS_RY.0, 200),
            Ingest::Axis(AxisTarget::ScrollY, -72)
        );
        assert_eq!(
            map_event(ABS, AbsoluteAxisType::ABS_RY.0, 128),
            Ingest::Axis(AxisTarget::ScrollY, 0)
        );
    }

    #[test]
    fn all_zero_event_is_a_sync_marker() {
        assert_eq!(map_event(0, 0, 0), Ingest::Sync);
        // SYN_DROPPED and friends are not markers
        assert_eq!(map_event(0, 3, 0), Ingest::Unsupported);
    }

    #[test]
    fn unknown_codes_and_types_are_unsupported() {
        assert_eq!(map_event(ABS, AbsoluteAxisType::ABS_HAT0X.0, 1), Ingest::Unsupported);
        assert_eq!(map_event(EventType::KEY.0, 0x130, 1), Ingest::Unsupported);
        // ABS_X code under a non-absolute type
        assert_eq!(map_event(EventType::RELATIVE.0, 0, 5), Ingest::Unsupported);
    }

    #[test]
    fn bindings_route_and_clamp() {
        let b = bindings();
        let mut last = LastWritten::default();
        if let Ingest::Axis(target, value) = map_event(ABS, AbsoluteAxisType::ABS_Y.0, 0) {
            b.apply(target, value, &mut last);
        }
        b.apply(AxisTarget::ScrollX, -20, &mut last);
        assert_eq!(b.pointer_y.get(), 127);
        assert_eq!(b.scroll_x.get(), -20);
        assert_eq!(b.pointer_x.get(), 0);

        b.center();
        assert_eq!(b.pointer_y.get(), 0);
        assert_eq!(b.scroll_x.get(), 0);
    }

    #[test]
    fn unplugged_device_releases_only_its_own_axes() {
        let b = bindings();
        let mut pad_a = LastWritten::default();
        let mut pad_b = LastWritten::default();

        b.apply(AxisTarget::PointerX, 50, &mut pad_a);
        b.apply(AxisTarget::ScrollY, 200, &mut pad_a);
        b.apply(AxisTarget::PointerY, -20, &mut pad_b);
        // pad B takes over scroll after pad A
        b.apply(AxisTarget::ScrollY, 30, &mut pad_b);

        b.release(&pad_a);
        assert_eq!(b.pointer_x.get(), 0);
        assert_eq!(b.pointer_y.get(), -20);
        assert_eq!(b.scroll_y.get(), 30);
    }
}
