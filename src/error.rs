use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open input device {}: {source}", path.display())]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create virtual mouse: {0}")]
    VirtualDevice(#[source] io::Error),

    /// The output sink rejected a motion frame. Fatal for the scheduler.
    #[error("{generator} output failed: {source}")]
    Output {
        generator: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("invalid {name} profile: min interval {min} / max interval {max}")]
    InvalidProfile {
        name: &'static str,
        min: f64,
        max: f64,
    },

    #[error("invalid tick duration: {0} ms")]
    InvalidTick(f64),

    #[error("invalid device selection: {0:?}")]
    InvalidSelection(String),

    #[error("no input devices selected")]
    NoDevices,

    #[error("failed to spawn input reader: {0}")]
    Thread(#[source] io::Error),

    #[error("failed to read device selection: {0}")]
    Stdin(#[source] io::Error),

    #[error("scheduler has already stopped")]
    SchedulerStopped,
}

pub type Result<T> = std::result::Result<T, Error>;
