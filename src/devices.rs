use crate::error::{Error, Result};
use std::io::BufRead;
use std::path::PathBuf;

const EVENT_DIR: &str = "/dev/input";

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub name: String,
    pub phys: String,
}

/// All readable event devices, sorted by path.
pub fn list_devices() -> Vec<DeviceInfo> {
    let mut devices: Vec<DeviceInfo> = evdev::enumerate()
        .map(|(path, device)| DeviceInfo {
            path,
            name: device.name().unwrap_or("unknown").to_string(),
            phys: device.physical_path().unwrap_or("-").to_string(),
        })
        .collect();
    devices.sort_by_key(|d| event_number(&d.path).unwrap_or(u32::MAX));
    devices
}

fn event_number(path: &std::path::Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("event")?
        .parse()
        .ok()
}

pub fn print_devices(devices: &[DeviceInfo]) {
    for d in devices {
        println!("{}  {}  {}", d.path.display(), d.name, d.phys);
    }
}

/// Accepts a device path or a bare event number (`5` -> `/dev/input/event5`).
pub fn resolve_device(arg: &str) -> Result<PathBuf> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Err(Error::InvalidSelection(arg.to_string()));
    }
    if arg.contains('/') {
        return Ok(PathBuf::from(arg));
    }
    arg.parse::<u32>()
        .map(|n| PathBuf::from(format!("{}/event{}", EVENT_DIR, n)))
        .map_err(|_| Error::InvalidSelection(arg.to_string()))
}

/// Parse a whitespace-separated line of event numbers.
pub fn parse_selection(line: &str) -> Result<Vec<PathBuf>> {
    let paths = line
        .split_whitespace()
        .map(resolve_device)
        .collect::<Result<Vec<_>>>()?;
    if paths.is_empty() {
        return Err(Error::NoDevices);
    }
    Ok(paths)
}

/// Print the available devices and read the selection from `input`.
pub fn prompt_selection(input: &mut impl BufRead) -> Result<Vec<PathBuf>> {
    let devices = list_devices();
    if devices.is_empty() {
        log::warn!("No readable input devices. Are you in the 'input' group?");
    }
    print_devices(&devices);
    println!("Select devices (event numbers, space separated):");

    let mut line = String::new();
    input.read_line(&mut line).map_err(Error::Stdin)?;
    parse_selection(&line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn bare_numbers_become_event_paths() {
        assert_eq!(resolve_device("5").unwrap(), Path::new("/dev/input/event5"));
        assert_eq!(
            resolve_device("/dev/input/by-id/usb-pad-event-joystick").unwrap(),
            Path::new("/dev/input/by-id/usb-pad-event-joystick")
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(resolve_device("pad"), Err(Error::InvalidSelection(_))));
        assert!(matches!(resolve_device("-3"), Err(Error::InvalidSelection(_))));
    }

    #[test]
    fn selection_line() {
        let paths = parse_selection(" 3 17\n").unwrap();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/dev/input/event3"),
                PathBuf::from("/dev/input/event17")
            ]
        );
        assert!(matches!(parse_selection("\n"), Err(Error::NoDevices)));
        assert!(matches!(parse_selection("3 x"), Err(Error::InvalidSelection(_))));
    }

    #[test]
    fn event_numbers_sort_numerically() {
        assert_eq!(event_number(Path::new("/dev/input/event12")), Some(12));
        assert_eq!(event_number(Path::new("/dev/input/mice")), None);
    }
}
