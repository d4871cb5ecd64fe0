mod axis;
mod config;
mod devices;
mod error;
mod generator;
mod input;
mod scheduler;
mod virtual_mouse;

use clap::Parser;
use config::Config;
use error::{Error, Result};
use generator::MotionGenerator;
use input::{AxisBindings, InputReader};
use scheduler::{MotionScheduler, SpinClock};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use virtual_mouse::{frame_emitter, OutputAxis, VirtualMouse};

pub(crate) static QUIT: AtomicBool = AtomicBool::new(false);
pub(crate) static PAUSED: AtomicBool = AtomicBool::new(false);

fn main() {
    // Handle "stickmouse toggle" / "stickmouse quit" before clap parsing.
    // These send a signal to the running instance and exit immediately.
    if let Some(cmd) = std::env::args().nth(1) {
        match cmd.as_str() {
            "toggle" => {
                send_to_running(libc::SIGUSR1, "Toggle");
                return;
            }
            "quit" => {
                send_to_running(libc::SIGTERM, "Quit");
                return;
            }
            _ => {}
        }
    }

    let config = Config::parse();

    let default_filter = if config.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run(&config) {
        log::error!("{}", e);
        if let Error::VirtualDevice(_) = e {
            log::error!("Do you have /dev/uinput access? Try: sudo modprobe uinput");
        }
        if let Error::DeviceOpen { .. } = e {
            log::error!("Try: sudo usermod -aG input $USER (then re-login)");
        }
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<()> {
    let settings = config.validate()?;

    if config.list {
        devices::print_devices(&devices::list_devices());
        return Ok(());
    }

    let paths = if config.device.is_empty() {
        devices::prompt_selection(&mut std::io::stdin().lock())?
    } else {
        config
            .device
            .iter()
            .map(|d| devices::resolve_device(d))
            .collect::<Result<Vec<_>>>()?
    };

    println!("stickmouse - gamepad sticks to pointer and scroll");
    println!("  Tick:    {} ms", settings.tick_units);
    println!("  Grab:    {}", config.grab);
    println!();

    signal_setup();

    let mouse = Rc::new(RefCell::new(VirtualMouse::new()?));
    let pointer = MotionGenerator::new(
        "pointer",
        settings.pointer,
        settings.tick_units,
        frame_emitter(Rc::clone(&mouse), OutputAxis::PointerX, OutputAxis::PointerY),
    );
    let scroll = MotionGenerator::new(
        "scroll",
        settings.scroll,
        settings.tick_units,
        frame_emitter(Rc::clone(&mouse), OutputAxis::ScrollX, OutputAxis::ScrollY),
    );

    for generator in [&pointer, &scroll] {
        let profile = generator.profile();
        log::info!(
            "{} interval {}..{} ms",
            generator.name(),
            profile.min_interval(),
            profile.max_interval()
        );
    }

    let (pointer_x, pointer_y) = pointer.handles();
    let (scroll_x, scroll_y) = scroll.handles();
    let bindings = AxisBindings {
        pointer_x,
        pointer_y,
        scroll_x,
        scroll_y,
    };

    // Open everything before spawning so a bad path aborts startup cleanly.
    let readers = paths
        .iter()
        .map(|path| InputReader::open(path, bindings.clone(), config.grab))
        .collect::<Result<Vec<_>>>()?;

    for mut reader in readers {
        let name = reader
            .path()
            .file_name()
            .map(|n| format!("input-{}", n.to_string_lossy()))
            .unwrap_or_else(|| "input".into());
        // Readers block in read(2) and are left to exit with the process.
        std::thread::Builder::new()
            .name(name)
            .spawn(move || reader.run())
            .map_err(Error::Thread)?;
    }

    println!("Toggle: stickmouse toggle");
    println!("Quit:   stickmouse quit");
    println!();

    let mut scheduler = MotionScheduler::new(SpinClock, settings.tick);
    scheduler.register(Box::new(pointer));
    scheduler.register(Box::new(scroll));
    scheduler.pause_with(&PAUSED);
    let result = scheduler.run(&QUIT);

    log::info!(
        "Shutting down after {} ticks ({} late)...",
        scheduler.tick_count(),
        scheduler.late_ticks()
    );
    QUIT.store(true, Ordering::SeqCst);
    result?;
    log::info!("Done");
    Ok(())
}

fn signal_setup() {
    unsafe {
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGUSR1, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(sig: libc::c_int) {
    match sig {
        libc::SIGUSR1 => {
            PAUSED.fetch_xor(true, Ordering::SeqCst);
        }
        _ => QUIT.store(true, Ordering::SeqCst),
    }
}

/// Find PID of a running stickmouse instance by scanning /proc.
fn find_running_instance() -> Option<i32> {
    let my_pid = std::process::id() as i32;
    for entry in std::fs::read_dir("/proc").ok()? {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let pid: i32 = match entry.file_name().to_str().and_then(|s| s.parse().ok()) {
            Some(p) => p,
            None => continue,
        };
        if pid == my_pid {
            continue;
        }
        if let Ok(comm) = std::fs::read_to_string(entry.path().join("comm")) {
            if comm.trim() == "stickmouse" {
                return Some(pid);
            }
        }
    }
    None
}

/// Send a signal to the running stickmouse instance, or exit with an error.
fn send_to_running(sig: libc::c_int, action: &str) {
    match find_running_instance() {
        Some(pid) => {
            let ret = unsafe { libc::kill(pid, sig) };
            if ret == 0 {
                eprintln!("{} sent to stickmouse (pid {})", action, pid);
            } else {
                eprintln!("Failed to send signal to stickmouse (pid {})", pid);
                std::process::exit(1);
            }
        }
        None => {
            eprintln!("No running stickmouse instance found");
            std::process::exit(1);
        }
    }
}
