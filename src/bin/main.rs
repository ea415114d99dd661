use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use car_ground_station::{App, Cli, Cmd, Command, CommandError, Console, Outcome, StationLog};
use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{error, info, warn};
use serialport::{available_ports, SerialPortType};

/// How often link events are rendered while waiting for console input.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(20);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.cmd == Some(Cmd::ListPorts) {
        return list_ports();
    }

    let port = match cli.link.port.clone() {
        Some(port) => Some(port),
        None => first_port(),
    };
    let settings = port.map(|p| cli.link.serial_settings(p));
    if settings.is_none() {
        warn!("no serial port found; pass --port or plug the radio in");
    }

    let station_log = StationLog::open(&cli.link.station_log)
        .with_context(|| format!("opening station log {}", cli.link.station_log.display()))?;
    info!("station arrivals go to {}", station_log.path().display());

    let mut app = App::new(settings, Console::new(Some(station_log)), !cli.link.no_gamepad);
    if !cli.link.no_connect {
        if let Err(e) = app.connect() {
            error!("connect failed: {}", e);
        }
    }

    let lines = spawn_stdin_reader()?;
    info!("type ? for commands");

    loop {
        app.drain_events();
        match lines.recv_timeout(EVENT_POLL_INTERVAL) {
            Ok(line) => match line.parse::<Command>() {
                Ok(command) => {
                    if app.handle(command) == Outcome::Quit {
                        break;
                    }
                }
                Err(CommandError::Empty) => {}
                Err(e) => warn!("{}", e),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("console input closed");
                app.disconnect();
                break;
            }
        }
    }

    app.drain_events();
    Ok(())
}

fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = crossbeam_channel::bounded(16);
    thread::Builder::new()
        .name("console-input".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("starting console input thread")?;
    Ok(rx)
}

fn first_port() -> Option<String> {
    match available_ports() {
        Ok(ports) => ports.into_iter().next().map(|p| {
            info!("using first detected port {}", p.port_name);
            p.port_name
        }),
        Err(e) => {
            warn!("port discovery failed: {}", e);
            None
        }
    }
}

fn list_ports() -> Result<()> {
    let ports = available_ports().context("enumerating serial ports")?;
    if ports.is_empty() {
        println!("no serial ports found");
        return Ok(());
    }
    for p in ports {
        let extra = match &p.port_type {
            SerialPortType::UsbPort(info) => format!(
                " (usb vid={:04x} pid={:04x} {})",
                info.vid,
                info.pid,
                info.product.as_deref().unwrap_or("")
            ),
            SerialPortType::BluetoothPort => " (bluetooth)".to_owned(),
            SerialPortType::PciPort | SerialPortType::Unknown => String::new(),
        };
        println!("{}{}", p.port_name, extra);
    }
    Ok(())
}
