//! Command line options.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use link_core::{BaudRate, DataBits, Parity, SerialSettings, StopBits};

use crate::station_log::DEFAULT_STATION_LOG;

/// Ground station for the line-following car: drive it, tune it, watch it.
#[derive(Parser, Debug)]
#[command(name = "car-ground-station", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Option<Cmd>,

    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Cmd {
    /// List detected serial ports and exit.
    ListPorts,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial port (e.g. /dev/ttyUSB0, COM5). Defaults to the first detected port.
    #[arg(short, long)]
    pub port: Option<String>,

    /// Line rate: 9600 or 115200.
    #[arg(short, long, default_value_t = BaudRate::B9600)]
    pub baud: BaudRate,

    /// Data bits: 5, 6, 7 or 8.
    #[arg(long, default_value_t = DataBits::Eight)]
    pub data_bits: DataBits,

    /// Parity: none, odd, even, mark or space.
    #[arg(long, default_value_t = Parity::None)]
    pub parity: Parity,

    /// Stop bits: 1, 1.5 or 2.
    #[arg(long, default_value_t = StopBits::One)]
    pub stop_bits: StopBits,

    /// File that station arrivals are appended to.
    #[arg(long, default_value = DEFAULT_STATION_LOG)]
    pub station_log: PathBuf,

    /// Do not read a physical controller.
    #[arg(long)]
    pub no_gamepad: bool,

    /// Start disconnected; connect later with the `c` command.
    #[arg(long)]
    pub no_connect: bool,
}

impl LinkArgs {
    /// Port settings for `port`, with the line options from the command line.
    #[must_use]
    pub fn serial_settings(&self, port: impl Into<String>) -> SerialSettings {
        SerialSettings {
            port: port.into(),
            baud: self.baud,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("car-ground-station").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.cmd, None);
        assert_eq!(cli.link.port, None);
        assert_eq!(cli.link.station_log, PathBuf::from("station_log.txt"));
        assert!(!cli.link.no_gamepad);

        let settings = cli.link.serial_settings("COM3");
        assert_eq!(settings, SerialSettings::new("COM3"));
    }

    #[test]
    fn test_line_options() {
        let cli = parse(&[
            "--port",
            "/dev/ttyUSB1",
            "--baud",
            "115200",
            "--data-bits",
            "7",
            "--parity",
            "even",
            "--stop-bits",
            "2",
            "--no-gamepad",
        ])
        .unwrap();
        let settings = cli.link.serial_settings(cli.link.port.clone().unwrap());
        assert_eq!(settings.port, "/dev/ttyUSB1");
        assert_eq!(settings.baud, BaudRate::B115200);
        assert_eq!(settings.data_bits, DataBits::Seven);
        assert_eq!(settings.parity, Parity::Even);
        assert_eq!(settings.stop_bits, StopBits::Two);
        assert!(cli.link.no_gamepad);
    }

    #[test]
    fn test_list_ports() {
        assert_eq!(parse(&["list-ports"]).unwrap().cmd, Some(Cmd::ListPorts));
    }

    #[test]
    fn test_rejects_unknown_baud() {
        assert!(parse(&["--baud", "57600"]).is_err());
        assert!(parse(&["--stop-bits", "3"]).is_err());
    }
}
