use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use stsbus_frame::{BROADCAST_ID, MAX_DEVICE_ID};
use stsbus_servo::{BusConfig, ServoBus};
use stsbus_transport::{SerialConfig, DEFAULT_BAUD_RATE};
use tracing::debug;

use crate::exit::{servo_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod ping;
pub mod read;
pub mod sweep;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that a servo answers and show its status.
    Ping(IdArgs),
    /// Command a goal position.
    Move(MoveArgs),
    /// Read the present position.
    ReadPos(IdArgs),
    /// Read the present load.
    ReadLoad(IdArgs),
    /// Renumber a servo.
    SetId(SetIdArgs),
    /// Choose which instructions a servo answers (0 = ping and reads only, 1 = all).
    SetResponseLevel(SetResponseLevelArgs),
    /// Limit output torque.
    SetMaxTorque(SetMaxTorqueArgs),
    /// Restore factory settings.
    Reset(IdArgs),
    /// Decode a captured byte stream without touching the bus.
    Decode(DecodeArgs),
    /// Step a servo through its range, reading back each position.
    Sweep(SweepArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, bus: &BusArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ping(args) => ping::run(&bus.open()?, args, format),
        Command::Move(args) => write::move_to(&bus.open()?, args, format),
        Command::ReadPos(args) => read::position(&bus.open()?, args, format),
        Command::ReadLoad(args) => read::load(&bus.open()?, args, format),
        Command::SetId(args) => write::set_id(&bus.open()?, args, format),
        Command::SetResponseLevel(args) => write::set_response_level(&bus.open()?, args, format),
        Command::SetMaxTorque(args) => write::set_max_torque(&bus.open()?, args, format),
        Command::Reset(args) => write::reset(&bus.open()?, args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Sweep(args) => sweep::run(&bus.open()?, args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Connection and behavior flags shared by every bus command.
#[derive(Args, Debug, Clone)]
pub struct BusArgs {
    /// Serial port of the bus adapter.
    #[arg(long, env = "STSBUS_PORT", value_name = "PATH", global = true)]
    pub port: Option<PathBuf>,
    /// Line speed.
    #[arg(long, env = "STSBUS_BAUD", default_value_t = DEFAULT_BAUD_RATE, global = true)]
    pub baud: u32,
    /// How long queries wait for a reply (e.g. 200ms, 1s).
    #[arg(long, default_value = "200ms", value_parser = parse_duration, global = true)]
    pub timeout: Duration,
    /// Unlock and re-lock the EPROM around configuration writes.
    #[arg(long, global = true)]
    pub persistent: bool,
    /// The adapter does not reflect transmitted bytes.
    #[arg(long, global = true)]
    pub no_echo: bool,
}

impl BusArgs {
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            reply_timeout: self.timeout,
            persistent: self.persistent,
            expect_echo: !self.no_echo,
            ..BusConfig::default()
        }
    }

    pub fn open(&self) -> CliResult<ServoBus> {
        let port = self.port.as_ref().ok_or_else(|| {
            CliError::new(USAGE, "no serial port given (use --port or STSBUS_PORT)")
        })?;
        let serial = SerialConfig {
            baud_rate: self.baud,
            ..SerialConfig::default()
        };
        debug!(port = %port.display(), baud = self.baud, "opening bus");
        ServoBus::open(port, &serial, self.bus_config())
            .map_err(|err| servo_error(&format!("failed to open {}", port.display()), err))
    }
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Servo id (254 = broadcast).
    #[arg(value_parser = clap::value_parser!(u8).range(0..=BROADCAST_ID as i64))]
    pub id: u8,
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Servo id (254 = broadcast).
    #[arg(value_parser = clap::value_parser!(u8).range(0..=BROADCAST_ID as i64))]
    pub id: u8,
    /// Goal position.
    pub position: u16,
}

#[derive(Args, Debug)]
pub struct SetIdArgs {
    /// Current servo id.
    #[arg(value_parser = clap::value_parser!(u8).range(0..=MAX_DEVICE_ID as i64))]
    pub id: u8,
    /// New servo id.
    #[arg(value_parser = clap::value_parser!(u8).range(0..=MAX_DEVICE_ID as i64))]
    pub new_id: u8,
}

#[derive(Args, Debug)]
pub struct SetResponseLevelArgs {
    /// Servo id (254 = broadcast).
    #[arg(value_parser = clap::value_parser!(u8).range(0..=BROADCAST_ID as i64))]
    pub id: u8,
    /// Response level.
    pub level: u8,
}

#[derive(Args, Debug)]
pub struct SetMaxTorqueArgs {
    /// Servo id (254 = broadcast).
    #[arg(value_parser = clap::value_parser!(u8).range(0..=BROADCAST_ID as i64))]
    pub id: u8,
    /// Torque limit.
    pub torque: u16,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file. Reads stdin when omitted or `-`.
    pub input: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Servo id.
    #[arg(value_parser = clap::value_parser!(u8).range(0..=MAX_DEVICE_ID as i64))]
    pub id: u8,
    /// First goal position.
    #[arg(long, default_value_t = 0)]
    pub start: u16,
    /// Position increment per step.
    #[arg(long, default_value_t = 100)]
    pub step: u16,
    /// Positions wrap around at this value.
    #[arg(long, default_value_t = 3900, value_parser = clap::value_parser!(u16).range(1..))]
    pub limit: u16,
    /// Time between steps (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    pub interval: Duration,
    /// Pause between the move and the position read-back.
    #[arg(long, default_value = "100ms", value_parser = parse_duration)]
    pub settle: Duration,
    /// Stop after N steps. Runs until Ctrl-C otherwise.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms` / `2s` / `2` (seconds).
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}
