use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use mmiosim_device::DEFAULT_CAPACITY;
use mmiosim_peer::{ClientConfig, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_CONNECTIONS};

use crate::exit::{CliError, CliResult, DATA_INVALID, USAGE};
use crate::output::OutputFormat;

pub mod handshake;
pub mod read;
pub mod serve;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the fake MMIO device.
    Serve(ServeArgs),
    /// Check that a device is alive.
    Handshake(ClientArgs),
    /// Write bytes to the device window.
    Write(WriteArgs),
    /// Read bytes from the device window.
    Read(ReadArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Handshake(args) => handshake::run(args, format),
        Command::Write(args) => write::run(args, format),
        Command::Read(args) => read::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (host:port).
    #[arg(long, env = "MMIOSIM_LISTEN", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen: String,
    /// Region size in bytes; must be a positive multiple of 4.
    #[arg(long, env = "MMIOSIM_REGION_SIZE", default_value_t = DEFAULT_CAPACITY)]
    pub region_size: usize,
    /// Drop a connection whose next request takes longer than this to arrive
    /// in full (e.g. 30s, 500ms).
    #[arg(long, env = "MMIOSIM_READ_TIMEOUT", default_value = "30s")]
    pub read_timeout: String,
    /// Connections served at once; extra connections are closed.
    #[arg(long, env = "MMIOSIM_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: usize,
}

#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Device address (host:port).
    #[arg(env = "MMIOSIM_ADDR")]
    pub addr: String,
    /// Connect and round-trip timeout (e.g. 5s, 500ms).
    #[arg(long, env = "MMIOSIM_TIMEOUT", default_value = "5s")]
    pub timeout: String,
}

impl ClientArgs {
    pub fn client_config(&self) -> CliResult<ClientConfig> {
        let timeout = parse_duration(&self.timeout)?;
        Ok(ClientConfig {
            connect_timeout: timeout,
            io_timeout: Some(timeout),
            ..ClientConfig::default()
        })
    }
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub client: ClientArgs,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Hex payload, e.g. 0102a0ff (whitespace and 0x prefix allowed).
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    #[command(flatten)]
    pub client: ClientArgs,
    /// Number of bytes to read from the start of the window.
    pub length: usize,
    /// Save the bytes to a file instead of printing them.
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input.split_whitespace().collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);

    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            DATA_INVALID,
            "hex payload must have an even number of digits",
        ));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| {
                    CliError::new(DATA_INVALID, format!("invalid hex byte at position {i}"))
                })
        })
        .collect()
}
