use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use sigwire_frame::TimingConfig;
use sigwire_peer::{ReceiverConfig, SenderConfig, DEFAULT_MAX_RETRIES};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print this process id and the messages sent to it.
    Listen(ListenArgs),
    /// Send messages to a listening process.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, tuning: &TuningArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, tuning, format),
        Command::Send(args) => send::run(args, tuning, format),
        Command::Version(args) => version::run(args),
    }
}

/// Protocol timing shared by both ends. Sender and receiver must agree on
/// `--interval`.
#[derive(Args, Debug, Clone)]
pub struct TuningArgs {
    /// Pulse interval (e.g. 50ms).
    #[arg(long, global = true, env = "SIGWIRE_INTERVAL", default_value = "50ms", value_parser = parse_duration)]
    pub interval: Duration,
    /// Time to wait for an acknowledgment after each transmission.
    #[arg(long, global = true, env = "SIGWIRE_ACK_TIMEOUT", default_value = "1s", value_parser = parse_duration)]
    pub ack_timeout: Duration,
    /// Transmissions per message before giving up.
    #[arg(long, global = true, env = "SIGWIRE_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub retries: u32,
}

impl TuningArgs {
    pub fn timing(&self) -> TimingConfig {
        TimingConfig::with_interval(self.interval)
    }

    pub fn sender_config(&self) -> SenderConfig {
        SenderConfig {
            timing: self.timing(),
            ack_timeout: self.ack_timeout,
            max_retries: self.retries,
            ..SenderConfig::default()
        }
    }

    pub fn receiver_config(&self) -> ReceiverConfig {
        ReceiverConfig::with_timing(self.timing())
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Process id of the listener.
    #[arg(value_parser = clap::value_parser!(u32).range(1..=i32::MAX as i64))]
    pub pid: u32,
    /// Message to send. Without one, lines are read from stdin.
    #[arg(conflicts_with = "file")]
    pub message: Option<String>,
    /// Send the contents of a file as one message.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `2s` or a bare number of seconds.
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
