use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use sigwire_peer::{Delivery, Message, PeerError};
use sigwire_transport::ProcessId;

const MESSAGE_SCHEMA: &str = "https://schemas.3leaps.dev/sigwire/cli/v1/message-received.schema.json";
const LISTENING_SCHEMA: &str = "https://schemas.3leaps.dev/sigwire/cli/v1/listening.schema.json";
const DELIVERY_SCHEMA: &str = "https://schemas.3leaps.dev/sigwire/cli/v1/delivery.schema.json";

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ListeningOutput<'a> {
    schema_id: &'a str,
    event: &'a str,
    pid: u32,
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    schema_id: &'a str,
    sequence: u8,
    payload_size: usize,
    encoding: &'a str,
    payload: String,
    peer_pid: Option<u32>,
    timestamp: String,
}

#[derive(Serialize)]
struct DeliveryOutput<'a> {
    schema_id: &'a str,
    target_pid: u32,
    delivered: bool,
    sequence: Option<u8>,
    attempts: Option<u32>,
}

/// Announce the pid a sender needs to address.
pub fn print_listening(pid: ProcessId, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ListeningOutput {
            schema_id: LISTENING_SCHEMA,
            event: "listening",
            pid: pid.as_u32(),
        }),
        OutputFormat::Table | OutputFormat::Pretty => println!("Receiver PID: {}", pid.as_u32()),
        // Keep stdout byte-exact.
        OutputFormat::Raw => eprintln!("Receiver PID: {}", pid.as_u32()),
    }
    flush_stdout();
}

pub fn print_message(message: &Message, peer: Option<ProcessId>, format: OutputFormat) {
    let (encoding, text) = render_payload(&message.payload);
    match format {
        OutputFormat::Json => print_json(&MessageOutput {
            schema_id: MESSAGE_SCHEMA,
            sequence: message.sequence,
            payload_size: message.payload.len(),
            encoding,
            payload: text,
            peer_pid: peer.map(ProcessId::as_u32),
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "SIZE", "PEER", "PAYLOAD"])
                .add_row(vec![
                    message.sequence.to_string(),
                    message.payload.len().to_string(),
                    peer.map_or_else(|| "-".to_string(), |pid| pid.as_u32().to_string()),
                    text,
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("RECEIVED: {text}"),
        OutputFormat::Raw => print_raw(&message.payload),
    }
    flush_stdout();
}

/// Report the outcome of one send.
pub fn print_delivery(
    target: ProcessId,
    outcome: &Result<Delivery, PeerError>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let delivery = outcome.as_ref().ok();
            print_json(&DeliveryOutput {
                schema_id: DELIVERY_SCHEMA,
                target_pid: target.as_u32(),
                delivered: delivery.is_some(),
                sequence: delivery.map(|d| d.sequence),
                attempts: delivery.map(|d| d.attempts),
            });
        }
        _ => println!("{}", if outcome.is_ok() { "Sent" } else { "Failed" }),
    }
    flush_stdout();
}

pub fn print_stopped(format: OutputFormat) {
    if matches!(format, OutputFormat::Pretty | OutputFormat::Table) {
        println!("Stopped.");
        flush_stdout();
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(record: &T) {
    println!(
        "{}",
        serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
    );
}

fn flush_stdout() {
    let _ = std::io::stdout().flush();
}

/// Text for valid UTF-8, lowercase hex otherwise.
fn render_payload(payload: &[u8]) -> (&'static str, String) {
    match std::str::from_utf8(payload) {
        Ok(text) => ("utf8", text.to_string()),
        Err(_) => ("hex", to_hex(payload)),
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
