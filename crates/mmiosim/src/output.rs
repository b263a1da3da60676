use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Bytes shown per row in table and pretty dumps.
const ROW_BYTES: usize = 16;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ListeningOutput<'a> {
    event: &'a str,
    addr: String,
    capacity: usize,
}

#[derive(Serialize)]
struct HandshakeOutput<'a> {
    addr: &'a str,
    ok: bool,
    latency_ms: f64,
}

#[derive(Serialize)]
struct WriteOutput<'a> {
    addr: &'a str,
    length: usize,
    acknowledged: bool,
}

#[derive(Serialize)]
struct ReadOutput<'a> {
    addr: &'a str,
    length: usize,
    data: String,
}

pub fn print_listening(addr: SocketAddr, capacity: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ListeningOutput {
            event: "listening",
            addr: addr.to_string(),
            capacity,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("listening on {addr} (region {capacity} bytes)");
        }
        OutputFormat::Raw => println!("{addr}"),
    }
}

pub fn print_handshake(addr: &str, ok: bool, latency: Duration, format: OutputFormat) {
    let latency_ms = (latency.as_secs_f64() * 1000.0 * 100.0).round() / 100.0;
    match format {
        OutputFormat::Json => print_json(&HandshakeOutput {
            addr,
            ok,
            latency_ms,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "HANDSHAKE", "LATENCY"])
                .add_row(vec![
                    addr.to_string(),
                    ok_label(ok).to_string(),
                    format!("{latency_ms:.2}ms"),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("device={addr} handshake={} latency={latency_ms:.2}ms", ok_label(ok));
        }
        OutputFormat::Raw => println!("{}", ok_label(ok)),
    }
}

pub fn print_write(addr: &str, length: usize, acknowledged: bool, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&WriteOutput {
            addr,
            length,
            acknowledged,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "BYTES", "ACK"])
                .add_row(vec![
                    addr.to_string(),
                    length.to_string(),
                    ok_label(acknowledged).to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "device={addr} wrote={length} ack={}",
                ok_label(acknowledged)
            );
        }
        OutputFormat::Raw => println!("{}", ok_label(acknowledged)),
    }
}

pub fn print_read(addr: &str, data: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ReadOutput {
            addr,
            length: data.len(),
            data: to_hex(data),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OFFSET", "HEX", "ASCII"]);
            for (row, chunk) in data.chunks(ROW_BYTES).enumerate() {
                table.add_row(vec![
                    format!("0x{:04X}", row * ROW_BYTES),
                    spaced_hex(chunk),
                    ascii_preview(chunk),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (row, chunk) in data.chunks(ROW_BYTES).enumerate() {
                println!(
                    "{:08x}  {:<47}  |{}|",
                    row * ROW_BYTES,
                    spaced_hex(chunk),
                    ascii_preview(chunk)
                );
            }
        }
        OutputFormat::Raw => print_raw(data),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Lowercase hex with no separators.
pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn spaced_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn ascii_preview(data: &[u8]) -> String {
    data.iter()
        .map(|b| {
            if b.is_ascii_graphic() || *b == b' ' {
                char::from(*b)
            } else {
                '.'
            }
        })
        .collect()
}

fn ok_label(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "rejected"
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}
