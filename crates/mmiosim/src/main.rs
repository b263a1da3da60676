mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "mmiosim", version, about = "Fake MMIO device over TCP")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_write_subcommand() {
        let cli = Cli::try_parse_from([
            "mmiosim",
            "write",
            "127.0.0.1:9090",
            "--data",
            "hello",
        ])
        .expect("write args should parse");

        assert!(matches!(cli.command, Command::Write(_)));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "mmiosim",
            "write",
            "127.0.0.1:9090",
            "--hex",
            "0102",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_read_subcommand() {
        let cli = Cli::try_parse_from([
            "mmiosim",
            "read",
            "127.0.0.1:9090",
            "16",
            "--timeout",
            "3s",
        ])
        .expect("read args should parse");
        match cli.command {
            Command::Read(args) => {
                assert_eq!(args.length, 16);
                assert_eq!(args.client.timeout, "3s");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn serve_defaults_to_loopback_port() {
        let cli = Cli::try_parse_from(["mmiosim", "serve"]).expect("serve should parse");
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.listen, "127.0.0.1:9090");
                assert_eq!(args.region_size, 65536);
                assert_eq!(args.max_connections, 64);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["mmiosim", "handshake", "127.0.0.1:9090", "--format", "json"])
            .expect("global flag should parse after subcommand");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
