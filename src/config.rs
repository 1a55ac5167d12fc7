//! Server configuration.
//!
//! Flags are parsed by hand — the surface is small enough that a full
//! argument-parsing dependency isn't worth it. Unknown flags and missing
//! values print usage and exit with status 1.

use crate::storage::{SnapshotConfig, DEFAULT_SAVE_INTERVAL, DEFAULT_SWEEP_INTERVAL};
use std::time::Duration;

/// Runtime configuration for the server binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Interval between active-expiry sweeps
    pub sweep_interval: Duration,
    /// Snapshot persistence settings
    pub snapshot: SnapshotConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl Config {
    /// Parses configuration from the process arguments.
    pub fn from_args() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    fn parse(args: impl Iterator<Item = String>) -> Self {
        let mut config = Config::default();
        let mut args = args.peekable();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => {
                    config.host = require_value(&arg, args.next());
                }
                "--port" | "-p" => {
                    config.port = parse_or_die(&arg, args.next());
                }
                "--data-dir" => {
                    config.snapshot.data_dir = require_value(&arg, args.next()).into();
                }
                "--save-interval" => {
                    let secs: u64 = parse_or_die(&arg, args.next());
                    config.snapshot.save_interval = Duration::from_secs(secs);
                }
                "--sweep-interval" => {
                    let secs: u64 = parse_or_die(&arg, args.next());
                    config.sweep_interval = Duration::from_secs(secs);
                }
                "--no-persistence" => {
                    config.snapshot.enabled = false;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("flintkv version {}", crate::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// The address the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn require_value(flag: &str, value: Option<String>) -> String {
    match value {
        Some(v) => v,
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn parse_or_die<T: std::str::FromStr>(flag: &str, value: Option<String>) -> T {
    let raw = require_value(flag, value);
    match raw.parse() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("Error: invalid value for {}: {}", flag, raw);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"
flintkv - A Redis-Inspired In-Memory Key-Value Store

USAGE:
    flintkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>            Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>            Port to listen on (default: 6379)
        --data-dir <DIR>         Snapshot directory (default: data)
        --save-interval <SECS>   Seconds between auto-saves (default: {})
        --sweep-interval <SECS>  Seconds between expiry sweeps (default: {})
        --no-persistence         Disable snapshot load and save
    -v, --version                Print version information
        --help                   Print this help message

CONNECTING:
    Use redis-cli or any Redis client:
    $ redis-cli -p 6379
    127.0.0.1:6379> SET greeting hello
    OK
"#,
        DEFAULT_SAVE_INTERVAL.as_secs(),
        DEFAULT_SWEEP_INTERVAL.as_secs(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults() {
        let config = parse(&[]);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 6379);
        assert!(config.snapshot.enabled);
        assert_eq!(config.sweep_interval, DEFAULT_SWEEP_INTERVAL);
        assert_eq!(config.snapshot.save_interval, DEFAULT_SAVE_INTERVAL);
    }

    #[test]
    fn overrides() {
        let config = parse(&[
            "--host",
            "0.0.0.0",
            "--port",
            "7000",
            "--data-dir",
            "/tmp/kv",
            "--save-interval",
            "5",
            "--sweep-interval",
            "2",
            "--no-persistence",
        ]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7000);
        assert_eq!(config.snapshot.data_dir, std::path::PathBuf::from("/tmp/kv"));
        assert_eq!(config.snapshot.save_interval, Duration::from_secs(5));
        assert_eq!(config.sweep_interval, Duration::from_secs(2));
        assert!(!config.snapshot.enabled);
    }

    #[test]
    fn bind_address_joins_host_and_port() {
        let config = parse(&["--port", "6380"]);
        assert_eq!(config.bind_address(), "127.0.0.1:6380");
    }
}
