//! Configuration and command-line argument parsing

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream feed endpoint
    pub feed_url: String,

    // Networking
    pub ws_port: u16,
    pub http_port: u16,

    // Reconnect policy
    /// Delay before reconnecting after an established connection closes
    pub reconnect_secs: u64,
    /// Delay after a connection attempt that failed outright
    pub connect_fail_secs: u64,

    // Roster behavior
    /// How long an aircraft omitted from a batch is retained
    /// (0 = roster exactly tracks the latest batch)
    pub stale_grace_secs: u64,
    /// Use the corrected phase rules instead of the coarse heuristic
    pub corrected_phases: bool,

    /// Always serve the demo roster on the aircraft endpoint
    pub demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: "wss://24data.ptfs.app/wss".to_string(),
            ws_port: 8081,
            http_port: 8080,
            reconnect_secs: 5,
            connect_fail_secs: 10,
            stale_grace_secs: 0,
            corrected_phases: false,
            demo: false,
        }
    }
}

impl Config {
    pub fn from_args() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = Config::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--feed-url" => {
                    i += 1;
                    if let Some(url) = args.get(i) {
                        config.feed_url = url.clone();
                    }
                }
                "--ws-port" => {
                    i += 1;
                    config.ws_port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(8081);
                }
                "--http-port" => {
                    i += 1;
                    config.http_port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(8080);
                }
                "--reconnect" => {
                    i += 1;
                    config.reconnect_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(5);
                }
                "--connect-retry" => {
                    i += 1;
                    config.connect_fail_secs =
                        args.get(i).and_then(|s| s.parse().ok()).unwrap_or(10);
                }
                "--stale-grace" => {
                    i += 1;
                    config.stale_grace_secs =
                        args.get(i).and_then(|s| s.parse().ok()).unwrap_or(0);
                }
                "--corrected-phases" => config.corrected_phases = true,
                "--demo" => config.demo = true,
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown option: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        config
    }
}

fn print_help() {
    println!(
        r#"atc24-relay - live traffic relay for the ATC24 feed

Usage: atc24-relay [OPTIONS]

Options:
  --feed-url <url>       Upstream feed endpoint (default: wss://24data.ptfs.app/wss)
  --ws-port <port>       WebSocket fanout port for subscribers (default: 8081)
  --http-port <port>     HTTP polling endpoint port (default: 8080)
  --reconnect <s>        Reconnect delay after a dropped connection (default: 5)
  --connect-retry <s>    Retry delay after a failed connection attempt (default: 10)
  --stale-grace <s>      Keep aircraft omitted from a batch for <s> seconds (default: 0)
  --corrected-phases     Use the corrected flight-phase rules (reaches descent/landing)
  --demo                 Always serve the demo roster on /api/aircraft
  --help                 Show this help
"#
    );
}
