//! systemsp runner
//!
//! Loads a plugin category file, prints every emitted reading as one JSON
//! line on stdout and shuts down after a fixed duration. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use systemsp::{PluginConfig, Reading, SystemStatusNotifier};

/// Runner configuration
struct Config {
    /// Plugin category file
    config_path: Option<PathBuf>,
    /// Notifications replayed once configured
    notifications: Vec<String>,
    /// Run duration
    run_for: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            notifications: Vec::new(),
            run_for: Duration::from_secs(10),
        }
    }
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let Some(path) = args.get(i + 1) else {
                    eprintln!("error: --config requires a value");
                    std::process::exit(1);
                };
                config.config_path = Some(PathBuf::from(path));
                i += 2;
            }
            "--notify" | "-n" => {
                let Some(notification) = args.get(i + 1) else {
                    eprintln!("error: --notify requires a value");
                    std::process::exit(1);
                };
                config.notifications.push(notification.clone());
                i += 2;
            }
            "--run-for" | "-t" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("error: --run-for requires a value");
                    std::process::exit(1);
                };
                let secs: u64 = value.parse().unwrap_or_else(|_| {
                    eprintln!("error: invalid duration: {value}");
                    std::process::exit(1);
                });
                config.run_for = Duration::from_secs(secs);
                i += 2;
            }
            "--help" | "-h" => {
                println!("systemsp-run - System status point emitter");
                println!();
                println!("USAGE:");
                println!("    systemsp-run [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -c, --config <FILE>       Plugin category file");
                println!("    -n, --notify <JSON>       Notification to replay after start (repeatable)");
                println!("    -t, --run-for <SECS>      Run duration in seconds [default: 10]");
                println!("    -h, --help                Print help information");
                std::process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {arg}");
                std::process::exit(1);
            }
        }
    }

    config
}

fn print_reading(reading: Reading) {
    match serde_json::to_string(&reading) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::error!(asset = %reading.asset_name, error = %e, "Failed to print reading"),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = parse_args();

    let notifier = SystemStatusNotifier::new();
    notifier.register_sink(Arc::new(print_reading));

    if let Some(path) = &config.config_path {
        tracing::info!(path = %path.display(), "Loading plugin configuration");
        let category = PluginConfig::from_file(path)?;
        notifier.reconfigure(&category)?;
    }

    for notification in &config.notifications {
        let handled = notifier.notify(notification);
        tracing::info!(notification = %notification, handled, "Notification replayed");
    }

    std::thread::sleep(config.run_for);

    notifier.stop_cycles();
    tracing::info!("Shut down");
    Ok(())
}
