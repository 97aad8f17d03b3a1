use dkg_deploy_config::{LogFormat, LogLevel};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `log_level` when set.
pub fn init(log_level: LogLevel, log_format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_thread_ids(false);

    let result = match log_format {
        LogFormat::Plaintext => builder.finish().try_init(),
        LogFormat::Json => builder.json().finish().try_init(),
    };

    if let Err(e) = result {
        eprintln!("Failed to install the log subscriber: {e}");
    }
}

/// Our crates log at `log_level`, dependencies only log warnings and errors.
fn default_directive(log_level: LogLevel) -> String {
    match log_level {
        LogLevel::Warn | LogLevel::Error => log_level.to_string(),
        _ => format!("warn,dkg_deploy={log_level}"),
    }
}
