use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Overrides the computed filter when set, in `EnvFilter` directive syntax.
pub const LOG_ENV: &str = "FRAMELINK_LOG";

/// Targets whose events the CLI shows. Dependencies stay silent.
const TARGETS: [&str; 3] = ["framelink", "framelink_frame", "framelink_endpoint"];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const ORDER: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// Move `steps` levels towards `Trace`, stopping there.
    pub fn raised(self, steps: u8) -> Self {
        let at = (self as usize).saturating_add(usize::from(steps));
        Self::ORDER[at.min(Self::ORDER.len() - 1)]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Directives enabling `level` for the framelink crates only.
pub fn directives(level: LogLevel) -> String {
    TARGETS
        .iter()
        .map(|target| format!("{target}={}", level.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the subscriber. Logs go to stderr so stdout carries only command
/// output; `verbose` raises `level` one step per flag.
pub fn init_logging(format: LogFormat, level: LogLevel, verbose: u8) {
    let level = level.raised(verbose);
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(directives(level)));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false);

    match format {
        LogFormat::Text => {
            let _ = builder.with_target(false).try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_and_saturates() {
        assert_eq!(LogLevel::Info.raised(0), LogLevel::Info);
        assert_eq!(LogLevel::Info.raised(1), LogLevel::Debug);
        assert_eq!(LogLevel::Warn.raised(2), LogLevel::Debug);
        assert_eq!(LogLevel::Debug.raised(9), LogLevel::Trace);
    }

    #[test]
    fn directives_cover_every_crate() {
        assert_eq!(
            directives(LogLevel::Debug),
            "framelink=debug,framelink_frame=debug,framelink_endpoint=debug"
        );
        assert!(EnvFilter::try_new(directives(LogLevel::Trace)).is_ok());
    }
}
