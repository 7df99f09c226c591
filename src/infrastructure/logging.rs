use crate::domain::settings::{LogRotation, LogSettings};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps the non-blocking file writer alive; logs are flushed on drop.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Minutely => Rotation::MINUTELY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Install the global tracing subscriber described by `settings`.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logger(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = settings
        .console_logging_enabled
        .then(|| fmt::layer().with_writer(std::io::stdout));

    let (file_layer, file_guard) = if settings.file_logging_enabled {
        let appender = RollingFileAppender::new(
            settings.rotation.into(),
            &settings.log_dir,
            &settings.file_name_prefix,
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!("Logging initialized");

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
