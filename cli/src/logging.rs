use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use vj_core::domain::error::AppError;

/// ログ出力を初期化する。
///
/// コア層の `log` マクロは LogTracer 経由で tracing に流す。
/// 出力は stderr（標準出力はコマンド結果専用）、`log_path` があればファイルにも追記する。
pub fn init_logging(level: &str, log_path: Option<&Path>) -> Result<(), AppError> {
    tracing_log::LogTracer::init()
        .map_err(|e| AppError::invalid_state(format!("log bridge already installed: {e}")))?;

    let filter = EnvFilter::try_new(format!("{level},rusqlite=warn,hyper=warn,reqwest=warn"))
        .map_err(|e| AppError::invalid_input(format!("invalid log level {level}: {e}")))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let file_layer = match log_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AppError::persistence(format!("cannot open log file {}: {e}", path.display()))
                })?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::invalid_state(format!("logger already installed: {e}")))?;

    tracing::debug!(log_level = level, log_file = ?log_path, "logging initialized");
    Ok(())
}
