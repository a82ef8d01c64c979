use std::path::PathBuf;
use std::time::Duration;

use vj_core::domain::error::AppError;
use vj_core::domain::settings::{ApiSettings, PollSettings, TranscriptionOptions};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// 環境変数から組み立てる実行時設定
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout: Duration,
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_path: Option<PathBuf>,
    pub options: TranscriptionOptions,
    pub poll: PollSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー参照関数から読み込む（未設定・空文字は既定値）
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let log_level = get("VOXJOB_LOG_LEVEL")
            .map(|l| l.to_ascii_lowercase())
            .unwrap_or_else(|| "info".to_string());
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(AppError::invalid_input(format!(
                "VOXJOB_LOG_LEVEL must be one of {}: {log_level}",
                LOG_LEVELS.join("|")
            )));
        }

        let db_path = match get("VOXJOB_DB_PATH") {
            Some(p) => PathBuf::from(p),
            None => default_db_path(),
        };

        let mut options = TranscriptionOptions::default();
        if let Some(v) = get("VOXJOB_DIARIZATION") {
            options.diarization = parse_bool("VOXJOB_DIARIZATION", &v)?;
        }
        if let Some(v) = get("VOXJOB_DIARIZATION_ENHANCED") {
            options.diarization_config.enhanced = parse_bool("VOXJOB_DIARIZATION_ENHANCED", &v)?;
        }
        if let Some(v) = get("VOXJOB_SPEAKERS") {
            options.diarization_config.number_of_speakers = Some(parse_num("VOXJOB_SPEAKERS", &v)?);
        }
        if let Some(v) = get("VOXJOB_MIN_SPEAKERS") {
            options.diarization_config.min_speakers = Some(parse_num("VOXJOB_MIN_SPEAKERS", &v)?);
        }
        if let Some(v) = get("VOXJOB_MAX_SPEAKERS") {
            options.diarization_config.max_speakers = Some(parse_num("VOXJOB_MAX_SPEAKERS", &v)?);
        }
        if let Some(v) = get("VOXJOB_LANGUAGES") {
            options.languages = parse_list(&v);
        }
        if let Some(v) = get("VOXJOB_TRANSLATION") {
            options.translation = parse_bool("VOXJOB_TRANSLATION", &v)?;
        }
        if let Some(v) = get("VOXJOB_TARGET_LANGUAGES") {
            options.target_languages = parse_list(&v);
        }
        if let Some(v) = get("VOXJOB_SENTIMENT_ANALYSIS") {
            options.sentiment_analysis = parse_bool("VOXJOB_SENTIMENT_ANALYSIS", &v)?;
        }
        options.validate()?;

        let defaults = PollSettings::default();
        let interval = match get("VOXJOB_POLL_INTERVAL_SECS") {
            Some(v) => Duration::from_secs(parse_num("VOXJOB_POLL_INTERVAL_SECS", &v)?),
            None => defaults.interval,
        };
        let timeout = match get("VOXJOB_POLL_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_num("VOXJOB_POLL_TIMEOUT_SECS", &v)?),
            None => defaults.timeout,
        };
        let poll = PollSettings::new(interval, timeout)?;

        let request_timeout = match get("VOXJOB_REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_num("VOXJOB_REQUEST_TIMEOUT_SECS", &v)?),
            None => Duration::ZERO,
        };

        Ok(Self {
            api_key: get("VOXJOB_API_KEY"),
            base_url: get("VOXJOB_BASE_URL"),
            request_timeout,
            db_path,
            log_level,
            log_path: get("VOXJOB_LOG_PATH").map(PathBuf::from),
            options,
            poll,
        })
    }

    /// ネットワークを使うコマンドでのみ呼ぶ。API キー未設定はここで失敗する。
    pub fn api_settings(&self) -> Result<ApiSettings, AppError> {
        let token = self
            .api_key
            .clone()
            .ok_or_else(|| AppError::invalid_input("VOXJOB_API_KEY is not set"))?;
        let mut builder = ApiSettings::builder()
            .token(token)
            .request_timeout(self.request_timeout);
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url.clone());
        }
        builder.build()
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("voxjob")
        .join("jobs.db")
}

fn parse_bool(key: &str, value: &str) -> Result<bool, AppError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::invalid_input(format!(
            "{key} must be a boolean: {value}"
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError> {
    value
        .parse::<T>()
        .map_err(|_| AppError::invalid_input(format!("{key} must be a non-negative integer: {value}")))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
