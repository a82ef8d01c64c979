use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::AppError;

pub const DEFAULT_BASE_URL: &str = "https://api.gladia.io";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// API 接続設定
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// API キー（必須）
    pub token: String,
    /// ベースURL（末尾スラッシュなし）
    pub base_url: String,
    /// リクエストタイムアウト。None はタイムアウトなし。
    pub request_timeout: Option<Duration>,
}

impl ApiSettings {
    pub fn builder() -> ApiSettingsBuilder {
        ApiSettingsBuilder::default()
    }
}

/// ApiSettings のビルダー。`build()` で一度だけ検証する。
#[derive(Debug, Default)]
pub struct ApiSettingsBuilder {
    token: Option<String>,
    base_url: Option<String>,
    request_timeout: Option<Duration>,
}

impl ApiSettingsBuilder {
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// ゼロはタイムアウトなしとして扱う
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn build(self) -> Result<ApiSettings, AppError> {
        let token = self
            .token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::invalid_input("API token is required"))?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AppError::invalid_input(format!(
                "base URL must start with http:// or https://: {base_url}"
            )));
        }

        Ok(ApiSettings {
            token,
            base_url,
            request_timeout: self.request_timeout,
        })
    }
}

/// 話者分離の詳細設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiarizationOptions {
    pub enhanced: bool,
    pub number_of_speakers: Option<u8>,
    pub min_speakers: Option<u8>,
    pub max_speakers: Option<u8>,
}

/// 書き起こしオプション（リモートへはそのまま渡す）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionOptions {
    pub diarization: bool,
    pub diarization_config: DiarizationOptions,
    /// 入力言語（空なら自動検出）
    pub languages: Vec<String>,
    pub translation: bool,
    pub target_languages: Vec<String>,
    pub sentiment_analysis: bool,
    pub subtitles: bool,
    pub subtitle_formats: Vec<String>,
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            diarization: false,
            diarization_config: DiarizationOptions {
                enhanced: true,
                ..Default::default()
            },
            languages: vec![],
            translation: false,
            target_languages: vec![],
            sentiment_analysis: true,
            subtitles: false,
            subtitle_formats: vec![],
        }
    }
}

impl TranscriptionOptions {
    pub fn validate(&self) -> Result<(), AppError> {
        let d = &self.diarization_config;
        for (name, value) in [
            ("number_of_speakers", d.number_of_speakers),
            ("min_speakers", d.min_speakers),
            ("max_speakers", d.max_speakers),
        ] {
            if value == Some(0) {
                return Err(AppError::invalid_input(format!("{name} must be >= 1")));
            }
        }
        if let (Some(min), Some(max)) = (d.min_speakers, d.max_speakers) {
            if min > max {
                return Err(AppError::invalid_input(format!(
                    "min_speakers ({min}) exceeds max_speakers ({max})"
                )));
            }
        }
        if self.translation && self.target_languages.is_empty() {
            return Err(AppError::invalid_input(
                "translation requires at least one target language",
            ));
        }
        Ok(())
    }
}

/// ポーリング設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// 全体の待ち時間上限。ゼロは無期限。
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: Duration::ZERO,
        }
    }
}

impl PollSettings {
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self, AppError> {
        if interval.is_zero() {
            return Err(AppError::invalid_input("poll interval must be greater than zero"));
        }
        Ok(Self { interval, timeout })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorCode;

    #[test]
    fn test_builder_defaults() {
        let s = ApiSettings::builder().token("key").build().unwrap();
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
        assert!(s.request_timeout.is_none());
    }

    #[test]
    fn test_builder_requires_token() {
        let err = ApiSettings::builder().token("   ").build().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_builder_normalizes_base_url() {
        let s = ApiSettings::builder()
            .token("key")
            .base_url("http://localhost:8080/")
            .request_timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        assert_eq!(s.base_url, "http://localhost:8080");
        assert_eq!(s.request_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_builder_rejects_non_http_url() {
        let err = ApiSettings::builder()
            .token("key")
            .base_url("ftp://example.com")
            .build()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_options_speaker_bounds() {
        let mut opts = TranscriptionOptions::default();
        opts.diarization_config.min_speakers = Some(3);
        opts.diarization_config.max_speakers = Some(2);
        assert!(opts.validate().is_err());

        opts.diarization_config.max_speakers = Some(4);
        assert!(opts.validate().is_ok());

        opts.diarization_config.number_of_speakers = Some(0);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_options_translation_needs_targets() {
        let opts = TranscriptionOptions {
            translation: true,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_poll_settings_rejects_zero_interval() {
        assert!(PollSettings::new(Duration::ZERO, Duration::ZERO).is_err());
        let p = PollSettings::new(Duration::from_secs(1), Duration::ZERO).unwrap();
        assert!(p.timeout.is_zero());
    }
}
