use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{
    AudioMetadata, AudioUpload, ClientError, JobRequest, RemoteJobPage, RemoteJobSummary,
    SubmittedJob, TranscriptionApi, UploadedAudio,
};
use crate::domain::error::AppError;
use crate::domain::job::{RemoteState, RemoteStatus};
use crate::domain::settings::ApiSettings;

const AUTH_HEADER: &str = "x-gladia-key";
const UPLOAD_PATH: &str = "/v2/upload";
const PRE_RECORDED_PATH: &str = "/v2/pre-recorded";
const MAX_LIST_LIMIT: u32 = 100;

/// HTTP 経由の書き起こしクライアント
pub struct HttpTranscriptionClient {
    client: reqwest::Client,
    settings: ApiSettings,
}

impl HttpTranscriptionClient {
    pub fn new(settings: ApiSettings) -> Result<Self, AppError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AppError::invalid_input(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, settings })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url, path)
    }

    /// `/v2/pre-recorded/{id}[/tail..]`。ID はパスセグメントとしてエンコードする。
    fn job_url(&self, remote_job_id: &str, tail: &[&str]) -> Result<reqwest::Url, ClientError> {
        if remote_job_id.is_empty() {
            return Err(ClientError::InvalidRequest("remote job id is empty".into()));
        }
        let mut url = reqwest::Url::parse(&self.url(PRE_RECORDED_PATH))
            .map_err(|e| ClientError::InvalidRequest(format!("invalid base URL: {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidRequest("base URL cannot carry a path".into()))?;
            segments.push(remote_job_id);
            segments.extend(tail);
        }
        Ok(url)
    }

    /// リクエストを送信し、期待ステータス以外はエラーにする。
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        expected: StatusCode,
    ) -> Result<Vec<u8>, ClientError> {
        let response = request
            .header(AUTH_HEADER, &self.settings.token)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status != expected {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::ServerStatus {
                expected: expected.as_u16(),
                actual: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(format!("Failed to read response body: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl TranscriptionApi for HttpTranscriptionClient {
    async fn upload(&self, audio: AudioUpload) -> Result<UploadedAudio, ClientError> {
        let url = self.url(UPLOAD_PATH);
        log::debug!("POST {url} ({} bytes, {})", audio.bytes.len(), audio.file_name);

        let part = reqwest::multipart::Part::bytes(audio.bytes).file_name(audio.file_name);
        let form = reqwest::multipart::Form::new().part("audio", part);

        let body = self
            .send(self.client.post(&url).multipart(form), StatusCode::OK)
            .await?;
        parse_upload_response(&body)
    }

    async fn submit_job(&self, request: &JobRequest) -> Result<SubmittedJob, ClientError> {
        let body = PreRecordedBody::from_request(request)?;
        let url = self.url(PRE_RECORDED_PATH);
        log::debug!("POST {url}");

        let bytes = self
            .send(self.client.post(&url).json(&body), StatusCode::CREATED)
            .await?;
        parse_init_response(&bytes)
    }

    async fn fetch_status(&self, remote_job_id: &str) -> Result<RemoteStatus, ClientError> {
        let url = self.job_url(remote_job_id, &[])?;
        log::debug!("GET {url}");

        let bytes = self
            .send(
                self.client.get(url).header("accept", "application/json"),
                StatusCode::OK,
            )
            .await?;
        parse_status_response(&bytes)
    }

    async fn delete_job(&self, remote_job_id: &str) -> Result<(), ClientError> {
        let url = self.job_url(remote_job_id, &[])?;
        log::debug!("DELETE {url}");

        self.send(self.client.delete(url), StatusCode::ACCEPTED).await?;
        Ok(())
    }

    async fn list_remote(&self, limit: u32) -> Result<RemoteJobPage, ClientError> {
        if limit == 0 || limit > MAX_LIST_LIMIT {
            return Err(ClientError::InvalidRequest(format!(
                "limit must be between 1 and {MAX_LIST_LIMIT}: {limit}"
            )));
        }
        let url = self.url(PRE_RECORDED_PATH);
        log::debug!("GET {url}?limit={limit}");

        let bytes = self
            .send(
                self.client
                    .get(&url)
                    .query(&[("limit", limit)])
                    .header("accept", "application/json"),
                StatusCode::OK,
            )
            .await?;
        parse_list_response(&bytes)
    }

    async fn download_audio(&self, remote_job_id: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.job_url(remote_job_id, &["file"])?;
        log::debug!("GET {url}");

        let bytes = self.send(self.client.get(url), StatusCode::OK).await?;
        log::debug!("Downloaded {} bytes of audio for {}", bytes.len(), remote_job_id);
        Ok(bytes)
    }

    fn name(&self) -> &str {
        "gladia"
    }
}

// ─── リクエストボディ ───────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PreRecordedBody<'a> {
    audio_url: &'a str,
    diarization: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    diarization_config: Option<DiarizationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_config: Option<LanguageConfig<'a>>,
    translation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    translation_config: Option<TranslationConfig<'a>>,
    subtitles: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    subtitles_config: Option<SubtitlesConfig<'a>>,
    sentiment_analysis: bool,
}

#[derive(Debug, Serialize)]
struct DiarizationConfig {
    enhanced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    number_of_speakers: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_speakers: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_speakers: Option<u8>,
}

#[derive(Debug, Serialize)]
struct LanguageConfig<'a> {
    languages: &'a [String],
    code_switching: bool,
}

#[derive(Debug, Serialize)]
struct TranslationConfig<'a> {
    target_languages: &'a [String],
}

#[derive(Debug, Serialize)]
struct SubtitlesConfig<'a> {
    formats: &'a [String],
}

impl<'a> PreRecordedBody<'a> {
    /// audio_url の有無のみ検証し、その他のオプションはそのまま渡す。
    fn from_request(request: &'a JobRequest) -> Result<Self, ClientError> {
        if request.audio_url.trim().is_empty() {
            return Err(ClientError::InvalidRequest("audio_url is required".into()));
        }
        let opts = &request.options;
        let d = &opts.diarization_config;

        Ok(Self {
            audio_url: &request.audio_url,
            diarization: opts.diarization,
            diarization_config: opts.diarization.then(|| DiarizationConfig {
                enhanced: d.enhanced,
                number_of_speakers: d.number_of_speakers,
                min_speakers: d.min_speakers,
                max_speakers: d.max_speakers,
            }),
            language_config: (!opts.languages.is_empty()).then(|| LanguageConfig {
                languages: &opts.languages,
                code_switching: false,
            }),
            translation: opts.translation,
            translation_config: opts.translation.then(|| TranslationConfig {
                target_languages: &opts.target_languages,
            }),
            subtitles: opts.subtitles,
            subtitles_config: opts.subtitles.then(|| SubtitlesConfig {
                formats: &opts.subtitle_formats,
            }),
            sentiment_analysis: opts.sentiment_analysis,
        })
    }
}

// ─── レスポンス ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UploadResponse {
    audio_url: String,
    #[serde(default)]
    audio_metadata: AudioMetadata,
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    id: String,
    #[serde(default)]
    result_url: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    error_code: Option<serde_json::Value>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<RemoteJobSummary>,
    #[serde(default)]
    next: Option<String>,
}

fn parse_upload_response(bytes: &[u8]) -> Result<UploadedAudio, ClientError> {
    let resp: UploadResponse = serde_json::from_slice(bytes)
        .map_err(|e| ClientError::Decode(format!("upload response: {e}")))?;
    if resp.audio_url.is_empty() {
        return Err(ClientError::Decode("upload response has empty audio_url".into()));
    }
    log::debug!("Uploaded audio metadata: {:?}", resp.audio_metadata);
    Ok(UploadedAudio {
        audio_url: resp.audio_url,
        metadata: resp.audio_metadata,
    })
}

fn parse_init_response(bytes: &[u8]) -> Result<SubmittedJob, ClientError> {
    let resp: InitResponse = serde_json::from_slice(bytes)
        .map_err(|e| ClientError::Decode(format!("init response: {e}")))?;
    if resp.id.is_empty() {
        return Err(ClientError::Decode("init response has empty id".into()));
    }
    Ok(SubmittedJob {
        remote_job_id: resp.id,
        result_url: resp.result_url,
    })
}

fn parse_status_response(bytes: &[u8]) -> Result<RemoteStatus, ClientError> {
    let resp: StatusResponse = serde_json::from_slice(bytes)
        .map_err(|e| ClientError::Decode(format!("status response: {e}")))?;
    let state = RemoteState::parse(&resp.status)
        .ok_or_else(|| ClientError::Decode(format!("unknown job status: {}", resp.status)))?;

    // error_code は数値の場合と文字列の場合がある
    let error_code = match resp.error_code {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    };
    let result = resp.result.filter(|v| !v.is_null());

    Ok(RemoteStatus {
        state,
        result,
        error_code,
    })
}

fn parse_list_response(bytes: &[u8]) -> Result<RemoteJobPage, ClientError> {
    let resp: ListResponse = serde_json::from_slice(bytes)
        .map_err(|e| ClientError::Decode(format!("list response: {e}")))?;
    Ok(RemoteJobPage {
        items: resp.items,
        next: resp.next.filter(|n| !n.is_empty()),
    })
}
