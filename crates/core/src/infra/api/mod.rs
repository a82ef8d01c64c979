pub mod gladia;

pub use gladia::HttpTranscriptionClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::AppError;
use crate::domain::job::RemoteStatus;
use crate::domain::settings::TranscriptionOptions;

/// リモートAPIクライアントのエラー
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unexpected HTTP status {actual} (expected {expected}): {body}")]
    ServerStatus {
        expected: u16,
        actual: u16,
        body: String,
    },
    #[error("Response decode error: {0}")]
    Decode(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<ClientError> for AppError {
    fn from(e: ClientError) -> Self {
        let msg = e.to_string();
        match e {
            ClientError::Network(_) => AppError::network(msg),
            ClientError::ServerStatus { .. } => AppError::server_status(msg),
            ClientError::Decode(_) => AppError::decode(msg),
            ClientError::InvalidRequest(_) => AppError::invalid_input(msg),
        }
    }
}

/// アップロード対象の音声
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// アップロードされた音声のメタデータ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub audio_duration: f64,
    #[serde(default)]
    pub number_of_channels: u32,
}

/// アップロード結果
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedAudio {
    pub audio_url: String,
    pub metadata: AudioMetadata,
}

/// ジョブ投入パラメータ
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub audio_url: String,
    pub options: TranscriptionOptions,
}

/// ジョブ投入結果
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedJob {
    pub remote_job_id: String,
    pub result_url: String,
}

/// リモートに登録済みジョブの一覧項目
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteJobSummary {
    pub id: String,
    #[serde(default)]
    pub request_id: String,
    pub status: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// リモートジョブ一覧の1ページ
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteJobPage {
    pub items: Vec<RemoteJobSummary>,
    /// 次ページのURL（なければ None）
    pub next: Option<String>,
}

/// 書き起こしサービスの trait。
///
/// 全呼び出しは単発でリトライしない。再試行の判断はオーケストレータが行う。
#[async_trait]
pub trait TranscriptionApi: Send + Sync {
    /// 音声ファイルをアップロードする（成功: 200）
    async fn upload(&self, audio: AudioUpload) -> Result<UploadedAudio, ClientError>;

    /// 書き起こしジョブを投入する（成功: 201）
    async fn submit_job(&self, request: &JobRequest) -> Result<SubmittedJob, ClientError>;

    /// ジョブの状態を1回取得する（成功: 200）
    async fn fetch_status(&self, remote_job_id: &str) -> Result<RemoteStatus, ClientError>;

    /// リモートのジョブとデータを削除する（成功: 202）
    async fn delete_job(&self, remote_job_id: &str) -> Result<(), ClientError>;

    /// 投入済みジョブを新しい順に最大 `limit` 件取得する（成功: 200）
    async fn list_remote(&self, limit: u32) -> Result<RemoteJobPage, ClientError>;

    /// ジョブに使われた音声ファイルを取得する（成功: 200）
    async fn download_audio(&self, remote_job_id: &str) -> Result<Vec<u8>, ClientError>;

    fn name(&self) -> &str;
}
