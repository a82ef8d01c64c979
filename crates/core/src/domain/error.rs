use serde::Serialize;

/// アプリケーション共通エラーコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "E_FILE_NOT_FOUND")]
    FileNotFound,
    #[serde(rename = "E_NETWORK")]
    Network,
    #[serde(rename = "E_SERVER_STATUS")]
    ServerStatus,
    #[serde(rename = "E_DECODE")]
    Decode,
    #[serde(rename = "E_PERSISTENCE")]
    Persistence,
    #[serde(rename = "E_RECORD_NOT_FOUND")]
    RecordNotFound,
    #[serde(rename = "E_REMOTE_JOB_FAILED")]
    RemoteJobFailed,
    #[serde(rename = "E_TIMEOUT")]
    Timeout,
    #[serde(rename = "E_CANCELLED")]
    Cancelled,
    #[serde(rename = "E_UNKNOWN_FORMAT")]
    UnknownFormat,
    #[serde(rename = "E_INVALID_INPUT")]
    InvalidInput,
    #[serde(rename = "E_INVALID_STATE")]
    InvalidState,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileNotFound => "E_FILE_NOT_FOUND",
            Self::Network => "E_NETWORK",
            Self::ServerStatus => "E_SERVER_STATUS",
            Self::Decode => "E_DECODE",
            Self::Persistence => "E_PERSISTENCE",
            Self::RecordNotFound => "E_RECORD_NOT_FOUND",
            Self::RemoteJobFailed => "E_REMOTE_JOB_FAILED",
            Self::Timeout => "E_TIMEOUT",
            Self::Cancelled => "E_CANCELLED",
            Self::UnknownFormat => "E_UNKNOWN_FORMAT",
            Self::InvalidInput => "E_INVALID_INPUT",
            Self::InvalidState => "E_INVALID_STATE",
        }
    }
}

/// アプリケーションエラー
///
/// コア層はプロセスを終了させない。全てのエラーは呼び出し元へ返し、
/// 表示と終了コードの決定は CLI 層が行う。
#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
    /// リモートが返したエラーコード（RemoteJobFailed のみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_code: Option<String>,
    /// 失敗を記録したローカルジョブID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<i64>,
}

impl AppError {
    fn new(code: ErrorCode, msg: impl Into<String>, recoverable: bool) -> Self {
        Self {
            code,
            message: msg.into(),
            recoverable,
            remote_code: None,
            job_id: None,
        }
    }

    pub fn with_job_id(mut self, id: i64) -> Self {
        self.job_id = Some(id);
        self
    }

    pub fn file_not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::FileNotFound, msg, false)
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Network, msg, true)
    }

    pub fn server_status(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServerStatus, msg, true)
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Decode, msg, false)
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Persistence, msg, false)
    }

    pub fn record_not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RecordNotFound, msg, false)
    }

    pub fn remote_job_failed(remote_code: impl Into<String>) -> Self {
        let remote_code = remote_code.into();
        Self {
            code: ErrorCode::RemoteJobFailed,
            message: format!("remote job failed with code {remote_code}"),
            recoverable: false,
            remote_code: Some(remote_code),
            job_id: None,
        }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, msg, true)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "operation cancelled", true)
    }

    pub fn unknown_format(tag: &str) -> Self {
        Self::new(
            ErrorCode::UnknownFormat,
            format!("unknown export format: {tag}"),
            false,
        )
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg, false)
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, msg, true)
    }

    /// 永続化用のエラー記述子（JSON）
    pub fn descriptor(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {}
