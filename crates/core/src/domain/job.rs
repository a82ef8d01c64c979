use serde::{Deserialize, Serialize};

/// ローカルのジョブ状態
///
/// `Uploaded → Submitted → Polling → {Done | Error}` の前進のみを許す。
/// アップロード/投入の失敗時は途中の状態から直接 `Error` へ遷移する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Uploaded,
    Submitted,
    Polling,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(Self::Uploaded),
            "submitted" => Some(Self::Submitted),
            "polling" => Some(Self::Polling),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Uploaded => 0,
            Self::Submitted => 1,
            Self::Polling => 2,
            Self::Done | Self::Error => 3,
        }
    }

    /// 遷移可否。同一状態への遷移は Polling のみ許す（ティックごとの再記録）。
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == JobStatus::Error {
            return true;
        }
        if *self == next {
            return next == JobStatus::Polling;
        }
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// リモート側のジョブ状態（生文字列をマッピングしたもの）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    Queued,
    Processing,
    Done,
    Error,
}

impl RemoteState {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// ローカル状態へのマッピング
    pub fn local_status(&self) -> JobStatus {
        match self {
            Self::Queued | Self::Processing => JobStatus::Polling,
            Self::Done => JobStatus::Done,
            Self::Error => JobStatus::Error,
        }
    }
}

/// ステータス取得1回分の結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStatus {
    pub state: RemoteState,
    /// 完了時の結果ペイロード
    pub result: Option<serde_json::Value>,
    /// エラー時のリモートエラーコード
    pub error_code: Option<String>,
}

impl RemoteStatus {
    pub fn pending(state: RemoteState) -> Self {
        Self {
            state,
            result: None,
            error_code: None,
        }
    }
}

/// ジョブレコード（ローカルストアの1行）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    /// ローカル採番ID。挿入前は 0。
    pub id: i64,
    pub file_path: String,
    pub file_url: String,
    pub remote_job_id: String,
    pub result_url: String,
    pub status: JobStatus,
    /// 完了時の結果ペイロード（シリアライズ済み）
    #[serde(skip)]
    pub results: Vec<u8>,
    /// status = error の場合のエラー記述子
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRecord {
    pub fn new(file_path: impl Into<String>, status: JobStatus, now: String) -> Self {
        Self {
            id: 0,
            file_path: file_path.into(),
            file_url: String::new(),
            remote_job_id: String::new(),
            result_url: String::new(),
            status,
            results: Vec::new(),
            error: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        !self.file_url.is_empty()
    }

    pub fn is_submitted(&self) -> bool {
        !self.remote_job_id.is_empty()
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            file_path: self.file_path.clone(),
            remote_job_id: self.remote_job_id.clone(),
            status: self.status,
            has_result: !self.results.is_empty(),
            updated_at: self.updated_at.clone(),
        }
    }
}

/// 一覧表示用サマリー
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub id: i64,
    pub file_path: String,
    pub remote_job_id: String,
    pub status: JobStatus,
    pub has_result: bool,
    pub updated_at: String,
}
