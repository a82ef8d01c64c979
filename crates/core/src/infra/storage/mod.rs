mod repository;

pub use repository::SqliteJobStore;

use crate::domain::error::AppError;
use crate::domain::job::JobRecord;

/// ストアのエラー
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        let msg = e.to_string();
        match e {
            StoreError::NotFound(_) => AppError::record_not_found(msg),
            StoreError::Persistence(_) => AppError::persistence(msg),
        }
    }
}

/// ジョブレコードの永続ストア。
///
/// 各操作は単独で完結し、複数呼び出しにまたがるトランザクションは持たない。
pub trait JobStore: Send {
    /// 新しい id を採番して挿入する。record.id は無視される。
    fn create(&self, record: &JobRecord) -> Result<i64, StoreError>;

    fn get_by_id(&self, id: i64) -> Result<JobRecord, StoreError>;

    fn get_by_remote_job_id(&self, remote_job_id: &str) -> Result<JobRecord, StoreError>;

    /// id 昇順の全件
    fn list_all(&self) -> Result<Vec<JobRecord>, StoreError>;

    /// 可変フィールドの全列更新。id と file_path は変更しない。
    fn update(&self, record: &JobRecord) -> Result<(), StoreError>;

    fn delete_by_id(&self, id: i64) -> Result<(), StoreError>;

    fn delete_by_remote_job_id(&self, remote_job_id: &str) -> Result<(), StoreError>;
}
