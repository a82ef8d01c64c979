use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use super::{JobStore, StoreError};
use crate::domain::job::{JobRecord, JobStatus};

const SELECT_COLUMNS: &str = "SELECT id, file_path, file_url, remote_job_id, result_url, status, results, error, created_at, updated_at FROM jobs";

/// SQLiteストレージ（jobs）
pub struct SqliteJobStore {
    conn: Connection,
}

impl SqliteJobStore {
    /// 新規接続（ファイルパス指定）。親ディレクトリがなければ作成する。
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                StoreError::Persistence(format!("DBディレクトリ作成に失敗: {}: {e}", dir.display()))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Persistence(format!("DB接続に失敗: {e}")))?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// in-memory DB（テスト用）
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Persistence(format!("in-memory DB作成に失敗: {e}")))?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// スキーマ作成（起動ごとに呼んでも安全）
    fn migrate(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS jobs (
                    id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    file_path     TEXT NOT NULL,
                    file_url      TEXT NOT NULL DEFAULT '',
                    remote_job_id TEXT NOT NULL DEFAULT '',
                    result_url    TEXT NOT NULL DEFAULT '',
                    status        TEXT NOT NULL,
                    results       BLOB NOT NULL DEFAULT x'',
                    error         TEXT,
                    created_at    TEXT NOT NULL,
                    updated_at    TEXT NOT NULL
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_remote_job_id
                    ON jobs(remote_job_id) WHERE remote_job_id <> '';
                ",
            )
            .map_err(|e| StoreError::Persistence(format!("マイグレーション失敗: {e}")))?;
        Ok(())
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<JobRecord> {
        let status_str: String = row.get(5)?;
        let status = JobStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                Box::new(StoreError::Persistence(format!(
                    "不正なステータス: {status_str}"
                ))),
            )
        })?;

        Ok(JobRecord {
            id: row.get(0)?,
            file_path: row.get(1)?,
            file_url: row.get(2)?,
            remote_job_id: row.get(3)?,
            result_url: row.get(4)?,
            status,
            results: row.get(6)?,
            error: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn query_one(
        &self,
        clause: &str,
        param: &dyn rusqlite::ToSql,
        what: String,
    ) -> Result<JobRecord, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE {clause}");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| StoreError::Persistence(format!("クエリ準備失敗: {e}")))?;

        stmt.query_row([param], Self::map_row)
            .optional()
            .map_err(|e| StoreError::Persistence(format!("行読み取り失敗: {e}")))?
            .ok_or(StoreError::NotFound(what))
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, record: &JobRecord) -> Result<i64, StoreError> {
        self.conn
            .execute(
                "INSERT INTO jobs (file_path, file_url, remote_job_id, result_url, status, results, error, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.file_path,
                    record.file_url,
                    record.remote_job_id,
                    record.result_url,
                    record.status.as_str(),
                    record.results,
                    record.error,
                    record.created_at,
                    record.updated_at,
                ],
            )
            .map_err(|e| StoreError::Persistence(format!("ジョブ挿入失敗: {e}")))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_by_id(&self, id: i64) -> Result<JobRecord, StoreError> {
        self.query_one("id = ?1", &id, format!("job id {id}"))
    }

    fn get_by_remote_job_id(&self, remote_job_id: &str) -> Result<JobRecord, StoreError> {
        if remote_job_id.is_empty() {
            return Err(StoreError::NotFound("empty remote job id".into()));
        }
        self.query_one(
            "remote_job_id = ?1",
            &remote_job_id,
            format!("remote job id {remote_job_id}"),
        )
    }

    fn list_all(&self) -> Result<Vec<JobRecord>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY id ASC");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| StoreError::Persistence(format!("クエリ準備失敗: {e}")))?;

        let records = stmt
            .query_map([], Self::map_row)
            .map_err(|e| StoreError::Persistence(format!("クエリ実行失敗: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Persistence(format!("行読み取り失敗: {e}")))?;

        Ok(records)
    }

    fn update(&self, record: &JobRecord) -> Result<(), StoreError> {
        let affected = self
            .conn
            .execute(
                "UPDATE jobs
                 SET file_url = ?1, result_url = ?2, remote_job_id = ?3, status = ?4,
                     results = ?5, error = ?6, updated_at = ?7
                 WHERE id = ?8",
                params![
                    record.file_url,
                    record.result_url,
                    record.remote_job_id,
                    record.status.as_str(),
                    record.results,
                    record.error,
                    record.updated_at,
                    record.id,
                ],
            )
            .map_err(|e| StoreError::Persistence(format!("ジョブ更新失敗: {e}")))?;

        if affected == 0 {
            return Err(StoreError::NotFound(format!("job id {}", record.id)));
        }
        Ok(())
    }

    fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
        let affected = self
            .conn
            .execute("DELETE FROM jobs WHERE id = ?1", params![id])
            .map_err(|e| StoreError::Persistence(format!("ジョブ削除失敗: {e}")))?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("job id {id}")));
        }
        Ok(())
    }

    fn delete_by_remote_job_id(&self, remote_job_id: &str) -> Result<(), StoreError> {
        if remote_job_id.is_empty() {
            return Err(StoreError::NotFound("empty remote job id".into()));
        }
        let affected = self
            .conn
            .execute(
                "DELETE FROM jobs WHERE remote_job_id = ?1",
                params![remote_job_id],
            )
            .map_err(|e| StoreError::Persistence(format!("ジョブ削除失敗: {e}")))?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("remote job id {remote_job_id}")));
        }
        Ok(())
    }
}
