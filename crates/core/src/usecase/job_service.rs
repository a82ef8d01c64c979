use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::domain::error::AppError;
use crate::domain::job::{JobRecord, JobStatus, JobSummary, RemoteState, RemoteStatus};
use crate::domain::settings::{PollSettings, TranscriptionOptions};
use crate::infra::api::{AudioUpload, JobRequest, RemoteJobPage, TranscriptionApi};
use crate::infra::export::{write_atomic, ExportFormat, ResultExporter};
use crate::infra::storage::JobStore;

/// ジョブのライフサイクル（アップロード → 投入 → ポーリング → 完了）を管理する。
///
/// ストアのロックは await をまたいで保持しない。
pub struct JobService {
    api: Arc<dyn TranscriptionApi>,
    store: Mutex<Box<dyn JobStore>>,
}

impl JobService {
    pub fn new(api: Arc<dyn TranscriptionApi>, store: Box<dyn JobStore>) -> Self {
        Self {
            api,
            store: Mutex::new(store),
        }
    }

    // ==================== Upload ====================

    /// 音声ファイルをアップロードし、ローカルレコードを作成する。
    ///
    /// アップロード失敗時も status = error のレコードを残し、
    /// 返すエラーの `job_id` にその ID を入れる。
    pub async fn upload(&self, path: &Path) -> Result<i64, AppError> {
        let audio = read_audio(path).await?;
        let file_path = path.to_string_lossy().into_owned();
        let size = audio.bytes.len();

        let outcome = self.api.upload(audio).await;
        let mut record = JobRecord::new(file_path, JobStatus::Uploaded, now());
        let failure = match outcome {
            Ok(uploaded) => {
                record.file_url = uploaded.audio_url;
                None
            }
            Err(e) => {
                let err = AppError::from(e);
                record.status = JobStatus::Error;
                record.error = Some(err.descriptor());
                Some(err)
            }
        };

        let created = self.store.lock().create(&record);
        let id = match (created, &failure) {
            (Ok(id), _) => id,
            (Err(e), None) => return Err(e.into()),
            (Err(e), Some(upload_err)) => {
                let mut err = AppError::from(e);
                err.message = format!("{} (upload had failed: {upload_err})", err.message);
                return Err(err);
            }
        };
        match failure {
            None => {
                log::info!("Uploaded {} ({} bytes) as job {}", path.display(), size, id);
                Ok(id)
            }
            Some(err) => {
                log::warn!("Upload of {} failed, recorded as job {}: {}", path.display(), id, err);
                Err(err.with_job_id(id))
            }
        }
    }

    // ==================== Submit ====================

    /// アップロード済みレコードの書き起こしジョブを投入し、リモートジョブIDを返す。
    pub async fn submit_transcription(
        &self,
        id: i64,
        options: &TranscriptionOptions,
    ) -> Result<String, AppError> {
        options.validate()?;

        let mut record = self.get(id)?;
        if !record.is_uploaded() {
            return Err(AppError::record_not_found(format!(
                "job {id} has no uploaded audio"
            )));
        }
        if record.status != JobStatus::Uploaded {
            return Err(AppError::invalid_state(format!(
                "job {id} is already {}",
                record.status
            )));
        }

        let request = JobRequest {
            audio_url: record.file_url.clone(),
            options: options.clone(),
        };
        match self.api.submit_job(&request).await {
            Ok(submitted) => {
                record.remote_job_id = submitted.remote_job_id;
                record.result_url = submitted.result_url;
                advance(&mut record, JobStatus::Submitted)?;
                self.store.lock().update(&record)?;
                log::info!("Submitted job {} as remote job {}", id, record.remote_job_id);
                Ok(record.remote_job_id)
            }
            Err(e) => {
                let err = AppError::from(e);
                advance(&mut record, JobStatus::Error)?;
                record.error = Some(err.descriptor());
                self.store.lock().update(&record)?;
                log::warn!("Submit of job {} failed: {}", id, err);
                Err(err.with_job_id(id))
            }
        }
    }

    // ==================== Status ====================

    /// リモートの状態を1回だけ取得する。
    ///
    /// 終端状態を観測したときのみローカルレコードを更新する。
    /// 通信やデコードの失敗ではレコードを変更しない。
    pub async fn fetch_status_once(&self, id: i64) -> Result<RemoteStatus, AppError> {
        let record = self.get(id)?;
        if !record.is_submitted() {
            return Err(AppError::record_not_found(format!(
                "job {id} has not been submitted"
            )));
        }

        let status = self.api.fetch_status(&record.remote_job_id).await?;
        log::debug!("Job {} remote state: {}", id, status.state.as_str());

        if status.state.is_terminal() && !record.status.is_terminal() {
            self.record_terminal(record, &status)?;
        }
        Ok(status)
    }

    fn record_terminal(&self, mut record: JobRecord, status: &RemoteStatus) -> Result<(), AppError> {
        match status.state {
            RemoteState::Done => {
                let payload = status
                    .result
                    .clone()
                    .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
                record.results = serde_json::to_vec(&payload)
                    .map_err(|e| AppError::decode(format!("result serialize: {e}")))?;
                record.error = None;
                advance(&mut record, JobStatus::Done)?;
                log::info!("Job {} done", record.id);
            }
            RemoteState::Error => {
                let err = AppError::remote_job_failed(remote_code(status));
                record.error = Some(err.descriptor());
                advance(&mut record, JobStatus::Error)?;
                log::warn!("Job {} failed remotely: {}", record.id, err);
            }
            RemoteState::Queued | RemoteState::Processing => return Ok(()),
        }
        self.store.lock().update(&record)?;
        Ok(())
    }

    /// 終端状態になるまで一定間隔でポーリングする。
    ///
    /// 最初の確認は開始から1間隔後。期限は開始時に1度だけ決める（ゼロは無期限）。
    /// タイムアウト/キャンセル時のレコードは polling のまま残る。
    pub async fn poll_until_done(
        &self,
        id: i64,
        poll: PollSettings,
        cancel: &CancellationToken,
    ) -> Result<JobRecord, AppError> {
        if poll.interval.is_zero() {
            return Err(AppError::invalid_input("poll interval must be greater than zero"));
        }

        let mut record = self.get(id)?;
        if !record.is_submitted() {
            return Err(AppError::record_not_found(format!(
                "job {id} has not been submitted"
            )));
        }
        match record.status {
            JobStatus::Done => return Ok(record),
            JobStatus::Error => return Err(stored_failure(&record).with_job_id(id)),
            JobStatus::Polling => {}
            JobStatus::Uploaded | JobStatus::Submitted => {
                advance(&mut record, JobStatus::Polling)?;
                self.store.lock().update(&record)?;
            }
        }

        let start = Instant::now();
        let deadline = (!poll.timeout.is_zero()).then(|| start + poll.timeout);
        let expiry = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        let mut ticker = tokio::time::interval_at(start + poll.interval, poll.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks: u64 = 0;

        log::info!(
            "Polling job {} every {:?} (timeout: {:?})",
            id,
            poll.interval,
            poll.timeout
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::info!("Polling of job {} cancelled after {} checks", id, ticks);
                    return Err(AppError::cancelled().with_job_id(id));
                }
                _ = &mut expiry => {
                    log::warn!("Polling of job {} timed out after {:?}", id, poll.timeout);
                    return Err(AppError::timeout(format!(
                        "job {id} not finished within {:?}",
                        poll.timeout
                    ))
                    .with_job_id(id));
                }
                _ = ticker.tick() => {
                    ticks += 1;
                    let status = self
                        .fetch_status_once(id)
                        .await
                        .map_err(|e| e.with_job_id(id))?;
                    match status.state {
                        RemoteState::Done => return self.get(id),
                        RemoteState::Error => {
                            return Err(AppError::remote_job_failed(remote_code(&status)).with_job_id(id));
                        }
                        RemoteState::Queued | RemoteState::Processing => {}
                    }
                }
            }
        }
    }

    // ==================== Query ====================

    pub fn get(&self, id: i64) -> Result<JobRecord, AppError> {
        Ok(self.store.lock().get_by_id(id)?)
    }

    pub fn get_by_remote_job_id(&self, remote_job_id: &str) -> Result<JobRecord, AppError> {
        Ok(self.store.lock().get_by_remote_job_id(remote_job_id)?)
    }

    pub fn list(&self) -> Result<Vec<JobSummary>, AppError> {
        let records = self.store.lock().list_all()?;
        Ok(records.iter().map(JobRecord::summary).collect())
    }

    // ==================== Delete / Export ====================

    /// ローカルレコードを削除する。`remote` が真ならリモート側を先に削除し、
    /// その失敗時はローカルレコードを残す。
    pub async fn delete(&self, id: i64, remote: bool) -> Result<(), AppError> {
        let record = self.get(id)?;
        if remote {
            if record.is_submitted() {
                self.api.delete_job(&record.remote_job_id).await?;
                log::info!("Deleted remote job {}", record.remote_job_id);
            } else {
                log::debug!("Job {} was never submitted; nothing to delete remotely", id);
            }
        }
        self.store.lock().delete_by_id(id)?;
        log::info!("Deleted job {}", id);
        Ok(())
    }

    pub fn export(&self, id: i64, dest: &Path, format: ExportFormat) -> Result<(), AppError> {
        let record = self.get(id)?;
        ResultExporter::export_as(&record, dest, format)
    }

    // ==================== Remote ====================

    /// リモートに登録済みのジョブ一覧（ローカルストアは参照しない）
    pub async fn list_remote(&self, limit: u32) -> Result<RemoteJobPage, AppError> {
        Ok(self.api.list_remote(limit).await?)
    }

    /// 投入済みジョブの音声をリモートから取得して `dest` に書く。書き込んだバイト数を返す。
    pub async fn download_audio(&self, id: i64, dest: &Path) -> Result<usize, AppError> {
        let record = self.get(id)?;
        if !record.is_submitted() {
            return Err(AppError::record_not_found(format!(
                "job {id} has not been submitted"
            )));
        }
        let bytes = self.api.download_audio(&record.remote_job_id).await?;
        write_atomic(dest, &bytes)?;
        log::info!("Saved audio of job {} to {}", id, dest.display());
        Ok(bytes.len())
    }

    // ==================== Run ====================

    /// アップロードから完了までを一括で行う
    pub async fn run(
        &self,
        path: &Path,
        options: &TranscriptionOptions,
        poll: PollSettings,
        cancel: &CancellationToken,
    ) -> Result<JobRecord, AppError> {
        options.validate()?;
        if cancel.is_cancelled() {
            return Err(AppError::cancelled());
        }
        let id = self.upload(path).await?;
        if cancel.is_cancelled() {
            log::info!("Run cancelled after upload; job {} stays uploaded", id);
            return Err(AppError::cancelled().with_job_id(id));
        }
        self.submit_transcription(id, options).await?;
        self.poll_until_done(id, poll, cancel).await
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn advance(record: &mut JobRecord, next: JobStatus) -> Result<(), AppError> {
    if !record.status.can_transition_to(next) {
        return Err(AppError::invalid_state(format!(
            "job {} cannot move from {} to {}",
            record.id, record.status, next
        )));
    }
    record.status = next;
    record.updated_at = now();
    Ok(())
}

fn remote_code(status: &RemoteStatus) -> String {
    status
        .error_code
        .clone()
        .unwrap_or_else(|| "unknown".to_string())
}

/// 記録済みエラー記述子からリモートエラーを復元する
fn stored_failure(record: &JobRecord) -> AppError {
    let code = record
        .error
        .as_deref()
        .and_then(|e| serde_json::from_str::<serde_json::Value>(e).ok())
        .and_then(|v| v.get("remote_code").and_then(|c| c.as_str()).map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());
    AppError::remote_job_failed(code)
}

async fn read_audio(path: &Path) -> Result<AudioUpload, AppError> {
    let not_found = |e: std::io::Error| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::file_not_found(format!("{}: {e}", path.display()))
        } else {
            AppError::persistence(format!("failed to read {}: {e}", path.display()))
        }
    };

    let meta = tokio::fs::metadata(path).await.map_err(not_found)?;
    if !meta.is_file() {
        return Err(AppError::file_not_found(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    let bytes = {
        let mut file = tokio::fs::File::open(path).await.map_err(not_found)?;
        let mut buf = Vec::with_capacity(meta.len() as usize);
        file.read_to_end(&mut buf).await.map_err(not_found)?;
        buf
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    Ok(AudioUpload { file_name, bytes })
}
