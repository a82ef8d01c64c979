//! ジョブライフサイクル統合テスト。
//!
//! SQLite ファイルストア + エクスポータ + フェイク API を公開 API 経由で組み合わせる。
//! 実 API を使うテストは `--ignored` 指定時のみ:
//! - VOXJOB_API_KEY: API キー
//! - VOXJOB_TEST_AUDIO: アップロードする音声ファイル
//!
//! 実行: cargo test --test job_lifecycle -- --ignored

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use vj_core::domain::error::ErrorCode;
use vj_core::domain::job::{JobStatus, RemoteState, RemoteStatus};
use vj_core::domain::settings::{ApiSettings, PollSettings, TranscriptionOptions};
use vj_core::infra::api::{
    AudioUpload, ClientError, HttpTranscriptionClient, JobRequest, RemoteJobPage, SubmittedJob,
    TranscriptionApi, UploadedAudio,
};
use vj_core::infra::export::{ExportFormat, ResultExporter};
use vj_core::infra::storage::SqliteJobStore;
use vj_core::usecase::JobService;

/// アップロードごとに連番のリモートIDを払い出すフェイク
struct FakeRemote {
    submitted: Mutex<u32>,
    statuses: Mutex<VecDeque<RemoteStatus>>,
}

impl FakeRemote {
    fn new(statuses: Vec<RemoteStatus>) -> Self {
        Self {
            submitted: Mutex::new(0),
            statuses: Mutex::new(statuses.into()),
        }
    }
}

#[async_trait]
impl TranscriptionApi for FakeRemote {
    async fn upload(&self, audio: AudioUpload) -> Result<UploadedAudio, ClientError> {
        Ok(UploadedAudio {
            audio_url: format!("https://files.test/{}", audio.file_name),
            metadata: Default::default(),
        })
    }

    async fn submit_job(&self, _request: &JobRequest) -> Result<SubmittedJob, ClientError> {
        let mut n = self.submitted.lock();
        *n += 1;
        Ok(SubmittedJob {
            remote_job_id: format!("remote-{n}"),
            result_url: format!("https://api.test/v2/pre-recorded/remote-{n}"),
        })
    }

    async fn fetch_status(&self, _remote_job_id: &str) -> Result<RemoteStatus, ClientError> {
        Ok(self
            .statuses
            .lock()
            .pop_front()
            .unwrap_or_else(|| RemoteStatus::pending(RemoteState::Processing)))
    }

    async fn delete_job(&self, _remote_job_id: &str) -> Result<(), ClientError> {
        Ok(())
    }

    async fn list_remote(&self, _limit: u32) -> Result<RemoteJobPage, ClientError> {
        Ok(RemoteJobPage::default())
    }

    async fn download_audio(&self, _remote_job_id: &str) -> Result<Vec<u8>, ClientError> {
        Ok(b"RIFF".to_vec())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

fn done(transcript: &str) -> RemoteStatus {
    RemoteStatus {
        state: RemoteState::Done,
        result: Some(serde_json::json!({
            "metadata": { "audio_duration": 2.0 },
            "transcription": { "full_transcript": transcript, "utterances": [] }
        })),
        error_code: None,
    }
}

fn write_audio(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"RIFF0000WAVEfmt ").unwrap();
    path
}

fn fast_poll() -> PollSettings {
    PollSettings::new(Duration::from_millis(10), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn lifecycle_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("state").join("jobs.db");
    let audio = write_audio(dir.path(), "call.wav");

    let id = {
        let api = Arc::new(FakeRemote::new(vec![
            RemoteStatus::pending(RemoteState::Queued),
            done("see you tomorrow"),
        ]));
        let store = SqliteJobStore::open(&db).unwrap();
        let service = JobService::new(api, Box::new(store));

        let id = service.upload(&audio).await.unwrap();
        let remote = service
            .submit_transcription(id, &TranscriptionOptions::default())
            .await
            .unwrap();
        assert_eq!(remote, "remote-1");

        let record = service
            .poll_until_done(id, fast_poll(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(record.status, JobStatus::Done);
        id
    };

    // 別プロセス相当: ストアを開き直して結果を書き出す
    let store = SqliteJobStore::open(&db).unwrap();
    let service = JobService::new(Arc::new(FakeRemote::new(vec![])), Box::new(store));
    let record = service.get_by_remote_job_id("remote-1").unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.status, JobStatus::Done);

    let txt = dir.path().join("call.txt");
    service.export(id, &txt, ExportFormat::Plain).unwrap();
    assert_eq!(std::fs::read_to_string(&txt).unwrap(), "see you tomorrow\n");

    let json = dir.path().join("call.json");
    ResultExporter::export(&record, &json, "structured").unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(value["metadata"]["audio_duration"], 2.0);
}

#[tokio::test]
async fn several_jobs_keep_independent_state() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeRemote::new(vec![done("first")]));
    let service = JobService::new(api, Box::new(SqliteJobStore::open_in_memory().unwrap()));

    let a = service.upload(&write_audio(dir.path(), "a.wav")).await.unwrap();
    let b = service.upload(&write_audio(dir.path(), "b.wav")).await.unwrap();
    let c = service.upload(&write_audio(dir.path(), "c.wav")).await.unwrap();
    assert_eq!((a, b, c), (1, 2, 3));

    let options = TranscriptionOptions::default();
    service.submit_transcription(a, &options).await.unwrap();
    service.submit_transcription(b, &options).await.unwrap();

    let status = service.fetch_status_once(a).await.unwrap();
    assert_eq!(status.state, RemoteState::Done);

    let summary: Vec<(i64, JobStatus)> = service
        .list()
        .unwrap()
        .iter()
        .map(|s| (s.id, s.status))
        .collect();
    assert_eq!(
        summary,
        vec![
            (1, JobStatus::Done),
            (2, JobStatus::Submitted),
            (3, JobStatus::Uploaded)
        ]
    );

    service.delete(b, true).await.unwrap();
    let ids: Vec<i64> = service.list().unwrap().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 3]);

    let d = service.upload(&write_audio(dir.path(), "d.wav")).await.unwrap();
    assert_eq!(d, 4);
}

#[tokio::test]
async fn unknown_export_format_leaves_directory_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(FakeRemote::new(vec![done("hi")]));
    let service = JobService::new(api, Box::new(SqliteJobStore::open_in_memory().unwrap()));

    let record = service
        .run(
            &write_audio(dir.path(), "x.wav"),
            &TranscriptionOptions::default(),
            fast_poll(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();
    let err = ResultExporter::export(&record, &out.join("x.srt"), "srt").unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownFormat);
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
}

#[tokio::test]
#[ignore]
async fn live_api_roundtrip() {
    let token = std::env::var("VOXJOB_API_KEY").expect("VOXJOB_API_KEY required for live tests");
    let audio = std::env::var("VOXJOB_TEST_AUDIO")
        .map(PathBuf::from)
        .expect("VOXJOB_TEST_AUDIO required for live tests");

    let settings = ApiSettings::builder()
        .token(token)
        .request_timeout(Duration::from_secs(60))
        .build()
        .unwrap();
    let api = Arc::new(HttpTranscriptionClient::new(settings).unwrap());
    let service = JobService::new(api, Box::new(SqliteJobStore::open_in_memory().unwrap()));

    let poll = PollSettings::new(Duration::from_secs(5), Duration::from_secs(600)).unwrap();
    let record = service
        .run(&audio, &TranscriptionOptions::default(), poll, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(record.status, JobStatus::Done);
    assert!(!record.results.is_empty());

    service.delete(record.id, true).await.unwrap();
}
