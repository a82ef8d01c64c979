mod args;
mod commands;
mod config;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use vj_core::domain::error::AppError;
use vj_core::domain::job::RemoteStatus;
use vj_core::infra::api::{
    AudioUpload, ClientError, HttpTranscriptionClient, JobRequest, RemoteJobPage, SubmittedJob,
    TranscriptionApi, UploadedAudio,
};
use vj_core::infra::output::StdoutOutput;
use vj_core::infra::storage::SqliteJobStore;
use vj_core::usecase::JobService;

use crate::args::{Args, Command};
use crate::commands::{CommandError, Context};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    if let Err(e) = logging::init_logging(&config.log_level, config.log_path.as_deref()) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if let Some(id) = e.job_id() {
                eprintln!("job {id} keeps its last state; see `voxjob info {id}`");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(args: Args, config: AppConfig) -> Result<(), CommandError> {
    let api = build_api(&config, &args.command)?;
    let store = SqliteJobStore::open(&config.db_path).map_err(AppError::from)?;
    tracing::debug!(db = %config.db_path.display(), api = api.name(), "job store opened");
    let service = JobService::new(api, Box::new(store));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let out = StdoutOutput::new();
    let ctx = Context {
        service: &service,
        config: &config,
        out: &out,
        cancel,
    };
    commands::dispatch(&ctx, args.command).await
}

/// API キーがなければローカル専用コマンドに限り OfflineApi で動かす
fn build_api(config: &AppConfig, command: &Command) -> Result<Arc<dyn TranscriptionApi>, AppError> {
    match config.api_settings() {
        Ok(settings) => Ok(Arc::new(HttpTranscriptionClient::new(settings)?)),
        Err(e) if command.needs_api() => Err(e),
        Err(_) => Ok(Arc::new(OfflineApi)),
    }
}

/// ネットワークを使わないコマンド用の API。呼ばれた時点で失敗する。
struct OfflineApi;

impl OfflineApi {
    fn unavailable() -> ClientError {
        ClientError::InvalidRequest("VOXJOB_API_KEY is not set".to_string())
    }
}

#[async_trait]
impl TranscriptionApi for OfflineApi {
    async fn upload(&self, _audio: AudioUpload) -> Result<UploadedAudio, ClientError> {
        Err(Self::unavailable())
    }

    async fn submit_job(&self, _request: &JobRequest) -> Result<SubmittedJob, ClientError> {
        Err(Self::unavailable())
    }

    async fn fetch_status(&self, _remote_job_id: &str) -> Result<RemoteStatus, ClientError> {
        Err(Self::unavailable())
    }

    async fn delete_job(&self, _remote_job_id: &str) -> Result<(), ClientError> {
        Err(Self::unavailable())
    }

    async fn list_remote(&self, _limit: u32) -> Result<RemoteJobPage, ClientError> {
        Err(Self::unavailable())
    }

    async fn download_audio(&self, _remote_job_id: &str) -> Result<Vec<u8>, ClientError> {
        Err(Self::unavailable())
    }

    fn name(&self) -> &str {
        "offline"
    }
}
