use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use vj_core::domain::error::{AppError, ErrorCode};
use vj_core::domain::job::{JobRecord, JobSummary, RemoteState};
use vj_core::domain::settings::PollSettings;
use vj_core::infra::export::ExportFormat;
use vj_core::infra::output::OutputTarget;
use vj_core::usecase::JobService;

use crate::args::Command;
use crate::config::AppConfig;

/// コマンドエラー型
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    App(#[from] AppError),
}

impl CommandError {
    /// プロセス終了コード
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::App(e) => match e.code {
                ErrorCode::InvalidInput | ErrorCode::UnknownFormat => 2,
                ErrorCode::Timeout => 124,
                ErrorCode::Cancelled => 130,
                _ => 1,
            },
        }
    }

    pub fn job_id(&self) -> Option<i64> {
        match self {
            Self::App(e) => e.job_id,
        }
    }
}

type CmdResult<T> = Result<T, CommandError>;

/// コマンド実行に必要な依存
pub struct Context<'a> {
    pub service: &'a JobService,
    pub config: &'a AppConfig,
    pub out: &'a dyn OutputTarget,
    pub cancel: CancellationToken,
}

impl Context<'_> {
    fn emit(&self, line: impl AsRef<str>) -> CmdResult<()> {
        self.out.emit(line.as_ref())?;
        Ok(())
    }
}

/// コマンドを実行する。キャンセルされた時点で実行中の処理（HTTP 待ちを含む）を破棄する。
pub async fn dispatch(ctx: &Context<'_>, command: Command) -> CmdResult<()> {
    tokio::select! {
        biased;
        result = execute(ctx, command) => result,
        _ = ctx.cancel.cancelled() => {
            tracing::warn!("command interrupted");
            Err(AppError::cancelled().into())
        }
    }
}

async fn execute(ctx: &Context<'_>, command: Command) -> CmdResult<()> {
    match command {
        Command::Upload { file } => upload(ctx, &file).await,
        Command::Start {
            id,
            wait,
            output,
            format,
        } => start(ctx, id, wait, output.as_deref(), format.as_deref()).await,
        Command::Status { id } => status(ctx, id).await,
        Command::Await {
            id,
            interval,
            timeout,
        } => {
            let poll = poll_settings(ctx.config.poll, interval, timeout)?;
            await_job(ctx, id, poll).await.map(|_| ())
        }
        Command::Run {
            file,
            output,
            format,
        } => run(ctx, &file, output.as_deref(), format.as_deref()).await,
        Command::List { remote: false, .. } => list(ctx),
        Command::List { remote: true, limit } => list_remote(ctx, limit).await,
        Command::Info { id } => info(ctx, id),
        Command::Export { id, path, format } => export(ctx, id, &path, format.as_deref()),
        Command::Audio { id, path } => audio(ctx, id, &path).await,
        Command::Delete { id, remote } => delete(ctx, id, remote).await,
    }
}

// --- Commands ---

async fn upload(ctx: &Context<'_>, file: &Path) -> CmdResult<()> {
    let id = ctx.service.upload(file).await?;
    let record = ctx.service.get(id)?;
    ctx.emit(format!("job {id}: {}", record.status))?;
    ctx.emit(format!("file url: {}", record.file_url))
}

async fn start(
    ctx: &Context<'_>,
    id: i64,
    wait: bool,
    output: Option<&Path>,
    format: Option<&str>,
) -> CmdResult<()> {
    let format = output.map(|p| resolve_format(p, format)).transpose()?;

    let remote_job_id = ctx
        .service
        .submit_transcription(id, &ctx.config.options)
        .await?;
    let record = ctx.service.get(id)?;
    ctx.emit(format!("job {id}: {} as {remote_job_id}", record.status))?;
    ctx.emit(format!("result url: {}", record.result_url))?;

    if wait || output.is_some() {
        await_job(ctx, id, ctx.config.poll).await?;
        if let (Some(path), Some(format)) = (output, format) {
            write_export(ctx, id, path, format)?;
        }
    }
    Ok(())
}

async fn status(ctx: &Context<'_>, id: i64) -> CmdResult<()> {
    let status = ctx.service.fetch_status_once(id).await?;
    ctx.emit(format!("job {id}: {}", status.state.as_str()))?;
    if status.state == RemoteState::Error {
        let code = status.error_code.as_deref().unwrap_or("unknown");
        ctx.emit(format!("remote error code: {code}"))?;
    }
    Ok(())
}

async fn await_job(ctx: &Context<'_>, id: i64, poll: PollSettings) -> CmdResult<JobRecord> {
    let record = ctx.service.poll_until_done(id, poll, &ctx.cancel).await?;
    ctx.emit(format!("job {id}: {}", record.status))?;
    Ok(record)
}

async fn run(
    ctx: &Context<'_>,
    file: &Path,
    output: Option<&Path>,
    format: Option<&str>,
) -> CmdResult<()> {
    let format = output.map(|p| resolve_format(p, format)).transpose()?;

    let record = ctx
        .service
        .run(file, &ctx.config.options, ctx.config.poll, &ctx.cancel)
        .await?;
    ctx.emit(format!(
        "job {}: {} (remote {})",
        record.id, record.status, record.remote_job_id
    ))?;

    if let (Some(path), Some(format)) = (output, format) {
        write_export(ctx, record.id, path, format)?;
    }
    Ok(())
}

fn list(ctx: &Context<'_>) -> CmdResult<()> {
    let jobs = ctx.service.list()?;
    if jobs.is_empty() {
        return ctx.emit("no jobs");
    }
    ctx.emit(format!(
        "{:>4}  {:<9}  {:<6}  {:<36}  {:<25}  {}",
        "ID", "STATUS", "RESULT", "REMOTE", "UPDATED", "FILE"
    ))?;
    for job in &jobs {
        ctx.emit(list_row(job))?;
    }
    Ok(())
}

fn list_row(job: &JobSummary) -> String {
    let remote = if job.remote_job_id.is_empty() {
        "-"
    } else {
        job.remote_job_id.as_str()
    };
    format!(
        "{:>4}  {:<9}  {:<6}  {:<36}  {:<25}  {}",
        job.id,
        job.status.as_str(),
        if job.has_result { "yes" } else { "no" },
        remote,
        job.updated_at,
        job.file_path
    )
}

async fn list_remote(ctx: &Context<'_>, limit: u32) -> CmdResult<()> {
    let page = ctx.service.list_remote(limit).await?;
    if page.items.is_empty() {
        return ctx.emit("no remote jobs");
    }
    ctx.emit(format!(
        "{:<36}  {:<10}  {:<25}  {}",
        "REMOTE", "STATUS", "CREATED", "COMPLETED"
    ))?;
    for item in &page.items {
        ctx.emit(format!(
            "{:<36}  {:<10}  {:<25}  {}",
            item.id,
            item.status,
            item.created_at,
            item.completed_at.as_deref().unwrap_or("-")
        ))?;
    }
    if page.next.is_some() {
        ctx.emit(format!("(more than {limit} jobs; raise --limit to see more)"))?;
    }
    Ok(())
}

async fn audio(ctx: &Context<'_>, id: i64, path: &Path) -> CmdResult<()> {
    let written = ctx.service.download_audio(id, path).await?;
    ctx.emit(format!("job {id}: saved {written} bytes of audio to {}", path.display()))
}

fn info(ctx: &Context<'_>, id: i64) -> CmdResult<()> {
    let record = ctx.service.get(id)?;
    let json = serde_json::to_string_pretty(&record)
        .map_err(|e| AppError::decode(format!("record serialize: {e}")))?;
    ctx.emit(json)?;
    ctx.emit(format!("result: {} bytes", record.results.len()))
}

fn export(ctx: &Context<'_>, id: i64, path: &Path, format: Option<&str>) -> CmdResult<()> {
    let format = resolve_format(path, format)?;
    write_export(ctx, id, path, format)
}

async fn delete(ctx: &Context<'_>, id: i64, remote: bool) -> CmdResult<()> {
    ctx.service.delete(id, remote).await?;
    if remote {
        ctx.emit(format!("job {id}: deleted (local and remote)"))
    } else {
        ctx.emit(format!("job {id}: deleted"))
    }
}

// --- Helpers ---

/// `--format` 指定があればそれを、なければ出力先の拡張子から決める
fn resolve_format(path: &Path, format: Option<&str>) -> Result<ExportFormat, AppError> {
    match format {
        Some(tag) => tag.parse(),
        None => Ok(ExportFormat::from_path(path)),
    }
}

fn write_export(ctx: &Context<'_>, id: i64, path: &Path, format: ExportFormat) -> CmdResult<()> {
    ctx.service.export(id, path, format)?;
    ctx.emit(format!(
        "job {id}: exported {} to {}",
        format.as_str(),
        path.display()
    ))
}

fn poll_settings(
    base: PollSettings,
    interval: Option<u64>,
    timeout: Option<u64>,
) -> Result<PollSettings, AppError> {
    PollSettings::new(
        interval.map(Duration::from_secs).unwrap_or(base.interval),
        timeout.map(Duration::from_secs).unwrap_or(base.timeout),
    )
}
