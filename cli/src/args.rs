use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// 非同期音声書き起こしジョブのクライアント
#[derive(Debug, Parser)]
#[command(name = "voxjob", version, about = "Upload audio, run transcription jobs and export results")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload an audio file and record a local job
    Upload {
        file: PathBuf,
    },

    /// Submit a transcription job for an uploaded file
    Start {
        id: i64,
        /// Poll until the job finishes
        #[arg(long = "await")]
        wait: bool,
        /// Export the result here once done (implies --await)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Export format: structured|plain (default: from the output extension)
        #[arg(long, short)]
        format: Option<String>,
    },

    /// Fetch the remote status once
    Status {
        id: i64,
    },

    /// Poll until the job is done or failed
    Await {
        id: i64,
        /// Seconds between status checks
        #[arg(long)]
        interval: Option<u64>,
        /// Overall limit in seconds (0 waits forever)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Upload, submit and wait in one go
    Run {
        file: PathBuf,
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[arg(long, short)]
        format: Option<String>,
    },

    /// List local jobs, or jobs known to the remote service
    List {
        /// Ask the remote service instead of the local store
        #[arg(long)]
        remote: bool,
        /// Maximum number of remote jobs to show
        #[arg(long, default_value_t = 20, requires = "remote")]
        limit: u32,
    },

    /// Show the full local record of a job
    Info {
        id: i64,
    },

    /// Write the result of a finished job to a file
    Export {
        id: i64,
        path: PathBuf,
        #[arg(long, short)]
        format: Option<String>,
    },

    /// Download the audio a submitted job was run on
    Audio {
        id: i64,
        path: PathBuf,
    },

    /// Delete a local job record
    Delete {
        id: i64,
        /// Also delete the job on the remote service
        #[arg(long)]
        remote: bool,
    },
}

impl Command {
    /// リモートAPIを使うコマンドか
    pub fn needs_api(&self) -> bool {
        match self {
            Self::Upload { .. }
            | Self::Start { .. }
            | Self::Status { .. }
            | Self::Await { .. }
            | Self::Run { .. }
            | Self::Audio { .. } => true,
            Self::Delete { remote, .. } | Self::List { remote, .. } => *remote,
            Self::Info { .. } | Self::Export { .. } => false,
        }
    }
}
