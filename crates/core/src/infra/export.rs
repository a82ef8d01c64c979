use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::error::AppError;
use crate::domain::job::{JobRecord, JobStatus};

/// エクスポート形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// 整形済み JSON
    Structured,
    /// 書き起こしテキスト
    Plain,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Plain => "plain",
        }
    }

    /// 出力先の拡張子から推定する（.json 以外は plain）
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Structured,
            _ => Self::Plain,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structured" | "json" => Ok(Self::Structured),
            "plain" | "txt" | "text" => Ok(Self::Plain),
            _ => Err(AppError::unknown_format(s)),
        }
    }
}

/// 完了済みジョブの結果をファイルへ書き出す
pub struct ResultExporter;

impl ResultExporter {
    /// 形式タグを解釈してから書き出す。未知のタグはファイルを作らずに失敗する。
    pub fn export(record: &JobRecord, dest: &Path, format: &str) -> Result<(), AppError> {
        let format = format.parse::<ExportFormat>()?;
        Self::export_as(record, dest, format)
    }

    pub fn export_as(record: &JobRecord, dest: &Path, format: ExportFormat) -> Result<(), AppError> {
        if record.status != JobStatus::Done || record.results.is_empty() {
            return Err(AppError::invalid_state(format!(
                "job {} has no result to export (status: {})",
                record.id, record.status
            )));
        }

        let bytes = match format {
            ExportFormat::Structured => render_structured(&record.results)?,
            ExportFormat::Plain => render_plain(&record.results),
        };

        write_atomic(dest, &bytes)?;
        log::info!(
            "Exported job {} as {} to {}",
            record.id,
            format.as_str(),
            dest.display()
        );
        Ok(())
    }
}

fn render_structured(results: &[u8]) -> Result<Vec<u8>, AppError> {
    let value: serde_json::Value = serde_json::from_slice(results)
        .map_err(|e| AppError::decode(format!("stored result is not valid JSON: {e}")))?;
    let mut out = serde_json::to_vec_pretty(&value)
        .map_err(|e| AppError::decode(format!("result serialize: {e}")))?;
    out.push(b'\n');
    Ok(out)
}

/// full_transcript があればそれを、なければ生のペイロードを書く
fn render_plain(results: &[u8]) -> Vec<u8> {
    let transcript = serde_json::from_slice::<serde_json::Value>(results)
        .ok()
        .and_then(|v| {
            v.pointer("/transcription/full_transcript")
                .or_else(|| v.pointer("/result/transcription/full_transcript"))
                .and_then(|t| t.as_str())
                .map(str::to_string)
        });

    match transcript {
        Some(mut text) => {
            if !text.ends_with('\n') {
                text.push('\n');
            }
            text.into_bytes()
        }
        None => results.to_vec(),
    }
}

/// 同じディレクトリの一時ファイルへ書いてから rename する。
pub(crate) fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let file_name = dest
        .file_name()
        .ok_or_else(|| AppError::invalid_input(format!("invalid output path: {}", dest.display())))?;
    let tmp_name = format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        uuid::Uuid::new_v4()
    );
    let tmp_path: PathBuf = match dest.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(tmp_name),
        _ => PathBuf::from(tmp_name),
    };

    let result = std::fs::File::create(&tmp_path)
        .and_then(|mut f| {
            f.write_all(bytes)?;
            f.sync_all()
        })
        .and_then(|_| std::fs::rename(&tmp_path, dest));

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(AppError::persistence(format!(
            "failed to write {}: {e}",
            dest.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorCode;

    fn done_record() -> JobRecord {
        let mut r = JobRecord::new("a.wav", JobStatus::Done, "2025-01-15T10:30:00Z".into());
        r.id = 1;
        r.results = br#"{"metadata":{"audio_duration":3.5},"transcription":{"full_transcript":"hello world"}}"#.to_vec();
        r
    }

    fn dir_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("structured".parse::<ExportFormat>().unwrap(), ExportFormat::Structured);
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Structured);
        assert_eq!("plain".parse::<ExportFormat>().unwrap(), ExportFormat::Plain);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Plain);
        let err = "bogus".parse::<ExportFormat>().unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownFormat);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("out.json")), ExportFormat::Structured);
        assert_eq!(ExportFormat::from_path(Path::new("out.txt")), ExportFormat::Plain);
        assert_eq!(ExportFormat::from_path(Path::new("out")), ExportFormat::Plain);
    }

    #[test]
    fn test_unknown_format_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.txt");

        let err = ResultExporter::export(&done_record(), &dest, "bogus").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownFormat);
        assert!(!dest.exists());
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[test]
    fn test_export_structured_is_indented() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.json");

        ResultExporter::export(&done_record(), &dest, "structured").unwrap();

        let text = std::fs::read_to_string(&dest).unwrap();
        assert!(text.contains("\n  \"transcription\""));
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["transcription"]["full_transcript"], "hello world");
        assert_eq!(dir_entries(dir.path()), 1);
    }

    #[test]
    fn test_export_plain_uses_full_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.txt");

        ResultExporter::export(&done_record(), &dest, "plain").unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "hello world\n");
    }

    #[test]
    fn test_export_plain_falls_back_to_raw() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.txt");
        let mut record = done_record();
        record.results = b"raw transcript".to_vec();

        ResultExporter::export(&record, &dest, "plain").unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"raw transcript");
    }

    #[test]
    fn test_export_structured_rejects_non_json() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.json");
        let mut record = done_record();
        record.results = b"not json".to_vec();

        let err = ResultExporter::export(&record, &dest, "structured").unwrap_err();
        assert_eq!(err.code, ErrorCode::Decode);
        assert!(!dest.exists());
    }

    #[test]
    fn test_export_requires_done() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.txt");
        let mut record = done_record();
        record.status = JobStatus::Polling;
        record.results.clear();

        let err = ResultExporter::export(&record, &dest, "plain").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
        assert!(!dest.exists());
    }

    #[test]
    fn test_export_into_missing_dir_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing").join("out.txt");

        let err = ResultExporter::export(&done_record(), &dest, "plain").unwrap_err();
        assert_eq!(err.code, ErrorCode::Persistence);
        assert!(!dest.exists());
    }
}
