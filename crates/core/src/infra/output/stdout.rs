use std::io::Write;

use parking_lot::Mutex;

use super::OutputTarget;
use crate::domain::error::AppError;

/// 標準出力
pub struct StdoutOutput;

impl StdoutOutput {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdoutOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputTarget for StdoutOutput {
    fn emit(&self, line: &str) -> Result<(), AppError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}").map_err(|e| AppError::persistence(format!("stdout write: {e}")))
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

/// メモリ上に行を溜める出力先（表示内容の検証用）
#[derive(Default)]
pub struct MemoryOutput {
    lines: Mutex<Vec<String>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl OutputTarget for MemoryOutput {
    fn emit(&self, line: &str) -> Result<(), AppError> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_output_collects_lines() {
        let out = MemoryOutput::new();
        out.emit("job 1").unwrap();
        out.emit("status: done").unwrap();
        assert_eq!(out.lines(), vec!["job 1", "status: done"]);
        assert_eq!(out.name(), "memory");
    }

    #[test]
    fn test_stdout_name() {
        assert_eq!(StdoutOutput::new().name(), "stdout");
    }
}
