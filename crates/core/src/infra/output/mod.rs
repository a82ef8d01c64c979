mod stdout;

pub use stdout::{MemoryOutput, StdoutOutput};

use crate::domain::error::AppError;

/// 出力先 trait（CLI の表示先）
pub trait OutputTarget: Send + Sync {
    fn emit(&self, line: &str) -> Result<(), AppError>;
    fn name(&self) -> &str;
}
