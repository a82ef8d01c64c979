//! 非同期書き起こしジョブのコアライブラリ。
//!
//! - `domain`: ジョブレコード・状態遷移・設定・エラー
//! - `infra`: リモートAPIクライアント、SQLiteストア、結果エクスポート、出力先
//! - `usecase`: ジョブライフサイクルのオーケストレーション

pub mod domain;
pub mod infra;
pub mod usecase;
