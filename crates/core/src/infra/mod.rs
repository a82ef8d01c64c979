pub mod api;
pub mod export;
pub mod output;
pub mod storage;
