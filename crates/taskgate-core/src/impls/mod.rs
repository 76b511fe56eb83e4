//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **JsonConfigLoader**: JSON payload を `Config` に変換する loader
//! - **ProcessClientFactory**: 外部 engine 実行ファイルを段階ごとに起動する client
//! - **ScriptedClientFactory**: テスト・dry run 用の in-memory client

pub mod json_loader;
pub mod process_client;
pub mod scripted_client;

pub use self::json_loader::{JsonConfigLoader, VAR_PREFIX};
pub use self::process_client::{ENGINE_BIN_VAR, ProcessClientFactory};
pub use self::scripted_client::{ClientCall, ScriptedClientFactory, ScriptedStage};
