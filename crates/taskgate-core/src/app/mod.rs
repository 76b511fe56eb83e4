//! App - アプリケーション層
//!
//! ports を組み合わせて、invocation 1 回分の処理を組み立てます。
//!
//! # 主要コンポーネント
//! - **Gateway**: 外部トリガーの入口（request → response/error）
//! - **Dispatcher**: 設定の解決と task の振り分け
//! - **fetch / policy**: 各 task の段階処理
//! - **Initializer**: CLI の `init` で使う設定ファイル生成

pub mod dispatcher;
pub mod fetch;
pub mod gateway;
pub mod init;
pub mod policy;

pub use self::dispatcher::{CONFIG_SOURCE_NAME, Dispatcher};
pub use self::gateway::Gateway;
pub use self::init::{InitError, Initializer};
pub use self::policy::POLICY_OUTPUT_PATH;

use crate::ports::ExecutionClient;

/// Close a client, logging a failure instead of masking the operation's
/// own result.
pub(crate) async fn release(client: Box<dyn ExecutionClient>, operation: &str) {
    if let Err(e) = client.close().await {
        tracing::warn!(operation, error = %e, "failed to close execution client");
    }
}
