//! Domain model（request, task, config, outcome, errors）
//!
//! 1 回の invocation で受け取り・解決・返却されるデータの「形」だけを定義します。
//! 外部プロセスやストレージには依存しません。

pub mod config;
pub mod errors;
pub mod outcome;
pub mod request;
pub mod task;

pub use self::config::{Config, Connection, GatewaySettings, ProviderConfig, RequiredProvider};
pub use self::errors::{ClientError, Diagnostic, Diagnostics, GatewayError, Severity, Stage};
pub use self::outcome::TaskOutcome;
pub use self::request::{TaskRequest, TaskResponse};
pub use self::task::TaskKind;
