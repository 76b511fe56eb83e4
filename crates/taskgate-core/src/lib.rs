//! taskgate-core
//!
//! Core building blocks for the taskgate task gateway.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（request, task, config, outcome, errors）
//! - **env**: 環境変数の snapshot と override の解決
//! - **ports**: 外部コラボレータの抽象化（ConfigLoader, ExecutionClient）
//! - **impls**: ports の実装（JSON loader, process client, scripted client）
//! - **app**: アプリケーション層（Gateway, Dispatcher, fetch/policy, Initializer）
//! - **logging**: binary 向けの tracing subscriber 設定

pub mod app;
pub mod domain;
pub mod env;
pub mod impls;
pub mod logging;
pub mod ports;

pub use app::{Dispatcher, Gateway, Initializer};
pub use domain::{GatewayError, TaskKind, TaskOutcome, TaskRequest, TaskResponse};
pub use env::{EnvSnapshot, Overrides, resolve_overrides};
