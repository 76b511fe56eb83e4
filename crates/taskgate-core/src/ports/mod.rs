//! Ports - 外部コラボレータへの抽象化レイヤー
//!
//! 設定ファイルの解釈（ConfigLoader）と、provider の取得・fetch・policy 実行
//! （ExecutionClient）はこのクレートの外側にある仕組みです。ここでは呼び出し側が
//! 必要とする最小のインターフェースだけを trait として定義します。
//!
//! 実装は `impls` にあります。

pub mod config_loader;
pub mod execution_client;

pub use self::config_loader::ConfigLoader;
pub use self::execution_client::{
    ClientFactory, ClientOptions, ExecutionClient, FetchRequest, FetchSummary, PolicyRunRequest,
    ProviderFetchResult,
};
