//! ExecutionClient port - provider download / normalize / fetch / policy
//!
//! クライアントは 1 回の operation の間だけ生存します。取得した側は、
//! 早期 return を含むすべての経路で `close()` を呼ぶ責任を持ちます。

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ClientError, ProviderConfig, RequiredProvider};

/// ClientOptions は client の接続先とディレクトリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub plugin_directory: String,
    pub dsn: String,
    /// Only set for clients that run policies.
    pub policy_directory: Option<String>,
}

impl ClientOptions {
    /// policy directory なしの接続オプション
    pub fn new(plugin_directory: impl Into<String>, dsn: impl Into<String>) -> Self {
        Self {
            plugin_directory: plugin_directory.into(),
            dsn: dsn.into(),
            policy_directory: None,
        }
    }

    /// policy 実行用に policy directory を追加
    pub fn with_policy_directory(mut self, dir: impl Into<String>) -> Self {
        self.policy_directory = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFetchResult {
    pub name: String,
    #[serde(default)]
    pub resource_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSummary {
    #[serde(default)]
    pub providers: Vec<ProviderFetchResult>,
}

impl FetchSummary {
    /// 全 provider の resource 数の合計
    pub fn total_resources(&self) -> u64 {
        self.providers.iter().map(|p| p.resource_count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRunRequest {
    pub args: Vec<String>,
    /// `false` runs every check even after one fails.
    pub stop_on_failure: bool,
    pub output_path: PathBuf,
}

/// Builds clients. Construction is where the storage connection is made, so
/// it is also where connection failures surface.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, options: ClientOptions) -> Result<Box<dyn ExecutionClient>, ClientError>;
}

#[async_trait]
pub trait ExecutionClient: Send {
    /// Make sure every required provider plugin is present, downloading it if
    /// needed.
    async fn ensure_providers(&mut self, required: &[RequiredProvider]) -> Result<(), ClientError>;

    async fn normalize(&mut self, providers: &[ProviderConfig]) -> Result<(), ClientError>;

    /// Partial writes on failure are the client's concern.
    async fn fetch(&mut self, request: FetchRequest) -> Result<FetchSummary, ClientError>;

    async fn run_policy(&mut self, request: PolicyRunRequest) -> Result<(), ClientError>;

    /// Default configuration block for a provider, used by `init`.
    async fn provider_configuration(
        &mut self,
        provider: &RequiredProvider,
    ) -> Result<serde_json::Value, ClientError>;

    /// 保持しているリソースを解放する
    async fn close(self: Box<Self>) -> Result<(), ClientError>;
}
