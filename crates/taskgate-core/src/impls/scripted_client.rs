//! ScriptedClientFactory - テスト・dry run 用の in-memory client
//!
//! 外部 engine を使わずに dispatcher を動かすための実装です。
//!
//! - 段階ごとに失敗を仕込める（`fail_on`）
//! - すべての呼び出しを journal に記録（`calls()`）
//! - 生成数と close 数を数える（close 漏れの検出用）
//!
//! factory を clone しても状態は共有されます。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::{ClientError, ProviderConfig, RequiredProvider};
use crate::ports::{
    ClientFactory, ClientOptions, ExecutionClient, FetchRequest, FetchSummary, PolicyRunRequest,
    ProviderFetchResult,
};

/// 失敗を仕込める client 側の段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptedStage {
    Connect,
    EnsureProviders,
    Normalize,
    Fetch,
    RunPolicy,
    ProviderConfiguration,
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    Connect(ClientOptions),
    EnsureProviders(Vec<String>),
    Normalize(Vec<String>),
    Fetch(Vec<String>),
    RunPolicy(PolicyRunRequest),
    ProviderConfiguration(String),
    Close,
}

#[derive(Debug, Default)]
struct Script {
    failures: HashMap<ScriptedStage, String>,
    provider_configs: HashMap<String, serde_json::Value>,
    resources_per_provider: u64,
    calls: Vec<ClientCall>,
    connected: usize,
    closed: usize,
}

impl Script {
    /// Record the call, then fail if the stage is scripted to.
    fn record(&mut self, stage: ScriptedStage, call: ClientCall) -> Result<(), ClientError> {
        self.calls.push(call);
        match self.failures.get(&stage) {
            Some(message) => Err(ClientError::new(message.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedClientFactory {
    script: Arc<Mutex<Script>>,
}

impl ScriptedClientFactory {
    /// 失敗なし・resource 数 0 の factory
    pub fn new() -> Self {
        Self::default()
    }

    /// この factory から作られるすべての client で `stage` を `message` で失敗させる
    pub fn fail_on(self, stage: ScriptedStage, message: impl Into<String>) -> Self {
        self.lock().failures.insert(stage, message.into());
        self
    }

    /// `name` に対して `provider_configuration` が返す設定 block
    pub fn with_provider_configuration(
        self,
        name: impl Into<String>,
        block: serde_json::Value,
    ) -> Self {
        self.lock().provider_configs.insert(name.into(), block);
        self
    }

    /// fetch した provider ごとに報告する resource 数
    pub fn with_resources_per_provider(self, count: u64) -> Self {
        self.lock().resources_per_provider = count;
        self
    }

    /// これまでの呼び出し（connect から close まで、呼ばれた順）
    pub fn calls(&self) -> Vec<ClientCall> {
        self.lock().calls.clone()
    }

    /// 生成に成功した client の数
    pub fn connected(&self) -> usize {
        self.lock().connected
    }

    /// close された client の数
    pub fn closed(&self) -> usize {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ClientFactory for ScriptedClientFactory {
    async fn connect(&self, options: ClientOptions) -> Result<Box<dyn ExecutionClient>, ClientError> {
        let mut script = self.lock();
        script.record(ScriptedStage::Connect, ClientCall::Connect(options))?;
        script.connected += 1;
        Ok(Box::new(ScriptedClient {
            script: Arc::clone(&self.script),
        }))
    }
}

struct ScriptedClient {
    script: Arc<Mutex<Script>>,
}

impl ScriptedClient {
    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn names(providers: &[ProviderConfig]) -> Vec<String> {
    providers.iter().map(|p| p.key().to_string()).collect()
}

#[async_trait]
impl ExecutionClient for ScriptedClient {
    async fn ensure_providers(&mut self, required: &[RequiredProvider]) -> Result<(), ClientError> {
        let call = ClientCall::EnsureProviders(required.iter().map(|p| p.name.clone()).collect());
        self.lock().record(ScriptedStage::EnsureProviders, call)
    }

    async fn normalize(&mut self, providers: &[ProviderConfig]) -> Result<(), ClientError> {
        self.lock()
            .record(ScriptedStage::Normalize, ClientCall::Normalize(names(providers)))
    }

    async fn fetch(&mut self, request: FetchRequest) -> Result<FetchSummary, ClientError> {
        let mut script = self.lock();
        script.record(ScriptedStage::Fetch, ClientCall::Fetch(names(&request.providers)))?;
        Ok(FetchSummary {
            providers: request
                .providers
                .iter()
                .map(|p| ProviderFetchResult {
                    name: p.key().to_string(),
                    resource_count: script.resources_per_provider,
                })
                .collect(),
        })
    }

    async fn run_policy(&mut self, request: PolicyRunRequest) -> Result<(), ClientError> {
        self.lock()
            .record(ScriptedStage::RunPolicy, ClientCall::RunPolicy(request))
    }

    async fn provider_configuration(
        &mut self,
        provider: &RequiredProvider,
    ) -> Result<serde_json::Value, ClientError> {
        let mut script = self.lock();
        script.record(
            ScriptedStage::ProviderConfiguration,
            ClientCall::ProviderConfiguration(provider.name.clone()),
        )?;
        Ok(script
            .provider_configs
            .get(&provider.name)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({ "name": provider.name })))
    }

    async fn close(self: Box<Self>) -> Result<(), ClientError> {
        let mut script = self.lock();
        script.closed += 1;
        script.record(ScriptedStage::Close, ClientCall::Close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_in_order() {
        let factory = ScriptedClientFactory::new().with_resources_per_provider(3);
        let mut client = factory
            .connect(ClientOptions::new("./plugins", "postgres://db"))
            .await
            .unwrap();
        client
            .ensure_providers(&[RequiredProvider::latest("aws")])
            .await
            .unwrap();
        let summary = client
            .fetch(FetchRequest {
                providers: vec![ProviderConfig::named("aws")],
            })
            .await
            .unwrap();
        client.close().await.unwrap();

        assert_eq!(summary.total_resources(), 3);
        assert_eq!(
            factory.calls(),
            vec![
                ClientCall::Connect(ClientOptions::new("./plugins", "postgres://db")),
                ClientCall::EnsureProviders(vec!["aws".to_string()]),
                ClientCall::Fetch(vec!["aws".to_string()]),
                ClientCall::Close,
            ]
        );
        assert_eq!(factory.connected(), 1);
        assert_eq!(factory.closed(), 1);
    }

    #[tokio::test]
    async fn scripted_failure_is_returned() {
        let factory = ScriptedClientFactory::new().fail_on(ScriptedStage::Connect, "db down");
        let err = factory
            .connect(ClientOptions::new(".", "postgres://db"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.message(), "db down");
        assert_eq!(factory.connected(), 0);
    }

    #[tokio::test]
    async fn provider_configuration_falls_back_to_name() {
        let factory = ScriptedClientFactory::new()
            .with_provider_configuration("gcp", serde_json::json!({ "name": "gcp", "project": "p" }));
        let mut client = factory.connect(ClientOptions::new(".", "x")).await.unwrap();

        let aws = client
            .provider_configuration(&RequiredProvider::latest("aws"))
            .await
            .unwrap();
        let gcp = client
            .provider_configuration(&RequiredProvider::latest("gcp"))
            .await
            .unwrap();
        assert_eq!(aws, serde_json::json!({ "name": "aws" }));
        assert_eq!(gcp["project"], "p");
    }
}
