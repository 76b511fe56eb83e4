//! Dispatcher - 設定の解決と task の振り分け
//!
//! # 処理の流れ
//! 1. 環境から `Overrides` を解決
//! 2. payload を JSON bytes に serialize
//! 3. loader で `Config` に変換（失敗は `Configuration`、リトライなし）
//! 4. override を適用（DSN は空でなければ常に上書き）
//! 5. `TaskKind` で振り分け
//!
//! Dispatcher は呼び出し間で状態を持ちません。同じ request と決定的な client
//! なら何度呼んでも同じ結果になり、並行に呼んでも安全です。

use tracing::Instrument;

use crate::domain::{Config, GatewayError, TaskKind, TaskOutcome, TaskRequest};
use crate::env::{EnvSnapshot, Overrides};
use crate::ports::{ClientFactory, ConfigLoader};

use super::{fetch, policy};

/// Source name the loader sees for invocation payloads.
pub const CONFIG_SOURCE_NAME: &str = "config.json";

/// Dispatcher は loader と client factory だけを持つ、状態のない振り分け役
pub struct Dispatcher<L, F> {
    loader: L,
    clients: F,
}

impl<L, F> Dispatcher<L, F>
where
    L: ConfigLoader,
    F: ClientFactory,
{
    /// loader と client factory から Dispatcher を作る
    pub fn new(loader: L, clients: F) -> Self {
        Self { loader, clients }
    }

    /// 使用中の client factory（テストで呼び出し履歴を見るのに使う）
    pub fn clients(&self) -> &F {
        &self.clients
    }

    /// Resolve, dispatch and run one request.
    pub async fn execute(&self, request: &TaskRequest, env: &EnvSnapshot) -> TaskOutcome {
        let span = tracing::info_span!("dispatch", task = request.task_name());
        let outcome = self.dispatch(request, env).instrument(span).await;

        match &outcome.error {
            None => tracing::info!(task = request.task_name(), "{}", outcome.message),
            Some(err) => tracing::error!(
                task = request.task_name(),
                stage = %err.stage(),
                error = %err,
                "task failed"
            ),
        }
        outcome
    }

    async fn dispatch(&self, request: &TaskRequest, env: &EnvSnapshot) -> TaskOutcome {
        let name = request.task_name();
        let overrides = Overrides::resolve(env);

        let config = match self.resolve_config(request.config(), env, &overrides) {
            Ok(config) => config,
            Err(err) => return TaskOutcome::failed(String::new(), err),
        };

        let Some(kind) = TaskKind::parse(name) else {
            return TaskOutcome::failed(
                format!("Unknown task: {name}"),
                GatewayError::UnknownTask(name.to_string()),
            );
        };

        let result = match kind {
            TaskKind::Fetch => fetch::run(&self.clients, &config).await.map(drop),
            TaskKind::Policy => policy::run(&self.clients, &config, &overrides.policy_source).await,
        };

        let message = format!("Completed task {name}");
        match result {
            Ok(()) => TaskOutcome::completed(message),
            Err(err) => TaskOutcome::failed(message, err),
        }
    }

    /// Payload → `Config`, with overrides applied.
    pub fn resolve_config(
        &self,
        payload: &serde_json::Value,
        env: &EnvSnapshot,
        overrides: &Overrides,
    ) -> Result<Config, GatewayError> {
        let bytes = serde_json::to_vec(payload).map_err(GatewayError::Encoding)?;

        let mut config = self
            .loader
            .load(CONFIG_SOURCE_NAME, &bytes, env)
            .map_err(|diagnostics| GatewayError::Configuration {
                source_name: CONFIG_SOURCE_NAME.to_string(),
                diagnostics,
            })?;

        config.apply_directory_defaults(&overrides.plugin_dir, &overrides.policy_dir);
        if overrides.has_connection() {
            tracing::debug!("connection override in effect");
            config.set_dsn(overrides.connection.as_str());
        }
        Ok(config)
    }
}
