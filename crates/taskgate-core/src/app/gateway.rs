//! Gateway - 外部トリガーの入口
//!
//! managed function の handler や CLI はここを呼びます。invocation ごとに
//! プロセス環境の snapshot を取り、結果を `{message}` かエラーに変換します。

use crate::domain::{GatewayError, TaskRequest, TaskResponse};
use crate::env::EnvSnapshot;
use crate::impls::{JsonConfigLoader, ProcessClientFactory};
use crate::ports::{ClientFactory, ConfigLoader};

use super::Dispatcher;

/// Gateway は invocation の入口。Dispatcher の結果を境界の形に変換する
pub struct Gateway<L, F> {
    dispatcher: Dispatcher<L, F>,
}

impl Gateway<JsonConfigLoader, ProcessClientFactory> {
    /// JSON loader and the engine named by `TASKGATE_ENGINE_BIN`.
    pub fn from_env(env: &EnvSnapshot) -> Self {
        Self::new(Dispatcher::new(
            JsonConfigLoader::new(),
            ProcessClientFactory::from_env(env),
        ))
    }
}

impl<L, F> Gateway<L, F>
where
    L: ConfigLoader,
    F: ClientFactory,
{
    /// 組み立て済みの Dispatcher を包む
    pub fn new(dispatcher: Dispatcher<L, F>) -> Self {
        Self { dispatcher }
    }

    /// 内部の Dispatcher
    pub fn dispatcher(&self) -> &Dispatcher<L, F> {
        &self.dispatcher
    }

    /// Handle one invocation against the current process environment.
    pub async fn handle(&self, request: TaskRequest) -> Result<TaskResponse, GatewayError> {
        self.handle_with_env(request, &EnvSnapshot::from_process())
            .await
    }

    /// 渡された環境で 1 回分の invocation を処理する
    pub async fn handle_with_env(
        &self,
        request: TaskRequest,
        env: &EnvSnapshot,
    ) -> Result<TaskResponse, GatewayError> {
        self.dispatcher.execute(&request, env).await.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::DSN_VAR;
    use crate::impls::{ENGINE_BIN_VAR, ScriptedClientFactory};
    use serde_json::json;

    fn gateway() -> Gateway<JsonConfigLoader, ScriptedClientFactory> {
        Gateway::new(Dispatcher::new(
            JsonConfigLoader::new(),
            ScriptedClientFactory::new(),
        ))
    }

    #[tokio::test]
    async fn success_returns_message() {
        let resp = gateway()
            .handle_with_env(
                TaskRequest::new("fetch", json!({ "providers": ["aws"] })),
                &EnvSnapshot::from_pairs([(DSN_VAR, "postgres://db")]),
            )
            .await
            .unwrap();
        assert_eq!(resp.message, "Completed task fetch");
    }

    #[tokio::test]
    async fn failure_returns_error_only() {
        let err = gateway()
            .handle_with_env(TaskRequest::new("sync", json!({})), &EnvSnapshot::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown task: sync");
    }

    #[test]
    fn request_event_decodes() {
        let event = r#"{ "taskName": "policy", "config": {} }"#;
        let req: TaskRequest = serde_json::from_str(event).unwrap();
        assert_eq!(req.task_name(), "policy");
    }

    #[test]
    fn from_env_uses_configured_engine() {
        let env = EnvSnapshot::from_pairs([(ENGINE_BIN_VAR, "/opt/engine")]);
        let gateway = Gateway::from_env(&env);
        assert_eq!(
            gateway.dispatcher().clients().engine(),
            std::path::Path::new("/opt/engine")
        );
        assert_eq!(
            Gateway::from_env(&EnvSnapshot::default())
                .dispatcher()
                .clients()
                .engine(),
            std::path::Path::new("taskgate-engine")
        );
    }
}
