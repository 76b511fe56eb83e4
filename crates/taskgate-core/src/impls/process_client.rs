//! ProcessClientFactory - 外部 engine を段階ごとに起動する ExecutionClient
//!
//! provider plugin の取得や fetch/policy の実体は engine 側にあります。
//! このクライアントは 1 段階につき 1 回 `<engine> <stage>` を起動し、
//! 要求を JSON で stdin に渡し、結果を stdout から受け取るだけです。
//!
//! # 約束事
//! - 接続情報は環境変数で渡す（`TASKGATE_ENGINE_DSN` など）
//! - exit code 0 以外は失敗。stderr の内容がそのままエラーメッセージになる
//! - `connect` は `<engine> ping` で接続確認を行う

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};

use crate::domain::{ClientError, ProviderConfig, RequiredProvider};
use crate::env::EnvSnapshot;
use crate::ports::{
    ClientFactory, ClientOptions, ExecutionClient, FetchRequest, FetchSummary, PolicyRunRequest,
};

/// engine 実行ファイルのパスを指定する環境変数
pub const ENGINE_BIN_VAR: &str = "TASKGATE_ENGINE_BIN";
const DEFAULT_ENGINE_BIN: &str = "taskgate-engine";

#[derive(Debug, Clone)]
pub struct ProcessClientFactory {
    engine: PathBuf,
    args: Vec<String>,
}

impl ProcessClientFactory {
    /// 指定した engine 実行ファイルを使う factory
    pub fn new(engine: impl Into<PathBuf>) -> Self {
        Self {
            engine: engine.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed before the stage name, e.g. an interpreter's script.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Engine from `TASKGATE_ENGINE_BIN`, or `taskgate-engine` on `PATH`.
    pub fn from_env(env: &EnvSnapshot) -> Self {
        Self::new(env.get(ENGINE_BIN_VAR).unwrap_or(DEFAULT_ENGINE_BIN))
    }

    /// 起動する engine のパス
    pub fn engine(&self) -> &Path {
        &self.engine
    }
}

#[async_trait]
impl ClientFactory for ProcessClientFactory {
    async fn connect(&self, options: ClientOptions) -> Result<Box<dyn ExecutionClient>, ClientError> {
        if options.dsn.is_empty() {
            return Err(ClientError::new("missing connection dsn"));
        }
        let client = ProcessClient {
            engine: self.engine.clone(),
            args: self.args.clone(),
            options,
        };
        client.invoke("ping", &serde_json::json!({})).await?;
        tracing::debug!(engine = %client.engine.display(), "engine reachable");
        Ok(Box::new(client))
    }
}

struct ProcessClient {
    engine: PathBuf,
    args: Vec<String>,
    options: ClientOptions,
}

#[derive(Serialize)]
struct EnsureProvidersInput<'a> {
    providers: &'a [RequiredProvider],
}

#[derive(Serialize)]
struct NormalizeInput<'a> {
    providers: &'a [ProviderConfig],
}

impl ProcessClient {
    /// Run one engine stage and return its stdout.
    async fn invoke<I: Serialize + Sync>(&self, stage: &str, input: &I) -> Result<Vec<u8>, ClientError> {
        let body = serde_json::to_vec(input)
            .map_err(|e| ClientError::with_source(format!("encode {stage} request"), e))?;

        let mut cmd = Command::new(&self.engine);
        cmd.args(&self.args)
            .arg(stage)
            .env("TASKGATE_ENGINE_DSN", &self.options.dsn)
            .env("TASKGATE_ENGINE_PLUGIN_DIR", &self.options.plugin_directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.options.policy_directory {
            cmd.env("TASKGATE_ENGINE_POLICY_DIR", dir);
        }

        tracing::debug!(stage, engine = %self.engine.display(), "starting engine");
        let mut child = cmd.spawn().map_err(|e| {
            ClientError::with_source(format!("start engine {}", self.engine.display()), e)
        })?;

        // stdin is fed while stdout and stderr are drained; an engine that
        // answers before reading its whole request must not block on a full pipe.
        let stdin = child.stdin.take();
        let (written, output) = tokio::join!(feed_stdin(stdin, &body), child.wait_with_output());

        let output =
            output.map_err(|e| ClientError::with_source(format!("wait for engine {stage}"), e))?;
        written.map_err(|e| ClientError::with_source(format!("write {stage} request"), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(if stderr.is_empty() {
                ClientError::new(format!("engine {stage} exited with {}", output.status))
            } else {
                ClientError::new(stderr)
            });
        }
        Ok(output.stdout)
    }

    async fn invoke_json<I, O>(&self, stage: &str, input: &I) -> Result<O, ClientError>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        let stdout = self.invoke(stage, input).await?;
        serde_json::from_slice(&stdout)
            .map_err(|e| ClientError::with_source(format!("decode engine {stage} output"), e))
    }
}

/// stdin に要求を書き込んで閉じる。engine が読まずに終了した場合（BrokenPipe）は
/// 終了コードと stderr で判定するので無視する。
async fn feed_stdin(stdin: Option<ChildStdin>, body: &[u8]) -> std::io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    match stdin.write_all(body).await {
        Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
        _ => Ok(()),
    }
}

#[async_trait]
impl ExecutionClient for ProcessClient {
    async fn ensure_providers(&mut self, required: &[RequiredProvider]) -> Result<(), ClientError> {
        self.invoke("download", &EnsureProvidersInput { providers: required })
            .await
            .map(drop)
    }

    async fn normalize(&mut self, providers: &[ProviderConfig]) -> Result<(), ClientError> {
        self.invoke("normalize", &NormalizeInput { providers })
            .await
            .map(drop)
    }

    async fn fetch(&mut self, request: FetchRequest) -> Result<FetchSummary, ClientError> {
        self.invoke_json("fetch", &request).await
    }

    async fn run_policy(&mut self, request: PolicyRunRequest) -> Result<(), ClientError> {
        self.invoke("policy", &request).await.map(drop)
    }

    async fn provider_configuration(
        &mut self,
        provider: &RequiredProvider,
    ) -> Result<serde_json::Value, ClientError> {
        self.invoke_json("provider-config", provider).await
    }

    async fn close(self: Box<Self>) -> Result<(), ClientError> {
        // Each stage is its own process; nothing is held between calls.
        Ok(())
    }
}
