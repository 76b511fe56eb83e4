//! Initializer - 初期設定ファイルの生成
//!
//! `taskgate init aws gcp` の中身です。
//!
//! 1. 既存ファイルがあれば何もしない（上書きしない）
//! 2. gateway block の雛形を作り、loader で検証
//! 3. client を作って provider を取得
//! 4. provider ごとの既定設定 block を client から受け取り `providers` に追加
//! 5. JSON で書き出す

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::domain::{
    ClientError, Config, Connection, Diagnostics, GatewaySettings, ProviderConfig,
    RequiredProvider,
};
use crate::env::EnvSnapshot;
use crate::ports::{ClientFactory, ClientOptions, ConfigLoader, ExecutionClient};

use super::release;

/// 雛形を検証するときに loader に渡す source 名
pub const INIT_SOURCE_NAME: &str = "init.json";
/// 雛形の plugin directory
pub const DEFAULT_PLUGIN_DIRECTORY: &str = "./taskgate/providers";
/// 雛形の policy directory
pub const DEFAULT_POLICY_DIRECTORY: &str = "./taskgate/policies";
/// ローカルの PostgreSQL を指す雛形の DSN
pub const DEFAULT_DSN: &str =
    "host=localhost user=postgres password=pass database=postgres port=5432 sslmode=disable";

#[derive(Debug, Error)]
pub enum InitError {
    #[error("config file {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("at least one provider is required")]
    NoProviders,

    #[error("unable to encode configuration: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("generated configuration is invalid: {0}")]
    Configuration(Diagnostics),

    #[error("unable to create client: {0}")]
    ClientInit(ClientError),

    #[error("unable to initialize providers: {0}")]
    ProviderInit(ClientError),

    #[error("unable to get configuration for provider {provider}: {source}")]
    ProviderConfiguration {
        provider: String,
        source: ClientError,
    },

    #[error("provider {provider} returned an invalid configuration block: {source}")]
    InvalidProviderBlock {
        provider: String,
        source: serde_json::Error,
    },

    #[error("unable to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Initializer は `taskgate init` の設定ファイル生成を担当
pub struct Initializer<L, F> {
    loader: L,
    clients: F,
}

impl<L, F> Initializer<L, F>
where
    L: ConfigLoader,
    F: ClientFactory,
{
    /// 雛形の検証に使う loader と provider 取得用の client factory を受け取る
    pub fn new(loader: L, clients: F) -> Self {
        Self { loader, clients }
    }

    /// Generate a configuration for `providers` and write it to
    /// `config_path`. Returns what was written.
    pub async fn initialize(
        &self,
        providers: &[String],
        config_path: &Path,
        env: &EnvSnapshot,
    ) -> Result<Config, InitError> {
        if providers.is_empty() {
            return Err(InitError::NoProviders);
        }
        // client を作る前に断る。書き込み時にも create_new で再確認する。
        if tokio::fs::metadata(config_path).await.is_ok() {
            return Err(InitError::AlreadyExists(config_path.to_path_buf()));
        }

        let skeleton = skeleton(providers);
        let bytes = serde_json::to_vec(&skeleton)?;
        let mut config = self
            .loader
            .load(INIT_SOURCE_NAME, &bytes, env)
            .map_err(InitError::Configuration)?;

        let mut client = self
            .clients
            .connect(ClientOptions::new(config.plugin_directory(), config.dsn()))
            .await
            .map_err(InitError::ClientInit)?;
        let blocks = provider_blocks(client.as_mut(), config.required_providers()).await;
        release(client, "init").await;
        config.providers = blocks?;

        let mut out = serde_json::to_vec_pretty(&config)?;
        out.push(b'\n');
        write_new(config_path, &out).await?;

        tracing::info!(path = %config_path.display(), "configuration generated");
        Ok(config)
    }
}

/// `path` が存在しないときだけ作成して書き込む。確認と作成は 1 回の open で行う。
async fn write_new(path: &Path, contents: &[u8]) -> Result<(), InitError> {
    let write_err = |source: std::io::Error| InitError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(InitError::AlreadyExists(path.to_path_buf()));
        }
        Err(e) => return Err(write_err(e)),
    };
    file.write_all(contents).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)
}

fn skeleton(providers: &[String]) -> Config {
    Config {
        gateway: GatewaySettings {
            plugin_directory: Some(DEFAULT_PLUGIN_DIRECTORY.to_string()),
            policy_directory: Some(DEFAULT_POLICY_DIRECTORY.to_string()),
            providers: providers.iter().map(RequiredProvider::latest).collect(),
            connection: Some(Connection {
                dsn: DEFAULT_DSN.to_string(),
            }),
            logging: None,
        },
        providers: Vec::new(),
    }
}

async fn provider_blocks(
    client: &mut dyn ExecutionClient,
    required: &[RequiredProvider],
) -> Result<Vec<ProviderConfig>, InitError> {
    client
        .ensure_providers(required)
        .await
        .map_err(InitError::ProviderInit)?;

    let mut blocks = Vec::with_capacity(required.len());
    for provider in required {
        let value = client.provider_configuration(provider).await.map_err(|source| {
            InitError::ProviderConfiguration {
                provider: provider.name.clone(),
                source,
            }
        })?;
        let block = serde_json::from_value(value).map_err(|source| {
            InitError::InvalidProviderBlock {
                provider: provider.name.clone(),
                source,
            }
        })?;
        blocks.push(block);
    }
    Ok(blocks)
}
