use crate::domain::{Config, Diagnostics};
use crate::env::EnvSnapshot;

/// ConfigLoader は raw payload を検証済みの `Config` に変換
///
/// `env` は設定文法側の変数参照のために渡す完全な環境です。override の適用は
/// loader の責務ではありません（dispatcher が行います）。
///
/// Implementations must be reentrant: the dispatcher may call `load`
/// concurrently for independent requests.
pub trait ConfigLoader: Send + Sync {
    fn load(&self, source_name: &str, payload: &[u8], env: &EnvSnapshot)
    -> Result<Config, Diagnostics>;
}
