//! Environment Resolver - 環境変数からの override 解決
//!
//! プロセス環境は起動時に一度だけ `EnvSnapshot` にコピーし、以降は値として
//! 引き回します。dispatcher や各 operation が `std::env` を直接読むことはありません。
//! テストでは `EnvSnapshot::from_pairs` で任意の環境を注入できます。

use std::collections::BTreeMap;

/// DSN の override。空または未設定なら override なし
pub const DSN_VAR: &str = "TASKGATE_DSN";
/// plugin directory の override
pub const PLUGIN_DIR_VAR: &str = "TASKGATE_PLUGIN_DIR";
/// policy directory の override
pub const POLICY_DIR_VAR: &str = "TASKGATE_POLICY_DIR";
/// 実行する policy の場所。ローカルパスのみ対応
pub const POLICY_PATH_VAR: &str = "TASKGATE_POLICY_PATH";

const DEFAULT_DIR: &str = ".";

/// EnvSnapshot は key/value 環境の読み取り専用コピー
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Copy the current process environment. Variables that are not valid
    /// unicode are skipped.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    /// key/value の組から snapshot を作る（テストや managed trigger 向け）
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// 変数の値。未設定なら `None`（空文字列は `Some("")`）
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// key 順に全変数を列挙
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 変数の数
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// 変数が 1 つもないか
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Overrides は 1 回の dispatch に適用する環境由来の上書き値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overrides {
    /// Empty means the configuration's own DSN is used.
    pub connection: String,
    pub plugin_dir: String,
    pub policy_dir: String,
    /// Empty when unset; the policy operation passes it through as is.
    pub policy_source: String,
}

impl Overrides {
    /// Only absence triggers a default; a variable set to `""` stays empty.
    pub fn resolve(env: &EnvSnapshot) -> Self {
        let read = |key: &str, default: &str| env.get(key).unwrap_or(default).to_string();
        Self {
            connection: read(DSN_VAR, ""),
            plugin_dir: read(PLUGIN_DIR_VAR, DEFAULT_DIR),
            policy_dir: read(POLICY_DIR_VAR, DEFAULT_DIR),
            policy_source: read(POLICY_PATH_VAR, ""),
        }
    }

    /// Whether a connection override is in effect.
    pub fn has_connection(&self) -> bool {
        !self.connection.is_empty()
    }
}

impl Default for Overrides {
    fn default() -> Self {
        Self::resolve(&EnvSnapshot::default())
    }
}

/// 現在のプロセス環境から override を解決する
pub fn resolve_overrides() -> Overrides {
    Overrides::resolve(&EnvSnapshot::from_process())
}
