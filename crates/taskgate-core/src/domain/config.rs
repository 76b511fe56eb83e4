//! Resolved configuration.
//!
//! This is what the loader hands back after it has accepted a payload. A fresh
//! `Config` is built for every request and dropped when the operation ends.

use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;

/// version を省略した provider の version
pub const DEFAULT_PROVIDER_VERSION: &str = "latest";

/// Fallback for directories the configuration leaves unset.
const CURRENT_DIR: &str = ".";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderConfig>,
}

/// The `gateway` block: where plugins and policies live and how to reach the
/// backing store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_directory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_directory: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<RequiredProvider>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub dsn: String,
}

/// RequiredProvider は fetch の前に用意しておく provider plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredProvider {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default = "default_version")]
    pub version: String,
}

impl RequiredProvider {
    /// `latest` を要求する RequiredProvider
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            version: default_version(),
        }
    }
}

fn default_version() -> String {
    DEFAULT_PROVIDER_VERSION.to_string()
}

/// Per-provider fetch settings.
///
/// Accepts a bare string (`"aws"`) as shorthand for `{"name": "aws"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ProviderEntry")]
pub struct ProviderConfig {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,

    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub configuration: serde_json::Value,
}

impl ProviderConfig {
    /// 名前だけの ProviderConfig（`"aws"` と同じ）
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            resources: Vec::new(),
            configuration: serde_json::Value::Null,
        }
    }

    /// alias があれば alias、なければ provider 名
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProviderEntry {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        alias: Option<String>,
        #[serde(default)]
        resources: Vec<String>,
        #[serde(default)]
        configuration: serde_json::Value,
    },
}

impl From<ProviderEntry> for ProviderConfig {
    fn from(entry: ProviderEntry) -> Self {
        match entry {
            ProviderEntry::Name(name) => ProviderConfig::named(name),
            ProviderEntry::Full {
                name,
                alias,
                resources,
                configuration,
            } => ProviderConfig {
                name,
                alias,
                resources,
                configuration,
            },
        }
    }
}

impl Config {
    /// Connection descriptor; empty when the configuration carries none.
    pub fn dsn(&self) -> &str {
        self.gateway
            .connection
            .as_ref()
            .map(|c| c.dsn.as_str())
            .unwrap_or_default()
    }

    /// DSN を置き換える。connection block がなければ作る
    pub fn set_dsn(&mut self, dsn: impl Into<String>) {
        self.gateway.connection = Some(Connection { dsn: dsn.into() });
    }

    /// plugin directory。未設定なら `.`
    pub fn plugin_directory(&self) -> &str {
        self.gateway.plugin_directory.as_deref().unwrap_or(CURRENT_DIR)
    }

    /// policy directory。未設定なら `.`
    pub fn policy_directory(&self) -> &str {
        self.gateway.policy_directory.as_deref().unwrap_or(CURRENT_DIR)
    }

    /// Fill directories the payload left unset. Values the payload did set
    /// are kept.
    pub fn apply_directory_defaults(&mut self, plugin_dir: &str, policy_dir: &str) {
        self.gateway
            .plugin_directory
            .get_or_insert_with(|| plugin_dir.to_string());
        self.gateway
            .policy_directory
            .get_or_insert_with(|| policy_dir.to_string());
    }

    /// 取得が必要な provider の一覧
    pub fn required_providers(&self) -> &[RequiredProvider] {
        &self.gateway.providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_provider_names_are_accepted() {
        let cfg: Config = serde_json::from_value(json!({ "providers": ["aws", "gcp"] })).unwrap();
        assert_eq!(cfg.providers.len(), 2);
        assert_eq!(cfg.providers[0], ProviderConfig::named("aws"));
        assert_eq!(cfg.providers[1].key(), "gcp");
    }

    #[test]
    fn full_provider_entry_keeps_fields() {
        let cfg: Config = serde_json::from_value(json!({
            "providers": [{
                "name": "aws",
                "alias": "aws-prod",
                "resources": ["ec2.instances"],
                "configuration": { "regions": ["us-east-1"] }
            }]
        }))
        .unwrap();
        let p = &cfg.providers[0];
        assert_eq!(p.key(), "aws-prod");
        assert_eq!(p.resources, vec!["ec2.instances".to_string()]);
        assert_eq!(p.configuration["regions"][0], "us-east-1");
    }

    #[test]
    fn required_provider_version_defaults_to_latest() {
        let p: RequiredProvider = serde_json::from_value(json!({ "name": "aws" })).unwrap();
        assert_eq!(p.version, "latest");
    }

    #[test]
    fn dsn_is_empty_without_connection() {
        let mut cfg = Config::default();
        assert_eq!(cfg.dsn(), "");
        cfg.set_dsn("postgres://localhost");
        assert_eq!(cfg.dsn(), "postgres://localhost");
    }

    #[test]
    fn directory_defaults_do_not_replace_payload_values() {
        let mut cfg = Config::default();
        cfg.gateway.plugin_directory = Some("/opt/plugins".to_string());
        cfg.apply_directory_defaults("/env/plugins", "/env/policies");
        assert_eq!(cfg.plugin_directory(), "/opt/plugins");
        assert_eq!(cfg.policy_directory(), "/env/policies");
    }
}
