//! JsonConfigLoader - JSON payload の解釈と検証
//!
//! # 処理の流れ
//! 1. bytes を `serde_json::Value` として parse
//! 2. 文字列中の `${NAME}` を環境変数 `TASKGATE_VAR_NAME` で置換
//! 3. `Config` に deserialize
//! 4. provider 名の検証、`providers` にだけ現れる provider を `latest` で required に追加
//!
//! エラーは途中で打ち切らず、可能な限り集めて `Diagnostics` として返します。

use std::collections::HashSet;

use serde_json::Value;

use crate::domain::{Config, Diagnostics, RequiredProvider};
use crate::env::EnvSnapshot;
use crate::ports::ConfigLoader;

/// Prefix of environment variables visible to `${NAME}` references.
pub const VAR_PREFIX: &str = "TASKGATE_VAR_";

const TOP_LEVEL_KEYS: [&str; 2] = ["gateway", "providers"];

#[derive(Debug, Clone, Default)]
pub struct JsonConfigLoader;

impl JsonConfigLoader {
    /// 状態を持たない loader
    pub fn new() -> Self {
        Self
    }
}

impl ConfigLoader for JsonConfigLoader {
    fn load(
        &self,
        source_name: &str,
        payload: &[u8],
        env: &EnvSnapshot,
    ) -> Result<Config, Diagnostics> {
        let mut diags = Diagnostics::new();

        let mut value: Value = match serde_json::from_slice(payload) {
            Ok(v) => v,
            Err(e) => {
                diags.error("invalid JSON", Some(e.to_string()));
                return Err(diags);
            }
        };

        let Some(object) = value.as_object() else {
            diags.error(
                "configuration must be a JSON object",
                Some(format!("got {}", kind_of(&value))),
            );
            return Err(diags);
        };
        for key in object.keys() {
            if !TOP_LEVEL_KEYS.contains(&key.as_str()) {
                diags.warning(format!("unknown key \"{key}\" is ignored"), None);
            }
        }

        interpolate(&mut value, env, &mut diags, "$");
        if diags.has_errors() {
            return Err(diags);
        }

        let mut config: Config = match serde_json::from_value(value) {
            Ok(c) => c,
            Err(e) => {
                diags.error("invalid configuration", Some(e.to_string()));
                return Err(diags);
            }
        };

        validate(&config, &mut diags);
        if diags.has_errors() {
            return Err(diags);
        }
        require_configured_providers(&mut config);

        for d in diags.iter() {
            tracing::warn!(source = source_name, "{d}");
        }
        Ok(config)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn interpolate(value: &mut Value, env: &EnvSnapshot, diags: &mut Diagnostics, path: &str) {
    match value {
        Value::String(s) => {
            if s.contains('$') {
                *s = expand(s, env, diags, path);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                interpolate(item, env, diags, &format!("{path}[{i}]"));
            }
        }
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                interpolate(v, env, diags, &format!("{path}.{k}"));
            }
        }
        _ => {}
    }
}

/// Expand `${NAME}` references in one string. `$${` is a literal `${`.
fn expand(input: &str, env: &EnvSnapshot, diags: &mut Diagnostics, path: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("$${") {
            out.push_str("${");
            rest = after;
            continue;
        }

        let Some(body) = tail.strip_prefix("${") else {
            out.push('$');
            rest = &tail[1..];
            continue;
        };

        let Some(end) = body.find('}') else {
            diags.error(
                "unterminated variable reference",
                Some(format!("at {path}")),
            );
            out.push_str(tail);
            rest = "";
            break;
        };

        let name = &body[..end];
        if name.is_empty() {
            diags.error("empty variable reference", Some(format!("at {path}")));
        } else {
            let key = format!("{VAR_PREFIX}{name}");
            match env.get(&key) {
                Some(v) => out.push_str(v),
                None => diags.error(
                    format!("undefined variable \"{name}\""),
                    Some(format!("at {path}; set {key}")),
                ),
            }
        }
        rest = &body[end + 1..];
    }

    out.push_str(rest);
    out
}

fn validate(config: &Config, diags: &mut Diagnostics) {
    let mut required = HashSet::new();
    for (i, p) in config.gateway.providers.iter().enumerate() {
        if p.name.trim().is_empty() {
            diags.error(
                "required provider has an empty name",
                Some(format!("gateway.providers[{i}]")),
            );
        } else if !required.insert(p.name.as_str()) {
            diags.error(
                format!("provider \"{}\" is required more than once", p.name),
                Some(format!("gateway.providers[{i}]")),
            );
        }
    }

    let mut configured = HashSet::new();
    for (i, p) in config.providers.iter().enumerate() {
        if p.name.trim().is_empty() {
            diags.error("provider has an empty name", Some(format!("providers[{i}]")));
        } else if !configured.insert(p.key()) {
            diags.error(
                format!("provider \"{}\" is configured more than once", p.key()),
                Some(format!("providers[{i}]; use an alias to configure it twice")),
            );
        }
    }
}

fn require_configured_providers(config: &mut Config) {
    for p in &config.providers {
        if !config.gateway.providers.iter().any(|r| r.name == p.name) {
            config.gateway.providers.push(RequiredProvider::latest(&p.name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;
    use serde_json::json;

    fn load(value: serde_json::Value, env: &EnvSnapshot) -> Result<Config, Diagnostics> {
        let bytes = serde_json::to_vec(&value).unwrap();
        JsonConfigLoader::new().load("config.json", &bytes, env)
    }

    #[test]
    fn loads_full_configuration() {
        let cfg = load(
            json!({
                "gateway": {
                    "plugin_directory": "./plugins",
                    "providers": [{ "name": "aws", "version": "v0.10.0" }],
                    "connection": { "dsn": "postgres://localhost/db" }
                },
                "providers": [{ "name": "aws", "resources": ["s3.buckets"] }]
            }),
            &EnvSnapshot::default(),
        )
        .unwrap();

        assert_eq!(cfg.dsn(), "postgres://localhost/db");
        assert_eq!(cfg.plugin_directory(), "./plugins");
        assert_eq!(cfg.gateway.policy_directory, None);
        assert_eq!(cfg.required_providers().len(), 1);
        assert_eq!(cfg.required_providers()[0].version, "v0.10.0");
    }

    #[test]
    fn configured_providers_become_required() {
        let cfg = load(json!({ "providers": ["aws"] }), &EnvSnapshot::default()).unwrap();
        assert_eq!(cfg.required_providers(), &[RequiredProvider::latest("aws")]);
    }

    #[test]
    fn invalid_json_is_a_diagnostic() {
        let diags = JsonConfigLoader::new()
            .load("config.json", b"{ not json", &EnvSnapshot::default())
            .unwrap_err();
        assert!(diags.has_errors());
        assert!(diags.to_string().contains("invalid JSON"));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let diags = load(json!(null), &EnvSnapshot::default()).unwrap_err();
        assert!(diags.to_string().contains("must be a JSON object"));
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let diags = load(
            json!({ "gateway": { "plugin_directory": 42 } }),
            &EnvSnapshot::default(),
        )
        .unwrap_err();
        assert!(diags.to_string().contains("invalid configuration"));
    }

    #[test]
    fn variables_are_interpolated_from_prefixed_env() {
        let env = EnvSnapshot::from_pairs([("TASKGATE_VAR_DB_PASS", "s3cret")]);
        let cfg = load(
            json!({
                "gateway": { "connection": { "dsn": "postgres://app:${DB_PASS}@db/app" } }
            }),
            &env,
        )
        .unwrap();
        assert_eq!(cfg.dsn(), "postgres://app:s3cret@db/app");
    }

    #[test]
    fn unprefixed_variables_are_not_visible() {
        let env = EnvSnapshot::from_pairs([("DB_PASS", "s3cret")]);
        let diags = load(
            json!({ "gateway": { "connection": { "dsn": "${DB_PASS}" } } }),
            &env,
        )
        .unwrap_err();
        assert!(diags.to_string().contains("undefined variable \"DB_PASS\""));
    }

    #[test]
    fn escaped_and_bare_dollars_are_kept() {
        let cfg = load(
            json!({ "gateway": { "connection": { "dsn": "a$$${b} $c $" } } }),
            &EnvSnapshot::default(),
        )
        .unwrap();
        assert_eq!(cfg.dsn(), "a$${b} $c $");
    }

    #[test]
    fn unterminated_reference_is_an_error() {
        let diags = load(
            json!({ "gateway": { "connection": { "dsn": "${OPEN" } } }),
            &EnvSnapshot::default(),
        )
        .unwrap_err();
        assert!(diags.to_string().contains("unterminated"));
    }

    #[test]
    fn duplicate_providers_need_an_alias() {
        let diags = load(json!({ "providers": ["aws", "aws"] }), &EnvSnapshot::default())
            .unwrap_err();
        assert!(diags.to_string().contains("configured more than once"));

        let cfg = load(
            json!({ "providers": ["aws", { "name": "aws", "alias": "aws-2" }] }),
            &EnvSnapshot::default(),
        )
        .unwrap();
        assert_eq!(cfg.providers.len(), 2);
        assert_eq!(cfg.required_providers().len(), 1);
    }

    #[test]
    fn empty_provider_name_is_rejected() {
        let diags = load(
            json!({ "gateway": { "providers": [{ "name": " " }] } }),
            &EnvSnapshot::default(),
        )
        .unwrap_err();
        assert!(diags.iter().all(|d| d.severity == Severity::Error));
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn unknown_top_level_keys_only_warn() {
        let cfg = load(json!({ "providers": [], "extra": true }), &EnvSnapshot::default());
        assert!(cfg.is_ok());
    }
}
