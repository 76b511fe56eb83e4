//! Errors - エラー型と分類
//!
//! すべての段階の失敗は `GatewayError` にまとめられ、残りの段階を打ち切ります。
//! どの段階で失敗したかは `stage()` で取り出せるので、呼び出し側はそのまま
//! ログに出せます。リトライはこの層では行いません。

use std::fmt;

use thiserror::Error;

use super::task::TaskKind;

/// エラーが発生した dispatch の段階
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Encoding,
    Configuration,
    ClientInit,
    ProviderInit,
    Normalize,
    Fetch,
    Policy,
    Dispatch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Encoding => "encoding",
            Stage::Configuration => "configuration",
            Stage::ClientInit => "client_init",
            Stage::ProviderInit => "provider_init",
            Stage::Normalize => "normalize",
            Stage::Fetch => "fetch",
            Stage::Policy => "policy",
            Stage::Dispatch => "dispatch",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unable to encode configuration payload: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("bad configuration ({source_name}): {diagnostics}")]
    Configuration {
        source_name: String,
        diagnostics: Diagnostics,
    },

    #[error("unable to create client for task {task}: {source}")]
    ClientInit { task: TaskKind, source: ClientError },

    #[error("unable to initialize client: {source}")]
    ProviderInit { source: ClientError },

    /// Normalization errors surface with the client's own message.
    #[error(transparent)]
    Normalize(ClientError),

    #[error("error fetching resources: {source}")]
    Fetch { source: ClientError },

    #[error("error running policy: {source}")]
    PolicyExecution { source: ClientError },

    #[error("unknown task: {0}")]
    UnknownTask(String),
}

impl GatewayError {
    /// 失敗した段階（ログの `stage` フィールドに使う）
    pub fn stage(&self) -> Stage {
        match self {
            GatewayError::Encoding(_) => Stage::Encoding,
            GatewayError::Configuration { .. } => Stage::Configuration,
            GatewayError::ClientInit { .. } => Stage::ClientInit,
            GatewayError::ProviderInit { .. } => Stage::ProviderInit,
            GatewayError::Normalize(_) => Stage::Normalize,
            GatewayError::Fetch { .. } => Stage::Fetch,
            GatewayError::PolicyExecution { .. } => Stage::Policy,
            GatewayError::UnknownTask(_) => Stage::Dispatch,
        }
    }

    /// The execution client's error, for stages that wrap one.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            GatewayError::ClientInit { source, .. }
            | GatewayError::ProviderInit { source }
            | GatewayError::Normalize(source)
            | GatewayError::Fetch { source }
            | GatewayError::PolicyExecution { source } => Some(source),
            _ => None,
        }
    }
}

/// ClientError は execution client が返すエラー
#[derive(Debug)]
pub struct ClientError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ClientError {
    /// message だけの ClientError
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// 原因のエラーを保持する ClientError
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// client が返したメッセージ（そのまま表示される）
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{level}: {}", self.summary)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

/// Diagnostics は loader の診断結果。`GatewayError::Configuration` にそのまま載る
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// 空の Diagnostics
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// error を追加。1 つでもあれば読み込みは失敗
    pub fn error(&mut self, summary: impl Into<String>, detail: Option<String>) {
        self.0.push(Diagnostic {
            severity: Severity::Error,
            summary: summary.into(),
            detail,
        });
    }

    /// warning を追加。読み込みは続行される
    pub fn warning(&mut self, summary: impl Into<String>, detail: Option<String>) {
        self.0.push(Diagnostic {
            severity: Severity::Warning,
            summary: summary.into(),
            detail,
        });
    }

    /// error が含まれるか
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn normalize_error_is_verbatim() {
        let err = GatewayError::Normalize(ClientError::new("unknown resource ec2.foo"));
        assert_eq!(err.to_string(), "unknown resource ec2.foo");
        assert_eq!(err.stage(), Stage::Normalize);
    }

    #[test]
    fn wrapped_errors_keep_the_cause() {
        let err = GatewayError::PolicyExecution {
            source: ClientError::new("disk full"),
        };
        assert_eq!(err.to_string(), "error running policy: disk full");
        assert_eq!(err.client_error().map(|e| e.message()), Some("disk full"));
        assert!(err.source().is_some());
    }

    #[test]
    fn client_init_names_the_task() {
        let err = GatewayError::ClientInit {
            task: TaskKind::Fetch,
            source: ClientError::new("connection refused"),
        };
        assert_eq!(
            err.to_string(),
            "unable to create client for task fetch: connection refused"
        );
    }

    #[test]
    fn diagnostics_join_and_classify() {
        let mut diags = Diagnostics::new();
        assert!(!diags.has_errors());
        diags.warning("unknown key \"extra\"", None);
        assert!(!diags.has_errors());
        diags.error("invalid json", Some("line 1".to_string()));
        assert!(diags.has_errors());
        assert_eq!(
            diags.to_string(),
            "warning: unknown key \"extra\"; error: invalid json (line 1)"
        );
    }
}
