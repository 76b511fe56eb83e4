use std::path::PathBuf;

use crate::domain::{Config, GatewayError, TaskKind};
use crate::ports::{ClientFactory, ClientOptions, PolicyRunRequest};

use super::release;

/// Where policy results are written.
pub const POLICY_OUTPUT_PATH: &str = "/tmp/result.json";

/// Run the policy at `policy_source` with every check evaluated, even after
/// an earlier one fails.
pub async fn run<F>(clients: &F, config: &Config, policy_source: &str) -> Result<(), GatewayError>
where
    F: ClientFactory + ?Sized,
{
    // TODO: download object-storage locations (s3://...) to a local file
    // before handing them to the client. Only local paths work today.
    let request = PolicyRunRequest {
        args: vec![policy_source.to_string()],
        stop_on_failure: false,
        output_path: PathBuf::from(POLICY_OUTPUT_PATH),
    };

    let options = ClientOptions::new(config.plugin_directory(), config.dsn())
        .with_policy_directory(config.policy_directory());
    let mut client = clients
        .connect(options)
        .await
        .map_err(|source| GatewayError::ClientInit {
            task: TaskKind::Policy,
            source,
        })?;

    tracing::debug!(source = policy_source, output = POLICY_OUTPUT_PATH, "running policy");
    let result = client
        .run_policy(request)
        .await
        .map_err(|source| GatewayError::PolicyExecution { source });
    release(client, TaskKind::Policy.as_str()).await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{ClientCall, ScriptedClientFactory, ScriptedStage};

    fn config() -> Config {
        let mut cfg = Config::default();
        cfg.set_dsn("postgres://db");
        cfg.apply_directory_defaults("./plugins", "./policies");
        cfg
    }

    #[tokio::test]
    async fn runs_policy_without_stopping_on_failure() {
        let clients = ScriptedClientFactory::new();
        run(&clients, &config(), "./policies/cis.json").await.unwrap();

        assert_eq!(
            clients.calls(),
            vec![
                ClientCall::Connect(
                    ClientOptions::new("./plugins", "postgres://db").with_policy_directory("./policies")
                ),
                ClientCall::RunPolicy(PolicyRunRequest {
                    args: vec!["./policies/cis.json".to_string()],
                    stop_on_failure: false,
                    output_path: PathBuf::from("/tmp/result.json"),
                }),
                ClientCall::Close,
            ]
        );
    }

    #[tokio::test]
    async fn run_failure_is_wrapped_and_client_closed() {
        let clients = ScriptedClientFactory::new().fail_on(ScriptedStage::RunPolicy, "disk full");
        let err = run(&clients, &config(), "p.json").await.unwrap_err();

        match err {
            GatewayError::PolicyExecution { source } => assert_eq!(source.message(), "disk full"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(clients.closed(), 1);
    }

    #[tokio::test]
    async fn empty_source_is_passed_through() {
        let clients = ScriptedClientFactory::new();
        run(&clients, &config(), "").await.unwrap();
        assert!(clients.calls().iter().any(|c| matches!(
            c,
            ClientCall::RunPolicy(req) if req.args == vec![String::new()]
        )));
    }
}
