//! Fetch operation: providers → normalize → fetch.
//!
//! Stages run in order and the first failure ends the operation. Nothing is
//! retried here and nothing already written is rolled back.

use crate::domain::{Config, GatewayError, TaskKind};
use crate::ports::{ClientFactory, ClientOptions, ExecutionClient, FetchRequest, FetchSummary};

use super::release;

/// fetch を実行する。client はどの経路でも close される
pub async fn run<F>(clients: &F, config: &Config) -> Result<FetchSummary, GatewayError>
where
    F: ClientFactory + ?Sized,
{
    let options = ClientOptions::new(config.plugin_directory(), config.dsn());
    let mut client = clients
        .connect(options)
        .await
        .map_err(|source| GatewayError::ClientInit {
            task: TaskKind::Fetch,
            source,
        })?;

    let result = stages(client.as_mut(), config).await;
    release(client, TaskKind::Fetch.as_str()).await;
    result
}

async fn stages(
    client: &mut dyn ExecutionClient,
    config: &Config,
) -> Result<FetchSummary, GatewayError> {
    client
        .ensure_providers(config.required_providers())
        .await
        .map_err(|source| GatewayError::ProviderInit { source })?;
    tracing::debug!(count = config.required_providers().len(), "providers ready");

    client
        .normalize(&config.providers)
        .await
        .map_err(GatewayError::Normalize)?;

    let summary = client
        .fetch(FetchRequest {
            providers: config.providers.clone(),
        })
        .await
        .map_err(|source| GatewayError::Fetch { source })?;

    tracing::info!(
        providers = summary.providers.len(),
        resources = summary.total_resources(),
        "fetch finished"
    );
    Ok(summary)
}
