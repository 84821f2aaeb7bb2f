//! The BIG-IP provider: schema, configuration and dispatch to resources.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::client::BigIpClient;
use crate::config::{parse_provider_config, provider_schema};
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::resources::{all_data_sources, all_resources, DataSource, Resource};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
use crate::validation::validate;

/// Provider for F5 BIG-IP devices.
///
/// Resource operations need a client, which `configure` builds and stores.
/// The client is swapped atomically; in-flight requests keep the one they
/// started with.
pub struct BigIpProvider {
    client: RwLock<Option<Arc<BigIpClient>>>,
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSource>>,
}

impl Default for BigIpProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BigIpProvider {
    /// An unconfigured provider.
    pub fn new() -> Self {
        Self {
            client: RwLock::new(None),
            resources: all_resources()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: all_data_sources()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
        }
    }

    /// A provider that uses `client` without going through `configure`.
    pub fn with_client(client: BigIpClient) -> Self {
        let mut provider = Self::new();
        provider.client = RwLock::new(Some(Arc::new(client)));
        provider
    }

    /// Whether a client has been configured.
    pub async fn is_configured(&self) -> bool {
        self.client.read().await.is_some()
    }

    async fn client(&self) -> Result<Arc<BigIpClient>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "provider is not configured; call Configure first".to_string(),
            )
        })
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DataSource, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .map(|d| d.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderService for BigIpProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = self
            .resources
            .values()
            .fold(ProviderSchema::new().with_provider_config(provider_schema()), |s, r| {
                s.with_resource(r.type_name(), r.schema())
            });
        self.data_sources
            .values()
            .fold(schema, |s, d| s.with_data_source(d.type_name(), d.schema()))
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.resources.keys().map(|k| k.to_string()).collect(),
            data_sources: self.data_sources.keys().map(|k| k.to_string()).collect(),
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&provider_schema(), &config);
        if diagnostics.is_empty() {
            if let Err(errors) = parse_provider_config(&config) {
                diagnostics.extend(errors);
            }
        }
        Ok(diagnostics)
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let client_config = match parse_provider_config(&config) {
            Ok(c) => c,
            Err(diagnostics) => return Ok(diagnostics),
        };
        let address = client_config.address.clone();

        let mut client = BigIpClient::new(client_config)
            .map_err(|e| ProviderError::client("error building BIG-IP client", e))?;
        client
            .login()
            .await
            .map_err(|e| {
                ProviderError::client(format!("error connecting to BIG-IP {}", address), e)
            })?;

        info!(address = %address, token = client.has_token(), "Configured BIG-IP client");
        *self.client.write().await = Some(Arc::new(client));
        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        debug!("Dropping BIG-IP client");
        self.client.write().await.take();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut diagnostics = validate(&resource.schema(), &config);
        diagnostics.extend(resource.validate(&config));
        Ok(diagnostics)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        Ok(plan_resource(
            &resource.schema(),
            prior_state.as_ref(),
            proposed_state,
        ))
    }

    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.create(&client, planned_state).await
    }

    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.read(&client, current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.update(&client, prior_state, planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.delete(&client, current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let state = resource.import(&client, id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        Ok(validate(&data_source.schema(), &config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let client = self.client().await?;
        data_source.read(&client, config).await
    }
}
