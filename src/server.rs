//! gRPC plumbing between the Hemmer engine and the provider.
//!
//! [`ProviderService`] is the typed surface a provider implements; the
//! private `ProviderGrpcService` adapts it to the generated tonic trait,
//! decoding JSON payloads and turning every error into a diagnostic.
//!
//! # Signal Handling
//!
//! The server handles SIGTERM and SIGINT (CTRL+C on Windows). On a signal it
//! stops accepting connections, waits up to
//! [`ServeOptions::shutdown_timeout`] for in-flight requests, then calls
//! [`ProviderService::stop`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated as proto;
use crate::schema::{Block, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema};
use crate::types::{
    ImportedResource, PlanResult, ProviderMetadata, HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};

/// Typed provider operations.
///
/// Payloads are `serde_json::Value`s; failures are [`ProviderError`]s which
/// the server reports to the engine as error diagnostics.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Resource and data source names plus capabilities. Derived from the
    /// schema unless overridden.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
            capabilities: Default::default(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Upgrade resource state from an older schema version. Every schema is
    /// still at version 0, so state passes through unchanged.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Refresh a resource. `Ok(None)` removes it from state.
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError>;

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = id;
        Err(ProviderError::Unimplemented(format!(
            "import is not supported for {}",
            resource_type
        )))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let _ = config;
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

/// Decode a JSON payload. Empty bytes mean null.
fn decode(bytes: &[u8], what: &str) -> Result<Value, ProviderError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|e| ProviderError::Validation(format!("malformed {} payload: {}", what, e)))
}

fn encode(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

fn diagnostic_to_proto(d: Diagnostic) -> proto::Diagnostic {
    let severity = match d.severity {
        DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
        DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
    };
    proto::Diagnostic {
        severity: severity as i32,
        summary: d.summary,
        detail: d.detail.unwrap_or_default(),
        attribute: d.attribute.unwrap_or_default(),
    }
}

/// Split an operation result into its value and the response diagnostics.
///
/// Errors never become gRPC statuses: the engine expects a normal response
/// carrying a single error diagnostic.
fn settle<T>(
    operation: &str,
    subject: &str,
    result: Result<T, ProviderError>,
) -> (Option<T>, Vec<proto::Diagnostic>) {
    match result {
        Ok(value) => (Some(value), vec![]),
        Err(e) => {
            error!(subject, error = %e, "{} failed", operation);
            (None, vec![diagnostic_to_proto(Diagnostic::error(e.to_string()))])
        },
    }
}

/// [`settle`] for validation-style calls whose success value is itself a
/// list of diagnostics.
fn settle_diagnostics(
    operation: &str,
    subject: &str,
    result: Result<Vec<Diagnostic>, ProviderError>,
) -> Vec<proto::Diagnostic> {
    match settle(operation, subject, result) {
        (Some(diagnostics), _) => {
            let errors = diagnostics.iter().filter(|d| d.is_error()).count();
            if errors > 0 {
                warn!(subject, errors, "{} completed with errors", operation);
            } else {
                debug!(subject, "{} completed", operation);
            }
            diagnostics.into_iter().map(diagnostic_to_proto).collect()
        },
        (None, failure) => failure,
    }
}

fn state_bytes(state: Option<Value>) -> Vec<u8> {
    state.as_ref().map(encode).unwrap_or_default()
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> proto::Block {
    let attributes = block.attributes.iter().map(|(name, attr)| proto::Attribute {
        name: name.clone(),
        r#type: attr.attr_type.wire_name().as_bytes().to_vec(),
        required: attr.presence.is_required(),
        optional: attr.presence.is_optional(),
        computed: attr.presence.is_computed(),
        sensitive: attr.sensitive,
        description: attr.description.clone().unwrap_or_default(),
        force_new: attr.force_new,
        default_value: attr.default.as_ref().map(encode).unwrap_or_default(),
    });
    let block_types = block.blocks.iter().map(|(name, nested)| proto::NestedBlock {
        type_name: name.clone(),
        block: Some(block_to_proto(&nested.block)),
        nesting_mode: proto::nested_block::NestingMode::List as i32,
        min_items: 0,
        max_items: 0,
    });
    proto::Block {
        attributes: attributes.collect(),
        block_types: block_types.collect(),
        description: block.description.clone().unwrap_or_default(),
    }
}

/// Adapter implementing the generated gRPC trait.
struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

#[tonic::async_trait]
impl<P: ProviderService> proto::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip_all, name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: Request<proto::GetMetadataRequest>,
    ) -> Result<Response<proto::GetMetadataResponse>, Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = ?metadata.resources,
            data_sources = ?metadata.data_sources,
            "GetMetadata"
        );
        Ok(Response::new(proto::GetMetadataResponse {
            server_capabilities: Some(proto::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: Request<proto::GetSchemaRequest>,
    ) -> Result<Response<proto::GetSchemaResponse>, Status> {
        let schema = self.provider.schema();
        let convert = |schemas: &std::collections::BTreeMap<String, Schema>| {
            schemas
                .iter()
                .map(|(name, s)| (name.clone(), schema_to_proto(s)))
                .collect()
        };
        Ok(Response::new(proto::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: convert(&schema.resources),
            data_sources: convert(&schema.data_sources),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: Request<proto::ValidateProviderConfigRequest>,
    ) -> Result<Response<proto::ValidateProviderConfigResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let config = decode(&req.config, "config")?;
            self.provider.validate_provider_config(config).await
        }
        .await;
        let diagnostics = settle_diagnostics("ValidateProviderConfig", "provider", result);
        Ok(Response::new(proto::ValidateProviderConfigResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.configure")]
    async fn configure(
        &self,
        request: Request<proto::ConfigureRequest>,
    ) -> Result<Response<proto::ConfigureResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let config = decode(&req.config, "config")?;
            self.provider.configure(config).await
        }
        .await;
        let diagnostics = settle_diagnostics("Configure", "provider", result);
        Ok(Response::new(proto::ConfigureResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.stop")]
    async fn stop(
        &self,
        _request: Request<proto::StopRequest>,
    ) -> Result<Response<proto::StopResponse>, Status> {
        info!("Stop requested");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            },
        };
        Ok(Response::new(proto::StopResponse { error }))
    }

    #[instrument(
        skip_all,
        name = "grpc.validate_resource_config",
        fields(resource_type = %request.get_ref().resource_type)
    )]
    async fn validate_resource_config(
        &self,
        request: Request<proto::ValidateResourceConfigRequest>,
    ) -> Result<Response<proto::ValidateResourceConfigResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let config = decode(&req.config, "config")?;
            self.provider
                .validate_resource_config(&req.resource_type, config)
                .await
        }
        .await;
        let diagnostics = settle_diagnostics("ValidateResourceConfig", &req.resource_type, result);
        Ok(Response::new(proto::ValidateResourceConfigResponse { diagnostics }))
    }

    #[instrument(
        skip_all,
        name = "grpc.upgrade_resource_state",
        fields(resource_type = %request.get_ref().resource_type)
    )]
    async fn upgrade_resource_state(
        &self,
        request: Request<proto::UpgradeResourceStateRequest>,
    ) -> Result<Response<proto::UpgradeResourceStateResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let state = decode(&req.raw_state, "state")?;
            self.provider
                .upgrade_resource_state(&req.resource_type, req.version, state)
                .await
        }
        .await;
        let (upgraded, diagnostics) = settle("UpgradeResourceState", &req.resource_type, result);
        Ok(Response::new(proto::UpgradeResourceStateResponse {
            upgraded_state: state_bytes(upgraded),
            diagnostics,
        }))
    }

    #[instrument(
        skip_all,
        name = "grpc.plan",
        fields(resource_type = %request.get_ref().resource_type)
    )]
    async fn plan(
        &self,
        request: Request<proto::PlanRequest>,
    ) -> Result<Response<proto::PlanResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let prior_state =
                Some(decode(&req.prior_state, "prior state")?).filter(|v| !v.is_null());
            let proposed_state = decode(&req.proposed_state, "proposed state")?;
            let config = decode(&req.config, "config")?;
            self.provider
                .plan(&req.resource_type, prior_state, proposed_state, config)
                .await
        }
        .await;

        let response = match settle("Plan", &req.resource_type, result) {
            (Some(plan), diagnostics) => {
                debug!(
                    changes = plan.changes.len(),
                    requires_replace = plan.requires_replace,
                    "Plan completed"
                );
                proto::PlanResponse {
                    planned_state: encode(&plan.planned_state),
                    changes: plan.changes.into_iter().map(Into::into).collect(),
                    requires_replace: plan.requires_replace,
                    diagnostics,
                }
            },
            (None, diagnostics) => proto::PlanResponse {
                planned_state: vec![],
                changes: vec![],
                requires_replace: false,
                diagnostics,
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(
        skip_all,
        name = "grpc.create",
        fields(resource_type = %request.get_ref().resource_type)
    )]
    async fn create(
        &self,
        request: Request<proto::CreateRequest>,
    ) -> Result<Response<proto::CreateResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let planned_state = decode(&req.planned_state, "planned state")?;
            self.provider.create(&req.resource_type, planned_state).await
        }
        .await;
        let (state, diagnostics) = settle("Create", &req.resource_type, result);
        if state.is_some() {
            info!("Create completed");
        }
        Ok(Response::new(proto::CreateResponse {
            state: state_bytes(state),
            diagnostics,
        }))
    }

    #[instrument(
        skip_all,
        name = "grpc.read",
        fields(resource_type = %request.get_ref().resource_type)
    )]
    async fn read(
        &self,
        request: Request<proto::ReadRequest>,
    ) -> Result<Response<proto::ReadResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let current_state = decode(&req.current_state, "current state")?;
            self.provider.read(&req.resource_type, current_state).await
        }
        .await;
        let (state, diagnostics) = settle("Read", &req.resource_type, result);
        // Empty state bytes tell the engine to drop the resource.
        if matches!(state, Some(None)) {
            warn!("Resource no longer exists on the device");
        }
        Ok(Response::new(proto::ReadResponse {
            state: state_bytes(state.flatten()),
            diagnostics,
        }))
    }

    #[instrument(
        skip_all,
        name = "grpc.update",
        fields(resource_type = %request.get_ref().resource_type)
    )]
    async fn update(
        &self,
        request: Request<proto::UpdateRequest>,
    ) -> Result<Response<proto::UpdateResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let prior_state = decode(&req.prior_state, "prior state")?;
            let planned_state = decode(&req.planned_state, "planned state")?;
            self.provider
                .update(&req.resource_type, prior_state, planned_state)
                .await
        }
        .await;
        let (state, diagnostics) = settle("Update", &req.resource_type, result);
        if state.is_some() {
            info!("Update completed");
        }
        Ok(Response::new(proto::UpdateResponse {
            state: state_bytes(state),
            diagnostics,
        }))
    }

    #[instrument(
        skip_all,
        name = "grpc.delete",
        fields(resource_type = %request.get_ref().resource_type)
    )]
    async fn delete(
        &self,
        request: Request<proto::DeleteRequest>,
    ) -> Result<Response<proto::DeleteResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let current_state = decode(&req.current_state, "current state")?;
            self.provider.delete(&req.resource_type, current_state).await
        }
        .await;
        let (deleted, diagnostics) = settle("Delete", &req.resource_type, result);
        if deleted.is_some() {
            info!("Delete completed");
        }
        Ok(Response::new(proto::DeleteResponse { diagnostics }))
    }

    #[instrument(
        skip_all,
        name = "grpc.import_resource_state",
        fields(resource_type = %request.get_ref().resource_type, id = %request.get_ref().id)
    )]
    async fn import_resource_state(
        &self,
        request: Request<proto::ImportResourceStateRequest>,
    ) -> Result<Response<proto::ImportResourceStateResponse>, Status> {
        let req = request.into_inner();
        let result = self.provider.import_resource(&req.resource_type, &req.id).await;
        let (imported, diagnostics) = settle("ImportResourceState", &req.resource_type, result);
        let imported: Vec<_> = imported
            .unwrap_or_default()
            .into_iter()
            .map(|r| proto::ImportedResource {
                resource_type: r.resource_type,
                state: encode(&r.state),
            })
            .collect();
        if !imported.is_empty() {
            info!(count = imported.len(), "Import completed");
        }
        Ok(Response::new(proto::ImportResourceStateResponse {
            imported,
            diagnostics,
        }))
    }

    #[instrument(
        skip_all,
        name = "grpc.validate_data_source_config",
        fields(data_source_type = %request.get_ref().data_source_type)
    )]
    async fn validate_data_source_config(
        &self,
        request: Request<proto::ValidateDataSourceConfigRequest>,
    ) -> Result<Response<proto::ValidateDataSourceConfigResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let config = decode(&req.config, "config")?;
            self.provider
                .validate_data_source_config(&req.data_source_type, config)
                .await
        }
        .await;
        let diagnostics =
            settle_diagnostics("ValidateDataSourceConfig", &req.data_source_type, result);
        Ok(Response::new(proto::ValidateDataSourceConfigResponse { diagnostics }))
    }

    #[instrument(
        skip_all,
        name = "grpc.read_data_source",
        fields(data_source_type = %request.get_ref().data_source_type)
    )]
    async fn read_data_source(
        &self,
        request: Request<proto::ReadDataSourceRequest>,
    ) -> Result<Response<proto::ReadDataSourceResponse>, Status> {
        let req = request.into_inner();
        let result = async {
            let config = decode(&req.config, "config")?;
            self.provider
                .read_data_source(&req.data_source_type, config)
                .await
        }
        .await;
        let (state, diagnostics) = settle("ReadDataSource", &req.data_source_type, result);
        Ok(Response::new(proto::ReadDataSourceResponse {
            state: state_bytes(state),
            diagnostics,
        }))
    }
}

/// Options for configuring the provider server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long to wait for in-flight requests after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Wait for SIGTERM or SIGINT (CTRL+C on Windows).
///
/// If the handlers cannot be installed the future never completes, so the
/// server keeps running until its process is killed.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!(error = %e, "Failed to install signal handlers");
                    return std::future::pending().await;
                },
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        }
    }

    #[cfg(windows)]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C handler");
            return std::future::pending().await;
        }
        info!("Received CTRL+C, initiating graceful shutdown");
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::future::pending::<()>().await;
    }
}

/// Serve a provider on an ephemeral localhost port.
///
/// Prints the handshake `HEMMER_PROVIDER|<version>|<address>` to stdout and
/// runs until a shutdown signal arrives.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Like [`serve`], with custom [`ServeOptions`].
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    serve_on_listener(provider, listener, addr, options).await
}

/// Serve a provider on a specific address.
pub async fn serve_on<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    serve_on_with_options(provider, addr, ServeOptions::default()).await
}

/// Serve a provider on a specific address with custom options.
pub async fn serve_on_with_options<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    serve_on_listener(provider, listener, actual_addr, options).await
}

async fn serve_on_listener<P: ProviderService>(
    provider: P,
    listener: TcpListener,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr);
    info!(address = %addr, "Provider server starting");

    let provider = Arc::new(provider);
    let service = proto::provider_server::ProviderServer::new(ProviderGrpcService {
        provider: Arc::clone(&provider),
    });

    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = Server::builder().add_service(service).serve_with_incoming_shutdown(
        tokio_stream::wrappers::TcpListenerStream::new(listener),
        async move {
            wait_for_shutdown_signal().await;
            let _ = signalled_tx.send(());
        },
    );
    tokio::pin!(server);

    // The timeout only bounds the drain that starts once a signal arrives.
    let result = tokio::select! {
        result = &mut server => Some(result),
        _ = signalled_rx => tokio::time::timeout(options.shutdown_timeout, &mut server).await.ok(),
    };

    match result {
        Some(Ok(())) => info!("Server shutdown complete"),
        Some(Err(e)) => {
            error!(error = %e, "Server error");
            return Err(e.into());
        },
        None => warn!(
            timeout = ?options.shutdown_timeout,
            "Shutdown timeout exceeded, forcing shutdown"
        ),
    }

    debug!("Calling provider stop()");
    if let Err(e) = provider.stop().await {
        warn!(error = %e, "Provider stop() returned error");
    }

    info!("Provider shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generated::provider_server::Provider;
    use crate::schema::{Attribute, NestedBlock};
    use serde_json::json;

    /// Records what reaches the typed layer.
    struct EchoProvider;

    #[async_trait::async_trait]
    impl ProviderService for EchoProvider {
        fn schema(&self) -> ProviderSchema {
            ProviderSchema::new().with_resource(
                "bigip_net_dns_resolver",
                Schema::v0()
                    .with_attribute("name", Attribute::required_string().with_force_new())
                    .with_block(
                        "forward_zones",
                        NestedBlock::list(
                            Block::new().with_attribute("name", Attribute::required_string()),
                        ),
                    ),
            )
        }

        async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
            if config.get("address").is_none() {
                return Ok(vec![Diagnostic::error("address is required").with_attribute("address")]);
            }
            Ok(vec![])
        }

        async fn plan(
            &self,
            _resource_type: &str,
            prior_state: Option<Value>,
            proposed_state: Value,
            _config: Value,
        ) -> Result<PlanResult, ProviderError> {
            Ok(PlanResult::new(proposed_state, vec![], prior_state.is_some()))
        }

        async fn create(
            &self,
            _resource_type: &str,
            planned_state: Value,
        ) -> Result<Value, ProviderError> {
            Ok(planned_state)
        }

        async fn read(
            &self,
            _resource_type: &str,
            current_state: Value,
        ) -> Result<Option<Value>, ProviderError> {
            if current_state["name"] == "gone" {
                return Ok(None);
            }
            Ok(Some(current_state))
        }

        async fn update(
            &self,
            _resource_type: &str,
            _prior_state: Value,
            planned_state: Value,
        ) -> Result<Value, ProviderError> {
            Ok(planned_state)
        }

        async fn delete(
            &self,
            resource_type: &str,
            _current_state: Value,
        ) -> Result<(), ProviderError> {
            Err(ProviderError::NotFound(format!("{} missing", resource_type)))
        }
    }

    fn service() -> ProviderGrpcService<EchoProvider> {
        ProviderGrpcService {
            provider: Arc::new(EchoProvider),
        }
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode(b"", "state").unwrap(), Value::Null);
        assert_eq!(decode(br#"{"a":1}"#, "state").unwrap(), json!({"a": 1}));
        let err = decode(b"{not json", "state").unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.message().starts_with("malformed state payload"));
    }

    #[test]
    fn test_block_to_proto() {
        let schema = service().provider.schema();
        let block = block_to_proto(&schema.resources["bigip_net_dns_resolver"].block);

        assert_eq!(block.attributes.len(), 1);
        assert!(block.attributes[0].required);
        assert!(block.attributes[0].force_new);
        assert_eq!(block.attributes[0].r#type, b"string".to_vec());
        assert_eq!(block.block_types.len(), 1);
        assert_eq!(block.block_types[0].type_name, "forward_zones");
        assert_eq!(
            block.block_types[0].nesting_mode,
            proto::nested_block::NestingMode::List as i32
        );
    }

    #[tokio::test]
    async fn test_configure_reports_diagnostics() {
        let response = service()
            .configure(Request::new(proto::ConfigureRequest {
                config: b"{}".to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].attribute, "address");
        assert_eq!(
            response.diagnostics[0].severity,
            proto::diagnostic::Severity::Error as i32
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_becomes_diagnostic() {
        let response = service()
            .create(Request::new(proto::CreateRequest {
                resource_type: "bigip_net_dns_resolver".to_string(),
                planned_state: b"[oops".to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.state.is_empty());
        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains("malformed planned state payload"));
    }

    #[tokio::test]
    async fn test_read_of_missing_resource_returns_empty_state() {
        let response = service()
            .read(Request::new(proto::ReadRequest {
                resource_type: "bigip_net_dns_resolver".to_string(),
                current_state: br#"{"name":"gone"}"#.to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.state.is_empty());
        assert!(response.diagnostics.is_empty());

        let response = service()
            .read(Request::new(proto::ReadRequest {
                resource_type: "bigip_net_dns_resolver".to_string(),
                current_state: br#"{"name":"/Common/r1"}"#.to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        let state: Value = serde_json::from_slice(&response.state).unwrap();
        assert_eq!(state["name"], "/Common/r1");
    }

    #[tokio::test]
    async fn test_plan_treats_empty_prior_as_create() {
        let response = service()
            .plan(Request::new(proto::PlanRequest {
                resource_type: "bigip_net_dns_resolver".to_string(),
                prior_state: vec![],
                proposed_state: br#"{"name":"/Common/r1"}"#.to_vec(),
                config: vec![],
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(!response.requires_replace);

        let response = service()
            .plan(Request::new(proto::PlanRequest {
                resource_type: "bigip_net_dns_resolver".to_string(),
                prior_state: br#"{"name":"/Common/r0"}"#.to_vec(),
                proposed_state: br#"{"name":"/Common/r1"}"#.to_vec(),
                config: vec![],
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.requires_replace);
    }

    #[tokio::test]
    async fn test_errors_and_unsupported_operations() {
        let response = service()
            .delete(Request::new(proto::DeleteRequest {
                resource_type: "bigip_net_dns_resolver".to_string(),
                current_state: br#"{"name":"/Common/r1"}"#.to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.diagnostics[0].summary.contains("bigip_net_dns_resolver missing"));

        let response = service()
            .import_resource_state(Request::new(proto::ImportResourceStateRequest {
                resource_type: "bigip_net_dns_resolver".to_string(),
                id: "/Common/r1".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.imported.is_empty());
        assert!(response.diagnostics[0].summary.contains("import is not supported"));
    }

    #[tokio::test]
    async fn test_get_metadata_derives_from_schema() {
        let response = service()
            .get_metadata(Request::new(proto::GetMetadataRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.resources, vec!["bigip_net_dns_resolver".to_string()]);
        assert!(!response.server_capabilities.unwrap().plan_destroy);
    }
}
