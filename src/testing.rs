//! Drive a [`ProviderService`] the way the engine does, without gRPC.
//!
//! Pair it with a `wiremock` server standing in for the BIG-IP management
//! interface:
//!
//! ```ignore
//! use bigip_provider::testing::ProviderTester;
//! use bigip_provider::BigIpProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn creates_a_workspace() {
//!     let device = wiremock::MockServer::start().await;
//!     // mount POST/GET mocks for /mgmt/tm/ilx/workspace ...
//!     let tester = ProviderTester::new(BigIpProvider::new());
//!     tester
//!         .configure(json!({"address": device.uri(), "username": "admin", "password": "admin"}))
//!         .await
//!         .unwrap();
//!
//!     let state = tester
//!         .lifecycle_create("bigip_ilx_workspace", json!({"name": "ws1"}))
//!         .await
//!         .unwrap();
//!     assert_eq!(state["id"], "ws1");
//! }
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::error::ProviderError;
use crate::schema::Diagnostic;
use crate::server::ProviderService;
use crate::types::PlanResult;

/// Test harness around a provider.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Validate provider configuration; error diagnostics become `Err`.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        errors_only(self.provider.validate_provider_config(config).await?)
    }

    /// Configure the provider; error diagnostics become `Err`.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        errors_only(self.provider.configure(config).await?)
    }

    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        errors_only(
            self.provider
                .validate_resource_config(resource_type, config)
                .await?,
        )
    }

    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        errors_only(
            self.provider
                .validate_data_source_config(data_source_type, config)
                .await?,
        )
    }

    /// Plan a create. The configuration doubles as the proposed state.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.plan(resource_type, None, config).await
    }

    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.plan(resource_type, Some(prior_state), config).await
    }

    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.plan(resource_type, Some(prior_state), Value::Null).await
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, prior_state, config.clone(), config)
            .await
    }

    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh a resource; `Ok(None)` means it is gone from the device.
    pub async fn read(
        &self,
        resource_type: &str,
        state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, state).await
    }

    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read_data_source(data_source_type, config).await
    }

    /// plan, create, then refresh.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.refresh_after(resource_type, created, "create").await
    }

    /// plan, update, then refresh.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        let updated = self
            .provider
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.refresh_after(resource_type, updated, "update").await
    }

    /// plan a destroy, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        state: Value,
    ) -> Result<(), ProviderError> {
        let plan = self.plan_delete(resource_type, state.clone()).await?;
        if !plan.planned_state.is_null() {
            return Err(ProviderError::Internal(format!(
                "destroy plan for {} kept state",
                resource_type
            )));
        }
        self.provider.delete(resource_type, state).await
    }

    /// Create with `initial`, update to `updated`, then delete. Returns the
    /// refreshed state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial: Value,
        updated: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial).await?;
        let state = self.lifecycle_update(resource_type, created, updated).await?;
        self.lifecycle_delete(resource_type, state.clone()).await?;
        Ok(state)
    }

    async fn refresh_after(
        &self,
        resource_type: &str,
        state: Value,
        step: &str,
    ) -> Result<Value, ProviderError> {
        self.read(resource_type, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("{} disappeared after {}", resource_type, step))
        })
    }
}

/// Failure of a harness call that reports diagnostics.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("{}", render(.0))]
    Diagnostics(Vec<Diagnostic>),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl TestError {
    /// Attribute paths named by the error diagnostics.
    pub fn attributes(&self) -> Vec<&str> {
        match self {
            TestError::Diagnostics(diags) => {
                diags.iter().filter_map(|d| d.attribute.as_deref()).collect()
            },
            TestError::Provider(_) => Vec::new(),
        }
    }
}

fn render(diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("{} error diagnostic(s):", diagnostics.len());
    for d in diagnostics {
        out.push_str("\n  ");
        out.push_str(&d.summary);
        if let Some(detail) = &d.detail {
            out.push_str(": ");
            out.push_str(detail);
        }
        if let Some(attr) = &d.attribute {
            out.push_str(&format!(" (at {})", attr));
        }
    }
    out
}

fn errors_only(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "create plan has no changes");
    assert!(!plan.requires_replace, "create plan requires replacement");
}

/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "expected an empty plan, got changes to {:?}",
        changed_paths(plan)
    );
}

/// # Panics
///
/// Panics if the plan has no change at `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "expected a change to '{}', plan changes {:?}",
        path,
        changed_paths(plan)
    );
}

/// # Panics
///
/// Panics if no error diagnostic's summary or detail contains `needle`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], needle: &str) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    let found = errors.iter().any(|d| {
        d.summary.contains(needle)
            || d.detail.as_deref().is_some_and(|detail| detail.contains(needle))
    });
    assert!(found, "no error mentions '{}': {:?}", needle, errors);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support;
    use crate::provider::BigIpProvider;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WORKSPACE_PATH: &str = "/mgmt/tm/ilx/workspace/ws1";

    fn tester(server: &MockServer) -> ProviderTester<BigIpProvider> {
        ProviderTester::new(BigIpProvider::with_client(test_support::client(&server.uri())))
    }

    fn workspace(generation: i64) -> Value {
        json!({
            "name": "ws1",
            "fullPath": "/Common/ws1",
            "generation": generation,
            "nodeVersion": "6.9.1",
            "stagedDirectory": "/var/ilx/workspaces/Common/ws1",
            "version": "16.1.0"
        })
    }

    #[tokio::test]
    async fn missing_password_is_reported_on_its_attribute() {
        let tester = ProviderTester::new(BigIpProvider::new());
        let result = tester
            .validate_provider_config(json!({
                "address": "10.1.1.4",
                "username": "admin",
                "password": null
            }))
            .await;
        // BIGIP_PASSWORD in the process environment would satisfy it.
        if let Err(err) = result {
            assert_eq!(err.attributes(), vec!["password"]);
            assert!(err.to_string().contains("Missing required attribute 'password'"));
        }
    }

    #[tokio::test]
    async fn resolver_name_must_be_a_full_path() {
        let tester = ProviderTester::new(BigIpProvider::new());
        tester
            .validate_resource_config("bigip_net_dns_resolver", json!({"name": "/Common/r1"}))
            .await
            .unwrap();

        let err = tester
            .validate_resource_config("bigip_net_dns_resolver", json!({"name": "r1"}))
            .await
            .unwrap_err();
        assert_eq!(err.attributes(), vec!["name"]);
        let TestError::Diagnostics(diags) = &err else {
            panic!("expected diagnostics, got {err}");
        };
        assert_error_contains(diags, "/Partition/Name");

        tester
            .validate_data_source_config("bigip_apm_webtop", json!({"name": "/Common/wt1"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn workspace_plans() {
        let tester = ProviderTester::new(BigIpProvider::new());

        let plan = tester
            .plan_create("bigip_ilx_workspace", json!({"name": "ws1"}))
            .await
            .unwrap();
        assert_plan_creates(&plan);

        let prior = json!({"id": "ws1", "name": "ws1", "generation": 4});
        let plan = tester
            .plan_update("bigip_ilx_workspace", prior.clone(), json!({"name": "ws1"}))
            .await
            .unwrap();
        assert_plan_no_changes(&plan);
        assert!(!plan.requires_replace);

        let plan = tester
            .plan_update("bigip_ilx_workspace", prior.clone(), json!({"name": "ws2"}))
            .await
            .unwrap();
        assert!(plan.requires_replace);
        assert_plan_changes_attribute(&plan, "name");

        let plan = tester.plan_delete("bigip_ilx_workspace", prior).await.unwrap();
        assert!(plan.planned_state.is_null());
    }

    #[tokio::test]
    async fn workspace_crud_against_mock_device() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mgmt/tm/ilx/workspace"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(WORKSPACE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WORKSPACE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(workspace(7)))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(WORKSPACE_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let state = tester(&server)
            .lifecycle_crud("bigip_ilx_workspace", json!({"name": "ws1"}), json!({"name": "ws1"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "ws1");
        assert_eq!(state["generation"], 7);
    }

    #[tokio::test]
    async fn create_fails_when_workspace_vanishes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mgmt/tm/ilx/workspace"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WORKSPACE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(workspace(1)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WORKSPACE_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 404,
                "message": "01020036:3: The requested workspace (/Common/ws1) was not found."
            })))
            .mount(&server)
            .await;

        let err = tester(&server)
            .lifecycle_create("bigip_ilx_workspace", json!({"name": "ws1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert!(err.message().contains("disappeared after create"));
    }

    #[test]
    #[should_panic(expected = "no error mentions 'customization'")]
    fn error_contains_ignores_warnings() {
        assert_error_contains(
            &[Diagnostic::warning("customization group is shared")],
            "customization",
        );
    }

    #[test]
    fn test_error_display() {
        let err = TestError::Diagnostics(vec![Diagnostic::error("Invalid value")
            .with_detail("expected one of [uri, ...]")
            .with_attribute("link_type")]);
        let text = err.to_string();
        assert!(text.starts_with("1 error diagnostic(s):"));
        assert!(text.contains("Invalid value: expected one of [uri, ...] (at link_type)"));
    }
}
