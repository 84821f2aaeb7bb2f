//! `bigip_ilx_workspace` resource.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{from_state, to_state, Resource};
use crate::client::{BigIpClient, IlxWorkspace};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct WorkspaceState {
    id: Option<String>,
    name: String,
    full_path: Option<String>,
    generation: Option<i64>,
    node_version: Option<String>,
    staged_directory: Option<String>,
    version: Option<String>,
    extensions: Vec<String>,
    rules: Vec<String>,
}

impl WorkspaceState {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn lookup_name(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_deref().unwrap_or_default()
        } else {
            &self.name
        }
    }

    fn apply(&mut self, ws: IlxWorkspace) {
        self.id = Some(self.name.clone());
        self.full_path = Some(ws.full_path);
        self.generation = Some(ws.generation);
        self.node_version = Some(ws.node_version);
        self.staged_directory = Some(ws.staged_directory);
        self.version = Some(ws.version);
        self.extensions = ws.extensions.into_iter().map(|e| e.name).collect();
        self.rules = ws.rules.into_iter().map(|r| r.name).collect();
    }
}

pub struct IlxWorkspaceResource;

impl IlxWorkspaceResource {
    async fn refresh(
        &self,
        client: &BigIpClient,
        mut state: WorkspaceState,
    ) -> Result<Option<WorkspaceState>, ProviderError> {
        let name = state.lookup_name().to_string();
        let ws = client
            .get_workspace(&name)
            .await
            .map_err(|e| ProviderError::client(format!("error reading workspace {}", name), e))?;
        Ok(ws.map(|ws| {
            state.name = name;
            state.apply(ws);
            state
        }))
    }
}

#[async_trait]
impl Resource for IlxWorkspaceResource {
    fn type_name(&self) -> &'static str {
        "bigip_ilx_workspace"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("iRules LX workspace")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Name of the workspace"),
            )
            .with_attribute("full_path", Attribute::computed_string())
            .with_attribute("generation", Attribute::computed_int64())
            .with_attribute("node_version", Attribute::computed_string())
            .with_attribute("staged_directory", Attribute::computed_string())
            .with_attribute("version", Attribute::computed_string())
            .with_attribute(
                "extensions",
                Attribute::computed_string_list().with_description("Names of the extensions"),
            )
            .with_attribute(
                "rules",
                Attribute::computed_string_list().with_description("Names of the rules"),
            )
    }

    async fn create(&self, client: &BigIpClient, planned: Value) -> Result<Value, ProviderError> {
        let state: WorkspaceState = from_state(planned)?;

        info!(name = %state.name, "Creating ILX workspace");
        client.create_workspace(&state.name).await.map_err(|e| {
            ProviderError::client(format!("error creating workspace {}", state.name), e)
        })?;

        let name = state.name.clone();
        let state = self.refresh(client, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("workspace {} not found after create", name))
        })?;
        to_state(&state)
    }

    async fn read(
        &self,
        client: &BigIpClient,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let state: WorkspaceState = from_state(current)?;
        let name = state.lookup_name().to_string();
        debug!(name = %name, "Reading ILX workspace");
        match self.refresh(client, state).await {
            Ok(Some(state)) => Ok(Some(to_state(&state)?)),
            Ok(None) | Err(ProviderError::NotFound(_)) => {
                warn!(name = %name, "ILX workspace not found, removing from state");
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    async fn update(
        &self,
        client: &BigIpClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: WorkspaceState = from_state(prior)?;
        let state: WorkspaceState = from_state(planned)?;
        let name = prior.lookup_name().to_string();

        info!(name = %name, "Updating ILX workspace");
        client
            .patch_workspace(&name)
            .await
            .map_err(|e| ProviderError::client(format!("error updating workspace {}", name), e))?;

        let state = self.refresh(client, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("workspace {} not found after update", name))
        })?;
        to_state(&state)
    }

    async fn delete(&self, client: &BigIpClient, current: Value) -> Result<(), ProviderError> {
        let state: WorkspaceState = from_state(current)?;
        let name = state.lookup_name();

        info!(name = %name, "Deleting ILX workspace");
        client
            .delete_workspace(name)
            .await
            .map_err(|e| ProviderError::client(format!("error deleting workspace {}", name), e))
    }

    async fn import(&self, client: &BigIpClient, id: &str) -> Result<Value, ProviderError> {
        let state = self
            .refresh(client, WorkspaceState::named(id))
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("workspace {} not found", id)))?;
        to_state(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{client, mount_not_found};
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_workspace(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/mgmt/tm/ilx/workspace/ws1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "ws1",
                "fullPath": "/Common/ws1",
                "generation": 9,
                "nodeVersion": "6.9.1",
                "stagedDirectory": "/var/ilx/workspaces/Common/ws1",
                "version": "16.1.0",
                "extensions": [{"name": "ext_a"}, {"name": "ext_b"}],
                "rules": [{"name": "rule_a"}]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_create_workspace() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mgmt/tm/ilx/workspace"))
            .and(body_json(json!({"name": "ws1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        mount_workspace(&server).await;

        let state = IlxWorkspaceResource
            .create(&client(&server.uri()), json!({"name": "ws1"}))
            .await
            .unwrap();

        assert_eq!(state["id"], "ws1");
        assert_eq!(state["full_path"], "/Common/ws1");
        assert_eq!(state["node_version"], "6.9.1");
        assert_eq!(state["extensions"], json!(["ext_a", "ext_b"]));
        assert_eq!(state["rules"], json!(["rule_a"]));
    }

    #[tokio::test]
    async fn test_create_from_plan_with_unknown_computed_values() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mgmt/tm/ilx/workspace"))
            .and(body_json(json!({"name": "ws1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        mount_workspace(&server).await;

        let schema = IlxWorkspaceResource.schema();
        let plan = crate::plan::plan_resource(
            &schema,
            None,
            json!({
                "name": "ws1",
                "id": null,
                "full_path": null,
                "generation": null,
                "extensions": null,
                "rules": null
            }),
        );
        let state = IlxWorkspaceResource
            .create(&client(&server.uri()), plan.planned_state)
            .await
            .unwrap();
        assert_eq!(state["extensions"], json!(["ext_a", "ext_b"]));
        assert_eq!(state["generation"], 9);
    }

    #[tokio::test]
    async fn test_read_drops_state_on_not_found_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mgmt/tm/ilx/workspace/ws1"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": 400,
                "message": "01020036:3: The requested workspace (/Common/ws1) was not found."
            })))
            .mount(&server)
            .await;

        let state = IlxWorkspaceResource
            .read(&client(&server.uri()), json!({"id": "ws1", "name": "ws1"}))
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_update_patches_workspace() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/mgmt/tm/ilx/workspace/ws1"))
            .and(body_json(json!({"name": "ws1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        mount_workspace(&server).await;

        let prior = json!({"id": "ws1", "name": "ws1"});
        let state = IlxWorkspaceResource
            .update(&client(&server.uri()), prior.clone(), prior)
            .await
            .unwrap();
        assert_eq!(state["generation"], 9);
    }

    #[tokio::test]
    async fn test_read_and_import() {
        let server = MockServer::start().await;
        mount_workspace(&server).await;
        mount_not_found(&server, "/mgmt/tm/ilx/workspace/gone").await;
        let client = client(&server.uri());

        let imported = IlxWorkspaceResource.import(&client, "ws1").await.unwrap();
        assert_eq!(imported["name"], "ws1");
        assert_eq!(imported["version"], "16.1.0");

        let missing = IlxWorkspaceResource
            .read(&client, json!({"id": "gone", "name": "gone"}))
            .await
            .unwrap();
        assert!(missing.is_none());

        let err = IlxWorkspaceResource.import(&client, "gone").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_context() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/mgmt/tm/ilx/workspace/ws1"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": 400,
                "message": "01071ab3:3: workspace is in use by a plugin"
            })))
            .mount(&server)
            .await;

        let err = IlxWorkspaceResource
            .delete(&client(&server.uri()), json!({"id": "ws1", "name": "ws1"}))
            .await
            .unwrap_err();
        assert!(err.message().starts_with("error deleting workspace ws1: "));
        assert!(err.message().contains("in use"));
    }
}
