//! `bigip_apm_webtop` resource and data source.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{from_state, non_empty, to_state, DataSource, Resource};
use crate::client::{
    BigIpClient, CustomizationType, InitialState, LinkType, Webtop, WebtopConfig, WebtopRead,
    WebtopType,
};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation::check_one_of;

const TYPE_NAME: &str = "bigip_apm_webtop";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct WebtopState {
    id: Option<String>,
    name: String,
    tm_partition: Option<String>,
    partition: Option<String>,
    description: Option<String>,
    customization_group: String,
    initial_state: Option<String>,
    customization_type: Option<String>,
    link_type: Option<String>,
    #[serde(rename = "type")]
    webtop_type: Option<String>,
    show_search: Option<bool>,
    warning_on_close: Option<bool>,
    url_entry_field: Option<bool>,
    resource_search: Option<bool>,
    minimize_to_tray: Option<bool>,
    location_specific: Option<bool>,
    full_path: Option<String>,
    self_link: Option<String>,
    customization_group_reference: Option<String>,
    generation: Option<i64>,
}

fn parse_enum<T: std::str::FromStr<Err = String>>(
    attribute: &str,
    value: &Option<String>,
) -> Result<Option<T>, ProviderError> {
    non_empty(value)
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| ProviderError::Validation(format!("{}: {}", attribute, e)))
        })
        .transpose()
}

/// Replace `target` with the device value only when it was set before.
fn refresh_if_set(target: &mut Option<String>, device: &str) {
    if target.is_some() && !device.is_empty() {
        *target = Some(device.to_string());
    }
}

impl WebtopState {
    fn config(&self) -> Result<WebtopConfig, ProviderError> {
        Ok(WebtopConfig {
            description: self.description.clone().unwrap_or_default(),
            customization_group: self.customization_group.clone(),
            initial_state: parse_enum::<InitialState>("initial_state", &self.initial_state)?,
            customization_type: parse_enum::<CustomizationType>(
                "customization_type",
                &self.customization_type,
            )?,
            link_type: parse_enum::<LinkType>("link_type", &self.link_type)?,
            webtop_type: parse_enum::<WebtopType>("type", &self.webtop_type)?,
            show_search: self.show_search.unwrap_or(false),
            warning_on_close: self.warning_on_close.unwrap_or(false),
            url_entry_field: self.url_entry_field.unwrap_or(false),
            resource_search: self.resource_search.unwrap_or(false),
            minimize_to_tray: self.minimize_to_tray.unwrap_or(false),
            location_specific: self.location_specific.unwrap_or(false),
        })
    }

    fn webtop(&self) -> Result<Webtop, ProviderError> {
        Ok(Webtop {
            tm_partition: self.tm_partition.clone().unwrap_or_default(),
            partition: self.partition.clone().unwrap_or_default(),
            name: self.name.clone(),
            config: self.config()?,
        })
    }

    /// Fold a GET response into state. Optional strings are only refreshed
    /// when configured so that device defaults do not show up as drift.
    fn apply(&mut self, read: &WebtopRead) {
        self.id = Some(self.name.clone());
        if !read.customization_group.is_empty() {
            self.customization_group = read.customization_group.clone();
        }
        refresh_if_set(&mut self.description, &read.description);
        refresh_if_set(&mut self.initial_state, &read.initial_state);
        refresh_if_set(&mut self.customization_type, &read.customization_type);
        refresh_if_set(&mut self.link_type, &read.link_type);
        refresh_if_set(&mut self.webtop_type, &read.webtop_type);

        self.show_search = Some(read.show_search);
        self.warning_on_close = Some(read.warning_on_close);
        self.url_entry_field = Some(read.url_entry_field);
        self.resource_search = Some(read.resource_search);
        self.minimize_to_tray = Some(read.minimize_to_tray);
        self.location_specific = Some(read.location_specific);

        self.full_path = Some(read.full_path.clone());
        self.self_link = Some(read.self_link.clone());
        self.customization_group_reference =
            Some(read.customization_group_reference.link.clone());
        self.generation = Some(read.generation);
    }

    fn lookup_name(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_deref().unwrap_or_default()
        } else {
            &self.name
        }
    }
}

pub struct ApmWebtopResource;

impl ApmWebtopResource {
    async fn refresh(
        &self,
        client: &BigIpClient,
        mut state: WebtopState,
    ) -> Result<Option<WebtopState>, ProviderError> {
        let name = state.lookup_name().to_string();
        let read = client
            .get_webtop(&name)
            .await
            .map_err(|e| ProviderError::client(format!("error reading webtop {}", name), e))?;
        Ok(read.map(|read| {
            if state.name.is_empty() {
                state.name = name;
            }
            state.apply(&read);
            state
        }))
    }
}

fn bool_attr(description: &str) -> Attribute {
    Attribute::optional_bool()
        .with_default(json!(false))
        .with_description(description)
}

#[async_trait]
impl Resource for ApmWebtopResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("APM webtop")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The name of the webtop. This field is not updatable."),
            )
            .with_attribute(
                "tm_partition",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("The tmPartition of the webtop."),
            )
            .with_attribute(
                "partition",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("The partition of the webtop."),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "customization_group",
                Attribute::required_string()
                    .with_description("The customization group of the webtop."),
            )
            .with_attribute(
                "initial_state",
                Attribute::optional_string().with_description("Collapsed or Expanded."),
            )
            .with_attribute(
                "customization_type",
                Attribute::optional_string().with_description("Modern or Standard."),
            )
            .with_attribute("link_type", Attribute::optional_string())
            .with_attribute(
                "type",
                Attribute::optional_string()
                    .with_description("portal-access, full or network-access."),
            )
            .with_attribute("show_search", bool_attr("Show search in the webtop."))
            .with_attribute("warning_on_close", bool_attr("Warn when the webtop is closed."))
            .with_attribute("url_entry_field", bool_attr("Show the URL entry field."))
            .with_attribute("resource_search", bool_attr("Enable resource search."))
            .with_attribute("minimize_to_tray", bool_attr("Minimize to tray."))
            .with_attribute("location_specific", bool_attr("The webtop is location specific."))
            .with_attribute("full_path", Attribute::computed_string())
            .with_attribute("self_link", Attribute::computed_string())
            .with_attribute("customization_group_reference", Attribute::computed_string())
            .with_attribute("generation", Attribute::computed_int64())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        [
            check_one_of(config, "initial_state", InitialState::ALL),
            check_one_of(config, "customization_type", CustomizationType::ALL),
            check_one_of(config, "link_type", LinkType::ALL),
            check_one_of(config, "type", WebtopType::ALL),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    async fn create(&self, client: &BigIpClient, planned: Value) -> Result<Value, ProviderError> {
        let state: WebtopState = from_state(planned)?;
        let webtop = state.webtop()?;

        info!(name = %state.name, "Creating webtop");
        client
            .create_webtop(&webtop)
            .await
            .map_err(|e| {
                ProviderError::client(format!("error creating webtop {}", state.name), e)
            })?;

        let name = state.name.clone();
        let state = self.refresh(client, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("webtop {} not found after create", name))
        })?;
        to_state(&state)
    }

    async fn read(
        &self,
        client: &BigIpClient,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let state: WebtopState = from_state(current)?;
        let name = state.lookup_name().to_string();
        debug!(name = %name, "Reading webtop");
        match self.refresh(client, state).await {
            Ok(Some(state)) => Ok(Some(to_state(&state)?)),
            Ok(None) | Err(ProviderError::NotFound(_)) => {
                warn!(name = %name, "Webtop not found, removing from state");
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
        let prior: WebtopState = from_state(prior)?;
        let mut state: WebtopState = from_state(planned)?;
        let name = prior.lookup_name().to_string();

        info!(name = %name, "Updating webtop");
        client
            .modify_webtop(&name, &state.config()?)
            .await
            .map_err(|e| ProviderError::client(format!("error updating webtop {}", name), e))?;

        if state.name.is_empty() {
            state.name = name.clone();
        }
        let state = self.refresh(client, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("webtop {} not found after update", name))
        })?;
        to_state(&state)
    }

    async fn delete(&self, client: &BigIpClient, current: Value) -> Result<(), ProviderError> {
        let state: WebtopState = from_state(current)?;
        let name = state.lookup_name();

        info!(name = %name, "Deleting webtop");
        client
            .delete_webtop(name)
            .await
            .map_err(|e| ProviderError::client(format!("error deleting webtop {}", name), e))
    }
}

/// Data source state; attribute names follow the device's wording.
#[derive(Debug, Serialize)]
struct WebtopLookup {
    id: String,
    name: String,
    full_path: String,
    generation: i64,
    self_link: String,
    customization_group: String,
    description: String,
    fallback_section_initial_state: String,
    link_type: String,
    location_specific: bool,
    minimize_to_tray: bool,
    show_search: bool,
    show_url_entry_field: bool,
    warn_when_closed: bool,
    webtop_type: String,
}

impl WebtopLookup {
    /// `requested` is used only when the device leaves `name` out.
    fn new(requested: String, read: WebtopRead) -> Self {
        Self {
            id: read.full_path.clone(),
            name: if read.name.is_empty() { requested } else { read.name },
            full_path: read.full_path,
            generation: read.generation,
            self_link: read.self_link,
            customization_group: read.customization_group,
            description: read.description,
            fallback_section_initial_state: read.initial_state,
            link_type: read.link_type,
            location_specific: read.location_specific,
            minimize_to_tray: read.minimize_to_tray,
            show_search: read.show_search,
            show_url_entry_field: read.url_entry_field,
            warn_when_closed: read.warning_on_close,
            webtop_type: read.webtop_type,
        }
    }
}

pub struct ApmWebtopDataSource;

#[async_trait]
impl DataSource for ApmWebtopDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Look up an existing APM webtop")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the APM webtop"),
            )
            .with_attribute("full_path", Attribute::computed_string())
            .with_attribute("generation", Attribute::computed_int64())
            .with_attribute("self_link", Attribute::computed_string())
            .with_attribute("customization_group", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("fallback_section_initial_state", Attribute::computed_string())
            .with_attribute("link_type", Attribute::computed_string())
            .with_attribute("location_specific", Attribute::computed_bool())
            .with_attribute("minimize_to_tray", Attribute::computed_bool())
            .with_attribute("show_search", Attribute::computed_bool())
            .with_attribute("show_url_entry_field", Attribute::computed_bool())
            .with_attribute("warn_when_closed", Attribute::computed_bool())
            .with_attribute("webtop_type", Attribute::computed_string())
    }

    async fn read(&self, client: &BigIpClient, config: Value) -> Result<Value, ProviderError> {
        let name = config
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Validation("name is required".to_string()))?
            .to_string();

        info!(name = %name, "Retrieving APM webtop");
        let read = client
            .get_webtop(&name)
            .await
            .map_err(|e| ProviderError::client(format!("error reading webtop {}", name), e))?
            .ok_or_else(|| ProviderError::NotFound(format!("webtop {} not found", name)))?;

        to_state(&WebtopLookup::new(name, read))
    }
}
