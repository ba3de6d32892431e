//! `coralogix_view`: saved explore views.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clients::{views as rpc, ClientSet};
use crate::error::ProviderError;
use crate::resource::{Clients, Resource};
use crate::resources::found;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema, Validator};
use crate::sdk::views::{
    time_selection::SelectionType, CreateViewRequest, CustomTimeSelection, DeleteViewRequest, Filter,
    GetViewRequest, QuickTimeSelection, ReplaceViewRequest, SearchQuery, SelectedFilters, TimeSelection, View,
};
use crate::transcode::{
    expand_map, flatten_map, format_seconds_token, optional, parse_id, parse_seconds_token, required,
    response_field, select_variant, Result,
};
use crate::types::{null_as_default, TfValue};

/// Saved view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewModel {
    /// View ID as a string.
    pub id: TfValue<String>,
    /// View name.
    pub name: TfValue<String>,
    /// Folder the view is filed in.
    pub folder_id: TfValue<String>,
    /// What the view searches for.
    pub search_query: Option<SearchQueryModel>,
    /// Time range of the view.
    pub time_selection: Option<TimeSelectionModel>,
    /// Field filters, in order.
    #[serde(deserialize_with = "null_as_default")]
    pub filters: Vec<FilterModel>,
}

/// Search query of a view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQueryModel {
    /// Lucene query of the view.
    pub query: TfValue<String>,
}

/// Exactly one of a quick or a custom selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSelectionModel {
    /// A look-back window.
    pub quick_selection: Option<QuickSelectionModel>,
    /// A fixed time range.
    pub custom_selection: Option<CustomSelectionModel>,
}

/// A look-back window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickSelectionModel {
    /// Window as `seconds:<n>`.
    pub duration: TfValue<String>,
    /// Label shown for the window.
    pub caption: TfValue<String>,
}

/// A fixed time range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomSelectionModel {
    /// Start, as an RFC 3339 timestamp.
    pub from_time: TfValue<String>,
    /// End, as an RFC 3339 timestamp.
    pub to_time: TfValue<String>,
}

/// A filter on one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterModel {
    /// Field the filter applies to.
    pub name: TfValue<String>,
    /// Values of the field and whether each is selected.
    pub selected_values: TfValue<BTreeMap<String, bool>>,
}

enum TimeSelectionKind<'a> {
    Quick(&'a QuickSelectionModel),
    Custom(&'a CustomSelectionModel),
}

impl TimeSelectionModel {
    fn kind(&self) -> Result<TimeSelectionKind<'_>> {
        select_variant(
            "time_selection",
            vec![
                ("quick_selection", self.quick_selection.as_ref().map(TimeSelectionKind::Quick)),
                ("custom_selection", self.custom_selection.as_ref().map(TimeSelectionKind::Custom)),
            ],
        )
    }
}

fn time_selection_block() -> Block {
    Block::new()
        .with_block(
            "quick_selection",
            NestedBlock::single(
                Block::new()
                    .with_attribute(
                        "duration",
                        Attribute::required_string()
                            .with_description("Look-back window, e.g. \"seconds:900\"."),
                    )
                    .with_attribute("caption", Attribute::optional_string()),
            ),
        )
        .with_block(
            "custom_selection",
            NestedBlock::single(
                Block::new()
                    .with_attribute("from_time", Attribute::required_string().with_description("RFC 3339 timestamp."))
                    .with_attribute("to_time", Attribute::required_string().with_description("RFC 3339 timestamp.")),
            ),
        )
        .with_exactly_one_of(["quick_selection", "custom_selection"])
}

/// Schema of `coralogix_view`.
pub fn view_schema() -> Schema {
    Schema::v0()
        .with_description("Coralogix saved view.")
        .with_attribute("id", Attribute::id())
        .with_attribute("name", Attribute::required_string().with_validator(Validator::NotEmpty))
        .with_attribute("folder_id", Attribute::optional_string())
        .with_block(
            "search_query",
            NestedBlock::single(Block::new().with_attribute("query", Attribute::required_string())),
        )
        .with_block("time_selection", NestedBlock::required_single(time_selection_block()))
        .with_block(
            "filters",
            NestedBlock::list(
                Block::new()
                    .with_attribute("name", Attribute::required_string().with_validator(Validator::NotEmpty))
                    .with_attribute(
                        "selected_values",
                        Attribute::new(AttributeType::map(AttributeType::Bool), AttributeFlags::required()),
                    ),
            ),
        )
}

fn expand_time_selection(model: Option<&TimeSelectionModel>) -> Result<TimeSelection> {
    let model = model.ok_or_else(|| ProviderError::Validation("time_selection: block is required".to_string()))?;
    let selection_type = match model.kind()? {
        TimeSelectionKind::Quick(quick) => SelectionType::QuickSelection(QuickTimeSelection {
            seconds: parse_seconds_token(
                "time_selection.quick_selection.duration",
                &required("time_selection.quick_selection.duration", &quick.duration)?,
            )?,
            caption: optional(&quick.caption).unwrap_or_default(),
        }),
        TimeSelectionKind::Custom(custom) => SelectionType::CustomSelection(CustomTimeSelection {
            from_time: required("time_selection.custom_selection.from_time", &custom.from_time)?,
            to_time: required("time_selection.custom_selection.to_time", &custom.to_time)?,
        }),
    };
    Ok(TimeSelection {
        selection_type: Some(selection_type),
    })
}

fn expand_filters(filters: &[FilterModel]) -> Result<Option<SelectedFilters>> {
    if filters.is_empty() {
        return Ok(None);
    }
    let filters = filters
        .iter()
        .enumerate()
        .map(|(i, filter)| {
            Ok(Filter {
                name: required(&format!("filters.{}.name", i), &filter.name)?,
                selected_values: expand_map(&filter.selected_values),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(SelectedFilters { filters }))
}

/// Build the SDK view from the model. `id` is zero for new views.
pub fn expand_view(model: &ViewModel, id: i32) -> Result<View> {
    Ok(View {
        id,
        name: required("name", &model.name)?,
        search_query: model
            .search_query
            .as_ref()
            .map(|q| -> Result<SearchQuery> {
                Ok(SearchQuery {
                    query: required("search_query.query", &q.query)?,
                })
            })
            .transpose()?,
        time_selection: Some(expand_time_selection(model.time_selection.as_ref())?),
        filters: expand_filters(&model.filters)?,
        folder_id: optional(&model.folder_id),
    })
}

fn flatten_time_selection(selection: TimeSelection) -> Option<TimeSelectionModel> {
    let model = match selection.selection_type? {
        SelectionType::QuickSelection(quick) => TimeSelectionModel {
            quick_selection: Some(QuickSelectionModel {
                duration: TfValue::Known(format_seconds_token(quick.seconds)),
                caption: if quick.caption.is_empty() {
                    TfValue::Null
                } else {
                    TfValue::Known(quick.caption)
                },
            }),
            custom_selection: None,
        },
        SelectionType::CustomSelection(custom) => TimeSelectionModel {
            quick_selection: None,
            custom_selection: Some(CustomSelectionModel {
                from_time: TfValue::Known(custom.from_time),
                to_time: TfValue::Known(custom.to_time),
            }),
        },
    };
    Some(model)
}

/// Build the model of a view returned by the API.
pub fn flatten_view(view: View) -> ViewModel {
    ViewModel {
        id: TfValue::Known(view.id.to_string()),
        name: TfValue::Known(view.name),
        folder_id: view.folder_id.into(),
        search_query: view.search_query.map(|q| SearchQueryModel {
            query: TfValue::Known(q.query),
        }),
        time_selection: view.time_selection.and_then(flatten_time_selection),
        filters: view
            .filters
            .map(|selected| {
                selected
                    .filters
                    .into_iter()
                    .map(|f| FilterModel {
                        name: TfValue::Known(f.name),
                        selected_values: flatten_map(f.selected_values),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Fetch a view by ID.
pub async fn get_view(clients: &ClientSet, id: i32) -> Result<ViewModel> {
    let request = GetViewRequest { id };
    debug!(id, "Reading view");
    let response = clients
        .views
        .get(request.clone())
        .await
        .map_err(|status| ProviderError::rpc(rpc::GET_VIEW, &request, status))?;
    Ok(flatten_view(response_field(rpc::GET_VIEW, "view", response.view)?))
}

/// Handler for `coralogix_view`.
#[derive(Default)]
pub struct ViewResource {
    clients: Clients,
}

#[async_trait]
impl Resource for ViewResource {
    type Model = ViewModel;

    fn type_name(&self) -> &'static str {
        "coralogix_view"
    }

    fn schema(&self) -> Schema {
        view_schema()
    }

    fn configure(&mut self, clients: Arc<ClientSet>) {
        self.clients.set(clients);
    }

    fn validate_config(&self, config: &ViewModel) -> Vec<Diagnostic> {
        let duration = config
            .time_selection
            .as_ref()
            .and_then(|t| t.quick_selection.as_ref())
            .and_then(|q| q.duration.as_known());
        match duration.map(|d| parse_seconds_token("time_selection.quick_selection.duration", d)) {
            Some(Err(e)) => vec![e
                .to_diagnostic()
                .with_attribute("time_selection.quick_selection.duration")],
            _ => Vec::new(),
        }
    }

    async fn create(&self, plan: ViewModel) -> Result<ViewModel> {
        let clients = self.clients.get()?;
        let view = expand_view(&plan, 0)?;
        let request = CreateViewRequest {
            name: view.name,
            search_query: view.search_query,
            time_selection: view.time_selection,
            filters: view.filters,
            folder_id: view.folder_id,
        };
        debug!(request = ?request, "Creating view");
        let response = clients
            .views
            .create(request.clone())
            .await
            .map_err(|status| ProviderError::rpc(rpc::CREATE_VIEW, &request, status))?;
        let view = response_field(rpc::CREATE_VIEW, "view", response.view)?;
        info!(id = view.id, "View created");
        Ok(flatten_view(view))
    }

    async fn read(&self, state: ViewModel) -> Result<Option<ViewModel>> {
        let id = parse_id("id", &required("id", &state.id)?)?;
        found(get_view(self.clients.get()?, id).await)
    }

    async fn update(&self, plan: ViewModel, state: ViewModel) -> Result<ViewModel> {
        let id = parse_id("id", &required("id", &state.id)?)?;
        let request = ReplaceViewRequest {
            view: Some(expand_view(&plan, id)?),
        };
        debug!(request = ?request, "Replacing view");
        let response = self
            .clients
            .get()?
            .views
            .replace(request.clone())
            .await
            .map_err(|status| ProviderError::rpc(rpc::REPLACE_VIEW, &request, status))?;
        info!(id, "View updated");
        Ok(flatten_view(response_field(rpc::REPLACE_VIEW, "view", response.view)?))
    }

    async fn delete(&self, state: ViewModel) -> Result<()> {
        let id = parse_id("id", &required("id", &state.id)?)?;
        let request = DeleteViewRequest { id };
        self.clients
            .get()?
            .views
            .delete(request.clone())
            .await
            .map_err(|status| ProviderError::rpc(rpc::DELETE_VIEW, &request, status))?;
        info!(id, "View deleted");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn view_config(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "search_query": { "query": "kubernetes.namespace:payments" },
        "time_selection": {
            "quick_selection": { "duration": "seconds:900", "caption": "Last 15 minutes" },
        },
        "filters": [
            { "name": "severity", "selected_values": { "ERROR": true, "INFO": false } },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::DynResource;
    use crate::testing::FakeCoralogix;
    use serde_json::{json, Value};

    fn resource(fake: &Arc<FakeCoralogix>) -> ViewResource {
        let mut resource = ViewResource::default();
        Resource::configure(&mut resource, fake.client_set());
        resource
    }

    #[test]
    fn test_invalid_duration_token() {
        let resource = ViewResource::default();
        let mut config = view_config("payments");
        config["time_selection"]["quick_selection"]["duration"] = json!("15m");
        let diagnostics = resource.validate(&config);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
    }

    #[test]
    fn test_expand_quick_selection() {
        let model: ViewModel = serde_json::from_value(view_config("payments")).unwrap();
        let view = expand_view(&model, 3).unwrap();
        assert_eq!(view.id, 3);
        match view.time_selection.and_then(|t| t.selection_type) {
            Some(SelectionType::QuickSelection(quick)) => assert_eq!(quick.seconds, 900),
            other => panic!("unexpected selection {:?}", other),
        }
        let filters = view.filters.unwrap().filters;
        assert_eq!(filters[0].selected_values["ERROR"], true);
    }

    #[tokio::test]
    async fn test_crud_and_switch_time_selection() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);

        let plan = resource.plan(None, view_config("payments")).unwrap();
        let state = DynResource::create(&resource, plan.planned_state).await.unwrap();
        assert_eq!(state["id"], "1");
        assert_eq!(state["time_selection"]["quick_selection"]["duration"], "seconds:900");
        assert_eq!(state["filters"][0]["selected_values"]["INFO"], false);

        let replan = resource.plan(Some(state.clone()), view_config("payments")).unwrap();
        assert!(replan.changes.is_empty());

        let mut custom = view_config("payments");
        custom["time_selection"] = json!({
            "custom_selection": {
                "from_time": "2024-01-01T00:00:00Z",
                "to_time": "2024-01-02T00:00:00Z",
            },
        });
        let plan = resource.plan(Some(state.clone()), custom).unwrap();
        let updated = DynResource::update(&resource, state, plan.planned_state)
            .await
            .unwrap();
        assert_eq!(updated["time_selection"]["quick_selection"], Value::Null);
        assert_eq!(
            updated["time_selection"]["custom_selection"]["to_time"],
            "2024-01-02T00:00:00Z"
        );

        DynResource::delete(&resource, updated.clone()).await.unwrap();
        let read = DynResource::read(&resource, updated).await.unwrap();
        assert!(read.state.is_none());
        assert_eq!(read.diagnostics.len(), 1);
    }
    #[tokio::test]
    async fn test_empty_caption_and_selection_round_trip() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let mut config = view_config("payments");
        config["time_selection"]["quick_selection"]["caption"] = json!("");
        config["filters"][0]["selected_values"] = json!({});

        let plan = resource.plan(None, config.clone()).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();
        assert_eq!(created["time_selection"]["quick_selection"]["caption"], "");
        assert_eq!(created["filters"][0]["selected_values"], json!({}));

        let read = DynResource::read(&resource, created).await.unwrap().state.unwrap();
        assert_eq!(read["time_selection"]["quick_selection"]["caption"], "");
        let replan = resource.plan(Some(read), config).unwrap();
        assert!(replan.changes.is_empty());
    }
}
