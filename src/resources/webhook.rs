//! `coralogix_webhook`: outgoing webhooks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::clients::{webhooks as rpc, ClientSet};
use crate::error::ProviderError;
use crate::resource::{Clients, Resource};
use crate::resources::found;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema, Validator};
use crate::sdk::webhooks::{
    generic_webhook_config::MethodType, outgoing_webhook_input_data::Config, CreateOutgoingWebhookRequest,
    DeleteOutgoingWebhookRequest, EmailGroupConfig, GenericWebhookConfig, GetOutgoingWebhookRequest,
    MicrosoftTeamsConfig, OutgoingWebhook, OutgoingWebhookInputData, PagerDutyConfig, SlackConfig,
    UpdateOutgoingWebhookRequest, WebhookType,
};
use crate::transcode::{
    enum_from_sdk, enum_names, enum_to_sdk, expand_map, expand_set, flatten_map, flatten_set, optional,
    required, response_field, select_variant, EnumTable, Result,
};
use crate::types::TfValue;

const METHODS: EnumTable<MethodType> = &[
    ("GET", MethodType::Get),
    ("POST", MethodType::Post),
    ("PUT", MethodType::Put),
];

const SLACK_NOTIFY_ON: &[&str] = &[
    "error_and_critical_logs",
    "flow_anomalies",
    "spike_anomalies",
    "data_usage",
];

const VARIANTS: [&str; 5] = ["slack", "custom", "pager_duty", "email_group", "microsoft_teams"];

/// Outgoing webhook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookModel {
    /// Webhook ID assigned by Coralogix.
    pub id: TfValue<String>,
    /// Numeric ID alerts refer to the webhook by.
    pub external_id: TfValue<i64>,
    /// Webhook name.
    pub name: TfValue<String>,
    /// Slack channel.
    pub slack: Option<SlackModel>,
    /// Arbitrary HTTP endpoint.
    pub custom: Option<CustomModel>,
    /// PagerDuty service.
    pub pager_duty: Option<PagerDutyModel>,
    /// Group of email recipients.
    pub email_group: Option<EmailGroupModel>,
    /// Microsoft Teams channel.
    pub microsoft_teams: Option<MicrosoftTeamsModel>,
}

/// Slack notification settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackModel {
    /// Incoming webhook URL.
    pub url: TfValue<String>,
    /// Events reported to the channel.
    pub notify_on: TfValue<BTreeSet<String>>,
}

/// Generic HTTP webhook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomModel {
    /// Endpoint URL.
    pub url: TfValue<String>,
    /// `GET`, `POST` or `PUT`.
    pub method: TfValue<String>,
    /// Extra request headers.
    pub headers: TfValue<BTreeMap<String, String>>,
    /// Request body template.
    pub payload: TfValue<String>,
}

/// PagerDuty settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagerDutyModel {
    /// PagerDuty integration key.
    pub service_key: TfValue<String>,
}

/// Email recipients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailGroupModel {
    /// Recipient addresses.
    pub emails: TfValue<BTreeSet<String>>,
}

/// Microsoft Teams settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MicrosoftTeamsModel {
    /// Incoming webhook URL.
    pub url: TfValue<String>,
}

#[derive(Debug, Clone, Copy)]
enum WebhookKind<'a> {
    Slack(&'a SlackModel),
    Custom(&'a CustomModel),
    PagerDuty(&'a PagerDutyModel),
    EmailGroup(&'a EmailGroupModel),
    MicrosoftTeams(&'a MicrosoftTeamsModel),
}

impl WebhookModel {
    fn kind(&self) -> Result<WebhookKind<'_>> {
        select_variant(
            "webhook",
            vec![
                ("slack", self.slack.as_ref().map(WebhookKind::Slack)),
                ("custom", self.custom.as_ref().map(WebhookKind::Custom)),
                ("pager_duty", self.pager_duty.as_ref().map(WebhookKind::PagerDuty)),
                ("email_group", self.email_group.as_ref().map(WebhookKind::EmailGroup)),
                ("microsoft_teams", self.microsoft_teams.as_ref().map(WebhookKind::MicrosoftTeams)),
            ],
        )
    }
}

fn url() -> Attribute {
    Attribute::required_string().with_validator(Validator::NotEmpty)
}

/// Schema of `coralogix_webhook`.
pub fn webhook_schema() -> Schema {
    Schema::v0()
        .with_description("Coralogix outgoing webhook. Exactly one webhook type block must be set.")
        .with_attribute("id", Attribute::id())
        .with_attribute(
            "external_id",
            Attribute::computed_int64()
                .with_use_state_for_unknown()
                .with_description("Numeric ID used to reference the webhook from alerts."),
        )
        .with_attribute("name", Attribute::required_string().with_validator(Validator::NotEmpty))
        .with_block(
            "slack",
            NestedBlock::single(
                Block::new().with_attribute("url", url()).with_attribute(
                    "notify_on",
                    Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::optional())
                        .with_validator(Validator::one_of(SLACK_NOTIFY_ON.iter().copied())),
                ),
            ),
        )
        .with_block(
            "custom",
            NestedBlock::single(
                Block::new()
                    .with_attribute("url", url())
                    .with_attribute(
                        "method",
                        Attribute::required_string().with_validator(Validator::one_of(enum_names(METHODS))),
                    )
                    .with_attribute(
                        "headers",
                        Attribute::new(AttributeType::map(AttributeType::String), AttributeFlags::optional()),
                    )
                    .with_attribute("payload", Attribute::optional_string()),
            ),
        )
        .with_block(
            "pager_duty",
            NestedBlock::single(
                Block::new().with_attribute("service_key", Attribute::required_string().sensitive()),
            ),
        )
        .with_block(
            "email_group",
            NestedBlock::single(
                Block::new().with_attribute(
                    "emails",
                    Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::required())
                        .with_validator(Validator::NotEmpty),
                ),
            ),
        )
        .with_block(
            "microsoft_teams",
            NestedBlock::single(Block::new().with_attribute("url", url())),
        )
        .with_exactly_one_of(VARIANTS)
}

/// Build the SDK payload of a webhook.
pub fn expand_webhook(model: &WebhookModel) -> Result<OutgoingWebhookInputData> {
    let name = required("name", &model.name)?;
    let (webhook_type, url, config) = match model.kind()? {
        WebhookKind::Slack(m) => (
            WebhookType::Slack,
            Some(required("slack.url", &m.url)?),
            Config::Slack(SlackConfig {
                notify_on: expand_set(&m.notify_on),
            }),
        ),
        WebhookKind::Custom(m) => {
            let method = required("custom.method", &m.method)?;
            (
                WebhookType::Generic,
                Some(required("custom.url", &m.url)?),
                Config::GenericWebhook(GenericWebhookConfig {
                    method: enum_to_sdk(METHODS, "custom.method", &method)?,
                    headers: expand_map(&m.headers),
                    payload: optional(&m.payload),
                }),
            )
        },
        WebhookKind::PagerDuty(m) => (
            WebhookType::Pagerduty,
            None,
            Config::PagerDuty(PagerDutyConfig {
                service_key: required("pager_duty.service_key", &m.service_key)?,
            }),
        ),
        WebhookKind::EmailGroup(m) => (
            WebhookType::EmailGroup,
            None,
            Config::EmailGroup(EmailGroupConfig {
                email_addresses: expand_set(&m.emails),
            }),
        ),
        WebhookKind::MicrosoftTeams(m) => (
            WebhookType::MicrosoftTeams,
            Some(required("microsoft_teams.url", &m.url)?),
            Config::MicrosoftTeams(MicrosoftTeamsConfig {}),
        ),
    };

    Ok(OutgoingWebhookInputData {
        r#type: webhook_type.into(),
        name,
        url,
        config: Some(config),
    })
}

/// Build the model of a webhook returned by the API.
pub fn flatten_webhook(webhook: OutgoingWebhook) -> Result<WebhookModel> {
    let data = response_field(rpc::GET_OUTGOING_WEBHOOK, "data", webhook.data)?;
    let mut model = WebhookModel {
        id: TfValue::Known(webhook.id),
        external_id: TfValue::Known(i64::from(webhook.external_id)),
        name: TfValue::Known(data.name),
        ..Default::default()
    };
    let url: TfValue<String> = data.url.into();

    match response_field(rpc::GET_OUTGOING_WEBHOOK, "data.config", data.config)? {
        Config::Slack(c) => {
            model.slack = Some(SlackModel {
                url,
                notify_on: flatten_set(c.notify_on),
            });
        },
        Config::GenericWebhook(c) => {
            model.custom = Some(CustomModel {
                url,
                method: TfValue::Known(enum_from_sdk(METHODS, "custom.method", c.method)?),
                headers: flatten_map(c.headers),
                payload: c.payload.into(),
            });
        },
        Config::PagerDuty(c) => {
            model.pager_duty = Some(PagerDutyModel {
                service_key: TfValue::Known(c.service_key),
            });
        },
        Config::EmailGroup(c) => {
            model.email_group = Some(EmailGroupModel {
                emails: flatten_set(c.email_addresses),
            });
        },
        Config::MicrosoftTeams(_) => {
            model.microsoft_teams = Some(MicrosoftTeamsModel { url });
        },
    }
    Ok(model)
}

/// Fetch a webhook by ID.
pub async fn get_webhook(clients: &ClientSet, id: String) -> Result<WebhookModel> {
    let request = GetOutgoingWebhookRequest { id };
    debug!(id = %request.id, "Reading webhook");
    let response = clients
        .webhooks
        .get(request.clone())
        .await
        .map_err(|status| ProviderError::rpc(rpc::GET_OUTGOING_WEBHOOK, &request, status))?;
    flatten_webhook(response_field(rpc::GET_OUTGOING_WEBHOOK, "webhook", response.webhook)?)
}

/// Handler for `coralogix_webhook`.
#[derive(Default)]
pub struct WebhookResource {
    clients: Clients,
}

#[async_trait]
impl Resource for WebhookResource {
    type Model = WebhookModel;

    fn type_name(&self) -> &'static str {
        "coralogix_webhook"
    }

    fn schema(&self) -> Schema {
        webhook_schema()
    }

    fn configure(&mut self, clients: Arc<ClientSet>) {
        self.clients.set(clients);
    }

    async fn create(&self, plan: WebhookModel) -> Result<WebhookModel> {
        let clients = self.clients.get()?;
        let request = CreateOutgoingWebhookRequest {
            data: Some(expand_webhook(&plan)?),
        };
        debug!(name = %request.data.as_ref().map_or("", |d| d.name.as_str()), "Creating webhook");
        let response = clients
            .webhooks
            .create(request.clone())
            .await
            .map_err(|status| ProviderError::rpc(rpc::CREATE_OUTGOING_WEBHOOK, &request, status))?;
        info!(id = %response.id, "Webhook created");
        get_webhook(clients, response.id).await
    }

    async fn read(&self, state: WebhookModel) -> Result<Option<WebhookModel>> {
        let id = required("id", &state.id)?;
        found(get_webhook(self.clients.get()?, id).await)
    }

    async fn update(&self, plan: WebhookModel, state: WebhookModel) -> Result<WebhookModel> {
        let clients = self.clients.get()?;
        let request = UpdateOutgoingWebhookRequest {
            id: required("id", &state.id)?,
            data: Some(expand_webhook(&plan)?),
        };
        debug!(request = ?request, "Updating webhook");
        clients
            .webhooks
            .update(request.clone())
            .await
            .map_err(|status| ProviderError::rpc(rpc::UPDATE_OUTGOING_WEBHOOK, &request, status))?;
        info!(id = %request.id, "Webhook updated");
        get_webhook(clients, request.id).await
    }

    async fn delete(&self, state: WebhookModel) -> Result<()> {
        let request = DeleteOutgoingWebhookRequest {
            id: required("id", &state.id)?,
        };
        self.clients
            .get()?
            .webhooks
            .delete(request.clone())
            .await
            .map_err(|status| ProviderError::rpc(rpc::DELETE_OUTGOING_WEBHOOK, &request, status))?;
        info!(id = %request.id, "Webhook deleted");
        Ok(())
    }
}

/// An example `custom` webhook configuration, shared by tests.
#[cfg(test)]
pub(crate) fn custom_config(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "custom": {
            "url": "https://example.com/hook",
            "method": "POST",
            "headers": {"X-Token": "abc"},
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::DynResource;
    use crate::testing::FakeCoralogix;
    use crate::validation::validate;

    fn resource(fake: &Arc<FakeCoralogix>) -> WebhookResource {
        let mut resource = WebhookResource::default();
        Resource::configure(&mut resource, fake.client_set());
        resource
    }

    #[test]
    fn test_schema_requires_one_type() {
        let diagnostics = validate(&webhook_schema(), &json!({"name": "x"}));
        assert!(diagnostics.iter().any(|d| d.summary == "Missing required argument"));

        let diagnostics = validate(
            &webhook_schema(),
            &json!({"name": "x", "slack": {"url": "u"}, "microsoft_teams": {"url": "u"}}),
        );
        assert!(diagnostics.iter().any(|d| d.summary == "Conflicting arguments"));
    }

    #[test]
    fn test_expand_custom() {
        let model: WebhookModel = serde_json::from_value(custom_config("hook")).unwrap();
        let data = expand_webhook(&model).unwrap();
        assert_eq!(data.r#type, WebhookType::Generic as i32);
        assert_eq!(data.url.as_deref(), Some("https://example.com/hook"));
        let Some(Config::GenericWebhook(config)) = data.config else {
            panic!("expected a generic webhook");
        };
        assert_eq!(config.method, MethodType::Post as i32);
        assert_eq!(config.headers["X-Token"], "abc");
    }

    #[tokio::test]
    async fn test_create_fetches_full_webhook() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);

        let plan = resource.plan(None, custom_config("hook")).unwrap();
        assert!(crate::types::is_unknown_json(&plan.planned_state["external_id"]));
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();

        assert_eq!(created["id"], "webhook-1");
        assert_eq!(created["external_id"], 1);
        assert_eq!(created["custom"]["method"], "POST");
        assert!(created["custom"]["payload"].is_null());
        assert_eq!(
            fake.calls(),
            vec![rpc::CREATE_OUTGOING_WEBHOOK, rpc::GET_OUTGOING_WEBHOOK]
        );
    }

    #[tokio::test]
    async fn test_switch_type_nulls_previous_variant() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let plan = resource.plan(None, custom_config("hook")).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();

        let config = json!({"name": "hook", "pager_duty": {"service_key": "pd-key"}});
        let plan = resource.plan(Some(created.clone()), config).unwrap();
        assert_eq!(plan.planned_state["external_id"], 1);
        let updated = DynResource::update(&resource, created, plan.planned_state).await.unwrap();

        assert!(updated["custom"].is_null());
        assert_eq!(updated["pager_duty"]["service_key"], "pd-key");
        assert_eq!(updated["id"], "webhook-1");
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_update_logs_request_at_debug() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let plan = resource.plan(None, custom_config("hook")).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();

        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let plan = resource.plan(Some(created.clone()), custom_config("renamed")).unwrap();
        DynResource::update(&resource, created, plan.planned_state).await.unwrap();

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|line| line.contains("Updating webhook"))
            .unwrap();
        assert!(line.contains("DEBUG"));
        assert!(line.contains("renamed"));
    }

    #[tokio::test]
    async fn test_email_group_round_trip() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let config = json!({"name": "oncall", "email_group": {"emails": ["b@x.io", "a@x.io"]}});
        let plan = resource.plan(None, config.clone()).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();
        assert_eq!(created["email_group"]["emails"], json!(["a@x.io", "b@x.io"]));

        let replan = resource.plan(Some(created), config).unwrap();
        assert!(replan.changes.is_empty());
    }

    #[tokio::test]
    async fn test_empty_notify_on_and_headers_round_trip() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let slack = json!({"name": "alerts", "slack": {"url": "https://hooks.slack.com/x", "notify_on": []}});

        let plan = resource.plan(None, slack.clone()).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();
        assert_eq!(created["slack"]["notify_on"], json!([]));
        let replan = resource.plan(Some(created.clone()), slack).unwrap();
        assert!(replan.changes.is_empty());

        let mut custom = custom_config("alerts");
        custom["custom"]["headers"] = json!({});
        let plan = resource.plan(Some(created.clone()), custom.clone()).unwrap();
        let updated = DynResource::update(&resource, created, plan.planned_state).await.unwrap();
        assert_eq!(updated["custom"]["headers"], json!({}));

        let read = DynResource::read(&resource, updated).await.unwrap().state.unwrap();
        let replan = resource.plan(Some(read), custom).unwrap();
        assert!(replan.changes.is_empty());
    }

    #[tokio::test]
    async fn test_import_then_read() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let plan = resource.plan(None, custom_config("hook")).unwrap();
        DynResource::create(&resource, plan.planned_state).await.unwrap();

        let imported = resource.import("webhook-1").await.unwrap();
        let read = DynResource::read(&resource, imported).await.unwrap();
        assert_eq!(read.state.unwrap()["name"], "hook");
    }
}
