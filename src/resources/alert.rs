//! `coralogix_alert`: alert definitions.
//!
//! An alert's type lives in the `type_definition` block, which holds one
//! nested block per alert type. Exactly one must be configured; the chosen
//! one becomes the `type_definition` oneof of the SDK message.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::clients::{alerts as rpc, ClientSet};
use crate::error::ProviderError;
use crate::resource::{Clients, Resource};
use crate::resources::found;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema, Validator};
use crate::sdk::alerts::{
    alert_def_properties::TypeDefinition, AlertDef, AlertDefPriority, AlertDefProperties,
    CreateAlertDefRequest, DeleteAlertDefRequest, GetAlertDefRequest, LogSeverity, LogsFilter,
    LogsImmediateType, LogsThresholdCondition, LogsThresholdConditionType, LogsThresholdRule,
    LogsThresholdType, LogsTimeWindowValue, MetricFilter, MetricThresholdCondition,
    MetricThresholdConditionType, MetricThresholdRule, MetricThresholdType, MetricTimeWindowValue,
    ReplaceAlertDefRequest, TracingFilter, TracingImmediateType,
};
use crate::transcode::{
    enum_from_sdk, enum_names, enum_to_sdk, expand_list, expand_map, expand_set, flatten_list,
    flatten_map, flatten_set, narrow, optional, required, response_field, select_variant, EnumTable,
    Result,
};
use crate::types::{null_as_default, TfValue};

const PRIORITIES: EnumTable<AlertDefPriority> = &[
    ("P5", AlertDefPriority::P5OrUnspecified),
    ("P4", AlertDefPriority::P4),
    ("P3", AlertDefPriority::P3),
    ("P2", AlertDefPriority::P2),
    ("P1", AlertDefPriority::P1),
];

const SEVERITIES: EnumTable<LogSeverity> = &[
    ("VERBOSE", LogSeverity::VerboseUnspecified),
    ("DEBUG", LogSeverity::Debug),
    ("INFO", LogSeverity::Info),
    ("WARNING", LogSeverity::Warning),
    ("ERROR", LogSeverity::Error),
    ("CRITICAL", LogSeverity::Critical),
];

const LOGS_TIME_WINDOWS: EnumTable<LogsTimeWindowValue> = &[
    ("5_MINUTES", LogsTimeWindowValue::Minutes5OrUnspecified),
    ("10_MINUTES", LogsTimeWindowValue::Minutes10),
    ("15_MINUTES", LogsTimeWindowValue::Minutes15),
    ("20_MINUTES", LogsTimeWindowValue::Minutes20),
    ("30_MINUTES", LogsTimeWindowValue::Minutes30),
    ("1_HOUR", LogsTimeWindowValue::Hour1),
    ("2_HOURS", LogsTimeWindowValue::Hours2),
    ("6_HOURS", LogsTimeWindowValue::Hours6),
    ("12_HOURS", LogsTimeWindowValue::Hours12),
    ("24_HOURS", LogsTimeWindowValue::Hours24),
    ("36_HOURS", LogsTimeWindowValue::Hours36),
];

const LOGS_CONDITIONS: EnumTable<LogsThresholdConditionType> = &[
    ("MORE_THAN", LogsThresholdConditionType::MoreThanOrUnspecified),
    ("LESS_THAN", LogsThresholdConditionType::LessThan),
];

const METRIC_TIME_WINDOWS: EnumTable<MetricTimeWindowValue> = &[
    ("1_MINUTE", MetricTimeWindowValue::Minutes1OrUnspecified),
    ("5_MINUTES", MetricTimeWindowValue::Minutes5),
    ("10_MINUTES", MetricTimeWindowValue::Minutes10),
    ("15_MINUTES", MetricTimeWindowValue::Minutes15),
    ("30_MINUTES", MetricTimeWindowValue::Minutes30),
    ("1_HOUR", MetricTimeWindowValue::Hour1),
    ("2_HOURS", MetricTimeWindowValue::Hours2),
    ("4_HOURS", MetricTimeWindowValue::Hours4),
    ("6_HOURS", MetricTimeWindowValue::Hours6),
    ("12_HOURS", MetricTimeWindowValue::Hours12),
    ("24_HOURS", MetricTimeWindowValue::Hours24),
];

const METRIC_CONDITIONS: EnumTable<MetricThresholdConditionType> = &[
    ("MORE_THAN", MetricThresholdConditionType::MoreThanOrUnspecified),
    ("LESS_THAN", MetricThresholdConditionType::LessThan),
    ("MORE_THAN_OR_EQUALS", MetricThresholdConditionType::MoreThanOrEquals),
    ("LESS_THAN_OR_EQUALS", MetricThresholdConditionType::LessThanOrEquals),
];

const TYPE_DEFINITION: &str = "type_definition";

/// Alert definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertModel {
    /// Alert definition ID.
    pub id: TfValue<String>,
    /// Alert name.
    pub name: TfValue<String>,
    /// Free-text description.
    pub description: TfValue<String>,
    /// Whether the alert is evaluated. Defaults to true.
    pub enabled: TfValue<bool>,
    /// Priority from P1 (highest) to P5.
    pub priority: TfValue<String>,
    /// Entity labels.
    pub labels: TfValue<BTreeMap<String, String>>,
    /// Keys the alert is evaluated per, in order.
    pub group_by: TfValue<Vec<String>>,
    /// The alert type and its settings.
    pub type_definition: Option<TypeDefinitionModel>,
}

/// One nested block per alert type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeDefinitionModel {
    /// Notify on every matching log.
    pub logs_immediate: Option<LogsImmediateModel>,
    /// Notify when the matching log count crosses a threshold.
    pub logs_threshold: Option<LogsThresholdModel>,
    /// Notify when a metric crosses a threshold.
    pub metric_threshold: Option<MetricThresholdModel>,
    /// Notify on every matching span.
    pub tracing_immediate: Option<TracingImmediateModel>,
}

/// Which logs a logs alert looks at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsFilterModel {
    /// Lucene query the logs must match.
    pub lucene_query: TfValue<String>,
    /// Log severities to match.
    pub severities: TfValue<BTreeSet<String>>,
    /// Applications to match.
    pub application_names: TfValue<BTreeSet<String>>,
    /// Subsystems to match.
    pub subsystem_names: TfValue<BTreeSet<String>>,
}

/// Alert on every matching log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsImmediateModel {
    /// Which logs the alert looks at.
    pub logs_filter: Option<LogsFilterModel>,
    /// Log fields kept in the notification payload.
    pub notification_payload_filter: TfValue<BTreeSet<String>>,
}

/// Alert when the matching log count crosses a threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsThresholdModel {
    /// Which logs the alert looks at.
    pub logs_filter: Option<LogsFilterModel>,
    /// Conditions, evaluated in order.
    #[serde(deserialize_with = "null_as_default")]
    pub rules: Vec<LogsThresholdRuleModel>,
    /// Log fields kept in the notification payload.
    pub notification_payload_filter: TfValue<BTreeSet<String>>,
}

/// One logs threshold rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsThresholdRuleModel {
    /// The condition that fires the alert.
    pub condition: Option<LogsConditionModel>,
}

/// Condition of a logs threshold rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConditionModel {
    /// Log count compared against.
    pub threshold: TfValue<f64>,
    /// Window the count is taken over.
    pub time_window: TfValue<String>,
    /// `MORE_THAN` or `LESS_THAN`.
    pub condition_type: TfValue<String>,
}

/// Alert when a PromQL query crosses a threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricThresholdModel {
    /// The metric query.
    pub metric_filter: Option<MetricFilterModel>,
    /// Conditions, evaluated in order.
    #[serde(deserialize_with = "null_as_default")]
    pub rules: Vec<MetricThresholdRuleModel>,
}

/// The metric query of a metric alert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricFilterModel {
    /// PromQL query the alert evaluates.
    pub promql: TfValue<String>,
}

/// One metric threshold rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricThresholdRuleModel {
    /// The condition that fires the alert.
    pub condition: Option<MetricConditionModel>,
}

/// Condition of a metric threshold rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConditionModel {
    /// Value the query result is compared against.
    pub threshold: TfValue<f64>,
    /// Percentage of the window the condition must hold for.
    pub for_over_pct: TfValue<i64>,
    /// Window the query is evaluated over.
    pub of_the_last: TfValue<String>,
    /// How the query result is compared to the threshold.
    pub condition_type: TfValue<String>,
}

/// Alert on every matching span.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingImmediateModel {
    /// Which spans the alert looks at.
    pub tracing_filter: Option<TracingFilterModel>,
    /// Span fields kept in the notification payload.
    pub notification_payload_filter: TfValue<BTreeSet<String>>,
}

/// Which spans a tracing alert looks at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingFilterModel {
    /// Spans slower than this many milliseconds match.
    pub latency_threshold_ms: TfValue<i64>,
    /// Applications to match.
    pub application_names: TfValue<BTreeSet<String>>,
    /// Services to match.
    pub service_names: TfValue<BTreeSet<String>>,
}

/// The configured alert type.
#[derive(Debug, Clone, Copy)]
enum AlertType<'a> {
    LogsImmediate(&'a LogsImmediateModel),
    LogsThreshold(&'a LogsThresholdModel),
    MetricThreshold(&'a MetricThresholdModel),
    TracingImmediate(&'a TracingImmediateModel),
}

impl TypeDefinitionModel {
    fn alert_type(&self) -> Result<AlertType<'_>> {
        select_variant(
            TYPE_DEFINITION,
            vec![
                ("logs_immediate", self.logs_immediate.as_ref().map(AlertType::LogsImmediate)),
                ("logs_threshold", self.logs_threshold.as_ref().map(AlertType::LogsThreshold)),
                ("metric_threshold", self.metric_threshold.as_ref().map(AlertType::MetricThreshold)),
                ("tracing_immediate", self.tracing_immediate.as_ref().map(AlertType::TracingImmediate)),
            ],
        )
    }
}

fn string_set() -> AttributeType {
    AttributeType::set(AttributeType::String)
}

fn one_of<E>(table: EnumTable<E>) -> Validator {
    Validator::one_of(enum_names(table))
}

fn logs_filter_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute(
                "lucene_query",
                Attribute::optional_string().with_description("Lucene query the logs must match."),
            )
            .with_attribute(
                "severities",
                Attribute::new(string_set(), AttributeFlags::optional())
                    .with_validator(one_of(SEVERITIES))
                    .with_description("Log severities to match."),
            )
            .with_attribute("application_names", Attribute::new(string_set(), AttributeFlags::optional()))
            .with_attribute("subsystem_names", Attribute::new(string_set(), AttributeFlags::optional())),
    )
}

fn payload_filter() -> Attribute {
    Attribute::new(string_set(), AttributeFlags::optional())
        .with_description("Fields to keep in the notification payload.")
}

fn type_definition_block() -> Block {
    let logs_immediate = Block::new()
        .with_block("logs_filter", logs_filter_block())
        .with_attribute("notification_payload_filter", payload_filter());

    let logs_condition = Block::new()
        .with_attribute("threshold", Attribute::required_float64())
        .with_attribute(
            "time_window",
            Attribute::required_string().with_validator(one_of(LOGS_TIME_WINDOWS)),
        )
        .with_attribute(
            "condition_type",
            Attribute::optional_string()
                .with_default(json!("MORE_THAN"))
                .with_validator(one_of(LOGS_CONDITIONS)),
        );
    let logs_threshold = Block::new()
        .with_block("logs_filter", logs_filter_block())
        .with_block(
            "rules",
            NestedBlock::list(Block::new().with_block("condition", NestedBlock::required_single(logs_condition)))
                .with_min_items(1),
        )
        .with_attribute("notification_payload_filter", payload_filter());

    let metric_condition = Block::new()
        .with_attribute("threshold", Attribute::required_float64())
        .with_attribute(
            "for_over_pct",
            Attribute::optional_int64()
                .with_default(json!(0))
                .with_validator(Validator::Between { min: 0.0, max: 100.0 }),
        )
        .with_attribute(
            "of_the_last",
            Attribute::required_string().with_validator(one_of(METRIC_TIME_WINDOWS)),
        )
        .with_attribute(
            "condition_type",
            Attribute::required_string().with_validator(one_of(METRIC_CONDITIONS)),
        );
    let metric_threshold = Block::new()
        .with_block(
            "metric_filter",
            NestedBlock::required_single(
                Block::new().with_attribute("promql", Attribute::required_string()),
            ),
        )
        .with_block(
            "rules",
            NestedBlock::list(Block::new().with_block("condition", NestedBlock::required_single(metric_condition)))
                .with_min_items(1),
        );

    let tracing_immediate = Block::new()
        .with_block(
            "tracing_filter",
            NestedBlock::single(
                Block::new()
                    .with_attribute(
                        "latency_threshold_ms",
                        Attribute::optional_int64().with_default(json!(0)),
                    )
                    .with_attribute("application_names", Attribute::new(string_set(), AttributeFlags::optional()))
                    .with_attribute("service_names", Attribute::new(string_set(), AttributeFlags::optional())),
            ),
        )
        .with_attribute("notification_payload_filter", payload_filter());

    Block::new()
        .with_block("logs_immediate", NestedBlock::single(logs_immediate))
        .with_block("logs_threshold", NestedBlock::single(logs_threshold))
        .with_block("metric_threshold", NestedBlock::single(metric_threshold))
        .with_block("tracing_immediate", NestedBlock::single(tracing_immediate))
        .with_exactly_one_of(["logs_immediate", "logs_threshold", "metric_threshold", "tracing_immediate"])
        .with_description("The alert type. Exactly one of the nested blocks must be set.")
}

/// Schema of `coralogix_alert`.
pub fn alert_schema() -> Schema {
    Schema::v0()
        .with_description("Coralogix alert definition.")
        .with_attribute("id", Attribute::id())
        .with_attribute("name", Attribute::required_string().with_validator(Validator::NotEmpty))
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("enabled", Attribute::optional_bool().with_default(json!(true)))
        .with_attribute(
            "priority",
            Attribute::optional_string()
                .with_default(json!("P5"))
                .with_validator(one_of(PRIORITIES)),
        )
        .with_attribute(
            "labels",
            Attribute::new(AttributeType::map(AttributeType::String), AttributeFlags::optional())
                .with_description("Labels attached to the alert and its incidents."),
        )
        .with_attribute(
            "group_by",
            Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::optional())
                .with_description("Keys the alert is evaluated per."),
        )
        .with_block("type_definition", NestedBlock::required_single(type_definition_block()))
}

// Model -> SDK.

fn expand_logs_filter(filter: &LogsFilterModel) -> Result<LogsFilter> {
    let severities = expand_set(&filter.severities)
        .iter()
        .map(|s| enum_to_sdk(SEVERITIES, "logs_filter.severities", s))
        .collect::<Result<Vec<_>>>()?;
    Ok(LogsFilter {
        lucene_query: optional(&filter.lucene_query),
        severities,
        application_names: expand_set(&filter.application_names),
        subsystem_names: expand_set(&filter.subsystem_names),
    })
}

fn expand_logs_rule(rule: &LogsThresholdRuleModel) -> Result<LogsThresholdRule> {
    let condition = rule.condition.as_ref().ok_or_else(|| {
        ProviderError::Validation("logs_threshold.rules.condition: block is required".to_string())
    })?;
    let condition_type = condition.condition_type.as_known().map_or("MORE_THAN", String::as_str);
    Ok(LogsThresholdRule {
        condition: Some(LogsThresholdCondition {
            threshold: required("logs_threshold.rules.condition.threshold", &condition.threshold)?,
            time_window: enum_to_sdk(
                LOGS_TIME_WINDOWS,
                "logs_threshold.rules.condition.time_window",
                &required("logs_threshold.rules.condition.time_window", &condition.time_window)?,
            )?,
            condition_type: enum_to_sdk(
                LOGS_CONDITIONS,
                "logs_threshold.rules.condition.condition_type",
                condition_type,
            )?,
        }),
    })
}

fn expand_metric_rule(rule: &MetricThresholdRuleModel) -> Result<MetricThresholdRule> {
    let condition = rule.condition.as_ref().ok_or_else(|| {
        ProviderError::Validation("metric_threshold.rules.condition: block is required".to_string())
    })?;
    Ok(MetricThresholdRule {
        condition: Some(MetricThresholdCondition {
            threshold: required("metric_threshold.rules.condition.threshold", &condition.threshold)?,
            for_over_pct: narrow(
                "metric_threshold.rules.condition.for_over_pct",
                condition.for_over_pct.as_known().copied().unwrap_or_default(),
            )?,
            of_the_last: enum_to_sdk(
                METRIC_TIME_WINDOWS,
                "metric_threshold.rules.condition.of_the_last",
                &required("metric_threshold.rules.condition.of_the_last", &condition.of_the_last)?,
            )?,
            condition_type: enum_to_sdk(
                METRIC_CONDITIONS,
                "metric_threshold.rules.condition.condition_type",
                &required("metric_threshold.rules.condition.condition_type", &condition.condition_type)?,
            )?,
        }),
    })
}

fn expand_type_definition(alert_type: AlertType<'_>) -> Result<TypeDefinition> {
    Ok(match alert_type {
        AlertType::LogsImmediate(m) => TypeDefinition::LogsImmediate(LogsImmediateType {
            logs_filter: m.logs_filter.as_ref().map(expand_logs_filter).transpose()?,
            notification_payload_filter: expand_set(&m.notification_payload_filter),
        }),
        AlertType::LogsThreshold(m) => TypeDefinition::LogsThreshold(LogsThresholdType {
            logs_filter: m.logs_filter.as_ref().map(expand_logs_filter).transpose()?,
            rules: m.rules.iter().map(expand_logs_rule).collect::<Result<_>>()?,
            notification_payload_filter: expand_set(&m.notification_payload_filter),
        }),
        AlertType::MetricThreshold(m) => {
            let filter = m.metric_filter.as_ref().ok_or_else(|| {
                ProviderError::Validation("metric_threshold.metric_filter: block is required".to_string())
            })?;
            TypeDefinition::MetricThreshold(MetricThresholdType {
                metric_filter: Some(MetricFilter {
                    promql: required("metric_threshold.metric_filter.promql", &filter.promql)?,
                }),
                rules: m.rules.iter().map(expand_metric_rule).collect::<Result<_>>()?,
            })
        },
        AlertType::TracingImmediate(m) => {
            let tracing_filter = m
                .tracing_filter
                .as_ref()
                .map(|f| -> Result<TracingFilter> {
                    Ok(TracingFilter {
                        latency_threshold_ms: narrow(
                            "tracing_immediate.tracing_filter.latency_threshold_ms",
                            f.latency_threshold_ms.as_known().copied().unwrap_or_default(),
                        )?,
                        application_names: expand_set(&f.application_names),
                        service_names: expand_set(&f.service_names),
                    })
                })
                .transpose()?;
            TypeDefinition::TracingImmediate(TracingImmediateType {
                tracing_filter,
                notification_payload_filter: expand_set(&m.notification_payload_filter),
            })
        },
    })
}

/// Build the SDK properties of an alert.
pub fn expand_properties(model: &AlertModel) -> Result<AlertDefProperties> {
    let type_definition = model
        .type_definition
        .as_ref()
        .ok_or_else(|| ProviderError::Validation(format!("{}: block is required", TYPE_DEFINITION)))?;
    let priority = model.priority.as_known().map_or("P5", String::as_str);

    Ok(AlertDefProperties {
        name: required("name", &model.name)?,
        description: optional(&model.description),
        enabled: model.enabled.as_known().copied().unwrap_or(true),
        priority: enum_to_sdk(PRIORITIES, "priority", priority)?,
        entity_labels: expand_map(&model.labels),
        group_by_keys: expand_list(&model.group_by),
        type_definition: Some(expand_type_definition(type_definition.alert_type()?)?),
    })
}

// SDK -> model.

fn flatten_logs_filter(filter: Option<LogsFilter>) -> Result<Option<LogsFilterModel>> {
    let Some(filter) = filter.filter(|f| *f != LogsFilter::default()) else {
        return Ok(None);
    };
    let severities = filter
        .severities
        .iter()
        .map(|s| enum_from_sdk(SEVERITIES, "logs_filter.severities", *s))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(LogsFilterModel {
        lucene_query: filter.lucene_query.into(),
        severities: flatten_set(severities),
        application_names: flatten_set(filter.application_names),
        subsystem_names: flatten_set(filter.subsystem_names),
    }))
}

fn flatten_logs_rule(rule: LogsThresholdRule) -> Result<LogsThresholdRuleModel> {
    let condition = rule
        .condition
        .map(|c| -> Result<LogsConditionModel> {
            Ok(LogsConditionModel {
                threshold: TfValue::Known(c.threshold),
                time_window: TfValue::Known(enum_from_sdk(
                    LOGS_TIME_WINDOWS,
                    "logs_threshold.rules.condition.time_window",
                    c.time_window,
                )?),
                condition_type: TfValue::Known(enum_from_sdk(
                    LOGS_CONDITIONS,
                    "logs_threshold.rules.condition.condition_type",
                    c.condition_type,
                )?),
            })
        })
        .transpose()?;
    Ok(LogsThresholdRuleModel { condition })
}

fn flatten_metric_rule(rule: MetricThresholdRule) -> Result<MetricThresholdRuleModel> {
    let condition = rule
        .condition
        .map(|c| -> Result<MetricConditionModel> {
            Ok(MetricConditionModel {
                threshold: TfValue::Known(c.threshold),
                for_over_pct: TfValue::Known(i64::from(c.for_over_pct)),
                of_the_last: TfValue::Known(enum_from_sdk(
                    METRIC_TIME_WINDOWS,
                    "metric_threshold.rules.condition.of_the_last",
                    c.of_the_last,
                )?),
                condition_type: TfValue::Known(enum_from_sdk(
                    METRIC_CONDITIONS,
                    "metric_threshold.rules.condition.condition_type",
                    c.condition_type,
                )?),
            })
        })
        .transpose()?;
    Ok(MetricThresholdRuleModel { condition })
}

fn flatten_type_definition(definition: TypeDefinition) -> Result<TypeDefinitionModel> {
    let mut model = TypeDefinitionModel::default();
    match definition {
        TypeDefinition::LogsImmediate(t) => {
            model.logs_immediate = Some(LogsImmediateModel {
                logs_filter: flatten_logs_filter(t.logs_filter)?,
                notification_payload_filter: flatten_set(t.notification_payload_filter),
            });
        },
        TypeDefinition::LogsThreshold(t) => {
            model.logs_threshold = Some(LogsThresholdModel {
                logs_filter: flatten_logs_filter(t.logs_filter)?,
                rules: t.rules.into_iter().map(flatten_logs_rule).collect::<Result<_>>()?,
                notification_payload_filter: flatten_set(t.notification_payload_filter),
            });
        },
        TypeDefinition::MetricThreshold(t) => {
            model.metric_threshold = Some(MetricThresholdModel {
                metric_filter: t.metric_filter.map(|f| MetricFilterModel {
                    promql: TfValue::Known(f.promql),
                }),
                rules: t.rules.into_iter().map(flatten_metric_rule).collect::<Result<_>>()?,
            });
        },
        TypeDefinition::TracingImmediate(t) => {
            model.tracing_immediate = Some(TracingImmediateModel {
                tracing_filter: t.tracing_filter.map(|f| TracingFilterModel {
                    latency_threshold_ms: TfValue::Known(i64::from(f.latency_threshold_ms)),
                    application_names: flatten_set(f.application_names),
                    service_names: flatten_set(f.service_names),
                }),
                notification_payload_filter: flatten_set(t.notification_payload_filter),
            });
        },
    }
    Ok(model)
}

/// Build the model of an alert returned by the API.
pub fn flatten_alert(alert: AlertDef) -> Result<AlertModel> {
    let properties = response_field(rpc::GET_ALERT_DEF, "alert_def_properties", alert.alert_def_properties)?;
    Ok(AlertModel {
        id: TfValue::Known(alert.id),
        name: TfValue::Known(properties.name),
        description: properties.description.into(),
        enabled: TfValue::Known(properties.enabled),
        priority: TfValue::Known(enum_from_sdk(PRIORITIES, "priority", properties.priority)?),
        labels: flatten_map(properties.entity_labels),
        group_by: flatten_list(properties.group_by_keys),
        type_definition: properties
            .type_definition
            .map(flatten_type_definition)
            .transpose()?,
    })
}

/// Fetch an alert by ID.
pub async fn get_alert(clients: &ClientSet, id: String) -> Result<AlertModel> {
    let request = GetAlertDefRequest { id };
    debug!(id = %request.id, "Reading alert");
    let response = clients
        .alerts
        .get(request.clone())
        .await
        .map_err(|status| ProviderError::rpc(rpc::GET_ALERT_DEF, &request, status))?;
    flatten_alert(response_field(rpc::GET_ALERT_DEF, "alert_def", response.alert_def)?)
}

/// Handler for `coralogix_alert`.
#[derive(Default)]
pub struct AlertResource {
    clients: Clients,
}

#[async_trait]
impl Resource for AlertResource {
    type Model = AlertModel;

    fn type_name(&self) -> &'static str {
        "coralogix_alert"
    }

    fn schema(&self) -> Schema {
        alert_schema()
    }

    fn configure(&mut self, clients: Arc<ClientSet>) {
        self.clients.set(clients);
    }

    async fn create(&self, plan: AlertModel) -> std::result::Result<AlertModel, ProviderError> {
        let request = CreateAlertDefRequest {
            alert_def_properties: Some(expand_properties(&plan)?),
        };
        debug!(request = ?request, "Creating alert");
        let response = self
            .clients
            .get()?
            .alerts
            .create(request.clone())
            .await
            .map_err(|status| ProviderError::rpc(rpc::CREATE_ALERT_DEF, &request, status))?;
        let alert = response_field(rpc::CREATE_ALERT_DEF, "alert_def", response.alert_def)?;
        info!(id = %alert.id, "Alert created");
        flatten_alert(alert)
    }

    async fn read(&self, state: AlertModel) -> std::result::Result<Option<AlertModel>, ProviderError> {
        let id = required("id", &state.id)?;
        found(get_alert(self.clients.get()?, id).await)
    }

    async fn update(&self, plan: AlertModel, state: AlertModel) -> std::result::Result<AlertModel, ProviderError> {
        let request = ReplaceAlertDefRequest {
            alert_def: Some(AlertDef {
                id: required("id", &state.id)?,
                alert_def_properties: Some(expand_properties(&plan)?),
            }),
        };
        debug!(request = ?request, "Replacing alert");
        let response = self
            .clients
            .get()?
            .alerts
            .replace(request.clone())
            .await
            .map_err(|status| ProviderError::rpc(rpc::REPLACE_ALERT_DEF, &request, status))?;
        let alert = response_field(rpc::REPLACE_ALERT_DEF, "alert_def", response.alert_def)?;
        info!(id = %alert.id, "Alert updated");
        flatten_alert(alert)
    }

    async fn delete(&self, state: AlertModel) -> std::result::Result<(), ProviderError> {
        let request = DeleteAlertDefRequest {
            id: required("id", &state.id)?,
        };
        self.clients
            .get()?
            .alerts
            .delete(request.clone())
            .await
            .map_err(|status| ProviderError::rpc(rpc::DELETE_ALERT_DEF, &request, status))?;
        info!(id = %request.id, "Alert deleted");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn threshold_config() -> serde_json::Value {
    serde_json::json!({
        "name": "errors spike",
        "priority": "P2",
        "labels": {"team": "core"},
        "type_definition": {
            "logs_threshold": {
                "logs_filter": {
                    "lucene_query": "status:500",
                    "severities": ["ERROR", "CRITICAL"],
                },
                "rules": [{
                    "condition": {
                        "threshold": 2,
                        "time_window": "10_MINUTES",
                        "condition_type": "MORE_THAN",
                    }
                }],
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::DynResource;
    use crate::testing::FakeCoralogix;
    use crate::validation::validate;

    fn resource(fake: &Arc<FakeCoralogix>) -> AlertResource {
        let mut resource = AlertResource::default();
        Resource::configure(&mut resource, fake.client_set());
        resource
    }

    #[test]
    fn test_schema_rejects_two_alert_types() {
        let mut config = threshold_config();
        config["type_definition"]["logs_immediate"] = json!({});
        let diagnostics = validate(&alert_schema(), &config);
        assert!(diagnostics.iter().any(|d| d.summary == "Conflicting arguments"));
    }

    #[test]
    fn test_schema_rejects_unknown_time_window() {
        let mut config = threshold_config();
        config["type_definition"]["logs_threshold"]["rules"][0]["condition"]["time_window"] = json!("7_MINUTES");
        assert!(!validate(&alert_schema(), &config).is_empty());
    }

    #[test]
    fn test_expand_rejects_missing_type() {
        let model = AlertModel {
            name: TfValue::known("a"),
            type_definition: Some(TypeDefinitionModel::default()),
            ..Default::default()
        };
        let err = expand_properties(&model).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.to_string().contains("got none"));
    }

    #[test]
    fn test_expand_enums() {
        let model: AlertModel = serde_json::from_value(threshold_config()).unwrap();
        let properties = expand_properties(&model).unwrap();
        assert_eq!(properties.priority, AlertDefPriority::P2 as i32);
        assert!(properties.enabled);
        let Some(TypeDefinition::LogsThreshold(t)) = properties.type_definition else {
            panic!("expected a logs threshold alert");
        };
        let condition = t.rules[0].condition.clone().unwrap();
        assert_eq!(condition.threshold, 2.0);
        assert_eq!(condition.time_window, LogsTimeWindowValue::Minutes10 as i32);
        assert_eq!(condition.condition_type, LogsThresholdConditionType::MoreThanOrUnspecified as i32);
        assert_eq!(
            t.logs_filter.unwrap().severities,
            vec![LogSeverity::Critical as i32, LogSeverity::Error as i32]
        );
    }

    #[tokio::test]
    async fn test_threshold_alert_reads_back_unchanged() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);

        let plan = resource.plan(None, threshold_config()).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();
        let read = DynResource::read(&resource, created.clone()).await.unwrap();

        assert_eq!(read.state, Some(created.clone()));
        let condition = &created["type_definition"]["logs_threshold"]["rules"][0]["condition"];
        assert_eq!(condition["threshold"], 2.0);
        assert_eq!(condition["time_window"], "10_MINUTES");
        assert_eq!(condition["condition_type"], "MORE_THAN");
        assert_eq!(created["priority"], "P2");
        assert_eq!(created["enabled"], true);
        assert!(created["description"].is_null());

        let replan = resource.plan(Some(created.clone()), threshold_config()).unwrap();
        assert!(replan.changes.is_empty());
    }

    #[tokio::test]
    async fn test_switch_to_logs_immediate() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let plan = resource.plan(None, threshold_config()).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();

        let mut config = threshold_config();
        config["type_definition"] = json!({
            "logs_immediate": {"logs_filter": {"application_names": ["api"]}}
        });
        let plan = resource.plan(Some(created.clone()), config).unwrap();
        assert!(plan.changes.iter().any(|c| c.path == "type_definition"));
        assert!(!plan.requires_replace);

        let updated = DynResource::update(&resource, created, plan.planned_state).await.unwrap();
        assert!(updated["type_definition"]["logs_threshold"].is_null());
        assert_eq!(
            updated["type_definition"]["logs_immediate"]["logs_filter"]["application_names"],
            json!(["api"])
        );
        assert!(updated["type_definition"]["logs_immediate"]["logs_filter"]["severities"].is_null());
    }

    #[tokio::test]
    async fn test_metric_and_tracing_alerts() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);

        let metric = json!({
            "name": "cpu",
            "type_definition": {"metric_threshold": {
                "metric_filter": {"promql": "avg(cpu) > 1"},
                "rules": [{"condition": {
                    "threshold": 0.8,
                    "of_the_last": "15_MINUTES",
                    "condition_type": "MORE_THAN_OR_EQUALS",
                }}],
            }}
        });
        let plan = resource.plan(None, metric).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();
        let condition = &created["type_definition"]["metric_threshold"]["rules"][0]["condition"];
        assert_eq!(condition["of_the_last"], "15_MINUTES");
        assert_eq!(condition["for_over_pct"], 0);

        let tracing = json!({
            "name": "slow",
            "type_definition": {"tracing_immediate": {
                "tracing_filter": {"latency_threshold_ms": 250, "service_names": ["checkout"]},
            }}
        });
        let plan = resource.plan(None, tracing).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();
        assert_eq!(
            created["type_definition"]["tracing_immediate"]["tracing_filter"]["latency_threshold_ms"],
            250
        );
    }

    #[tokio::test]
    async fn test_empty_filter_and_labels_round_trip() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let config = json!({
            "name": "any log",
            "labels": {},
            "group_by": [],
            "type_definition": {"logs_immediate": {
                "logs_filter": {"severities": []},
                "notification_payload_filter": [],
            }},
        });

        let plan = resource.plan(None, config.clone()).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();
        let immediate = &created["type_definition"]["logs_immediate"];
        assert_eq!(immediate["logs_filter"]["severities"], json!([]));
        assert_eq!(immediate["notification_payload_filter"], json!([]));
        assert_eq!(created["labels"], json!({}));

        let read = DynResource::read(&resource, created.clone()).await.unwrap();
        assert_eq!(read.state, Some(created.clone()));
        let replan = resource.plan(Some(created), config).unwrap();
        assert!(replan.changes.is_empty());
    }

    #[tokio::test]
    async fn test_read_removed_alert() {
        let fake = FakeCoralogix::new();
        let resource = resource(&fake);
        let plan = resource.plan(None, threshold_config()).unwrap();
        let created = DynResource::create(&resource, plan.planned_state).await.unwrap();

        DynResource::delete(&resource, created.clone()).await.unwrap();
        let read = DynResource::read(&resource, created).await.unwrap();
        assert!(read.state.is_none());
        assert_eq!(read.diagnostics.len(), 1);
        assert!(!read.diagnostics[0].is_error());
    }

    #[tokio::test]
    async fn test_unconfigured_resource_fails() {
        let resource = AlertResource::default();
        let err = DynResource::create(&resource, threshold_config()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
}
