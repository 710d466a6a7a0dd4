//! Records returned by the Streak API and parameters accepted by it.
//!
//! # Design
//! Each record names the fields callers rely on and keeps everything else
//! the server sent in `extra`, so a field the schema gains later is still
//! reachable without a release. Keys the server does not echo back (the
//! pipeline of a stage, the box of a value) are filled in by `Connection`
//! from the request that produced the record.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value as JsonValue};

fn unknown_display_name() -> String {
    "n/a".to_string()
}

/// Read `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn display_name_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(unknown_display_name))
}

/// Keys arrive as strings or, for stages and fields, as bare integers.
fn record_key<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawKey {
        Text(String),
        Number(Number),
    }

    Ok(match Option::<RawKey>::deserialize(deserializer)? {
        Some(RawKey::Text(key)) => key,
        Some(RawKey::Number(key)) => key.to_string(),
        None => String::new(),
    })
}

fn empty_value() -> JsonValue {
    JsonValue::String(String::new())
}

/// A Streak user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, deserialize_with = "record_key")]
    pub user_key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default = "unknown_display_name", deserialize_with = "display_name_or_unknown")]
    pub display_name: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User '{}'", self.display_name)
    }
}

/// A workflow container grouping boxes, stages, and fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    #[serde(default, deserialize_with = "record_key")]
    pub pipeline_key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "record_key")]
    pub creator_key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stage_order: Vec<String>,
    #[serde(default)]
    pub creation_timestamp: Option<i64>,
    #[serde(default)]
    pub last_updated_timestamp: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pipeline '{}'", self.name)
    }
}

/// A tracked record (deal) inside a pipeline.
///
/// Named `StreakBox` to stay clear of `std::boxed::Box`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakBox {
    #[serde(default, deserialize_with = "record_key")]
    pub box_key: String,
    #[serde(default, deserialize_with = "record_key")]
    pub pipeline_key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    #[serde(default, deserialize_with = "record_key")]
    pub stage_key: String,
    #[serde(default, deserialize_with = "record_key")]
    pub creator_key: String,
    #[serde(default)]
    pub creation_timestamp: Option<i64>,
    #[serde(default)]
    pub last_updated_timestamp: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl fmt::Display for StreakBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Box '{}'", self.name)
    }
}

/// A named step of a pipeline's workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    #[serde(default, deserialize_with = "record_key")]
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub text_color: Option<String>,
    /// Pipeline the stage was fetched from; not part of the payload.
    #[serde(skip)]
    pub pipeline_key: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage '{}'", self.name)
    }
}

/// Where a field record was fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldScope {
    Pipeline(String),
    Box(String),
}

impl Default for FieldScope {
    fn default() -> Self {
        FieldScope::Pipeline(String::new())
    }
}

/// A custom-attribute definition scoped to a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default, deserialize_with = "record_key")]
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default", rename = "type")]
    pub field_type: String,
    #[serde(skip)]
    pub scope: FieldScope,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Field {
    /// The owning pipeline, when the field was fetched through one.
    pub fn pipeline_key(&self) -> Option<&str> {
        match &self.scope {
            FieldScope::Pipeline(key) => Some(key),
            FieldScope::Box(_) => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field '{}'", self.name)
    }
}

/// The data stored for one field on one box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    /// Key of the field this value belongs to.
    #[serde(default, deserialize_with = "record_key")]
    pub key: String,
    #[serde(default = "empty_value")]
    pub value: JsonValue,
    #[serde(skip)]
    pub box_key: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            JsonValue::String(text) => write!(f, "Value '{text}'"),
            other => write!(f, "Value '{other}'"),
        }
    }
}

/// Parameters for creating or editing a pipeline. Unset fields are not sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_key: Option<String>,
    /// Comma-separated stage names created with the pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_names: Option<String>,
}

impl PipelineParams {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Parameters for creating or editing a box.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_key: Option<String>,
}

impl BoxParams {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl StageParams {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Streak field type such as `TEXT_INPUT`, `DATE`, or `PERSON`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
}

impl FieldParams {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            field_type: Some(field_type.into()),
        }
    }
}

/// New content for a box's field value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueParams {
    pub value: JsonValue,
}

impl ValueParams {
    pub fn new(value: impl Into<JsonValue>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pipeline_keeps_unknown_fields() {
        let pipeline: Pipeline = serde_json::from_value(json!({
            "pipelineKey": "p1",
            "name": "Sales",
            "aclEntries": [{"email": "a@b.c"}],
            "creationTimestamp": 1700000000000i64
        }))
        .unwrap();
        assert_eq!(pipeline.pipeline_key, "p1");
        assert_eq!(pipeline.creation_timestamp, Some(1_700_000_000_000));
        assert_eq!(pipeline.extra["aclEntries"][0]["email"], "a@b.c");
        assert!(!pipeline.extra.contains_key("name"));
    }

    #[test]
    fn user_display_name_defaults() {
        let user: User = serde_json::from_value(json!({"userKey": "u1"})).unwrap();
        assert_eq!(user.display_name, "n/a");
        assert_eq!(user.to_string(), "User 'n/a'");
    }

    #[test]
    fn stage_pipeline_key_is_not_in_payload() {
        let stage: Stage = serde_json::from_value(json!({
            "key": "5001",
            "name": "Lead",
            "pipelineKey": "from-server"
        }))
        .unwrap();
        assert!(stage.pipeline_key.is_empty());
        assert_eq!(stage.extra["pipelineKey"], "from-server");
        let back = serde_json::to_value(&stage).unwrap();
        assert_eq!(back["name"], "Lead");
    }

    #[test]
    fn field_type_uses_wire_name() {
        let field: Field =
            serde_json::from_value(json!({"key": "1001", "name": "Budget", "type": "TEXT_INPUT"}))
                .unwrap();
        assert_eq!(field.field_type, "TEXT_INPUT");
        assert_eq!(field.pipeline_key(), Some(""));
    }

    #[test]
    fn value_defaults_to_empty_string() {
        let value: Value = serde_json::from_value(json!({"key": "1001"})).unwrap();
        assert_eq!(value.value, json!(""));
        assert_eq!(value.to_string(), "Value ''");

        let numeric: Value = serde_json::from_value(json!({"key": "1002", "value": 42})).unwrap();
        assert_eq!(numeric.to_string(), "Value '42'");
    }

    #[test]
    fn null_fields_read_as_defaults() {
        let user: User = serde_json::from_value(json!({
            "userKey": "u1",
            "email": null,
            "displayName": null
        }))
        .unwrap();
        assert_eq!(user.email, "");
        assert_eq!(user.display_name, "n/a");

        let pipeline: Pipeline = serde_json::from_value(json!({
            "pipelineKey": "p1",
            "name": "Sales",
            "description": null,
            "creatorKey": null,
            "stageOrder": null,
            "creationTimestamp": null
        }))
        .unwrap();
        assert_eq!(pipeline.description, "");
        assert!(pipeline.stage_order.is_empty());
        assert_eq!(pipeline.creation_timestamp, None);

        let streak_box: StreakBox = serde_json::from_value(json!({
            "boxKey": "b1",
            "pipelineKey": "p1",
            "name": "Acme",
            "notes": null,
            "stageKey": null
        }))
        .unwrap();
        assert_eq!(streak_box.notes, "");
        assert_eq!(streak_box.stage_key, "");

        let stage: Stage = serde_json::from_value(json!({"key": null, "name": null})).unwrap();
        assert_eq!(stage.key, "");
        assert_eq!(stage.name, "");

        let field: Field =
            serde_json::from_value(json!({"key": "1001", "name": null, "type": null})).unwrap();
        assert_eq!(field.name, "");
        assert_eq!(field.field_type, "");

        let value: Value = serde_json::from_value(json!({"key": null, "value": null})).unwrap();
        assert_eq!(value.key, "");
        assert_eq!(value.value, JsonValue::Null);
    }

    #[test]
    fn integer_keys_are_read_as_text() {
        let stage: Stage = serde_json::from_value(json!({"key": 5003, "name": "Lost"})).unwrap();
        assert_eq!(stage.key, "5003");

        let field: Field = serde_json::from_value(json!({"key": 1001, "name": "Budget"})).unwrap();
        assert_eq!(field.key, "1001");

        let value: Value = serde_json::from_value(json!({"key": 1001, "value": "10k"})).unwrap();
        assert_eq!(value.key, "1001");

        let err = serde_json::from_value::<Stage>(json!({"key": ["5003"]})).unwrap_err();
        assert!(err.to_string().contains("did not match"), "{err}");
    }

    #[test]
    fn params_skip_unset_fields() {
        let body = serde_json::to_value(PipelineParams::named("Sales")).unwrap();
        assert_eq!(body, json!({"name": "Sales"}));

        let body = serde_json::to_value(FieldParams::new("Budget", "TEXT_INPUT")).unwrap();
        assert_eq!(body, json!({"name": "Budget", "type": "TEXT_INPUT"}));

        let body = serde_json::to_value(BoxParams {
            stage_key: Some("5002".to_string()),
            ..BoxParams::default()
        })
        .unwrap();
        assert_eq!(body, json!({"stageKey": "5002"}));
    }
}
