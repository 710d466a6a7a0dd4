//! Stateless request builder and response parser for the Streak API.
//!
//! # Design
//! `StreakClient` holds only the endpoint and the precomputed auth header.
//! Every remote call has a `build_*` method producing an `HttpRequest`; the
//! responses share a handful of generic `parse_*` methods because the API
//! reports failure the same way everywhere: an object carrying a `success`
//! key, with the message under `error`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::auth::basic_auth_header;
use crate::error::{Result, StreakError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::settings::Settings;
use crate::types::{BoxParams, FieldParams, PipelineParams, StageParams, ValueParams};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Key whose presence marks a response as a vendor error.
pub const ERROR_MARKER_KEY: &str = "success";

/// Synchronous, stateless client for the Streak API.
///
/// Builds `HttpRequest` values and parses `HttpResponse` values without
/// touching the network.
#[derive(Clone)]
pub struct StreakClient {
    endpoint: String,
    auth_header: String,
}

impl std::fmt::Debug for StreakClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreakClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl StreakClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            endpoint: settings.api_endpoint.trim_end_matches('/').to_string(),
            auth_header: basic_auth_header(&settings.api_key),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: HttpMethod, path: &str, body: Option<(&str, String)>) -> HttpRequest {
        let mut headers = vec![("authorization".to_string(), self.auth_header.clone())];
        let body = body.map(|(content_type, body)| {
            headers.push(("content-type".to_string(), content_type.to_string()));
            body
        });
        HttpRequest {
            method,
            url: format!("{}/{path}", self.endpoint),
            headers,
            body,
        }
    }

    fn get(&self, path: &str) -> HttpRequest {
        self.request(HttpMethod::Get, path, None)
    }

    fn delete(&self, path: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, path, None)
    }

    /// PUT with a form-encoded body; the API only creates through PUT.
    fn put<P: Serialize>(&self, path: &str, params: &P) -> Result<HttpRequest> {
        let body = encode_form(params)?;
        Ok(self.request(HttpMethod::Put, path, Some((FORM_CONTENT_TYPE, body))))
    }

    /// POST with a JSON body; the API only edits through POST.
    fn post<P: Serialize>(&self, path: &str, params: &P) -> Result<HttpRequest> {
        let body =
            serde_json::to_string(params).map_err(|e| StreakError::Serialization(e.to_string()))?;
        Ok(self.request(HttpMethod::Post, path, Some((JSON_CONTENT_TYPE, body))))
    }

    // ---- users ----

    pub fn build_get_current_user(&self) -> HttpRequest {
        self.get("users/me")
    }

    pub fn build_get_user(&self, user_key: &str) -> HttpRequest {
        self.get(&format!("users/{}", segment(user_key)))
    }

    // ---- pipelines ----

    pub fn build_list_pipelines(&self) -> HttpRequest {
        self.get("pipelines/")
    }

    pub fn build_get_pipeline(&self, pipeline_key: &str) -> Result<HttpRequest> {
        require_key(pipeline_key, "pipeline")?;
        Ok(self.get(&format!("pipelines/{}", segment(pipeline_key))))
    }

    pub fn build_create_pipeline(&self, params: &PipelineParams) -> Result<HttpRequest> {
        self.put("pipelines/", params)
    }

    pub fn build_edit_pipeline(
        &self,
        pipeline_key: &str,
        params: &PipelineParams,
    ) -> Result<HttpRequest> {
        self.post(&format!("pipelines/{}", segment(pipeline_key)), params)
    }

    pub fn build_delete_pipeline(&self, pipeline_key: &str) -> HttpRequest {
        self.delete(&format!("pipelines/{}", segment(pipeline_key)))
    }

    // ---- boxes ----

    pub fn build_list_boxes(&self) -> HttpRequest {
        self.get("boxes/")
    }

    pub fn build_list_boxes_in_pipeline(&self, pipeline_key: &str) -> HttpRequest {
        self.get(&format!("pipelines/{}/boxes", segment(pipeline_key)))
    }

    pub fn build_get_box(&self, box_key: &str) -> Result<HttpRequest> {
        require_key(box_key, "box")?;
        Ok(self.get(&format!("boxes/{}", segment(box_key))))
    }

    pub fn build_create_box(&self, pipeline_key: &str, params: &BoxParams) -> Result<HttpRequest> {
        self.put(&format!("pipelines/{}/boxes", segment(pipeline_key)), params)
    }

    pub fn build_edit_box(&self, box_key: &str, params: &BoxParams) -> Result<HttpRequest> {
        self.post(&format!("boxes/{}", segment(box_key)), params)
    }

    pub fn build_delete_box(&self, box_key: &str) -> HttpRequest {
        self.delete(&format!("boxes/{}", segment(box_key)))
    }

    // ---- stages ----

    pub fn build_list_stages(&self, pipeline_key: &str) -> HttpRequest {
        self.get(&format!("pipelines/{}/stages", segment(pipeline_key)))
    }

    pub fn build_get_stage(&self, pipeline_key: &str, stage_key: &str) -> HttpRequest {
        self.get(&format!("pipelines/{}/stages/{}", segment(pipeline_key), segment(stage_key)))
    }

    pub fn build_create_stage(
        &self,
        pipeline_key: &str,
        params: &StageParams,
    ) -> Result<HttpRequest> {
        self.put(&format!("pipelines/{}/stages", segment(pipeline_key)), params)
    }

    pub fn build_edit_stage(
        &self,
        pipeline_key: &str,
        stage_key: &str,
        params: &StageParams,
    ) -> Result<HttpRequest> {
        self.post(
            &format!(
                "pipelines/{}/stages/{}",
                segment(pipeline_key),
                segment(stage_key),
            ),
            params,
        )
    }

    pub fn build_delete_stage(&self, pipeline_key: &str, stage_key: &str) -> HttpRequest {
        self.delete(&format!("pipelines/{}/stages/{}", segment(pipeline_key), segment(stage_key)))
    }

    // ---- fields ----

    pub fn build_list_fields(&self, pipeline_key: &str) -> HttpRequest {
        self.get(&format!("pipelines/{}/fields", segment(pipeline_key)))
    }

    pub fn build_get_field(&self, pipeline_key: &str, field_key: &str) -> HttpRequest {
        self.get(&format!("pipelines/{}/fields/{}", segment(pipeline_key), segment(field_key)))
    }

    pub fn build_create_field(
        &self,
        pipeline_key: &str,
        params: &FieldParams,
    ) -> Result<HttpRequest> {
        self.put(&format!("pipelines/{}/fields", segment(pipeline_key)), params)
    }

    pub fn build_edit_field(
        &self,
        pipeline_key: &str,
        field_key: &str,
        params: &FieldParams,
    ) -> Result<HttpRequest> {
        self.post(
            &format!(
                "pipelines/{}/fields/{}",
                segment(pipeline_key),
                segment(field_key),
            ),
            params,
        )
    }

    pub fn build_delete_field(&self, pipeline_key: &str, field_key: &str) -> HttpRequest {
        self.delete(&format!("pipelines/{}/fields/{}", segment(pipeline_key), segment(field_key)))
    }

    // ---- box field values ----

    /// Field entries of a box; the same path serves `Field` and `Value` listings.
    pub fn build_list_box_fields(&self, box_key: &str) -> HttpRequest {
        self.get(&format!("boxes/{}/fields", segment(box_key)))
    }

    pub fn build_get_value(&self, box_key: &str, field_key: &str) -> HttpRequest {
        self.get(&format!("boxes/{}/fields/{}", segment(box_key), segment(field_key)))
    }

    pub fn build_edit_value(
        &self,
        box_key: &str,
        field_key: &str,
        params: &ValueParams,
    ) -> Result<HttpRequest> {
        self.post(&format!("boxes/{}/fields/{}", segment(box_key), segment(field_key)), params)
    }

    // ---- parsing ----

    /// Decode a single record, failing on the vendor error marker.
    pub fn parse_record<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T> {
        let body = decode_body(&response)?;
        check_error_marker(&body)?;
        serde_json::from_value(body).map_err(|e| StreakError::Deserialization(e.to_string()))
    }

    /// Decode a JSON array of records.
    pub fn parse_list<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<Vec<T>> {
        let body = decode_body(&response)?;
        check_error_marker(&body)?;
        serde_json::from_value(body).map_err(|e| StreakError::Deserialization(e.to_string()))
    }

    /// Decode a JSON object whose values are records (the stage listing shape).
    pub fn parse_keyed_map<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<Vec<T>> {
        let body = decode_body(&response)?;
        check_error_marker(&body)?;
        match body {
            JsonValue::Object(entries) => entries
                .into_iter()
                .map(|(_, entry)| {
                    serde_json::from_value(entry)
                        .map_err(|e| StreakError::Deserialization(e.to_string()))
                })
                .collect(),
            other => Err(StreakError::Deserialization(format!(
                "expected an object keyed by record key, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Extract the key of the record a create or edit call wrote.
    pub fn parse_written_key(&self, response: HttpResponse, key_field: &str) -> Result<String> {
        let body = decode_body(&response)?;
        check_error_marker(&body)?;
        match body.get(key_field) {
            Some(JsonValue::String(key)) if !key.is_empty() => Ok(key.clone()),
            Some(JsonValue::Number(key)) => Ok(key.to_string()),
            _ => Err(StreakError::Deserialization(format!(
                "write response has no `{key_field}`"
            ))),
        }
    }

    /// Accept a delete response only when it reports `success: true`.
    pub fn parse_delete(&self, response: HttpResponse, resource: &'static str) -> Result<()> {
        let body = decode_body(&response)?;
        match body.get(ERROR_MARKER_KEY).and_then(JsonValue::as_bool) {
            Some(true) => Ok(()),
            _ => {
                tracing::debug!(
                    resource,
                    error = body.get("error").and_then(JsonValue::as_str).unwrap_or(""),
                    "delete rejected"
                );
                Err(StreakError::DeleteFailed { resource })
            }
        }
    }
}

/// Percent-encode a key for use as one path segment.
fn segment(key: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(key)
}

fn require_key(key: &str, resource: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StreakError::InvalidArgument(format!(
            "empty {resource} key, please supply one"
        )));
    }
    Ok(())
}

/// JSON-decode a body. Non-JSON bodies on error statuses keep the raw text.
fn decode_body(response: &HttpResponse) -> Result<JsonValue> {
    serde_json::from_str(&response.body).map_err(|e| {
        if response.is_success() {
            StreakError::Deserialization(e.to_string())
        } else {
            StreakError::HttpError {
                status: response.status,
                body: response.body.clone(),
            }
        }
    })
}

/// Fail when an object body carries the error marker, whatever its value.
fn check_error_marker(body: &JsonValue) -> Result<()> {
    let Some(object) = body.as_object() else {
        return Ok(());
    };
    if !object.contains_key(ERROR_MARKER_KEY) {
        return Ok(());
    }
    let message = object
        .get("error")
        .and_then(JsonValue::as_str)
        .unwrap_or("unknown error")
        .to_string();
    Err(StreakError::Api { message })
}

/// Encode params as `application/x-www-form-urlencoded`. Non-string values
/// are sent as their JSON text.
fn encode_form<P: Serialize>(params: &P) -> Result<String> {
    let value =
        serde_json::to_value(params).map_err(|e| StreakError::Serialization(e.to_string()))?;
    let JsonValue::Object(fields) = value else {
        return Err(StreakError::Serialization(format!(
            "form parameters must be an object, got {}",
            json_kind(&value)
        )));
    };
    let pairs: Vec<String> = fields
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let text = match value {
                JsonValue::String(text) => text.clone(),
                other => other.to_string(),
            };
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(&text))
        })
        .collect();
    Ok(pairs.join("&"))
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
