//! Resource operations over a `Transport`.
//!
//! # Design
//! `Connection` pairs the stateless `StreakClient` with a transport and runs
//! the build → execute → parse sequence for each operation. Creates and
//! edits are two calls: the write, then a read of the written record by the
//! key the write response returned. A failed read after a successful write
//! surfaces as `StreakError::Refetch`.

use tracing::{debug, info, instrument, warn};

use crate::client::StreakClient;
use crate::error::{Result, StreakError};
use crate::http::{HttpRequest, HttpResponse};
use crate::settings::Settings;
use crate::transport::Transport;
use crate::types::{
    BoxParams, Field, FieldParams, FieldScope, Pipeline, PipelineParams, Stage, StageParams,
    StreakBox, User, Value, ValueParams,
};

/// An authenticated handle on the Streak API.
///
/// Holds no per-call state; share it by reference.
#[derive(Debug, Clone)]
pub struct Connection<T> {
    client: StreakClient,
    transport: T,
}

#[cfg(feature = "ureq")]
impl Connection<crate::transport::UreqTransport> {
    /// Connect with the default blocking transport.
    pub fn new(settings: &Settings) -> Self {
        Self::with_transport(settings, crate::transport::UreqTransport::new())
    }
}

impl<T: Transport> Connection<T> {
    pub fn with_transport(settings: &Settings, transport: T) -> Self {
        if settings.uses_placeholder_key() {
            warn!("connecting with the placeholder API key");
        }
        Self {
            client: StreakClient::new(settings),
            transport,
        }
    }

    pub fn client(&self) -> &StreakClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = request.method.as_str(), url = %request.url, "api request");
        let response = self.transport.execute(request)?;
        debug!(status = response.status, "api response");
        Ok(response)
    }

    fn refetch<R>(&self, key: String, fetch: impl FnOnce(&str) -> Result<R>) -> Result<R> {
        fetch(&key).map_err(|source| {
            warn!(key = %key, error = %source, "write succeeded but refetch failed");
            StreakError::Refetch {
                key,
                source: Box::new(source),
            }
        })
    }

    // ---- users ----

    /// The user the API key belongs to.
    #[instrument(skip(self))]
    pub fn get_current_user(&self) -> Result<User> {
        let response = self.send(self.client.build_get_current_user())?;
        self.client.parse_record(response)
    }

    #[instrument(skip(self))]
    pub fn get_user(&self, user_key: &str) -> Result<User> {
        let response = self.send(self.client.build_get_user(user_key))?;
        self.client.parse_record(response)
    }

    // ---- pipelines ----

    #[instrument(skip(self))]
    pub fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
        let response = self.send(self.client.build_list_pipelines())?;
        self.client.parse_list(response)
    }

    /// Fails with `InvalidArgument` on an empty key without sending anything.
    #[instrument(skip(self))]
    pub fn get_pipeline(&self, pipeline_key: &str) -> Result<Pipeline> {
        let request = self.client.build_get_pipeline(pipeline_key)?;
        self.client.parse_record(self.send(request)?)
    }

    #[instrument(skip(self, params))]
    pub fn create_pipeline(&self, params: &PipelineParams) -> Result<Pipeline> {
        let request = self.client.build_create_pipeline(params)?;
        let key = self
            .client
            .parse_written_key(self.send(request)?, "pipelineKey")?;
        info!(pipeline_key = %key, "pipeline created");
        self.refetch(key, |key| self.get_pipeline(key))
    }

    #[instrument(skip(self, params))]
    pub fn edit_pipeline(&self, pipeline_key: &str, params: &PipelineParams) -> Result<Pipeline> {
        let request = self.client.build_edit_pipeline(pipeline_key, params)?;
        let key = self
            .client
            .parse_written_key(self.send(request)?, "pipelineKey")?;
        info!(pipeline_key = %key, "pipeline updated");
        self.refetch(key, |key| self.get_pipeline(key))
    }

    #[instrument(skip(self))]
    pub fn delete_pipeline(&self, pipeline_key: &str) -> Result<()> {
        let response = self.send(self.client.build_delete_pipeline(pipeline_key))?;
        self.client.parse_delete(response, "pipeline")?;
        info!("pipeline deleted");
        Ok(())
    }

    // ---- boxes ----

    /// Every box visible to the user, across pipelines.
    #[instrument(skip(self))]
    pub fn list_boxes(&self) -> Result<Vec<StreakBox>> {
        let response = self.send(self.client.build_list_boxes())?;
        self.client.parse_list(response)
    }

    #[instrument(skip(self))]
    pub fn list_boxes_in_pipeline(&self, pipeline_key: &str) -> Result<Vec<StreakBox>> {
        let response = self.send(self.client.build_list_boxes_in_pipeline(pipeline_key))?;
        self.client.parse_list(response)
    }

    /// Fails with `InvalidArgument` on an empty key without sending anything.
    #[instrument(skip(self))]
    pub fn get_box(&self, box_key: &str) -> Result<StreakBox> {
        let request = self.client.build_get_box(box_key)?;
        self.client.parse_record(self.send(request)?)
    }

    #[instrument(skip(self, params))]
    pub fn create_box(&self, pipeline_key: &str, params: &BoxParams) -> Result<StreakBox> {
        let request = self.client.build_create_box(pipeline_key, params)?;
        let key = self.client.parse_written_key(self.send(request)?, "boxKey")?;
        info!(box_key = %key, "box created");
        self.refetch(key, |key| self.get_box(key))
    }

    #[instrument(skip(self, params))]
    pub fn edit_box(&self, box_key: &str, params: &BoxParams) -> Result<StreakBox> {
        let request = self.client.build_edit_box(box_key, params)?;
        let key = self.client.parse_written_key(self.send(request)?, "boxKey")?;
        info!(box_key = %key, "box updated");
        self.refetch(key, |key| self.get_box(key))
    }

    #[instrument(skip(self))]
    pub fn delete_box(&self, box_key: &str) -> Result<()> {
        let response = self.send(self.client.build_delete_box(box_key))?;
        self.client.parse_delete(response, "box")?;
        info!("box deleted");
        Ok(())
    }

    // ---- stages ----

    #[instrument(skip(self))]
    pub fn list_stages(&self, pipeline_key: &str) -> Result<Vec<Stage>> {
        let response = self.send(self.client.build_list_stages(pipeline_key))?;
        let mut stages: Vec<Stage> = self.client.parse_keyed_map(response)?;
        for stage in &mut stages {
            stage.pipeline_key = pipeline_key.to_string();
        }
        Ok(stages)
    }

    #[instrument(skip(self))]
    pub fn get_stage(&self, pipeline_key: &str, stage_key: &str) -> Result<Stage> {
        let response = self.send(self.client.build_get_stage(pipeline_key, stage_key))?;
        let mut stage: Stage = self.client.parse_record(response)?;
        stage.pipeline_key = pipeline_key.to_string();
        Ok(stage)
    }

    #[instrument(skip(self, params))]
    pub fn create_stage(&self, pipeline_key: &str, params: &StageParams) -> Result<Stage> {
        let request = self.client.build_create_stage(pipeline_key, params)?;
        let key = self.client.parse_written_key(self.send(request)?, "key")?;
        info!(stage_key = %key, "stage created");
        self.refetch(key, |key| self.get_stage(pipeline_key, key))
    }

    #[instrument(skip(self, params))]
    pub fn edit_stage(
        &self,
        pipeline_key: &str,
        stage_key: &str,
        params: &StageParams,
    ) -> Result<Stage> {
        let request = self.client.build_edit_stage(pipeline_key, stage_key, params)?;
        let key = self.client.parse_written_key(self.send(request)?, "key")?;
        info!(stage_key = %key, "stage updated");
        self.refetch(key, |key| self.get_stage(pipeline_key, key))
    }

    #[instrument(skip(self))]
    pub fn delete_stage(&self, pipeline_key: &str, stage_key: &str) -> Result<()> {
        let response = self.send(self.client.build_delete_stage(pipeline_key, stage_key))?;
        self.client.parse_delete(response, "stage")?;
        info!("stage deleted");
        Ok(())
    }

    // ---- fields ----

    #[instrument(skip(self))]
    pub fn list_fields(&self, pipeline_key: &str) -> Result<Vec<Field>> {
        let response = self.send(self.client.build_list_fields(pipeline_key))?;
        let mut fields: Vec<Field> = self.client.parse_list(response)?;
        for field in &mut fields {
            field.scope = FieldScope::Pipeline(pipeline_key.to_string());
        }
        Ok(fields)
    }

    #[instrument(skip(self))]
    pub fn get_field(&self, pipeline_key: &str, field_key: &str) -> Result<Field> {
        let response = self.send(self.client.build_get_field(pipeline_key, field_key))?;
        let mut field: Field = self.client.parse_record(response)?;
        field.scope = FieldScope::Pipeline(pipeline_key.to_string());
        Ok(field)
    }

    #[instrument(skip(self, params))]
    pub fn create_field(&self, pipeline_key: &str, params: &FieldParams) -> Result<Field> {
        let request = self.client.build_create_field(pipeline_key, params)?;
        let key = self.client.parse_written_key(self.send(request)?, "key")?;
        info!(field_key = %key, "field created");
        self.refetch(key, |key| self.get_field(pipeline_key, key))
    }

    #[instrument(skip(self, params))]
    pub fn edit_field(
        &self,
        pipeline_key: &str,
        field_key: &str,
        params: &FieldParams,
    ) -> Result<Field> {
        let request = self.client.build_edit_field(pipeline_key, field_key, params)?;
        let key = self.client.parse_written_key(self.send(request)?, "key")?;
        info!(field_key = %key, "field updated");
        self.refetch(key, |key| self.get_field(pipeline_key, key))
    }

    #[instrument(skip(self))]
    pub fn delete_field(&self, pipeline_key: &str, field_key: &str) -> Result<()> {
        let response = self.send(self.client.build_delete_field(pipeline_key, field_key))?;
        self.client.parse_delete(response, "field")?;
        info!("field deleted");
        Ok(())
    }

    /// The box's field entries read as `Field` records, scoped to the box.
    #[instrument(skip(self))]
    pub fn list_box_fields(&self, box_key: &str) -> Result<Vec<Field>> {
        let response = self.send(self.client.build_list_box_fields(box_key))?;
        let mut fields: Vec<Field> = self.client.parse_list(response)?;
        for field in &mut fields {
            field.scope = FieldScope::Box(box_key.to_string());
        }
        Ok(fields)
    }

    // ---- values ----

    #[instrument(skip(self))]
    pub fn list_values(&self, box_key: &str) -> Result<Vec<Value>> {
        let response = self.send(self.client.build_list_box_fields(box_key))?;
        let mut values: Vec<Value> = self.client.parse_list(response)?;
        for value in &mut values {
            value.box_key = box_key.to_string();
        }
        Ok(values)
    }

    #[instrument(skip(self))]
    pub fn get_value(&self, box_key: &str, field_key: &str) -> Result<Value> {
        let response = self.send(self.client.build_get_value(box_key, field_key))?;
        let mut value: Value = self.client.parse_record(response)?;
        value.box_key = box_key.to_string();
        Ok(value)
    }

    #[instrument(skip(self, params))]
    pub fn edit_value(&self, box_key: &str, field_key: &str, params: &ValueParams) -> Result<Value> {
        let request = self.client.build_edit_value(box_key, field_key, params)?;
        let key = self.client.parse_written_key(self.send(request)?, "key")?;
        info!(field_key = %key, "value updated");
        self.refetch(key, |key| self.get_value(box_key, key))
    }
}

impl Pipeline {
    pub fn delete<T: Transport>(&self, connection: &Connection<T>) -> Result<()> {
        connection.delete_pipeline(&self.pipeline_key)
    }
}

impl StreakBox {
    pub fn delete<T: Transport>(&self, connection: &Connection<T>) -> Result<()> {
        connection.delete_box(&self.box_key)
    }
}

impl Stage {
    pub fn delete<T: Transport>(&self, connection: &Connection<T>) -> Result<()> {
        connection.delete_stage(&self.pipeline_key, &self.key)
    }
}

impl Field {
    /// Only fields fetched through their pipeline know where to delete from.
    pub fn delete<T: Transport>(&self, connection: &Connection<T>) -> Result<()> {
        match &self.scope {
            FieldScope::Pipeline(pipeline_key) => connection.delete_field(pipeline_key, &self.key),
            FieldScope::Box(box_key) => Err(StreakError::InvalidArgument(format!(
                "field {} was read through box {box_key}; delete it through its pipeline",
                self.key
            ))),
        }
    }
}
