//! Synchronous client for the Streak CRM REST API.
//!
//! # Overview
//! Pipelines, boxes, stages, fields, field values, and users, reached
//! through a [`Connection`]:
//!
//! ```no_run
//! use streak_core::{Connection, PipelineParams, Settings};
//!
//! # fn main() -> streak_core::Result<()> {
//! let conn = Connection::new(&Settings::from_env());
//! let pipeline = conn.create_pipeline(&PipelineParams::named("Sales"))?;
//! for stage in conn.list_stages(&pipeline.pipeline_key)? {
//!     println!("{stage}");
//! }
//! pipeline.delete(&conn)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - `StreakClient` builds `HttpRequest` values and parses `HttpResponse`
//!   values without doing I/O; `Transport` executes them. `Connection` ties
//!   the two together, so tests and embedders can swap the transport.
//! - Records are typed structs; unnamed response fields land in `extra`.
//! - Records hold no connection. Helpers like `Pipeline::delete` take it as
//!   an argument.
//! - Every failure, transport included, is a `StreakError`.

pub mod auth;
pub mod client;
pub mod connection;
pub mod error;
pub mod http;
pub mod settings;
pub mod transport;
pub mod types;

pub use client::StreakClient;
pub use connection::Connection;
pub use error::{Result, StreakError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use settings::Settings;
pub use transport::Transport;
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use types::{
    BoxParams, Field, FieldParams, FieldScope, Pipeline, PipelineParams, Stage, StageParams,
    StreakBox, User, Value, ValueParams,
};
