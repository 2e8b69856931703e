//! Typed capabilities through which the core requests side effects from the
//! shell: HTTP, rendering, navigation and telemetry.

pub mod navigate;
pub mod telemetry;

pub use navigate::{Navigate, NavigateOperation};
pub use telemetry::{Telemetry, TelemetryOperation};

use crux_core::render::Render;
use crux_http::Http;

use crate::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
    pub navigate: Navigate<Event>,
    pub telemetry: Telemetry<Event>,
}
