#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use app::CreatePoint;
pub use capabilities::{Capabilities, Effect};
pub use crux_core::{render::Render, App as CruxApp};

/// Dropdown placeholder value meaning "no selection made".
pub const UNSELECTED: &str = "0";

pub const DEFAULT_API_BASE: &str = "http://localhost:3333";
pub const DEFAULT_GEO_BASE: &str = "https://servicodados.ibge.gov.br/api/v1/localidades";

pub const ROOT_PATH: &str = "/";

pub const MAP_CENTER_LAT: f64 = -28.686777;
pub const MAP_CENTER_LNG: f64 = -49.393472;
pub const MAP_ZOOM: f64 = 13.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Validation,
    Serialization,
    Deserialization,
    NotFound,
    RateLimited,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Validation => "VALIDATION_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::RateLimited | Self::Internal => {
                ErrorSeverity::Transient
            }
            Self::Validation
            | Self::Serialization
            | Self::Deserialization
            | Self::NotFound
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimited | Self::Internal
        )
    }
}

/// Application-level error carried into notices and telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn from_http_status(status: u16) -> Self {
        let kind = match status {
            400 => ErrorKind::Validation,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::Timeout,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::Internal,
            _ => ErrorKind::Unknown,
        };
        Self::new(kind, format!("HTTP error: {status}"))
    }

    #[must_use]
    pub fn from_transport(error: &crux_http::HttpError) -> Self {
        match error {
            crux_http::HttpError::Http { code, .. } => Self::from_http_status(u16::from(*code)),
            crux_http::HttpError::Json(message) => {
                Self::new(ErrorKind::Deserialization, message.clone())
            }
            crux_http::HttpError::Url(message) => Self::new(ErrorKind::Validation, message.clone()),
            crux_http::HttpError::Io(message) => Self::new(ErrorKind::Network, message.clone()),
            crux_http::HttpError::Timeout => Self::new(ErrorKind::Timeout, "Request timed out"),
        }
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::Serialization | ErrorKind::Deserialization => {
                "A data error occurred. Please try again later.".into()
            }
            ErrorKind::NotFound => "The requested data could not be found.".into(),
            ErrorKind::RateLimited => {
                "Too many requests. Please wait a moment and try again.".into()
            }
            ErrorKind::Internal | ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordinateError {
    #[error("Latitude {0} is out of valid range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("Longitude {0} is out of valid range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("Coordinate value is not finite (NaN or Infinity)")]
    NonFinite,
}

impl From<CoordinateError> for AppError {
    fn from(e: CoordinateError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

/// Raw latitude/longitude pair as delivered by map clicks and sent on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(self) -> Result<ValidatedCoordinate, CoordinateError> {
        ValidatedCoordinate::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidatedCoordinate {
    lat: f64,
    lng: f64,
}

impl ValidatedCoordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(CoordinateError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lng(self) -> f64 {
        self.lng
    }
}

impl From<ValidatedCoordinate> for LatLng {
    fn from(coord: ValidatedCoordinate) -> Self {
        Self {
            lat: coord.lat,
            lng: coord.lng,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

/// Endpoints for the two external collaborators. Shells may override the
/// defaults at startup via [`Event::ConfigureEndpoints`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub api_base: String,
    pub geo_base: String,
}

impl ApiConfig {
    pub fn parse(
        api_base: impl Into<String>,
        geo_base: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            api_base: Self::normalize(api_base.into()),
            geo_base: Self::normalize(geo_base.into()),
        };
        Self::validate_base(&config.api_base)?;
        Self::validate_base(&config.geo_base)?;
        Ok(config)
    }

    fn normalize(base: String) -> String {
        base.trim().trim_end_matches('/').to_string()
    }

    fn validate_base(base: &str) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(base).map_err(|e| ConfigError::InvalidBaseUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::InvalidBaseUrl {
                url: base.to_string(),
                reason: format!("invalid scheme '{scheme}', only 'http' and 'https' are allowed"),
            });
        }

        if parsed.host_str().is_none() {
            return Err(ConfigError::InvalidBaseUrl {
                url: base.to_string(),
                reason: "URL must have a host".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            geo_base: DEFAULT_GEO_BASE.to_string(),
        }
    }
}

/// A collectible item category from the backend catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: u32,
    pub title: String,
    pub image_url: String,
}

/// Wire shape of the geography service's state list entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UfResponse {
    pub sigla: String,
}

/// Wire shape of the geography service's city list entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityResponse {
    pub nome: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Name,
    Email,
    Whatsapp,
}

impl FormField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Whatsapp => "whatsapp",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormData {
    pub name: String,
    pub email: String,
    pub whatsapp: String,
}

/// Submission payload; assembled only at submit time, never partially sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePointRequest {
    pub name: String,
    pub email: String,
    pub whatsapp: String,
    pub items: Vec<u32>,
    pub uf: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    CatalogLoadFailed,
    GeographyLoadFailed,
    SubmissionFailed,
    InvalidInput,
}

impl NoticeKind {
    #[must_use]
    pub const fn is_error(self) -> bool {
        !matches!(self, Self::Success)
    }
}

/// Non-blocking user notice. Failure notices carry the event name the shell
/// should emit to retry the offending operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub is_retryable: bool,
    pub retry_event: Option<String>,
}

impl Notice {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
            is_retryable: false,
            retry_event: None,
        }
    }

    #[must_use]
    pub fn catalog_failed(error: &AppError) -> Self {
        Self {
            kind: NoticeKind::CatalogLoadFailed,
            message: error.user_facing_message(),
            is_retryable: true,
            retry_event: Some("retry_loads_requested".into()),
        }
    }

    #[must_use]
    pub fn states_failed(error: &AppError) -> Self {
        Self {
            kind: NoticeKind::GeographyLoadFailed,
            message: error.user_facing_message(),
            is_retryable: true,
            retry_event: Some("retry_loads_requested".into()),
        }
    }

    #[must_use]
    pub fn cities_failed(error: &AppError) -> Self {
        // Re-selecting the state re-issues the city fetch.
        Self {
            kind: NoticeKind::GeographyLoadFailed,
            message: error.user_facing_message(),
            is_retryable: true,
            retry_event: Some("uf_selected".into()),
        }
    }

    #[must_use]
    pub fn submission_failed(error: &AppError) -> Self {
        Self {
            kind: NoticeKind::SubmissionFailed,
            message: error.user_facing_message(),
            is_retryable: true,
            retry_event: Some("submit_requested".into()),
        }
    }

    #[must_use]
    pub fn invalid_input(error: &AppError) -> Self {
        Self {
            kind: NoticeKind::InvalidInput,
            message: error.user_facing_message(),
            is_retryable: false,
            retry_event: None,
        }
    }
}

/// Parses a dropdown value, treating the sentinel and blank values as "no
/// selection".
#[must_use]
pub fn parse_selection(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == UNSELECTED {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub config: ApiConfig,
    pub started: bool,
    pub items: Vec<Item>,
    pub selected_items: Vec<u32>,
    pub ufs: Vec<String>,
    pub selected_uf: Option<String>,
    pub cities: Vec<String>,
    pub selected_city: Option<String>,
    pub form: FormData,
    pub position: LatLng,
    pub city_request_seq: u64,
    pub is_loading_catalog: bool,
    pub is_loading_states: bool,
    pub is_loading_cities: bool,
    pub is_submitting: bool,
    pub notice: Option<Notice>,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            config: ApiConfig::default(),
            started: false,
            items: Vec::new(),
            selected_items: Vec::new(),
            ufs: Vec::new(),
            selected_uf: None,
            cities: Vec::new(),
            selected_city: None,
            form: FormData::default(),
            position: LatLng::default(),
            city_request_seq: 0,
            is_loading_catalog: false,
            is_loading_states: false,
            is_loading_cities: false,
            is_submitting: false,
            notice: None,
        }
    }
}

impl Model {
    pub fn set_field(&mut self, field: FormField, value: String) {
        match field {
            FormField::Name => self.form.name = value,
            FormField::Email => self.form.email = value,
            FormField::Whatsapp => self.form.whatsapp = value,
        }
    }

    /// Membership test first: remove the id when present, append otherwise.
    pub fn toggle_item(&mut self, id: u32) {
        if let Some(index) = self.selected_items.iter().position(|&item| item == id) {
            self.selected_items.remove(index);
        } else {
            self.selected_items.push(id);
        }
    }

    #[must_use]
    pub fn is_item_selected(&self, id: u32) -> bool {
        self.selected_items.contains(&id)
    }

    pub fn show_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    /// Snapshot of everything collected so far. Unselected dropdowns
    /// serialize as the sentinel; the pin defaults to (0, 0). No field is
    /// validated here: the backend is the validator of record.
    #[must_use]
    pub fn submission_payload(&self) -> CreatePointRequest {
        CreatePointRequest {
            name: self.form.name.clone(),
            email: self.form.email.clone(),
            whatsapp: self.form.whatsapp.clone(),
            items: self.selected_items.clone(),
            uf: self
                .selected_uf
                .clone()
                .unwrap_or_else(|| UNSELECTED.to_string()),
            city: self
                .selected_city
                .clone()
                .unwrap_or_else(|| UNSELECTED.to_string()),
            latitude: self.position.lat,
            longitude: self.position.lng,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub enum Event {
    // events from the shell
    Started,
    ConfigureEndpoints {
        api_base: String,
        geo_base: String,
    },
    FieldChanged {
        field: FormField,
        value: String,
    },
    UfSelected {
        value: String,
    },
    CitySelected {
        value: String,
    },
    MapClicked {
        lat: f64,
        lng: f64,
    },
    ItemToggled {
        id: u32,
    },
    SubmitRequested,
    RetryLoadsRequested,
    DismissNotice,

    // events local to the core
    #[serde(skip)]
    CatalogResponse(crux_http::Result<crux_http::Response<Vec<Item>>>),
    #[serde(skip)]
    StatesResponse(crux_http::Result<crux_http::Response<Vec<UfResponse>>>),
    #[serde(skip)]
    CitiesResponse {
        seq: u64,
        result: crux_http::Result<crux_http::Response<Vec<CityResponse>>>,
    },
    #[serde(skip)]
    SubmitResponse(crux_http::Result<crux_http::Response<Vec<u8>>>),
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::ConfigureEndpoints { .. } => "configure_endpoints",
            Self::FieldChanged { .. } => "field_changed",
            Self::UfSelected { .. } => "uf_selected",
            Self::CitySelected { .. } => "city_selected",
            Self::MapClicked { .. } => "map_clicked",
            Self::ItemToggled { .. } => "item_toggled",
            Self::SubmitRequested => "submit_requested",
            Self::RetryLoadsRequested => "retry_loads_requested",
            Self::DismissNotice => "dismiss_notice",
            Self::CatalogResponse(_) => "catalog_response",
            Self::StatesResponse(_) => "states_response",
            Self::CitiesResponse { .. } => "cities_response",
            Self::SubmitResponse(_) => "submit_response",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::FieldChanged { .. }
                | Self::UfSelected { .. }
                | Self::CitySelected { .. }
                | Self::MapClicked { .. }
                | Self::ItemToggled { .. }
                | Self::SubmitRequested
                | Self::RetryLoadsRequested
                | Self::DismissNotice
        )
    }
}

/// A selectable catalog tile; `selected` drives the tile's marker class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTile {
    pub id: u32,
    pub title: String,
    pub image_url: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeView {
    pub kind: NoticeKind,
    pub message: String,
    pub is_retryable: bool,
    pub retry_event: Option<String>,
}

impl From<&Notice> for NoticeView {
    fn from(notice: &Notice) -> Self {
        Self {
            kind: notice.kind,
            message: notice.message.clone(),
            is_retryable: notice.is_retryable,
            retry_event: notice.retry_event.clone(),
        }
    }
}

/// Immutable snapshot of the form surface. Dropdown selections come back as
/// the raw values the shell's selects work with, sentinel included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub name: String,
    pub email: String,
    pub whatsapp: String,
    pub items: Vec<ItemTile>,
    pub ufs: Vec<String>,
    pub selected_uf: String,
    pub cities: Vec<String>,
    pub selected_city: String,
    pub marker_lat: f64,
    pub marker_lng: f64,
    pub map_center_lat: f64,
    pub map_center_lng: f64,
    pub map_zoom: f64,
    pub is_loading_catalog: bool,
    pub is_loading_states: bool,
    pub is_loading_cities: bool,
    pub is_submitting: bool,
    pub notice: Option<NoticeView>,
}

pub mod app {
    use super::{
        parse_selection, ApiConfig, AppError, CityResponse, CreatePointRequest, ErrorKind, Event,
        Item, ItemTile, Model, Notice, NoticeView, UfResponse, ValidatedCoordinate, ViewModel,
        MAP_CENTER_LAT, MAP_CENTER_LNG, MAP_ZOOM, ROOT_PATH, UNSELECTED,
    };
    use crate::capabilities::Capabilities;

    #[derive(Default)]
    pub struct CreatePoint;

    impl CreatePoint {
        fn send_catalog_request(model: &mut Model, caps: &Capabilities) {
            model.is_loading_catalog = true;
            caps.http
                .get(format!("{}/items", model.config.api_base))
                .expect_json::<Vec<Item>>()
                .send(Event::CatalogResponse);
        }

        fn send_states_request(model: &mut Model, caps: &Capabilities) {
            model.is_loading_states = true;
            caps.http
                .get(format!("{}/estados", model.config.geo_base))
                .expect_json::<Vec<UfResponse>>()
                .send(Event::StatesResponse);
        }

        fn send_cities_request(uf: &str, seq: u64, model: &mut Model, caps: &Capabilities) {
            model.is_loading_cities = true;
            caps.http
                .get(format!(
                    "{}/estados/{}/municipios",
                    model.config.geo_base, uf
                ))
                .expect_json::<Vec<CityResponse>>()
                .send(move |result| Event::CitiesResponse { seq, result });
        }

        fn send_submit_request(
            payload: &CreatePointRequest,
            model: &Model,
            caps: &Capabilities,
        ) -> Result<(), AppError> {
            let builder = caps
                .http
                .post(format!("{}/points", model.config.api_base))
                .body_json(payload)
                .map_err(|e| AppError::new(ErrorKind::Serialization, e.to_string()))?;

            builder.send(Event::SubmitResponse);
            Ok(())
        }

        /// Unwraps a decoded list response, folding non-success statuses and
        /// transport failures into one error path.
        fn decode_list<T>(
            result: crux_http::Result<crux_http::Response<Vec<T>>>,
        ) -> Result<Vec<T>, AppError> {
            match result {
                Ok(mut response) => {
                    if !response.status().is_success() {
                        return Err(AppError::from_http_status(u16::from(response.status())));
                    }
                    response.take_body().ok_or_else(|| {
                        AppError::new(ErrorKind::Deserialization, "Response body missing")
                    })
                }
                Err(e) => Err(AppError::from_transport(&e)),
            }
        }

        fn report_failure(operation: &str, error: &AppError, caps: &Capabilities) {
            caps.telemetry.error(operation, &error.to_string());
        }
    }

    impl crux_core::App for CreatePoint {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            let event_name = event.name();
            caps.telemetry.counter(&format!("event.{event_name}"), 1);

            if event.is_user_initiated() {
                caps.telemetry
                    .event("user_action", &[("event", event_name)]);
            }

            match event {
                Event::Started => {
                    // Reference data loads exactly once; a repeated Started
                    // (shell re-mount) is a no-op.
                    if model.started {
                        caps.telemetry.counter("started.ignored_repeat", 1);
                        return;
                    }
                    model.started = true;

                    Self::send_catalog_request(model, caps);
                    Self::send_states_request(model, caps);
                    caps.render.render();
                }

                Event::ConfigureEndpoints { api_base, geo_base } => {
                    match ApiConfig::parse(api_base, geo_base) {
                        Ok(config) => {
                            model.config = config;
                            caps.telemetry.event("endpoints_configured", &[]);
                        }
                        Err(e) => {
                            let error = AppError::from(e);
                            Self::report_failure("configure_endpoints", &error, caps);
                            model.show_notice(Notice::invalid_input(&error));
                        }
                    }
                    caps.render.render();
                }

                Event::FieldChanged { field, value } => {
                    model.set_field(field, value);
                    caps.render.render();
                }

                Event::CatalogResponse(result) => {
                    model.is_loading_catalog = false;
                    match Self::decode_list(result) {
                        Ok(items) => {
                            model.items = items;
                        }
                        Err(e) => {
                            Self::report_failure("catalog_load", &e, caps);
                            model.show_notice(Notice::catalog_failed(&e));
                        }
                    }
                    caps.render.render();
                }

                Event::StatesResponse(result) => {
                    model.is_loading_states = false;
                    match Self::decode_list(result) {
                        Ok(states) => {
                            let mut initials: Vec<String> =
                                states.into_iter().map(|uf| uf.sigla).collect();
                            initials.sort();
                            model.ufs = initials;
                        }
                        Err(e) => {
                            Self::report_failure("states_load", &e, caps);
                            model.show_notice(Notice::states_failed(&e));
                        }
                    }
                    caps.render.render();
                }

                Event::UfSelected { value } => {
                    // Every change invalidates any in-flight city request:
                    // its response will carry a stale sequence number.
                    model.city_request_seq += 1;
                    model.selected_uf = parse_selection(&value);
                    model.selected_city = None;

                    match model.selected_uf.clone() {
                        Some(uf) => {
                            let seq = model.city_request_seq;
                            Self::send_cities_request(&uf, seq, model, caps);
                        }
                        None => {
                            // Sentinel: no fetch, stale city list may remain.
                            model.is_loading_cities = false;
                        }
                    }
                    caps.render.render();
                }

                Event::CitiesResponse { seq, result } => {
                    if seq != model.city_request_seq {
                        caps.telemetry.counter("cities.stale_discarded", 1);
                        return;
                    }
                    model.is_loading_cities = false;
                    match Self::decode_list(result) {
                        Ok(cities) => {
                            model.cities = cities.into_iter().map(|city| city.nome).collect();
                        }
                        Err(e) => {
                            Self::report_failure("cities_load", &e, caps);
                            model.show_notice(Notice::cities_failed(&e));
                        }
                    }
                    caps.render.render();
                }

                Event::CitySelected { value } => {
                    model.selected_city = parse_selection(&value);
                    caps.render.render();
                }

                Event::MapClicked { lat, lng } => {
                    match ValidatedCoordinate::new(lat, lng) {
                        Ok(coord) => {
                            // Last click wins.
                            model.position = coord.into();
                        }
                        Err(e) => {
                            let error = AppError::from(e);
                            Self::report_failure("map_click", &error, caps);
                            model.show_notice(Notice::invalid_input(&error));
                        }
                    }
                    caps.render.render();
                }

                Event::ItemToggled { id } => {
                    model.toggle_item(id);
                    caps.render.render();
                }

                Event::SubmitRequested => {
                    if model.is_submitting {
                        caps.telemetry.counter("submit.ignored_in_flight", 1);
                        return;
                    }

                    let payload = model.submission_payload();
                    let item_count = payload.items.len().to_string();
                    match Self::send_submit_request(&payload, model, caps) {
                        Ok(()) => {
                            model.is_submitting = true;
                            caps.telemetry
                                .event("point_submitted", &[("item_count", item_count.as_str())]);
                        }
                        Err(e) => {
                            Self::report_failure("submit", &e, caps);
                            model.show_notice(Notice::submission_failed(&e));
                        }
                    }
                    caps.render.render();
                }

                Event::SubmitResponse(result) => {
                    model.is_submitting = false;
                    let outcome = match result {
                        Ok(response) if response.status().is_success() => Ok(()),
                        Ok(response) => {
                            Err(AppError::from_http_status(u16::from(response.status())))
                        }
                        Err(e) => Err(AppError::from_transport(&e)),
                    };

                    match outcome {
                        Ok(()) => {
                            model.show_notice(Notice::success("Collection point registered"));
                            caps.telemetry.event("point_created", &[]);
                            caps.navigate.to(ROOT_PATH);
                        }
                        Err(e) => {
                            // All form state stays intact for retry.
                            Self::report_failure("submit", &e, caps);
                            model.show_notice(Notice::submission_failed(&e));
                        }
                    }
                    caps.render.render();
                }

                Event::RetryLoadsRequested => {
                    model.clear_notice();
                    if model.items.is_empty() && !model.is_loading_catalog {
                        Self::send_catalog_request(model, caps);
                    }
                    if model.ufs.is_empty() && !model.is_loading_states {
                        Self::send_states_request(model, caps);
                    }
                    caps.render.render();
                }

                Event::DismissNotice => {
                    model.clear_notice();
                    caps.render.render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            let items = model
                .items
                .iter()
                .map(|item| ItemTile {
                    id: item.id,
                    title: item.title.clone(),
                    image_url: item.image_url.clone(),
                    selected: model.is_item_selected(item.id),
                })
                .collect();

            ViewModel {
                name: model.form.name.clone(),
                email: model.form.email.clone(),
                whatsapp: model.form.whatsapp.clone(),
                items,
                ufs: model.ufs.clone(),
                selected_uf: model
                    .selected_uf
                    .clone()
                    .unwrap_or_else(|| UNSELECTED.to_string()),
                cities: model.cities.clone(),
                selected_city: model
                    .selected_city
                    .clone()
                    .unwrap_or_else(|| UNSELECTED.to_string()),
                marker_lat: model.position.lat,
                marker_lng: model.position.lng,
                map_center_lat: MAP_CENTER_LAT,
                map_center_lng: MAP_CENTER_LNG,
                map_zoom: MAP_ZOOM,
                is_loading_catalog: model.is_loading_catalog,
                is_loading_states: model.is_loading_states,
                is_loading_cities: model.is_loading_cities,
                is_submitting: model.is_submitting,
                notice: model.notice.as_ref().map(NoticeView::from),
            }
        }
    }
}
