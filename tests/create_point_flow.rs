use crux_core::testing::{AppTester, Update};
use crux_core::Request;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};

use ecoponto_core::{
    CreatePoint, Effect, Event, FormField, Model, NoticeKind, DEFAULT_GEO_BASE,
};

const ITEMS_JSON: &str = r#"[
    { "id": 1, "title": "Lamps", "image_url": "http://localhost:3333/uploads/lamps.svg" },
    { "id": 2, "title": "Batteries", "image_url": "http://localhost:3333/uploads/batteries.svg" },
    { "id": 3, "title": "Paper", "image_url": "http://localhost:3333/uploads/paper.svg" }
]"#;

const STATES_JSON: &str = r#"[
    { "sigla": "SP", "nome": "São Paulo" },
    { "sigla": "RJ", "nome": "Rio de Janeiro" },
    { "sigla": "SC", "nome": "Santa Catarina" }
]"#;

const SC_CITIES_JSON: &str = r#"[
    { "nome": "Florianópolis" },
    { "nome": "Lages" },
    { "nome": "Criciúma" }
]"#;

fn http_requests(update: Update<Effect, Event>) -> Vec<Request<HttpRequest>> {
    update
        .effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .collect()
}

/// Resolves an HTTP request with a 200 response and feeds the resulting
/// events back through the app, returning every effect produced downstream.
fn resolve_ok(
    app: &AppTester<CreatePoint, Effect>,
    model: &mut Model,
    request: &mut Request<HttpRequest>,
    body: &str,
) -> Vec<Effect> {
    let response = HttpResponse::ok().body(body).build();
    let update = app
        .resolve(request, HttpResult::Ok(response))
        .expect("resolve http request");
    drain(app, model, update)
}

fn resolve_err(
    app: &AppTester<CreatePoint, Effect>,
    model: &mut Model,
    request: &mut Request<HttpRequest>,
) -> Vec<Effect> {
    let update = app
        .resolve(
            request,
            HttpResult::Err(crux_http::HttpError::Io("connection reset".to_string())),
        )
        .expect("resolve http request");
    drain(app, model, update)
}

fn drain(
    app: &AppTester<CreatePoint, Effect>,
    model: &mut Model,
    update: Update<Effect, Event>,
) -> Vec<Effect> {
    let mut effects = Vec::new();
    let mut pending = vec![update];
    while let Some(u) = pending.pop() {
        effects.extend(u.effects);
        for event in u.events {
            pending.push(app.update(event, model));
        }
    }
    effects
}

/// Starts the app and resolves both initial loads successfully.
fn started_app() -> (AppTester<CreatePoint, Effect>, Model) {
    let app = AppTester::<CreatePoint, Effect>::default();
    let mut model = Model::default();

    let mut requests = http_requests(app.update(Event::Started, &mut model));
    for request in &mut requests {
        if request.operation.url.ends_with("/items") {
            resolve_ok(&app, &mut model, request, ITEMS_JSON);
        } else {
            resolve_ok(&app, &mut model, request, STATES_JSON);
        }
    }

    (app, model)
}

#[test]
fn started_fetches_catalog_and_states_once() {
    let app = AppTester::<CreatePoint, Effect>::default();
    let mut model = Model::default();

    let requests = http_requests(app.update(Event::Started, &mut model));
    assert_eq!(requests.len(), 2);

    let urls: Vec<&str> = requests
        .iter()
        .map(|r| r.operation.url.as_str())
        .collect();
    assert!(urls.contains(&"http://localhost:3333/items"));
    assert!(urls
        .iter()
        .any(|url| *url == format!("{DEFAULT_GEO_BASE}/estados")));
    assert!(requests.iter().all(|r| r.operation.method == "GET"));

    // A second Started (shell re-mount) must not refetch.
    let repeat = http_requests(app.update(Event::Started, &mut model));
    assert!(repeat.is_empty());
}

#[test]
fn initial_loads_replace_containers_wholesale() {
    let (app, model) = started_app();

    let view = app.view(&model);
    assert_eq!(view.items.len(), 3);
    assert_eq!(view.items[0].title, "Lamps");
    assert!(view.items.iter().all(|tile| !tile.selected));
    // State codes are sorted ascending regardless of response order.
    assert_eq!(view.ufs, vec!["RJ", "SC", "SP"]);
    assert!(!view.is_loading_catalog);
    assert!(!view.is_loading_states);
}

#[test]
fn selecting_a_state_fetches_its_cities() {
    let (app, mut model) = started_app();

    let mut requests = http_requests(app.update(
        Event::UfSelected {
            value: "SC".to_string(),
        },
        &mut model,
    ));
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].operation.url,
        format!("{DEFAULT_GEO_BASE}/estados/SC/municipios")
    );

    resolve_ok(&app, &mut model, &mut requests[0], SC_CITIES_JSON);

    let view = app.view(&model);
    assert_eq!(view.selected_uf, "SC");
    assert_eq!(view.cities, vec!["Florianópolis", "Lages", "Criciúma"]);
}

#[test]
fn selecting_the_sentinel_fetches_nothing() {
    let (app, mut model) = started_app();

    let requests = http_requests(app.update(
        Event::UfSelected {
            value: "0".to_string(),
        },
        &mut model,
    ));
    assert!(requests.is_empty());
    assert_eq!(app.view(&model).selected_uf, "0");
}

#[test]
fn changing_the_state_resets_the_city() {
    let (app, mut model) = started_app();

    let mut requests = http_requests(app.update(
        Event::UfSelected {
            value: "SC".to_string(),
        },
        &mut model,
    ));
    resolve_ok(&app, &mut model, &mut requests[0], SC_CITIES_JSON);
    app.update(
        Event::CitySelected {
            value: "Lages".to_string(),
        },
        &mut model,
    );
    assert_eq!(app.view(&model).selected_city, "Lages");

    app.update(
        Event::UfSelected {
            value: "SP".to_string(),
        },
        &mut model,
    );
    assert_eq!(app.view(&model).selected_city, "0");
}

#[test]
fn stale_cities_response_is_discarded() {
    let (app, mut model) = started_app();

    // Select SP, then RJ before SP's cities arrive.
    let mut sp_requests = http_requests(app.update(
        Event::UfSelected {
            value: "SP".to_string(),
        },
        &mut model,
    ));
    let mut rj_requests = http_requests(app.update(
        Event::UfSelected {
            value: "RJ".to_string(),
        },
        &mut model,
    ));

    // RJ's response lands first, then SP's arrives late.
    resolve_ok(
        &app,
        &mut model,
        &mut rj_requests[0],
        r#"[{ "nome": "Niterói" }, { "nome": "Petrópolis" }]"#,
    );
    resolve_ok(
        &app,
        &mut model,
        &mut sp_requests[0],
        r#"[{ "nome": "Campinas" }, { "nome": "Santos" }]"#,
    );

    // The late SP payload must not clobber the list for the current state.
    let view = app.view(&model);
    assert_eq!(view.selected_uf, "RJ");
    assert_eq!(view.cities, vec!["Niterói", "Petrópolis"]);
}

#[test]
fn register_point_end_to_end() {
    let (app, mut model) = started_app();

    let mut city_requests = http_requests(app.update(
        Event::UfSelected {
            value: "SC".to_string(),
        },
        &mut model,
    ));
    resolve_ok(&app, &mut model, &mut city_requests[0], SC_CITIES_JSON);

    app.update(
        Event::CitySelected {
            value: "Lages".to_string(),
        },
        &mut model,
    );
    app.update(
        Event::MapClicked {
            lat: -28.68,
            lng: -49.39,
        },
        &mut model,
    );
    app.update(Event::ItemToggled { id: 1 }, &mut model);
    app.update(Event::ItemToggled { id: 3 }, &mut model);
    app.update(
        Event::FieldChanged {
            field: FormField::Name,
            value: "ONG X".to_string(),
        },
        &mut model,
    );

    let mut requests = http_requests(app.update(Event::SubmitRequested, &mut model));
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].operation.method, "POST");
    assert_eq!(requests[0].operation.url, "http://localhost:3333/points");
    assert!(app.view(&model).is_submitting);

    let body: serde_json::Value =
        serde_json::from_slice(&requests[0].operation.body).expect("json body");
    assert_eq!(
        body,
        serde_json::json!({
            "name": "ONG X",
            "email": "",
            "whatsapp": "",
            "items": [1, 3],
            "uf": "SC",
            "city": "Lages",
            "latitude": -28.68,
            "longitude": -49.39
        })
    );

    let effects = resolve_ok(&app, &mut model, &mut requests[0], "{}");
    let destination = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::Navigate(request) => Some(request.operation.path.clone()),
            _ => None,
        })
        .expect("navigate effect");
    assert_eq!(destination, "/");

    let view = app.view(&model);
    assert!(!view.is_submitting);
    let notice = view.notice.expect("success notice");
    assert_eq!(notice.kind, NoticeKind::Success);
}

#[test]
fn submit_with_empty_form_is_permissive() {
    let (app, mut model) = started_app();

    let requests = http_requests(app.update(Event::SubmitRequested, &mut model));
    assert_eq!(requests.len(), 1);

    let body: serde_json::Value =
        serde_json::from_slice(&requests[0].operation.body).expect("json body");
    assert_eq!(body["uf"], "0");
    assert_eq!(body["city"], "0");
    assert_eq!(body["latitude"], 0.0);
    assert_eq!(body["items"], serde_json::json!([]));
}

#[test]
fn submit_is_single_flight() {
    let (app, mut model) = started_app();

    let first = http_requests(app.update(Event::SubmitRequested, &mut model));
    assert_eq!(first.len(), 1);

    // A second click while the first POST is in flight is ignored.
    let second = http_requests(app.update(Event::SubmitRequested, &mut model));
    assert!(second.is_empty());
}

#[test]
fn submission_failure_keeps_form_state() {
    let (app, mut model) = started_app();

    app.update(
        Event::FieldChanged {
            field: FormField::Name,
            value: "ONG X".to_string(),
        },
        &mut model,
    );
    app.update(Event::ItemToggled { id: 2 }, &mut model);
    app.update(
        Event::MapClicked {
            lat: -28.68,
            lng: -49.39,
        },
        &mut model,
    );

    let mut requests = http_requests(app.update(Event::SubmitRequested, &mut model));
    let effects = resolve_err(&app, &mut model, &mut requests[0]);

    // No navigation on failure.
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::Navigate(_))));

    let view = app.view(&model);
    assert!(!view.is_submitting);
    assert_eq!(view.name, "ONG X");
    assert_eq!(view.marker_lat, -28.68);
    assert!(view.items.iter().any(|tile| tile.id == 2 && tile.selected));
    let notice = view.notice.expect("failure notice");
    assert_eq!(notice.kind, NoticeKind::SubmissionFailed);
    assert!(notice.is_retryable);

    // The form is immediately resubmittable.
    let retry = http_requests(app.update(Event::SubmitRequested, &mut model));
    assert_eq!(retry.len(), 1);
}

#[test]
fn catalog_failure_surfaces_retryable_notice() {
    let app = AppTester::<CreatePoint, Effect>::default();
    let mut model = Model::default();

    let mut requests = http_requests(app.update(Event::Started, &mut model));
    let items_index = requests
        .iter()
        .position(|r| r.operation.url.ends_with("/items"))
        .expect("items request");

    resolve_err(&app, &mut model, &mut requests[items_index]);
    let states_index = 1 - items_index;
    resolve_ok(&app, &mut model, &mut requests[states_index], STATES_JSON);

    let view = app.view(&model);
    assert!(view.items.is_empty());
    assert_eq!(view.ufs.len(), 3);
    let notice = view.notice.expect("catalog failure notice");
    assert_eq!(notice.kind, NoticeKind::CatalogLoadFailed);
    assert!(notice.is_retryable);

    // Retry re-issues only the load that has not succeeded yet.
    let retry = http_requests(app.update(Event::RetryLoadsRequested, &mut model));
    assert_eq!(retry.len(), 1);
    assert!(retry[0].operation.url.ends_with("/items"));
    assert!(app.view(&model).notice.is_none());
}

#[test]
fn map_clicks_last_one_wins() {
    let (app, mut model) = started_app();

    app.update(
        Event::MapClicked {
            lat: -27.59,
            lng: -48.55,
        },
        &mut model,
    );
    app.update(
        Event::MapClicked {
            lat: -28.68,
            lng: -49.39,
        },
        &mut model,
    );

    let view = app.view(&model);
    assert_eq!(view.marker_lat, -28.68);
    assert_eq!(view.marker_lng, -49.39);
}

#[test]
fn invalid_map_click_keeps_previous_pin() {
    let (app, mut model) = started_app();

    app.update(
        Event::MapClicked {
            lat: -28.68,
            lng: -49.39,
        },
        &mut model,
    );
    app.update(
        Event::MapClicked {
            lat: 91.0,
            lng: 0.0,
        },
        &mut model,
    );

    let view = app.view(&model);
    assert_eq!(view.marker_lat, -28.68);
    let notice = view.notice.expect("validation notice");
    assert_eq!(notice.kind, NoticeKind::InvalidInput);
}

#[test]
fn configure_endpoints_redirects_requests() {
    let app = AppTester::<CreatePoint, Effect>::default();
    let mut model = Model::default();

    app.update(
        Event::ConfigureEndpoints {
            api_base: "https://api.ecoponto.example".to_string(),
            geo_base: "https://geo.ecoponto.example/v1".to_string(),
        },
        &mut model,
    );

    let requests = http_requests(app.update(Event::Started, &mut model));
    let urls: Vec<&str> = requests
        .iter()
        .map(|r| r.operation.url.as_str())
        .collect();
    assert!(urls.contains(&"https://api.ecoponto.example/items"));
    assert!(urls.contains(&"https://geo.ecoponto.example/v1/estados"));
}
