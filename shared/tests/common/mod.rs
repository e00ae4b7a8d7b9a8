#![allow(dead_code)]

use crux_core::testing::{AppTester, Update};
use crux_core::Request;
use serde_json::{json, Value};
use std::collections::HashMap;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use transit_shared::{App, Effect, Event, Model};
use url::Url;

pub type Tester = AppTester<App, Effect>;

pub fn http_requests(update: Update<Effect, Event>) -> Vec<Request<HttpRequest>> {
    update
        .effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Http(request) => Some(request),
            Effect::Render(_) => None,
        })
        .collect()
}

pub fn single_request(update: Update<Effect, Event>) -> Request<HttpRequest> {
    let mut requests = http_requests(update);
    assert_eq!(requests.len(), 1, "expected exactly one HTTP request");
    requests.remove(0)
}

pub fn url_of(request: &Request<HttpRequest>) -> Url {
    Url::parse(&request.operation.url).expect("request URL parses")
}

pub fn header_of<'a>(request: &'a Request<HttpRequest>, name: &str) -> Option<&'a str> {
    request
        .operation
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

pub fn query_of(request: &Request<HttpRequest>) -> HashMap<String, String> {
    url_of(request).query_pairs().into_owned().collect()
}

/// Resolves `request` and feeds the resulting event back through the app,
/// returning the update that event produced.
pub fn resolve(
    app: &Tester,
    model: &mut Model,
    mut request: Request<HttpRequest>,
    result: HttpResult,
) -> Update<Effect, Event> {
    let update = app
        .resolve(&mut request, result)
        .expect("request should resolve");
    let mut events = update.events.into_iter();
    let event = events.next().expect("resolution should produce an event");
    assert!(events.next().is_none());
    app.update(event, model)
}

pub fn ok(body: &Value) -> HttpResult {
    HttpResult::Ok(HttpResponse::ok().json(body).build())
}

pub fn status(code: u16) -> HttpResult {
    HttpResult::Ok(HttpResponse::status(code).build())
}

pub fn timeout() -> HttpResult {
    HttpResult::Err(crux_http::Error::Timeout)
}

pub fn vehicle_json(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "type": "vehicle",
        "attributes": {
            "current_status": status,
            "label": format!("l{id}"),
            "latitude": 42.35,
            "longitude": -71.06,
            "updated_at": "2024-03-05T14:02:11-05:00"
        },
        "relationships": {
            "route": { "data": { "id": "Red", "type": "route" } },
            "trip": { "data": { "id": "t1", "type": "trip" } }
        }
    })
}

pub fn vehicle_page(ids: std::ops::Range<usize>) -> Value {
    let data: Vec<Value> = ids
        .map(|i| vehicle_json(&format!("v{i}"), "IN_TRANSIT_TO"))
        .collect();
    json!({ "data": data })
}

pub fn routes_json() -> Value {
    json!({ "data": [
        { "id": "Red", "type": "route", "attributes": { "long_name": "Red Line" } },
        { "id": "Blue", "type": "route", "attributes": { "long_name": "Blue Line" } }
    ]})
}

pub fn trips_json() -> Value {
    json!({ "data": [
        { "id": "t1", "type": "trip", "attributes": { "headsign": "Alewife", "block_id": "B1" } },
        { "id": "t2", "type": "trip", "attributes": { "headsign": "Ashmont", "block_id": "B2" } }
    ]})
}

/// Mounts the screen, answers the route catalogue and the first page with
/// `first_page` vehicles.
pub fn mounted_with(app: &Tester, model: &mut Model, first_page: usize) {
    let routes = single_request(app.update(Event::ScreenMounted, model));
    assert_eq!(url_of(&routes).path(), "/routes");
    let vehicles = single_request(resolve(app, model, routes, ok(&routes_json())));
    assert_eq!(url_of(&vehicles).path(), "/vehicles");
    let update = resolve(app, model, vehicles, ok(&vehicle_page(0..first_page)));
    assert!(http_requests(update).is_empty());
}
