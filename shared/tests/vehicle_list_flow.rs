mod common;

use assert_matches::assert_matches;
use common::*;
use crux_core::testing::AppTester;
use transit_shared::config::ApiConfig;
use transit_shared::event::{RouteId, TripId};
use transit_shared::model::{FetchMode, Phase};
use transit_shared::{App, Effect, Event, Model, ToastKind};

#[test]
fn mount_loads_routes_then_first_page() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::ScreenMounted, &mut model);
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Render(_))));
    let routes = single_request(update);
    assert_eq!(url_of(&routes).path(), "/routes");
    assert!(app.view(&model).is_fetching);

    let vehicles = single_request(resolve(&app, &mut model, routes, ok(&routes_json())));
    let query = query_of(&vehicles);
    assert_eq!(query.get("page[offset]").map(String::as_str), Some("0"));
    assert_eq!(query.get("page[limit]").map(String::as_str), Some("10"));
    assert!(!query.contains_key("filter[route]"));
    assert!(!query.contains_key("filter[trips]"));

    resolve(&app, &mut model, vehicles, ok(&vehicle_page(0..10)));
    let view = app.view(&model);
    assert_eq!(view.vehicles.len(), 10);
    assert_eq!(view.markers.len(), 10);
    assert_eq!(view.route_filter.options.len(), 2);
    assert_eq!(view.route_filter.options[0].name, "Red Line");
    assert!(!view.trip_filter.enabled);
    assert!(view.can_load_more);
    assert!(!view.is_fetching);
}

#[test]
fn seven_vehicles_exhaust_the_list() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    mounted_with(&app, &mut model, 7);

    let view = app.view(&model);
    assert_eq!(view.vehicles.len(), 7);
    assert_eq!(view.vehicles[0].title, "Bus LV0");
    assert_eq!(view.vehicles[0].status_label, "In Transit");
    assert_eq!(view.vehicles[0].last_update, "05/03/2024");
    assert!(!view.can_load_more);

    let update = app.update(Event::EndReached, &mut model);
    assert!(http_requests(update).is_empty());
}

#[test]
fn load_more_appends_the_next_page() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    mounted_with(&app, &mut model, 10);

    let next = single_request(app.update(Event::EndReached, &mut model));
    assert_eq!(
        query_of(&next).get("page[offset]").map(String::as_str),
        Some("10")
    );
    assert!(app.view(&model).is_loading_more);

    // Still in flight: a second scroll to the end asks for nothing.
    assert!(http_requests(app.update(Event::EndReached, &mut model)).is_empty());

    resolve(&app, &mut model, next, ok(&vehicle_page(10..14)));
    let view = app.view(&model);
    assert_eq!(view.vehicles.len(), 14);
    assert_eq!(view.vehicles[13].id, "v13");
    assert!(!view.can_load_more);
}

#[test]
fn refresh_replaces_the_list() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    mounted_with(&app, &mut model, 10);

    let more = single_request(app.update(Event::EndReached, &mut model));
    resolve(&app, &mut model, more, ok(&vehicle_page(10..12)));
    assert_eq!(model.list.vehicles.len(), 12);

    let refresh = single_request(app.update(Event::RefreshRequested, &mut model));
    assert_eq!(
        query_of(&refresh).get("page[offset]").map(String::as_str),
        Some("0")
    );
    resolve(&app, &mut model, refresh, ok(&vehicle_page(100..110)));

    let view = app.view(&model);
    assert_eq!(view.vehicles.len(), 10);
    assert_eq!(view.vehicles[0].id, "v100");
    assert!(view.can_load_more);
}

#[test]
fn refresh_wins_over_an_in_flight_page() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    mounted_with(&app, &mut model, 10);

    let stale = single_request(app.update(Event::EndReached, &mut model));
    let fresh = single_request(app.update(Event::RefreshRequested, &mut model));

    resolve(&app, &mut model, fresh, ok(&vehicle_page(0..3)));
    resolve(&app, &mut model, stale, ok(&vehicle_page(10..20)));

    assert_eq!(model.list.vehicles.len(), 3);
    assert!(model.list.cursor.exhausted);
    assert_eq!(model.list.phase, Phase::Idle);
}

#[test]
fn route_change_fetches_trips_once_then_vehicles() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    mounted_with(&app, &mut model, 10);

    app.update(
        Event::RoutesSelected(vec![RouteId::new("Red"), RouteId::new("Blue")]),
        &mut model,
    );
    let trips = single_request(app.update(Event::RouteFilterConfirmed, &mut model));
    assert_eq!(url_of(&trips).path(), "/trips");
    assert_eq!(
        query_of(&trips).get("filter[route]").map(String::as_str),
        Some("Red,Blue")
    );
    assert_eq!(model.list.phase, Phase::FetchingTrips);

    let vehicles = single_request(resolve(&app, &mut model, trips, ok(&trips_json())));
    let query = query_of(&vehicles);
    assert_eq!(query.get("filter[route]").map(String::as_str), Some("Red,Blue"));
    assert!(!query.contains_key("filter[trips]"));

    resolve(&app, &mut model, vehicles, ok(&vehicle_page(0..4)));
    let view = app.view(&model);
    assert!(view.trip_filter.enabled);
    assert_eq!(view.trip_filter.options[1].name, "Ashmont - B2");
    assert_eq!(view.route_filter.active_count, 2);
}

#[test]
fn confirming_the_same_selection_fetches_nothing() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    mounted_with(&app, &mut model, 10);

    assert!(http_requests(app.update(Event::RouteFilterConfirmed, &mut model)).is_empty());

    app.update(Event::RoutesSelected(vec![RouteId::new("Red")]), &mut model);
    let trips = single_request(app.update(Event::RouteFilterConfirmed, &mut model));
    let vehicles = single_request(resolve(&app, &mut model, trips, ok(&trips_json())));
    resolve(&app, &mut model, vehicles, ok(&vehicle_page(0..10)));

    app.update(Event::RoutesSelected(vec![RouteId::new("Red")]), &mut model);
    assert!(http_requests(app.update(Event::RouteFilterConfirmed, &mut model)).is_empty());
}

#[test]
fn trip_filter_is_sent_with_its_own_ids() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    mounted_with(&app, &mut model, 10);

    app.update(Event::RoutesSelected(vec![RouteId::new("Red")]), &mut model);
    let trips = single_request(app.update(Event::RouteFilterConfirmed, &mut model));
    let vehicles = single_request(resolve(&app, &mut model, trips, ok(&trips_json())));
    resolve(&app, &mut model, vehicles, ok(&vehicle_page(0..10)));

    app.update(Event::TripsSelected(vec![TripId::new("t2")]), &mut model);
    let filtered = single_request(app.update(Event::TripFilterConfirmed, &mut model));
    let query = query_of(&filtered);
    assert_eq!(query.get("filter[route]").map(String::as_str), Some("Red"));
    assert_eq!(query.get("filter[trips]").map(String::as_str), Some("t2"));
    assert_eq!(query.get("page[offset]").map(String::as_str), Some("0"));
}

#[test]
fn cancelling_routes_clears_trips_and_refetches() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    mounted_with(&app, &mut model, 10);

    // Nothing confirmed yet: cancel only clears the dialog.
    app.update(Event::RoutesSelected(vec![RouteId::new("Red")]), &mut model);
    assert!(http_requests(app.update(Event::RouteFilterCancelled, &mut model)).is_empty());
    assert!(model.list.filters.routes.pending().is_empty());

    app.update(Event::RoutesSelected(vec![RouteId::new("Red")]), &mut model);
    let trips = single_request(app.update(Event::RouteFilterConfirmed, &mut model));
    let vehicles = single_request(resolve(&app, &mut model, trips, ok(&trips_json())));
    resolve(&app, &mut model, vehicles, ok(&vehicle_page(0..10)));
    app.update(Event::TripsSelected(vec![TripId::new("t1")]), &mut model);
    let filtered = single_request(app.update(Event::TripFilterConfirmed, &mut model));
    resolve(&app, &mut model, filtered, ok(&vehicle_page(0..2)));

    let unfiltered = single_request(app.update(Event::RouteFilterCancelled, &mut model));
    let query = query_of(&unfiltered);
    assert!(!query.contains_key("filter[route]"));
    assert!(!query.contains_key("filter[trips]"));
    assert!(model.list.filters.trips.confirmed().is_empty());
    assert!(model.list.filters.trip_options.is_empty());
}

#[test]
fn failed_page_shows_a_toast_and_keeps_the_list() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    mounted_with(&app, &mut model, 10);

    let next = single_request(app.update(Event::EndReached, &mut model));
    resolve(&app, &mut model, next, timeout());

    let view = app.view(&model);
    assert_eq!(view.vehicles.len(), 10);
    assert_eq!(view.phase, Phase::Error(FetchMode::Append));
    let toast = view.toast.expect("error toast");
    assert_eq!(toast.kind, ToastKind::Error);
    assert_eq!(toast.message, "Failed to get Vehicles data");

    app.update(Event::DismissToast, &mut model);
    assert!(app.view(&model).toast.is_none());

    // Error is not a dead end: the same page can be asked for again.
    let retry = single_request(app.update(Event::EndReached, &mut model));
    assert_eq!(
        query_of(&retry).get("page[offset]").map(String::as_str),
        Some("10")
    );
    assert_matches!(model.list.phase, Phase::FetchingVehicles(FetchMode::Append));
}

#[test]
fn failed_filtered_page_is_fetched_again_from_the_start() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    mounted_with(&app, &mut model, 10);

    app.update(Event::TripsSelected(vec![TripId::new("t1")]), &mut model);
    let filtered = single_request(app.update(Event::TripFilterConfirmed, &mut model));
    resolve(&app, &mut model, filtered, timeout());
    assert_eq!(model.list.vehicles.len(), 10);
    assert_eq!(app.view(&model).phase, Phase::Error(FetchMode::Replace));

    let again = single_request(app.update(Event::EndReached, &mut model));
    let query = query_of(&again);
    assert_eq!(query.get("page[offset]").map(String::as_str), Some("0"));
    assert_eq!(query.get("filter[trips]").map(String::as_str), Some("t1"));
    assert!(app.view(&model).is_fetching);
    assert!(!app.view(&model).is_loading_more);

    resolve(&app, &mut model, again, ok(&vehicle_page(500..510)));
    let view = app.view(&model);
    assert_eq!(view.vehicles.len(), 10);
    assert_eq!(view.vehicles[0].id, "v500");
    assert_eq!(view.vehicles[9].id, "v509");
}

#[test]
fn failed_refresh_does_not_duplicate_rows() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    mounted_with(&app, &mut model, 10);
    let more = single_request(app.update(Event::EndReached, &mut model));
    resolve(&app, &mut model, more, ok(&vehicle_page(10..20)));
    assert_eq!(model.list.vehicles.len(), 20);

    let refresh = single_request(app.update(Event::RefreshRequested, &mut model));
    resolve(&app, &mut model, refresh, status(503));
    assert_eq!(
        model.toast.as_ref().map(|t| t.message.as_str()),
        Some("Failed to get Vehicles data")
    );

    let again = single_request(app.update(Event::EndReached, &mut model));
    resolve(&app, &mut model, again, ok(&vehicle_page(0..10)));
    let view = app.view(&model);
    assert_eq!(view.vehicles.len(), 10);
    assert_eq!(view.vehicles[9].id, "v9");
    assert!(view.can_load_more);
}

#[test]
fn trip_list_failure_still_loads_vehicles() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    mounted_with(&app, &mut model, 10);

    app.update(Event::RoutesSelected(vec![RouteId::new("Red")]), &mut model);
    let trips = single_request(app.update(Event::RouteFilterConfirmed, &mut model));
    let vehicles = single_request(resolve(&app, &mut model, trips, timeout()));
    assert_eq!(url_of(&vehicles).path(), "/vehicles");
    assert_eq!(
        query_of(&vehicles).get("filter[route]").map(String::as_str),
        Some("Red")
    );
    assert_eq!(
        model.toast.as_ref().map(|t| t.message.as_str()),
        Some("Failed to get Trips data")
    );

    resolve(&app, &mut model, vehicles, ok(&vehicle_page(0..3)));
    let view = app.view(&model);
    assert_eq!(view.vehicles.len(), 3);
    assert!(view.trip_filter.enabled);
    assert!(view.trip_filter.options.is_empty());
}

#[test]
fn route_catalogue_failure_still_loads_vehicles() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let routes = single_request(app.update(Event::ScreenMounted, &mut model));
    let vehicles = single_request(resolve(&app, &mut model, routes, timeout()));
    assert_eq!(url_of(&vehicles).path(), "/vehicles");
    assert_eq!(
        model.toast.as_ref().map(|t| t.message.as_str()),
        Some("Failed to get Routes data")
    );
}

#[test]
fn config_controls_base_url_and_page_size() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    app.update(
        Event::ConfigUpdated(ApiConfig {
            base_url: "https://transit.example.com/v3".into(),
            page_size: 5,
            api_key: Some("k".into()),
            ..ApiConfig::default()
        }),
        &mut model,
    );

    let routes = single_request(app.update(Event::ScreenMounted, &mut model));
    let url = url_of(&routes);
    assert_eq!(url.host_str(), Some("transit.example.com"));
    assert_eq!(url.path(), "/v3/routes");
    assert_eq!(header_of(&routes, "x-api-key"), Some("k"));

    let vehicles = single_request(resolve(&app, &mut model, routes, ok(&routes_json())));
    assert_eq!(
        query_of(&vehicles).get("page[limit]").map(String::as_str),
        Some("5")
    );
    assert_eq!(header_of(&vehicles, "x-api-key"), Some("k"));
}

#[test]
fn new_page_size_restarts_a_mounted_list() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    mounted_with(&app, &mut model, 10);

    let update = app.update(
        Event::ConfigJsonReceived(r#"{"page_size": 20}"#.into()),
        &mut model,
    );
    let first = single_request(update);
    let query = query_of(&first);
    assert_eq!(query.get("page[offset]").map(String::as_str), Some("0"));
    assert_eq!(query.get("page[limit]").map(String::as_str), Some("20"));

    resolve(&app, &mut model, first, ok(&vehicle_page(0..20)));
    let next = single_request(app.update(Event::EndReached, &mut model));
    let query = query_of(&next);
    assert_eq!(query.get("page[offset]").map(String::as_str), Some("20"));
    assert_eq!(query.get("page[limit]").map(String::as_str), Some("20"));

    // Same size again changes nothing.
    let update = app.update(
        Event::ConfigJsonReceived(r#"{"page_size": 20}"#.into()),
        &mut model,
    );
    assert!(http_requests(update).is_empty());
}

#[test]
fn invalid_config_is_rejected_with_a_toast() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    app.update(
        Event::ConfigJsonReceived(r#"{"page_size": 0}"#.into()),
        &mut model,
    );
    assert_eq!(model.config, ApiConfig::default());
    assert_matches!(model.toast, Some(ref t) if t.kind == ToastKind::Error);

    app.update(Event::ConfigJsonReceived("not json".into()), &mut model);
    assert_eq!(model.config, ApiConfig::default());
}

#[test]
fn responses_after_unmount_are_ignored() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let routes = single_request(app.update(Event::ScreenMounted, &mut model));
    app.update(Event::ScreenUnmounted, &mut model);

    let update = resolve(&app, &mut model, routes, ok(&routes_json()));
    assert!(http_requests(update).is_empty());
    assert!(model.list.filters.route_options.is_empty());
    assert!(!app.view(&model).can_load_more);
}

#[test]
fn markers_are_exported_as_geojson() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    mounted_with(&app, &mut model, 2);

    let view = app.view(&model);
    let collection: serde_json::Value =
        serde_json::from_str(&view.markers_geojson).expect("valid JSON");
    assert_eq!(collection["type"], "FeatureCollection");
    assert_eq!(collection["features"].as_array().map(Vec::len), Some(2));
    assert_eq!(
        collection["features"][0]["geometry"]["coordinates"],
        serde_json::json!([-71.06, 42.35])
    );
}
