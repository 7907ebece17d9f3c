//! End-to-end session scenarios against wiremock geocoding and backend
//! servers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{center, surface};
use rtumap_backend::BackendClient;
use rtumap_core::{Coordinates, RecordId};
use rtumap_engine::{
    CapturePipeline, DraftField, DraftStatus, EngineError, HeadlessSurface, MapEvent, MapSession,
    MapSurface, MarkerIcon, MarkerKey, PipelineError, PipelineStep, SessionUpdate,
};
use rtumap_geocode::GeocodeClient;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session(server: &MockServer, surface: Arc<HeadlessSurface>) -> MapSession {
    let geocoder = GeocodeClient::with_base_url(
        "test-key",
        5,
        "rtumap-test/0.1",
        &format!("{}/geocode/json", server.uri()),
    )
    .expect("geocoder construction should not fail");
    let backend = Arc::new(
        BackendClient::new(&server.uri(), 5, "rtumap-test/0.1")
            .expect("backend construction should not fail"),
    );
    MapSession::new(
        surface,
        Arc::new(geocoder),
        backend.clone(),
        backend,
        CapturePipeline::default(),
    )
}

fn main_st_result() -> serde_json::Value {
    serde_json::json!({
        "status": "OK",
        "results": [{
            "formatted_address": "123 Main St",
            "address_components": [
                { "long_name": "Pittsburgh", "short_name": "Pittsburgh", "types": ["locality", "political"] },
                { "long_name": "Pennsylvania", "short_name": "PA", "types": ["administrative_area_level_1", "political"] },
                { "long_name": "15222", "short_name": "15222", "types": ["postal_code"] }
            ],
            "place_id": "ChIJ-main",
            "types": ["street_address"],
            "geometry": { "location": { "lat": 40.4406, "lng": -79.9959 } }
        }]
    })
}

fn four_rtus() -> serde_json::Value {
    serde_json::json!({
        "rtu_count": 4,
        "detections": [
            { "confidence": 0.93, "x": 120, "y": 80 },
            { "confidence": 0.88, "x": 300, "y": 95 },
            { "confidence": 0.81, "x": 410, "y": 260 },
            { "confidence": 0.74, "bbox": [500, 300, 540, 330] }
        ],
        "processed_image": "/uploads/processed/map_screenshot.png"
    })
}

async fn mount_reverse_geocode(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .and(query_param("latlng", "40.4406,-79.9959"))
        .respond_with(ResponseTemplate::new(200).set_body_json(main_st_result()))
        .mount(server)
        .await;
}

async fn mount_upload(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(four_rtus()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn scenario_detect_then_save_shows_one_red_marker() {
    let server = MockServer::start().await;
    mount_reverse_geocode(&server).await;
    mount_upload(&server).await;
    Mock::given(method("POST"))
        .and(path("/save_upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 77,
            "filename": "map_screenshot.png",
            "processed_image": "/uploads/processed/map_screenshot.png",
            "rtu_count": 4,
            "building_name": "Plaza",
            "address": "123 Main St",
            "city": "Pittsburgh",
            "state": "PA",
            "zip_code": "15222",
            "status": "pending",
            "approved": false,
            "created_at": "2025-03-01T12:00:00",
            "updated_at": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let surface = surface();
    let session = session(&server, surface.clone());

    let update = session.handle(MapEvent::DetectRequested).await.unwrap();
    let SessionUpdate::DetectionReady(result) = update else {
        panic!("expected detection result, got {update:?}");
    };
    assert_eq!(result.rtu_count, 4);
    assert_eq!(result.lead_score.label(), "Bad");

    let draft = session.draft();
    assert_eq!(draft.status(), DraftStatus::Ready);
    assert_eq!(draft.fields().address, "123 Main St");
    assert_eq!(draft.fields().state, "PA");

    session
        .handle(MapEvent::FieldEdited {
            field: DraftField::BuildingName,
            value: "Plaza".to_string(),
        })
        .await
        .unwrap();

    let update = session.handle(MapEvent::SaveRequested).await.unwrap();
    let SessionUpdate::Saved(record) = update else {
        panic!("expected saved record, got {update:?}");
    };
    assert_eq!(record.id, Some(RecordId(77)));
    assert_eq!(record.coordinates, Some(center()));

    assert_eq!(draft.status(), DraftStatus::Saved);
    assert_eq!(session.draft().status(), DraftStatus::Idle, "a fresh draft replaces the saved one");

    assert_eq!(
        session.registry().record_ids().into_iter().collect::<Vec<_>>(),
        vec![RecordId(77)]
    );
    let markers = surface.markers();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].1.icon, MarkerIcon::Red);
}

#[tokio::test]
async fn scenario_detection_500_fails_then_retry_succeeds() {
    let server = MockServer::start().await;
    mount_reverse_geocode(&server).await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(serde_json::json!({ "detail": "Failed to detect RTUs" })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_upload(&server).await;

    let surface = surface();
    let session = session(&server, surface.clone());

    let err = session.handle(MapEvent::DetectRequested).await.unwrap_err();
    let EngineError::Pipeline(failure) = err else {
        panic!("expected pipeline failure, got {err:?}");
    };
    assert_eq!(failure.step, PipelineStep::Detect);
    assert!(matches!(failure.error, PipelineError::Detection(_)));

    let draft = session.draft();
    assert_eq!(draft.status(), DraftStatus::Failed);
    assert!(draft.last_failure().is_some());
    assert!(surface.markers().is_empty(), "no marker after a failed run");

    session.handle(MapEvent::DetectRequested).await.unwrap();
    assert_eq!(draft.status(), DraftStatus::Ready);
    assert!(draft.last_failure().is_none());
}

#[tokio::test]
async fn second_detect_while_first_in_flight_is_rejected() {
    let server = MockServer::start().await;
    mount_reverse_geocode(&server).await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(four_rtus())
                .set_delay(Duration::from_millis(300)),
        )
    .expect(1)
        .mount(&server)
        .await;

    let session = session(&server, surface());

    let (first, second) = tokio::join!(session.handle(MapEvent::DetectRequested), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let status = session.draft().status();
        (status, session.handle(MapEvent::DetectRequested).await)
    });

    let (status_during, second) = second;
    assert!(status_during.is_running(), "got {status_during}");
    assert!(matches!(second, Err(EngineError::ConcurrentOperation)));
    assert!(first.is_ok());
    assert_eq!(session.draft().status(), DraftStatus::Ready);
}

#[tokio::test]
async fn geocode_failure_does_not_abort_detection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        })))
        .mount(&server)
        .await;
    mount_upload(&server).await;

    let session = session(&server, surface());
    session.handle(MapEvent::DetectRequested).await.unwrap();

    let draft = session.draft();
    assert_eq!(draft.status(), DraftStatus::Ready);
    assert!(draft.fields().address.is_empty());

    let err = session.handle(MapEvent::SaveRequested).await.unwrap_err();
    let EngineError::Validation { missing } = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(missing, DraftField::ALL.to_vec());
    assert_eq!(draft.status(), DraftStatus::Ready);
}

#[tokio::test]
async fn backend_field_errors_fail_the_save_without_markers() {
    let server = MockServer::start().await;
    mount_reverse_geocode(&server).await;
    mount_upload(&server).await;
    Mock::given(method("POST"))
        .and(path("/save_upload"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "detail": [
                { "loc": ["body", "zip_code"], "msg": "string does not match regex", "type": "value_error.str.regex" }
            ]
        })))
        .mount(&server)
        .await;

    let surface = surface();
    let session = session(&server, surface.clone());
    session.handle(MapEvent::DetectRequested).await.unwrap();
    session
        .handle(MapEvent::FieldEdited {
            field: DraftField::BuildingName,
            value: "Plaza".to_string(),
        })
        .await
        .unwrap();

    let err = session.handle(MapEvent::SaveRequested).await.unwrap_err();
    assert_eq!(err.field_errors().len(), 1);
    assert_eq!(err.field_errors()[0].field, "zip_code");

    let draft = session.draft();
    assert_eq!(draft.status(), DraftStatus::Failed);
    assert!(draft.result().is_some());
    assert!(surface.markers().is_empty());
}

#[tokio::test]
async fn map_click_drops_placement_with_address() {
    let server = MockServer::start().await;
    mount_reverse_geocode(&server).await;

    let surface = surface();
    let session = session(&server, surface.clone());

    let update = session
        .handle(MapEvent::MapClicked(center()))
        .await
        .unwrap();
    let SessionUpdate::PlacementMoved { place, .. } = update else {
        panic!("expected placement update, got {update:?}");
    };
    assert_eq!(place.unwrap().zip, "15222");

    let placement = session.registry().handle(MarkerKey::Placement).unwrap();
    assert!(surface.marker(placement.surface_id).unwrap().draggable);

    let (anchor, content) = surface.info_window().unwrap();
    assert_eq!(anchor, placement.surface_id);
    assert_eq!(
        content.lines,
        vec!["Address: 123 Main St", "Coordinates: 40.440600, -79.995900"]
    );
    assert_eq!(session.draft().fields().city, "Pittsburgh");
}

#[tokio::test]
async fn place_selection_recenters_and_seeds_draft() {
    let server = MockServer::start().await;
    let surface = surface();
    let session = session(&server, surface.clone());
    let location = Coordinates::new(40.45, -80.0).unwrap();

    session
        .handle(MapEvent::PlaceSelected {
            name: None,
            address: "1 Stadium Way".to_string(),
            location,
        })
        .await
        .unwrap();

    let viewport = surface.viewport();
    assert_eq!(viewport.center, location);
    assert_eq!(viewport.zoom, 15);

    let fields = session.draft().fields();
    assert_eq!(fields.building_name, "Unknown Building");
    assert_eq!(fields.address, "1 Stadium Way");
}

#[tokio::test]
async fn load_then_click_and_delete_record_marker() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "id": 5,
            "building_name": "Warehouse",
            "address": "1 Industrial Way",
            "rtu_count": "12",
            "lat": "40.45",
            "lng": "-79.99"
        }])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/delete/5"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "message": "Record deleted successfully" })),
        )
        .mount(&server)
        .await;

    let surface = surface();
    let session = session(&server, surface.clone());
    assert!(!session.records_loaded());

    let records = session.load().await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(session.records_loaded());

    let handle = session
        .registry()
        .handle(MarkerKey::Record(RecordId(5)))
        .unwrap();
    assert_eq!(surface.marker(handle.surface_id).unwrap().icon, MarkerIcon::Green);

    session
        .handle(MapEvent::MarkerClicked(handle.surface_id))
        .await
        .unwrap();
    let (_, content) = surface.info_window().unwrap();
    assert_eq!(content.heading, "Warehouse");
    assert_eq!(content.lines[2], "Lead Score: Good");

    session
        .handle(MapEvent::DeleteRequested(RecordId(5)))
        .await
        .unwrap();
    assert!(surface.markers().is_empty());
    assert!(session.store().records().is_empty());
}
