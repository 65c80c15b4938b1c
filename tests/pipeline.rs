//! End-to-end tests: HTTP router → orchestrator → real Census client.
//!
//! The vision model is replaced by a scripted extractor; the Census geocoder
//! is an `httpmock` server speaking the real wire format, so everything from
//! the request body to the outbound query string is exercised.
//!
//! One live test at the bottom calls a real vision provider and the public
//! geocoder. It is gated behind `E2E_ENABLED` and `ADDRLENS_E2E_IMAGE`:
//!
//!   E2E_ENABLED=1 ADDRLENS_E2E_IMAGE=label.jpg cargo test --test pipeline -- --nocapture

use addrlens::{
    build_router, AddrLensError, AddressExtractor, AppState, CensusGeocoder, Extraction,
    Orchestrator, PipelineConfig, ServerConfig,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const ONELINE: &str = "/geocoder/locations/onelineaddress";
const WHITE_HOUSE: &str = "1600 Pennsylvania Ave NW, Washington, DC 20500";

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Returns a fixed address list and records the image it was handed.
struct ScriptedExtractor {
    addresses: Vec<String>,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl AddressExtractor for ScriptedExtractor {
    async fn extract(&self, image: &str) -> Result<Extraction, AddrLensError> {
        self.seen.lock().unwrap().push(image.to_string());
        Ok(Extraction::new(self.addresses.clone()))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("addrlens=debug")
        .with_test_writer()
        .try_init();
}

fn census_reply(matches: Value) -> Value {
    json!({ "result": { "addressMatches": matches } })
}

fn router_for(server: &MockServer, addresses: &[&str]) -> (Router, Arc<ScriptedExtractor>) {
    init_tracing();
    let config = PipelineConfig::builder()
        .geocoder_url(server.base_url())
        .geocode_timeout_secs(2)
        .resolve_concurrency(2)
        .build()
        .unwrap();
    let extractor = Arc::new(ScriptedExtractor {
        addresses: addresses.iter().map(|s| s.to_string()).collect(),
        seen: Mutex::new(Vec::new()),
    });
    let geocoder = CensusGeocoder::from_config(&config).unwrap();
    let orchestrator = Orchestrator::new(extractor.clone(), Arc::new(geocoder), &config);
    let router = build_router(AppState::new(orchestrator), &ServerConfig::default());
    (router, extractor)
}

async fn call(router: Router, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn white_house_round_trip() {
    let server = MockServer::start();
    let census = server.mock(|when, then| {
        when.method(GET)
            .path(ONELINE)
            .query_param("address", WHITE_HOUSE)
            .query_param("benchmark", "Public_AR_Current")
            .query_param("format", "json");
        then.status(200).json_body(census_reply(json!([{
            "matchedAddress": "1600 PENNSYLVANIA AVE NW, WASHINGTON, DC, 20500",
            "coordinates": { "x": -77.0365, "y": 38.8977 }
        }])));
    });

    let (router, extractor) = router_for(&server, &[WHITE_HOUSE]);
    let (status, body) = call(
        router,
        Method::POST,
        "/v1/addresses",
        json!({ "image": "data:image/png;base64,iVBORw0KGgo=" }),
    )
    .await;

    census.assert();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "addresses": [{
                "original": WHITE_HOUSE,
                "standardized": "1600 PENNSYLVANIA AVE NW, WASHINGTON, DC, 20500",
                "latitude": 38.8977,
                "longitude": -77.0365
            }]
        })
    );
    // The extractor receives the request's image exactly as sent.
    assert_eq!(
        extractor.seen.lock().unwrap().as_slice(),
        ["data:image/png;base64,iVBORw0KGgo=".to_string()]
    );
}

#[tokio::test]
async fn first_candidate_wins() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(ONELINE);
        then.status(200).json_body(census_reply(json!([
            { "matchedAddress": "100 MAIN ST, A, TX, 75001", "coordinates": { "x": -96.1, "y": 32.1 } },
            { "matchedAddress": "100 MAIN ST, B, TX, 75002", "coordinates": { "x": -97.2, "y": 33.2 } }
        ])));
    });

    let (router, _) = router_for(&server, &["100 Main St, TX"]);
    let (status, body) = call(router, Method::POST, "/v1/addresses", json!({ "image": "AAAA" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["addresses"][0]["standardized"], "100 MAIN ST, A, TX, 75001");
    assert_eq!(body["addresses"][0]["latitude"], 32.1);
    assert_eq!(body["addresses"][0]["longitude"], -96.1);
}

#[tokio::test]
async fn unmatched_address_degrades_in_place() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(ONELINE).query_param("address", WHITE_HOUSE);
        then.status(200).json_body(census_reply(json!([{
            "matchedAddress": "1600 PENNSYLVANIA AVE NW, WASHINGTON, DC, 20500",
            "coordinates": { "x": -77.0365, "y": 38.8977 }
        }])));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path(ONELINE)
            .query_param("address", "123 Nowhere Lane, Atlantis");
        then.status(200).json_body(census_reply(json!([])));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path(ONELINE)
            .query_param("address", "500 Error Blvd");
        then.status(500).body("internal error");
    });

    let (router, _) = router_for(
        &server,
        &["123 Nowhere Lane, Atlantis", WHITE_HOUSE, "500 Error Blvd"],
    );
    let (status, body) = call(router, Method::POST, "/v1/addresses", json!({ "image": "AAAA" })).await;

    assert_eq!(status, StatusCode::OK);
    let records = body["addresses"].as_array().unwrap();
    assert_eq!(records.len(), 3);

    assert_eq!(
        records[0],
        json!({
            "original": "123 Nowhere Lane, Atlantis",
            "standardized": "123 Nowhere Lane, Atlantis",
            "latitude": 0.0,
            "longitude": 0.0
        })
    );
    assert_eq!(records[1]["original"], WHITE_HOUSE);
    assert_eq!(records[1]["latitude"], 38.8977);
    assert_eq!(records[2]["standardized"], "500 Error Blvd");
    assert_eq!(records[2]["latitude"], 0.0);
}

#[tokio::test]
async fn empty_extraction_skips_geocoder() {
    let server = MockServer::start();
    let census = server.mock(|when, then| {
        when.method(GET).path(ONELINE);
        then.status(200).json_body(census_reply(json!([])));
    });

    let (router, _) = router_for(&server, &[]);
    let (status, body) = call(router, Method::POST, "/v1/addresses", json!({ "image": "AAAA" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "addresses": [] }));
    census.assert_hits(0);
}

#[tokio::test]
async fn single_address_endpoint_uses_census() {
    let server = MockServer::start();
    let census = server.mock(|when, then| {
        when.method(GET).path(ONELINE).query_param("address", WHITE_HOUSE);
        then.status(200).json_body(census_reply(json!([{
            "matchedAddress": "1600 PENNSYLVANIA AVE NW, WASHINGTON, DC, 20500",
            "coordinates": { "x": -77.0365, "y": 38.8977 }
        }])));
    });

    let (router, extractor) = router_for(&server, &["unused"]);
    let (status, body) = call(
        router,
        Method::PUT,
        "/v1/geocode-address",
        json!({ "address": WHITE_HOUSE }),
    )
    .await;

    census.assert();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["standardized"], "1600 PENNSYLVANIA AVE NW, WASHINGTON, DC, 20500");
    assert!(extractor.seen.lock().unwrap().is_empty());
}

// ── Live ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn live_extraction_from_image_file() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run live tests");
        return;
    }
    let Ok(path) = std::env::var("ADDRLENS_E2E_IMAGE") else {
        println!("SKIP: set ADDRLENS_E2E_IMAGE to an image containing addresses");
        return;
    };
    init_tracing();

    let bytes = std::fs::read(&path).expect("read e2e image");
    let image = addrlens::pipeline::encode::encode_bytes(&bytes);
    let orchestrator = Orchestrator::from_config(&PipelineConfig::default()).expect("provider");

    let output = orchestrator.run(&image).await.expect("pipeline run");
    println!("{}", serde_json::to_string_pretty(&output).unwrap());

    assert_eq!(output.addresses.len(), output.stats.extracted);
    assert_eq!(
        output.stats.resolved + output.stats.degraded,
        output.stats.extracted
    );
}
