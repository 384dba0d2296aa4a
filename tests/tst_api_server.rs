use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{NaiveDate, Utc};
use oi_tracker::api_server_axum::router;
use oi_tracker::models::Tally;
use oi_tracker::{Grid, GridHandle};
use serde_json::Value;
use tower::ServiceExt;

fn grid(cycle: u64) -> Grid {
    Grid {
        cycle,
        generated_at: Utc::now(),
        underlying: "NIFTY".to_string(),
        underlying_price: 26012.5,
        atm_strike: 26000.0,
        expiry: NaiveDate::from_ymd_opt(2025, 12, 30).unwrap(),
        rows: Vec::new(),
        cells: Vec::new(),
        breached: 3,
        total: 4,
        alert: true,
        calls: Tally { breached: 2, total: 2 },
        puts: Tally { breached: 1, total: 2 },
    }
}

async fn get_json(handle: GridHandle, uri: &str) -> (StatusCode, Value) {
    let response = router(handle)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_grid_not_yet_available() {
    let (status, body) = get_json(GridHandle::new(), "/api/grid").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "grid not yet available");
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_grid_returns_latest() {
    let handle = GridHandle::new();
    handle.publish(grid(1));
    handle.publish(grid(2));

    let (status, body) = get_json(handle, "/api/grid").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["cycle"], 2);
    assert_eq!(data["underlying"], "NIFTY");
    assert_eq!(data["expiry"], "2025-12-30");
    assert_eq!(data["alert"], true);
    assert_eq!(data["calls"]["breached"], 2);
    assert!(data["stale_secs"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn test_health() {
    let handle = GridHandle::new();

    let (_, body) = get_json(handle.clone(), "/api/health").await;
    assert_eq!(body["data"]["status"], "ok");
    assert!(body["data"]["last_cycle"].is_null());

    handle.publish(grid(7));
    let (_, body) = get_json(handle, "/api/health").await;
    assert_eq!(body["data"]["last_cycle"], 7);
}

#[tokio::test]
async fn test_unknown_route() {
    let response = router(GridHandle::new())
        .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
