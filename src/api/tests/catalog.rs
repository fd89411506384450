use super::*;
use crate::catalog::{CatalogCountry, CatalogData, CatalogStore, GeoOption};

async fn read_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn test_logs_serves_report_artifacts() {
    let (app, orchestrator, _temp_dir) = create_test_app(fake_collaborators()).await;
    let run_dir = orchestrator.config().paths.logs_dir.join("run-1");
    std::fs::create_dir_all(&run_dir).unwrap();
    std::fs::write(run_dir.join("example.com.md"), "# example.com\n").unwrap();

    let response = app
        .clone()
        .oneshot(get("/api/v1/logs/run-1/example.com.md"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_text(response).await, "# example.com\n");

    let response = app
        .clone()
        .oneshot(get("/api/v1/logs/run-1/missing.md"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_logs_rejects_paths_outside_the_directory() {
    let (app, orchestrator, temp_dir) = create_test_app(fake_collaborators()).await;
    std::fs::create_dir_all(&orchestrator.config().paths.logs_dir).unwrap();
    std::fs::write(temp_dir.path().join("secret.txt"), "nope").unwrap();

    let response = app
        .oneshot(get("/api/v1/logs/../secret.txt"))
        .await
        .unwrap();
    assert_ne!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_geo_lookups_read_the_saved_catalog() {
    let (app, orchestrator, _temp_dir) = create_test_app(fake_collaborators()).await;
    CatalogStore::new(&orchestrator.config().paths.data_dir)
        .save(CatalogData {
            version: 1,
            countries: vec![CatalogCountry {
                code: "tr".into(),
                name: "Turkey".into(),
                regions: vec![GeoOption {
                    code: "izmir".into(),
                    name: "Izmir".into(),
                }],
                cities: vec![GeoOption {
                    code: "bornova".into(),
                    name: "Bornova".into(),
                }],
                isps: vec!["Turk Telekom".into()],
            }],
        })
        .await
        .unwrap();

    let body = body_json(app.clone().oneshot(get("/api/v1/geo/countries")).await.unwrap()).await;
    assert_eq!(body[0]["code"], "tr");
    assert_eq!(body[0]["name"], "Turkey");

    let body = body_json(
        app.clone()
            .oneshot(get("/api/v1/geo/regions?country=TR"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body[0]["code"], "izmir");

    let body = body_json(
        app.clone()
            .oneshot(get("/api/v1/geo/cities?country=tr"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body[0]["name"], "Bornova");

    let body = body_json(
        app.clone()
            .oneshot(get("/api/v1/geo/isps?country=tr"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body, serde_json::json!(["Turk Telekom"]));
}

#[tokio::test]
async fn test_geo_lookups_without_country_are_empty() {
    let (app, _orchestrator, _temp_dir) = create_test_app(fake_collaborators()).await;

    for uri in [
        "/api/v1/geo/regions",
        "/api/v1/geo/cities?country=",
        "/api/v1/geo/isps?country=ZZ",
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_eq!(body_json(response).await, serde_json::json!([]), "{uri}");
    }
}

#[tokio::test]
async fn test_catalog_refresh_requires_api_keys() {
    let (app, _orchestrator, _temp_dir) = create_test_app(fake_collaborators()).await;

    let response = app
        .oneshot(post_json(
            "/api/v1/catalog/refresh",
            serde_json::json!({ "countries": [{ "code": "tr" }] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "config_error");
    assert_eq!(body["error"]["details"]["key"], "soax.api_key");
}
