#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::routes;
    use crate::state::AppState;
    use crate::store::Store;
    use crate::tests::support::{
        bearer, body_json, body_text, insert_seller, json_body, temp_store, test_config, vehicle_input,
    };

    fn demo_app(config: AppConfig) -> (Router, AppState) {
        let state = AppState::with_parts(config, Store::unconfigured(), None);
        (routes::router(state.clone()), state)
    }

    async fn live_app() -> (Router, AppState, tempfile::TempDir) {
        let (store, dir) = temp_store().await;
        insert_seller(&store, "seller-1", "Ana Pérez", "+5493515550000", true).await;
        let state = AppState::with_parts(test_config(), store, None);
        (routes::router(state.clone()), state, dir)
    }

    async fn get(app: &Router, uri: &str) -> axum::response::Response {
        app.clone().oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap()
    }

    async fn send_json(app: &Router, method: &str, uri: &str, auth: Option<&str>, body: &Value) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri).header("content-type", "application/json");
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        app.clone().oneshot(builder.body(json_body(body)).unwrap()).await.unwrap()
    }

    fn new_vehicle_body() -> Value {
        json!({
            "title": "Ford Fiesta 1.6 SE",
            "brand": "Ford",
            "model": "Fiesta",
            "year": 2017,
            "priceARS": "9500000",
            "km": "",
            "images": ["https://cdn.example.com/fiesta.jpg"],
            "sellerId": "seller-1"
        })
    }

    #[tokio::test]
    async fn test_healthz_endpoint() {
        let (app, _) = demo_app(test_config());
        let response = get(&app, "/healthz").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn test_readyz_reflects_database() {
        let (app, _) = demo_app(test_config());
        assert_eq!(get(&app, "/readyz").await.status(), StatusCode::SERVICE_UNAVAILABLE);

        let (app, _, _dir) = live_app().await;
        assert_eq!(get(&app, "/readyz").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let (app, _) = demo_app(test_config());
        let response = get(&app, "/vehicles").await;
        let headers = response.headers();
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert!(headers.contains_key("x-frame-options"));
        assert!(headers.contains_key("referrer-policy"));
        assert_eq!(headers.get("cache-control").unwrap(), "no-store");
    }

    #[tokio::test]
    async fn test_demo_catalog_is_flagged() {
        let (app, state) = demo_app(test_config());
        let response = get(&app, "/vehicles").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["fallback"], true);
        assert_eq!(body["items"].as_array().unwrap().len(), 3);
        assert_eq!(body["pagination"], json!({"page": 1, "perPage": 12, "total": 3, "totalPages": 1}));
        assert!(body["links"]["prev"].is_null());
        assert!(body["links"]["next"].is_null());
        assert!(body["items"][0]["priceARS"].is_number());
        assert!(body["items"][0]["seller"]["phoneE164"].is_string());

        let snapshot = state.metrics.get_snapshot();
        assert_eq!(snapshot.vehicle_lists, 1);
        assert_eq!(snapshot.fallback_reads, 1);
    }

    #[tokio::test]
    async fn test_brand_filter_and_pagination_end_to_end() {
        let (app, state, _dir) = live_app().await;
        for i in 0..15 {
            state.repo.create_vehicle(&vehicle_input("Ford", "Fiesta", 2005 + i, "seller-1")).await.unwrap();
        }
        for (brand, model) in [("Fiat", "Cronos"), ("Toyota", "Etios"), ("Renault", "Kwid"), ("Peugeot", "208"), ("VW", "Gol")] {
            state.repo.create_vehicle(&vehicle_input(brand, model, 2020, "seller-1")).await.unwrap();
        }

        let body = body_json(get(&app, "/vehicles?brand=ford").await).await;
        assert_eq!(body["fallback"], false);
        assert_eq!(body["pagination"]["total"], 15);
        assert_eq!(body["pagination"]["totalPages"], 2);
        assert_eq!(body["items"].as_array().unwrap().len(), 12);
        assert!(body["links"]["prev"].is_null());
        assert_eq!(body["links"]["next"], "/vehicles?brand=ford&page=2");

        let body = body_json(get(&app, "/vehicles?brand=ford&page=2").await).await;
        assert_eq!(body["items"].as_array().unwrap().len(), 3);
        assert_eq!(body["links"]["prev"], "/vehicles?brand=ford");
        assert!(body["links"]["next"].is_null());

        // Invalid filters fall back to the defaults, brand included
        let body = body_json(get(&app, "/vehicles?brand=ford&perPage=500").await).await;
        assert_eq!(body["pagination"]["total"], 20);
        assert_eq!(body["pagination"]["perPage"], 12);
    }

    #[tokio::test]
    async fn test_huge_page_number_falls_back_to_first_page() {
        let uri = format!("/vehicles?page={}", i64::MAX);

        let (app, _) = demo_app(test_config());
        let response = get(&app, &uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["pagination"]["page"], 1);
        assert_eq!(body["items"].as_array().unwrap().len(), 3);

        let (app, state, _dir) = live_app().await;
        state.repo.create_vehicle(&vehicle_input("Ford", "Ka", 2018, "seller-1")).await.unwrap();
        let response = get(&app, &uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["fallback"], false);
        assert_eq!(body["pagination"]["page"], 1);
        assert_eq!(body["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn test_include_drafts_requires_token() {
        let (app, state, _dir) = live_app().await;
        let mut draft = vehicle_input("Ford", "Focus", 2018, "seller-1");
        draft.published = false;
        state.repo.create_vehicle(&draft).await.unwrap();

        let body = body_json(get(&app, "/vehicles?includeDrafts=true").await).await;
        assert_eq!(body["pagination"]["total"], 0);

        let request = Request::builder()
            .uri("/vehicles?includeDrafts=true")
            .header("authorization", bearer())
            .body(Body::empty())
            .unwrap();
        let body = body_json(app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(body["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn test_get_vehicle_by_id() {
        let (app, _) = demo_app(test_config());
        let response = get(&app, "/vehicles/sample-ford-fiesta-2017").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-data-source").unwrap(), "fallback");
        let body = body_json(response).await;
        assert_eq!(body["slug"], "ford-fiesta-2017");

        let response = get(&app, "/vehicles/unknown").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let (app, state, _dir) = live_app().await;
        let created = state.repo.create_vehicle(&vehicle_input("Ford", "Ka", 2018, "seller-1")).await.unwrap();
        let response = get(&app, &format!("/vehicles/{}", created.id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-data-source").is_none());
    }

    #[tokio::test]
    async fn test_detail_by_slug_hides_drafts() {
        let (app, state, _dir) = live_app().await;
        let published = state.repo.create_vehicle(&vehicle_input("Ford", "Ka", 2018, "seller-1")).await.unwrap();
        let mut draft = vehicle_input("Ford", "Focus", 2018, "seller-1");
        draft.published = false;
        let draft = state.repo.create_vehicle(&draft).await.unwrap();

        let response = get(&app, &format!("/vehicles/slug/{}", published.slug)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["fallback"], false);
        assert_eq!(body["vehicle"]["id"], published.id.as_str());
        assert!(body["contactUrl"].as_str().unwrap().starts_with("https://wa.me/5493515550000?text="));

        let response = get(&app, &format!("/vehicles/slug/{}", draft.slug)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_requires_token() {
        let (app, state, _dir) = live_app().await;
        let response = send_json(&app, "POST", "/vehicles", None, &new_vehicle_body()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let response = send_json(&app, "POST", "/vehicles", Some("Bearer wrong-token-0000000"), &new_vehicle_body()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(state.metrics.get_snapshot().auth_failures, 2);
    }

    #[tokio::test]
    async fn test_no_configured_token_rejects_everyone() {
        let (app, _) = demo_app(AppConfig::default());
        let response = send_json(&app, "POST", "/vehicles", Some("Bearer "), &new_vehicle_body()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = get(&app, "/admin/session").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_demo_mode_rejects_writes() {
        let (app, _) = demo_app(test_config());
        let auth = bearer();
        let response = send_json(&app, "POST", "/vehicles", Some(&auth), &new_vehicle_body()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"]["code"], "DEMO_MODE");

        let response =
            send_json(&app, "PATCH", "/vehicles/sample-ford-fiesta-2017", Some(&auth), &new_vehicle_body()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // Sample data is unchanged
        let body = body_json(get(&app, "/vehicles").await).await;
        assert_eq!(body["pagination"]["total"], 3);
    }

    #[tokio::test]
    async fn test_unreachable_database_rejects_writes() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let mut config = test_config();
        config.database.url = format!("sqlite://{}/sub/catalog.db", blocker.path().display());
        config.database.connect_attempts = 1;
        let store = Store::new(&config.database);
        let app = routes::router(AppState::with_parts(config, store, None));

        let response = send_json(&app, "POST", "/vehicles", Some(&bearer()), &new_vehicle_body()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"]["code"], "DEMO_MODE");

        // Reads still come from the sample catalog
        let body = body_json(get(&app, "/vehicles").await).await;
        assert_eq!(body["fallback"], true);
    }

    #[tokio::test]
    async fn test_create_and_update_vehicle() {
        let (app, state, _dir) = live_app().await;
        let auth = bearer();

        let response = send_json(&app, "POST", "/vehicles", Some(&auth), &new_vehicle_body()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["slug"], "ford-fiesta-2017");
        assert_eq!(created["priceARS"], 9_500_000);
        assert!(created["km"].is_null());
        assert_eq!(created["published"], true);
        assert_eq!(created["seller"]["name"], "Ana Pérez");

        let response = send_json(&app, "POST", "/vehicles", Some(&auth), &new_vehicle_body()).await;
        assert_eq!(body_json(response).await["slug"], "ford-fiesta-2017-1");

        let id = created["id"].as_str().unwrap().to_string();
        let mut patch = new_vehicle_body();
        patch["model"] = json!("Fiesta Kinetic");
        patch["published"] = json!("false");
        let response = send_json(&app, "PATCH", &format!("/vehicles/{}", id), Some(&auth), &patch).await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["slug"], "ford-fiesta-kinetic-2017");
        assert_eq!(updated["published"], false);
        assert_eq!(updated["id"], id.as_str());

        let response = send_json(&app, "PATCH", "/vehicles/missing", Some(&auth), &patch).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let snapshot = state.metrics.get_snapshot();
        assert_eq!(snapshot.vehicles_created, 2);
        assert_eq!(snapshot.vehicles_updated, 1);
    }

    #[tokio::test]
    async fn test_create_validation_errors() {
        let (app, _, _dir) = live_app().await;
        let auth = bearer();

        let mut body = new_vehicle_body();
        body["title"] = json!("F");
        body["year"] = json!(1850);
        let response = send_json(&app, "POST", "/vehicles", Some(&auth), &body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        let fields = &body["error"]["details"]["fieldErrors"];
        assert!(fields["title"].is_array());
        assert!(fields["year"].is_array());

        let mut unknown_seller = new_vehicle_body();
        unknown_seller["sellerId"] = json!("ghost");
        let response = send_json(&app, "POST", "/vehicles", Some(&auth), &unknown_seller).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"]["details"]["fieldErrors"]["sellerId"].is_array());

        let request = Request::builder()
            .method("POST")
            .uri("/vehicles")
            .header("authorization", &auth)
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_sellers() {
        let (app, _) = demo_app(test_config());
        let body = body_json(get(&app, "/admin/sellers").await).await;
        assert_eq!(body, json!({"sellers": []}));

        let request =
            Request::builder().uri("/admin/sellers").header("authorization", bearer()).body(Body::empty()).unwrap();
        let body = body_json(app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(body["fallback"], true);
        assert_eq!(body["sellers"].as_array().unwrap().len(), 3);

        let (app, _, _dir) = live_app().await;
        let request =
            Request::builder().uri("/admin/sellers").header("authorization", bearer()).body(Body::empty()).unwrap();
        let body = body_json(app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(body["fallback"], false);
        assert_eq!(body["sellers"][0]["id"], "seller-1");
    }

    #[tokio::test]
    async fn test_admin_session() {
        let (app, _) = demo_app(test_config());
        assert_eq!(get(&app, "/admin/session").await.status(), StatusCode::UNAUTHORIZED);

        let request =
            Request::builder().uri("/admin/session").header("authorization", bearer()).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_feeds() {
        let mut config = test_config();
        config.site.url = "https://autos.example.com/".to_string();
        let (app, _) = demo_app(config);

        let response = get(&app, "/sitemap.xml").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("content-type").unwrap().to_str().unwrap().starts_with("application/xml"));
        let xml = body_text(response).await;
        assert!(xml.contains("<loc>https://autos.example.com/</loc>"));
        assert!(xml.contains("<loc>https://autos.example.com/vehicle/ford-fiesta-2017</loc>"));

        let robots = body_text(get(&app, "/robots.txt").await).await;
        assert!(robots.contains("Disallow: /admin"));
        assert!(robots.contains("Sitemap: https://autos.example.com/sitemap.xml"));
    }

    #[tokio::test]
    async fn test_metrics_and_version() {
        let (app, _) = demo_app(test_config());
        get(&app, "/vehicles").await;

        let body = body_json(get(&app, "/metrics").await).await;
        assert_eq!(body["vehicle_lists"], 1);

        let text = body_text(get(&app, "/metrics/prometheus").await).await;
        assert!(text.contains("dealership_vehicle_lists 1"));

        let body = body_json(get(&app, "/version").await).await;
        assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(body["flags"]["fallback"], true);
    }
}
