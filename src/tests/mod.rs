//! Integration and unit tests for the dealership backend.
//!
//! - **api_tests**: catalog and admin endpoints through the full router
//! - **upload_tests**: image upload endpoint against an in-memory object store
//! - **repository_tests**: catalog queries, fallback and slug assignment
//! - **db_tests**: schema and seeding
//! - **config_tests**: configuration defaults, loading and validation
//! - **error_tests**: error mapping and the JSON error envelope

pub mod api_tests;

/// Shared fixtures.
pub(crate) mod support {
    use axum::body::Body;
    use axum::response::Response;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tempfile::TempDir;

    use crate::config::AppConfig;
    use crate::db::encode_ts;
    use crate::store::Store;
    use crate::types::VehicleInput;

    pub const ADMIN_TOKEN: &str = "test-admin-token-0123456789";

    pub fn bearer() -> String {
        format!("Bearer {}", ADMIN_TOKEN)
    }

    /// Default configuration with the admin token set.
    pub fn test_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.admin.token = ADMIN_TOKEN.to_string();
        cfg
    }

    /// A connected store backed by a fresh database file. Keep the `TempDir`
    /// alive for the duration of the test.
    pub async fn temp_store() -> (Store, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = AppConfig::default().database;
        settings.url = format!("sqlite://{}/catalog.db", dir.path().display());
        settings.connect_attempts = 1;
        let store = Store::new(&settings);
        store.pool().await.unwrap();
        (store, dir)
    }

    pub async fn insert_seller(store: &Store, id: &str, name: &str, phone: &str, active: bool) {
        let now = encode_ts(&Utc::now());
        sqlx::query(
            "INSERT INTO sellers (id, name, phone_e164, wa_preset, active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?5)",
        )
        .bind(id)
        .bind(name)
        .bind(phone)
        .bind(active)
        .bind(&now)
        .execute(store.pool().await.unwrap())
        .await
        .unwrap();
    }

    pub fn vehicle_input(brand: &str, model: &str, year: i32, seller_id: &str) -> VehicleInput {
        VehicleInput {
            title: format!("{} {}", brand, model),
            brand: brand.to_string(),
            model: model.to_string(),
            year,
            price_ars: Some(10_000_000),
            km: Some(50_000),
            fuel: Some("Nafta".to_string()),
            gearbox: None,
            location: None,
            description: None,
            images: Vec::new(),
            seller_id: seller_id.to_string(),
            published: true,
        }
    }

    pub async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub fn json_body(value: &Value) -> Body {
        Body::from(value.to_string())
    }
}
