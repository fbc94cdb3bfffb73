use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use crate::config::ContactsConfig;
use crate::sample_data::{SAMPLE_SELLERS, SAMPLE_VEHICLES};
use crate::types::{fold, search_text};

/// Fixed-width RFC 3339 (microseconds, `Z`), so TEXT ordering equals time ordering.
pub fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_ts(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    // Foreign keys are critical - fail if this doesn't work
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS sellers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            phone_e164 TEXT NOT NULL UNIQUE,
            wa_preset TEXT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS vehicles (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            brand TEXT NOT NULL,
            model TEXT NOT NULL,
            year INTEGER NOT NULL,
            price_ars INTEGER NULL,
            km INTEGER NULL,
            fuel TEXT NULL,
            gearbox TEXT NULL,
            location TEXT NULL,
            description TEXT NULL,
            images TEXT NOT NULL DEFAULT '[]',
            brand_key TEXT NOT NULL DEFAULT '',
            search_text TEXT NOT NULL DEFAULT '',
            seller_id TEXT NOT NULL,
            published INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(seller_id) REFERENCES sellers(id)
        )"#,
    )
    .execute(pool)
    .await?;

    // Folded filter columns, added to databases created before they existed
    for column in ["brand_key", "search_text"] {
        let query = format!("ALTER TABLE vehicles ADD COLUMN {} TEXT NOT NULL DEFAULT ''", column);
        if let Err(e) = sqlx::query(&query).execute(pool).await {
            match &e {
                sqlx::Error::Database(db_err) if db_err.message().to_lowercase().contains("duplicate") => {}
                _ => {
                    tracing::error!("Failed to add {} column to vehicles: {}", column, e);
                    return Err(anyhow::anyhow!("Migration failed: {}", e));
                }
            }
        }
    }
    backfill_search_columns(pool).await?;

    let indexes = [
        (
            "idx_vehicles_published_created",
            "CREATE INDEX IF NOT EXISTS idx_vehicles_published_created ON vehicles(published, created_at DESC)",
        ),
        ("idx_vehicles_brand_key", "CREATE INDEX IF NOT EXISTS idx_vehicles_brand_key ON vehicles(brand_key)"),
        ("idx_vehicles_seller", "CREATE INDEX IF NOT EXISTS idx_vehicles_seller ON vehicles(seller_id)"),
        ("idx_sellers_active_name", "CREATE INDEX IF NOT EXISTS idx_sellers_active_name ON sellers(active, name)"),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }

    Ok(())
}

/// Fills `brand_key`/`search_text` for rows written before those columns existed.
async fn backfill_search_columns(pool: &SqlitePool) -> anyhow::Result<()> {
    let rows = sqlx::query("SELECT id, title, brand, model, description FROM vehicles WHERE brand_key = ''")
        .fetch_all(pool)
        .await?;
    if rows.is_empty() {
        return Ok(());
    }
    for row in &rows {
        let id: String = row.try_get("id")?;
        let title: String = row.try_get("title")?;
        let brand: String = row.try_get("brand")?;
        let model: String = row.try_get("model")?;
        let description: Option<String> = row.try_get("description")?;
        sqlx::query("UPDATE vehicles SET brand_key = ?1, search_text = ?2 WHERE id = ?3")
            .bind(fold(&brand))
            .bind(search_text(&title, &brand, &model, description.as_deref()))
            .bind(&id)
            .execute(pool)
            .await?;
    }
    tracing::info!(rows = rows.len(), "Backfilled vehicle search columns");
    Ok(())
}

/// Loads the sample catalog into an empty or partially filled database.
///
/// Sellers are matched by phone number and vehicles by slug, so running it
/// twice changes nothing. When an owner phone is configured the owner is
/// upserted as well, taking the configured name. Returns the number of
/// vehicles inserted.
pub async fn seed(pool: &SqlitePool, contacts: &ContactsConfig) -> anyhow::Result<u64> {
    let now = encode_ts(&Utc::now());
    let mut tx = pool.begin().await?;

    if !contacts.owner_phone.trim().is_empty() {
        sqlx::query(
            r#"INSERT INTO sellers (id, name, phone_e164, wa_preset, active, created_at, updated_at)
               VALUES (?1, ?2, ?3, NULL, 1, ?4, ?4)
               ON CONFLICT(phone_e164) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at"#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&contacts.owner_name)
        .bind(contacts.owner_phone.trim())
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    // Sample seller id -> id of the row actually holding that phone number
    let mut seller_ids: HashMap<String, String> = HashMap::new();
    for seller in SAMPLE_SELLERS.iter() {
        let id: String = sqlx::query_scalar(
            r#"INSERT INTO sellers (id, name, phone_e164, wa_preset, active, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
               ON CONFLICT(phone_e164) DO UPDATE SET phone_e164 = excluded.phone_e164
               RETURNING id"#,
        )
        .bind(&seller.id)
        .bind(&seller.name)
        .bind(&seller.phone_e164)
        .bind(&seller.wa_preset)
        .bind(seller.active)
        .bind(encode_ts(&seller.created_at))
        .bind(encode_ts(&seller.updated_at))
        .fetch_one(&mut *tx)
        .await?;
        seller_ids.insert(seller.id.clone(), id);
    }

    let mut inserted = 0;
    for vehicle in SAMPLE_VEHICLES.iter() {
        let seller_id = seller_ids.get(&vehicle.seller_id).unwrap_or(&vehicle.seller_id);
        let result = sqlx::query(
            r#"INSERT INTO vehicles (id, slug, title, brand, model, year, price_ars, km, fuel, gearbox,
                   location, description, images, brand_key, search_text, seller_id, published,
                   created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
               ON CONFLICT(slug) DO NOTHING"#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&vehicle.slug)
        .bind(&vehicle.title)
        .bind(&vehicle.brand)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(vehicle.price_ars)
        .bind(vehicle.km)
        .bind(&vehicle.fuel)
        .bind(&vehicle.gearbox)
        .bind(&vehicle.location)
        .bind(&vehicle.description)
        .bind(serde_json::to_string(&vehicle.images)?)
        .bind(fold(&vehicle.brand))
        .bind(vehicle.search_text())
        .bind(seller_id)
        .bind(vehicle.published)
        .bind(encode_ts(&vehicle.created_at))
        .bind(encode_ts(&vehicle.updated_at))
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    tracing::info!(inserted, "Seed completed");
    Ok(inserted)
}
