//! Vehicle and seller queries.
//!
//! Every read has a fallback: if the store is unconfigured, unreachable or a
//! query fails, the same predicates run over the in-memory sample catalog and
//! the result is tagged [`Fetched::Fallback`]. Writes never fall back.

use anyhow::anyhow;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};

use crate::db::{decode_ts, encode_ts};
use crate::error::{AppError, AppResult, OptionExt};
use crate::sample_data::{SAMPLE_SELLERS, SAMPLE_VEHICLES};
use crate::slug;
use crate::store::{Store, StoreError};
use crate::types::{fold, total_pages, Seller, Vehicle, VehicleFilters, VehicleInput, VehiclePage};

/// Upper bound on `base-N` candidates probed for a free slug.
const MAX_SLUG_CANDIDATES: u32 = 1000;
/// Insert/update retries after losing a slug race to a concurrent writer.
const MAX_SLUG_RETRIES: u32 = 5;

const LIKE_ESCAPE: char = '!';

const VEHICLE_SELECT: &str = "SELECT v.id, v.slug, v.title, v.brand, v.model, v.year, v.price_ars, v.km, \
     v.fuel, v.gearbox, v.location, v.description, v.images, v.seller_id, v.published, \
     v.created_at, v.updated_at, \
     s.name AS seller_name, s.phone_e164 AS seller_phone, s.wa_preset AS seller_wa_preset, \
     s.active AS seller_active, s.created_at AS seller_created_at, s.updated_at AS seller_updated_at \
     FROM vehicles v JOIN sellers s ON s.id = v.seller_id";

/// Where a read result came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    /// Served by the primary store.
    Live(T),
    /// Served from the sample catalog because the store failed.
    Fallback(T),
}

impl<T> Fetched<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Fetched::Fallback(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Fetched::Live(v) | Fetched::Fallback(v) => v,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Live(v) => Fetched::Live(f(v)),
            Fetched::Fallback(v) => Fetched::Fallback(f(v)),
        }
    }
}

fn escape_like_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(ch);
    }
    out
}

/// Appends the catalog predicates for `filters` as a WHERE clause.
fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filters: &VehicleFilters, include_drafts: bool) {
    qb.push(" WHERE 1 = 1");
    if !include_drafts {
        qb.push(" AND v.published = 1");
    }
    // Both sides are folded in Rust; SQLite's LOWER and LIKE only fold ASCII
    if let Some(brand) = &filters.brand {
        qb.push(" AND v.brand_key = ").push_bind(fold(brand));
    }
    if let Some(q) = &filters.q {
        let pattern = format!("%{}%", escape_like_pattern(&fold(q)));
        qb.push(" AND v.search_text LIKE ").push_bind(pattern).push(" ESCAPE '!'");
    }
    if let Some(min) = filters.year_min {
        qb.push(" AND v.year >= ").push_bind(min);
    }
    if let Some(max) = filters.year_max {
        qb.push(" AND v.year <= ").push_bind(max);
    }
    // NULL comparisons are never true, so unpriced rows drop out here
    if let Some(min) = filters.price_min {
        qb.push(" AND v.price_ars >= ").push_bind(min);
    }
    if let Some(max) = filters.price_max {
        qb.push(" AND v.price_ars <= ").push_bind(max);
    }
}

fn map_vehicle(row: &SqliteRow) -> Result<Vehicle, sqlx::Error> {
    let images_raw: String = row.try_get("images")?;
    let images: Vec<String> =
        serde_json::from_str(&images_raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    let seller_id: String = row.try_get("seller_id")?;

    Ok(Vehicle {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        brand: row.try_get("brand")?,
        model: row.try_get("model")?,
        year: row.try_get("year")?,
        price_ars: row.try_get("price_ars")?,
        km: row.try_get("km")?,
        fuel: row.try_get("fuel")?,
        gearbox: row.try_get("gearbox")?,
        location: row.try_get("location")?,
        description: row.try_get("description")?,
        images,
        seller: Seller {
            id: seller_id.clone(),
            name: row.try_get("seller_name")?,
            phone_e164: row.try_get("seller_phone")?,
            wa_preset: row.try_get("seller_wa_preset")?,
            active: row.try_get("seller_active")?,
            created_at: decode_ts(row.try_get::<&str, _>("seller_created_at")?)?,
            updated_at: decode_ts(row.try_get::<&str, _>("seller_updated_at")?)?,
        },
        seller_id,
        published: row.try_get("published")?,
        created_at: decode_ts(row.try_get::<&str, _>("created_at")?)?,
        updated_at: decode_ts(row.try_get::<&str, _>("updated_at")?)?,
    })
}

fn map_seller(row: &SqliteRow) -> Result<Seller, sqlx::Error> {
    Ok(Seller {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        phone_e164: row.try_get("phone_e164")?,
        wa_preset: row.try_get("wa_preset")?,
        active: row.try_get("active")?,
        created_at: decode_ts(row.try_get::<&str, _>("created_at")?)?,
        updated_at: decode_ts(row.try_get::<&str, _>("updated_at")?)?,
    })
}

/// Newest first, id descending on equal timestamps.
fn sort_newest_first(vehicles: &mut [Vehicle]) {
    vehicles.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

fn sample_page(filters: &VehicleFilters, include_drafts: bool) -> VehiclePage {
    let mut matching: Vec<Vehicle> =
        SAMPLE_VEHICLES.iter().filter(|v| filters.matches(v, include_drafts)).cloned().collect();
    sort_newest_first(&mut matching);
    let total = matching.len() as i64;
    let items = matching
        .into_iter()
        .skip(filters.offset().max(0) as usize)
        .take(filters.per_page.max(0) as usize)
        .collect();
    VehiclePage {
        items,
        total,
        total_pages: total_pages(total, filters.per_page),
        page: filters.page,
        per_page: filters.per_page,
    }
}

/// Persisted column values of a vehicle, as written by create/update.
struct VehicleRecord<'a> {
    id: &'a str,
    slug: &'a str,
    input: &'a VehicleInput,
    images: String,
    updated_at: String,
}

#[derive(Clone)]
pub struct VehicleRepository {
    store: Store,
}

impl VehicleRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// One page of the catalog, newest first.
    pub async fn fetch_vehicles(&self, filters: &VehicleFilters, include_drafts: bool) -> Fetched<VehiclePage> {
        match self.query_vehicles(filters, include_drafts).await {
            Ok(page) => Fetched::Live(page),
            Err(e) => {
                tracing::warn!(error = %e, "Catalog query failed, serving sample data");
                Fetched::Fallback(sample_page(filters, include_drafts))
            }
        }
    }

    /// Looks a vehicle up by slug. Sample data only yields published vehicles.
    pub async fn fetch_vehicle_by_slug(&self, slug: &str) -> Fetched<Option<Vehicle>> {
        match self.query_one("v.slug", slug).await {
            Ok(vehicle) => Fetched::Live(vehicle),
            Err(e) => {
                tracing::warn!(error = %e, slug, "Vehicle lookup failed, serving sample data");
                Fetched::Fallback(SAMPLE_VEHICLES.iter().find(|v| v.published && v.slug == slug).cloned())
            }
        }
    }

    pub async fn fetch_vehicle_by_id(&self, id: &str) -> Fetched<Option<Vehicle>> {
        match self.query_one("v.id", id).await {
            Ok(vehicle) => Fetched::Live(vehicle),
            Err(e) => {
                tracing::warn!(error = %e, id, "Vehicle lookup failed, serving sample data");
                Fetched::Fallback(SAMPLE_VEHICLES.iter().find(|v| v.id == id).cloned())
            }
        }
    }

    /// Active sellers ordered by name.
    pub async fn fetch_active_sellers(&self) -> Fetched<Vec<Seller>> {
        match self.query_active_sellers().await {
            Ok(sellers) => Fetched::Live(sellers),
            Err(e) => {
                tracing::warn!(error = %e, "Seller query failed, serving sample data");
                let mut sellers: Vec<Seller> = SAMPLE_SELLERS.iter().filter(|s| s.active).cloned().collect();
                sellers.sort_by(|a, b| a.name.cmp(&b.name));
                Fetched::Fallback(sellers)
            }
        }
    }

    /// The whole catalog, unpaginated, newest first.
    pub async fn fetch_all_vehicles(&self, include_drafts: bool) -> Fetched<Vec<Vehicle>> {
        match self.query_all(include_drafts).await {
            Ok(vehicles) => Fetched::Live(vehicles),
            Err(e) => {
                tracing::warn!(error = %e, "Catalog query failed, serving sample data");
                let mut vehicles: Vec<Vehicle> =
                    SAMPLE_VEHICLES.iter().filter(|v| include_drafts || v.published).cloned().collect();
                sort_newest_first(&mut vehicles);
                Fetched::Fallback(vehicles)
            }
        }
    }

    async fn query_vehicles(&self, filters: &VehicleFilters, include_drafts: bool) -> Result<VehiclePage, StoreError> {
        let pool = self.store.pool().await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) AS cnt FROM vehicles v");
        push_filters(&mut count, filters, include_drafts);
        let total: i64 = count.build().fetch_one(pool).await?.try_get("cnt")?;

        let mut qb = QueryBuilder::new(VEHICLE_SELECT);
        push_filters(&mut qb, filters, include_drafts);
        qb.push(" ORDER BY v.created_at DESC, v.id DESC LIMIT ")
            .push_bind(filters.per_page)
            .push(" OFFSET ")
            .push_bind(filters.offset());
        let rows = qb.build().fetch_all(pool).await?;
        let items = rows.iter().map(map_vehicle).collect::<Result<Vec<_>, _>>()?;

        Ok(VehiclePage {
            items,
            total,
            total_pages: total_pages(total, filters.per_page),
            page: filters.page,
            per_page: filters.per_page,
        })
    }

    /// `column` is one of the fixed key columns, never user input.
    async fn query_one(&self, column: &'static str, value: &str) -> Result<Option<Vehicle>, StoreError> {
        let pool = self.store.pool().await?;
        let mut qb = QueryBuilder::new(VEHICLE_SELECT);
        qb.push(" WHERE ").push(column).push(" = ").push_bind(value.to_string());
        let row = qb.build().fetch_optional(pool).await?;
        Ok(row.as_ref().map(map_vehicle).transpose()?)
    }

    async fn query_all(&self, include_drafts: bool) -> Result<Vec<Vehicle>, StoreError> {
        let pool = self.store.pool().await?;
        let mut qb = QueryBuilder::new(VEHICLE_SELECT);
        if !include_drafts {
            qb.push(" WHERE v.published = 1");
        }
        qb.push(" ORDER BY v.created_at DESC, v.id DESC");
        let rows = qb.build().fetch_all(pool).await?;
        Ok(rows.iter().map(map_vehicle).collect::<Result<Vec<_>, _>>()?)
    }

    async fn query_active_sellers(&self) -> Result<Vec<Seller>, StoreError> {
        let pool = self.store.pool().await?;
        let rows = sqlx::query(
            "SELECT id, name, phone_e164, wa_preset, active, created_at, updated_at \
             FROM sellers WHERE active = 1 ORDER BY name ASC, id ASC",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.iter().map(map_seller).collect::<Result<Vec<_>, _>>()?)
    }

    /// Creates a listing with a freshly assigned slug.
    pub async fn create_vehicle(&self, input: &VehicleInput) -> AppResult<Vehicle> {
        let pool = self.store.pool().await?;
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = encode_ts(&Utc::now());
        let base = base_slug(input);

        for attempt in 0..MAX_SLUG_RETRIES {
            let slug = available_slug(pool, &base, None).await?;
            let record = VehicleRecord {
                id: &id,
                slug: &slug,
                input,
                images: serde_json::to_string(&input.images).map_err(|e| anyhow!(e))?,
                updated_at: created_at.clone(),
            };
            match insert_vehicle(pool, &record, &created_at).await {
                Ok(()) => {
                    tracing::info!(%id, %slug, "Vehicle created");
                    return self.query_one("v.id", &id).await?.ok_or_not_found("Vehicle");
                }
                Err(e) if e.is_unique_violation() => {
                    tracing::warn!(attempt, %slug, "Slug taken concurrently, retrying");
                }
                Err(e) => return Err(write_error(e)),
            }
        }
        Err(AppError::Internal(anyhow!("could not assign a unique slug for {}", base)))
    }

    /// Replaces every field of an existing listing. The slug is recomputed
    /// only when brand, model or year change.
    pub async fn update_vehicle(&self, id: &str, input: &VehicleInput) -> AppResult<Vehicle> {
        let pool = self.store.pool().await?;
        let current = sqlx::query("SELECT slug, brand, model, year FROM vehicles WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(StoreError::from)?
            .ok_or_not_found("Vehicle")?;

        let current_slug: String = current.try_get("slug")?;
        let identity_changed = current.try_get::<String, _>("brand")? != input.brand
            || current.try_get::<String, _>("model")? != input.model
            || current.try_get::<i32, _>("year")? != input.year;
        let base = base_slug(input);

        for attempt in 0..MAX_SLUG_RETRIES {
            let slug = if identity_changed {
                available_slug(pool, &base, Some(id)).await?
            } else {
                current_slug.clone()
            };
            let record = VehicleRecord {
                id,
                slug: &slug,
                input,
                images: serde_json::to_string(&input.images).map_err(|e| anyhow!(e))?,
                updated_at: encode_ts(&Utc::now()),
            };
            match update_record(pool, &record).await {
                Ok(0) => return Err(AppError::NotFound("Vehicle not found".to_string())),
                Ok(_) => {
                    tracing::info!(%id, %slug, "Vehicle updated");
                    return self.query_one("v.id", id).await?.ok_or_not_found("Vehicle");
                }
                Err(e) if e.is_unique_violation() && identity_changed => {
                    tracing::warn!(attempt, %slug, "Slug taken concurrently, retrying");
                }
                Err(e) => return Err(write_error(e)),
            }
        }
        Err(AppError::Internal(anyhow!("could not assign a unique slug for {}", base)))
    }
}

fn base_slug(input: &VehicleInput) -> String {
    let base = slug::vehicle_slug(&input.brand, &input.model, input.year);
    if base.is_empty() {
        slug::slugify(&["vehicle", input.year.to_string().as_str()])
    } else {
        base
    }
}

fn write_error(err: StoreError) -> AppError {
    if err.is_foreign_key_violation() {
        return AppError::field("sellerId", "Unknown seller");
    }
    AppError::from(err)
}

/// First of `base`, `base-1`, `base-2`, ... not used by a vehicle other than `exclude_id`.
async fn available_slug(pool: &SqlitePool, base: &str, exclude_id: Option<&str>) -> Result<String, StoreError> {
    for attempt in 0..MAX_SLUG_CANDIDATES {
        let candidate = slug::candidate(base, attempt);
        let taken: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM vehicles WHERE slug = ?1 AND (?2 IS NULL OR id <> ?2) LIMIT 1",
        )
        .bind(&candidate)
        .bind(exclude_id)
        .fetch_optional(pool)
        .await?;
        if taken.is_none() {
            return Ok(candidate);
        }
    }
    Err(StoreError::Query(sqlx::Error::Protocol(format!("no free slug for {}", base))))
}

async fn insert_vehicle(pool: &SqlitePool, record: &VehicleRecord<'_>, created_at: &str) -> Result<(), StoreError> {
    let input = record.input;
    sqlx::query(
        r#"INSERT INTO vehicles (id, slug, title, brand, model, year, price_ars, km, fuel, gearbox,
               location, description, images, brand_key, search_text, seller_id, published,
               created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"#,
    )
    .bind(record.id)
    .bind(record.slug)
    .bind(&input.title)
    .bind(&input.brand)
    .bind(&input.model)
    .bind(input.year)
    .bind(input.price_ars)
    .bind(input.km)
    .bind(&input.fuel)
    .bind(&input.gearbox)
    .bind(&input.location)
    .bind(&input.description)
    .bind(&record.images)
    .bind(fold(&input.brand))
    .bind(input.search_text())
    .bind(&input.seller_id)
    .bind(input.published)
    .bind(created_at)
    .bind(&record.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

async fn update_record(pool: &SqlitePool, record: &VehicleRecord<'_>) -> Result<u64, StoreError> {
    let input = record.input;
    let result = sqlx::query(
        r#"UPDATE vehicles SET slug = ?2, title = ?3, brand = ?4, model = ?5, year = ?6, price_ars = ?7,
               km = ?8, fuel = ?9, gearbox = ?10, location = ?11, description = ?12, images = ?13,
               brand_key = ?14, search_text = ?15,
               seller_id = ?16, published = ?17, updated_at = ?18
           WHERE id = ?1"#,
    )
    .bind(record.id)
    .bind(record.slug)
    .bind(&input.title)
    .bind(&input.brand)
    .bind(&input.model)
    .bind(input.year)
    .bind(input.price_ars)
    .bind(input.km)
    .bind(&input.fuel)
    .bind(&input.gearbox)
    .bind(&input.location)
    .bind(&input.description)
    .bind(&record.images)
    .bind(fold(&input.brand))
    .bind(input.search_text())
    .bind(&input.seller_id)
    .bind(input.published)
    .bind(&record.updated_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_pattern() {
        assert_eq!(escape_like_pattern("100%_off!"), "100!%!_off!!");
        assert_eq!(escape_like_pattern("fiesta"), "fiesta");
    }

    #[test]
    fn test_fetched_helpers() {
        let live = Fetched::Live(2);
        assert!(!live.is_fallback());
        let fallback = Fetched::Fallback(2).map(|v| v * 10);
        assert!(fallback.is_fallback());
        assert_eq!(fallback.into_inner(), 20);
    }

    #[test]
    fn test_sample_page_is_newest_first() {
        let page = sample_page(&VehicleFilters::default(), false);
        assert_eq!(page.total, page.items.len() as i64);
        for pair in page.items.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
        assert_eq!(page.total_pages, 1);
    }
}
