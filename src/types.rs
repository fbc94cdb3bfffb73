use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seller {
    pub id: String,
    pub name: String,
    pub phone_e164: String,
    pub wa_preset: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A listing together with its owning seller, as every read path returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    #[serde(rename = "priceARS")]
    pub price_ars: Option<i64>,
    pub km: Option<i64>,
    pub fuel: Option<String>,
    pub gearbox: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub seller_id: String,
    pub seller: Seller,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Case folding applied to the brand filter and the search text, in SQL
/// columns and in memory alike.
pub fn fold(value: &str) -> String {
    value.to_lowercase()
}

/// Field separator in [`search_text`].
const SEARCH_FIELD_SEPARATOR: &str = "\u{1f}";

/// Folded text the `q` filter searches: title, brand, model and description.
pub fn search_text(title: &str, brand: &str, model: &str, description: Option<&str>) -> String {
    let mut fields = vec![title, brand, model];
    fields.extend(description);
    fold(&fields.join(SEARCH_FIELD_SEPARATOR))
}

impl Vehicle {
    pub fn search_text(&self) -> String {
        search_text(&self.title, &self.brand, &self.model, self.description.as_deref())
    }
}

/// Validated catalog filters. Built only through `validation::parse_filters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleFilters {
    pub q: Option<String>,
    pub brand: Option<String>,
    pub year_min: Option<i64>,
    pub year_max: Option<i64>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub page: i64,
    pub per_page: i64,
}

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 12;
pub const MAX_PER_PAGE: i64 = 50;

impl Default for VehicleFilters {
    fn default() -> Self {
        Self {
            q: None,
            brand: None,
            year_min: None,
            year_max: None,
            price_min: None,
            price_max: None,
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl VehicleFilters {
    /// Rows skipped before this page. Saturates instead of overflowing.
    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).max(0).saturating_mul(self.per_page.max(0))
    }

    /// Whether a vehicle satisfies these filters. Mirrors the SQL predicate
    /// built by the repository so sample data is filtered identically.
    pub fn matches(&self, vehicle: &Vehicle, include_drafts: bool) -> bool {
        if !include_drafts && !vehicle.published {
            return false;
        }
        if let Some(brand) = &self.brand {
            if fold(&vehicle.brand) != fold(brand) {
                return false;
            }
        }
        if let Some(q) = &self.q {
            if !vehicle.search_text().contains(&fold(q)) {
                return false;
            }
        }
        let year = i64::from(vehicle.year);
        if self.year_min.is_some_and(|min| year < min) || self.year_max.is_some_and(|max| year > max) {
            return false;
        }
        if self.price_min.is_some() || self.price_max.is_some() {
            // Unpriced listings never satisfy a price bound
            let Some(price) = vehicle.price_ars else {
                return false;
            };
            if self.price_min.is_some_and(|min| price < min) || self.price_max.is_some_and(|max| price > max) {
                return false;
            }
        }
        true
    }
}

/// `max(1, ceil(total / per_page))`
pub fn total_pages(total: i64, per_page: i64) -> i64 {
    if per_page <= 0 {
        return 1;
    }
    ((total + per_page - 1) / per_page).max(1)
}

/// Validated create/update payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleInput {
    pub title: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub price_ars: Option<i64>,
    pub km: Option<i64>,
    pub fuel: Option<String>,
    pub gearbox: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub seller_id: String,
    pub published: bool,
}

impl VehicleInput {
    pub fn search_text(&self) -> String {
        search_text(&self.title, &self.brand, &self.model, self.description.as_deref())
    }
}

/// One page of catalog results.
#[derive(Debug, Clone, PartialEq)]
pub struct VehiclePage {
    pub items: Vec<Vehicle>,
    pub total: i64,
    pub total_pages: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageLinks {
    pub prev: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleListResponse {
    pub items: Vec<Vehicle>,
    pub pagination: Pagination,
    pub fallback: bool,
    pub links: PageLinks,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDetailResponse {
    pub vehicle: Vehicle,
    pub contact_url: String,
    pub fallback: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SellersResponse {
    pub sellers: Vec<Seller>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
    pub path: String,
}
