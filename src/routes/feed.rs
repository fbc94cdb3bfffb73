//! Crawler feeds: `sitemap.xml` and `robots.txt`.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use chrono::{SecondsFormat, Utc};

use crate::state::AppState;

const FEED_CACHE: &str = "public, max-age=3600";

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn url_entry(out: &mut String, loc: &str, lastmod: &str, priority: &str) {
    out.push_str("  <url>\n");
    out.push_str(&format!("    <loc>{}</loc>\n", xml_escape(loc)));
    out.push_str(&format!("    <lastmod>{}</lastmod>\n", lastmod));
    out.push_str("    <changefreq>weekly</changefreq>\n");
    out.push_str(&format!("    <priority>{}</priority>\n", priority));
    out.push_str("  </url>\n");
}

/// Home page plus one entry per published vehicle.
pub async fn sitemap(State(state): State<AppState>) -> impl IntoResponse {
    let fetched = state.repo.fetch_all_vehicles(false).await;
    state.metrics.record_read(fetched.is_fallback());

    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    url_entry(&mut body, &state.config.canonical_url("/"), &now, "1.0");
    for vehicle in fetched.into_inner() {
        let loc = state.config.canonical_url(&format!("/vehicle/{}", vehicle.slug));
        let lastmod = vehicle.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        url_entry(&mut body, &loc, &lastmod, "0.6");
    }
    body.push_str("</urlset>\n");

    ([(header::CONTENT_TYPE, "application/xml; charset=utf-8"), (header::CACHE_CONTROL, FEED_CACHE)], body)
}

pub async fn robots(State(state): State<AppState>) -> impl IntoResponse {
    let body = format!(
        "User-agent: *\nAllow: /\nDisallow: /admin\nDisallow: /api\nDisallow: /uploads\n\nSitemap: {}\n",
        state.config.canonical_url("/sitemap.xml")
    );
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8"), (header::CACHE_CONTROL, FEED_CACHE)], body)
}
