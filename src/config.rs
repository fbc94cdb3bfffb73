use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL. Empty disables the primary store (demo mode).
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub connect_attempts: u32,
    pub connect_retry_delay_ms: u64,
    #[serde(default)]
    pub seed_on_start: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub url: String,
    pub anon_key: String,
    pub service_role: String,
    pub bucket: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub url: String,
    pub primary_color: String,
    pub secondary_color: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactsConfig {
    pub owner_name: String,
    pub owner_phone: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub admin: AdminConfig,
    pub site: SiteConfig,
    pub contacts: ContactsConfig,
    pub security: Option<SecurityConfig>,
}

/// Runtime decisions derived once from the configuration, so handlers never
/// inspect raw settings to find out what is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeFlags {
    pub has_db: bool,
    pub has_storage: bool,
    pub has_admin: bool,
    pub fallback: bool,
}

const DEFAULT_SITE_URL: &str = "https://example.com";

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

impl AppConfig {
    pub fn has_db(&self) -> bool {
        !self.database.url.trim().is_empty()
    }

    pub fn has_storage(&self) -> bool {
        let s = &self.storage;
        !s.url.trim().is_empty()
            && !s.anon_key.trim().is_empty()
            && !s.service_role.trim().is_empty()
            && !s.bucket.trim().is_empty()
    }

    pub fn has_admin(&self) -> bool {
        !self.admin.token.is_empty()
    }

    pub fn flags(&self) -> RuntimeFlags {
        RuntimeFlags {
            has_db: self.has_db(),
            has_storage: self.has_storage(),
            has_admin: self.has_admin(),
            fallback: !self.has_db(),
        }
    }

    /// Site origin without query, fragment or trailing slash.
    pub fn site_base_url(&self) -> String {
        match url::Url::parse(self.site.url.trim()) {
            Ok(mut url) => {
                url.set_query(None);
                url.set_fragment(None);
                url.to_string().trim_end_matches('/').to_string()
            }
            Err(_) => DEFAULT_SITE_URL.to_string(),
        }
    }

    /// Canonical absolute URL for a site path; `vehicle/x` and `/vehicle/x` are equivalent.
    pub fn canonical_url(&self, path: &str) -> String {
        let base = self.site_base_url();
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        // Optional local file: dealership.toml (in CWD)
        .add_source(::config::File::with_name("dealership").required(false));

    if let Ok(custom_path) = std::env::var("DEALERSHIP_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("DEALERSHIP").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    // Database
    let db_url = cfg.database.url.trim();
    if !db_url.is_empty() && !db_url.starts_with("sqlite:") {
        return Err(anyhow::anyhow!("database.url must be a sqlite: URL, got {}", db_url));
    }
    if cfg.database.max_connections == 0 || cfg.database.max_connections > 64 {
        return Err(anyhow::anyhow!("database.max_connections must be in 1..=64"));
    }
    if cfg.database.connect_attempts == 0 {
        return Err(anyhow::anyhow!("database.connect_attempts must be > 0"));
    }
    if cfg.database.acquire_timeout_secs == 0 {
        return Err(anyhow::anyhow!("database.acquire_timeout_secs must be > 0"));
    }

    // Storage
    let storage_url = cfg.storage.url.trim();
    if !storage_url.is_empty() && !is_http_url(storage_url) {
        return Err(anyhow::anyhow!("storage.url is not a valid http(s) URL: {}", storage_url));
    }
    if !cfg.storage.anon_key.is_empty() && cfg.storage.anon_key.len() < 10 {
        return Err(anyhow::anyhow!("storage.anon_key must be at least 10 characters"));
    }
    if !cfg.storage.service_role.is_empty() && cfg.storage.service_role.len() < 10 {
        return Err(anyhow::anyhow!("storage.service_role must be at least 10 characters"));
    }
    if cfg.storage.max_upload_bytes == 0 || cfg.storage.max_upload_bytes > 50 * 1024 * 1024 {
        return Err(anyhow::anyhow!("storage.max_upload_bytes must be in 1..=52428800"));
    }

    // Admin
    if !cfg.admin.token.is_empty() && cfg.admin.token.chars().count() < 16 {
        return Err(anyhow::anyhow!("admin.token must be at least 16 characters when set"));
    }

    // Site
    if !is_http_url(cfg.site.url.trim()) {
        return Err(anyhow::anyhow!("site.url is not a valid http(s) URL: {}", cfg.site.url));
    }
    for (field, value) in
        [("site.primary_color", &cfg.site.primary_color), ("site.secondary_color", &cfg.site.secondary_color)]
    {
        if !is_hex_color(value) {
            return Err(anyhow::anyhow!("{} must be #rgb or #rrggbb, got {}", field, value));
        }
    }

    Ok(())
}

fn is_http_url(raw: &str) -> bool {
    url::Url::parse(raw).map(|u| matches!(u.scheme(), "http" | "https")).unwrap_or(false)
}

pub fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    let path = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"));
    if let Some(path) = path {
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() || path.starts_with(":memory:") {
            return Ok(());
        }
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
