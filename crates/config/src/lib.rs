use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "kinnect.toml",
    "config/kinnect.toml",
    "crates/config/kinnect.toml",
    "../kinnect.toml",
    "../config/kinnect.toml",
];

/// Secret used when nothing else is configured. Refused in production.
pub const DEFAULT_JWT_SECRET: &str = "kinnect-development-secret-change-me";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: String,
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            http: HttpConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://kinnect.db".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub token_ttl_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            issuer: "kinnect".to_string(),
            audience: "kinnect-app".to_string(),
            token_ttl_seconds: 7 * 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

/// Where uploaded media bytes live.
///
/// ```
/// use kinnect_config::{StorageBackend, StorageConfig};
///
/// let storage = StorageConfig::default();
/// assert_eq!(storage.backend, StorageBackend::Local);
/// assert!(storage.public_base_url.is_none());
/// assert!(storage.bucket.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the local backend.
    pub local_root: String,
    /// Prefix prepended to object keys when building public URLs. Defaults to
    /// `/uploads` for the local backend and the bucket's virtual-host URL for S3.
    pub public_base_url: Option<String>,
    pub bucket: Option<String>,
    pub region: String,
    /// Optional endpoint for S3-compatible services such as MinIO.
    pub endpoint: Option<String>,
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_root: "uploads".to_string(),
            public_base_url: None,
            bucket: None,
            region: "us-east-1".to_string(),
            endpoint: None,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub window_seconds: u64,
    pub max_requests: u32,
    pub prefixes: Vec<String>,
    /// Key clients by the first `X-Forwarded-For` hop. Only safe behind a
    /// proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_seconds: 15 * 60,
            max_requests: 20,
            prefixes: vec![
                "/api/users/login".to_string(),
                "/api/users/register".to_string(),
            ],
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use kinnect_config::load;
///
/// std::env::remove_var("KINNECT_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let mut builder = config::Config::builder();

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("KINNECT_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via KINNECT_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(
        config::Environment::with_prefix("KINNECT")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("rate_limit.prefixes")
            .with_list_parse_key("cors.allowed_origins"),
    );

    // Deployment-style variables take precedence over everything else.
    let bucket = env_var("AWS_S3_BUCKET");
    builder = builder
        .set_override_option("auth.jwt_secret", env_var("JWT_SECRET"))?
        .set_override_option("http.port", env_var("PORT"))?
        .set_override_option("environment", env_var("NODE_ENV"))?
        .set_override_option("database.url", env_var("DATABASE_URL"))?
        .set_override_option("storage.region", env_var("AWS_REGION"))?
        .set_override_option("storage.bucket", bucket.clone())?;
    if bucket.is_some() {
        builder = builder.set_override("storage.backend", "s3")?;
    }

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    validate(&config)?;

    debug!(
        environment = %config.environment,
        port = config.http.port,
        storage = ?config.storage.backend,
        "loaded backend configuration"
    );
    Ok(config)
}

fn validate(config: &AppConfig) -> anyhow::Result<()> {
    if config.auth.jwt_secret == DEFAULT_JWT_SECRET {
        if config.is_production() {
            bail!("JWT secret must be configured in production");
        }
        warn!("using the built-in development JWT secret");
    }

    if config.storage.backend == StorageBackend::S3 && config.storage.bucket.is_none() {
        bail!("storage.bucket is required when the s3 backend is selected");
    }

    if config.storage.max_upload_bytes == 0 {
        bail!("storage.max_upload_bytes must be greater than zero");
    }

    Ok(())
}
