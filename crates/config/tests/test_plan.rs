//! Loader tests for `kinnect-config`: defaults, file discovery, layered
//! environment overrides, and the deployment-style variables.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use kinnect_config::{load, AppConfig, RateLimitConfig, StorageBackend, DEFAULT_JWT_SECRET};

const ENV_VARS_TO_RESET: &[&str] = &[
    "AWS_REGION",
    "AWS_S3_BUCKET",
    "DATABASE_URL",
    "JWT_SECRET",
    "KINNECT_CONFIG",
    "KINNECT__AUTH__JWT_SECRET",
    "KINNECT__DATABASE__URL",
    "KINNECT__HTTP__ADDRESS",
    "KINNECT__HTTP__PORT",
    "KINNECT__RATE_LIMIT__PREFIXES",
    "KINNECT__RATE_LIMIT__TRUST_FORWARDED_FOR",
    "KINNECT__STORAGE__BACKEND",
    "NODE_ENV",
    "PORT",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            vars: Vec::new(),
            original_dir: None,
        }
    }

    fn reset_environment(&mut self) {
        for key in ENV_VARS_TO_RESET {
            self.remove_var(key);
        }
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(path, contents).expect("failed to write config file");
}

fn isolated() -> (TempDir, TestContext) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());
    (temp_dir, ctx)
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let (_dir, _ctx) = isolated();

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.http.port, defaults.http.port);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(config.auth.jwt_secret, DEFAULT_JWT_SECRET);
    assert_eq!(config.auth.token_ttl_seconds, defaults.auth.token_ttl_seconds);
    assert_eq!(config.storage.backend, StorageBackend::Local);
    assert_eq!(config.rate_limit.prefixes, defaults.rate_limit.prefixes);
    assert!(!config.is_production());
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let (dir, _ctx) = isolated();

    write_config_file(dir.path(), "kinnect.toml", "[http]\nport = 4242\n");
    write_config_file(dir.path(), "config/kinnect.toml", "[http]\nport = 5151\n");

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.http.port, 4242);
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let (dir, _ctx) = isolated();

    write_config_file(
        dir.path(),
        "kinnect.toml",
        r#"
        [http]
        port = 8181

        [storage]
        max_upload_bytes = 2048
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.http.port, 8181);
    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.storage.max_upload_bytes, 2048);
    assert_eq!(config.storage.local_root, defaults.storage.local_root);
}

#[test]
#[serial]
fn load_applies_prefixed_environment_overrides() {
    let (dir, mut ctx) = isolated();

    write_config_file(dir.path(), "kinnect.toml", "[http]\nport = 3030\n");
    ctx.set_var("KINNECT__HTTP__PORT", "8080");
    ctx.set_var("KINNECT__RATE_LIMIT__PREFIXES", "/api/users/login,/api/media/upload");

    let config = load().expect("configuration load should honour env overrides");
    assert_eq!(config.http.port, 8080);
    assert_eq!(
        config.rate_limit.prefixes,
        vec!["/api/users/login".to_string(), "/api/media/upload".to_string()]
    );
}

#[test]
#[serial]
fn deployment_variables_override_prefixed_ones() {
    let (_dir, mut ctx) = isolated();

    ctx.set_var("KINNECT__HTTP__PORT", "8080");
    ctx.set_var("PORT", "9090");
    ctx.set_var("JWT_SECRET", "super-secret");
    ctx.set_var("DATABASE_URL", "sqlite://data/prod.db");

    let config = load().expect("configuration load should read deployment variables");
    assert_eq!(config.http.port, 9090);
    assert_eq!(config.auth.jwt_secret, "super-secret");
    assert_eq!(config.database.url, "sqlite://data/prod.db");
}

#[test]
#[serial]
fn bucket_variable_selects_s3_backend() {
    let (_dir, mut ctx) = isolated();

    ctx.set_var("AWS_S3_BUCKET", "kinnect-media");
    ctx.set_var("AWS_REGION", "eu-central-1");

    let config = load().expect("configuration load should accept s3 settings");
    assert_eq!(config.storage.backend, StorageBackend::S3);
    assert_eq!(config.storage.bucket.as_deref(), Some("kinnect-media"));
    assert_eq!(config.storage.region, "eu-central-1");
}

#[test]
#[serial]
fn s3_backend_without_bucket_is_rejected() {
    let (_dir, mut ctx) = isolated();

    ctx.set_var("KINNECT__STORAGE__BACKEND", "s3");

    let error = load().expect_err("s3 without a bucket should fail");
    assert!(error.to_string().contains("storage.bucket"));
}

#[test]
#[serial]
fn production_refuses_default_secret() {
    let (_dir, mut ctx) = isolated();

    ctx.set_var("NODE_ENV", "production");

    let error = load().expect_err("default secret must not be used in production");
    assert!(error.to_string().contains("JWT secret"));

    ctx.set_var("JWT_SECRET", "rotated-secret");
    let config = load().expect("explicit secret should be accepted in production");
    assert!(config.is_production());
}

#[test]
#[serial]
fn load_errors_on_invalid_toml_contents() {
    let (dir, _ctx) = isolated();

    write_config_file(dir.path(), "kinnect.toml", "[http]\nport = \"not-a-number\n");

    let error = load().expect_err("invalid TOML should cause load to fail");
    let message = error.to_string();
    assert!(
        message.contains("invalid configuration") || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn rate_limit_defaults_cover_auth_endpoints() {
    let defaults = RateLimitConfig::default();
    assert!(defaults.enabled);
    assert_eq!(defaults.window_seconds, 900);
    assert!(defaults.prefixes.iter().any(|prefix| prefix == "/api/users/login"));
}

#[test]
#[serial]
fn forwarded_for_is_ignored_unless_enabled() {
    let (_dir, mut ctx) = isolated();

    let config = load().expect("configuration load should succeed");
    assert!(!config.rate_limit.trust_forwarded_for);

    ctx.set_var("KINNECT__RATE_LIMIT__TRUST_FORWARDED_FOR", "true");
    let config = load().expect("configuration load should honour env overrides");
    assert!(config.rate_limit.trust_forwarded_for);
}
