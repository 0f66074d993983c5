use std::net::SocketAddr;
use std::time::Duration;

use crvs_auth::TokenDecoder;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{DEFAULT_SPECIFICATION_URL, SpecNamespace};
use crate::gateway::{HttpGatewayConfig, ResourceCacheConfig};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fhir: FhirSettings,
    /// Collaborating services
    #[serde(default)]
    pub services: ServicesConfig,
    /// Bearer token decoding
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WorkflowConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        validate_http_url("fhir.url", &self.fhir.url)?;
        validate_http_url("fhir.specification_url", &self.fhir.specification_url)?;
        validate_http_url("services.user_mgnt_url", &self.services.user_mgnt_url)?;
        validate_http_url("services.resources_url", &self.services.resources_url)?;
        if self.services.request_timeout_ms == 0 {
            return Err("services.request_timeout_ms must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        self.auth
            .validate()
            .map_err(|e| format!("auth config error: {e}"))?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn namespace(&self) -> SpecNamespace {
        SpecNamespace::new(self.fhir.specification_url.clone())
    }

    pub fn gateway_config(&self) -> HttpGatewayConfig {
        HttpGatewayConfig {
            fhir_url: self.fhir.url.clone(),
            user_mgnt_url: self.services.user_mgnt_url.clone(),
            resources_url: self.services.resources_url.clone(),
            request_timeout: Duration::from_millis(self.services.request_timeout_ms),
            cache: ResourceCacheConfig::default()
                .with_ttl(Duration::from_secs(self.services.cache_ttl_secs)),
        }
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("{field} is not a valid URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{field} must use http or https, got {other}")),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5050
}
fn default_body_limit() -> usize {
    2 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FhirSettings {
    /// Base URL of the FHIR store holding Tasks, Practitioners and Locations.
    #[serde(default = "default_fhir_url")]
    pub url: String,
    /// Namespace of identifier systems, extension URLs and code systems.
    #[serde(default = "default_specification_url")]
    pub specification_url: String,
}

fn default_fhir_url() -> String {
    "http://localhost:3447/fhir".into()
}
fn default_specification_url() -> String {
    DEFAULT_SPECIFICATION_URL.into()
}

impl Default for FhirSettings {
    fn default() -> Self {
        Self {
            url: default_fhir_url(),
            specification_url: default_specification_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_user_mgnt_url")]
    pub user_mgnt_url: String,
    #[serde(default = "default_resources_url")]
    pub resources_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// TTL of cached Practitioners and Locations; 0 disables the cache.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_user_mgnt_url() -> String {
    "http://localhost:3030".into()
}
fn default_resources_url() -> String {
    "http://localhost:3040".into()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            user_mgnt_url: default_user_mgnt_url(),
            resources_url: default_resources_url(),
            request_timeout_ms: default_request_timeout_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// How bearer tokens are checked.
///
/// With no key configured tokens are decoded without signature checks,
/// leaving verification to the gateway in front of the service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthSettings {
    /// RS256 public key in PEM form.
    #[serde(default)]
    pub public_key_pem: Option<String>,
    /// File holding the RS256 public key.
    #[serde(default)]
    pub public_key_path: Option<String>,
    /// HS256 secret, for development setups.
    #[serde(default)]
    pub shared_secret: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Vec<String>,
}

impl AuthSettings {
    pub fn validate(&self) -> Result<(), String> {
        let configured = [
            self.public_key_pem.is_some(),
            self.public_key_path.is_some(),
            self.shared_secret.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();
        if configured > 1 {
            return Err(
                "only one of public_key_pem, public_key_path and shared_secret may be set".into(),
            );
        }
        if self.shared_secret.as_deref().is_some_and(str::is_empty) {
            return Err("shared_secret must not be empty".into());
        }
        Ok(())
    }

    /// Builds the token decoder described by these settings.
    pub fn token_decoder(&self) -> Result<TokenDecoder, String> {
        let issuer = self.issuer.as_deref();
        if let Some(pem) = &self.public_key_pem {
            return TokenDecoder::rs256(pem, issuer, &self.audience)
                .map_err(|e| format!("auth.public_key_pem: {e}"));
        }
        if let Some(path) = &self.public_key_path {
            let pem = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read auth.public_key_path {path}: {e}"))?;
            return TokenDecoder::rs256(&pem, issuer, &self.audience)
                .map_err(|e| format!("auth.public_key_path: {e}"));
        }
        if let Some(secret) = &self.shared_secret {
            return Ok(TokenDecoder::hs256(secret.as_bytes(), issuer, &self.audience));
        }
        tracing::warn!("no token verification key configured, token signatures are not checked");
        Ok(TokenDecoder::unverified())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::WorkflowConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "crvs-workflow.toml";

    /// Loads the optional TOML file, then `CRVS__SECTION__KEY` overrides.
    pub fn load_config(path: Option<&str>) -> Result<WorkflowConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if let Some(p) = path {
            return Err(format!("config file not found: {p}"));
        }
        // e.g. CRVS__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("CRVS")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: WorkflowConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
