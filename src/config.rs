//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub attribution: AttributionConfig,
    pub orders: OrdersConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Exact storefront origin allowed by CORS.
    pub allowed_origin: String,
}

/// PIX gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Attribution service configuration. The token is optional: without it the
/// forwarder degrades to a logged no-op instead of blocking startup.
#[derive(Debug, Clone)]
pub struct AttributionConfig {
    pub api_token: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Order lifecycle store configuration
#[derive(Debug, Clone)]
pub struct OrdersConfig {
    /// Absolute lifetime of any record in the store.
    pub lifetime: Duration,
    /// Gateway PIX payment window; pending records older than this are
    /// reported expired by the status endpoint ahead of the reaper.
    pub pix_expiry: Duration,
    /// How often the reaper wakes up.
    pub reap_interval: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            gateway: GatewayConfig::from_env()?,
            attribution: AttributionConfig::from_env()?,
            orders: OrdersConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.gateway.validate()?;
        self.attribution.validate()?;
        self.orders.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
            allowed_origin: env::var("ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("PORT cannot be 0".to_string()));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue("HOST cannot be empty".to_string()));
        }

        if self.allowed_origin.is_empty() {
            return Err(ConfigError::InvalidValue(
                "ALLOWED_ORIGIN cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(GatewayConfig {
            api_key: env::var("GATEWAY_API_KEY")
                .map_err(|_| ConfigError::MissingVariable("GATEWAY_API_KEY".to_string()))?,
            base_url: env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.realtechdev.com.br/v1".to_string()),
            timeout_secs: env::var("GATEWAY_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GATEWAY_TIMEOUT_SECONDS".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_API_KEY cannot be empty".to_string(),
            ));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_BASE_URL must be a valid URL".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_TIMEOUT_SECONDS".to_string(),
            ));
        }

        Ok(())
    }
}

impl AttributionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(AttributionConfig {
            api_token: env::var("ATTRIBUTION_API_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            base_url: env::var("ATTRIBUTION_BASE_URL")
                .unwrap_or_else(|_| "https://api.utmify.com.br/api-credentials".to_string()),
            timeout_secs: env::var("ATTRIBUTION_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("ATTRIBUTION_TIMEOUT_SECONDS".to_string())
                })?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "ATTRIBUTION_BASE_URL must be a valid URL".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "ATTRIBUTION_TIMEOUT_SECONDS".to_string(),
            ));
        }

        Ok(())
    }
}

impl OrdersConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let lifetime_minutes: u64 = env::var("ORDER_LIFETIME_MINUTES")
            .unwrap_or_else(|_| "35".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("ORDER_LIFETIME_MINUTES".to_string()))?;
        let pix_expiry_minutes: u64 = env::var("PIX_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PIX_EXPIRY_MINUTES".to_string()))?;
        let reap_interval_secs: u64 = env::var("REAP_INTERVAL_SECONDS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("REAP_INTERVAL_SECONDS".to_string()))?;

        Ok(OrdersConfig {
            lifetime: Duration::from_secs(lifetime_minutes * 60),
            pix_expiry: Duration::from_secs(pix_expiry_minutes * 60),
            reap_interval: Duration::from_secs(reap_interval_secs),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "ORDER_LIFETIME_MINUTES cannot be 0".to_string(),
            ));
        }

        if self.pix_expiry >= self.lifetime {
            return Err(ConfigError::InvalidValue(
                "PIX_EXPIRY_MINUTES must be < ORDER_LIFETIME_MINUTES".to_string(),
            ));
        }

        if self.reap_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "REAP_INTERVAL_SECONDS cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}
