use serde::Deserialize;
use url::Url;

use crate::carrier::Carrier;

pub const DEFAULT_SHIPPO_BASE_URL: &str = "https://api.goshippo.com";
pub const DEFAULT_DHL_BASE_URL: &str = "https://wsbexpress.dhl.com/rest/sndpt";
pub const DEFAULT_POSTMEN_BASE_URL: &str = "https://production-api.postmen.com/v3";
pub const DEFAULT_AFTERSHIP_BASE_URL: &str = "https://api.aftership.com/v4";

/// Base URL and API key of a token-authenticated service.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySettings {
    pub base_url: String,
    pub api_key: String,
}

/// DHL uses HTTP basic auth.
#[derive(Debug, Clone, Deserialize)]
pub struct DhlSettings {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub carrier_timeout_secs: u64,
    pub shippo: Option<ApiKeySettings>,
    pub dhl: Option<DhlSettings>,
    pub postmen: Option<ApiKeySettings>,
    /// AfterShip serves Postmen's tracking operations.
    pub aftership: Option<ApiKeySettings>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            carrier_timeout_secs: std::env::var("CARRIER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("CARRIER_TIMEOUT_SECS must be a number of seconds"))
                .and_then(|secs: u64| {
                    if secs == 0 {
                        anyhow::bail!("CARRIER_TIMEOUT_SECS must be greater than zero");
                    }
                    Ok(secs)
                })?,
            shippo: api_key_settings("SHIPPO_BASE_URL", DEFAULT_SHIPPO_BASE_URL, "SHIPPO_TOKEN")?,
            dhl: match (optional_var("DHL_USERNAME"), optional_var("DHL_PASSWORD")) {
                (Some(username), Some(password)) => Some(DhlSettings {
                    base_url: base_url("DHL_BASE_URL", DEFAULT_DHL_BASE_URL)?,
                    username,
                    password,
                }),
                (None, None) => None,
                _ => anyhow::bail!("DHL_USERNAME and DHL_PASSWORD must be set together"),
            },
            postmen: api_key_settings(
                "POSTMEN_BASE_URL",
                DEFAULT_POSTMEN_BASE_URL,
                "POSTMEN_API_KEY",
            )?,
            aftership: api_key_settings(
                "AFTERSHIP_BASE_URL",
                DEFAULT_AFTERSHIP_BASE_URL,
                "AFTERSHIP_API_KEY",
            )?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        for carrier in Carrier::ALL {
            if config.is_configured(carrier) {
                tracing::info!("Carrier {} enabled", carrier);
            } else {
                tracing::warn!("Carrier {} has no credentials and is disabled", carrier);
            }
        }
        if let Some(ref shippo) = config.shippo {
            tracing::debug!("Shippo Base URL: {}", shippo.base_url);
        }
        if let Some(ref dhl) = config.dhl {
            tracing::debug!("DHL Base URL: {}", dhl.base_url);
        }
        if let Some(ref postmen) = config.postmen {
            tracing::debug!("Postmen Base URL: {}", postmen.base_url);
        }
        if let Some(ref aftership) = config.aftership {
            tracing::debug!("AfterShip Base URL: {}", aftership.base_url);
        }
        tracing::debug!("Carrier timeout: {}s", config.carrier_timeout_secs);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Whether the credentials `carrier` needs are present.
    pub fn is_configured(&self, carrier: Carrier) -> bool {
        match carrier {
            Carrier::Dhl => self.dhl.is_some(),
            Carrier::Shippo => self.shippo.is_some(),
            Carrier::Postmen => self.postmen.is_some(),
        }
    }

    /// Configuration with no carrier enabled.
    pub fn empty() -> Self {
        Self {
            port: 3000,
            carrier_timeout_secs: 30,
            shippo: None,
            dhl: None,
            postmen: None,
            aftership: None,
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn base_url(var: &str, default: &str) -> anyhow::Result<String> {
    let url = optional_var(var).unwrap_or_else(|| default.to_string());
    validate_base_url(var, &url)?;
    Ok(url)
}

/// Checks that `url` is an absolute http(s) URL.
pub fn validate_base_url(var: &str, url: &str) -> anyhow::Result<()> {
    let parsed = Url::parse(url).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", var, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", var);
    }
    Ok(())
}

fn api_key_settings(
    url_var: &str,
    default_url: &str,
    key_var: &str,
) -> anyhow::Result<Option<ApiKeySettings>> {
    match optional_var(key_var) {
        Some(api_key) => Ok(Some(ApiKeySettings {
            base_url: base_url(url_var, default_url)?,
            api_key,
        })),
        None => Ok(None),
    }
}
