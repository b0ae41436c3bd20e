use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use reqwest::Method;
use serde_json::{json, Map, Value};
use url::Url;

use crate::carrier::{Carrier, Operation};
use crate::config::Config;
use crate::errors::ShippingError;
use crate::formatters::{self, dhl};

/// Sends formatted wire payloads to carriers.
pub trait CarrierClient: Send + Sync {
    /// Performs `operation` against `carrier` with an already formatted
    /// payload and returns the carrier's raw response.
    fn call(
        &self,
        carrier: Carrier,
        operation: Operation,
        payload: &Value,
    ) -> impl Future<Output = Result<Value, ShippingError>> + Send;
}

/// Remote API a call lands on. Postmen's tracking operations go to AfterShip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Shippo,
    Dhl,
    Postmen,
    AfterShip,
}

/// HTTP method and path template of one carrier operation.
///
/// `{name}` segments are filled from the payload key `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub service: Service,
    pub method: Method,
    pub path: &'static str,
}

impl Endpoint {
    fn new(service: Service, method: Method, path: &'static str) -> Option<Self> {
        Some(Self {
            service,
            method,
            path,
        })
    }
}

/// Endpoint for `operation` on `carrier`, or `None` if the carrier lacks it.
pub fn endpoint(carrier: Carrier, operation: Operation) -> Option<Endpoint> {
    use Operation::*;
    match carrier {
        Carrier::Dhl => match operation {
            CreateShipment => Endpoint::new(Service::Dhl, Method::POST, "/ShipmentRequest"),
            Rates => Endpoint::new(Service::Dhl, Method::POST, "/RateRequest"),
            Trackings | TrackingStatus => {
                Endpoint::new(Service::Dhl, Method::POST, "/TrackingRequest")
            }
            Shipments | Labels | CreateLabel | CancelOrDeleteLabel | Manifests | Manifest
            | CreateManifest | CreateTracking | ValidateAddress | CreateAddress => None,
        },
        Carrier::Shippo => {
            let (method, path) = match operation {
                Shipments => (Method::GET, "/shipments/"),
                CreateShipment => (Method::POST, "/shipments/"),
                Rates => (Method::GET, "/shipments/{shipment_id}/rates/"),
                Labels => (Method::GET, "/transactions/"),
                CreateLabel => (Method::POST, "/transactions/"),
                CancelOrDeleteLabel => (Method::POST, "/refunds/"),
                Manifests => (Method::GET, "/manifests/"),
                Manifest => (Method::GET, "/manifests/{manifest_id}"),
                CreateManifest => (Method::POST, "/manifests/"),
                TrackingStatus => (Method::GET, "/tracks/{carrier}/{tracking_number}"),
                CreateTracking => (Method::POST, "/tracks/"),
                ValidateAddress | CreateAddress => (Method::POST, "/addresses/"),
                Trackings => return None,
            };
            Endpoint::new(Service::Shippo, method, path)
        }
        Carrier::Postmen => match operation {
            Rates => Endpoint::new(Service::Postmen, Method::POST, "/rates"),
            Labels => Endpoint::new(Service::Postmen, Method::GET, "/labels"),
            CreateLabel => Endpoint::new(Service::Postmen, Method::POST, "/labels"),
            CancelOrDeleteLabel => Endpoint::new(Service::Postmen, Method::POST, "/cancel-labels"),
            Manifests => Endpoint::new(Service::Postmen, Method::GET, "/manifests"),
            Manifest => Endpoint::new(Service::Postmen, Method::GET, "/manifests/{manifest_id}"),
            CreateManifest => Endpoint::new(Service::Postmen, Method::POST, "/manifests"),
            Trackings => Endpoint::new(Service::AfterShip, Method::GET, "/trackings"),
            TrackingStatus => Endpoint::new(
                Service::AfterShip,
                Method::GET,
                "/trackings/{slug}/{tracking_number}",
            ),
            CreateTracking => Endpoint::new(Service::AfterShip, Method::POST, "/trackings"),
            Shipments | CreateShipment | ValidateAddress | CreateAddress => None,
        },
    }
}

#[derive(Clone)]
enum Credentials {
    Header(&'static str, String),
    Basic { username: String, password: String },
}

#[derive(Clone)]
struct Target {
    base_url: Url,
    credentials: Credentials,
}

impl Target {
    fn new(var: &str, base_url: &str, credentials: Credentials) -> Result<Self, ShippingError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ShippingError::Internal(format!("{} is not a valid URL: {}", var, e)))?;
        Ok(Self {
            base_url,
            credentials,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Credentials::Header(name, value) => request.header(*name, value),
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }
}

/// [`CarrierClient`] over HTTPS with the credentials from [`Config`].
#[derive(Clone)]
pub struct HttpCarrierClient {
    client: reqwest::Client,
    targets: HashMap<Service, Target>,
}

impl HttpCarrierClient {
    /// Creates a new `HttpCarrierClient`.
    ///
    /// Carriers without credentials in `config` are left out; calls to them
    /// fail with `CarrierNotConfigured`.
    pub fn new(config: &Config) -> Result<Self, ShippingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.carrier_timeout_secs))
            .build()
            .map_err(|e| ShippingError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let mut targets = HashMap::new();
        if let Some(shippo) = &config.shippo {
            targets.insert(
                Service::Shippo,
                Target::new(
                    "SHIPPO_BASE_URL",
                    &shippo.base_url,
                    Credentials::Header("Authorization", format!("ShippoToken {}", shippo.api_key)),
                )?,
            );
        }
        if let Some(dhl) = &config.dhl {
            targets.insert(
                Service::Dhl,
                Target::new(
                    "DHL_BASE_URL",
                    &dhl.base_url,
                    Credentials::Basic {
                        username: dhl.username.clone(),
                        password: dhl.password.clone(),
                    },
                )?,
            );
        }
        if let Some(postmen) = &config.postmen {
            targets.insert(
                Service::Postmen,
                Target::new(
                    "POSTMEN_BASE_URL",
                    &postmen.base_url,
                    Credentials::Header("postmen-api-key", postmen.api_key.clone()),
                )?,
            );
        }
        if let Some(aftership) = &config.aftership {
            targets.insert(
                Service::AfterShip,
                Target::new(
                    "AFTERSHIP_BASE_URL",
                    &aftership.base_url,
                    Credentials::Header("aftership-api-key", aftership.api_key.clone()),
                )?,
            );
        }

        Ok(Self { client, targets })
    }

    async fn send(
        &self,
        carrier: Carrier,
        operation: Operation,
        payload: &Value,
    ) -> Result<Value, ShippingError> {
        let endpoint = endpoint(carrier, operation)
            .ok_or(ShippingError::UnsupportedOperation { carrier, operation })?;
        let target = self
            .targets
            .get(&endpoint.service)
            .ok_or(ShippingError::CarrierNotConfigured(carrier))?;

        let (url, rest) = resolve_url(&target.base_url, endpoint.path, payload)?;
        tracing::info!("Calling {} {} {} for {}", carrier, endpoint.method, url, operation);

        let request = self.client.request(endpoint.method.clone(), url);
        let request = if endpoint.method == Method::GET {
            request.query(&query_pairs(&rest))
        } else {
            request.json(&Value::Object(rest))
        };

        let response = target
            .authorize(request)
            .send()
            .await
            .map_err(|e| transport(carrier, None, None, format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport(carrier, Some(status.as_u16()), None, e.to_string()))?;
        let body: Option<Value> = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&text).ok()
        };

        if !status.is_success() {
            tracing::error!("{} returned {} for {}", carrier, status, operation);
            return Err(transport(
                carrier,
                Some(status.as_u16()),
                body.map(|b| error_body(endpoint.service, b)),
                format!("{} returned {}", carrier, status),
            ));
        }

        let body = match body {
            Some(body) => Some(body),
            None if text.trim().is_empty() => Some(json!({})),
            None => None,
        };
        let body = body.ok_or_else(|| {
            transport(
                carrier,
                Some(status.as_u16()),
                None,
                "response was not valid JSON".to_string(),
            )
        })?;

        if let Some(errors) = in_band_errors(endpoint.service, &body) {
            tracing::error!("{} reported an error for {}: {}", carrier, operation, errors);
            return Err(transport(
                carrier,
                Some(status.as_u16()),
                Some(errors),
                format!("{} rejected the request", carrier),
            ));
        }

        Ok(body)
    }
}

impl CarrierClient for HttpCarrierClient {
    fn call(
        &self,
        carrier: Carrier,
        operation: Operation,
        payload: &Value,
    ) -> impl Future<Output = Result<Value, ShippingError>> + Send {
        self.send(carrier, operation, payload)
    }
}

fn transport(
    carrier: Carrier,
    status: Option<u16>,
    body: Option<Value>,
    message: String,
) -> ShippingError {
    ShippingError::CarrierTransport {
        carrier,
        status,
        body,
        message,
    }
}

/// Fills the `{placeholders}` of `path` from `payload`.
///
/// Returns the full URL and the payload keys not consumed by the path.
fn resolve_url(
    base_url: &Url,
    path: &str,
    payload: &Value,
) -> Result<(Url, Map<String, Value>), ShippingError> {
    let mut rest = payload.as_object().cloned().unwrap_or_default();
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(key) => {
                let value = rest
                    .remove(key)
                    .and_then(|v| formatters::text(&v, ""))
                    .ok_or_else(|| ShippingError::missing_field(key))?;
                segments.push(value);
            }
            None => segments.push(segment.to_string()),
        }
    }

    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|_| ShippingError::Internal(format!("{} cannot be a base URL", base_url)))?
        .pop_if_empty()
        .extend(segments.iter().skip(1));
    Ok((url, rest))
}

fn query_pairs(params: &Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                Value::Array(items) => items
                    .iter()
                    .filter_map(|v| formatters::text(v, ""))
                    .collect::<Vec<_>>()
                    .join(","),
                other => other.to_string(),
            };
            Some((key.clone(), rendered))
        })
        .collect()
}

/// Postmen and AfterShip put the useful error detail in `meta`.
fn error_body(service: Service, body: Value) -> Value {
    match service {
        Service::Postmen | Service::AfterShip => body.get("meta").cloned().unwrap_or(body),
        Service::Shippo | Service::Dhl => body,
    }
}

/// Failures a carrier reports with a successful HTTP status.
fn in_band_errors(service: Service, body: &Value) -> Option<Value> {
    match service {
        Service::Postmen | Service::AfterShip => {
            let code = formatters::integer(body, "/meta/code")?;
            (!(200..300).contains(&code)).then(|| body.get("meta").cloned().unwrap_or(Value::Null))
        }
        Service::Dhl => dhl::notification_errors(body),
        Service::Shippo => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_follow_support_matrix() {
        for carrier in Carrier::ALL {
            for operation in Operation::ALL {
                assert_eq!(
                    endpoint(carrier, operation).is_some(),
                    formatters::supports(carrier, operation),
                    "{} {}",
                    carrier,
                    operation
                );
            }
        }
    }

    #[test]
    fn test_postmen_tracking_goes_to_aftership() {
        let ep = endpoint(Carrier::Postmen, Operation::TrackingStatus).unwrap();
        assert_eq!(ep.service, Service::AfterShip);
        assert_eq!(ep.method, Method::GET);
    }

    #[test]
    fn test_resolve_url_fills_placeholders() {
        let base = Url::parse("https://api.example.com/v3").unwrap();
        let payload = json!({"slug": "usps", "tracking_number": "9400 11", "extra": 1});
        let (url, rest) =
            resolve_url(&base, "/trackings/{slug}/{tracking_number}", &payload).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v3/trackings/usps/9400%2011");
        assert_eq!(rest.len(), 1);
        assert!(rest.contains_key("extra"));
    }

    #[test]
    fn test_resolve_url_keeps_trailing_slash() {
        let base = Url::parse("https://api.goshippo.com").unwrap();
        let (url, _) = resolve_url(&base, "/shipments/", &json!({})).unwrap();
        assert_eq!(url.as_str(), "https://api.goshippo.com/shipments/");
    }

    #[test]
    fn test_resolve_url_missing_placeholder() {
        let base = Url::parse("https://api.goshippo.com").unwrap();
        let err = resolve_url(&base, "/manifests/{manifest_id}", &json!({})).unwrap_err();
        assert!(matches!(err, ShippingError::Validation(_)));
    }

    #[test]
    fn test_query_pairs_render_scalars() {
        let params = json!({"page": 1, "results": 25, "skip": null})
            .as_object()
            .cloned()
            .unwrap();
        let mut pairs = query_pairs(&params);
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("page".to_string(), "1".to_string()),
                ("results".to_string(), "25".to_string())
            ]
        );
    }

    #[test]
    fn test_in_band_postmen_error() {
        let body = json!({"meta": {"code": 4104, "message": "Invalid"}, "data": {}});
        let errors = in_band_errors(Service::Postmen, &body).unwrap();
        assert_eq!(errors["code"], 4104);
        assert!(in_band_errors(Service::Postmen, &json!({"meta": {"code": 200}})).is_none());
    }
}
