use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::error::ApiError;
use crate::config::ApiConfig;

const DEFAULT_USER_AGENT: &str = concat!("hpn-admin/", env!("CARGO_PKG_VERSION"));

/// Options of a single backend call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
  pub method: Method,
  /// Already-serialized JSON body
  pub body: Option<Value>,
  /// Merged over the default `Content-Type: application/json`
  pub headers: HeaderMap,
}

impl RequestOptions {
  pub fn new(method: Method) -> Self {
    Self {
      method,
      ..Self::default()
    }
  }

  pub fn body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  /// Serialize `body` as the JSON payload.
  pub fn json<B: Serialize>(self, body: &B) -> Result<Self, ApiError> {
    let value = serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?;
    Ok(self.body(value))
  }

  pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
    self.headers.insert(name, value);
    self
  }
}

/// Transport client: the single choke point for backend calls.
///
/// Holds a cookie store, so the session cookie set by login is sent with
/// every later request.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: String,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> color_eyre::Result<Self> {
    let user_agent = config
      .user_agent
      .clone()
      .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

    let http = reqwest::Client::builder()
      .cookie_store(true)
      .user_agent(user_agent)
      .build()
      .map_err(|e| color_eyre::eyre::eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: normalize_base_url(&config.base_url),
    })
  }

  /// Client against `base_url` with default settings.
  pub fn with_base_url(base_url: &str) -> color_eyre::Result<Self> {
    Self::new(&ApiConfig {
      base_url: base_url.to_string(),
      user_agent: None,
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// Perform one call to `path` (relative to the base URL).
  ///
  /// - JSON bodies are parsed; a malformed one counts as `null`
  /// - non-2xx statuses become [`ApiError::Status`]
  /// - a 2xx without a JSON body decodes `T` from `{}`
  ///
  /// One attempt, no retries, no timeout.
  pub async fn request<T: DeserializeOwned>(
    &self,
    path: &str,
    options: RequestOptions,
  ) -> Result<T, ApiError> {
    let url = format!("{}{}", self.base_url, path);

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for name in options.headers.keys() {
      headers.remove(name);
    }
    for (name, value) in options.headers.iter() {
      headers.append(name.clone(), value.clone());
    }

    debug!(method = %options.method, path, "api request");

    let mut builder = self.http.request(options.method.clone(), &url).headers(headers);
    if let Some(body) = &options.body {
      builder = builder.body(body.to_string());
    }

    let response = builder.send().await?;
    let status = response.status();

    let is_json = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(|ct| ct.contains("application/json"))
      .unwrap_or(false);

    let data = if is_json {
      match response.bytes().await {
        Ok(bytes) => serde_json::from_slice::<Value>(&bytes).unwrap_or(Value::Null),
        Err(_) => Value::Null,
      }
    } else {
      Value::Null
    };

    if !status.is_success() {
      let err = ApiError::from_response(status.as_u16(), &data);
      warn!(
        method = %options.method,
        path,
        status = status.as_u16(),
        message = %err,
        "api request failed"
      );
      return Err(err);
    }

    let data = if data.is_null() {
      Value::Object(Map::new())
    } else {
      data
    };
    serde_json::from_value(data).map_err(|e| ApiError::Decode(format!("{path}: {e}")))
  }

  pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    self.request(path, RequestOptions::new(Method::GET)).await
  }

  pub async fn post<T: DeserializeOwned, B: Serialize>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<T, ApiError> {
    self
      .request(path, RequestOptions::new(Method::POST).json(body)?)
      .await
  }

  /// POST without a body (toggles, mark-read, logout).
  pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    self.request(path, RequestOptions::new(Method::POST)).await
  }

  pub async fn patch<T: DeserializeOwned, B: Serialize>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<T, ApiError> {
    self
      .request(path, RequestOptions::new(Method::PATCH).json(body)?)
      .await
  }

  pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    self.request(path, RequestOptions::new(Method::DELETE)).await
  }
}

impl std::fmt::Debug for ApiClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ApiClient")
      .field("base_url", &self.base_url)
      .finish_non_exhaustive()
  }
}

fn normalize_base_url(raw: &str) -> String {
  raw.trim().trim_end_matches('/').to_string()
}
