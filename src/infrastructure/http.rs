// src/infrastructure/http.rs
// JSON over HTTP with every failure mapped onto SourceError

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hyper::body::Bytes;
use hyper::client::HttpConnector;
use hyper::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Client, Method, Request};
use hyper_tls::HttpsConnector;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::application::dto::parser::parse_body;
use crate::domain::errors::{SourceError, SourceResult};

#[derive(Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn header_value(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(credentials))
    }
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Clone)]
pub struct HttpJsonClient {
    client: Client<HttpsConnector<HttpConnector>>,
    base_url: String,
    authorization: Option<String>,
    timeout: Duration,
}

impl HttpJsonClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder().build::<_, Body>(HttpsConnector::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: None,
            timeout,
        }
    }

    pub fn with_basic_auth(mut self, auth: &BasicAuth) -> Self {
        self.authorization = Some(auth.header_value());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> SourceResult<T> {
        let body = self.execute(Method::GET, path, None).await?;
        parse_body(&body)
    }

    pub async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&B>,
    ) -> SourceResult<T> {
        let encoded = payload.map(serde_json::to_vec).transpose().map_err(|e| {
            SourceError::ParseFailure(format!("Failed to encode request body: {}", e))
        })?;
        let body = self.execute(method, path, encoded).await?;
        parse_body(&body)
    }

    /// For endpoints answering with no content
    pub async fn send_discarding(&self, method: Method, path: &str) -> SourceResult<()> {
        self.execute(method, path, None).await.map(|_| ())
    }

    async fn execute(&self, method: Method, path: &str, payload: Option<Vec<u8>>) -> SourceResult<Bytes> {
        let uri = format!("{}{}", self.base_url, path);

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(&uri)
            .header(ACCEPT, "application/json");
        if let Some(authorization) = &self.authorization {
            builder = builder.header(AUTHORIZATION, authorization.as_str());
        }
        let request = match payload {
            Some(bytes) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(bytes)),
            None => builder.body(Body::empty()),
        }
        .map_err(|e| SourceError::NetworkFailure(format!("Invalid request {}: {}", uri, e)))?;

        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            let body = hyper::body::to_bytes(response.into_body()).await?;
            Ok::<_, hyper::Error>((status, body))
        };

        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                SourceError::NetworkFailure(format!(
                    "{} {} timed out after {:?}",
                    method, uri, self.timeout
                ))
            })?
            .map_err(|e| SourceError::NetworkFailure(format!("{} {}: {}", method, uri, e)))?;

        if !status.is_success() {
            log::debug!("{} {} answered {}", method, uri, status);
            return Err(SourceError::ServiceUnavailable {
                status: status.as_u16(),
            });
        }

        Ok(body)
    }
}
