//
//  bitbucket-collector
//  api/transport.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # HTTP Transport Seam
//!
//! Every byte the collector exchanges with Bitbucket goes through the
//! [`Transport`] trait. The production implementation, [`HttpTransport`],
//! wraps a `reqwest::Client`; tests substitute a scripted transport, and a
//! caching or archiving transport can be dropped in the same way without
//! touching the client, the token manager or the fetchers.
//!
//! Requests and responses are plain owned values ([`HttpRequest`],
//! [`HttpResponse`]) so a transport never has to know about retries,
//! tokens or pagination.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::common::ClientError;
use crate::auth::AuthCredential;

/// Default User-Agent header for API requests.
const USER_AGENT: &str = concat!("bbcollect/", env!("CARGO_PKG_VERSION"));

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP verbs the collector needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

/// A single outgoing HTTP request.
///
/// `url` may already carry a query string (pagination `next` links do);
/// `query` pairs are appended to it.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub auth: Option<AuthCredential>,
}

impl HttpRequest {
    /// Builds a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            form: Vec::new(),
            auth: None,
        }
    }

    /// Builds a `POST` request with an `application/x-www-form-urlencoded` body.
    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            query: Vec::new(),
            form,
            auth: None,
        }
    }

    /// Sets the query parameters.
    pub fn query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Sets the credential used for the `Authorization` header.
    pub fn auth(mut self, auth: AuthCredential) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Value of the first query parameter named `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are stored lowercased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    /// Creates a response with the given status and body and no headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header, normalizing the name to lowercase.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests and returns fully read responses.
///
/// A transport reports only transport-level failures as errors; any HTTP
/// status, including 4xx and 5xx, is a successful [`HttpResponse`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError>;
}

/// [`Transport`] backed by `reqwest`.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use bitbucket_collector::api::{HttpTransport, Transport};
///
/// let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(true)?);
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Creates a transport.
    ///
    /// # Parameters
    ///
    /// - `ssl_verify` - When `false`, invalid TLS certificates are accepted
    ///   (self-hosted endpoints with private CAs)
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Network`] if the underlying client cannot be built.
    pub fn new(ssl_verify: bool) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .danger_accept_invalid_certs(!ssl_verify)
            .build()?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
        let mut builder = match request.method {
            Method::Get => self.http.get(&request.url),
            Method::Post => self.http.post(&request.url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }
        if let Some(auth) = &request.auth {
            builder = auth.apply_to_request(builder);
        }

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// In-memory transport for unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{HttpRequest, HttpResponse, Method, Transport};
    use crate::api::common::ClientError;

    /// Answers requests from per-URL queues of canned responses.
    ///
    /// Routes are keyed by method and the request URL exactly as sent
    /// (query pairs excluded, embedded query strings included). When a
    /// queue holds a single response it is replayed for every further
    /// request. Unknown routes answer 404. A route can also be told to
    /// drop its first connections, which surface as real
    /// [`ClientError::Network`] errors.
    #[derive(Default)]
    pub struct ScriptedTransport {
        routes: Mutex<HashMap<(Method, String), VecDeque<HttpResponse>>>,
        dropped: Mutex<HashMap<(Method, String), usize>>,
        log: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(&self, method: Method, url: &str, response: HttpResponse) -> &Self {
            self.routes
                .lock()
                .unwrap()
                .entry((method, url.to_string()))
                .or_default()
                .push_back(response);
            self
        }

        pub fn on_get(&self, url: &str, status: u16, body: &str) -> &Self {
            self.on(Method::Get, url, HttpResponse::new(status, body))
        }

        pub fn on_token(&self, url: &str, access_token: &str) -> &Self {
            let body = format!(
                r#"{{"access_token": "{}", "expires_in": 7200, "token_type": "bearer", "scopes": "issue pullrequest"}}"#,
                access_token
            );
            self.on(Method::Post, url, HttpResponse::new(200, body))
        }

        /// The next `times` requests to the route fail at the connection level.
        pub fn drop_connections(&self, method: Method, url: &str, times: usize) -> &Self {
            self.dropped
                .lock()
                .unwrap()
                .insert((method, url.to_string()), times);
            self
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.log.lock().unwrap().clone()
        }

        pub fn count(&self, method: Method, url: &str) -> usize {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.method == method && r.url == url)
                .count()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
            self.log.lock().unwrap().push(request.clone());

            let key = (request.method, request.url.clone());
            let drop_connection = match self.dropped.lock().unwrap().get_mut(&key) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            };
            if drop_connection {
                return Err(refused_connection().await);
            }

            let mut routes = self.routes.lock().unwrap();
            let response = match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            };

            Ok(response.unwrap_or_else(|| {
                HttpResponse::new(404, r#"{"type": "error", "error": {"message": "No route"}}"#)
            }))
        }
    }

    /// A genuine connect error: nothing listens on port 1 of the loopback.
    async fn refused_connection() -> ClientError {
        match reqwest::Client::new().get("http://127.0.0.1:1/").send().await {
            Err(err) => ClientError::Network(err),
            Ok(response) => panic!("port 1 unexpectedly answered {}", response.status()),
        }
    }
}
