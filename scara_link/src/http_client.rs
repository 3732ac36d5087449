use std::{sync::Arc, time::Duration};

use reqwest::{
    cookie::{CookieStore, Jar},
    header::HeaderValue,
    Client, Method, RequestBuilder, Url,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::{
    Ack, CommandPayload, LinkError, LinkResult, NextPosition, RemoteLink, SavePositionPayload,
    Status,
};

const CSRF_COOKIE: &str = "csrftoken";
const CSRF_HEADER: &str = "X-CSRFToken";

pub struct HttpLink {
    client: Client,
    base_url: Url,
    // Holds the backend's session cookies, seeded with the configured CSRF
    // token until the backend hands out its own.
    cookies: Arc<Jar>,
}

impl HttpLink {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        csrf_token: Option<String>,
    ) -> LinkResult<Self> {
        let raw = base_url.into();
        let base_url = Url::parse(raw.trim_end_matches('/')).map_err(|e| LinkError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;

        let cookies = Arc::new(Jar::default());
        if let Some(token) = csrf_token.filter(|token| !token.is_empty()) {
            cookies.add_cookie_str(&format!("{}={}; Path=/", CSRF_COOKIE, token), &base_url);
        }

        let client = Client::builder()
            .timeout(timeout)
            .cookie_provider(cookies.clone())
            .build()
            .map_err(|source| LinkError::Request {
                path: raw,
                source,
            })?;

        Ok(Self {
            client,
            base_url,
            cookies,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Current CSRF token as held by the cookie jar.
    pub fn csrf_token(&self) -> Option<String> {
        let header = self.cookies.cookies(&self.base_url)?;
        csrf_from_cookie_header(&header)
    }

    // The jar already sends the cookie; Django also wants the token echoed.
    fn with_csrf(&self, request: RequestBuilder) -> RequestBuilder {
        match self.csrf_token() {
            Some(token) => request.header(CSRF_HEADER, token),
            None => request,
        }
    }

    async fn execute<R: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> LinkResult<R> {
        let response = request.send().await.map_err(|source| {
            if source.is_connect() {
                LinkError::Unreachable(format!("{}: {}", self.url(path), source))
            } else {
                LinkError::Request {
                    path: path.to_string(),
                    source,
                }
            }
        })?;

        // Error bodies (HTTP 4xx/5xx) still carry a JSON acknowledgement.
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|source| LinkError::Request {
                path: path.to_string(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|source| {
            warn!("Undecodable response from {} (HTTP {})", path, status);
            LinkError::Decode {
                path: path.to_string(),
                status,
                source,
            }
        })
    }

    #[instrument(skip(self, body), level = "debug")]
    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> LinkResult<R> {
        let request = self.client.request(Method::POST, self.url(path));
        let request = match body {
            Some(body) => request.json(body),
            None => request.json(&json!({})),
        };
        debug!("POST {}", path);

        self.execute(path, self.with_csrf(request)).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> LinkResult<R> {
        let request = self.client.request(Method::GET, self.url(path));
        self.execute(path, request).await
    }
}

fn csrf_from_cookie_header(header: &HeaderValue) -> Option<String> {
    header.to_str().ok()?.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == CSRF_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

#[async_trait::async_trait]
impl RemoteLink for HttpLink {
    async fn send_command(&self, payload: &CommandPayload) -> LinkResult<Ack> {
        self.post("/send-command/", Some(payload)).await
    }

    async fn home(&self) -> LinkResult<Ack> {
        self.post::<(), _>("/home/", None).await
    }

    async fn save_position(&self, payload: &SavePositionPayload) -> LinkResult<Ack> {
        self.post("/save-position/", Some(payload)).await
    }

    async fn run_sequence(&self) -> LinkResult<Ack> {
        self.post::<(), _>("/run-sequence/", None).await
    }

    async fn stop_sequence(&self) -> LinkResult<Ack> {
        self.post::<(), _>("/stop-sequence/", None).await
    }

    async fn clear_sequence(&self) -> LinkResult<Ack> {
        self.post::<(), _>("/clear-sequence/", None).await
    }

    async fn next_position(&self) -> LinkResult<NextPosition> {
        self.get("/next-position/").await
    }

    async fn get_status(&self) -> LinkResult<Status> {
        self.get("/get-status/").await
    }
}
