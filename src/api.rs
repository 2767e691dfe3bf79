use log::{debug, error, warn};
use reqwest::blocking::Client;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cell::{Ref, RefCell, RefMut};
use thiserror::Error;

use crate::models::{AccessToken, Credentials, MessageBody, TokenPair};
use crate::session::SessionManager;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{message}")]
    Client { status: u16, message: String },
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("Record has no identifier")]
    MissingId,
}

impl ApiError {
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_message(body)
            .unwrap_or_else(|| format!("Request failed with status {status}"));
        match status {
            401 => ApiError::Unauthorized(message),
            500..=599 => ApiError::Server { status, message },
            _ => ApiError::Client { status, message },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Client { status, .. } | ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Unauthorized(message)
            | ApiError::Client { message, .. }
            | ApiError::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "message", "msg"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub bearer: Option<String>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
            retried: false,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|err| ApiError::Decode(err.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    #[cfg(test)]
    pub fn was_retried(&self) -> bool {
        self.retried
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let body = if self.body.trim().is_empty() {
            "null"
        } else {
            self.body.as_str()
        };
        serde_json::from_str(body).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .user_agent(concat!("timecard/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let base = format!("{}{}", self.base_url, request.path);
        let mut url =
            reqwest::Url::parse(&base).map_err(|err| ApiError::Network(err.to_string()))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header("Content-Type", "application/json");
        if let Some(token) = &request.bearer {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(ApiResponse { status, body })
    }
}

/// A 401 triggers at most one refresh-and-retry per request.
pub struct ApiClient {
    transport: Box<dyn Transport>,
    session: RefCell<SessionManager>,
}

impl ApiClient {
    pub fn new(transport: Box<dyn Transport>, session: SessionManager) -> Self {
        Self {
            transport,
            session: RefCell::new(session),
        }
    }

    pub fn session(&self) -> Ref<'_, SessionManager> {
        self.session.borrow()
    }

    pub fn session_mut(&self) -> RefMut<'_, SessionManager> {
        self.session.borrow_mut()
    }

    pub fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut request = request;
        request.bearer = self.session().access_token().map(str::to_string);

        let original = match self.dispatch(&request) {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };
        if !original.is_unauthorized() || request.retried {
            return Err(original);
        }
        request.retried = true;

        let refresh_token = self.session().refresh_token().map(str::to_string);
        let Some(refresh_token) = refresh_token else {
            debug!("No refresh token held, logging out");
            self.session_mut().logout();
            return Err(original);
        };

        match self.refresh(&refresh_token) {
            Ok(access_token) => {
                self.session_mut().set_access_token(&access_token);
                request.bearer = Some(access_token);
                self.dispatch(&request)
            }
            Err(err) => {
                error!("Unable to refresh token: {err}");
                self.session_mut().logout();
                Err(err)
            }
        }
    }

    pub fn request_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.execute(request)?.json()
    }

    pub fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(ApiRequest::new(method, path).json(body)?)?.json()
    }

    pub fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(ApiRequest::new(Method::DELETE, path))?;
        Ok(())
    }

    pub fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let pair: TokenPair = self.send_json(
            Method::POST,
            "/login",
            &Credentials { username, password },
        )?;
        self.session_mut()
            .login(&pair.access_token, &pair.refresh_token);
        Ok(())
    }

    pub fn register(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let body: MessageBody = self.send_json(
            Method::POST,
            "/register",
            &Credentials { username, password },
        )?;
        Ok(body
            .message
            .unwrap_or_else(|| "User created successfully".to_string()))
    }

    pub fn logout(&self) {
        self.session_mut().logout();
    }

    fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        debug!("{} {}", request.method, request.path);
        let response = self.transport.send(request)?;
        if response.is_success() {
            return Ok(response);
        }
        let err = ApiError::from_status(response.status, &response.body);
        if !err.is_unauthorized() {
            warn!("{} {} failed: {err}", request.method, request.path);
        }
        Err(err)
    }

    // Goes straight to the transport so a failing refresh never re-enters
    // the 401 handling above.
    fn refresh(&self, refresh_token: &str) -> Result<String, ApiError> {
        let mut request = ApiRequest::new(Method::POST, "/refresh");
        request.body = Some(Value::Object(Default::default()));
        request.bearer = Some(refresh_token.to_string());
        request.retried = true;
        let response = self.dispatch(&request)?;
        let token: AccessToken = response.json()?;
        Ok(token.access_token)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::storage::{ACCESS_TOKEN_KEY, KeyValueStore, MemoryStore, REFRESH_TOKEN_KEY};
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    pub struct ScriptedTransport {
        responses: RefCell<VecDeque<Result<ApiResponse, ApiError>>>,
        requests: RefCell<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Rc<Self> {
            Rc::new(Self::default())
        }

        pub fn respond(&self, status: u16, body: &str) {
            self.responses.borrow_mut().push_back(Ok(ApiResponse {
                status,
                body: body.to_string(),
            }));
        }

        pub fn fail(&self, err: ApiError) {
            self.responses.borrow_mut().push_back(Err(err));
        }

        pub fn requests(&self) -> Vec<ApiRequest> {
            self.requests.borrow().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl Transport for Rc<ScriptedTransport> {
        fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
            self.requests.borrow_mut().push(request.clone());
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Network("no scripted response".to_string())))
        }
    }

    pub fn client_with(
        transport: &Rc<ScriptedTransport>,
        access: Option<&str>,
        refresh: Option<&str>,
    ) -> ApiClient {
        let store = MemoryStore::new();
        if let Some(access) = access {
            store.set(ACCESS_TOKEN_KEY, access).unwrap();
        }
        if let Some(refresh) = refresh {
            store.set(REFRESH_TOKEN_KEY, refresh).unwrap();
        }
        ApiClient::new(
            Box::new(transport.clone()),
            SessionManager::new(Box::new(store)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{client_with, ScriptedTransport};
    use super::*;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    // Answers one connection with a canned response and hands back the raw
    // request bytes it received.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/api", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0u8; 1024];
            let head_end = loop {
                let read = stream.read(&mut chunk).unwrap();
                assert!(read > 0, "connection closed before headers");
                raw.extend_from_slice(&chunk[..read]);
                if let Some(pos) = raw.windows(4).position(|window| window == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
            let content_length = header_value(&head, "content-length")
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(0);
            while raw.len() < head_end + content_length {
                let read = stream.read(&mut chunk).unwrap();
                assert!(read > 0, "connection closed before body");
                raw.extend_from_slice(&chunk[..read]);
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });
        (base_url, handle)
    }

    fn local_transport(base_url: &str) -> HttpTransport {
        let client = Client::builder().no_proxy().build().unwrap();
        HttpTransport::with_client(client, base_url)
    }

    fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
        head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    #[test]
    fn http_transport_sends_bearer_and_encoded_window() {
        let (base_url, server) = serve_once("401 Unauthorized", r#"{"msg": "Token has expired"}"#);
        let transport = local_transport(&base_url);
        let mut request = ApiRequest::new(Method::GET, "/timerecords")
            .query("start_date", "2026-02-01T00:00:00.000Z")
            .query("end_date", "2026-02-14T23:59:59.999Z");
        request.bearer = Some("access".to_string());

        let response = transport.send(&request).unwrap();
        assert_eq!(response.status, 401);
        assert!(!response.is_success());
        assert_eq!(
            ApiError::from_status(response.status, &response.body),
            ApiError::Unauthorized("Token has expired".to_string())
        );

        let raw = server.join().unwrap();
        assert_eq!(
            raw.lines().next(),
            Some("GET /api/timerecords?start_date=2026-02-01T00%3A00%3A00.000Z&end_date=2026-02-14T23%3A59%3A59.999Z HTTP/1.1")
        );
        assert_eq!(header_value(&raw, "authorization"), Some("Bearer access"));
    }

    #[test]
    fn http_transport_posts_json_without_bearer() {
        let (base_url, server) = serve_once("201 Created", r#"{"message": "User created successfully"}"#);
        let transport = local_transport(&base_url);
        let request = ApiRequest::new(Method::POST, "/register")
            .json(&json!({"username": "ada", "password": "secret"}))
            .unwrap();

        let response = transport.send(&request).unwrap();
        assert_eq!(response.status, 201);
        let body: MessageBody = response.json().unwrap();
        assert_eq!(body.message.as_deref(), Some("User created successfully"));

        let raw = server.join().unwrap();
        assert_eq!(raw.lines().next(), Some("POST /api/register HTTP/1.1"));
        assert_eq!(header_value(&raw, "authorization"), None);
        let (_, sent) = raw.split_once("\r\n\r\n").unwrap();
        let sent: Value = serde_json::from_str(sent).unwrap();
        assert_eq!(sent, json!({"username": "ada", "password": "secret"}));
    }

    #[test]
    fn attaches_bearer_when_logged_in() {
        let transport = ScriptedTransport::new();
        transport.respond(200, "[]");
        let client = client_with(&transport, Some("access"), Some("refresh"));

        let _: Vec<Value> = client
            .request_json(ApiRequest::new(Method::GET, "/timerecords"))
            .unwrap();
        let requests = transport.requests();
        assert_eq!(requests[0].bearer.as_deref(), Some("access"));
    }

    #[test]
    fn dispatches_unauthenticated_without_token() {
        let transport = ScriptedTransport::new();
        transport.respond(201, r#"{"message": "User created successfully"}"#);
        let client = client_with(&transport, None, None);

        let message = client.register("ada", "secret").unwrap();
        assert_eq!(message, "User created successfully");
        let requests = transport.requests();
        assert_eq!(requests[0].bearer, None);
        assert_eq!(requests[0].body, Some(json!({"username": "ada", "password": "secret"})));
    }

    #[test]
    fn refreshes_and_retries_once_on_401() {
        let transport = ScriptedTransport::new();
        transport.respond(401, r#"{"msg": "Token has expired"}"#);
        transport.respond(200, r#"{"access_token": "fresh"}"#);
        transport.respond(200, r#"[{"id": 1}]"#);
        let client = client_with(&transport, Some("stale"), Some("refresh"));

        let body: Vec<Value> = client
            .request_json(ApiRequest::new(Method::GET, "/timerecords"))
            .unwrap();
        assert_eq!(body, vec![json!({"id": 1})]);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].method, Method::POST);
        assert_eq!(requests[1].path, "/refresh");
        assert_eq!(requests[1].bearer.as_deref(), Some("refresh"));
        assert_eq!(requests[2].path, "/timerecords");
        assert_eq!(requests[2].bearer.as_deref(), Some("fresh"));
        assert!(requests[2].was_retried());
        assert_eq!(client.session().access_token(), Some("fresh"));
        assert_eq!(client.session().refresh_token(), Some("refresh"));
    }

    #[test]
    fn second_401_is_propagated_without_another_refresh() {
        let transport = ScriptedTransport::new();
        transport.respond(401, "{}");
        transport.respond(200, r#"{"access_token": "fresh"}"#);
        transport.respond(401, r#"{"error": "still no"}"#);
        let client = client_with(&transport, Some("stale"), Some("refresh"));

        let err = client
            .execute(ApiRequest::new(Method::GET, "/recordattributes"))
            .unwrap_err();
        assert_eq!(err, ApiError::Unauthorized("still no".to_string()));
        assert_eq!(transport.request_count(), 3);
        assert!(client.session().is_logged_in());
    }

    #[test]
    fn missing_refresh_token_logs_out_and_returns_original_error() {
        let transport = ScriptedTransport::new();
        transport.respond(401, r#"{"msg": "expired"}"#);
        let client = client_with(&transport, Some("stale"), None);

        let err = client
            .execute(ApiRequest::new(Method::GET, "/timerecords"))
            .unwrap_err();
        assert_eq!(err, ApiError::Unauthorized("expired".to_string()));
        assert_eq!(transport.request_count(), 1);
        assert!(!client.session().is_logged_in());
    }

    #[test]
    fn failed_refresh_logs_out_and_returns_refresh_error() {
        let transport = ScriptedTransport::new();
        transport.respond(401, r#"{"msg": "expired"}"#);
        transport.respond(422, r#"{"msg": "Signature verification failed"}"#);
        let client = client_with(&transport, Some("stale"), Some("bad"));

        let err = client
            .execute(ApiRequest::new(Method::GET, "/timerecords"))
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Client {
                status: 422,
                message: "Signature verification failed".to_string()
            }
        );
        assert_eq!(transport.request_count(), 2);
        assert!(!client.session().is_logged_in());
        assert_eq!(client.session().refresh_token(), None);
    }

    #[test]
    fn refresh_returning_401_does_not_recurse() {
        let transport = ScriptedTransport::new();
        transport.respond(401, "{}");
        transport.respond(401, r#"{"msg": "refresh expired"}"#);
        let client = client_with(&transport, Some("stale"), Some("old"));

        let err = client
            .execute(ApiRequest::new(Method::GET, "/timerecords"))
            .unwrap_err();
        assert_eq!(err, ApiError::Unauthorized("refresh expired".to_string()));
        assert_eq!(transport.request_count(), 2);
        assert!(!client.session().is_logged_in());
    }

    #[test]
    fn other_errors_pass_through_unchanged() {
        let transport = ScriptedTransport::new();
        transport.respond(409, r#"{"message": "User already exists"}"#);
        transport.respond(503, "");
        transport.fail(ApiError::Network("connection refused".to_string()));
        let client = client_with(&transport, Some("access"), Some("refresh"));

        let conflict = client.register("ada", "secret").unwrap_err();
        assert_eq!(conflict.status(), Some(409));
        assert_eq!(conflict.message(), "User already exists");

        let server = client.delete("/timerecords/1").unwrap_err();
        assert_eq!(
            server,
            ApiError::Server {
                status: 503,
                message: "Request failed with status 503".to_string()
            }
        );

        let network = client.delete("/timerecords/1").unwrap_err();
        assert!(matches!(network, ApiError::Network(_)));
        assert_eq!(transport.request_count(), 3);
        assert!(client.session().is_logged_in());
    }

    #[test]
    fn login_stores_token_pair() {
        let transport = ScriptedTransport::new();
        transport.respond(200, r#"{"access_token": "a", "refresh_token": "r"}"#);
        let client = client_with(&transport, None, None);

        client.login("ada", "secret").unwrap();
        assert_eq!(client.session().access_token(), Some("a"));
        assert_eq!(client.session().refresh_token(), Some("r"));
    }
}
