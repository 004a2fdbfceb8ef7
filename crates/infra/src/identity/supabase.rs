//! Supabase adapter: GoTrue auth endpoints and the PostgREST `profiles` table.
//!
//! The client holds the session in process (as the browser SDK would) and
//! publishes every transition on its change feed. Profile requests carry the
//! signed-in access token so row-level security applies; without a session
//! they fall back to the anon key.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

use gympal_auth::{
    AuthError, Credential, IdentityBackend, ProfileError, ProfileRecord, ProfileStore, Role, Session,
    SessionChange, SessionEvent, SignUpAttributes, SignedIn,
};
use gympal_core::{Email, IdentityId};
use gympal_events::{ChangeFeed, InMemoryChangeFeed, Subscription};

use crate::config::SupabaseConfig;

const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("supabase returned {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl SupabaseError {
    fn is_invalid_credentials(&self) -> bool {
        match self {
            SupabaseError::Status { code, message, .. } => {
                code.as_deref() == Some("invalid_grant")
                    || code.as_deref() == Some("invalid_credentials")
                    || message.eq_ignore_ascii_case("invalid login credentials")
            }
            _ => false,
        }
    }

    fn is_already_registered(&self) -> bool {
        match self {
            SupabaseError::Status { code, message, .. } => {
                code.as_deref() == Some("user_already_exists") || message.to_lowercase().contains("already registered")
            }
            _ => false,
        }
    }
}

impl From<SupabaseError> for AuthError {
    fn from(e: SupabaseError) -> Self {
        if e.is_invalid_credentials() {
            return AuthError::InvalidCredentials;
        }
        if e.is_already_registered() {
            return AuthError::AlreadyRegistered;
        }
        match e {
            SupabaseError::Transport(e) => AuthError::Network(e.to_string()),
            SupabaseError::Status { status, message, .. } => AuthError::Backend { status, message },
            SupabaseError::Decode(message) => AuthError::Backend { status: 502, message },
        }
    }
}

impl From<SupabaseError> for ProfileError {
    fn from(e: SupabaseError) -> Self {
        match e {
            SupabaseError::Status { status, message, .. } if (400..500).contains(&status) => {
                ProfileError::Rejected(message)
            }
            other => ProfileError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: String,
}

/// Response of the token endpoint (and of an auto-confirmed sign-up).
#[derive(Debug, Deserialize)]
struct SessionBody {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: Option<UserBody>,
    /// Sign-up without a session returns the bare user object.
    id: Option<String>,
}

impl SessionBody {
    fn identity_id(&self) -> Result<IdentityId, SupabaseError> {
        let raw = self
            .user
            .as_ref()
            .map(|user| user.id.as_str())
            .or(self.id.as_deref())
            .ok_or_else(|| SupabaseError::Decode("response carries no user id".to_string()))?;
        IdentityId::new(raw).map_err(|e| SupabaseError::Decode(e.to_string()))
    }

    fn credential(&self, now: DateTime<Utc>) -> Option<Credential> {
        let access_token = self.access_token.clone()?;
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(|| now + Duration::seconds(self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)));
        Some(Credential::new(access_token, self.refresh_token.clone(), now, expires_at))
    }
}

/// GoTrue/PostgREST error bodies come in a few shapes.
fn error_from_body(status: StatusCode, body: &str) -> SupabaseError {
    let value: serde_json::Value = serde_json::from_str(body).unwrap_or(serde_json::Value::Null);
    let text = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_string);

    let code = text("error_code").or_else(|| text("error")).or_else(|| text("code"));
    let message = text("error_description")
        .or_else(|| text("msg"))
        .or_else(|| text("message"))
        .unwrap_or_else(|| body.trim().to_string());

    SupabaseError::Status {
        status: status.as_u16(),
        code,
        message,
    }
}

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Session>,
    feed: InMemoryChangeFeed<SessionChange>,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self, SupabaseError> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(http, config))
    }

    pub fn with_client(http: reqwest::Client, config: &SupabaseConfig) -> Self {
        Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            session: RwLock::new(Session::Absent),
            feed: InMemoryChangeFeed::new(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    /// Exchange the refresh token for a new credential (same identity).
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let refresh_token = self
            .current()?
            .credential()
            .and_then(|c| c.refresh_token().map(str::to_string))
            .ok_or_else(|| AuthError::InvalidInput("no refresh token".to_string()))?;

        let body: SessionBody = send_json(
            self.auth_request(reqwest::Method::POST, "token")
                .query(&[("grant_type", "refresh_token")])
                .json(&json!({ "refresh_token": refresh_token })),
        )
        .await?;
        let (identity_id, credential) = self.open(&body)?;
        self.replace_session(SessionEvent::TokenRefreshed, Session::present(identity_id, credential))
    }

    fn auth_request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/auth/v1/{path}", self.base_url))
            .header("apikey", &self.anon_key)
    }

    fn rest_request(&self, method: reqwest::Method, table: &str) -> RequestBuilder {
        let bearer = self
            .current()
            .ok()
            .and_then(|session| session.credential().map(|c| c.access_token().to_string()))
            .unwrap_or_else(|| self.anon_key.clone());

        self.http
            .request(method, format!("{}/rest/v1/{table}", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn current(&self) -> Result<Session, AuthError> {
        let session = self.session.read().map_err(|_| poisoned())?;
        Ok(session.clone())
    }

    fn open(&self, body: &SessionBody) -> Result<(IdentityId, Credential), AuthError> {
        let identity_id = body.identity_id()?;
        let credential = body
            .credential(Utc::now())
            .ok_or_else(|| SupabaseError::Decode("token response carries no access token".to_string()))?;
        Ok((identity_id, credential))
    }

    fn replace_session(&self, event: SessionEvent, next: Session) -> Result<Session, AuthError> {
        let mut session = self.session.write().map_err(|_| poisoned())?;
        *session = next;
        if let Err(e) = self.feed.publish(SessionChange::new(event, session.clone())) {
            tracing::error!(error = %e, ?event, "failed to publish session change");
        }
        Ok(session.clone())
    }
}

impl core::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

async fn send(request: RequestBuilder) -> Result<reqwest::Response, SupabaseError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_from_body(status, &body))
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, SupabaseError> {
    send(request)
        .await?
        .json::<T>()
        .await
        .map_err(|e| SupabaseError::Decode(e.to_string()))
}

#[async_trait]
impl IdentityBackend for SupabaseClient {
    async fn sign_in_with_password(&self, email: &Email, password: &str) -> Result<SignedIn, AuthError> {
        let body: SessionBody = send_json(
            self.auth_request(reqwest::Method::POST, "token")
                .query(&[("grant_type", "password")])
                .json(&json!({ "email": email.as_str(), "password": password })),
        )
        .await?;

        let (identity_id, credential) = self.open(&body)?;
        self.replace_session(
            SessionEvent::SignedIn,
            Session::present(identity_id.clone(), credential.clone()),
        )?;
        Ok(SignedIn {
            identity_id,
            credential: Some(credential),
        })
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        attributes: SignUpAttributes,
    ) -> Result<SignedIn, AuthError> {
        let body: SessionBody = send_json(self.auth_request(reqwest::Method::POST, "signup").json(&json!({
            "email": email.as_str(),
            "password": password,
            "data": { "role": attributes.role },
        })))
        .await?;

        let identity_id = body.identity_id()?;
        let credential = body.credential(Utc::now());
        match &credential {
            Some(credential) => {
                self.replace_session(
                    SessionEvent::SignedIn,
                    Session::present(identity_id.clone(), credential.clone()),
                )?;
            }
            None => tracing::info!(identity_id = %identity_id, "sign-up awaiting email confirmation"),
        }

        Ok(SignedIn { identity_id, credential })
    }

    /// Clears the local session first; a failed remote logout is still reported.
    async fn sign_out(&self) -> Result<(), AuthError> {
        let previous = self.current()?;
        self.replace_session(SessionEvent::SignedOut, Session::Absent)?;

        let Some(credential) = previous.credential() else {
            return Ok(());
        };
        send(
            self.auth_request(reqwest::Method::POST, "logout")
                .bearer_auth(credential.access_token()),
        )
        .await?;
        Ok(())
    }

    async fn get_session(&self) -> Result<Session, AuthError> {
        let session = self.current()?;
        let expired = session.credential().is_some_and(|c| c.expires_at() <= Utc::now());
        let refreshable = session.credential().is_some_and(|c| c.refresh_token().is_some());
        if expired && refreshable {
            tracing::debug!("access token expired; refreshing");
            return self.refresh_session().await;
        }
        Ok(session)
    }

    fn on_session_change(&self) -> Subscription<SessionChange> {
        self.feed.subscribe()
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    role: String,
}

#[async_trait]
impl ProfileStore for SupabaseClient {
    async fn get_profile_role(&self, identity_id: &IdentityId) -> Result<Option<ProfileRecord>, ProfileError> {
        let rows: Vec<ProfileRow> = send_json(
            self.rest_request(reqwest::Method::GET, "profiles")
                .query(&[("id", format!("eq.{identity_id}")), ("select", "role".to_string())]),
        )
        .await?;
        Ok(rows.into_iter().next().map(|row| ProfileRecord { role: row.role }))
    }

    async fn upsert_profile_role(
        &self,
        identity_id: &IdentityId,
        email: &Email,
        role: Role,
    ) -> Result<(), ProfileError> {
        send(
            self.rest_request(reqwest::Method::POST, "profiles")
                .query(&[("on_conflict", "id")])
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(&json!({ "id": identity_id.as_str(), "email": email.as_str(), "role": role })),
        )
        .await?;
        Ok(())
    }
}

fn poisoned() -> AuthError {
    AuthError::Backend {
        status: 500,
        message: "lock poisoned".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use axum::http::HeaderMap;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::Value;

    const ANON: &str = "anon-key";

    #[derive(Default)]
    struct Stub {
        upserts: Mutex<Vec<(Option<String>, Value)>>,
        profile_bearers: Mutex<Vec<String>>,
        logouts: Mutex<usize>,
    }

    fn session_json(id: &str) -> Value {
        json!({
            "access_token": format!("at-{id}"),
            "refresh_token": format!("rt-{id}"),
            "expires_in": 3600,
            "user": { "id": id },
        })
    }

    async fn token(Query(q): Query<HashMap<String, String>>, Json(body): Json<Value>) -> Response {
        match q.get("grant_type").map(String::as_str) {
            Some("password") if body["email"] == "coach@gympal.test" && body["password"] == "secret1" => {
                Json(session_json("u-coach")).into_response()
            }
            Some("refresh_token") if body["refresh_token"] == "rt-u-coach" => {
                Json(session_json("u-coach")).into_response()
            }
            _ => (
                axum::http::StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" })),
            )
                .into_response(),
        }
    }

    async fn signup(Json(body): Json<Value>) -> Response {
        match body["email"].as_str() {
            Some("taken@gympal.test") => (
                axum::http::StatusCode::BAD_REQUEST,
                Json(json!({ "code": 400, "msg": "User already registered" })),
            )
                .into_response(),
            Some("confirm@gympal.test") => Json(json!({ "id": "u-pending", "email": "confirm@gympal.test" })).into_response(),
            _ => {
                assert_eq!(body["data"]["role"], "coach");
                Json(session_json("u-new")).into_response()
            }
        }
    }

    async fn logout(State(stub): State<Arc<Stub>>) -> Response {
        *stub.logouts.lock().unwrap() += 1;
        axum::http::StatusCode::NO_CONTENT.into_response()
    }

    async fn profiles(
        State(stub): State<Arc<Stub>>,
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> Response {
        if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some(ANON) {
            return axum::http::StatusCode::UNAUTHORIZED.into_response();
        }
        let bearer = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        stub.profile_bearers.lock().unwrap().push(bearer);

        assert_eq!(q.get("select").map(String::as_str), Some("role"));
        match q.get("id").map(String::as_str) {
            Some("eq.u-coach") => Json(json!([{ "role": "coach" }])).into_response(),
            _ => Json(json!([])).into_response(),
        }
    }

    async fn upsert_profile(State(stub): State<Arc<Stub>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
        let prefer = headers.get("prefer").and_then(|v| v.to_str().ok()).map(str::to_string);
        stub.upserts.lock().unwrap().push((prefer, body));
        axum::http::StatusCode::CREATED.into_response()
    }

    async fn serve() -> (SupabaseClient, Arc<Stub>) {
        let stub = Arc::new(Stub::default());
        let app = Router::new()
            .route("/auth/v1/token", post(token))
            .route("/auth/v1/signup", post(signup))
            .route("/auth/v1/logout", post(logout))
            .route("/rest/v1/profiles", get(profiles).post(upsert_profile))
            .with_state(stub.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = SupabaseConfig {
            url: format!("http://{addr}/"),
            anon_key: ANON.to_string(),
        };
        (SupabaseClient::new(&config).unwrap(), stub)
    }

    fn email(raw: &str) -> Email {
        Email::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn password_sign_in_opens_session_and_publishes() {
        let (client, _stub) = serve().await;
        let mut changes = client.on_session_change();

        let signed = client
            .sign_in_with_password(&email("coach@gympal.test"), "secret1")
            .await
            .unwrap();
        assert_eq!(signed.identity_id.as_str(), "u-coach");
        assert_eq!(signed.credential.as_ref().map(|c| c.access_token()), Some("at-u-coach"));

        let change = changes.recv().await.unwrap().into_payload();
        assert_eq!(change.event, SessionEvent::SignedIn);
        assert_eq!(client.get_session().await.unwrap().identity_id(), Some(&signed.identity_id));
    }

    #[tokio::test]
    async fn rejected_credentials_map_to_invalid_credentials() {
        let (client, _stub) = serve().await;
        let err = client
            .sign_in_with_password(&email("coach@gympal.test"), "wrong")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
        assert_eq!(client.get_session().await.unwrap(), Session::Absent);
    }

    #[tokio::test]
    async fn sign_up_variants() {
        let (client, _stub) = serve().await;
        let coach = SignUpAttributes { role: Role::Coach };

        let err = client.sign_up(&email("taken@gympal.test"), "secret1", coach).await.unwrap_err();
        assert_eq!(err, AuthError::AlreadyRegistered);

        let pending = client.sign_up(&email("confirm@gympal.test"), "secret1", coach).await.unwrap();
        assert_eq!(pending.identity_id.as_str(), "u-pending");
        assert!(pending.credential.is_none());
        assert_eq!(client.get_session().await.unwrap(), Session::Absent);

        let fresh = client.sign_up(&email("fresh@gympal.test"), "secret1", coach).await.unwrap();
        assert!(fresh.credential.is_some());
        assert_eq!(client.get_session().await.unwrap().identity_id(), Some(&fresh.identity_id));
    }

    #[tokio::test]
    async fn profile_lookup_uses_session_token() {
        let (client, stub) = serve().await;

        let missing = client.get_profile_role(&IdentityId::new("u-nobody").unwrap()).await.unwrap();
        assert_eq!(missing, None);

        client
            .sign_in_with_password(&email("coach@gympal.test"), "secret1")
            .await
            .unwrap();
        let record = client.get_profile_role(&IdentityId::new("u-coach").unwrap()).await.unwrap();
        assert_eq!(record, Some(ProfileRecord { role: "coach".to_string() }));

        let bearers = stub.profile_bearers.lock().unwrap().clone();
        assert_eq!(bearers, [format!("Bearer {ANON}"), "Bearer at-u-coach".to_string()]);
    }

    #[tokio::test]
    async fn upsert_merges_on_id() {
        let (client, stub) = serve().await;
        client
            .upsert_profile_role(&IdentityId::new("u-1").unwrap(), &email("a@gympal.test"), Role::Moderator)
            .await
            .unwrap();

        let upserts = stub.upserts.lock().unwrap().clone();
        assert_eq!(upserts.len(), 1);
        let (prefer, body) = &upserts[0];
        assert!(prefer.as_deref().is_some_and(|p| p.contains("resolution=merge-duplicates")));
        assert_eq!(body, &json!({ "id": "u-1", "email": "a@gympal.test", "role": "moderator" }));
    }

    #[tokio::test]
    async fn refresh_and_sign_out() {
        let (client, stub) = serve().await;
        client
            .sign_in_with_password(&email("coach@gympal.test"), "secret1")
            .await
            .unwrap();
        let mut changes = client.on_session_change();

        let refreshed = client.refresh_session().await.unwrap();
        assert_eq!(refreshed.identity_id().map(IdentityId::as_str), Some("u-coach"));

        client.sign_out().await.unwrap();
        assert_eq!(client.get_session().await.unwrap(), Session::Absent);
        assert_eq!(*stub.logouts.lock().unwrap(), 1);

        let first = changes.recv().await.unwrap().into_payload().event;
        let second = changes.recv().await.unwrap().into_payload().event;
        assert_eq!((first, second), (SessionEvent::TokenRefreshed, SessionEvent::SignedOut));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_network_error() {
        let config = SupabaseConfig {
            url: "http://127.0.0.1:1".to_string(),
            anon_key: ANON.to_string(),
        };
        let client = SupabaseClient::new(&config).unwrap();
        let err = client
            .sign_in_with_password(&email("coach@gympal.test"), "secret1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Network(_)));

        let err = client.get_profile_role(&IdentityId::new("u-1").unwrap()).await.unwrap_err();
        assert!(matches!(err, ProfileError::Unavailable(_)));
    }
}
