//! Supabase client (PostgREST rows + GoTrue auth)

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use telemetry::{ConnectionStatus, Driver, Event, Session};
use tracing::debug;
use uuid::Uuid;

use crate::{
    AuthProvider, AuthSession, NewDriver, SignUp, StorageError, Supervisor, TelemetryStore, User,
    UserMetadata,
};

/// Connection settings for a Supabase project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL (`SUPABASE_URL`)
    pub url: String,
    /// Anon or service key (`SUPABASE_ANON_KEY`)
    pub api_key: String,
}

#[derive(Serialize)]
struct DriverInsert<'a> {
    #[serde(flatten)]
    driver: &'a NewDriver,
    connection_status: ConnectionStatus,
    safety_score: u8,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: UserMetadata,
}

/// GoTrue answers sign-up with a session, or with the bare user while
/// email confirmation is pending
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(AuthSession),
    User(User),
}

/// Hosted data store and auth collaborator
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    /// Signed-in supervisor; table requests fall back to the project key
    access_token: Option<String>,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            access_token: None,
        }
    }

    /// Client whose table requests carry `access_token`. Shares the
    /// connection pool.
    pub fn with_access_token(&self, access_token: &str) -> Self {
        Self {
            access_token: Some(access_token.to_string()),
            ..self.clone()
        }
    }

    fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn with_key(&self, request: RequestBuilder, bearer: &str) -> RequestBuilder {
        request.header("apikey", &self.api_key).bearer_auth(bearer)
    }

    fn select(&self, table: &str) -> RequestBuilder {
        self.with_key(self.client.get(self.table_url(table)), self.bearer())
            .query(&[("select", "*")])
    }

    fn insert(&self, table: &str) -> RequestBuilder {
        self.with_key(self.client.post(self.table_url(table)), self.bearer())
            .header("Prefer", "return=representation")
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    async fn api_error(response: reqwest::Response) -> StorageError {
        StorageError::Api {
            status: response.status().as_u16(),
            message: response.text().await.unwrap_or_default(),
        }
    }

    async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, StorageError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StorageError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TelemetryStore for SupabaseClient {
    async fn get_driver(&self, driver_id: Uuid) -> Result<Driver, StorageError> {
        let request = self
            .select("drivers")
            .query(&[("id", format!("eq.{}", driver_id))]);

        Self::rows::<Driver>(request)
            .await?
            .into_iter()
            .next()
            .ok_or(StorageError::NotFound)
    }

    async fn latest_active_session(
        &self,
        driver_id: Uuid,
    ) -> Result<Option<Session>, StorageError> {
        let request = self.select("driving_sessions").query(&[
            ("driver_id", format!("eq.{}", driver_id)),
            ("status", "eq.active".to_string()),
            ("order", "started_at.desc".to_string()),
            ("limit", "1".to_string()),
        ]);

        Ok(Self::rows::<Session>(request).await?.into_iter().next())
    }

    async fn session_events(&self, session_id: Uuid) -> Result<Vec<Event>, StorageError> {
        let request = self.select("events").query(&[
            ("session_id", format!("eq.{}", session_id)),
            ("order", "timestamp.desc".to_string()),
        ]);

        let events = Self::rows::<Event>(request).await?;
        debug!("Fetched {} events for session {}", events.len(), session_id);
        Ok(events)
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, StorageError> {
        let request = self.select("drivers").query(&[("order", "name.asc")]);
        Self::rows(request).await
    }

    async fn insert_driver(&self, driver: NewDriver) -> Result<Driver, StorageError> {
        let body = DriverInsert {
            driver: &driver,
            connection_status: ConnectionStatus::Offline,
            safety_score: 100,
        };
        let request = self.insert("drivers").json(&body);

        Self::rows::<Driver>(request)
            .await?
            .into_iter()
            .next()
            .ok_or(StorageError::NotFound)
    }

    async fn get_supervisor(&self, user_id: Uuid) -> Result<Option<Supervisor>, StorageError> {
        let request = self.select("supervisors").query(&[
            ("user_id", format!("eq.{}", user_id)),
            ("limit", "1".to_string()),
        ]);
        Ok(Self::rows::<Supervisor>(request).await?.into_iter().next())
    }

    async fn insert_supervisor(&self, supervisor: Supervisor) -> Result<Supervisor, StorageError> {
        let request = self.insert("supervisors").json(&supervisor);
        Self::rows::<Supervisor>(request)
            .await?
            .into_iter()
            .next()
            .ok_or(StorageError::NotFound)
    }

    fn for_user(self: Arc<Self>, access_token: &str) -> Arc<dyn TelemetryStore> {
        Arc::new(self.with_access_token(access_token))
    }
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn current_user(&self, access_token: &str) -> Result<Option<User>, StorageError> {
        let request = self.with_key(self.client.get(self.auth_url("user")), access_token);
        let response = request.send().await?;

        match response.status() {
            status if status.is_success() => response
                .json::<User>()
                .await
                .map(Some)
                .map_err(|e| StorageError::Decode(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthSession>, StorageError> {
        let request = self
            .with_key(self.client.post(self.auth_url("token")), &self.api_key)
            .query(&[("grant_type", "password")])
            .json(&Credentials { email, password });
        let response = request.send().await?;

        match response.status() {
            status if status.is_success() => response
                .json::<AuthSession>()
                .await
                .map(Some)
                .map_err(|e| StorageError::Decode(e.to_string())),
            // invalid_grant: unknown email or wrong password
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Ok(None),
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<SignUp, StorageError> {
        let body = SignUpRequest {
            email,
            password,
            data: UserMetadata {
                full_name: full_name.map(str::to_string),
            },
        };
        let request = self
            .with_key(self.client.post(self.auth_url("signup")), &self.api_key)
            .json(&body);
        let response = request.send().await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(StorageError::Rejected(
                response.text().await.unwrap_or_default(),
            ));
        }
        if !status.is_success() {
            return Err(Self::api_error(response).await);
        }

        match response.json::<SignUpResponse>().await {
            Ok(SignUpResponse::Session(session)) => Ok(SignUp {
                user: session.user.clone(),
                session: Some(session),
            }),
            Ok(SignUpResponse::User(user)) => Ok(SignUp {
                user,
                session: None,
            }),
            Err(e) => Err(StorageError::Decode(e.to_string())),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), StorageError> {
        let request = self.with_key(self.client.post(self.auth_url("logout")), access_token);
        let response = request.send().await?;

        match response.status() {
            // An already-expired token is as signed out as it gets
            status if status.is_success() || status == StatusCode::UNAUTHORIZED => Ok(()),
            _ => Err(Self::api_error(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Query,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    const DRIVER_ID: &str = "8a6e0804-2bd0-4672-b79d-d97027f9071a";
    const SESSION_ID: &str = "0f3a4e55-5d2c-4d4b-9b0e-8e1e3c1a9f10";

    fn driver_json() -> serde_json::Value {
        json!({
            "id": DRIVER_ID,
            "name": "Michael Chen",
            "email": "mchen@company.com",
            "arduino_id": "ARD-001",
            "connection_status": "online",
            "safety_score": 95,
            "last_active": null
        })
    }

    const USER_ID: &str = "3c9a1b52-8d64-4a8e-9b3e-2f6c9d2e7a11";

    fn bearer(headers: &HeaderMap) -> &str {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    fn session_json() -> serde_json::Value {
        json!({
            "access_token": "user-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1",
            "user": {"id": USER_ID, "email": "sarah.johnson@company.com", "role": "authenticated"}
        })
    }

    async fn drivers(
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        assert_eq!(headers["apikey"], "anon-key");
        assert_eq!(q["select"], "*");
        match q.get("id").map(String::as_str) {
            Some(id) if id == format!("eq.{}", DRIVER_ID) => Json(json!([driver_json()])),
            Some(_) => Json(json!([])),
            None => {
                assert_eq!(q["order"], "name.asc");
                // Row-level security: anonymous callers see no drivers
                if bearer(&headers) == "Bearer user-token" {
                    Json(json!([driver_json()]))
                } else {
                    Json(json!([]))
                }
            }
        }
    }

    async fn sessions(Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
        assert_eq!(q["status"], "eq.active");
        assert_eq!(q["order"], "started_at.desc");
        assert_eq!(q["limit"], "1");
        if q["driver_id"] == format!("eq.{}", DRIVER_ID) {
            Json(json!([{
                "id": SESSION_ID,
                "driver_id": DRIVER_ID,
                "status": "active",
                "started_at": "2025-01-10T14:00:00+00:00",
                "safety_score": 88,
                "total_swerving": 7
            }]))
        } else {
            Json(json!([]))
        }
    }

    async fn events(Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
        assert_eq!(q["session_id"], format!("eq.{}", SESSION_ID));
        assert_eq!(q["order"], "timestamp.desc");
        Json(json!([
            {
                "id": "6b1f9f4e-7f0e-4f7a-a1d4-3f0a3c2b1e01",
                "session_id": SESSION_ID,
                "event_type": "DROWSY",
                "severity": "high",
                "timestamp": "2025-01-10T14:05:00+00:00",
                "x": 0, "y": 0, "z": 0
            },
            {
                "id": "6b1f9f4e-7f0e-4f7a-a1d4-3f0a3c2b1e02",
                "session_id": SESSION_ID,
                "event_type": "HARSH_BRAKE",
                "severity": "medium",
                "timestamp": "2025-01-10T14:02:00+00:00",
                "x": -1.42, "y": 0.12, "z": 9.7,
                "count_at_time": 3
            }
        ]))
    }

    async fn user(headers: HeaderMap) -> impl IntoResponse {
        match bearer(&headers) {
            "Bearer good-token" => (StatusCode::OK, Json(session_json()["user"].clone())),
            _ => (StatusCode::UNAUTHORIZED, Json(json!({"msg": "invalid JWT"}))),
        }
    }

    async fn token(
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
        Json(body): Json<serde_json::Value>,
    ) -> impl IntoResponse {
        assert_eq!(headers["apikey"], "anon-key");
        assert_eq!(q["grant_type"], "password");
        if body["email"] == "sarah.johnson@company.com" && body["password"] == "correct" {
            (StatusCode::OK, Json(session_json()))
        } else {
            let error = json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            });
            (StatusCode::BAD_REQUEST, Json(error))
        }
    }

    async fn signup(Json(body): Json<serde_json::Value>) -> impl IntoResponse {
        assert_eq!(body["data"]["full_name"], "Sarah Johnson");
        match body["email"].as_str() {
            Some("taken@company.com") => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"msg": "User already registered"})),
            ),
            // Email confirmation pending: bare user, no session
            Some("confirm@company.com") => (
                StatusCode::OK,
                Json(json!({"id": USER_ID, "email": "confirm@company.com"})),
            ),
            _ => (StatusCode::OK, Json(session_json())),
        }
    }

    async fn supervisors(
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        assert_eq!(bearer(&headers), "Bearer user-token");
        assert_eq!(q["limit"], "1");
        Json(json!([]))
    }

    async fn insert_supervisor(
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> impl IntoResponse {
        assert_eq!(bearer(&headers), "Bearer user-token");
        assert_eq!(headers["prefer"], "return=representation");
        (StatusCode::CREATED, Json(json!([body])))
    }

    async fn insert(headers: HeaderMap, Json(body): Json<serde_json::Value>) -> impl IntoResponse {
        assert_eq!(headers["prefer"], "return=representation");
        assert_eq!(bearer(&headers), "Bearer user-token");
        assert_eq!(body["arduino_id"], "ARD-007");
        assert_eq!(body["safety_score"], 100);
        let mut row = driver_json();
        row["name"] = body["name"].clone();
        row["arduino_id"] = body["arduino_id"].clone();
        (StatusCode::CREATED, Json(json!([row])))
    }

    async fn stub() -> SupabaseClient {
        let app = Router::new()
            .route("/rest/v1/drivers", get(drivers).post(insert))
            .route("/rest/v1/driving_sessions", get(sessions))
            .route("/rest/v1/events", get(events))
            .route("/rest/v1/supervisors", get(supervisors).post(insert_supervisor))
            .route("/auth/v1/user", get(user))
            .route("/auth/v1/token", post(token))
            .route("/auth/v1/signup", post(signup))
            .route("/auth/v1/logout", post(|| async { StatusCode::NO_CONTENT }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        SupabaseClient::new(&SupabaseConfig {
            url: format!("http://{}/", addr),
            api_key: "anon-key".to_string(),
        })
    }

    #[tokio::test]
    async fn test_fetch_driver_session_events() {
        let client = stub().await;
        let driver_id: Uuid = DRIVER_ID.parse().unwrap();

        let driver = client.get_driver(driver_id).await.unwrap();
        assert_eq!(driver.name, "Michael Chen");

        let session = client.latest_active_session(driver_id).await.unwrap().unwrap();
        assert_eq!(session.safety_score, Some(88));

        let events = client.session_events(session.id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].x, Some(-1.42));
    }

    #[tokio::test]
    async fn test_missing_rows() {
        let client = stub().await;
        let other = Uuid::new_v4();

        assert!(matches!(client.get_driver(other).await, Err(StorageError::NotFound)));
        assert!(client.latest_active_session(other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_roster_and_insert_as_supervisor() {
        let anonymous = stub().await;
        assert!(anonymous.list_drivers().await.unwrap().is_empty());

        let client = anonymous.with_access_token("user-token");
        assert_eq!(client.list_drivers().await.unwrap().len(), 1);

        let scoped = Arc::new(anonymous).for_user("user-token");
        assert_eq!(scoped.list_drivers().await.unwrap().len(), 1);

        let created = client
            .insert_driver(NewDriver {
                name: "Priya Nair".to_string(),
                email: "pnair@company.com".to_string(),
                hardware_id: "ARD-007".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(created.name, "Priya Nair");
        assert_eq!(created.hardware_id, "ARD-007");
    }

    #[tokio::test]
    async fn test_auth() {
        let client = stub().await;

        let user = client.current_user("good-token").await.unwrap().unwrap();
        assert_eq!(user.email.as_deref(), Some("sarah.johnson@company.com"));
        assert!(client.current_user("stale-token").await.unwrap().is_none());
        client.sign_out("good-token").await.unwrap();
    }

    #[tokio::test]
    async fn test_password_sign_in() {
        let client = stub().await;

        let session = client
            .sign_in("sarah.johnson@company.com", "correct")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.access_token, "user-token");
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(session.user.id, USER_ID.parse::<Uuid>().unwrap());

        assert!(client
            .sign_in("sarah.johnson@company.com", "wrong")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_sign_up_outcomes() {
        let client = stub().await;
        let name = Some("Sarah Johnson");

        let signed_up = client.sign_up("new@company.com", "pw", name).await.unwrap();
        assert_eq!(signed_up.session.unwrap().access_token, "user-token");

        let pending = client.sign_up("confirm@company.com", "pw", name).await.unwrap();
        assert!(pending.session.is_none());
        assert_eq!(pending.user.email.as_deref(), Some("confirm@company.com"));

        assert!(matches!(
            client.sign_up("taken@company.com", "pw", name).await,
            Err(StorageError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_supervisor_row_created_with_user_token() {
        let client = stub().await.with_access_token("user-token");
        let user = User {
            id: USER_ID.parse().unwrap(),
            email: Some("sarah.johnson@company.com".to_string()),
            user_metadata: UserMetadata::default(),
        };

        let supervisor = crate::ensure_supervisor(&client, &user, Some("Sarah Johnson"))
            .await
            .unwrap();
        assert_eq!(supervisor.user_id, user.id);
        assert_eq!(supervisor.role, "Fleet Supervisor");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        let client = SupabaseClient::new(&SupabaseConfig {
            url: "http://127.0.0.1:9".to_string(),
            api_key: "anon-key".to_string(),
        });
        assert!(matches!(
            client.get_driver(Uuid::new_v4()).await,
            Err(StorageError::Http(_))
        ));
    }
}
