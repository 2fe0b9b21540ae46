use reqwest::{header, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::ApiError,
    session::{Session, SessionStore},
};

/// The only path to the remote API.
///
/// Owns the session store; every authenticated call reads the bearer token
/// from it, and a 401 tears the session down.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
}

impl ApiClient {
    pub fn new(base_url: &str, session: SessionStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Authenticated request.
    ///
    /// `Ok(None)` means there is no session to send, or the server rejected
    /// the token and the session has been logged out. Either way the caller
    /// should stop.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let Some(session) = self.session.current_session()? else {
            debug!(endpoint, "no session, not sending");
            return Ok(None);
        };

        debug!(%method, endpoint, "api request");
        let mut builder = self
            .http
            .request(method, self.url(endpoint))
            .bearer_auth(&session.token);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            debug!(endpoint, "token rejected, logging out");
            self.logout().await?;
            return Ok(None);
        }
        read_body(response).await.map(Some)
    }

    /// Request without a bearer token, for the sign-in endpoints. A 401 here
    /// is an ordinary error.
    pub async fn public_request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        debug!(%method, endpoint, "public api request");
        let mut builder = self.http.request(method, self.url(endpoint));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        read_body(builder.send().await?).await
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Option<T>, ApiError> {
        self.typed(Method::GET, endpoint, None).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Option<T>, ApiError> {
        let body = serde_json::to_value(body)?;
        self.typed(Method::POST, endpoint, Some(&body)).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Option<T>, ApiError> {
        let body = serde_json::to_value(body)?;
        self.typed(Method::PUT, endpoint, Some(&body)).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Option<()>, ApiError> {
        Ok(self
            .request(Method::DELETE, endpoint, None)
            .await?
            .map(|_| ()))
    }

    async fn typed<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Option<T>, ApiError> {
        match self.request(method, endpoint, body).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Clears the local session and tells the server to revoke the token.
    ///
    /// The notification is best-effort; local logout always succeeds.
    pub async fn logout(&self) -> Result<Option<Session>, ApiError> {
        let previous = self.session.current_session()?;
        self.session.clear()?;

        let mut builder = self
            .http
            .post(self.url("/auth/logout"))
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(session) = &previous {
            builder = builder.bearer_auth(&session.token);
        }
        match builder.send().await {
            Ok(response) if !response.status().is_success() => {
                debug!(status = %response.status(), "server-side logout refused, ignoring");
            }
            Ok(_) => {}
            Err(err) => debug!(error = %err, "server-side logout failed, ignoring"),
        }
        Ok(previous)
    }
}

async fn read_body(response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::from_response(status, &text));
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use mockito::Matcher;
    use serde_json::json;

    fn signed_in(url: &str) -> ApiClient {
        let session = SessionStore::in_memory();
        session.login("alice", "tok-1", Role::User).unwrap();
        ApiClient::new(url, session)
    }

    #[tokio::test]
    async fn attaches_bearer_token_and_json_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/tasks")
            .match_header("authorization", "Bearer tok-1")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({ "title": "x" })))
            .with_status(201)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let api = signed_in(&server.url());
        let value = api
            .request(Method::POST, "/tasks", Some(&json!({ "title": "x" })))
            .await
            .unwrap();

        assert_eq!(value, Some(json!({ "ok": true })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_logs_out_once_and_returns_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/tasks/3")
            .with_status(401)
            .with_body(r#"{"detail":"Could not validate credentials"}"#)
            .create_async()
            .await;
        let logout = server
            .mock("POST", "/auth/logout")
            .match_header("authorization", "Bearer tok-1")
            .with_status(200)
            .with_body(r#"{"message":"Logged out successfully"}"#)
            .expect(1)
            .create_async()
            .await;

        let api = signed_in(&server.url());
        let result = api.delete("/tasks/3").await.unwrap();

        assert!(result.is_none());
        assert!(api.session().current_session().unwrap().is_none());
        logout.assert_async().await;
    }

    #[tokio::test]
    async fn signed_out_client_sends_nothing() {
        let mut server = mockito::Server::new_async().await;
        let tasks = server
            .mock("GET", "/tasks")
            .expect(0)
            .create_async()
            .await;
        let logout = server
            .mock("POST", "/auth/logout")
            .expect(0)
            .create_async()
            .await;

        let api = ApiClient::new(&server.url(), SessionStore::in_memory());
        assert!(api.get::<Value>("/tasks").await.unwrap().is_none());

        tasks.assert_async().await;
        logout.assert_async().await;
    }

    #[tokio::test]
    async fn failed_logout_notification_is_ignored() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/logout")
            .with_status(500)
            .create_async()
            .await;

        let api = signed_in(&server.url());
        let previous = api.logout().await.unwrap();

        assert_eq!(previous.map(|s| s.username).as_deref(), Some("alice"));
        assert!(api.session().current_session().unwrap().is_none());
    }

    #[tokio::test]
    async fn error_detail_becomes_the_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("PUT", "/tasks/9")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail":[{"msg":"Title contains invalid characters"}]}"#)
            .create_async()
            .await;

        let api = signed_in(&server.url());
        let err = api
            .put::<_, Value>("/tasks/9", &json!({ "title": "<b>" }))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Validation { status: 422, .. }));
        assert_eq!(err.to_string(), "Title contains invalid characters");
    }

    #[tokio::test]
    async fn empty_success_body_is_null() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/tasks/3")
            .with_status(204)
            .create_async()
            .await;

        let api = signed_in(&server.url());
        assert_eq!(api.delete("/tasks/3").await.unwrap(), Some(()));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        // Nothing listens on the discard port.
        let api = signed_in("http://127.0.0.1:9");
        let err = api.get::<Value>("/tasks").await.unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(err.to_string(), "Network error: could not reach the server");
    }
}
