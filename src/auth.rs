//! Sign-in and sign-up, the operations available without a session.

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{
    api::ApiClient,
    error::ApiError,
    session::{Role, Session},
};

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    user: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    role: Option<String>,
}

pub async fn login(api: &ApiClient, form: &LoginForm) -> Result<Session, ApiError> {
    let username = form.username.trim();
    let body = json!({
        "username": username.to_lowercase(),
        "password": form.password,
    });
    let response = api
        .public_request(Method::POST, "/auth/login", Some(&body))
        .await?;
    let token: TokenResponse = serde_json::from_value(response)?;

    let role = token
        .user
        .and_then(|user| user.role)
        .map(|raw| Role::parse_lenient(&raw))
        .unwrap_or_default();
    let session = api.session().login(username, &token.access_token, role)?;
    info!(username, role = role.as_str(), "signed in");
    Ok(session)
}

pub async fn register(api: &ApiClient, form: &RegisterForm) -> Result<(), ApiError> {
    let username = form.username.trim();
    if username.is_empty()
        || !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ApiError::InvalidInput(
            "Username must be alphanumeric or contain underscores only".to_string(),
        ));
    }

    let body = json!({
        "username": username.to_lowercase(),
        "email": form.email.trim().to_lowercase(),
        "password": form.password,
    });
    api.public_request(Method::POST, "/auth/register", Some(&body))
        .await?;
    info!(username, "account created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStore;
    use mockito::Matcher;

    #[tokio::test]
    async fn rejected_login_shows_server_detail_and_stores_nothing() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/login")
            .match_body(Matcher::Json(json!({ "username": "alice", "password": "pw123" })))
            .with_status(401)
            .with_body(r#"{"detail":"Invalid credentials"}"#)
            .create_async()
            .await;
        let logout = server
            .mock("POST", "/auth/logout")
            .expect(0)
            .create_async()
            .await;

        let api = ApiClient::new(&server.url(), SessionStore::in_memory());
        let form = LoginForm {
            username: "Alice".to_string(),
            password: "pw123".to_string(),
        };
        let err = login(&api, &form).await.unwrap_err();

        assert!(matches!(err, ApiError::Authentication { .. }));
        assert_eq!(err.to_string(), "Invalid credentials");
        assert!(api.session().current_session().unwrap().is_none());
        mock.assert_async().await;
        logout.assert_async().await;
    }

    #[tokio::test]
    async fn successful_login_persists_token_user_and_role() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_body(
                r#"{"access_token":"jwt-abc","token_type":"bearer",
                    "user":{"id":1,"username":"alice","email":"a@x.io","role":"admin"}}"#,
            )
            .create_async()
            .await;

        let api = ApiClient::new(&server.url(), SessionStore::in_memory());
        let form = LoginForm {
            username: " Alice ".to_string(),
            password: "pw123".to_string(),
        };
        let session = login(&api, &form).await.unwrap();

        assert_eq!(session.username, "Alice");
        assert_eq!(session.token, "jwt-abc");
        assert_eq!(session.role, Role::Admin);
        assert_eq!(api.session().current_session().unwrap(), Some(session));
    }

    #[tokio::test]
    async fn register_rejects_bad_username_locally() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/register")
            .expect(0)
            .create_async()
            .await;

        let api = ApiClient::new(&server.url(), SessionStore::in_memory());
        let form = RegisterForm {
            username: "bad name!".to_string(),
            email: "x@y.z".to_string(),
            password: "Secret123".to_string(),
        };
        let err = register(&api, &form).await.unwrap_err();

        assert!(matches!(err, ApiError::InvalidInput(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn register_joins_validation_messages() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/register")
            .match_body(Matcher::PartialJson(json!({ "username": "bob", "email": "bob@x.io" })))
            .with_status(422)
            .with_body(
                r#"{"detail":[{"msg":"Password must contain at least one digit"},
                              {"msg":"value is not a valid email address"}]}"#,
            )
            .create_async()
            .await;

        let api = ApiClient::new(&server.url(), SessionStore::in_memory());
        let form = RegisterForm {
            username: "Bob".to_string(),
            email: "Bob@X.io".to_string(),
            password: "Secret".to_string(),
        };
        let err = register(&api, &form).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Password must contain at least one digit; value is not a valid email address"
        );
    }
}
