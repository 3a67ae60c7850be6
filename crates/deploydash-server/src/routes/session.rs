use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, Html, IntoResponse, Redirect, Response};
use axum::Form;
use chrono::Utc;
use serde::Deserialize;

use crate::auth;
use crate::render;
use crate::state::{AppState, Notice, NoticeLevel};

pub const PROMPT_MESSAGE: &str = "Please enter your username and password";
pub const FAILED_MESSAGE: &str = "Username/password is incorrect";

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// GET /login: the login form, or straight to the dashboard when a valid
/// session cookie is already present.
pub async fn login_form(State(app): State<AppState>, headers: HeaderMap) -> Response {
    if auth::session_user(&app, &headers).is_some() {
        return Redirect::to("/").into_response();
    }
    let prompt = Notice::new(NoticeLevel::Warning, PROMPT_MESSAGE);
    Html(render::login_page(Some(&prompt))).into_response()
}

/// POST /login: verify the credentials and issue the session cookie.
pub async fn login(State(app): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let username = form.username.trim().to_string();
    if username.is_empty() || form.password.is_empty() {
        let prompt = Notice::new(NoticeLevel::Warning, PROMPT_MESSAGE);
        return Html(render::login_page(Some(&prompt))).into_response();
    }

    let verified = match app.auth.credential(&username).cloned() {
        Some(credential) => {
            let password = form.password;
            tokio::task::spawn_blocking(move || auth::verify_password(&credential, &password))
                .await
                .unwrap_or(false)
        }
        None => false,
    };

    if !verified {
        tracing::warn!(%username, "failed login");
        let error = Notice::new(NoticeLevel::Error, FAILED_MESSAGE);
        return (StatusCode::UNAUTHORIZED, Html(render::login_page(Some(&error)))).into_response();
    }

    tracing::info!(%username, "login");
    let token = auth::issue_token(&app.auth.cookie, &username, Utc::now());
    (
        AppendHeaders([(
            header::SET_COOKIE,
            auth::session_cookie(&app.auth.cookie, &token),
        )]),
        Redirect::to("/"),
    )
        .into_response()
}

/// POST /logout: drop the session cookie.
pub async fn logout(State(app): State<AppState>) -> Response {
    (
        AppendHeaders([(header::SET_COOKIE, auth::clear_cookie(&app.auth.cookie))]),
        Redirect::to("/login"),
    )
        .into_response()
}
