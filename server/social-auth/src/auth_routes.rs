use std::collections::HashMap;
use std::sync::Arc;

use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::{AuthChain, TwitterBackend};
use social_auth_types::{Authenticated, Credentials, OAuthToken, TwitterCredentials};

/// Cookie carrying the key of the request token issued to this user agent
pub const TWITTER_REQUEST_TOKEN_COOKIE: &str = "twitter_request_token";

const PENDING_TOKEN_MAX_AGE_SECS: i64 = 600;

/// Request token handed out by the login endpoint, awaiting the callback
#[derive(Debug, Clone)]
pub struct PendingRequestToken {
    pub token: OAuthToken,
    pub created_at: DateTime<Utc>,
}

impl PendingRequestToken {
    pub fn new(token: OAuthToken) -> Self {
        Self {
            token,
            created_at: Utc::now(),
        }
    }

    /// Check if the token has been pending longer than `max_age_seconds`
    pub fn is_expired(&self, max_age_seconds: i64) -> bool {
        Utc::now() - self.created_at > chrono::Duration::seconds(max_age_seconds)
    }
}

/// Server state for authentication endpoints
#[derive(Clone)]
pub struct AuthState {
    pub chain: Arc<AuthChain>,
    pub twitter: Arc<TwitterBackend>,
    pub pending_tokens: Arc<RwLock<HashMap<String, PendingRequestToken>>>,
}

impl AuthState {
    pub fn new(chain: Arc<AuthChain>, twitter: Arc<TwitterBackend>) -> Self {
        Self {
            chain,
            twitter,
            pending_tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn remember_request_token(&self, token: OAuthToken) {
        let mut pending = self.pending_tokens.write().await;
        pending.retain(|_, p| !p.is_expired(PENDING_TOKEN_MAX_AGE_SECS));
        pending.insert(token.key.clone(), PendingRequestToken::new(token));
    }

    /// Remove and return a pending request token if it has not expired
    pub async fn take_request_token(&self, key: &str) -> Option<OAuthToken> {
        let mut pending = self.pending_tokens.write().await;
        pending
            .remove(key)
            .filter(|p| !p.is_expired(PENDING_TOKEN_MAX_AGE_SECS))
            .map(|p| p.token)
    }
}

/// Query parameters the provider appends to the callback URL
#[derive(Debug, Deserialize)]
pub struct TwitterCallback {
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
    pub denied: Option<String>,
}

/// Successful login payload
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub backend: String,
}

impl From<Authenticated> for LoginResponse {
    fn from(authenticated: Authenticated) -> Self {
        let Authenticated { user, backend } = authenticated;
        Self {
            username: user.username.into(),
            first_name: user.first_name,
            last_name: user.last_name,
            backend: backend.to_string(),
        }
    }
}

/// Error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    message: impl Into<String>,
) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        error: error.into(),
        message: message.into(),
    })
}

/// Configure authentication routes
pub fn configure_auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/twitter/login")
                    .route(web::post().to(initiate_twitter_login))
                    .default_service(web::to(method_not_allowed)),
            )
            .route("/twitter/callback", web::get().to(twitter_callback)),
    );
}

async fn method_not_allowed() -> HttpResponse {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "method_not_allowed",
        "Login must be initiated with POST",
    )
}

/// POST /auth/twitter/login - Obtain a request token and send the user agent
/// to the provider to authorize it
pub async fn initiate_twitter_login(auth_state: web::Data<AuthState>) -> Result<HttpResponse> {
    let request_token = match auth_state.twitter.client(None).get_request_token().await {
        Ok(token) => token,
        Err(e) => {
            error!("Failed to obtain Twitter request token: {}", e);
            return Ok(error_response(
                StatusCode::BAD_GATEWAY,
                "request_token_error",
                format!("Failed to obtain request token: {}", e),
            ));
        }
    };

    let authorization_url = match auth_state.twitter.authorization_url(&request_token) {
        Ok(url) => url,
        Err(e) => {
            error!("Failed to build Twitter authorization URL: {}", e);
            return Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "auth_url_error",
                format!("Failed to build authorization URL: {}", e),
            ));
        }
    };

    let cookie = Cookie::build(TWITTER_REQUEST_TOKEN_COOKIE, request_token.key.clone())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish();
    auth_state.remember_request_token(request_token).await;

    info!("Redirecting to Twitter for authorization");
    Ok(HttpResponse::Found()
        .cookie(cookie)
        .append_header((header::LOCATION, authorization_url))
        .finish())
}

/// GET /auth/twitter/callback - Exchange the authorized request token and
/// resolve the local user
pub async fn twitter_callback(
    req: HttpRequest,
    auth_state: web::Data<AuthState>,
    query: web::Query<TwitterCallback>,
) -> Result<HttpResponse> {
    let callback = query.into_inner();

    if callback.denied.is_some() {
        return Ok(error_response(
            StatusCode::UNAUTHORIZED,
            "access_denied",
            "Authorization was denied by the user",
        ));
    }

    // The pending token must belong to the user agent that started the login
    let Some(token_key) = req
        .cookie(TWITTER_REQUEST_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|key| !key.is_empty())
    else {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            "missing_request_token",
            "No login is in progress for this client",
        ));
    };

    if callback
        .oauth_token
        .as_deref()
        .is_some_and(|oauth_token| oauth_token != token_key)
    {
        warn!("Twitter callback token does not match the client's request token");
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request_token",
            "Request token was not issued to this client",
        ));
    }

    let Some(request_token) = auth_state.take_request_token(&token_key).await else {
        warn!("Unknown or expired Twitter request token");
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request_token",
            "Invalid or expired request token",
        ));
    };

    let mut twitter_credentials = TwitterCredentials::new(request_token);
    if let Some(verifier) = callback.oauth_verifier {
        twitter_credentials = twitter_credentials.with_verifier(verifier);
    }
    let credentials = Credentials::Twitter(twitter_credentials);

    match auth_state.chain.authenticate(&credentials).await {
        Some(authenticated) => {
            let mut removal = Cookie::build(TWITTER_REQUEST_TOKEN_COOKIE, "")
                .path("/")
                .finish();
            removal.make_removal();
            Ok(HttpResponse::Ok()
                .cookie(removal)
                .json(LoginResponse::from(authenticated)))
        }
        None => Ok(error_response(
            StatusCode::UNAUTHORIZED,
            "authentication_failed",
            "No backend authenticated the request token",
        )),
    }
}
