use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};

use super::mocks::{twitter_config, TwitterScript, REQUEST_KEY};
use crate::auth_routes::{ErrorResponse, TWITTER_REQUEST_TOKEN_COOKIE};
use crate::{configure_auth_routes, AuthChain, AuthState, LoginResponse, TwitterBackend};
use social_auth_types::{ProviderError, TWITTER_BACKEND};

fn request_token_cookie(key: &str) -> Cookie<'static> {
    Cookie::new(TWITTER_REQUEST_TOKEN_COOKIE, key.to_string())
}

fn auth_state(script: TwitterScript) -> AuthState {
    let twitter = Arc::new(TwitterBackend::new(twitter_config(), script.into_factory()));
    let chain = Arc::new(AuthChain::new().with_backend(twitter.clone()));
    AuthState::new(chain, twitter)
}

#[actix_rt::test]
async fn test_generates_405_on_non_post() {
    let state = auth_state(TwitterScript::succeeding(1, "Foo Barger"));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_auth_routes),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/auth/twitter/login")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[actix_rt::test]
async fn test_redirects_to_twitter_for_authentication() {
    let state = auth_state(TwitterScript::succeeding(1, "Foo Barger"));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(configure_auth_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/auth/twitter/login")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = resp
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(
        location.starts_with("http://twitter.com/oauth/authorize"),
        "should redirect to http://twitter.com/oauth/authorize, got {}",
        location
    );

    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == TWITTER_REQUEST_TOKEN_COOKIE)
        .expect("request token cookie should be set");
    assert_eq!(cookie.value(), REQUEST_KEY);

    assert!(state.pending_tokens.read().await.contains_key(REQUEST_KEY));
}

#[actix_rt::test]
async fn test_request_token_failure_is_bad_gateway() {
    let state = auth_state(
        TwitterScript::succeeding(1, "Foo Barger")
            .request_token_error(ProviderError::Transport("timed out".to_string())),
    );
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(configure_auth_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/auth/twitter/login")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(state.pending_tokens.read().await.is_empty());
}

#[actix_rt::test]
async fn test_callback_completes_login() {
    let state = auth_state(TwitterScript::succeeding(67890, "Foo Barger"));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(configure_auth_routes),
    )
    .await;

    let login = test::TestRequest::post()
        .uri("/auth/twitter/login")
        .to_request();
    assert_eq!(test::call_service(&app, login).await.status(), StatusCode::FOUND);

    let callback = test::TestRequest::get()
        .uri("/auth/twitter/callback?oauth_token=request-key&oauth_verifier=v1")
        .cookie(request_token_cookie(REQUEST_KEY))
        .to_request();
    let resp = test::call_service(&app, callback).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: LoginResponse = test::read_body_json(resp).await;
    assert_eq!(body.username, "tw$67890");
    assert_eq!(body.first_name, "Foo");
    assert_eq!(body.last_name, "Barger");
    assert_eq!(body.backend, TWITTER_BACKEND);

    assert!(state.pending_tokens.read().await.is_empty());
}

#[actix_rt::test]
async fn test_callback_without_query_token_uses_cookie() {
    let state = auth_state(TwitterScript::succeeding(5, "Foo Barger"));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(configure_auth_routes),
    )
    .await;

    let login = test::TestRequest::post()
        .uri("/auth/twitter/login")
        .to_request();
    test::call_service(&app, login).await;

    let callback = test::TestRequest::get()
        .uri("/auth/twitter/callback")
        .cookie(request_token_cookie(REQUEST_KEY))
        .to_request();
    let resp = test::call_service(&app, callback).await;

    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_callback_rejects_unknown_token() {
    let state = auth_state(TwitterScript::succeeding(1, "Foo Barger"));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_auth_routes),
    )
    .await;

    let callback = test::TestRequest::get()
        .uri("/auth/twitter/callback?oauth_token=never-issued")
        .cookie(request_token_cookie("never-issued"))
        .to_request();
    let resp = test::call_service(&app, callback).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "invalid_request_token");
}

#[actix_rt::test]
async fn test_callback_unauthorized_when_exchange_fails() {
    let state = auth_state(
        TwitterScript::succeeding(1, "Foo Barger")
            .access_token_error(ProviderError::Transport("timed out".to_string())),
    );
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_auth_routes),
    )
    .await;

    let login = test::TestRequest::post()
        .uri("/auth/twitter/login")
        .to_request();
    test::call_service(&app, login).await;

    let callback = test::TestRequest::get()
        .uri("/auth/twitter/callback?oauth_token=request-key")
        .cookie(request_token_cookie(REQUEST_KEY))
        .to_request();
    let resp = test::call_service(&app, callback).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_callback_denied() {
    let state = auth_state(TwitterScript::succeeding(1, "Foo Barger"));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_auth_routes),
    )
    .await;

    let callback = test::TestRequest::get()
        .uri("/auth/twitter/callback?denied=request-key")
        .to_request();
    let resp = test::call_service(&app, callback).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_callback_requires_request_token_cookie() {
    let state = auth_state(TwitterScript::succeeding(1, "Foo Barger"));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(configure_auth_routes),
    )
    .await;

    let login = test::TestRequest::post()
        .uri("/auth/twitter/login")
        .to_request();
    test::call_service(&app, login).await;

    let callback = test::TestRequest::get()
        .uri("/auth/twitter/callback?oauth_token=request-key")
        .to_request();
    let resp = test::call_service(&app, callback).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "missing_request_token");
    assert!(state.pending_tokens.read().await.contains_key(REQUEST_KEY));
}

#[actix_rt::test]
async fn test_callback_rejects_token_issued_to_another_client() {
    let state = auth_state(TwitterScript::succeeding(1, "Foo Barger"));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(configure_auth_routes),
    )
    .await;

    // Login started by one client
    let login = test::TestRequest::post()
        .uri("/auth/twitter/login")
        .to_request();
    assert_eq!(test::call_service(&app, login).await.status(), StatusCode::FOUND);

    // Callback for that token replayed by a client holding a different token
    let callback = test::TestRequest::get()
        .uri("/auth/twitter/callback?oauth_token=request-key&oauth_verifier=v1")
        .cookie(request_token_cookie("other-clients-token"))
        .to_request();
    let resp = test::call_service(&app, callback).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "invalid_request_token");
    assert!(state.pending_tokens.read().await.contains_key(REQUEST_KEY));
}
