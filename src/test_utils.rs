//! Test helpers: an app wired to the in-memory store and a quick way to log in.

use std::sync::Arc;

use actix_http::Request;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::body::MessageBody;
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{Service, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::{test, web, App};
use serde_json::json;

use crate::auth::{session_middleware, Hasher, LOGIN_PATH, SESSION_COOKIE};
use crate::handlers;
use crate::memory::MemoryStore;
use crate::models::{Cook, NewCook};
use crate::store::KitchenStore;

pub const TEST_USERNAME: &str = "chef";
pub const TEST_PASSWORD: &str = "kitchen-secret";

/// Argon2 at its minimum cost so hashing stays fast in debug builds.
pub fn cheap_hasher() -> Hasher {
    Hasher::new(8, 1).expect("minimal argon2 parameters")
}

/// Fresh key per call, `Secure` off for plain-HTTP tests.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    session_middleware(Key::generate(), false)
}

pub fn test_app(
    store: Arc<MemoryStore>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let store: Arc<dyn KitchenStore> = store;
    App::new()
        .app_data(web::Data::from(store))
        .app_data(web::Data::new(cheap_hasher()))
        .wrap(test_session_middleware())
        .configure(handlers::configure)
}

pub fn seed_cook(store: &MemoryStore, username: &str, password: &str) -> Cook {
    let password = cheap_hasher().hash(password).expect("hash test password");
    store
        .create_cook(&NewCook {
            username: username.to_string(),
            first_name: "Test".to_string(),
            last_name: "Cook".to_string(),
            password,
            years_of_experience: Some(1),
        })
        .expect("seed cook")
}

pub fn session_cookie<B>(response: &ServiceResponse<B>) -> Cookie<'static> {
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(Cookie::into_owned)
        .expect("session cookie set")
}

pub fn location<B>(response: &ServiceResponse<B>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location header")
        .to_string()
}

pub async fn login<S, B>(app: &S, username: &str, password: &str) -> Cookie<'static>
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let response = test::call_service(
        app,
        test::TestRequest::post()
            .uri(LOGIN_PATH)
            .set_json(json!({ "username": username, "password": password }))
            .to_request(),
    )
    .await;
    assert!(
        response.status().is_redirection(),
        "login failed with {}",
        response.status()
    );
    session_cookie(&response)
}

/// Seeds the default test cook when missing and returns its session cookie.
pub async fn logged_in<S, B>(app: &S, store: &MemoryStore) -> Cookie<'static>
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let known = store
        .find_credentials(TEST_USERNAME)
        .expect("credentials lookup")
        .is_some();
    if !known {
        seed_cook(store, TEST_USERNAME, TEST_PASSWORD);
    }
    login(app, TEST_USERNAME, TEST_PASSWORD).await
}
