//! Login state and the login-required gate.
//!
//! The session cookie carries only the cook id. Handlers that need a logged-in
//! cook take a [`CurrentCook`] argument. The extractor checks that the cook
//! still exists; without a session, or for a deleted cook, it answers with a
//! redirect to the login entry point instead of running the handler.

use actix_session::config::CookieContentSecurity;
use actix_session::storage::CookieSessionStore;
use actix_session::{Session, SessionExt, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::dev::Payload;
use actix_web::error::InternalError;
use actix_web::{get, post, web, FromRequest, HttpRequest, HttpResponse};
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use futures_util::future::LocalBoxFuture;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ApiResult, Error};
use crate::handlers::{redirect, Store};
use crate::store::StoreError;

pub const LOGIN_PATH: &str = "/accounts/login";
pub const LOGOUT_PATH: &str = "/accounts/logout";
pub const SESSION_COOKIE: &str = "kitchen_session";

pub(crate) const COOK_ID_KEY: &str = "cook_id";

/// Argon2id hashing with configurable cost.
#[derive(Clone)]
pub struct Hasher {
    params: Params,
}

impl Hasher {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, argon2::Error> {
        Ok(Self {
            params: Params::new(memory_kib, iterations, 1, None)?,
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Returns a PHC string embedding the salt and parameters.
    pub fn hash(&self, password: &str) -> Result<String, Error> {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill(&mut salt);
        let salt = SaltString::encode_b64(&salt)
            .map_err(|err| Error::internal(format!("failed to encode salt: {err}")))?;
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| Error::internal(format!("failed to hash password: {err}")))
    }

    pub fn verify(&self, password: &str, password_hash: &str) -> bool {
        match PasswordHash::new(password_hash) {
            Ok(parsed) => self
                .argon2()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(err) => {
                log::warn!("stored password hash is unreadable: {err}");
                false
            }
        }
    }
}

pub fn session_middleware(key: Key, cookie_secure: bool) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name(SESSION_COOKIE.to_owned())
        .cookie_secure(cookie_secure)
        .cookie_content_security(CookieContentSecurity::Private)
        .build()
}

/// Id of the logged-in cook, taken from the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentCook(i32);

impl CurrentCook {
    pub fn id(self) -> i32 {
        self.0
    }
}

/// `302` to the login entry point, remembering where the visitor was going.
pub fn login_redirect(req: &HttpRequest) -> HttpResponse {
    let next = req
        .uri()
        .path_and_query()
        .map(|path| path.as_str())
        .unwrap_or("/");
    let next: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    redirect(&format!("{LOGIN_PATH}?next={next}"))
}

fn login_required(req: &HttpRequest) -> actix_web::Error {
    InternalError::from_response("login required", login_redirect(req)).into()
}

impl FromRequest for CurrentCook {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let session = req.get_session();
            let id = match session.get::<i32>(COOK_ID_KEY) {
                Ok(Some(id)) => id,
                Ok(None) => return Err(login_required(&req)),
                Err(err) => {
                    log::warn!("unreadable session cookie: {err}");
                    return Err(login_required(&req));
                }
            };

            let store = match req.app_data::<Store>() {
                Some(store) => store.clone().into_inner(),
                None => return Err(Error::internal("kitchen store is not configured").into()),
            };
            let found = match web::block(move || store.find_cook(id)).await {
                Ok(found) => found,
                Err(err) => return Err(Error::from(err).into()),
            };
            match found {
                Ok(_) => Ok(CurrentCook(id)),
                Err(StoreError::NotFound { .. }) => {
                    log::info!("session for deleted cook {id} dropped");
                    session.purge();
                    Err(login_required(&req))
                }
                Err(err) => Err(Error::from(err).into()),
            }
        })
    }
}

/// Only same-site absolute paths are honoured as a post-login target.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[get("/accounts/login")]
pub async fn login_form(query: web::Query<LoginQuery>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "fields": ["username", "password"],
        "next": safe_next(query.next.as_deref()),
    }))
}

#[post("/accounts/login")]
pub async fn login(
    session: Session,
    store: Store,
    hasher: web::Data<Hasher>,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let LoginRequest {
        username,
        password,
        next,
    } = payload.into_inner();
    let username = username.trim().to_string();
    if username.is_empty() || password.is_empty() {
        return Err(Error::invalid_request("username and password are required")
            .with_details(json!({ "fields": ["username", "password"] })));
    }

    let store = store.into_inner();
    let hasher = hasher.get_ref().clone();
    let attempted = username.clone();
    let cook_id = web::block(move || -> Result<Option<i32>, Error> {
        let credentials = store.find_credentials(&username)?;
        Ok(credentials
            .filter(|credentials| hasher.verify(&password, &credentials.password_hash))
            .map(|credentials| credentials.id))
    })
    .await??;

    let Some(cook_id) = cook_id else {
        log::info!("rejected login for {attempted}");
        return Err(Error::unauthorized("invalid credentials"));
    };

    session.renew();
    session
        .insert(COOK_ID_KEY, cook_id)
        .map_err(|err| Error::internal(format!("failed to persist session: {err}")))?;
    log::info!("cook {cook_id} logged in");
    Ok(redirect(safe_next(next.as_deref())))
}

#[post("/accounts/logout")]
pub async fn logout(session: Session) -> HttpResponse {
    session.purge();
    redirect(LOGIN_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::KitchenStore;
    use crate::test_utils::{cheap_hasher, seed_cook, session_cookie, test_session_middleware};
    use std::sync::Arc;
    use actix_web::http::StatusCode;
    use actix_web::http::header;
    use actix_web::{test as actix_test, App};
    use rstest::rstest;

    #[test]
    fn hashes_verify_only_the_original_password() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("user12345").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("user12345", &hash));
        assert!(!hasher.verify("user54321", &hash));
        assert!(!hasher.verify("user12345", "not a phc string"));
    }

    #[test]
    fn equal_passwords_get_distinct_salts() {
        let hasher = cheap_hasher();
        let first = hasher.hash("user12345").expect("hash");
        let second = hasher.hash("user12345").expect("hash");
        assert_ne!(first, second);
    }

    #[rstest]
    #[case(None, "/")]
    #[case(Some("/dishes?name=pa"), "/dishes?name=pa")]
    #[case(Some("//evil.example"), "/")]
    #[case(Some("https://evil.example/"), "/")]
    #[case(Some("/\\evil.example"), "/")]
    fn only_local_paths_are_followed(#[case] next: Option<&str>, #[case] expected: &str) {
        assert_eq!(safe_next(next), expected);
    }

    #[actix_web::test]
    async fn missing_session_redirects_to_login_with_next() {
        let app = actix_test::init_service(App::new().wrap(test_session_middleware()).route(
            "/dishes",
            web::get().to(|_cook: CurrentCook| async { HttpResponse::Ok().finish() }),
        ))
        .await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/dishes?name=pa").to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .expect("location header");
        assert_eq!(location, "/accounts/login?next=%2Fdishes%3Fname%3Dpa");
    }

    fn whoami_app(
        store: Arc<MemoryStore>,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let store: Arc<dyn KitchenStore> = store;
        App::new()
            .app_data(web::Data::from(store))
            .wrap(test_session_middleware())
            .route(
                "/set/{id}",
                web::get().to(|session: Session, id: web::Path<i32>| async move {
                    session
                        .insert(COOK_ID_KEY, id.into_inner())
                        .expect("insert cook id");
                    HttpResponse::Ok().finish()
                }),
            )
            .route(
                "/whoami",
                web::get().to(|cook: CurrentCook| async move {
                    HttpResponse::Ok().body(cook.id().to_string())
                }),
            )
    }

    #[actix_web::test]
    async fn session_cook_id_is_extracted() {
        let store = Arc::new(MemoryStore::new());
        let cook = seed_cook(&store, "john", "user12345");
        let app = actix_test::init_service(whoami_app(store)).await;

        let set = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri(&format!("/set/{}", cook.id))
                .to_request(),
        )
        .await;
        let cookie = session_cookie(&set);
        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/whoami").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(actix_test::read_body(response).await, cook.id.to_string());
    }

    #[actix_web::test]
    async fn session_of_a_deleted_cook_is_dropped() {
        let store = Arc::new(MemoryStore::new());
        let cook = seed_cook(&store, "john", "user12345");
        let app = actix_test::init_service(whoami_app(store.clone())).await;

        let set = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri(&format!("/set/{}", cook.id))
                .to_request(),
        )
        .await;
        let cookie = session_cookie(&set);
        store.delete_cook(cook.id).expect("delete cook");

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/whoami").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok()),
            Some("/accounts/login?next=%2Fwhoami")
        );
        let cleared = response
            .response()
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE)
            .expect("session cookie removed");
        assert!(cleared.value().is_empty());
    }
}
