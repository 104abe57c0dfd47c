use std::io;
use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};

use kitchen::auth;
use kitchen::config::Settings;
use kitchen::handlers;
use kitchen::store::{self, KitchenStore, MysqlStore};

fn startup_error(err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::from_env().map_err(startup_error)?;
    let key = settings.session_key().map_err(startup_error)?;
    let hasher = web::Data::new(settings.hasher().map_err(startup_error)?);

    // set up database connection pool
    let pool = store::build_pool(&settings.database_url, settings.pool_size)
        .map_err(startup_error)?;
    store::run_migrations(&pool).map_err(startup_error)?;
    let store: Arc<dyn KitchenStore> = Arc::new(MysqlStore::new(pool));
    let store = web::Data::from(store);

    let cookie_secure = settings.cookie_secure;
    log::info!("starting HTTP server at http://{}", settings.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(store.clone())
            .app_data(hasher.clone())
            .wrap(auth::session_middleware(key.clone(), cookie_secure))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(settings.bind_addr)?
    .run()
    .await
}
