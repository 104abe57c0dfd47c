use actix_web::{get, web};
use serde::Serialize;

use crate::auth::CurrentCook;
use crate::error::ApiResult;
use crate::handlers::Store;
use crate::models::Counts;

#[derive(Debug, Serialize)]
pub struct About {
    pub name: &'static str,
    pub description: &'static str,
}

#[get("/")]
pub async fn index(_cook: CurrentCook, store: Store) -> ApiResult<web::Json<Counts>> {
    let store = store.into_inner();
    let counts = web::block(move || store.counts()).await??;
    Ok(web::Json(counts))
}

#[get("/about")]
pub async fn about() -> web::Json<About> {
    web::Json(About {
        name: "Kitchen service",
        description: "Dish types, dishes and the cooks who make them.",
    })
}
