use actix_web::{get, post, web, HttpResponse};

use crate::auth::{CurrentCook, Hasher};
use crate::error::ApiResult;
use crate::forms::{save_error, CookForm};
use crate::handlers::{redirect, FormPage, ListPage, Store};
use crate::models::{Cook, CookDetail};
use crate::search::CookSearch;

pub const LIST_PATH: &str = "/cooks";

#[get("/cooks")]
pub async fn list(
    _cook: CurrentCook,
    store: Store,
    search: web::Query<CookSearch>,
) -> ApiResult<web::Json<ListPage<CookSearch, Cook>>> {
    let search = search.into_inner();
    let predicate = search.predicate();
    let store = store.into_inner();
    let items = web::block(move || store.list_cooks(predicate.as_ref())).await??;
    Ok(web::Json(ListPage {
        search: search.cleaned(),
        items,
    }))
}

#[get("/cooks/create")]
pub async fn create_form(_cook: CurrentCook) -> web::Json<FormPage<CookForm>> {
    web::Json(FormPage {
        form: CookForm::default(),
    })
}

#[post("/cooks/create")]
pub async fn create(
    _cook: CurrentCook,
    store: Store,
    hasher: web::Data<Hasher>,
    payload: web::Json<CookForm>,
) -> ApiResult<HttpResponse> {
    let submission = payload.validate()?;
    let store = store.into_inner();
    let created = web::block(move || {
        let password_hash = hasher.hash(&submission.password)?;
        store
            .create_cook(&submission.into_new_cook(password_hash))
            .map_err(save_error)
    })
    .await??;
    log::info!("cook {} created as {:?}", created.id, created.username);
    Ok(redirect(LIST_PATH))
}

#[get("/cooks/{id}")]
pub async fn detail(
    _cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
) -> ApiResult<web::Json<CookDetail>> {
    let id = path.into_inner();
    let store = store.into_inner();
    let record = web::block(move || store.get_cook(id)).await??;
    Ok(web::Json(record))
}

#[get("/cooks/{id}/update")]
pub async fn update_form(
    _cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
) -> ApiResult<web::Json<FormPage<CookForm>>> {
    let id = path.into_inner();
    let store = store.into_inner();
    let record = web::block(move || store.get_cook(id)).await??;
    Ok(web::Json(FormPage {
        form: CookForm::from(&record.cook),
    }))
}

#[post("/cooks/{id}/update")]
pub async fn update(
    _cook: CurrentCook,
    store: Store,
    hasher: web::Data<Hasher>,
    path: web::Path<i32>,
    payload: web::Json<CookForm>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let store = store.into_inner();
    let lookup = store.clone();
    web::block(move || lookup.get_cook(id)).await??;

    let submission = payload.validate()?;
    let updated = web::block(move || {
        let password_hash = hasher.hash(&submission.password)?;
        store
            .update_cook(id, &submission.into_new_cook(password_hash))
            .map_err(save_error)
    })
    .await??;
    log::info!("cook {} updated", updated.id);
    Ok(redirect(LIST_PATH))
}

#[get("/cooks/{id}/delete")]
pub async fn delete_confirm(
    _cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
) -> ApiResult<web::Json<CookDetail>> {
    let id = path.into_inner();
    let store = store.into_inner();
    let record = web::block(move || store.get_cook(id)).await??;
    Ok(web::Json(record))
}

#[post("/cooks/{id}/delete")]
pub async fn delete(
    _cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let store = store.into_inner();
    web::block(move || store.delete_cook(id)).await??;
    log::info!("cook {id} deleted");
    Ok(redirect(LIST_PATH))
}
