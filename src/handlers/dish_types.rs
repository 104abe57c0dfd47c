use actix_web::{get, post, web, HttpResponse};

use crate::auth::CurrentCook;
use crate::error::ApiResult;
use crate::forms::{save_error, DishTypeForm};
use crate::handlers::{redirect, FormPage, ListPage, Store};
use crate::models::{DishType, DishTypeDetail};
use crate::search::DishTypeSearch;

pub const LIST_PATH: &str = "/dish-types";

#[get("/dish-types")]
pub async fn list(
    _cook: CurrentCook,
    store: Store,
    search: web::Query<DishTypeSearch>,
) -> ApiResult<web::Json<ListPage<DishTypeSearch, DishType>>> {
    let search = search.into_inner();
    let predicate = search.predicate();
    let store = store.into_inner();
    let items = web::block(move || store.list_dish_types(predicate.as_ref())).await??;
    Ok(web::Json(ListPage {
        search: search.cleaned(),
        items,
    }))
}

#[get("/dish-types/create")]
pub async fn create_form(_cook: CurrentCook) -> web::Json<FormPage<DishTypeForm>> {
    web::Json(FormPage {
        form: DishTypeForm::default(),
    })
}

#[post("/dish-types/create")]
pub async fn create(
    _cook: CurrentCook,
    store: Store,
    payload: web::Json<DishTypeForm>,
) -> ApiResult<HttpResponse> {
    let new = payload.validate()?;
    let store = store.into_inner();
    let created = web::block(move || store.create_dish_type(&new))
        .await?
        .map_err(save_error)?;
    log::info!("dish type {} created as {:?}", created.id, created.name);
    Ok(redirect(LIST_PATH))
}

#[get("/dish-types/{id}")]
pub async fn detail(
    _cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
) -> ApiResult<web::Json<DishTypeDetail>> {
    let id = path.into_inner();
    let store = store.into_inner();
    let record = web::block(move || store.get_dish_type(id)).await??;
    Ok(web::Json(record))
}

#[get("/dish-types/{id}/update")]
pub async fn update_form(
    _cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
) -> ApiResult<web::Json<FormPage<DishTypeForm>>> {
    let id = path.into_inner();
    let store = store.into_inner();
    let record = web::block(move || store.get_dish_type(id)).await??;
    Ok(web::Json(FormPage {
        form: DishTypeForm::from(&record.dish_type),
    }))
}

#[post("/dish-types/{id}/update")]
pub async fn update(
    _cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
    payload: web::Json<DishTypeForm>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let store = store.into_inner();
    let lookup = store.clone();
    web::block(move || lookup.get_dish_type(id)).await??;

    let changes = payload.validate()?;
    let updated = web::block(move || store.update_dish_type(id, &changes))
        .await?
        .map_err(save_error)?;
    log::info!("dish type {} renamed to {:?}", updated.id, updated.name);
    Ok(redirect(LIST_PATH))
}

#[get("/dish-types/{id}/delete")]
pub async fn delete_confirm(
    _cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
) -> ApiResult<web::Json<DishTypeDetail>> {
    let id = path.into_inner();
    let store = store.into_inner();
    let record = web::block(move || store.get_dish_type(id)).await??;
    Ok(web::Json(record))
}

#[post("/dish-types/{id}/delete")]
pub async fn delete(
    _cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let store = store.into_inner();
    web::block(move || store.delete_dish_type(id)).await??;
    log::info!("dish type {id} deleted with its dishes");
    Ok(redirect(LIST_PATH))
}
