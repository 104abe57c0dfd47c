//! HTTP handlers and route table.
//!
//! ```text
//! GET  /                               dashboard counts
//! GET  /about                          no login needed
//! GET  /dish-types[?name=]             list, prefix search
//! GET  /dish-types/create              empty form
//! POST /dish-types/create              validate + insert, 302 to list
//! GET  /dish-types/{id}                detail
//! GET  /dish-types/{id}/update         form with current values
//! POST /dish-types/{id}/update         validate + save, 302 to list
//! GET  /dish-types/{id}/delete         confirmation preview
//! POST /dish-types/{id}/delete         delete, 302 to list
//! ...  /dishes, /cooks                 same shape (?username= for cooks)
//! POST /dishes/{id}/toggle-assign      302 to the dish
//! ```

use actix_web::http::header;
use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::auth;
use crate::error::Error;
use crate::store::KitchenStore;

pub mod cooks;
pub mod dashboard;
pub mod dish_types;
pub mod dishes;

pub type Store = web::Data<dyn KitchenStore>;

/// A list screen: the rows plus the search box's last value.
#[derive(Debug, Serialize)]
pub struct ListPage<S, T> {
    pub search: S,
    pub items: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct FormPage<F> {
    pub form: F,
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        Error::invalid_request(format!("malformed request body: {err}")).into()
    }))
    .service(dashboard::index)
    .service(dashboard::about)
    .service(auth::login_form)
    .service(auth::login)
    .service(auth::logout)
    // `create` routes come before `{id}` so the literal segment wins.
    .service(dish_types::list)
    .service(dish_types::create_form)
    .service(dish_types::create)
    .service(dish_types::detail)
    .service(dish_types::update_form)
    .service(dish_types::update)
    .service(dish_types::delete_confirm)
    .service(dish_types::delete)
    .service(dishes::list)
    .service(dishes::create_form)
    .service(dishes::create)
    .service(dishes::detail)
    .service(dishes::update_form)
    .service(dishes::update)
    .service(dishes::delete_confirm)
    .service(dishes::delete)
    .service(dishes::toggle_assign)
    .service(cooks::list)
    .service(cooks::create_form)
    .service(cooks::create)
    .service(cooks::detail)
    .service(cooks::update_form)
    .service(cooks::update)
    .service(cooks::delete_confirm)
    .service(cooks::delete);
}
