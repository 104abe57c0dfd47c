use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::auth::{login_redirect, CurrentCook};
use crate::error::ApiResult;
use crate::forms::{save_error, DishForm};
use crate::handlers::{redirect, ListPage, Store};
use crate::models::{Cook, DishDetail, DishType, DishWithType};
use crate::search::DishSearch;
use crate::store::{KitchenStore, StoreError};

pub const LIST_PATH: &str = "/dishes";

/// The dish form plus the choices its select inputs offer.
#[derive(Debug, Serialize)]
pub struct DishFormPage {
    pub form: DishForm,
    pub dish_types: Vec<DishType>,
    pub cooks: Vec<Cook>,
}

fn form_page(store: &dyn KitchenStore, form: DishForm) -> Result<DishFormPage, StoreError> {
    Ok(DishFormPage {
        form,
        dish_types: store.list_dish_types(None)?,
        cooks: store.list_cooks(None)?,
    })
}

/// Flips the cook's assignment to the dish and reports whether the cook is
/// assigned afterwards. Running it twice restores the original state.
pub fn toggle_assignment(
    store: &dyn KitchenStore,
    dish_id: i32,
    cook_id: i32,
) -> Result<bool, StoreError> {
    if store.is_assigned(dish_id, cook_id)? {
        store.unassign_cook(dish_id, cook_id)?;
        Ok(false)
    } else {
        store.assign_cook(dish_id, cook_id)?;
        Ok(true)
    }
}

fn detail_path(id: i32) -> String {
    format!("{LIST_PATH}/{id}")
}

#[get("/dishes")]
pub async fn list(
    _cook: CurrentCook,
    store: Store,
    search: web::Query<DishSearch>,
) -> ApiResult<web::Json<ListPage<DishSearch, DishWithType>>> {
    let search = search.into_inner();
    let predicate = search.predicate();
    let store = store.into_inner();
    let items = web::block(move || store.list_dishes(predicate.as_ref())).await??;
    Ok(web::Json(ListPage {
        search: search.cleaned(),
        items,
    }))
}

#[get("/dishes/create")]
pub async fn create_form(_cook: CurrentCook, store: Store) -> ApiResult<web::Json<DishFormPage>> {
    let store = store.into_inner();
    let page = web::block(move || form_page(store.as_ref(), DishForm::default())).await??;
    Ok(web::Json(page))
}

#[post("/dishes/create")]
pub async fn create(
    _cook: CurrentCook,
    store: Store,
    payload: web::Json<DishForm>,
) -> ApiResult<HttpResponse> {
    let changes = payload.validate()?;
    let store = store.into_inner();
    let created = web::block(move || store.create_dish(&changes))
        .await?
        .map_err(save_error)?;
    log::info!("dish {} created as {:?}", created.id, created.name);
    Ok(redirect(LIST_PATH))
}

#[get("/dishes/{id}")]
pub async fn detail(
    _cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
) -> ApiResult<web::Json<DishDetail>> {
    let id = path.into_inner();
    let store = store.into_inner();
    let record = web::block(move || store.get_dish(id)).await??;
    Ok(web::Json(record))
}

#[get("/dishes/{id}/update")]
pub async fn update_form(
    _cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
) -> ApiResult<web::Json<DishFormPage>> {
    let id = path.into_inner();
    let store = store.into_inner();
    let page = web::block(move || {
        let record = store.get_dish(id)?;
        form_page(store.as_ref(), DishForm::from(&record))
    })
    .await??;
    Ok(web::Json(page))
}

#[post("/dishes/{id}/update")]
pub async fn update(
    _cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
    payload: web::Json<DishForm>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let store = store.into_inner();
    let lookup = store.clone();
    web::block(move || lookup.get_dish(id)).await??;

    let changes = payload.validate()?;
    let updated = web::block(move || store.update_dish(id, &changes))
        .await?
        .map_err(save_error)?;
    log::info!("dish {} updated", updated.id);
    Ok(redirect(LIST_PATH))
}

#[get("/dishes/{id}/delete")]
pub async fn delete_confirm(
    _cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
) -> ApiResult<web::Json<DishDetail>> {
    let id = path.into_inner();
    let store = store.into_inner();
    let record = web::block(move || store.get_dish(id)).await??;
    Ok(web::Json(record))
}

#[post("/dishes/{id}/delete")]
pub async fn delete(
    _cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let store = store.into_inner();
    web::block(move || store.delete_dish(id)).await??;
    log::info!("dish {id} deleted");
    Ok(redirect(LIST_PATH))
}

/// Acts on the requesting cook only.
#[post("/dishes/{id}/toggle-assign")]
pub async fn toggle_assign(
    req: HttpRequest,
    cook: CurrentCook,
    store: Store,
    path: web::Path<i32>,
) -> ApiResult<HttpResponse> {
    let dish_id = path.into_inner();
    let cook_id = cook.id();
    let store = store.into_inner();
    match web::block(move || toggle_assignment(store.as_ref(), dish_id, cook_id)).await? {
        Ok(assigned) => {
            log::info!("cook {cook_id} assigned={assigned} to dish {dish_id}");
            Ok(redirect(&detail_path(dish_id)))
        }
        // The session outlived its cook.
        Err(StoreError::NotFound { entity: "cook", .. }) => Ok(login_redirect(&req)),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::{NewDish, NewDishType};
    use crate::test_utils::{location, logged_in, seed_cook, test_app, TEST_USERNAME};
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn main_course(store: &MemoryStore) -> DishType {
        store
            .create_dish_type(&NewDishType {
                name: "Main course".to_string(),
            })
            .expect("dish type")
    }

    fn carbonara(store: &MemoryStore, dish_type_id: i32, cook_ids: Vec<i32>) -> i32 {
        store
            .create_dish(&crate::models::DishChanges {
                dish: NewDish {
                    name: "Spaghetti Carbonara".to_string(),
                    description: "Pasta with bacon and eggs".to_string(),
                    price: "9.99".parse().expect("price"),
                    dish_type_id,
                },
                cook_ids,
            })
            .expect("dish")
            .id
    }

    fn current_cook_id(store: &MemoryStore) -> i32 {
        store
            .find_credentials(TEST_USERNAME)
            .expect("lookup")
            .expect("test cook")
            .id
    }

    #[test]
    fn toggling_twice_restores_the_original_state() {
        let store = MemoryStore::new();
        let dish_type = main_course(&store);
        let dish_id = carbonara(&store, dish_type.id, vec![]);
        let cook = seed_cook(&store, "john", "user12345");

        assert!(!store.is_assigned(dish_id, cook.id).expect("check"));
        assert!(toggle_assignment(&store, dish_id, cook.id).expect("toggle"));
        assert!(store.is_assigned(dish_id, cook.id).expect("check"));
        assert!(!toggle_assignment(&store, dish_id, cook.id).expect("toggle"));
        assert!(!store.is_assigned(dish_id, cook.id).expect("check"));
    }

    #[test]
    fn toggling_leaves_other_cooks_alone() {
        let store = MemoryStore::new();
        let dish_type = main_course(&store);
        let john = seed_cook(&store, "john", "user12345");
        let jane = seed_cook(&store, "jane", "user12345");
        let dish_id = carbonara(&store, dish_type.id, vec![jane.id]);

        toggle_assignment(&store, dish_id, john.id).expect("toggle");

        assert!(store.is_assigned(dish_id, jane.id).expect("check"));
        assert!(store.is_assigned(dish_id, john.id).expect("check"));
    }

    #[actix_web::test]
    async fn toggle_assign_redirects_back_to_the_dish() {
        let store = Arc::new(MemoryStore::new());
        let dish_type = main_course(&store);
        let dish_id = carbonara(&store, dish_type.id, vec![]);
        let app = actix_test::init_service(test_app(store.clone())).await;
        let cookie = logged_in(&app, &store).await;
        let cook_id = current_cook_id(&store);

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri(&format!("/dishes/{dish_id}/toggle-assign"))
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), format!("/dishes/{dish_id}"));
        assert!(store.is_assigned(dish_id, cook_id).expect("check"));

        actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri(&format!("/dishes/{dish_id}/toggle-assign"))
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert!(!store.is_assigned(dish_id, cook_id).expect("check"));
    }

    #[actix_web::test]
    async fn toggle_assign_on_unknown_dish_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let app = actix_test::init_service(test_app(store.clone())).await;
        let cookie = logged_in(&app, &store).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/dishes/999/toggle-assign")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn toggle_assign_without_login_redirects() {
        let store = Arc::new(MemoryStore::new());
        let app = actix_test::init_service(test_app(store.clone())).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/dishes/1/toggle-assign")
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(location(&response).starts_with("/accounts/login?next="));
    }

    #[actix_web::test]
    async fn toggle_assign_for_a_deleted_cook_asks_to_log_in_again() {
        let store = Arc::new(MemoryStore::new());
        let dish_type = main_course(&store);
        let dish_id = carbonara(&store, dish_type.id, vec![]);
        let app = actix_test::init_service(test_app(store.clone())).await;
        let cookie = logged_in(&app, &store).await;
        store.delete_cook(current_cook_id(&store)).expect("delete");

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri(&format!("/dishes/{dish_id}/toggle-assign"))
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(location(&response).starts_with("/accounts/login?next="));
    }

    #[actix_web::test]
    async fn create_with_unknown_dish_type_is_a_field_error() {
        let store = Arc::new(MemoryStore::new());
        let app = actix_test::init_service(test_app(store.clone())).await;
        let cookie = logged_in(&app, &store).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/dishes/create")
                .cookie(cookie)
                .set_json(json!({
                    "name": "Spaghetti Carbonara",
                    "description": "Pasta with bacon and eggs",
                    "price": "9.99",
                    "dish_type": 12345,
                }))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(
            body["details"]["fields"]["dish_type"],
            json!(["Select a valid choice. That choice is not one of the available choices."])
        );
        assert_eq!(store.counts().expect("counts").num_dishes, 0);
    }

    #[actix_web::test]
    async fn update_replaces_fields_and_cooks() {
        let store = Arc::new(MemoryStore::new());
        let dish_type = main_course(&store);
        let jane = seed_cook(&store, "jane", "user12345");
        let dish_id = carbonara(&store, dish_type.id, vec![jane.id]);
        let app = actix_test::init_service(test_app(store.clone())).await;
        let cookie = logged_in(&app, &store).await;
        let cook_id = current_cook_id(&store);

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri(&format!("/dishes/{dish_id}/update"))
                .cookie(cookie)
                .set_json(json!({
                    "name": "Carbonara",
                    "description": "Guanciale, pecorino, egg",
                    "price": "12.50",
                    "dish_type": dish_type.id,
                    "cooks": [cook_id],
                }))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), LIST_PATH);

        let record = store.get_dish(dish_id).expect("detail");
        assert_eq!(record.dish.name, "Carbonara");
        assert_eq!(record.dish.price.to_string(), "12.50");
        let cooks: Vec<i32> = record.cooks.iter().map(|cook| cook.id).collect();
        assert_eq!(cooks, vec![cook_id]);
    }

    #[actix_web::test]
    async fn list_searches_by_dish_name() {
        let store = Arc::new(MemoryStore::new());
        let dish_type = main_course(&store);
        carbonara(&store, dish_type.id, vec![]);
        let app = actix_test::init_service(test_app(store.clone())).await;
        let cookie = logged_in(&app, &store).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/dishes?name=SPAG")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["items"][0]["dish_type"]["name"], "Main course");
        assert_eq!(body["items"][0]["price"], "9.99");

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/dishes?name=carbonara")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["items"], json!([]));
    }

    #[actix_web::test]
    async fn create_form_offers_dish_types_and_cooks() {
        let store = Arc::new(MemoryStore::new());
        main_course(&store);
        let app = actix_test::init_service(test_app(store.clone())).await;
        let cookie = logged_in(&app, &store).await;

        let response = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/dishes/create")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["dish_types"][0]["name"], "Main course");
        assert_eq!(body["cooks"][0]["username"], TEST_USERNAME);
    }
}
