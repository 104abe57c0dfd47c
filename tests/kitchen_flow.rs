use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{json, Value};

use kitchen::memory::MemoryStore;
use kitchen::models::NewCook;
use kitchen::store::KitchenStore;
use kitchen::test_utils::{cheap_hasher, location, login, test_app};

fn john(store: &MemoryStore) -> i32 {
    store
        .create_cook(&NewCook {
            username: "john".to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            password: cheap_hasher().hash("user12345").expect("hash"),
            years_of_experience: Some(4),
        })
        .expect("john")
        .id
}

#[actix_web::test]
async fn cook_builds_the_menu_and_takes_a_dish() {
    let store = Arc::new(MemoryStore::new());
    let john_id = john(&store);
    let app = test::init_service(test_app(store.clone())).await;
    let cookie = login(&app, "john", "user12345").await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/dish-types/create")
            .cookie(cookie.clone())
            .set_json(json!({ "name": "Main course" }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let dish_type_id = store.list_dish_types(None).expect("dish types")[0].id;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/dishes/create")
            .cookie(cookie.clone())
            .set_json(json!({
                "name": "Spaghetti Carbonara",
                "description": "Pasta with guanciale, egg and pecorino",
                "price": "9.99",
                "dish_type": dish_type_id.to_string(),
            }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/dishes");
    let dish_id = store.list_dishes(None).expect("dishes")[0].dish.id;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/dishes/{dish_id}/toggle-assign"))
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("/dishes/{dish_id}"));

    let response = test::call_service(
        &app,
        test::TestRequest::get().uri("/").cookie(cookie.clone()).to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let counts: Value = test::read_body_json(response).await;
    assert_eq!(
        counts,
        json!({ "num_dish_types": 1, "num_dishes": 1, "num_cooks": 1 })
    );

    let response = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/dishes/{dish_id}"))
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let detail: Value = test::read_body_json(response).await;
    assert_eq!(detail["name"], "Spaghetti Carbonara");
    assert_eq!(detail["price"], "9.99");
    assert_eq!(detail["dish_type"]["name"], "Main course");
    assert_eq!(detail["cooks"][0]["username"], "john");
    assert_eq!(detail["cooks"][0]["last_name"], "Doe");

    let response = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/cooks/{john_id}"))
            .cookie(cookie)
            .to_request(),
    )
    .await;
    let cook: Value = test::read_body_json(response).await;
    assert_eq!(cook["dishes"][0]["name"], "Spaghetti Carbonara");
}

#[actix_web::test]
async fn deleting_a_dish_type_takes_its_dishes_along() {
    let store = Arc::new(MemoryStore::new());
    john(&store);
    let app = test::init_service(test_app(store.clone())).await;
    let cookie = login(&app, "john", "user12345").await;

    test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/dish-types/create")
            .cookie(cookie.clone())
            .set_json(json!({ "name": "Dessert" }))
            .to_request(),
    )
    .await;
    let dish_type_id = store.list_dish_types(None).expect("dish types")[0].id;
    test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/dishes/create")
            .cookie(cookie.clone())
            .set_json(json!({
                "name": "Tiramisu",
                "description": "Coffee and mascarpone",
                "price": 6.5,
                "dish_type": dish_type_id,
            }))
            .to_request(),
    )
    .await;
    assert_eq!(store.counts().expect("counts").num_dishes, 1);

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/dish-types/{dish_type_id}/delete"))
            .cookie(cookie)
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let counts = store.counts().expect("counts");
    assert_eq!(counts.num_dish_types, 0);
    assert_eq!(counts.num_dishes, 0);
}

#[actix_web::test]
async fn anonymous_visitors_are_sent_to_login() {
    let store = Arc::new(MemoryStore::new());
    let app = test::init_service(test_app(store)).await;

    for uri in ["/", "/dishes", "/cooks/1", "/dish-types/create"] {
        let response =
            test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(response.status(), StatusCode::FOUND, "{uri}");
        assert!(
            location(&response).starts_with("/accounts/login?next=%2F"),
            "{uri}"
        );
    }

    let response =
        test::call_service(&app, test::TestRequest::get().uri("/about").to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[actix_web::test]
async fn logout_ends_the_session() {
    let store = Arc::new(MemoryStore::new());
    john(&store);
    let app = test::init_service(test_app(store)).await;
    let cookie = login(&app, "john", "user12345").await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/accounts/logout")
            .cookie(cookie)
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/accounts/login");
    let cleared = response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == kitchen::auth::SESSION_COOKIE)
        .expect("session cookie cleared");
    assert!(cleared.value().is_empty());
}

#[actix_web::test]
async fn wrong_password_is_unauthorized() {
    let store = Arc::new(MemoryStore::new());
    john(&store);
    let app = test::init_service(test_app(store)).await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/accounts/login")
            .set_json(json!({ "username": "john", "password": "wrong-password" }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["code"], "unauthorized");
}

#[actix_web::test]
async fn a_cook_who_deletes_their_own_account_loses_access() {
    let store = Arc::new(MemoryStore::new());
    let john_id = john(&store);
    let app = test::init_service(test_app(store.clone())).await;
    let cookie = login(&app, "john", "user12345").await;

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/cooks/{john_id}/delete"))
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);

    for uri in ["/", "/cooks", "/dish-types"] {
        let response = test::call_service(
            &app,
            test::TestRequest::get().uri(uri).cookie(cookie.clone()).to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FOUND, "{uri}");
        assert!(location(&response).starts_with("/accounts/login?next="), "{uri}");
    }

    let response = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/dish-types/create")
            .cookie(cookie)
            .set_json(json!({ "name": "Soup" }))
            .to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("/accounts/login?next="));
    assert_eq!(store.counts().expect("counts").num_dish_types, 0);
}
