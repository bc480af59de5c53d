//! Guarded with `#[cfg(test)]` from `lib.rs`

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use serde_json::{json, Value};

use infra::ids::IdGen;

use crate::menu::{DrinkRepository, Ingredient, Projection};


use self::junk_drawer::{bearer, TokenSpec, ALL_PERMISSIONS};

const LATTE: &str = r#"{"title":"Latte","recipe":[{"name":"Milk","color":"white","parts":3}]}"#;

fn milk() -> Vec<Ingredient> {
    vec![Ingredient::new("Milk", "white", 3)]
}

#[actix_web::test]
async fn anyone_may_list_the_menu() {
    let (rb, mut docs) = junk_drawer::rustbucks(Projection::Short);
    docs.insert(&IdGen::new(), "Latte", milk()).expect("insert");
    let app = init_app!(rb);

    let resp = test::call_service(&app, TestRequest::get().uri("/drinks").to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["status_code"], json!(200));
    assert_eq!(body["drinks"][0]["title"], json!("Latte"));
    assert_eq!(
        body["drinks"][0]["recipe"],
        json!([{"name": "Milk", "color": "white"}])
    );
}

#[actix_web::test]
async fn protected_routes_need_a_token() {
    let (rb, _) = junk_drawer::rustbucks(Projection::Short);
    let app = init_app!(rb);
    let id = IdGen::new().generate::<crate::menu::Drink>().to_string();

    let requests = vec![
        TestRequest::get().uri("/drinks-detail"),
        TestRequest::post().uri("/drinks").set_payload(LATTE),
        TestRequest::patch()
            .uri(&format!("/drinks/{}", id))
            .set_payload(r#"{"title":"x"}"#),
        TestRequest::delete().uri(&format!("/drinks/{}", id)),
    ];

    for req in requests {
        let resp = test::call_service(&app, req.to_request()).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body,
            json!({
                "success": false,
                "error": 401,
                "message": "Authorization header is expected.",
                "code": "authorization_header_missing",
            })
        );
    }
}

#[actix_web::test]
async fn non_bearer_header_is_rejected() {
    let (rb, _) = junk_drawer::rustbucks(Projection::Short);
    let app = init_app!(rb);

    let req = TestRequest::get()
        .uri("/drinks-detail")
        .insert_header(("Authorization", "Token abc.def.ghi"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], json!("invalid_header"));
}

#[actix_web::test]
async fn expired_token_is_rejected_whatever_it_grants() {
    let (rb, docs) = junk_drawer::rustbucks(Projection::Short);
    let app = init_app!(rb);
    let token = TokenSpec::permitted(&ALL_PERMISSIONS)
        .expires_in(-120)
        .mint();

    let req = TestRequest::post()
        .uri("/drinks")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_payload(LATTE)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], json!("token_expired"));
    assert!(docs.clone().list_all().expect("list").is_empty());
}

#[actix_web::test]
async fn token_for_another_audience_is_rejected() {
    let (rb, _) = junk_drawer::rustbucks(Projection::Short);
    let app = init_app!(rb);
    let token = TokenSpec {
        audience: "some-other-api".to_string(),
        ..TokenSpec::permitted(&ALL_PERMISSIONS)
    }
    .mint();

    let req = TestRequest::get()
        .uri("/drinks-detail")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], json!("invalid_claims"));
}

#[actix_web::test]
async fn token_without_permissions_claim_is_invalid() {
    let (rb, _) = junk_drawer::rustbucks(Projection::Short);
    let app = init_app!(rb);
    let token = TokenSpec::default().mint();

    let req = TestRequest::get()
        .uri("/drinks-detail")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], json!("invalid_claims"));
    assert_eq!(body["message"], json!("Permissions not included in JWT."));
}

#[actix_web::test]
async fn missing_permission_is_forbidden() {
    let (rb, docs) = junk_drawer::rustbucks(Projection::Short);
    let app = init_app!(rb);

    let req = TestRequest::post()
        .uri("/drinks")
        .insert_header(bearer(&["get:drinks-detail"]))
        .set_payload(LATTE)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        resp.headers()
            .get("Access-Control-Allow-Origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": 403,
            "message": "Permission not found.",
            "code": "unauthorized",
        })
    );
    assert!(docs.clone().list_all().expect("list").is_empty());
}

#[actix_web::test]
async fn created_latte_appears_on_the_menu() {
    let (rb, _) = junk_drawer::rustbucks(Projection::Short);
    let app = init_app!(rb);

    let req = TestRequest::post()
        .uri("/drinks")
        .insert_header(bearer(&["post:drinks"]))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(LATTE)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"success": true, "drinks": "Latte", "status_code": 200})
    );

    let req = TestRequest::get().uri("/drinks").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let drinks = body["drinks"].as_array().expect("drinks");
    assert_eq!(drinks.len(), 1);
    assert_eq!(drinks[0]["title"], json!("Latte"));
    assert_eq!(
        drinks[0]["recipe"],
        json!([{"name": "Milk", "color": "white"}])
    );
}

#[actix_web::test]
async fn create_accepts_a_single_ingredient() {
    let (rb, docs) = junk_drawer::rustbucks(Projection::Short);
    let app = init_app!(rb);

    let req = TestRequest::post()
        .uri("/drinks")
        .insert_header(bearer(&["post:drinks"]))
        .set_payload(r#"{"title":"Tea","recipe":{"name":"Tea","color":"amber","parts":1}}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let drinks = docs.clone().list_all().expect("list");
    assert_eq!(drinks[0].recipe(), &[Ingredient::new("Tea", "amber", 1)][..]);
}

#[actix_web::test]
async fn create_without_recipe_has_empty_recipe() {
    let (rb, docs) = junk_drawer::rustbucks(Projection::Short);
    let app = init_app!(rb);

    let req = TestRequest::post()
        .uri("/drinks")
        .insert_header(bearer(&["post:drinks"]))
        .set_payload(r#"{"title":"Air"}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let drinks = docs.clone().list_all().expect("list");
    assert_eq!(drinks.len(), 1);
    assert_eq!(drinks[0].title(), "Air");
    assert!(drinks[0].recipe().is_empty());
}

#[actix_web::test]
async fn create_with_only_a_recipe_makes_an_untitled_drink() {
    let (rb, docs) = junk_drawer::rustbucks(Projection::Short);
    let app = init_app!(rb);

    let req = TestRequest::post()
        .uri("/drinks")
        .insert_header(bearer(&["post:drinks"]))
        .set_payload(r#"{"recipe":[{"name":"Milk","color":"white","parts":3}]}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"success": true, "drinks": "", "status_code": 200})
    );

    let drinks = docs.clone().list_all().expect("list");
    assert_eq!(drinks.len(), 1);
    assert_eq!(drinks[0].title(), "");
    assert_eq!(drinks[0].recipe(), &milk()[..]);
}

#[actix_web::test]
async fn bad_create_bodies_are_not_found() {
    let (rb, docs) = junk_drawer::rustbucks(Projection::Short);
    let app = init_app!(rb);

    let bodies = vec![
        "this is not json",
        "{}",
        r#"{"title":null,"recipe":null}"#,
        r#"{"title":["Latte"]}"#,
    ];

    for payload in bodies {
        let req = TestRequest::post()
            .uri("/drinks")
            .insert_header(bearer(&["post:drinks"]))
            .set_payload(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "body: {}", payload);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body,
            json!({"success": false, "error": 404, "message": "resource not found"})
        );
    }
    assert!(docs.clone().list_all().expect("list").is_empty());
}

#[actix_web::test]
async fn detail_can_show_parts_the_short_list_hides() {
    let (rb, _) = junk_drawer::rustbucks(Projection::Long);
    let app = init_app!(rb);

    let req = TestRequest::post()
        .uri("/drinks")
        .insert_header(bearer(&["post:drinks"]))
        .set_payload(r#"{"title":"Water","recipe":[{"name":"Water","color":"blue","parts":1}]}"#)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = TestRequest::get()
        .uri("/drinks-detail")
        .insert_header(bearer(&["get:drinks-detail"]))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(detail["drinks"][0]["title"], json!("Water"));
    assert_eq!(
        detail["drinks"][0]["recipe"],
        json!([{"name": "Water", "color": "blue", "parts": 1}])
    );

    let req = TestRequest::get().uri("/drinks").to_request();
    let short: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(short["drinks"][0]["title"], json!("Water"));
    assert_eq!(
        short["drinks"][0]["recipe"],
        json!([{"name": "Water", "color": "blue"}])
    );
}

#[actix_web::test]
async fn detail_is_short_by_default() {
    let (rb, mut docs) = junk_drawer::rustbucks(Projection::default());
    docs.insert(&IdGen::new(), "Latte", milk()).expect("insert");
    let app = init_app!(rb);

    let req = TestRequest::get()
        .uri("/drinks-detail")
        .insert_header(bearer(&["get:drinks-detail"]))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], json!(true));
    assert_eq!(
        body["drinks"][0]["recipe"],
        json!([{"name": "Milk", "color": "white"}])
    );
}

#[actix_web::test]
async fn updating_the_title_keeps_the_recipe() {
    let (rb, mut docs) = junk_drawer::rustbucks(Projection::Short);
    let latte = docs.insert(&IdGen::new(), "Latte", milk()).expect("insert");
    let app = init_app!(rb);

    let req = TestRequest::patch()
        .uri(&format!("/drinks/{}", latte.id()))
        .insert_header(bearer(&["patch:drinks"]))
        .set_payload(r#"{"title":"Iced Latte"}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"success": true, "update": latte.id().to_string(), "status_code": 200})
    );
    let stored = docs.find_by_id(&latte.id()).expect("find").expect("present");
    assert_eq!(stored.title(), "Iced Latte");
    assert_eq!(stored.recipe(), latte.recipe());
}

#[actix_web::test]
async fn updating_the_recipe_keeps_the_title() {
    let (rb, mut docs) = junk_drawer::rustbucks(Projection::Short);
    let latte = docs.insert(&IdGen::new(), "Latte", milk()).expect("insert");
    let app = init_app!(rb);

    let req = TestRequest::patch()
        .uri(&format!("/drinks/{}", latte.id()))
        .insert_header(bearer(&["patch:drinks"]))
        .set_payload(r#"{"recipe":[{"name":"Oat milk","color":"beige","parts":3}]}"#)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let stored = docs.find_by_id(&latte.id()).expect("find").expect("present");
    assert_eq!(stored.title(), "Latte");
    assert_eq!(stored.recipe(), &[Ingredient::new("Oat milk", "beige", 3)][..]);
}

#[actix_web::test]
async fn updating_unknown_drinks_is_not_found() {
    let (rb, mut docs) = junk_drawer::rustbucks(Projection::Short);
    let latte = docs.insert(&IdGen::new(), "Latte", milk()).expect("insert");
    let app = init_app!(rb);
    let unknown = IdGen::new().generate::<crate::menu::Drink>().to_string();
    let latte_uri = format!("/drinks/{}", latte.id());

    let cases = vec![
        (format!("/drinks/{}", unknown), r#"{"title":"x"}"#),
        ("/drinks/1".to_string(), r#"{"title":"x"}"#),
        (latte_uri, "{not json"),
    ];

    for (uri, payload) in cases {
        let req = TestRequest::patch()
            .uri(&uri)
            .insert_header(bearer(&["patch:drinks"]))
            .set_payload(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{} {}", uri, payload);
    }
    let stored = docs.find_by_id(&latte.id()).expect("find").expect("present");
    assert_eq!(stored, latte);
}

#[actix_web::test]
async fn deleting_twice_is_not_found_the_second_time() {
    let (rb, mut docs) = junk_drawer::rustbucks(Projection::Short);
    let latte = docs.insert(&IdGen::new(), "Latte", milk()).expect("insert");
    let app = init_app!(rb);
    let uri = format!("/drinks/{}", latte.id());

    let req = TestRequest::delete()
        .uri(&uri)
        .insert_header(bearer(&["delete:drinks"]))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        body,
        json!({"success": true, "delete": latte.id().to_string(), "status_code": 200})
    );
    assert_eq!(docs.find_by_id(&latte.id()).expect("find"), None);

    for _ in 0..2 {
        let req = TestRequest::delete()
            .uri(&uri)
            .insert_header(bearer(&["delete:drinks"]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}

#[actix_web::test]
async fn deleting_nonexistent_drinks_is_always_not_found() {
    let (rb, _) = junk_drawer::rustbucks(Projection::Short);
    let app = init_app!(rb);
    let unknown = IdGen::new().generate::<crate::menu::Drink>().to_string();

    for uri in &[format!("/drinks/{}", unknown), "/drinks/42".to_string()] {
        for _ in 0..2 {
            let req = TestRequest::delete()
                .uri(uri)
                .insert_header(bearer(&["delete:drinks"]))
                .to_request();
            let resp = test::call_service(&app, req).await;

            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["message"], json!("resource not found"));
        }
    }
}

#[actix_web::test]
async fn unknown_routes_get_a_json_not_found() {
    let (rb, _) = junk_drawer::rustbucks(Projection::Short);
    let app = init_app!(rb);

    let resp = test::call_service(&app, TestRequest::get().uri("/coffee").to_request()).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(resp.headers().contains_key("Access-Control-Allow-Origin"));
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"success": false, "error": 404, "message": "resource not found"})
    );
}

#[actix_web::test]
async fn preflight_requests_are_answered() {
    let (rb, _) = junk_drawer::rustbucks(Projection::Short);
    let app = init_app!(rb);

    let req = TestRequest::default()
        .method(actix_web::http::Method::OPTIONS)
        .uri("/drinks")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get("Access-Control-Allow-Methods")
            .and_then(|v| v.to_str().ok()),
        Some("GET, POST, PATCH, DELETE, OPTIONS")
    );
}
