// Copyright 2023 Remi Bernotavicius

//! The JSON-over-HTTP surface. Handlers only translate between HTTP and the recipe, catalog, bond
//! and shopping list operations; all of those run on the blocking pool against one shared
//! connection.

use crate::database;
use crate::error::Result;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;

mod auth;
mod error;
mod routes;

#[derive(Clone)]
pub struct AppState {
    conn: Arc<Mutex<database::Connection>>,
}

impl AppState {
    pub fn new(conn: database::Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `body` with exclusive use of the connection, off the async runtime.
    pub async fn run<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut database::Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            body(&mut conn)
        })
        .await?
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/recipes",
            get(routes::list_recipes).post(routes::create_recipe),
        )
        .route(
            "/api/recipes/download_shopping_cart",
            get(routes::download_shopping_cart),
        )
        .route(
            "/api/recipes/{id}",
            get(routes::get_recipe)
                .patch(routes::update_recipe)
                .delete(routes::delete_recipe),
        )
        .route(
            "/api/recipes/{id}/favorite",
            post(routes::add_favorite).delete(routes::remove_favorite),
        )
        .route(
            "/api/recipes/{id}/shopping_cart",
            post(routes::add_to_cart).delete(routes::remove_from_cart),
        )
        .route("/api/ingredients", get(routes::list_ingredients))
        .route("/api/ingredients/{id}", get(routes::get_ingredient))
        .route("/api/tags", get(routes::list_tags))
        .route("/api/tags/{id}", get(routes::get_tag))
        .with_state(state)
}

pub async fn serve(
    conn: database::Connection,
    address: &str,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));
    let app = router(AppState::new(conn)).layer(cors);

    let listener = TcpListener::bind(address).await?;
    log::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => log::info!("received Ctrl+C, shutting down"),
            Err(e) => {
                log::error!("failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                log::info!("received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("failed to install terminate handler: {e}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
use crate::catalog;
#[cfg(test)]
use crate::database::models::{Ingredient, Tag, User};
#[cfg(test)]
use crate::database::test_user;
#[cfg(test)]
use axum::body::Body;
#[cfg(test)]
use axum::http::{Request, StatusCode};
#[cfg(test)]
use serde_json::{json, Value};
#[cfg(test)]
use tower::ServiceExt as _;

#[cfg(test)]
struct Site {
    app: Router,
    alice: User,
    bob: User,
    ingredient: Ingredient,
    tag: Tag,
}

#[cfg(test)]
fn site() -> Site {
    let mut conn = database::test_connection();
    let alice = test_user(&mut conn, "alice");
    let bob = test_user(&mut conn, "bob");
    let ingredient = catalog::create_ingredient(&mut conn, "test_ingredient", "test").unwrap();
    let tag = catalog::create_tag(&mut conn, "lunch", "#00FF00", "lunch").unwrap();
    Site {
        app: router(AppState::new(conn)),
        alice,
        bob,
        ingredient,
        tag,
    }
}

#[cfg(test)]
impl Site {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&User>,
        body: Option<Value>,
    ) -> (StatusCode, String) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            request = request.header(AUTHORIZATION, format!("Token {}", user.auth_token));
        }
        let body = match body {
            Some(body) => {
                request = request.header(CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn recipe_body(&self, amount: i64) -> Value {
        json!({
            "ingredients": [{ "id": self.ingredient.id, "amount": amount }],
            "tags": [self.tag.id],
            "name": "test",
            "image": "recipes/test.png",
            "text": "test",
            "cooking_time": 10,
        })
    }

    async fn create(&self, amount: i64) -> i64 {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/recipes",
                Some(&self.alice),
                Some(self.recipe_body(amount)),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let created: Value = serde_json::from_str(&body).unwrap();
        created["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn cart_downloads_as_plain_text() {
    let site = site();
    let id = site.create(10).await;
    let cart = format!("/api/recipes/{id}/shopping_cart");

    let (status, body) = site.send(Method::POST, &cart, Some(&site.alice), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let handle: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(handle["name"], "test");
    assert_eq!(handle["cooking_time"], 10);

    let (status, body) = site
        .send(
            Method::GET,
            "/api/recipes/download_shopping_cart",
            Some(&site.alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "test_ingredient: 10 test\n");

    let (status, body) = site
        .send(
            Method::GET,
            "/api/recipes/download_shopping_cart",
            Some(&site.bob),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "");
}

#[tokio::test]
async fn redundant_bond_changes_are_bad_requests() {
    let site = site();
    let id = site.create(1).await;

    for relation in ["favorite", "shopping_cart"] {
        let uri = format!("/api/recipes/{id}/{relation}");
        let (status, _) = site.send(Method::POST, &uri, Some(&site.alice), None).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = site.send(Method::POST, &uri, Some(&site.alice), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({ "errors": "recipe already added" })
        );

        let (status, _) = site.send(Method::DELETE, &uri, Some(&site.alice), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = site.send(Method::DELETE, &uri, Some(&site.alice), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({ "errors": "recipe already removed" })
        );
    }

    let (status, _) = site
        .send(Method::POST, "/api/recipes/999/favorite", Some(&site.alice), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_author_may_change_a_recipe() {
    let site = site();
    let id = site.create(1).await;
    let uri = format!("/api/recipes/{id}");

    let (status, _) = site
        .send(Method::PATCH, &uri, Some(&site.bob), Some(site.recipe_body(2)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = site.send(Method::DELETE, &uri, Some(&site.bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = site
        .send(Method::PATCH, &uri, Some(&site.alice), Some(site.recipe_body(2)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let updated: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(updated["ingredients"][0]["amount"], 2);

    let (status, _) = site.send(Method::DELETE, &uri, Some(&site.alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = site.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_body_lists_every_missing_field() {
    let site = site();
    let (status, body) = site
        .send(Method::POST, "/api/recipes", Some(&site.alice), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors: Value = serde_json::from_str(&body).unwrap();
    let mut fields: Vec<_> = errors.as_object().unwrap().keys().cloned().collect();
    fields.sort();
    assert_eq!(fields, ["cooking_time", "image", "name", "text"]);
    assert_eq!(errors["name"], json!(["This field is required."]));

    let (status, _) = site
        .send(Method::POST, "/api/recipes", Some(&site.alice), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_amount_is_reported_under_ingredients() {
    let site = site();
    let (status, body) = site
        .send(
            Method::POST,
            "/api/recipes",
            Some(&site.alice),
            Some(site.recipe_body(0)),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors: Value = serde_json::from_str(&body).unwrap();
    assert!(errors["ingredients"].is_array(), "{body}");
}

#[tokio::test]
async fn anonymous_writes_are_unauthorized() {
    let site = site();
    let id = site.create(1).await;

    let (status, _) = site
        .send(Method::POST, "/api/recipes", None, Some(site.recipe_body(1)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    for uri in [
        format!("/api/recipes/{id}/favorite"),
        format!("/api/recipes/{id}/shopping_cart"),
    ] {
        let (status, _) = site.send(Method::POST, &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, _) = site
        .send(Method::GET, "/api/recipes/download_shopping_cart", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/recipes")
        .header(AUTHORIZATION, "Token not-a-token")
        .body(Body::empty())
        .unwrap();
    let response = site.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn anonymous_reads_see_no_relations() {
    let site = site();
    let id = site.create(1).await;
    site.send(
        Method::POST,
        &format!("/api/recipes/{id}/favorite"),
        Some(&site.alice),
        None,
    )
    .await;

    let (status, body) = site
        .send(Method::GET, &format!("/api/recipes/{id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let recipe: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(recipe["is_favorited"], false);
    assert_eq!(recipe["author"]["username"], "alice");
    assert_eq!(recipe["tags"][0]["slug"], "lunch");

    let (_, body) = site
        .send(Method::GET, &format!("/api/recipes/{id}"), Some(&site.alice), None)
        .await;
    let recipe: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(recipe["is_favorited"], true);

    let (status, body) = site
        .send(Method::GET, "/api/recipes?is_favorited=1", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");

    let (status, _) = site
        .send(Method::GET, "/api/recipes?is_favorited=maybe", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn catalog_is_public() {
    let site = site();

    let (status, body) = site
        .send(Method::GET, "/api/ingredients?name=test", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!([{ "id": site.ingredient.id, "name": "test_ingredient", "measurement_unit": "test" }])
    );

    let (status, body) = site
        .send(Method::GET, "/api/ingredients?name=nothing", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");

    let (status, _) = site
        .send(Method::GET, "/api/ingredients/999", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = site
        .send(Method::GET, &format!("/api/tags/{}", site.tag.id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let tag: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(tag["color"], "#00FF00");

    let (status, body) = site.send(Method::GET, "/api/tags", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn amounts_may_be_sent_as_strings() {
    let site = site();
    let mut body = site.recipe_body(1);
    body["ingredients"][0]["amount"] = json!("10");

    let (status, created) = site
        .send(Method::POST, "/api/recipes", Some(&site.alice), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let created: Value = serde_json::from_str(&created).unwrap();
    assert_eq!(created["ingredients"][0]["amount"], 10);

    body["ingredients"][0]["amount"] = json!("ten");
    let (status, errors) = site
        .send(Method::POST, "/api/recipes", Some(&site.alice), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors: Value = serde_json::from_str(&errors).unwrap();
    assert!(errors["ingredients"].is_array(), "{errors}");
}
