// Copyright 2023 Remi Bernotavicius

use super::auth::CurrentUser;
use super::AppState;
use crate::database::models::{
    BondKind, Ingredient, IngredientId, RecipeHandle, RecipeId, Tag, TagId, User,
};
use crate::error::{Error, Result};
use crate::recipes::{self, RecipeDetail, RecipeFilter, RecipePayload};
use crate::{bonds, catalog, shopping_list};
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

/// A body with nothing in it is read as an empty object, so every missing field gets reported.
fn parse_payload(body: &Bytes) -> Result<RecipePayload> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RecipePayload::default());
    }
    serde_json::from_slice(body).map_err(|e| Error::MalformedPayload(e.to_string()))
}

pub async fn list_recipes(
    State(state): State<AppState>,
    viewer: Option<CurrentUser>,
    filter: std::result::Result<Query<RecipeFilter>, QueryRejection>,
) -> Result<Json<Vec<RecipeDetail>>> {
    let Query(filter) = filter.map_err(|e| Error::MalformedPayload(e.body_text()))?;
    let recipes = state
        .run(move |conn| {
            let viewer = viewer.map(|CurrentUser(user)| user);
            recipes::list_recipes(conn, viewer.as_ref(), &filter)
        })
        .await?;
    Ok(Json(recipes))
}

pub async fn get_recipe(
    State(state): State<AppState>,
    viewer: Option<CurrentUser>,
    Path(id): Path<RecipeId>,
) -> Result<Json<RecipeDetail>> {
    let recipe = state
        .run(move |conn| {
            let viewer = viewer.map(|CurrentUser(user)| user);
            recipes::get_recipe(conn, viewer.as_ref(), id)
        })
        .await?;
    Ok(Json(recipe))
}

pub async fn create_recipe(
    State(state): State<AppState>,
    CurrentUser(author): CurrentUser,
    body: Bytes,
) -> Result<(StatusCode, Json<RecipeDetail>)> {
    let payload = parse_payload(&body)?;
    let recipe = state
        .run(move |conn| recipes::create_recipe(conn, &author, &payload))
        .await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

pub async fn update_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecipeId>,
    body: Bytes,
) -> Result<Json<RecipeDetail>> {
    let payload = parse_payload(&body)?;
    let recipe = state
        .run(move |conn| recipes::update_recipe(conn, &user, id, &payload))
        .await?;
    Ok(Json(recipe))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecipeId>,
) -> Result<StatusCode> {
    state
        .run(move |conn| recipes::delete_recipe(conn, &user, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_bond(
    state: AppState,
    kind: BondKind,
    user: User,
    id: RecipeId,
) -> Result<(StatusCode, Json<RecipeHandle>)> {
    let handle = state
        .run(move |conn| bonds::create_bond(conn, kind, &user, id))
        .await?;
    Ok((StatusCode::CREATED, Json(handle)))
}

async fn remove_bond(
    state: AppState,
    kind: BondKind,
    user: User,
    id: RecipeId,
) -> Result<StatusCode> {
    state
        .run(move |conn| bonds::delete_bond(conn, kind, &user, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecipeId>,
) -> Result<(StatusCode, Json<RecipeHandle>)> {
    add_bond(state, BondKind::Favorite, user, id).await
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecipeId>,
) -> Result<StatusCode> {
    remove_bond(state, BondKind::Favorite, user, id).await
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecipeId>,
) -> Result<(StatusCode, Json<RecipeHandle>)> {
    add_bond(state, BondKind::Cart, user, id).await
}

pub async fn remove_from_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecipeId>,
) -> Result<StatusCode> {
    remove_bond(state, BondKind::Cart, user, id).await
}

pub async fn download_shopping_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse> {
    let list = state
        .run(move |conn| shopping_list::build_shopping_list(conn, &user))
        .await?;
    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                CONTENT_DISPOSITION,
                "attachment; filename=\"shopping_list.txt\"",
            ),
        ],
        list.to_string(),
    ))
}

#[derive(Deserialize)]
pub struct IngredientSearch {
    name: Option<String>,
}

pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(search): Query<IngredientSearch>,
) -> Result<Json<Vec<Ingredient>>> {
    let prefix = search.name.unwrap_or_default();
    let ingredients = state
        .run(move |conn| catalog::search_ingredients_by_prefix(conn, &prefix))
        .await?;
    Ok(Json(ingredients))
}

pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<IngredientId>,
) -> Result<Json<Ingredient>> {
    let ingredient = state
        .run(move |conn| catalog::lookup_ingredient(conn, id))
        .await?;
    Ok(Json(ingredient))
}

pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>> {
    Ok(Json(state.run(catalog::list_tags).await?))
}

pub async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<TagId>,
) -> Result<Json<Tag>> {
    let tag = state.run(move |conn| catalog::lookup_tag(conn, id)).await?;
    Ok(Json(tag))
}
