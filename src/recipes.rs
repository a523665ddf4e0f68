// Copyright 2023 Remi Bernotavicius

//! Creating, changing and reading recipes. All validation happens before the first write, and
//! every write a request makes is one transaction.

use crate::associations::{self, RecipeIngredient};
use crate::bonds;
use crate::database;
use crate::database::models::{
    BondKind, NewRecipe, Recipe, RecipeHandle, RecipeId, Tag, TagId, User, UserId, UserProfile,
};
use crate::error::{Error, Result};
use crate::validator::{self, IngredientEntry};
use diesel::prelude::Connection as _;
use diesel::prelude::OptionalExtension as _;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;
use serde::{Deserialize, Deserializer, Serialize};

const MAX_NAME_LENGTH: usize = 200;

/// A recipe as submitted by a client. Every field is optional here so that missing ones can be
/// reported by name instead of failing deserialization.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct RecipePayload {
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
    pub ingredients: Option<Vec<IngredientEntry>>,
    pub tags: Option<Vec<TagId>>,
}

/// The full projection of a recipe, as seen by `viewer`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RecipeDetail {
    pub id: RecipeId,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value.as_deref() {
        None => Ok(None),
        Some("1" | "true") => Ok(Some(true)),
        Some("0" | "false") => Ok(Some(false)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected 0, 1, true or false, found {other:?}"
        ))),
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct RecipeFilter {
    pub author: Option<UserId>,
    /// Comma separated tag slugs; a recipe matches if it carries any of them.
    pub tags: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_favorited: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_in_shopping_cart: Option<bool>,
}

impl RecipeFilter {
    fn tag_slugs(&self) -> Vec<String> {
        self.tags
            .iter()
            .flat_map(|t| t.split(','))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

struct RecipeFields<'a> {
    name: &'a str,
    image: &'a str,
    text: &'a str,
    cooking_time: i32,
}

fn check_text<'a>(
    field: &'static str,
    value: &'a str,
    max_length: Option<usize>,
) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(Error::InvalidField {
            field,
            message: "This field may not be blank.".into(),
        });
    }
    if let Some(max) = max_length {
        if value.chars().count() > max {
            return Err(Error::InvalidField {
                field,
                message: format!("Ensure this field has no more than {max} characters."),
            });
        }
    }
    Ok(value)
}

fn check_cooking_time(value: i64) -> Result<i32> {
    match i32::try_from(value) {
        Ok(minutes) if minutes >= 1 => Ok(minutes),
        _ => Err(Error::InvalidField {
            field: "cooking_time",
            message: "Ensure this value is greater than or equal to 1.".into(),
        }),
    }
}

/// All four scalar fields must be present; every absent one is reported together.
fn required_fields(payload: &RecipePayload) -> Result<RecipeFields<'_>> {
    let (Some(name), Some(image), Some(text), Some(cooking_time)) = (
        &payload.name,
        &payload.image,
        &payload.text,
        payload.cooking_time,
    ) else {
        let missing = [
            ("name", payload.name.is_none()),
            ("image", payload.image.is_none()),
            ("text", payload.text.is_none()),
            ("cooking_time", payload.cooking_time.is_none()),
        ]
        .into_iter()
        .filter_map(|(field, absent)| absent.then_some(field))
        .collect();
        return Err(Error::MissingFields(missing));
    };

    Ok(RecipeFields {
        name: check_text("name", name, Some(MAX_NAME_LENGTH))?,
        image: check_text("image", image, None)?,
        text: check_text("text", text, None)?,
        cooking_time: check_cooking_time(cooking_time)?,
    })
}

/// Scalar fields left out of an update keep their current value.
fn updated_fields<'a>(
    payload: &'a RecipePayload,
    recipe: &'a Recipe,
) -> Result<RecipeFields<'a>> {
    Ok(RecipeFields {
        name: match &payload.name {
            Some(name) => check_text("name", name, Some(MAX_NAME_LENGTH))?,
            None => recipe.name.as_str(),
        },
        image: match &payload.image {
            Some(image) => check_text("image", image, None)?,
            None => recipe.image.as_str(),
        },
        text: match &payload.text {
            Some(text) => check_text("text", text, None)?,
            None => recipe.text.as_str(),
        },
        cooking_time: match payload.cooking_time {
            Some(minutes) => check_cooking_time(minutes)?,
            None => recipe.cooking_time,
        },
    })
}

pub fn lookup_recipe(conn: &mut database::Connection, find_id: RecipeId) -> Result<Recipe> {
    use database::schema::recipes::dsl::*;

    recipes
        .select(Recipe::as_select())
        .filter(id.eq(find_id))
        .get_result(conn)
        .optional()?
        .ok_or_else(|| Error::not_found("recipe", find_id))
}

pub fn lookup_recipe_handle(
    conn: &mut database::Connection,
    find_id: RecipeId,
) -> Result<RecipeHandle> {
    use database::schema::recipes::dsl::*;

    recipes
        .select(RecipeHandle::as_select())
        .filter(id.eq(find_id))
        .get_result(conn)
        .optional()?
        .ok_or_else(|| Error::not_found("recipe", find_id))
}

fn lookup_owned_recipe(
    conn: &mut database::Connection,
    user: &User,
    find_id: RecipeId,
) -> Result<Recipe> {
    let recipe = lookup_recipe(conn, find_id)?;
    if recipe.author_id != user.id {
        log::warn!(
            "user {} tried to change recipe {} owned by someone else",
            user.username,
            recipe.id
        );
        return Err(Error::Forbidden);
    }
    Ok(recipe)
}

fn detail(
    conn: &mut database::Connection,
    viewer: Option<&User>,
    recipe: Recipe,
) -> Result<RecipeDetail> {
    use database::schema::users::dsl::*;

    let author: UserProfile = users
        .select(UserProfile::as_select())
        .filter(id.eq(recipe.author_id))
        .get_result(conn)?;
    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            bonds::is_bonded(conn, BondKind::Favorite, viewer, recipe.id)?,
            bonds::is_bonded(conn, BondKind::Cart, viewer, recipe.id)?,
        ),
        None => (false, false),
    };

    Ok(RecipeDetail {
        id: recipe.id,
        tags: associations::read_tags(conn, &recipe)?,
        author,
        ingredients: associations::read_associations(conn, &recipe)?,
        is_favorited,
        is_in_shopping_cart,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

pub fn create_recipe(
    conn: &mut database::Connection,
    author: &User,
    payload: &RecipePayload,
) -> Result<RecipeDetail> {
    use database::schema::recipes::dsl::*;
    use diesel::insert_into;

    let fields = required_fields(payload)?;
    let (ingredients, tags) = validator::validate(
        conn,
        payload.ingredients.as_deref(),
        payload.tags.as_deref(),
    )?;

    let recipe = conn.transaction(|conn| {
        let recipe = insert_into(recipes)
            .values(NewRecipe {
                author_id: author.id,
                name: fields.name,
                image: fields.image,
                text: fields.text,
                cooking_time: fields.cooking_time,
            })
            .returning(Recipe::as_returning())
            .get_result(conn)?;
        associations::replace_associations(conn, recipe.id, &ingredients)?;
        associations::replace_tags(conn, recipe.id, &tags)?;
        Result::Ok(recipe)
    })?;
    log::info!(
        "user {} created recipe {} with {} ingredients",
        author.username,
        recipe.id,
        ingredients.len()
    );

    detail(conn, Some(author), recipe)
}

pub fn update_recipe(
    conn: &mut database::Connection,
    user: &User,
    update_id: RecipeId,
    payload: &RecipePayload,
) -> Result<RecipeDetail> {
    use database::schema::recipes::dsl::*;
    use diesel::update;

    let recipe = lookup_owned_recipe(conn, user, update_id)?;
    let fields = updated_fields(payload, &recipe)?;
    let (ingredients, tags) = validator::validate(
        conn,
        payload.ingredients.as_deref(),
        payload.tags.as_deref(),
    )?;

    let updated = conn.transaction(|conn| {
        let updated = update(recipes.filter(id.eq(recipe.id)))
            .set((
                name.eq(fields.name),
                image.eq(fields.image),
                text.eq(fields.text),
                cooking_time.eq(fields.cooking_time),
            ))
            .returning(Recipe::as_returning())
            .get_result(conn)?;
        associations::replace_associations(conn, recipe.id, &ingredients)?;
        associations::replace_tags(conn, recipe.id, &tags)?;
        Result::Ok(updated)
    })?;
    log::info!("user {} updated recipe {}", user.username, updated.id);

    detail(conn, Some(user), updated)
}

pub fn delete_recipe(
    conn: &mut database::Connection,
    user: &User,
    delete_id: RecipeId,
) -> Result<()> {
    use database::schema::recipes::dsl::*;
    use diesel::delete;

    let recipe = lookup_owned_recipe(conn, user, delete_id)?;
    delete(recipes.filter(id.eq(recipe.id))).execute(conn)?;
    log::info!("user {} deleted recipe {}", user.username, recipe.id);
    Ok(())
}

pub fn get_recipe(
    conn: &mut database::Connection,
    viewer: Option<&User>,
    find_id: RecipeId,
) -> Result<RecipeDetail> {
    let recipe = lookup_recipe(conn, find_id)?;
    detail(conn, viewer, recipe)
}

/// Recipes newest first. The favorite and cart filters only mean something for a signed in
/// viewer; asking for them anonymously matches nothing.
pub fn list_recipes(
    conn: &mut database::Connection,
    viewer: Option<&User>,
    filter: &RecipeFilter,
) -> Result<Vec<RecipeDetail>> {
    use database::schema::{bonds, recipe_tags, recipes, tags};

    let mut query = recipes::table
        .select(Recipe::as_select())
        .order_by(recipes::id.desc())
        .into_boxed();

    if let Some(author) = filter.author {
        query = query.filter(recipes::author_id.eq(author));
    }

    let slugs = filter.tag_slugs();
    if !slugs.is_empty() {
        query = query.filter(
            recipes::id.eq_any(
                recipe_tags::table
                    .inner_join(tags::table)
                    .filter(tags::slug.eq_any(slugs))
                    .select(recipe_tags::recipe_id),
            ),
        );
    }

    for (wanted, bond_kind) in [
        (filter.is_favorited, BondKind::Favorite),
        (filter.is_in_shopping_cart, BondKind::Cart),
    ] {
        let (Some(wanted), Some(viewer)) = (wanted, viewer) else {
            if wanted == Some(true) {
                return Ok(vec![]);
            }
            continue;
        };
        let bonded = bonds::table
            .filter(bonds::user_id.eq(viewer.id))
            .filter(bonds::kind.eq(bond_kind))
            .select(bonds::recipe_id);
        query = if wanted {
            query.filter(recipes::id.eq_any(bonded))
        } else {
            query.filter(recipes::id.ne_all(bonded))
        };
    }

    query
        .load(conn)?
        .into_iter()
        .map(|recipe| detail(conn, viewer, recipe))
        .collect()
}

#[cfg(test)]
use crate::catalog;
#[cfg(test)]
use crate::database::models::Ingredient;
#[cfg(test)]
use crate::database::test_user;

#[cfg(test)]
struct Kitchen {
    conn: database::Connection,
    alice: User,
    bob: User,
    flour: Ingredient,
    eggs: Ingredient,
    dinner: Tag,
    sweet: Tag,
}

#[cfg(test)]
fn kitchen() -> Kitchen {
    let mut conn = database::test_connection();
    let alice = test_user(&mut conn, "alice");
    let bob = test_user(&mut conn, "bob");
    let flour = catalog::create_ingredient(&mut conn, "flour", "g").unwrap();
    let eggs = catalog::create_ingredient(&mut conn, "eggs", "pcs").unwrap();
    let dinner = catalog::create_tag(&mut conn, "dinner", "#000000", "dinner").unwrap();
    let sweet = catalog::create_tag(&mut conn, "sweet", "#FFFFFF", "sweet").unwrap();
    Kitchen {
        conn,
        alice,
        bob,
        flour,
        eggs,
        dinner,
        sweet,
    }
}

#[cfg(test)]
fn payload(ingredients: &[(&Ingredient, i64)], tags: &[&Tag]) -> RecipePayload {
    RecipePayload {
        name: Some("pancakes".into()),
        image: Some("recipes/pancakes.png".into()),
        text: Some("mix and fry".into()),
        cooking_time: Some(20),
        ingredients: Some(
            ingredients
                .iter()
                .map(|(i, amount)| IngredientEntry::new(i.id, *amount))
                .collect(),
        ),
        tags: Some(tags.iter().map(|t| t.id).collect()),
    }
}

#[cfg(test)]
fn recipe_count(conn: &mut database::Connection) -> i64 {
    use database::schema::recipes::dsl::recipes;
    recipes.count().get_result(conn).unwrap()
}

#[cfg(test)]
fn amount_count(conn: &mut database::Connection) -> i64 {
    use database::schema::ingredient_amounts::dsl::ingredient_amounts;
    ingredient_amounts.count().get_result(conn).unwrap()
}

#[test]
fn create_returns_full_projection() {
    let mut k = kitchen();
    let created = create_recipe(
        &mut k.conn,
        &k.alice,
        &payload(&[(&k.flour, 200), (&k.eggs, 2)], &[&k.sweet, &k.dinner]),
    )
    .unwrap();

    assert_eq!(created.name, "pancakes");
    assert_eq!(created.cooking_time, 20);
    assert_eq!(created.author.username, "alice");
    assert_eq!(created.tags, [k.dinner.clone(), k.sweet.clone()]);
    let ingredients: Vec<_> = created
        .ingredients
        .iter()
        .map(|i| (i.name.as_str(), i.measurement_unit.as_str(), i.amount))
        .collect();
    assert_eq!(ingredients, [("eggs", "pcs", 2), ("flour", "g", 200)]);
    assert!(!created.is_favorited);
    assert!(!created.is_in_shopping_cart);

    assert_eq!(
        get_recipe(&mut k.conn, None, created.id).unwrap(),
        created
    );
}

#[test]
fn empty_payload_lists_every_missing_scalar() {
    let mut k = kitchen();
    let error = create_recipe(&mut k.conn, &k.alice, &RecipePayload::default()).unwrap_err();
    assert!(matches!(
        error,
        Error::MissingFields(fields) if fields == ["name", "image", "text", "cooking_time"]
    ));
}

#[test]
fn invalid_scalars_rejected() {
    let mut k = kitchen();
    let mut bad = payload(&[(&k.flour, 1)], &[&k.dinner]);
    bad.cooking_time = Some(0);
    assert!(matches!(
        create_recipe(&mut k.conn, &k.alice, &bad),
        Err(Error::InvalidField {
            field: "cooking_time",
            ..
        })
    ));

    let mut bad = payload(&[(&k.flour, 1)], &[&k.dinner]);
    bad.name = Some("x".repeat(MAX_NAME_LENGTH + 1));
    assert!(matches!(
        create_recipe(&mut k.conn, &k.alice, &bad),
        Err(Error::InvalidField { field: "name", .. })
    ));

    let mut bad = payload(&[(&k.flour, 1)], &[&k.dinner]);
    bad.text = Some("  ".into());
    assert!(matches!(
        create_recipe(&mut k.conn, &k.alice, &bad),
        Err(Error::InvalidField { field: "text", .. })
    ));
    assert_eq!(recipe_count(&mut k.conn), 0);
}

#[test]
fn failed_validation_writes_nothing() {
    let mut k = kitchen();
    let duplicate = payload(&[(&k.flour, 1), (&k.flour, 2)], &[&k.dinner]);
    assert!(matches!(
        create_recipe(&mut k.conn, &k.alice, &duplicate),
        Err(Error::DuplicateIngredient { .. })
    ));
    let zero = payload(&[(&k.flour, 0)], &[&k.dinner]);
    assert!(matches!(
        create_recipe(&mut k.conn, &k.alice, &zero),
        Err(Error::InvalidAmount { .. })
    ));
    let mut no_tags = payload(&[(&k.flour, 1)], &[]);
    no_tags.tags = None;
    assert!(matches!(
        create_recipe(&mut k.conn, &k.alice, &no_tags),
        Err(Error::MissingFields(f)) if f == ["tags"]
    ));
    assert_eq!(recipe_count(&mut k.conn), 0);
    assert_eq!(amount_count(&mut k.conn), 0);
}

#[test]
fn deleted_ingredient_is_not_found() {
    let mut k = kitchen();
    let request = payload(&[(&k.flour, 1)], &[&k.dinner]);
    {
        use database::schema::ingredients::dsl::*;
        diesel::delete(ingredients.filter(id.eq(k.flour.id)))
            .execute(&mut k.conn)
            .unwrap();
    }
    assert!(matches!(
        create_recipe(&mut k.conn, &k.alice, &request),
        Err(Error::NotFound {
            entity: "ingredient",
            ..
        })
    ));
}

#[test]
fn author_replaces_ingredients_and_tags() {
    let mut k = kitchen();
    let created = create_recipe(
        &mut k.conn,
        &k.alice,
        &payload(&[(&k.flour, 200), (&k.eggs, 2)], &[&k.sweet]),
    )
    .unwrap();

    let update = RecipePayload {
        name: Some("crepes".into()),
        image: None,
        text: None,
        cooking_time: Some(10),
        ..payload(&[(&k.eggs, 3)], &[&k.dinner])
    };
    let updated = update_recipe(&mut k.conn, &k.alice, created.id, &update).unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.name, "crepes");
    assert_eq!(updated.cooking_time, 10);
    assert_eq!(updated.image, created.image);
    assert_eq!(updated.text, created.text);
    assert_eq!(updated.tags, [k.dinner.clone()]);
    let ingredients: Vec<_> = updated
        .ingredients
        .iter()
        .map(|i| (i.name.as_str(), i.amount))
        .collect();
    assert_eq!(ingredients, [("eggs", 3)]);
    assert_eq!(amount_count(&mut k.conn), 1);
}

#[test]
fn update_requires_lists() {
    let mut k = kitchen();
    let created = create_recipe(
        &mut k.conn,
        &k.alice,
        &payload(&[(&k.flour, 200)], &[&k.sweet]),
    )
    .unwrap();

    let update = RecipePayload {
        name: Some("bread".into()),
        ..RecipePayload::default()
    };
    assert!(matches!(
        update_recipe(&mut k.conn, &k.alice, created.id, &update),
        Err(Error::MissingFields(f)) if f == ["ingredients"]
    ));
    assert_eq!(get_recipe(&mut k.conn, None, created.id).unwrap(), created);
}

#[test]
fn only_the_author_may_change_a_recipe() {
    let mut k = kitchen();
    let request = payload(&[(&k.flour, 200)], &[&k.sweet]);
    let created = create_recipe(&mut k.conn, &k.alice, &request).unwrap();

    assert!(matches!(
        update_recipe(&mut k.conn, &k.bob, created.id, &request),
        Err(Error::Forbidden)
    ));
    assert!(matches!(
        delete_recipe(&mut k.conn, &k.bob, created.id),
        Err(Error::Forbidden)
    ));
    // ownership is checked before the payload
    assert!(matches!(
        update_recipe(&mut k.conn, &k.bob, created.id, &RecipePayload::default()),
        Err(Error::Forbidden)
    ));

    delete_recipe(&mut k.conn, &k.alice, created.id).unwrap();
    assert!(matches!(
        get_recipe(&mut k.conn, None, created.id),
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        delete_recipe(&mut k.conn, &k.alice, created.id),
        Err(Error::NotFound { .. })
    ));
    assert_eq!(amount_count(&mut k.conn), 0);
}

#[test]
fn viewer_flags_follow_bonds() {
    let mut k = kitchen();
    let created = create_recipe(
        &mut k.conn,
        &k.alice,
        &payload(&[(&k.flour, 1)], &[&k.sweet]),
    )
    .unwrap();
    bonds::create_bond(&mut k.conn, BondKind::Cart, &k.bob, created.id).unwrap();

    let seen_by_bob = get_recipe(&mut k.conn, Some(&k.bob), created.id).unwrap();
    assert!(!seen_by_bob.is_favorited);
    assert!(seen_by_bob.is_in_shopping_cart);

    let seen_by_alice = get_recipe(&mut k.conn, Some(&k.alice), created.id).unwrap();
    assert!(!seen_by_alice.is_in_shopping_cart);
}

#[test]
fn list_filters() {
    let mut k = kitchen();
    let sweet = create_recipe(
        &mut k.conn,
        &k.alice,
        &payload(&[(&k.flour, 1)], &[&k.sweet]),
    )
    .unwrap();
    let dinner = create_recipe(
        &mut k.conn,
        &k.bob,
        &payload(&[(&k.eggs, 1)], &[&k.dinner]),
    )
    .unwrap();
    bonds::create_bond(&mut k.conn, BondKind::Favorite, &k.alice, dinner.id).unwrap();

    let ids = |list: Vec<RecipeDetail>| list.into_iter().map(|r| r.id).collect::<Vec<_>>();

    let all = list_recipes(&mut k.conn, None, &RecipeFilter::default()).unwrap();
    assert_eq!(ids(all), [dinner.id, sweet.id]);

    let filter = RecipeFilter {
        author: Some(k.alice.id),
        ..RecipeFilter::default()
    };
    assert_eq!(ids(list_recipes(&mut k.conn, None, &filter).unwrap()), [sweet.id]);

    let filter = RecipeFilter {
        tags: Some("dinner,breakfast".into()),
        ..RecipeFilter::default()
    };
    assert_eq!(ids(list_recipes(&mut k.conn, None, &filter).unwrap()), [dinner.id]);

    let favorited = RecipeFilter {
        is_favorited: Some(true),
        ..RecipeFilter::default()
    };
    assert_eq!(
        ids(list_recipes(&mut k.conn, Some(&k.alice), &favorited).unwrap()),
        [dinner.id]
    );
    assert!(list_recipes(&mut k.conn, None, &favorited)
        .unwrap()
        .is_empty());

    let not_favorited = RecipeFilter {
        is_favorited: Some(false),
        ..RecipeFilter::default()
    };
    assert_eq!(
        ids(list_recipes(&mut k.conn, Some(&k.alice), &not_favorited).unwrap()),
        [sweet.id]
    );

    let in_cart = RecipeFilter {
        is_in_shopping_cart: Some(true),
        ..RecipeFilter::default()
    };
    assert!(list_recipes(&mut k.conn, Some(&k.alice), &in_cart)
        .unwrap()
        .is_empty());
}

#[test]
fn filter_flags_parse_numbers_and_words() {
    let filter: RecipeFilter =
        serde_json::from_str(r#"{"is_favorited": "1", "is_in_shopping_cart": "false"}"#)
            .unwrap();
    assert_eq!(filter.is_favorited, Some(true));
    assert_eq!(filter.is_in_shopping_cart, Some(false));
    assert!(serde_json::from_str::<RecipeFilter>(r#"{"is_favorited": "yes"}"#).is_err());
}
