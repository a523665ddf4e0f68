// Copyright 2023 Remi Bernotavicius

//! The ingredient and tag catalogs. Everything else treats [`lookup_ingredient`] and
//! [`lookup_tag`] as the authority on whether a referenced id exists.

use crate::database;
use crate::database::models::{Ingredient, IngredientId, NewIngredient, NewTag, Tag, TagId};
use crate::error::{is_unique_violation, Error, Result};
use diesel::prelude::OptionalExtension as _;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;

pub fn create_ingredient(
    conn: &mut database::Connection,
    new_name: &str,
    new_unit: &str,
) -> Result<Ingredient> {
    use database::schema::ingredients::dsl::*;
    use diesel::insert_into;

    insert_into(ingredients)
        .values(NewIngredient {
            name: new_name,
            measurement_unit: new_unit,
        })
        .returning(Ingredient::as_returning())
        .get_result(conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!("ingredient {new_name:?} ({new_unit})"))
            } else {
                e.into()
            }
        })
}

pub fn lookup_ingredient(
    conn: &mut database::Connection,
    ingredient_id: IngredientId,
) -> Result<Ingredient> {
    use database::schema::ingredients::dsl::*;

    ingredients
        .select(Ingredient::as_select())
        .filter(id.eq(ingredient_id))
        .get_result(conn)
        .optional()?
        .ok_or_else(|| Error::not_found("ingredient", ingredient_id))
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Ingredients whose name starts with `prefix`, ordered by name.
///
/// SQLite's `LIKE` ignores ASCII case, so it only narrows the candidates; the final match is
/// case-sensitive.
pub fn search_ingredients_by_prefix(
    conn: &mut database::Connection,
    prefix: &str,
) -> Result<Vec<Ingredient>> {
    use database::schema::ingredients::dsl::*;
    use diesel::expression_methods::EscapeExpressionMethods as _;
    use diesel::expression_methods::TextExpressionMethods as _;

    let candidates = ingredients
        .select(Ingredient::as_select())
        .filter(name.like(format!("{}%", escape_like(prefix))).escape('\\'))
        .order_by((name.asc(), id.asc()))
        .load(conn)?;
    Ok(candidates
        .into_iter()
        .filter(|i| i.name.starts_with(prefix))
        .collect())
}

pub fn create_tag(
    conn: &mut database::Connection,
    new_name: &str,
    new_color: &str,
    new_slug: &str,
) -> Result<Tag> {
    use database::schema::tags::dsl::*;
    use diesel::insert_into;

    let valid_color = new_color.len() == 7
        && new_color.starts_with('#')
        && new_color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid_color {
        return Err(Error::InvalidField {
            field: "color",
            message: format!("{new_color:?} is not a #RRGGBB color"),
        });
    }

    insert_into(tags)
        .values(NewTag {
            name: new_name,
            color: new_color,
            slug: new_slug,
        })
        .returning(Tag::as_returning())
        .get_result(conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!("tag {new_name:?}"))
            } else {
                e.into()
            }
        })
}

pub fn lookup_tag(conn: &mut database::Connection, tag_id: TagId) -> Result<Tag> {
    use database::schema::tags::dsl::*;

    tags.select(Tag::as_select())
        .filter(id.eq(tag_id))
        .get_result(conn)
        .optional()?
        .ok_or_else(|| Error::not_found("tag", tag_id))
}

pub fn list_tags(conn: &mut database::Connection) -> Result<Vec<Tag>> {
    use database::schema::tags::dsl::*;

    Ok(tags.select(Tag::as_select()).order_by(name.asc()).load(conn)?)
}

#[test]
fn create_and_lookup_ingredient() {
    let mut conn = database::test_connection();
    let created = create_ingredient(&mut conn, "flour", "g").unwrap();
    let found = lookup_ingredient(&mut conn, created.id).unwrap();
    assert_eq!(found, created);
    assert_eq!(found.name, "flour");
    assert_eq!(found.measurement_unit, "g");
}

#[test]
fn duplicate_ingredient_conflicts() {
    let mut conn = database::test_connection();
    create_ingredient(&mut conn, "flour", "g").unwrap();
    assert!(matches!(
        create_ingredient(&mut conn, "flour", "g"),
        Err(Error::Conflict(_))
    ));

    // same name in another unit is a different catalog entry
    create_ingredient(&mut conn, "flour", "cup").unwrap();
}

#[test]
fn missing_ingredient_not_found() {
    let mut conn = database::test_connection();
    assert!(matches!(
        lookup_ingredient(&mut conn, IngredientId::from(42)),
        Err(Error::NotFound {
            entity: "ingredient",
            ..
        })
    ));
}

#[test]
fn prefix_search_is_ordered_and_case_sensitive() {
    let mut conn = database::test_connection();
    for (n, u) in [
        ("sugar", "g"),
        ("salt", "g"),
        ("Salt flakes", "g"),
        ("pepper", "g"),
        ("sa%ffron", "g"),
    ] {
        create_ingredient(&mut conn, n, u).unwrap();
    }

    let names: Vec<_> = search_ingredients_by_prefix(&mut conn, "s")
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(names, ["sa%ffron", "salt", "sugar"]);

    let names: Vec<_> = search_ingredients_by_prefix(&mut conn, "sa%")
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(names, ["sa%ffron"]);

    assert_eq!(search_ingredients_by_prefix(&mut conn, "").unwrap().len(), 5);
}

#[test]
fn tags() {
    let mut conn = database::test_connection();
    let dinner = create_tag(&mut conn, "dinner", "#112233", "dinner").unwrap();
    create_tag(&mut conn, "breakfast", "#AABBCC", "breakfast").unwrap();

    assert_eq!(lookup_tag(&mut conn, dinner.id).unwrap(), dinner);
    let names: Vec<_> = list_tags(&mut conn)
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["breakfast", "dinner"]);

    assert!(matches!(
        create_tag(&mut conn, "supper", "#112233", "supper"),
        Err(Error::Conflict(_))
    ));
    assert!(matches!(
        create_tag(&mut conn, "lunch", "blue", "lunch"),
        Err(Error::InvalidField { field: "color", .. })
    ));
}
