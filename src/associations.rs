// Copyright 2023 Remi Bernotavicius

//! The per-recipe ingredient ledger and tag set. Both are always replaced wholesale, never
//! patched row by row.

use crate::database;
use crate::database::models::{
    IngredientAmount, IngredientId, NewIngredientAmount, Recipe, RecipeId, RecipeTag, Tag,
};
#[cfg(test)]
use crate::database::{bare_recipe, test_user as user};
use crate::error::Result;
use crate::validator::{ValidatedIngredients, ValidatedTags};
use diesel::prelude::Connection as _;
use diesel::BelongingToDsl as _;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;
use serde::Serialize;

/// An ingredient as it appears inside a recipe.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RecipeIngredient {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Deletes every ingredient row of the recipe and inserts the validated list in its place, in a
/// single transaction. Readers never see the recipe with a partial list.
pub fn replace_associations(
    conn: &mut database::Connection,
    replace_recipe_id: RecipeId,
    validated: &ValidatedIngredients,
) -> Result<()> {
    use database::schema::ingredient_amounts::dsl::*;
    use diesel::{delete, insert_into};

    let rows: Vec<_> = validated
        .iter()
        .map(|v| NewIngredientAmount {
            recipe_id: replace_recipe_id,
            ingredient_id: v.ingredient.id,
            amount: v.amount,
        })
        .collect();

    conn.transaction(|conn| {
        delete(ingredient_amounts.filter(recipe_id.eq(replace_recipe_id))).execute(conn)?;
        insert_into(ingredient_amounts).values(&rows).execute(conn)?;
        diesel::QueryResult::Ok(())
    })?;
    log::debug!(
        "recipe {replace_recipe_id} now has {} ingredients",
        rows.len()
    );
    Ok(())
}

pub fn replace_tags(
    conn: &mut database::Connection,
    replace_recipe_id: RecipeId,
    validated: &ValidatedTags,
) -> Result<()> {
    use database::schema::recipe_tags::dsl::*;
    use diesel::{delete, insert_into};

    let rows: Vec<_> = validated
        .iter()
        .map(|t| RecipeTag {
            recipe_id: replace_recipe_id,
            tag_id: t.id,
        })
        .collect();

    conn.transaction(|conn| {
        delete(recipe_tags.filter(recipe_id.eq(replace_recipe_id))).execute(conn)?;
        insert_into(recipe_tags).values(&rows).execute(conn)?;
        diesel::QueryResult::Ok(())
    })?;
    Ok(())
}

pub fn read_associations(
    conn: &mut database::Connection,
    recipe: &Recipe,
) -> Result<Vec<RecipeIngredient>> {
    use database::schema::ingredients;

    let rows: Vec<(IngredientAmount, (IngredientId, String, String))> =
        IngredientAmount::belonging_to(recipe)
            .inner_join(ingredients::table)
            .select((
                IngredientAmount::as_select(),
                (
                    ingredients::id,
                    ingredients::name,
                    ingredients::measurement_unit,
                ),
            ))
            .order_by((ingredients::name.asc(), ingredients::id.asc()))
            .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(usage, (id, name, measurement_unit))| RecipeIngredient {
            id,
            name,
            measurement_unit,
            amount: usage.amount,
        })
        .collect())
}

pub fn read_tags(conn: &mut database::Connection, recipe: &Recipe) -> Result<Vec<Tag>> {
    use database::schema::tags;

    Ok(RecipeTag::belonging_to(recipe)
        .inner_join(tags::table)
        .select(Tag::as_select())
        .order_by(tags::name.asc())
        .load(conn)?)
}

#[test]
fn replace_then_read_round_trips() {
    use crate::{catalog, validator};
    use validator::IngredientEntry;

    let mut conn = database::test_connection();
    let author = user(&mut conn, "chef");
    let recipe = bare_recipe(&mut conn, &author, "pancakes");
    let milk = catalog::create_ingredient(&mut conn, "milk", "ml").unwrap();
    let flour = catalog::create_ingredient(&mut conn, "flour", "g").unwrap();

    let validated = validator::validate_ingredients(
        &mut conn,
        &[
            IngredientEntry::new(milk.id, 300),
            IngredientEntry::new(flour.id, 200),
        ],
    )
    .unwrap();
    replace_associations(&mut conn, recipe.id, &validated).unwrap();

    assert_eq!(
        read_associations(&mut conn, &recipe).unwrap(),
        [
            RecipeIngredient {
                id: flour.id,
                name: "flour".into(),
                measurement_unit: "g".into(),
                amount: 200,
            },
            RecipeIngredient {
                id: milk.id,
                name: "milk".into(),
                measurement_unit: "ml".into(),
                amount: 300,
            },
        ]
    );

    let validated = validator::validate_ingredients(
        &mut conn,
        &[IngredientEntry::new(milk.id, 50)],
    )
    .unwrap();
    replace_associations(&mut conn, recipe.id, &validated).unwrap();

    let after: Vec<_> = read_associations(&mut conn, &recipe)
        .unwrap()
        .into_iter()
        .map(|i| (i.name, i.amount))
        .collect();
    assert_eq!(after, [("milk".to_owned(), 50)]);
}

#[test]
fn failed_replace_keeps_previous_rows() {
    use crate::{catalog, validator};
    use validator::IngredientEntry;

    let mut conn = database::test_connection();
    let author = user(&mut conn, "chef");
    let recipe = bare_recipe(&mut conn, &author, "pancakes");
    let milk = catalog::create_ingredient(&mut conn, "milk", "ml").unwrap();
    let eggs = catalog::create_ingredient(&mut conn, "eggs", "pcs").unwrap();

    let entries = [
        IngredientEntry::new(milk.id, 300),
        IngredientEntry::new(eggs.id, 2),
    ];
    let validated = validator::validate_ingredients(&mut conn, &entries).unwrap();
    replace_associations(&mut conn, recipe.id, &validated).unwrap();

    // The catalog entry vanishes between validation and the write, so the insert half of the
    // replacement hits a foreign key violation after the delete half already ran.
    let validated = validator::validate_ingredients(&mut conn, &entries[..1]).unwrap();
    {
        use database::schema::ingredients::dsl::*;
        diesel::delete(ingredients.filter(id.eq(milk.id)))
            .execute(&mut conn)
            .unwrap();
    }
    assert!(replace_associations(&mut conn, recipe.id, &validated).is_err());

    let names: Vec<_> = read_associations(&mut conn, &recipe)
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(names, ["eggs"]);
}

#[test]
fn replace_tags_sets_exactly_the_given_tags() {
    use crate::{catalog, validator};

    let mut conn = database::test_connection();
    let author = user(&mut conn, "chef");
    let recipe = bare_recipe(&mut conn, &author, "pancakes");
    let sweet = catalog::create_tag(&mut conn, "sweet", "#FF0000", "sweet").unwrap();
    let quick = catalog::create_tag(&mut conn, "quick", "#00FF00", "quick").unwrap();

    let validated = validator::validate_tags(&mut conn, &[sweet.id, quick.id]).unwrap();
    replace_tags(&mut conn, recipe.id, &validated).unwrap();
    assert_eq!(
        read_tags(&mut conn, &recipe).unwrap(),
        [quick.clone(), sweet.clone()]
    );

    let validated = validator::validate_tags(&mut conn, &[sweet.id]).unwrap();
    replace_tags(&mut conn, recipe.id, &validated).unwrap();
    assert_eq!(read_tags(&mut conn, &recipe).unwrap(), [sweet]);
}
