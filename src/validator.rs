// Copyright 2023 Remi Bernotavicius

//! Checks the ingredient and tag lists of a recipe payload against the catalog. Validation only
//! reads; a failed validation leaves the database untouched.

use crate::catalog;
use crate::database;
use crate::database::models::{Ingredient, IngredientId, Tag, TagId};
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;

/// Clients send integers either as JSON numbers or as strings holding one. Anything else decodes
/// to `None` and is reported against the entry during validation.
fn lenient_integer<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<IngredientId>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = lenient_integer(deserializer)?;
    Ok(id.and_then(|id| i32::try_from(id).ok()).map(IngredientId::from))
}

/// One `{id, amount}` entry as submitted by a client.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientEntry {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<IngredientId>,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub amount: Option<i64>,
}

#[cfg(test)]
impl IngredientEntry {
    pub fn new(id: IngredientId, amount: i64) -> Self {
        Self {
            id: Some(id),
            amount: Some(amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIngredient {
    pub ingredient: Ingredient,
    pub amount: i32,
}

/// An ingredient list that passed [`validate_ingredients`]: every id exists, none repeats, and
/// every amount is positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIngredients(Vec<ValidatedIngredient>);

impl ValidatedIngredients {
    pub fn iter(&self) -> impl Iterator<Item = &ValidatedIngredient> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// A tag list that passed [`validate_tags`], deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTags(Vec<Tag>);

impl ValidatedTags {
    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }
}

fn require<'a, T>(field: &'static str, value: Option<&'a [T]>) -> Result<&'a [T]> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::MissingFields(vec![field])),
    }
}

pub fn validate_ingredients(
    conn: &mut database::Connection,
    entries: &[IngredientEntry],
) -> Result<ValidatedIngredients> {
    let mut seen = HashSet::new();
    let mut validated = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(id) = entry.id else {
            return Err(Error::InvalidField {
                field: "ingredients",
                message: "Each ingredient needs an integer id.".into(),
            });
        };
        let ingredient = catalog::lookup_ingredient(conn, id)?;
        if !seen.insert(ingredient.id) {
            return Err(Error::DuplicateIngredient {
                ingredient: ingredient.name,
            });
        }
        let amount = entry.amount.and_then(|a| i32::try_from(a).ok());
        let amount = match amount {
            Some(amount) if amount > 0 => amount,
            _ => {
                return Err(Error::InvalidAmount {
                    ingredient: ingredient.name,
                })
            }
        };
        validated.push(ValidatedIngredient { ingredient, amount });
    }
    Ok(ValidatedIngredients(validated))
}

pub fn validate_tags(conn: &mut database::Connection, ids: &[TagId]) -> Result<ValidatedTags> {
    let mut seen = HashSet::new();
    let mut validated = vec![];
    for &tag_id in ids {
        if seen.insert(tag_id) {
            validated.push(catalog::lookup_tag(conn, tag_id)?);
        }
    }
    Ok(ValidatedTags(validated))
}

/// Both lists are required; their presence is checked before either is resolved.
pub fn validate(
    conn: &mut database::Connection,
    ingredients: Option<&[IngredientEntry]>,
    tags: Option<&[TagId]>,
) -> Result<(ValidatedIngredients, ValidatedTags)> {
    let ingredients = require("ingredients", ingredients)?;
    let tags = require("tags", tags)?;
    let ingredients = validate_ingredients(conn, ingredients)?;
    let tags = validate_tags(conn, tags)?;
    Ok((ingredients, tags))
}

#[cfg(test)]
fn entry(id: IngredientId, amount: i64) -> IngredientEntry {
    IngredientEntry::new(id, amount)
}

#[test]
fn valid_list_resolves_ingredients() {
    let mut conn = database::test_connection();
    let flour = catalog::create_ingredient(&mut conn, "flour", "g").unwrap();
    let milk = catalog::create_ingredient(&mut conn, "milk", "ml").unwrap();
    let tag = catalog::create_tag(&mut conn, "bake", "#FFFFFF", "bake").unwrap();

    let (ingredients, tags) = validate(
        &mut conn,
        Some(&[entry(flour.id, 500), entry(milk.id, 1)][..]),
        Some(&[tag.id, tag.id][..]),
    )
    .unwrap();

    let resolved: Vec<_> = ingredients
        .iter()
        .map(|v| (v.ingredient.name.as_str(), v.amount))
        .collect();
    assert_eq!(resolved, [("flour", 500), ("milk", 1)]);
    assert_eq!(tags.iter().collect::<Vec<_>>(), [&tag]);
}

#[test]
fn missing_lists_name_the_field() {
    let mut conn = database::test_connection();
    let flour = catalog::create_ingredient(&mut conn, "flour", "g").unwrap();
    let tag = catalog::create_tag(&mut conn, "bake", "#FFFFFF", "bake").unwrap();

    let error = validate(&mut conn, None, Some(&[tag.id][..])).unwrap_err();
    assert!(matches!(error, Error::MissingFields(f) if f == ["ingredients"]));

    let no_ingredients: &[IngredientEntry] = &[];
    let error = validate(&mut conn, Some(no_ingredients), Some(&[tag.id][..])).unwrap_err();
    assert!(matches!(error, Error::MissingFields(f) if f == ["ingredients"]));

    let error = validate(&mut conn, Some(&[entry(flour.id, 1)][..]), None).unwrap_err();
    assert!(matches!(error, Error::MissingFields(f) if f == ["tags"]));
}

#[test]
fn unknown_ingredient_not_found() {
    let mut conn = database::test_connection();
    let error = validate_ingredients(&mut conn, &[entry(IngredientId::from(7), 1)]).unwrap_err();
    assert!(matches!(
        error,
        Error::NotFound {
            entity: "ingredient",
            ..
        }
    ));
}

#[test]
fn unknown_tag_not_found() {
    let mut conn = database::test_connection();
    let error = validate_tags(&mut conn, &[TagId::from(3)]).unwrap_err();
    assert!(matches!(error, Error::NotFound { entity: "tag", .. }));
}

#[test]
fn repeated_ingredient_rejected() {
    let mut conn = database::test_connection();
    let flour = catalog::create_ingredient(&mut conn, "flour", "g").unwrap();
    let error =
        validate_ingredients(&mut conn, &[entry(flour.id, 1), entry(flour.id, 2)]).unwrap_err();
    assert!(matches!(
        error,
        Error::DuplicateIngredient { ingredient } if ingredient == "flour"
    ));
}

#[test]
fn non_positive_amounts_rejected() {
    let mut conn = database::test_connection();
    let flour = catalog::create_ingredient(&mut conn, "flour", "g").unwrap();
    for amount in [0, -1, i64::from(i32::MIN), i64::from(i32::MAX) + 1] {
        let error = validate_ingredients(&mut conn, &[entry(flour.id, amount)]).unwrap_err();
        assert!(
            matches!(&error, Error::InvalidAmount { ingredient } if ingredient == "flour"),
            "amount {amount} gave {error:?}"
        );
    }
}

#[test]
fn entries_accept_integer_strings() {
    let entries: Vec<IngredientEntry> = serde_json::from_str(
        r#"[{"id": 1, "amount": "10"}, {"id": "2", "amount": 3}, {"id": 3, "amount": " 7 "}]"#,
    )
    .unwrap();
    assert_eq!(
        entries,
        [
            entry(IngredientId::from(1), 10),
            entry(IngredientId::from(2), 3),
            entry(IngredientId::from(3), 7),
        ]
    );
}

#[test]
fn undecodable_entries_are_reported_not_rejected() {
    let mut conn = database::test_connection();
    let flour = catalog::create_ingredient(&mut conn, "flour", "g").unwrap();

    let entries: Vec<IngredientEntry> = serde_json::from_str(&format!(
        r#"[{{"id": {}, "amount": "a lot"}}]"#,
        flour.id
    ))
    .unwrap();
    assert_eq!(entries[0].amount, None);
    let error = validate_ingredients(&mut conn, &entries).unwrap_err();
    assert!(matches!(&error, Error::InvalidAmount { ingredient } if ingredient == "flour"));

    let entries: Vec<IngredientEntry> =
        serde_json::from_str(r#"[{"id": "flour", "amount": 1}, {"amount": 2}]"#).unwrap();
    assert_eq!(entries[1].id, None);
    let error = validate_ingredients(&mut conn, &entries).unwrap_err();
    assert!(matches!(
        error,
        Error::InvalidField {
            field: "ingredients",
            ..
        }
    ));
}
