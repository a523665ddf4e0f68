// Copyright 2023 Remi Bernotavicius

use crate::database;
use crate::database::models::{BondKind, User};
#[cfg(test)]
use crate::database::{bare_recipe, test_user};
use crate::error::Result;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub name: String,
    pub total_amount: i64,
    pub measurement_unit: String,
}

impl fmt::Display for ShoppingListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {}",
            self.name, self.total_amount, self.measurement_unit
        )
    }
}

/// Everything in a user's cart, one item per (ingredient name, unit), ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShoppingList {
    items: Vec<ShoppingListItem>,
}

impl ShoppingList {
    pub fn items(&self) -> &[ShoppingListItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for ShoppingList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            writeln!(f, "{item}")?;
        }
        Ok(())
    }
}

/// Units are compared as plain strings; "g" and "grams" stay separate lines.
fn aggregate(rows: impl IntoIterator<Item = (String, String, i32)>) -> ShoppingList {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for (name, unit, amount) in rows {
        *totals.entry((name, unit)).or_default() += i64::from(amount);
    }
    ShoppingList {
        items: totals
            .into_iter()
            .map(|((name, measurement_unit), total_amount)| ShoppingListItem {
                name,
                total_amount,
                measurement_unit,
            })
            .collect(),
    }
}

pub fn build_shopping_list(conn: &mut database::Connection, user: &User) -> Result<ShoppingList> {
    use database::schema::{bonds, ingredient_amounts, ingredients};

    let in_cart = bonds::table
        .filter(bonds::user_id.eq(user.id))
        .filter(bonds::kind.eq(BondKind::Cart))
        .select(bonds::recipe_id);

    let rows: Vec<(String, String, i32)> = ingredient_amounts::table
        .inner_join(ingredients::table)
        .filter(ingredient_amounts::recipe_id.eq_any(in_cart))
        .select((
            ingredients::name,
            ingredients::measurement_unit,
            ingredient_amounts::amount,
        ))
        .load(conn)?;

    let list = aggregate(rows);
    log::debug!(
        "shopping list for {} has {} items",
        user.username,
        list.items().len()
    );
    Ok(list)
}

#[test]
fn aggregate_sums_matching_name_and_unit() {
    use maplit::btreemap;

    let list = aggregate(vec![
        ("sugar".into(), "g".into(), 100),
        ("flour".into(), "g".into(), 10),
        ("flour".into(), "g".into(), 5),
        ("flour".into(), "cup".into(), 2),
    ]);

    let totals: BTreeMap<_, _> = list
        .items()
        .iter()
        .map(|i| ((i.name.as_str(), i.measurement_unit.as_str()), i.total_amount))
        .collect();
    assert_eq!(
        totals,
        btreemap! {
            ("flour", "cup") => 2,
            ("flour", "g") => 15,
            ("sugar", "g") => 100,
        }
    );
    assert_eq!(list.to_string(), "flour: 2 cup\nflour: 15 g\nsugar: 100 g\n");
}

#[test]
fn aggregate_does_not_overflow() {
    let list = aggregate(vec![
        ("salt".into(), "g".into(), i32::MAX),
        ("salt".into(), "g".into(), i32::MAX),
    ]);
    assert_eq!(list.items()[0].total_amount, 2 * i64::from(i32::MAX));
}

#[test]
fn aggregate_is_order_independent() {
    let rows = vec![
        ("b".to_owned(), "g".to_owned(), 1),
        ("a".to_owned(), "g".to_owned(), 2),
        ("b".to_owned(), "g".to_owned(), 3),
    ];
    let mut reversed = rows.clone();
    reversed.reverse();
    assert_eq!(aggregate(rows), aggregate(reversed));
}

#[test]
fn empty_cart_is_empty_document() {
    let mut conn = database::test_connection();
    let user = test_user(&mut conn, "alice");
    let list = build_shopping_list(&mut conn, &user).unwrap();
    assert!(list.is_empty());
    assert_eq!(list.to_string(), "");
}

#[test]
fn only_cart_recipes_of_the_user_count() {
    use crate::{associations, bonds, catalog, validator};
    use validator::IngredientEntry;

    let mut conn = database::test_connection();
    let alice = test_user(&mut conn, "alice");
    let bob = test_user(&mut conn, "bob");
    let flour = catalog::create_ingredient(&mut conn, "flour", "g").unwrap();
    let eggs = catalog::create_ingredient(&mut conn, "eggs", "pcs").unwrap();

    let mut recipe_with = |name: &str, entries: &[(&crate::database::models::Ingredient, i64)]| {
        let recipe = bare_recipe(&mut conn, &alice, name);
        let entries: Vec<_> = entries
            .iter()
            .map(|(i, amount)| IngredientEntry::new(i.id, *amount))
            .collect();
        let validated = validator::validate_ingredients(&mut conn, &entries).unwrap();
        associations::replace_associations(&mut conn, recipe.id, &validated).unwrap();
        recipe
    };
    let bread = recipe_with("bread", &[(&flour, 10)]);
    let cake = recipe_with("cake", &[(&flour, 5), (&eggs, 3)]);
    let omelette = recipe_with("omelette", &[(&eggs, 4)]);

    bonds::create_bond(&mut conn, BondKind::Cart, &alice, bread.id).unwrap();
    bonds::create_bond(&mut conn, BondKind::Cart, &alice, cake.id).unwrap();
    bonds::create_bond(&mut conn, BondKind::Favorite, &alice, omelette.id).unwrap();
    bonds::create_bond(&mut conn, BondKind::Cart, &bob, omelette.id).unwrap();

    let list = build_shopping_list(&mut conn, &alice).unwrap();
    assert_eq!(list.to_string(), "eggs: 3 pcs\nflour: 15 g\n");

    let list = build_shopping_list(&mut conn, &bob).unwrap();
    assert_eq!(list.to_string(), "eggs: 4 pcs\n");
}
