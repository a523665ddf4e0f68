// Copyright 2023 Remi Bernotavicius

//! User-to-recipe relations. Favorites and the shopping cart share one table and one code path;
//! the [`BondKind`] passed in selects which relation is being changed.
//!
//! Redundant calls are rejected rather than silently accepted, so a caller can tell a real state
//! change from a no-op.

use crate::database;
use crate::database::models::{BondKind, NewBond, RecipeHandle, RecipeId, User};
#[cfg(test)]
use crate::database::{bare_recipe, test_user};
use crate::error::{is_unique_violation, Error, Result};
use crate::recipes;
use diesel::dsl::exists;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;

pub fn is_bonded(
    conn: &mut database::Connection,
    bond_kind: BondKind,
    user: &User,
    bond_recipe_id: RecipeId,
) -> Result<bool> {
    use database::schema::bonds::dsl::*;

    Ok(diesel::select(exists(
        bonds
            .filter(user_id.eq(user.id))
            .filter(recipe_id.eq(bond_recipe_id))
            .filter(kind.eq(bond_kind)),
    ))
    .get_result(conn)?)
}

/// A concurrent writer can add the same bond between the existence check and this insert; the
/// unique index then rejects it and that is reported the same way.
fn insert_bond(conn: &mut database::Connection, bond: NewBond) -> Result<()> {
    use database::schema::bonds::dsl::*;

    diesel::insert_into(bonds)
        .values(bond)
        .execute(conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::AlreadyExists
            } else {
                e.into()
            }
        })?;
    Ok(())
}

/// Links the recipe to the user. The lookup beforehand only exists to give a friendly error; the
/// unique index on (user, recipe, kind) is what actually keeps a second row out.
pub fn create_bond(
    conn: &mut database::Connection,
    bond_kind: BondKind,
    user: &User,
    bond_recipe_id: RecipeId,
) -> Result<RecipeHandle> {
    let recipe = recipes::lookup_recipe_handle(conn, bond_recipe_id)?;
    if is_bonded(conn, bond_kind, user, recipe.id)? {
        return Err(Error::AlreadyExists);
    }

    insert_bond(
        conn,
        NewBond {
            user_id: user.id,
            recipe_id: recipe.id,
            kind: bond_kind,
        },
    )?;
    log::info!(
        "user {} added recipe {} to {bond_kind}",
        user.username,
        recipe.id
    );
    Ok(recipe)
}

pub fn delete_bond(
    conn: &mut database::Connection,
    bond_kind: BondKind,
    user: &User,
    bond_recipe_id: RecipeId,
) -> Result<()> {
    use database::schema::bonds::dsl::*;
    use diesel::delete;

    let recipe = recipes::lookup_recipe_handle(conn, bond_recipe_id)?;
    let deleted = delete(
        bonds
            .filter(user_id.eq(user.id))
            .filter(recipe_id.eq(recipe.id))
            .filter(kind.eq(bond_kind)),
    )
    .execute(conn)?;
    if deleted == 0 {
        return Err(Error::AlreadyDeleted);
    }
    log::info!(
        "user {} removed recipe {} from {bond_kind}",
        user.username,
        recipe.id
    );
    Ok(())
}

#[test]
fn create_twice_reports_already_exists() {
    let mut conn = database::test_connection();
    let user = test_user(&mut conn, "alice");
    let recipe = bare_recipe(&mut conn, &user, "soup");

    for kind in BondKind::iter() {
        let handle = create_bond(&mut conn, kind, &user, recipe.id).unwrap();
        assert_eq!(
            handle,
            RecipeHandle {
                id: recipe.id,
                name: "soup".into(),
                image: recipe.image.clone(),
                cooking_time: 1,
            }
        );
        assert!(is_bonded(&mut conn, kind, &user, recipe.id).unwrap());
        assert!(matches!(
            create_bond(&mut conn, kind, &user, recipe.id),
            Err(Error::AlreadyExists)
        ));
    }
}

#[test]
fn delete_twice_reports_already_deleted() {
    let mut conn = database::test_connection();
    let user = test_user(&mut conn, "alice");
    let recipe = bare_recipe(&mut conn, &user, "soup");

    for kind in BondKind::iter() {
        create_bond(&mut conn, kind, &user, recipe.id).unwrap();
        delete_bond(&mut conn, kind, &user, recipe.id).unwrap();
        assert!(!is_bonded(&mut conn, kind, &user, recipe.id).unwrap());
        assert!(matches!(
            delete_bond(&mut conn, kind, &user, recipe.id),
            Err(Error::AlreadyDeleted)
        ));
    }
}

#[test]
fn kinds_and_users_are_independent() {
    let mut conn = database::test_connection();
    let alice = test_user(&mut conn, "alice");
    let bob = test_user(&mut conn, "bob");
    let recipe = bare_recipe(&mut conn, &alice, "soup");

    create_bond(&mut conn, BondKind::Favorite, &alice, recipe.id).unwrap();
    assert!(!is_bonded(&mut conn, BondKind::Cart, &alice, recipe.id).unwrap());
    assert!(!is_bonded(&mut conn, BondKind::Favorite, &bob, recipe.id).unwrap());

    create_bond(&mut conn, BondKind::Favorite, &bob, recipe.id).unwrap();
    assert!(matches!(
        delete_bond(&mut conn, BondKind::Cart, &alice, recipe.id),
        Err(Error::AlreadyDeleted)
    ));
}

#[test]
fn missing_recipe_not_found() {
    let mut conn = database::test_connection();
    let user = test_user(&mut conn, "alice");
    let missing = RecipeId::from(404);

    for kind in BondKind::iter() {
        assert!(matches!(
            create_bond(&mut conn, kind, &user, missing),
            Err(Error::NotFound {
                entity: "recipe",
                ..
            })
        ));
        assert!(matches!(
            delete_bond(&mut conn, kind, &user, missing),
            Err(Error::NotFound {
                entity: "recipe",
                ..
            })
        ));
    }
}

#[test]
fn unique_index_backs_the_existence_check() {
    use database::schema::bonds::dsl::bonds;

    let mut conn = database::test_connection();
    let user = test_user(&mut conn, "alice");
    let recipe = bare_recipe(&mut conn, &user, "soup");
    let row = NewBond {
        user_id: user.id,
        recipe_id: recipe.id,
        kind: BondKind::Cart,
    };
    diesel::insert_into(bonds).values(&row).execute(&mut conn).unwrap();
    let error = diesel::insert_into(bonds)
        .values(&row)
        .execute(&mut conn)
        .unwrap_err();
    assert!(is_unique_violation(&error));
}

#[test]
fn deleting_recipe_cascades_bonds() {
    use database::schema::bonds::dsl::bonds;
    use database::schema::recipes::dsl::recipes;

    let mut conn = database::test_connection();
    let user = test_user(&mut conn, "alice");
    let recipe = bare_recipe(&mut conn, &user, "soup");
    for kind in BondKind::iter() {
        create_bond(&mut conn, kind, &user, recipe.id).unwrap();
    }

    diesel::delete(recipes.find(recipe.id))
        .execute(&mut conn)
        .unwrap();
    let remaining: i64 = bonds.count().get_result(&mut conn).unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn insert_losing_the_race_reports_already_exists() {
    let mut conn = database::test_connection();
    let user = test_user(&mut conn, "alice");
    let recipe = bare_recipe(&mut conn, &user, "soup");
    let row = || NewBond {
        user_id: user.id,
        recipe_id: recipe.id,
        kind: BondKind::Favorite,
    };

    // Another request got its row in after this one checked.
    insert_bond(&mut conn, row()).unwrap();
    assert!(matches!(
        insert_bond(&mut conn, row()),
        Err(Error::AlreadyExists)
    ));
}
