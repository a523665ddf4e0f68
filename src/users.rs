// Copyright 2023 Remi Bernotavicius

//! A minimal user directory. Accounts and tokens are issued elsewhere; this only keeps enough to
//! map an opaque token back to a user.

use crate::database;
use crate::database::models::{NewUser, User};
use crate::error::{is_unique_violation, Error, Result};
use diesel::prelude::OptionalExtension as _;
use diesel::ExpressionMethods as _;
use diesel::QueryDsl as _;
use diesel::RunQueryDsl as _;
use diesel::SelectableHelper as _;

pub fn create_user(
    conn: &mut database::Connection,
    new_username: &str,
    new_email: &str,
    new_first_name: &str,
    new_last_name: &str,
) -> Result<User> {
    use database::schema::users::dsl::*;
    use diesel::insert_into;

    let token = uuid::Uuid::new_v4().simple().to_string();
    let user = insert_into(users)
        .values(NewUser {
            username: new_username,
            email: new_email,
            first_name: new_first_name,
            last_name: new_last_name,
            auth_token: &token,
        })
        .returning(User::as_returning())
        .get_result(conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!("user {new_username:?} or email {new_email:?}"))
            } else {
                e.into()
            }
        })?;
    log::info!("created user {} ({})", user.username, user.id);
    Ok(user)
}

pub fn authenticate(conn: &mut database::Connection, token: &str) -> Result<User> {
    use database::schema::users::dsl::*;

    users
        .select(User::as_select())
        .filter(auth_token.eq(token))
        .get_result(conn)
        .optional()?
        .ok_or(Error::Unauthorized)
}

pub fn lookup_user_by_username(
    conn: &mut database::Connection,
    find_username: &str,
) -> Result<User> {
    use database::schema::users::dsl::*;

    users
        .select(User::as_select())
        .filter(username.eq(find_username))
        .get_result(conn)
        .optional()?
        .ok_or_else(|| Error::not_found("user", find_username))
}

#[test]
fn token_authenticates_its_user() {
    let mut conn = database::test_connection();
    let alice = create_user(&mut conn, "alice", "alice@example.com", "Alice", "A").unwrap();
    let bob = create_user(&mut conn, "bob", "bob@example.com", "Bob", "B").unwrap();
    assert_ne!(alice.auth_token, bob.auth_token);

    assert_eq!(authenticate(&mut conn, &alice.auth_token).unwrap().id, alice.id);
    assert_eq!(authenticate(&mut conn, &bob.auth_token).unwrap().id, bob.id);
    assert!(matches!(
        authenticate(&mut conn, "not-a-token"),
        Err(Error::Unauthorized)
    ));
}

#[test]
fn usernames_are_unique() {
    let mut conn = database::test_connection();
    create_user(&mut conn, "alice", "alice@example.com", "", "").unwrap();
    assert!(matches!(
        create_user(&mut conn, "alice", "other@example.com", "", ""),
        Err(Error::Conflict(_))
    ));
    assert_eq!(
        lookup_user_by_username(&mut conn, "alice").unwrap().email,
        "alice@example.com"
    );
    assert!(matches!(
        lookup_user_by_username(&mut conn, "carol"),
        Err(Error::NotFound { entity: "user", .. })
    ));
}
