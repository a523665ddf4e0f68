// Copyright 2023 Remi Bernotavicius

use diesel::prelude::Connection as _;
use diesel::RunQueryDsl as _;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::error::Error;
use std::path::Path;

pub mod models;
pub mod schema;

pub type Connection = diesel::sqlite::SqliteConnection;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Cascading deletes rely on SQLite enforcing foreign keys, which it only does when asked to on
/// each connection.
fn enable_foreign_keys(conn: &mut Connection) -> diesel::QueryResult<()> {
    diesel::sql_query("PRAGMA foreign_keys = ON").execute(conn)?;
    Ok(())
}

pub fn establish_connection(
    path: impl AsRef<Path>,
) -> Result<Connection, Box<dyn Error + Send + Sync + 'static>> {
    let url = path
        .as_ref()
        .to_str()
        .ok_or_else(|| format!("database path {:?} is not valid UTF-8", path.as_ref()))?;
    let mut connection = Connection::establish(url)?;
    enable_foreign_keys(&mut connection)?;
    let applied = connection.run_pending_migrations(MIGRATIONS)?;
    for migration in applied {
        log::info!("applied migration {migration}");
    }
    Ok(connection)
}

#[cfg(test)]
pub fn test_connection() -> Connection {
    establish_connection(":memory:").unwrap()
}

#[cfg(test)]
pub fn test_user(conn: &mut Connection, username: &str) -> models::User {
    crate::users::create_user(conn, username, &format!("{username}@example.com"), "", "").unwrap()
}

/// A recipe row with no ingredients or tags, for tests that build those up themselves.
#[cfg(test)]
pub fn bare_recipe(conn: &mut Connection, author: &models::User, name: &str) -> models::Recipe {
    use diesel::SelectableHelper as _;
    use schema::recipes::dsl::recipes;

    diesel::insert_into(recipes)
        .values(models::NewRecipe {
            author_id: author.id,
            name,
            image: "recipes/image.png",
            text: "",
            cooking_time: 1,
        })
        .returning(models::Recipe::as_returning())
        .get_result(conn)
        .unwrap()
}

#[test]
fn migrations() {
    let mut conn = test_connection();
    conn.revert_all_migrations(MIGRATIONS).unwrap();
    assert!(conn.has_pending_migration(MIGRATIONS).unwrap());

    conn.run_pending_migrations(MIGRATIONS).unwrap();
    assert!(!conn.has_pending_migration(MIGRATIONS).unwrap());
}

#[test]
fn foreign_keys_enforced() {
    use diesel::sql_types::Integer;

    #[derive(diesel::QueryableByName)]
    struct Pragma {
        #[diesel(sql_type = Integer)]
        foreign_keys: i32,
    }

    let mut conn = test_connection();
    let pragma: Pragma = diesel::sql_query("PRAGMA foreign_keys")
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(pragma.foreign_keys, 1);
}
