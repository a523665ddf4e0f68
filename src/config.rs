// Copyright 2023 Remi Bernotavicius

use crate::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Recipe sharing backend")]
pub struct Args {
    /// SQLite database file; defaults to `data.sqlite` in the user data directory.
    #[arg(long, global = true, env = "RECIPE_SHARE_DATABASE")]
    pub database: Option<PathBuf>,

    #[arg(long, global = true, env = "RECIPE_SHARE_LOG", default_value = "info")]
    pub log_level: log::LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(long, env = "RECIPE_SHARE_ADDRESS", default_value = "0.0.0.0:8000")]
        address: String,
    },
    /// Load `name,measurement_unit` rows into the ingredient catalog.
    ImportIngredients { path: PathBuf },
    /// Register a user and print their API token.
    AddUser {
        username: String,
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Add a recipe tag to the catalog.
    AddTag {
        name: String,
        /// `#RRGGBB`
        color: String,
        slug: String,
    },
    /// Print a user's shopping list.
    ShoppingList { username: String },
}

/// This is where the database lives on-disk unless told otherwise. On Linux it should be like:
/// `~/.local/share/recipe_share/`
fn data_path() -> Result<PathBuf> {
    let dirs = directories::BaseDirs::new().ok_or("failed to get user home directory")?;
    let path = dirs.data_dir().join("recipe_share");
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

impl Args {
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => Ok(data_path()?.join("data.sqlite")),
        }
    }
}

#[test]
fn command_line_is_well_formed() {
    use clap::CommandFactory as _;
    Args::command().debug_assert();
}

#[test]
fn explicit_options() {
    let args = Args::try_parse_from([
        "recipe-share",
        "serve",
        "--address",
        "127.0.0.1:9000",
        "--database",
        "/tmp/recipes.sqlite",
        "--log-level",
        "debug",
    ])
    .unwrap();

    assert_eq!(args.log_level, log::LevelFilter::Debug);
    assert_eq!(
        args.database_path().unwrap(),
        PathBuf::from("/tmp/recipes.sqlite")
    );
    match args.command {
        Command::Serve { address } => assert_eq!(address, "127.0.0.1:9000"),
        other => panic!("expected serve, got {other:?}"),
    }
}

#[test]
fn add_user_names_default_empty() {
    let args = Args::try_parse_from(["recipe-share", "add-user", "alice", "alice@example.com"])
        .unwrap();
    match args.command {
        Command::AddUser {
            username,
            first_name,
            last_name,
            ..
        } => {
            assert_eq!(username, "alice");
            assert_eq!(first_name, "");
            assert_eq!(last_name, "");
        }
        other => panic!("expected add-user, got {other:?}"),
    }
}
