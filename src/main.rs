// Copyright 2023 Remi Bernotavicius

use clap::Parser as _;
use config::{Args, Command};

mod api;
mod associations;
mod bonds;
mod catalog;
mod config;
mod database;
mod error;
mod import;
mod recipes;
mod shopping_list;
mod users;
mod validator;

type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
type Result<T> = std::result::Result<T, Error>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    simple_logger::SimpleLogger::new()
        .with_level(args.log_level)
        .init()?;

    let mut conn = database::establish_connection(args.database_path()?)?;
    match args.command {
        Command::Serve { address } => api::serve(conn, &address).await?,
        Command::ImportIngredients { path } => import::import_ingredients(conn, path)?,
        Command::AddUser {
            username,
            email,
            first_name,
            last_name,
        } => {
            let user = users::create_user(&mut conn, &username, &email, &first_name, &last_name)?;
            println!("{}", user.auth_token);
        }
        Command::AddTag { name, color, slug } => {
            let tag = catalog::create_tag(&mut conn, &name, &color, &slug)?;
            println!("created tag {} ({})", tag.name, tag.id);
        }
        Command::ShoppingList { username } => {
            let user = users::lookup_user_by_username(&mut conn, &username)?;
            print!("{}", shopping_list::build_shopping_list(&mut conn, &user)?);
        }
    }
    Ok(())
}
