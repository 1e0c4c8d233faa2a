use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use client::config::{ConfigError, normalize_base_url};
use client::net::types::{Preferences, SavedItem};
use client::{ApiClient, ApiError, AuthError, AuthStore, ClientConfig, FileStorage, SavedItemsStore, StorageError};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not logged in; run `litflix-cli login` first")]
    NotLoggedIn,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{0}")]
    Failed(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "litflix-cli", about = "Litflix account, saved list and recommendations CLI")]
struct Cli {
    /// Backend origin; overrides `LITFLIX_API_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Session storage file; overrides `LITFLIX_STORAGE_PATH`.
    #[arg(long)]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        username: String,
        #[arg(long, env = "LITFLIX_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Register {
        username: String,
        email: String,
        #[arg(long, env = "LITFLIX_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Show the logged-in user.
    Me,
    Prefs(PrefsCommand),
    Saved(SavedCommand),
    Search {
        query: String,
        #[arg(long = "type", default_value = "book")]
        entity_type: String,
    },
    Recommend(PreferenceArgs),
}

#[derive(Args, Debug)]
struct PrefsCommand {
    #[command(subcommand)]
    command: PrefsSubcommand,
}

#[derive(Subcommand, Debug)]
enum PrefsSubcommand {
    Get,
    Set(PreferenceArgs),
    /// Mark onboarding as done without saving preferences.
    Skip,
}

#[derive(Args, Debug, Default)]
struct PreferenceArgs {
    #[arg(long)]
    book: Option<String>,
    #[arg(long)]
    movie: Option<String>,
    #[arg(long)]
    place: Option<String>,
    #[arg(long)]
    age: Option<String>,
    #[arg(long)]
    gender: Option<String>,
}

impl From<PreferenceArgs> for Preferences {
    fn from(args: PreferenceArgs) -> Self {
        Self { book_name: args.book, movie_name: args.movie, place_name: args.place, age: args.age, gender: args.gender }
    }
}

#[derive(Args, Debug)]
struct SavedCommand {
    #[command(subcommand)]
    command: SavedSubcommand,
}

#[derive(Subcommand, Debug)]
enum SavedSubcommand {
    List,
    Favorites,
    Save {
        item_id: String,
        #[arg(long)]
        name: String,
        #[arg(long = "type")]
        item_type: String,
        #[arg(long, default_value = "")]
        image: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value_t = false)]
        favorite: bool,
    },
    Remove {
        item_id: String,
    },
    Check {
        item_id: String,
    },
    /// Flip the favorite flag of a saved item.
    Favorite {
        item_id: String,
    },
}

struct CliContext {
    auth: AuthStore,
    saved: SavedItemsStore,
}

impl CliContext {
    fn open(cli: &Cli) -> Result<Self, CliError> {
        let mut config = ClientConfig::from_env()?;
        if let Some(url) = &cli.base_url {
            config.api_base_url = normalize_base_url(url)?;
        }
        if let Some(path) = &cli.storage {
            config.storage_path.clone_from(path);
        }

        let storage = Arc::new(FileStorage::open(&config.storage_path)?);
        let api = ApiClient::from_config(&config)?;
        let auth = AuthStore::new(api.clone(), storage);
        let saved = SavedItemsStore::new(api, auth.subscribe());
        Ok(Self { auth, saved })
    }

    /// Restore the stored session or fail with [`CliError::NotLoggedIn`].
    async fn require_session(&self) -> Result<(), CliError> {
        self.auth.restore().await.map(|_| ()).ok_or(CliError::NotLoggedIn)
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    if let Err(e) = dotenv {
        debug!(error = %e, "no .env loaded");
    }

    let cli = Cli::parse();
    let ctx = CliContext::open(&cli)?;

    match cli.command {
        Command::Login { username, password } => {
            let session = ctx.auth.login(&username, &password).await?;
            println!("logged in as {}", session.user.username);
            if session.is_new_user {
                println!("tip: set your taste with `litflix-cli prefs set --book ... --movie ...`");
            }
            Ok(())
        }
        Command::Register { username, email, password } => {
            let session = ctx.auth.register(&username, &email, &password).await?;
            println!("registered and logged in as {}", session.user.username);
            Ok(())
        }
        Command::Logout => {
            ctx.auth.logout();
            println!("logged out");
            Ok(())
        }
        Command::Me => {
            ctx.require_session().await?;
            print_json(&ctx.auth.user())
        }
        Command::Prefs(prefs) => run_prefs(&ctx, prefs).await,
        Command::Saved(saved) => run_saved(&ctx, saved).await,
        Command::Search { query, entity_type } => {
            let results = ctx.auth.api().search(&query, &entity_type).await?;
            print_json(&results)
        }
        Command::Recommend(args) => {
            // Logged-in users get their favorites blended in; anonymous use is fine.
            ctx.auth.restore().await;
            let recs = ctx.auth.api().recommendations(&args.into()).await?;
            print_json(&recs)
        }
    }
}

async fn run_prefs(ctx: &CliContext, prefs: PrefsCommand) -> Result<(), CliError> {
    ctx.require_session().await?;
    match prefs.command {
        PrefsSubcommand::Get => print_json(&ctx.auth.get_preferences().await?),
        PrefsSubcommand::Set(args) => {
            let prefs: Preferences = args.into();
            if prefs.is_empty() {
                return Err(CliError::Failed("pass at least one of --book, --movie, --place, --age, --gender".into()));
            }
            ctx.auth.save_preferences(&prefs).await?;
            println!("preferences saved");
            Ok(())
        }
        PrefsSubcommand::Skip => {
            ctx.auth.skip_preferences()?;
            println!("preferences skipped");
            Ok(())
        }
    }
}

async fn run_saved(ctx: &CliContext, saved: SavedCommand) -> Result<(), CliError> {
    ctx.require_session().await?;
    match saved.command {
        SavedSubcommand::List => {
            load(ctx).await?;
            print_json(&ctx.saved.items())
        }
        SavedSubcommand::Favorites => {
            load(ctx).await?;
            print_json(&ctx.saved.favorites())
        }
        SavedSubcommand::Save { item_id, name, item_type, image, description, favorite } => {
            let item = SavedItem::new(item_id, name, item_type)
                .with_image(image)
                .with_description(description)
                .with_favorited(favorite);
            let item_id = item.item_id.clone();
            if !ctx.saved.save_item(item).await {
                return Err(CliError::Failed(format!("could not save {item_id}")));
            }
            println!("saved {item_id}");
            Ok(())
        }
        SavedSubcommand::Remove { item_id } => {
            if !ctx.saved.remove_item(&item_id).await {
                return Err(CliError::Failed(format!("could not remove {item_id}")));
            }
            println!("removed {item_id}");
            Ok(())
        }
        SavedSubcommand::Check { item_id } => {
            let is_saved = ctx.saved.check_if_saved(&item_id).await;
            print_json(&serde_json::json!({ "item_id": item_id, "is_saved": is_saved }))
        }
        SavedSubcommand::Favorite { item_id } => {
            load(ctx).await?;
            if !ctx.saved.toggle_favorite(&item_id).await {
                return Err(CliError::Failed(format!("{item_id} is not on the saved list")));
            }
            let favorited = ctx.saved.favorites().iter().any(|i| i.item_id == item_id);
            println!("{item_id} favorite: {favorited}");
            Ok(())
        }
    }
}

async fn load(ctx: &CliContext) -> Result<(), CliError> {
    if ctx.saved.load_saved_items().await {
        Ok(())
    } else {
        Err(CliError::Failed("could not load saved items".into()))
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
