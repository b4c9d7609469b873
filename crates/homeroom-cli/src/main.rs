//! Homeroom CLI - read the learning platform's user bundle from the terminal.
//!
//! The command line stands in for the app's screens: it signs a session in
//! with a token from the auth provider, loads the bundle through the cache
//! (using the on-disk copy while it is fresh), and prints what the screens
//! would show.

use std::io;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use homeroom_core::cache::BUNDLE_CACHE_KEY;
use homeroom_core::models::{Booklet, Child, TokenAccount};
use homeroom_core::{
    ApiClient, BundleCache, CacheStatus, Config, FileStore, KeyValueStore, MemoryStore, Session,
    SessionData, UserBundle,
};

/// Environment variable naming a directory for a log file
const LOG_DIR_ENV: &str = "HOMEROOM_LOG_DIR";

const USAGE: &str = "\
Usage: homeroom <command>

Commands:
  login <access_token> <user_id> [email]   Save a session from the auth provider
  logout                                   Clear the cached bundle and the session
  load                                     Load the bundle (cached copy if fresh)
  refresh                                  Fetch the bundle from the API
  status                                   Show the cached bundle's age offline
  profile                                  Print the account profile
  children                                 Print the account's children
  booklets <child_id>                      Print a child's booklets
  tokens <child_id>                        Print a child's token account
  health                                   Check that the API is reachable";

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "homeroom.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[derive(Debug, PartialEq)]
enum Command {
    Login {
        access_token: String,
        user_id: String,
        email: Option<String>,
    },
    Logout,
    Load,
    Refresh,
    Status,
    Profile,
    Children,
    Booklets(String),
    Tokens(String),
    Health,
    Help,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        let arg = |i: usize, name: &str| {
            args.get(i)
                .cloned()
                .ok_or_else(|| anyhow!("Missing <{}>\n\n{}", name, USAGE))
        };

        let command = match args.first().map(String::as_str) {
            None | Some("help") | Some("--help") | Some("-h") => Command::Help,
            Some("login") => Command::Login {
                access_token: arg(1, "access_token")?,
                user_id: arg(2, "user_id")?,
                email: args.get(3).cloned(),
            },
            Some("logout") => Command::Logout,
            Some("load") => Command::Load,
            Some("refresh") => Command::Refresh,
            Some("status") => Command::Status,
            Some("profile") => Command::Profile,
            Some("children") => Command::Children,
            Some("booklets") => Command::Booklets(arg(1, "child_id")?),
            Some("tokens") => Command::Tokens(arg(1, "child_id")?),
            Some("health") => Command::Health,
            Some(other) => bail!("Unknown command: {}\n\n{}", other, USAGE),
        };
        Ok(command)
    }
}

/// What `load`, `refresh` and `status` print.
#[derive(Debug, Serialize)]
struct BundleSummary {
    status: String,
    age: String,
    cache_timestamp: Option<i64>,
    expired: bool,
    profile: Option<String>,
    children: usize,
    booklets: usize,
    token_accounts: usize,
    recent_activity: usize,
    error: Option<String>,
}

impl BundleSummary {
    fn new(status: CacheStatus, bundle: Option<&UserBundle>, error: Option<String>) -> Self {
        Self {
            status: status.to_string(),
            age: bundle
                .map(|b| b.age_display())
                .unwrap_or_else(|| "never".to_string()),
            cache_timestamp: bundle.map(|b| b.cache_timestamp),
            expired: bundle.map(|b| b.is_expired()).unwrap_or(true),
            profile: bundle
                .and_then(|b| b.profile.as_ref())
                .map(|p| p.display_name()),
            children: bundle.map(|b| b.children.len()).unwrap_or(0),
            booklets: bundle.map(|b| b.booklets.len()).unwrap_or(0),
            token_accounts: bundle.map(|b| b.token_accounts.len()).unwrap_or(0),
            recent_activity: bundle.map(|b| b.recent_activity.len()).unwrap_or(0),
            error,
        }
    }

    fn of(cache: &BundleCache) -> Self {
        Self::new(cache.status(), cache.bundle().as_ref(), cache.error())
    }
}

/// A child as printed by `children`.
#[derive(Debug, Serialize)]
struct ChildView {
    display_name: String,
    #[serde(flatten)]
    child: Child,
}

impl From<Child> for ChildView {
    fn from(child: Child) -> Self {
        Self {
            display_name: child.display_name(),
            child,
        }
    }
}

/// A booklet as printed by `booklets`.
#[derive(Debug, Serialize)]
struct BookletView {
    display_title: String,
    progress_percentage: f64,
    #[serde(flatten)]
    booklet: Booklet,
}

impl From<Booklet> for BookletView {
    fn from(booklet: Booklet) -> Self {
        Self {
            display_title: booklet.display_title(),
            progress_percentage: booklet.progress_percentage(),
            booklet,
        }
    }
}

/// A token account as printed by `tokens`.
#[derive(Debug, Serialize)]
struct TokenAccountView {
    display_rank: String,
    #[serde(flatten)]
    account: TokenAccount,
}

impl From<TokenAccount> for TokenAccountView {
    fn from(account: TokenAccount) -> Self {
        Self {
            display_rank: account.display_rank(),
            account,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

struct Cli {
    config: Config,
    session: Session,
}

impl Cli {
    fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let mut session = Session::new(config.cache_dir()?);
        match session.load() {
            Ok(true) => debug!("Session loaded"),
            Ok(false) => debug!("No valid session found"),
            Err(e) => warn!(error = %e, "Failed to load session"),
        }

        Ok(Self { config, session })
    }

    fn api(&self) -> Result<ApiClient> {
        let mut api = ApiClient::new(&self.config.api_base_url())?;
        if let Some(token) = self.session.token() {
            api.set_token(token.to_string());
        }
        Ok(api)
    }

    fn user_id(&self) -> Result<&str> {
        self.session.user_id().ok_or_else(|| {
            anyhow!("Not signed in. Run `homeroom login <access_token> <user_id>` first.")
        })
    }

    /// The signed-in account's bundle storage. Without a usable cache
    /// location the bundle is kept in memory for this run only.
    fn store(&self) -> Result<Arc<dyn KeyValueStore>> {
        let user_id = self.user_id()?;
        match self.config.bundle_dir(user_id) {
            Ok(dir) => Ok(Arc::new(FileStore::new(dir))),
            Err(e) => {
                warn!(error = %e, "No cache directory, bundle will not be persisted");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }

    fn open_cache(&self) -> Result<BundleCache> {
        let store = self.store()?;
        Ok(BundleCache::new(Arc::new(self.api()?), store))
    }

    /// Load the bundle for a read command. A stale bundle is still printed
    /// when the refresh fails; an empty one is an error.
    async fn loaded_cache(&self) -> Result<BundleCache> {
        let cache = self.open_cache()?;
        cache.load_initial_data().await;
        if let Some(err) = cache.error() {
            if cache.bundle().is_none() {
                bail!("Failed to load data: {}", err);
            }
            eprintln!("Warning: showing cached data ({}) - {}", cache.age_display(), err);
        }
        Ok(cache)
    }

    /// Run a load or forced refresh and print the summary. The command
    /// fails when the fetch did, after printing whatever is still cached.
    async fn load(&self, force: bool) -> Result<()> {
        let cache = self.open_cache()?;
        if force {
            cache.refresh_data().await;
        } else {
            cache.load_initial_data().await;
        }
        cache.flush().await;
        print_json(&BundleSummary::of(&cache))?;
        if let Some(err) = cache.error() {
            bail!("{}", err);
        }
        Ok(())
    }

    async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Help => {
                println!("{}", USAGE);
            }
            Command::Login {
                access_token,
                user_id,
                email,
            } => {
                self.session
                    .update(SessionData::new(access_token, user_id.clone(), email.clone()));
                self.session.save()?;
                if email.is_some() {
                    self.config.last_email = email;
                    if let Err(e) = self.config.save() {
                        warn!(error = %e, "Failed to save config");
                    }
                }
                info!(user_id = %user_id, "Session saved");
                eprintln!("Signed in as {}", user_id);
            }
            Command::Logout => {
                if self.session.user_id().is_some() {
                    let cache = self.open_cache()?;
                    cache.clear_cache();
                    cache.flush().await;
                }
                self.session.clear()?;
                eprintln!("Signed out");
            }
            Command::Load => self.load(false).await?,
            Command::Refresh => self.load(true).await?,
            Command::Status => {
                // Reads the stored copy directly so no request is made
                let stored = match self.store()?.get(BUNDLE_CACHE_KEY).await {
                    Ok(json) => json.and_then(|j| serde_json::from_str::<UserBundle>(&j).ok()),
                    Err(e) => {
                        warn!(error = %e, "Failed to read cached bundle");
                        None
                    }
                };
                let status = if stored.is_some() {
                    CacheStatus::Ready
                } else {
                    CacheStatus::Empty
                };
                print_json(&BundleSummary::new(status, stored.as_ref(), None))?;
            }
            Command::Profile => {
                let cache = self.loaded_cache().await?;
                print_json(&cache.user_profile())?;
                cache.flush().await;
            }
            Command::Children => {
                let cache = self.loaded_cache().await?;
                let children: Vec<ChildView> =
                    cache.children().into_iter().map(ChildView::from).collect();
                print_json(&children)?;
                cache.flush().await;
            }
            Command::Booklets(child_id) => {
                let cache = self.loaded_cache().await?;
                let booklets: Vec<BookletView> = cache
                    .booklets_for_child(&child_id)
                    .into_iter()
                    .map(BookletView::from)
                    .collect();
                print_json(&booklets)?;
                cache.flush().await;
            }
            Command::Tokens(child_id) => {
                let cache = self.loaded_cache().await?;
                print_json(&cache.token_account(&child_id).map(TokenAccountView::from))?;
                cache.flush().await;
            }
            Command::Health => {
                let api = self.api()?;
                if api.health_check().await {
                    println!("{} is reachable", api.base_url());
                } else {
                    bail!("{} is not reachable", api.base_url());
                }
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    debug!(?command, "Running command");

    let mut cli = Cli::new()?;
    cli.run(command).await
}
