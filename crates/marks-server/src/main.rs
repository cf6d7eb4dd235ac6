//! marks-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the mark endpoints over HTTP. The
//! remaining subcommands provision users and posts in the same store.
//!
//! ```
//! cargo run -p marks-server -- add-user alice
//! cargo run -p marks-server -- add-post "Hello" "First post"
//! cargo run -p marks-server -- serve
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use marks_core::{post::NewPost, store::MarkStore, user::NewUser};
use marks_server::{ServerConfig, app, hash_password, open_store};
use marks_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Post marks server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
  #[command(flatten)]
  Store(StoreCommand),
}

/// Subcommands that open the configured store.
#[derive(Subcommand)]
enum StoreCommand {
  /// Serve HTTP (the default).
  Serve,
  /// Create a user; the password is read from stdin.
  AddUser { username: String },
  /// Create a post and print its id.
  AddPost { title: String, body: String },
  /// Delete a post and all of its marks.
  DeletePost { id: Uuid },
  /// Delete a user and all of their marks.
  DeleteUser { id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  match cli.command.unwrap_or(Command::Store(StoreCommand::Serve)) {
    Command::HashPassword => println!("{}", hash_password(&read_password()?)?),
    Command::Store(command) => {
      let server_cfg = ServerConfig::load(&cli.config)?;
      let store = open_store(&server_cfg).await?;
      run(command, &server_cfg, store).await?;
    }
  }

  Ok(())
}

/// Execute a subcommand that needs the store.
async fn run(
  command: StoreCommand,
  server_cfg: &ServerConfig,
  store: SqliteStore,
) -> anyhow::Result<()> {
  match command {
    StoreCommand::Serve => serve(server_cfg, store).await?,
    StoreCommand::AddUser { username } => {
      let password_hash = hash_password(&read_password()?)?;
      let user = store
        .add_user(NewUser { username, password_hash })
        .await
        .context("failed to add user")?;
      tracing::info!(user_id = %user.user_id, username = %user.username, "added user");
      println!("{}", user.user_id);
    }
    StoreCommand::AddPost { title, body } => {
      let post = store
        .add_post(NewPost::new(title, body))
        .await
        .context("failed to add post")?;
      println!("{}", post.post_id);
    }
    StoreCommand::DeletePost { id } => {
      if !store.delete_post(id).await.context("failed to delete post")? {
        anyhow::bail!("no post with id {id}");
      }
    }
    StoreCommand::DeleteUser { id } => {
      if !store.delete_user(id).await.context("failed to delete user")? {
        anyhow::bail!("no user with id {id}");
      }
    }
  }

  Ok(())
}

async fn serve(server_cfg: &ServerConfig, store: SqliteStore) -> anyhow::Result<()> {
  let app = app(server_cfg, Arc::new(store));
  let address = server_cfg.address();

  tracing::info!(upsert_key = ?server_cfg.upsert_key, "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
