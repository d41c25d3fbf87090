//! CLI commands

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use meditrack_client::chat::Sender;
use meditrack_client::{
    AccessStatus, ApiClient, ApiClientBuilder, CallbackRedirect, ChatSession, ClientConfig,
    FileTokenStore, Method, PendingRequest, RegisterRequest, StateDir, TokenStore,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::config;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "MEDITRACK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Create a new account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "MEDITRACK_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        address: String,
        /// Extra profile fields as key=value
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Show whether the stored session is usable
    Status,

    /// Send an authenticated request and print the JSON response
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,

        /// Path below the API base URL, e.g. /api/profile/
        path: String,

        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },

    /// Print the chat transcript
    History,

    /// Chat with the assistant, one message per line
    Chat,

    /// Configuration file management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default configuration file
    Init {
        /// Output file path (defaults to the state directory)
        output: Option<PathBuf>,
    },
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

/// Everything a command needs to talk to the portal
pub struct AppContext {
    pub config: ClientConfig,
    pub state_dir: StateDir,
    pub client: ApiClient,
    pub store: Arc<dyn TokenStore>,
    session_expired: Arc<AtomicBool>,
}

impl AppContext {
    pub fn new(config: ClientConfig, state_dir: StateDir) -> Result<Self> {
        let store: Arc<dyn TokenStore> = Arc::new(
            FileTokenStore::open(state_dir.tokens_path()).context("Failed to open token store")?,
        );

        let session_expired = Arc::new(AtomicBool::new(false));
        let flag = session_expired.clone();
        let login_path = config.login_path.clone();
        let redirect = CallbackRedirect::new(move || {
            warn!(target = %login_path, "Session expired, redirecting to login");
            flag.store(true, Ordering::SeqCst);
        });

        let client = ApiClientBuilder::from_config(&config)
            .store(store.clone())
            .redirect(Arc::new(redirect))
            .build()?;

        Ok(Self {
            config,
            state_dir,
            client,
            store,
            session_expired,
        })
    }

    /// Whether a call during this run tore the session down
    pub fn session_expired(&self) -> bool {
        self.session_expired.load(Ordering::SeqCst)
    }
}

impl Commands {
    /// Commands that run until the user stops them
    pub const fn is_interactive(&self) -> bool {
        matches!(self, Self::Chat)
    }

    pub async fn execute(self, ctx: &AppContext) -> Result<()> {
        match self {
            Self::Login { username, password } => {
                let login = ctx.client.login(&username, &password).await?;
                match login.role() {
                    Some(role) => println!("Logged in as {username} ({role})"),
                    None => println!("Logged in as {username}"),
                }
                Ok(())
            }
            Self::Logout => {
                ctx.client.logout();
                println!("Logged out");
                Ok(())
            }
            Self::Register {
                username,
                email,
                password,
                phone,
                address,
                fields,
            } => {
                let registration = RegisterRequest {
                    username,
                    email,
                    password,
                    phone,
                    address,
                    profile: fields.into_iter().collect(),
                };
                let created = ctx.client.register(&registration).await?;
                println!("{}", serde_json::to_string_pretty(&created)?);
                Ok(())
            }
            Self::Status => status(ctx).await,
            Self::Request { method, path, data } => request(ctx, &method, &path, data).await,
            Self::History => {
                for message in ctx.client.chat_history().await? {
                    println!("{}: {}", speaker(message.sender), message.text);
                }
                Ok(())
            }
            Self::Chat => chat(ctx).await,
            Self::Config { command } => command.execute(ctx),
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, ctx: &AppContext) -> Result<()> {
        match self {
            Self::Init { output } => {
                let path = output.unwrap_or_else(|| ctx.state_dir.config_path());
                config::save_client_config(&ctx.config, &path)?;
                println!("Generated configuration at: {}", path.display());
                Ok(())
            }
        }
    }
}

const fn speaker(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "you",
        Sender::Assistant => "assistant",
    }
}

async fn status(ctx: &AppContext) -> Result<()> {
    match ctx.client.check_access().await {
        AccessStatus::Authorized => {
            let role = ctx
                .client
                .role()
                .map_or_else(|| "unknown role".to_string(), |r| r.to_string());
            println!("Signed in ({role})");
            Ok(())
        }
        AccessStatus::Unauthorized => bail!("Not signed in. Run `meditrack login` first."),
    }
}

async fn request(ctx: &AppContext, method: &str, path: &str, data: Option<String>) -> Result<()> {
    let method = method
        .to_uppercase()
        .parse::<Method>()
        .with_context(|| format!("Invalid HTTP method: {method}"))?;

    let mut request = PendingRequest::new(method, path);
    if let Some(raw) = data {
        let body: Value = serde_json::from_str(&raw).context("--data is not valid JSON")?;
        request = request.json(&body)?;
    }

    let response = ctx.client.send(request).await?;
    let text = response.text().await?;
    if text.is_empty() {
        println!("(no content)");
    } else {
        match serde_json::from_str::<Value>(&text) {
            Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
            Err(_) => println!("{text}"),
        }
    }
    Ok(())
}

async fn chat(ctx: &AppContext) -> Result<()> {
    for message in ctx.client.chat_history().await? {
        println!("{}: {}", speaker(message.sender), message.text);
    }

    let mut session = ChatSession::connect(&ctx.config, ctx.store.clone()).await?;
    info!("Chat connected, type a message and press enter (Ctrl-D to quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if !session.is_connected() {
            warn!("Chat connection lost, reconnecting");
            session.reconnect().await?;
        }
        session.send(&line)?;

        let Some(reply) = session.next_reply().await else {
            warn!("Chat connection closed before a reply arrived");
            continue;
        };
        let message = reply.into_message();
        println!("{}: {}", speaker(message.sender), message.text);
    }

    session.close().await;
    Ok(())
}
