use std::collections::HashSet;
use std::error::Error;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use futures::StreamExt;
use tokio::signal;
use tokio::sync::mpsc;

use portfolio_chat::chat::conversations::resolve_counterparts;
use portfolio_chat::chat::{
    ChatWorker, Composer, Conversation, IdentityResolver, Session, SessionProvider,
    mark_all_read, mark_read, subscribe_conversation,
};
use portfolio_chat::common::{ChatMessage, DirectoryEntry, Identity};
use portfolio_chat::config::{self, AppConfig};
use portfolio_chat::storage::{self, MessageStore};
use portfolio_chat::ui::ChatApp;
use portfolio_chat::ChatError;

const ENV_USER: &str = "CHAT_USER";

#[derive(Parser)]
#[command(
    name = "portfolio-chat",
    version,
    about = "Visitor/administrator chat for the portfolio site"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Signed-in user id [env: CHAT_USER]; omitted means Guest
    #[arg(long, short = 'u')]
    user: Option<String>,
    /// Print records as JSON
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Send a message (administrators must pass --to)
    Send {
        #[arg(long)]
        to: Option<String>,
        text: String,
    },
    /// Follow a conversation until Ctrl-C
    Watch {
        /// Counterpart to follow (administrators only)
        #[arg(long)]
        with: Option<String>,
    },
    /// List visitors who wrote in
    Conversations,
    /// Show the unread message count
    Unread,
    /// Flag one message as read
    MarkRead { id: String },
    /// Flag every message as read
    MarkAllRead,
    /// Register a user directory entry
    AddUser {
        id: String,
        #[arg(long)]
        email: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    // Khởi tạo Logger để debug
    env_logger::init();

    let cli = Cli::parse();
    let app_config = config::load_config_with_env(&cli.config);

    storage::ensure_data_dir(&app_config.database_path)?;
    let store = MessageStore::open(&app_config.database_path)?;

    let sessions = SessionProvider::new(
        cli.user
            .clone()
            .or_else(|| std::env::var(ENV_USER).ok())
            .map(Session::new),
    );
    let resolver = IdentityResolver::new(app_config.admin_ids.iter().cloned());
    let identity = resolver.resolve(sessions.current().as_ref());
    log::info!(
        "Running as {} (admin: {})",
        identity.id,
        identity.is_admin
    );

    match cli.command {
        None => run_window(store, identity, resolver, &app_config, &sessions).await?,
        Some(Command::Send { to, text }) => {
            let recipient = recipient_for(&identity, &app_config, to)?;
            let mut composer = Composer::new(store, identity, Some(recipient));
            composer.draft_mut().push_str(&text);
            match composer.submit().await? {
                Some(message) => print_message(&message, cli.json)?,
                None => log::warn!("Nothing to send"),
            }
        }
        Some(Command::Watch { with }) => {
            let counterpart = recipient_for(&identity, &app_config, with)?;
            let conversation = Conversation::between(&identity, &counterpart, &resolver);
            watch_conversation(&store, conversation, cli.json).await?;
        }
        Some(Command::Conversations) => {
            let admin = resolver.require_admin(sessions.current().as_ref())?;
            let admin_ids = resolver.admin_ids().map(str::to_string).collect();
            log::debug!("Listing conversations for {}", admin.id);
            for counterpart in resolve_counterparts(&store, &admin_ids).await? {
                if cli.json {
                    println!("{}", serde_json::to_string(&counterpart)?);
                } else {
                    println!("{}\t{}", counterpart.identity, counterpart.label);
                }
            }
        }
        Some(Command::Unread) => {
            let unread = store.unread_count().await?;
            let total = store.message_count().await?;
            println!("Total Messages: {total} | Unread: {unread}");
        }
        Some(Command::MarkRead { id }) => mark_read(&store, &identity, &id).await?,
        Some(Command::MarkAllRead) => {
            let updated = mark_all_read(&store, &identity).await?;
            println!("Marked {updated} messages as read");
        }
        Some(Command::AddUser { id, email }) => {
            store.upsert_user(&DirectoryEntry { id, email }).await?;
        }
    }

    Ok(())
}

/// Visitors always write to the primary administrator; administrators
/// must name the counterpart.
fn recipient_for(
    identity: &Identity,
    config: &AppConfig,
    requested: Option<String>,
) -> Result<String, ChatError> {
    if identity.is_admin {
        requested.ok_or(ChatError::NoCounterpart)
    } else {
        config
            .primary_admin()
            .map(str::to_string)
            .ok_or(ChatError::NoCounterpart)
    }
}

async fn watch_conversation(
    store: &MessageStore,
    conversation: Conversation,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let mut stream = subscribe_conversation(store, conversation);
    let mut seen = HashSet::new();

    loop {
        tokio::select! {
            update = stream.next() => {
                match update {
                    Some(Ok(messages)) => {
                        for message in messages {
                            if seen.insert(message.id.clone()) {
                                print_message(&message, json)?;
                            }
                        }
                    }
                    Some(Err(err)) => log::warn!("Conversation unavailable: {err}"),
                    None => break,
                }
            }
            _ = signal::ctrl_c() => {
                log::info!("Received shutdown signal, stopping watch...");
                break;
            }
        }
    }

    stream.unsubscribe();
    Ok(())
}

fn print_message(message: &ChatMessage, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string(message)?);
    } else {
        println!(
            "[{}] {}: {}",
            portfolio_chat::ui::state::format_time(message.created_at),
            message.sender,
            message.text
        );
    }
    Ok(())
}

async fn run_window(
    store: MessageStore,
    identity: Identity,
    resolver: IdentityResolver,
    config: &AppConfig,
    sessions: &SessionProvider,
) -> Result<(), Box<dyn Error>> {
    // 1. Tạo các kênh giao tiếp (Channels)
    // UI -> Worker
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // Worker -> UI
    let (event_tx, event_rx) = mpsc::channel(100);

    // 2. Khởi chạy chat worker (Chạy ngầm)
    let worker = ChatWorker::new(
        store,
        resolver,
        config.primary_admin().map(str::to_string),
        sessions.changes(),
        event_tx,
        cmd_rx,
    );
    tokio::spawn(worker.run());

    // 3. Khởi chạy UI (Chạy trên Main Thread)
    let options = eframe::NativeOptions::default();

    eframe::run_native(
        "Portfolio Chat",
        options,
        Box::new(move |cc| {
            log::info!("Chat window opened for {}", identity.id);

            Ok(Box::new(ChatApp::new(cc, identity, cmd_tx, event_rx)))
        }),
    )?;

    Ok(())
}
