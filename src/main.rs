use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use orderbot_core::checkout::CheckoutFlow;
use orderbot_core::config::{self, Config};
use orderbot_core::provider;
use orderbot_core::service::WebhookHandler;
use orderbot_core::session::MemorySessionStore;
use orderbot_core::sink::{CsvOrderSink, MemoryConversationLog, MemoryOrderSink};
use orderbot_core::types::InboundMessage;

#[derive(Parser)]
#[command(
    name = "orderbot",
    about = "orderbot - conversational order-taking webhook",
    version = orderbot_core::VERSION,
)]
struct Cli {
    /// Config file (default: ~/.orderbot/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server
    Serve {
        /// Listen port (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Listen host
        #[arg(long)]
        host: Option<String>,
    },
    /// Talk to the bot from the terminal through the same checkout flow
    Chat {
        /// Sender id to use for the session
        #[arg(short, long)]
        sender: Option<String>,
        /// Keep orders and transcript in memory instead of writing files
        #[arg(long)]
        dry_run: bool,
    },
    /// List saved orders
    Orders {
        /// Show only the most recent N orders
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show resolved configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("orderbot=info,orderbot_core=info")),
        )
        .init();

    let cli = Cli::parse();
    if let Some(path) = &cli.config {
        std::env::set_var("ORDERBOT_CONFIG_PATH", path);
    }
    let cfg = config::load_config_from_env();

    match cli.command {
        Commands::Serve { port, host } => cmd_serve(cfg, port, host).await?,
        Commands::Chat { sender, dry_run } => cmd_chat(cfg, sender, dry_run).await?,
        Commands::Orders { limit } => cmd_orders(&cfg, limit)?,
        Commands::Status => cmd_status(&cfg),
    }

    Ok(())
}

// ====== Commands ======

#[cfg(feature = "http-api")]
async fn cmd_serve(mut cfg: Config, port: Option<u16>, host: Option<String>) -> Result<()> {
    use orderbot_core::service::http::{serve, AppState};

    if let Some(port) = port {
        cfg.gateway.port = port;
    }
    if let Some(host) = host {
        cfg.gateway.host = host;
    }

    let provider = provider::create_provider(&cfg.provider)
        .context("Set DEEPSEEK_API_KEY or provider.apiKey in the config file")?;
    let state = Arc::new(AppState::from_config(&cfg, provider));

    let addr = cfg.listen_addr();
    println!("Starting orderbot webhook on {}...", addr);
    println!("  Orders:       {}", cfg.orders_path().display());
    println!("  Conversation: {}", cfg.conversation_path().display());
    serve(&addr, state).await
}

#[cfg(not(feature = "http-api"))]
async fn cmd_serve(_cfg: Config, _port: Option<u16>, _host: Option<String>) -> Result<()> {
    anyhow::bail!("Webhook server not available. Rebuild with: cargo build --features http-api")
}

async fn cmd_chat(cfg: Config, sender: Option<String>, dry_run: bool) -> Result<()> {
    let provider = provider::create_provider(&cfg.provider)
        .context("Set DEEPSEEK_API_KEY or provider.apiKey in the config file")?;

    let handler = if dry_run {
        WebhookHandler::new(
            Arc::new(MemorySessionStore::new()),
            provider,
            Arc::new(MemoryOrderSink::new()),
            Arc::new(MemoryConversationLog::new()),
        )
        .with_flow(CheckoutFlow::from_config(&cfg.checkout))
        .with_apology(cfg.checkout.apology_text.clone())
    } else {
        WebhookHandler::from_config(&cfg, provider)
    };

    let sender = sender.unwrap_or_else(|| format!("cli:{}", uuid::Uuid::new_v4()));
    println!("orderbot chat (Ctrl+C or empty line + Ctrl+D to exit)");
    println!("  Sender: {}", sender);
    if dry_run {
        println!("  Dry run: nothing is written to disk");
    }
    println!();

    loop {
        use std::io::Write;
        print!("You: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let msg = InboundMessage::new("cli", sender.as_str(), input.trim());
        let reply = handler.handle(&msg).await;
        println!("\nBot: {}\n", reply.text);
        if let Some(order_id) = reply.order_id {
            println!("  (order {} saved)\n", order_id);
        }
    }

    Ok(())
}

fn cmd_orders(cfg: &Config, limit: Option<usize>) -> Result<()> {
    let path = cfg.orders_path();
    let orders = CsvOrderSink::load_all(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if orders.is_empty() {
        println!("No orders yet ({}).", path.display());
        return Ok(());
    }

    let skip = limit.map(|n| orders.len().saturating_sub(n)).unwrap_or(0);
    for order in orders.iter().skip(skip) {
        println!("{}  {}  {}", order.order_id, order.timestamp, order.sender_id);
        println!("    Product: {}", order.product);
        println!("    Address: {}", order.address);
        println!("    Payment: {}", order.payment_method);
    }
    println!("\n{} order(s) total", orders.len());
    Ok(())
}

fn cmd_status(cfg: &Config) {
    println!("orderbot v{}", orderbot_core::VERSION);
    println!();
    println!("Config:       {}", config::get_config_path().display());
    println!("Data dir:     {}", cfg.data_dir().display());
    println!("Orders:       {}", cfg.orders_path().display());
    println!("Conversation: {}", cfg.conversation_path().display());
    println!("Listen:       {}", cfg.listen_addr());
    println!("Model:        {}", cfg.provider.model);
    println!(
        "API key:      {}",
        if cfg.provider.api_key.is_empty() { "not set" } else { "configured" }
    );
    println!("Timeout:      {}s", cfg.provider.timeout_secs);
    if !cfg.gateway.allow_from.is_empty() {
        println!("Allow from:   {}", cfg.gateway.allow_from.join(", "));
    }
}
