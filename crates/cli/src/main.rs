use clap::{Parser, Subcommand};
use std::io::Write;

#[derive(Parser)]
#[command(name = "assist")]
#[command(about = "Assist CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory with a default config.json and an empty tenants.json.
    Init {
        /// Config file path (default: ASSIST_CONFIG_PATH or ~/.assist/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the webhook gateway (handshake + event ingestion + reply pipeline).
    Serve {
        /// Config file path (default: ASSIST_CONFIG_PATH or ~/.assist/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 15152)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Answer one question as the tenant registered for a page id, printing the answer as it streams. Nothing is sent to the platform.
    Ask {
        /// Config file path (default: ASSIST_CONFIG_PATH or ~/.assist/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Platform identifier (page id) the question is addressed to.
        #[arg(long, value_name = "ID")]
        page: String,

        /// The customer question.
        question: String,
    },

    /// Print the questions answered for a tenant, oldest first.
    Interactions {
        /// Config file path (default: ASSIST_CONFIG_PATH or ~/.assist/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Tenant id as listed in tenants.json.
        #[arg(long, value_name = "ID")]
        tenant: String,

        /// Only show the most recent N records.
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("assist {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask {
            config,
            page,
            question,
        }) => {
            if let Err(e) = run_ask(config, &page, &question).await {
                log::error!("ask failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Interactions {
            config,
            tenant,
            limit,
        }) => {
            if let Err(e) = run_interactions(config, &tenant, limit).await {
                log::error!("reading interactions failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(assist::config::default_config_path);
    let dir = assist::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = assist::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    assist::gateway::run_gateway(config, path).await
}

async fn run_ask(
    config_path: Option<std::path::PathBuf>,
    page: &str,
    question: &str,
) -> anyhow::Result<()> {
    let (config, path) = assist::config::load_config(config_path)?;
    let pipeline = assist::pipeline::ReplyPipeline::from_config(&config, &path);
    let mut on_delta = |d: &str| {
        print!("{}", d);
        let _ = std::io::stdout().flush();
    };
    match pipeline.answer(page, question, &mut on_delta).await {
        Ok((tenant, _)) => {
            println!();
            log::info!("answered as tenant {}", tenant.tenant_id);
            Ok(())
        }
        Err(e) => {
            if let Some(reply) = e.fallback_reply() {
                println!("{}", reply);
            }
            Err(e.into())
        }
    }
}

async fn run_interactions(
    config_path: Option<std::path::PathBuf>,
    tenant: &str,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let (config, path) = assist::config::load_config(config_path)?;
    let log_path = assist::config::resolve_interactions_path(&config, &path);
    let interactions = assist::interactions::JsonlInteractionLog::new(&log_path);
    let records = interactions.for_tenant(tenant).await?;
    let skip = limit.map_or(0, |n| records.len().saturating_sub(n));
    if records.is_empty() {
        println!("no interactions recorded for {} in {}", tenant, log_path.display());
    }
    for r in records.iter().skip(skip) {
        println!("{}  {}", r.at.to_rfc3339(), r.customer_id);
        println!("  Q: {}", r.question);
        println!("  A: {}", r.answer);
    }
    Ok(())
}
