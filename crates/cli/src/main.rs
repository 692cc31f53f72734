use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hfbot")]
#[command(about = "Matrix bot answering with a hosted text-generation endpoint", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: HFBOT_CONFIG_PATH or ~/.hfbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Send one question to the inference endpoint and print the generated text.
    Ask {
        /// Config file path (default: HFBOT_CONFIG_PATH or ~/.hfbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Question substituted into the model prefix.
        question: String,
    },

    /// Connect to Matrix and answer room messages (requires the `matrix` feature).
    Run {
        /// Config file path (default: HFBOT_CONFIG_PATH or ~/.hfbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("hfbot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask { config, question }) => {
            if let Err(e) = run_ask(config, question).await {
                log::error!("ask failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config }) => {
            if let Err(e) = run_bot(config).await {
                log::error!("bot failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

fn inference_client(config: &lib::config::Config) -> anyhow::Result<lib::inference::HfInferenceClient> {
    let endpoint = lib::config::resolve_endpoint_url(config).ok_or_else(|| {
        anyhow::anyhow!("inference endpoint not configured (inference.endpointUrl or HF_ENDPOINT_URL)")
    })?;
    Ok(lib::inference::HfInferenceClient::new(
        endpoint,
        lib::config::resolve_hf_token(config),
    ))
}

async fn run_ask(config_path: Option<std::path::PathBuf>, question: String) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let client = inference_client(&config)?;
    let prompt = lib::prompt::PromptBuilder::from_config(&config);
    let conversation = lib::conversation::StoredConversation::new("cli", "ask");
    let output = prompt
        .send_chat_message(&client, &question, &conversation)
        .await?;
    println!("{}", output.generated_text.trim());
    Ok(())
}

#[cfg(feature = "matrix")]
async fn run_bot(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    use std::sync::Arc;

    let (config, path) = lib::config::load_config(config_path)?;
    let generator: Arc<dyn lib::inference::TextGeneration> = Arc::new(inference_client(&config)?);
    let channel = Arc::new(matrix_channel::MatrixChannel::connect(&config, &path).await?);

    let mut settings = lib::handler::HandlerSettings::from_config(&config);
    if settings.bot_user_id.is_none() {
        settings.bot_user_id = Some(channel.user_id().to_string());
    }
    let handler = Arc::new(lib::handler::MessageHandler::new(
        channel.clone(),
        generator,
        lib::prompt::PromptBuilder::from_config(&config),
        settings,
    ));

    log::info!("starting bot as {}", channel.user_id());
    tokio::select! {
        res = channel.run(handler, config.matrix.auto_join) => res,
        _ = tokio::signal::ctrl_c() => {
            log::info!("shutdown signal received");
            Ok(())
        }
    }
}

#[cfg(not(feature = "matrix"))]
async fn run_bot(_config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    anyhow::bail!("hfbot was built without Matrix support; rebuild with `--features matrix`")
}
