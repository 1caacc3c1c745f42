use anyhow::Context;
use clap::{Parser, Subcommand};
use parley::channels::{Connector, ConnectorRegistry};
use parley::choice::{self, Parameters};
use parley::content::{MessageParts, ResponseContent};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Translate channel payloads to generic events and back", long_about = None)]
struct Cli {
    /// Config file path (default: PARLEY_CONFIG_PATH or ~/.parley/config.json)
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init,

    /// List enabled connectors and their payload limits.
    Connectors,

    /// Parse a raw inbound body into a generic event (printed as JSON).
    Inbound {
        /// Connector id (e.g. "web", "slack")
        #[arg(long)]
        connector: String,

        /// Application (bot) id the event is addressed to
        #[arg(long, value_name = "ID")]
        app_id: String,

        /// Read the body from this file instead of stdin
        #[arg(long, short, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Serialize a JSON array of generic messages into the connector's wire envelope.
    Outbound {
        #[arg(long)]
        connector: String,

        #[arg(long, short, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Read a connector wire envelope back into generic messages.
    Rehydrate {
        #[arg(long)]
        connector: String,

        #[arg(long, short, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Encode or decode choice tokens.
    Choice {
        #[command(subcommand)]
        action: ChoiceAction,
    },
}

#[derive(Subcommand)]
enum ChoiceAction {
    /// Encode an intent and parameters into a token.
    Encode {
        intent: String,

        /// Parameter as key=value; repeat to add more (order is kept)
        #[arg(long = "param", short, value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Refuse tokens longer than this many bytes
        #[arg(long)]
        max_len: Option<usize>,
    },

    /// Decode a token into its intent and parameters.
    Decode { token: String },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("parley {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Init) => run_init(cli.config),
        Some(Commands::Connectors) => run_connectors(cli.config),
        Some(Commands::Inbound {
            connector,
            app_id,
            file,
        }) => run_inbound(cli.config, &connector, &app_id, file),
        Some(Commands::Outbound { connector, file }) => run_outbound(cli.config, &connector, file),
        Some(Commands::Rehydrate { connector, file }) => {
            run_rehydrate(cli.config, &connector, file)
        }
        Some(Commands::Choice { action }) => run_choice(action),
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(parley::config::default_config_path);
    let dir = parley::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

fn load_registry(config_path: Option<PathBuf>) -> anyhow::Result<ConnectorRegistry> {
    let (config, path) = parley::config::load_config(config_path)?;
    log::debug!("loaded config from {}", path.display());
    Ok(ConnectorRegistry::from_config(&config))
}

fn connector(config_path: Option<PathBuf>, id: &str) -> anyhow::Result<Arc<dyn Connector>> {
    let registry = load_registry(config_path)?;
    registry.get(id).with_context(|| {
        format!(
            "unknown or disabled connector {:?} (enabled: {})",
            id,
            registry.ids().join(", ")
        )
    })
}

fn read_input(file: Option<PathBuf>) -> anyhow::Result<Vec<u8>> {
    match file {
        Some(path) => {
            std::fs::read(&path).with_context(|| format!("reading {}", path.display()))
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_connectors(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let registry = load_registry(config_path)?;
    for id in registry.ids() {
        let limit = registry
            .get(&id)
            .and_then(|c| c.max_payload_len())
            .map(|n| format!("{} bytes", n))
            .unwrap_or_else(|| "unlimited".to_string());
        println!("{}\tmax payload: {}", id, limit);
    }
    Ok(())
}

fn run_inbound(
    config_path: Option<PathBuf>,
    connector_id: &str,
    app_id: &str,
    file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let connector = connector(config_path, connector_id)?;
    let raw = read_input(file)?;
    let event = connector.parse(&raw, app_id)?;
    print_json(&event)
}

fn run_outbound(
    config_path: Option<PathBuf>,
    connector_id: &str,
    file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let connector = connector(config_path, connector_id)?;
    let raw = read_input(file)?;
    let parts: Vec<MessageParts> =
        serde_json::from_slice(&raw).context("parsing messages (expected a JSON array)")?;
    let contents = parts
        .into_iter()
        .map(MessageParts::build)
        .collect::<parley::Result<Vec<ResponseContent>>>()?;
    print_json(&connector.serialize_responses(&contents)?)
}

fn run_rehydrate(
    config_path: Option<PathBuf>,
    connector_id: &str,
    file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let connector = connector(config_path, connector_id)?;
    let raw = read_input(file)?;
    let wire: serde_json::Value = serde_json::from_slice(&raw).context("parsing wire JSON")?;
    let parts: Vec<MessageParts> = connector
        .deserialize_responses(&wire)?
        .iter()
        .map(MessageParts::from)
        .collect();
    print_json(&parts)
}

fn parse_params(raw: &[String]) -> anyhow::Result<Parameters> {
    let mut params = Parameters::new();
    for p in raw {
        let (k, v) = p
            .split_once('=')
            .with_context(|| format!("parameter {:?} is not key=value", p))?;
        if params.insert(k, v).is_some() {
            anyhow::bail!("parameter {:?} given twice", k);
        }
    }
    Ok(params)
}

fn run_choice(action: ChoiceAction) -> anyhow::Result<()> {
    match action {
        ChoiceAction::Encode {
            intent,
            params,
            max_len,
        } => {
            let params = parse_params(&params)?;
            println!("{}", choice::encode_bounded(&intent, &params, max_len)?);
        }
        ChoiceAction::Decode { token } => {
            let (intent, params) = choice::decode(&token)?;
            print_json(&serde_json::json!({ "intent": intent, "parameters": params }))?;
        }
    }
    Ok(())
}
