/// Version injected at compile time via ISAMCFG_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("ISAMCFG_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use isamcfg::appliance::{format_appliance_error, ApplianceClient};
use isamcfg::compare::{format_text, DiffEntry};
use isamcfg::config::{ApplianceProfile, Config};
use isamcfg::modules::certificates::{self, CertKind};
use isamcfg::modules::{junctions, pending_changes, snapshots};
use isamcfg::resource::operations::{self, key_from_str};
use isamcfg::resource::{get_all_resource_keys, get_resource, get_service_resource_keys, CallOptions, Endpoint, PathParams};
use isamcfg::state::{self, StateDocument};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Idempotent configuration for Verify Access appliances
#[derive(Parser, Debug)]
#[command(name = "isamcfg", version, about, long_about = None)]
struct Args {
    /// Appliance profile from the config file
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Appliance hostname (overrides the profile)
    #[arg(long, global = true)]
    hostname: Option<String>,

    /// Management port (overrides the profile)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Management user (overrides the profile)
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Verify the appliance's TLS certificate
    #[arg(long, global = true)]
    verify_tls: bool,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Report what would change without changing anything
    #[arg(long, global = true)]
    check: bool,

    /// Skip the idempotency check
    #[arg(long, global = true)]
    force: bool,

    /// Report HTTP failures in the result instead of failing
    #[arg(long, global = true)]
    ignore_error: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List known resource types
    Resources {
        /// Only show one service (system, wga, aac, ssl)
        service: Option<String>,
    },
    /// Show firmware version and activated modules
    Facts,
    /// Retrieve a resource (all objects, or one by id)
    Get {
        resource: String,
        id: Option<String>,
        /// URI parameter, name=value
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
    },
    /// Find an object's id by its key fields (field=value)
    Search {
        resource: String,
        #[arg(required = true)]
        key: Vec<String>,
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
    },
    /// Create or update an object from a YAML/JSON document
    Set {
        resource: String,
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
    },
    /// Delete an object by key value, or by a YAML/JSON key document
    Delete {
        resource: String,
        key: Option<String>,
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
    },
    /// Compare a resource with another appliance profile
    Compare {
        resource: String,
        /// Profile of the appliance to compare against
        #[arg(long = "with")]
        other: String,
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
    },
    /// Converge the appliance to a desired-state document
    Apply { file: PathBuf },
    /// Show pending changes
    Pending,
    /// Deploy (or discard) pending changes
    Deploy {
        #[arg(long)]
        discard: bool,
    },
    #[command(subcommand)]
    Snapshot(SnapshotCommand),
    #[command(subcommand)]
    Junction(JunctionCommand),
    #[command(subcommand)]
    Cert(CertCommand),
    /// Save an appliance profile
    Profile {
        name: String,
        /// Appliance hostname or address
        address: String,
        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SnapshotCommand {
    List,
    Create { comment: String },
    Download {
        ids: Vec<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    Upload {
        file: PathBuf,
        #[arg(long)]
        comment: Option<String>,
    },
    Apply { id: String },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum JunctionCommand {
    List { instance: String },
    Get { instance: String, junction_point: String },
    Set {
        instance: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    Delete { instance: String, junction_point: String },
}

#[derive(Subcommand, Debug)]
enum CertCommand {
    /// List certificate databases, or certificates in one
    List {
        kdb_id: Option<String>,
        #[arg(long, default_value = "signer")]
        kind: CertKind,
    },
    Import {
        kdb_id: String,
        label: String,
        file: PathBuf,
        #[arg(long, default_value = "signer")]
        kind: CertKind,
        /// PKCS#12 password, read from ISAMCFG_CERT_PASSWORD when omitted
        #[arg(long, env = "ISAMCFG_CERT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Delete {
        kdb_id: String,
        label: String,
        #[arg(long, default_value = "signer")]
        kind: CertKind,
    },
    Export {
        kdb_id: String,
        label: String,
        output: PathBuf,
        #[arg(long, default_value = "signer")]
        kind: CertKind,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("isamcfg {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("isamcfg").join("isamcfg.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".isamcfg").join("isamcfg.log");
    }
    PathBuf::from("isamcfg.log")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Warning: {:#}", err);
            None
        },
    };

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        eprintln!("Error: {}", format_appliance_error(&err));
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load();
    let opts = CallOptions {
        check_mode: args.check,
        force: args.force,
        ignore_error: args.ignore_error,
    };

    match &args.command {
        Command::Resources { service } => {
            let keys = match service {
                Some(s) => get_service_resource_keys(s),
                None => get_all_resource_keys(),
            };
            for key in keys {
                if let Some(def) = get_resource(key) {
                    println!("{:<28} {:<8} {}", key, def.service, def.display_name);
                }
            }
            Ok(())
        },
        Command::Profile { name, address, default } => {
            let mut profile = ApplianceProfile::new(address);
            if let Some(port) = args.port {
                profile.port = port;
            }
            profile.username = args.username.clone();
            profile.verify_tls = args.verify_tls;
            profile.timeout_secs = args.timeout;
            if *default {
                config.default_profile = Some(name.clone());
            }
            config.set_profile(name, profile)?;
            println!("Saved profile '{}'", name);
            Ok(())
        },
        command => {
            let client = connect(&args, &config, args.profile.as_deref())?;
            dispatch(command, &client, &args, &config, opts).await
        },
    }
}

async fn dispatch(
    command: &Command,
    client: &ApplianceClient,
    args: &Args,
    config: &Config,
    opts: CallOptions,
) -> Result<()> {
    match command {
        Command::Facts => print_json(&client.facts().await?),
        Command::Get { resource, id, params } => {
            let endpoint = Endpoint::lookup(resource, PathParams::parse_pairs(params)?)?;
            let response = match id {
                Some(id) => operations::get(client, &endpoint, Some(id), opts).await?,
                None => operations::get_all(client, &endpoint, opts).await?,
            };
            print_json(&response)
        },
        Command::Search { resource, key, params } => {
            let endpoint = Endpoint::lookup(resource, PathParams::parse_pairs(params)?)?;
            let pairs = PathParams::parse_pairs(key)?;
            let mut key_doc = Map::new();
            for field in endpoint.def.key_fields() {
                if let Some(value) = pairs.get(field) {
                    key_doc.insert(field.to_string(), Value::String(value.to_string()));
                }
            }
            match operations::search(client, &endpoint, &key_doc).await? {
                Some(id) => println!("{}", id),
                None => anyhow::bail!("No {} matches {}", endpoint.describe(), Value::Object(key_doc)),
            }
            Ok(())
        },
        Command::Set { resource, file, params } => {
            let endpoint = Endpoint::lookup(resource, PathParams::parse_pairs(params)?)?;
            let body = load_document(file)?;
            print_json(&operations::set(client, &endpoint, &body, opts).await?)
        },
        Command::Delete {
            resource,
            key,
            file,
            params,
        } => {
            let endpoint = Endpoint::lookup(resource, PathParams::parse_pairs(params)?)?;
            let key = match (key, file) {
                (_, Some(file)) => load_document(file)?,
                (Some(key), None) => key_from_str(endpoint.def, key)?,
                (None, None) => anyhow::bail!("Give a key value or --file"),
            };
            print_json(&operations::delete(client, &endpoint, &key, opts).await?)
        },
        Command::Compare { resource, other, params } => {
            let endpoint = Endpoint::lookup(resource, PathParams::parse_pairs(params)?)?;
            let other_client = connect_profile(config, other, args.timeout)?;
            let response = operations::compare(client, &other_client, &endpoint).await?;
            print_json(&response)?;
            let entries: Vec<DiffEntry> = response
                .data
                .get("differences")
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();
            if !entries.is_empty() {
                eprintln!("{}", format_text(&entries));
            }
            Ok(())
        },
        Command::Apply { file } => {
            let document = StateDocument::load(file)?;
            print_json(&state::apply(client, &document, opts).await?)
        },
        Command::Pending => print_json(&pending_changes::get(client).await?),
        Command::Deploy { discard } => {
            let response = if *discard {
                pending_changes::discard(client, opts).await?
            } else {
                pending_changes::deploy(client, opts).await?
            };
            print_json(&response)
        },
        Command::Snapshot(cmd) => snapshot_command(cmd, client, opts).await,
        Command::Junction(cmd) => junction_command(cmd, client, opts).await,
        Command::Cert(cmd) => cert_command(cmd, client, opts).await,
        Command::Resources { .. } | Command::Profile { .. } => Ok(()),
    }
}

async fn snapshot_command(cmd: &SnapshotCommand, client: &ApplianceClient, opts: CallOptions) -> Result<()> {
    let response = match cmd {
        SnapshotCommand::List => snapshots::get_all(client).await?,
        SnapshotCommand::Create { comment } => snapshots::create(client, comment, opts).await?,
        SnapshotCommand::Download { ids, output } => {
            let target = output.clone().unwrap_or_else(snapshots::default_download_name);
            snapshots::download(client, ids, &target).await?
        },
        SnapshotCommand::Upload { file, comment } => {
            snapshots::upload(client, file, comment.as_deref(), opts).await?
        },
        SnapshotCommand::Apply { id } => snapshots::apply(client, id, opts).await?,
        SnapshotCommand::Delete { id } => snapshots::delete(client, id, opts).await?,
    };
    print_json(&response)
}

async fn junction_command(cmd: &JunctionCommand, client: &ApplianceClient, opts: CallOptions) -> Result<()> {
    let response = match cmd {
        JunctionCommand::List { instance } => junctions::get_all(client, instance).await?,
        JunctionCommand::Get {
            instance,
            junction_point,
        } => junctions::get(client, instance, junction_point, opts).await?,
        JunctionCommand::Set { instance, file } => {
            let junction: junctions::Junction =
                serde_json::from_value(load_document(file)?).context("Invalid junction definition")?;
            junctions::set(client, instance, &junction, opts).await?
        },
        JunctionCommand::Delete {
            instance,
            junction_point,
        } => junctions::delete(client, instance, junction_point, opts).await?,
    };
    print_json(&response)
}

async fn cert_command(cmd: &CertCommand, client: &ApplianceClient, opts: CallOptions) -> Result<()> {
    let response = match cmd {
        CertCommand::List { kdb_id: None, .. } => certificates::get_databases(client).await?,
        CertCommand::List {
            kdb_id: Some(kdb_id),
            kind,
        } => certificates::get_all(client, *kind, kdb_id).await?,
        CertCommand::Import {
            kdb_id,
            label,
            file,
            kind,
            password,
        } => certificates::import(client, *kind, kdb_id, label, file, password.as_deref(), opts).await?,
        CertCommand::Delete { kdb_id, label, kind } => {
            certificates::delete(client, *kind, kdb_id, label, opts).await?
        },
        CertCommand::Export {
            kdb_id,
            label,
            output,
            kind,
        } => certificates::export(client, *kind, kdb_id, label, output).await?,
    };
    print_json(&response)
}

/// Build the client from the profile, with CLI flags taking precedence
fn connect(args: &Args, config: &Config, profile: Option<&str>) -> Result<ApplianceClient> {
    let mut profile = match (config.profile(profile), profile) {
        (Some(p), _) => p.clone(),
        (None, Some(name)) if args.hostname.is_none() => anyhow::bail!("No profile named '{}'", name),
        (None, _) => match &args.hostname {
            Some(hostname) => ApplianceProfile::new(hostname),
            None => anyhow::bail!("No appliance configured. Use --hostname or `isamcfg profile`"),
        },
    };

    if let Some(hostname) = &args.hostname {
        profile.hostname = hostname.clone();
    }
    if let Some(port) = args.port {
        profile.port = port;
    }
    if args.username.is_some() {
        profile.username = args.username.clone();
    }
    if args.verify_tls {
        profile.verify_tls = true;
    }
    if args.timeout.is_some() {
        profile.timeout_secs = args.timeout;
    }

    tracing::debug!("Connecting to {}:{}", profile.hostname, profile.port);
    profile.connect()
}

fn connect_profile(config: &Config, name: &str, timeout: Option<u64>) -> Result<ApplianceClient> {
    let mut profile = config
        .profile(Some(name))
        .with_context(|| format!("No profile named '{}'", name))?
        .clone();
    if timeout.is_some() {
        profile.timeout_secs = timeout;
    }
    profile.connect()
}

/// Read a YAML or JSON document
fn load_document(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
