// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use rezlauncher::{
    command::{self, AppState},
    config::{Backend, DatabaseSettings, LogSettings, Settings},
    launcher::{BakeRequest, Launcher},
    model::{CollectionDraft, EnvironmentVariables, PackageCollection, Stage, StageId, Tool},
    path::{default_config_path, log_file_name},
    store::{DocumentStore, MemoryStore, MongoStore},
};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, Text};
use std::{
    fs::{read_to_string, File},
    path::{Path, PathBuf},
    process::exit,
    sync::Arc,
    time::Duration,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "rezlauncher [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn load_settings(&self) -> Result<Settings> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };

        Ok(Settings::load(path)?)
    }

    async fn run(self, settings: Settings) -> Result<()> {
        if let Command::Whoami = self.command {
            return run_whoami();
        }

        let state = AppState::new(connect(&settings.database).await?);
        match self.command {
            Command::Collections(opts) => run_collections(&state, opts).await,
            Command::Stages(opts) => run_stages(&state, opts).await,
            Command::Bake(opts) => run_bake(&state, opts).await,
            Command::Revert(opts) => run_revert(&state, opts).await,
            Command::Push(opts) => run_push(&state, opts).await,
            Command::Scope(opts) => run_scope(&state, opts).await,
            Command::Whoami => run_whoami(),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Manage package collections.
    #[command(override_usage = "rezlauncher collections <collections-command>")]
    Collections(CollectionsOptions),

    /// Query stages and their history.
    #[command(override_usage = "rezlauncher stages <stages-command>")]
    Stages(StagesOptions),

    /// Bake new stage version from package collection.
    #[command(override_usage = "rezlauncher bake [options] <stage_name> <version> <uri>")]
    Bake(BakeOptions),

    /// Make older stage version active again.
    #[command(override_usage = "rezlauncher revert [options] <stage_id>")]
    Revert(RevertOptions),

    /// Copy stage configuration into another stage name.
    #[command(override_usage = "rezlauncher push [options] <stage_id>")]
    Push(PushOptions),

    /// Show everything stored under URI scope.
    #[command(override_usage = "rezlauncher scope <uri>")]
    Scope(ScopeOptions),

    /// Show name recorded as creator of new documents.
    Whoami,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CollectionsOptions {
    #[command(subcommand)]
    pub command: CollectionsCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum CollectionsCommand {
    /// List package collections in URI scope.
    List {
        #[arg(value_name = "uri")]
        uri: String,
    },

    /// List every package collection.
    All,

    /// List tools of package collection version.
    Tools {
        #[arg(value_name = "version")]
        version: String,

        #[arg(value_name = "uri")]
        uri: String,
    },

    /// Save new package collection version from TOML file.
    Save {
        #[arg(value_name = "path")]
        path: PathBuf,
    },

    /// Derive new package collection version from existing one.
    Derive {
        #[arg(value_name = "version")]
        version: String,

        #[arg(value_name = "uri")]
        uri: String,

        #[arg(value_name = "new_version")]
        new_version: String,
    },
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct StagesOptions {
    #[command(subcommand)]
    pub command: StagesCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum StagesCommand {
    /// List stages in URI scope.
    List {
        #[arg(value_name = "uri")]
        uri: String,

        /// List only active stage versions.
        #[arg(short, long)]
        active_only: bool,
    },

    /// Show full history of stage name, newest first.
    History {
        #[arg(value_name = "stage_name")]
        name: String,

        #[arg(value_name = "uri")]
        uri: String,
    },

    /// List every distinct stage name.
    Names,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BakeOptions {
    /// Stage name to bake into.
    #[arg(required = true, value_name = "stage_name")]
    pub name: String,

    /// Package collection version to bake from.
    #[arg(required = true, value_name = "version")]
    pub version: String,

    /// URI scope of package collection.
    #[arg(required = true, value_name = "uri")]
    pub uri: String,

    /// Resolved environment artifact of this bake.
    #[arg(short, long, value_name = "path", default_value = "")]
    pub rxt_path: String,

    /// Tool selection replacing the package collection's tools.
    #[arg(short, long = "tool", value_name = "tool")]
    pub tools: Vec<String>,

    /// Environment variables replacing the package collection's variables.
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env_var)]
    pub env: Vec<(String, String)>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RevertOptions {
    /// Identifier of stage version to make active.
    #[arg(required = true, value_name = "stage_id")]
    pub stage_id: String,

    /// Skip confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PushOptions {
    /// Identifier of stage version to copy.
    #[arg(required = true, value_name = "stage_id")]
    pub stage_id: String,

    /// Stage name to push into. Prompted for when omitted.
    #[arg(short, long, value_name = "stage_name")]
    pub target: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ScopeOptions {
    #[arg(required = true, value_name = "uri")]
    pub uri: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let settings = cli.load_settings();
    let logging = match &settings {
        Ok(settings) => settings.logging.clone(),
        Err(_) => LogSettings::default(),
    };
    init_tracing(&logging);

    let result = match settings {
        Ok(settings) => cli.run(settings).await,
        Err(error) => Err(error),
    };

    if let Err(error) = result {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn init_tracing(logging: &LogSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().compact().with_target(false).without_time();
    let (file, file_error) = match open_log_file(&logging.directory) {
        Ok(file) => (
            Some(fmt::layer().compact().with_ansi(false).with_writer(Arc::new(file))),
            None,
        ),
        Err(error) => (None, Some(error)),
    };
    tracing_subscriber::registry()
        .with(stderr)
        .with(file)
        .with(filter)
        .init();

    if let Some(error) = file_error {
        warn!("file logging disabled: {error:?}");
    }
}

fn open_log_file(directory: &Path) -> Result<File> {
    mkdirp::mkdirp(directory)
        .with_context(|| format!("failed to create log directory {:?}", directory.display()))?;
    let path = directory.join(log_file_name(Utc::now()));
    File::create(&path).with_context(|| format!("failed to create log file {:?}", path.display()))
}

async fn connect(settings: &DatabaseSettings) -> Result<Launcher> {
    let store: Arc<dyn DocumentStore> = match settings.backend {
        Backend::Memory => {
            warn!("memory backend selected, nothing is kept after exit");
            Arc::new(MemoryStore::new())
        }
        Backend::Mongodb => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(ProgressStyle::with_template("{spinner:.yellow} {msg}")?);
            bar.set_message(format!("connecting to database {:?}", settings.name));
            bar.enable_steady_tick(Duration::from_millis(100));
            let store = MongoStore::connect(&settings.uri, &settings.name).await;
            bar.finish_and_clear();
            Arc::new(store?)
        }
    };

    Ok(Launcher::new(store))
}

fn username() -> Result<String> {
    command::get_current_username().map_err(anyhow::Error::msg)
}

fn parse_env_var(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got {arg:?}")),
    }
}

async fn run_collections(state: &AppState, opts: CollectionsOptions) -> Result<()> {
    match opts.command {
        CollectionsCommand::List { uri } => {
            let result = command::get_package_collections_by_uri(state, uri)
                .await
                .map_err(anyhow::Error::msg)?;
            print_collection_result(result);
        }
        CollectionsCommand::All => {
            let result = command::get_all_package_collections(state)
                .await
                .map_err(anyhow::Error::msg)?;
            print_collection_result(result);
        }
        CollectionsCommand::Tools { version, uri } => {
            let tools = command::get_package_collection_tools(state, version, uri)
                .await
                .map_err(anyhow::Error::msg)?;
            for tool in tools {
                println!("{tool}");
            }
        }
        CollectionsCommand::Save { path } => {
            let data = read_to_string(&path)
                .with_context(|| format!("failed to read {:?}", path.display()))?;
            let draft: CollectionDraft = toml::de::from_str(&data)
                .with_context(|| format!("invalid package collection in {:?}", path.display()))?;
            let collection = draft.into_collection(username()?);
            let label = format!("{} in {}", collection.version, collection.uri);
            command::save_package_collection(state, collection)
                .await
                .map_err(anyhow::Error::msg)?;
            info!("saved package collection {label}");
        }
        CollectionsCommand::Derive {
            version,
            uri,
            new_version,
        } => {
            let derived =
                command::derive_package_collection(state, version, uri, new_version, username()?)
                    .await
                    .map_err(anyhow::Error::msg)?;
            print_collection(&derived);
        }
    }

    Ok(())
}

async fn run_stages(state: &AppState, opts: StagesOptions) -> Result<()> {
    match opts.command {
        StagesCommand::List { uri, active_only } => {
            let stages = command::get_stages_by_uri(state, uri.clone(), Some(active_only))
                .await
                .map_err(anyhow::Error::msg)?;
            if stages.is_empty() {
                println!("no stage found in {uri}");
            }
            for stage in &stages {
                print_stage(stage);
            }
        }
        StagesCommand::History { name, uri } => {
            let stages = command::get_stage_history(state, name.clone(), uri.clone())
                .await
                .map_err(anyhow::Error::msg)?;
            if stages.is_empty() {
                println!("stage {name:?} has no history in {uri}");
            }
            for stage in &stages {
                print_stage(stage);
            }
        }
        StagesCommand::Names => {
            let names = command::get_all_stage_names(state)
                .await
                .map_err(anyhow::Error::msg)?;
            for name in names {
                println!("{name}");
            }
        }
    }

    Ok(())
}

async fn run_bake(state: &AppState, opts: BakeOptions) -> Result<()> {
    let tools = if opts.tools.is_empty() {
        None
    } else {
        Some(opts.tools.into_iter().map(Tool::from).collect::<Vec<_>>())
    };
    let environment_variables = if opts.env.is_empty() {
        None
    } else {
        Some(opts.env.into_iter().collect::<EnvironmentVariables>())
    };

    let stage = command::bake_stage(
        state,
        BakeRequest {
            version: opts.version,
            uri: opts.uri,
            name: opts.name,
            tools,
            environment_variables,
            rxt_path: opts.rxt_path,
            created_by: username()?,
        },
    )
    .await
    .map_err(anyhow::Error::msg)?;
    print_stage(&stage);

    Ok(())
}

async fn run_revert(state: &AppState, opts: RevertOptions) -> Result<()> {
    if !opts.yes {
        let confirmed = Confirm::new(&format!("make stage {} active?", opts.stage_id))
            .with_default(false)
            .prompt()?;
        if !confirmed {
            info!("revert cancelled");
            return Ok(());
        }
    }

    command::revert_stage(state, opts.stage_id.clone())
        .await
        .map_err(anyhow::Error::msg)?;
    info!("stage {} is now active", opts.stage_id);

    Ok(())
}

async fn run_push(state: &AppState, opts: PushOptions) -> Result<()> {
    let source = state.launcher.stage(&StageId::new(opts.stage_id)).await?;
    let target = match opts.target {
        Some(target) => target,
        None => Text::new("push to stage name:")
            .with_default(&source.name)
            .prompt()?,
    };

    let pushed = command::push_stage(state, source, target, username()?)
        .await
        .map_err(anyhow::Error::msg)?;
    print_stage(&pushed);

    Ok(())
}

async fn run_scope(state: &AppState, opts: ScopeOptions) -> Result<()> {
    let listing = command::browse_scope(state, opts.uri)
        .await
        .map_err(anyhow::Error::msg)?;
    if listing.is_empty() {
        println!("nothing stored in {}", listing.uri);
        return Ok(());
    }

    for collection in &listing.collections {
        print_collection(collection);
    }
    for stage in &listing.stages {
        print_stage(stage);
    }

    Ok(())
}

fn run_whoami() -> Result<()> {
    println!("{}", username()?);
    Ok(())
}

fn print_collection_result(result: command::PackageCollectionResult) {
    if let Some(message) = result.message {
        println!("{message}");
    }
    for collection in result.collections.unwrap_or_default() {
        print_collection(&collection);
    }
}

fn print_collection(collection: &PackageCollection) {
    println!(
        "{} {} [{}] by {} at {}",
        collection.version,
        collection.uri,
        collection.packages.join(" "),
        collection.created_by,
        collection.created_at.to_rfc3339()
    );
}

fn print_stage(stage: &Stage) {
    let marker = if stage.active { "*" } else { " " };
    let id = stage.id.as_ref().map(StageId::as_str).unwrap_or("-");
    println!(
        "{marker} {id} {} {} from {} by {} at {}",
        stage.name,
        stage.uri,
        stage.from_version,
        stage.created_by,
        stage.created_at.to_rfc3339()
    );
}
