//! actuate - run one catalog action against a fixture store
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`ACTUATE_*`)
//! 3. Project config (`.actuate/config.toml` under the project root)
//! 4. Global config (`~/.actuate/config.toml`)
//! 5. Default values (lowest priority)
//!
//! # Output
//!
//! Prints `{"responses": [...]}` to stdout, plus an `error` object when the
//! action failed. Logs go to stderr.
//!
//! | Exit code | Meaning |
//! |-----------|---------|
//! | 0 | action committed |
//! | 1 | action failed and rolled back |
//! | 2 | bad arguments, config, catalog or fixture |

use actuate_action::config::{ActuateConfig, ConfigLoader, ConfigResolver};
use actuate_action::memory::{Fixture, MemoryStore};
use actuate_action::{ActionCatalog, ActionEngine, ActionRequest, TokioWorkQueue, WorkQueue};
use actuate_auth::Actor;
use actuate_types::{ErrorCode, GroupId, ReferenceId};
use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Run one action from a catalog against an in-memory fixture store
#[derive(Parser, Debug)]
#[command(name = "actuate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Project root directory (defaults to current directory)
    #[arg(short = 'C', long)]
    project: Option<PathBuf>,

    /// Action catalog (`.json` or `.toml`)
    #[arg(long, env = "ACTUATE_CATALOG")]
    catalog: PathBuf,

    /// Store fixture (JSON); an empty store when omitted
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Table the action is declared on
    #[arg(long = "type", value_name = "TABLE")]
    on_type: String,

    /// Action name
    #[arg(long)]
    action: String,

    /// Request attribute as KEY=VALUE (repeatable)
    #[arg(long = "attr", value_name = "KEY=VALUE")]
    attributes: Vec<String>,

    /// Raw request body (JSON object or form-encoded)
    #[arg(long)]
    body: Option<String>,

    /// Invoking user; a guest when omitted
    #[arg(long, value_name = "REFERENCE_ID")]
    user: Option<ReferenceId>,

    /// Override the administrators group (also: ACTUATE_ADMIN_GROUP)
    #[arg(long, value_name = "UUID")]
    admin_group: Option<GroupId>,

    /// Override the schema upload directory (also: ACTUATE_SCHEMA_UPLOAD_DIR)
    #[arg(long, value_name = "DIR")]
    schema_dir: Option<PathBuf>,
}

/// CLI flags as the highest-priority config layer.
struct CliConfigResolver {
    admin_group: Option<GroupId>,
    schema_dir: Option<PathBuf>,
}

impl CliConfigResolver {
    fn from_args(args: &Args) -> Self {
        Self {
            admin_group: args.admin_group,
            schema_dir: args.schema_dir.clone(),
        }
    }
}

impl ConfigResolver for CliConfigResolver {
    fn apply(&self, config: &mut ActuateConfig) {
        if let Some(group) = self.admin_group {
            config.auth.admin_group = Some(group);
        }
        if let Some(ref dir) = self.schema_dir {
            config.schema.upload_dir.clone_from(dir);
        }
    }
}

fn init_tracing(args: &Args) {
    let filter = if args.debug {
        EnvFilter::new("debug,tokio=warn")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .init();
}

fn project_root(args: &Args) -> PathBuf {
    args.project.clone().unwrap_or_else(|| {
        std::env::current_dir().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to get current directory, using '.'");
            PathBuf::from(".")
        })
    })
}

fn load_fixture(path: Option<&Path>) -> Result<Fixture> {
    let Some(path) = path else {
        return Ok(Fixture::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read fixture {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid fixture {}", path.display()))
}

fn build_request(args: &Args) -> Result<ActionRequest> {
    let mut builder = ActionRequest::builder(&args.on_type, &args.action);
    if let Some(ref body) = args.body {
        builder = builder.body(body);
    }
    for pair in &args.attributes {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("attribute '{pair}' is not KEY=VALUE");
        };
        builder = builder.form_pair(key.trim(), value);
    }
    Ok(builder.build())
}

/// Everything that must succeed before the action runs.
struct Setup {
    engine: ActionEngine,
    queue: Arc<TokioWorkQueue>,
    request: ActionRequest,
    actor: Actor,
}

fn setup(args: &Args) -> Result<Setup> {
    let root = project_root(args);
    let mut config = ConfigLoader::new()
        .with_project_root(&root)
        .load()
        .context("config error")?;
    CliConfigResolver::from_args(args).apply(&mut config);
    debug!(project = %root.display(), "configuration resolved");

    let catalog = ActionCatalog::load(&args.catalog)?;
    let fixture = load_fixture(args.fixture.as_deref())?;
    let actor = match args.user {
        Some(id) => fixture.actor(id).unwrap_or_else(|| Actor::user(id)),
        None => Actor::guest(),
    };
    let store = Arc::new(MemoryStore::from_fixture(fixture));
    let queue = Arc::new(TokioWorkQueue::current());
    let work: Arc<dyn WorkQueue> = queue.clone();

    let engine = ActionEngine::builder(catalog, store, work)
        .with_config(config)
        .build();

    Ok(Setup {
        engine,
        queue,
        request: build_request(args)?,
        actor,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    let setup = match setup(&args) {
        Ok(setup) => setup,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::from(2);
        }
    };

    info!(table = %args.on_type, action = %args.action, user = ?setup.actor.user_id(), "invoking");
    let (output, code) = match setup.engine.invoke(&setup.request, &setup.actor) {
        Ok(responses) => (json!({ "responses": responses }), ExitCode::SUCCESS),
        Err(failure) => (
            json!({
                "responses": failure.responses,
                "error": {
                    "code": failure.error.code(),
                    "message": failure.error.to_string(),
                },
            }),
            ExitCode::from(1),
        ),
    };
    setup.queue.drain().await;

    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{text}"),
        Err(err) => {
            eprintln!("Error: cannot render output: {err}");
            return ExitCode::from(2);
        }
    }
    code
}
