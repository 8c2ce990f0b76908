use std::io::Read;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use toolgate_bridge::ForwardOutcome;
use toolgate_bridge::HookServer;
use toolgate_bridge::forward_hook;
use toolgate_bridge::socket_path_for;
use toolgate_pipeline::PipelineHandle;
use toolgate_policy::HookRule;
use toolgate_policy::RuleAction;
use toolgate_policy::RuleSet;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod install;

/// Hook event pipeline for a coding-agent host: forwards the host's
/// lifecycle hooks over a per-project socket, gates tool use by policy, and
/// publishes the canonical event feed.
#[derive(Parser)]
#[command(name = "toolgate")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Forward one hook invocation read from stdin. This is the entry the
    /// host's hook settings point at; it must never stall the host.
    Hook {
        /// Project directory the socket path is derived from.
        #[arg(long)]
        project_dir: Option<PathBuf>,
    },
    /// Run the hook server and decision pipeline for a project.
    Serve {
        #[arg(long)]
        project_dir: Option<PathBuf>,
        /// Explicit socket path, overriding the derived one.
        #[arg(long)]
        socket: Option<PathBuf>,
        /// Seed a deny rule for this tool pattern. Repeatable.
        #[arg(long = "deny", value_name = "PATTERN")]
        deny: Vec<String>,
        /// Seed an approve rule for this tool pattern. Repeatable.
        #[arg(long = "approve", value_name = "PATTERN")]
        approve: Vec<String>,
    },
    /// Register the forwarder for every recognized hook in the project's
    /// settings file. Idempotent.
    Install {
        #[arg(long)]
        project_dir: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Hook { project_dir } => run_hook(resolve_dir(project_dir)?),
        Command::Serve {
            project_dir,
            socket,
            deny,
            approve,
        } => run_serve(resolve_dir(project_dir)?, socket, deny, approve),
        Command::Install { project_dir } => {
            let dir = resolve_dir(project_dir)?;
            install::install_project_hooks(&dir)?;
            println!("registered toolgate hooks in {}", dir.display());
            Ok(())
        }
    }
}

fn resolve_dir(project_dir: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match project_dir {
        Some(dir) => Ok(dir),
        None => Ok(std::env::current_dir()?),
    }
}

/// The forwarder: one stdin document, one round trip, exit per contract.
/// Internal failures exit 0 — fail-open is mandatory here.
fn run_hook(project_dir: PathBuf) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let mut stdin_doc = String::new();
    if std::io::stdin().read_to_string(&mut stdin_doc).is_err() {
        std::process::exit(0);
    }

    let outcome = runtime.block_on(forward_hook(&stdin_doc, &project_dir));
    match &outcome {
        ForwardOutcome::Passthrough => {}
        ForwardOutcome::Block { stderr } => {
            let _ = writeln!(std::io::stderr(), "{stderr}");
        }
        ForwardOutcome::JsonOutput { stdout_json } => {
            let _ = writeln!(std::io::stdout(), "{stdout_json}");
        }
    }
    std::process::exit(outcome.exit_code());
}

fn run_serve(
    project_dir: PathBuf,
    socket: Option<PathBuf>,
    deny: Vec<String>,
    approve: Vec<String>,
) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let rules = seed_rules(&deny, &approve);
    let socket = socket.unwrap_or_else(|| socket_path_for(&project_dir));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let server = HookServer::bind(&socket)?;
        info!("toolgate listening on {}", server.path().display());
        let pipeline = PipelineHandle::new(rules);
        server.run(Arc::new(pipeline)).await?;
        Ok(())
    })
}

fn seed_rules(deny: &[String], approve: &[String]) -> RuleSet {
    let mut rules = RuleSet::default();
    for pattern in deny {
        rules.push(HookRule {
            id: format!("deny:{pattern}"),
            tool_pattern: pattern.clone(),
            action: RuleAction::Deny,
            added_by: "cli".to_string(),
        });
    }
    for pattern in approve {
        rules.push(HookRule {
            id: format!("approve:{pattern}"),
            tool_pattern: pattern.clone(),
            action: RuleAction::Approve,
            added_by: "cli".to_string(),
        });
    }
    rules
}
