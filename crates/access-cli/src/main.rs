// ============================================================================
// mintrace-access — Role gate inspection tool for MinTrace dashboards
// ============================================================================
// Usage:
//   mintrace-access routes [--json]                       List gated dashboard routes
//   mintrace-access check --role miner --address 0x...    Run a gate against the contract
//   mintrace-access check --role miner --address 0x... --grants grants.json
//                                                         Run a gate against a grants file
// ============================================================================

use access_core::{
    routes::{route_for, DASHBOARD_ROUTES, PUBLIC_PAGES},
    AccessGate, ContractRoleChecker, FixedAccountConnector, GateConfig, GateState,
    NotificationKind, Notifier, Role, RoleChecker, StaticRoleChecker, WalletProvider,
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Exit code when the wallet does not hold the role
const EXIT_DENIED: i32 = 2;

/// MinTrace role gate inspection tool
#[derive(Parser)]
#[command(name = "mintrace-access", version, about = "Inspect and exercise MinTrace dashboard role gates")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List dashboard routes and the role each one requires
    Routes {
        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mount a gate for a role, connect a wallet and report the outcome
    Check {
        /// Required role: miner, refiner, transporter, auditor, inspector, buyer, admin
        #[arg(long)]
        role: Role,

        /// Wallet address to connect
        #[arg(long)]
        address: String,

        /// Offline grants file ({ "0x...": ["miner"] }) instead of the contract
        #[arg(long)]
        grants: Option<PathBuf>,

        /// Press "Check Again" up to this many times while denied
        #[arg(long, default_value = "0")]
        rechecks: u32,

        /// Seconds to wait between rechecks
        #[arg(long, default_value = "2")]
        interval: u64,

        /// JSON-RPC endpoint (overrides MINTRACE_RPC_URL)
        #[arg(long)]
        rpc_url: Option<String>,

        /// Access-control contract (overrides MINTRACE_ACCESS_CONTROL_ADDRESS)
        #[arg(long)]
        contract: Option<String>,
    },
}

/// Prints notifications the way the dashboard shows toasts
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        let label = match kind {
            NotificationKind::Success => "ok",
            NotificationKind::Error => "error",
            NotificationKind::Info => "info",
        };
        println!("  [{}] {}", label, message);
    }
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("access_core=info".parse()?)
                .add_directive("mintrace_access=info".parse()?),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    init_logging()?;
    if let Err(e) = dotenv {
        debug!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Routes { json } => cmd_routes(json),
        Commands::Check {
            role,
            address,
            grants,
            rechecks,
            interval,
            rpc_url,
            contract,
        } => {
            let checker = build_checker(grants, rpc_url, contract)?;
            let granted = cmd_check(role, address, checker, rechecks, Duration::from_secs(interval)).await?;
            if !granted {
                std::process::exit(EXIT_DENIED);
            }
            Ok(())
        }
    }
}

fn cmd_routes(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(DASHBOARD_ROUTES)?);
        return Ok(());
    }

    println!("=== MinTrace Dashboard Routes ===");
    for route in DASHBOARD_ROUTES {
        let role = route
            .requirement
            .role()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "any wallet".to_string());
        println!("  {:20} {:24} {}", route.path, route.title, role);
    }
    println!();
    println!("Public pages: {}", PUBLIC_PAGES.join(", "));

    Ok(())
}

fn build_checker(
    grants: Option<PathBuf>,
    rpc_url: Option<String>,
    contract: Option<String>,
) -> Result<Arc<dyn RoleChecker>> {
    if let Some(path) = grants {
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read grants file {}", path.display()))?;
        let checker = StaticRoleChecker::from_json(&json)
            .with_context(|| format!("Invalid grants file {}", path.display()))?;
        info!("Using offline grants from {}", path.display());
        return Ok(Arc::new(checker));
    }

    let mut config = GateConfig::from_env()?;
    if let Some(url) = rpc_url {
        config.rpc_url = url;
    }
    if let Some(contract) = contract {
        config.access_control_address = Some(contract);
    }
    config.validate()?;

    let contract = config.access_control_address.as_deref().ok_or_else(|| {
        anyhow!("No access-control contract configured. Set MINTRACE_ACCESS_CONTROL_ADDRESS or pass --contract")
    })?;

    let checker = ContractRoleChecker::new(&config.rpc_url, contract, config.check_timeout())?;
    info!(
        "Checking roles on {} via {} (timeout {}s)",
        contract,
        config.rpc_url,
        checker.timeout().as_secs()
    );
    Ok(Arc::new(checker))
}

async fn cmd_check(
    role: Role,
    address: String,
    checker: Arc<dyn RoleChecker>,
    rechecks: u32,
    interval: Duration,
) -> Result<bool> {
    let wallet = WalletProvider::new();
    let gate = AccessGate::new(role, checker, Arc::new(ConsoleNotifier));
    let handle = gate.mount(wallet.subscribe());
    debug!("Mounted gate {}", handle.id());

    let page = route_for(&format!("/{}", role))
        .map(|route| route.title)
        .unwrap_or("dashboard");
    println!("{} ({} gate)", page, gate.requirement().display_name());
    println!("{}", handle.decision());

    wallet
        .connect(&FixedAccountConnector::new(address))
        .await
        .context("Wallet connection failed")?;

    let view = handle
        .wait_until(|v| v.session.is_connected && v.is_settled())
        .await
        .ok_or_else(|| anyhow!("Gate stopped before the role check resolved"))?;
    println!("{}", view.decision());

    let mut state = view.state();
    for attempt in 1..=rechecks {
        if state == GateState::Granted {
            break;
        }
        tokio::time::sleep(interval).await;

        println!("Check Again ({}/{})", attempt, rechecks);
        let outcome = handle.recheck().await;
        debug!("Recheck outcome: {:?}", outcome);

        state = handle.state();
        println!("{}", handle.decision());
    }

    if let Some(page) = handle.view().render(|| page).content() {
        println!("Rendering {}", page);
    }

    handle.unmount();
    Ok(state == GateState::Granted)
}
