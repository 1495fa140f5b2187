use anyhow::{bail, Context, Result};
use cadis_core::config::config_schema_json;
use cadis_core::{Catalog, Category, Config, CyclePlan, CycleRunner, Difficulty, Simulator};
use cadis_kernel::Kernel;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value as JsonValue};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "cadis-cli", version, about = "CADIS coding-improvement utilities")]
struct Cli {
    /// State directory holding cadis.sqlite (overrides CADIS_STATE_DIR and config)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,
    /// TOML config file (overrides CADIS_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert the built-in scenario catalog (idempotent)
    Seed,
    /// List stored scenarios (JSON)
    Scenarios(ScenariosArgs),
    /// Simulate and store one attempt
    Attempt(AttemptArgs),
    /// List recent attempts, newest first (JSON)
    Attempts(AttemptsArgs),
    /// Recompute the progress snapshot
    Recompute(RecomputeArgs),
    /// Print the stored progress snapshot
    Progress(PrettyArgs),
    /// Run improvement cycles toward the target score
    Cycles(CyclesArgs),
    /// Config helpers
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

#[derive(Args)]
struct PrettyArgs {
    /// Pretty-print JSON
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct ScenariosArgs {
    /// Filter by category (algorithms, architecture, refactoring, debugging, testing)
    #[arg(long)]
    category: Option<Category>,
    /// Filter by difficulty (beginner, intermediate, advanced, expert)
    #[arg(long)]
    difficulty: Option<Difficulty>,
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct AttemptArgs {
    /// Scenario id
    scenario_id: String,
    /// RNG seed for a reproducible attempt
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct AttemptsArgs {
    #[arg(long, default_value_t = 20)]
    limit: i64,
}

#[derive(Args)]
struct RecomputeArgs {
    /// Aggregation window (defaults to the configured value)
    #[arg(long)]
    window_days: Option<u32>,
}

#[derive(Args)]
struct CyclesArgs {
    #[arg(long, default_value_t = 5)]
    cycles: u32,
    #[arg(long)]
    attempts_per_cycle: Option<u32>,
    #[arg(long)]
    target: Option<f64>,
    /// Aggregation window used after each cycle
    #[arg(long)]
    window_days: Option<u32>,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Print the JSON schema for the TOML config
    Schema,
}

struct Ctx {
    config: Config,
    kernel: Kernel,
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => cadis_core::load_config(&path.to_string_lossy()),
        None => cadis_core::load_from_env(),
    }
}

fn open_ctx(cli: &Cli) -> Result<Ctx> {
    let config = load_config(cli)?;
    let dir = cli.state_dir.clone().unwrap_or_else(|| config.state_dir());
    let kernel =
        Kernel::open(&dir).with_context(|| format!("open state dir {}", dir.display()))?;
    Ok(Ctx { config, kernel })
}

/// Open the store with the catalog present.
fn open_seeded(cli: &Cli) -> Result<Ctx> {
    let ctx = open_ctx(cli)?;
    ctx.kernel.seed_scenarios(&cadis_core::seed_scenarios())?;
    Ok(ctx)
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn print_json(v: &JsonValue, pretty: bool) {
    if pretty {
        println!(
            "{}",
            serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
        );
    } else {
        println!("{}", v);
    }
}

fn cmd_seed(cli: &Cli) -> Result<()> {
    let ctx = open_ctx(cli)?;
    let inserted = ctx.kernel.seed_scenarios(&cadis_core::seed_scenarios())?;
    let total = ctx.kernel.list_scenarios()?.len();
    println!("Seeded {inserted} scenario(s); {total} in catalog");
    Ok(())
}

fn cmd_scenarios(cli: &Cli, args: &ScenariosArgs) -> Result<()> {
    let ctx = open_seeded(cli)?;
    let items: Vec<_> = ctx
        .kernel
        .list_scenarios()?
        .into_iter()
        .filter(|s| args.category.is_none_or(|c| s.category == c))
        .filter(|s| args.difficulty.is_none_or(|d| s.difficulty == d))
        .collect();
    print_json(&json!({"count": items.len(), "items": items}), args.pretty);
    Ok(())
}

fn cmd_attempt(cli: &Cli, args: &AttemptArgs) -> Result<()> {
    let ctx = open_seeded(cli)?;
    let Some(scenario) = ctx.kernel.get_scenario(&args.scenario_id)? else {
        bail!("unknown scenario: {}", args.scenario_id);
    };
    let simulator = Simulator::new(ctx.config.simulator);
    let attempt = simulator.simulate(&scenario, &mut rng_for(args.seed), Utc::now());
    ctx.kernel.insert_attempt(&attempt)?;
    print_json(&serde_json::to_value(&attempt)?, true);
    Ok(())
}

fn cmd_attempts(cli: &Cli, args: &AttemptsArgs) -> Result<()> {
    let ctx = open_ctx(cli)?;
    let items = ctx.kernel.list_attempts(args.limit.clamp(1, 500))?;
    print_json(&json!({"count": items.len(), "items": items}), false);
    Ok(())
}

fn cmd_recompute(cli: &Cli, args: &RecomputeArgs) -> Result<()> {
    let ctx = open_ctx(cli)?;
    let mut agg = ctx.config.aggregator;
    if let Some(days) = args.window_days {
        if days == 0 {
            bail!("--window-days must be at least 1");
        }
        agg.window_days = days;
    }
    let progress = ctx.kernel.recompute_progress(&agg, Utc::now())?;
    print_json(&serde_json::to_value(&progress)?, true);
    Ok(())
}

fn cmd_progress(cli: &Cli, args: &PrettyArgs) -> Result<()> {
    let ctx = open_ctx(cli)?;
    match ctx.kernel.latest_progress()? {
        Some(progress) => {
            print_json(&serde_json::to_value(&progress)?, args.pretty);
            Ok(())
        }
        None => bail!("no progress snapshot yet; run `cadis-cli recompute` first"),
    }
}

fn cmd_cycles(cli: &Cli, args: &CyclesArgs) -> Result<()> {
    let ctx = open_seeded(cli)?;
    let defaults = ctx.config.cycles;
    let mut plan = CyclePlan::from_config(&defaults, args.cycles);
    if let Some(n) = args.attempts_per_cycle {
        plan.attempts_per_cycle = n;
    }
    if let Some(target) = args.target {
        plan.target = target;
    }
    let mut agg = ctx.config.aggregator;
    agg.window_days = args.window_days.unwrap_or(defaults.window_days);
    if agg.window_days == 0 {
        bail!("--window-days must be at least 1");
    }

    let simulator = Simulator::new(ctx.config.simulator);
    let catalog = Catalog::new(ctx.kernel.list_scenarios()?);
    let mut runner = CycleRunner::new(plan, &simulator, &catalog)?;
    let mut rng = rng_for(args.seed);
    println!(
        "Running {} cycle(s) toward {:.1} from {:.1}",
        plan.cycles, plan.target, plan.start_score
    );
    while let Some(report) = runner.step(&mut rng, Utc::now()) {
        ctx.kernel.insert_attempts(&report.attempts)?;
        let progress = ctx.kernel.recompute_progress(&agg, Utc::now())?;
        println!(
            "cycle {:>3}: attempts {} mean {:.1} trend {:.1} overall {}",
            report.cycle,
            report.attempts.len(),
            report.mean_attempt_score,
            report.trend_score,
            progress.overall_score
        );
    }
    let reached = runner.trend() >= plan.target;
    println!(
        "Final trend {:.1} ({})",
        runner.trend(),
        if reached { "target reached" } else { "below target" }
    );
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Seed => cmd_seed(cli),
        Commands::Scenarios(args) => cmd_scenarios(cli, args),
        Commands::Attempt(args) => cmd_attempt(cli, args),
        Commands::Attempts(args) => cmd_attempts(cli, args),
        Commands::Recompute(args) => cmd_recompute(cli, args),
        Commands::Progress(args) => cmd_progress(cli, args),
        Commands::Cycles(args) => cmd_cycles(cli, args),
        Commands::Config {
            cmd: ConfigCmd::Schema,
        } => {
            print_json(&config_schema_json(), true);
            Ok(())
        }
    }
}

fn main() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
