mod demo;
mod reports;
mod simulation;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};

use demo::{demo_banners, demo_catalog};
use simulation::{SimulationPlan, SimulationReport, run_simulation};
use summon_core::{BannerCatalog, BannerId, EngineConfig, ItemId};

#[derive(Debug, Parser)]
#[command(name = "summon-sim", version = "0.1.0")]
#[command(
    about = "Monte Carlo driver for the summon engine - concurrent pulls, odds and ledger checks"
)]
struct Args {
    /// Banner to pull on
    #[arg(long, default_value = "standard")]
    banner: String,

    /// Banner catalog JSON to load instead of the built-in demo banners
    #[arg(long)]
    banners: Option<PathBuf>,

    /// Engine configuration JSON (timeouts, fragments, bonus drops, wishlists)
    #[arg(long)]
    config: Option<PathBuf>,

    /// List the available banners and exit
    #[arg(long)]
    list_banners: bool,

    /// Total number of pull sessions
    #[arg(long, default_value_t = 200)]
    sessions: u32,

    /// Draws per session (1 for single pulls, 10 for the bundle)
    #[arg(long, default_value_t = 10)]
    #[arg(value_parser = clap::value_parser!(u32).range(1..=10))]
    draws: u32,

    /// Number of simulated players pulling in parallel
    #[arg(long, default_value_t = 8)]
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    players: u32,

    /// Master seed; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Legendary heroes to wishlist for every player (comma-separated)
    #[arg(long)]
    wishlist: Option<String>,

    /// Share of ownership and pity writes that fail, between 0 and 1
    #[arg(long, default_value_t = 0.0)]
    fault_rate: f64,

    /// Roll bonus drops at the promotional rate
    #[arg(long)]
    promotional: bool,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["console", "json", "csv"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let banners = load_banners(args.banners.as_deref())?;
    if maybe_list_banners(&args, &banners)? {
        return Ok(());
    }
    let config = load_config(args.config.as_deref())?;
    let plan = build_plan(&args);

    if args.report == "console" && args.output.is_none() {
        announce_banner();
    }

    let catalog = demo_catalog(&banners);
    let report = run_simulation(banners, catalog, config, plan).await?;
    write_report(&args, &report)?;

    if !report.passed() {
        for violation in &report.violations {
            eprintln!("{} {violation}", "invariant violated:".red().bold());
        }
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "error" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn announce_banner() {
    println!("{}", "🎰 Summon Engine Simulator".bright_cyan().bold());
    println!("{}", "==========================".cyan());
}

fn load_banners(path: Option<&Path>) -> Result<BannerCatalog> {
    let Some(path) = path else {
        return demo_banners();
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    BannerCatalog::from_json(&json)
        .with_context(|| format!("invalid banners in {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    EngineConfig::from_json(&json)
        .with_context(|| format!("invalid config in {}", path.display()))
}

fn maybe_list_banners(args: &Args, banners: &BannerCatalog) -> Result<bool> {
    if !args.list_banners {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available banners:")?;
    for banner in &banners.banners {
        let cost = banner.cost_for(1);
        writeln!(
            output_target.writer(),
            "  {:15} - {} ({:?}, {} per draw)",
            banner.id.as_str(),
            banner.name,
            banner.kind,
            cost
        )?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

fn build_plan(args: &Args) -> SimulationPlan {
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut plan = SimulationPlan::new(
        BannerId::new(&args.banner),
        args.sessions,
        args.draws,
        args.players,
        seed,
    );
    plan.wishlist = args
        .wishlist
        .as_deref()
        .map(split_csv)
        .unwrap_or_default()
        .iter()
        .map(|id| ItemId::new(id))
        .collect();
    plan.fault_rate = args.fault_rate;
    plan.promotional = args.promotional;
    plan
}

fn write_report(args: &Args, report: &SimulationReport) -> Result<()> {
    if args.output.is_some() {
        colored::control::set_override(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    match args.report.as_str() {
        "json" => reports::generate_json_report(output_target.writer(), report)?,
        "csv" => reports::generate_csv_report(output_target.writer(), report)?,
        _ => reports::generate_console_report(output_target.writer(), report)?,
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["summon-sim"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).expect("valid args")
    }

    #[test]
    fn split_csv_trims_and_filters() {
        assert_eq!(split_csv(" aurora, ,blaze "), vec!["aurora", "blaze"]);
    }

    #[test]
    fn plan_carries_cli_choices() {
        let args = parse(&[
            "--banner",
            "starfall",
            "--sessions",
            "12",
            "--draws",
            "1",
            "--players",
            "3",
            "--seed",
            "7",
            "--wishlist",
            "aurora,blaze",
            "--fault-rate",
            "0.25",
        ]);
        let plan = build_plan(&args);
        assert_eq!(plan.banner, BannerId::new("starfall"));
        assert_eq!((plan.sessions, plan.draws, plan.players), (12, 1, 3));
        assert_eq!(plan.seed, 7);
        assert_eq!(plan.wishlist, vec![ItemId::new("aurora"), ItemId::new("blaze")]);
        assert_eq!(plan.fault_interval(), Some(4));
    }

    #[test]
    fn draw_count_outside_bundle_is_rejected() {
        let argv = ["summon-sim", "--draws", "11"];
        assert!(Args::try_parse_from(argv).is_err());
        let argv = ["summon-sim", "--players", "0"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn missing_banner_file_reports_path() {
        let err = load_banners(Some(Path::new("/nonexistent/banners.json"))).expect_err("missing");
        assert!(err.to_string().contains("/nonexistent/banners.json"));
    }
}
