mod config;
mod input;
mod output;

use clap::Parser;
use std::path::PathBuf;

use veripoll_core::{Audit, AuditError, AuditState, Engine, SolverError};

pub fn bail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

#[derive(Parser)]
#[command(name = "veripoll", version, about = "Round-by-round risk-limiting audit workbench")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Execute an audit round by round with interactive prompts
    Interactive(InteractiveArgs),
    /// Generate stopping sizes, and optionally replay decisions, for a fixed round schedule
    Bulk(BulkArgs),
    /// Create a default config file at ~/.config/veripoll/config.toml
    Init,
}

#[derive(Parser)]
struct InteractiveArgs {
    /// Audit engine: "brla", "minerva", "athena" or "bravo"
    #[arg(short = 'a', long)]
    audit_type: Option<String>,

    /// Risk limit (alpha), strictly between 0 and 1
    #[arg(short = 'r', long)]
    risk_limit: Option<f64>,

    /// Maximum fraction of contest ballots to draw, in (0, 1]
    #[arg(short = 'm', long)]
    max_fraction: Option<f64>,

    /// Athena delta parameter (athena only)
    #[arg(long)]
    delta: Option<f64>,

    /// Read contest data from a JSON file instead of prompting
    #[arg(long)]
    contest_file: Option<PathBuf>,

    /// Write the transcript JSON here when the audit completes
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Path to config file (default: ~/.config/veripoll/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report sample-size bounds and solver details while auditing
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser)]
struct BulkArgs {
    /// Contest data as a JSON file
    contest_file: PathBuf,

    /// Audit engine: "brla", "minerva", "athena" or "bravo"
    audit_type: String,

    /// Risk limit (alpha), strictly between 0 and 1
    risk_limit: f64,

    /// Maximum fraction of contest ballots to draw, in (0, 1]
    max_fraction: f64,

    /// Space separated list of cumulative round sizes, e.g. "100 200 400"
    #[arg(short = 'l', long)]
    round_list: Option<String>,

    /// Observed cumulative winner:loser totals per round, e.g. "57:43 120:80".
    /// With observations the schedule is replayed through the audit state
    /// machine and per-round decisions are reported.
    #[arg(long)]
    observations: Option<String>,

    /// Generate stopping sizes ballot by ballot up to this sample size
    #[arg(short = 'f', long)]
    full_audit_limit: Option<u64>,

    /// Athena delta parameter (athena only)
    #[arg(long)]
    delta: Option<f64>,

    /// Write output into given file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the replayed transcript JSON here
    #[arg(long)]
    transcript: Option<PathBuf>,
}

const ENGINE_TAGS: [&str; 4] = ["brla", "minerva", "athena", "bravo"];

fn engine_from_tag(tag: &str, delta: Option<f64>) -> Engine {
    match tag.to_lowercase().as_str() {
        "brla" => Engine::Brla,
        "minerva" => Engine::Minerva,
        "athena" => Engine::Athena { delta: delta.unwrap_or(1.0) },
        "bravo" => Engine::Bravo,
        other => bail(format!("Unknown audit type \"{other}\". Use one of: {}", ENGINE_TAGS.join(", "))),
    }
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Interactive(args) => run_interactive(args),
        Commands::Bulk(args) => run_bulk(args),
        Commands::Init => {
            let path = config::create_default_config();
            println!("Created config at {}", path.display());
            println!("Edit it to set your default audit type, risk limit, etc.");
        }
    }
}

fn run_interactive(args: InteractiveArgs) {
    println!("\nWelcome to the veripoll auditing tool!\n");

    let config_path = args.config.clone().unwrap_or_else(config::config_path);
    let cfg = config::load_config(&config_path);

    let audit_type = args
        .audit_type
        .or(cfg.audit_type)
        .unwrap_or_else(|| input::prompt_choice("Select an audit type", &ENGINE_TAGS));
    let alpha = args.risk_limit.or(cfg.risk_limit).unwrap_or_else(|| {
        input::prompt_fraction("Enter desired risk limit (e.g. use 0.1 for 10%)", false)
    });
    let max_fraction = args.max_fraction.or(cfg.max_fraction).unwrap_or_else(|| {
        input::prompt_fraction("Enter maximum fraction of ballots to draw during audit", true)
    });
    let delta = if audit_type.eq_ignore_ascii_case("athena") {
        Some(args.delta.or(cfg.delta).unwrap_or_else(|| {
            input::prompt("Enter the Athena delta parameter")
        }))
    } else {
        args.delta
    };
    let engine = engine_from_tag(&audit_type, delta);

    // Contest from file, or prompted with a confirmation loop.
    let contest = match args.contest_file {
        Some(ref path) => input::load_contest(path),
        None => {
            let mut contest = input::input_contest();
            println!("\n{contest}");
            while !input::confirm("Use the above contest data?") {
                contest = input::input_contest();
                println!("\n{contest}");
            }
            contest
        }
    };

    let winner = contest.winners()[0].clone();
    let loser = contest
        .best_loser(&winner)
        .unwrap_or_else(|| bail("Contest has no reported loser to audit against"))
        .to_string();
    let pair = contest
        .pairwise(&winner, &loser)
        .unwrap_or_else(|e| bail(e));
    let mut audit = Audit::new(pair, engine, alpha, max_fraction).unwrap_or_else(|e| bail(e));

    println!(
        "\nAuditing {winner} vs {loser} with {} (risk limit {alpha}, max fraction {max_fraction})",
        engine.tag()
    );
    if args.verbose {
        println!("Maximum sample size: {}", audit.max_sample_size());
        match audit.min_sample_size() {
            Some(n) => println!("Minimum useful sample size: {n}"),
            None => println!("No sample size within the draw limit can stop this audit."),
        }
    }

    loop {
        if input::confirm("\nWould you like a recommended sample size for the next round?") {
            let target = input::prompt_fraction("Enter the desired stopping probability", false);
            match audit.next_sample_size(target) {
                Ok(n) => println!("Recommended next sample size: {n}"),
                Err(AuditError::Solver(SolverError::Unattainable { max, best })) => println!(
                    "No sample size up to {max} reaches that stopping probability (best {best:.4})"
                ),
                Err(e) => println!("INVALID INPUT: {e}"),
            }
        }

        let size: u64 = input::prompt("Enter next sample size (as a running total)");
        let kw: u64 = input::prompt(&format!(
            "Enter total number of votes for {winner} found in sample"
        ));
        let kl: u64 = input::prompt(&format!(
            "Enter total number of votes for {loser} found in sample"
        ));

        match audit.execute_round(size, kw, kl) {
            Err(e) => {
                println!("INVALID INPUT: {e}");
                continue;
            }
            Ok(decision) => {
                output::round_banner(audit.transcript().last().expect("round just executed"));
                if decision.stopped {
                    println!("\nAudit complete: the reported outcome is confirmed.");
                    break;
                }
                if audit.state() == AuditState::CompleteExhausted {
                    println!("\nMaximum sample size drawn without meeting the risk limit.");
                    println!("Escalate to a full hand count.");
                    break;
                }
                if input::confirm("Would you like to force stop the audit") {
                    if let Err(e) = audit.force_stop() {
                        bail(e);
                    }
                    println!("\nAudit force stopped; escalate outside the tool.");
                    break;
                }
            }
        }
    }

    if let Some(ref path) = args.transcript {
        output::write_transcript(path, audit.transcript());
    }
}

fn run_bulk(args: BulkArgs) {
    let contest = input::load_contest(&args.contest_file);
    let engine = engine_from_tag(&args.audit_type, args.delta);

    let winner = contest.winners()[0].clone();
    let loser = contest
        .best_loser(&winner)
        .unwrap_or_else(|| bail("Contest has no reported loser to audit against"))
        .to_string();
    let pair = contest
        .pairwise(&winner, &loser)
        .unwrap_or_else(|e| bail(e));
    let mut audit =
        Audit::new(pair.clone(), engine, args.risk_limit, args.max_fraction).unwrap_or_else(|e| bail(e));

    let out = match (&args.round_list, &args.observations) {
        (Some(schedule), Some(observations)) => {
            let sizes = input::parse_schedule(schedule).unwrap_or_else(|e| bail(e));
            let counts = input::parse_observations(observations).unwrap_or_else(|e| bail(e));
            if counts.len() != sizes.len() {
                bail(format!(
                    "{} round sizes but {} observations",
                    sizes.len(),
                    counts.len()
                ));
            }
            for (&size, &(kw, kl)) in sizes.iter().zip(&counts) {
                if audit.is_complete() {
                    println!("Audit complete; ignoring remaining scheduled rounds.");
                    break;
                }
                if let Err(e) = audit.execute_round(size, kw, kl) {
                    bail(format!("Round of size {size}: {e}"));
                }
            }
            if let Some(ref path) = args.transcript {
                output::write_transcript(path, audit.transcript());
            }
            output::decision_table(audit.transcript())
        }
        (Some(schedule), None) => {
            let sizes = input::parse_schedule(schedule).unwrap_or_else(|e| bail(e));
            let kmins: Vec<Option<u64>> = sizes
                .iter()
                .map(|&n| engine.kmin(&pair, args.risk_limit, n))
                .collect();
            output::kmin_table(&sizes, &kmins)
        }
        (None, Some(_)) => bail("--observations requires a round schedule (-l)"),
        (None, None) => {
            // Ballot-by-ballot sweep, from the smallest useful size up to
            // the requested limit or the draw limit.
            let max = args
                .full_audit_limit
                .unwrap_or_else(|| audit.max_sample_size())
                .min(audit.max_sample_size());
            let min = audit
                .min_sample_size()
                .unwrap_or_else(|| bail("No sample size within the draw limit has a stopping size"));
            let sizes: Vec<u64> = (min..=max).collect();
            let kmins: Vec<Option<u64>> = sizes
                .iter()
                .map(|&n| engine.kmin(&pair, args.risk_limit, n))
                .collect();
            output::kmin_table(&sizes, &kmins)
        }
    };

    output::write_or_print(args.output.as_deref(), &out);
}
