//! habitus-patterns - CLI tool to mine behavioral patterns from the database
//!
//! Runs the five analyses over the synced history and prints a pattern
//! report as text or JSON.

use anyhow::{Context, Result};
use clap::Parser;
use habitus_core::mining::{MiningOptions, PatternMiner, PatternReport};
use habitus_core::{Config, Database};

#[derive(Parser)]
#[command(name = "habitus-patterns")]
#[command(about = "Mine behavioral patterns from synced transcripts")]
#[command(version)]
struct Args {
    /// Lookback window in days
    #[arg(short, long)]
    days: Option<u32>,

    /// Only include sessions whose project path contains this substring
    #[arg(short, long)]
    project: Option<String>,

    /// Minimum sessions/members for a pattern to be reported
    #[arg(short, long)]
    min_frequency: Option<usize>,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    format: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        habitus_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db = Database::open(&Config::database_path()).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let opts = MiningOptions {
        days: args.days.unwrap_or(config.mining.lookback_days),
        project_filter: args.project,
        min_frequency: args.min_frequency.unwrap_or(config.mining.min_frequency),
    };

    let miner = PatternMiner::new(&db);
    let report = miner.report(&opts);

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text_report(&report, &opts),
    }

    Ok(())
}

fn print_text_report(report: &PatternReport, opts: &MiningOptions) {
    let since = chrono::Utc::now() - chrono::Duration::days(opts.days as i64);
    println!(
        "Patterns since {} (min frequency {}):\n",
        since.format("%Y-%m-%d"),
        opts.min_frequency
    );

    println!("Tool sequences ({}):", report.tool_sequences.len());
    for seq in &report.tool_sequences {
        println!(
            "  [{:?}] {}  ({} sessions, {} occurrences)",
            seq.kind,
            seq.tools.join(" -> "),
            seq.session_count,
            seq.occurrence_count
        );
    }

    println!("\nPrompt clusters ({}):", report.prompt_clusters.len());
    for cluster in &report.prompt_clusters {
        println!(
            "  \"{}\" ({}): {} prompts across {} sessions; tools: {}",
            cluster.first_word,
            cluster.intent,
            cluster.member_count,
            cluster.session_count,
            cluster.top_tools.join(", ")
        );
        for example in &cluster.examples {
            println!("    e.g. {}", example);
        }
    }

    println!("\nProject profiles ({}):", report.project_profiles.len());
    for profile in &report.project_profiles {
        println!(
            "  {} ({} sessions, {} turns)",
            profile.project_path, profile.session_count, profile.turn_count
        );
        for usage in &profile.tool_usage {
            println!(
                "    {:<14} {:>4}x  share {:.2}  enrichment {:.2} ({:?})",
                usage.tool, usage.count, usage.share, usage.enrichment, usage.flag
            );
        }
        for seq in &profile.unique_sequences {
            println!("    unique: {}", seq.join(" -> "));
        }
    }

    println!("\nWorkflow arcs ({}):", report.workflow_arcs.len());
    for arc in &report.workflow_arcs {
        println!(
            "  {}  ({} sessions, avg {:.1} turns)",
            arc.arc, arc.session_count, arc.avg_turn_count
        );
    }

    println!("\nFriction points ({}):", report.friction_points.len());
    for point in &report.friction_points {
        println!(
            "  {}s gap in {} turn {}: \"{}\" -> \"{}\"",
            point.gap_seconds, point.session_id, point.turn_number, point.prompt, point.next_prompt
        );
    }
}
