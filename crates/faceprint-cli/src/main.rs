use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use faceprint_core::{
    codec, DetectedFaceGeometry, EnrolledRecord, FaceNormalizer, Matcher, MatchPolicy, Scorer,
};

mod config;

#[derive(Parser)]
#[command(name = "faceprint", about = "Facial geometry feature records and matching")]
struct Cli {
    /// Match policy TOML file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode detector geometry (JSON) into a feature record
    Encode {
        /// Detected face geometry JSON file
        geometry: PathBuf,
        /// Emit the versioned JSON record instead of the text record
        #[arg(long)]
        json: bool,
    },
    /// Compare two stored feature records
    Compare {
        first: PathBuf,
        second: PathBuf,
        /// List every contributed feature score
        #[arg(long)]
        explain: bool,
        /// Print the comparison report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find the best match for a probe record in a gallery
    Identify {
        probe: PathBuf,
        /// JSON array of {"id", "label", "record"} entries
        gallery: PathBuf,
    },
    /// Print the effective match policy
    Policy,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let policy = config::load_policy(cli.config.as_deref())?;

    match cli.command {
        Commands::Encode { geometry, json } => run_encode(&geometry, json, policy),
        Commands::Compare {
            first,
            second,
            explain,
            json,
        } => run_compare(&first, &second, explain, json, policy),
        Commands::Identify { probe, gallery } => run_identify(&probe, &gallery, policy),
        Commands::Policy => {
            print!("{}", toml::to_string(&policy).context("rendering policy")?);
            Ok(())
        }
    }
}

fn run_encode(path: &Path, json: bool, policy: MatchPolicy) -> Result<()> {
    let raw = read(path)?;
    let geometry: DetectedFaceGeometry = serde_json::from_str(&raw)
        .with_context(|| format!("parsing geometry from {}", path.display()))?;

    let normalizer = FaceNormalizer::new(policy);
    let record = match normalizer.normalize(&geometry) {
        Ok(record) => record,
        Err(rejection) => bail!("capture rejected: {rejection}"),
    };

    if json {
        println!("{}", codec::to_versioned_json(&record)?);
    } else {
        println!("{}", codec::serialize(&record));
    }
    Ok(())
}

fn run_compare(
    first: &Path,
    second: &Path,
    explain: bool,
    json: bool,
    policy: MatchPolicy,
) -> Result<()> {
    let a = read(first)?;
    let b = read(second)?;
    let report = Scorer::new(policy).explain(&a, &b);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if explain {
        for score in &report.features {
            println!("{:<14} {:.4}", score.feature, score.similarity);
        }
        if report.pose_rejected {
            println!("head rotation difference too large");
        }
    }
    println!(
        "similarity: {:.1}% ({})",
        report.result.percentage,
        if report.result.matched { "match" } else { "no match" }
    );
    Ok(())
}

fn run_identify(probe: &Path, gallery: &Path, policy: MatchPolicy) -> Result<()> {
    let probe = read(probe)?;
    let entries: Vec<EnrolledRecord> = serde_json::from_str(&read(gallery)?)
        .with_context(|| format!("parsing gallery from {}", gallery.display()))?;
    tracing::info!(entries = entries.len(), "loaded gallery");

    let result = Scorer::new(policy).best_match(&probe, &entries);
    match (&result.record_id, &result.record_label) {
        (Some(id), Some(label)) if result.matched => {
            println!("match: {id} ({label}) at {:.1}%", result.percentage);
        }
        _ => println!("no match (best {:.1}%)", result.percentage),
    }
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
