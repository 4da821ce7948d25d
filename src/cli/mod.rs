//! CLI command definitions and handlers

mod io;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use stylometer::classifier::{top_k_labels, Classifier, GbdtClassifier};
use stylometer::config::StylometerConfig;
use stylometer::dataset::{build_dataset, InferenceProjector};
use stylometer::extract::{BatchExtractor, BatchReport, FailureKind, SampleExtractor};
use stylometer::features::Registry;
use stylometer::Sample;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Stylometer - source-code authorship features and attribution
#[derive(Parser, Debug)]
#[command(name = "stylometer")]
#[command(
    version,
    about = "Extract stylometric features from Java snippets and attribute authorship",
    after_help = "\
Input files are JSON Lines, one sample per line:
  {\"id\": \"alice\", \"index\": 3, \"code\": \"class A { }\"}

Examples:
  stylometer extract samples.jsonl -o records.jsonl    Per-sample feature records
  stylometer build samples.jsonl -o dataset.json       Dense dataset over all features
  stylometer train samples.jsonl --model model.json    Fit the GBDT classifier
  stylometer predict unknown.jsonl --model model.json  Top-5 candidate authors
  stylometer features                                  List the calculator battery"
)]
pub struct Cli {
    /// Number of parallel workers (1-64, default: one per core)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Hide the progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract a feature record per sample (JSON Lines output)
    Extract {
        /// Input samples (JSON Lines, `-` for stdin)
        input: PathBuf,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Also write the per-sample failure report as JSON
        #[arg(long)]
        failures: Option<PathBuf>,
    },

    /// Extract and assemble a dense dataset over the union of features
    Build {
        /// Input samples (JSON Lines, `-` for stdin)
        input: PathBuf,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Train a one-vs-rest GBDT classifier; labels are the sample ids
    Train {
        /// Labelled samples (JSON Lines, `-` for stdin)
        input: PathBuf,

        /// Where to write the model
        #[arg(long, short = 'm')]
        model: PathBuf,

        /// Boosting iterations per class
        #[arg(long)]
        num_trees: Option<usize>,

        #[arg(long)]
        max_depth: Option<u32>,

        #[arg(long)]
        learning_rate: Option<f64>,
    },

    /// Rank the most likely authors of each sample
    Predict {
        /// Samples to attribute (JSON Lines, `-` for stdin)
        input: PathBuf,

        /// Trained model
        #[arg(long, short = 'm')]
        model: PathBuf,

        /// Labels per sample (default: 5)
        #[arg(long, short = 'k')]
        top_k: Option<usize>,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// List the registered feature calculators
    Features,
}

pub fn run(cli: Cli) -> Result<()> {
    let mut config = StylometerConfig::load();
    if let Some(workers) = cli.workers {
        config.extract.workers = Some(workers);
    }
    if cli.no_progress {
        config.extract.progress = Some(false);
    }

    match cli.command {
        Commands::Extract {
            input,
            output,
            failures,
        } => {
            let report = extract(&config, &io::read_samples(&input)?)?;
            let mut out = io::open_output(output.as_ref())?;
            io::write_json_lines(&mut *out, &report.extracted)?;

            if let Some(path) = failures {
                let json = serde_json::to_string_pretty(&report.failures)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
            Ok(())
        }

        Commands::Build { input, output } => {
            let report = extract(&config, &io::read_samples(&input)?)?;
            let dataset = build_dataset(&report.extracted);
            info!(
                "Dataset: {} rows x {} features",
                dataset.n_rows(),
                dataset.n_cols()
            );

            let mut out = io::open_output(output.as_ref())?;
            serde_json::to_writer(&mut *out, &dataset.to_file())?;
            out.write_all(b"\n")?;
            out.flush()?;
            Ok(())
        }

        Commands::Train {
            input,
            model,
            num_trees,
            max_depth,
            learning_rate,
        } => {
            if num_trees.is_some() {
                config.train.num_trees = num_trees;
            }
            if max_depth.is_some() {
                config.train.max_depth = max_depth;
            }
            if learning_rate.is_some() {
                config.train.learning_rate = learning_rate;
            }

            let report = extract(&config, &io::read_samples(&input)?)?;
            if report.extracted.is_empty() {
                bail!("no sample could be extracted from {}", input.display());
            }

            let built = build_dataset(&report.extracted);
            let dataset = InferenceProjector::new(built.schema().clone()).project_dataset(&built);
            let labels: Vec<String> = dataset
                .keys()
                .iter()
                .map(|k| k.sample_id.clone())
                .collect();

            let classifier = GbdtClassifier::train(&dataset, &labels, &config.gbdt())?;
            classifier
                .save(&model)
                .with_context(|| format!("writing model to {}", model.display()))?;

            eprintln!(
                "Trained {} classes on {} samples x {} features -> {}",
                classifier.classes().len(),
                dataset.n_rows(),
                dataset.n_cols(),
                model.display()
            );
            Ok(())
        }

        Commands::Predict {
            input,
            model,
            top_k,
            output,
        } => {
            if top_k.is_some() {
                config.predict.top_k = top_k;
            }

            let classifier = GbdtClassifier::load(&model)
                .with_context(|| format!("loading model {}", model.display()))?;
            let report = extract(&config, &io::read_samples(&input)?)?;

            let dataset =
                InferenceProjector::new(classifier.schema().clone()).project(&report.extracted);
            let ranked = top_k_labels(&classifier, &dataset, config.top_k())?;

            let mut out = io::open_output(output.as_ref())?;
            io::write_json_lines(&mut *out, &ranked)?;
            Ok(())
        }

        Commands::Features => {
            let registry = Registry::standard();
            println!("{:<28} {:<10} INPUT", "NAMESPACE", "CATEGORY");
            for calculator in registry.iter() {
                println!(
                    "{:<28} {:<10} {}",
                    calculator.namespace(),
                    calculator.category().to_string(),
                    calculator.input()
                );
            }
            Ok(())
        }
    }
}

/// Create bar progress style
fn create_bar_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("█▓▒░  "))
}

/// Run batch extraction with the configured workers and progress bar.
fn extract(config: &StylometerConfig, samples: &[Sample]) -> Result<BatchReport> {
    let mut batch = BatchExtractor::new(SampleExtractor::java()).with_workers(config.workers());

    let bar = if config.progress() && !samples.is_empty() {
        let bar = ProgressBar::new(samples.len() as u64);
        bar.set_style(create_bar_style()?);
        bar.set_message("extracting");
        let handle = bar.clone();
        batch = batch.with_progress(move |done, _total| handle.set_position(done as u64));
        Some(bar)
    } else {
        None
    };

    let report = batch.run(samples);
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    let report = report.context("feature extraction aborted")?;

    let parse = report.failed(FailureKind::Parse).count();
    let faults = report.failed(FailureKind::CalculatorFault).count();
    if !report.failures.is_empty() {
        eprintln!(
            "Extracted {} of {} samples ({} syntax errors, {} calculator faults)",
            report.extracted.len(),
            report.total(),
            parse,
            faults
        );
    }
    Ok(report)
}
