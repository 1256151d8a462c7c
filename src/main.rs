use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use dtc_compiler::{CompileConfig, FlatTree, Model, Parallelism, ScoreMode};
use dtc_io::{DatasetReader, write_test_header};

#[derive(Parser)]
#[command(name = "dtc")]
#[command(about = "Compile PMML decision trees and forests into flat binary artifacts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel compilation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a PMML model into a binary artifact
    Compile {
        /// Path to the input PMML document
        #[arg(long)]
        input: PathBuf,

        /// Path of the artifact to write (must end in .bin)
        #[arg(long)]
        output: PathBuf,

        /// Leaf score interpretation: "label" or "numeric"
        #[arg(long, default_value = "label")]
        score_mode: String,

        /// Flatten trees in parallel
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },

    /// Decode an artifact and print its structure
    Inspect {
        /// Path to the binary artifact
        #[arg(long)]
        artifact: PathBuf,

        /// Include every node record in the output
        #[arg(long, default_value_t = false)]
        nodes: bool,
    },

    /// Render a labelled dataset as a C test-vector header
    GenTestVec {
        /// Path to the dataset CSV file
        #[arg(long)]
        dataset: PathBuf,

        /// Name of the column holding the expected class
        #[arg(long, default_value = "Outcome")]
        target_column: String,

        /// Field separator (single byte)
        #[arg(long, default_value = ";")]
        separator: String,

        /// Path of the header to write (must end in .h)
        #[arg(long)]
        output: PathBuf,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct CompileOutput {
    input: String,
    output: String,
    num_classes: u16,
    num_features: u16,
    num_trees: usize,
    num_nodes: usize,
    features: Vec<String>,
    classes: Vec<String>,
}

#[derive(Serialize)]
struct InspectOutput<'a> {
    artifact: String,
    num_classes: u16,
    num_features: u16,
    num_trees: usize,
    trees: Vec<TreeOutput<'a>>,
}

#[derive(Serialize)]
struct TreeOutput<'a> {
    node_count: usize,
    leaves: usize,
    depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    nodes: Option<&'a FlatTree>,
}

#[derive(Serialize)]
struct GenTestVecOutput {
    dataset: String,
    output: String,
    n_samples: usize,
    n_features: usize,
}

fn parse_score_mode(s: &str) -> Result<ScoreMode> {
    match s {
        "label" => Ok(ScoreMode::Label),
        "numeric" => Ok(ScoreMode::Numeric),
        other => anyhow::bail!("unknown score mode: {other} (expected label or numeric)"),
    }
}

fn parse_separator(s: &str) -> Result<u8> {
    match s.as_bytes() {
        [byte] => Ok(*byte),
        _ => anyhow::bail!("separator must be a single byte, got {s:?}"),
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}

fn check_compile_paths(input: &Path, output: &Path) -> Result<()> {
    if has_extension(input, "joblib") {
        anyhow::bail!(
            "{}: joblib models are not supported; export the model to PMML first",
            input.display()
        );
    }
    if !has_extension(input, "pmml") {
        anyhow::bail!("{}: input model must be a .pmml file", input.display());
    }
    if !has_extension(output, "bin") {
        anyhow::bail!("{}: output artifact must be a .bin file", output.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Compile {
            input,
            output,
            score_mode,
            parallel,
        } => {
            check_compile_paths(&input, &output)?;
            let parallelism = if parallel {
                Parallelism::Rayon
            } else {
                Parallelism::Sequential
            };
            let config = CompileConfig::new()
                .with_score_mode(parse_score_mode(&score_mode)?)
                .with_parallelism(parallelism);

            let compilation = config
                .compile_file(&input)
                .with_context(|| format!("failed to compile {}", input.display()))?;
            let model = &compilation.model;
            model
                .save(&output)
                .with_context(|| format!("failed to write artifact {}", output.display()))?;

            let output = CompileOutput {
                input: input.display().to_string(),
                output: output.display().to_string(),
                num_classes: model.num_classes(),
                num_features: model.num_features(),
                num_trees: model.n_trees(),
                num_nodes: model.n_nodes(),
                features: compilation
                    .schema
                    .features()
                    .iter()
                    .map(|f| f.name.clone())
                    .collect(),
                classes: compilation.schema.classes().to_vec(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Inspect { artifact, nodes } => {
            let model = Model::load(&artifact)
                .with_context(|| format!("failed to load artifact {}", artifact.display()))?;

            let trees = model
                .trees()
                .iter()
                .map(|tree| TreeOutput {
                    node_count: tree.len(),
                    leaves: tree.n_leaves(),
                    depth: tree.depth(),
                    nodes: nodes.then_some(tree),
                })
                .collect();
            let output = InspectOutput {
                artifact: artifact.display().to_string(),
                num_classes: model.num_classes(),
                num_features: model.num_features(),
                num_trees: model.n_trees(),
                trees,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::GenTestVec {
            dataset,
            target_column,
            separator,
            output,
        } => {
            if !has_extension(&output, "h") {
                anyhow::bail!("{}: output header must be a .h file", output.display());
            }
            let vectors = DatasetReader::new(&dataset)
                .with_separator(parse_separator(&separator)?)
                .with_target_column(target_column)
                .read()
                .with_context(|| format!("failed to read dataset {}", dataset.display()))?;
            write_test_header(&vectors, &output)
                .with_context(|| format!("failed to write header {}", output.display()))?;

            let output = GenTestVecOutput {
                dataset: dataset.display().to_string(),
                output: output.display().to_string(),
                n_samples: vectors.n_samples(),
                n_features: vectors.n_features(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
