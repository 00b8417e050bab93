//! enzo-harness CLI - Build configuration and answer testing for Enzo-E.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use enzo_harness::verifier::compute_statistics;
use enzo_harness::{
    AnswerVerifier, BaselineStore, Config, Dataset, HarnessError, Mode, Platform, Precision,
    SimulationRunner, SystemHost, TestOutcome, TolerancePolicy, resolve, resolver,
};
use std::path::{Path, PathBuf};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "enzo-harness")]
#[command(author = "Enzo-E Developers")]
#[command(version)]
#[command(about = "Resolve Enzo-E build dependencies and run answer tests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "harness.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported platforms
    Platforms,

    /// Resolve the build configuration for a platform
    Resolve {
        /// Platform identifier (e.g. linux_gnu)
        #[arg(short, long)]
        platform: String,

        /// Double-precision build (default: from USE_DOUBLE)
        #[arg(long)]
        double: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Toml)]
        format: Format,
    },

    /// Compute field statistics for a dataset
    Stats {
        /// Directory containing the dataset
        dir: PathBuf,

        /// Dataset name (reads <dir>/<name>/<name>.block_list)
        name: String,
    },

    /// Run answer tests and compare against (or record) baselines
    Verify {
        /// Only run these tests (default: all)
        #[arg(short, long)]
        test: Vec<String>,

        /// Record results as the new baselines
        #[arg(long)]
        store: bool,

        /// Use existing simulation output instead of running the simulation
        #[arg(long)]
        skip_run: bool,

        /// Double-precision build (default: config, then USE_DOUBLE)
        #[arg(long)]
        double: bool,
    },

    /// List recorded baselines
    Baselines,

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Toml,
    Json,
    /// Flat key = value settings
    Settings,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# enzo-harness configuration file

[build]
# Platform used to decide which answer tests can run
platform = "linux_gnu"

[simulation]
launcher = "${CHARM_HOME}/bin/charmrun"
launcher_args = ["++local"]
executable = "bin/enzo-e"
input_dir = "input"
work_dir = "answer-runs"

[answers]
dir = "answers"
# precision = "double"   # default: USE_DOUBLE env var
single_decimals = 6
double_decimals = 14

[[tests]]
name = "grackle_general"
parameter_file = "Grackle/method_grackle_general.in"
dataset = "GeneralGrackle-500.00"
ncpus = 4
max_runtime_secs = 60
requires = ["grackle"]
"#;
    println!("{example}");
}

fn select_precision(double: bool, configured: Option<Precision>) -> Precision {
    if double {
        return Precision::Double;
    }
    configured.unwrap_or_else(|| resolver::precision_from_env(&SystemHost))
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("Failed to load config from {path:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
        }

        Commands::Platforms => {
            for platform in Platform::ALL {
                println!("{platform}");
            }
        }

        Commands::Resolve {
            platform,
            double,
            format,
        } => {
            let platform: Platform = platform.parse()?;
            let build = resolve(platform, select_precision(double, None), &SystemHost)?;

            match format {
                Format::Toml => print!("{}", toml::to_string_pretty(&build)?),
                Format::Json => println!("{}", serde_json::to_string_pretty(&build)?),
                Format::Settings => {
                    for (key, value) in build.settings() {
                        println!("{key} = {value}");
                    }
                }
            }
        }

        Commands::Stats { dir, name } => {
            let dataset = Dataset::load(&dir, &name)
                .with_context(|| format!("Failed to load dataset {name} from {dir:?}"))?;
            let record = compute_statistics(&dataset)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Commands::Baselines => {
            let config = load_config(&cli.config)?;
            let store = BaselineStore::new(&config.answers.dir_path())?;
            let names = store.list()?;
            if names.is_empty() {
                info!("No baselines recorded in {:?}", store.dir());
            }
            for name in names {
                println!("{name}");
            }
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;

            if let Some(platform) = &config.build.platform {
                platform
                    .parse::<Platform>()
                    .context("Invalid [build] platform")?;
            }

            info!("Configuration is valid");
            info!("  Platform: {}", config.build.platform.as_deref().unwrap_or("(none)"));
            info!("  Answer tests: {}", config.tests.len());
            info!("  Baselines: {}", config.answers.dir);
        }

        Commands::Verify {
            test,
            store,
            skip_run,
            double,
        } => {
            let config = load_config(&cli.config)?;
            let precision = select_precision(double, config.answers.precision);
            let policy = TolerancePolicy::from_config(precision, &config.answers);

            let runner = SimulationRunner::from_config(&config.simulation).with_progress(true);
            let baselines = BaselineStore::new(&config.answers.dir_path())?;
            let mut verifier = AnswerVerifier::new(runner, baselines, policy).skip_run(skip_run);

            if let Some(platform) = &config.build.platform {
                let build = resolve(platform.parse()?, precision, &SystemHost)
                    .context("Failed to resolve build configuration")?;
                verifier = verifier.with_build(build);
            }

            let selected: Vec<_> = if test.is_empty() {
                config.tests.iter().collect()
            } else {
                test.iter()
                    .map(|name| {
                        config
                            .test(name)
                            .ok_or_else(|| HarnessError::UnknownTest(name.clone()))
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };

            if selected.is_empty() {
                bail!("No answer tests configured in {:?}", cli.config);
            }

            let mode = if store { Mode::Store } else { Mode::Compare };
            info!(
                run_id = %verifier.run_id(),
                tests = selected.len(),
                %precision,
                "Starting answer tests"
            );

            let mut failed = 0usize;
            let mut errored = 0usize;
            let mut skipped = 0usize;

            for spec in &selected {
                match verifier.verify(spec, mode).await {
                    Ok(TestOutcome::Compared(report)) => {
                        println!("{}", report.summary());
                        if !report.passed() {
                            failed += 1;
                        }
                    }
                    Ok(TestOutcome::Stored { path, values }) => {
                        println!("{}: stored {values} statistics in {path:?}", spec.name);
                    }
                    Ok(TestOutcome::Skipped { missing }) => {
                        let names: Vec<_> = missing.iter().map(ToString::to_string).collect();
                        println!("{}: skipped (build lacks {})", spec.name, names.join(", "));
                        skipped += 1;
                    }
                    Err(e) if e.is_operator_fixable() => {
                        warn!(test = %spec.name, error = %e, "Answer test needs operator action");
                        println!("{}: error: {e}", spec.name);
                        println!("  (fix the configuration, or record a baseline with --store)");
                        errored += 1;
                    }
                    Err(e) => {
                        warn!(test = %spec.name, error = %e, "Answer test errored");
                        println!("{}: error: {e}", spec.name);
                        errored += 1;
                    }
                }
            }

            println!("\n=== Answer Tests Complete ===");
            println!("Tests:    {}", selected.len());
            println!("Failed:   {failed}");
            println!("Errored:  {errored}");
            println!("Skipped:  {skipped}");

            if failed + errored > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
