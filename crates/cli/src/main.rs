//! # vacuum-dryer
//!
//! Command line front end for the vacuum dryer sequencer.
//!
//! ```bash
//! # Run the default recipe from .vacuum-dryer/ on the simulated card
//! vacuum-dryer run
//!
//! # Run a recipe file with debug logging
//! vacuum-dryer run --recipe recipes/pi-film.json -v
//!
//! # Inspect recipes and the process tree
//! vacuum-dryer recipe show recipes/pi-film.json
//! vacuum-dryer recipe validate recipes/pi-film.json
//! vacuum-dryer tree
//! ```

mod render;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, Result, WrapErr};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;
use vd_core::config::loader::{
    list_recipes, load_config, load_recipe_file, parse_recipe_file, save_recipe, CONFIG_DIR,
};
use vd_core::engine::RunOutcome;
use vd_core::hal::simulation::SimulatedMotionCard;
use vd_core::state::VacuumProcessController;
use vd_protocol::ipc::Event;
use vd_protocol::recipe_models::ProcessRecipe;

/// Vacuum dryer process sequencer
#[derive(Parser, Debug)]
#[command(name = "vacuum-dryer")]
#[command(version)]
#[command(about = "Run and inspect vacuum-drying processes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the process on the simulated motion card
    Run {
        /// Recipe file to run instead of the configured default
        #[arg(short, long, value_name = "FILE")]
        recipe: Option<PathBuf>,

        /// Directory containing `.vacuum-dryer/`
        #[arg(long, value_name = "DIR", default_value = ".")]
        config_root: PathBuf,
    },

    /// Inspect and create recipe documents
    Recipe {
        #[command(subcommand)]
        command: RecipeCommand,
    },

    /// Print the default process tree
    Tree,
}

#[derive(Subcommand, Debug)]
enum RecipeCommand {
    /// Print a recipe as JSON (the built-in default without FILE)
    Show { file: Option<PathBuf> },

    /// Check a recipe file and report every problem
    Validate { file: PathBuf },

    /// Write the default recipe into DIR
    Init {
        dir: PathBuf,

        /// Name of the new recipe
        #[arg(long, default_value = "Default")]
        name: String,
    },

    /// List the recipes under `.vacuum-dryer/recipes/`
    List {
        #[arg(long, value_name = "DIR", default_value = ".")]
        config_root: PathBuf,
    },
}

fn setup_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    match cli.command {
        Command::Run { recipe, config_root } => {
            let success = run_process(recipe.as_deref(), &config_root).await?;
            if !success {
                std::process::exit(1);
            }
        }
        Command::Recipe { command } => recipe_command(command)?,
        Command::Tree => print!("{}", VacuumProcessController::default_tree().outline()),
    }
    Ok(())
}

async fn run_process(recipe_path: Option<&Path>, config_root: &Path) -> Result<bool> {
    let config = load_config(config_root)
        .await
        .wrap_err_with(|| format!("loading {}", config_root.join(CONFIG_DIR).display()))?;
    let recipe = match recipe_path {
        Some(path) => load_recipe_file(path)?,
        None => config.default_recipe(),
    };
    info!(recipe = %recipe.name, "starting vacuum process");

    let card = SimulatedMotionCard::new();
    let (events_tx, mut events_rx) = mpsc::channel::<Event>(256);
    let controller = Arc::new(VacuumProcessController::new(&card, &config.machine, recipe, events_tx)?);

    controller
        .initialize_axes(&CancellationToken::new())
        .await
        .wrap_err("initializing axes")?;

    let mut run = controller.start_background()?;
    let mut outcome = None;
    let mut stopping = false;

    loop {
        tokio::select! {
            Some(event) = events_rx.recv() => {
                render::print_event(&event);
                if matches!(event, Event::ProcessCompleted { .. }) {
                    break;
                }
            }
            result = &mut run, if outcome.is_none() => {
                outcome = Some(result?);
            }
            _ = tokio::signal::ctrl_c(), if !stopping => {
                warn!("interrupt received, stopping the process");
                stopping = true;
                controller.stop().await;
            }
        }
    }

    let outcome = match outcome {
        Some(outcome) => outcome,
        None => run.await?,
    };
    match &outcome {
        RunOutcome::Completed => {}
        RunOutcome::Failed { node_id, reason } => {
            eprintln!("{} {node_id}: {reason}", "step failed:".red().bold());
        }
        RunOutcome::Cancelled => eprintln!("{}", "process stopped".yellow()),
    }
    Ok(outcome.is_success())
}

fn recipe_command(command: RecipeCommand) -> Result<()> {
    match command {
        RecipeCommand::Show { file } => {
            let recipe = match file {
                Some(path) => load_recipe_file(&path)?,
                None => ProcessRecipe::default(),
            };
            println!("{}", serde_json::to_string_pretty(&recipe)?);
        }
        RecipeCommand::Validate { file } => {
            let recipe = parse_recipe_file(&file)?;
            let problems = recipe.validate();
            if !problems.is_empty() {
                for problem in &problems {
                    eprintln!("{} {problem}", "✘".red());
                }
                bail!("{} has {} problem(s)", file.display(), problems.len());
            }
            println!("{} {} is valid", "✔".green(), recipe.name);
        }
        RecipeCommand::Init { dir, name } => {
            let recipe = ProcessRecipe {
                name,
                ..ProcessRecipe::default()
            };
            let path = save_recipe(&dir, &recipe)?;
            println!("{} wrote {}", "✔".green(), path.display());
        }
        RecipeCommand::List { config_root } => {
            let dir = config_root.join(CONFIG_DIR).join("recipes");
            for name in list_recipes(&dir)? {
                println!("{name}");
            }
        }
    }
    Ok(())
}
