//! CLI tool for building team slides from consultant CVs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use team_engine::{EngineConfig, GeneratedSlide, SlotOutcome, TeamSlideEngine};

/// Build a four-person team slide from individual CV presentations.
#[derive(Parser, Debug)]
#[command(name = "team-slide")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory of CV documents (overrides the configuration)
    #[arg(short, long, global = true)]
    sources: Option<PathBuf>,

    /// Team slide template (overrides the configuration)
    #[arg(short, long, global = true)]
    template: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the team slide for four names, in quadrant order
    Generate {
        /// Consultant names, e.g. "Ada Byron"
        #[arg(required = true)]
        names: Vec<String>,

        /// Output file
        #[arg(short, long, default_value = "Team_Slide.pptx")]
        output: PathBuf,
    },

    /// Print the fields extracted for one name as JSON
    Extract {
        /// Consultant name
        name: String,
    },

    /// List the CV documents names are matched against
    List,

    /// Print the template's text and image slots as JSON
    Inspect,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let config = load_config(&args)?;
    log::debug!("Configuration: {:?}", config);
    let engine = TeamSlideEngine::new(config);

    match &args.command {
        Command::Generate { names, output } => generate(&engine, names, output),
        Command::Extract { name } => extract(&engine, name),
        Command::List => list(&engine),
        Command::Inspect => inspect(&engine),
    }
}

/// Configuration file (or defaults) with command-line overrides applied.
fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => EngineConfig::default(),
    };

    if let Some(sources) = &args.sources {
        config = config.with_source_dir(sources);
    }
    if let Some(template) = &args.template {
        config = config.with_template_path(template);
    }
    Ok(config)
}

fn generate(engine: &TeamSlideEngine, names: &[String], output: &Path) -> Result<()> {
    let slide = engine
        .generate_to_path(names, output)
        .with_context(|| format!("Failed to build team slide {}", output.display()))?;

    print_summary(names, &slide);
    eprintln!("Written to: {}", output.display());
    Ok(())
}

fn print_summary(names: &[String], slide: &GeneratedSlide) {
    for (idx, (name, outcome)) in names.iter().zip(&slide.outcomes).enumerate() {
        match outcome {
            SlotOutcome::Extracted { path } => {
                let file = path.file_name().map(|f| f.to_string_lossy()).unwrap_or_default();
                eprintln!("  {}. {}: {}", idx + 1, name.trim(), file);
            }
            SlotOutcome::Fallback { reason } => {
                eprintln!("  {}. {}: fallback ({})", idx + 1, name.trim(), reason);
            }
        }
    }
    if slide.fallback_count() > 0 {
        eprintln!("{} of {} quadrants use fallback data", slide.fallback_count(), slide.outcomes.len());
    }
}

fn extract(engine: &TeamSlideEngine, name: &str) -> Result<()> {
    let (record, path) = engine
        .extract(name)
        .with_context(|| format!("Failed to extract '{}'", name))?;

    let mut value = serde_json::to_value(&record)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("source".into(), path.display().to_string().into());
        object.insert(
            "photo_bytes".into(),
            record.photo.as_ref().map_or(0, Vec::len).into(),
        );
    }

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn list(engine: &TeamSlideEngine) -> Result<()> {
    let index = engine.source_index().with_context(|| {
        format!(
            "Failed to list {}",
            engine.config().source_dir.display()
        )
    })?;

    if index.is_empty() {
        eprintln!("No CV documents in {}", index.dir().display());
    }
    for path in index.candidates() {
        if let Some(file) = path.file_name() {
            println!("{}", file.to_string_lossy());
        }
    }
    Ok(())
}

fn inspect(engine: &TeamSlideEngine) -> Result<()> {
    let layout = engine.inspect_template().with_context(|| {
        format!(
            "Failed to inspect {}",
            engine.config().template_path.display()
        )
    })?;

    println!("{}", serde_json::to_string_pretty(&layout)?);
    Ok(())
}
