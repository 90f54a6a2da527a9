//! sensorpath CLI
//!
//! Command-line front end for:
//! - Resolving SensorThings resource paths (`/Things(1)/Datastreams`)
//! - Translating `$filter` expressions and evaluating them against entities
//! - Matching entity change events against MQTT subscription topics

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use sensorpath_filter::{EntitySnapshot, FilterTranslator};
use sensorpath_model::EntityModel;
use sensorpath_mqtt::{ChangeEvent, MatcherConfig, SubscriptionMatcher};
use sensorpath_path::{PathResolver, ResolvedPath};
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "sensorpath")]
#[command(
    author,
    version,
    about = "SensorThings path resolution, filter translation and topic matching"
)]
struct Cli {
    /// Matcher configuration (JSON); missing fields take defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log verbosity: -v info, -vv debug, -vvv trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve resource paths and print each as JSON.
    Resolve {
        /// Resource paths, e.g. `/Things(1)/Datastreams`
        #[arg(required = true)]
        paths: Vec<String>,
        /// Print a colored segment listing instead of JSON
        #[arg(long)]
        human: bool,
    },

    /// Translate a `$filter` expression for an entity type.
    ///
    /// With `--snapshot`, the filter is also evaluated against the entity
    /// snapshot in that file.
    Filter {
        /// Entity type or collection name (`Observation`, `Observations`)
        #[arg(long)]
        entity_type: String,
        /// Filter expression, e.g. `result gt 5`
        filter: String,
        /// Entity snapshot (JSON) to evaluate against
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Print the bound predicate as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print which topics a change event would be published on.
    Match {
        /// Subscription topic (repeatable)
        #[arg(short, long = "topic", required = true)]
        topics: Vec<String>,
        /// Change event (JSON); read from stdin when omitted
        #[arg(long)]
        event: Option<PathBuf>,
    },

    /// List entity types, properties and navigation roles.
    Types,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let model = Arc::new(EntityModel::sensor_things()?);
    info!(types = model.types().count(), "entity model loaded");

    match cli.command {
        Commands::Resolve { paths, human } => cmd_resolve(&model, &config, &paths, human),
        Commands::Filter {
            entity_type,
            filter,
            snapshot,
            json,
        } => cmd_filter(
            &model,
            &config,
            &entity_type,
            &filter,
            snapshot.as_deref(),
            json,
        ),
        Commands::Match { topics, event } => cmd_match(&model, config, &topics, event.as_deref()),
        Commands::Types => cmd_types(&model),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<MatcherConfig> {
    match path {
        Some(path) => read_json(Some(path)).context("loading matcher configuration"),
        None => Ok(MatcherConfig::default()),
    }
}

/// Reads JSON from `path`, or from stdin when `path` is `None`.
fn read_json<T: DeserializeOwned>(path: Option<&Path>) -> Result<T> {
    let text = match path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
        }
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    Ok(serde_json::from_str(&text)?)
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_resolve(
    model: &Arc<EntityModel>,
    config: &MatcherConfig,
    paths: &[String],
    human: bool,
) -> Result<()> {
    let resolver = PathResolver::new(model.clone(), config.path.clone());
    for path in paths {
        let resolved = resolver.resolve(path)?;
        if human {
            print_segments(&resolved);
        } else {
            println!("{}", serde_json::to_string(&resolved)?);
        }
    }
    Ok(())
}

fn print_segments(resolved: &ResolvedPath) {
    println!(
        "{} {} ({:?})",
        "resolved".green().bold(),
        resolved.to_string().bold(),
        resolved.path_type()
    );
    for (i, segment) in resolved.segments().iter().enumerate() {
        let id = segment.identifier.as_deref().unwrap_or("-");
        print!(
            "  {} {} {} id={} {:?}",
            i.to_string().dimmed(),
            segment.collection_name.cyan(),
            segment.entity_type,
            id,
            segment.multiplicity
        );
        match &segment.property_name {
            Some(property) => println!(" property={}", property.yellow()),
            None => println!(),
        }
    }
    if let Some(modifier) = resolved.modifier() {
        println!("  {} {}", "modifier".yellow(), modifier);
    }
}

fn cmd_filter(
    model: &Arc<EntityModel>,
    config: &MatcherConfig,
    entity_type: &str,
    filter: &str,
    snapshot: Option<&Path>,
    json: bool,
) -> Result<()> {
    let translator = FilterTranslator::new(model.clone(), config.filter.clone());
    let expr = translator.parse(filter)?;
    let descriptor = model.describe(entity_type)?;
    let predicate = translator.bind(&expr, descriptor)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&predicate)?);
    } else {
        println!(
            "{} {} on {}",
            "ok".green().bold(),
            expr.to_string().bold(),
            predicate.entity_type().cyan()
        );
    }

    if let Some(path) = snapshot {
        let snapshot: EntitySnapshot = read_json(Some(path))?;
        let verdict = if predicate.evaluate(&snapshot) {
            "match".green().bold()
        } else {
            "no match".red().bold()
        };
        println!("  {} {}({})", verdict, snapshot.entity_type, snapshot.id);
    }
    Ok(())
}

fn cmd_match(
    model: &Arc<EntityModel>,
    config: MatcherConfig,
    topics: &[String],
    event: Option<&Path>,
) -> Result<()> {
    let matcher = SubscriptionMatcher::new(model.clone(), config);
    for topic in topics {
        matcher
            .subscribe("sensorpath-cli", topic)
            .with_context(|| format!("subscribing to {topic}"))?;
    }

    let event: ChangeEvent = read_json(event).context("reading change event")?;
    let matches = matcher.match_event(&event);
    if matches.is_empty() {
        eprintln!(
            "{} no topic matches {}({})",
            "info:".yellow().bold(),
            event.entity_type(),
            event.id()
        );
    }
    for hit in matches {
        println!("  {} {}", "→".cyan(), hit.topic);
    }
    Ok(())
}

fn cmd_types(model: &EntityModel) -> Result<()> {
    for descriptor in model.types() {
        let root = if descriptor.root { "" } else { " (not at root)" };
        println!(
            "{} / {}{}",
            descriptor.name.bold(),
            descriptor.collection.cyan(),
            root.dimmed()
        );
        for (name, kind) in &descriptor.properties {
            println!("    {name}: {kind:?}");
        }
        for edge in model.relations_of(&descriptor.name) {
            println!(
                "    {} {} → {} {:?} (inverse {})",
                "nav".yellow(),
                edge.role,
                edge.target,
                edge.multiplicity,
                edge.inverse
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_flags_count() {
        let cli = Cli::parse_from(["sensorpath", "-vv", "resolve", "/Things(1)", "/Sensors"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Resolve { paths, human } => {
                assert_eq!(paths, vec!["/Things(1)", "/Sensors"]);
                assert!(!human);
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn filter_takes_entity_type_flag() {
        let cli = Cli::try_parse_from([
            "sensorpath",
            "filter",
            "--entity-type",
            "Observations",
            "result gt 5",
        ])
        .unwrap();
        match cli.command {
            Commands::Filter { entity_type, filter, snapshot, .. } => {
                assert_eq!(entity_type, "Observations");
                assert_eq!(filter, "result gt 5");
                assert!(snapshot.is_none());
            }
            _ => panic!("expected filter"),
        }
    }

    #[test]
    fn match_requires_a_topic() {
        assert!(Cli::try_parse_from(["sensorpath", "match"]).is_err());
        let cli = Cli::try_parse_from(["sensorpath", "match", "-t", "/Things", "-t", "/Sensors"]).unwrap();
        match cli.command {
            Commands::Match { topics, event } => {
                assert_eq!(topics, vec!["/Things", "/Sensors"]);
                assert!(event.is_none());
            }
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn config_file_is_optional() {
        assert_eq!(load_config(None).unwrap(), MatcherConfig::default());
        assert!(load_config(Some(Path::new("/nonexistent/sensorpath.json"))).is_err());
    }
}
