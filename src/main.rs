//! dl-taxonomy CLI: inspect taxonomies and definitions of a JSON fixture.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use dl_taxonomy::config::ClassifierConfig;
use dl_taxonomy::fixture::{FixtureSpec, Terminology};
use dl_taxonomy::id::{ConceptSequence, IdentifierService};
use dl_taxonomy::logic::DataTarget;

#[derive(Parser)]
#[command(name = "dl-taxonomy", version, about = "Description-logic taxonomy tools")]
struct Cli {
    /// Classifier configuration (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and print a taxonomy graph.
    Taxonomy {
        /// Path to the JSON fixture.
        #[arg(long)]
        fixture: PathBuf,

        /// Print the inferred instead of the stated taxonomy.
        #[arg(long)]
        inferred: bool,
    },

    /// Print the latest stated definition of a concept, indented.
    Render {
        #[arg(long)]
        fixture: PathBuf,

        /// Concept label.
        #[arg(long)]
        concept: String,
    },

    /// Print every definition version of a concept with diffs between them.
    Revisions {
        #[arg(long)]
        fixture: PathBuf,

        #[arg(long)]
        concept: String,
    },

    /// Print the root identity and encoded sizes of a concept's definition.
    Identity {
        #[arg(long)]
        fixture: PathBuf,

        #[arg(long)]
        concept: String,
    },

    /// Run a full classification with the structural reasoner.
    Classify {
        #[arg(long)]
        fixture: PathBuf,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ClassifierConfig::load(path)?,
        None => ClassifierConfig::default(),
    };

    match cli.command {
        Commands::Taxonomy { fixture, inferred } => {
            let terminology = load(&fixture)?;
            let classifier = terminology.classifier(&config)?;
            let graph = if inferred {
                classifier.get_inferred_taxonomy_graph()
            } else {
                classifier.get_stated_taxonomy_graph()
            };
            println!(
                "{} taxonomy: {} concepts, {} edges",
                graph.premise(),
                graph.concept_count(),
                graph.edge_count()
            );
            print!("{}", graph.render(|s| sequence_label(&terminology, s)));
            for dropped in graph.dropped_edges() {
                println!(
                    "dropped: {} -> {}",
                    sequence_label(&terminology, dropped.origin),
                    dropped.destination
                );
            }
        }

        Commands::Render { fixture, concept } => {
            let terminology = load(&fixture)?;
            let nid = terminology.concept(&concept)?;
            let coords = &terminology.coordinates;
            match terminology
                .versions
                .latest(nid, coords.logic.stated_assemblage, &coords.stamp)?
            {
                Some(latest) => {
                    let (latest, contradictions) = latest.into_parts();
                    println!("{concept} {}", latest.stamp);
                    print!("{}", latest.value.render());
                    for contradiction in contradictions {
                        println!("contradiction {}", contradiction.stamp);
                        print!("{}", contradiction.value.render());
                    }
                }
                None => println!("{concept} has no definition"),
            }
        }

        Commands::Revisions { fixture, concept } => {
            let terminology = load(&fixture)?;
            let classifier = terminology.classifier(&config)?;
            let nid = terminology.concept(&concept)?;
            let report = classifier.revision_report(
                nid,
                terminology.coordinates.logic.stated_assemblage,
                &concept,
            )?;
            print!("{report}");
        }

        Commands::Identity { fixture, concept } => {
            let terminology = load(&fixture)?;
            let nid = terminology.concept(&concept)?;
            let coords = &terminology.coordinates;
            let Some(latest) = terminology
                .versions
                .latest(nid, coords.logic.stated_assemblage, &coords.stamp)?
            else {
                println!("{concept} has no definition");
                return Ok(());
            };
            let ids = terminology.ids.as_ref();
            let definition = latest.value();
            let identity = definition.root_identity(ids)?;
            let internal = definition.encode(DataTarget::Internal, ids)?;
            let external = definition.encode(DataTarget::External, ids)?;
            println!("{concept}");
            println!("  root identity: {identity}");
            println!("  nodes:         {}", definition.node_count());
            println!("  internal:      {} bytes", internal.len());
            println!("  external:      {} bytes", external.len());
        }

        Commands::Classify { fixture } => {
            let terminology = load(&fixture)?;
            let classifier = terminology.classifier(&config)?;
            let results = classifier.classify().wait()?;
            println!(
                "classified {} concept(s), {} equivalent set(s)",
                results.affected_concepts.len(),
                results.equivalent_sets.len()
            );
            for set in &results.equivalent_sets {
                let labels: Vec<String> =
                    set.iter().map(|s| sequence_label(&terminology, *s)).collect();
                println!("  equivalent: {}", labels.join(", "));
            }
            println!("{}", serde_json::to_string_pretty(&results).into_diagnostic()?);
            classifier.shutdown();
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<Terminology> {
    let spec = FixtureSpec::load(path)?;
    Ok(Terminology::load(&spec)?)
}

fn sequence_label(terminology: &Terminology, sequence: ConceptSequence) -> String {
    match terminology.ids.sequence_to_local(sequence) {
        Ok(nid) => terminology.label(nid),
        Err(_) => sequence.to_string(),
    }
}
