//! Ontograph CLI
//!
//! Command-line access to an ontology repository kept in a graph snapshot:
//! - Importing schema documents (`.json` declarations, `.nt` / `.ttl` / `.owl` RDF)
//! - Dumping the client ontology as JSON
//! - Printing the concept hierarchy

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use ontograph_graph::InMemoryGraph;
use ontograph_ingest_owl::OwlSchemaParser;
use ontograph_ontology::{
    vocab, AuthorizationGate, Concept, ImportOutcome, InMemoryAuthorizationRepository,
    JsonSchemaParser, OntologyRepository, ParsedOntology, RepositoryConfig, SandboxStatus,
    SchemaDocument, SchemaParser, User,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ontograph")]
#[command(author, version, about = "Ontograph: versioned ontology schema repository")]
struct Cli {
    /// Graph snapshot file (created on first write)
    #[arg(short, long, global = true, default_value = "ontograph.json")]
    graph: PathBuf,

    /// Repository configuration (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import schema documents in the order given.
    ///
    /// Unchanged documents (same content hash as the stored copy) are skipped.
    Import {
        /// Schema files (`.json`, `.nt`, `.ttl`, `.owl`)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Document IRI; only valid with a single file. Defaults to a `file://` IRI.
        #[arg(long)]
        iri: Option<String>,
    },

    /// Print the client ontology as JSON.
    Dump {
        /// Workspace whose sandbox is merged over the public schema
        #[arg(short, long)]
        workspace: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the concept hierarchy.
    Tree {
        #[arg(short, long)]
        workspace: Option<String>,

        /// Also list each concept's properties
        #[arg(long)]
        properties: bool,
    },
}

// ============================================================================
// Schema format dispatch
// ============================================================================

/// Picks a parser by the document IRI's extension. Context documents of the
/// other format are not passed on.
struct ExtensionParser {
    json: JsonSchemaParser,
    owl: OwlSchemaParser,
}

impl ExtensionParser {
    fn new() -> Self {
        Self {
            json: JsonSchemaParser,
            owl: OwlSchemaParser::new(),
        }
    }

    fn is_json(iri: &str) -> bool {
        extension(iri).is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    }
}

fn extension(iri: &str) -> Option<&str> {
    let name = iri.rsplit(['/', '\\']).next()?;
    name.rsplit_once('.').map(|(_, ext)| ext)
}

impl SchemaParser for ExtensionParser {
    fn parse(
        &self,
        document: &SchemaDocument,
        context: &[SchemaDocument],
    ) -> ontograph_ontology::Result<ParsedOntology> {
        let json = Self::is_json(&document.iri);
        let context: Vec<SchemaDocument> = context
            .iter()
            .filter(|doc| Self::is_json(&doc.iri) == json)
            .cloned()
            .collect();
        if json {
            self.json.parse(document, &context)
        } else {
            self.owl.parse(document, &context)
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn open_repository(graph_path: &Path, config: Option<&Path>) -> Result<OntologyRepository> {
    let graph = Arc::new(
        InMemoryGraph::open(graph_path)
            .with_context(|| format!("opening graph snapshot {}", graph_path.display()))?,
    );
    let config = match config {
        Some(path) => RepositoryConfig::from_json_file(path)?,
        None => RepositoryConfig::default(),
    };
    tracing::debug!(graph = %graph_path.display(), "opening ontology repository");
    let auth = Arc::new(InMemoryAuthorizationRepository::new());
    let repo = OntologyRepository::builder(graph, AuthorizationGate::new(auth.clone(), auth))
        .config(config)
        .parser(Arc::new(ExtensionParser::new()))
        .build()?;
    Ok(repo)
}

fn document_iri(path: &Path) -> Result<String> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("resolving {}", path.display()))?;
    Ok(format!("file://{}", canonical.display()))
}

fn cmd_import(repo: &OntologyRepository, files: &[PathBuf], iri: Option<&str>) -> Result<()> {
    if iri.is_some() && files.len() > 1 {
        return Err(anyhow!("--iri can only be used with a single file"));
    }
    let user = User::system();
    for file in files {
        let iri = match iri {
            Some(iri) => iri.to_string(),
            None => document_iri(file)?,
        };
        let outcome = repo.import_file(file, &iri, &user)?;
        tracing::info!(file = %file.display(), document = %iri, ?outcome, "import finished");
        match outcome {
            ImportOutcome::Unchanged => {
                eprintln!("{} {} (unchanged)", "skip".yellow().bold(), file.display());
            }
            ImportOutcome::Imported { index, counts } => {
                eprintln!(
                    "{} {} #{index}: {} concepts, {} relationships, {} properties, {} annotation properties",
                    "ok".green().bold(),
                    file.display(),
                    counts.concepts,
                    counts.relationships,
                    counts.properties,
                    counts.annotation_properties,
                );
            }
        }
    }
    Ok(())
}

fn cmd_dump(repo: &OntologyRepository, workspace: Option<&str>, out: Option<&Path>) -> Result<()> {
    let ontology = repo.view_for(&User::system(), workspace)?.client_api();
    tracing::info!(
        workspace = ?workspace,
        concepts = ontology.concepts.len(),
        relationships = ontology.relationships.len(),
        properties = ontology.properties.len(),
        "dumping client ontology"
    );
    let json = serde_json::to_string_pretty(&ontology)?;
    match out {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Depth-first rows of the hierarchy under `root`, children sorted by IRI.
fn tree_rows<'a>(concepts: &'a [Concept], root: &str) -> Vec<(usize, &'a Concept)> {
    let mut children: BTreeMap<&str, Vec<&Concept>> = BTreeMap::new();
    for concept in concepts {
        if let Some(parent) = concept.parent_iri.as_deref() {
            children.entry(parent).or_default().push(concept);
        }
    }
    for list in children.values_mut() {
        list.sort_by(|a, b| a.iri.cmp(&b.iri));
    }

    let mut rows = Vec::new();
    let mut stack: Vec<(usize, &Concept)> = concepts
        .iter()
        .filter(|c| c.iri == root)
        .map(|c| (0, c))
        .collect();
    while let Some((depth, concept)) = stack.pop() {
        rows.push((depth, concept));
        if let Some(kids) = children.get(concept.iri.as_str()) {
            stack.extend(kids.iter().rev().map(|kid| (depth + 1, *kid)));
        }
    }
    rows
}

fn cmd_tree(repo: &OntologyRepository, workspace: Option<&str>, properties: bool) -> Result<()> {
    let view = repo.view_for(&User::system(), workspace)?;
    for (depth, concept) in tree_rows(view.concepts(), vocab::ROOT_CONCEPT_IRI) {
        let indent = "  ".repeat(depth);
        let status = match concept.sandbox_status {
            SandboxStatus::Public => String::new(),
            SandboxStatus::Private => format!(" {}", "[private]".yellow()),
            SandboxStatus::PublicChanged => format!(" {}", "[changed]".cyan()),
        };
        println!(
            "{indent}{} {}{status}",
            concept.display_label().bold(),
            concept.iri.dimmed()
        );
        if properties {
            for property in concept.property_iris() {
                println!("{indent}    - {}", property.dimmed());
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let repo = open_repository(&cli.graph, cli.config.as_deref())?;

    match cli.command {
        Commands::Import { files, iri } => cmd_import(&repo, &files, iri.as_deref())?,
        Commands::Dump { workspace, out } => cmd_dump(&repo, workspace.as_deref(), out.as_deref())?,
        Commands::Tree {
            workspace,
            properties,
        } => cmd_tree(&repo, workspace.as_deref(), properties)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_picks_the_parser() {
        assert!(ExtensionParser::is_json("file:///tmp/schema.JSON"));
        assert!(!ExtensionParser::is_json("file:///tmp/schema.nt"));
        assert!(!ExtensionParser::is_json("http://x/no-extension"));
        assert_eq!(extension("file:///a.b/c.owl"), Some("owl"));
    }

    #[test]
    fn dispatch_filters_context_by_format() {
        let parser = ExtensionParser::new();
        let json = SchemaDocument::new("file:///a.json", r#"{"concepts":[{"iri":"http://x#a"}]}"#);
        // a broken owl document in context must not be reported for a json import
        let owl = SchemaDocument::new("file:///b.nt", "<http://x#b> a");
        let parsed = parser.parse(&json, &[owl]).unwrap();
        assert_eq!(parsed.concepts.len(), 1);
        assert!(parsed.import_errors.is_empty());
    }

    #[test]
    fn import_then_tree_over_a_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("schema.ttl");
        std::fs::write(
            &schema,
            "@prefix owl: <http://www.w3.org/2002/07/owl#> .\n\
             @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .\n\
             <http://x#animal> a owl:Class .\n\
             <http://x#dog> a owl:Class ; rdfs:subClassOf <http://x#animal> .\n\
             <http://x#cat> a owl:Class ; rdfs:subClassOf <http://x#animal> .\n",
        )
        .unwrap();
        let snapshot = dir.path().join("graph.json");

        {
            let repo = open_repository(&snapshot, None).unwrap();
            cmd_import(&repo, &[schema.clone()], None).unwrap();
        }
        let repo = open_repository(&snapshot, None).unwrap();
        let concepts = repo.get_concepts_with_properties(None).unwrap();
        let rows: Vec<(usize, &str)> = tree_rows(&concepts, vocab::ROOT_CONCEPT_IRI)
            .into_iter()
            .map(|(depth, c)| (depth, c.iri.as_str()))
            .filter(|(_, iri)| iri.starts_with("http://x#") || *iri == vocab::ENTITY_CONCEPT_IRI)
            .collect();
        assert_eq!(
            rows,
            vec![
                (1, vocab::ENTITY_CONCEPT_IRI),
                (2, "http://x#animal"),
                (3, "http://x#cat"),
                (3, "http://x#dog"),
            ]
        );

        assert!(cmd_import(&repo, &[schema.clone(), schema], Some("http://x/doc")).is_err());

        let out = dir.path().join("client.json");
        cmd_dump(&repo, None, Some(&out)).unwrap();
        let client: serde_json::Value = serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        assert!(client["concepts"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c["title"] == "http://x#dog"));
    }
}
