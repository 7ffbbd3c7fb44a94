#![forbid(unsafe_code)]

//! Ramsta CLI: canonicalize XML documents.

use clap::{Parser, Subcommand};
use ramsta_c14n::{C14nMode, Canonicalizer};
use ramsta_core::{algorithm, Error};
use ramsta_xml::Document;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;
use tracing::info;

#[derive(Parser)]
#[command(name = "ramsta", about = "Ramsta: pure Rust Canonical XML (C14N)", version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Canonicalize an XML document
    Canonicalize {
        /// Input XML file
        file: PathBuf,

        /// Algorithm: c14n, c14n11, exc-c14n, or an algorithm URI
        #[arg(short, long, default_value = "c14n")]
        algorithm: String,

        /// Keep comments
        #[arg(long = "with-comments")]
        with_comments: bool,

        /// Canonicalize only the element with this ID
        #[arg(long)]
        id: Option<String>,

        /// Leave out the element with this ID and its subtree
        #[arg(long = "exclude-id")]
        exclude_id: Option<String>,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,

        /// InclusiveNamespaces PrefixList for exclusive canonicalization
        #[arg(long = "inclusive-prefixes")]
        inclusive_prefixes: Option<String>,

        /// Write each character above U+FFFF as "??", one "?" per UTF-16 unit
        #[arg(long = "legacy-surrogates")]
        legacy_surrogates: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List supported canonicalization algorithms
    Info,
}

struct CanonicalizeArgs {
    file: PathBuf,
    algorithm: String,
    with_comments: bool,
    id: Option<String>,
    exclude_id: Option<String>,
    id_attr: Vec<String>,
    inclusive_prefixes: Option<String>,
    legacy_surrogates: bool,
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let result = match cli.command {
        Commands::Canonicalize {
            file,
            algorithm,
            with_comments,
            id,
            exclude_id,
            id_attr,
            inclusive_prefixes,
            legacy_surrogates,
            output,
        } => cmd_canonicalize(CanonicalizeArgs {
            file,
            algorithm,
            with_comments,
            id,
            exclude_id,
            id_attr,
            inclusive_prefixes,
            legacy_surrogates,
            output,
        }),
        Commands::Info => cmd_info(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn cmd_canonicalize(args: CanonicalizeArgs) -> Result<(), Error> {
    let mode = parse_mode(&args.algorithm, args.with_comments)?;
    info!(file = %args.file.display(), algorithm = mode.uri(), "canonicalizing");

    let xml = read_file(&args.file)?;
    let mut doc = Document::parse(&xml)?;
    for attr in &args.id_attr {
        doc.add_id_attr(attr);
    }

    let mut canon = Canonicalizer::new(mode).legacy_surrogates(args.legacy_surrogates);
    if let Some(list) = &args.inclusive_prefixes {
        canon = canon.inclusive_namespaces(list)?;
    }

    let root = match &args.id {
        Some(id) => lookup_id(&doc, id)?,
        None => doc.root(),
    };
    let excluded = args
        .exclude_id
        .as_deref()
        .map(|id| lookup_id(&doc, id))
        .transpose()?;

    let mut sink = open_output(args.output.as_ref())?;
    match excluded {
        Some(excluded) => canon.canonicalize_subtree_excluding(&doc, root, excluded, &mut sink)?,
        None => canon.canonicalize_subtree(&doc, root, &mut sink)?,
    }
    sink.flush()?;
    Ok(())
}

fn cmd_info() -> Result<(), Error> {
    println!("Ramsta: pure Rust Canonical XML");
    println!();
    println!("Supported canonicalization algorithms:");
    for uri in algorithm::C14N_ALGORITHMS {
        let label = match C14nMode::from_uri(uri) {
            Some(mode) if mode.with_comments() => " (with comments)",
            _ => "",
        };
        println!("  {uri}{label}");
    }
    println!();
    println!("Short names for --algorithm: c14n, c14n11, exc-c14n");
    Ok(())
}

// ── Utility functions ────────────────────────────────────────────────

/// Resolve a short algorithm name or a full URI.  `--with-comments` turns
/// a short name into its comment-keeping variant.
fn parse_mode(name: &str, with_comments: bool) -> Result<C14nMode, Error> {
    let mode = match (name, with_comments) {
        ("c14n", false) => C14nMode::Inclusive,
        ("c14n", true) => C14nMode::InclusiveWithComments,
        ("c14n11", false) => C14nMode::Inclusive11,
        ("c14n11", true) => C14nMode::Inclusive11WithComments,
        ("exc-c14n", false) => C14nMode::Exclusive,
        ("exc-c14n", true) => C14nMode::ExclusiveWithComments,
        (uri, _) => C14nMode::from_uri(uri)
            .ok_or_else(|| Error::UnsupportedAlgorithm(uri.to_owned()))?,
    };
    Ok(mode)
}

fn lookup_id(doc: &Document, id: &str) -> Result<ramsta_xml::NodeId, Error> {
    doc.find_by_id(id)
        .ok_or_else(|| Error::XmlStructure(format!("no element with ID {id:?}")))
}

fn read_file(path: &PathBuf) -> Result<String, Error> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::Other(format!("{}: {e}", path.display())))
}

fn open_output(path: Option<&PathBuf>) -> Result<Box<dyn Write>, Error> {
    match path {
        Some(p) => {
            let file = File::create(p)
                .map_err(|e| Error::Other(format!("{}: {e}", p.display())))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("c14n", false).unwrap(), C14nMode::Inclusive);
        assert_eq!(
            parse_mode("exc-c14n", true).unwrap(),
            C14nMode::ExclusiveWithComments
        );
        assert_eq!(
            parse_mode(algorithm::C14N11_WITH_COMMENTS, false).unwrap(),
            C14nMode::Inclusive11WithComments
        );
        assert!(matches!(
            parse_mode("c15n", false),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_listed_algorithms_resolve() {
        for uri in algorithm::C14N_ALGORITHMS {
            assert_eq!(parse_mode(uri, false).unwrap().uri(), *uri);
        }
    }

    #[test]
    fn test_lookup_id() {
        let doc = Document::parse(r#"<a><b Id="x"/></a>"#).unwrap();
        assert!(lookup_id(&doc, "x").is_ok());
        assert!(matches!(lookup_id(&doc, "y"), Err(Error::XmlStructure(_))));
    }
}
