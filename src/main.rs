//! folio - inspect narrated EPUB and DAISY publications

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use folio::{
    Archive, ByteRange, ContentKeyDecryptor, DirectoryContainer, LicenseDecryptor, OverlayLoader,
    Publication, ResourceFetcher, SyncNode, TransformContext, TransformPipeline, ZipContainer,
    open_publication,
};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Inspect narrated EPUB and DAISY publications", long_about = None)]
#[command(after_help = "EXAMPLES:
    folio book.epub                               Show publication summary
    folio book.epub --overlays                    Print each chapter's narration tree
    folio book.epub --overlays --json             Same, as JSON
    folio book.epub --extract OEBPS/font.otf -o font.otf
    folio book.epub --extract OEBPS/a.mp3 --range 0-1023 --key <HEX>")]
struct Cli {
    /// Input publication (.epub file or exploded directory)
    #[arg(value_name = "INPUT")]
    input: String,

    /// Load and print media overlays
    #[arg(long)]
    overlays: bool,

    /// Emit JSON instead of text
    #[arg(long)]
    json: bool,

    /// Write the decoded bytes of one resource
    #[arg(long, value_name = "PATH")]
    extract: Option<String>,

    /// Inclusive byte range for --extract (BEGIN-END or BEGIN-)
    #[arg(long, value_name = "B-E", requires = "extract")]
    range: Option<ByteRange>,

    /// Output file for --extract (default: stdout)
    #[arg(short, long, value_name = "FILE", requires = "extract")]
    output: Option<String>,

    /// LCP content key, hex encoded
    #[arg(long, value_name = "HEX")]
    key: Option<String>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), String> {
    let archive = open_archive(&cli.input)?;

    let license = cli
        .key
        .as_deref()
        .map(ContentKeyDecryptor::from_hex)
        .transpose()
        .map_err(|e| e.to_string())?
        .map(Arc::new);
    let profile = license.as_ref().and_then(|l| l.profile());

    let mut publication = open_publication(archive.as_ref(), profile).map_err(|e| e.to_string())?;

    let mut context = TransformContext::for_publication(&publication);
    if let Some(license) = license.clone() {
        context = context.with_license(license);
    }
    let pipeline = Arc::new(TransformPipeline::with_builtins());

    if let Some(path) = &cli.extract {
        let fetcher = ResourceFetcher::new(archive, pipeline, context);
        return extract(&fetcher, &publication, path, cli.range, cli.output.as_deref());
    }

    if cli.overlays {
        let loader = OverlayLoader::new(archive, pipeline, context).with_publication(&publication);
        return show_overlays(&mut publication, &loader, cli.json);
    }

    show_summary(&publication, cli.json)
}

fn open_archive(input: &str) -> Result<Arc<dyn Archive>, String> {
    let archive: Arc<dyn Archive> = if Path::new(input).is_dir() {
        Arc::new(DirectoryContainer::open(input).map_err(|e| e.to_string())?)
    } else {
        Arc::new(ZipContainer::open(input).map_err(|e| e.to_string())?)
    };
    Ok(archive)
}

fn show_summary(publication: &Publication, json: bool) -> Result<(), String> {
    if json {
        let text = serde_json::to_string_pretty(publication).map_err(|e| e.to_string())?;
        println!("{text}");
        return Ok(());
    }

    println!("Identifier: {}", publication.identifier);
    println!("Spine items: {}", publication.spine.len());
    println!("Resources: {}", publication.resources.len());
    println!("Narrated: {}", publication.narrated_spine().count());
    let encrypted = publication.links().filter(|l| l.is_encrypted()).count();
    if encrypted > 0 {
        println!("Encrypted: {encrypted}");
    }
    Ok(())
}

fn show_overlays(
    publication: &mut Publication,
    loader: &OverlayLoader,
    json: bool,
) -> Result<(), String> {
    let hrefs: Vec<String> = publication
        .narrated_spine()
        .map(|link| link.href().to_string())
        .collect();

    let mut trees = Vec::new();
    for href in hrefs {
        // One chapter failing to load does not stop the rest.
        match publication.media_overlay(loader, &href) {
            Ok(Some(node)) => trees.push((href, node.clone())),
            Ok(None) => {}
            Err(e) => eprintln!("warning: {href}: {e}"),
        }
    }

    if json {
        let map: serde_json::Map<String, serde_json::Value> = trees
            .into_iter()
            .map(|(href, node)| serde_json::to_value(node).map(|v| (href, v)))
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?;
        let text = serde_json::to_string_pretty(&map).map_err(|e| e.to_string())?;
        println!("{text}");
        return Ok(());
    }

    for (href, node) in &trees {
        println!("{href} ({} clips)", node.clips().count());
        print_node(node, 1);
    }
    Ok(())
}

fn print_node(node: &SyncNode, depth: usize) {
    for child in &node.children {
        let mut line = "  ".repeat(depth);
        if let Some(text) = &child.text_ref {
            line.push_str(text);
        } else {
            line.push_str("(group)");
        }
        if let Some(audio) = &child.audio_ref {
            line.push_str(&format!("  {}", audio.media_fragment()));
        }
        if let Some(duration) = child.duration {
            line.push_str(&format!("  [{duration:.3}s]"));
        }
        if !child.roles.is_empty() {
            line.push_str(&format!("  {{{}}}", child.roles.join(" ")));
        }
        println!("{line}");
        print_node(child, depth + 1);
    }
}

fn extract(
    fetcher: &ResourceFetcher,
    publication: &Publication,
    path: &str,
    range: Option<ByteRange>,
    output: Option<&str>,
) -> Result<(), String> {
    let link = publication
        .find_link(path)
        .cloned()
        .unwrap_or_else(|| folio::Link::new(path, "application/octet-stream"));
    let bytes = fetcher.read_to_vec(&link, range).map_err(|e| e.to_string())?;

    match output {
        Some(file) => fs::write(file, &bytes).map_err(|e| format!("{file}: {e}"))?,
        None => std::io::stdout()
            .write_all(&bytes)
            .map_err(|e| e.to_string())?,
    }
    Ok(())
}
