//! Filtergraph CLI
//!
//! Inspects the built-in kinds and drives graph description files with
//! synthetic frames.

use anyhow::{bail, Context, Result};
use filtergraph::prelude::*;
use std::path::Path;

const DEFAULT_FRAMES: usize = 8;
const SAMPLES_PER_FRAME: usize = 1024;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("filtergraph");

    if args.len() < 2 {
        print_usage(program);
        return;
    }

    let result = match args[1].as_str() {
        "list" => {
            list_kinds();
            Ok(())
        }
        "info" => match args.get(2) {
            Some(kind) => kind_info(kind),
            None => Err(anyhow::anyhow!("please specify a kind")),
        },
        "check" => match args.get(2) {
            Some(path) => check_description(Path::new(path)),
            None => Err(anyhow::anyhow!("please specify a description file")),
        },
        "run" => match args.get(2) {
            Some(path) => parse_frames(&args[3..])
                .and_then(|frames| run_description(Path::new(path), frames)),
            None => Err(anyhow::anyhow!("please specify a description file")),
        },
        "help" | "--help" | "-h" => {
            print_usage(program);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage(program);
            std::process::exit(2);
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    println!("Filtergraph v{}", filtergraph::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  list                      List all available kinds");
    println!("  info <kind>               Show pads and options of a kind");
    println!("  check <file>              Build and configure a .toml/.json description");
    println!("  run <file> [--frames N]   Push N synthetic frames into every source and drain every sink");
    println!("  help                      Show this help message");
    println!();
    println!("Set RUST_LOG=debug for scheduler output.");
}

fn parse_frames(args: &[String]) -> Result<usize> {
    let mut frames = DEFAULT_FRAMES;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--frames" => {
                let value = args.get(i + 1).context("--frames needs a value")?;
                frames = value
                    .parse()
                    .with_context(|| format!("'{}' is not a frame count", value))?;
                i += 2;
            }
            other => bail!("unknown option: {}", other),
        }
    }
    Ok(frames)
}

fn list_kinds() {
    let registry = FilterRegistry::shared();

    println!("Available kinds ({} total):", registry.len());
    println!();

    for role in [FilterRole::Source, FilterRole::Transform, FilterRole::Sink] {
        println!("  {}", role.display_name());
        for name in registry.names_by_role(role) {
            if let Some(metadata) = registry.get_metadata(name) {
                println!("      {:<12} {}", metadata.name, metadata.description);
            }
        }
        println!();
    }
}

fn kind_info(kind: &str) -> Result<()> {
    let registry = FilterRegistry::shared();
    let metadata = registry
        .get_metadata(kind)
        .with_context(|| format!("unknown kind '{}', use 'list' to see available kinds", kind))?;

    println!("Kind: {}", metadata.name);
    println!("Role: {}", metadata.role.display_name());
    println!();
    println!("Description:");
    println!("  {}", metadata.description);
    println!();

    print_pads("Inputs", &metadata.inputs, metadata.dynamic_inputs);
    print_pads("Outputs", &metadata.outputs, metadata.dynamic_outputs);

    if !metadata.options.is_empty() {
        println!("Options:");
        for option in &metadata.options {
            println!("  {} [{}] = {}", option.name, option.kind, option.default_value);
            if !option.description.is_empty() {
                println!("    {}", option.description);
            }
            for constraint in &option.constraints {
                println!("    {}", constraint.description());
            }
        }
    }
    Ok(())
}

fn print_pads(title: &str, pads: &[PadDefinition], dynamic: bool) {
    if pads.is_empty() && !dynamic {
        return;
    }
    let note = if dynamic { " (count set by options)" } else { "" };
    println!("{}{}:", title, note);
    for (index, pad) in pads.iter().enumerate() {
        println!("  {} {}", index, pad.name);
        if !pad.description.is_empty() {
            println!("    {}", pad.description);
        }
    }
    println!();
}

fn build_configured(path: &Path) -> Result<BuiltGraph> {
    let description = GraphDescription::from_path(path)
        .with_context(|| format!("cannot load {}", path.display()))?;
    let mut built = description
        .build(FilterRegistry::shared())
        .context("cannot build graph")?;
    built.graph.configure().context("configuration failed")?;
    Ok(built)
}

fn check_description(path: &Path) -> Result<()> {
    let built = build_configured(path)?;
    let graph = &built.graph;

    println!(
        "{}: {} nodes, {} links",
        path.display(),
        graph.node_count(),
        graph.link_count()
    );
    for (name, id) in &built.names {
        let node = graph.node(*id)?;
        println!("  {:<12} {:<10} {} in / {} out", name, node.kind(), node.input_count(), node.output_count());
    }
    for link in graph.links() {
        let format = link
            .format
            .map(|f| f.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("  {} -> {} [{}]", link.from, link.to, format);
    }
    println!("Configuration OK");
    Ok(())
}

fn run_description(path: &Path, frames: usize) -> Result<()> {
    let mut built = build_configured(path)?;
    let sources = built.graph.sources();
    let sinks = built.graph.sinks();
    if sources.is_empty() || sinks.is_empty() {
        bail!("graph needs at least one source and one sink");
    }

    let mut names = std::collections::HashMap::new();
    for (name, id) in &built.names {
        names.insert(*id, name.clone());
    }

    let mut pulled = vec![0usize; sinks.len()];
    'feed: for index in 0..frames {
        for &source in &sources {
            let format = source_format(&built.graph, source)?;
            if let Err(err) = built.graph.push_frame(source, Some(&synthetic_frame(format, index))) {
                log::warn!("stopped feeding after {} frames: {}", index, err);
                break 'feed;
            }
        }
        // Pull as we go so no feed outgrows its capacity.
        for (count, &sink) in pulled.iter_mut().zip(&sinks) {
            *count += built.graph.drain(sink)?.len();
        }
    }
    for &source in &sources {
        built.graph.push_frame(source, None)?;
    }
    for (count, &sink) in pulled.iter_mut().zip(&sinks) {
        *count += built.graph.drain(sink)?.len();
    }

    for (count, sink) in pulled.iter().zip(&sinks) {
        let name = names.get(sink).map(String::as_str).unwrap_or("?");
        println!("  {:<12} {} frames", name, count);
    }
    let stats = built.graph.stats();
    println!(
        "pushed {}, pulled {}, dropped {}, {} scheduler steps",
        stats.frames_pushed, stats.frames_pulled, stats.frames_dropped, stats.steps
    );
    Ok(())
}

fn source_format(graph: &FilterGraph, source: NodeId) -> Result<FrameFormat> {
    graph
        .links_from(source)
        .next()
        .and_then(|link| link.format)
        .with_context(|| format!("source {} has no negotiated format", source))
}

/// A sine tone with a per-frame phase offset, identical on every channel.
fn synthetic_frame(format: FrameFormat, index: usize) -> Frame {
    let channels = usize::from(format.channels.max(1));
    let rate = f64::from(format.sample_rate.max(1));
    let start = index * SAMPLES_PER_FRAME;

    let mut samples = Vec::with_capacity(SAMPLES_PER_FRAME * channels);
    for n in 0..SAMPLES_PER_FRAME {
        let t = (start + n) as f64 / rate;
        let value = (t * 440.0 * std::f64::consts::TAU).sin() as f32 * 0.25;
        samples.extend(std::iter::repeat(value).take(channels));
    }
    Frame::new(format, samples).with_pts(start as i64)
}
