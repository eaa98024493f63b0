use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use seglayers::config::load_config;
use seglayers::realign::realign;
use seglayers::{DataRefMap, LayerBridge, Pipeline};

#[derive(Parser, Debug)]
#[command(name = "seglayers")]
#[command(about = "Segment layer converter (raw / Layer0 / Layer1 / Layer2)", long_about = None)]
struct Args {
    /// Conversion direction, e.g. layer0-to-layer1 (see --help for the list)
    #[arg(
        short,
        long,
        value_name = "DIR",
        long_help = "Conversion direction: raw-to-layer0, layer0-to-raw, \
                     layer0-to-layer1, layer1-to-layer0, layer1-to-layer2, \
                     layer2-to-layer1, layer0-to-layer2, layer2-to-layer0"
    )]
    direction: Option<String>,

    /// Input file with one segment per line (default: stdin)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Source language code (e.g. en-US)
    #[arg(long)]
    source_lang: Option<String>,

    /// Target language code (e.g. hu-HU)
    #[arg(long)]
    target_lang: Option<String>,

    /// Data-reference map as a JSON object file ({"key": "value", "k2": null})
    #[arg(long, value_name = "JSON")]
    data_refs: Option<PathBuf>,

    /// Config file path (default: search for seglayers.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Realign the input's placeholder ids against this source file,
    /// line by line, instead of converting layers
    #[arg(long, value_name = "FILE", conflicts_with = "direction")]
    realign_source: Option<PathBuf>,

    /// Suppress progress reporting on stderr
    #[arg(short, long)]
    quiet: bool,
}

/// Stderr reporting for batch runs, kept off stdout so transformed
/// segments stay pipeable. Lines carry the elapsed time since startup.
struct Report {
    quiet: bool,
    started: Instant,
}

impl Report {
    fn new(quiet: bool) -> Self {
        Self {
            quiet,
            started: Instant::now(),
        }
    }

    fn line(&self, msg: &str) {
        if self.quiet {
            return;
        }
        let secs = self.started.elapsed().as_secs();
        eprintln!("[{:02}:{:02}] {msg}", secs / 60, secs % 60);
    }
}

#[derive(Clone, Copy, Debug)]
enum Direction {
    RawToLayer0,
    Layer0ToRaw,
    Layer0ToLayer1,
    Layer1ToLayer0,
    Layer1ToLayer2,
    Layer2ToLayer1,
    Layer0ToLayer2,
    Layer2ToLayer0,
}

fn parse_direction(raw: &str) -> anyhow::Result<Direction> {
    match raw {
        "raw-to-layer0" => Ok(Direction::RawToLayer0),
        "layer0-to-raw" => Ok(Direction::Layer0ToRaw),
        "layer0-to-layer1" => Ok(Direction::Layer0ToLayer1),
        "layer1-to-layer0" => Ok(Direction::Layer1ToLayer0),
        "layer1-to-layer2" => Ok(Direction::Layer1ToLayer2),
        "layer2-to-layer1" => Ok(Direction::Layer2ToLayer1),
        "layer0-to-layer2" => Ok(Direction::Layer0ToLayer2),
        "layer2-to-layer0" => Ok(Direction::Layer2ToLayer0),
        other => Err(anyhow::anyhow!("unknown direction: {other}")),
    }
}

/// The stage sequence for one direction. Compositions run two pipelines
/// back to back; removal of a disabled filter is a no-op on pipelines
/// that never carried it.
fn pipelines_for(bridge: &LayerBridge, direction: Direction, disabled: &[&str]) -> Vec<Pipeline> {
    let mut pipelines = match direction {
        Direction::RawToLayer0 => vec![bridge.raw_to_layer0_pipeline()],
        Direction::Layer0ToRaw => vec![bridge.layer0_to_raw_pipeline()],
        Direction::Layer0ToLayer1 => vec![bridge.layer0_to_layer1_pipeline()],
        Direction::Layer1ToLayer0 => vec![bridge.layer1_to_layer0_pipeline()],
        Direction::Layer1ToLayer2 => vec![bridge.layer1_to_layer2_pipeline()],
        Direction::Layer2ToLayer1 => vec![bridge.layer2_to_layer1_pipeline()],
        Direction::Layer0ToLayer2 => vec![
            bridge.layer0_to_layer1_pipeline(),
            bridge.layer1_to_layer2_pipeline(),
        ],
        Direction::Layer2ToLayer0 => vec![
            bridge.layer2_to_layer1_pipeline(),
            bridge.layer1_to_layer0_pipeline(),
        ],
    };
    for pipeline in &mut pipelines {
        for name in disabled {
            pipeline.remove(name);
        }
    }
    pipelines
}

fn read_lines(input: Option<&PathBuf>) -> anyhow::Result<Vec<String>> {
    let text = match input {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("read input: {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read stdin")?;
            buf
        }
    };
    Ok(text.lines().map(|l| l.to_string()).collect())
}

fn write_lines(output: Option<&PathBuf>, lines: &[String]) -> anyhow::Result<()> {
    let mut text = lines.join("\n");
    text.push('\n');
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("write output: {}", path.display()))
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn load_data_refs(path: Option<&PathBuf>) -> anyhow::Result<DataRefMap> {
    let Some(path) = path else {
        return Ok(DataRefMap::new());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("read data refs: {}", path.display()))?;
    serde_json::from_str(&text).context("parse data refs json")
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let report = Report::new(args.quiet);

    let cfg = load_config(args.config.as_deref()).context("load config")?;
    let source_lang = args.source_lang.or(cfg.defaults.source_lang);
    let target_lang = args.target_lang.or(cfg.defaults.target_lang);
    let data_refs = load_data_refs(args.data_refs.as_ref())?;

    let lines = read_lines(args.input.as_ref())?;

    if let Some(source_path) = args.realign_source {
        let sources = read_lines(Some(&source_path))?;
        if sources.len() != lines.len() {
            return Err(anyhow::anyhow!(
                "realign: source has {} lines, input has {}",
                sources.len(),
                lines.len()
            ));
        }
        report.line(&format!("realigning {} segments", lines.len()));
        let out: Vec<String> = sources
            .iter()
            .zip(&lines)
            .map(|(src, tgt)| realign(src, tgt))
            .collect();
        return write_lines(args.output.as_ref(), &out);
    }

    let direction = match args.direction.as_deref() {
        Some(raw) => parse_direction(raw)?,
        None => return Err(anyhow::anyhow!("missing -d/--direction (or --realign-source)")),
    };

    let bridge = LayerBridge::new(source_lang, target_lang, data_refs);
    let disabled = cfg.filters.disabled_handler_names();
    let pipelines = pipelines_for(&bridge, direction, &disabled);

    report.line(&format!("converting {} segments", lines.len()));
    let mut out = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        let converted = pipelines
            .iter()
            .fold(line.clone(), |seg, p| p.transform(&seg));
        out.push(converted);
        report.line(&format!("segments {}/{}", idx + 1, lines.len()));
    }
    write_lines(args.output.as_ref(), &out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_names_parse() {
        assert!(matches!(
            parse_direction("layer0-to-layer1"),
            Ok(Direction::Layer0ToLayer1)
        ));
        assert!(parse_direction("layer3-to-layer4").is_err());
    }

    #[test]
    fn compositions_run_two_pipelines() {
        let bridge = LayerBridge::new(None, None, DataRefMap::new());
        assert_eq!(
            pipelines_for(&bridge, Direction::Layer0ToLayer2, &[]).len(),
            2
        );
        assert_eq!(pipelines_for(&bridge, Direction::RawToLayer0, &[]).len(), 1);
    }

    #[test]
    fn disabled_filters_are_removed_where_present() {
        let bridge = LayerBridge::new(None, None, DataRefMap::new());
        let pipelines = pipelines_for(&bridge, Direction::Layer0ToLayer1, &["twig-to-ph"]);
        assert!(!pipelines[0].contains("twig-to-ph"));
        // Pipelines that never carried the stage are untouched.
        let pipelines = pipelines_for(&bridge, Direction::Layer1ToLayer2, &["twig-to-ph"]);
        assert!(!pipelines[0].contains("twig-to-ph"));
    }
}
