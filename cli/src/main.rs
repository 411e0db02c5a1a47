use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use piecework::{EventSink, GameTable, TableEvent};
use piecework_core::grid::{build_grid_choices, DEFAULT_TARGET_COUNT};
use piecework_core::{
    decode_snapshot, encode_snapshot, grid_choice_label, snapshot_from_json, snapshot_to_json,
    EdgeStyle, Puzzle, PuzzleRules, PuzzleSnapshot,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod solver;

#[derive(Parser)]
#[command(name = "piecework", version, about = "Generate, inspect and solve jigsaw puzzles")]
struct Cli {
    /// TOML file overriding the default puzzle rules.
    #[arg(long, global = true, env = "PIECEWORK_RULES")]
    rules: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SnapshotFormat {
    Json,
    Binary,
}

#[derive(clap::Args)]
struct ImageArgs {
    #[arg(long, default_value_t = 1600.0)]
    width: f32,
    #[arg(long, default_value_t = 1200.0)]
    height: f32,
    #[arg(long, default_value_t = DEFAULT_TARGET_COUNT)]
    pieces: u32,
    /// Decimal or 0x-prefixed hex.
    #[arg(long)]
    seed: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the preset grid choices for an image size.
    Grids {
        #[arg(long, default_value_t = 1600.0)]
        width: f32,
        #[arg(long, default_value_t = 1200.0)]
        height: f32,
    },
    /// Generate and scatter a puzzle, writing its snapshot.
    Generate {
        #[command(flatten)]
        image: ImageArgs,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = SnapshotFormat::Json)]
        format: SnapshotFormat,
    },
    /// Report grid, groups and connectivity of a stored puzzle.
    Inspect {
        input: PathBuf,
        /// Print the SVG outline of this piece.
        #[arg(long)]
        piece: Option<usize>,
        #[arg(long)]
        spline: bool,
    },
    /// Drag pieces onto their neighbors until the puzzle is complete.
    Solve {
        #[arg(long, conflicts_with_all = ["width", "height", "pieces", "seed"])]
        input: Option<PathBuf>,
        #[command(flatten)]
        image: ImageArgs,
        #[command(flatten)]
        bot: solver::SolverArgs,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = SnapshotFormat::Json)]
        format: SnapshotFormat,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let rules = load_rules(cli.rules.as_deref())?;

    match cli.command {
        Commands::Grids { width, height } => {
            for choice in build_grid_choices(width, height) {
                println!("{}", grid_choice_label(&choice));
            }
        }
        Commands::Generate { image, out, format } => {
            let seed = seed_or_random(image.seed.as_deref())?;
            let table = GameTable::generate(image.width, image.height, image.pieces, rules, seed, &mut ())?;
            write_snapshot(&out, &table.puzzle().snapshot(), format)?;
            let info = table.puzzle().info();
            println!("seed: {seed:#010x}");
            println!("grid: {}x{} ({} pieces)", info.cols, info.rows, info.piece_count());
            println!("wrote {}", out.display());
        }
        Commands::Inspect {
            input,
            piece,
            spline,
        } => {
            let puzzle = Puzzle::from_snapshot(read_snapshot(&input)?)?;
            report(&puzzle);
            if let Some(id) = piece {
                let style = if spline {
                    EdgeStyle::Spline
                } else {
                    EdgeStyle::Straight
                };
                match puzzle.piece(id) {
                    Some(piece) => println!("{}", piece.path(style).to_svg()),
                    None => eprintln!("unknown piece {id}"),
                }
            }
        }
        Commands::Solve {
            input,
            image,
            bot,
            out,
            format,
        } => {
            let mut sink = LogSink::default();
            let table = match input {
                Some(path) => GameTable::from_snapshot(read_snapshot(&path)?, &mut sink)?,
                None => {
                    let seed = seed_or_random(image.seed.as_deref())?;
                    println!("seed: {seed:#010x}");
                    GameTable::generate(image.width, image.height, image.pieces, rules, seed, &mut sink)?
                }
            };
            let mut table = table;
            let summary = solver::run(&mut table, &bot, &mut sink)?;
            println!(
                "drags: {}  taps: {}  connections: {}  complete: {}",
                summary.drags, summary.taps, sink.connections, summary.complete
            );
            report(table.puzzle());
            if let Some(out) = out {
                write_snapshot(&out, &table.puzzle().snapshot(), format)?;
                println!("wrote {}", out.display());
            }
        }
    }

    Ok(())
}

#[derive(Default)]
struct LogSink {
    connections: usize,
}

impl EventSink for LogSink {
    fn emit(&mut self, event: TableEvent) {
        match event {
            TableEvent::PiecesGenerated { rows, cols, total } => {
                info!(rows, cols, total, "pieces generated");
            }
            TableEvent::PiecesConnected {
                moving,
                candidate,
                group,
            } => {
                self.connections += 1;
                info!(moving, candidate, group, "pieces connected");
            }
            TableEvent::Completed { pieces } => info!(pieces, "puzzle complete"),
            _ => {}
        }
    }
}

fn report(puzzle: &Puzzle) {
    let info = puzzle.info();
    let progress = puzzle.progress();
    let invalid = puzzle.invalid_groups();
    println!(
        "image: {}x{}  grid: {}x{}  pieces: {}  internal edges: {}",
        info.image_width,
        info.image_height,
        info.cols,
        info.rows,
        progress.total,
        info.internal_edge_count()
    );
    println!(
        "groups: {}  largest: {}  connected: {:.1}%",
        progress.groups,
        puzzle.groups().largest_group_size(),
        progress.connected_fraction * 100.0
    );
    if invalid.is_empty() {
        println!("connectivity: ok");
    } else {
        println!("connectivity: {} disconnected groups {:?}", invalid.len(), invalid);
    }
}

fn load_rules(path: Option<&Path>) -> Result<PuzzleRules, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(PuzzleRules::from_toml_str(&raw)?)
        }
        None => Ok(PuzzleRules::default()),
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn read_snapshot(path: &Path) -> Result<PuzzleSnapshot, Box<dyn std::error::Error>> {
    if is_json(path) {
        Ok(snapshot_from_json(&std::fs::read_to_string(path)?)?)
    } else {
        Ok(decode_snapshot(&std::fs::read(path)?)?)
    }
}

fn write_snapshot(
    path: &Path,
    snapshot: &PuzzleSnapshot,
    format: SnapshotFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        SnapshotFormat::Json => std::fs::write(path, snapshot_to_json(snapshot)?)?,
        SnapshotFormat::Binary => std::fs::write(path, encode_snapshot(snapshot)?)?,
    }
    Ok(())
}

fn seed_or_random(raw: Option<&str>) -> Result<u32, Box<dyn std::error::Error>> {
    match raw {
        Some(raw) => parse_seed_arg(raw),
        None => Ok(rand::random()),
    }
}

fn parse_seed_arg(raw: &str) -> Result<u32, Box<dyn std::error::Error>> {
    let trimmed = raw.trim();
    let value = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16)?
    } else {
        trimmed.parse::<u32>()?
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_accept_hex_and_decimal() {
        assert_eq!(parse_seed_arg("42").unwrap(), 42);
        assert_eq!(parse_seed_arg(" 0xff ").unwrap(), 255);
        assert_eq!(parse_seed_arg("0XDEADBEEF").unwrap(), 0xDEAD_BEEF);
        assert!(parse_seed_arg("0xzz").is_err());
        assert!(parse_seed_arg("-1").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
