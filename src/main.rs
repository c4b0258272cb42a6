use std::{path::PathBuf, process::ExitCode, thread};

use clap::Parser;
use log::{error, info};
use rustphorus_engine::{Config, Headless, Progress, Result, Runtime, UnknownOpcodePolicy};

/// Runs the scripts of an extracted Scratch 3 project without a display.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
  /// Path to the project's `project.json`.
  project: PathBuf,

  /// JSON file with engine settings.
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Stop after this many frames.
  #[arg(short, long)]
  frames: Option<u64>,

  /// Frames per second; overrides the config file.
  #[arg(long)]
  frame_rate: Option<u32>,

  /// Seed for random blocks.
  #[arg(long)]
  seed: Option<u64>,

  /// Treat unknown opcodes as no-ops instead of refusing the project.
  #[arg(long)]
  lenient: bool,
}

fn run(args: Args) -> Result<()> {
  let mut config = match &args.config {
    Some(path) => Config::from_path(path)?,
    None => Config::default(),
  };
  if let Some(frame_rate) = args.frame_rate {
    config.frame_rate = frame_rate;
  }
  if args.seed.is_some() {
    config.seed = args.seed;
  }
  if args.lenient {
    config.unknown_opcodes = UnknownOpcodePolicy::Ignore;
  }
  let frame = config.frame_duration();
  let mut runtime = Runtime::load(&args.project, config, Box::new(Headless))?;
  let started = runtime.green_flag();
  info!("green flag started {started} scripts");

  let mut frames = 0;
  'main: loop {
    if args.frames.is_some_and(|limit| frames >= limit) {
      break;
    }
    let sweep = runtime.run_threads();
    match (sweep.progress, sweep.sprite) {
      (Progress::CloseProject, _) => {
        info!("project stopped itself");
        break 'main;
      }
      (Progress::StopSprite, Some(sprite)) => runtime.stop_sprite(sprite),
      _ => {}
    }
    frames += 1;
    if !runtime.has_active_threads() {
      info!("no scripts left to run");
      break;
    }
    runtime.advance_timer(frame);
    thread::sleep(frame);
  }

  let diagnostics = runtime.diagnostics();
  info!(
    "ran {frames} frames with {} diagnostics ({} dropped)",
    diagnostics.len(),
    diagnostics.dropped()
  );
  Ok(())
}

fn main() -> ExitCode {
  pretty_env_logger::init();
  match run(Args::parse()) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      error!("{err}");
      ExitCode::FAILURE
    }
  }
}
