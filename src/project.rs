use std::collections::HashMap;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use derivative::Derivative;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;

use crate::block::Graph;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::host::Host;
use crate::json;
use crate::opcode::{Registry, UnknownOpcodePolicy};
use crate::pen::PenInstruction;
use crate::script::ThreadId;
use crate::sprite::{Sprite, SpriteId};
use crate::value::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  pub stage_width: u32,
  pub stage_height: u32,
  pub frame_rate: u32,
  pub max_clones: usize,
  pub max_list_items: usize,
  pub unknown_opcodes: UnknownOpcodePolicy,
  pub diagnostics_limit: usize,
  /// Blocks a custom block running without screen refresh may execute in
  /// one step before the thread yields anyway.
  pub warp_limit: usize,
  /// Fixed seed for `pick random` and friends; entropy when absent.
  pub seed: Option<u64>,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      stage_width: 480,
      stage_height: 360,
      frame_rate: 30,
      max_clones: 300,
      max_list_items: 200_000,
      unknown_opcodes: UnknownOpcodePolicy::Reject,
      diagnostics_limit: 256,
      warp_limit: 10_000,
      seed: None,
    }
  }
}

impl Config {
  pub fn from_path(path: impl AsRef<Path>) -> Result<Config> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
  }

  pub fn frame_duration(&self) -> Duration {
    Duration::from_secs(1) / self.frame_rate.max(1)
  }
}

/// Which sprites an event is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
  All,
  Sprite(SpriteId),
}

/// A hat trigger raised while a sweep is running. It is delivered at the
/// start of the next sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
  pub opcode: String,
  pub filter: Option<String>,
  pub scope: EventScope,
  /// Thread waiting for every script this event starts to finish.
  pub waiter: Option<ThreadId>,
}

impl Event {
  pub fn new(opcode: impl Into<String>) -> Self {
    Event {
      opcode: opcode.into(),
      filter: None,
      scope: EventScope::All,
      waiter: None,
    }
  }

  pub fn filter(mut self, filter: impl Into<String>) -> Self {
    self.filter = Some(filter.into());
    self
  }

  pub fn scope(mut self, scope: EventScope) -> Self {
    self.scope = scope;
    self
  }

  pub fn waiter(mut self, waiter: ThreadId) -> Self {
    self.waiter = Some(waiter);
    self
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CloneSource {
  Sprite(SpriteId),
  Named(String),
}

/// A backdrop change requested by a script, applied before the next sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct BackdropSwitch {
  pub requested: Value,
  /// Thread waiting for the scripts the switch starts.
  pub waiter: Option<ThreadId>,
}

/// What other sprites can read of a sprite during a sweep: its state as of
/// the start of that sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
  pub name: String,
  pub is_stage: bool,
  pub x: f64,
  pub y: f64,
  pub direction: f64,
  pub costume: usize,
  pub costume_name: String,
  pub size: f64,
  pub volume: f64,
  pub variables: Vec<(String, Value)>,
}

impl Snapshot {
  pub fn of(sprite: &Sprite) -> Self {
    let state = &sprite.state;
    Snapshot {
      name: sprite.info.name.clone(),
      is_stage: sprite.info.is_stage,
      x: state.x,
      y: state.y,
      direction: state.direction,
      costume: state.current_costume,
      costume_name: state
        .costumes
        .get(state.current_costume)
        .cloned()
        .unwrap_or_default(),
      size: state.size,
      volume: state.volume,
      variables: state
        .variable_names
        .iter()
        .cloned()
        .zip(state.variables.iter().cloned())
        .collect(),
    }
  }

  pub fn variable(&self, name: &str) -> Option<&Value> {
    self
      .variables
      .iter()
      .find(|(variable, _)| variable == name)
      .map(|(_, value)| value)
  }
}

/// Project clock in seconds, advanced by the host.
#[derive(Debug, Clone, Default)]
pub struct Timer {
  elapsed: f64,
  reset_at: f64,
}

impl Timer {
  pub fn advance(&mut self, delta: Duration) {
    self.elapsed += delta.as_secs_f64();
  }

  /// Seconds since the project started.
  pub fn now(&self) -> f64 {
    self.elapsed
  }

  /// Seconds since the last reset, as reported by the `timer` block.
  pub fn value(&self) -> f64 {
    self.elapsed - self.reset_at
  }

  pub fn reset(&mut self) {
    self.reset_at = self.elapsed;
  }
}

/// State reachable from every sprite while it runs.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct SharedState {
  pub config: Config,
  pub global_variables: Vec<Value>,
  pub global_variable_names: Vec<String>,
  pub global_lists: Vec<Vec<Value>>,
  pub pen: Vec<PenInstruction>,
  pub timer: Timer,
  pub counter: f64,
  pub events: Vec<Event>,
  pub clones: Vec<CloneSource>,
  pub clone_count: usize,
  pub backdrops: Vec<BackdropSwitch>,
  pub broadcast_waits: HashMap<ThreadId, Vec<ThreadId>>,
  pub running: HashSet<ThreadId>,
  /// The stage and every non-clone sprite, taken when the sweep starts.
  pub snapshots: Vec<Snapshot>,
  /// Last reply to `ask and wait`.
  pub answer: String,
  pub diagnostics: Diagnostics,
  #[derivative(Debug = "ignore")]
  pub rng: StdRng,
  #[derivative(Debug = "ignore")]
  pub host: Box<dyn Host>,
}

impl SharedState {
  pub fn new(config: Config, globals: Globals, host: Box<dyn Host>) -> Self {
    let rng = match config.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_os_rng(),
    };
    SharedState {
      diagnostics: Diagnostics::new(config.diagnostics_limit),
      config,
      global_variables: globals.variables,
      global_variable_names: globals.variable_names,
      global_lists: globals.lists,
      pen: Vec::new(),
      timer: Timer::default(),
      counter: 0.,
      events: Vec::new(),
      clones: Vec::new(),
      clone_count: 0,
      backdrops: Vec::new(),
      broadcast_waits: HashMap::new(),
      running: HashSet::new(),
      snapshots: Vec::new(),
      answer: String::new(),
      rng,
      host,
    }
  }

  /// Queues a hat trigger for the next sweep.
  pub fn queue_event(&mut self, event: Event) {
    self.events.push(event);
  }

  pub fn queue_clone(&mut self, source: CloneSource) {
    self.clones.push(source);
  }

  pub fn queue_backdrop(&mut self, requested: Value, waiter: Option<ThreadId>) {
    self.backdrops.push(BackdropSwitch { requested, waiter });
  }

  /// The sprite called `name` as the sweep found it. Clones are never
  /// matched.
  pub fn snapshot(&self, name: &str) -> Option<&Snapshot> {
    self
      .snapshots
      .iter()
      .find(|snapshot| !snapshot.is_stage && snapshot.name == name)
  }

  pub fn stage_snapshot(&self) -> Option<&Snapshot> {
    self.snapshots.iter().find(|snapshot| snapshot.is_stage)
  }

  pub fn global_variable(&self, name: &str) -> Option<&Value> {
    let index = self
      .global_variable_names
      .iter()
      .position(|variable| variable == name)?;
    self.global_variables.get(index)
  }

  pub fn is_running(&self, thread: ThreadId) -> bool {
    self.running.contains(&thread)
  }
}

#[derive(Debug, Clone, Default)]
pub struct Globals {
  pub variables: Vec<Value>,
  pub variable_names: Vec<String>,
  pub lists: Vec<Vec<Value>>,
}

/// A project as produced by a loader: validated graph, sprites in
/// registration order (stage first) and the stage's variables.
#[derive(Debug)]
pub struct LoadedProject {
  pub graph: Graph,
  pub sprites: Vec<Sprite>,
  pub globals: Globals,
}

/// One loaded project: the block graph, every sprite and the shared state.
#[derive(Debug)]
pub struct Runtime {
  pub(crate) graph: Graph,
  pub(crate) sprites: Vec<Sprite>,
  pub(crate) shared: SharedState,
  pub(crate) next_sprite: u32,
}

impl Runtime {
  pub fn new(project: LoadedProject, config: Config, host: Box<dyn Host>) -> Self {
    let next_sprite = project
      .sprites
      .iter()
      .map(|sprite| sprite.id().0 + 1)
      .max()
      .unwrap_or(0);
    info!(
      "loaded {} blocks across {} targets",
      project.graph.len(),
      project.sprites.len()
    );
    Runtime {
      graph: project.graph,
      sprites: project.sprites,
      shared: SharedState::new(config, project.globals, host),
      next_sprite,
    }
  }

  /// Reads an extracted `project.json` with the builtin opcodes.
  pub fn load(
    path: impl AsRef<Path>,
    config: Config,
    host: Box<dyn Host>,
  ) -> Result<Self> {
    let file = File::open(path)?;
    Self::from_reader(BufReader::new(file), config, host)
  }

  pub fn from_reader(
    reader: impl Read,
    config: Config,
    host: Box<dyn Host>,
  ) -> Result<Self> {
    let project =
      json::load(reader, &Registry::builtin(), config.unknown_opcodes)?;
    Ok(Self::new(project, config, host))
  }

  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  /// Sprites in registration order; the stage comes first when present.
  pub fn sprites(&self) -> &[Sprite] {
    &self.sprites
  }

  pub fn sprite(&self, id: SpriteId) -> Option<&Sprite> {
    self.sprites.iter().find(|sprite| sprite.id() == id)
  }

  /// The original (non-clone) sprite called `name`.
  pub fn sprite_by_name(&self, name: &str) -> Option<&Sprite> {
    self
      .sprites
      .iter()
      .find(|sprite| !sprite.info.is_clone && sprite.info.name == name)
  }

  pub fn shared(&self) -> &SharedState {
    &self.shared
  }

  pub fn shared_mut(&mut self) -> &mut SharedState {
    &mut self.shared
  }

  pub fn config(&self) -> &Config {
    &self.shared.config
  }

  pub fn diagnostics(&self) -> &Diagnostics {
    &self.shared.diagnostics
  }

  pub fn advance_timer(&mut self, delta: Duration) {
    self.shared.timer.advance(delta);
  }

  /// Whether another sweep could still do work: a live thread, or queued
  /// events, clones or backdrop switches.
  pub fn has_active_threads(&self) -> bool {
    self
      .sprites
      .iter()
      .any(|sprite| sprite.active_threads().next().is_some())
      || !self.shared.events.is_empty()
      || !self.shared.clones.is_empty()
      || !self.shared.backdrops.is_empty()
  }

  /// Pen lines drawn since the last `erase all`.
  pub fn pen(&self) -> &[PenInstruction] {
    &self.shared.pen
  }
}
