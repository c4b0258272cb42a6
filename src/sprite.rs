use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use log::trace;
use serde::Deserialize;

use crate::block::{BlockId, Graph, Input};
use crate::pen::PenState;
use crate::script::{ScriptThread, ThreadId};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpriteId(pub u32);

impl fmt::Display for SpriteId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "sprite {}", self.0)
  }
}

/// Hat blocks and custom block definitions of one sprite. Clones share the
/// index of the sprite they were cloned from.
#[derive(Debug, Default)]
pub struct Scripts {
  hats: HashMap<String, Vec<BlockId>>,
  hat_ids: HashSet<BlockId>,
  procedures: HashMap<String, BlockId>,
}

impl Scripts {
  /// Indexes the top-level hats and procedure definitions among `blocks`.
  pub fn index(graph: &Graph, blocks: impl IntoIterator<Item = BlockId>) -> Self {
    let mut scripts = Scripts::default();
    for id in blocks {
      let Ok(block) = graph.lookup(id) else {
        continue;
      };
      if !block.top_level || !block.is_hat() {
        continue;
      }
      if block.opcode == "procedures_definition" {
        let proccode = match block.input("custom_block") {
          Some(Input::Stack(prototype)) => graph
            .lookup(*prototype)
            .ok()
            .and_then(|prototype| prototype.mutation.as_ref())
            .map(|mutation| mutation.proccode.clone()),
          _ => None,
        };
        if let Some(proccode) = proccode {
          scripts.procedures.insert(proccode, id);
        }
        continue;
      }
      scripts.add_hat(&block.opcode, id);
    }
    scripts
  }

  pub fn add_hat(&mut self, opcode: &str, id: BlockId) {
    self.hats.entry(opcode.to_string()).or_default().push(id);
    self.hat_ids.insert(id);
  }

  pub fn hats(&self, opcode: &str) -> &[BlockId] {
    self.hats.get(opcode).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn is_hat(&self, id: BlockId) -> bool {
    self.hat_ids.contains(&id)
  }

  pub fn procedure(&self, proccode: &str) -> Option<BlockId> {
    self.procedures.get(proccode).copied()
  }
}

#[derive(Debug, Clone)]
pub struct SpriteInfo {
  pub id: SpriteId,
  pub name: String,
  pub is_stage: bool,
  pub is_clone: bool,
  /// Set by `delete this clone`; the runtime drops the sprite afterwards.
  pub deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationStyle {
  #[serde(rename = "all around")]
  AllAround,
  #[serde(rename = "left-right")]
  LeftRight,
  #[serde(rename = "don't rotate")]
  DontRotate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Say {
  pub message: String,
  pub think: bool,
}

#[derive(Debug, Clone)]
pub struct SpriteState {
  pub visible: bool,
  pub x: f64,
  pub y: f64,
  pub size: f64,
  pub direction: f64,
  pub draggable: bool,
  pub current_costume: usize,
  pub costumes: Vec<String>,
  pub rotation_style: RotationStyle,
  pub volume: f64,
  pub variables: Vec<Value>,
  /// Names of `variables`, index for index.
  pub variable_names: Vec<String>,
  pub lists: Vec<Vec<Value>>,
  pub pen: PenState,
  pub say: Option<Say>,
}

impl Default for SpriteState {
  fn default() -> Self {
    SpriteState {
      visible: true,
      x: 0.,
      y: 0.,
      size: 100.,
      direction: 90.,
      draggable: false,
      current_costume: 0,
      costumes: Vec::new(),
      rotation_style: RotationStyle::AllAround,
      volume: 100.,
      variables: Vec::new(),
      variable_names: Vec::new(),
      lists: Vec::new(),
      pen: PenState::default(),
      say: None,
    }
  }
}

/// A sprite (or the stage) together with the scripts it is running.
#[derive(Debug)]
pub struct Sprite {
  pub info: SpriteInfo,
  pub state: SpriteState,
  /// Active threads in start order.
  pub threads: Vec<ScriptThread>,
  pub scripts: Rc<Scripts>,
  next_serial: u32,
}

impl Sprite {
  pub fn new(info: SpriteInfo, state: SpriteState, scripts: Rc<Scripts>) -> Self {
    Sprite {
      info,
      state,
      threads: Vec::new(),
      scripts,
      next_serial: 0,
    }
  }

  pub fn id(&self) -> SpriteId {
    self.info.id
  }

  /// Appends a thread positioned at `hat`. Does nothing unless `hat` is one of
  /// this sprite's hats.
  pub fn start_thread(&mut self, hat: BlockId) -> Option<ThreadId> {
    if !self.scripts.is_hat(hat) {
      return None;
    }
    let id = ThreadId {
      sprite: self.info.id,
      serial: self.next_serial,
    };
    self.next_serial += 1;
    trace!("[{}] starting {:?} at {}", self.info.name, id, hat);
    self.threads.push(ScriptThread::new(id, hat));
    Some(id)
  }

  /// Starts one thread per hat with `opcode`. With a filter, only hats whose
  /// first field matches it (ignoring case) fire.
  pub fn start_hats(
    &mut self,
    graph: &Graph,
    opcode: &str,
    filter: Option<&str>,
  ) -> Vec<ThreadId> {
    let scripts = Rc::clone(&self.scripts);
    scripts
      .hats(opcode)
      .iter()
      .filter(|hat| match filter {
        Some(filter) => graph
          .lookup(**hat)
          .ok()
          .and_then(|block| block.fields.first())
          .and_then(|(_, field)| field.text())
          .is_some_and(|text| text.to_lowercase() == filter.to_lowercase()),
        None => true,
      })
      .filter_map(|hat| self.start_thread(*hat))
      .collect()
  }

  pub fn active_threads(&self) -> impl Iterator<Item = &ScriptThread> {
    self.threads.iter().filter(|thread| !thread.is_finished())
  }

  /// Removes finished threads, returning their ids.
  pub fn reap(&mut self) -> Vec<ThreadId> {
    let reaped = self
      .threads
      .iter()
      .filter(|thread| thread.is_finished())
      .map(|thread| thread.id)
      .collect();
    self.threads.retain(|thread| !thread.is_finished());
    reaped
  }

  /// Drops every thread, returning their ids.
  pub fn stop_all(&mut self) -> Vec<ThreadId> {
    self.threads.drain(..).map(|thread| thread.id).collect()
  }

  pub fn make_clone(&self, id: SpriteId) -> Sprite {
    let mut state = self.state.clone();
    state.say = None;
    Sprite::new(
      SpriteInfo {
        id,
        name: self.info.name.clone(),
        is_stage: false,
        is_clone: true,
        deleted: false,
      },
      state,
      Rc::clone(&self.scripts),
    )
  }
}
