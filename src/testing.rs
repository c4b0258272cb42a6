//! Helpers for assembling small projects in unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use time::OffsetDateTime;

use crate::block::{Args, BlockDescriptor, BlockId, Field, GraphBuilder};
use crate::block::{ListRef, RawBlock, RawInput, Scope, VariableRef};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::opcode::{BlockResult, Context, Progress, Registry, UnknownOpcodePolicy};
use crate::project::{Config, Globals, LoadedProject, Runtime};
use crate::sprite::{Scripts, Sprite, SpriteId, SpriteInfo, SpriteState};
use crate::value::Value;

pub fn field_text(text: &str) -> Field {
  Field::Text(text.to_string())
}

pub fn num(number: f64) -> RawInput {
  RawInput::Value(Value::Number(number))
}

pub fn text(text: &str) -> RawInput {
  RawInput::Value(Value::from(text))
}

pub fn block(key: &str) -> RawInput {
  RawInput::Block(key.to_string())
}

pub fn global(index: usize) -> VariableRef {
  VariableRef {
    scope: Scope::Global,
    index,
  }
}

pub fn global_list(index: usize) -> ListRef {
  ListRef {
    scope: Scope::Global,
    index,
  }
}

/// Entries written by `test_mark`, as `sprite:key`.
pub fn trace(runtime: &Runtime) -> Vec<String> {
  runtime.shared().global_lists[0]
    .iter()
    .map(ToString::to_string)
    .collect()
}

pub fn run(runtime: &mut Runtime, sweeps: usize) {
  for _ in 0..sweeps {
    runtime.run_threads();
  }
}

fn test_mark(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  let entry = format!("{}:{}", ctx.sprite.info.name, block.key);
  ctx.shared.global_lists[0].push(Value::Text(entry));
  Ok(BlockResult::next(block.next))
}

fn test_stop_sprite(
  _: &mut Context<'_>,
  _: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  Ok(BlockResult::progress(Progress::StopSprite))
}

fn test_fail(
  _: &mut Context<'_>,
  _: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  Err(Error::Io(io::Error::other("device went away")))
}

/// Builtin opcodes plus `test_mark`, `test_stop_sprite` and `test_fail`.
pub fn registry() -> Registry {
  let mut registry = Registry::builtin();
  registry.command("test_mark", test_mark);
  registry.command("test_stop_sprite", test_stop_sprite);
  registry.command("test_fail", test_fail);
  registry
}

/// Host whose input is scripted by the test and whose output is recorded.
#[derive(Debug, Default, Clone)]
pub struct TestHost {
  pub keys: Vec<String>,
  pub mouse: (f64, f64),
  pub said: Rc<RefCell<Vec<(String, Option<String>)>>>,
  pub asked: Rc<RefCell<Vec<(String, String)>>>,
  /// Replies handed out one per poll; the asking script waits while empty.
  pub answers: Rc<RefCell<VecDeque<String>>>,
  /// Unix timestamp reported as the current time.
  pub clock: i64,
}

impl Host for TestHost {
  fn key_pressed(&self, key: &str) -> bool {
    self.keys.iter().any(|pressed| pressed == key)
  }

  fn any_key_pressed(&self) -> bool {
    !self.keys.is_empty()
  }

  fn mouse_position(&self) -> (f64, f64) {
    self.mouse
  }

  fn username(&self) -> String {
    "tester".to_string()
  }

  fn say(&mut self, sprite: &str, message: Option<&str>) {
    self
      .said
      .borrow_mut()
      .push((sprite.to_string(), message.map(str::to_string)));
  }

  fn ask(&mut self, sprite: &str, question: &str) {
    self
      .asked
      .borrow_mut()
      .push((sprite.to_string(), question.to_string()));
  }

  fn answer(&mut self) -> Option<String> {
    self.answers.borrow_mut().pop_front()
  }

  fn now(&self) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(self.clock)
      .expect("test clock in range")
  }
}

struct PendingSprite {
  name: String,
  is_stage: bool,
  blocks: Vec<BlockId>,
  state: SpriteState,
}

/// Builds a runtime sprite by sprite. Blocks belong to the sprite declared
/// last. Globals start as four zero variables named `g0` to `g3` and two
/// empty lists; list 0 is the `test_mark` trace.
pub struct ProjectBuilder {
  graph: GraphBuilder,
  sprites: Vec<PendingSprite>,
  config: Config,
  globals: Globals,
  host: TestHost,
}

impl ProjectBuilder {
  pub fn new() -> Self {
    ProjectBuilder {
      graph: GraphBuilder::new(),
      sprites: Vec::new(),
      config: Config {
        seed: Some(7),
        ..Config::default()
      },
      globals: Globals {
        variables: vec![Value::Number(0.); 4],
        variable_names: (0..4).map(|index| format!("g{index}")).collect(),
        lists: vec![Vec::new(), Vec::new()],
      },
      host: TestHost::default(),
    }
  }

  pub fn config(&mut self, update: impl FnOnce(&mut Config)) -> &mut Self {
    update(&mut self.config);
    self
  }

  pub fn host(&mut self, update: impl FnOnce(&mut TestHost)) -> &mut Self {
    update(&mut self.host);
    self
  }

  pub fn stage(&mut self) -> &mut Self {
    self.push_sprite("Stage", true)
  }

  pub fn sprite(&mut self, name: &str) -> &mut Self {
    self.push_sprite(name, false)
  }

  fn push_sprite(&mut self, name: &str, is_stage: bool) -> &mut Self {
    self.sprites.push(PendingSprite {
      name: name.to_string(),
      is_stage,
      blocks: Vec::new(),
      state: SpriteState::default(),
    });
    self
  }

  /// Edits the state of the sprite declared last.
  pub fn state(&mut self, update: impl FnOnce(&mut SpriteState)) -> &mut Self {
    if let Some(sprite) = self.sprites.last_mut() {
      update(&mut sprite.state);
    }
    self
  }

  pub fn block(&mut self, key: &str, raw: RawBlock) -> BlockId {
    let id = self.graph.insert(key, raw).expect("duplicate test block");
    self
      .sprites
      .last_mut()
      .expect("declare a sprite first")
      .blocks
      .push(id);
    id
  }

  pub fn hat(&mut self, key: &str, opcode: &str, next: Option<&str>) -> BlockId {
    let mut raw = RawBlock::new(opcode).top_level();
    if let Some(next) = next {
      raw = raw.next(next);
    }
    self.block(key, raw)
  }

  pub fn build(self) -> Runtime {
    let graph = self
      .graph
      .build(&registry(), UnknownOpcodePolicy::Reject)
      .expect("test graph should build");
    let sprites = self
      .sprites
      .into_iter()
      .enumerate()
      .map(|(index, pending)| {
        let scripts = Scripts::index(&graph, pending.blocks);
        Sprite::new(
          SpriteInfo {
            id: SpriteId(index as u32),
            name: pending.name,
            is_stage: pending.is_stage,
            is_clone: false,
            deleted: false,
          },
          pending.state,
          Rc::new(scripts),
        )
      })
      .collect();
    Runtime::new(
      LoadedProject {
        graph,
        sprites,
        globals: self.globals,
      },
      self.config,
      Box::new(self.host),
    )
  }
}

/// Runs `reporter` once under a green flag script and returns its value.
/// `extra` blocks can be referenced from the reporter's inputs.
pub fn evaluate(reporter: RawBlock, extra: Vec<(&str, RawBlock)>) -> Value {
  let mut builder = ProjectBuilder::new();
  builder.sprite("Cat");
  builder.hat("flag", "event_whenflagclicked", Some("set"));
  builder.block(
    "set",
    RawBlock::new("data_setvariableto")
      .field("VARIABLE", Field::Variable(global(0)))
      .input("VALUE", block("reporter")),
  );
  builder.block("reporter", reporter);
  for (key, raw) in extra {
    builder.block(key, raw);
  }
  let mut runtime = builder.build();
  runtime.green_flag();
  run(&mut runtime, 2);
  runtime.shared().global_variables[0].clone()
}
