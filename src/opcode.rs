use std::collections::HashMap;

use serde::Deserialize;

use crate::block::{Args, BlockDescriptor, BlockId, Graph, ListRef, Scope, VariableRef};
use crate::blocks;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::Result;
use crate::project::SharedState;
use crate::script::ScriptThread;
use crate::sprite::Sprite;
use crate::value::Value;

/// What the scheduler should do with a thread after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
  /// Keep the thread and resume at the successor next tick.
  Continue,
  /// The script finished; reap the thread after the sprite's turn.
  ReturnAndStopScript,
  /// Stop every script of the current sprite.
  StopSprite,
  /// Tear the whole run down.
  CloseProject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockResult {
  pub value: Value,
  pub progress: Progress,
  pub next: BlockId,
}

impl BlockResult {
  pub fn next(next: BlockId) -> Self {
    BlockResult {
      value: Value::default(),
      progress: Progress::Continue,
      next,
    }
  }

  pub fn value(value: Value, next: BlockId) -> Self {
    BlockResult {
      value,
      progress: Progress::Continue,
      next,
    }
  }

  pub fn progress(progress: Progress) -> Self {
    BlockResult {
      value: Value::default(),
      progress,
      next: BlockId::END,
    }
  }
}

pub type CommandFn =
  fn(&mut Context<'_>, &BlockDescriptor, &Args<'_>) -> Result<BlockResult>;

pub type ReporterFn =
  fn(&mut Context<'_>, &BlockDescriptor, &Args<'_>) -> Result<Value>;

#[derive(Debug, Clone, Copy)]
pub enum Handler {
  /// Entry point of a script; does nothing when stepped.
  Hat,
  Command(CommandFn),
  Reporter(ReporterFn),
}

/// What to do with opcodes the registry does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownOpcodePolicy {
  #[default]
  Reject,
  Ignore,
}

/// Opcode table consulted once, while a graph is built.
#[derive(Debug, Default)]
pub struct Registry {
  handlers: HashMap<String, Handler>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn builtin() -> Self {
    let mut registry = Self::new();
    blocks::register_all(&mut registry);
    registry
  }

  pub fn register(&mut self, opcode: impl Into<String>, handler: Handler) {
    self.handlers.insert(opcode.into(), handler);
  }

  pub fn hat(&mut self, opcode: &str) {
    self.register(opcode, Handler::Hat);
  }

  pub fn command(&mut self, opcode: &str, command: CommandFn) {
    self.register(opcode, Handler::Command(command));
  }

  pub fn reporter(&mut self, opcode: &str, reporter: ReporterFn) {
    self.register(opcode, Handler::Reporter(reporter));
  }

  pub fn get(&self, opcode: &str) -> Option<Handler> {
    self.handlers.get(opcode).copied()
  }

  pub fn contains(&self, opcode: &str) -> bool {
    self.handlers.contains_key(opcode)
  }

  pub fn len(&self) -> usize {
    self.handlers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.handlers.is_empty()
  }
}

pub fn noop(
  _: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  Ok(BlockResult::next(block.next))
}

/// Everything an opcode may touch while one thread takes its step.
pub struct Context<'a> {
  pub graph: &'a Graph,
  pub sprite: &'a mut Sprite,
  pub thread: &'a mut ScriptThread,
  pub shared: &'a mut SharedState,
}

impl<'a> Context<'a> {
  pub fn variable(&self, variable: VariableRef) -> Value {
    let variables = match variable.scope {
      Scope::Local => &self.sprite.state.variables,
      Scope::Global => &self.shared.global_variables,
    };
    variables.get(variable.index).cloned().unwrap_or_default()
  }

  pub fn set_variable(&mut self, variable: VariableRef, value: Value) {
    let variables = match variable.scope {
      Scope::Local => &mut self.sprite.state.variables,
      Scope::Global => &mut self.shared.global_variables,
    };
    if let Some(slot) = variables.get_mut(variable.index) {
      *slot = value;
    }
  }

  pub fn list(&self, list: ListRef) -> &[Value] {
    let lists = match list.scope {
      Scope::Local => &self.sprite.state.lists,
      Scope::Global => &self.shared.global_lists,
    };
    lists.get(list.index).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn list_mut(&mut self, list: ListRef) -> Option<&mut Vec<Value>> {
    let lists = match list.scope {
      Scope::Local => &mut self.sprite.state.lists,
      Scope::Global => &mut self.shared.global_lists,
    };
    lists.get_mut(list.index)
  }

  /// Records a recovered failure on the diagnostics channel.
  pub fn report(&mut self, kind: DiagnosticKind, message: String) {
    let diagnostic = Diagnostic {
      kind,
      sprite: self.sprite.info.name.clone(),
      block: self.thread.current,
      message,
    };
    self.shared.diagnostics.report(diagnostic);
  }
}
