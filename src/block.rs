use std::{collections::HashMap, fmt};

use log::warn;

use crate::error::{Error, Result};
use crate::opcode::{noop, BlockResult, Context, Handler, Registry, UnknownOpcodePolicy};
use crate::value::{list_contents, Value};

/// Identifies a block inside a [`Graph`]. Ids are dense and start at 1;
/// [`BlockId::END`] marks the end of a script.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct BlockId(pub usize);

impl BlockId {
  pub const END: BlockId = BlockId(0);

  pub fn is_end(self) -> bool {
    self == BlockId::END
  }
}

impl fmt::Display for BlockId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
  Local,
  Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableRef {
  pub scope: Scope,
  pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListRef {
  pub scope: Scope,
  pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastRef {
  pub name: String,
  pub id: String,
}

/// An input slot of a loaded block.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
  /// Evaluated before the owning block runs.
  Reporter(BlockId),
  /// First block of a nested script (loop or branch body).
  Stack(BlockId),
  Value(Value),
  Broadcast(BroadcastRef),
  Variable(VariableRef),
  List(ListRef),
  Empty,
}

/// An input slot before block references have been resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
  Block(String),
  Value(Value),
  Broadcast(BroadcastRef),
  Variable(VariableRef),
  List(ListRef),
  Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
  Text(String),
  Variable(VariableRef),
  List(ListRef),
}

impl Field {
  pub fn text(&self) -> Option<&str> {
    match self {
      Field::Text(text) => Some(text.as_str()),
      _ => None,
    }
  }
}

/// Custom block signature attached to prototypes and calls.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mutation {
  pub proccode: String,
  pub argument_ids: Vec<String>,
  pub argument_names: Vec<String>,
  pub warp: bool,
}

#[derive(Debug)]
pub struct BlockDescriptor {
  pub id: BlockId,
  /// Identifier the block was loaded under.
  pub key: String,
  pub opcode: String,
  pub handler: Handler,
  pub inputs: Vec<(String, Input)>,
  pub fields: Vec<(String, Field)>,
  pub next: BlockId,
  pub top_level: bool,
  pub mutation: Option<Mutation>,
}

impl BlockDescriptor {
  pub fn input(&self, name: &str) -> Option<&Input> {
    self
      .inputs
      .iter()
      .find(|(slot, _)| slot == name)
      .map(|(_, input)| input)
  }

  pub fn field(&self, name: &str) -> Option<&Field> {
    self
      .fields
      .iter()
      .find(|(slot, _)| slot == name)
      .map(|(_, field)| field)
  }

  /// First block of the substack bound to `name`, if any.
  pub fn substack(&self, name: &str) -> Option<BlockId> {
    match self.input(name) {
      Some(Input::Stack(id)) => Some(*id),
      _ => None,
    }
  }

  pub fn is_hat(&self) -> bool {
    matches!(self.handler, Handler::Hat)
  }
}

/// Input values of one block evaluation, in slot order.
#[derive(Debug, Default)]
pub struct Args<'g>(Vec<(&'g str, Value)>);

impl<'g> Args<'g> {
  pub fn get(&self, name: &str) -> Option<&Value> {
    self
      .0
      .iter()
      .find(|(slot, _)| *slot == name)
      .map(|(_, value)| value)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&'g str, &Value)> {
    self.0.iter().map(|(slot, value)| (*slot, value))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// Every block of a loaded project. Read-only once built.
#[derive(Debug, Default)]
pub struct Graph {
  blocks: Vec<BlockDescriptor>,
}

impl Graph {
  pub fn lookup(&self, id: BlockId) -> Result<&BlockDescriptor> {
    id.0
      .checked_sub(1)
      .and_then(|index| self.blocks.get(index))
      .ok_or(Error::UnknownBlock(id))
  }

  /// Runs one block: its reporter inputs first, depth-first in slot order,
  /// then the opcode itself.
  pub fn evaluate(
    &self,
    id: BlockId,
    ctx: &mut Context<'_>,
  ) -> Result<BlockResult> {
    let block = self.lookup(id)?;
    let args = self.evaluate_inputs(block, ctx)?;
    match block.handler {
      Handler::Hat => Ok(BlockResult::next(block.next)),
      Handler::Command(command) => command(ctx, block, &args),
      Handler::Reporter(reporter) => {
        let value = reporter(ctx, block, &args)?;
        Ok(BlockResult::value(value, block.next))
      }
    }
  }

  fn evaluate_inputs<'g>(
    &'g self,
    block: &'g BlockDescriptor,
    ctx: &mut Context<'_>,
  ) -> Result<Args<'g>> {
    let mut args = Vec::with_capacity(block.inputs.len());
    for (name, input) in &block.inputs {
      let value = match input {
        Input::Reporter(id) => self.evaluate(*id, ctx)?.value,
        Input::Value(value) => value.clone(),
        Input::Broadcast(broadcast) => Value::Text(broadcast.name.clone()),
        Input::Variable(variable) => ctx.variable(*variable),
        Input::List(list) => Value::Text(list_contents(ctx.list(*list))),
        Input::Stack(_) | Input::Empty => continue,
      };
      args.push((name.as_str(), value));
    }
    Ok(Args(args))
  }

  pub fn len(&self) -> usize {
    self.blocks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &BlockDescriptor> {
    self.blocks.iter()
  }
}

/// A block as handed over by a loader, with references still by key.
#[derive(Debug, Clone, Default)]
pub struct RawBlock {
  pub opcode: String,
  pub next: Option<String>,
  pub inputs: Vec<(String, RawInput)>,
  pub fields: Vec<(String, Field)>,
  pub top_level: bool,
  pub mutation: Option<Mutation>,
}

impl RawBlock {
  pub fn new(opcode: impl Into<String>) -> Self {
    RawBlock {
      opcode: opcode.into(),
      ..Default::default()
    }
  }

  pub fn next(mut self, key: impl Into<String>) -> Self {
    self.next = Some(key.into());
    self
  }

  pub fn top_level(mut self) -> Self {
    self.top_level = true;
    self
  }

  pub fn input(mut self, name: impl Into<String>, input: RawInput) -> Self {
    self.inputs.push((name.into(), input));
    self
  }

  pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
    self.fields.push((name.into(), field));
    self
  }

  pub fn mutation(mut self, mutation: Mutation) -> Self {
    self.mutation = Some(mutation);
    self
  }
}

/// Collects raw blocks and turns them into a validated [`Graph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
  keys: HashMap<String, BlockId>,
  pending: Vec<(String, RawBlock)>,
}

impl GraphBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(
    &mut self,
    key: impl Into<String>,
    block: RawBlock,
  ) -> Result<BlockId> {
    let key = key.into();
    if self.keys.contains_key(&key) {
      return Err(Error::DuplicateBlock(key));
    }
    let id = BlockId(self.pending.len() + 1);
    self.keys.insert(key.clone(), id);
    self.pending.push((key, block));
    Ok(id)
  }

  pub fn key(&self, key: &str) -> Option<BlockId> {
    self.keys.get(key).copied()
  }

  pub fn len(&self) -> usize {
    self.pending.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pending.is_empty()
  }

  pub fn build(
    self,
    registry: &Registry,
    policy: UnknownOpcodePolicy,
  ) -> Result<Graph> {
    let mut handlers = Vec::with_capacity(self.pending.len());
    let mut ignored: Vec<&str> = Vec::new();
    for (key, block) in &self.pending {
      let handler = match registry.get(&block.opcode) {
        Some(handler) => handler,
        None => match policy {
          UnknownOpcodePolicy::Reject => {
            return Err(Error::UnknownOpcode {
              block: key.clone(),
              opcode: block.opcode.clone(),
            })
          }
          UnknownOpcodePolicy::Ignore => {
            if !ignored.contains(&block.opcode.as_str()) {
              warn!("ignoring unknown opcode {}", block.opcode);
              ignored.push(&block.opcode);
            }
            Handler::Command(noop)
          }
        },
      };
      handlers.push(handler);
    }

    let mut blocks = Vec::with_capacity(self.pending.len());
    for (index, (key, raw)) in self.pending.iter().enumerate() {
      let next = match &raw.next {
        Some(successor) => {
          self.keys.get(successor).copied().ok_or_else(|| {
            Error::DanglingSuccessor {
              block: key.clone(),
              successor: successor.clone(),
            }
          })?
        }
        None => BlockId::END,
      };
      let mut inputs = Vec::with_capacity(raw.inputs.len());
      for (name, input) in &raw.inputs {
        let input = match input {
          RawInput::Block(target) => {
            let id = self.keys.get(target).copied().ok_or_else(|| {
              Error::DanglingInput {
                block: key.clone(),
                input: name.clone(),
                target: target.clone(),
              }
            })?;
            match handlers[id.0 - 1] {
              Handler::Reporter(_) => Input::Reporter(id),
              _ => Input::Stack(id),
            }
          }
          RawInput::Value(value) => Input::Value(value.clone()),
          RawInput::Broadcast(broadcast) => Input::Broadcast(broadcast.clone()),
          RawInput::Variable(variable) => Input::Variable(*variable),
          RawInput::List(list) => Input::List(*list),
          RawInput::Empty => Input::Empty,
        };
        inputs.push((name.clone(), input));
      }
      blocks.push(BlockDescriptor {
        id: BlockId(index + 1),
        key: key.clone(),
        opcode: raw.opcode.clone(),
        handler: handlers[index],
        inputs,
        fields: raw.fields.clone(),
        next,
        top_level: raw.top_level,
        mutation: raw.mutation.clone(),
      });
    }
    Ok(Graph { blocks })
  }
}
