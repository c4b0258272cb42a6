//! Reader for an extracted Scratch 3 `project.json`.

use std::{collections::HashMap, fmt, io::Read, marker::PhantomData, rc::Rc};

use log::{debug, info};
use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::block::{BroadcastRef, Field, GraphBuilder, ListRef, Mutation, RawBlock};
use crate::block::{RawInput, Scope, VariableRef};
use crate::error::{Error, Result};
use crate::opcode::{Registry, UnknownOpcodePolicy};
use crate::project::{Globals, LoadedProject};
use crate::sprite::{RotationStyle, Scripts, Sprite, SpriteId, SpriteInfo, SpriteState};
use crate::value::Value;

#[derive(Deserialize)]
struct Project {
  targets: Vec<Target>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Target {
  is_stage: bool,
  name: String,
  #[serde(default)]
  variables: Ordered<Variable>,
  #[serde(default)]
  lists: Ordered<List>,
  #[serde(default)]
  blocks: Ordered<BlockEntry>,
  #[serde(default)]
  current_costume: usize,
  #[serde(default)]
  costumes: Vec<Costume>,
  #[serde(default = "default_volume")]
  volume: f64,
  #[serde(default = "default_true")]
  visible: bool,
  #[serde(default)]
  x: f64,
  #[serde(default)]
  y: f64,
  #[serde(default = "default_size")]
  size: f64,
  #[serde(default = "default_direction")]
  direction: f64,
  #[serde(default)]
  draggable: bool,
  #[serde(default = "default_rotation_style")]
  rotation_style: RotationStyle,
}

fn default_true() -> bool {
  true
}

fn default_volume() -> f64 {
  100.
}

fn default_size() -> f64 {
  100.
}

fn default_direction() -> f64 {
  90.
}

fn default_rotation_style() -> RotationStyle {
  RotationStyle::AllAround
}

#[derive(Deserialize)]
struct Costume {
  name: String,
}

/// A JSON object read as key/value pairs in document order. Input order
/// decides reporter evaluation order, so a `HashMap` will not do.
struct Ordered<T>(Vec<(String, T)>);

impl<T> Default for Ordered<T> {
  fn default() -> Self {
    Ordered(Vec::new())
  }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Ordered<T> {
  fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
    struct MapVisitor<T>(PhantomData<T>);
    impl<'de, T: Deserialize<'de>> Visitor<'de> for MapVisitor<T> {
      type Value = Ordered<T>;
      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a map")
      }
      fn visit_map<A: MapAccess<'de>>(
        self,
        mut map: A,
      ) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(entry) = map.next_entry::<String, T>()? {
          entries.push(entry);
        }
        Ok(Ordered(entries))
      }
    }
    de.deserialize_map(MapVisitor(PhantomData))
  }
}

/// `[name, value]`, with a trailing cloud flag on cloud variables.
struct Variable {
  name: String,
  value: Value,
}

impl<'de> Deserialize<'de> for Variable {
  fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
    struct SeqVisitor;
    impl<'de> Visitor<'de> for SeqVisitor {
      type Value = Variable;
      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Variable")
      }
      fn visit_seq<A: SeqAccess<'de>>(
        self,
        mut seq: A,
      ) -> Result<Self::Value, A::Error> {
        let name = seq
          .next_element::<String>()?
          .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let value = seq.next_element::<Value>()?.unwrap_or_default();
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Variable { name, value })
      }
    }
    de.deserialize_seq(SeqVisitor)
  }
}

struct List {
  name: String,
  items: Vec<Value>,
}

impl<'de> Deserialize<'de> for List {
  fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
    let (name, items) = Deserialize::deserialize(de)?;
    Ok(Self { name, items })
  }
}

/// Entries of `blocks`: real blocks, or loose variable/list reporters
/// stored as bare primitive arrays.
#[derive(Deserialize)]
#[serde(untagged)]
enum BlockEntry {
  Block(Block),
  Primitive(Vec<IgnoredAny>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Block {
  opcode: String,
  next: Option<String>,
  #[serde(default)]
  inputs: Ordered<Input>,
  #[serde(default)]
  fields: Ordered<FieldEntry>,
  #[serde(default)]
  top_level: bool,
  mutation: Option<MutationEntry>,
}

enum Input {
  Block(String),
  Value(Value),
  Broadcast { name: String, id: String },
  Variable { name: String, id: String },
  List { name: String, id: String },
  Empty,
}

impl<'de> Deserialize<'de> for Input {
  fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
    struct SeqVisitor;
    impl<'de> Visitor<'de> for SeqVisitor {
      type Value = Input;
      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Input")
      }
      fn visit_seq<A: SeqAccess<'de>>(
        self,
        mut seq: A,
      ) -> Result<Self::Value, A::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Slot {
          Block(String),
          Primitive(Vec<Value>),
        }
        let _shadow = seq.next_element::<u8>()?;
        let input = match seq.next_element::<Option<Slot>>()?.flatten() {
          Some(Slot::Block(key)) => Input::Block(key),
          Some(Slot::Primitive(values)) => primitive(values)?,
          None => Input::Empty,
        };
        // The obscured shadow, if any.
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(input)
      }
    }
    de.deserialize_seq(SeqVisitor)
  }
}

/// Decodes `[code, ...]` primitive arrays: 4 to 10 are literals, 11 a
/// broadcast, 12 a variable and 13 a list.
fn primitive<E: de::Error>(mut values: Vec<Value>) -> Result<Input, E> {
  let code = values
    .first()
    .and_then(|code| code.to_number().ok())
    .unwrap_or(-1.) as i32;
  if values.len() < 2 {
    return Err(E::custom(format!("primitive {code} without a value")));
  }
  if (4..=10).contains(&code) {
    return Ok(Input::Value(values.swap_remove(1)));
  }
  let text = |index: usize| {
    values
      .get(index)
      .map(ToString::to_string)
      .unwrap_or_default()
  };
  let (name, id) = (text(1), text(2));
  Ok(match code {
    11 => Input::Broadcast { name, id },
    12 => Input::Variable { name, id },
    13 => Input::List { name, id },
    other => return Err(E::custom(format!("unknown primitive code {other}"))),
  })
}

/// `[value, id]`; the id is null for plain dropdowns.
struct FieldEntry {
  value: String,
  id: Option<String>,
}

impl<'de> Deserialize<'de> for FieldEntry {
  fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
    struct SeqVisitor;
    impl<'de> Visitor<'de> for SeqVisitor {
      type Value = FieldEntry;
      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Field")
      }
      fn visit_seq<A: SeqAccess<'de>>(
        self,
        mut seq: A,
      ) -> Result<Self::Value, A::Error> {
        let value = seq.next_element::<Value>()?.unwrap_or_default();
        let id = seq.next_element::<Option<String>>()?.flatten();
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(FieldEntry {
          value: value.to_string(),
          id,
        })
      }
    }
    de.deserialize_seq(SeqVisitor)
  }
}

/// Procedure mutation; the argument lists are JSON encoded inside strings.
#[derive(Deserialize)]
struct MutationEntry {
  #[serde(default)]
  proccode: String,
  argumentids: Option<String>,
  argumentnames: Option<String>,
  warp: Option<Value>,
}

impl MutationEntry {
  fn into_mutation(self) -> Result<Mutation> {
    let decode = |encoded: Option<String>| -> Result<Vec<String>> {
      match encoded {
        Some(encoded) => Ok(serde_json::from_str(&encoded)?),
        None => Ok(Vec::new()),
      }
    };
    Ok(Mutation {
      proccode: self.proccode,
      argument_ids: decode(self.argumentids)?,
      argument_names: decode(self.argumentnames)?,
      warp: self
        .warp
        .is_some_and(|warp| warp.to_bool().unwrap_or(false)),
    })
  }
}

/// Variable and list ids visible from one target.
struct Names<'a> {
  global_variables: &'a HashMap<String, usize>,
  global_lists: &'a HashMap<String, usize>,
  variables: HashMap<String, usize>,
  lists: HashMap<String, usize>,
}

impl Names<'_> {
  /// Local first, then global. An id nobody declares becomes a new local.
  fn variable(&mut self, state: &mut SpriteState, name: &str, id: &str) -> VariableRef {
    if let Some(index) = self.variables.get(id) {
      return VariableRef {
        scope: Scope::Local,
        index: *index,
      };
    }
    if let Some(index) = self.global_variables.get(id) {
      return VariableRef {
        scope: Scope::Global,
        index: *index,
      };
    }
    debug!("creating undeclared variable {name:?}");
    let index = state.variables.len();
    state.variables.push(Value::Number(0.));
    state.variable_names.push(name.to_string());
    self.variables.insert(id.to_string(), index);
    VariableRef {
      scope: Scope::Local,
      index,
    }
  }

  fn list(&mut self, state: &mut SpriteState, name: &str, id: &str) -> ListRef {
    if let Some(index) = self.lists.get(id) {
      return ListRef {
        scope: Scope::Local,
        index: *index,
      };
    }
    if let Some(index) = self.global_lists.get(id) {
      return ListRef {
        scope: Scope::Global,
        index: *index,
      };
    }
    debug!("creating undeclared list {name:?}");
    let index = state.lists.len();
    state.lists.push(Vec::new());
    self.lists.insert(id.to_string(), index);
    ListRef {
      scope: Scope::Local,
      index,
    }
  }
}

/// Block ids are only unique within a target, so graph keys carry the
/// target's position.
fn key(target: usize, id: &str) -> String {
  format!("{target}:{id}")
}

fn raw_block(
  block: Block,
  target: usize,
  names: &mut Names,
  state: &mut SpriteState,
) -> Result<RawBlock> {
  let mut raw = RawBlock::new(block.opcode);
  raw.next = block.next.map(|next| key(target, &next));
  raw.top_level = block.top_level;
  for (name, input) in block.inputs.0 {
    let input = match input {
      Input::Block(id) => RawInput::Block(key(target, &id)),
      Input::Value(value) => RawInput::Value(value),
      Input::Broadcast { name, id } => {
        RawInput::Broadcast(BroadcastRef { name, id })
      }
      Input::Variable { name, id } => {
        RawInput::Variable(names.variable(state, &name, &id))
      }
      Input::List { name, id } => RawInput::List(names.list(state, &name, &id)),
      Input::Empty => RawInput::Empty,
    };
    raw = raw.input(name, input);
  }
  for (name, entry) in block.fields.0 {
    let field = match (name.as_str(), &entry.id) {
      ("VARIABLE", Some(id)) => {
        Field::Variable(names.variable(state, &entry.value, id))
      }
      ("LIST", Some(id)) => Field::List(names.list(state, &entry.value, id)),
      _ => Field::Text(entry.value),
    };
    raw = raw.field(name, field);
  }
  if let Some(mutation) = block.mutation {
    raw = raw.mutation(mutation.into_mutation()?);
  }
  Ok(raw)
}

/// Reads a project description and builds its graph and sprites. The stage
/// is registered first, then the sprites in document order.
pub fn load(
  reader: impl Read,
  registry: &Registry,
  policy: UnknownOpcodePolicy,
) -> Result<LoadedProject> {
  let project: Project = serde_json::from_reader(reader)?;
  let mut targets = project.targets;
  let stage = targets
    .iter()
    .position(|target| target.is_stage)
    .ok_or(Error::MissingStage)?;
  let stage = targets.remove(stage);
  targets.insert(0, stage);

  let mut globals = Globals::default();
  let mut global_variables = HashMap::new();
  let mut global_lists = HashMap::new();
  for (id, variable) in &targets[0].variables.0 {
    debug!("global variable {:?}", variable.name);
    global_variables.insert(id.clone(), globals.variables.len());
    globals.variables.push(variable.value.clone());
    globals.variable_names.push(variable.name.clone());
  }
  for (id, list) in &targets[0].lists.0 {
    debug!("global list {:?}", list.name);
    global_lists.insert(id.clone(), globals.lists.len());
    globals.lists.push(list.items.clone());
  }

  let mut builder = GraphBuilder::new();
  let mut pending = Vec::with_capacity(targets.len());
  for (index, target) in targets.into_iter().enumerate() {
    let mut state = SpriteState {
      visible: target.visible,
      x: target.x,
      y: target.y,
      size: target.size,
      direction: target.direction,
      draggable: target.draggable,
      current_costume: target.current_costume,
      costumes: target.costumes.into_iter().map(|costume| costume.name).collect(),
      rotation_style: target.rotation_style,
      volume: target.volume,
      ..SpriteState::default()
    };
    let mut names = Names {
      global_variables: &global_variables,
      global_lists: &global_lists,
      variables: HashMap::new(),
      lists: HashMap::new(),
    };
    if !target.is_stage {
      for (id, variable) in target.variables.0 {
        names.variables.insert(id, state.variables.len());
        state.variables.push(variable.value);
        state.variable_names.push(variable.name);
      }
      for (id, list) in target.lists.0 {
        names.lists.insert(id, state.lists.len());
        state.lists.push(list.items);
      }
    }
    let mut blocks = Vec::with_capacity(target.blocks.0.len());
    let mut skipped = 0;
    for (id, entry) in target.blocks.0 {
      let BlockEntry::Block(block) = entry else {
        skipped += 1;
        continue;
      };
      let raw = raw_block(block, index, &mut names, &mut state)?;
      blocks.push(builder.insert(key(index, &id), raw)?);
    }
    if skipped > 0 {
      debug!("[{}] skipped {skipped} loose reporters", target.name);
    }
    let info = SpriteInfo {
      id: SpriteId(index as u32),
      name: target.name,
      is_stage: target.is_stage,
      is_clone: false,
      deleted: false,
    };
    pending.push((info, state, blocks));
  }

  let graph = builder.build(registry, policy)?;
  let sprites: Vec<Sprite> = pending
    .into_iter()
    .map(|(info, state, blocks)| {
      let scripts = Scripts::index(&graph, blocks);
      Sprite::new(info, state, Rc::new(scripts))
    })
    .collect();
  info!(
    "read {} blocks, {} targets, {} global variables",
    graph.len(),
    sprites.len(),
    globals.variables.len()
  );
  Ok(LoadedProject {
    graph,
    sprites,
    globals,
  })
}
