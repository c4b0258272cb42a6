//! Builtin opcodes, grouped by block category.

use std::f64::consts::PI;

use crate::block::{Args, BlockDescriptor, BlockId, Field, ListRef, VariableRef};
use crate::diagnostics::DiagnosticKind;
use crate::error::Result;
use crate::opcode::{BlockResult, Context, Registry};
use crate::script::{Frame, FrameKind};
use crate::value::Value;

pub mod control;
pub mod data;
pub mod events;
pub mod looks;
pub mod motion;
pub mod operators;
pub mod pen;
pub mod procedures;
pub mod sensing;
pub mod sound;

pub fn register_all(registry: &mut Registry) {
  control::register(registry);
  data::register(registry);
  events::register(registry);
  looks::register(registry);
  motion::register(registry);
  operators::register(registry);
  pen::register(registry);
  procedures::register(registry);
  sensing::register(registry);
  sound::register(registry);
}

/// Shadow menus report their only field.
pub(crate) fn menu(
  _: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  Ok(Value::Text(
    block
      .fields
      .first()
      .and_then(|(_, field)| field.text())
      .unwrap_or_default()
      .to_string(),
  ))
}

pub(crate) fn aux_value(args: &Args<'_>, name: &str) -> Value {
  args.get(name).cloned().unwrap_or_default()
}

pub(crate) fn aux_f64(ctx: &mut Context<'_>, args: &Args<'_>, name: &str) -> f64 {
  match args.get(name).map(Value::to_number) {
    Some(Ok(number)) => number,
    Some(Err(error)) => {
      ctx.report(DiagnosticKind::InvalidCoercion, format!("{name}: {error}"));
      0.
    }
    None => 0.,
  }
}

pub(crate) fn aux_bool(ctx: &mut Context<'_>, args: &Args<'_>, name: &str) -> bool {
  match args.get(name).map(Value::to_bool) {
    Some(Ok(boolean)) => boolean,
    Some(Err(error)) => {
      ctx.report(DiagnosticKind::InvalidCoercion, format!("{name}: {error}"));
      false
    }
    None => false,
  }
}

pub(crate) fn aux_string(
  ctx: &mut Context<'_>,
  args: &Args<'_>,
  name: &str,
) -> String {
  match args.get(name).map(Value::to_text) {
    Some(Ok(text)) => text,
    Some(Err(error)) => {
      ctx.report(DiagnosticKind::InvalidCoercion, format!("{name}: {error}"));
      String::new()
    }
    None => String::new(),
  }
}

/// Text of a dropdown field, or `""` when the block has no such field.
pub(crate) fn aux_field<'b>(block: &'b BlockDescriptor, name: &str) -> &'b str {
  block.field(name).and_then(Field::text).unwrap_or_default()
}

pub(crate) fn aux_variable(block: &BlockDescriptor) -> Option<VariableRef> {
  match block.field("VARIABLE") {
    Some(Field::Variable(variable)) => Some(*variable),
    _ => None,
  }
}

pub(crate) fn aux_list(block: &BlockDescriptor) -> Option<ListRef> {
  match block.field("LIST") {
    Some(Field::List(list)) => Some(*list),
    _ => None,
  }
}

/// Stays on `block` for another tick.
pub(crate) fn yield_here(block: &BlockDescriptor) -> Result<BlockResult> {
  Ok(BlockResult::next(block.id))
}

/// First block of the loop body, or the loop itself when the body is empty so
/// the thread still yields once per iteration.
pub(crate) fn body(block: &BlockDescriptor, name: &str) -> BlockId {
  block.substack(name).unwrap_or(block.id)
}

/// Deadline of the `Wait` or `Say` frame `block` pushed, if it is innermost.
pub(crate) fn deadline(ctx: &Context<'_>, block: &BlockDescriptor) -> Option<f64> {
  match ctx.thread.frame(block.id) {
    Some(Frame {
      kind: FrameKind::Wait { until } | FrameKind::Say { until },
      ..
    }) => Some(*until),
    _ => None,
  }
}

pub(crate) fn limit_precision(value: f64) -> f64 {
  let rounded = value.round();
  if (value - rounded).abs() < 1e-9_f64 {
    rounded
  } else {
    value
  }
}

pub(crate) fn degrees_to_radians(degrees: f64) -> f64 {
  (PI * degrees) / 180.
}

pub(crate) fn radians_to_degrees(radians: f64) -> f64 {
  (radians * 180.) / PI
}

/// Rounds to ten decimal places so `sin 180` reads as 0.
pub(crate) fn truncate_float(value: f64) -> f64 {
  (value * 1e10).round() / 1e10
}

/// Wraps `direction` into Scratch's (-180, 180] range.
pub(crate) fn wrap_direction(direction: f64) -> f64 {
  direction - ((direction + 179.) / 360.).floor() * 360.
}
