use log::{debug, error, info, warn};

use super::aux_field;
use crate::block::{Args, BlockDescriptor, Input, Mutation};
use crate::error::Result;
use crate::opcode::{BlockResult, Context, Registry};
use crate::script::FrameKind;
use crate::value::Value;

/// Marker the log hooks wrap their names in, so they cannot clash with
/// blocks a user would name by hand.
const HOOK_MARK: &str = "\u{200B}\u{200B}";

pub fn register(registry: &mut Registry) {
  registry.hat("procedures_definition");
  registry.hat("procedures_prototype");
  registry.command("procedures_call", call);
  registry.reporter("argument_reporter_string_number", argument_string_number);
  registry.reporter("argument_reporter_boolean", argument_boolean);
}

/// Signature of the definition at `definition`, taken from its prototype.
fn prototype<'g>(
  ctx: &Context<'g>,
  definition: &BlockDescriptor,
) -> Option<&'g Mutation> {
  let graph = ctx.graph;
  match definition.input("custom_block") {
    Some(Input::Stack(prototype)) => graph.lookup(*prototype).ok()?.mutation.as_ref(),
    _ => None,
  }
}

/// Value an argument takes when the call leaves its slot empty, one per
/// `%s`, `%n` or `%b` placeholder of `proccode`.
fn argument_defaults(proccode: &str) -> Vec<Value> {
  let mut defaults = Vec::new();
  let mut chars = proccode.chars();
  while let Some(c) = chars.next() {
    if c != '%' {
      continue;
    }
    match chars.next() {
      Some('b') => defaults.push(Value::Bool(false)),
      Some('s' | 'n') => defaults.push(Value::Number(0.)),
      _ => {}
    }
  }
  defaults
}

/// The `log`, `warn` and `error` blocks a project can define to write to the
/// host's log. Their first argument is the message.
fn log_hook(ctx: &Context<'_>, proccode: &str, args: &Args<'_>, ids: &[String]) {
  let Some(name) = proccode
    .strip_prefix(HOOK_MARK)
    .and_then(|rest| rest.strip_suffix(" %s"))
    .and_then(|rest| rest.strip_suffix(HOOK_MARK))
  else {
    return;
  };
  let message = ids
    .first()
    .and_then(|id| args.get(id))
    .and_then(|value| value.to_text().ok())
    .unwrap_or_default();
  let sprite = &ctx.sprite.info.name;
  match name {
    "log" => info!("[project] [{sprite}] {message}"),
    "warn" => warn!("[project] [{sprite}] {message}"),
    "error" => error!("[project] [{sprite}] {message}"),
    _ => {}
  }
}

/// Jumps into the sprite's definition of the called block. A definition
/// marked to run without screen refresh is stepped to completion by the
/// thread.
fn call(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let Some(mutation) = block.mutation.as_ref() else {
    return Ok(BlockResult::next(block.next));
  };
  let proccode = mutation.proccode.as_str();
  log_hook(ctx, proccode, args, &mutation.argument_ids);
  let Some(definition) = ctx.sprite.scripts.procedure(proccode) else {
    debug!("[{}] no definition for {proccode:?}", ctx.sprite.info.name);
    return Ok(BlockResult::next(block.next));
  };
  let graph = ctx.graph;
  let definition = graph.lookup(definition)?;
  let (bound, warp) = match prototype(ctx, definition) {
    Some(signature) => {
      let defaults = argument_defaults(&signature.proccode);
      let bound = signature
        .argument_ids
        .iter()
        .zip(&signature.argument_names)
        .enumerate()
        .map(|(index, (id, name))| {
          let value = args
            .get(id)
            .or_else(|| defaults.get(index))
            .cloned()
            .unwrap_or_default();
          (name.clone(), value)
        })
        .collect();
      (bound, signature.warp)
    }
    None => (Vec::new(), false),
  };
  ctx.thread.push(
    block.id,
    FrameKind::Call {
      return_to: block.next,
      args: bound,
      warp,
    },
  );
  Ok(BlockResult::next(definition.id))
}

fn argument_string_number(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  let name = aux_field(block, "VALUE");
  if name == "Scratch Everywhere! platform" {
    return Ok(Value::from(std::env::consts::OS));
  }
  Ok(ctx.thread.argument(name).cloned().unwrap_or(Value::Number(0.)))
}

/// Reads a boolean argument. `is Scratch Everywhere!?` is true outside any
/// call so projects can detect this runtime.
fn argument_boolean(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  let name = aux_field(block, "VALUE");
  if name == "is Scratch Everywhere!?" {
    return Ok(Value::Bool(true));
  }
  Ok(ctx.thread.argument(name).cloned().unwrap_or(Value::Bool(false)))
}
