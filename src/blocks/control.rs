use log::debug;

use super::{aux_bool, aux_f64, aux_field, aux_string, aux_variable, body, deadline, yield_here};
use crate::block::{Args, BlockDescriptor};
use crate::error::Result;
use crate::opcode::{BlockResult, Context, Progress, Registry};
use crate::project::CloneSource;
use crate::script::{Frame, FrameKind};
use crate::value::Value;

pub fn register(registry: &mut Registry) {
  registry.hat("control_start_as_clone");
  registry.command("control_forever", forever);
  registry.command("control_repeat", repeat);
  registry.command("control_repeat_until", repeat_until);
  registry.command("control_while", while_);
  registry.command("control_for_each", for_each);
  registry.command("control_if", if_);
  registry.command("control_if_else", if_else);
  registry.command("control_wait", wait);
  registry.command("control_wait_until", wait_until);
  registry.command("control_stop", stop);
  registry.command("control_create_clone_of", create_clone_of);
  registry.reporter("control_create_clone_of_menu", super::menu);
  registry.command("control_delete_this_clone", delete_this_clone);
  registry.reporter("control_get_counter", get_counter);
  registry.command("control_incr_counter", incr_counter);
  registry.command("control_clear_counter", clear_counter);
}

fn forever(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  if ctx.thread.frame(block.id).is_none() {
    ctx.thread.push(block.id, FrameKind::Forever);
  }
  Ok(BlockResult::next(body(block, "SUBSTACK")))
}

fn repeat(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  if ctx.thread.frame(block.id).is_none() {
    let times = aux_f64(ctx, args, "TIMES").round().max(0.);
    ctx.thread.push(block.id, FrameKind::Repeat { remaining: times as u64 });
  }
  if let Some(Frame {
    kind: FrameKind::Repeat { remaining },
    ..
  }) = ctx.thread.frame_mut(block.id)
  {
    if *remaining > 0 {
      *remaining -= 1;
      return Ok(BlockResult::next(body(block, "SUBSTACK")));
    }
  }
  ctx.thread.pop(block.id);
  Ok(BlockResult::next(block.next))
}

fn repeat_until(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let done = aux_bool(ctx, args, "CONDITION");
  conditional_loop(ctx, block, !done, FrameKind::Until)
}

fn while_(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let keep_going = aux_bool(ctx, args, "CONDITION");
  conditional_loop(ctx, block, keep_going, FrameKind::While)
}

fn conditional_loop(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  keep_going: bool,
  kind: FrameKind,
) -> Result<BlockResult> {
  if !keep_going {
    ctx.thread.pop(block.id);
    return Ok(BlockResult::next(block.next));
  }
  if ctx.thread.frame(block.id).is_none() {
    ctx.thread.push(block.id, kind);
  }
  Ok(BlockResult::next(body(block, "SUBSTACK")))
}

fn for_each(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let limit = aux_f64(ctx, args, "VALUE");
  if ctx.thread.frame(block.id).is_none() {
    ctx.thread.push(block.id, FrameKind::ForEach { counter: 0. });
  }
  let counter = match ctx.thread.frame_mut(block.id) {
    Some(Frame {
      kind: FrameKind::ForEach { counter },
      ..
    }) => {
      *counter += 1.;
      *counter
    }
    _ => f64::INFINITY,
  };
  if counter > limit {
    ctx.thread.pop(block.id);
    return Ok(BlockResult::next(block.next));
  }
  if let Some(variable) = aux_variable(block) {
    ctx.set_variable(variable, Value::Number(counter));
  }
  Ok(BlockResult::next(body(block, "SUBSTACK")))
}

fn if_(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let condition = aux_bool(ctx, args, "CONDITION");
  Ok(branch(ctx, block, condition.then_some("SUBSTACK")))
}

fn if_else(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let condition = aux_bool(ctx, args, "CONDITION");
  let taken = if condition { "SUBSTACK" } else { "SUBSTACK2" };
  Ok(branch(ctx, block, Some(taken)))
}

/// Enters the substack `name`, or skips past `block` when there is none.
fn branch(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  name: Option<&str>,
) -> BlockResult {
  match name.and_then(|name| block.substack(name)) {
    Some(first) => {
      ctx.thread.push(block.id, FrameKind::Branch);
      BlockResult::next(first)
    }
    None => BlockResult::next(block.next),
  }
}

fn wait(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let now = ctx.shared.timer.now();
  match deadline(ctx, block) {
    Some(until) if now >= until => {
      ctx.thread.pop(block.id);
      Ok(BlockResult::next(block.next))
    }
    Some(_) => yield_here(block),
    None => {
      let seconds = aux_f64(ctx, args, "DURATION").max(0.);
      ctx.thread.push(block.id, FrameKind::Wait { until: now + seconds });
      yield_here(block)
    }
  }
}

fn wait_until(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  if aux_bool(ctx, args, "CONDITION") {
    Ok(BlockResult::next(block.next))
  } else {
    yield_here(block)
  }
}

fn stop(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  match aux_field(block, "STOP_OPTION") {
    "all" => Ok(BlockResult::progress(Progress::CloseProject)),
    "this script" => {
      // Inside a custom block this only returns from the call.
      while let Some(frame) = ctx.thread.stack.pop() {
        if let FrameKind::Call { return_to, .. } = frame.kind {
          return Ok(BlockResult::next(return_to));
        }
      }
      Ok(BlockResult::progress(Progress::ReturnAndStopScript))
    }
    "other scripts in sprite" | "other scripts in stage" => {
      ctx.thread.stop_siblings = true;
      Ok(BlockResult::next(block.next))
    }
    option => {
      debug!("unknown stop option {option:?}");
      Ok(BlockResult::next(block.next))
    }
  }
}

fn create_clone_of(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let option = aux_string(ctx, args, "CLONE_OPTION");
  let source = if option == "_myself_" {
    (!ctx.sprite.info.is_stage).then(|| CloneSource::Sprite(ctx.sprite.id()))
  } else {
    Some(CloneSource::Named(option))
  };
  if let Some(source) = source {
    ctx.shared.queue_clone(source);
  }
  Ok(BlockResult::next(block.next))
}

/// Marks the clone for removal at the end of the sweep and ends its scripts.
/// Other sprites keep their turn.
fn delete_this_clone(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  if !ctx.sprite.info.is_clone {
    return Ok(BlockResult::next(block.next));
  }
  ctx.sprite.info.deleted = true;
  ctx.thread.stop_siblings = true;
  Ok(BlockResult::progress(Progress::ReturnAndStopScript))
}

fn get_counter(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  Ok(Value::Number(ctx.shared.counter))
}

fn incr_counter(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  ctx.shared.counter += 1.;
  Ok(BlockResult::next(block.next))
}

fn clear_counter(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  ctx.shared.counter = 0.;
  Ok(BlockResult::next(block.next))
}
