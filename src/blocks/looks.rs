use super::events::wait_for_started;
use super::{aux_f64, aux_field, aux_string, aux_value, deadline, yield_here};
use crate::block::{Args, BlockDescriptor};
use crate::error::Result;
use crate::opcode::{BlockResult, Context, Registry};
use crate::script::FrameKind;
use crate::sprite::Say;
use crate::value::{parse_number, Value};

pub fn register(registry: &mut Registry) {
  registry.command("looks_say", say);
  registry.command("looks_think", think);
  registry.command("looks_sayforsecs", say_for_secs);
  registry.command("looks_thinkforsecs", think_for_secs);
  registry.command("looks_show", show);
  registry.command("looks_hide", hide);
  registry.command("looks_switchcostumeto", switch_costume_to);
  registry.reporter("looks_costume", super::menu);
  registry.command("looks_nextcostume", next_costume);
  registry.command("looks_switchbackdropto", switch_backdrop_to);
  registry.command("looks_switchbackdroptoandwait", switch_backdrop_to_and_wait);
  registry.reporter("looks_backdrops", super::menu);
  registry.command("looks_nextbackdrop", next_backdrop);
  registry.command("looks_changesizeby", change_size_by);
  registry.command("looks_setsizeto", set_size_to);
  registry.reporter("looks_size", size);
  registry.reporter("looks_costumenumbername", costume_number_name);
  registry.reporter("looks_backdropnumbername", backdrop_number_name);
}

/// Index of the costume `requested` names: a costume name, a 1-based number
/// (wrapping around), or `next`/`previous costume` (or backdrop).
pub(crate) fn costume_index(
  costumes: &[String],
  current: usize,
  requested: &Value,
) -> Option<usize> {
  let len = costumes.len();
  if len == 0 {
    return None;
  }
  let number = match requested {
    Value::Text(name) => {
      if let Some(index) = costumes.iter().position(|costume| costume == name) {
        return Some(index);
      }
      match name.as_str() {
        "next costume" | "next backdrop" => return Some((current + 1) % len),
        "previous costume" | "previous backdrop" => {
          return Some((current + len - 1) % len)
        }
        _ => {}
      }
      if name.trim().is_empty() {
        return None;
      }
      parse_number(name)?
    }
    Value::Number(number) => *number,
    Value::Bool(_) | Value::List(_) => return None,
  };
  if !number.is_finite() {
    return None;
  }
  let index = (number.round() as i64 - 1).rem_euclid(len as i64);
  Some(index as usize)
}

fn speak(ctx: &mut Context<'_>, message: String, think: bool) {
  let name = &ctx.sprite.info.name;
  if message.is_empty() {
    ctx.sprite.state.say = None;
    ctx.shared.host.say(name, None);
  } else {
    ctx.shared.host.say(name, Some(&message));
    ctx.sprite.state.say = Some(Say { message, think });
  }
}

fn say(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let message = aux_string(ctx, args, "MESSAGE");
  speak(ctx, message, false);
  Ok(BlockResult::next(block.next))
}

fn think(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let message = aux_string(ctx, args, "MESSAGE");
  speak(ctx, message, true);
  Ok(BlockResult::next(block.next))
}

fn say_for_secs(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  timed_speech(ctx, block, args, false)
}

fn think_for_secs(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  timed_speech(ctx, block, args, true)
}

fn timed_speech(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
  think: bool,
) -> Result<BlockResult> {
  let now = ctx.shared.timer.now();
  match deadline(ctx, block) {
    Some(until) if now >= until => {
      speak(ctx, String::new(), think);
      ctx.thread.pop(block.id);
      Ok(BlockResult::next(block.next))
    }
    Some(_) => yield_here(block),
    None => {
      let message = aux_string(ctx, args, "MESSAGE");
      let seconds = aux_f64(ctx, args, "SECS").max(0.);
      speak(ctx, message, think);
      ctx.thread.push(block.id, FrameKind::Say { until: now + seconds });
      yield_here(block)
    }
  }
}

fn show(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  ctx.sprite.state.visible = true;
  Ok(BlockResult::next(block.next))
}

fn hide(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  ctx.sprite.state.visible = false;
  Ok(BlockResult::next(block.next))
}

fn switch_costume(ctx: &mut Context<'_>, requested: &Value) {
  let state = &mut ctx.sprite.state;
  if let Some(index) =
    costume_index(&state.costumes, state.current_costume, requested)
  {
    state.current_costume = index;
  }
}

fn switch_costume_to(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  switch_costume(ctx, &aux_value(args, "COSTUME"));
  Ok(BlockResult::next(block.next))
}

fn next_costume(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  switch_costume(ctx, &Value::from("next costume"));
  Ok(BlockResult::next(block.next))
}

/// Backdrops belong to the stage, so the switch is applied between sweeps.
fn switch_backdrop_to(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  ctx.shared.queue_backdrop(aux_value(args, "BACKDROP"), None);
  Ok(BlockResult::next(block.next))
}

/// Switches, then waits for the `when backdrop switches to` scripts the
/// switch started.
fn switch_backdrop_to_and_wait(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  if ctx.thread.frame(block.id).is_none() {
    let id = ctx.thread.id;
    ctx.shared.queue_backdrop(aux_value(args, "BACKDROP"), Some(id));
    ctx.thread.push(block.id, FrameKind::BroadcastWait);
    return yield_here(block);
  }
  wait_for_started(ctx, block)
}

fn next_backdrop(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  ctx.shared.queue_backdrop(Value::from("next backdrop"), None);
  Ok(BlockResult::next(block.next))
}

fn change_size_by(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let change = aux_f64(ctx, args, "CHANGE");
  let state = &mut ctx.sprite.state;
  state.size = (state.size + change).max(0.);
  Ok(BlockResult::next(block.next))
}

fn set_size_to(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let size = aux_f64(ctx, args, "SIZE");
  ctx.sprite.state.size = size.max(0.);
  Ok(BlockResult::next(block.next))
}

fn size(ctx: &mut Context<'_>, _: &BlockDescriptor, _: &Args<'_>) -> Result<Value> {
  Ok(Value::Number(ctx.sprite.state.size.round()))
}

fn costume_number_name(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  let state = &ctx.sprite.state;
  Ok(match aux_field(block, "NUMBER_NAME") {
    "name" => Value::Text(
      state
        .costumes
        .get(state.current_costume)
        .cloned()
        .unwrap_or_default(),
    ),
    _ => Value::Number(1. + state.current_costume as f64),
  })
}

/// Backdrop of the stage as the sweep found it; switches land between sweeps.
fn backdrop_number_name(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  let Some(stage) = ctx.shared.stage_snapshot() else {
    return Ok(Value::default());
  };
  Ok(match aux_field(block, "NUMBER_NAME") {
    "name" => Value::Text(stage.costume_name.clone()),
    _ => Value::Number(1. + stage.costume as f64),
  })
}
