use super::{aux_field, aux_string, yield_here};
use crate::block::{Args, BlockDescriptor};
use crate::error::Result;
use crate::opcode::{BlockResult, Context, Registry};
use crate::script::FrameKind;
use crate::value::Value;

/// Unix time of 2000-01-01T00:00:00Z.
const EPOCH_2000: f64 = 946_684_800.;

/// Reported by `distance to` when the target does not exist.
const FAR_AWAY: f64 = 10_000.;

pub fn register(registry: &mut Registry) {
  registry.reporter("sensing_timer", timer);
  registry.command("sensing_resettimer", reset_timer);
  registry.reporter("sensing_keypressed", key_pressed);
  registry.reporter("sensing_keyoptions", super::menu);
  registry.reporter("sensing_mousedown", mouse_down);
  registry.reporter("sensing_mousex", mouse_x);
  registry.reporter("sensing_mousey", mouse_y);
  registry.reporter("sensing_username", username);
  registry.reporter("sensing_of", of);
  registry.reporter("sensing_of_object_menu", super::menu);
  registry.reporter("sensing_distanceto", distance_to);
  registry.reporter("sensing_distancetomenu", super::menu);
  registry.reporter("sensing_current", current);
  registry.reporter("sensing_dayssince2000", days_since_2000);
  registry.command("sensing_askandwait", ask_and_wait);
  registry.reporter("sensing_answer", answer);
  registry.command("sensing_setdragmode", set_drag_mode);
}

fn timer(ctx: &mut Context<'_>, _: &BlockDescriptor, _: &Args<'_>) -> Result<Value> {
  Ok(Value::Number(ctx.shared.timer.value()))
}

fn reset_timer(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  ctx.shared.timer.reset();
  Ok(BlockResult::next(block.next))
}

fn key_pressed(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  let key = aux_string(ctx, args, "KEY_OPTION");
  let host = &ctx.shared.host;
  Ok(Value::Bool(if key == "any" {
    host.any_key_pressed()
  } else {
    host.key_pressed(&key)
  }))
}

fn mouse_down(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  Ok(Value::Bool(ctx.shared.host.mouse_down()))
}

fn mouse_x(ctx: &mut Context<'_>, _: &BlockDescriptor, _: &Args<'_>) -> Result<Value> {
  Ok(Value::Number(ctx.shared.host.mouse_position().0))
}

fn mouse_y(ctx: &mut Context<'_>, _: &BlockDescriptor, _: &Args<'_>) -> Result<Value> {
  Ok(Value::Number(ctx.shared.host.mouse_position().1))
}

fn username(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  Ok(Value::Text(ctx.shared.host.username()))
}

/// `(property) of (sprite)`, read from the state the sweep started with.
/// Unknown sprites and properties report 0; any other property name is
/// looked up as a variable of the target.
fn of(ctx: &mut Context<'_>, block: &BlockDescriptor, args: &Args<'_>) -> Result<Value> {
  let object = aux_string(ctx, args, "OBJECT");
  let property = aux_field(block, "PROPERTY");
  let shared = &ctx.shared;
  if object == "_stage_" {
    let Some(stage) = shared.stage_snapshot() else {
      return Ok(Value::Number(0.));
    };
    return Ok(match property {
      "backdrop #" => Value::Number(1. + stage.costume as f64),
      "backdrop name" => Value::Text(stage.costume_name.clone()),
      "volume" => Value::Number(stage.volume),
      name => shared.global_variable(name).cloned().unwrap_or(Value::Number(0.)),
    });
  }
  let Some(sprite) = shared.snapshot(&object) else {
    return Ok(Value::Number(0.));
  };
  Ok(match property {
    "x position" => Value::Number(sprite.x),
    "y position" => Value::Number(sprite.y),
    "direction" => Value::Number(sprite.direction),
    "costume #" => Value::Number(1. + sprite.costume as f64),
    "costume name" => Value::Text(sprite.costume_name.clone()),
    "size" => Value::Number(sprite.size),
    "volume" => Value::Number(sprite.volume),
    name => sprite.variable(name).cloned().unwrap_or(Value::Number(0.)),
  })
}

fn distance_to(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<Value> {
  if ctx.sprite.info.is_stage {
    return Ok(Value::Number(FAR_AWAY));
  }
  let target = aux_string(ctx, args, "DISTANCETOMENU");
  let to = match target.as_str() {
    "_mouse_" => Some(ctx.shared.host.mouse_position()),
    name => ctx.shared.snapshot(name).map(|sprite| (sprite.x, sprite.y)),
  };
  let Some((x, y)) = to else {
    return Ok(Value::Number(FAR_AWAY));
  };
  let state = &ctx.sprite.state;
  Ok(Value::Number((state.x - x).hypot(state.y - y)))
}

fn current(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  let now = ctx.shared.host.now();
  let part = match aux_field(block, "CURRENTMENU") {
    "YEAR" => f64::from(now.year()),
    "MONTH" => f64::from(u8::from(now.month())),
    "DATE" => f64::from(now.day()),
    "DAYOFWEEK" => f64::from(now.weekday().number_from_sunday()),
    "HOUR" => f64::from(now.hour()),
    "MINUTE" => f64::from(now.minute()),
    "SECOND" => f64::from(now.second()),
    _ => return Ok(Value::default()),
  };
  Ok(Value::Number(part))
}

fn days_since_2000(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  let seconds = ctx.shared.host.now().unix_timestamp_nanos() as f64 / 1e9;
  Ok(Value::Number((seconds - EPOCH_2000) / 86_400.))
}

/// Puts the question to the host and holds the thread until it answers.
fn ask_and_wait(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  if ctx.thread.frame(block.id).is_none() {
    let question = aux_string(ctx, args, "QUESTION");
    ctx.shared.host.ask(&ctx.sprite.info.name, &question);
    ctx.thread.push(block.id, FrameKind::Ask);
  }
  match ctx.shared.host.answer() {
    Some(answer) => {
      ctx.shared.answer = answer;
      ctx.thread.pop(block.id);
      Ok(BlockResult::next(block.next))
    }
    None => yield_here(block),
  }
}

fn answer(ctx: &mut Context<'_>, _: &BlockDescriptor, _: &Args<'_>) -> Result<Value> {
  Ok(Value::Text(ctx.shared.answer.clone()))
}

fn set_drag_mode(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  match aux_field(block, "DRAG_MODE") {
    "draggable" => ctx.sprite.state.draggable = true,
    "not draggable" => ctx.sprite.state.draggable = false,
    _ => {}
  }
  Ok(BlockResult::next(block.next))
}
