use rand::Rng;

use super::{aux_f64, aux_field, aux_string, degrees_to_radians, limit_precision};
use super::{radians_to_degrees, wrap_direction, yield_here};
use crate::block::{Args, BlockDescriptor};
use crate::diagnostics::DiagnosticKind;
use crate::error::Result;
use crate::opcode::{BlockResult, Context, Registry};
use crate::script::{Frame, FrameKind};
use crate::sprite::RotationStyle;
use crate::value::Value;

pub fn register(registry: &mut Registry) {
  registry.command("motion_movesteps", move_steps);
  registry.command("motion_turnright", turn_right);
  registry.command("motion_turnleft", turn_left);
  registry.command("motion_goto", goto);
  registry.reporter("motion_goto_menu", super::menu);
  registry.command("motion_gotoxy", goto_xy);
  registry.command("motion_glideto", glide_to);
  registry.reporter("motion_glideto_menu", super::menu);
  registry.command("motion_glidesecstoxy", glide_secs_to_xy);
  registry.command("motion_pointindirection", point_in_direction);
  registry.command("motion_pointtowards", point_towards);
  registry.reporter("motion_pointtowards_menu", super::menu);
  registry.command("motion_changexby", change_x_by);
  registry.command("motion_setx", set_x);
  registry.command("motion_changeyby", change_y_by);
  registry.command("motion_sety", set_y);
  registry.command("motion_ifonedgebounce", if_on_edge_bounce);
  registry.command("motion_setrotationstyle", set_rotation_style);
  registry.reporter("motion_xposition", x_position);
  registry.reporter("motion_yposition", y_position);
  registry.reporter("motion_direction", direction);
}

/// Moves the sprite, leaving a pen trail when its pen is down.
pub(crate) fn move_to(ctx: &mut Context<'_>, x: f64, y: f64) {
  let state = &mut ctx.sprite.state;
  if state.pen.down {
    let line = state.pen.line((state.x, state.y), (x, y));
    ctx.shared.pen.push(line);
  }
  state.x = x;
  state.y = y;
}

/// Position named by a `go to` style menu: `_random_`, `_mouse_` or a sprite.
fn target_position(ctx: &mut Context<'_>, target: &str) -> Option<(f64, f64)> {
  match target {
    "_random_" => {
      let half_width = f64::from(ctx.shared.config.stage_width) / 2.;
      let half_height = f64::from(ctx.shared.config.stage_height) / 2.;
      let x = ctx.shared.rng.random_range(-half_width..=half_width).round();
      let y = ctx.shared.rng.random_range(-half_height..=half_height).round();
      Some((x, y))
    }
    "_mouse_" => Some(ctx.shared.host.mouse_position()),
    name => {
      let found = ctx
        .shared
        .snapshot(name)
        .map(|snapshot| (snapshot.x, snapshot.y));
      if found.is_none() {
        ctx.report(DiagnosticKind::UnknownTarget, format!("no sprite {name:?}"));
      }
      found
    }
  }
}

fn move_steps(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let steps = aux_f64(ctx, args, "STEPS");
  let radians = degrees_to_radians(90. - ctx.sprite.state.direction);
  let x = ctx.sprite.state.x + steps * radians.cos();
  let y = ctx.sprite.state.y + steps * radians.sin();
  move_to(ctx, x, y);
  Ok(BlockResult::next(block.next))
}

fn turn_right(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let degrees = aux_f64(ctx, args, "DEGREES");
  let state = &mut ctx.sprite.state;
  state.direction = wrap_direction(state.direction + degrees);
  Ok(BlockResult::next(block.next))
}

fn turn_left(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let degrees = aux_f64(ctx, args, "DEGREES");
  let state = &mut ctx.sprite.state;
  state.direction = wrap_direction(state.direction - degrees);
  Ok(BlockResult::next(block.next))
}

fn goto(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let target = aux_string(ctx, args, "TO");
  if let Some((x, y)) = target_position(ctx, &target) {
    move_to(ctx, x, y);
  }
  Ok(BlockResult::next(block.next))
}

fn goto_xy(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let x = aux_f64(ctx, args, "X");
  let y = aux_f64(ctx, args, "Y");
  move_to(ctx, x, y);
  Ok(BlockResult::next(block.next))
}

fn glide_to(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  if ctx.thread.frame(block.id).is_some() {
    return glide(ctx, block, (0., 0.), 0.);
  }
  let target = aux_string(ctx, args, "TO");
  let seconds = aux_f64(ctx, args, "SECS");
  match target_position(ctx, &target) {
    Some(to) => glide(ctx, block, to, seconds),
    None => Ok(BlockResult::next(block.next)),
  }
}

fn glide_secs_to_xy(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let to = (aux_f64(ctx, args, "X"), aux_f64(ctx, args, "Y"));
  let seconds = aux_f64(ctx, args, "SECS");
  glide(ctx, block, to, seconds)
}

/// Moves a fraction of the way towards the glide target each tick. `to` and
/// `seconds` are only read when the glide starts.
fn glide(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  to: (f64, f64),
  seconds: f64,
) -> Result<BlockResult> {
  let now = ctx.shared.timer.now();
  let glide = match ctx.thread.frame(block.id) {
    Some(Frame {
      kind:
        FrameKind::Glide {
          from,
          to,
          start,
          duration,
        },
      ..
    }) => Some((*from, *to, *start, *duration)),
    _ => None,
  };
  let Some((from, to, start, duration)) = glide else {
    if seconds <= 0. {
      move_to(ctx, to.0, to.1);
      return Ok(BlockResult::next(block.next));
    }
    let from = (ctx.sprite.state.x, ctx.sprite.state.y);
    ctx.thread.push(
      block.id,
      FrameKind::Glide {
        from,
        to,
        start: now,
        duration: seconds,
      },
    );
    return yield_here(block);
  };
  let t = (now - start) / duration;
  if t >= 1. {
    move_to(ctx, to.0, to.1);
    ctx.thread.pop(block.id);
    return Ok(BlockResult::next(block.next));
  }
  move_to(ctx, from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t);
  yield_here(block)
}

fn point_in_direction(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let direction = aux_f64(ctx, args, "DIRECTION");
  ctx.sprite.state.direction = wrap_direction(direction);
  Ok(BlockResult::next(block.next))
}

fn point_towards(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let target = aux_string(ctx, args, "TOWARDS");
  if let Some((x, y)) = target_position(ctx, &target) {
    let dx = x - ctx.sprite.state.x;
    let dy = y - ctx.sprite.state.y;
    ctx.sprite.state.direction =
      wrap_direction(90. - radians_to_degrees(dy.atan2(dx)));
  }
  Ok(BlockResult::next(block.next))
}

fn change_x_by(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let x = ctx.sprite.state.x + aux_f64(ctx, args, "DX");
  let y = ctx.sprite.state.y;
  move_to(ctx, x, y);
  Ok(BlockResult::next(block.next))
}

fn set_x(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let x = aux_f64(ctx, args, "X");
  let y = ctx.sprite.state.y;
  move_to(ctx, x, y);
  Ok(BlockResult::next(block.next))
}

fn change_y_by(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let x = ctx.sprite.state.x;
  let y = ctx.sprite.state.y + aux_f64(ctx, args, "DY");
  move_to(ctx, x, y);
  Ok(BlockResult::next(block.next))
}

fn set_y(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let x = ctx.sprite.state.x;
  let y = aux_f64(ctx, args, "Y");
  move_to(ctx, x, y);
  Ok(BlockResult::next(block.next))
}

/// Reflects the sprite off the stage edges. Costume bounds are not known to
/// the engine, so the sprite's position is treated as a point.
fn if_on_edge_bounce(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  let half_width = f64::from(ctx.shared.config.stage_width) / 2.;
  let half_height = f64::from(ctx.shared.config.stage_height) / 2.;
  let state = &mut ctx.sprite.state;
  let mut direction = state.direction;
  let (mut x, mut y) = (state.x, state.y);
  if x.abs() > half_width {
    x = x.clamp(-half_width, half_width);
    direction = -direction;
  }
  if y.abs() > half_height {
    y = y.clamp(-half_height, half_height);
    direction = 180. - direction;
  }
  state.direction = wrap_direction(direction);
  move_to(ctx, x, y);
  Ok(BlockResult::next(block.next))
}

fn set_rotation_style(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  let style = match aux_field(block, "STYLE") {
    "left-right" => Some(RotationStyle::LeftRight),
    "don't rotate" => Some(RotationStyle::DontRotate),
    "all around" => Some(RotationStyle::AllAround),
    _ => None,
  };
  if let Some(style) = style {
    ctx.sprite.state.rotation_style = style;
  }
  Ok(BlockResult::next(block.next))
}

fn x_position(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  Ok(Value::Number(limit_precision(ctx.sprite.state.x)))
}

fn y_position(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  Ok(Value::Number(limit_precision(ctx.sprite.state.y)))
}

fn direction(
  ctx: &mut Context<'_>,
  _: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<Value> {
  Ok(Value::Number(ctx.sprite.state.direction))
}
