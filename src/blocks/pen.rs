use log::debug;

use super::{aux_f64, aux_string, aux_value};
use crate::block::{Args, BlockDescriptor};
use crate::error::Result;
use crate::opcode::{BlockResult, Context, Registry};
use crate::pen::parse_hex_color;
use crate::value::Value;

const MIN_SIZE: f64 = 1.;
const MAX_SIZE: f64 = 1200.;

pub fn register(registry: &mut Registry) {
  registry.command("pen_clear", clear);
  registry.command("pen_penDown", pen_down);
  registry.command("pen_penUp", pen_up);
  registry.command("pen_setPenSizeTo", set_pen_size_to);
  registry.command("pen_changePenSizeBy", change_pen_size_by);
  registry.command("pen_setPenColorToColor", set_pen_color_to_color);
  registry.command("pen_setPenColorParamTo", set_pen_color_param_to);
  registry.command("pen_changePenColorParamBy", change_pen_color_param_by);
  registry.reporter("pen_menu_colorParam", super::menu);
  registry.command("pen_setPenHueToNumber", set_pen_hue_to_number);
  registry.command("pen_changePenHueBy", change_pen_hue_by);
  registry.command("pen_setPenShadeToNumber", set_pen_shade_to_number);
  registry.command("pen_changePenShadeBy", change_pen_shade_by);
}

fn clear(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  ctx.shared.pen.clear();
  Ok(BlockResult::next(block.next))
}

/// Lowers the pen and leaves a dot where the sprite stands.
fn pen_down(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  let state = &mut ctx.sprite.state;
  state.pen.down = true;
  let here = (state.x, state.y);
  ctx.shared.pen.push(state.pen.line(here, here));
  Ok(BlockResult::next(block.next))
}

fn pen_up(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  _: &Args<'_>,
) -> Result<BlockResult> {
  ctx.sprite.state.pen.down = false;
  Ok(BlockResult::next(block.next))
}

fn set_pen_size_to(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let size = aux_f64(ctx, args, "SIZE");
  ctx.sprite.state.pen.size = size.clamp(MIN_SIZE, MAX_SIZE);
  Ok(BlockResult::next(block.next))
}

fn change_pen_size_by(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let change = aux_f64(ctx, args, "SIZE");
  let pen = &mut ctx.sprite.state.pen;
  pen.size = (pen.size + change).clamp(MIN_SIZE, MAX_SIZE);
  Ok(BlockResult::next(block.next))
}

/// Accepts `#rrggbb` text or a packed `0xAARRGGBB` number.
fn set_pen_color_to_color(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let packed = match aux_value(args, "COLOR") {
    Value::Text(text) if text.starts_with('#') => parse_hex_color(&text),
    color => color.to_number().ok().map(|number| number as i64 as u32),
  };
  if let Some(packed) = packed {
    ctx.sprite.state.pen.set_packed_color(packed);
  }
  Ok(BlockResult::next(block.next))
}

/// Applies `update` to the color component `param` names. Hue wraps,
/// everything else is clamped to 0..100.
fn update_color_param(
  ctx: &mut Context<'_>,
  param: &str,
  update: impl FnOnce(f64) -> f64,
) {
  let color = &mut ctx.sprite.state.pen.color;
  let component = match param {
    "color" => {
      color.hue = update(color.hue).rem_euclid(100.);
      return;
    }
    "saturation" => &mut color.saturation,
    "brightness" => &mut color.brightness,
    "transparency" => &mut color.transparency,
    _ => {
      debug!("[{}] unknown pen color parameter {param:?}", ctx.sprite.info.name);
      return;
    }
  };
  *component = update(*component).clamp(0., 100.);
}

fn set_pen_color_param_to(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let param = aux_string(ctx, args, "COLOR_PARAM");
  let value = aux_f64(ctx, args, "VALUE");
  update_color_param(ctx, &param, |_| value);
  Ok(BlockResult::next(block.next))
}

fn change_pen_color_param_by(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let param = aux_string(ctx, args, "COLOR_PARAM");
  let change = aux_f64(ctx, args, "VALUE");
  update_color_param(ctx, &param, |current| current + change);
  Ok(BlockResult::next(block.next))
}

/// Legacy hue runs 0..200, twice the color parameter's range.
fn set_pen_hue_to_number(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let hue = aux_f64(ctx, args, "HUE") / 2.;
  let color = &mut ctx.sprite.state.pen.color;
  color.hue = hue.rem_euclid(100.);
  color.transparency = 0.;
  Ok(BlockResult::next(block.next))
}

fn change_pen_hue_by(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let change = aux_f64(ctx, args, "HUE") / 2.;
  let color = &mut ctx.sprite.state.pen.color;
  color.hue = (color.hue + change).rem_euclid(100.);
  Ok(BlockResult::next(block.next))
}

fn apply_shade(ctx: &mut Context<'_>, shade: f64) {
  let pen = &mut ctx.sprite.state.pen;
  pen.shade = shade.rem_euclid(200.);
  pen.color = pen.color.shaded(pen.shade);
}

fn set_pen_shade_to_number(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let shade = aux_f64(ctx, args, "SHADE");
  apply_shade(ctx, shade);
  Ok(BlockResult::next(block.next))
}

fn change_pen_shade_by(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let shade = ctx.sprite.state.pen.shade + aux_f64(ctx, args, "SHADE");
  apply_shade(ctx, shade);
  Ok(BlockResult::next(block.next))
}

#[cfg(test)]
mod tests {
  use crate::block::RawBlock;
  use crate::pen::PenColor;
  use crate::testing::{block, field_text, num, run, text, ProjectBuilder};

  #[test]
  fn pen_settings_apply_to_later_lines() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("Cat");
    builder.hat("flag", "event_whenflagclicked", Some("color"));
    builder.block(
      "color",
      RawBlock::new("pen_setPenColorToColor")
        .input("COLOR", text("#ff0000"))
        .next("size"),
    );
    builder.block(
      "size",
      RawBlock::new("pen_setPenSizeTo")
        .input("SIZE", num(5000.))
        .next("down"),
    );
    builder.block("down", RawBlock::new("pen_penDown").next("up"));
    builder.block("up", RawBlock::new("pen_penUp").next("move"));
    builder.block(
      "move",
      RawBlock::new("motion_gotoxy")
        .input("X", num(10.))
        .input("Y", num(10.)),
    );
    let mut runtime = builder.build();
    runtime.green_flag();
    run(&mut runtime, 6);
    let lines = runtime.pen();
    assert_eq!(lines.len(), 1);
    assert_eq!((lines[0].r, lines[0].g, lines[0].b), (255, 0, 0));
    assert_eq!(lines[0].size, 1200.);
  }

  #[test]
  fn clear_erases_every_line() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("Cat");
    builder.hat("flag", "event_whenflagclicked", Some("down"));
    builder.block("down", RawBlock::new("pen_penDown").next("clear"));
    builder.block("clear", RawBlock::new("pen_clear"));
    let mut runtime = builder.build();
    runtime.green_flag();
    run(&mut runtime, 2);
    assert_eq!(runtime.pen().len(), 1);
    run(&mut runtime, 1);
    assert!(runtime.pen().is_empty());
  }

  fn color_after(blocks: Vec<(&str, RawBlock)>) -> PenColor {
    let mut builder = ProjectBuilder::new();
    builder.sprite("Cat");
    builder.hat("flag", "event_whenflagclicked", Some(blocks[0].0));
    let count = blocks.len();
    for (key, raw) in blocks {
      builder.block(key, raw);
    }
    let mut runtime = builder.build();
    runtime.green_flag();
    run(&mut runtime, count + 1);
    runtime.sprites()[0].state.pen.color
  }

  #[test]
  fn color_params_wrap_hue_and_clamp_the_rest() {
    let color = color_after(vec![
      (
        "hue",
        RawBlock::new("pen_setPenColorParamTo")
          .input("COLOR_PARAM", block("hue-menu"))
          .input("VALUE", num(130.))
          .next("bright"),
      ),
      (
        "hue-menu",
        RawBlock::new("pen_menu_colorParam").field("colorParam", field_text("color")),
      ),
      (
        "bright",
        RawBlock::new("pen_changePenColorParamBy")
          .input("COLOR_PARAM", text("brightness"))
          .input("VALUE", num(-250.))
          .next("ghost"),
      ),
      (
        "ghost",
        RawBlock::new("pen_changePenColorParamBy")
          .input("COLOR_PARAM", text("transparency"))
          .input("VALUE", num(40.)),
      ),
    ]);
    assert_eq!(color.hue, 30.);
    assert_eq!(color.brightness, 0.);
    assert_eq!(color.transparency, 40.);
    assert_eq!(color.saturation, 100.);
  }

  #[test]
  fn legacy_hue_and_shade() {
    let color = color_after(vec![
      (
        "hue",
        RawBlock::new("pen_setPenHueToNumber")
          .input("HUE", num(0.))
          .next("shade"),
      ),
      (
        "shade",
        RawBlock::new("pen_setPenShadeToNumber")
          .input("SHADE", num(230.))
          .next("change"),
      ),
      (
        "change",
        RawBlock::new("pen_changePenShadeBy").input("SHADE", num(-180.)),
      ),
    ]);
    // 230 wraps to 30, then 30 - 180 wraps to 50: plain red.
    assert_eq!(color.to_rgba(), (255, 0, 0, 255));
  }
}
