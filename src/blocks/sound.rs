//! Volume only. Playback belongs to the host, so sounds themselves are not
//! loaded.

use super::aux_f64;
use crate::block::{Args, BlockDescriptor};
use crate::error::Result;
use crate::opcode::{BlockResult, Context, Registry};
use crate::value::Value;

pub fn register(registry: &mut Registry) {
  registry.command("sound_setvolumeto", set_volume_to);
  registry.command("sound_changevolumeby", change_volume_by);
  registry.reporter("sound_volume", volume);
}

fn set_volume_to(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let volume = aux_f64(ctx, args, "VOLUME");
  ctx.sprite.state.volume = volume.clamp(0., 100.);
  Ok(BlockResult::next(block.next))
}

fn change_volume_by(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let change = aux_f64(ctx, args, "VOLUME");
  let state = &mut ctx.sprite.state;
  state.volume = (state.volume + change).clamp(0., 100.);
  Ok(BlockResult::next(block.next))
}

fn volume(ctx: &mut Context<'_>, _: &BlockDescriptor, _: &Args<'_>) -> Result<Value> {
  Ok(Value::Number(ctx.sprite.state.volume))
}

#[cfg(test)]
mod tests {
  use crate::block::RawBlock;
  use crate::testing::{evaluate, num, run, ProjectBuilder};
  use crate::value::Value;

  #[test]
  fn volume_is_clamped() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("Cat");
    builder.hat("flag", "event_whenflagclicked", Some("set"));
    builder.block(
      "set",
      RawBlock::new("sound_setvolumeto")
        .input("VOLUME", num(150.))
        .next("change"),
    );
    builder.block(
      "change",
      RawBlock::new("sound_changevolumeby").input("VOLUME", num(-30.)),
    );
    let mut runtime = builder.build();
    runtime.green_flag();
    run(&mut runtime, 2);
    assert_eq!(runtime.sprites()[0].state.volume, 100.);
    run(&mut runtime, 1);
    assert_eq!(runtime.sprites()[0].state.volume, 70.);
  }

  #[test]
  fn volume_reports_the_sprite_volume() {
    let value = evaluate(RawBlock::new("sound_volume"), Vec::new());
    assert_eq!(value, Value::Number(100.));
  }
}
