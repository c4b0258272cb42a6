use super::{aux_string, yield_here};
use crate::block::{Args, BlockDescriptor};
use crate::error::Result;
use crate::opcode::{BlockResult, Context, Registry};
use crate::project::Event;
use crate::script::FrameKind;

pub fn register(registry: &mut Registry) {
  for hat in [
    "event_whenflagclicked",
    "event_whenbroadcastreceived",
    "event_whenkeypressed",
    "event_whenthisspriteclicked",
    "event_whenstageclicked",
    "event_whenbackdropswitchesto",
  ] {
    registry.hat(hat);
  }
  registry.command("event_broadcast", broadcast);
  registry.command("event_broadcastandwait", broadcast_and_wait);
  registry.reporter("event_broadcast_menu", super::menu);
}

fn broadcast_event(message: String) -> Event {
  Event::new("event_whenbroadcastreceived").filter(message)
}

fn broadcast(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let message = aux_string(ctx, args, "BROADCAST_INPUT");
  ctx.shared.queue_event(broadcast_event(message));
  Ok(BlockResult::next(block.next))
}

/// Broadcasts, then holds the thread until every script the broadcast
/// started has finished.
fn broadcast_and_wait(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
  args: &Args<'_>,
) -> Result<BlockResult> {
  let id = ctx.thread.id;
  if ctx.thread.frame(block.id).is_none() {
    let message = aux_string(ctx, args, "BROADCAST_INPUT");
    ctx.shared.queue_event(broadcast_event(message).waiter(id));
    ctx.thread.push(block.id, FrameKind::BroadcastWait);
    return yield_here(block);
  }
  wait_for_started(ctx, block)
}

/// Holds the thread on `block` until every script started on its behalf has
/// finished, then drops the `BroadcastWait` frame.
pub(crate) fn wait_for_started(
  ctx: &mut Context<'_>,
  block: &BlockDescriptor,
) -> Result<BlockResult> {
  let id = ctx.thread.id;
  let waiting = ctx
    .shared
    .broadcast_waits
    .get(&id)
    .is_some_and(|started| started.iter().any(|thread| ctx.shared.is_running(*thread)));
  if waiting {
    return yield_here(block);
  }
  ctx.shared.broadcast_waits.remove(&id);
  ctx.thread.pop(block.id);
  Ok(BlockResult::next(block.next))
}

#[cfg(test)]
mod tests {
  use crate::block::RawBlock;
  use crate::testing::{block, field_text, run, text, trace, ProjectBuilder};

  #[test]
  fn broadcast_and_wait_resumes_after_receivers_finish() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("Sender");
    builder.hat("flag", "event_whenflagclicked", Some("send"));
    builder.block(
      "send",
      RawBlock::new("event_broadcastandwait")
        .input("BROADCAST_INPUT", block("menu"))
        .next("after"),
    );
    builder.block(
      "menu",
      RawBlock::new("event_broadcast_menu")
        .field("BROADCAST_OPTION", field_text("work")),
    );
    builder.block("after", RawBlock::new("test_mark"));
    builder.sprite("Worker");
    builder.block(
      "receive",
      RawBlock::new("event_whenbroadcastreceived")
        .field("BROADCAST_OPTION", field_text("WORK"))
        .next("one")
        .top_level(),
    );
    builder.block("one", RawBlock::new("test_mark").next("two"));
    builder.block("two", RawBlock::new("test_mark").next("three"));
    builder.block("three", RawBlock::new("test_mark"));
    let mut runtime = builder.build();
    runtime.green_flag();
    run(&mut runtime, 12);
    assert_eq!(
      trace(&runtime),
      ["Worker:one", "Worker:two", "Worker:three", "Sender:after"]
    );
    assert!(runtime.shared().broadcast_waits.is_empty());
  }

  #[test]
  fn broadcast_without_receivers_does_not_block() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("Sender");
    builder.hat("flag", "event_whenflagclicked", Some("send"));
    builder.block(
      "send",
      RawBlock::new("event_broadcastandwait")
        .input("BROADCAST_INPUT", text("nobody"))
        .next("after"),
    );
    builder.block("after", RawBlock::new("test_mark"));
    let mut runtime = builder.build();
    runtime.green_flag();
    run(&mut runtime, 5);
    assert_eq!(trace(&runtime), ["Sender:after"]);
  }

  #[test]
  fn host_broadcast_starts_threads_immediately() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("A");
    builder.block(
      "receive",
      RawBlock::new("event_whenbroadcastreceived")
        .field("BROADCAST_OPTION", field_text("go"))
        .top_level(),
    );
    let mut runtime = builder.build();
    assert_eq!(runtime.broadcast("Go"), 1);
    assert_eq!(runtime.broadcast("stop"), 0);
    assert_eq!(runtime.sprites()[0].threads.len(), 1);
  }
}
