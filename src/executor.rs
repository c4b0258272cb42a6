use log::{debug, trace};

use crate::block::BlockId;
use crate::blocks::looks;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::Error;
use crate::opcode::Progress;
use crate::project::{BackdropSwitch, CloneSource, Event, EventScope, Runtime, Snapshot};
use crate::script::ThreadId;
use crate::sprite::SpriteId;
use crate::value::Value;

/// Outcome of one scheduler sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sweep {
  /// `Continue` after a full sweep, otherwise the signal that cut it short.
  pub progress: Progress,
  /// Sprite whose thread raised `progress`, for early exits.
  pub sprite: Option<SpriteId>,
  /// Thread steps taken during the sweep.
  pub steps: usize,
}

impl Runtime {
  /// Advances every active thread by one step. Call once per frame.
  ///
  /// Work queued during the previous sweep (events, clones, backdrops) is
  /// applied first, so threads it starts run from this sweep on. Clones
  /// deleted during the sweep are gone when it returns. A `StopSprite` or
  /// `CloseProject` result ends the sweep at once and is handed back; the
  /// caller decides what to stop.
  pub fn run_threads(&mut self) -> Sweep {
    self.flush();
    self.take_snapshots();
    let mut steps = 0;
    for index in 0..self.sprites.len() {
      let sprite = &mut self.sprites[index];
      if sprite.info.deleted {
        continue;
      }
      let mut threads = std::mem::take(&mut sprite.threads);
      let mut signal = None;
      for current in 0..threads.len() {
        let thread = &mut threads[current];
        if thread.is_finished() {
          continue;
        }
        steps += 1;
        match thread.step(&self.graph, sprite, &mut self.shared) {
          Ok(result) => match result.progress {
            Progress::Continue | Progress::ReturnAndStopScript => {}
            progress => signal = Some(progress),
          },
          Err(error) => {
            let kind = match error {
              Error::UnknownBlock(_) => DiagnosticKind::UnknownBlock,
              Error::InvalidCoercion { .. } => DiagnosticKind::InvalidCoercion,
              _ => DiagnosticKind::ScriptError,
            };
            self.shared.diagnostics.report(Diagnostic {
              kind,
              sprite: sprite.info.name.clone(),
              block: thread.current,
              message: error.to_string(),
            });
            thread.finish();
          }
        }
        if std::mem::take(&mut thread.stop_siblings) {
          for (other, sibling) in threads.iter_mut().enumerate() {
            if other != current {
              sibling.finish();
            }
          }
        }
        if signal.is_some() {
          break;
        }
      }
      threads.append(&mut sprite.threads);
      sprite.threads = threads;
      for id in sprite.reap() {
        self.shared.running.remove(&id);
      }
      if let Some(progress) = signal {
        debug!("sweep stopped by {:?} in {}", progress, sprite.info.name);
        let sprite = Some(sprite.id());
        self.remove_deleted();
        return Sweep {
          progress,
          sprite,
          steps,
        };
      }
    }
    self.remove_deleted();
    Sweep {
      progress: Progress::Continue,
      sprite: None,
      steps,
    }
  }

  /// Starts one thread per hat with `opcode`, in every sprite.
  pub fn run_all_blocks_by_opcode(&mut self, opcode: &str) -> usize {
    self.deliver(Event::new(opcode))
  }

  /// Starts one thread per hat with `opcode`, in `sprite` only.
  pub fn run_all_blocks_by_opcode_in_sprite(
    &mut self,
    opcode: &str,
    sprite: SpriteId,
  ) -> usize {
    self.deliver(Event::new(opcode).scope(EventScope::Sprite(sprite)))
  }

  /// Starts hats with `opcode` whose first field matches `filter`.
  pub fn run_hats(
    &mut self,
    opcode: &str,
    filter: Option<&str>,
    scope: EventScope,
  ) -> usize {
    let mut event = Event::new(opcode).scope(scope);
    event.filter = filter.map(str::to_string);
    self.deliver(event)
  }

  pub fn broadcast(&mut self, message: &str) -> usize {
    self.run_hats("event_whenbroadcastreceived", Some(message), EventScope::All)
  }

  /// Stops everything, resets the timer and starts every green flag script.
  pub fn green_flag(&mut self) -> usize {
    self.stop_all();
    self.shared.timer.reset();
    self.run_all_blocks_by_opcode("event_whenflagclicked")
  }

  pub fn press_key(&mut self, key: &str) -> usize {
    self.run_hats("event_whenkeypressed", Some(key), EventScope::All)
      + self.run_hats("event_whenkeypressed", Some("any"), EventScope::All)
  }

  pub fn click_sprite(&mut self, sprite: SpriteId) -> usize {
    let is_stage = self
      .sprite(sprite)
      .is_some_and(|sprite| sprite.info.is_stage);
    let opcode = if is_stage {
      "event_whenstageclicked"
    } else {
      "event_whenthisspriteclicked"
    };
    self.run_all_blocks_by_opcode_in_sprite(opcode, sprite)
  }

  /// Clears every thread of `sprite`. A deleted clone still in the list is
  /// removed as well.
  pub fn stop_sprite(&mut self, sprite: SpriteId) {
    let Some(index) = self.sprites.iter().position(|s| s.id() == sprite) else {
      return;
    };
    for id in self.sprites[index].stop_all() {
      self.shared.running.remove(&id);
    }
    if self.sprites[index].info.deleted {
      self.remove_sprite(index);
    }
  }

  /// Stops every script, removes all clones and drops queued work.
  pub fn stop_all(&mut self) {
    for sprite in &mut self.sprites {
      sprite.stop_all();
      if let Some(say) = sprite.state.say.take() {
        trace!("[{}] clearing {:?}", sprite.info.name, say);
        self.shared.host.say(&sprite.info.name, None);
      }
    }
    self.sprites.retain(|sprite| !sprite.info.is_clone);
    self.shared.clone_count = 0;
    self.shared.events.clear();
    self.shared.clones.clear();
    self.shared.backdrops.clear();
    self.shared.broadcast_waits.clear();
    self.shared.running.clear();
  }

  fn deliver(&mut self, event: Event) -> usize {
    let mut started = Vec::new();
    for sprite in &mut self.sprites {
      if sprite.info.deleted {
        continue;
      }
      if let EventScope::Sprite(id) = event.scope {
        if sprite.id() != id {
          continue;
        }
      }
      started.extend(sprite.start_hats(
        &self.graph,
        &event.opcode,
        event.filter.as_deref(),
      ));
    }
    trace!("{} started {} threads", event.opcode, started.len());
    self.shared.running.extend(started.iter().copied());
    let count = started.len();
    if let Some(waiter) = event.waiter {
      self.shared.broadcast_waits.insert(waiter, started);
    }
    count
  }

  /// Applies work queued by scripts during the previous sweep, in the order
  /// it was requested.
  fn flush(&mut self) {
    self.remove_deleted();
    for source in std::mem::take(&mut self.shared.clones) {
      self.create_clone(source);
    }
    for switch in std::mem::take(&mut self.shared.backdrops) {
      let BackdropSwitch { requested, waiter } = switch;
      self.change_backdrop(&requested, waiter);
    }
    for event in std::mem::take(&mut self.shared.events) {
      self.deliver(event);
    }
  }

  /// Switches the stage backdrop and starts the matching backdrop hats.
  pub fn switch_backdrop(&mut self, requested: &Value) -> usize {
    self.change_backdrop(requested, None)
  }

  fn change_backdrop(
    &mut self,
    requested: &Value,
    waiter: Option<ThreadId>,
  ) -> usize {
    let Some(stage) = self.sprites.iter_mut().find(|sprite| sprite.info.is_stage)
    else {
      return 0;
    };
    let state = &mut stage.state;
    let Some(index) =
      looks::costume_index(&state.costumes, state.current_costume, requested)
    else {
      return 0;
    };
    state.current_costume = index;
    let name = state.costumes[index].clone();
    let mut event = Event::new("event_whenbackdropswitchesto").filter(name);
    event.waiter = waiter;
    self.deliver(event)
  }

  fn remove_deleted(&mut self) {
    while let Some(index) = self.sprites.iter().position(|s| s.info.deleted) {
      self.remove_sprite(index);
    }
  }

  fn remove_sprite(&mut self, index: usize) {
    let mut sprite = self.sprites.remove(index);
    for id in sprite.stop_all() {
      self.shared.running.remove(&id);
    }
    if sprite.info.is_clone {
      self.shared.clone_count = self.shared.clone_count.saturating_sub(1);
    }
    debug!("removed {} ({})", sprite.info.name, sprite.id());
  }

  fn create_clone(&mut self, source: CloneSource) -> Option<SpriteId> {
    let index = match &source {
      CloneSource::Sprite(id) => {
        self.sprites.iter().position(|sprite| sprite.id() == *id)
      }
      CloneSource::Named(name) => self.sprites.iter().position(|sprite| {
        !sprite.info.is_clone && !sprite.info.is_stage && sprite.info.name == *name
      }),
    };
    let Some(index) = index else {
      self.clone_failure(DiagnosticKind::UnknownTarget, &source);
      return None;
    };
    if self.shared.clone_count >= self.shared.config.max_clones {
      self.clone_failure(DiagnosticKind::CloneLimit, &source);
      return None;
    }
    let id = SpriteId(self.next_sprite);
    self.next_sprite += 1;
    let mut clone = self.sprites[index].make_clone(id);
    let started = clone.start_hats(&self.graph, "control_start_as_clone", None);
    self.shared.running.extend(started);
    self.shared.clone_count += 1;
    debug!("cloned {} as {}", clone.info.name, id);
    self.sprites.push(clone);
    Some(id)
  }

  fn clone_failure(&mut self, kind: DiagnosticKind, source: &CloneSource) {
    let sprite = match source {
      CloneSource::Sprite(id) => self
        .sprite(*id)
        .map(|sprite| sprite.info.name.clone())
        .unwrap_or_default(),
      CloneSource::Named(name) => name.clone(),
    };
    self.shared.diagnostics.report(Diagnostic {
      kind,
      sprite,
      block: BlockId::END,
      message: "could not create clone".to_string(),
    });
  }

  fn take_snapshots(&mut self) {
    self.shared.snapshots = self
      .sprites
      .iter()
      .filter(|sprite| !sprite.info.is_clone)
      .map(Snapshot::of)
      .collect();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::block::{RawBlock, RawInput};
  use crate::script::ScriptThread;
  use crate::testing::{field_text, global, run, trace, ProjectBuilder};

  fn mark(next: Option<&str>) -> RawBlock {
    let block = RawBlock::new("test_mark");
    match next {
      Some(next) => block.next(next),
      None => block,
    }
  }

  #[test]
  fn chain_finishes_on_the_tick_that_runs_its_last_block() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("Cat");
    builder.hat("flag", "event_whenflagclicked", Some("a"));
    builder.block("a", mark(Some("b")));
    builder.block("b", mark(None));
    let mut runtime = builder.build();
    runtime.green_flag();

    // The hat itself takes a tick.
    assert_eq!(runtime.run_threads().steps, 1);
    assert_eq!(runtime.sprites()[0].threads[0].current, BlockId(2));
    runtime.run_threads();
    assert_eq!(runtime.sprites()[0].threads[0].current, BlockId(3));
    let sweep = runtime.run_threads();
    assert_eq!(sweep.progress, Progress::Continue);
    assert_eq!(trace(&runtime), ["Cat:a", "Cat:b"]);
    assert!(runtime.sprites()[0].threads.is_empty());
    assert_eq!(runtime.run_threads().steps, 0);
  }

  #[test]
  fn step_reports_return_and_stop_at_end_of_chain() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("Cat");
    builder.hat("flag", "event_whenflagclicked", Some("a"));
    builder.block("a", mark(Some("b")));
    builder.block("b", mark(None));
    let mut runtime = builder.build();
    runtime.green_flag();
    runtime.run_threads();

    let Runtime {
      graph,
      sprites,
      shared,
      ..
    } = &mut runtime;
    let sprite = &mut sprites[0];
    let mut thread = sprite.threads.remove(0);
    let first = thread.step(graph, sprite, shared).unwrap();
    assert_eq!(first.progress, Progress::Continue);
    assert_eq!(first.next, BlockId(3));
    let second = thread.step(graph, sprite, shared).unwrap();
    assert_eq!(second.progress, Progress::ReturnAndStopScript);
    assert!(thread.is_finished());
  }

  #[test]
  fn dispatch_fans_out_without_evaluating() {
    let mut builder = ProjectBuilder::new();
    for name in ["A", "B", "C"] {
      builder.sprite(name);
      builder.hat(&format!("{name}-go"), "event_whenflagclicked", None);
      builder.hat(&format!("{name}-other"), "event_whenkeypressed", None);
    }
    let mut runtime = builder.build();
    assert_eq!(runtime.run_all_blocks_by_opcode("event_whenflagclicked"), 3);
    for sprite in runtime.sprites() {
      assert_eq!(sprite.threads.len(), 1);
      let thread = &sprite.threads[0];
      assert_eq!(thread.current, thread.hat);
      let hat = runtime.graph().lookup(thread.hat).unwrap();
      assert_eq!(hat.opcode, "event_whenflagclicked");
    }
    assert_eq!(runtime.shared().counter, 0.);
    assert!(trace(&runtime).is_empty());
  }

  #[test]
  fn dispatch_in_sprite_is_restricted() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("A");
    builder.hat("a", "event_whenthisspriteclicked", None);
    builder.sprite("B");
    builder.hat("b1", "event_whenthisspriteclicked", None);
    builder.hat("b2", "event_whenthisspriteclicked", None);
    let mut runtime = builder.build();
    let b = runtime.sprites()[1].id();
    assert_eq!(
      runtime.run_all_blocks_by_opcode_in_sprite("event_whenthisspriteclicked", b),
      2
    );
    assert!(runtime.sprites()[0].threads.is_empty());
    assert_eq!(runtime.click_sprite(runtime.sprites()[0].id()), 1);
  }

  #[test]
  fn threads_started_mid_sweep_wait_for_the_next_sweep() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("Sender");
    builder.hat("flag", "event_whenflagclicked", Some("send"));
    builder.block(
      "send",
      RawBlock::new("event_broadcast")
        .input("BROADCAST_INPUT", RawInput::Value(Value::from("go"))),
    );
    builder.sprite("Receiver");
    builder.block(
      "receive",
      RawBlock::new("event_whenbroadcastreceived")
        .field("BROADCAST_OPTION", field_text("go"))
        .next("mark")
        .top_level(),
    );
    builder.block("mark", mark(None));
    let mut runtime = builder.build();
    runtime.green_flag();
    runtime.run_threads();
    let sweep = runtime.run_threads();
    assert_eq!(sweep.steps, 1);
    assert!(runtime.sprites()[1].threads.is_empty());

    let sweep = runtime.run_threads();
    assert_eq!(sweep.steps, 1);
    assert_eq!(runtime.sprites()[1].threads.len(), 1);
    runtime.run_threads();
    assert_eq!(trace(&runtime), ["Receiver:mark"]);
  }

  #[test]
  fn stop_sprite_cuts_the_sweep_short() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("First");
    builder.hat("first", "event_whenflagclicked", Some("first-mark"));
    builder.block("first-mark", mark(None));
    builder.sprite("S");
    for index in 0..5 {
      let hat = format!("hat{index}");
      let body = format!("body{index}");
      builder.hat(&hat, "event_whenflagclicked", Some(&body));
      if index == 2 {
        builder.block(&body, RawBlock::new("test_stop_sprite"));
      } else {
        builder.block(&body, mark(None));
      }
    }
    builder.sprite("After");
    builder.hat("after", "event_whenflagclicked", Some("after-mark"));
    builder.block("after-mark", mark(None));
    let mut runtime = builder.build();
    runtime.green_flag();
    assert_eq!(runtime.run_threads().steps, 7);

    let sweep = runtime.run_threads();
    let s = runtime.sprites()[1].id();
    assert_eq!(sweep.progress, Progress::StopSprite);
    assert_eq!(sweep.sprite, Some(s));
    assert_eq!(sweep.steps, 4);
    assert_eq!(trace(&runtime), ["First:first-mark", "S:body0", "S:body1"]);
    assert_eq!(runtime.sprites()[2].threads[0].current, BlockId(14));

    runtime.stop_sprite(s);
    assert!(runtime.sprites()[1].threads.is_empty());
    runtime.run_threads();
    assert_eq!(trace(&runtime).last().unwrap(), "After:after-mark");
  }

  #[test]
  fn close_project_is_returned_verbatim() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("A");
    builder.hat("flag", "event_whenflagclicked", Some("stop"));
    builder.block(
      "stop",
      RawBlock::new("control_stop").field("STOP_OPTION", field_text("all")),
    );
    builder.sprite("B");
    builder.hat("b", "event_whenflagclicked", Some("b-mark"));
    builder.block("b-mark", mark(None));
    let mut runtime = builder.build();
    runtime.green_flag();
    runtime.run_threads();
    let sweep = runtime.run_threads();
    assert_eq!(sweep.progress, Progress::CloseProject);
    assert!(trace(&runtime).is_empty());
  }

  #[test]
  fn unknown_block_only_ends_its_own_thread() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("A");
    builder.hat("a", "event_whenflagclicked", Some("a-mark"));
    builder.block("a-mark", mark(None));
    builder.sprite("B");
    builder.hat("b", "event_whenflagclicked", Some("b-mark"));
    builder.block("b-mark", mark(None));
    let mut runtime = builder.build();
    runtime.green_flag();
    let a = runtime.sprites()[0].id();
    runtime.sprites[0].threads.insert(
      0,
      ScriptThread::new(ThreadId { sprite: a, serial: 99 }, BlockId(999)),
    );

    let sweep = runtime.run_threads();
    assert_eq!(sweep.progress, Progress::Continue);
    assert_eq!(sweep.steps, 3);
    assert_eq!(runtime.sprites()[0].threads.len(), 1);
    assert_eq!(runtime.diagnostics().count(DiagnosticKind::UnknownBlock), 1);
    runtime.run_threads();
    assert_eq!(trace(&runtime), ["A:a-mark", "B:b-mark"]);
  }

  #[test]
  fn waiting_thread_resumes_idempotently() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("A");
    builder.hat("flag", "event_whenflagclicked", Some("loop"));
    builder.block(
      "loop",
      RawBlock::new("control_forever")
        .input("SUBSTACK", RawInput::Block("wait".into())),
    );
    builder.block(
      "wait",
      RawBlock::new("control_wait_until")
        .input("CONDITION", RawInput::Variable(global(0)))
        .next("done"),
    );
    builder.block("done", mark(None));
    let mut runtime = builder.build();
    runtime.green_flag();
    runtime.run_threads();
    runtime.run_threads();
    let expected_stack = runtime.sprites()[0].threads[0].stack.clone();
    for _ in 0..1000 {
      runtime.run_threads();
      let thread = &runtime.sprites()[0].threads[0];
      assert_eq!(thread.current, BlockId(3));
      assert_eq!(thread.stack, expected_stack);
    }
    assert!(trace(&runtime).is_empty());

    runtime.shared_mut().global_variables[0] = Value::Bool(true);
    runtime.run_threads();
    runtime.run_threads();
    assert_eq!(trace(&runtime), ["A:done"]);
    // Back at the loop head, still running.
    assert_eq!(runtime.sprites()[0].threads[0].current, BlockId(2));
  }

  #[test]
  fn stop_other_scripts_spares_the_caller() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("A");
    builder.hat("one", "event_whenflagclicked", Some("forever"));
    builder.block("forever", RawBlock::new("control_forever"));
    builder.hat("two", "event_whenflagclicked", Some("stop"));
    builder.block(
      "stop",
      RawBlock::new("control_stop")
        .field("STOP_OPTION", field_text("other scripts in sprite"))
        .next("after"),
    );
    builder.block("after", mark(None));
    builder.hat("three", "event_whenflagclicked", Some("forever2"));
    builder.block("forever2", RawBlock::new("control_forever"));
    let mut runtime = builder.build();
    runtime.green_flag();
    runtime.run_threads();
    runtime.run_threads();
    assert_eq!(runtime.sprites()[0].threads.len(), 1);
    runtime.run_threads();
    assert_eq!(trace(&runtime), ["A:after"]);
  }

  #[test]
  fn clones_start_their_clone_hats_next_sweep() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("Cat");
    builder.hat("flag", "event_whenflagclicked", Some("clone"));
    builder.block(
      "clone",
      RawBlock::new("control_create_clone_of")
        .input("CLONE_OPTION", RawInput::Value(Value::from("_myself_"))),
    );
    builder.hat("as-clone", "control_start_as_clone", Some("delete"));
    builder.block("delete", RawBlock::new("control_delete_this_clone"));
    let mut runtime = builder.build();
    runtime.green_flag();
    runtime.run_threads();
    runtime.run_threads();
    assert_eq!(runtime.sprites().len(), 1);

    let sweep = runtime.run_threads();
    assert_eq!(runtime.sprites().len(), 2);
    assert_eq!(runtime.shared().clone_count, 1);
    assert_eq!(sweep.progress, Progress::Continue);

    let sweep = runtime.run_threads();
    assert_eq!(sweep.progress, Progress::Continue);
    assert_eq!(runtime.sprites().len(), 1);
    assert_eq!(runtime.shared().clone_count, 0);
    assert!(!runtime.has_active_threads());
  }

  #[test]
  fn deleting_clones_does_not_hold_up_the_sweep() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("Cat");
    builder.hat("flag", "event_whenflagclicked", Some("c1"));
    for (key, next) in [("c1", Some("c2")), ("c2", Some("c3")), ("c3", None)] {
      let mut raw = RawBlock::new("control_create_clone_of")
        .input("CLONE_OPTION", RawInput::Value(Value::from("_myself_")));
      if let Some(next) = next {
        raw = raw.next(next);
      }
      builder.block(key, raw);
    }
    builder.hat("as-clone", "control_start_as_clone", Some("spin"));
    builder.block("spin", RawBlock::new("control_forever"));
    builder.block(
      "die",
      RawBlock::new("event_whenbroadcastreceived")
        .field("BROADCAST_OPTION", field_text("die"))
        .next("delete")
        .top_level(),
    );
    builder.block("delete", RawBlock::new("control_delete_this_clone"));
    builder.sprite("After");
    builder.hat("after", "event_whenflagclicked", Some("after-loop"));
    builder.block("after-loop", RawBlock::new("control_forever"));
    let mut runtime = builder.build();
    runtime.green_flag();
    run(&mut runtime, 6);
    assert_eq!(runtime.shared().clone_count, 3);

    // Cat's own receiver runs too; the block is a no-op outside a clone.
    assert_eq!(runtime.broadcast("die"), 4);
    runtime.run_threads();
    let sweep = runtime.run_threads();
    assert_eq!(sweep.progress, Progress::Continue);
    assert_eq!(sweep.sprite, None);
    // Every clone still gets its turn: its loop, then its delete block.
    assert_eq!(sweep.steps, 8);
    assert_eq!(runtime.shared().clone_count, 0);
    let names: Vec<_> = runtime
      .sprites()
      .iter()
      .map(|sprite| sprite.info.name.as_str())
      .collect();
    assert_eq!(names, ["Cat", "After"]);
  }

  #[test]
  fn failing_opcode_is_recorded_as_script_error() {
    let mut builder = ProjectBuilder::new();
    builder.sprite("A");
    builder.hat("a", "event_whenflagclicked", Some("fail"));
    builder.block("fail", RawBlock::new("test_fail").next("a-mark"));
    builder.block("a-mark", mark(None));
    builder.sprite("B");
    builder.hat("b", "event_whenflagclicked", Some("b-mark"));
    builder.block("b-mark", mark(None));
    let mut runtime = builder.build();
    runtime.green_flag();
    run(&mut runtime, 4);
    assert_eq!(trace(&runtime), ["B:b-mark"]);
    assert_eq!(runtime.diagnostics().count(DiagnosticKind::ScriptError), 1);
    assert_eq!(runtime.diagnostics().count(DiagnosticKind::UnknownBlock), 0);
    assert!(!runtime.has_active_threads());
  }

  #[test]
  fn clone_limit_is_enforced() {
    let mut builder = ProjectBuilder::new();
    builder.config(|config| config.max_clones = 2);
    builder.sprite("Cat");
    builder.hat("flag", "event_whenflagclicked", Some("loop"));
    builder.block(
      "loop",
      RawBlock::new("control_repeat")
        .input("TIMES", RawInput::Value(Value::from(5.)))
        .input("SUBSTACK", RawInput::Block("clone".into())),
    );
    builder.block(
      "clone",
      RawBlock::new("control_create_clone_of")
        .input("CLONE_OPTION", RawInput::Value(Value::from("Cat"))),
    );
    let mut runtime = builder.build();
    runtime.green_flag();
    for _ in 0..20 {
      runtime.run_threads();
    }
    assert_eq!(runtime.sprites().len(), 3);
    assert_eq!(runtime.diagnostics().count(DiagnosticKind::CloneLimit), 3);
  }
}
