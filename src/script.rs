use log::trace;

use crate::block::{BlockId, Graph};
use crate::error::Result;
use crate::opcode::{BlockResult, Context, Progress};
use crate::project::SharedState;
use crate::sprite::{Sprite, SpriteId};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId {
  pub sprite: SpriteId,
  pub serial: u32,
}

/// One level of a thread's control stack, owned by the block that pushed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
  pub owner: BlockId,
  pub kind: FrameKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
  /// Body of an `if`; finishing it continues after the owner.
  Branch,
  Forever,
  Repeat { remaining: u64 },
  Until,
  While,
  ForEach { counter: f64 },
  Wait { until: f64 },
  Glide {
    from: (f64, f64),
    to: (f64, f64),
    start: f64,
    duration: f64,
  },
  Say { until: f64 },
  BroadcastWait,
  /// Answer to an `ask and wait` that has not arrived yet.
  Ask,
  /// Custom block invocation; finishing the definition resumes at `return_to`.
  Call {
    return_to: BlockId,
    args: Vec<(String, Value)>,
    /// Run the body without yielding between blocks.
    warp: bool,
  },
}

/// A running script: the block it will execute next plus its control stack.
#[derive(Debug)]
pub struct ScriptThread {
  pub id: ThreadId,
  pub hat: BlockId,
  pub current: BlockId,
  pub stack: Vec<Frame>,
  /// Set by `stop other scripts in sprite`.
  pub stop_siblings: bool,
  finished: bool,
}

impl ScriptThread {
  pub fn new(id: ThreadId, hat: BlockId) -> Self {
    ScriptThread {
      id,
      hat,
      current: hat,
      stack: Vec::new(),
      stop_siblings: false,
      finished: false,
    }
  }

  pub fn is_finished(&self) -> bool {
    self.finished
  }

  pub fn finish(&mut self) {
    self.finished = true;
  }

  /// Executes the current block and moves the cursor. One block of the
  /// script (plus its reporters) runs per call, except inside a custom block
  /// that runs without screen refresh: there blocks keep running until the
  /// call returns, a block waits on itself, or `Config::warp_limit` blocks
  /// have run.
  pub fn step(
    &mut self,
    graph: &Graph,
    sprite: &mut Sprite,
    shared: &mut SharedState,
  ) -> Result<BlockResult> {
    let mut ran = self.current;
    let mut result = self.step_once(graph, sprite, shared)?;
    let mut budget = shared.config.warp_limit;
    while result.progress == Progress::Continue
      && result.next != ran
      && budget > 0
      && self.in_warp()
    {
      ran = self.current;
      result = self.step_once(graph, sprite, shared)?;
      budget -= 1;
    }
    Ok(result)
  }

  fn in_warp(&self) -> bool {
    self
      .stack
      .iter()
      .any(|frame| matches!(frame.kind, FrameKind::Call { warp: true, .. }))
  }

  fn step_once(
    &mut self,
    graph: &Graph,
    sprite: &mut Sprite,
    shared: &mut SharedState,
  ) -> Result<BlockResult> {
    let current = self.current;
    let mut result = graph.evaluate(
      current,
      &mut Context {
        graph,
        sprite,
        thread: self,
        shared,
      },
    )?;
    match result.progress {
      Progress::Continue => {
        let next = self.resume_point(graph, result.next)?;
        if next.is_end() {
          trace!("{:?} reached the end of its script", self.id);
          self.finished = true;
          result.progress = Progress::ReturnAndStopScript;
        } else {
          self.current = next;
        }
        result.next = next;
      }
      Progress::ReturnAndStopScript => self.finished = true,
      Progress::StopSprite | Progress::CloseProject => {}
    }
    Ok(result)
  }

  /// Where to go after `next`, unwinding the control stack when a nested
  /// script runs off its end.
  fn resume_point(&mut self, graph: &Graph, mut next: BlockId) -> Result<BlockId> {
    while next.is_end() {
      let Some(frame) = self.stack.last() else {
        return Ok(BlockId::END);
      };
      let owner = frame.owner;
      let return_to = match &frame.kind {
        FrameKind::Branch => None,
        FrameKind::Call { return_to, .. } => Some(*return_to),
        _ => return Ok(owner),
      };
      self.stack.pop();
      next = match return_to {
        Some(return_to) => return_to,
        None => graph.lookup(owner)?.next,
      };
    }
    Ok(next)
  }

  /// The innermost frame, if `owner` pushed it.
  pub fn frame(&self, owner: BlockId) -> Option<&Frame> {
    self.stack.last().filter(|frame| frame.owner == owner)
  }

  pub fn frame_mut(&mut self, owner: BlockId) -> Option<&mut Frame> {
    self.stack.last_mut().filter(|frame| frame.owner == owner)
  }

  pub fn push(&mut self, owner: BlockId, kind: FrameKind) {
    self.stack.push(Frame { owner, kind });
  }

  /// Pops the innermost frame if `owner` pushed it.
  pub fn pop(&mut self, owner: BlockId) -> Option<Frame> {
    match self.stack.last() {
      Some(frame) if frame.owner == owner => self.stack.pop(),
      _ => None,
    }
  }

  /// Value of a custom block argument in the innermost call.
  pub fn argument(&self, name: &str) -> Option<&Value> {
    self.stack.iter().rev().find_map(|frame| match &frame.kind {
      FrameKind::Call { args, .. } => Some(
        args
          .iter()
          .find(|(arg, _)| arg == name)
          .map(|(_, value)| value),
      ),
      _ => None,
    })?
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn thread() -> ScriptThread {
    ScriptThread::new(
      ThreadId {
        sprite: SpriteId(0),
        serial: 0,
      },
      BlockId(1),
    )
  }

  fn call(return_to: usize, args: &[(&str, f64)]) -> FrameKind {
    FrameKind::Call {
      return_to: BlockId(return_to),
      args: args
        .iter()
        .map(|(name, value)| (name.to_string(), Value::Number(*value)))
        .collect(),
      warp: false,
    }
  }

  #[test]
  fn frames_are_only_visible_to_their_owner() {
    let mut thread = thread();
    thread.push(BlockId(3), FrameKind::Forever);
    thread.push(BlockId(5), FrameKind::Repeat { remaining: 2 });
    assert!(thread.frame(BlockId(3)).is_none());
    assert_eq!(
      thread.frame(BlockId(5)).map(|frame| &frame.kind),
      Some(&FrameKind::Repeat { remaining: 2 })
    );
    assert!(thread.pop(BlockId(3)).is_none());
    assert_eq!(thread.stack.len(), 2);
    assert!(thread.pop(BlockId(5)).is_some());
    assert!(thread.frame(BlockId(3)).is_some());
  }

  #[test]
  fn arguments_come_from_the_innermost_call() {
    let mut thread = thread();
    assert_eq!(thread.argument("n"), None);
    thread.push(BlockId(2), call(3, &[("n", 5.), ("total", 1.)]));
    thread.push(BlockId(7), FrameKind::Repeat { remaining: 1 });
    assert_eq!(thread.argument("total"), Some(&Value::Number(1.)));
    thread.push(BlockId(9), call(10, &[("n", 4.)]));
    assert_eq!(thread.argument("n"), Some(&Value::Number(4.)));
    // Arguments of outer calls are out of scope.
    assert_eq!(thread.argument("total"), None);
  }

  #[test]
  fn finishing_is_sticky() {
    let mut thread = thread();
    assert!(!thread.is_finished());
    thread.finish();
    assert!(thread.is_finished());
    assert_eq!(thread.current, thread.hat);
  }
}
