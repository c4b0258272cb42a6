use std::collections::VecDeque;

use log::warn;

use crate::block::BlockId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
  UnknownBlock,
  InvalidCoercion,
  CloneLimit,
  ListLimit,
  UnknownTarget,
  /// Any other failure that ended a thread.
  ScriptError,
}

/// A script failure that was recovered from without stopping the run.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
  pub kind: DiagnosticKind,
  pub sprite: String,
  pub block: BlockId,
  pub message: String,
}

/// Bounded log of recent diagnostics. Oldest entries are dropped first.
#[derive(Debug)]
pub struct Diagnostics {
  entries: VecDeque<Diagnostic>,
  limit: usize,
  dropped: usize,
}

impl Diagnostics {
  pub fn new(limit: usize) -> Self {
    Diagnostics {
      entries: VecDeque::new(),
      limit,
      dropped: 0,
    }
  }

  pub fn report(&mut self, diagnostic: Diagnostic) {
    warn!(
      "[{}] {} at block {}: {}",
      diagnostic.sprite,
      kind_name(diagnostic.kind),
      diagnostic.block,
      diagnostic.message
    );
    if self.limit == 0 {
      self.dropped += 1;
      return;
    }
    if self.entries.len() == self.limit {
      self.entries.pop_front();
      self.dropped += 1;
    }
    self.entries.push_back(diagnostic);
  }

  pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
    self.entries.iter()
  }

  pub fn count(&self, kind: DiagnosticKind) -> usize {
    self.entries.iter().filter(|entry| entry.kind == kind).count()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Entries that no longer fit in the buffer.
  pub fn dropped(&self) -> usize {
    self.dropped
  }
}

fn kind_name(kind: DiagnosticKind) -> &'static str {
  match kind {
    DiagnosticKind::UnknownBlock => "unknown block",
    DiagnosticKind::InvalidCoercion => "invalid coercion",
    DiagnosticKind::CloneLimit => "clone limit",
    DiagnosticKind::ListLimit => "list limit",
    DiagnosticKind::UnknownTarget => "unknown target",
    DiagnosticKind::ScriptError => "script error",
  }
}
