use thiserror::Error;

use crate::block::BlockId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown block {0}")]
  UnknownBlock(BlockId),

  #[error("cannot use a {from} as a {to}")]
  InvalidCoercion {
    from: &'static str,
    to: &'static str,
  },

  #[error("block `{0}` is defined more than once")]
  DuplicateBlock(String),

  #[error("block `{block}` is followed by missing block `{successor}`")]
  DanglingSuccessor { block: String, successor: String },

  #[error("input `{input}` of block `{block}` refers to missing block `{target}`")]
  DanglingInput {
    block: String,
    input: String,
    target: String,
  },

  #[error("block `{block}` uses unknown opcode `{opcode}`")]
  UnknownOpcode { block: String, opcode: String },

  #[error("project has no stage target")]
  MissingStage,

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  #[error(transparent)]
  Io(#[from] std::io::Error),
}
