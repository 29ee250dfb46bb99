use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GcError {
  #[error("nothing to collect: no block has been allocated yet")]
  NothingToCollect,

  #[error("collector used from a thread other than the one that first allocated through it")]
  ForeignThread,

  #[error("invalid configuration value for {key}: {value:?}")]
  InvalidConfig { key: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, GcError>;
