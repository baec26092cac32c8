//! Movement propagation engine for a multi-company bookkeeping ledger.
//!
//! A single call to [`Engine::apply_movement`] books a real-world financial
//! event on a cash register or bank account and, atomically, on an optional
//! counterpart treasury ledger and an optional customer current account.
//! Every touched account keeps cumulative deposit/withdrawal totals that are
//! updated in the same database transaction as the movement records.

pub use accounts::{LedgerAccount, LedgerKind, TreasuryKind};
pub use balance::Direction;
pub use cache::{AccountCache, CacheError, CacheInvalidator, CacheKey, DEFAULT_TTL, MemoryCache};
pub use commands::{Counterpart, CustomerCounterpart, MovementCmd, MovementReceipt};
pub use currency::Currency;
pub use error::{EngineError, ErrorKind};
pub use money::Money;
pub use movements::MovementRecord;
pub use ops::{AuditReport, BrokenLink, Engine, EngineBuilder, LinkProblem, TotalsDrift};

mod accounts;
mod balance;
mod cache;
mod commands;
mod currency;
mod error;
mod money;
mod movements;
mod ops;
mod store;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
