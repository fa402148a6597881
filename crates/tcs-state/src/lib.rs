//! # tcs-state — Document Builder and Migration Engine
//!
//! The two stateful workflows over the `tcs-core` document model.
//!
//! - **Builder** (`builder.rs`): assembles a [`tcs_core::Document`] one
//!   report at a time. The open report is an explicit
//!   `NoOpenReport | Open(pending)` cursor; opening the next report or
//!   calling `build()` finalises the pending one.
//!
//! - **Migration** (`migration.rs`): rewrites a document forward along
//!   the per-axis step graph (organisation, report, category payload),
//!   returning a new document and an ordered change log.
//!
//! Neither performs I/O. The builder is single-owner; the engine is
//! stateless and can be shared freely.

pub mod builder;
pub mod migration;

// ─── Builder re-exports ─────────────────────────────────────────────

pub use builder::{BuilderError, DocumentBuilder};

// ─── Migration re-exports ───────────────────────────────────────────

pub use migration::{
    AddedDefault, Change, ChangeRecord, FieldChange, MigrationEngine, MigrationError,
    MigrationOutcome, MigrationRequest,
};
