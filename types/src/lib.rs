//! Shared data contract for the hsmod backend.
//!
//! These types define the interface between `hsmod-backend` and its
//! consumers (editor integration, CLI). The backend produces
//! [`DiagnosticRecord`]s and symbol records; consumers render them.
//! Field names and nesting of the serialized forms are a stable
//! contract; downstream rendering depends on them.

mod diagnostic;
mod symbols;

pub use diagnostic::{DiagnosticRecord, Note, Position, Region, Severity, Source};
pub use symbols::{Declaration, DeclarationKind, ModuleSymbols, ScopeModule};
