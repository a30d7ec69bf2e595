//! Static MIPS III -> native recompiler core (§1-§9): a context model, a
//! jump-table/abstract-interpretation analyzer, and a recompilation
//! driver with source-text, native, and scripting code generators.
//!
//! This crate does not read ELF objects; [`config::load_symbol_toml`] is
//! the supported on-ramp into a [`model::Context`] (§6 Input 2), or a
//! `Context` may be built programmatically by a collaborator (e.g. an
//! ELF front end) and handed to [`driver::recompile_context`] directly.

pub mod analysis;
pub mod config;
pub mod decode;
pub mod driver;
pub mod dump;
pub mod error;
pub mod generator;
pub mod model;
pub mod modfile;
pub mod ops;

pub use error::{ConfigError, ContextError, RecompileError, SymbolFileError};
pub use model::Context;
