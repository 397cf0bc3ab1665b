//! Converting java class files down to older releases.
//!
//! A [`Converter`] runs the [stages][release::Stage] of each [`Release`] between the version of a class and the target
//! release, newest first. Each stage runs one of the [lowering passes][passes], rewriting constructs the older release
//! doesn't support into ones it does. With a [`SymbolTable`], calls are then widened to the classes declaring their
//! methods in the target release, and converted classes are checked for references to API missing there.
//!
//! Writing the converted classes needs common super classes, which a [`ClassHierarchy`] finds using a [`ClassLookup`].
//!
//! Non-fatal findings go into a [`Diagnostics`] sink.

pub mod converter;
pub mod diagnostics;
pub mod hierarchy;
pub mod lookup;
pub mod passes;
pub mod release;
pub mod symbols;
pub(crate) mod codegen;

pub use converter::{Converted, Converter};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use hierarchy::ClassHierarchy;
pub use lookup::{ChainedLookup, ClassLookup, ClassSummary, JarLookup, MemoryLookup};
pub use release::Release;
pub use symbols::SymbolTable;
