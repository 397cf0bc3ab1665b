use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use log::{error, warn};
use duke::tree::class::ClassName;

/// What a [`Diagnostic`] is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
	/// A class, field, method or descriptor is part of the current JDK, but not of the target release.
	MissingSymbol,
	/// A call could be widened to more than one unrelated owner, so it was left alone.
	AmbiguousWidening,
	/// A class needed for computing the class hierarchy couldn't be found anywhere.
	HierarchyLookup,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
	pub kind: DiagnosticKind,
	/// The class that was processed when this was found.
	pub class: ClassName,
	pub message: String,
}

impl Display for Diagnostic {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "In {}: {}", self.class, self.message)
	}
}

/// Collects the non-fatal findings of one or more conversions.
///
/// Every finding is also logged as it comes in. The sink can be shared between threads.
#[derive(Debug, Default)]
pub struct Diagnostics {
	findings: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
	pub fn new() -> Diagnostics {
		Diagnostics::default()
	}

	fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
		// a poisoned list of findings is still a valid list
		self.findings.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn report(&self, kind: DiagnosticKind, class: &ClassName, message: impl Into<String>) {
		let diagnostic = Diagnostic { kind, class: class.clone(), message: message.into() };
		match kind {
			DiagnosticKind::MissingSymbol | DiagnosticKind::AmbiguousWidening => error!("{diagnostic}"),
			DiagnosticKind::HierarchyLookup => warn!("{diagnostic}"),
		}
		self.lock().push(diagnostic);
	}

	/// Returns a copy of everything reported so far, in the order it was reported.
	pub fn findings(&self) -> Vec<Diagnostic> {
		self.lock().clone()
	}

	pub fn count(&self, kind: DiagnosticKind) -> usize {
		self.lock().iter().filter(|diagnostic| diagnostic.kind == kind).count()
	}

	pub fn has_missing_symbols(&self) -> bool {
		self.count(DiagnosticKind::MissingSymbol) > 0
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use duke::tree::class::ClassName;
	use crate::diagnostics::{DiagnosticKind, Diagnostics};

	#[test]
	fn collects_findings() {
		let diagnostics = Diagnostics::new();
		assert!(!diagnostics.has_missing_symbols());

		let class = ClassName::from("org/example/Main");
		diagnostics.report(DiagnosticKind::HierarchyLookup, &class, "Class not found: org/example/Gone");
		assert!(!diagnostics.has_missing_symbols());

		diagnostics.report(DiagnosticKind::MissingSymbol, &class, "Method not found in java 8: java/lang/String strip ()Ljava/lang/String;");
		assert!(diagnostics.has_missing_symbols());
		assert_eq!(diagnostics.count(DiagnosticKind::MissingSymbol), 1);

		let findings = diagnostics.findings();
		assert_eq!(findings.len(), 2);
		assert_eq!(findings[0].to_string(), "In org/example/Main: Class not found: org/example/Gone");
	}

	#[test]
	fn shared_between_threads() {
		let diagnostics = Diagnostics::new();
		std::thread::scope(|scope| {
			for i in 0..4 {
				let diagnostics = &diagnostics;
				scope.spawn(move || {
					diagnostics.report(DiagnosticKind::AmbiguousWidening, &ClassName::from(format!("a/C{i}")), "ambiguous");
				});
			}
		});
		assert_eq!(diagnostics.count(DiagnosticKind::AmbiguousWidening), 4);
	}
}
