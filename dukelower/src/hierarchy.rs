use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use anyhow::Result;
use duke::CommonSuperClass;
use duke::tree::class::ClassName;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::lookup::ClassLookup;

/// Finds common super classes for the class writer, walking the super class chains resolved from a [`ClassLookup`].
///
/// Each chain starts with the class itself and ends with `java/lang/Object`. A class that can't be resolved is reported
/// and then treated as a direct subclass of `java/lang/Object`.
pub struct ClassHierarchy<'a, L> {
	lookup: L,
	diagnostics: &'a Diagnostics,
	state: Mutex<State>,
}

#[derive(Default)]
struct State {
	chains: HashMap<ClassName, Arc<[ClassName]>>,
	interfaces: HashSet<ClassName>,
}

impl<'a, L: ClassLookup> ClassHierarchy<'a, L> {
	pub fn new(lookup: L, diagnostics: &'a Diagnostics) -> ClassHierarchy<'a, L> {
		ClassHierarchy {
			lookup,
			diagnostics,
			state: Mutex::new(State::default()),
		}
	}

	fn state(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Returns the class, its super class, the super class of that, and so on up to `java/lang/Object`.
	pub fn chain(&self, requested: &ClassName) -> Result<Arc<[ClassName]>> {
		if *requested == ClassName::JAVA_LANG_OBJECT {
			return Ok(Arc::from(vec![ClassName::JAVA_LANG_OBJECT]));
		}
		if let Some(chain) = self.state().chains.get(requested) {
			return Ok(chain.clone());
		}

		let mut walked: Vec<ClassName> = Vec::new();
		let mut interfaces = Vec::new();
		let mut current = requested.clone();
		let tail: Arc<[ClassName]> = loop {
			if current == ClassName::JAVA_LANG_OBJECT {
				break Arc::from(vec![ClassName::JAVA_LANG_OBJECT]);
			}
			if let Some(chain) = self.state().chains.get(&current) {
				break chain.clone();
			}
			if walked.contains(&current) {
				self.diagnostics.report(DiagnosticKind::HierarchyLookup, requested,
					format!("Failed to compute class hierarchy for {requested}: Cyclic super classes at {current} (assuming java/lang/Object)"));
				break Arc::from(vec![ClassName::JAVA_LANG_OBJECT]);
			}

			match self.lookup.resolve(&current)? {
				Some(summary) => {
					if summary.is_interface {
						interfaces.push(current.clone());
					}
					walked.push(current);
					match &summary.super_class {
						Some(super_class) => current = super_class.clone(),
						None => break Arc::from(vec![ClassName::JAVA_LANG_OBJECT]),
					}
				},
				None => {
					self.diagnostics.report(DiagnosticKind::HierarchyLookup, requested,
						format!("Failed to compute class hierarchy for {requested}: Class not found: {current} (assuming java/lang/Object)"));
					walked.push(current);
					break Arc::from(vec![ClassName::JAVA_LANG_OBJECT]);
				},
			}
		};

		let mut state = self.state();
		state.interfaces.extend(interfaces);
		let mut chain = tail;
		for name in walked.into_iter().rev() {
			let mut vec = Vec::with_capacity(chain.len() + 1);
			vec.push(name.clone());
			vec.extend(chain.iter().cloned());
			chain = Arc::from(vec);
			state.chains.entry(name).or_insert_with(|| chain.clone());
		}
		Ok(chain)
	}

	/// Returns `true` if the class is known to be an interface, resolving it first if needed.
	pub fn is_interface(&self, name: &ClassName) -> Result<bool> {
		self.chain(name)?;
		Ok(self.state().interfaces.contains(name))
	}

	pub fn common_super_class(&self, a: &ClassName, b: &ClassName) -> Result<ClassName> {
		if *a == ClassName::JAVA_LANG_OBJECT || *b == ClassName::JAVA_LANG_OBJECT {
			return Ok(ClassName::JAVA_LANG_OBJECT);
		}
		let chain_a = self.chain(a)?;
		let chain_b = self.chain(b)?;
		if self.is_interface(a)? || self.is_interface(b)? {
			return Ok(ClassName::JAVA_LANG_OBJECT);
		}
		Ok(chain_a.iter()
			.find(|name| chain_b.contains(name))
			.cloned()
			.unwrap_or(ClassName::JAVA_LANG_OBJECT))
	}
}

impl<L: ClassLookup> CommonSuperClass for ClassHierarchy<'_, L> {
	fn common_super_class(&self, a: &ClassName, b: &ClassName) -> Result<ClassName> {
		ClassHierarchy::common_super_class(self, a, b)
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use duke::tree::class::{ClassAccess, ClassFile, ClassName};
	use duke::tree::version::Version;
	use crate::diagnostics::{DiagnosticKind, Diagnostics};
	use crate::hierarchy::ClassHierarchy;
	use crate::lookup::MemoryLookup;

	fn lookup() -> MemoryLookup {
		let mut lookup = MemoryLookup::new();
		let mut add = |name: &str, super_class: &str, access: u16| {
			lookup.add_class(&ClassFile::new(Version::V1_8, ClassAccess::from(access), ClassName::from(name),
				Some(ClassName::from(super_class)), Vec::new()));
		};
		add("a/Shape", "java/lang/Object", 0x0421);
		add("a/Circle", "a/Shape", 0x0021);
		add("a/Square", "a/Shape", 0x0021);
		add("a/BigSquare", "a/Square", 0x0021);
		add("a/Drawable", "java/lang/Object", 0x0601);
		add("a/Broken", "a/Missing", 0x0021);
		lookup
	}

	fn name(s: &str) -> ClassName {
		ClassName::from(s)
	}

	#[test]
	fn siblings_meet_at_base() {
		let diagnostics = Diagnostics::new();
		let hierarchy = ClassHierarchy::new(lookup(), &diagnostics);
		assert_eq!(hierarchy.common_super_class(&name("a/Circle"), &name("a/Square")).unwrap(), name("a/Shape"));
		assert_eq!(hierarchy.common_super_class(&name("a/BigSquare"), &name("a/Circle")).unwrap(), name("a/Shape"));
		assert_eq!(hierarchy.common_super_class(&name("a/BigSquare"), &name("a/Square")).unwrap(), name("a/Square"));
		assert_eq!(hierarchy.chain(&name("a/BigSquare")).unwrap().to_vec(),
			vec![name("a/BigSquare"), name("a/Square"), name("a/Shape"), ClassName::JAVA_LANG_OBJECT]);
		assert!(diagnostics.findings().is_empty());
	}

	#[test]
	fn self_and_object() {
		let diagnostics = Diagnostics::new();
		let hierarchy = ClassHierarchy::new(lookup(), &diagnostics);
		assert_eq!(hierarchy.common_super_class(&name("a/Circle"), &name("a/Circle")).unwrap(), name("a/Circle"));
		assert_eq!(hierarchy.common_super_class(&ClassName::JAVA_LANG_OBJECT, &name("a/Circle")).unwrap(), ClassName::JAVA_LANG_OBJECT);
	}

	#[test]
	fn interfaces_give_object() {
		let diagnostics = Diagnostics::new();
		let hierarchy = ClassHierarchy::new(lookup(), &diagnostics);
		assert_eq!(hierarchy.common_super_class(&name("a/Drawable"), &name("a/Circle")).unwrap(), ClassName::JAVA_LANG_OBJECT);
		assert_eq!(hierarchy.common_super_class(&name("a/Circle"), &name("a/Drawable")).unwrap(), ClassName::JAVA_LANG_OBJECT);
		assert!(hierarchy.is_interface(&name("a/Drawable")).unwrap());
	}

	#[test]
	fn missing_classes_are_reported_once() {
		let diagnostics = Diagnostics::new();
		let hierarchy = ClassHierarchy::new(lookup(), &diagnostics);
		assert_eq!(hierarchy.common_super_class(&name("a/Broken"), &name("a/Circle")).unwrap(), ClassName::JAVA_LANG_OBJECT);
		assert_eq!(hierarchy.chain(&name("a/Broken")).unwrap().to_vec(),
			vec![name("a/Broken"), name("a/Missing"), ClassName::JAVA_LANG_OBJECT]);
		assert_eq!(hierarchy.common_super_class(&name("a/Missing"), &name("a/Broken")).unwrap(), name("a/Missing"));

		let findings = diagnostics.findings();
		assert_eq!(findings.len(), 1);
		assert_eq!(findings[0].kind, DiagnosticKind::HierarchyLookup);
		assert_eq!(findings[0].message,
			"Failed to compute class hierarchy for a/Broken: Class not found: a/Missing (assuming java/lang/Object)");
	}
}
