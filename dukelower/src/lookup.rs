//! Resolving class names to [`ClassSummary`]s.
//!
//! Lookups are made from the jar under conversion ([`JarLookup`]), the classpath given by the user, and the API catalog
//! of the target release ([`SymbolTable`][crate::symbols::SymbolTable]). A [`ChainedLookup`] asks several of them in order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use anyhow::{anyhow, Context, Result};
use indexmap::IndexSet;
use duke::tree::class::{ClassFile, ClassName};
use duke::tree::field::{FieldDescriptor, FieldName};
use duke::tree::method::{MethodDescriptor, MethodName};
use dukebox::OpenedJar;

/// The header of a class: everything but code.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSummary {
	pub name: ClassName,
	pub super_class: Option<ClassName>,
	pub interfaces: Vec<ClassName>,
	pub is_interface: bool,
	pub fields: IndexSet<(FieldName, FieldDescriptor)>,
	pub methods: Vec<MethodSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSummary {
	pub name: MethodName,
	pub descriptor: MethodDescriptor,
	pub is_private: bool,
}

impl ClassSummary {
	pub fn has_field(&self, name: &str, descriptor: &str) -> bool {
		self.fields.iter().any(|(n, d)| n == name && d == descriptor)
	}

	pub fn has_method(&self, name: &str, descriptor: &str) -> bool {
		self.methods.iter().any(|m| m.name == name && m.descriptor == descriptor)
	}

	/// Like [`ClassSummary::has_method`], but ignores private methods, as those can't be the target of a virtual call.
	pub fn has_non_private_method(&self, name: &str, descriptor: &str) -> bool {
		self.methods.iter().any(|m| !m.is_private && m.name == name && m.descriptor == descriptor)
	}
}

impl From<&ClassFile> for ClassSummary {
	fn from(class: &ClassFile) -> Self {
		ClassSummary {
			name: class.name.clone(),
			super_class: class.super_class.clone(),
			interfaces: class.interfaces.clone(),
			is_interface: class.access.is_interface,
			fields: class.fields.iter()
				.map(|field| (field.name.clone(), field.descriptor.clone()))
				.collect(),
			methods: class.methods.iter()
				.map(|method| MethodSummary {
					name: method.name.clone(),
					descriptor: method.descriptor.clone(),
					is_private: method.access.is_private,
				})
				.collect(),
		}
	}
}

/// Something that can tell what a class looks like.
pub trait ClassLookup {
	/// Returns the summary of the class, or [`None`] if this lookup doesn't know about it.
	fn resolve(&self, name: &ClassName) -> Result<Option<Arc<ClassSummary>>>;
}

impl<T: ClassLookup + ?Sized> ClassLookup for &T {
	fn resolve(&self, name: &ClassName) -> Result<Option<Arc<ClassSummary>>> {
		(**self).resolve(name)
	}
}

impl<T: ClassLookup + ?Sized> ClassLookup for Box<T> {
	fn resolve(&self, name: &ClassName) -> Result<Option<Arc<ClassSummary>>> {
		(**self).resolve(name)
	}
}

/// A cache of resolved names, remembering the ones that weren't found as well.
#[derive(Debug, Default)]
pub(crate) struct SummaryCache {
	map: Mutex<HashMap<ClassName, Option<Arc<ClassSummary>>>>,
}

impl SummaryCache {
	pub(crate) fn get_or_try_insert(
		&self,
		name: &ClassName,
		f: impl FnOnce() -> Result<Option<ClassSummary>>,
	) -> Result<Option<Arc<ClassSummary>>> {
		if let Some(cached) = self.map.lock().unwrap_or_else(PoisonError::into_inner).get(name) {
			return Ok(cached.clone());
		}
		// not holding the lock while reading the class, two threads might resolve the same class, the first one wins
		let summary = f()?.map(Arc::new);
		Ok(self.map.lock().unwrap_or_else(PoisonError::into_inner)
			.entry(name.clone())
			.or_insert(summary)
			.clone())
	}
}

/// Resolves classes from an opened jar, reading `<prefix><name>.class`.
pub struct JarLookup<J> {
	jar: Mutex<J>,
	prefix: String,
	cache: SummaryCache,
}

impl<J: OpenedJar> JarLookup<J> {
	/// A lookup for a jar or a directory, where classes are at the root.
	pub fn new(jar: J) -> JarLookup<J> {
		JarLookup::with_prefix(jar, "")
	}

	/// A lookup for a `.jmod`, where classes are in the `classes/` directory.
	pub fn jmod(jar: J) -> JarLookup<J> {
		JarLookup::with_prefix(jar, "classes/")
	}

	pub fn with_prefix(jar: J, prefix: impl Into<String>) -> JarLookup<J> {
		JarLookup {
			jar: Mutex::new(jar),
			prefix: prefix.into(),
			cache: SummaryCache::default(),
		}
	}
}

impl<J: OpenedJar> ClassLookup for JarLookup<J> {
	fn resolve(&self, name: &ClassName) -> Result<Option<Arc<ClassSummary>>> {
		self.cache.get_or_try_insert(name, || {
			let file_name = format!("{}{name}.class", self.prefix);
			let data = self.jar.lock().unwrap_or_else(PoisonError::into_inner)
				.read_file(&file_name)
				.with_context(|| anyhow!("failed to read {file_name:?} for class {name}"))?;
			data.map(|data| read_summary(&data).with_context(|| anyhow!("failed to read class {name} from {file_name:?}")))
				.transpose()
		})
	}
}

/// Reads a class file into a [`ClassSummary`].
pub fn read_summary(data: &[u8]) -> Result<ClassSummary> {
	let class = duke::read_class_from_slice(data)?;
	Ok(ClassSummary::from(&class))
}

/// Asks each lookup in order, and returns the first class found.
#[derive(Default)]
pub struct ChainedLookup<'a> {
	lookups: Vec<Box<dyn ClassLookup + 'a>>,
}

impl<'a> ChainedLookup<'a> {
	pub fn new() -> ChainedLookup<'a> {
		ChainedLookup::default()
	}

	pub fn push(&mut self, lookup: impl ClassLookup + 'a) {
		self.lookups.push(Box::new(lookup));
	}

	pub fn with(mut self, lookup: impl ClassLookup + 'a) -> ChainedLookup<'a> {
		self.push(lookup);
		self
	}
}

impl ClassLookup for ChainedLookup<'_> {
	fn resolve(&self, name: &ClassName) -> Result<Option<Arc<ClassSummary>>> {
		for lookup in &self.lookups {
			if let Some(summary) = lookup.resolve(name)? {
				return Ok(Some(summary));
			}
		}
		Ok(None)
	}
}

/// A lookup over summaries kept in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryLookup {
	classes: HashMap<ClassName, Arc<ClassSummary>>,
}

impl MemoryLookup {
	pub fn new() -> MemoryLookup {
		MemoryLookup::default()
	}

	pub fn add(&mut self, summary: ClassSummary) {
		self.classes.insert(summary.name.clone(), Arc::new(summary));
	}

	pub fn add_class(&mut self, class: &ClassFile) {
		self.add(ClassSummary::from(class));
	}

	pub fn len(&self) -> usize {
		self.classes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.classes.is_empty()
	}
}

impl ClassLookup for MemoryLookup {
	fn resolve(&self, name: &ClassName) -> Result<Option<Arc<ClassSummary>>> {
		Ok(self.classes.get(name).cloned())
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use duke::tree::class::{ClassAccess, ClassFile, ClassName};
	use duke::tree::method::{Method, MethodAccess, MethodName};
	use duke::tree::version::Version;
	use crate::lookup::{ChainedLookup, ClassLookup, ClassSummary, MemoryLookup};

	fn class(name: &str, super_class: &str) -> ClassFile {
		ClassFile::new(Version::V1_8, ClassAccess::from(0x0021), ClassName::from(name), Some(ClassName::from(super_class)), Vec::new())
	}

	#[test]
	fn summary_from_class() {
		let mut class = class("a/B", "java/lang/Object");
		let mut access = MethodAccess::default();
		access.is_private = true;
		class.methods.push(Method::new(access, MethodName::from("hidden"), "()V".into()));
		class.methods.push(Method::new(MethodAccess::from(0x0001), MethodName::from("shown"), "()V".into()));

		let summary = ClassSummary::from(&class);
		assert_eq!(summary.super_class, Some(ClassName::JAVA_LANG_OBJECT));
		assert!(!summary.is_interface);
		assert!(summary.has_method("hidden", "()V"));
		assert!(!summary.has_non_private_method("hidden", "()V"));
		assert!(summary.has_non_private_method("shown", "()V"));
		assert!(!summary.has_method("shown", "()I"));
	}

	#[test]
	fn chained_asks_in_order() {
		let mut first = MemoryLookup::new();
		first.add_class(&class("a/B", "a/First"));
		let mut second = MemoryLookup::new();
		second.add_class(&class("a/B", "a/Second"));
		second.add_class(&class("a/C", "a/Second"));

		let chained = ChainedLookup::new().with(&first).with(&second);
		assert_eq!(chained.resolve(&ClassName::from("a/B")).unwrap().unwrap().super_class, Some(ClassName::from("a/First")));
		assert_eq!(chained.resolve(&ClassName::from("a/C")).unwrap().unwrap().super_class, Some(ClassName::from("a/Second")));
		assert!(chained.resolve(&ClassName::from("a/D")).unwrap().is_none());
	}
}
