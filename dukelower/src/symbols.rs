//! Checking converted classes against the API of the target release.
//!
//! The API of each release is read from the `lib/ct.sym` of a JDK, which contains header only class files (`.sig`) for
//! each release it can compile for. Since `ct.sym` only knows about the public API, a reference is only checked if
//! the JDK the table is opened from has the referenced class in one of its `jmods/*.jmod` files.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use duke::tree::annotation::{Annotation, ElementValue};
use duke::tree::class::{ClassFile, ClassName};
use duke::tree::descriptor::class_names_in;
use duke::tree::method::code::{Handle, Instruction, Loadable};
use duke::tree::type_annotation::TypeAnnotation;
use dukebox::{FileJar, Jar, JmodJar, OpenedJar};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::lookup::{read_summary, ClassLookup, ClassSummary, SummaryCache};
use crate::release::Release;

/// The class summaries of one release, read from a `ct.sym` archive.
///
/// The archive has top level directories named by the catalog codes of the releases they're for, each holding
/// `<module>/<class>.sig` files.
pub struct CtSym<J> {
	jar: Mutex<J>,
	entries: HashMap<ClassName, String>,
	cache: SummaryCache,
}

impl<J: OpenedJar> CtSym<J> {
	pub fn new(jar: J, release: Release) -> CtSym<J> {
		let code = release.catalog_code();
		let mut entries = HashMap::new();
		for (_, name) in jar.names() {
			let mut parts = name.splitn(3, '/');
			let (Some(top), Some(_module), Some(rest)) = (parts.next(), parts.next(), parts.next()) else { continue };
			if !top.contains(code) {
				continue;
			}
			if let Some(class) = rest.strip_suffix(".sig") {
				entries.entry(ClassName::from(class)).or_insert_with(|| name.to_owned());
			}
		}
		debug!("Found {} classes for java {release} in ct.sym", entries.len());

		CtSym { jar: Mutex::new(jar), entries, cache: SummaryCache::default() }
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl<J: OpenedJar> ClassLookup for CtSym<J> {
	fn resolve(&self, name: &ClassName) -> Result<Option<Arc<ClassSummary>>> {
		self.cache.get_or_try_insert(name, || {
			let Some(file_name) = self.entries.get(name) else { return Ok(None) };
			let data = self.jar.lock().unwrap_or_else(PoisonError::into_inner)
				.read_file(file_name)
				.with_context(|| anyhow!("failed to read {file_name:?} from ct.sym"))?
				.with_context(|| anyhow!("ct.sym lists {file_name:?}, but it's not a file"))?;
			read_summary(&data)
				.with_context(|| anyhow!("failed to read class {name} from ct.sym entry {file_name:?}"))
				.map(Some)
		})
	}
}

/// Reads the names of all classes in the `.jmod` files of a JDK.
fn read_inventory(jdk: &Path) -> Result<HashSet<ClassName>> {
	let jmods = jdk.join("jmods");
	if !jmods.is_dir() {
		bail!("JDK modules not found: {jmods:?}");
	}

	let mut paths = Vec::new();
	for entry in std::fs::read_dir(&jmods).with_context(|| anyhow!("failed to list {jmods:?}"))? {
		let path = entry.with_context(|| anyhow!("failed to list {jmods:?}"))?.path();
		if path.is_file() && path.extension().is_some_and(|extension| extension == "jmod") {
			paths.push(path);
		}
	}
	paths.sort();

	let mut inventory = HashSet::new();
	for path in paths {
		let jmod = JmodJar::new(&path);
		let opened = jmod.open()?;
		inventory.extend(opened.names()
			.filter_map(|(_, name)| name.strip_prefix("classes/")?.strip_suffix(".class"))
			.filter(|name| {
				let simple = name.rsplit('/').next().unwrap_or(name);
				simple != "module-info" && simple != "package-info"
			})
			.map(ClassName::from));
	}
	Ok(inventory)
}

/// Where a virtual or interface call should go instead.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CallTarget {
	pub owner: ClassName,
	pub is_interface: bool,
}

/// The API of the target release, together with the list of all classes the current JDK knows.
pub struct SymbolTable<'a> {
	release: Release,
	inventory: HashSet<ClassName>,
	catalog: Box<dyn ClassLookup + 'a>,
}

impl SymbolTable<'static> {
	/// Opens the `lib/ct.sym` and reads the `jmods/*.jmod` of the JDK at the given path.
	pub fn open(jdk: &Path, release: Release) -> Result<SymbolTable<'static>> {
		let ct_sym = jdk.join("lib").join("ct.sym");
		if !ct_sym.is_file() {
			bail!("ct.sym not found: {ct_sym:?}");
		}
		let catalog = CtSym::new(FileJar::new(&ct_sym).open()?, release);
		if catalog.is_empty() {
			bail!("ct.sym at {ct_sym:?} has no classes for java {release}");
		}
		let inventory = read_inventory(jdk)?;
		info!("Loaded symbol table for java {release}: {} classes, {} in the current JDK", catalog.len(), inventory.len());

		Ok(SymbolTable::new(release, inventory, catalog))
	}
}

impl<'a> SymbolTable<'a> {
	pub fn new(release: Release, inventory: impl IntoIterator<Item=ClassName>, catalog: impl ClassLookup + 'a) -> SymbolTable<'a> {
		SymbolTable {
			release,
			inventory: inventory.into_iter().collect(),
			catalog: Box::new(catalog),
		}
	}

	pub fn release(&self) -> Release {
		self.release
	}

	/// Checks all references of the class. Every missing one is reported, and `false` is returned if there were any.
	pub fn check(&self, class: &ClassFile, diagnostics: &Diagnostics) -> Result<bool> {
		let mut checker = Checker { table: self, class: &class.name, diagnostics, failed: false };
		checker.check_class(class)
			.with_context(|| anyhow!("failed to check class {} against java {}", class.name, self.release))?;
		Ok(!checker.failed)
	}

	/// A class is missing if the current JDK has it, but the target release doesn't.
	fn missing_class(&self, name: &ClassName) -> Result<bool> {
		if name.as_str().starts_with('[') {
			for element in class_names_in(name.as_str()) {
				if self.missing_class(&element)? {
					return Ok(true);
				}
			}
			return Ok(false);
		}
		Ok(self.inventory.contains(name) && self.catalog.resolve(name)?.is_none())
	}

	fn missing_member(&self, owner: &ClassName, has: impl Fn(&ClassSummary) -> bool) -> Result<bool> {
		if !self.inventory.contains(owner) {
			return Ok(false);
		}
		// members may be declared in any super class or interface
		let mut queue = vec![owner.clone()];
		let mut seen = HashSet::new();
		while let Some(name) = queue.pop() {
			if !seen.insert(name.clone()) {
				continue;
			}
			let Some(summary) = self.catalog.resolve(&name)? else { continue };
			if has(&summary) {
				return Ok(false);
			}
			queue.extend(summary.super_class.iter().cloned());
			queue.extend(summary.interfaces.iter().cloned());
		}
		Ok(true)
	}

	fn missing_field(&self, owner: &ClassName, name: &str, descriptor: &str) -> Result<bool> {
		self.missing_member(owner, |summary| summary.has_field(name, descriptor))
	}

	fn missing_method(&self, owner: &ClassName, name: &str, descriptor: &str) -> Result<bool> {
		if owner.as_str().starts_with('[') {
			// methods of arrays, like `clone`, are the ones of `java/lang/Object`
			return Ok(false);
		}
		self.missing_member(owner, |summary| summary.has_method(name, descriptor))
	}

	/// Finds the class declaring the method a virtual or interface call resolves to in the target release.
	///
	/// Returns [`None`] if the owner isn't part of the current JDK, or no class in the target release declares it. If
	/// more than one unrelated class declares it, that's reported, and [`None`] is returned.
	pub fn widen_call(&self, class: &ClassName, context: &str, owner: &ClassName, name: &str, descriptor: &str, diagnostics: &Diagnostics) -> Result<Option<CallTarget>> {
		if !self.inventory.contains(owner) {
			return Ok(None);
		}
		self.find_declaring(class, context, owner, name, descriptor, diagnostics)
	}

	fn find_declaring(&self, class: &ClassName, context: &str, owner: &ClassName, name: &str, descriptor: &str, diagnostics: &Diagnostics) -> Result<Option<CallTarget>> {
		let Some(summary) = self.catalog.resolve(owner)? else { return Ok(None) };
		if summary.has_non_private_method(name, descriptor) {
			return Ok(Some(CallTarget { owner: owner.clone(), is_interface: summary.is_interface }));
		}

		let mut found = BTreeSet::new();
		for parent in summary.super_class.iter().chain(&summary.interfaces) {
			if let Some(target) = self.find_declaring(class, context, parent, name, descriptor, diagnostics)? {
				found.insert(target);
			}
		}

		if found.len() > 1 {
			let owners: Vec<&str> = found.iter().map(|target| target.owner.as_str()).collect();
			diagnostics.report(DiagnosticKind::AmbiguousWidening, class, format!(
				"{context}: Ambiguous method call: Could not track overridden owner for {owner} {name}{descriptor}, multiple matching: {}",
				owners.join(", "),
			));
			return Ok(None);
		}
		Ok(found.pop_first())
	}
}

impl ClassLookup for SymbolTable<'_> {
	fn resolve(&self, name: &ClassName) -> Result<Option<Arc<ClassSummary>>> {
		self.catalog.resolve(name)
	}
}

/// Walks all references of one class.
///
/// The `report_*` methods return `true` if something was missing, so that the checks depending on it can be skipped.
struct Checker<'t, 'a> {
	table: &'t SymbolTable<'a>,
	class: &'t ClassName,
	diagnostics: &'t Diagnostics,
	failed: bool,
}

impl Checker<'_, '_> {
	fn report(&mut self, message: String) {
		self.failed = true;
		self.diagnostics.report(DiagnosticKind::MissingSymbol, self.class, message);
	}

	fn check_class(&mut self, class: &ClassFile) -> Result<()> {
		for name in class.super_class.iter().chain(&class.interfaces) {
			self.report_class(name)?;
		}
		for name in class.permitted_subclasses.iter().flatten() {
			self.report_class(name)?;
		}
		self.check_annotations(&class.runtime_visible_annotations, &class.runtime_invisible_annotations)?;
		self.check_type_annotations(&class.runtime_visible_type_annotations, &class.runtime_invisible_type_annotations)?;

		for field in &class.fields {
			if self.report_descriptor(field.descriptor.as_str())? {
				continue;
			}
			self.check_annotations(&field.runtime_visible_annotations, &field.runtime_invisible_annotations)?;
			self.check_type_annotations(&field.runtime_visible_type_annotations, &field.runtime_invisible_type_annotations)?;
		}

		for method in &class.methods {
			if self.report_method_descriptor(method.descriptor.as_str())? {
				continue;
			}
			for exception in method.exceptions.iter().flatten() {
				self.report_class(exception)?;
			}
			self.check_annotations(&method.runtime_visible_annotations, &method.runtime_invisible_annotations)?;
			self.check_type_annotations(&method.runtime_visible_type_annotations, &method.runtime_invisible_type_annotations)?;
			for parameter in method.runtime_visible_parameter_annotations.iter().chain(&method.runtime_invisible_parameter_annotations).flatten() {
				self.check_annotations(parameter, &[])?;
			}
			if let Some(value) = &method.annotation_default {
				self.check_element_value(value)?;
			}

			let Some(code) = &method.code else { continue };
			for entry in &code.instructions {
				self.check_instruction(&entry.instruction)
					.with_context(|| anyhow!("in method {}{}", method.name, method.descriptor))?;
			}
			for exception in &code.exception_table {
				if let Some(catch) = &exception.catch {
					self.report_class(catch)?;
				}
			}
			for lv in code.local_variables.iter().flatten() {
				if let Some(descriptor) = &lv.descriptor {
					self.report_descriptor(descriptor.as_str())?;
				}
			}
		}
		Ok(())
	}

	fn check_instruction(&mut self, instruction: &Instruction) -> Result<()> {
		match instruction {
			Instruction::New(class) | Instruction::ANewArray(class) | Instruction::CheckCast(class) | Instruction::InstanceOf(class) => {
				self.report_class(class)?;
			},
			Instruction::MultiANewArray(class, _) => {
				self.report_descriptor(class.as_str())?;
			},
			Instruction::GetStatic(field) | Instruction::PutStatic(field) | Instruction::GetField(field) | Instruction::PutField(field) => {
				self.report_field(&field.class, field.name.as_str(), field.desc.as_str())?;
			},
			Instruction::InvokeVirtual(method) | Instruction::InvokeSpecial(method, _) | Instruction::InvokeStatic(method, _) | Instruction::InvokeInterface(method) => {
				self.report_method(&method.class, method.name.as_str(), method.desc.as_str())?;
			},
			Instruction::InvokeDynamic(indy) => {
				if !self.report_handle(&indy.handle)? {
					for argument in &indy.arguments {
						self.report_argument(argument)?;
					}
				}
			},
			Instruction::Ldc(loadable) => {
				self.report_argument(loadable)?;
			},
			_ => {},
		}
		Ok(())
	}

	fn check_annotations(&mut self, visible: &[Annotation], invisible: &[Annotation]) -> Result<()> {
		for annotation in visible.iter().chain(invisible) {
			self.check_annotation(annotation)?;
		}
		Ok(())
	}

	fn check_type_annotations(&mut self, visible: &[TypeAnnotation], invisible: &[TypeAnnotation]) -> Result<()> {
		for type_annotation in visible.iter().chain(invisible) {
			self.check_annotation(&type_annotation.annotation)?;
		}
		Ok(())
	}

	fn check_annotation(&mut self, annotation: &Annotation) -> Result<()> {
		if self.report_descriptor(annotation.annotation_type.as_str())? {
			return Ok(());
		}
		for pair in &annotation.element_value_pairs {
			self.check_element_value(&pair.value)?;
		}
		Ok(())
	}

	fn check_element_value(&mut self, value: &ElementValue) -> Result<()> {
		match value {
			ElementValue::Enum { type_name, .. } => {
				self.report_descriptor(type_name.as_str())?;
			},
			ElementValue::AnnotationInterface(annotation) => self.check_annotation(annotation)?,
			ElementValue::ArrayType(values) => {
				for value in values {
					self.check_element_value(value)?;
				}
			},
			ElementValue::Object(_) | ElementValue::Class(_) => {},
		}
		Ok(())
	}

	fn report_class(&mut self, name: &ClassName) -> Result<bool> {
		if self.table.missing_class(name)? {
			self.report(format!("Class not found in java {}: {name}", self.table.release));
			return Ok(true);
		}
		Ok(false)
	}

	/// Reports a field descriptor, or the internal name of an array class.
	fn report_descriptor(&mut self, descriptor: &str) -> Result<bool> {
		let missing = match descriptor.strip_prefix('L').and_then(|rest| rest.strip_suffix(';')) {
			Some(name) => self.table.missing_class(&ClassName::from(name))?,
			None if descriptor.starts_with('[') => self.table.missing_class(&ClassName::from(descriptor))?,
			None => false,
		};
		if missing {
			self.report(format!("Type not found in java {}: {descriptor}", self.table.release));
		}
		Ok(missing)
	}

	fn report_method_descriptor(&mut self, descriptor: &str) -> Result<bool> {
		for name in class_names_in(descriptor) {
			if self.table.missing_class(&name)? {
				self.report(format!("Descriptor not found in java {}: {descriptor}", self.table.release));
				return Ok(true);
			}
		}
		Ok(false)
	}

	fn report_field(&mut self, owner: &ClassName, name: &str, descriptor: &str) -> Result<bool> {
		if self.table.missing_field(owner, name, descriptor)? {
			self.report(format!("Field not found in java {}: {owner} {name} {descriptor}", self.table.release));
			return Ok(true);
		}
		Ok(false)
	}

	fn report_method(&mut self, owner: &ClassName, name: &str, descriptor: &str) -> Result<bool> {
		if self.table.missing_method(owner, name, descriptor)? {
			self.report(format!("Method not found in java {}: {owner} {name} {descriptor}", self.table.release));
			return Ok(true);
		}
		Ok(false)
	}

	fn report_handle(&mut self, handle: &Handle) -> Result<bool> {
		match handle {
			Handle::GetField(_) | Handle::GetStatic(_) | Handle::PutField(_) | Handle::PutStatic(_) =>
				self.report_field(handle.owner(), handle.name(), handle.desc()),
			_ => self.report_method(handle.owner(), handle.name(), handle.desc()),
		}
	}

	fn report_argument(&mut self, argument: &Loadable) -> Result<bool> {
		match argument {
			Loadable::Class(class) => self.report_class(class),
			Loadable::MethodHandle(handle) => self.report_handle(handle),
			Loadable::MethodType(descriptor) => self.report_method_descriptor(descriptor.as_str()),
			Loadable::Dynamic(dynamic) => {
				if self.report_method_descriptor(dynamic.descriptor.as_str())? || self.report_handle(&dynamic.handle)? {
					return Ok(true);
				}
				for argument in &dynamic.arguments {
					if self.report_argument(argument)? {
						return Ok(true);
					}
				}
				Ok(false)
			},
			_ => Ok(false),
		}
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use duke::tree::class::{ClassAccess, ClassFile, ClassName};
	use duke::tree::method::{Method, MethodAccess};
	use duke::tree::method::code::{Instruction, LvIndex};
	use duke::tree::version::Version;
	use dukebox::{BasicFileAttributes, Jar, JarWriter, MemJar};
	use crate::codegen::method_ref;
	use crate::diagnostics::{DiagnosticKind, Diagnostics};
	use crate::lookup::{ClassLookup, MemoryLookup};
	use crate::passes::testing::{class, method};
	use crate::release::Release;
	use crate::symbols::{CallTarget, CtSym, SymbolTable};

	fn api_class(name: &str, super_class: Option<&str>, interfaces: &[&str], methods: &[(&str, &str)]) -> ClassFile {
		let mut class = ClassFile::new(Version::V1_8, ClassAccess::from(0x0021), ClassName::from(name),
			super_class.map(ClassName::from), interfaces.iter().copied().map(ClassName::from).collect());
		for (name, desc) in methods {
			class.methods.push(Method::new(MethodAccess::from(0x0001), (*name).into(), (*desc).into()));
		}
		class
	}

	fn interface(name: &str, methods: &[(&str, &str)]) -> ClassFile {
		let mut class = api_class(name, Some("java/lang/Object"), &[], methods);
		class.access = ClassAccess::from(0x0601);
		class
	}

	/// A java 8 catalog, for a JDK that also has `java/lang/Module` and `Deque.reversed`.
	fn table() -> SymbolTable<'static> {
		let mut catalog = MemoryLookup::new();
		catalog.add_class(&api_class("java/lang/Object", None, &[], &[("toString", "()Ljava/lang/String;"), ("hashCode", "()I")]));
		catalog.add_class(&api_class("java/lang/String", Some("java/lang/Object"), &[], &[("length", "()I")]));
		catalog.add_class(&api_class("java/util/AbstractMap", Some("java/lang/Object"), &[], &[("toString", "()Ljava/lang/String;")]));
		catalog.add_class(&api_class("java/util/HashMap", Some("java/util/AbstractMap"), &[], &[]));
		catalog.add_class(&interface("java/util/Collection", &[("size", "()I")]));
		catalog.add_class(&interface("java/util/Deque", &[("size", "()I")]));
		catalog.add_class(&interface("java/util/Queue", &[("size", "()I")]));
		catalog.add_class(&api_class("java/util/ArrayDeque", Some("java/lang/Object"), &["java/util/Deque", "java/util/Queue"], &[]));

		let inventory = ["java/lang/Object", "java/lang/String", "java/lang/Module", "java/util/AbstractMap", "java/util/HashMap",
			"java/util/Collection", "java/util/Deque", "java/util/Queue", "java/util/ArrayDeque", "java/util/SequencedCollection"];
		SymbolTable::new(Release::JAVA_8, inventory.map(ClassName::from), catalog)
	}

	#[test]
	fn missing_references_are_reported() {
		let table = table();
		let diagnostics = Diagnostics::new();

		let mut class = class("a/User", Version::V1_8);
		class.methods.push(method(0x0009, "run", "(Ljava/lang/Module;)I", vec![Instruction::IConst0, Instruction::IReturn]));
		class.methods.push(method(0x0009, "measure", "(Ljava/lang/String;)I", vec![
			Instruction::ALoad(LvIndex { index: 0 }),
			Instruction::InvokeVirtual(method_ref("java/lang/String", "strip", "()Ljava/lang/String;")),
			Instruction::InvokeVirtual(method_ref("java/lang/String", "length", "()I")),
			Instruction::IReturn,
		]));

		assert!(!table.check(&class, &diagnostics).unwrap());
		let messages: Vec<String> = diagnostics.findings().into_iter().map(|finding| finding.message).collect();
		assert_eq!(messages, vec![
			"Descriptor not found in java 8: (Ljava/lang/Module;)I".to_owned(),
			"Method not found in java 8: java/lang/String strip ()Ljava/lang/String;".to_owned(),
		]);
	}

	#[test]
	fn known_and_foreign_references_pass() {
		let table = table();
		let diagnostics = Diagnostics::new();

		let mut class = class("a/User", Version::V1_8);
		class.methods.push(method(0x0009, "show", "(Ljava/util/HashMap;La/Other;)Ljava/lang/String;", vec![
			Instruction::ALoad(LvIndex { index: 1 }),
			Instruction::InvokeVirtual(method_ref("a/Other", "fancy", "()V")),
			Instruction::ALoad(LvIndex { index: 0 }),
			// declared in a super class
			Instruction::InvokeVirtual(method_ref("java/util/HashMap", "toString", "()Ljava/lang/String;")),
			Instruction::AReturn,
		]));

		assert!(table.check(&class, &diagnostics).unwrap());
		assert!(diagnostics.findings().is_empty());
	}

	#[test]
	fn widening() {
		let table = table();
		let diagnostics = Diagnostics::new();
		let class = ClassName::from("a/User");

		let found = table.widen_call(&class, "a/User.run()V", &ClassName::from("java/util/HashMap"), "toString", "()Ljava/lang/String;", &diagnostics).unwrap();
		assert_eq!(found, Some(CallTarget { owner: ClassName::from("java/util/AbstractMap"), is_interface: false }));

		let not_in_jdk = table.widen_call(&class, "a/User.run()V", &ClassName::from("a/Other"), "toString", "()Ljava/lang/String;", &diagnostics).unwrap();
		assert_eq!(not_in_jdk, None);

		let ambiguous = table.widen_call(&class, "a/User.run()V", &ClassName::from("java/util/ArrayDeque"), "size", "()I", &diagnostics).unwrap();
		assert_eq!(ambiguous, None);
		let findings = diagnostics.findings();
		assert_eq!(findings.len(), 1);
		assert_eq!(findings[0].kind, DiagnosticKind::AmbiguousWidening);
		assert_eq!(findings[0].message, "a/User.run()V: Ambiguous method call: Could not track overridden owner for java/util/ArrayDeque size()I, multiple matching: java/util/Deque, java/util/Queue");
	}

	#[test]
	fn ct_sym_layout() {
		let object = duke::write_class_to_vec(&api_class("java/lang/Object", None, &[], &[("hashCode", "()I")]), duke::WriterOptions::default(), &duke::ObjectOnly).unwrap();
		let module = duke::write_class_to_vec(&api_class("java/lang/Module", Some("java/lang/Object"), &[], &[]), duke::WriterOptions::default(), &duke::ObjectOnly).unwrap();

		let mut writer = JarWriter::new(std::io::Cursor::new(Vec::new()));
		writer.write_file("789ABC/java.base/java/lang/Object.sig", &object, BasicFileAttributes::default()).unwrap();
		writer.write_file("9ABC/java.base/java/lang/Module.sig", &module, BasicFileAttributes::default()).unwrap();
		let data = writer.finish().unwrap().into_inner();

		let jar = MemJar::new("ct.sym".to_owned(), data);
		let ct_sym = CtSym::new(jar.open().unwrap(), Release::JAVA_8);
		assert_eq!(ct_sym.len(), 1);
		let object = ct_sym.resolve(&ClassName::JAVA_LANG_OBJECT).unwrap().unwrap();
		assert!(object.has_method("hashCode", "()I"));
		assert!(ct_sym.resolve(&ClassName::from("java/lang/Module")).unwrap().is_none());

		let ct_sym = CtSym::new(jar.open().unwrap(), Release::JAVA_9);
		assert_eq!(ct_sym.len(), 2);
	}
}
