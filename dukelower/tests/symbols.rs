use std::io::Cursor;
use pretty_assertions::assert_eq;
use duke::{ObjectOnly, WriterOptions};
use duke::tree::class::{ClassAccess, ClassFile, ClassName};
use duke::tree::method::{Method, MethodAccess, MethodRef};
use duke::tree::method::code::{Code, Instruction, LvIndex};
use duke::tree::version::Version;
use dukebox::{BasicFileAttributes, Jar, JarWriter, MemJar};
use dukelower::{ChainedLookup, ClassHierarchy, ClassLookup, Converted, Converter, Diagnostic, DiagnosticKind, Diagnostics, JarLookup, MemoryLookup, Release, SymbolTable};

fn class(name: &str, access: u16, super_class: Option<&str>, interfaces: &[&str]) -> ClassFile {
	ClassFile::new(Version::V1_8, ClassAccess::from(access), ClassName::from(name),
		super_class.map(ClassName::from), interfaces.iter().copied().map(ClassName::from).collect())
}

fn method_ref(class: &str, name: &str, desc: &str) -> MethodRef {
	MethodRef { class: class.into(), name: name.into(), desc: desc.into() }
}

fn jar(prefix: &str, classes: &[ClassFile]) -> MemJar {
	let mut writer = JarWriter::new(Cursor::new(Vec::new()));
	for class in classes {
		let bytes = duke::write_class_to_vec(class, WriterOptions::default(), &ObjectOnly).unwrap();
		writer.write_file(&format!("{prefix}{}.class", class.name), &bytes, BasicFileAttributes::default()).unwrap();
	}
	MemJar::new("classes.jar", writer.finish().unwrap().into_inner())
}

/// `java/util/List` declares `size`, `java/util/ArrayList` only inherits it.
fn catalog() -> MemJar {
	let mut list = class("java/util/List", 0x0601, Some("java/lang/Object"), &[]);
	list.methods.push(Method::new(MethodAccess::from(0x0401), "size".into(), "()I".into()));
	jar("", &[
		class("java/lang/Object", 0x0021, None, &[]),
		list,
		class("java/util/ArrayList", 0x0021, Some("java/lang/Object"), &["java/util/List"]),
	])
}

#[test]
fn converted_classes_are_widened_and_checked() {
	let catalog = catalog();
	let inventory = ["java/lang/Object", "java/util/List", "java/util/ArrayList"].map(ClassName::from);
	let symbols = SymbolTable::new(Release::JAVA_8, inventory, JarLookup::new(catalog.open().unwrap()));

	let mut user = class("a/User", 0x0021, Some("java/lang/Object"), &[]);
	user.version = Version::V11;
	let mut method = Method::new(MethodAccess::from(0x0009), "count".into(), "(Ljava/util/ArrayList;)I".into());
	method.code = Some(Code {
		instructions: vec![
			Instruction::InvokeStatic(method_ref("java/util/List", "of", "()Ljava/util/List;"), true),
			Instruction::Pop,
			Instruction::ALoad(LvIndex { index: 0 }),
			Instruction::InvokeVirtual(method_ref("java/util/ArrayList", "size", "()I")),
			Instruction::IReturn,
		].into_iter().map(Into::into).collect(),
		..Code::default()
	});
	user.methods.push(method);
	let bytes = duke::write_class_to_vec(&user, WriterOptions::default(), &ObjectOnly).unwrap();

	let diagnostics = Diagnostics::new();
	let hierarchy = ClassHierarchy::new(ChainedLookup::new().with(&symbols), &diagnostics);
	let converter = Converter::new(Release::JAVA_8, &diagnostics).with_symbols(&symbols);

	let Converted::Rewritten { bytes, passed_check } = converter.convert_bytes(&bytes, &hierarchy).unwrap() else {
		panic!("expected the class to be rewritten");
	};
	assert!(!passed_check);

	let converted = duke::read_class_from_slice(&bytes).unwrap();
	let instructions: Vec<_> = converted.methods[0].code.iter()
		.flat_map(|code| &code.instructions)
		.map(|entry| entry.instruction.clone())
		.collect();
	assert_eq!(instructions, vec![
		Instruction::InvokeStatic(method_ref("java/util/List", "of", "()Ljava/util/List;"), true),
		Instruction::Pop,
		Instruction::ALoad(LvIndex { index: 0 }),
		Instruction::InvokeInterface(method_ref("java/util/List", "size", "()I")),
		Instruction::IReturn,
	]);

	assert_eq!(diagnostics.findings(), vec![
		Diagnostic {
			kind: DiagnosticKind::MissingSymbol,
			class: ClassName::from("a/User"),
			message: "Method not found in java 8: java/util/List of ()Ljava/util/List;".to_owned(),
		},
	]);
	assert!(diagnostics.has_missing_symbols());
}

#[test]
fn hierarchy_over_a_jmod_and_memory() {
	let base = class("a/Base", 0x0421, Some("java/lang/Object"), &[]);
	let jmod = jar("classes/", &[
		base,
		class("a/Left", 0x0021, Some("a/Base"), &[]),
		class("a/Shape", 0x0601, Some("java/lang/Object"), &[]),
	]);
	let opened = JarLookup::jmod(jmod.open().unwrap());
	assert!(opened.resolve(&ClassName::from("a/Left")).unwrap().is_some());
	assert!(opened.resolve(&ClassName::from("a/Missing")).unwrap().is_none());

	let mut memory = MemoryLookup::new();
	memory.add_class(&class("a/Right", 0x0021, Some("a/Base"), &[]));

	let diagnostics = Diagnostics::new();
	let hierarchy = ClassHierarchy::new(ChainedLookup::new().with(memory).with(opened), &diagnostics);

	let left = ClassName::from("a/Left");
	let right = ClassName::from("a/Right");
	assert_eq!(hierarchy.common_super_class(&left, &right).unwrap(), ClassName::from("a/Base"));
	assert_eq!(hierarchy.common_super_class(&left, &left).unwrap(), left);
	assert_eq!(hierarchy.common_super_class(&left, &ClassName::from("a/Shape")).unwrap(), ClassName::JAVA_LANG_OBJECT);
	assert!(diagnostics.findings().is_empty());

	assert_eq!(hierarchy.common_super_class(&left, &ClassName::from("a/Gone")).unwrap(), ClassName::JAVA_LANG_OBJECT);
	assert_eq!(diagnostics.count(DiagnosticKind::HierarchyLookup), 1);
}
