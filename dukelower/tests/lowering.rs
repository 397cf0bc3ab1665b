use pretty_assertions::assert_eq;
use duke::{ObjectOnly, WriterOptions};
use duke::tree::class::{ClassAccess, ClassFile, ClassName};
use duke::tree::field::{Field, FieldAccess, FieldRef};
use duke::tree::method::{Method, MethodAccess, MethodRef};
use duke::tree::method::code::{Code, Handle, Instruction, InvokeDynamic, Loadable, LvIndex};
use duke::tree::record::RecordComponent;
use duke::tree::version::Version;
use dukelower::{ClassHierarchy, Converted, Converter, Diagnostics, MemoryLookup, Release};

const OBJECT_METHODS_BOOTSTRAP: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/TypeDescriptor;Ljava/lang/Class;Ljava/lang/String;[Ljava/lang/invoke/MethodHandle;)Ljava/lang/Object;";

fn method_ref(class: &str, name: &str, desc: &str) -> MethodRef {
	MethodRef { class: class.into(), name: name.into(), desc: desc.into() }
}

fn field_ref(class: &str, name: &str, desc: &str) -> FieldRef {
	FieldRef { class: class.into(), name: name.into(), desc: desc.into() }
}

fn method(access: u16, name: &str, desc: &str, instructions: Vec<Instruction>) -> Method {
	let mut method = Method::new(MethodAccess::from(access), name.into(), desc.into());
	method.code = Some(Code {
		instructions: instructions.into_iter().map(Into::into).collect(),
		..Code::default()
	});
	method
}

fn instructions(class: &ClassFile) -> impl Iterator<Item=&Instruction> {
	class.methods.iter()
		.filter_map(|method| method.code.as_ref())
		.flat_map(|code| &code.instructions)
		.map(|entry| &entry.instruction)
}

fn object_method(name: &str, desc: &str) -> Instruction {
	Instruction::InvokeDynamic(InvokeDynamic {
		name: name.into(),
		descriptor: desc.into(),
		handle: Handle::InvokeStatic(method_ref("java/lang/runtime/ObjectMethods", "bootstrap", OBJECT_METHODS_BOOTSTRAP), false),
		arguments: vec![
			Loadable::Class(ClassName::from("a/Point")),
			Loadable::string("x;name"),
			Loadable::MethodHandle(Handle::GetField(field_ref("a/Point", "x", "I"))),
			Loadable::MethodHandle(Handle::GetField(field_ref("a/Point", "name", "Ljava/lang/String;"))),
		],
	})
}

/// `record Point(int x, String name) {}`, as javac writes it.
fn point() -> ClassFile {
	let mut class = ClassFile::new(Version::V16, ClassAccess::from(0x0031), ClassName::from("a/Point"),
		Some(ClassName::JAVA_LANG_RECORD), Vec::new());
	class.record_components = Some(vec![
		RecordComponent::new("x".into(), "I".into()),
		RecordComponent::new("name".into(), "Ljava/lang/String;".into()),
	]);
	class.fields.push(Field::new(FieldAccess::from(0x0012), "x".into(), "I".into()));
	class.fields.push(Field::new(FieldAccess::from(0x0012), "name".into(), "Ljava/lang/String;".into()));

	class.methods.push(method(0x0001, "<init>", "(ILjava/lang/String;)V", vec![
		Instruction::ALoad(LvIndex { index: 0 }),
		Instruction::InvokeSpecial(method_ref("java/lang/Record", "<init>", "()V"), false),
		Instruction::ALoad(LvIndex { index: 0 }),
		Instruction::ILoad(LvIndex { index: 1 }),
		Instruction::PutField(field_ref("a/Point", "x", "I")),
		Instruction::ALoad(LvIndex { index: 0 }),
		Instruction::ALoad(LvIndex { index: 2 }),
		Instruction::PutField(field_ref("a/Point", "name", "Ljava/lang/String;")),
		Instruction::Return,
	]));
	class.methods.push(method(0x0011, "equals", "(Ljava/lang/Object;)Z", vec![
		Instruction::ALoad(LvIndex { index: 0 }),
		Instruction::ALoad(LvIndex { index: 1 }),
		object_method("equals", "(La/Point;Ljava/lang/Object;)Z"),
		Instruction::IReturn,
	]));
	class.methods.push(method(0x0011, "hashCode", "()I", vec![
		Instruction::ALoad(LvIndex { index: 0 }),
		object_method("hashCode", "(La/Point;)I"),
		Instruction::IReturn,
	]));
	class.methods.push(method(0x0011, "toString", "()Ljava/lang/String;", vec![
		Instruction::ALoad(LvIndex { index: 0 }),
		object_method("toString", "(La/Point;)Ljava/lang/String;"),
		Instruction::AReturn,
	]));
	class
}

fn rewritten(converted: Converted) -> ClassFile {
	let Converted::Rewritten { bytes, passed_check } = converted else {
		panic!("expected the class to be rewritten");
	};
	assert!(passed_check);
	duke::read_class_from_slice(&bytes).unwrap()
}

#[test]
fn records_become_classes() {
	let point = point();
	let bytes = duke::write_class_to_vec(&point, WriterOptions::default(), &ObjectOnly).unwrap();

	let diagnostics = Diagnostics::new();
	let mut lookup = MemoryLookup::new();
	lookup.add_class(&point);
	let hierarchy = ClassHierarchy::new(lookup, &diagnostics);
	let converter = Converter::new(Release::JAVA_8, &diagnostics);

	let class = rewritten(converter.convert_bytes(&bytes, &hierarchy).unwrap());

	assert_eq!(class.version, Version::V1_8);
	assert_eq!(class.super_class, Some(ClassName::JAVA_LANG_OBJECT));
	assert_eq!(class.record_components, None);
	assert_eq!(class.methods.len(), 4);
	assert!(class.methods.iter().all(|method| method.access.is_public));

	assert!(!instructions(&class).any(|instruction| matches!(instruction, Instruction::InvokeDynamic(_))));
	assert!(instructions(&class).any(|instruction| *instruction ==
		Instruction::InvokeSpecial(method_ref("java/lang/Object", "<init>", "()V"), false)));
	assert!(instructions(&class).any(|instruction| *instruction ==
		Instruction::InvokeStatic(method_ref("java/util/Objects", "equals", "(Ljava/lang/Object;Ljava/lang/Object;)Z"), false)));
}

#[test]
fn match_exceptions_become_runtime_exceptions() {
	let mut class = ClassFile::new(Version::V21, ClassAccess::from(0x0021), ClassName::from("a/Matcher"),
		Some(ClassName::JAVA_LANG_OBJECT), Vec::new());
	class.methods.push(method(0x0009, "fail", "()V", vec![
		Instruction::New(ClassName::from("java/lang/MatchException")),
		Instruction::Dup,
		Instruction::AConstNull,
		Instruction::AConstNull,
		Instruction::InvokeSpecial(method_ref("java/lang/MatchException", "<init>", "(Ljava/lang/String;Ljava/lang/Throwable;)V"), false),
		Instruction::AThrow,
	]));
	let bytes = duke::write_class_to_vec(&class, WriterOptions::default(), &ObjectOnly).unwrap();

	let diagnostics = Diagnostics::new();
	let converter = Converter::new(Release::JAVA_17, &diagnostics);
	let class = rewritten(converter.convert_bytes(&bytes, &ObjectOnly).unwrap());

	assert_eq!(class.version, Version::V17);
	assert_eq!(instructions(&class).next(), Some(&Instruction::New(ClassName::from("java/lang/RuntimeException"))));
	assert!(!instructions(&class).any(|instruction| match instruction {
		Instruction::New(class) => *class == "java/lang/MatchException",
		Instruction::InvokeSpecial(method, _) => method.class == "java/lang/MatchException",
		_ => false,
	}));
}

#[test]
fn classes_at_the_target_stay_untouched() {
	let bytes = duke::write_class_to_vec(&point(), WriterOptions::default(), &ObjectOnly).unwrap();

	let diagnostics = Diagnostics::new();
	let converter = Converter::new(Release::JAVA_16, &diagnostics);
	assert_eq!(converter.convert_bytes(&bytes, &ObjectOnly).unwrap(), Converted::Unchanged);
}
