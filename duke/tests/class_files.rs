use anyhow::Result;
use pretty_assertions::assert_eq;
use duke::{ObjectOnly, WriterOptions};
use duke::tree::class::{ClassAccess, ClassFile, ClassName};
use duke::tree::field::{Field, FieldAccess, FieldDescriptor, FieldName};
use duke::tree::method::{Method, MethodAccess, MethodDescriptor, MethodName, MethodRef};
use duke::tree::method::code::{Code, Instruction, InstructionListEntry, Label, LvIndex};
use duke::tree::version::Version;

fn method_with_code(access: u16, name: &str, descriptor: &str, instructions: Vec<InstructionListEntry>) -> Method {
	let mut method = Method::new(MethodAccess::from(access), MethodName::from(name), MethodDescriptor::from(descriptor));
	method.code = Some(Code {
		instructions,
		..Code::default()
	});
	method
}

/// ```java
/// public class Counter {
///     private int count;
///
///     static int sum(int x) {
///         int sum = 0;
///         while (x > 0) {
///             sum += x;
///             x--;
///         }
///         return sum;
///     }
/// }
/// ```
fn counter_class() -> ClassFile {
	let mut class = ClassFile::new(
		Version::V1_8,
		ClassAccess::from(0x0021),
		ClassName::from("org/example/Counter"),
		Some(ClassName::JAVA_LANG_OBJECT),
		Vec::new(),
	);

	class.fields.push(Field::new(FieldAccess::from(0x0002), FieldName::from("count"), FieldDescriptor::from("I")));

	class.methods.push(method_with_code(0x0001, "<init>", "()V", vec![
		Instruction::ALoad(LvIndex { index: 0 }).into(),
		Instruction::InvokeSpecial(MethodRef {
			class: ClassName::JAVA_LANG_OBJECT,
			name: MethodName::INIT,
			desc: MethodDescriptor::from("()V"),
		}, false).into(),
		Instruction::Return.into(),
	]));

	let head = Label::new(0);
	let end = Label::new(1);
	class.methods.push(method_with_code(0x0008, "sum", "(I)I", vec![
		Instruction::IConst0.into(),
		Instruction::IStore(LvIndex { index: 1 }).into(),
		InstructionListEntry { label: Some(head), instruction: Instruction::ILoad(LvIndex { index: 0 }) },
		Instruction::IfLe(end).into(),
		Instruction::ILoad(LvIndex { index: 1 }).into(),
		Instruction::ILoad(LvIndex { index: 0 }).into(),
		Instruction::IAdd.into(),
		Instruction::IStore(LvIndex { index: 1 }).into(),
		Instruction::IInc(LvIndex { index: 0 }, -1).into(),
		Instruction::Goto(head).into(),
		InstructionListEntry { label: Some(end), instruction: Instruction::ILoad(LvIndex { index: 1 }) },
		Instruction::IReturn.into(),
	]));

	class
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
	haystack.windows(needle.len()).any(|window| window == needle)
}

#[test]
fn write_and_read_back() -> Result<()> {
	let class = counter_class();
	let bytes = duke::write_class_to_vec(&class, WriterOptions::default(), &ObjectOnly)?;

	assert_eq!(&bytes[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
	assert!(contains(&bytes, b"StackMapTable"));

	let read = duke::read_class_from_slice(&bytes)?;
	assert_eq!(read.name, class.name);
	assert_eq!(read.super_class, class.super_class);
	assert_eq!(read.fields.len(), 1);
	assert_eq!(read.fields[0].name, FieldName::from("count"));
	assert_eq!(read.methods.len(), 2);

	let init = read.method(&MethodName::INIT, &MethodDescriptor::from("()V")).unwrap();
	let init_code = init.code.as_ref().unwrap();
	assert_eq!(init_code.max_stack, Some(1));
	assert_eq!(init_code.max_locals, Some(1));

	let sum = read.method(&MethodName::from("sum"), &MethodDescriptor::from("(I)I")).unwrap();
	let sum_code = sum.code.as_ref().unwrap();
	assert_eq!(sum_code.max_stack, Some(2));
	assert_eq!(sum_code.max_locals, Some(2));
	assert_eq!(sum_code.instructions.len(), 12);
	assert_eq!(sum_code.instructions[8].instruction, Instruction::IInc(LvIndex { index: 0 }, -1));

	// writing what we read again gives the same bytes
	let again = duke::write_class_to_vec(&read, WriterOptions::default(), &ObjectOnly)?;
	assert_eq!(again, bytes);

	Ok(())
}

#[test]
fn old_versions_have_no_frames() -> Result<()> {
	let mut class = counter_class();
	class.version = Version::new(49, 0);
	let bytes = duke::write_class_to_vec(&class, WriterOptions::default(), &ObjectOnly)?;

	assert!(!contains(&bytes, b"StackMapTable"));
	assert_eq!(&bytes[4..8], &[0, 0, 0, 49]);
	Ok(())
}

#[test]
fn unreachable_code_is_replaced() -> Result<()> {
	let mut class = ClassFile::new(Version::V1_8, ClassAccess::from(0x0021), ClassName::from("a/B"), Some(ClassName::JAVA_LANG_OBJECT), Vec::new());
	class.methods.push(method_with_code(0x0008, "f", "()V", vec![
		Instruction::Return.into(),
		Instruction::IConst1.into(),
		Instruction::Pop.into(),
		Instruction::Return.into(),
	]));

	let bytes = duke::write_class_to_vec(&class, WriterOptions::default(), &ObjectOnly)?;
	let read = duke::read_class_from_slice(&bytes)?;
	let code = read.methods[0].code.as_ref().unwrap();

	let instructions: Vec<_> = code.instructions.iter().map(|entry| entry.instruction.clone()).collect();
	assert_eq!(instructions, vec![
		Instruction::Return,
		Instruction::Nop,
		Instruction::Nop,
		Instruction::AThrow,
	]);
	assert_eq!(code.max_stack, Some(1));
	Ok(())
}
