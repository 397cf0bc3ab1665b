use anyhow::Result;
use pretty_assertions::assert_eq;
use duke::tree::class::ClassName;
use duke::tree::descriptor::{class_names_in, parse_field_descriptor, parse_method_descriptor, ArrayType, Type};
use duke::tree::field::FieldDescriptor;
use duke::tree::method::MethodDescriptor;

#[test]
fn valid_field_descriptors() {
	let valid_field_descriptors = [
		"B",
		"C",
		"D",
		"F",
		"I",
		"J",
		"Ljava/lang/Object;",
		"Lorg/example/MyClassName;",
		"S",
		"Z",
		"[[[D",
	];

	for i in valid_field_descriptors {
		assert!(parse_field_descriptor(i).is_ok(), "{i:?} is a valid field desc");
	}
}

#[test]
fn invalid_field_descriptors() {
	let invalid_field_descriptors = [
		"",
		"V",
		"L;",
		"Ljava/lang/Object",
		"[",
		"II",
		"[V",
	];

	for i in invalid_field_descriptors {
		assert!(parse_field_descriptor(i).is_err(), "{i:?} is an invalid field desc");
	}
}

#[test]
fn method_descriptors() -> Result<()> {
	let parsed = MethodDescriptor::from("(IJ[Ljava/lang/String;D)V").parse()?;
	assert_eq!(parsed.parameter_descriptors, vec![
		Type::I,
		Type::J,
		Type::Array(1, ArrayType::Object(ClassName::JAVA_LANG_STRING)),
		Type::D,
	]);
	assert_eq!(parsed.return_descriptor, None);
	assert_eq!(parsed.arguments_size(true), 6);
	assert_eq!(parsed.arguments_size(false), 7);
	assert_eq!(parsed.write(), MethodDescriptor::from("(IJ[Ljava/lang/String;D)V"));

	assert!(parse_method_descriptor("()").is_err());
	assert!(parse_method_descriptor("(V)V").is_err());
	assert!(parse_method_descriptor("()VV").is_err());
	Ok(())
}

#[test]
fn field_descriptor_types() -> Result<()> {
	assert_eq!(FieldDescriptor::from("J").parse()?.size(), 2);
	assert_eq!(FieldDescriptor::from("[J").parse()?.size(), 1);
	assert_eq!(FieldDescriptor::from("Ljava/lang/Object;").parse()?.internal_name(), Some(ClassName::JAVA_LANG_OBJECT));
	Ok(())
}

#[test]
fn class_names() {
	assert_eq!(
		class_names_in("(Ljava/lang/String;I[Lorg/example/Foo;)Ljava/lang/Object;"),
		vec![
			ClassName::JAVA_LANG_STRING,
			ClassName::from("org/example/Foo"),
			ClassName::JAVA_LANG_OBJECT,
		]
	);
	assert_eq!(class_names_in("(IJ)V"), Vec::<ClassName>::new());
}
