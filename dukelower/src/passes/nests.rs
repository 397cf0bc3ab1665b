use anyhow::Result;
use duke::tree::class::ClassFile;

/// Makes private members of a nest member or host package private, and drops the nest attributes.
///
/// Before java 11, nest mates can't access each others private members. Nest mates are always in the same package.
pub(crate) fn nest_host_to_package(class: &mut ClassFile) -> Result<bool> {
	if class.nest_host_class.is_none() && class.nest_members.is_none() {
		return Ok(false);
	}
	class.nest_host_class = None;
	class.nest_members = None;

	for field in &mut class.fields {
		field.access.is_private = false;
	}
	for method in &mut class.methods {
		method.access.is_private = false;
	}
	Ok(true)
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use duke::tree::class::ClassName;
	use duke::tree::field::{Field, FieldAccess};
	use duke::tree::method::code::Instruction;
	use duke::tree::version::Version;
	use crate::passes::nests::nest_host_to_package;
	use crate::passes::testing::{class, method};

	#[test]
	fn nest_members_open_up() {
		let mut class = class("a/Outer$Inner", Version::V11);
		class.nest_host_class = Some(ClassName::from("a/Outer"));
		class.fields.push(Field::new(FieldAccess::from(0x0002), "secret".into(), "I".into()));
		class.methods.push(method(0x000a, "helper", "()V", vec![Instruction::Return]));

		assert!(nest_host_to_package(&mut class).unwrap());
		assert_eq!(class.nest_host_class, None);
		assert!(!class.fields[0].access.is_private);
		assert!(!class.methods[0].access.is_private);
		assert!(class.methods[0].access.is_static);
	}

	#[test]
	fn classes_outside_a_nest_stay() {
		let mut class = class("a/Alone", Version::V11);
		class.methods.push(method(0x0002, "helper", "()V", vec![Instruction::Return]));
		assert!(!nest_host_to_package(&mut class).unwrap());
		assert!(class.methods[0].access.is_private);
	}
}
