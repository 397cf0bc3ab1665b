use anyhow::Result;
use duke::tree::class::ClassFile;

/// Drops all attributes the class reader didn't know, on the class, its fields, methods, code and record components.
///
/// Newer attributes might not be understood by an older java version, or reference things the other passes removed.
pub(crate) fn remove_attributes(class: &mut ClassFile) -> Result<bool> {
	let mut changed = !class.attributes.is_empty();
	class.attributes.clear();

	for field in &mut class.fields {
		changed |= !field.attributes.is_empty();
		field.attributes.clear();
	}
	for method in &mut class.methods {
		changed |= !method.attributes.is_empty();
		method.attributes.clear();
		if let Some(code) = &mut method.code {
			changed |= !code.attributes.is_empty();
			code.attributes.clear();
		}
	}
	for component in class.record_components.iter_mut().flatten() {
		changed |= !component.attributes.is_empty();
		component.attributes.clear();
	}
	Ok(changed)
}

#[cfg(test)]
mod testing {
	use duke::tree::attribute::Attribute;
	use duke::tree::method::code::Instruction;
	use duke::tree::version::Version;
	use crate::passes::attributes::remove_attributes;
	use crate::passes::testing::{class, method};

	#[test]
	fn unknown_attributes_go() {
		let mut class = class("a/Annotated", Version::V21);
		class.methods.push(method(0x0009, "run", "()V", vec![Instruction::Return]));
		class.attributes.push(Attribute { name: "Custom".to_owned(), bytes: vec![1, 2, 3] });
		if let Some(code) = &mut class.methods[0].code {
			code.attributes.push(Attribute { name: "CodeThing".to_owned(), bytes: Vec::new() });
		}

		assert!(remove_attributes(&mut class).unwrap());
		assert!(class.attributes.is_empty());
		assert!(class.methods[0].code.as_ref().unwrap().attributes.is_empty());
		assert!(!remove_attributes(&mut class).unwrap());
	}
}
