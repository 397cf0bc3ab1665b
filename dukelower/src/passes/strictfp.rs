use anyhow::Result;
use duke::tree::class::ClassFile;

/// Marks all non-abstract methods `strictfp`, since from java 17 on all floating point math is strict.
pub(crate) fn always_strict(class: &mut ClassFile) -> Result<bool> {
	let mut changed = false;
	for method in &mut class.methods {
		if !method.access.is_abstract && !method.access.is_strict {
			method.access.is_strict = true;
			changed = true;
		}
	}
	Ok(changed)
}

#[cfg(test)]
mod testing {
	use duke::tree::method::{Method, MethodAccess};
	use duke::tree::method::code::{Instruction, LvIndex};
	use duke::tree::version::Version;
	use crate::passes::strictfp::always_strict;
	use crate::passes::testing::{class, method};

	#[test]
	fn only_concrete_methods() {
		let mut class = class("a/Maths", Version::V17);
		class.methods.push(method(0x0009, "half", "(D)D", vec![Instruction::DLoad(LvIndex { index: 0 }), Instruction::DReturn]));
		class.methods.push(Method::new(MethodAccess::from(0x0401), "abstractly".into(), "()V".into()));

		assert!(always_strict(&mut class).unwrap());
		assert!(class.methods[0].access.is_strict);
		assert!(!class.methods[1].access.is_strict);

		assert!(!always_strict(&mut class).unwrap());
	}
}
