use anyhow::Result;
use duke::tree::class::ClassFile;

/// Drops the `PermittedSubclasses` attribute, as there are no sealed classes before java 17.
pub(crate) fn unseal(class: &mut ClassFile) -> Result<bool> {
	Ok(class.permitted_subclasses.take().is_some())
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use duke::tree::class::ClassName;
	use duke::tree::version::Version;
	use crate::passes::sealed::unseal;
	use crate::passes::testing::class;

	#[test]
	fn permitted_subclasses_go() {
		let mut class = class("a/Shape", Version::V17);
		class.permitted_subclasses = Some(vec![ClassName::from("a/Circle"), ClassName::from("a/Square")]);
		assert!(unseal(&mut class).unwrap());
		assert_eq!(class.permitted_subclasses, None);
		assert!(!unseal(&mut class).unwrap());
	}
}
