use anyhow::Result;
use duke::tree::class::ClassFile;

/// Drops the `Module`, `ModulePackages` and `ModuleMainClass` attributes.
pub(crate) fn remove_module(class: &mut ClassFile) -> Result<bool> {
	let module = class.module.take();
	let packages = class.module_packages.take();
	let main_class = class.module_main_class.take();
	Ok(module.is_some() || packages.is_some() || main_class.is_some())
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use duke::tree::class::ClassName;
	use duke::tree::version::Version;
	use crate::passes::modules::remove_module;
	use crate::passes::testing::class;

	#[test]
	fn module_attributes_go() {
		let mut class = class("module-info", Version::V9);
		class.module_main_class = Some(ClassName::from("a/Main"));
		assert!(remove_module(&mut class).unwrap());
		assert_eq!(class.module_main_class, None);
		assert!(!remove_module(&mut class).unwrap());
	}
}
