//! The in-memory model of a class file.

pub mod class;
pub mod field;
pub mod method;
pub mod attribute;
pub mod version;
pub mod module;
pub mod annotation;
pub mod descriptor;
pub mod record;
pub mod type_annotation;

mod names {
	/// Checks if a class name is valid according to JVMS 4.2.1 (also accepting array class names).
	pub(crate) fn is_valid_class_name(x: &str) -> bool {
		if let Some(rest) = x.strip_prefix('[') {
			// array class names are field descriptors
			crate::tree::descriptor::parse_field_descriptor(&format!("[{rest}")).is_ok()
		} else {
			// a list of identifiers split by /, each identifier must be an unqualified name
			x.split('/').all(is_valid_unqualified_name)
		}
	}

	/// Checks if a name is an unqualified name according to JVMS 4.2.2
	///
	/// This is used for field names, formal parameter names, local variable names.
	pub(crate) fn is_valid_unqualified_name(x: &str) -> bool {
		!x.is_empty() && x.chars().all(|c| !matches!(c, '.' | ';' | '[' | '/'))
	}

	/// Checks if a method name is valid according to JVMS 4.2.2
	pub(crate) fn is_valid_method_name(x: &str) -> bool {
		x == "<init>" || x == "<clinit>" || (
			!x.is_empty() && x.chars().all(|c| !matches!(c, '.' | ';' | '[' | '/' | '<' | '>'))
		)
	}

}
