use crate::macros::{make_access_flags, make_string_like};
use crate::tree::annotation::Annotation;
use crate::tree::attribute::Attribute;
use crate::tree::field::Field;
use crate::tree::method::{Method, MethodDescriptor, MethodName, MethodNameAndDesc};
use crate::tree::module::{Module, PackageName};
use crate::tree::names::is_valid_class_name;
use crate::tree::record::RecordComponent;
use crate::tree::type_annotation::TypeAnnotation;
use crate::tree::version::Version;

/// Represents a class file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
	pub version: Version,
	pub access: ClassAccess,
	pub name: ClassName,
	/// The super class, only [`None`] for `java/lang/Object` and `module-info`.
	pub super_class: Option<ClassName>,
	pub interfaces: Vec<ClassName>,

	pub fields: Vec<Field>,
	pub methods: Vec<Method>,

	pub has_deprecated_attribute: bool,
	pub has_synthetic_attribute: bool,

	pub inner_classes: Option<Vec<InnerClass>>,
	pub enclosing_method: Option<EnclosingMethod>,
	pub signature: Option<ClassSignature>,

	pub source_file: Option<String>,
	/// The raw contents of the `SourceDebugExtension` attribute.
	pub source_debug_extension: Option<Vec<u8>>,

	pub runtime_visible_annotations: Vec<Annotation>,
	pub runtime_invisible_annotations: Vec<Annotation>,
	pub runtime_visible_type_annotations: Vec<TypeAnnotation>,
	pub runtime_invisible_type_annotations: Vec<TypeAnnotation>,

	pub module: Option<Module>,
	pub module_packages: Option<Vec<PackageName>>,
	pub module_main_class: Option<ClassName>,

	pub nest_host_class: Option<ClassName>,
	pub nest_members: Option<Vec<ClassName>>,
	pub permitted_subclasses: Option<Vec<ClassName>>,

	/// The components of the `Record` attribute, [`None`] if there's no such attribute.
	pub record_components: Option<Vec<RecordComponent>>,

	/// All attributes not represented by any other field.
	pub attributes: Vec<Attribute>,
}

impl ClassFile {
	pub fn new(version: Version, access: ClassAccess, name: ClassName, super_class: Option<ClassName>, interfaces: Vec<ClassName>) -> ClassFile {
		ClassFile {
			version,
			access,
			name,
			super_class,
			interfaces,

			fields: Vec::new(),
			methods: Vec::new(),

			has_deprecated_attribute: false,
			has_synthetic_attribute: false,

			inner_classes: None,
			enclosing_method: None,
			signature: None,

			source_file: None,
			source_debug_extension: None,

			runtime_visible_annotations: Vec::new(),
			runtime_invisible_annotations: Vec::new(),
			runtime_visible_type_annotations: Vec::new(),
			runtime_invisible_type_annotations: Vec::new(),

			module: None,
			module_packages: None,
			module_main_class: None,

			nest_host_class: None,
			nest_members: None,
			permitted_subclasses: None,

			record_components: None,

			attributes: Vec::new(),
		}
	}

	/// A class is a record if it directly extends `java/lang/Record`.
	pub fn is_record(&self) -> bool {
		self.super_class.as_ref().is_some_and(|super_class| *super_class == ClassName::JAVA_LANG_RECORD)
	}

	pub fn method(&self, name: &MethodName, desc: &MethodDescriptor) -> Option<&Method> {
		self.methods.iter().find(|method| method.name == *name && method.descriptor == *desc)
	}

	pub fn method_mut(&mut self, name: &MethodName, desc: &MethodDescriptor) -> Option<&mut Method> {
		self.methods.iter_mut().find(|method| method.name == *name && method.descriptor == *desc)
	}
}

make_access_flags!(
	pub ClassAccess {
		is_public     = 0x0001, "public";
		is_final      = 0x0010, "final";
		is_super      = 0x0020, "super";
		is_interface  = 0x0200, "interface";
		is_abstract   = 0x0400, "abstract";
		is_synthetic  = 0x1000, "synthetic";
		is_annotation = 0x2000, "annotation";
		is_enum       = 0x4000, "enum";
		is_module     = 0x8000, "module";
	}
);

make_string_like!(
	/// The internal name of a class, like `java/lang/Object`, or of an array class, like `[I`.
	pub ClassName;
	check = is_valid_class_name;
);

impl ClassName {
	pub const JAVA_LANG_OBJECT: ClassName = ClassName::from_static("java/lang/Object");
	pub const JAVA_LANG_STRING: ClassName = ClassName::from_static("java/lang/String");
	pub const JAVA_LANG_CLASS: ClassName = ClassName::from_static("java/lang/Class");
	pub const JAVA_LANG_THROWABLE: ClassName = ClassName::from_static("java/lang/Throwable");
	pub const JAVA_LANG_RECORD: ClassName = ClassName::from_static("java/lang/Record");
	pub const JAVA_LANG_INVOKE_METHOD_HANDLE: ClassName = ClassName::from_static("java/lang/invoke/MethodHandle");
	pub const JAVA_LANG_INVOKE_METHOD_TYPE: ClassName = ClassName::from_static("java/lang/invoke/MethodType");

	/// Returns the package part of the name, without the trailing `/`, or [`None`] for the default package.
	pub fn package(&self) -> Option<&str> {
		self.as_str().rsplit_once('/').map(|(package, _)| package)
	}

	/// Returns the class name with `.` instead of `/`.
	pub fn to_binary_name(&self) -> String {
		self.as_str().replace('/', ".")
	}
}

make_string_like!(
	pub ClassSignature;
);

#[derive(Debug, Clone, PartialEq)]
pub struct InnerClass {
	pub inner_class: ClassName,
	pub outer_class: Option<ClassName>,
	pub inner_name: Option<String>,
	pub flags: InnerClassFlags,
}

make_access_flags!(
	pub InnerClassFlags {
		is_public     = 0x0001, "public";
		is_private    = 0x0002, "private";
		is_protected  = 0x0004, "protected";
		is_static     = 0x0008, "static";
		is_final      = 0x0010, "final";
		is_interface  = 0x0200, "interface";
		is_abstract   = 0x0400, "abstract";
		is_synthetic  = 0x1000, "synthetic";
		is_annotation = 0x2000, "annotation";
		is_enum       = 0x4000, "enum";
	}
);

#[derive(Debug, Clone, PartialEq)]
pub struct EnclosingMethod {
	pub class: ClassName,
	pub method: Option<MethodNameAndDesc>,
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::tree::class::{ClassAccess, ClassName};

	#[test]
	fn access_round_trip() {
		let access = ClassAccess::from(0x0421);
		assert!(access.is_public && access.is_super && access.is_abstract);
		assert!(!access.is_interface);
		assert_eq!(u16::from(access), 0x0421);
		assert_eq!(format!("{access:?}"), "ClassAccess { public super abstract }");
	}

	#[test]
	fn names() {
		assert_eq!(ClassName::from("a/b/C").package(), Some("a/b"));
		assert_eq!(ClassName::from("C").package(), None);
		assert_eq!(ClassName::from("a/b/C").to_binary_name(), "a.b.C");
		assert!(ClassName::checked("a//C".to_owned()).is_err());
		assert_eq!(ClassName::JAVA_LANG_OBJECT, "java/lang/Object");
	}
}
