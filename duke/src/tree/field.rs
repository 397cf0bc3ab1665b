use java_string::JavaString;
use crate::macros::{make_access_flags, make_string_like};
use crate::tree::annotation::Annotation;
use crate::tree::attribute::Attribute;
use crate::tree::class::ClassName;
use crate::tree::names::is_valid_unqualified_name;
use crate::tree::type_annotation::TypeAnnotation;

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
	pub access: FieldAccess,
	pub name: FieldName,
	pub descriptor: FieldDescriptor,

	pub has_deprecated_attribute: bool,
	pub has_synthetic_attribute: bool,

	pub constant_value: Option<ConstantValue>,
	pub signature: Option<FieldSignature>,

	pub runtime_visible_annotations: Vec<Annotation>,
	pub runtime_invisible_annotations: Vec<Annotation>,
	pub runtime_visible_type_annotations: Vec<TypeAnnotation>,
	pub runtime_invisible_type_annotations: Vec<TypeAnnotation>,

	pub attributes: Vec<Attribute>,
}

impl Field {
	pub fn new(access: FieldAccess, name: FieldName, descriptor: FieldDescriptor) -> Field {
		Field {
			access,
			name,
			descriptor,

			has_deprecated_attribute: false,
			has_synthetic_attribute: false,

			constant_value: None,
			signature: None,

			runtime_visible_annotations: Vec::new(),
			runtime_invisible_annotations: Vec::new(),
			runtime_visible_type_annotations: Vec::new(),
			runtime_invisible_type_annotations: Vec::new(),

			attributes: Vec::new(),
		}
	}
}

make_access_flags!(
	pub FieldAccess {
		is_public    = 0x0001, "public";
		is_private   = 0x0002, "private";
		is_protected = 0x0004, "protected";
		is_static    = 0x0008, "static";
		is_final     = 0x0010, "final";
		is_volatile  = 0x0040, "volatile";
		is_transient = 0x0080, "transient";
		is_synthetic = 0x1000, "synthetic";
		is_enum      = 0x4000, "enum";
	}
);

/// The value of a `ConstantValue` attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
	Integer(i32),
	Float(f32),
	Long(i64),
	Double(f64),
	String(JavaString),
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldRef {
	pub class: ClassName,
	pub name: FieldName,
	pub desc: FieldDescriptor,
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldNameAndDesc {
	pub name: FieldName,
	pub desc: FieldDescriptor,
}

make_string_like!(
	pub FieldName;
	check = is_valid_unqualified_name;
);

make_string_like!(
	pub FieldDescriptor;
	check = is_valid_field_descriptor;
);

fn is_valid_field_descriptor(s: &str) -> bool {
	crate::tree::descriptor::parse_field_descriptor(s).is_ok()
}

make_string_like!(
	pub FieldSignature;
);
