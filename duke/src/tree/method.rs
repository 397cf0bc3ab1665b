use crate::macros::{make_access_flags, make_string_like};
use crate::tree::annotation::{Annotation, ElementValue};
use crate::tree::attribute::Attribute;
use crate::tree::class::ClassName;
use crate::tree::method::code::Code;
use crate::tree::names::{is_valid_method_name, is_valid_unqualified_name};
use crate::tree::type_annotation::TypeAnnotation;

pub mod code;

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
	pub access: MethodAccess,
	pub name: MethodName,
	pub descriptor: MethodDescriptor,

	pub has_deprecated_attribute: bool,
	pub has_synthetic_attribute: bool,

	pub code: Option<Code>,
	pub exceptions: Option<Vec<ClassName>>,
	pub signature: Option<MethodSignature>,

	pub runtime_visible_annotations: Vec<Annotation>,
	pub runtime_invisible_annotations: Vec<Annotation>,
	pub runtime_visible_type_annotations: Vec<TypeAnnotation>,
	pub runtime_invisible_type_annotations: Vec<TypeAnnotation>,
	pub runtime_visible_parameter_annotations: Option<Vec<Vec<Annotation>>>,
	pub runtime_invisible_parameter_annotations: Option<Vec<Vec<Annotation>>>,
	pub annotation_default: Option<ElementValue>,
	pub method_parameters: Option<Vec<MethodParameter>>,

	pub attributes: Vec<Attribute>,
}

impl Method {
	pub fn new(access: MethodAccess, name: MethodName, descriptor: MethodDescriptor) -> Method {
		Method {
			access,
			name,
			descriptor,

			has_deprecated_attribute: false,
			has_synthetic_attribute: false,

			code: None,
			exceptions: None,
			signature: None,

			runtime_visible_annotations: Vec::new(),
			runtime_invisible_annotations: Vec::new(),
			runtime_visible_type_annotations: Vec::new(),
			runtime_invisible_type_annotations: Vec::new(),
			runtime_visible_parameter_annotations: None,
			runtime_invisible_parameter_annotations: None,
			annotation_default: None,
			method_parameters: None,

			attributes: Vec::new(),
		}
	}
}

make_access_flags!(
	pub MethodAccess {
		is_public       = 0x0001, "public";
		is_private      = 0x0002, "private";
		is_protected    = 0x0004, "protected";
		is_static       = 0x0008, "static";
		is_final        = 0x0010, "final";
		is_synchronized = 0x0020, "synchronized";
		is_bridge       = 0x0040, "bridge";
		is_varargs      = 0x0080, "varargs";
		is_native       = 0x0100, "native";
		is_abstract     = 0x0400, "abstract";
		is_strict       = 0x0800, "strict";
		is_synthetic    = 0x1000, "synthetic";
	}
);

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MethodRef {
	pub class: ClassName,
	pub name: MethodName,
	pub desc: MethodDescriptor,
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MethodNameAndDesc {
	pub name: MethodName,
	pub desc: MethodDescriptor,
}

make_string_like!(
	pub MethodName;
	check = is_valid_method_name;
);

impl MethodName {
	pub const INIT: MethodName = MethodName::from_static("<init>");
	pub const CLINIT: MethodName = MethodName::from_static("<clinit>");
}

make_string_like!(
	pub MethodDescriptor;
	check = is_valid_method_descriptor;
);

fn is_valid_method_descriptor(s: &str) -> bool {
	crate::tree::descriptor::parse_method_descriptor(s).is_ok()
}

make_string_like!(
	pub MethodSignature;
);

#[derive(Debug, Clone, PartialEq)]
pub struct MethodParameter {
	pub name: Option<ParameterName>,
	pub flags: ParameterFlags,
}

make_string_like!(
	pub ParameterName;
	check = is_valid_unqualified_name;
);

make_access_flags!(
	pub ParameterFlags {
		is_final     = 0x0010, "final";
		is_synthetic = 0x1000, "synthetic";
		is_mandated  = 0x8000, "mandated";
	}
);
