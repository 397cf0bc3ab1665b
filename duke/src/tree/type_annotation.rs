use crate::tree::annotation::Annotation;

/// States exactly on which type of a declaration the annotation is.
///
/// Type annotations inside the `Code` attribute reference bytecode offsets and are not represented, they are kept as
/// opaque [attributes][crate::tree::attribute::Attribute] of the code.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TargetInfo {
	/// The annotation is on a type parameter of a generic class or generic interface.
	ClassTypeParameter {
		/// Specifies the index of the type parameter. `0` means the first type parameter.
		index: u8,
	},
	/// The annotation is on a type parameter of a generic method or generic constructor.
	MethodTypeParameter {
		index: u8,
	},
	/// The annotation is on the superclass in an `extends` clause (`index` is [`u16::MAX`]), or on a super interface
	/// (`index` is the index into the list of interfaces).
	Supertype {
		index: u16,
	},
	/// The annotation is on a bound of a type parameter of a generic class or generic interface.
	ClassTypeParameterBound {
		type_parameter_index: u8,
		bound_index: u8,
	},
	/// The annotation is on a bound of a type parameter of a generic method or generic constructor.
	MethodTypeParameterBound {
		type_parameter_index: u8,
		bound_index: u8,
	},
	/// The annotation is on the type of a field declaration or on the type of a record component declaration.
	Field,
	/// The annotation is on the return type of a method or on the type of a newly constructed object.
	Return,
	/// The annotation is on the receiver type of a method or constructor.
	Receiver,
	/// The annotation is on a type of a formal parameter declaration of a method, constructor or lambda expression.
	FormalParameter {
		index: u8,
	},
	/// The annotation is on the `index`th type in the `throws` clause of a method or constructor.
	Throws {
		index: u16,
	},
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypePathKind {
	ArrayDeeper,
	NestedDeeper,
	WildcardBound,
	TypeArgument {
		index: u8,
	}
}

/// Specifies exactly where in the type the annotation is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypePath {
	pub path: Vec<TypePathKind>
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotation {
	pub target: TargetInfo,
	pub type_path: TypePath,
	pub annotation: Annotation,
}
