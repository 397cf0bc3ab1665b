use std::iter::Peekable;
use std::str::Chars;
use anyhow::{anyhow, bail, Context, Result};
use crate::tree::class::ClassName;
use crate::tree::field::FieldDescriptor;
use crate::tree::method::MethodDescriptor;

/// Represents a type.
///
/// In case of an array, use the [`Type::Array`] variant.
///
/// ```
/// use duke::tree::descriptor::{ArrayType, Type};
///
/// // the type of a java `int`
/// let int_type = Type::I;
///
/// // the type of a java `int[][]`
/// let int_array_type = Type::Array(2, ArrayType::I);
///
/// assert_ne!(int_type, int_array_type);
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Type {
	/// A `byte`. In rust, this is a `i8`.
	B,
	/// A `char`.
	C,
	/// A `double`. In rust, this is a `f64`.
	D,
	/// A `float`. In rust, this is a `f32`.
	F,
	/// An `int`. In rust, this is a `i32`.
	I,
	/// A `long`. In rust, this is a `i64`.
	J,
	/// A `short`. In rust, this is a `i16`.
	S,
	/// A `boolean`. In rust, this is a `bool`.
	Z,
	/// An instance of the class specified by [`ClassName`].
	Object(ClassName),
	/// An array type, represented by the dimension and the inner [`ArrayType`].
	Array(u8, ArrayType),
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ArrayType {
	B,
	C,
	D,
	F,
	I,
	J,
	S,
	Z,
	Object(ClassName),
}

impl Type {
	/// The number of local variable slots (and stack entries) a value of this type takes.
	pub fn size(&self) -> u16 {
		match self {
			Type::D | Type::J => 2,
			_ => 1,
		}
	}

	pub fn is_reference(&self) -> bool {
		matches!(self, Type::Object(_) | Type::Array(_, _))
	}

	/// Returns the internal name used in `checkcast`, `instanceof` and `anewarray` for reference types.
	///
	/// For [`Type::Object`], this is the class name, for arrays it's the descriptor.
	/// Returns [`None`] for primitive types.
	pub fn internal_name(&self) -> Option<ClassName> {
		match self {
			Type::Object(class_name) => Some(class_name.clone()),
			array @ Type::Array(_, _) => Some(ClassName::from(array.write())),
			_ => None,
		}
	}

	/// Returns the type of the elements of an array type.
	pub fn element_type(&self) -> Option<Type> {
		match self {
			Type::Array(dimension, array_type) if *dimension > 1 => Some(Type::Array(dimension - 1, array_type.clone())),
			Type::Array(_, array_type) => Some(match array_type {
				ArrayType::B => Type::B,
				ArrayType::C => Type::C,
				ArrayType::D => Type::D,
				ArrayType::F => Type::F,
				ArrayType::I => Type::I,
				ArrayType::J => Type::J,
				ArrayType::S => Type::S,
				ArrayType::Z => Type::Z,
				ArrayType::Object(class_name) => Type::Object(class_name.clone()),
			}),
			_ => None,
		}
	}

	/// Parses an internal name, as found in a `CONSTANT_Class_info` constant pool entry.
	pub fn from_internal_name(name: &ClassName) -> Result<Type> {
		if name.as_str().starts_with('[') {
			parse_field_descriptor(name.as_str())
		} else {
			Ok(Type::Object(name.clone()))
		}
	}

	/// Writes the field descriptor of this type.
	pub fn write(&self) -> String {
		let mut string = String::new();
		write_field_type(self, &mut string);
		string
	}
}

// The grammar for descriptors is:
//   FieldDescriptor:
//     FieldType
//
//   MethodDescriptor:
//     "(" FieldType* ")" ReturnDescriptor
//
//   ReturnDescriptor:
//     FieldType | "V"
//
//   FieldType:
//     "B" | "C" | "D" | "F" | "I" | "J" | "S" | "Z" |
//     "L" ClassName ";" |
//     "[" FieldType
fn read_field_type(chars: &mut Peekable<Chars>) -> Result<Type> {
	let mut array_dimension: u8 = 0;
	while chars.next_if_eq(&'[').is_some() {
		array_dimension = array_dimension.checked_add(1)
			.context("array dimension of descriptor is larger than 255")?;
	}

	let char = chars.next().ok_or_else(|| anyhow!("unexpected abrupt ending of descriptor"))?;
	let array_type = match char {
		'B' => ArrayType::B,
		'C' => ArrayType::C,
		'D' => ArrayType::D,
		'F' => ArrayType::F,
		'I' => ArrayType::I,
		'J' => ArrayType::J,
		'S' => ArrayType::S,
		'Z' => ArrayType::Z,
		'L' => {
			let mut s = String::new();

			let mut char = chars.next().ok_or_else(|| anyhow!("unexpected abrupt ending of descriptor"))?;
			while char != ';' {
				s.push(char);

				char = chars.next().ok_or_else(|| anyhow!("unexpected abrupt ending of descriptor"))?;
			}
			if s.is_empty() {
				bail!("empty class name in descriptor");
			}

			ArrayType::Object(ClassName::from(s))
		},
		x => bail!("unexpected char {x:?} in descriptor"),
	};

	if array_dimension == 0 {
		Ok(match array_type {
			ArrayType::B => Type::B,
			ArrayType::C => Type::C,
			ArrayType::D => Type::D,
			ArrayType::F => Type::F,
			ArrayType::I => Type::I,
			ArrayType::J => Type::J,
			ArrayType::S => Type::S,
			ArrayType::Z => Type::Z,
			ArrayType::Object(class_name) => Type::Object(class_name),
		})
	} else {
		Ok(Type::Array(array_dimension, array_type))
	}
}

fn write_field_type(t: &Type, string: &mut String) {
	fn write_object(class_name: &ClassName, string: &mut String) {
		string.push('L');
		string.push_str(class_name.as_str());
		string.push(';');
	}

	match t {
		Type::B => string.push('B'),
		Type::C => string.push('C'),
		Type::D => string.push('D'),
		Type::F => string.push('F'),
		Type::I => string.push('I'),
		Type::J => string.push('J'),
		Type::S => string.push('S'),
		Type::Z => string.push('Z'),
		Type::Object(class_name) => write_object(class_name, string),
		Type::Array(array_dimension, array_type) => {
			for _ in 0..*array_dimension {
				string.push('[');
			}
			match array_type {
				ArrayType::B => string.push('B'),
				ArrayType::C => string.push('C'),
				ArrayType::D => string.push('D'),
				ArrayType::F => string.push('F'),
				ArrayType::I => string.push('I'),
				ArrayType::J => string.push('J'),
				ArrayType::S => string.push('S'),
				ArrayType::Z => string.push('Z'),
				ArrayType::Object(class_name) => write_object(class_name, string),
			}
		},
	}
}

/// Attempts to parse a field descriptor.
///
/// A field descriptor is defined by the [grammar](https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.3.2) in the
/// Java Virtual Machine Specification.
pub fn parse_field_descriptor(descriptor: &str) -> Result<Type> {
	let mut chars = descriptor.chars().peekable();
	let t = read_field_type(&mut chars)
		.with_context(|| anyhow!("invalid field descriptor {descriptor:?}"))?;
	if chars.peek().is_some() {
		bail!("expected end of field descriptor {descriptor:?}, got more characters");
	}
	Ok(t)
}

/// A method descriptor, parsed into the types of the parameters and the return type.
///
/// A return type of [`None`] represents `void`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParsedMethodDescriptor {
	pub parameter_descriptors: Vec<Type>,
	pub return_descriptor: Option<Type>,
}

impl ParsedMethodDescriptor {
	/// Computes the number of local variable slots the arguments take, including `this` for non-static methods.
	pub fn arguments_size(&self, is_static: bool) -> u16 {
		let this = if is_static { 0 } else { 1 };
		this + self.parameter_descriptors.iter().map(Type::size).sum::<u16>()
	}

	pub fn write(&self) -> MethodDescriptor {
		let mut string = String::from("(");
		for parameter in &self.parameter_descriptors {
			write_field_type(parameter, &mut string);
		}
		string.push(')');
		match &self.return_descriptor {
			Some(t) => write_field_type(t, &mut string),
			None => string.push('V'),
		}
		MethodDescriptor::from(string)
	}
}

/// Attempts to parse a method descriptor.
///
/// A method descriptor is defined by the [grammar](https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.3.3) in the
/// Java Virtual Machine Specification.
pub fn parse_method_descriptor(descriptor: &str) -> Result<ParsedMethodDescriptor> {
	(|| {
		let mut chars = descriptor.chars().peekable();

		if chars.next_if_eq(&'(').is_none() {
			bail!("must start with `(`");
		}

		let mut parameter_descriptors = Vec::new();
		while chars.next_if_eq(&')').is_none() {
			parameter_descriptors.push(read_field_type(&mut chars)?);
		}

		let return_descriptor = if chars.next_if_eq(&'V').is_some() {
			None
		} else {
			Some(read_field_type(&mut chars)?)
		};

		if chars.peek().is_some() {
			bail!("expected end of method descriptor, got more characters");
		}

		Ok(ParsedMethodDescriptor { parameter_descriptors, return_descriptor })
	})()
		.with_context(|| anyhow!("invalid method descriptor {descriptor:?}"))
}

impl FieldDescriptor {
	pub fn parse(&self) -> Result<Type> {
		parse_field_descriptor(self.as_str())
	}
}

impl From<&Type> for FieldDescriptor {
	fn from(value: &Type) -> Self {
		FieldDescriptor::from(value.write())
	}
}

impl MethodDescriptor {
	pub fn parse(&self) -> Result<ParsedMethodDescriptor> {
		parse_method_descriptor(self.as_str())
	}
}

/// Collects every class name mentioned in a field or method descriptor, in order of appearance.
///
/// Unlike [`parse_method_descriptor`], this doesn't fail on malformed input, it just collects what
/// looks like a class name.
pub fn class_names_in(descriptor: &str) -> Vec<ClassName> {
	let mut names = Vec::new();
	let mut rest = descriptor;
	while let Some(start) = rest.find('L') {
		let after = &rest[start + 1..];
		match after.find(';') {
			Some(end) => {
				names.push(ClassName::from(&after[..end]));
				rest = &after[end + 1..];
			},
			None => break,
		}
	}
	names
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::tree::class::ClassName;
	use crate::tree::descriptor::{ArrayType, class_names_in, parse_field_descriptor, parse_method_descriptor, ParsedMethodDescriptor, Type};

	#[test]
	fn field() {
		assert_eq!(parse_field_descriptor("I").ok(), Some(Type::I));
		assert_eq!(parse_field_descriptor("Ljava/lang/String;").ok(), Some(Type::Object(ClassName::JAVA_LANG_STRING)));
		assert_eq!(parse_field_descriptor("[[J").ok(), Some(Type::Array(2, ArrayType::J)));
		assert!(parse_field_descriptor("V").is_err());
		assert!(parse_field_descriptor("II").is_err());
		assert!(parse_field_descriptor("Ljava/lang/String").is_err());
		assert!(parse_field_descriptor("L;").is_err());
	}

	#[test]
	fn method() {
		let parsed = parse_method_descriptor("(IJ[Ljava/lang/Object;)V").ok();
		assert_eq!(parsed, Some(ParsedMethodDescriptor {
			parameter_descriptors: vec![
				Type::I,
				Type::J,
				Type::Array(1, ArrayType::Object(ClassName::JAVA_LANG_OBJECT)),
			],
			return_descriptor: None,
		}));
		let parsed = parsed.unwrap();
		assert_eq!(parsed.arguments_size(true), 4);
		assert_eq!(parsed.arguments_size(false), 5);
		assert_eq!(parsed.write().as_str(), "(IJ[Ljava/lang/Object;)V");

		assert!(parse_method_descriptor("I)V").is_err());
		assert!(parse_method_descriptor("()").is_err());
		assert!(parse_method_descriptor("()VV").is_err());
	}

	#[test]
	fn internal_names() {
		assert_eq!(Type::Array(1, ArrayType::I).internal_name(), Some(ClassName::from("[I")));
		assert_eq!(Type::Object(ClassName::JAVA_LANG_OBJECT).internal_name(), Some(ClassName::JAVA_LANG_OBJECT));
		assert_eq!(Type::Z.internal_name(), None);
		assert_eq!(Type::from_internal_name(&ClassName::from("[[Ljava/lang/String;")).ok(),
			Some(Type::Array(2, ArrayType::Object(ClassName::JAVA_LANG_STRING))));
		assert_eq!(Type::Array(2, ArrayType::I).element_type(), Some(Type::Array(1, ArrayType::I)));
	}

	#[test]
	fn class_names() {
		assert_eq!(class_names_in("(Ljava/util/List;I[Ljava/lang/String;)Ljava/lang/Object;"), vec![
			ClassName::from("java/util/List"),
			ClassName::JAVA_LANG_STRING,
			ClassName::JAVA_LANG_OBJECT,
		]);
		assert_eq!(class_names_in("[[D"), Vec::<ClassName>::new());
	}
}
