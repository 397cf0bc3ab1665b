//! Building method bodies instruction by instruction.

use std::collections::HashMap;
use anyhow::{bail, Result};
use duke::tree::class::ClassName;
use duke::tree::descriptor::Type;
use duke::tree::field::{FieldDescriptor, FieldName, FieldRef};
use duke::tree::method::{MethodDescriptor, MethodName, MethodRef};
use duke::tree::method::code::{Code, Exception, Handle, Instruction, InstructionListEntry, Label, Loadable, LvIndex};

pub(crate) const STRING_BUILDER: &str = "java/lang/StringBuilder";
pub(crate) const LOOKUP_DESC: &str = "Ljava/lang/invoke/MethodHandles$Lookup;";

pub(crate) fn method_ref(class: impl Into<ClassName>, name: &str, desc: &str) -> MethodRef {
	MethodRef {
		class: class.into(),
		name: MethodName::from(name),
		desc: MethodDescriptor::from(desc),
	}
}

pub(crate) fn field_ref(class: impl Into<ClassName>, name: impl Into<FieldName>, desc: impl Into<FieldDescriptor>) -> FieldRef {
	FieldRef {
		class: class.into(),
		name: name.into(),
		desc: desc.into(),
	}
}

/// The box class of a primitive type, together with the name of the method getting the primitive value back out.
pub(crate) fn wrapper(ty: &Type) -> Option<(&'static str, &'static str)> {
	match ty {
		Type::Z => Some(("java/lang/Boolean", "booleanValue")),
		Type::B => Some(("java/lang/Byte", "byteValue")),
		Type::C => Some(("java/lang/Character", "charValue")),
		Type::S => Some(("java/lang/Short", "shortValue")),
		Type::I => Some(("java/lang/Integer", "intValue")),
		Type::J => Some(("java/lang/Long", "longValue")),
		Type::F => Some(("java/lang/Float", "floatValue")),
		Type::D => Some(("java/lang/Double", "doubleValue")),
		Type::Object(_) | Type::Array(_, _) => None,
	}
}

/// The type a value of `ty` has after boxing. Reference types stay as they are.
pub(crate) fn boxed(ty: &Type) -> Type {
	match wrapper(ty) {
		Some((class, _)) => Type::Object(ClassName::from(class)),
		None => ty.clone(),
	}
}

/// The static type of a constant loaded with `ldc`.
pub(crate) fn loadable_type(loadable: &Loadable) -> Result<Type> {
	Ok(match loadable {
		Loadable::Integer(_) => Type::I,
		Loadable::Float(_) => Type::F,
		Loadable::Long(_) => Type::J,
		Loadable::Double(_) => Type::D,
		Loadable::Class(_) => Type::Object(ClassName::JAVA_LANG_CLASS),
		Loadable::String(_) => Type::Object(ClassName::JAVA_LANG_STRING),
		Loadable::MethodHandle(_) => Type::Object(ClassName::JAVA_LANG_INVOKE_METHOD_HANDLE),
		Loadable::MethodType(_) => Type::Object(ClassName::JAVA_LANG_INVOKE_METHOD_TYPE),
		Loadable::Dynamic(dynamic) => dynamic.descriptor.parse()?,
	})
}

/// The types of the values a handle takes from the stack, in order.
pub(crate) fn handle_parameter_types(handle: &Handle) -> Result<Vec<Type>> {
	Ok(match handle {
		Handle::GetStatic(_) => Vec::new(),
		Handle::GetField(f) => vec![Type::Object(f.class.clone())],
		Handle::PutStatic(f) => vec![f.desc.parse()?],
		Handle::PutField(f) => vec![Type::Object(f.class.clone()), f.desc.parse()?],
		Handle::InvokeVirtual(m) | Handle::InvokeInterface(m) | Handle::InvokeSpecial(m, _) => {
			let mut types = vec![Type::Object(m.class.clone())];
			types.extend(m.desc.parse()?.parameter_descriptors);
			types
		},
		Handle::InvokeStatic(m, _) | Handle::NewInvokeSpecial(m) => m.desc.parse()?.parameter_descriptors,
	})
}

/// The type a handle leaves on the stack, [`None`] for `void`.
pub(crate) fn handle_return_type(handle: &Handle) -> Result<Option<Type>> {
	Ok(match handle {
		Handle::GetField(f) | Handle::GetStatic(f) => Some(f.desc.parse()?),
		Handle::PutField(_) | Handle::PutStatic(_) => None,
		Handle::NewInvokeSpecial(m) => Some(Type::Object(m.class.clone())),
		Handle::InvokeVirtual(m) | Handle::InvokeInterface(m) | Handle::InvokeSpecial(m, _) | Handle::InvokeStatic(m, _) =>
			m.desc.parse()?.return_descriptor,
	})
}

/// Creates the [`Code`] of a method, handing out fresh labels.
///
/// Placing more than one label before the same instruction is fine, later labels are made aliases of the first one.
#[derive(Debug, Default)]
pub(crate) struct CodeBuilder {
	instructions: Vec<InstructionListEntry>,
	exception_table: Vec<Exception>,
	next_label: u16,
	pending: Option<Label>,
	aliases: HashMap<Label, Label>,
}

impl CodeBuilder {
	pub(crate) fn new() -> CodeBuilder {
		CodeBuilder::default()
	}

	pub(crate) fn new_label(&mut self) -> Label {
		let label = Label::new(self.next_label);
		self.next_label += 1;
		label
	}

	/// Places the label before the next instruction pushed.
	pub(crate) fn place(&mut self, label: Label) {
		match self.pending {
			Some(pending) => {
				self.aliases.insert(label, pending);
			},
			None => self.pending = Some(label),
		}
	}

	pub(crate) fn push(&mut self, instruction: Instruction) {
		self.instructions.push(InstructionListEntry {
			label: self.pending.take(),
			instruction,
		});
	}

	/// Adds an entry to the exception table. A `catch` of [`None`] catches anything.
	pub(crate) fn try_catch(&mut self, start: Label, end: Label, handler: Label, catch: Option<ClassName>) {
		self.exception_table.push(Exception { start, end, handler, catch });
	}

	pub(crate) fn finish(self) -> Code {
		let CodeBuilder { mut instructions, mut exception_table, pending, aliases, .. } = self;

		let resolve = |label: &mut Label| {
			if let Some(target) = aliases.get(label) {
				*label = *target;
			}
		};
		for entry in &mut instructions {
			for label in jump_labels_mut(&mut entry.instruction) {
				resolve(label);
			}
		}
		for exception in &mut exception_table {
			resolve(&mut exception.start);
			resolve(&mut exception.end);
			resolve(&mut exception.handler);
		}

		Code {
			instructions,
			exception_table,
			last_label: pending,
			..Code::default()
		}
	}

	pub(crate) fn push_int(&mut self, value: i32) {
		self.push(match value {
			-1 => Instruction::IConstM1,
			0 => Instruction::IConst0,
			1 => Instruction::IConst1,
			2 => Instruction::IConst2,
			3 => Instruction::IConst3,
			4 => Instruction::IConst4,
			5 => Instruction::IConst5,
			value => if let Ok(value) = i8::try_from(value) {
				Instruction::BiPush(value)
			} else if let Ok(value) = i16::try_from(value) {
				Instruction::SiPush(value)
			} else {
				Instruction::Ldc(Loadable::Integer(value))
			},
		});
	}

	pub(crate) fn push_string(&mut self, value: &str) {
		self.push(Instruction::Ldc(Loadable::string(value)));
	}

	pub(crate) fn load(&mut self, ty: &Type, index: u16) {
		let index = LvIndex { index };
		self.push(match ty {
			Type::B | Type::C | Type::I | Type::S | Type::Z => Instruction::ILoad(index),
			Type::J => Instruction::LLoad(index),
			Type::F => Instruction::FLoad(index),
			Type::D => Instruction::DLoad(index),
			Type::Object(_) | Type::Array(_, _) => Instruction::ALoad(index),
		});
	}

	/// Returns a value of the type, or nothing if [`None`] is given.
	pub(crate) fn return_value(&mut self, ty: Option<&Type>) {
		self.push(match ty {
			None => Instruction::Return,
			Some(Type::B | Type::C | Type::I | Type::S | Type::Z) => Instruction::IReturn,
			Some(Type::J) => Instruction::LReturn,
			Some(Type::F) => Instruction::FReturn,
			Some(Type::D) => Instruction::DReturn,
			Some(Type::Object(_) | Type::Array(_, _)) => Instruction::AReturn,
		});
	}

	pub(crate) fn invoke_static(&mut self, class: impl Into<ClassName>, name: &str, desc: &str) {
		self.push(Instruction::InvokeStatic(method_ref(class, name, desc), false));
	}

	pub(crate) fn invoke_virtual(&mut self, class: impl Into<ClassName>, name: &str, desc: &str) {
		self.push(Instruction::InvokeVirtual(method_ref(class, name, desc)));
	}

	pub(crate) fn invoke_special(&mut self, class: impl Into<ClassName>, name: &str, desc: &str) {
		self.push(Instruction::InvokeSpecial(method_ref(class, name, desc), false));
	}

	/// Creates a new object with the given no-argument constructor, leaving it on the stack.
	pub(crate) fn construct(&mut self, class: &str) {
		self.push(Instruction::New(ClassName::from(class)));
		self.push(Instruction::Dup);
		self.invoke_special(class, "<init>", "()V");
	}

	/// Pushes the `java/lang/Class` of the type. Primitive types use the `TYPE` field of their box class.
	pub(crate) fn load_class_ref(&mut self, ty: &Type) -> Result<()> {
		match (wrapper(ty), ty.internal_name()) {
			(Some((class, _)), _) => {
				self.push(Instruction::GetStatic(field_ref(class, "TYPE", "Ljava/lang/Class;")));
			},
			(None, Some(name)) => self.push(Instruction::Ldc(Loadable::Class(name))),
			(None, None) => bail!("can't load a class reference for {ty:?}"),
		}
		Ok(())
	}

	/// Boxes a primitive value on the top of the stack. Does nothing for references.
	pub(crate) fn box_value(&mut self, ty: &Type) {
		if let Some((class, _)) = wrapper(ty) {
			let desc = format!("({}){}", ty.write(), Type::Object(ClassName::from(class)).write());
			self.invoke_static(class, "valueOf", &desc);
		}
	}

	/// Converts a reference on the top of the stack to a value of type `to`, unboxing primitives.
	pub(crate) fn unbox_or_cast(&mut self, to: &Type) {
		match (wrapper(to), to.internal_name()) {
			(Some((class, method)), _) => {
				self.push(Instruction::CheckCast(ClassName::from(class)));
				self.invoke_virtual(class, method, &format!("(){}", to.write()));
			},
			(None, Some(name)) => {
				if name != ClassName::JAVA_LANG_OBJECT {
					self.push(Instruction::CheckCast(name));
				}
			},
			(None, None) => {},
		}
	}

	/// Converts a value on the top of the stack from the type `from` to the type `to`, by boxing, unboxing or casting.
	pub(crate) fn adapt(&mut self, from: &Type, to: &Type) -> Result<()> {
		if from == to {
			return Ok(());
		}
		match (from.is_reference(), to.is_reference()) {
			(false, true) => {
				self.box_value(from);
				let boxed = boxed(from);
				if &boxed != to && !is_supertype_of_boxes(to) {
					if let Some(name) = to.internal_name() {
						self.push(Instruction::CheckCast(name));
					}
				}
			},
			(true, false) => self.unbox_or_cast(to),
			(true, true) => {
				if !matches!(to, Type::Object(name) if *name == ClassName::JAVA_LANG_OBJECT) {
					self.unbox_or_cast(to);
				}
			},
			(false, false) => {
				let int_like = |ty: &Type| matches!(ty, Type::B | Type::C | Type::I | Type::S | Type::Z);
				if !(int_like(from) && int_like(to)) {
					bail!("can't convert a value of type {from:?} to {to:?}");
				}
			},
		}
		Ok(())
	}

	/// Appends the value on the top of the stack to the `java/lang/StringBuilder` below it.
	pub(crate) fn append(&mut self, ty: &Type) {
		let parameter = match ty {
			Type::Z => "Z",
			Type::B | Type::S | Type::I => "I",
			Type::C => "C",
			Type::J => "J",
			Type::F => "F",
			Type::D => "D",
			Type::Object(name) if *name == ClassName::JAVA_LANG_STRING => "Ljava/lang/String;",
			Type::Object(_) | Type::Array(_, _) => "Ljava/lang/Object;",
		};
		self.invoke_virtual(STRING_BUILDER, "append", &format!("({parameter})Ljava/lang/StringBuilder;"));
	}

	pub(crate) fn append_str(&mut self, value: &str) {
		self.push_string(value);
		self.append(&Type::Object(ClassName::JAVA_LANG_STRING));
	}

	/// Emits what needs to come before the arguments of a call to the handle.
	pub(crate) fn call_handle_before_args(&mut self, handle: &Handle) {
		if let Handle::NewInvokeSpecial(m) = handle {
			self.push(Instruction::New(m.class.clone()));
			self.push(Instruction::Dup);
		}
	}

	/// Emits the instruction calling the handle, with the arguments already on the stack.
	pub(crate) fn call_handle_after_args(&mut self, handle: &Handle) {
		self.push(match handle.clone() {
			Handle::GetField(f) => Instruction::GetField(f),
			Handle::GetStatic(f) => Instruction::GetStatic(f),
			Handle::PutField(f) => Instruction::PutField(f),
			Handle::PutStatic(f) => Instruction::PutStatic(f),
			Handle::InvokeVirtual(m) => Instruction::InvokeVirtual(m),
			Handle::InvokeStatic(m, is_interface) => Instruction::InvokeStatic(m, is_interface),
			Handle::InvokeSpecial(m, is_interface) => Instruction::InvokeSpecial(m, is_interface),
			Handle::NewInvokeSpecial(m) => Instruction::InvokeSpecial(m, false),
			Handle::InvokeInterface(m) => Instruction::InvokeInterface(m),
		});
	}
}

/// Boxes are assignable to these without a cast.
fn is_supertype_of_boxes(ty: &Type) -> bool {
	matches!(ty, Type::Object(name) if matches!(name.as_str(),
		"java/lang/Object" | "java/lang/Number" | "java/io/Serializable" | "java/lang/Comparable"
	))
}

/// Returns all labels an instruction jumps to, for changing them.
pub(crate) fn jump_labels_mut(instruction: &mut Instruction) -> Vec<&mut Label> {
	match instruction {
		Instruction::IfEq(label) | Instruction::IfNe(label) | Instruction::IfLt(label) |
		Instruction::IfGe(label) | Instruction::IfGt(label) | Instruction::IfLe(label) |
		Instruction::IfICmpEq(label) | Instruction::IfICmpNe(label) | Instruction::IfICmpLt(label) |
		Instruction::IfICmpGe(label) | Instruction::IfICmpGt(label) | Instruction::IfICmpLe(label) |
		Instruction::IfACmpEq(label) | Instruction::IfACmpNe(label) |
		Instruction::Goto(label) | Instruction::Jsr(label) |
		Instruction::IfNull(label) | Instruction::IfNonNull(label) => vec![label],
		Instruction::TableSwitch { default, table, .. } => std::iter::once(default).chain(table.iter_mut()).collect(),
		Instruction::LookupSwitch { default, pairs } =>
			std::iter::once(default).chain(pairs.iter_mut().map(|(_, label)| label)).collect(),
		_ => Vec::new(),
	}
}
