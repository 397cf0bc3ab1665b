use std::collections::HashMap;
use anyhow::{bail, Result};
use java_string::JavaString;
use crate::class_constants::{atype, handle_kind};
use crate::macros::make_string_like;
use crate::tree::attribute::Attribute;
use crate::tree::class::ClassName;
use crate::tree::field::{FieldDescriptor, FieldName, FieldRef, FieldSignature};
use crate::tree::method::{MethodDescriptor, MethodName, MethodRef};
use crate::tree::names::is_valid_unqualified_name;

#[derive(Debug, Clone, PartialEq)]
pub struct InstructionListEntry {
	pub label: Option<Label>,
	pub instruction: Instruction,
}

impl From<Instruction> for InstructionListEntry {
	fn from(instruction: Instruction) -> Self {
		InstructionListEntry { label: None, instruction }
	}
}

/// Represents the code of a method.
///
/// The `StackMapTable` attribute is not represented, it's computed when writing.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Code {
	/// The values read from the class file. These are not used for writing, as they get recomputed.
	pub max_stack: Option<u16>,
	pub max_locals: Option<u16>,

	pub instructions: Vec<InstructionListEntry>,
	pub exception_table: Vec<Exception>,
	/// The label after the last instruction, used by exception ranges and local variables ending at the end of the code.
	pub last_label: Option<Label>,

	pub line_numbers: Option<Vec<(Label, u16)>>,
	pub local_variables: Option<Vec<Lv>>,

	pub attributes: Vec<Attribute>,
}

impl Code {
	/// Creates a [`Label`] not used anywhere in this code yet.
	pub fn fresh_label(&self) -> Label {
		let max = self.instructions.iter()
			.filter_map(|entry| entry.label)
			.chain(self.last_label)
			.map(|label| label.id)
			.max();
		Label { id: max.map_or(0, |max| max + 1) }
	}

	/// Maps each label to the index of the instruction it's on. The `last_label` maps to the length of the instruction list.
	pub fn label_indices(&self) -> HashMap<Label, usize> {
		let mut map: HashMap<Label, usize> = self.instructions.iter()
			.enumerate()
			.filter_map(|(index, entry)| entry.label.map(|label| (label, index)))
			.collect();
		if let Some(last_label) = self.last_label {
			map.insert(last_label, self.instructions.len());
		}
		map
	}
}

make_string_like!(
	pub LocalVariableName;
	check = is_valid_unqualified_name;
);

#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
	pub start: Label,
	pub end: Label,
	pub handler: Label,
	/// The caught type, [`None`] for catching anything (as used for `finally` and `synchronized`).
	pub catch: Option<ClassName>,
}

/// Represents an index of a local variable.
///
/// If the local variable is of type `double` or `long`, it also occupies
/// the [`LvIndex`] with `index = index + 1`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LvIndex {
	pub index: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lv {
	pub range: LabelRange,
	pub name: LocalVariableName,
	pub descriptor: Option<FieldDescriptor>,
	pub signature: Option<FieldSignature>,
	pub index: LvIndex,
}

/// Represents a bytecode offset of an opcode using a method-local id.
///
/// Since the `code` array must have a size that fits in an `u16`, and each bytecode offset can at maximum be an instruction,
/// a label id also fits in an `u16`.
///
/// The id stored in the `id` field does **not** correspond to the bytecode offset in any direct way. When reading or writing,
/// that id is used to uniquely identify a bytecode offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
	pub(crate) id: u16,
}

impl Label {
	pub fn new(id: u16) -> Label {
		Label { id }
	}
}

/// Represents a range of bytecode offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRange {
	/// The start label, inclusive.
	pub start: Label,
	/// The end label, exclusive.
	pub end: Label,
}

/// Represents an instruction of the JVM.
///
/// Each instruction can either:
/// - hold no additional data, like [`Instruction::Nop`],
/// - hold some immediate value, like [`Instruction::BiPush`],
/// - hold a [local variable index][LvIndex], like [`Instruction::ILoad`] (note that this also represents the `iload_0` instruction for example),
/// - hold a [`Label`] for jumps, like [`Instruction::IfEq`],
/// - or hold other data the instruction needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
	Nop,
	AConstNull,
	IConstM1, IConst0, IConst1, IConst2, IConst3, IConst4, IConst5,
	LConst0, LConst1,
	FConst0, FConst1, FConst2,
	DConst0, DConst1,
	BiPush(i8),
	SiPush(i16),
	Ldc(Loadable),
	ILoad(LvIndex), LLoad(LvIndex), FLoad(LvIndex), DLoad(LvIndex), ALoad(LvIndex),
	IALoad, LALoad, FALoad, DALoad, AALoad, BALoad, CALoad, SALoad,
	IStore(LvIndex), LStore(LvIndex), FStore(LvIndex), DStore(LvIndex), AStore(LvIndex),
	IAStore, LAStore, FAStore, DAStore, AAStore, BAStore, CAStore, SAStore,
	Pop, Pop2,
	Dup, DupX1, DupX2,
	Dup2, Dup2X1, Dup2X2,
	Swap,
	IAdd, LAdd, FAdd, DAdd,
	ISub, LSub, FSub, DSub,
	IMul, LMul, FMul, DMul,
	IDiv, LDiv, FDiv, DDiv,
	IRem, LRem, FRem, DRem,
	INeg, LNeg, FNeg, DNeg,
	IShl, LShl,
	IShr, LShr,
	IUShr, LUShr,
	IAnd, LAnd,
	IOr, LOr,
	IXor, LXor,
	IInc(LvIndex, i16),
	I2L, I2F, I2D,
	L2I, L2F, L2D,
	F2I, F2L, F2D,
	D2I, D2L, D2F,
	I2B, I2C, I2S,
	LCmp,
	FCmpL, FCmpG,
	DCmpL, DCmpG,
	IfEq(Label), IfNe(Label), IfLt(Label), IfGe(Label), IfGt(Label), IfLe(Label),
	IfICmpEq(Label), IfICmpNe(Label), IfICmpLt(Label), IfICmpGe(Label), IfICmpGt(Label), IfICmpLe(Label),
	IfACmpEq(Label), IfACmpNe(Label),
	Goto(Label),
	Jsr(Label),
	Ret(LvIndex),
	TableSwitch {
		default: Label,
		low: i32,
		high: i32,
		table: Vec<Label>,
	},
	LookupSwitch {
		default: Label,
		/// Note that these must be ordered.
		pairs: Vec<(i32, Label)>
	},
	IReturn, LReturn, FReturn, DReturn, AReturn,
	Return,
	GetStatic(FieldRef),
	PutStatic(FieldRef),
	GetField(FieldRef),
	PutField(FieldRef),
	InvokeVirtual(MethodRef),
	/// The bool is `true` iff it's on an interface, so if it referenced an `InterfaceMethodRef` constant pool entry.
	InvokeSpecial(MethodRef, bool),
	/// The bool is `true` iff it's on an interface, so if it referenced an `InterfaceMethodRef` constant pool entry.
	InvokeStatic(MethodRef, bool),
	/// `invokeinterface` always uses an `InterfaceMethodRef` constant pool entry.
	InvokeInterface(MethodRef),
	InvokeDynamic(InvokeDynamic),
	New(ClassName),
	NewArray(ArrayType),
	ANewArray(ClassName),
	ArrayLength,
	AThrow,
	CheckCast(ClassName),
	InstanceOf(ClassName),
	MonitorEnter, MonitorExit,
	MultiANewArray(ClassName, u8),
	IfNull(Label), IfNonNull(Label),
}

/// A value loadable with the `ldc` family of instructions, also used as static argument to bootstrap methods.
///
/// Floating point values compare by their bits.
#[derive(Debug, Clone)]
pub enum Loadable {
	Integer(i32),
	Float(f32),
	Long(i64),
	Double(f64),
	Class(ClassName),
	String(JavaString),
	MethodHandle(Handle),
	MethodType(MethodDescriptor),
	Dynamic(ConstantDynamic),
}

impl PartialEq for Loadable {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Loadable::Integer(a), Loadable::Integer(b)) => a == b,
			(Loadable::Float(a), Loadable::Float(b)) => a.to_bits() == b.to_bits(),
			(Loadable::Long(a), Loadable::Long(b)) => a == b,
			(Loadable::Double(a), Loadable::Double(b)) => a.to_bits() == b.to_bits(),
			(Loadable::Class(a), Loadable::Class(b)) => a == b,
			(Loadable::String(a), Loadable::String(b)) => a == b,
			(Loadable::MethodHandle(a), Loadable::MethodHandle(b)) => a == b,
			(Loadable::MethodType(a), Loadable::MethodType(b)) => a == b,
			(Loadable::Dynamic(a), Loadable::Dynamic(b)) => a == b,
			_ => false,
		}
	}
}

impl Eq for Loadable {}

impl Loadable {
	pub fn string(s: &str) -> Loadable {
		Loadable::String(JavaString::from(s))
	}

	/// Returns `true` for values taking two stack entries.
	pub fn is_wide(&self) -> bool {
		match self {
			Loadable::Long(_) | Loadable::Double(_) => true,
			Loadable::Dynamic(dynamic) => matches!(dynamic.descriptor.as_str(), "J" | "D"),
			_ => false,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Handle {
	GetField(FieldRef),
	GetStatic(FieldRef),
	PutField(FieldRef),
	PutStatic(FieldRef),
	InvokeVirtual(MethodRef),
	/// The bool is `true` iff the referenced method is on an interface.
	InvokeStatic(MethodRef, bool),
	/// The bool is `true` iff the referenced method is on an interface.
	InvokeSpecial(MethodRef, bool),
	NewInvokeSpecial(MethodRef),
	InvokeInterface(MethodRef),
}

impl Handle {
	/// The `reference_kind` of the handle.
	pub fn kind(&self) -> u8 {
		match self {
			Handle::GetField(_) => handle_kind::GET_FIELD,
			Handle::GetStatic(_) => handle_kind::GET_STATIC,
			Handle::PutField(_) => handle_kind::PUT_FIELD,
			Handle::PutStatic(_) => handle_kind::PUT_STATIC,
			Handle::InvokeVirtual(_) => handle_kind::INVOKE_VIRTUAL,
			Handle::InvokeStatic(_, _) => handle_kind::INVOKE_STATIC,
			Handle::InvokeSpecial(_, _) => handle_kind::INVOKE_SPECIAL,
			Handle::NewInvokeSpecial(_) => handle_kind::NEW_INVOKE_SPECIAL,
			Handle::InvokeInterface(_) => handle_kind::INVOKE_INTERFACE,
		}
	}

	pub fn owner(&self) -> &ClassName {
		match self {
			Handle::GetField(f) | Handle::GetStatic(f) | Handle::PutField(f) | Handle::PutStatic(f) => &f.class,
			Handle::InvokeVirtual(m) | Handle::InvokeStatic(m, _) | Handle::InvokeSpecial(m, _) |
			Handle::NewInvokeSpecial(m) | Handle::InvokeInterface(m) => &m.class,
		}
	}

	pub fn name(&self) -> &str {
		match self {
			Handle::GetField(f) | Handle::GetStatic(f) | Handle::PutField(f) | Handle::PutStatic(f) => f.name.as_str(),
			Handle::InvokeVirtual(m) | Handle::InvokeStatic(m, _) | Handle::InvokeSpecial(m, _) |
			Handle::NewInvokeSpecial(m) | Handle::InvokeInterface(m) => m.name.as_str(),
		}
	}

	pub fn desc(&self) -> &str {
		match self {
			Handle::GetField(f) | Handle::GetStatic(f) | Handle::PutField(f) | Handle::PutStatic(f) => f.desc.as_str(),
			Handle::InvokeVirtual(m) | Handle::InvokeStatic(m, _) | Handle::InvokeSpecial(m, _) |
			Handle::NewInvokeSpecial(m) | Handle::InvokeInterface(m) => m.desc.as_str(),
		}
	}

	/// Returns the method reference, or [`None`] for field handles.
	pub fn method_ref(&self) -> Option<&MethodRef> {
		match self {
			Handle::GetField(_) | Handle::GetStatic(_) | Handle::PutField(_) | Handle::PutStatic(_) => None,
			Handle::InvokeVirtual(m) | Handle::InvokeStatic(m, _) | Handle::InvokeSpecial(m, _) |
			Handle::NewInvokeSpecial(m) | Handle::InvokeInterface(m) => Some(m),
		}
	}

	/// Returns `true` if the handle references an `InterfaceMethodRef` constant pool entry.
	pub fn is_interface(&self) -> bool {
		match self {
			Handle::InvokeInterface(_) => true,
			Handle::InvokeStatic(_, is_interface) | Handle::InvokeSpecial(_, is_interface) => *is_interface,
			_ => false,
		}
	}

	/// Checks if the handle references the given method.
	pub fn is_method(&self, owner: &str, name: &str, desc: &str) -> bool {
		self.method_ref().is_some_and(|m| m.class == owner && m.name == name && m.desc == desc)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantDynamic {
	pub name: FieldName,
	pub descriptor: FieldDescriptor,
	pub handle: Handle,
	pub arguments: Vec<Loadable>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeDynamic {
	pub name: MethodName,
	pub descriptor: MethodDescriptor,
	pub handle: Handle,
	pub arguments: Vec<Loadable>,
}

/// The primitive element type of `newarray`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ArrayType {
	Boolean,
	Char,
	Float,
	Double,
	Byte,
	Short,
	Int,
	Long,
}

impl ArrayType {
	pub(crate) fn from_atype(atype: u8) -> Result<ArrayType> {
		match atype {
			atype::T_BOOLEAN => Ok(ArrayType::Boolean),
			atype::T_CHAR    => Ok(ArrayType::Char),
			atype::T_FLOAT   => Ok(ArrayType::Float),
			atype::T_DOUBLE  => Ok(ArrayType::Double),
			atype::T_BYTE    => Ok(ArrayType::Byte),
			atype::T_SHORT   => Ok(ArrayType::Short),
			atype::T_INT     => Ok(ArrayType::Int),
			atype::T_LONG    => Ok(ArrayType::Long),
			_ => bail!("unknown array type {atype:x}"),
		}
	}

	pub(crate) fn to_atype(self) -> u8 {
		match self {
			ArrayType::Boolean => atype::T_BOOLEAN,
			ArrayType::Char    => atype::T_CHAR,
			ArrayType::Float   => atype::T_FLOAT,
			ArrayType::Double  => atype::T_DOUBLE,
			ArrayType::Byte    => atype::T_BYTE,
			ArrayType::Short   => atype::T_SHORT,
			ArrayType::Int     => atype::T_INT,
			ArrayType::Long    => atype::T_LONG,
		}
	}

	/// The internal name of the array class created.
	pub fn array_class_name(self) -> &'static str {
		match self {
			ArrayType::Boolean => "[Z",
			ArrayType::Char    => "[C",
			ArrayType::Float   => "[F",
			ArrayType::Double  => "[D",
			ArrayType::Byte    => "[B",
			ArrayType::Short   => "[S",
			ArrayType::Int     => "[I",
			ArrayType::Long    => "[J",
		}
	}
}
