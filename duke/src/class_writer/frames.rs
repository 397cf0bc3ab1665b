//! Computing the `StackMapTable` attribute, together with the `max_stack` item of the `Code` attribute.
//!
//! The analysis works on instruction indices instead of bytecode offsets, so that it can run before the bytecode is
//! written. It's a plain data flow analysis: each instruction gets the merge of all frames flowing into it.

use std::collections::{HashMap, VecDeque};
use anyhow::{anyhow, bail, Context, Result};
use crate::tree::class::ClassName;
use crate::tree::descriptor::{parse_field_descriptor, Type};
use crate::tree::method::{Method, MethodName};
use crate::tree::method::code::{Code, Instruction, Label, Loadable, LvIndex};

/// Finds the common super class of two classes, as needed for merging two frames.
///
/// Implementations are only asked for two distinct non-array classes.
pub trait CommonSuperClass {
	fn common_super_class(&self, a: &ClassName, b: &ClassName) -> Result<ClassName>;
}

impl<T: CommonSuperClass + ?Sized> CommonSuperClass for &T {
	fn common_super_class(&self, a: &ClassName, b: &ClassName) -> Result<ClassName> {
		(**self).common_super_class(a, b)
	}
}

/// A [`CommonSuperClass`] without any knowledge about the class hierarchy. Always answers `java/lang/Object`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectOnly;

impl CommonSuperClass for ObjectOnly {
	fn common_super_class(&self, a: &ClassName, b: &ClassName) -> Result<ClassName> {
		Ok(if a == b { a.clone() } else { ClassName::JAVA_LANG_OBJECT })
	}
}

const MAX_ITERATIONS: usize = 100_000;

/// The verification type of a local variable or stack entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FrameType {
	Top,
	Integer,
	Float,
	Long,
	Double,
	Null,
	UninitializedThis,
	Object(ClassName),
	/// The result of the `new` instruction at that instruction index, before the constructor got called.
	Uninitialized(usize),
}

impl FrameType {
	fn from_type(t: &Type) -> FrameType {
		match t {
			Type::B | Type::C | Type::I | Type::S | Type::Z => FrameType::Integer,
			Type::F => FrameType::Float,
			Type::J => FrameType::Long,
			Type::D => FrameType::Double,
			Type::Object(class_name) => FrameType::Object(class_name.clone()),
			array @ Type::Array(_, _) => FrameType::Object(ClassName::from(array.write())),
		}
	}

	fn from_descriptor(descriptor: &str) -> Result<FrameType> {
		Ok(FrameType::from_type(&parse_field_descriptor(descriptor)?))
	}

	fn is_category2(&self) -> bool {
		matches!(self, FrameType::Long | FrameType::Double)
	}

	fn size(&self) -> usize {
		if self.is_category2() { 2 } else { 1 }
	}
}

/// The locals and the stack before an instruction.
///
/// The locals are stored per slot, so a `long` is followed by a [`FrameType::Top`], while the stack stores one
/// entry per value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
	pub(crate) locals: Vec<FrameType>,
	pub(crate) stack: Vec<FrameType>,
}

impl Frame {
	fn pop(&mut self) -> Result<FrameType> {
		self.stack.pop().context("stack underflow")
	}

	fn pop_n(&mut self, n: usize) -> Result<()> {
		for _ in 0..n {
			self.pop()?;
		}
		Ok(())
	}

	/// Pops values taking exactly `slots` stack slots, returning them in stack order.
	fn pop_slots(&mut self, slots: usize) -> Result<Vec<FrameType>> {
		let mut popped = Vec::new();
		let mut size = 0;
		while size < slots {
			let value = self.pop()?;
			size += value.size();
			popped.push(value);
		}
		if size != slots {
			bail!("can't split a long or double on the stack, while popping {slots} slots: {popped:?}");
		}
		popped.reverse();
		Ok(popped)
	}

	fn push(&mut self, value: FrameType) {
		self.stack.push(value);
	}

	fn push_all(&mut self, values: &[FrameType]) {
		self.stack.extend_from_slice(values);
	}

	fn load(&self, index: LvIndex) -> Result<FrameType> {
		self.locals.get(index.index as usize).cloned()
			.with_context(|| anyhow!("local variable {} is out of bounds", index.index))
	}

	fn store(&mut self, index: LvIndex, value: FrameType) -> Result<()> {
		let index = index.index as usize;
		let size = value.size();
		if index + size > self.locals.len() {
			bail!("local variable {index} is out of bounds");
		}
		// storing into the upper half of a long or double destroys it
		if index > 0 && self.locals[index - 1].is_category2() {
			self.locals[index - 1] = FrameType::Top;
		}
		self.locals[index] = value;
		if size == 2 {
			self.locals[index + 1] = FrameType::Top;
		}
		Ok(())
	}

	fn stack_size(&self) -> usize {
		self.stack.iter().map(FrameType::size).sum()
	}

	/// Replaces every occurrence of `from` in the locals and the stack with `to`.
	fn replace(&mut self, from: &FrameType, to: &FrameType) {
		for value in self.locals.iter_mut().chain(self.stack.iter_mut()) {
			if value == from {
				*value = to.clone();
			}
		}
	}
}

/// Removes the [`FrameType::Top`] after each `long` and `double`, and trailing [`FrameType::Top`]s.
///
/// This is the form of the locals written in a `full_frame`.
pub(crate) fn compact_locals(locals: &[FrameType]) -> Vec<FrameType> {
	let mut out = Vec::with_capacity(locals.len());
	let mut i = 0;
	while i < locals.len() {
		out.push(locals[i].clone());
		i += locals[i].size();
	}
	while out.last() == Some(&FrameType::Top) {
		out.pop();
	}
	out
}

/// The result of the analysis of some code.
pub(crate) struct Analysis {
	/// The frame before each instruction, [`None`] if the instruction is unreachable.
	pub(crate) frames: Vec<Option<Frame>>,
	pub(crate) max_stack: u16,
}

struct Handler {
	start: usize,
	end: usize,
	handler: usize,
	catch: FrameType,
}

struct Analyzer<'a, S> {
	class_name: &'a ClassName,
	code: &'a Code,
	label_indices: HashMap<Label, usize>,
	super_classes: &'a S,
}

/// Computes the frame before each instruction and the maximum stack size.
pub(crate) fn analyze(
	class_name: &ClassName,
	method: &Method,
	code: &Code,
	max_locals: u16,
	super_classes: &impl CommonSuperClass,
) -> Result<Analysis> {
	if code.instructions.is_empty() {
		bail!("code has no instructions");
	}

	let analyzer = Analyzer {
		class_name,
		code,
		label_indices: code.label_indices(),
		super_classes,
	};

	let handlers = code.exception_table.iter()
		.map(|exception| Ok(Handler {
			start: analyzer.index_of(&exception.start)?,
			end: analyzer.index_of(&exception.end)?,
			handler: analyzer.index_of(&exception.handler)?,
			catch: FrameType::Object(exception.catch.clone().unwrap_or(ClassName::JAVA_LANG_THROWABLE)),
		}))
		.collect::<Result<Vec<_>>>()?;

	let initial = initial_frame(class_name, method, max_locals)?;

	let length = code.instructions.len();
	let mut frames: Vec<Option<Frame>> = vec![None; length];
	let mut in_worklist = vec![false; length];
	let mut worklist = VecDeque::new();

	frames[0] = Some(initial);
	in_worklist[0] = true;
	worklist.push_back(0);

	let mut max_stack = 0;
	let mut iterations = 0;
	while let Some(index) = worklist.pop_front() {
		in_worklist[index] = false;

		iterations += 1;
		if iterations > MAX_ITERATIONS {
			bail!("frame analysis exceeded iteration limit of {MAX_ITERATIONS}");
		}

		let frame = frames[index].clone()
			.with_context(|| anyhow!("no frame for instruction {index}"))?;
		let instruction = &code.instructions[index].instruction;

		let out = analyzer.execute(index, instruction, &frame)
			.with_context(|| anyhow!("failed to compute frame after instruction {index}: {instruction:?}, with frame {frame:?}"))?;
		max_stack = max_stack.max(frame.stack_size()).max(out.stack_size());

		for successor in analyzer.successors(index, instruction)? {
			// a subroutine returns to the instruction after the `jsr` with the stack as it was before
			let next = if matches!(instruction, Instruction::Jsr(_)) && successor == index + 1 { &frame } else { &out };
			analyzer.propagate(&mut frames, &mut worklist, &mut in_worklist, successor, next)?;
		}

		for handler in handlers.iter().filter(|handler| handler.start <= index && index < handler.end) {
			max_stack = max_stack.max(1);
			for locals in [&frame.locals, &out.locals] {
				let handler_frame = Frame {
					locals: locals.clone(),
					stack: vec![handler.catch.clone()],
				};
				analyzer.propagate(&mut frames, &mut worklist, &mut in_worklist, handler.handler, &handler_frame)?;
			}
		}
	}

	// unreachable code is replaced by `athrow`, with a frame holding a `Throwable`
	if frames.iter().any(Option::is_none) {
		max_stack = max_stack.max(1);
	}

	let max_stack = u16::try_from(max_stack)
		.with_context(|| anyhow!("maximum stack size {max_stack} is too large"))?;

	Ok(Analysis { frames, max_stack })
}

fn initial_frame(class_name: &ClassName, method: &Method, max_locals: u16) -> Result<Frame> {
	let mut locals = Vec::with_capacity(max_locals as usize);
	if !method.access.is_static {
		if method.name == MethodName::INIT && *class_name != ClassName::JAVA_LANG_OBJECT {
			locals.push(FrameType::UninitializedThis);
		} else {
			locals.push(FrameType::Object(class_name.clone()));
		}
	}
	for parameter in method.descriptor.parse()?.parameter_descriptors {
		let value = FrameType::from_type(&parameter);
		let size = value.size();
		locals.push(value);
		if size == 2 {
			locals.push(FrameType::Top);
		}
	}
	if locals.len() > max_locals as usize {
		bail!("parameters take {} local variable slots, but `max_locals` is {max_locals}", locals.len());
	}
	locals.resize(max_locals as usize, FrameType::Top);
	Ok(Frame { locals, stack: Vec::new() })
}

impl<S: CommonSuperClass> Analyzer<'_, S> {
	fn index_of(&self, label: &Label) -> Result<usize> {
		self.label_indices.get(label).copied()
			.with_context(|| anyhow!("label {label:?} is not on any instruction"))
	}

	fn propagate(
		&self,
		frames: &mut [Option<Frame>],
		worklist: &mut VecDeque<usize>,
		in_worklist: &mut [bool],
		target: usize,
		incoming: &Frame,
	) -> Result<()> {
		let changed = match &frames[target] {
			None => Some(incoming.clone()),
			Some(existing) => self.merge_frames(existing, incoming)
				.with_context(|| anyhow!("failed to merge frames at instruction {target}"))?,
		};
		if let Some(frame) = changed {
			frames[target] = Some(frame);
			if !in_worklist[target] {
				in_worklist[target] = true;
				worklist.push_back(target);
			}
		}
		Ok(())
	}

	/// Returns the merged frame, or [`None`] if merging didn't change `existing`.
	fn merge_frames(&self, existing: &Frame, incoming: &Frame) -> Result<Option<Frame>> {
		if existing.stack.len() != incoming.stack.len() {
			bail!("inconsistent stack heights: {:?} and {:?}", existing.stack, incoming.stack);
		}
		let merged = Frame {
			locals: existing.locals.iter().zip(&incoming.locals)
				.map(|(a, b)| self.merge_type(a, b))
				.collect::<Result<_>>()?,
			stack: existing.stack.iter().zip(&incoming.stack)
				.map(|(a, b)| self.merge_type(a, b))
				.collect::<Result<_>>()?,
		};
		Ok(if merged == *existing { None } else { Some(merged) })
	}

	fn merge_type(&self, a: &FrameType, b: &FrameType) -> Result<FrameType> {
		if a == b {
			return Ok(a.clone());
		}
		Ok(match (a, b) {
			(FrameType::Null, FrameType::Object(name)) | (FrameType::Object(name), FrameType::Null) => FrameType::Object(name.clone()),
			(FrameType::Object(a), FrameType::Object(b)) => FrameType::Object(self.merge_reference(a, b)?),
			_ => FrameType::Top,
		})
	}

	fn merge_reference(&self, a: &ClassName, b: &ClassName) -> Result<ClassName> {
		if a == b {
			return Ok(a.clone());
		}
		match (a.as_str().strip_prefix('['), b.as_str().strip_prefix('[')) {
			(None, None) => self.super_classes.common_super_class(a, b),
			(Some(a), Some(b)) => match (array_element_class(a), array_element_class(b)) {
				(Some(a), Some(b)) => Ok(array_of(&self.merge_reference(&a, &b)?)),
				_ => Ok(ClassName::JAVA_LANG_OBJECT),
			},
			_ => Ok(ClassName::JAVA_LANG_OBJECT),
		}
	}

	fn successors(&self, index: usize, instruction: &Instruction) -> Result<Vec<usize>> {
		let next = index + 1;
		let mut successors = Vec::new();
		let falls_through = match instruction {
			Instruction::Goto(label) => {
				successors.push(self.index_of(label)?);
				false
			},
			Instruction::Jsr(label) => {
				successors.push(self.index_of(label)?);
				true
			},
			Instruction::IfEq(label) | Instruction::IfNe(label) | Instruction::IfLt(label) |
			Instruction::IfGe(label) | Instruction::IfGt(label) | Instruction::IfLe(label) |
			Instruction::IfICmpEq(label) | Instruction::IfICmpNe(label) | Instruction::IfICmpLt(label) |
			Instruction::IfICmpGe(label) | Instruction::IfICmpGt(label) | Instruction::IfICmpLe(label) |
			Instruction::IfACmpEq(label) | Instruction::IfACmpNe(label) |
			Instruction::IfNull(label) | Instruction::IfNonNull(label) => {
				successors.push(self.index_of(label)?);
				true
			},
			Instruction::TableSwitch { default, table, .. } => {
				successors.push(self.index_of(default)?);
				for label in table {
					successors.push(self.index_of(label)?);
				}
				false
			},
			Instruction::LookupSwitch { default, pairs } => {
				successors.push(self.index_of(default)?);
				for (_, label) in pairs {
					successors.push(self.index_of(label)?);
				}
				false
			},
			Instruction::IReturn | Instruction::LReturn | Instruction::FReturn | Instruction::DReturn |
			Instruction::AReturn | Instruction::Return | Instruction::AThrow | Instruction::Ret(_) => false,
			_ => true,
		};
		if falls_through {
			if next >= self.code.instructions.len() {
				bail!("execution falls off the end of the code after instruction {index}");
			}
			successors.push(next);
		}
		// a label past the last instruction isn't a valid jump target
		if let Some(&out_of_bounds) = successors.iter().find(|&&successor| successor >= self.code.instructions.len()) {
			bail!("instruction {index} jumps to the end of the code at {out_of_bounds}");
		}
		successors.sort_unstable();
		successors.dedup();
		Ok(successors)
	}

	/// Computes the frame after an instruction.
	fn execute(&self, index: usize, instruction: &Instruction, frame: &Frame) -> Result<Frame> {
		let mut f = frame.clone();

		match instruction {
			Instruction::Nop => {},
			Instruction::AConstNull => f.push(FrameType::Null),
			Instruction::IConstM1 | Instruction::IConst0 | Instruction::IConst1 | Instruction::IConst2 |
			Instruction::IConst3 | Instruction::IConst4 | Instruction::IConst5 |
			Instruction::BiPush(_) | Instruction::SiPush(_) => f.push(FrameType::Integer),
			Instruction::LConst0 | Instruction::LConst1 => f.push(FrameType::Long),
			Instruction::FConst0 | Instruction::FConst1 | Instruction::FConst2 => f.push(FrameType::Float),
			Instruction::DConst0 | Instruction::DConst1 => f.push(FrameType::Double),
			Instruction::Ldc(loadable) => f.push(match loadable {
				Loadable::Integer(_) => FrameType::Integer,
				Loadable::Float(_) => FrameType::Float,
				Loadable::Long(_) => FrameType::Long,
				Loadable::Double(_) => FrameType::Double,
				Loadable::Class(_) => FrameType::Object(ClassName::JAVA_LANG_CLASS),
				Loadable::String(_) => FrameType::Object(ClassName::JAVA_LANG_STRING),
				Loadable::MethodHandle(_) => FrameType::Object(ClassName::JAVA_LANG_INVOKE_METHOD_HANDLE),
				Loadable::MethodType(_) => FrameType::Object(ClassName::JAVA_LANG_INVOKE_METHOD_TYPE),
				Loadable::Dynamic(dynamic) => FrameType::from_descriptor(dynamic.descriptor.as_str())?,
			}),
			&Instruction::ILoad(_) => f.push(FrameType::Integer),
			&Instruction::LLoad(_) => f.push(FrameType::Long),
			&Instruction::FLoad(_) => f.push(FrameType::Float),
			&Instruction::DLoad(_) => f.push(FrameType::Double),
			&Instruction::ALoad(lv) => {
				let value = f.load(lv)?;
				f.push(value);
			},
			Instruction::IALoad | Instruction::BALoad | Instruction::CALoad | Instruction::SALoad => {
				f.pop_n(2)?;
				f.push(FrameType::Integer);
			},
			Instruction::LALoad => {
				f.pop_n(2)?;
				f.push(FrameType::Long);
			},
			Instruction::FALoad => {
				f.pop_n(2)?;
				f.push(FrameType::Float);
			},
			Instruction::DALoad => {
				f.pop_n(2)?;
				f.push(FrameType::Double);
			},
			Instruction::AALoad => {
				f.pop()?;
				let array = f.pop()?;
				f.push(array_element(&array)?);
			},
			&Instruction::IStore(lv) | &Instruction::LStore(lv) | &Instruction::FStore(lv) |
			&Instruction::DStore(lv) | &Instruction::AStore(lv) => {
				let value = f.pop()?;
				f.store(lv, value)?;
			},
			Instruction::IAStore | Instruction::LAStore | Instruction::FAStore | Instruction::DAStore |
			Instruction::AAStore | Instruction::BAStore | Instruction::CAStore | Instruction::SAStore => f.pop_n(3)?,
			Instruction::Pop => { f.pop_slots(1)?; },
			Instruction::Pop2 => { f.pop_slots(2)?; },
			Instruction::Dup => {
				let a = f.pop_slots(1)?;
				f.push_all(&a);
				f.push_all(&a);
			},
			Instruction::DupX1 => {
				let a = f.pop_slots(1)?;
				let b = f.pop_slots(1)?;
				f.push_all(&a);
				f.push_all(&b);
				f.push_all(&a);
			},
			Instruction::DupX2 => {
				let a = f.pop_slots(1)?;
				let b = f.pop_slots(2)?;
				f.push_all(&a);
				f.push_all(&b);
				f.push_all(&a);
			},
			Instruction::Dup2 => {
				let a = f.pop_slots(2)?;
				f.push_all(&a);
				f.push_all(&a);
			},
			Instruction::Dup2X1 => {
				let a = f.pop_slots(2)?;
				let b = f.pop_slots(1)?;
				f.push_all(&a);
				f.push_all(&b);
				f.push_all(&a);
			},
			Instruction::Dup2X2 => {
				let a = f.pop_slots(2)?;
				let b = f.pop_slots(2)?;
				f.push_all(&a);
				f.push_all(&b);
				f.push_all(&a);
			},
			Instruction::Swap => {
				let a = f.pop_slots(1)?;
				let b = f.pop_slots(1)?;
				f.push_all(&a);
				f.push_all(&b);
			},
			Instruction::IAdd | Instruction::ISub | Instruction::IMul | Instruction::IDiv | Instruction::IRem |
			Instruction::IShl | Instruction::IShr | Instruction::IUShr | Instruction::IAnd | Instruction::IOr |
			Instruction::IXor | Instruction::FCmpL | Instruction::FCmpG | Instruction::DCmpL | Instruction::DCmpG |
			Instruction::LCmp => {
				f.pop_n(2)?;
				f.push(FrameType::Integer);
			},
			Instruction::LAdd | Instruction::LSub | Instruction::LMul | Instruction::LDiv | Instruction::LRem |
			Instruction::LShl | Instruction::LShr | Instruction::LUShr | Instruction::LAnd | Instruction::LOr |
			Instruction::LXor => {
				f.pop_n(2)?;
				f.push(FrameType::Long);
			},
			Instruction::FAdd | Instruction::FSub | Instruction::FMul | Instruction::FDiv | Instruction::FRem => {
				f.pop_n(2)?;
				f.push(FrameType::Float);
			},
			Instruction::DAdd | Instruction::DSub | Instruction::DMul | Instruction::DDiv | Instruction::DRem => {
				f.pop_n(2)?;
				f.push(FrameType::Double);
			},
			Instruction::INeg | Instruction::L2I | Instruction::F2I | Instruction::D2I |
			Instruction::I2B | Instruction::I2C | Instruction::I2S | Instruction::ArrayLength |
			Instruction::InstanceOf(_) => {
				f.pop()?;
				f.push(FrameType::Integer);
			},
			Instruction::LNeg | Instruction::I2L | Instruction::F2L | Instruction::D2L => {
				f.pop()?;
				f.push(FrameType::Long);
			},
			Instruction::FNeg | Instruction::I2F | Instruction::L2F | Instruction::D2F => {
				f.pop()?;
				f.push(FrameType::Float);
			},
			Instruction::DNeg | Instruction::I2D | Instruction::L2D | Instruction::F2D => {
				f.pop()?;
				f.push(FrameType::Double);
			},
			Instruction::IInc(_, _) => {},
			Instruction::IfEq(_) | Instruction::IfNe(_) | Instruction::IfLt(_) |
			Instruction::IfGe(_) | Instruction::IfGt(_) | Instruction::IfLe(_) |
			Instruction::IfNull(_) | Instruction::IfNonNull(_) |
			Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. } |
			Instruction::IReturn | Instruction::LReturn | Instruction::FReturn | Instruction::DReturn |
			Instruction::AReturn | Instruction::AThrow |
			Instruction::MonitorEnter | Instruction::MonitorExit => { f.pop()?; },
			Instruction::IfICmpEq(_) | Instruction::IfICmpNe(_) | Instruction::IfICmpLt(_) |
			Instruction::IfICmpGe(_) | Instruction::IfICmpGt(_) | Instruction::IfICmpLe(_) |
			Instruction::IfACmpEq(_) | Instruction::IfACmpNe(_) => f.pop_n(2)?,
			Instruction::Goto(_) | Instruction::Ret(_) | Instruction::Return => {},
			// the return address can't be represented in a frame
			Instruction::Jsr(_) => f.push(FrameType::Top),
			Instruction::GetStatic(field_ref) => f.push(FrameType::from_descriptor(field_ref.desc.as_str())?),
			Instruction::PutStatic(_) => { f.pop()?; },
			Instruction::GetField(field_ref) => {
				f.pop()?;
				f.push(FrameType::from_descriptor(field_ref.desc.as_str())?);
			},
			Instruction::PutField(_) => f.pop_n(2)?,
			Instruction::InvokeVirtual(method_ref) | Instruction::InvokeInterface(method_ref) |
			Instruction::InvokeSpecial(method_ref, _) | Instruction::InvokeStatic(method_ref, _) => {
				let desc = method_ref.desc.parse()?;
				f.pop_n(desc.parameter_descriptors.len())?;
				if !matches!(instruction, Instruction::InvokeStatic(_, _)) {
					let receiver = f.pop()?;
					if matches!(instruction, Instruction::InvokeSpecial(_, _)) && method_ref.name == MethodName::INIT {
						let initialized = match &receiver {
							FrameType::UninitializedThis => Some(FrameType::Object(self.class_name.clone())),
							&FrameType::Uninitialized(new_index) => Some(FrameType::Object(self.class_of_new(new_index)?)),
							_ => None,
						};
						if let Some(initialized) = initialized {
							f.replace(&receiver, &initialized);
						}
					}
				}
				if let Some(return_type) = &desc.return_descriptor {
					f.push(FrameType::from_type(return_type));
				}
			},
			Instruction::InvokeDynamic(invoke_dynamic) => {
				let desc = invoke_dynamic.descriptor.parse()?;
				f.pop_n(desc.parameter_descriptors.len())?;
				if let Some(return_type) = &desc.return_descriptor {
					f.push(FrameType::from_type(return_type));
				}
			},
			Instruction::New(_) => f.push(FrameType::Uninitialized(index)),
			Instruction::NewArray(array_type) => {
				f.pop()?;
				f.push(FrameType::Object(ClassName::from_static(array_type.array_class_name())));
			},
			Instruction::ANewArray(class_name) => {
				f.pop()?;
				f.push(FrameType::Object(array_of(class_name)));
			},
			Instruction::CheckCast(class_name) => {
				f.pop()?;
				f.push(FrameType::Object(class_name.clone()));
			},
			&Instruction::MultiANewArray(ref class_name, dimensions) => {
				f.pop_n(dimensions as usize)?;
				f.push(FrameType::Object(class_name.clone()));
			},
		}

		Ok(f)
	}

	fn class_of_new(&self, index: usize) -> Result<ClassName> {
		match self.code.instructions.get(index).map(|entry| &entry.instruction) {
			Some(Instruction::New(class_name)) => Ok(class_name.clone()),
			other => bail!("expected a `new` instruction at index {index}, got {other:?}"),
		}
	}
}

/// The class name of the element class of an array, given the array class name without the leading `[`.
///
/// Returns [`None`] for arrays of primitives.
fn array_element_class(element: &str) -> Option<ClassName> {
	if element.starts_with('[') {
		Some(ClassName::from(element))
	} else {
		element.strip_prefix('L')
			.and_then(|x| x.strip_suffix(';'))
			.map(ClassName::from)
	}
}

/// The class name of an array with elements of the given class.
fn array_of(class_name: &ClassName) -> ClassName {
	if class_name.as_str().starts_with('[') {
		ClassName::from(format!("[{class_name}"))
	} else {
		ClassName::from(format!("[L{class_name};"))
	}
}

fn array_element(array: &FrameType) -> Result<FrameType> {
	match array {
		FrameType::Object(class_name) => match class_name.as_str().strip_prefix('[') {
			Some(element) => FrameType::from_descriptor(element),
			None => bail!("`aaload` on non-array type {class_name}"),
		},
		// the verifier allows this, it fails at runtime
		FrameType::Null => Ok(FrameType::Null),
		other => bail!("`aaload` on {other:?}"),
	}
}
