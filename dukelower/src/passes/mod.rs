//! The lowering passes.
//!
//! Each pass takes a class and gives it back, either untouched or rewritten. Passes are selected by the
//! [`Release`][crate::release::Release] table, and run by the [`Converter`][crate::converter::Converter].

use std::fmt::{Display, Formatter};
use anyhow::{anyhow, Context, Result};
use duke::tree::class::ClassFile;

mod bootstrap;
pub mod attributes;
pub mod explicit_constants;
pub mod match_exception;
pub mod modules;
pub mod nests;
pub mod records;
pub mod sealed;
pub mod strictfp;
pub mod string_concat;
pub mod switch_patterns;
pub mod widen;

/// The result of running a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Lowered {
	/// The pass had nothing to do.
	Unchanged(ClassFile),
	Changed(ClassFile),
}

impl Lowered {
	fn new(class: ClassFile, changed: bool) -> Lowered {
		if changed {
			Lowered::Changed(class)
		} else {
			Lowered::Unchanged(class)
		}
	}

	pub fn is_changed(&self) -> bool {
		matches!(self, Lowered::Changed(_))
	}

	pub fn class(&self) -> &ClassFile {
		match self {
			Lowered::Unchanged(class) | Lowered::Changed(class) => class,
		}
	}

	pub fn into_class(self) -> ClassFile {
		match self {
			Lowered::Unchanged(class) | Lowered::Changed(class) => class,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
	/// Drops the module attributes.
	ModuleRemover,
	/// Replaces `invokedynamic` to `StringConcatFactory` with `StringBuilder` calls.
	DynamicStringConcat,
	/// Replaces dynamic constants with lazily initialized static fields.
	ExplicitConstants,
	/// Opens up private members to the package, as nest mates can't access them anymore.
	NestHostToPackage,
	/// Turns a record into a normal class, generating `equals`, `hashCode` and `toString`.
	RecordToClass,
	/// Sets `ACC_STRICT` on all methods with code, as all floating point was strict from java 17 on.
	AlwaysStrictFp,
	/// Drops the `PermittedSubclasses` attribute.
	UnsealClasses,
	/// Replaces `invokedynamic` to `SwitchBootstraps` with a method testing the cases one by one.
	DynamicSwitchPatterns,
	/// Replaces `java/lang/MatchException` with `java/lang/RuntimeException`.
	MatchExceptionFixer,
	/// Drops all attributes not understood by the class writer.
	RemoveAttributes,
}

impl Pass {
	pub fn name(self) -> &'static str {
		match self {
			Pass::ModuleRemover => "ModuleRemover",
			Pass::DynamicStringConcat => "DynamicStringConcat",
			Pass::ExplicitConstants => "ExplicitConstants",
			Pass::NestHostToPackage => "NestHostToPackage",
			Pass::RecordToClass => "RecordToClass",
			Pass::AlwaysStrictFp => "AlwaysStrictFP",
			Pass::UnsealClasses => "UnsealClasses",
			Pass::DynamicSwitchPatterns => "DynamicSwitchPatterns",
			Pass::MatchExceptionFixer => "MatchExceptionFixer",
			Pass::RemoveAttributes => "RemoveAttributes",
		}
	}

	pub fn apply(self, mut class: ClassFile) -> Result<Lowered> {
		let changed = match self {
			Pass::ModuleRemover => modules::remove_module(&mut class),
			Pass::DynamicStringConcat => string_concat::lower_string_concat(&mut class),
			Pass::ExplicitConstants => explicit_constants::lower_dynamic_constants(&mut class),
			Pass::NestHostToPackage => nests::nest_host_to_package(&mut class),
			Pass::RecordToClass => records::record_to_class(&mut class),
			Pass::AlwaysStrictFp => strictfp::always_strict(&mut class),
			Pass::UnsealClasses => sealed::unseal(&mut class),
			Pass::DynamicSwitchPatterns => switch_patterns::lower_switch_patterns(&mut class),
			Pass::MatchExceptionFixer => match_exception::replace_match_exception(&mut class),
			Pass::RemoveAttributes => attributes::remove_attributes(&mut class),
		}.with_context(|| anyhow!("failed to run {self} on {}", class.name))?;
		Ok(Lowered::new(class, changed))
	}
}

impl Display for Pass {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

#[cfg(test)]
pub(crate) mod testing {
	use std::collections::{HashMap, HashSet};
	use duke::tree::class::{ClassAccess, ClassFile, ClassName};
	use duke::tree::method::{Method, MethodAccess, MethodDescriptor, MethodName, MethodRef};
	use duke::tree::method::code::{Code, Instruction, Label, Loadable};
	use duke::tree::version::Version;
	use duke::ObjectOnly;
	use crate::codegen::jump_labels_mut;

	pub(crate) fn class(name: &str, version: Version) -> ClassFile {
		ClassFile::new(version, ClassAccess::from(0x0021), ClassName::from(name), Some(ClassName::JAVA_LANG_OBJECT), Vec::new())
	}

	pub(crate) fn method(access: u16, name: &str, desc: &str, instructions: Vec<Instruction>) -> Method {
		let mut method = Method::new(MethodAccess::from(access), MethodName::from(name), MethodDescriptor::from(desc));
		method.code = Some(Code {
			instructions: instructions.into_iter().map(Into::into).collect(),
			..Code::default()
		});
		method
	}

	pub(crate) fn instructions(method: &Method) -> Vec<Instruction> {
		method.code.iter()
			.flat_map(|code| &code.instructions)
			.map(|entry| entry.instruction.clone())
			.collect()
	}

	/// Writes the class with frames, and reads it back. This fails if the generated code can't be analyzed.
	pub(crate) fn write_and_read(class: &ClassFile) -> ClassFile {
		let bytes = duke::write_class_to_vec(class, duke::WriterOptions::default(), &ObjectOnly).unwrap();
		duke::read_class_from_slice(&bytes).unwrap()
	}

	/// A value seen by [`Machine`]. Boxed integers are plain [`Value::Int`]s.
	#[derive(Debug, Clone, PartialEq)]
	pub(crate) enum Value {
		Int(i32),
		Long(i64),
		Null,
		String(String),
		/// Any other object. Enum constants carry their name, results of calls the name of the method.
		Object { class: String, name: String },
		Builder(String),
		Uninitialized(String),
	}

	impl Value {
		pub(crate) fn string(value: &str) -> Value {
			Value::String(value.to_owned())
		}

		pub(crate) fn constant(class: &str, name: &str) -> Value {
			Value::Object { class: class.to_owned(), name: name.to_owned() }
		}

		fn text(&self) -> String {
			match self {
				Value::Int(value) => value.to_string(),
				Value::Long(value) => value.to_string(),
				Value::Null => "null".to_owned(),
				Value::String(value) | Value::Builder(value) => value.clone(),
				Value::Object { name, .. } => name.clone(),
				Value::Uninitialized(class) => panic!("uninitialized {class} used"),
			}
		}

		fn is_instance_of(&self, class: &ClassName) -> bool {
			let class = class.as_str();
			class == "java/lang/Object" || match self {
				Value::Int(_) => matches!(class, "java/lang/Integer" | "java/lang/Number"),
				Value::String(_) => matches!(class, "java/lang/String" | "java/lang/CharSequence"),
				Value::Builder(_) => class == "java/lang/StringBuilder",
				Value::Object { class: own, .. } => own == class,
				Value::Long(_) | Value::Null | Value::Uninitialized(_) => false,
			}
		}
	}

	fn string_constant(loadable: &Loadable) -> Value {
		match loadable {
			Loadable::Integer(value) => Value::Int(*value),
			Loadable::Long(value) => Value::Long(*value),
			Loadable::String(value) => Value::String(value.clone().into_string().unwrap()),
			Loadable::Class(_) => Value::constant("java/lang/Class", ""),
			other => panic!("can't load {other:?}"),
		}
	}

	/// Steps through generated code, knowing just enough of the JVM for string building, switches and lazily
	/// initialized statics. Static calls to anything are recorded, and give an object named like the method.
	#[derive(Debug, Default)]
	pub(crate) struct Machine {
		pub(crate) statics: HashMap<String, Value>,
		pub(crate) calls: Vec<MethodRef>,
		pub(crate) held_monitors: usize,
	}

	impl Machine {
		pub(crate) fn run(&mut self, method: &Method, arguments: Vec<Value>) -> Value {
			let code = method.code.as_ref().unwrap();
			let labels = code.label_indices();

			let mut locals = HashMap::new();
			let mut slot = 0;
			for argument in arguments {
				let size = if matches!(argument, Value::Long(_)) { 2 } else { 1 };
				locals.insert(slot, argument);
				slot += size;
			}

			let mut stack = Vec::new();
			let mut index = 0;
			for _ in 0..10_000 {
				let instruction = &code.instructions[index].instruction;
				index += 1;
				let mut jump = |condition: bool, label: &Label| if condition { index = labels[label] };

				match instruction {
					Instruction::AConstNull => stack.push(Value::Null),
					Instruction::IConstM1 => stack.push(Value::Int(-1)),
					Instruction::IConst0 => stack.push(Value::Int(0)),
					Instruction::IConst1 => stack.push(Value::Int(1)),
					Instruction::IConst2 => stack.push(Value::Int(2)),
					Instruction::IConst3 => stack.push(Value::Int(3)),
					Instruction::IConst4 => stack.push(Value::Int(4)),
					Instruction::IConst5 => stack.push(Value::Int(5)),
					Instruction::BiPush(value) => stack.push(Value::Int(i32::from(*value))),
					Instruction::SiPush(value) => stack.push(Value::Int(i32::from(*value))),
					Instruction::Ldc(loadable) => stack.push(string_constant(loadable)),
					Instruction::ILoad(lv) | Instruction::LLoad(lv) | Instruction::ALoad(lv) => stack.push(locals[&lv.index].clone()),
					Instruction::IStore(lv) | Instruction::AStore(lv) => {
						locals.insert(lv.index, stack.pop().unwrap());
					},
					Instruction::Pop => {
						stack.pop().unwrap();
					},
					Instruction::Dup => stack.push(stack.last().unwrap().clone()),
					Instruction::New(class) => stack.push(Value::Uninitialized(class.as_str().to_owned())),
					// results of recorded calls have no real type
					Instruction::CheckCast(_) => {},
					Instruction::InstanceOf(class) => {
						let value = stack.pop().unwrap();
						stack.push(Value::Int(i32::from(value.is_instance_of(class))));
					},
					Instruction::GetStatic(field) => {
						let key = format!("{}.{}", field.class, field.name);
						let default = if field.desc == "Z" || field.desc == "I" { Value::Int(0) } else { Value::Null };
						stack.push(self.statics.get(&key).cloned().unwrap_or(default));
					},
					Instruction::PutStatic(field) => {
						self.statics.insert(format!("{}.{}", field.class, field.name), stack.pop().unwrap());
					},
					Instruction::MonitorEnter => {
						assert_ne!(stack.pop().unwrap(), Value::Null, "monitorenter on null");
						self.held_monitors += 1;
					},
					Instruction::MonitorExit => {
						stack.pop().unwrap();
						self.held_monitors -= 1;
					},
					Instruction::InvokeSpecial(method, _) if method.name == "<init>" => {
						let parameters = method.desc.parse().unwrap().parameter_descriptors.len();
						stack.truncate(stack.len() - parameters - 1);
						let Some(Value::Uninitialized(class)) = stack.pop() else { panic!("<init> on an initialized value") };
						stack.push(if class == "java/lang/StringBuilder" {
							Value::Builder(String::new())
						} else {
							Value::constant(&class, "")
						});
					},
					Instruction::InvokeStatic(method, _) => {
						let desc = method.desc.parse().unwrap();
						stack.truncate(stack.len() - desc.parameter_descriptors.len());
						self.calls.push(method.clone());
						if desc.return_descriptor.is_some() {
							stack.push(Value::constant(method.class.as_str(), method.name.as_str()));
						}
					},
					Instruction::InvokeVirtual(method) => {
						let value = match (method.class.as_str(), method.name.as_str()) {
							("java/lang/StringBuilder", "append") => {
								let value = stack.pop().unwrap();
								let Some(Value::Builder(mut text)) = stack.pop() else { panic!("append to a non builder") };
								match (method.desc.as_str(), value) {
									("(C)Ljava/lang/StringBuilder;", Value::Int(c)) => text.push(char::from_u32(c as u32).unwrap()),
									(_, value) => text.push_str(&value.text()),
								}
								Value::Builder(text)
							},
							("java/lang/StringBuilder", "toString") => Value::String(stack.pop().unwrap().text()),
							("java/lang/Integer", "intValue") => stack.pop().unwrap(),
							(_, "equals") => {
								let other = stack.pop().unwrap();
								let this = stack.pop().unwrap();
								assert_ne!(this, Value::Null, "equals called on null");
								Value::Int(i32::from(this == other))
							},
							(_, "name") => match stack.pop().unwrap() {
								Value::Object { name, .. } => Value::String(name),
								other => panic!("name() called on {other:?}"),
							},
							_ => panic!("can't call {method:?}"),
						};
						stack.push(value);
					},
					Instruction::IfEq(label) => jump(stack.pop() == Some(Value::Int(0)), label),
					Instruction::IfNe(label) => jump(stack.pop() != Some(Value::Int(0)), label),
					Instruction::IfNull(label) => jump(stack.pop() == Some(Value::Null), label),
					Instruction::IfNonNull(label) => jump(stack.pop() != Some(Value::Null), label),
					Instruction::IfICmpEq(label) | Instruction::IfICmpNe(label) | Instruction::IfICmpLt(label) => {
						let (Some(Value::Int(b)), Some(Value::Int(a))) = (stack.pop(), stack.pop()) else { panic!("int compare on non ints") };
						let condition = match instruction {
							Instruction::IfICmpEq(_) => a == b,
							Instruction::IfICmpNe(_) => a != b,
							_ => a < b,
						};
						jump(condition, label);
					},
					Instruction::Goto(label) => jump(true, label),
					Instruction::IReturn | Instruction::LReturn | Instruction::AReturn => return stack.pop().unwrap(),
					Instruction::Return => return Value::Null,
					other => panic!("can't step {other:?}"),
				}
			}
			panic!("{} doesn't return", method.name)
		}
	}

	/// Follows every path through the code, including the jumps to exception handlers, and checks that no path returns
	/// or throws while holding a monitor. Any call made while holding a monitor must be covered by a catch-all handler.
	pub(crate) fn assert_monitors_released(code: &Code) {
		let labels = &code.label_indices();
		let covering = |index: usize| code.exception_table.iter()
			.filter(move |exception| labels[&exception.start] <= index && index < labels[&exception.end]);

		let mut seen = HashSet::new();
		let mut work = vec![(0usize, 0usize)];
		while let Some((index, held)) = work.pop() {
			if !seen.insert((index, held)) {
				continue;
			}
			let instruction = &code.instructions[index].instruction;

			for exception in covering(index) {
				work.push((labels[&exception.handler], held));
			}
			if held > 0 && matches!(instruction, Instruction::InvokeStatic(..) | Instruction::InvokeVirtual(_) |
				Instruction::InvokeSpecial(..) | Instruction::InvokeInterface(_) | Instruction::InvokeDynamic(_)) {
				assert!(covering(index).any(|exception| exception.catch.is_none()),
					"{instruction:?} at {index} can throw while a monitor is held");
			}

			let held = match instruction {
				Instruction::MonitorEnter => held + 1,
				Instruction::MonitorExit => held.checked_sub(1).unwrap_or_else(|| panic!("monitorexit at {index} without monitorenter")),
				_ => held,
			};

			let mut copy = instruction.clone();
			let targets: Vec<_> = jump_labels_mut(&mut copy).into_iter().map(|label| labels[&*label]).collect();
			match instruction {
				Instruction::Return | Instruction::IReturn | Instruction::LReturn | Instruction::FReturn |
				Instruction::DReturn | Instruction::AReturn | Instruction::AThrow => {
					assert_eq!(held, 0, "{instruction:?} at {index} leaves a monitor held");
				},
				Instruction::Goto(_) | Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. } => {
					work.extend(targets.into_iter().map(|target| (target, held)));
				},
				_ => {
					work.extend(targets.into_iter().map(|target| (target, held)));
					work.push((index + 1, held));
				},
			}
		}
	}
}
