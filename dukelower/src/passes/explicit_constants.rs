//! Replacing dynamic constants (`CONSTANT_Dynamic`) with static fields initialized on first use.
//!
//! Every distinct constant gets three fields and an accessor method:
//! - `constant$<name>$<n>`, the value,
//! - `has$constant$<name>$<n>`, telling whether the value was computed,
//! - `lock$constant$<name>$<n>`, an object guarding the computation, created in `<clinit>`.
//!
//! The accessor `constant$<name>$<n>` computes the value at most once, holding the lock while calling the bootstrap
//! method. An `ldc` of the constant becomes a call to the accessor.
//!
//! An `invokedynamic` can't use dynamic constants as bootstrap arguments anymore, so its bootstrap method is replaced by
//! a "bouncer" method `indyconstant$<name>$<n>` that loads the arguments itself and calls the old bootstrap method.

use anyhow::{anyhow, bail, Context, Result};
use duke::tree::class::{ClassFile, ClassName};
use duke::tree::descriptor::Type;
use duke::tree::field::{Field, FieldAccess, FieldDescriptor, FieldName};
use duke::tree::method::{Method, MethodAccess, MethodDescriptor, MethodName, MethodRef};
use duke::tree::method::code::{Code, ConstantDynamic, Handle, Instruction, InstructionListEntry, InvokeDynamic, Loadable, LvIndex};
use crate::codegen::{field_ref, handle_parameter_types, handle_return_type, loadable_type, CodeBuilder, LOOKUP_DESC};
use crate::passes::bootstrap::{synthetic_method_access, UniqueNames};

const CONSTANT_BOOTSTRAPS: &str = "java/lang/invoke/ConstantBootstraps";
const NULL_CONSTANT_DESC: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/Class;)Ljava/lang/Object;";
const BOUNCER_DESC: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;";
const CALL_SITE: &str = "java/lang/invoke/CallSite";
const BOOTSTRAP_METHOD_ERROR: &str = "java/lang/BootstrapMethodError";
const LOCK_DESC: &str = "Ljava/lang/Object;";

pub(crate) fn lower_dynamic_constants(class: &mut ClassFile) -> Result<bool> {
	let mut constants = Constants {
		class_name: class.name.clone(),
		is_interface: class.access.is_interface,
		entries: Vec::new(),
		names: UniqueNames::new(class),
	};
	let mut bouncers = Vec::new();

	for method in &mut class.methods {
		let Some(code) = &mut method.code else { continue };
		constants.replace_in(code, &mut bouncers)
			.with_context(|| anyhow!("in method {}{}", method.name, method.descriptor))?;
	}

	if constants.entries.is_empty() && bouncers.is_empty() {
		return Ok(false);
	}
	// interface fields are always final, so there's no place to cache the value
	if class.access.is_interface {
		if let Some((constant, _)) = constants.entries.iter().find(|(_, entry)| matches!(entry, Entry::Bootstrapped { .. })) {
			bail!("Can't cache dynamic constant {} in interface {}, interface fields can't be assigned lazily", constant.name, class.name);
		}
	}

	let method_access = synthetic_method_access(class);
	let mut methods = Vec::new();
	for bouncer in &bouncers {
		let code = constants.bouncer(bouncer)
			.with_context(|| anyhow!("failed to generate bouncer {} for {:?}", bouncer.name, bouncer.handle))?;
		let mut method = Method::new(method_access, MethodName::from(bouncer.name.as_str()), MethodDescriptor::from(BOUNCER_DESC));
		method.code = Some(code);
		methods.push(method);
	}

	// accessors may need accessors for other constants, so the list grows while going over it
	let mut fields = Vec::new();
	let mut next = 0;
	while let Some((constant, entry)) = constants.entries.get(next).cloned() {
		next += 1;
		let Entry::Bootstrapped { name } = entry else { continue };
		let code = constants.accessor(&name, &constant)
			.with_context(|| anyhow!("failed to generate accessor {name} for {constant:?}"))?;
		let mut method = Method::new(method_access, MethodName::from(name.as_str()), accessor_desc(&constant));
		method.code = Some(code);
		methods.push(method);
		fields.extend(constant_fields(&name, &constant));
	}

	let locks: Vec<_> = constants.entries.iter()
		.filter_map(|(_, entry)| match entry {
			Entry::Bootstrapped { name } => Some(name.clone()),
			Entry::Null => None,
		})
		.collect();
	if !locks.is_empty() {
		let index = match class.methods.iter().position(|method| method.name == MethodName::CLINIT && method.descriptor == "()V") {
			Some(index) => index,
			None => {
				let mut access = MethodAccess::default();
				access.is_static = true;
				let mut clinit = Method::new(access, MethodName::CLINIT, MethodDescriptor::from("()V"));
				clinit.code = Some(Code {
					instructions: vec![Instruction::Return.into()],
					..Code::default()
				});
				class.methods.push(clinit);
				class.methods.len() - 1
			},
		};
		let code = class.methods[index].code.as_mut().context("static initializer has no code")?;
		let body = std::mem::take(&mut code.instructions);
		code.instructions = locks.iter()
			.flat_map(|name| create_lock(&class.name, name))
			.chain(body)
			.collect();
	}

	class.fields.extend(fields);
	class.methods.extend(methods);
	Ok(true)
}

/// How a dynamic constant is loaded after the rewrite.
#[derive(Debug, Clone)]
enum Entry {
	/// `ConstantBootstraps.nullConstant`, just an `aconst_null`.
	Null,
	/// Through the accessor and fields of the given name.
	Bootstrapped { name: String },
}

struct Bouncer {
	name: String,
	handle: Handle,
	arguments: Vec<Loadable>,
}

/// Where the lookup, name and type come from when calling a bootstrap method.
enum Leading<'a> {
	/// For a dynamic constant, computed by the accessor.
	Constant(&'a ConstantDynamic),
	/// For an `invokedynamic`, passed as arguments to the bouncer.
	Arguments,
}

struct Constants {
	class_name: ClassName,
	is_interface: bool,
	/// Dynamic constants can't be hashed (they hold floating point numbers), but equality is enough here.
	entries: Vec<(ConstantDynamic, Entry)>,
	names: UniqueNames,
}

impl Constants {
	fn entry(&mut self, constant: &ConstantDynamic) -> Result<Entry> {
		if let Some((_, entry)) = self.entries.iter().find(|(c, _)| c == constant) {
			return Ok(entry.clone());
		}

		let entry = if constant.handle.is_method(CONSTANT_BOOTSTRAPS, "nullConstant", NULL_CONSTANT_DESC) {
			if !constant.descriptor.parse()?.is_reference() {
				bail!("Null constant on primitive in {}: {constant:?}", self.class_name);
			}
			Entry::Null
		} else {
			let name = self.names.next(&format!("constant${}$", constant.name), &["has$", "lock$"]);
			Entry::Bootstrapped { name }
		};
		self.entries.push((constant.clone(), entry.clone()));
		Ok(entry)
	}

	/// Returns the instruction replacing an `ldc` of the constant.
	fn load(&mut self, constant: &ConstantDynamic) -> Result<Instruction> {
		Ok(match self.entry(constant)? {
			Entry::Null => Instruction::AConstNull,
			Entry::Bootstrapped { name } => Instruction::InvokeStatic(MethodRef {
				class: self.class_name.clone(),
				name: MethodName::from(name),
				desc: accessor_desc(constant),
			}, self.is_interface),
		})
	}

	fn replace_in(&mut self, code: &mut Code, bouncers: &mut Vec<Bouncer>) -> Result<()> {
		for entry in &mut code.instructions {
			match &entry.instruction {
				Instruction::Ldc(Loadable::Dynamic(constant)) => {
					entry.instruction = self.load(constant)?;
				},
				Instruction::InvokeDynamic(indy) if indy.arguments.iter().any(|arg| matches!(arg, Loadable::Dynamic(_))) => {
					let name = self.names.next(&format!("indyconstant${}$", indy.name), &[]);
					let handle = Handle::InvokeStatic(MethodRef {
						class: self.class_name.clone(),
						name: MethodName::from(name.as_str()),
						desc: MethodDescriptor::from(BOUNCER_DESC),
					}, self.is_interface);
					bouncers.push(Bouncer {
						name,
						handle: indy.handle.clone(),
						arguments: indy.arguments.clone(),
					});
					entry.instruction = Instruction::InvokeDynamic(InvokeDynamic {
						name: indy.name.clone(),
						descriptor: indy.descriptor.clone(),
						handle,
						arguments: Vec::new(),
					});
				},
				_ => {},
			}
		}
		Ok(())
	}

	/// The accessor, using double checked locking around the bootstrap call.
	fn accessor(&mut self, name: &str, constant: &ConstantDynamic) -> Result<Code> {
		let ty = constant.descriptor.parse()?;
		let value = field_ref(self.class_name.clone(), name, constant.descriptor.clone());
		let has = field_ref(self.class_name.clone(), format!("has${name}"), "Z");
		let lock = field_ref(self.class_name.clone(), format!("lock${name}"), LOCK_DESC);
		let lock_local = LvIndex { index: 0 };
		let exception_local = LvIndex { index: 1 };

		let mut code = CodeBuilder::new();
		let done = code.new_label();
		let unlock = code.new_label();
		let try_start = code.new_label();
		let try_end = code.new_label();
		let handler = code.new_label();

		code.push(Instruction::GetStatic(has.clone()));
		code.push(Instruction::IfNe(done));

		code.push(Instruction::GetStatic(lock));
		code.push(Instruction::Dup);
		code.push(Instruction::AStore(lock_local));
		code.push(Instruction::MonitorEnter);

		code.place(try_start);
		code.push(Instruction::GetStatic(has.clone()));
		code.push(Instruction::IfNe(unlock));
		self.call_bootstrap(&mut code, &constant.handle, Leading::Constant(constant), &constant.arguments, &ty)?;
		code.push(Instruction::PutStatic(value.clone()));
		code.push(Instruction::IConst1);
		code.push(Instruction::PutStatic(has));

		code.place(unlock);
		code.push(Instruction::ALoad(lock_local));
		code.push(Instruction::MonitorExit);
		code.place(try_end);
		code.push(Instruction::Goto(done));

		code.place(handler);
		code.push(Instruction::AStore(exception_local));
		code.push(Instruction::ALoad(lock_local));
		code.push(Instruction::MonitorExit);
		code.push(Instruction::New(ClassName::from(BOOTSTRAP_METHOD_ERROR)));
		code.push(Instruction::Dup);
		code.push(Instruction::ALoad(exception_local));
		code.invoke_special(BOOTSTRAP_METHOD_ERROR, "<init>", "(Ljava/lang/Throwable;)V");
		code.push(Instruction::AThrow);

		code.place(done);
		code.push(Instruction::GetStatic(value));
		code.return_value(Some(&ty));

		code.try_catch(try_start, try_end, handler, None);
		Ok(code.finish())
	}

	/// The bouncer, taking the lookup, name and type of the `invokedynamic` and calling the old bootstrap method.
	fn bouncer(&mut self, bouncer: &Bouncer) -> Result<Code> {
		let mut code = CodeBuilder::new();
		let call_site = Type::Object(ClassName::from(CALL_SITE));
		self.call_bootstrap(&mut code, &bouncer.handle, Leading::Arguments, &bouncer.arguments, &call_site)?;
		code.return_value(Some(&call_site));
		Ok(code.finish())
	}

	/// Calls a bootstrap method, leaving its result, converted to `result`, on the stack.
	///
	/// Only as many of the lookup, name and type are passed as the bootstrap method takes. Static arguments that don't
	/// fit the parameters are collected into the trailing array parameter, like a variable arity call would.
	fn call_bootstrap(&mut self, code: &mut CodeBuilder, handle: &Handle, leading: Leading, arguments: &[Loadable], result: &Type) -> Result<()> {
		let parameters = handle_parameter_types(handle)?;

		code.call_handle_before_args(handle);

		let leading_types = [
			Type::Object(ClassName::from(&LOOKUP_DESC[1..LOOKUP_DESC.len() - 1])),
			Type::Object(ClassName::JAVA_LANG_STRING),
			match leading {
				Leading::Constant(_) => Type::Object(ClassName::JAVA_LANG_CLASS),
				Leading::Arguments => Type::Object(ClassName::JAVA_LANG_INVOKE_METHOD_TYPE),
			},
		];
		for (index, (parameter, ty)) in parameters.iter().zip(&leading_types).enumerate() {
			match (&leading, index) {
				(Leading::Constant(_), 0) => code.invoke_static("java/lang/invoke/MethodHandles", "lookup", &format!("(){LOOKUP_DESC}")),
				(Leading::Constant(constant), 1) => code.push(Instruction::Ldc(Loadable::String(constant.name.as_str().into()))),
				(Leading::Constant(constant), _) => code.load_class_ref(&constant.descriptor.parse()?)?,
				(Leading::Arguments, index) => code.push(Instruction::ALoad(LvIndex { index: index as u16 })),
			}
			code.adapt(ty, parameter)?;
		}

		let rest = parameters.get(3..).unwrap_or_default();
		let packed = match rest.last() {
			Some(last @ Type::Array(_, _)) =>
				arguments.len() != rest.len() ||
					arguments.last().map(loadable_type).transpose()?.is_some_and(|ty| !ty.is_reference() || ty != *last),
			_ => false,
		};
		let fixed = if packed { rest.len() - 1 } else { rest.len() };
		if arguments.len() < fixed || (!packed && arguments.len() != fixed && !rest.is_empty()) {
			bail!("bootstrap method {handle:?} takes {} static arguments, but {} are given", rest.len(), arguments.len());
		}

		for (argument, parameter) in arguments.iter().zip(&rest[..fixed]) {
			self.load_argument(code, argument, parameter)?;
		}
		if packed {
			let array = &rest[fixed];
			let element = array.element_type().context("trailing parameter isn't an array")?;
			let element_class = element.internal_name()
				.with_context(|| anyhow!("can't collect static arguments into a primitive array {array:?}"))?;
			let varargs = &arguments[fixed..];
			code.push_int(varargs.len() as i32);
			code.push(Instruction::ANewArray(element_class));
			for (index, argument) in varargs.iter().enumerate() {
				code.push(Instruction::Dup);
				code.push_int(index as i32);
				self.load_argument(code, argument, &element)?;
				code.push(Instruction::AAStore);
			}
		}

		code.call_handle_after_args(handle);

		let returned = handle_return_type(handle)?
			.with_context(|| anyhow!("bootstrap method {handle:?} returns nothing"))?;
		code.adapt(&returned, result)
	}

	fn load_argument(&mut self, code: &mut CodeBuilder, argument: &Loadable, parameter: &Type) -> Result<()> {
		let instruction = match argument {
			Loadable::Dynamic(constant) => self.load(constant)?,
			argument => Instruction::Ldc(argument.clone()),
		};
		code.push(instruction);
		code.adapt(&loadable_type(argument)?, parameter)
	}
}

fn accessor_desc(constant: &ConstantDynamic) -> MethodDescriptor {
	MethodDescriptor::from(format!("(){}", constant.descriptor))
}

fn constant_fields(name: &str, constant: &ConstantDynamic) -> [Field; 3] {
	let mut access = FieldAccess::default();
	access.is_private = true;
	access.is_static = true;
	access.is_synthetic = true;

	let mut volatile = access;
	volatile.is_volatile = true;
	let mut fin = access;
	fin.is_final = true;

	[
		Field::new(volatile, FieldName::from(name), constant.descriptor.clone()),
		Field::new(volatile, FieldName::from(format!("has${name}")), FieldDescriptor::from("Z")),
		Field::new(fin, FieldName::from(format!("lock${name}")), FieldDescriptor::from(LOCK_DESC)),
	]
}

fn create_lock(class_name: &ClassName, name: &str) -> Vec<InstructionListEntry> {
	let mut code = CodeBuilder::new();
	code.construct(ClassName::JAVA_LANG_OBJECT.as_str());
	code.push(Instruction::PutStatic(field_ref(class_name.clone(), format!("lock${name}"), LOCK_DESC)));
	code.finish().instructions
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use duke::tree::class::ClassName;
	use duke::tree::method::code::{ConstantDynamic, Handle, Instruction, InvokeDynamic, Loadable, LvIndex};
	use duke::tree::method::{MethodName, MethodRef};
	use duke::tree::version::Version;
	use crate::codegen::method_ref;
	use crate::passes::explicit_constants::{lower_dynamic_constants, BOUNCER_DESC};
	use crate::passes::testing::{assert_monitors_released, class, instructions, method, write_and_read, Machine, Value};

	fn constant(name: &str, descriptor: &str, arguments: Vec<Loadable>) -> ConstantDynamic {
		ConstantDynamic {
			name: name.into(),
			descriptor: descriptor.into(),
			handle: Handle::InvokeStatic(method_ref("a/Bootstraps", "make",
				"(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/Class;I)Ljava/lang/Object;"), false),
			arguments,
		}
	}

	fn accessor(class: &str, name: &str, desc: &str) -> Instruction {
		Instruction::InvokeStatic(MethodRef { class: ClassName::from(class), name: name.into(), desc: desc.into() }, false)
	}

	#[test]
	fn equal_constants_share_one_accessor() {
		let mut class = class("a/Holder", Version::V11);
		let answer = constant("answer", "Ljava/lang/Integer;", vec![Loadable::Integer(42)]);
		for name in ["first", "second"] {
			class.methods.push(method(0x0009, name, "()Ljava/lang/Integer;", vec![
				Instruction::Ldc(Loadable::Dynamic(answer.clone())),
				Instruction::AReturn,
			]));
		}

		assert!(lower_dynamic_constants(&mut class).unwrap());

		let load = accessor("a/Holder", "constant$answer$0", "()Ljava/lang/Integer;");
		assert_eq!(instructions(&class.methods[0])[0], load);
		assert_eq!(instructions(&class.methods[1])[0], load);

		let names: Vec<_> = class.fields.iter().map(|field| field.name.as_str()).collect();
		assert_eq!(names, vec!["constant$answer$0", "has$constant$answer$0", "lock$constant$answer$0"]);
		assert!(class.fields[0].access.is_volatile && class.fields[2].access.is_final);

		let clinit = class.methods.iter().find(|method| method.name == MethodName::CLINIT).unwrap();
		assert_eq!(instructions(clinit).len(), 5);
		assert_eq!(instructions(clinit)[4], Instruction::Return);

		let accessor = class.methods.iter().find(|method| method.name == "constant$answer$0").unwrap();
		assert_eq!(accessor.code.as_ref().unwrap().exception_table.len(), 1);
		assert!(instructions(accessor).contains(&Instruction::MonitorEnter));
		assert!(instructions(accessor).contains(&Instruction::InvokeStatic(method_ref("a/Bootstraps", "make",
			"(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/Class;I)Ljava/lang/Object;"), false)));
		assert!(instructions(accessor).contains(&Instruction::CheckCast(ClassName::from("java/lang/Integer"))));

		// a second run has nothing to do anymore
		assert!(!lower_dynamic_constants(&mut class).unwrap());

		write_and_read(&class);
	}

	#[test]
	fn accessor_bootstraps_once_and_always_unlocks() {
		let mut class = class("a/Holder", Version::V11);
		let answer = constant("answer", "Ljava/lang/Integer;", vec![Loadable::Integer(42)]);
		class.methods.push(method(0x0009, "get", "()Ljava/lang/Integer;", vec![
			Instruction::Ldc(Loadable::Dynamic(answer)),
			Instruction::AReturn,
		]));
		assert!(lower_dynamic_constants(&mut class).unwrap());

		let accessor = class.methods.iter().find(|method| method.name == "constant$answer$0").unwrap();
		let code = accessor.code.as_ref().unwrap();
		assert_monitors_released(code);

		// the handler releases the lock before throwing the wrapped exception
		let labels = code.label_indices();
		let handler = labels[&code.exception_table[0].handler];
		let body = instructions(accessor);
		let rest = &body[handler..];
		let exit = rest.iter().position(|i| *i == Instruction::MonitorExit).unwrap();
		let throw = rest.iter().position(|i| *i == Instruction::AThrow).unwrap();
		assert!(exit < throw);
		assert!(rest[..throw].contains(&Instruction::New(ClassName::from("java/lang/BootstrapMethodError"))));

		let mut machine = Machine::default();
		let clinit = class.methods.iter().find(|method| method.name == MethodName::CLINIT).unwrap();
		machine.run(clinit, Vec::new());
		let first = machine.run(accessor, Vec::new());
		let second = machine.run(accessor, Vec::new());
		assert_eq!(first, Value::constant("a/Bootstraps", "make"));
		assert_eq!(first, second);
		assert_eq!(machine.calls.iter().filter(|call| call.name == "make").count(), 1);
		assert_eq!(machine.held_monitors, 0);
	}

	#[test]
	fn interfaces_cant_cache_constants() {
		let mut class = class("a/Api", Version::V11);
		class.access.is_interface = true;
		class.access.is_abstract = true;
		class.methods.push(method(0x0009, "get", "()Ljava/lang/Integer;", vec![
			Instruction::Ldc(Loadable::Dynamic(constant("answer", "Ljava/lang/Integer;", vec![Loadable::Integer(42)]))),
			Instruction::AReturn,
		]));
		let error = lower_dynamic_constants(&mut class).unwrap_err();
		assert_eq!(error.root_cause().to_string(),
			"Can't cache dynamic constant answer in interface a/Api, interface fields can't be assigned lazily");
	}

	#[test]
	fn existing_static_initializer_runs_after_the_locks() {
		let mut class = class("a/Init", Version::V11);
		class.methods.push(method(0x0008, "<clinit>", "()V", vec![
			Instruction::Ldc(Loadable::Dynamic(constant("x", "I", vec![Loadable::Integer(1)]))),
			Instruction::Pop,
			Instruction::Return,
		]));

		assert!(lower_dynamic_constants(&mut class).unwrap());
		let clinit = &class.methods[0];
		assert_eq!(instructions(clinit)[0], Instruction::New(ClassName::JAVA_LANG_OBJECT));
		assert_eq!(instructions(clinit)[4], accessor("a/Init", "constant$x$0", "()I"));
		assert_eq!(class.methods.iter().filter(|method| method.name == MethodName::CLINIT).count(), 1);

		write_and_read(&class);
	}

	#[test]
	fn null_constants() {
		let null = ConstantDynamic {
			name: "_".into(),
			descriptor: "Ljava/lang/String;".into(),
			handle: Handle::InvokeStatic(method_ref("java/lang/invoke/ConstantBootstraps", "nullConstant",
				"(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/Class;)Ljava/lang/Object;"), false),
			arguments: Vec::new(),
		};

		let mut class = class("a/Nothing", Version::V11);
		class.methods.push(method(0x0009, "nothing", "()Ljava/lang/String;", vec![
			Instruction::Ldc(Loadable::Dynamic(null.clone())),
			Instruction::AReturn,
		]));
		assert!(lower_dynamic_constants(&mut class).unwrap());
		assert_eq!(instructions(&class.methods[0]), vec![Instruction::AConstNull, Instruction::AReturn]);
		assert!(class.fields.is_empty());
		assert_eq!(class.methods.len(), 1);

		let mut primitive = null;
		primitive.descriptor = "I".into();
		let mut class = crate::passes::testing::class("a/Nothing", Version::V11);
		class.methods.push(method(0x0009, "nothing", "()I", vec![
			Instruction::Ldc(Loadable::Dynamic(primitive)),
			Instruction::IReturn,
		]));
		let error = lower_dynamic_constants(&mut class).unwrap_err();
		assert!(error.root_cause().to_string().starts_with("Null constant on primitive in a/Nothing: "));
	}

	#[test]
	fn call_site_arguments_go_through_a_bouncer() {
		let answer = constant("answer", "Ljava/lang/Integer;", vec![Loadable::Integer(42)]);
		let bootstrap = Handle::InvokeStatic(method_ref("a/Bootstraps", "site",
			"(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/Integer;)Ljava/lang/invoke/CallSite;"), false);

		let mut class = class("a/Site", Version::V11);
		class.methods.push(method(0x0009, "call", "()V", vec![
			Instruction::InvokeDynamic(InvokeDynamic {
				name: "run".into(),
				descriptor: "()V".into(),
				handle: bootstrap.clone(),
				arguments: vec![Loadable::Dynamic(answer)],
			}),
			Instruction::Return,
		]));

		assert!(lower_dynamic_constants(&mut class).unwrap());
		assert_eq!(instructions(&class.methods[0])[0], Instruction::InvokeDynamic(InvokeDynamic {
			name: "run".into(),
			descriptor: "()V".into(),
			handle: Handle::InvokeStatic(MethodRef {
				class: ClassName::from("a/Site"),
				name: "indyconstant$run$0".into(),
				desc: BOUNCER_DESC.into(),
			}, false),
			arguments: Vec::new(),
		}));

		let bouncer = class.methods.iter().find(|method| method.name == "indyconstant$run$0").unwrap();
		assert_eq!(instructions(bouncer), vec![
			Instruction::ALoad(LvIndex { index: 0 }),
			Instruction::ALoad(LvIndex { index: 1 }),
			Instruction::ALoad(LvIndex { index: 2 }),
			accessor("a/Site", "constant$answer$0", "()Ljava/lang/Integer;"),
			Instruction::InvokeStatic(bootstrap.method_ref().unwrap().clone(), false),
			Instruction::AReturn,
		]);
		assert!(class.methods.iter().any(|method| method.name == "constant$answer$0"));

		write_and_read(&class);
	}

	#[test]
	fn nested_constants_get_their_own_accessor() {
		let inner = constant("inner", "Ljava/lang/Object;", vec![Loadable::Integer(1)]);
		let outer = ConstantDynamic {
			name: "outer".into(),
			descriptor: "Ljava/lang/Object;".into(),
			handle: Handle::InvokeStatic(method_ref("a/Bootstraps", "wrap",
				"(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/Class;[Ljava/lang/Object;)Ljava/lang/Object;"), false),
			arguments: vec![Loadable::Dynamic(inner), Loadable::string("extra")],
		};

		let mut class = class("a/Nested", Version::V11);
		class.methods.push(method(0x0009, "get", "()Ljava/lang/Object;", vec![
			Instruction::Ldc(Loadable::Dynamic(outer)),
			Instruction::AReturn,
		]));

		assert!(lower_dynamic_constants(&mut class).unwrap());
		assert_eq!(class.fields.len(), 6);

		let outer_accessor = class.methods.iter().find(|method| method.name == "constant$outer$0").unwrap();
		let body = instructions(outer_accessor);
		assert!(body.contains(&accessor("a/Nested", "constant$inner$0", "()Ljava/lang/Object;")));
		assert!(body.contains(&Instruction::ANewArray(ClassName::JAVA_LANG_OBJECT)));
		assert!(class.methods.iter().any(|method| method.name == "constant$inner$0"));

		assert!(!lower_dynamic_constants(&mut class).unwrap());
		write_and_read(&class);
	}
}
