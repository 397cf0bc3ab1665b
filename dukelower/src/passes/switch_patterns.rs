use anyhow::{anyhow, bail, Context, Result};
use java_string::JavaString;
use duke::tree::class::{ClassFile, ClassName};
use duke::tree::method::code::{Code, ConstantDynamic, Handle, Instruction, InvokeDynamic, Loadable, LvIndex};
use crate::codegen::CodeBuilder;
use crate::passes::bootstrap::replace_call_sites;

const SWITCH_BOOTSTRAPS: &str = "java/lang/runtime/SwitchBootstraps";
const SWITCH_DESC: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;";

const CONSTANT_BOOTSTRAPS: &str = "java/lang/invoke/ConstantBootstraps";
const INVOKE_DESC: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/Class;Ljava/lang/invoke/MethodHandle;[Ljava/lang/Object;)Ljava/lang/Object;";

/// One case of a pattern switch.
#[derive(Debug, Clone, PartialEq)]
enum Label {
	Integer(i32),
	String(JavaString),
	Class(ClassName),
	EnumConstant {
		owner: ClassName,
		name: JavaString,
	},
}

/// Replaces `SwitchBootstraps.typeSwitch` and `SwitchBootstraps.enumSwitch` call sites.
///
/// The generated method takes the value switched on and the index to restart matching from, and returns the index
/// of the first matching case at or after it. A `null` value gives `-1`, no match gives the number of cases.
pub(crate) fn lower_switch_patterns(class: &mut ClassFile) -> Result<bool> {
	replace_call_sites(class, "switch", |_, indy| {
		if is_bootstrap(&indy.handle, "enumSwitch") {
			let labels = enum_switch_labels(indy)?;
			generate_switch(&labels).map(Some)
		} else if is_bootstrap(&indy.handle, "typeSwitch") {
			let labels = type_switch_labels(&indy.arguments)?;
			generate_switch(&labels).map(Some)
		} else {
			Ok(None)
		}
	})
}

fn is_bootstrap(handle: &Handle, name: &str) -> bool {
	matches!(handle, Handle::InvokeStatic(_, _)) && handle.is_method(SWITCH_BOOTSTRAPS, name, SWITCH_DESC)
}

/// In an `enumSwitch`, enum constants are just their names, and the enum is the type switched on.
fn enum_switch_labels(indy: &InvokeDynamic) -> Result<Vec<Label>> {
	let descriptor = indy.descriptor.parse()?;
	let owner = descriptor.parameter_descriptors.first()
		.and_then(|ty| ty.internal_name())
		.with_context(|| anyhow!("enumSwitch call site {} without an enum to switch on", indy.descriptor))?;

	indy.arguments.iter()
		.map(|argument| match argument {
			Loadable::String(name) => Ok(Label::EnumConstant { owner: owner.clone(), name: name.clone() }),
			other => label(other),
		})
		.collect()
}

/// In a `typeSwitch`, enum constants are `EnumDesc`s, created by two nested `ConstantBootstraps.invoke`.
fn type_switch_labels(arguments: &[Loadable]) -> Result<Vec<Label>> {
	arguments.iter()
		.map(|argument| match argument {
			Loadable::Dynamic(dynamic) => enum_desc(dynamic),
			other => label(other),
		})
		.collect()
}

fn label(argument: &Loadable) -> Result<Label> {
	match argument {
		Loadable::Integer(value) => Ok(Label::Integer(*value)),
		Loadable::String(value) => Ok(Label::String(value.clone())),
		Loadable::Class(class) => Ok(Label::Class(class.clone())),
		other => bail!("Invalid switch branch: {other:?}"),
	}
}

fn enum_desc(dynamic: &ConstantDynamic) -> Result<Label> {
	check_constant_invoke("typeSwitch", dynamic, "java/lang/Enum$EnumDesc", "of",
		"(Ljava/lang/constant/ClassDesc;Ljava/lang/String;)Ljava/lang/Enum$EnumDesc;")?;

	let (Some(Loadable::Dynamic(class_desc)), Some(Loadable::String(name))) = (dynamic.arguments.get(1), dynamic.arguments.get(2)) else {
		bail!("Invalid constant bootstrap in typeSwitch: Expected (ClassDesc, String), got: ({:?}, {:?})",
			dynamic.arguments.get(1), dynamic.arguments.get(2));
	};

	check_constant_invoke("typeSwitch.classRef", class_desc, "java/lang/constant/ClassDesc", "of",
		"(Ljava/lang/String;)Ljava/lang/constant/ClassDesc;")?;

	let Some(Loadable::String(binary_name)) = class_desc.arguments.get(1) else {
		bail!("Invalid constant bootstrap in typeSwitch.classRef: Expected (String), got: ({:?})", class_desc.arguments.get(1));
	};
	let binary_name = binary_name.clone().into_string()
		.map_err(|e| anyhow!("enum class name contains unpaired surrogates: {e:?}"))?;

	Ok(Label::EnumConstant {
		owner: ClassName::from(binary_name.replace('.', "/")),
		name: name.clone(),
	})
}

fn check_constant_invoke(path: &str, dynamic: &ConstantDynamic, owner: &str, name: &str, desc: &str) -> Result<()> {
	if !(matches!(dynamic.handle, Handle::InvokeStatic(_, _)) && dynamic.handle.is_method(CONSTANT_BOOTSTRAPS, "invoke", INVOKE_DESC)) {
		bail!("Invalid constant bootstrap in {path}: Wrong bootstrap method: {:?}", dynamic.handle);
	}
	match dynamic.arguments.first() {
		Some(Loadable::MethodHandle(handle)) if handle.is_method(owner, name, desc) => Ok(()),
		Some(Loadable::MethodHandle(handle)) => bail!("Invalid constant bootstrap in {path}: Invalid invoke target, expected {owner} {name}{desc}, got: {handle:?}"),
		other => bail!("Invalid constant bootstrap in {path}: Invalid argument, expected handle (at position 0): {other:?}"),
	}
}

fn generate_switch(labels: &[Label]) -> Result<Code> {
	let mut code = CodeBuilder::new();
	let non_null = code.new_label();

	code.push(Instruction::ALoad(LvIndex { index: 0 }));
	code.push(Instruction::IfNonNull(non_null));
	code.push_int(-1);
	code.push(Instruction::IReturn);
	code.place(non_null);

	for (index, label) in labels.iter().enumerate() {
		let index = i32::try_from(index)
			.with_context(|| anyhow!("too many switch cases: {}", labels.len()))?;
		generate_case(&mut code, index, label);
	}

	code.push_int(i32::try_from(labels.len())?);
	code.push(Instruction::IReturn);
	Ok(code.finish())
}

fn generate_case(code: &mut CodeBuilder, index: i32, label: &Label) {
	let fail = code.new_label();
	let value = || Instruction::ALoad(LvIndex { index: 0 });

	// cases before the restart index never match
	code.push_int(index);
	code.push(Instruction::ILoad(LvIndex { index: 1 }));
	code.push(Instruction::IfICmpLt(fail));

	match label {
		Label::Integer(expected) => {
			code.push(value());
			code.push(Instruction::InstanceOf(ClassName::from("java/lang/Integer")));
			code.push(Instruction::IfEq(fail));
			code.push(value());
			code.push(Instruction::CheckCast(ClassName::from("java/lang/Integer")));
			code.invoke_virtual("java/lang/Integer", "intValue", "()I");
			code.push_int(*expected);
			code.push(Instruction::IfICmpNe(fail));
		},
		Label::String(expected) => {
			code.push(value());
			code.push(Instruction::InstanceOf(ClassName::JAVA_LANG_STRING));
			code.push(Instruction::IfEq(fail));
			code.push(Instruction::Ldc(Loadable::String(expected.clone())));
			code.push(value());
			code.push(Instruction::CheckCast(ClassName::JAVA_LANG_STRING));
			code.invoke_virtual(ClassName::JAVA_LANG_STRING, "equals", "(Ljava/lang/Object;)Z");
			code.push(Instruction::IfEq(fail));
		},
		Label::Class(class) => {
			code.push(value());
			code.push(Instruction::InstanceOf(class.clone()));
			code.push(Instruction::IfEq(fail));
		},
		Label::EnumConstant { owner, name } => {
			code.push(value());
			code.push(Instruction::InstanceOf(owner.clone()));
			code.push(Instruction::IfEq(fail));
			code.push(Instruction::Ldc(Loadable::String(name.clone())));
			code.push(value());
			code.push(Instruction::CheckCast(owner.clone()));
			code.invoke_virtual(owner.clone(), "name", "()Ljava/lang/String;");
			code.invoke_virtual(ClassName::JAVA_LANG_STRING, "equals", "(Ljava/lang/Object;)Z");
			code.push(Instruction::IfEq(fail));
		},
	}

	code.push_int(index);
	code.push(Instruction::IReturn);
	code.place(fail);
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use duke::tree::class::ClassName;
	use duke::tree::method::code::{ConstantDynamic, Handle, Instruction, InvokeDynamic, Loadable, LvIndex};
	use duke::tree::version::Version;
	use crate::codegen::method_ref;
	use crate::passes::switch_patterns::{lower_switch_patterns, CONSTANT_BOOTSTRAPS, INVOKE_DESC, SWITCH_DESC};
	use crate::passes::testing::{class, instructions, method, write_and_read, Machine, Value};

	fn switch(bootstrap: &str, desc: &str, arguments: Vec<Loadable>) -> Instruction {
		Instruction::InvokeDynamic(InvokeDynamic {
			name: bootstrap.into(),
			descriptor: desc.into(),
			handle: Handle::InvokeStatic(method_ref("java/lang/runtime/SwitchBootstraps", bootstrap, SWITCH_DESC), false),
			arguments,
		})
	}

	fn constant_invoke(name: &str, descriptor: &str, target: Handle, arguments: Vec<Loadable>) -> Loadable {
		Loadable::Dynamic(ConstantDynamic {
			name: name.into(),
			descriptor: descriptor.into(),
			handle: Handle::InvokeStatic(method_ref(CONSTANT_BOOTSTRAPS, "invoke", INVOKE_DESC), false),
			arguments: std::iter::once(Loadable::MethodHandle(target)).chain(arguments).collect(),
		})
	}

	fn enum_desc(class: &str, constant: &str) -> Loadable {
		let class_desc = constant_invoke("invoke", "Ljava/lang/constant/ClassDesc;",
			Handle::InvokeStatic(method_ref("java/lang/constant/ClassDesc", "of", "(Ljava/lang/String;)Ljava/lang/constant/ClassDesc;"), true),
			vec![Loadable::string(class)]);
		constant_invoke("invoke", "Ljava/lang/Enum$EnumDesc;",
			Handle::InvokeStatic(method_ref("java/lang/Enum$EnumDesc", "of", "(Ljava/lang/constant/ClassDesc;Ljava/lang/String;)Ljava/lang/Enum$EnumDesc;"), false),
			vec![class_desc, Loadable::string(constant)])
	}

	fn switch_method(desc: &str, indy: Instruction) -> duke::tree::method::Method {
		method(0x0009, "pick", desc, vec![
			Instruction::ALoad(LvIndex { index: 0 }),
			Instruction::IConst0,
			indy,
			Instruction::IReturn,
		])
	}

	#[test]
	fn enum_switch() {
		let mut class = class("a/Painter", Version::V21);
		class.methods.push(switch_method("(La/Color;)I",
			switch("enumSwitch", "(La/Color;I)I", vec![Loadable::string("RED"), Loadable::string("GREEN"), Loadable::string("BLUE")])));

		assert!(lower_switch_patterns(&mut class).unwrap());
		assert_eq!(class.methods[1].name, "switch$enumSwitch$enumSwitch$0");

		let generated = instructions(&class.methods[1]);
		assert_eq!(generated[0], Instruction::ALoad(LvIndex { index: 0 }));
		assert!(matches!(generated[1], Instruction::IfNonNull(_)));
		assert_eq!(generated[2..4].to_vec(), vec![Instruction::IConstM1, Instruction::IReturn]);

		let Instruction::IfICmpLt(fail) = generated[6] else { panic!("expected restart check, got {:?}", generated[6]) };
		assert_eq!(generated[4..17].to_vec(), vec![
			Instruction::IConst0,
			Instruction::ILoad(LvIndex { index: 1 }),
			Instruction::IfICmpLt(fail),
			Instruction::ALoad(LvIndex { index: 0 }),
			Instruction::InstanceOf(ClassName::from("a/Color")),
			Instruction::IfEq(fail),
			Instruction::Ldc(Loadable::string("RED")),
			Instruction::ALoad(LvIndex { index: 0 }),
			Instruction::CheckCast(ClassName::from("a/Color")),
			Instruction::InvokeVirtual(method_ref("a/Color", "name", "()Ljava/lang/String;")),
			Instruction::InvokeVirtual(method_ref("java/lang/String", "equals", "(Ljava/lang/Object;)Z")),
			Instruction::IfEq(fail),
			Instruction::IConst0,
		]);
		assert!(generated.contains(&Instruction::Ldc(Loadable::string("GREEN"))));
		assert!(generated.contains(&Instruction::Ldc(Loadable::string("BLUE"))));
		assert_eq!(generated.iter().filter(|i| matches!(i, Instruction::InvokeVirtual(m) if m.class == "a/Color" && m.name == "name")).count(), 3);
		assert_eq!(generated[generated.len() - 2..].to_vec(), vec![Instruction::IConst3, Instruction::IReturn]);

		write_and_read(&class);
	}

	#[test]
	fn type_switch_labels() {
		let mut class = class("a/Matcher", Version::V21);
		class.methods.push(switch_method("(Ljava/lang/Object;)I",
			switch("typeSwitch", "(Ljava/lang/Object;I)I", vec![
				Loadable::Integer(42),
				Loadable::string("hello"),
				Loadable::Class(ClassName::from("java/lang/CharSequence")),
				enum_desc("a.Color", "GREEN"),
			])));

		assert!(lower_switch_patterns(&mut class).unwrap());
		let generated = instructions(&class.methods[1]);

		assert!(generated.contains(&Instruction::BiPush(42)));
		assert!(generated.contains(&Instruction::InstanceOf(ClassName::from("java/lang/Integer"))));
		assert!(generated.contains(&Instruction::Ldc(Loadable::string("hello"))));
		assert!(generated.contains(&Instruction::InstanceOf(ClassName::from("java/lang/CharSequence"))));
		assert!(generated.contains(&Instruction::InstanceOf(ClassName::from("a/Color"))));
		assert!(generated.contains(&Instruction::Ldc(Loadable::string("GREEN"))));
		assert_eq!(generated[generated.len() - 2..].to_vec(), vec![Instruction::IConst4, Instruction::IReturn]);

		write_and_read(&class);
	}

	#[test]
	fn enum_switch_picks_cases_from_the_restart_index() {
		let mut class = class("a/Painter", Version::V21);
		class.methods.push(switch_method("(La/Color;)I",
			switch("enumSwitch", "(La/Color;I)I", vec![Loadable::string("RED"), Loadable::string("GREEN"), Loadable::string("BLUE")])));
		assert!(lower_switch_patterns(&mut class).unwrap());

		let generated = &class.methods[1];
		let pick = |subject: Value, restart: i32| Machine::default().run(generated, vec![subject, Value::Int(restart)]);
		let color = |name: &str| Value::constant("a/Color", name);

		assert_eq!(pick(color("RED"), 0), Value::Int(0));
		assert_eq!(pick(color("GREEN"), 0), Value::Int(1));
		assert_eq!(pick(color("BLUE"), 1), Value::Int(2));
		// cases before the restart index are skipped, no match gives the number of cases
		assert_eq!(pick(color("RED"), 2), Value::Int(3));
		assert_eq!(pick(color("GREEN"), 2), Value::Int(3));
		assert_eq!(pick(Value::Null, 0), Value::Int(-1));
		assert_eq!(pick(Value::Null, 2), Value::Int(-1));
	}

	#[test]
	fn type_switch_tests_each_kind_of_case() {
		let mut class = class("a/Matcher", Version::V21);
		class.methods.push(switch_method("(Ljava/lang/Object;)I",
			switch("typeSwitch", "(Ljava/lang/Object;I)I", vec![
				Loadable::Integer(42),
				Loadable::string("hello"),
				Loadable::Class(ClassName::from("java/lang/CharSequence")),
				enum_desc("a.Color", "GREEN"),
			])));
		assert!(lower_switch_patterns(&mut class).unwrap());

		let generated = &class.methods[1];
		let pick = |subject: Value, restart: i32| Machine::default().run(generated, vec![subject, Value::Int(restart)]);

		assert_eq!(pick(Value::Int(42), 0), Value::Int(0));
		assert_eq!(pick(Value::Int(7), 0), Value::Int(4));
		assert_eq!(pick(Value::string("hello"), 0), Value::Int(1));
		assert_eq!(pick(Value::string("hello"), 2), Value::Int(2));
		assert_eq!(pick(Value::string("other"), 0), Value::Int(2));
		assert_eq!(pick(Value::constant("a/Color", "GREEN"), 0), Value::Int(3));
		assert_eq!(pick(Value::constant("a/Color", "RED"), 0), Value::Int(4));
		assert_eq!(pick(Value::Null, 3), Value::Int(-1));
	}

	#[test]
	fn broken_enum_desc() {
		let mut class = class("a/Matcher", Version::V21);
		let broken = constant_invoke("invoke", "Ljava/lang/Enum$EnumDesc;",
			Handle::InvokeStatic(method_ref("a/Elsewhere", "of", "()La/Elsewhere;"), false),
			Vec::new());
		class.methods.push(switch_method("(Ljava/lang/Object;)I",
			switch("typeSwitch", "(Ljava/lang/Object;I)I", vec![broken])));

		let error = lower_switch_patterns(&mut class).unwrap_err();
		assert!(error.root_cause().to_string().starts_with("Invalid constant bootstrap in typeSwitch: Invalid invoke target"));
	}
}
