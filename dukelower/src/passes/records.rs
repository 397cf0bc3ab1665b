use anyhow::{anyhow, Context, Result};
use duke::tree::class::{ClassFile, ClassName};
use duke::tree::descriptor::Type;
use duke::tree::field::{FieldDescriptor, FieldName};
use duke::tree::method::{Method, MethodName};
use duke::tree::method::code::{Code, Handle, Instruction, Loadable, LvIndex};
use crate::codegen::{field_ref, CodeBuilder, STRING_BUILDER};

const OBJECT_METHODS: &str = "java/lang/runtime/ObjectMethods";

/// A field that's part of the state of a record.
struct Component {
	name: FieldName,
	descriptor: FieldDescriptor,
}

/// Turns a record into a plain class extending `java/lang/Object`.
///
/// `equals`, `hashCode` and `toString` implemented with `ObjectMethods.bootstrap` get new bodies comparing, hashing
/// and printing the components one after the other.
pub(crate) fn record_to_class(class: &mut ClassFile) -> Result<bool> {
	if !class.is_record() {
		return Ok(false);
	}
	class.super_class = Some(ClassName::JAVA_LANG_OBJECT);

	let components: Vec<Component> = match class.record_components.take() {
		Some(components) => components.into_iter()
			.map(|component| Component { name: component.name, descriptor: component.descriptor })
			.collect(),
		None => components_from_bootstrap(class),
	};

	let class_name = class.name.clone();
	for method in &mut class.methods {
		if method.name == MethodName::INIT {
			retarget_super_constructor(method);
		}

		let generate: fn(&ClassName, &[Component]) -> Result<Code> = match (method.name.as_str(), method.descriptor.as_str()) {
			("equals", "(Ljava/lang/Object;)Z") => generate_equals,
			("hashCode", "()I") => generate_hash_code,
			("toString", "()Ljava/lang/String;") => generate_to_string,
			_ => continue,
		};

		method.access.is_private = false;
		method.access.is_protected = false;
		method.access.is_public = true;

		if uses_object_methods(method, &class_name)? {
			method.code = Some(generate(&class_name, &components)
				.with_context(|| anyhow!("failed to generate {}{} for record {class_name}", method.name, method.descriptor))?);
		}
	}
	Ok(true)
}

/// Reads the components from the getter handles given to `ObjectMethods.bootstrap`, for records without a `Record`
/// attribute.
fn components_from_bootstrap(class: &ClassFile) -> Vec<Component> {
	class.methods.iter()
		.filter_map(|method| method.code.as_ref())
		.flat_map(|code| &code.instructions)
		.find_map(|entry| match &entry.instruction {
			Instruction::InvokeDynamic(indy) if indy.handle.owner() == OBJECT_METHODS => Some(indy),
			_ => None,
		})
		.map(|indy| indy.arguments.iter()
			.filter_map(|argument| match argument {
				Loadable::MethodHandle(Handle::GetField(field)) => Some(Component {
					name: field.name.clone(),
					descriptor: field.desc.clone(),
				}),
				_ => None,
			})
			.collect())
		.unwrap_or_default()
}

fn retarget_super_constructor(method: &mut Method) {
	let Some(code) = &mut method.code else { return };
	for entry in &mut code.instructions {
		if let Instruction::InvokeSpecial(method_ref, _) = &mut entry.instruction {
			if method_ref.class == ClassName::JAVA_LANG_RECORD && method_ref.name == MethodName::INIT && method_ref.desc == "()V" {
				method_ref.class = ClassName::JAVA_LANG_OBJECT;
			}
		}
	}
}

/// Checks if the method body uses the `invokedynamic` that javac emits for the method of a record.
fn uses_object_methods(method: &Method, class_name: &ClassName) -> Result<bool> {
	let expected = match method.name.as_str() {
		"equals" => format!("(L{class_name};Ljava/lang/Object;)Z"),
		"hashCode" => format!("(L{class_name};)I"),
		_ => format!("(L{class_name};)Ljava/lang/String;"),
	};
	Ok(method.code.iter()
		.flat_map(|code| &code.instructions)
		.any(|entry| matches!(&entry.instruction, Instruction::InvokeDynamic(indy)
			if indy.handle.owner() == OBJECT_METHODS && indy.handle.name() == "bootstrap" &&
				indy.name == method.name.as_str() && indy.descriptor == expected.as_str()
		)))
}

/// Loads `this.<component>`, boxed if primitive, from the object in the given local.
fn load_component(code: &mut CodeBuilder, class_name: &ClassName, local: u16, component: &Component) -> Result<Type> {
	code.push(Instruction::ALoad(LvIndex { index: local }));
	code.push(Instruction::GetField(field_ref(class_name.clone(), component.name.clone(), component.descriptor.clone())));
	component.descriptor.parse()
}

fn generate_equals(class_name: &ClassName, components: &[Component]) -> Result<Code> {
	let mut code = CodeBuilder::new();
	let is_instance = code.new_label();

	code.push(Instruction::ALoad(LvIndex { index: 1 }));
	code.push(Instruction::Dup);
	code.push(Instruction::InstanceOf(class_name.clone()));
	code.push(Instruction::IfNe(is_instance));
	code.push(Instruction::IConst0);
	code.push(Instruction::IReturn);

	code.place(is_instance);
	code.push(Instruction::CheckCast(class_name.clone()));
	code.push(Instruction::AStore(LvIndex { index: 2 }));

	for component in components {
		let equal = code.new_label();
		let ty = load_component(&mut code, class_name, 0, component)?;
		code.box_value(&ty);
		load_component(&mut code, class_name, 2, component)?;
		code.box_value(&ty);
		code.invoke_static("java/util/Objects", "equals", "(Ljava/lang/Object;Ljava/lang/Object;)Z");
		code.push(Instruction::IfNe(equal));
		code.push(Instruction::IConst0);
		code.push(Instruction::IReturn);
		code.place(equal);
	}

	code.push(Instruction::IConst1);
	code.push(Instruction::IReturn);
	Ok(code.finish())
}

fn generate_hash_code(class_name: &ClassName, components: &[Component]) -> Result<Code> {
	let mut code = CodeBuilder::new();
	code.push(Instruction::IConst0);
	for (index, component) in components.iter().enumerate() {
		if index != 0 {
			code.push_int(31);
			code.push(Instruction::IMul);
		}
		let ty = load_component(&mut code, class_name, 0, component)?;
		code.box_value(&ty);
		code.invoke_static("java/util/Objects", "hashCode", "(Ljava/lang/Object;)I");
		code.push(Instruction::IAdd);
	}
	code.push(Instruction::IReturn);
	Ok(code.finish())
}

fn generate_to_string(class_name: &ClassName, components: &[Component]) -> Result<Code> {
	let mut code = CodeBuilder::new();
	code.push(Instruction::New(ClassName::from(STRING_BUILDER)));
	code.push(Instruction::Dup);
	code.invoke_special(STRING_BUILDER, "<init>", "()V");

	code.push(Instruction::Ldc(Loadable::Class(class_name.clone())));
	code.invoke_virtual(ClassName::JAVA_LANG_CLASS, "getSimpleName", "()Ljava/lang/String;");
	code.append(&Type::Object(ClassName::JAVA_LANG_STRING));

	for (index, component) in components.iter().enumerate() {
		let separator = if index == 0 { "[" } else { ", " };
		code.append_str(&format!("{separator}{}=", component.name));
		let ty = load_component(&mut code, class_name, 0, component)?;
		code.append(&ty);
	}
	code.append_str(if components.is_empty() { "[]" } else { "]" });

	code.invoke_virtual(STRING_BUILDER, "toString", "()Ljava/lang/String;");
	code.push(Instruction::AReturn);
	Ok(code.finish())
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use duke::tree::class::ClassName;
	use duke::tree::method::code::{Handle, Instruction, InvokeDynamic, Loadable, LvIndex};
	use duke::tree::record::RecordComponent;
	use duke::tree::field::{Field, FieldAccess};
	use duke::tree::version::Version;
	use crate::codegen::{field_ref, method_ref};
	use crate::passes::records::record_to_class;
	use crate::passes::testing::{class, instructions, method, write_and_read};

	fn object_methods(name: &str, desc: &str) -> Instruction {
		Instruction::InvokeDynamic(InvokeDynamic {
			name: name.into(),
			descriptor: desc.into(),
			handle: Handle::InvokeStatic(method_ref("java/lang/runtime/ObjectMethods", "bootstrap",
				"(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/TypeDescriptor;Ljava/lang/Class;Ljava/lang/String;[Ljava/lang/invoke/MethodHandle;)Ljava/lang/Object;"), false),
			arguments: vec![
				Loadable::Class(ClassName::from("a/Point")),
				Loadable::string("x;label"),
				Loadable::MethodHandle(Handle::GetField(field_ref("a/Point", "x", "I"))),
				Loadable::MethodHandle(Handle::GetField(field_ref("a/Point", "label", "Ljava/lang/String;"))),
			],
		})
	}

	fn point() -> duke::tree::class::ClassFile {
		let mut class = class("a/Point", Version::V16);
		class.access.is_final = true;
		class.super_class = Some(ClassName::JAVA_LANG_RECORD);
		class.record_components = Some(vec![
			RecordComponent::new("x".into(), "I".into()),
			RecordComponent::new("label".into(), "Ljava/lang/String;".into()),
		]);
		let access = FieldAccess::from(0x0012);
		class.fields.push(Field::new(access, "x".into(), "I".into()));
		class.fields.push(Field::new(access, "label".into(), "Ljava/lang/String;".into()));

		class.methods.push(method(0x0001, "<init>", "(ILjava/lang/String;)V", vec![
			Instruction::ALoad(LvIndex { index: 0 }),
			Instruction::InvokeSpecial(method_ref("java/lang/Record", "<init>", "()V"), false),
			Instruction::Return,
		]));
		class.methods.push(method(0x0011, "equals", "(Ljava/lang/Object;)Z", vec![
			Instruction::ALoad(LvIndex { index: 0 }),
			Instruction::ALoad(LvIndex { index: 1 }),
			object_methods("equals", "(La/Point;Ljava/lang/Object;)Z"),
			Instruction::IReturn,
		]));
		class.methods.push(method(0x0011, "hashCode", "()I", vec![
			Instruction::ALoad(LvIndex { index: 0 }),
			object_methods("hashCode", "(La/Point;)I"),
			Instruction::IReturn,
		]));
		class.methods.push(method(0x0011, "toString", "()Ljava/lang/String;", vec![
			Instruction::ALoad(LvIndex { index: 0 }),
			object_methods("toString", "(La/Point;)Ljava/lang/String;"),
			Instruction::AReturn,
		]));
		class
	}

	#[test]
	fn record_becomes_class() {
		let mut class = point();
		assert!(record_to_class(&mut class).unwrap());

		assert_eq!(class.super_class, Some(ClassName::JAVA_LANG_OBJECT));
		assert_eq!(class.record_components, None);
		assert_eq!(instructions(&class.methods[0])[1],
			Instruction::InvokeSpecial(method_ref("java/lang/Object", "<init>", "()V"), false));

		assert_eq!(instructions(&class.methods[2]), vec![
			Instruction::IConst0,
			Instruction::ALoad(LvIndex { index: 0 }),
			Instruction::GetField(field_ref("a/Point", "x", "I")),
			Instruction::InvokeStatic(method_ref("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;"), false),
			Instruction::InvokeStatic(method_ref("java/util/Objects", "hashCode", "(Ljava/lang/Object;)I"), false),
			Instruction::IAdd,
			Instruction::BiPush(31),
			Instruction::IMul,
			Instruction::ALoad(LvIndex { index: 0 }),
			Instruction::GetField(field_ref("a/Point", "label", "Ljava/lang/String;")),
			Instruction::InvokeStatic(method_ref("java/util/Objects", "hashCode", "(Ljava/lang/Object;)I"), false),
			Instruction::IAdd,
			Instruction::IReturn,
		]);

		let to_string = instructions(&class.methods[3]);
		assert!(to_string.contains(&Instruction::Ldc(Loadable::string("[x="))));
		assert!(to_string.contains(&Instruction::Ldc(Loadable::string(", label="))));
		assert!(to_string.contains(&Instruction::Ldc(Loadable::string("]"))));

		let equals = instructions(&class.methods[1]);
		assert_eq!(equals.iter().filter(|i| matches!(i, Instruction::InvokeStatic(m, _) if m.name == "equals")).count(), 2);
		assert!(!equals.iter().any(|i| matches!(i, Instruction::InvokeDynamic(_))));

		write_and_read(&class);
	}

	#[test]
	fn methods_become_public_but_custom_bodies_stay() {
		let mut class = point();
		class.record_components = None;
		class.methods[2].access.is_public = false;
		class.methods[2].access.is_protected = true;
		class.methods[3] = method(0x0002, "toString", "()Ljava/lang/String;", vec![
			Instruction::Ldc(Loadable::string("custom")),
			Instruction::AReturn,
		]);

		assert!(record_to_class(&mut class).unwrap());
		assert!(class.methods[2].access.is_public && !class.methods[2].access.is_protected);
		assert!(class.methods[3].access.is_public && !class.methods[3].access.is_private);
		assert_eq!(instructions(&class.methods[3]), vec![Instruction::Ldc(Loadable::string("custom")), Instruction::AReturn]);
		// the components come from the bootstrap arguments
		assert_eq!(instructions(&class.methods[2]).len(), 13);
	}

	#[test]
	fn other_classes_stay() {
		let mut class = class("a/Plain", Version::V16);
		let before = class.clone();
		assert!(!record_to_class(&mut class).unwrap());
		assert_eq!(class, before);
	}
}
