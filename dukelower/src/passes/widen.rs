use anyhow::{anyhow, Context, Result};
use duke::tree::class::{ClassFile, ClassName};
use duke::tree::method::MethodRef;
use duke::tree::method::code::{Handle, Instruction};
use crate::diagnostics::Diagnostics;
use crate::symbols::{CallTarget, SymbolTable};

/// Retargets virtual and interface calls to the class declaring the method in the target release.
///
/// A call compiled against a newer JDK can name a class that only overrides the method since a later release. The
/// older JVM then fails to link the call, while calling the overridden method would work. The same is done for
/// `invokevirtual` and `invokeinterface` bootstrap method handles.
pub(crate) fn widen_calls(class: &mut ClassFile, symbols: &SymbolTable, diagnostics: &Diagnostics) -> Result<bool> {
	let mut changed = false;
	for method in &mut class.methods {
		let Some(code) = &mut method.code else { continue };
		let context = format!("{}.{}{}", class.name, method.name, method.descriptor);

		for entry in &mut code.instructions {
			let widened = match &entry.instruction {
				Instruction::InvokeVirtual(method_ref) | Instruction::InvokeInterface(method_ref) => {
					widen(symbols, diagnostics, &class.name, &context, method_ref)?
						.map(|(method_ref, is_interface)| if is_interface {
							Instruction::InvokeInterface(method_ref)
						} else {
							Instruction::InvokeVirtual(method_ref)
						})
				},
				Instruction::InvokeDynamic(indy) => match &indy.handle {
					Handle::InvokeVirtual(method_ref) | Handle::InvokeInterface(method_ref) => {
						widen(symbols, diagnostics, &class.name, &context, method_ref)?
							.map(|(method_ref, is_interface)| {
								let mut indy = indy.clone();
								indy.handle = if is_interface {
									Handle::InvokeInterface(method_ref)
								} else {
									Handle::InvokeVirtual(method_ref)
								};
								Instruction::InvokeDynamic(indy)
							})
					},
					_ => None,
				},
				_ => None,
			};

			if let Some(instruction) = widened {
				if instruction != entry.instruction {
					entry.instruction = instruction;
					changed = true;
				}
			}
		}
	}
	Ok(changed)
}

fn widen(symbols: &SymbolTable, diagnostics: &Diagnostics, class_name: &ClassName, context: &str, method_ref: &MethodRef) -> Result<Option<(MethodRef, bool)>> {
	let target = symbols.widen_call(class_name, context, &method_ref.class, method_ref.name.as_str(), method_ref.desc.as_str(), diagnostics)
		.with_context(|| anyhow!("{context}: failed to find the owner of {} {}{}", method_ref.class, method_ref.name, method_ref.desc))?;
	Ok(target.map(|CallTarget { owner, is_interface }| {
		(MethodRef { class: owner, name: method_ref.name.clone(), desc: method_ref.desc.clone() }, is_interface)
	}))
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use duke::tree::class::{ClassAccess, ClassFile, ClassName};
	use duke::tree::method::{Method, MethodAccess};
	use duke::tree::method::code::{Instruction, LvIndex};
	use duke::tree::version::Version;
	use crate::codegen::method_ref;
	use crate::diagnostics::Diagnostics;
	use crate::lookup::MemoryLookup;
	use crate::passes::testing::{class, instructions, method};
	use crate::passes::widen::widen_calls;
	use crate::release::Release;
	use crate::symbols::SymbolTable;

	fn api_class(name: &str, access: u16, super_class: &str, interfaces: &[&str], methods: &[&str]) -> ClassFile {
		let mut class = ClassFile::new(Version::V1_8, ClassAccess::from(access), ClassName::from(name),
			Some(ClassName::from(super_class)), interfaces.iter().copied().map(ClassName::from).collect());
		for name in methods {
			class.methods.push(Method::new(MethodAccess::from(0x0001), (*name).into(), "()V".into()));
		}
		class
	}

	#[test]
	fn calls_move_to_the_declaring_class() {
		let mut catalog = MemoryLookup::new();
		catalog.add_class(&api_class("java/nio/Buffer", 0x0421, "java/lang/Object", &[], &["flip"]));
		catalog.add_class(&api_class("java/nio/ByteBuffer", 0x0421, "java/nio/Buffer", &[], &[]));
		catalog.add_class(&api_class("java/lang/Runnable", 0x0601, "java/lang/Object", &[], &["run"]));
		catalog.add_class(&api_class("java/lang/Thread", 0x0021, "java/lang/Object", &["java/lang/Runnable"], &[]));
		let inventory = ["java/nio/Buffer", "java/nio/ByteBuffer", "java/lang/Runnable", "java/lang/Thread"].map(ClassName::from);
		let symbols = SymbolTable::new(Release::JAVA_8, inventory, catalog);
		let diagnostics = Diagnostics::new();

		let mut class = class("a/User", Version::V11);
		class.methods.push(method(0x0009, "use", "(Ljava/nio/ByteBuffer;Ljava/lang/Thread;)V", vec![
			Instruction::ALoad(LvIndex { index: 0 }),
			Instruction::InvokeVirtual(method_ref("java/nio/ByteBuffer", "flip", "()V")),
			Instruction::ALoad(LvIndex { index: 1 }),
			Instruction::InvokeVirtual(method_ref("java/lang/Thread", "run", "()V")),
			Instruction::ALoad(LvIndex { index: 1 }),
			Instruction::InvokeVirtual(method_ref("a/Elsewhere", "run", "()V")),
			Instruction::Return,
		]));

		assert!(widen_calls(&mut class, &symbols, &diagnostics).unwrap());
		assert_eq!(instructions(&class.methods[0]), vec![
			Instruction::ALoad(LvIndex { index: 0 }),
			Instruction::InvokeVirtual(method_ref("java/nio/Buffer", "flip", "()V")),
			Instruction::ALoad(LvIndex { index: 1 }),
			Instruction::InvokeInterface(method_ref("java/lang/Runnable", "run", "()V")),
			Instruction::ALoad(LvIndex { index: 1 }),
			Instruction::InvokeVirtual(method_ref("a/Elsewhere", "run", "()V")),
			Instruction::Return,
		]);
		assert!(diagnostics.findings().is_empty());

		assert!(!widen_calls(&mut class, &symbols, &diagnostics).unwrap());
	}
}
