use std::collections::HashSet;
use anyhow::{anyhow, Context, Result};
use duke::tree::class::{ClassFile, ClassName};
use duke::tree::method::{Method, MethodAccess, MethodName, MethodRef};
use duke::tree::method::code::{Code, Instruction, InvokeDynamic};

/// The access of methods and fields added to a class.
///
/// Interfaces of class files before java 9 can't have private methods, so there they're public.
pub(super) fn synthetic_method_access(class: &ClassFile) -> MethodAccess {
	let mut access = MethodAccess::default();
	access.is_static = true;
	access.is_synthetic = true;
	if class.access.is_interface {
		access.is_public = true;
	} else {
		access.is_private = true;
	}
	access
}

/// Hands out method names not used in a class yet.
pub(super) struct UniqueNames {
	used: HashSet<String>,
}

impl UniqueNames {
	pub(super) fn new(class: &ClassFile) -> UniqueNames {
		UniqueNames {
			used: class.methods.iter().map(|method| method.name.as_str().to_owned())
				.chain(class.fields.iter().map(|field| field.name.as_str().to_owned()))
				.collect(),
		}
	}

	/// Returns `<prefix><n>`, for the smallest `n` such that the name isn't used yet, and also no name built from it
	/// by prepending one of the `companions`.
	pub(super) fn next(&mut self, prefix: &str, companions: &[&str]) -> String {
		let mut n = 0usize;
		loop {
			let name = format!("{prefix}{n}");
			let taken = self.used.contains(&name) ||
				companions.iter().any(|companion| self.used.contains(&format!("{companion}{name}")));
			if !taken {
				for companion in companions {
					self.used.insert(format!("{companion}{name}"));
				}
				self.used.insert(name.clone());
				return name;
			}
			n += 1;
		}
	}
}

/// Replaces `invokedynamic` instructions by calls to newly generated static methods of the class.
///
/// The `generate` function is asked for each `invokedynamic`, and returns the code of the replacement method, or
/// [`None`] to keep the instruction. The replacement method has the same descriptor as the `invokedynamic`, and is
/// named `<basename>$<bootstrap method name>$<name>$<n>`.
pub(super) fn replace_call_sites(
	class: &mut ClassFile,
	basename: &str,
	mut generate: impl FnMut(&ClassName, &InvokeDynamic) -> Result<Option<Code>>,
) -> Result<bool> {
	let class_name = class.name.clone();
	let is_interface = class.access.is_interface;
	let access = synthetic_method_access(class);
	let mut names = UniqueNames::new(class);
	let mut generated = Vec::new();

	for method in &mut class.methods {
		let Some(code) = &mut method.code else { continue };
		for entry in &mut code.instructions {
			let Instruction::InvokeDynamic(indy) = &entry.instruction else { continue };
			let Some(body) = generate(&class_name, indy)
				.with_context(|| anyhow!("in {class_name}.{}{}, for invokedynamic {} {}", method.name, method.descriptor, indy.name, indy.descriptor))? else {
				continue
			};

			let name = MethodName::from(names.next(&format!("{basename}${}${}$", indy.handle.name(), indy.name), &[]));
			let descriptor = indy.descriptor.clone();

			let mut replacement = Method::new(access, name.clone(), descriptor.clone());
			replacement.code = Some(body);
			generated.push(replacement);

			entry.instruction = Instruction::InvokeStatic(MethodRef { class: class_name.clone(), name, desc: descriptor }, is_interface);
		}
	}

	let changed = !generated.is_empty();
	class.methods.extend(generated);
	Ok(changed)
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use duke::tree::version::Version;
	use crate::passes::bootstrap::UniqueNames;
	use crate::passes::testing::{class, method};

	#[test]
	fn names_skip_existing() {
		let mut class = class("a/B", Version::V11);
		class.methods.push(method(0x0008, "constant$x$0", "()I", Vec::new()));
		class.methods.push(method(0x0008, "has$constant$x$1", "()I", Vec::new()));
		let mut names = UniqueNames::new(&class);
		assert_eq!(names.next("constant$x$", &["has$", "lock$"]), "constant$x$2");
		assert_eq!(names.next("constant$x$", &["has$", "lock$"]), "constant$x$3");
		assert_eq!(names.next("strconcat$a$b$", &[]), "strconcat$a$b$0");
	}
}
