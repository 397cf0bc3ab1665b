use anyhow::Result;
use duke::tree::class::{ClassFile, ClassName};
use duke::tree::method::MethodName;
use duke::tree::method::code::{Instruction, InstructionListEntry, Loadable};
use crate::codegen::method_ref;

const MATCH_EXCEPTION: &str = "java/lang/MatchException";
const RUNTIME_EXCEPTION: &str = "java/lang/RuntimeException";

/// Put in front of the message, so that it's visible where a `java/lang/MatchException` would've been thrown.
const TAG: &str = "(java/lang/MatchException) ";

/// Replaces the construction of `java/lang/MatchException`, which doesn't exist before java 21, with the
/// construction of a `java/lang/RuntimeException`.
pub(crate) fn replace_match_exception(class: &mut ClassFile) -> Result<bool> {
	let mut changed = false;
	for method in &mut class.methods {
		let Some(code) = &mut method.code else { continue };
		if !code.instructions.iter().any(|entry| is_match_exception(&entry.instruction)) {
			continue;
		}
		changed = true;

		let instructions = std::mem::take(&mut code.instructions);
		for entry in instructions {
			if !is_match_exception(&entry.instruction) {
				code.instructions.push(entry);
				continue;
			}
			let mut replacement = replace(&entry.instruction).into_iter();
			if let Some(first) = replacement.next() {
				code.instructions.push(InstructionListEntry { label: entry.label, instruction: first });
			}
			code.instructions.extend(replacement.map(InstructionListEntry::from));
		}
	}
	Ok(changed)
}

fn is_match_exception(instruction: &Instruction) -> bool {
	match instruction {
		Instruction::New(class) => *class == MATCH_EXCEPTION,
		Instruction::InvokeSpecial(method, _) => method.class == MATCH_EXCEPTION && method.name == MethodName::INIT,
		_ => false,
	}
}

fn replace(instruction: &Instruction) -> Vec<Instruction> {
	let Instruction::InvokeSpecial(method, is_interface) = instruction else {
		return vec![Instruction::New(ClassName::from(RUNTIME_EXCEPTION))];
	};
	let constructor = |desc: &str| Instruction::InvokeSpecial(method_ref(RUNTIME_EXCEPTION, "<init>", desc), *is_interface);

	// the message may be null, so it goes through String.valueOf
	let tag_message = || [
		Instruction::InvokeStatic(method_ref(ClassName::JAVA_LANG_STRING, "valueOf", "(Ljava/lang/Object;)Ljava/lang/String;"), false),
		Instruction::Ldc(Loadable::string(TAG)),
		Instruction::Swap,
		Instruction::InvokeVirtual(method_ref(ClassName::JAVA_LANG_STRING, "concat", "(Ljava/lang/String;)Ljava/lang/String;")),
	];

	match method.desc.as_str() {
		"()V" => vec![
			Instruction::Ldc(Loadable::string(TAG.trim_end())),
			constructor("(Ljava/lang/String;)V"),
		],
		"(Ljava/lang/String;)V" => tag_message().into_iter()
			.chain([constructor("(Ljava/lang/String;)V")])
			.collect(),
		"(Ljava/lang/String;Ljava/lang/Throwable;)V" => std::iter::once(Instruction::Swap)
			.chain(tag_message())
			.chain([Instruction::Swap, constructor("(Ljava/lang/String;Ljava/lang/Throwable;)V")])
			.collect(),
		desc => vec![constructor(desc)],
	}
}
