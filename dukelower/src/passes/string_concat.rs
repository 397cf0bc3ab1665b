use anyhow::{anyhow, bail, Context, Result};
use java_string::{JavaCodePoint, JavaString};
use duke::tree::class::{ClassFile, ClassName};
use duke::tree::descriptor::Type;
use duke::tree::method::code::{Code, Handle, Instruction, InvokeDynamic, Loadable};
use crate::codegen::{loadable_type, CodeBuilder, STRING_BUILDER};
use crate::passes::bootstrap::replace_call_sites;

const STRING_CONCAT_FACTORY: &str = "java/lang/invoke/StringConcatFactory";
const MAKE_CONCAT_DESC: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;";
const MAKE_CONCAT_WITH_CONSTANTS_DESC: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;";

/// Marks where the next argument goes in a recipe.
const TAG_ARG: JavaCodePoint = JavaCodePoint::from_char('\u{1}');
/// Marks where the next constant goes in a recipe.
const TAG_CONST: JavaCodePoint = JavaCodePoint::from_char('\u{2}');

pub(crate) fn lower_string_concat(class: &mut ClassFile) -> Result<bool> {
	replace_call_sites(class, "strconcat", |_, indy| {
		if is_bootstrap(&indy.handle, "makeConcat", MAKE_CONCAT_DESC) {
			let parameters = indy.descriptor.parse()?.parameter_descriptors.len();
			let recipe: JavaString = std::iter::repeat(TAG_ARG).take(parameters).collect();
			concat(indy, &recipe, &[]).map(Some)
		} else if is_bootstrap(&indy.handle, "makeConcatWithConstants", MAKE_CONCAT_WITH_CONSTANTS_DESC) {
			match indy.arguments.split_first() {
				None => {
					let mut code = CodeBuilder::new();
					code.push_string("");
					code.push(Instruction::AReturn);
					Ok(Some(code.finish()))
				},
				Some((Loadable::String(recipe), constants)) => concat(indy, recipe, constants).map(Some),
				Some(_) => bail!("Invalid template value in string concatenation"),
			}
		} else {
			Ok(None)
		}
	})
}

fn is_bootstrap(handle: &Handle, name: &str, desc: &str) -> bool {
	matches!(handle, Handle::InvokeStatic(_, _)) && handle.is_method(STRING_CONCAT_FACTORY, name, desc)
}

/// Builds the string with a `java/lang/StringBuilder`, appending literal parts of the recipe, the arguments of the
/// method and the constants as the recipe says.
fn concat(indy: &InvokeDynamic, recipe: &JavaString, constants: &[Loadable]) -> Result<Code> {
	let descriptor = indy.descriptor.parse()?;
	let mut parameters = descriptor.parameter_descriptors.iter();
	let mut constants = constants.iter();
	let mut slot = 0;

	let mut code = CodeBuilder::new();
	code.construct(STRING_BUILDER);

	let mut literal = JavaString::new();
	for char in recipe.chars() {
		if char == TAG_ARG || char == TAG_CONST {
			flush(&mut code, &mut literal);
		}
		if char == TAG_ARG {
			let parameter = parameters.next()
				.with_context(|| anyhow!("string concatenation recipe {recipe:?} has more arguments than {}", indy.descriptor))?;
			code.load(parameter, slot);
			code.append(parameter);
			slot += parameter.size();
		} else if char == TAG_CONST {
			let constant = constants.next()
				.with_context(|| anyhow!("string concatenation recipe {recipe:?} has more constants than given"))?;
			code.push(Instruction::Ldc(constant.clone()));
			code.append(&loadable_type(constant)?);
		} else {
			literal.push_java(char);
		}
	}
	flush(&mut code, &mut literal);

	code.invoke_virtual(STRING_BUILDER, "toString", "()Ljava/lang/String;");
	code.return_value(Some(&Type::Object(ClassName::JAVA_LANG_STRING)));
	Ok(code.finish())
}

fn flush(code: &mut CodeBuilder, literal: &mut JavaString) {
	if !literal.is_empty() {
		code.push(Instruction::Ldc(Loadable::String(std::mem::replace(literal, JavaString::new()))));
		code.append(&Type::Object(ClassName::JAVA_LANG_STRING));
	}
}
