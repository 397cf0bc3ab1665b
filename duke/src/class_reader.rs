use std::io::Cursor;
use anyhow::{anyhow, bail, Context, Result};
use crate::class_constants::{attribute, opcode, type_annotation};
use crate::class_reader::labels::Labels;
use crate::class_reader::pool::{BootstrapMethodRead, PoolRead};
use crate::{class_constants, ClassRead, OptionExpansion};
use crate::tree::annotation::{Annotation, ElementValue, ElementValuePair, Object};
use crate::tree::attribute::Attribute;
use crate::tree::class::{ClassAccess, ClassFile, ClassSignature, EnclosingMethod, InnerClass};
use crate::tree::field::{Field, FieldAccess, FieldDescriptor, FieldName, FieldSignature};
use crate::tree::method::{Method, MethodAccess, MethodDescriptor, MethodName, MethodParameter, MethodSignature, ParameterFlags};
use crate::tree::method::code::{ArrayType, Code, Exception, Instruction, InstructionListEntry, LocalVariableName, Lv, LvIndex};
use crate::tree::module::{Module, ModuleExports, ModuleOpens, ModuleProvides, ModuleRequires};
use crate::tree::record::RecordComponent;
use crate::tree::type_annotation::{TargetInfo, TypeAnnotation, TypePath, TypePathKind};
use crate::tree::version::Version;

pub(crate) mod pool;
mod labels;

/// Skips the `attributes_count` and `attributes` items of a field or method.
fn skip_attributes(reader: &mut impl ClassRead) -> Result<()> {
	let attributes_count = reader.read_u16()?;
	for _ in 0..attributes_count {
		let _attribute_name_index = reader.read_u16()?;
		let attribute_length = reader.read_u32()?;
		reader.skip(attribute_length as i64)?;
	}
	Ok(())
}

/// Reads the magic and the version, accepting any version.
pub(crate) fn read_version(reader: &mut impl ClassRead) -> Result<Version> {
	let magic = reader.read_u32()?;
	if magic != class_constants::MAGIC {
		bail!("wrong magic: got {magic:#x}, expected 0xCAFEBABE");
	}

	let minor = reader.read_u16()?;
	let major = reader.read_u16()?;
	Ok(Version::new(major, minor))
}

fn read_header(reader: &mut impl ClassRead) -> Result<(Version, PoolRead)> {
	let version = read_version(reader)?;

	if version.major > Version::V23.major {
		bail!("unsupported class file version: {version}");
	}

	let pool = PoolRead::read(reader)?;
	Ok((version, pool))
}

pub(crate) fn read(reader: &mut impl ClassRead) -> Result<ClassFile> {
	let (version, pool) = read_header(reader)?;
	let pool = &pool;

	let access = ClassAccess::from(reader.read_u16()?);
	let name = pool.get_class(reader.read_u16()?)?;
	let super_class = pool.get_optional(reader.read_u16()?, PoolRead::get_class)?;
	let interfaces = reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| pool.get_class(r.read_u16()?)
	)?;

	let mut class = ClassFile::new(version, access, name, super_class, interfaces);

	// The `BootstrapMethods` attribute is needed for `ldc` of dynamic constants and for `invokedynamic`,
	// so we skip to the class attributes first and come back for the fields and methods afterwards.
	let fields_start = reader.marker()?;
	for _ in 0..2 {
		// fields and methods have the same structure
		for _ in 0..reader.read_u16()? {
			reader.skip(2 + 2 + 2)?;
			skip_attributes(reader)?;
		}
	}

	let bootstrap_methods = read_class_attributes(reader, pool, &mut class)
		.with_context(|| anyhow!("failed to read attributes of class {}", class.name))?;

	reader.with_pos(fields_start, |reader| {
		let fields_count = reader.read_u16()?;
		for _ in 0..fields_count {
			let field = read_field(reader, pool)
				.with_context(|| anyhow!("failed to read field of class {}", class.name))?;
			class.fields.push(field);
		}

		let methods_count = reader.read_u16()?;
		for _ in 0..methods_count {
			let method = read_method(reader, pool, &bootstrap_methods)
				.with_context(|| anyhow!("failed to read method of class {}", class.name))?;
			class.methods.push(method);
		}
		Ok(())
	})?;

	Ok(class)
}

/// Reads the attributes of the class into `class`, and returns the bootstrap methods.
fn read_class_attributes(reader: &mut impl ClassRead, pool: &PoolRead, class: &mut ClassFile) -> Result<Vec<BootstrapMethodRead>> {
	let mut bootstrap_methods = None;

	let attributes_count = reader.read_u16()?;
	for _ in 0..attributes_count {
		let attribute_name = pool.get_utf8(reader.read_u16()?)?;
		let length = reader.read_u32()?;

		match attribute_name.as_str() {
			attribute::DEPRECATED => class.has_deprecated_attribute = true,
			attribute::SYNTHETIC => class.has_synthetic_attribute = true,
			attribute::INNER_CLASSES => {
				let inner_classes = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| Ok(InnerClass {
						inner_class: pool.get_class(r.read_u16()?)?,
						outer_class: pool.get_optional(r.read_u16()?, PoolRead::get_class)?,
						inner_name: pool.get_optional(r.read_u16()?, PoolRead::get_utf8)?,
						flags: r.read_u16()?.into(),
					})
				)?;
				class.inner_classes.insert_if_empty(inner_classes).context("only one InnerClasses attribute is allowed")?;
			},
			attribute::ENCLOSING_METHOD => {
				let enclosing_method = EnclosingMethod {
					class: pool.get_class(reader.read_u16()?)?,
					method: pool.get_optional(reader.read_u16()?, PoolRead::get_method_name_and_type)?,
				};
				class.enclosing_method.insert_if_empty(enclosing_method).context("only one EnclosingMethod attribute is allowed")?;
			},
			attribute::SIGNATURE => {
				let signature = ClassSignature::from(pool.get_utf8(reader.read_u16()?)?);
				class.signature.insert_if_empty(signature).context("only one Signature attribute is allowed")?;
			},
			attribute::SOURCE_FILE => {
				let source_file = pool.get_utf8(reader.read_u16()?)?;
				class.source_file.insert_if_empty(source_file).context("only one SourceFile attribute is allowed")?;
			},
			attribute::SOURCE_DEBUG_EXTENSION => {
				let bytes = reader.read_u8_vec(length as usize)?;
				class.source_debug_extension.insert_if_empty(bytes).context("only one SourceDebugExtension attribute is allowed")?;
			},
			attribute::RUNTIME_VISIBLE_ANNOTATIONS => class.runtime_visible_annotations = read_annotations(reader, pool)?,
			attribute::RUNTIME_INVISIBLE_ANNOTATIONS => class.runtime_invisible_annotations = read_annotations(reader, pool)?,
			attribute::RUNTIME_VISIBLE_TYPE_ANNOTATIONS => class.runtime_visible_type_annotations = read_type_annotations(reader, pool)?,
			attribute::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS => class.runtime_invisible_type_annotations = read_type_annotations(reader, pool)?,
			attribute::MODULE => {
				let module = read_module(reader, pool)?;
				class.module.insert_if_empty(module).context("only one Module attribute is allowed")?;
			},
			attribute::MODULE_PACKAGES => {
				let packages = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| pool.get_package(r.read_u16()?)
				)?;
				class.module_packages.insert_if_empty(packages).context("only one ModulePackages attribute is allowed")?;
			},
			attribute::MODULE_MAIN_CLASS => {
				let main_class = pool.get_class(reader.read_u16()?)?;
				class.module_main_class.insert_if_empty(main_class).context("only one ModuleMainClass attribute is allowed")?;
			},
			attribute::NEST_HOST => {
				let nest_host = pool.get_class(reader.read_u16()?)?;
				class.nest_host_class.insert_if_empty(nest_host).context("only one NestHost attribute is allowed")?;
			},
			attribute::NEST_MEMBERS => {
				let nest_members = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| pool.get_class(r.read_u16()?)
				)?;
				class.nest_members.insert_if_empty(nest_members).context("only one NestMembers attribute is allowed")?;
			},
			attribute::PERMITTED_SUBCLASSES => {
				let permitted_subclasses = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| pool.get_class(r.read_u16()?)
				)?;
				class.permitted_subclasses.insert_if_empty(permitted_subclasses).context("only one PermittedSubclasses attribute is allowed")?;
			},
			attribute::RECORD => {
				let components = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| read_record_component(r, pool)
				)?;
				class.record_components.insert_if_empty(components).context("only one Record attribute is allowed")?;
			},
			attribute::BOOTSTRAP_METHODS => {
				let methods = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| Ok(BootstrapMethodRead {
						handle: pool.get_method_handle(r.read_u16()?)?,
						arguments: r.read_vec(|r| r.read_u16_as_usize(), |r| r.read_u16())?,
					})
				)?;
				bootstrap_methods.insert_if_empty(methods).context("only one BootstrapMethods attribute is allowed")?;
			},
			_ => {
				let bytes = reader.read_u8_vec(length as usize)?;
				class.attributes.push(Attribute { name: attribute_name, bytes });
			},
		}
	}

	Ok(bootstrap_methods.unwrap_or_default())
}

fn read_field(reader: &mut impl ClassRead, pool: &PoolRead) -> Result<Field> {
	let access = FieldAccess::from(reader.read_u16()?);
	let name = FieldName::checked(pool.get_utf8(reader.read_u16()?)?)?;
	let descriptor = FieldDescriptor::checked(pool.get_utf8(reader.read_u16()?)?)?;

	let mut field = Field::new(access, name, descriptor);

	let attributes_count = reader.read_u16()?;
	for _ in 0..attributes_count {
		let attribute_name = pool.get_utf8(reader.read_u16()?)?;
		let length = reader.read_u32()?;

		match attribute_name.as_str() {
			attribute::DEPRECATED => field.has_deprecated_attribute = true,
			attribute::SYNTHETIC => field.has_synthetic_attribute = true,
			attribute::CONSTANT_VALUE => {
				let constant_value = pool.get_constant_value(reader.read_u16()?)?;
				field.constant_value.insert_if_empty(constant_value).context("only one ConstantValue attribute is allowed")?;
			},
			attribute::SIGNATURE => {
				let signature = FieldSignature::from(pool.get_utf8(reader.read_u16()?)?);
				field.signature.insert_if_empty(signature).context("only one Signature attribute is allowed")?;
			},
			attribute::RUNTIME_VISIBLE_ANNOTATIONS => field.runtime_visible_annotations = read_annotations(reader, pool)?,
			attribute::RUNTIME_INVISIBLE_ANNOTATIONS => field.runtime_invisible_annotations = read_annotations(reader, pool)?,
			attribute::RUNTIME_VISIBLE_TYPE_ANNOTATIONS => field.runtime_visible_type_annotations = read_type_annotations(reader, pool)?,
			attribute::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS => field.runtime_invisible_type_annotations = read_type_annotations(reader, pool)?,
			_ => {
				let bytes = reader.read_u8_vec(length as usize)?;
				field.attributes.push(Attribute { name: attribute_name, bytes });
			},
		}
	}

	Ok(field)
}

fn read_method(reader: &mut impl ClassRead, pool: &PoolRead, bootstrap_methods: &[BootstrapMethodRead]) -> Result<Method> {
	let access = MethodAccess::from(reader.read_u16()?);
	let name = MethodName::checked(pool.get_utf8(reader.read_u16()?)?)?;
	let descriptor = MethodDescriptor::checked(pool.get_utf8(reader.read_u16()?)?)?;

	let mut method = Method::new(access, name, descriptor);

	let attributes_count = reader.read_u16()?;
	for _ in 0..attributes_count {
		let attribute_name = pool.get_utf8(reader.read_u16()?)?;
		let length = reader.read_u32()?;

		match attribute_name.as_str() {
			attribute::DEPRECATED => method.has_deprecated_attribute = true,
			attribute::SYNTHETIC => method.has_synthetic_attribute = true,
			attribute::CODE => {
				let code = read_code(reader, pool, bootstrap_methods)
					.with_context(|| anyhow!("failed to read code of method {} {}", method.name, method.descriptor))?;
				method.code.insert_if_empty(code).context("only one Code attribute is allowed")?;
			},
			attribute::EXCEPTIONS => {
				let exceptions = reader.read_vec(
					|r| r.read_u16_as_usize(),
					|r| pool.get_class(r.read_u16()?)
				)?;
				method.exceptions.insert_if_empty(exceptions).context("only one Exceptions attribute is allowed")?;
			},
			attribute::SIGNATURE => {
				let signature = MethodSignature::from(pool.get_utf8(reader.read_u16()?)?);
				method.signature.insert_if_empty(signature).context("only one Signature attribute is allowed")?;
			},
			attribute::RUNTIME_VISIBLE_ANNOTATIONS => method.runtime_visible_annotations = read_annotations(reader, pool)?,
			attribute::RUNTIME_INVISIBLE_ANNOTATIONS => method.runtime_invisible_annotations = read_annotations(reader, pool)?,
			attribute::RUNTIME_VISIBLE_TYPE_ANNOTATIONS => method.runtime_visible_type_annotations = read_type_annotations(reader, pool)?,
			attribute::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS => method.runtime_invisible_type_annotations = read_type_annotations(reader, pool)?,
			attribute::RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS => {
				let annotations = read_parameter_annotations(reader, pool)?;
				method.runtime_visible_parameter_annotations.insert_if_empty(annotations)
					.context("only one RuntimeVisibleParameterAnnotations attribute is allowed")?;
			},
			attribute::RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS => {
				let annotations = read_parameter_annotations(reader, pool)?;
				method.runtime_invisible_parameter_annotations.insert_if_empty(annotations)
					.context("only one RuntimeInvisibleParameterAnnotations attribute is allowed")?;
			},
			attribute::ANNOTATION_DEFAULT => {
				let value = read_element_value(reader, pool)?;
				method.annotation_default.insert_if_empty(value).context("only one AnnotationDefault attribute is allowed")?;
			},
			attribute::METHOD_PARAMETERS => {
				let parameters = reader.read_vec(
					|r| r.read_u8_as_usize(),
					|r| Ok(MethodParameter {
						name: pool.get_optional(r.read_u16()?, PoolRead::get_utf8)?.map(Into::into),
						flags: ParameterFlags::from(r.read_u16()?),
					})
				)?;
				method.method_parameters.insert_if_empty(parameters).context("only one MethodParameters attribute is allowed")?;
			},
			_ => {
				let bytes = reader.read_u8_vec(length as usize)?;
				method.attributes.push(Attribute { name: attribute_name, bytes });
			},
		}
	}

	Ok(method)
}

fn read_record_component(reader: &mut impl ClassRead, pool: &PoolRead) -> Result<RecordComponent> {
	let name = FieldName::checked(pool.get_utf8(reader.read_u16()?)?)?;
	let descriptor = FieldDescriptor::checked(pool.get_utf8(reader.read_u16()?)?)?;

	let mut component = RecordComponent::new(name, descriptor);

	let attributes_count = reader.read_u16()?;
	for _ in 0..attributes_count {
		let attribute_name = pool.get_utf8(reader.read_u16()?)?;
		let length = reader.read_u32()?;

		match attribute_name.as_str() {
			attribute::SIGNATURE => {
				let signature = FieldSignature::from(pool.get_utf8(reader.read_u16()?)?);
				component.signature.insert_if_empty(signature).context("only one Signature attribute is allowed")?;
			},
			attribute::RUNTIME_VISIBLE_ANNOTATIONS => component.runtime_visible_annotations = read_annotations(reader, pool)?,
			attribute::RUNTIME_INVISIBLE_ANNOTATIONS => component.runtime_invisible_annotations = read_annotations(reader, pool)?,
			attribute::RUNTIME_VISIBLE_TYPE_ANNOTATIONS => component.runtime_visible_type_annotations = read_type_annotations(reader, pool)?,
			attribute::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS => component.runtime_invisible_type_annotations = read_type_annotations(reader, pool)?,
			_ => {
				let bytes = reader.read_u8_vec(length as usize)?;
				component.attributes.push(Attribute { name: attribute_name, bytes });
			},
		}
	}

	Ok(component)
}

/// A helper trait for reading the operands of instructions.
trait CodeReadHelper: ClassRead {
	fn read_u8_as_local_variable(&mut self) -> Result<LvIndex> {
		Ok(LvIndex { index: self.read_u8()? as u16 })
	}
	fn read_u16_as_local_variable(&mut self) -> Result<LvIndex> {
		Ok(LvIndex { index: self.read_u16()? })
	}

	fn read_i16_branch_target(&mut self, opcode_pos: u16) -> Result<u16> {
		let branch = self.read_i16()?;
		opcode_pos.checked_add_signed(branch)
			.with_context(|| anyhow!("branch offset {branch} from bytecode offset {opcode_pos} is out of range"))
	}

	fn read_i32_branch_target(&mut self, opcode_pos: u16) -> Result<u16> {
		let branch = self.read_i32()?;
		let target = (opcode_pos as u32).checked_add_signed(branch)
			.with_context(|| anyhow!("branch offset {branch} from bytecode offset {opcode_pos} is out of range"))?;
		u16::try_from(target)
			.with_context(|| anyhow!("branch target {target} from bytecode offset {opcode_pos} is out of range"))
	}
}

impl<T: ClassRead> CodeReadHelper for T {}

/// Skips the padding of `tableswitch` and `lookupswitch`. The position of the reader must be relative to the start of the code.
fn align_to_4_byte_boundary(reader: &mut impl ClassRead) -> Result<()> {
	let padding = (4 - reader.marker()? % 4) % 4;
	reader.skip(padding as i64)
}

fn read_code(reader: &mut impl ClassRead, pool: &PoolRead, bootstrap_methods: &[BootstrapMethodRead]) -> Result<Code> {
	let max_stack = reader.read_u16()?;
	let max_locals = reader.read_u16()?;

	let code_length = reader.read_u32()?;
	// This allows us to store bytecode offsets in an u16.
	if code_length == 0 || code_length > u16::MAX as u32 {
		bail!("`code_length` must be greater than zero and less than 65536, got {code_length}");
	}
	let code_length = code_length as u16;

	let mut labels = Labels::new(code_length);

	let bytecode = reader.read_u8_vec(code_length as usize)?;

	// Decoding the instructions creates the labels for all branch targets.
	let mut instructions = Vec::new();
	let mut r = Cursor::new(&bytecode[..]);
	while (r.position() as usize) < bytecode.len() {
		let opcode_pos = r.position() as u16;
		let instruction = read_instruction(&mut r, opcode_pos, pool, bootstrap_methods, &mut labels)
			.with_context(|| anyhow!("at bytecode offset {opcode_pos}"))?;
		instructions.push((opcode_pos, instruction));
	}

	let exception_table = reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| Ok(Exception {
			start: labels.get_or_create(r.read_u16()?)?,
			end: labels.get_or_create_end(r.read_u16()?)?,
			handler: labels.get_or_create(r.read_u16()?)?,
			catch: pool.get_optional(r.read_u16()?, PoolRead::get_class)?,
		})
	)?;

	let mut line_numbers: Option<Vec<_>> = None;
	let mut local_variables: Option<Vec<Lv>> = None;
	let mut local_variable_types = Vec::new();
	let mut attributes = Vec::new();

	let attributes_count = reader.read_u16()?;
	for _ in 0..attributes_count {
		let attribute_name = pool.get_utf8(reader.read_u16()?)?;
		let length = reader.read_u32()?;

		match attribute_name.as_str() {
			// recomputed on writing
			attribute::STACK_MAP_TABLE => reader.skip(length as i64)?,
			attribute::LINE_NUMBER_TABLE => {
				let table = line_numbers.get_or_insert_with(Vec::new);
				for _ in 0..reader.read_u16()? {
					let start = labels.get_or_create(reader.read_u16()?)?;
					let line_number = reader.read_u16()?;
					table.push((start, line_number));
				}
			},
			attribute::LOCAL_VARIABLE_TABLE => {
				let table = local_variables.get_or_insert_with(Vec::new);
				for _ in 0..reader.read_u16()? {
					let start_pc = reader.read_u16()?;
					let length = reader.read_u16()?;
					table.push(Lv {
						range: labels.get_or_create_range(start_pc, length)?,
						name: LocalVariableName::checked(pool.get_utf8(reader.read_u16()?)?)?,
						descriptor: Some(FieldDescriptor::checked(pool.get_utf8(reader.read_u16()?)?)?),
						signature: None,
						index: reader.read_u16_as_local_variable()?,
					});
				}
			},
			attribute::LOCAL_VARIABLE_TYPE_TABLE => {
				for _ in 0..reader.read_u16()? {
					let start_pc = reader.read_u16()?;
					let length = reader.read_u16()?;
					local_variable_types.push(Lv {
						range: labels.get_or_create_range(start_pc, length)?,
						name: LocalVariableName::checked(pool.get_utf8(reader.read_u16()?)?)?,
						descriptor: None,
						signature: Some(FieldSignature::from(pool.get_utf8(reader.read_u16()?)?)),
						index: reader.read_u16_as_local_variable()?,
					});
				}
			},
			_ => {
				let bytes = reader.read_u8_vec(length as usize)?;
				attributes.push(Attribute { name: attribute_name, bytes });
			},
		}
	}

	// Each entry of the LocalVariableTypeTable belongs to an entry of the LocalVariableTable.
	for lvt in local_variable_types {
		let table = local_variables.get_or_insert_with(Vec::new);
		let existing = table.iter_mut()
			.find(|lv| lv.range == lvt.range && lv.index == lvt.index && lv.name == lvt.name);
		match existing {
			Some(lv) => lv.signature = lvt.signature,
			None => table.push(lvt),
		}
	}

	let last_label = labels.get(code_length);

	let mut instructions_with_labels = Vec::with_capacity(instructions.len());
	let mut labels_on_instructions = 0;
	for (pc, instruction) in instructions {
		let label = labels.get(pc);
		if label.is_some() {
			labels_on_instructions += 1;
		}
		instructions_with_labels.push(InstructionListEntry { label, instruction });
	}
	if labels_on_instructions + usize::from(last_label.is_some()) != labels.len() {
		bail!("some bytecode offsets referenced in the code don't point to the start of an instruction");
	}

	Ok(Code {
		max_stack: Some(max_stack),
		max_locals: Some(max_locals),
		instructions: instructions_with_labels,
		exception_table,
		last_label,
		line_numbers,
		local_variables,
		attributes,
	})
}

fn read_instruction(
	r: &mut Cursor<&[u8]>,
	opcode_pos: u16,
	pool: &PoolRead,
	bootstrap_methods: &[BootstrapMethodRead],
	labels: &mut Labels,
) -> Result<Instruction> {
	Ok(match r.read_u8()? {
		opcode::NOP         => Instruction::Nop,
		opcode::ACONST_NULL => Instruction::AConstNull,
		opcode::ICONST_M1   => Instruction::IConstM1,
		opcode::ICONST_0    => Instruction::IConst0,
		opcode::ICONST_1    => Instruction::IConst1,
		opcode::ICONST_2    => Instruction::IConst2,
		opcode::ICONST_3    => Instruction::IConst3,
		opcode::ICONST_4    => Instruction::IConst4,
		opcode::ICONST_5    => Instruction::IConst5,
		opcode::LCONST_0    => Instruction::LConst0,
		opcode::LCONST_1    => Instruction::LConst1,
		opcode::FCONST_0    => Instruction::FConst0,
		opcode::FCONST_1    => Instruction::FConst1,
		opcode::FCONST_2    => Instruction::FConst2,
		opcode::DCONST_0    => Instruction::DConst0,
		opcode::DCONST_1    => Instruction::DConst1,
		opcode::BIPUSH      => Instruction::BiPush(r.read_i8()?),
		opcode::SIPUSH      => Instruction::SiPush(r.read_i16()?),
		opcode::LDC         => Instruction::Ldc(pool.get_loadable(r.read_u8()? as u16, bootstrap_methods)?),
		opcode::LDC_W       => Instruction::Ldc(pool.get_loadable(r.read_u16()?, bootstrap_methods)?),
		opcode::LDC2_W      => Instruction::Ldc(pool.get_loadable(r.read_u16()?, bootstrap_methods)?),
		opcode::ILOAD       => Instruction::ILoad(r.read_u8_as_local_variable()?),
		opcode::LLOAD       => Instruction::LLoad(r.read_u8_as_local_variable()?),
		opcode::FLOAD       => Instruction::FLoad(r.read_u8_as_local_variable()?),
		opcode::DLOAD       => Instruction::DLoad(r.read_u8_as_local_variable()?),
		opcode::ALOAD       => Instruction::ALoad(r.read_u8_as_local_variable()?),
		opcode @ opcode::ILOAD_0..=opcode::ALOAD_3 => {
			// four opcodes per type, in the order of `iload`, `lload`, `fload`, `dload`, `aload`
			let shifted = opcode - opcode::ILOAD_0;
			let index = LvIndex { index: (shifted & 0b11) as u16 };
			match shifted >> 2 {
				0 => Instruction::ILoad(index),
				1 => Instruction::LLoad(index),
				2 => Instruction::FLoad(index),
				3 => Instruction::DLoad(index),
				_ => Instruction::ALoad(index),
			}
		},
		opcode::IALOAD => Instruction::IALoad,
		opcode::LALOAD => Instruction::LALoad,
		opcode::FALOAD => Instruction::FALoad,
		opcode::DALOAD => Instruction::DALoad,
		opcode::AALOAD => Instruction::AALoad,
		opcode::BALOAD => Instruction::BALoad,
		opcode::CALOAD => Instruction::CALoad,
		opcode::SALOAD => Instruction::SALoad,
		opcode::ISTORE => Instruction::IStore(r.read_u8_as_local_variable()?),
		opcode::LSTORE => Instruction::LStore(r.read_u8_as_local_variable()?),
		opcode::FSTORE => Instruction::FStore(r.read_u8_as_local_variable()?),
		opcode::DSTORE => Instruction::DStore(r.read_u8_as_local_variable()?),
		opcode::ASTORE => Instruction::AStore(r.read_u8_as_local_variable()?),
		opcode @ opcode::ISTORE_0..=opcode::ASTORE_3 => {
			let shifted = opcode - opcode::ISTORE_0;
			let index = LvIndex { index: (shifted & 0b11) as u16 };
			match shifted >> 2 {
				0 => Instruction::IStore(index),
				1 => Instruction::LStore(index),
				2 => Instruction::FStore(index),
				3 => Instruction::DStore(index),
				_ => Instruction::AStore(index),
			}
		},
		opcode::IASTORE => Instruction::IAStore,
		opcode::LASTORE => Instruction::LAStore,
		opcode::FASTORE => Instruction::FAStore,
		opcode::DASTORE => Instruction::DAStore,
		opcode::AASTORE => Instruction::AAStore,
		opcode::BASTORE => Instruction::BAStore,
		opcode::CASTORE => Instruction::CAStore,
		opcode::SASTORE => Instruction::SAStore,
		opcode::POP     => Instruction::Pop,
		opcode::POP2    => Instruction::Pop2,
		opcode::DUP     => Instruction::Dup,
		opcode::DUP_X1  => Instruction::DupX1,
		opcode::DUP_X2  => Instruction::DupX2,
		opcode::DUP2    => Instruction::Dup2,
		opcode::DUP2_X1 => Instruction::Dup2X1,
		opcode::DUP2_X2 => Instruction::Dup2X2,
		opcode::SWAP    => Instruction::Swap,
		opcode::IADD    => Instruction::IAdd,
		opcode::LADD    => Instruction::LAdd,
		opcode::FADD    => Instruction::FAdd,
		opcode::DADD    => Instruction::DAdd,
		opcode::ISUB    => Instruction::ISub,
		opcode::LSUB    => Instruction::LSub,
		opcode::FSUB    => Instruction::FSub,
		opcode::DSUB    => Instruction::DSub,
		opcode::IMUL    => Instruction::IMul,
		opcode::LMUL    => Instruction::LMul,
		opcode::FMUL    => Instruction::FMul,
		opcode::DMUL    => Instruction::DMul,
		opcode::IDIV    => Instruction::IDiv,
		opcode::LDIV    => Instruction::LDiv,
		opcode::FDIV    => Instruction::FDiv,
		opcode::DDIV    => Instruction::DDiv,
		opcode::IREM    => Instruction::IRem,
		opcode::LREM    => Instruction::LRem,
		opcode::FREM    => Instruction::FRem,
		opcode::DREM    => Instruction::DRem,
		opcode::INEG    => Instruction::INeg,
		opcode::LNEG    => Instruction::LNeg,
		opcode::FNEG    => Instruction::FNeg,
		opcode::DNEG    => Instruction::DNeg,
		opcode::ISHL    => Instruction::IShl,
		opcode::LSHL    => Instruction::LShl,
		opcode::ISHR    => Instruction::IShr,
		opcode::LSHR    => Instruction::LShr,
		opcode::IUSHR   => Instruction::IUShr,
		opcode::LUSHR   => Instruction::LUShr,
		opcode::IAND    => Instruction::IAnd,
		opcode::LAND    => Instruction::LAnd,
		opcode::IOR     => Instruction::IOr,
		opcode::LOR     => Instruction::LOr,
		opcode::IXOR    => Instruction::IXor,
		opcode::LXOR    => Instruction::LXor,
		opcode::IINC    => {
			let index = r.read_u8_as_local_variable()?;
			let value = r.read_i8()?;
			Instruction::IInc(index, value as i16)
		},
		opcode::I2L   => Instruction::I2L,
		opcode::I2F   => Instruction::I2F,
		opcode::I2D   => Instruction::I2D,
		opcode::L2I   => Instruction::L2I,
		opcode::L2F   => Instruction::L2F,
		opcode::L2D   => Instruction::L2D,
		opcode::F2I   => Instruction::F2I,
		opcode::F2L   => Instruction::F2L,
		opcode::F2D   => Instruction::F2D,
		opcode::D2I   => Instruction::D2I,
		opcode::D2L   => Instruction::D2L,
		opcode::D2F   => Instruction::D2F,
		opcode::I2B   => Instruction::I2B,
		opcode::I2C   => Instruction::I2C,
		opcode::I2S   => Instruction::I2S,
		opcode::LCMP  => Instruction::LCmp,
		opcode::FCMPL => Instruction::FCmpL,
		opcode::FCMPG => Instruction::FCmpG,
		opcode::DCMPL => Instruction::DCmpL,
		opcode::DCMPG => Instruction::DCmpG,
		opcode @ (opcode::IFEQ..=opcode::JSR | opcode::IFNULL | opcode::IFNONNULL) => {
			let target = labels.get_or_create(r.read_i16_branch_target(opcode_pos)?)?;
			match opcode {
				opcode::IFEQ      => Instruction::IfEq(target),
				opcode::IFNE      => Instruction::IfNe(target),
				opcode::IFLT      => Instruction::IfLt(target),
				opcode::IFGE      => Instruction::IfGe(target),
				opcode::IFGT      => Instruction::IfGt(target),
				opcode::IFLE      => Instruction::IfLe(target),
				opcode::IF_ICMPEQ => Instruction::IfICmpEq(target),
				opcode::IF_ICMPNE => Instruction::IfICmpNe(target),
				opcode::IF_ICMPLT => Instruction::IfICmpLt(target),
				opcode::IF_ICMPGE => Instruction::IfICmpGe(target),
				opcode::IF_ICMPGT => Instruction::IfICmpGt(target),
				opcode::IF_ICMPLE => Instruction::IfICmpLe(target),
				opcode::IF_ACMPEQ => Instruction::IfACmpEq(target),
				opcode::IF_ACMPNE => Instruction::IfACmpNe(target),
				opcode::GOTO      => Instruction::Goto(target),
				opcode::JSR       => Instruction::Jsr(target),
				opcode::IFNULL    => Instruction::IfNull(target),
				_                 => Instruction::IfNonNull(target),
			}
		},
		opcode::GOTO_W => Instruction::Goto(labels.get_or_create(r.read_i32_branch_target(opcode_pos)?)?),
		opcode::JSR_W  => Instruction::Jsr(labels.get_or_create(r.read_i32_branch_target(opcode_pos)?)?),
		opcode::RET    => Instruction::Ret(r.read_u8_as_local_variable()?),
		opcode::TABLESWITCH => {
			align_to_4_byte_boundary(r)?;

			let default = labels.get_or_create(r.read_i32_branch_target(opcode_pos)?)?;
			let low = r.read_i32()?;
			let high = r.read_i32()?;
			if low > high {
				bail!("in tableswitch `low` must be lower or equal to `high`, got low={low} and high={high}");
			}

			let mut table = Vec::with_capacity((high as i64 - low as i64 + 1) as usize);
			for _ in low..=high {
				table.push(labels.get_or_create(r.read_i32_branch_target(opcode_pos)?)?);
			}

			Instruction::TableSwitch { default, low, high, table }
		},
		opcode::LOOKUPSWITCH => {
			align_to_4_byte_boundary(r)?;

			let default = labels.get_or_create(r.read_i32_branch_target(opcode_pos)?)?;
			let npairs = r.read_i32()?;
			let npairs = u32::try_from(npairs)
				.with_context(|| anyhow!("in lookupswitch `npairs` must not be negative, got {npairs}"))?;

			let mut pairs = Vec::with_capacity(npairs as usize);
			for _ in 0..npairs {
				let key = r.read_i32()?;
				pairs.push((key, labels.get_or_create(r.read_i32_branch_target(opcode_pos)?)?));
			}

			Instruction::LookupSwitch { default, pairs }
		},
		opcode::IRETURN => Instruction::IReturn,
		opcode::LRETURN => Instruction::LReturn,
		opcode::FRETURN => Instruction::FReturn,
		opcode::DRETURN => Instruction::DReturn,
		opcode::ARETURN => Instruction::AReturn,
		opcode::RETURN  => Instruction::Return,
		opcode::GETSTATIC => Instruction::GetStatic(pool.get_field_ref(r.read_u16()?)?),
		opcode::PUTSTATIC => Instruction::PutStatic(pool.get_field_ref(r.read_u16()?)?),
		opcode::GETFIELD  => Instruction::GetField(pool.get_field_ref(r.read_u16()?)?),
		opcode::PUTFIELD  => Instruction::PutField(pool.get_field_ref(r.read_u16()?)?),
		opcode::INVOKEVIRTUAL => Instruction::InvokeVirtual(pool.get_method_ref(r.read_u16()?)?),
		opcode::INVOKESPECIAL => {
			let (method_ref, is_interface) = pool.get_method_ref_or_interface_method_ref(r.read_u16()?)?;
			Instruction::InvokeSpecial(method_ref, is_interface)
		},
		opcode::INVOKESTATIC => {
			let (method_ref, is_interface) = pool.get_method_ref_or_interface_method_ref(r.read_u16()?)?;
			Instruction::InvokeStatic(method_ref, is_interface)
		},
		opcode::INVOKEINTERFACE => {
			let method_ref = pool.get_interface_method_ref(r.read_u16()?)?;
			let _count = r.read_u8()?; // recomputed on writing
			let _zero = r.read_u8()?;
			Instruction::InvokeInterface(method_ref)
		},
		opcode::INVOKEDYNAMIC => {
			let invoke_dynamic = pool.get_invoke_dynamic(r.read_u16()?, bootstrap_methods)?;
			let _zero = r.read_u16()?;
			Instruction::InvokeDynamic(invoke_dynamic)
		},
		opcode::NEW          => Instruction::New(pool.get_class(r.read_u16()?)?),
		opcode::NEWARRAY     => Instruction::NewArray(ArrayType::from_atype(r.read_u8()?)?),
		opcode::ANEWARRAY    => Instruction::ANewArray(pool.get_class(r.read_u16()?)?),
		opcode::ARRAYLENGTH  => Instruction::ArrayLength,
		opcode::ATHROW       => Instruction::AThrow,
		opcode::CHECKCAST    => Instruction::CheckCast(pool.get_class(r.read_u16()?)?),
		opcode::INSTANCEOF   => Instruction::InstanceOf(pool.get_class(r.read_u16()?)?),
		opcode::MONITORENTER => Instruction::MonitorEnter,
		opcode::MONITOREXIT  => Instruction::MonitorExit,
		opcode::WIDE => match r.read_u8()? {
			opcode::ILOAD  => Instruction::ILoad( r.read_u16_as_local_variable()?),
			opcode::LLOAD  => Instruction::LLoad( r.read_u16_as_local_variable()?),
			opcode::FLOAD  => Instruction::FLoad( r.read_u16_as_local_variable()?),
			opcode::DLOAD  => Instruction::DLoad( r.read_u16_as_local_variable()?),
			opcode::ALOAD  => Instruction::ALoad( r.read_u16_as_local_variable()?),
			opcode::ISTORE => Instruction::IStore(r.read_u16_as_local_variable()?),
			opcode::LSTORE => Instruction::LStore(r.read_u16_as_local_variable()?),
			opcode::FSTORE => Instruction::FStore(r.read_u16_as_local_variable()?),
			opcode::DSTORE => Instruction::DStore(r.read_u16_as_local_variable()?),
			opcode::ASTORE => Instruction::AStore(r.read_u16_as_local_variable()?),
			opcode::RET    => Instruction::Ret(   r.read_u16_as_local_variable()?),
			opcode::IINC   => {
				let index = r.read_u16_as_local_variable()?;
				let value = r.read_i16()?;
				Instruction::IInc(index, value)
			},
			wide_opcode => bail!("unknown wide opcode {wide_opcode:#x}"),
		},
		opcode::MULTIANEWARRAY => Instruction::MultiANewArray(pool.get_class(r.read_u16()?)?, r.read_u8()?),

		// reserved, may not appear in class files
		opcode::BREAKPOINT => bail!("unknown opcode breakpoint"),
		opcode::IMPDEP1 => bail!("unknown opcode impdep1"),
		opcode::IMPDEP2 => bail!("unknown opcode impdep2"),

		opcode => bail!("unknown opcode {opcode:#x}"),
	})
}

fn read_annotations(reader: &mut impl ClassRead, pool: &PoolRead) -> Result<Vec<Annotation>> {
	reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| read_annotation(r, pool)
	)
}

fn read_parameter_annotations(reader: &mut impl ClassRead, pool: &PoolRead) -> Result<Vec<Vec<Annotation>>> {
	reader.read_vec(
		|r| r.read_u8_as_usize(),
		|r| read_annotations(r, pool)
	)
}

fn read_annotation(reader: &mut impl ClassRead, pool: &PoolRead) -> Result<Annotation> {
	let annotation_type = FieldDescriptor::checked(pool.get_utf8(reader.read_u16()?)?)?;
	let element_value_pairs = reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| Ok(ElementValuePair {
			name: pool.get_utf8(r.read_u16()?)?,
			value: read_element_value(r, pool)?,
		})
	)?;
	Ok(Annotation { annotation_type, element_value_pairs })
}

fn read_element_value(reader: &mut impl ClassRead, pool: &PoolRead) -> Result<ElementValue> {
	Ok(match reader.read_u8()? {
		b'B' => ElementValue::Object(Object::Byte(pool.get_integer_as_byte(reader.read_u16()?)?)),
		b'C' => ElementValue::Object(Object::Char(pool.get_integer_as_char(reader.read_u16()?)?)),
		b'D' => ElementValue::Object(Object::Double(pool.get_double(reader.read_u16()?)?)),
		b'F' => ElementValue::Object(Object::Float(pool.get_float(reader.read_u16()?)?)),
		b'I' => ElementValue::Object(Object::Integer(pool.get_integer(reader.read_u16()?)?)),
		b'J' => ElementValue::Object(Object::Long(pool.get_long(reader.read_u16()?)?)),
		b'S' => ElementValue::Object(Object::Short(pool.get_integer_as_short(reader.read_u16()?)?)),
		b'Z' => ElementValue::Object(Object::Boolean(pool.get_integer_as_boolean(reader.read_u16()?)?)),
		b's' => ElementValue::Object(Object::String(pool.get_utf8(reader.read_u16()?)?)),
		b'e' => ElementValue::Enum {
			type_name: FieldDescriptor::checked(pool.get_utf8(reader.read_u16()?)?)?,
			const_name: pool.get_utf8(reader.read_u16()?)?,
		},
		b'c' => ElementValue::Class(pool.get_utf8(reader.read_u16()?)?),
		b'@' => ElementValue::AnnotationInterface(read_annotation(reader, pool)?),
		b'[' => ElementValue::ArrayType(reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| read_element_value(r, pool)
		)?),
		tag => bail!("unknown `element_value` tag {tag:?}"),
	})
}

fn read_type_annotations(reader: &mut impl ClassRead, pool: &PoolRead) -> Result<Vec<TypeAnnotation>> {
	reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| Ok(TypeAnnotation {
			target: read_target_info(r)?,
			type_path: read_type_path(r)?,
			annotation: read_annotation(r, pool)?,
		})
	)
}

fn read_target_info(reader: &mut impl ClassRead) -> Result<TargetInfo> {
	Ok(match reader.read_u8()? {
		type_annotation::CLASS_TYPE_PARAMETER => TargetInfo::ClassTypeParameter { index: reader.read_u8()? },
		type_annotation::METHOD_TYPE_PARAMETER => TargetInfo::MethodTypeParameter { index: reader.read_u8()? },
		type_annotation::CLASS_EXTENDS => TargetInfo::Supertype { index: reader.read_u16()? },
		type_annotation::CLASS_TYPE_PARAMETER_BOUND => TargetInfo::ClassTypeParameterBound {
			type_parameter_index: reader.read_u8()?,
			bound_index: reader.read_u8()?,
		},
		type_annotation::METHOD_TYPE_PARAMETER_BOUND => TargetInfo::MethodTypeParameterBound {
			type_parameter_index: reader.read_u8()?,
			bound_index: reader.read_u8()?,
		},
		type_annotation::FIELD => TargetInfo::Field,
		type_annotation::METHOD_RETURN => TargetInfo::Return,
		type_annotation::METHOD_RECEIVER => TargetInfo::Receiver,
		type_annotation::METHOD_FORMAL_PARAMETER => TargetInfo::FormalParameter { index: reader.read_u8()? },
		type_annotation::THROWS => TargetInfo::Throws { index: reader.read_u16()? },
		tag => bail!("unknown type annotation target {tag:#x} outside of code"),
	})
}

fn read_type_path(reader: &mut impl ClassRead) -> Result<TypePath> {
	let path = reader.read_vec(
		|r| r.read_u8_as_usize(),
		|r| {
			let kind = r.read_u8()?;
			let type_argument_index = r.read_u8()?;
			let kind = match kind {
				0 => TypePathKind::ArrayDeeper,
				1 => TypePathKind::NestedDeeper,
				2 => TypePathKind::WildcardBound,
				3 => return Ok(TypePathKind::TypeArgument { index: type_argument_index }),
				kind => bail!("`type_path_kind` must be in range 0 to 3, got {kind}"),
			};
			if type_argument_index != 0 {
				bail!("for {kind:?}, `type_argument_index` must be zero, got {type_argument_index}");
			}
			Ok(kind)
		}
	)?;
	Ok(TypePath { path })
}

fn read_module(reader: &mut impl ClassRead, pool: &PoolRead) -> Result<Module> {
	Ok(Module {
		name: pool.get_module(reader.read_u16()?)?,
		flags: reader.read_u16()?.into(),
		version: pool.get_optional(reader.read_u16()?, PoolRead::get_utf8)?,
		requires: reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| Ok(ModuleRequires {
				name: pool.get_module(r.read_u16()?)?,
				flags: r.read_u16()?.into(),
				version: pool.get_optional(r.read_u16()?, PoolRead::get_utf8)?,
			})
		)?,
		exports: reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| Ok(ModuleExports {
				name: pool.get_package(r.read_u16()?)?,
				flags: r.read_u16()?.into(),
				exports_to: r.read_vec(|r| r.read_u16_as_usize(), |r| pool.get_module(r.read_u16()?))?,
			})
		)?,
		opens: reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| Ok(ModuleOpens {
				name: pool.get_package(r.read_u16()?)?,
				flags: r.read_u16()?.into(),
				opens_to: r.read_vec(|r| r.read_u16_as_usize(), |r| pool.get_module(r.read_u16()?))?,
			})
		)?,
		uses: reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| pool.get_class(r.read_u16()?)
		)?,
		provides: reader.read_vec(
			|r| r.read_u16_as_usize(),
			|r| Ok(ModuleProvides {
				name: pool.get_class(r.read_u16()?)?,
				provides_with: r.read_vec(|r| r.read_u16_as_usize(), |r| pool.get_class(r.read_u16()?))?,
			})
		)?,
	})
}
