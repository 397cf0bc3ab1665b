use std::collections::{BTreeSet, HashSet};
use anyhow::{anyhow, bail, Context, Result};
use crate::{class_constants, ClassWrite, WriterOptions};
use crate::class_constants::{attribute, frame, opcode, type_annotation};
use crate::class_writer::frames::{analyze, compact_locals, CommonSuperClass, Frame, FrameType, ObjectOnly};
use crate::class_writer::labels::Labels;
use crate::class_writer::pool::PoolWrite;
use crate::tree::annotation::{Annotation, ElementValue, ElementValuePair, Object};
use crate::tree::attribute::Attribute;
use crate::tree::class::{ClassFile, ClassName};
use crate::tree::field::Field;
use crate::tree::method::code::{Code, Instruction, Label};
use crate::tree::method::Method;
use crate::tree::module::Module;
use crate::tree::record::RecordComponent;
use crate::tree::type_annotation::{TargetInfo, TypeAnnotation, TypePath, TypePathKind};

pub(crate) mod frames;
mod pool;
mod labels;

fn write_attribute<F>(writer: &mut impl ClassWrite, pool: &mut PoolWrite, name: &str, f: F) -> Result<()>
where
	F: FnOnce(&mut Vec<u8>, &mut PoolWrite) -> Result<()>,
{
	let mut buffer = Vec::new();
	f(&mut buffer, pool)?;
	writer.write_u16(pool.put_utf8(name)?)?;
	writer.write_usize_as_u32(buffer.len()).with_context(|| anyhow!("attribute {name:?} is too large"))?;
	writer.write_u8_slice(&buffer)
}

fn write_attribute_fix_length(writer: &mut impl ClassWrite, pool: &mut PoolWrite, name: &str, length: usize) -> Result<()> {
	writer.write_u16(pool.put_utf8(name)?)?;
	writer.write_usize_as_u32(length).with_context(|| anyhow!("attribute {name:?} is too large"))
}

fn write_unknown_attributes(writer: &mut impl ClassWrite, pool: &mut PoolWrite, attributes: &[Attribute]) -> Result<()> {
	for attribute in attributes {
		writer.write_u16(pool.put_utf8(&attribute.name)?)?;
		writer.write_usize_as_u32(attribute.bytes.len()).with_context(|| anyhow!("unknown attribute {:?} is too large", attribute.name))?;
		writer.write_u8_slice(&attribute.bytes)?;
	}
	Ok(())
}

/// Writes the annotation attributes shared by classes, fields, methods and record components. Returns how many were written.
fn write_annotation_attributes(
	buffer: &mut Vec<u8>,
	pool: &mut PoolWrite,
	visible: &[Annotation],
	invisible: &[Annotation],
	visible_type: &[TypeAnnotation],
	invisible_type: &[TypeAnnotation],
) -> Result<usize> {
	let mut attribute_count = 0;
	if !visible.is_empty() {
		attribute_count += 1;
		write_attribute(buffer, pool, attribute::RUNTIME_VISIBLE_ANNOTATIONS, |w, pool| {
			write_annotations_attribute(w, pool, visible)
		})?;
	}
	if !invisible.is_empty() {
		attribute_count += 1;
		write_attribute(buffer, pool, attribute::RUNTIME_INVISIBLE_ANNOTATIONS, |w, pool| {
			write_annotations_attribute(w, pool, invisible)
		})?;
	}
	if !visible_type.is_empty() {
		attribute_count += 1;
		write_attribute(buffer, pool, attribute::RUNTIME_VISIBLE_TYPE_ANNOTATIONS, |w, pool| {
			write_type_annotations_attribute(w, pool, visible_type)
		})?;
	}
	if !invisible_type.is_empty() {
		attribute_count += 1;
		write_attribute(buffer, pool, attribute::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS, |w, pool| {
			write_type_annotations_attribute(w, pool, invisible_type)
		})?;
	}
	Ok(attribute_count)
}

pub(crate) fn write(class_writer: &mut impl ClassWrite, class: &ClassFile, options: WriterOptions, super_classes: &impl CommonSuperClass) -> Result<()> {
	class_writer.write_u32(class_constants::MAGIC)?;

	class_writer.write_u16(class.version.minor)?;
	class_writer.write_u16(class.version.major)?;

	let compute_frames = options.compute_frames && class.version.has_stack_map_frames();

	// Any constant pool entry is added to this while writing the rest of the class file into `writer`.
	let mut pool = PoolWrite::new();
	let pool = &mut pool;
	let mut writer = Vec::new();

	writer.write_u16(class.access.into())?;
	writer.write_u16(pool.put_class(&class.name)?)?;
	writer.write_u16(pool.put_optional(class.super_class.as_ref(), PoolWrite::put_class)?)?;
	writer.write_slice(
		&class.interfaces,
		|w, size| w.write_usize_as_u16(size).with_context(|| anyhow!("failed to write the number of interfaces of class {}", class.name)),
		|w, interface| w.write_u16(pool.put_class(interface)?)
	)?;

	// The `BootstrapMethods` attribute can only be written once all loadable constants are in the pool,
	// so it comes after the fields, the methods, and the other attributes.

	writer.write_slice(
		&class.fields,
		|w, size| w.write_usize_as_u16(size).with_context(|| anyhow!("failed to write the number of fields of class {}", class.name)),
		|w, field| write_field(w, field, pool)
			.with_context(|| anyhow!("failed to write field {} of class {}", field.name, class.name))
	)?;

	writer.write_slice(
		&class.methods,
		|w, size| w.write_usize_as_u16(size).with_context(|| anyhow!("failed to write the number of methods of class {}", class.name)),
		|w, method| write_method(w, &class.name, method, pool, compute_frames, super_classes)
			.with_context(|| anyhow!("failed to write method {}{} of class {}", method.name, method.descriptor, class.name))
	)?;

	// We write the attributes into a buffer and count them.
	let mut attribute_count = 0;
	let mut buffer = Vec::new();

	if class.has_deprecated_attribute {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::DEPRECATED, 0)?;
	}
	if class.has_synthetic_attribute {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::SYNTHETIC, 0)?;
	}

	if let Some(inner_classes) = &class.inner_classes {
		attribute_count += 1;
		write_attribute(&mut buffer, pool, attribute::INNER_CLASSES, |w, pool| {
			w.write_usize_as_u16(inner_classes.len()).context("too many inner classes")?;
			for inner_class in inner_classes {
				w.write_u16(pool.put_class(&inner_class.inner_class)?)?;
				w.write_u16(pool.put_optional(inner_class.outer_class.as_ref(), PoolWrite::put_class)?)?;
				w.write_u16(pool.put_optional(inner_class.inner_name.as_deref(), PoolWrite::put_utf8)?)?;
				w.write_u16(inner_class.flags.into())?;
			}
			Ok(())
		})?;
	}
	if let Some(enclosing_method) = &class.enclosing_method {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::ENCLOSING_METHOD, 4)?;
		buffer.write_u16(pool.put_class(&enclosing_method.class)?)?;
		buffer.write_u16(pool.put_optional(enclosing_method.method.as_ref(), |pool, x| pool.put_name_and_type(x.name.as_str(), x.desc.as_str()))?)?;
	}
	if let Some(signature) = &class.signature {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::SIGNATURE, 2)?;
		buffer.write_u16(pool.put_utf8(signature.as_str())?)?;
	}

	if let Some(source_file) = &class.source_file {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::SOURCE_FILE, 2)?;
		buffer.write_u16(pool.put_utf8(source_file)?)?;
	}
	if let Some(source_debug_extension) = &class.source_debug_extension {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::SOURCE_DEBUG_EXTENSION, source_debug_extension.len())?;
		buffer.write_u8_slice(source_debug_extension)?;
	}

	attribute_count += write_annotation_attributes(&mut buffer, pool,
		&class.runtime_visible_annotations,
		&class.runtime_invisible_annotations,
		&class.runtime_visible_type_annotations,
		&class.runtime_invisible_type_annotations,
	)?;

	if let Some(module) = &class.module {
		attribute_count += 1;
		write_attribute(&mut buffer, pool, attribute::MODULE, |w, pool| {
			write_module(w, pool, module)
		})?;
	}
	if let Some(module_packages) = &class.module_packages {
		attribute_count += 1;
		write_attribute(&mut buffer, pool, attribute::MODULE_PACKAGES, |w, pool| {
			w.write_slice(module_packages,
				|w, len| w.write_usize_as_u16(len).context("too many module packages"),
				|w, package| w.write_u16(pool.put_package(package)?)
			)
		})?;
	}
	if let Some(module_main_class) = &class.module_main_class {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::MODULE_MAIN_CLASS, 2)?;
		buffer.write_u16(pool.put_class(module_main_class)?)?;
	}

	if let Some(nest_host_class) = &class.nest_host_class {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::NEST_HOST, 2)?;
		buffer.write_u16(pool.put_class(nest_host_class)?)?;
	}
	if let Some(nest_members) = &class.nest_members {
		attribute_count += 1;
		write_class_list_attribute(&mut buffer, pool, attribute::NEST_MEMBERS, nest_members)?;
	}
	if let Some(permitted_subclasses) = &class.permitted_subclasses {
		attribute_count += 1;
		write_class_list_attribute(&mut buffer, pool, attribute::PERMITTED_SUBCLASSES, permitted_subclasses)?;
	}

	if let Some(record_components) = &class.record_components {
		attribute_count += 1;
		write_attribute(&mut buffer, pool, attribute::RECORD, |w, pool| {
			w.write_usize_as_u16(record_components.len()).context("too many record components")?;
			for record_component in record_components {
				write_record_component(w, record_component, pool)
					.with_context(|| anyhow!("failed to write record component {}", record_component.name))?;
			}
			Ok(())
		})?;
	}

	attribute_count += class.attributes.len();
	write_unknown_attributes(&mut buffer, pool, &class.attributes)?;

	let bootstrap_methods = pool.take_bootstrap_methods();
	if !bootstrap_methods.is_empty() {
		attribute_count += 1;
		write_attribute(&mut buffer, pool, attribute::BOOTSTRAP_METHODS, |w, _| {
			w.write_usize_as_u16(bootstrap_methods.len()).context("too many bootstrap methods")?;
			for bootstrap_method in &bootstrap_methods {
				w.write_u16(bootstrap_method.handle_index)?;
				w.write_slice(&bootstrap_method.arguments,
					|w, len| w.write_usize_as_u16(len).context("too many bootstrap method arguments"),
					|w, &argument| w.write_u16(argument),
				)?;
			}
			Ok(())
		})?;
	}

	// Write the attribute count and then put the buffer containing the attributes.
	writer.write_usize_as_u16(attribute_count).context("too many attributes on class")?;
	writer.write_u8_slice(&buffer)?;

	// IMPORTANT: Write the pool as the last thing, as any other writing can add pool entries.
	let mut pool_bytes = Vec::new();
	std::mem::replace(pool, PoolWrite::new()).write(&mut pool_bytes)?;
	class_writer.write_u8_slice(&pool_bytes)?;
	// The rest of the class file comes after the constant pool.
	class_writer.write_u8_slice(&writer)?;

	Ok(())
}

fn write_class_list_attribute(buffer: &mut Vec<u8>, pool: &mut PoolWrite, name: &str, classes: &[ClassName]) -> Result<()> {
	write_attribute_fix_length(buffer, pool, name, 2 + 2 * classes.len())?;
	buffer.write_usize_as_u16(classes.len()).with_context(|| anyhow!("too many classes in {name:?} attribute"))?;
	for class in classes {
		buffer.write_u16(pool.put_class(class)?)?;
	}
	Ok(())
}

fn write_field(writer: &mut impl ClassWrite, field: &Field, pool: &mut PoolWrite) -> Result<()> {
	writer.write_u16(field.access.into())?;
	writer.write_u16(pool.put_utf8(field.name.as_str())?)?;
	writer.write_u16(pool.put_utf8(field.descriptor.as_str())?)?;

	// We write the attributes into a buffer and count them.
	let mut attribute_count = 0;
	let mut buffer = Vec::new();

	if field.has_deprecated_attribute {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::DEPRECATED, 0)?;
	}
	if field.has_synthetic_attribute {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::SYNTHETIC, 0)?;
	}

	if let Some(constant_value) = &field.constant_value {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::CONSTANT_VALUE, 2)?;
		buffer.write_u16(pool.put_constant_value(constant_value)?)?;
	}
	if let Some(signature) = &field.signature {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::SIGNATURE, 2)?;
		buffer.write_u16(pool.put_utf8(signature.as_str())?)?;
	}

	attribute_count += write_annotation_attributes(&mut buffer, pool,
		&field.runtime_visible_annotations,
		&field.runtime_invisible_annotations,
		&field.runtime_visible_type_annotations,
		&field.runtime_invisible_type_annotations,
	)?;

	attribute_count += field.attributes.len();
	write_unknown_attributes(&mut buffer, pool, &field.attributes)?;

	writer.write_usize_as_u16(attribute_count).context("too many attributes on field")?;
	writer.write_u8_slice(&buffer)?;

	Ok(())
}

fn write_method(
	writer: &mut impl ClassWrite,
	class_name: &ClassName,
	method: &Method,
	pool: &mut PoolWrite,
	compute_frames: bool,
	super_classes: &impl CommonSuperClass,
) -> Result<()> {
	writer.write_u16(method.access.into())?;
	writer.write_u16(pool.put_utf8(method.name.as_str())?)?;
	writer.write_u16(pool.put_utf8(method.descriptor.as_str())?)?;

	// We write the attributes into a buffer and count them.
	let mut attribute_count = 0;
	let mut buffer = Vec::new();

	if method.has_deprecated_attribute {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::DEPRECATED, 0)?;
	}
	if method.has_synthetic_attribute {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::SYNTHETIC, 0)?;
	}

	if let Some(code) = &method.code {
		attribute_count += 1;
		write_attribute(&mut buffer, pool, attribute::CODE, |w, pool| {
			write_code(w, class_name, method, code, pool, compute_frames, super_classes)
				.context("failed to write `Code` attribute")
		})?;
	}
	if let Some(exceptions) = &method.exceptions {
		attribute_count += 1;
		write_class_list_attribute(&mut buffer, pool, attribute::EXCEPTIONS, exceptions)?;
	}
	if let Some(signature) = &method.signature {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::SIGNATURE, 2)?;
		buffer.write_u16(pool.put_utf8(signature.as_str())?)?;
	}

	attribute_count += write_annotation_attributes(&mut buffer, pool,
		&method.runtime_visible_annotations,
		&method.runtime_invisible_annotations,
		&method.runtime_visible_type_annotations,
		&method.runtime_invisible_type_annotations,
	)?;

	if let Some(parameter_annotations) = &method.runtime_visible_parameter_annotations {
		attribute_count += 1;
		write_attribute(&mut buffer, pool, attribute::RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS, |w, pool| {
			write_parameter_annotations_attribute(w, pool, parameter_annotations)
		})?;
	}
	if let Some(parameter_annotations) = &method.runtime_invisible_parameter_annotations {
		attribute_count += 1;
		write_attribute(&mut buffer, pool, attribute::RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS, |w, pool| {
			write_parameter_annotations_attribute(w, pool, parameter_annotations)
		})?;
	}

	if let Some(annotation_default) = &method.annotation_default {
		attribute_count += 1;
		write_attribute(&mut buffer, pool, attribute::ANNOTATION_DEFAULT, |w, pool| {
			write_element_value(w, pool, annotation_default)
		})?;
	}
	if let Some(method_parameters) = &method.method_parameters {
		attribute_count += 1;
		write_attribute(&mut buffer, pool, attribute::METHOD_PARAMETERS, |w, pool| {
			w.write_slice(method_parameters,
				|w, len| w.write_usize_as_u8(len).context("too many method parameters"),
				|w, parameter| {
					w.write_u16(pool.put_optional(parameter.name.as_ref().map(|x| x.as_str()), PoolWrite::put_utf8)?)?;
					w.write_u16(parameter.flags.into())
				}
			)
		})?;
	}

	attribute_count += method.attributes.len();
	write_unknown_attributes(&mut buffer, pool, &method.attributes)?;

	writer.write_usize_as_u16(attribute_count).context("too many attributes on method")?;
	writer.write_u8_slice(&buffer)?;

	Ok(())
}

fn align_to_4_byte_boundary(writer: &mut Vec<u8>) -> Result<()> {
	match writer.len() & 0b11 {
		0 => Ok(()),
		1 => writer.write_u8_slice(&[0, 0, 0]),
		2 => writer.write_u8_slice(&[0, 0]),
		_ => writer.write_u8_slice(&[0]),
	}
}

fn compute_signed_offset(opcode_pos: u16, target: u16) -> i32 {
	(target as i32) - (opcode_pos as i32)
}

/// Stores the information necessary for later inserting a [`Label`] as an [`i16`] or [`i32`].
struct UnwrittenLabel {
	/// The bytecode position of the instruction the branch offset is relative to.
	opcode_pos: u16,
	/// The index of the instruction being written, in the instruction list.
	instruction_index: usize,
	label: Label,
	/// The position to put the resolved branch offset at.
	label_write_pos: usize,
	/// If true, use an [`i32`], if false use an [`i16`] for the branch offset.
	wide: bool,
}

#[allow(clippy::too_many_arguments)]
fn if_helper(w: &mut Vec<u8>,
	labels: &Labels, wide: &HashSet<usize>, unwritten: &mut Vec<UnwrittenLabel>,
	opcode_pos: u16, instruction_index: usize,
	label: Label,
	opcode: u8, opposite_opcode: u8
) -> Result<()> {
	// A backwards jump is already resolved. If it doesn't fit it's still only written wide once it's in `wide`,
	// so that the frame computation knows about the inserted `goto_w`.
	let known_branch = labels.get(&label)
		.map(|target| compute_signed_offset(opcode_pos, target))
		.and_then(|branch| i16::try_from(branch).ok());

	if let (Some(branch), false) = (known_branch, wide.contains(&instruction_index)) {
		w.write_u8(opcode)?;
		w.write_i16(branch)?;
	} else if wide.contains(&instruction_index) {
		unwritten.push(UnwrittenLabel {
			// relative to the goto_w: +1 for the opposite_opcode, +2 for its branch
			opcode_pos: opcode_pos + 1 + 2,
			instruction_index,
			label,
			// +1 for the opposite_opcode, +2 for its branch, +1 for the goto_w opcode
			label_write_pos: opcode_pos as usize + 1 + 2 + 1,
			wide: true,
		});

		w.write_u8(opposite_opcode)?;
		// target the instruction after the goto_w:
		// +1 for the opcode, +2 for this branch, +1 for the goto_w opcode, +4 for that branch
		w.write_i16(1 + 2 + 1 + 4)?;
		w.write_u8(opcode::GOTO_W)?;
		w.write_i32(i32::MAX)?;
	} else {
		unwritten.push(UnwrittenLabel {
			opcode_pos,
			instruction_index,
			label,
			label_write_pos: opcode_pos as usize + 1,
			wide: false,
		});

		w.write_u8(opcode)?;
		w.write_i16(i16::MAX)?;
	}
	Ok(())
}

#[allow(clippy::too_many_arguments)]
fn goto_helper(w: &mut Vec<u8>,
	labels: &Labels, wide: &HashSet<usize>, unwritten: &mut Vec<UnwrittenLabel>,
	opcode_pos: u16, instruction_index: usize,
	label: Label,
	opcode: u8, wide_opcode: u8
) -> Result<()> {
	if let Some(target) = labels.get(&label) {
		let branch = compute_signed_offset(opcode_pos, target);

		match i16::try_from(branch) {
			Ok(branch) if !wide.contains(&instruction_index) => {
				w.write_u8(opcode)?;
				w.write_i16(branch)?;
			},
			_ => {
				w.write_u8(wide_opcode)?;
				w.write_i32(branch)?;
			},
		}
	} else {
		let is_wide = wide.contains(&instruction_index);
		unwritten.push(UnwrittenLabel {
			opcode_pos,
			instruction_index,
			label,
			label_write_pos: opcode_pos as usize + 1,
			wide: is_wide,
		});

		if is_wide {
			w.write_u8(wide_opcode)?;
			w.write_i32(i32::MAX)?;
		} else {
			w.write_u8(opcode)?;
			w.write_i16(i16::MAX)?;
		}
	}
	Ok(())
}

/// Writes a [`Label`] as an [`i32`], storing it in `unwritten` if the label isn't resolved yet.
fn switch_helper(w: &mut Vec<u8>,
	labels: &Labels, unwritten: &mut Vec<UnwrittenLabel>,
	opcode_pos: u16, instruction_index: usize,
	label: Label,
) -> Result<()> {
	let branch = if let Some(target) = labels.get(&label) {
		compute_signed_offset(opcode_pos, target)
	} else {
		unwritten.push(UnwrittenLabel {
			opcode_pos,
			instruction_index,
			label,
			label_write_pos: w.len(),
			wide: true,
		});

		i32::MAX
	};
	w.write_i32(branch)
}

/// Returns the opcode and the inverted opcode of an `if` instruction, together with the jump target.
fn if_opcodes(instruction: &Instruction) -> Option<(u8, u8, Label)> {
	Some(match *instruction {
		Instruction::IfEq(label) => (opcode::IFEQ, opcode::IFNE, label),
		Instruction::IfNe(label) => (opcode::IFNE, opcode::IFEQ, label),
		Instruction::IfLt(label) => (opcode::IFLT, opcode::IFGE, label),
		Instruction::IfGe(label) => (opcode::IFGE, opcode::IFLT, label),
		Instruction::IfGt(label) => (opcode::IFGT, opcode::IFLE, label),
		Instruction::IfLe(label) => (opcode::IFLE, opcode::IFGT, label),
		Instruction::IfICmpEq(label) => (opcode::IF_ICMPEQ, opcode::IF_ICMPNE, label),
		Instruction::IfICmpNe(label) => (opcode::IF_ICMPNE, opcode::IF_ICMPEQ, label),
		Instruction::IfICmpLt(label) => (opcode::IF_ICMPLT, opcode::IF_ICMPGE, label),
		Instruction::IfICmpGe(label) => (opcode::IF_ICMPGE, opcode::IF_ICMPLT, label),
		Instruction::IfICmpGt(label) => (opcode::IF_ICMPGT, opcode::IF_ICMPLE, label),
		Instruction::IfICmpLe(label) => (opcode::IF_ICMPLE, opcode::IF_ICMPGT, label),
		Instruction::IfACmpEq(label) => (opcode::IF_ACMPEQ, opcode::IF_ACMPNE, label),
		Instruction::IfACmpNe(label) => (opcode::IF_ACMPNE, opcode::IF_ACMPEQ, label),
		Instruction::IfNull(label) => (opcode::IFNULL, opcode::IFNONNULL, label),
		Instruction::IfNonNull(label) => (opcode::IFNONNULL, opcode::IFNULL, label),
		_ => return None,
	})
}

/// All the jump targets of an instruction, not including the next instruction.
fn jump_targets(instruction: &Instruction) -> Vec<Label> {
	match instruction {
		&Instruction::Goto(label) | &Instruction::Jsr(label) => vec![label],
		Instruction::TableSwitch { default, table, .. } => std::iter::once(*default).chain(table.iter().copied()).collect(),
		Instruction::LookupSwitch { default, pairs } => std::iter::once(*default).chain(pairs.iter().map(|&(_, label)| label)).collect(),
		instruction => if_opcodes(instruction).map(|(_, _, label)| label).into_iter().collect(),
	}
}

/// Returns `true` if execution never continues with the next instruction.
fn is_unconditional(instruction: &Instruction) -> bool {
	matches!(instruction,
		Instruction::Goto(_) | Instruction::TableSwitch { .. } | Instruction::LookupSwitch { .. } |
		Instruction::IReturn | Instruction::LReturn | Instruction::FReturn | Instruction::DReturn |
		Instruction::AReturn | Instruction::Return | Instruction::AThrow | Instruction::Ret(_)
	)
}

/// Computes `max_locals` from the parameters and the local variables used by the instructions.
fn compute_max_locals(method: &Method, code: &Code) -> Result<u16> {
	let mut max_locals = method.descriptor.parse()?.arguments_size(method.access.is_static) as u32;
	for entry in &code.instructions {
		let end = match &entry.instruction {
			Instruction::ILoad(lv) | Instruction::FLoad(lv) | Instruction::ALoad(lv) |
			Instruction::IStore(lv) | Instruction::FStore(lv) | Instruction::AStore(lv) |
			Instruction::IInc(lv, _) | Instruction::Ret(lv) => lv.index as u32 + 1,
			Instruction::LLoad(lv) | Instruction::DLoad(lv) |
			Instruction::LStore(lv) | Instruction::DStore(lv) => lv.index as u32 + 2,
			_ => continue,
		};
		max_locals = max_locals.max(end);
	}
	u16::try_from(max_locals).with_context(|| anyhow!("`max_locals` of {max_locals} is too large"))
}

/// Removes the range `remove_start..remove_end` from `start..end`, returning the up to two remaining parts.
fn subtract_range((start, end): (u16, u16), (remove_start, remove_end): (u16, u16)) -> Vec<(u16, u16)> {
	[(start, end.min(remove_start)), (start.max(remove_end), end)]
		.into_iter()
		.filter(|&(start, end)| start < end)
		.collect()
}

/// Writes the content of the `Code` attribute to the writer.
///
/// # Branch offset algorithm
///
/// ## Motivation
/// The maximum size of a bytecode array is [`u16::MAX`], but instructions like `goto` or `ifeq` store branch offsets as an [`i16`].
/// A jump from the front to the end of a very large method doesn't fit into that.
///
/// There are however two instructions that help in that case: `goto_w` and `jsr_w`, which both hold an [`i32`] as
/// the branch offset. The `lookupswitch` and `tableswitch` instructions always use an [`i32`].
///
/// For `if` instructions there's no `_w` variant. Consider the following bytecode sequence, where `if_x` denotes some
/// `if` instruction:
/// ```txt,ignore
/// L1: ... // sequence A
/// L2: if_x Lx
/// L3: ... // sequence B
/// ```
/// If the offset for `Lx` doesn't fit into an [`i16`], we replace the `if_x` instruction with:
/// ```txt,ignore
/// L1: ...
/// L2: if_not_x L3
///     goto_w Lx
/// L3: ...
/// ```
/// `if_not_x` denotes the instruction that has the branching and not-branching swapped. This is longer than the original,
/// which shifts the sequence B to higher offsets, possibly making other jumps too far as well.
///
/// ## Implementation
/// We just try writing out the bytecode. Whenever we don't know a label yet, we reserve space for it and resolve it at the
/// end. If a branch offset doesn't fit the reserved space, we remember the instruction as wide and start again.
///
/// # Frames
/// The frames are computed per instruction before writing. Instructions never reached are replaced with `nop`s followed
/// by an `athrow`, and are removed from the exception table, so that the verifier accepts them.
#[allow(clippy::too_many_arguments)]
fn write_code(
	writer: &mut impl ClassWrite,
	class_name: &ClassName,
	method: &Method,
	code: &Code,
	pool: &mut PoolWrite,
	compute_frames: bool,
	super_classes: &impl CommonSuperClass,
) -> Result<()> {
	let max_locals = compute_max_locals(method, code)?;

	let analysis = if compute_frames {
		analyze(class_name, method, code, max_locals, super_classes)
	} else {
		analyze(class_name, method, code, max_locals, &ObjectOnly)
	};
	let (max_stack, frames) = match analysis {
		Ok(analysis) => (analysis.max_stack, Some(analysis.frames)),
		// without frames, the old `max_stack` is good enough
		Err(e) if !compute_frames => (code.max_stack.ok_or(e)?, None),
		Err(e) => return Err(e.context("failed to compute frames")),
	};

	writer.write_u16(max_stack)?;
	writer.write_u16(max_locals)?;

	// All instruction indices that need to use the "wide" format.
	// These are the indices of our input, as these are constant over multiple write attempts.
	let mut wide: HashSet<usize> = HashSet::new();
	let mut labels = Labels::new();

	let mut w = Vec::new();

	// Each run here is one attempt.
	'a: loop {
		let mut unwritten: Vec<UnwrittenLabel> = Vec::new();

		for (instruction_index, entry) in code.instructions.iter().enumerate() {
			let opcode_pos = u16::try_from(w.len())
				.with_context(|| anyhow!("cannot write code: code size exceeded u16::MAX: {}", w.len()))?;

			labels.add_instruction(entry.label, opcode_pos);

			(|| -> Result<()> {
				let instruction = &entry.instruction;
				if let Some((opcode, opposite_opcode, label)) = if_opcodes(instruction) {
					return if_helper(&mut w, &labels, &wide, &mut unwritten, opcode_pos, instruction_index, label, opcode, opposite_opcode);
				}

				match instruction {
					Instruction::Nop => w.write_u8(opcode::NOP)?,
					Instruction::AConstNull => w.write_u8(opcode::ACONST_NULL)?,
					Instruction::IConstM1 => w.write_u8(opcode::ICONST_M1)?,
					Instruction::IConst0 => w.write_u8(opcode::ICONST_0)?,
					Instruction::IConst1 => w.write_u8(opcode::ICONST_1)?,
					Instruction::IConst2 => w.write_u8(opcode::ICONST_2)?,
					Instruction::IConst3 => w.write_u8(opcode::ICONST_3)?,
					Instruction::IConst4 => w.write_u8(opcode::ICONST_4)?,
					Instruction::IConst5 => w.write_u8(opcode::ICONST_5)?,
					Instruction::LConst0 => w.write_u8(opcode::LCONST_0)?,
					Instruction::LConst1 => w.write_u8(opcode::LCONST_1)?,
					Instruction::FConst0 => w.write_u8(opcode::FCONST_0)?,
					Instruction::FConst1 => w.write_u8(opcode::FCONST_1)?,
					Instruction::FConst2 => w.write_u8(opcode::FCONST_2)?,
					Instruction::DConst0 => w.write_u8(opcode::DCONST_0)?,
					Instruction::DConst1 => w.write_u8(opcode::DCONST_1)?,
					&Instruction::BiPush(byte) => {
						w.write_u8(opcode::BIPUSH)?;
						w.write_i8(byte)?;
					},
					&Instruction::SiPush(short) => {
						w.write_u8(opcode::SIPUSH)?;
						w.write_i16(short)?;
					},
					Instruction::Ldc(loadable) => {
						let index = pool.put_loadable(loadable)?;
						if loadable.is_wide() {
							w.write_u8(opcode::LDC2_W)?;
							w.write_u16(index)?;
						} else if let Ok(index) = u8::try_from(index) {
							w.write_u8(opcode::LDC)?;
							w.write_u8(index)?;
						} else {
							w.write_u8(opcode::LDC_W)?;
							w.write_u16(index)?;
						}
					},
					Instruction::ILoad(lv) | Instruction::LLoad(lv) | Instruction::FLoad(lv) | Instruction::DLoad(lv) | Instruction::ALoad(lv) => {
						let opcode = match instruction {
							Instruction::ILoad(_) => opcode::ILOAD,
							Instruction::LLoad(_) => opcode::LLOAD,
							Instruction::FLoad(_) => opcode::FLOAD,
							Instruction::DLoad(_) => opcode::DLOAD,
							_ => opcode::ALOAD,
						};
						write_local_variable_instruction(&mut w, opcode, opcode::ILOAD, opcode::ILOAD_0, lv.index)?;
					},
					Instruction::IALoad => w.write_u8(opcode::IALOAD)?,
					Instruction::LALoad => w.write_u8(opcode::LALOAD)?,
					Instruction::FALoad => w.write_u8(opcode::FALOAD)?,
					Instruction::DALoad => w.write_u8(opcode::DALOAD)?,
					Instruction::AALoad => w.write_u8(opcode::AALOAD)?,
					Instruction::BALoad => w.write_u8(opcode::BALOAD)?,
					Instruction::CALoad => w.write_u8(opcode::CALOAD)?,
					Instruction::SALoad => w.write_u8(opcode::SALOAD)?,
					Instruction::IStore(lv) | Instruction::LStore(lv) | Instruction::FStore(lv) | Instruction::DStore(lv) | Instruction::AStore(lv) => {
						let opcode = match instruction {
							Instruction::IStore(_) => opcode::ISTORE,
							Instruction::LStore(_) => opcode::LSTORE,
							Instruction::FStore(_) => opcode::FSTORE,
							Instruction::DStore(_) => opcode::DSTORE,
							_ => opcode::ASTORE,
						};
						write_local_variable_instruction(&mut w, opcode, opcode::ISTORE, opcode::ISTORE_0, lv.index)?;
					},
					Instruction::IAStore => w.write_u8(opcode::IASTORE)?,
					Instruction::LAStore => w.write_u8(opcode::LASTORE)?,
					Instruction::FAStore => w.write_u8(opcode::FASTORE)?,
					Instruction::DAStore => w.write_u8(opcode::DASTORE)?,
					Instruction::AAStore => w.write_u8(opcode::AASTORE)?,
					Instruction::BAStore => w.write_u8(opcode::BASTORE)?,
					Instruction::CAStore => w.write_u8(opcode::CASTORE)?,
					Instruction::SAStore => w.write_u8(opcode::SASTORE)?,
					Instruction::Pop     => w.write_u8(opcode::POP)?,
					Instruction::Pop2    => w.write_u8(opcode::POP2)?,
					Instruction::Dup     => w.write_u8(opcode::DUP)?,
					Instruction::DupX1   => w.write_u8(opcode::DUP_X1)?,
					Instruction::DupX2   => w.write_u8(opcode::DUP_X2)?,
					Instruction::Dup2    => w.write_u8(opcode::DUP2)?,
					Instruction::Dup2X1  => w.write_u8(opcode::DUP2_X1)?,
					Instruction::Dup2X2  => w.write_u8(opcode::DUP2_X2)?,
					Instruction::Swap    => w.write_u8(opcode::SWAP)?,
					Instruction::IAdd    => w.write_u8(opcode::IADD)?,
					Instruction::LAdd    => w.write_u8(opcode::LADD)?,
					Instruction::FAdd    => w.write_u8(opcode::FADD)?,
					Instruction::DAdd    => w.write_u8(opcode::DADD)?,
					Instruction::ISub    => w.write_u8(opcode::ISUB)?,
					Instruction::LSub    => w.write_u8(opcode::LSUB)?,
					Instruction::FSub    => w.write_u8(opcode::FSUB)?,
					Instruction::DSub    => w.write_u8(opcode::DSUB)?,
					Instruction::IMul    => w.write_u8(opcode::IMUL)?,
					Instruction::LMul    => w.write_u8(opcode::LMUL)?,
					Instruction::FMul    => w.write_u8(opcode::FMUL)?,
					Instruction::DMul    => w.write_u8(opcode::DMUL)?,
					Instruction::IDiv    => w.write_u8(opcode::IDIV)?,
					Instruction::LDiv    => w.write_u8(opcode::LDIV)?,
					Instruction::FDiv    => w.write_u8(opcode::FDIV)?,
					Instruction::DDiv    => w.write_u8(opcode::DDIV)?,
					Instruction::IRem    => w.write_u8(opcode::IREM)?,
					Instruction::LRem    => w.write_u8(opcode::LREM)?,
					Instruction::FRem    => w.write_u8(opcode::FREM)?,
					Instruction::DRem    => w.write_u8(opcode::DREM)?,
					Instruction::INeg    => w.write_u8(opcode::INEG)?,
					Instruction::LNeg    => w.write_u8(opcode::LNEG)?,
					Instruction::FNeg    => w.write_u8(opcode::FNEG)?,
					Instruction::DNeg    => w.write_u8(opcode::DNEG)?,
					Instruction::IShl    => w.write_u8(opcode::ISHL)?,
					Instruction::LShl    => w.write_u8(opcode::LSHL)?,
					Instruction::IShr    => w.write_u8(opcode::ISHR)?,
					Instruction::LShr    => w.write_u8(opcode::LSHR)?,
					Instruction::IUShr   => w.write_u8(opcode::IUSHR)?,
					Instruction::LUShr   => w.write_u8(opcode::LUSHR)?,
					Instruction::IAnd    => w.write_u8(opcode::IAND)?,
					Instruction::LAnd    => w.write_u8(opcode::LAND)?,
					Instruction::IOr     => w.write_u8(opcode::IOR)?,
					Instruction::LOr     => w.write_u8(opcode::LOR)?,
					Instruction::IXor    => w.write_u8(opcode::IXOR)?,
					Instruction::LXor    => w.write_u8(opcode::LXOR)?,
					&Instruction::IInc(lv, value) => {
						if let (Ok(index), Ok(value)) = (u8::try_from(lv.index), i8::try_from(value)) {
							w.write_u8(opcode::IINC)?;
							w.write_u8(index)?;
							w.write_i8(value)?;
						} else {
							w.write_u8(opcode::WIDE)?;
							w.write_u8(opcode::IINC)?;
							w.write_u16(lv.index)?;
							w.write_i16(value)?;
						}
					},
					Instruction::I2L   => w.write_u8(opcode::I2L)?,
					Instruction::I2F   => w.write_u8(opcode::I2F)?,
					Instruction::I2D   => w.write_u8(opcode::I2D)?,
					Instruction::L2I   => w.write_u8(opcode::L2I)?,
					Instruction::L2F   => w.write_u8(opcode::L2F)?,
					Instruction::L2D   => w.write_u8(opcode::L2D)?,
					Instruction::F2I   => w.write_u8(opcode::F2I)?,
					Instruction::F2L   => w.write_u8(opcode::F2L)?,
					Instruction::F2D   => w.write_u8(opcode::F2D)?,
					Instruction::D2I   => w.write_u8(opcode::D2I)?,
					Instruction::D2L   => w.write_u8(opcode::D2L)?,
					Instruction::D2F   => w.write_u8(opcode::D2F)?,
					Instruction::I2B   => w.write_u8(opcode::I2B)?,
					Instruction::I2C   => w.write_u8(opcode::I2C)?,
					Instruction::I2S   => w.write_u8(opcode::I2S)?,
					Instruction::LCmp  => w.write_u8(opcode::LCMP)?,
					Instruction::FCmpL => w.write_u8(opcode::FCMPL)?,
					Instruction::FCmpG => w.write_u8(opcode::FCMPG)?,
					Instruction::DCmpL => w.write_u8(opcode::DCMPL)?,
					Instruction::DCmpG => w.write_u8(opcode::DCMPG)?,
					&Instruction::Goto(label) => {
						goto_helper(&mut w, &labels, &wide, &mut unwritten, opcode_pos, instruction_index, label, opcode::GOTO, opcode::GOTO_W)?;
					},
					&Instruction::Jsr(label) => {
						goto_helper(&mut w, &labels, &wide, &mut unwritten, opcode_pos, instruction_index, label, opcode::JSR, opcode::JSR_W)?;
					},
					&Instruction::Ret(lv) => {
						if let Ok(index) = u8::try_from(lv.index) {
							w.write_u8(opcode::RET)?;
							w.write_u8(index)?;
						} else {
							w.write_u8(opcode::WIDE)?;
							w.write_u8(opcode::RET)?;
							w.write_u16(lv.index)?;
						}
					},
					&Instruction::TableSwitch { default, low, high, ref table } => {
						w.write_u8(opcode::TABLESWITCH)?;
						align_to_4_byte_boundary(&mut w)?;

						if low > high {
							bail!("`low` must be lower or equal to `high`");
						}
						let n = (high as i64 - low as i64 + 1) as usize;
						if table.len() != n {
							bail!("`low` and `high` bounds don't span a range of the size of the table: table has {}, high and low define {n}", table.len());
						}

						switch_helper(&mut w, &labels, &mut unwritten, opcode_pos, instruction_index, default)?;
						w.write_i32(low)?;
						w.write_i32(high)?;
						for &entry in table {
							switch_helper(&mut w, &labels, &mut unwritten, opcode_pos, instruction_index, entry)?;
						}
					},
					Instruction::LookupSwitch { default, pairs } => {
						w.write_u8(opcode::LOOKUPSWITCH)?;
						align_to_4_byte_boundary(&mut w)?;

						if !pairs.windows(2).all(|x| x[0].0 < x[1].0) {
							bail!("`pairs` must be sorted by key, without duplicates");
						}

						switch_helper(&mut w, &labels, &mut unwritten, opcode_pos, instruction_index, *default)?;
						let n = i32::try_from(pairs.len())
							.with_context(|| anyhow!("`npairs` doesn't fit in i32, it's {:?}", pairs.len()))?;
						w.write_i32(n)?;
						for &(key, label) in pairs {
							w.write_i32(key)?;
							switch_helper(&mut w, &labels, &mut unwritten, opcode_pos, instruction_index, label)?;
						}
					},
					Instruction::IReturn => w.write_u8(opcode::IRETURN)?,
					Instruction::LReturn => w.write_u8(opcode::LRETURN)?,
					Instruction::FReturn => w.write_u8(opcode::FRETURN)?,
					Instruction::DReturn => w.write_u8(opcode::DRETURN)?,
					Instruction::AReturn => w.write_u8(opcode::ARETURN)?,
					Instruction::Return  => w.write_u8(opcode::RETURN)?,
					Instruction::GetStatic(field_ref) => {
						w.write_u8(opcode::GETSTATIC)?;
						w.write_u16(pool.put_field_ref(field_ref)?)?;
					},
					Instruction::PutStatic(field_ref) => {
						w.write_u8(opcode::PUTSTATIC)?;
						w.write_u16(pool.put_field_ref(field_ref)?)?;
					},
					Instruction::GetField(field_ref) => {
						w.write_u8(opcode::GETFIELD)?;
						w.write_u16(pool.put_field_ref(field_ref)?)?;
					},
					Instruction::PutField(field_ref) => {
						w.write_u8(opcode::PUTFIELD)?;
						w.write_u16(pool.put_field_ref(field_ref)?)?;
					},
					Instruction::InvokeVirtual(method_ref) => {
						w.write_u8(opcode::INVOKEVIRTUAL)?;
						w.write_u16(pool.put_method_ref(method_ref)?)?;
					},
					&Instruction::InvokeSpecial(ref method_ref, is_interface) => {
						w.write_u8(opcode::INVOKESPECIAL)?;
						w.write_u16(pool.put_method_ref_or_interface_method_ref(method_ref, is_interface)?)?;
					},
					&Instruction::InvokeStatic(ref method_ref, is_interface) => {
						w.write_u8(opcode::INVOKESTATIC)?;
						w.write_u16(pool.put_method_ref_or_interface_method_ref(method_ref, is_interface)?)?;
					},
					Instruction::InvokeInterface(method_ref) => {
						w.write_u8(opcode::INVOKEINTERFACE)?;
						w.write_u16(pool.put_interface_method_ref(method_ref)?)?;
						// the receiver counts as well
						let count = method_ref.desc.parse()?.arguments_size(false);
						w.write_u8(u8::try_from(count).with_context(|| anyhow!("too many arguments for invokeinterface: {count}"))?)?;
						w.write_u8(0)?;
					},
					Instruction::InvokeDynamic(invoke_dynamic) => {
						w.write_u8(opcode::INVOKEDYNAMIC)?;
						w.write_u16(pool.put_invoke_dynamic(invoke_dynamic)?)?;
						w.write_u8(0)?;
						w.write_u8(0)?;
					},
					Instruction::New(class) => {
						w.write_u8(opcode::NEW)?;
						w.write_u16(pool.put_class(class)?)?;
					},
					Instruction::NewArray(atype) => {
						w.write_u8(opcode::NEWARRAY)?;
						w.write_u8(atype.to_atype())?;
					},
					Instruction::ANewArray(class) => {
						w.write_u8(opcode::ANEWARRAY)?;
						w.write_u16(pool.put_class(class)?)?;
					},
					Instruction::ArrayLength => w.write_u8(opcode::ARRAYLENGTH)?,
					Instruction::AThrow      => w.write_u8(opcode::ATHROW)?,
					Instruction::CheckCast(class) => {
						w.write_u8(opcode::CHECKCAST)?;
						w.write_u16(pool.put_class(class)?)?;
					},
					Instruction::InstanceOf(class) => {
						w.write_u8(opcode::INSTANCEOF)?;
						w.write_u16(pool.put_class(class)?)?;
					},
					Instruction::MonitorEnter => w.write_u8(opcode::MONITORENTER)?,
					Instruction::MonitorExit  => w.write_u8(opcode::MONITOREXIT)?,
					&Instruction::MultiANewArray(ref class, dimensions) => {
						w.write_u8(opcode::MULTIANEWARRAY)?;
						w.write_u16(pool.put_class(class)?)?;
						w.write_u8(dimensions)?;
					},
					// handled by `if_helper` above
					Instruction::IfEq(_) | Instruction::IfNe(_) | Instruction::IfLt(_) | Instruction::IfGe(_) |
					Instruction::IfGt(_) | Instruction::IfLe(_) | Instruction::IfICmpEq(_) | Instruction::IfICmpNe(_) |
					Instruction::IfICmpLt(_) | Instruction::IfICmpGe(_) | Instruction::IfICmpGt(_) | Instruction::IfICmpLe(_) |
					Instruction::IfACmpEq(_) | Instruction::IfACmpNe(_) | Instruction::IfNull(_) | Instruction::IfNonNull(_) => {},
				};
				Ok(())
			})()
				.with_context(|| anyhow!("while writing the instruction {:?}", entry.instruction))?;
		}

		let code_end = u16::try_from(w.len())
			.with_context(|| anyhow!("cannot write code: code size exceeded u16::MAX: {}", w.len()))?;
		if let Some(last_label) = code.last_label {
			labels.add_label(last_label, code_end);
		}

		for unwritten in unwritten {
			let target = labels.try_get(&unwritten.label).context("no instruction has the label")?;
			let branch = compute_signed_offset(unwritten.opcode_pos, target);

			if unwritten.wide {
				w[unwritten.label_write_pos..unwritten.label_write_pos + 4].copy_from_slice(&branch.to_be_bytes());
			} else if let Ok(branch) = i16::try_from(branch) {
				w[unwritten.label_write_pos..unwritten.label_write_pos + 2].copy_from_slice(&branch.to_be_bytes());
			} else {
				// The branch doesn't fit into the space we've reserved for it, try again, with writing this jump wide.
				wide.insert(unwritten.instruction_index);

				labels.next_attempt();
				w = Vec::with_capacity(w.len());
				continue 'a;
			}
		}

		break;
	}

	let code_length = u16::try_from(w.len()).ok().filter(|&x| x != 0)
		.with_context(|| anyhow!("`code_length` must be greater than zero and less than 65536, got {}", w.len()))?;

	// Replace unreachable instructions, and collect the indices of instructions that need a frame.
	let mut unreachable: Vec<(u16, u16)> = Vec::new();
	let mut frame_indices: BTreeSet<usize> = BTreeSet::new();
	if let Some(frames) = &frames {
		let length = code.instructions.len();
		let label_indices = code.label_indices();
		let index_of = |label: &Label| label_indices.get(label).copied()
			.with_context(|| anyhow!("label {label:?} is not on any instruction"));

		let mut index = 0;
		while index < length {
			if frames[index].is_some() {
				let instruction = &code.instructions[index].instruction;
				for target in jump_targets(instruction) {
					frame_indices.insert(index_of(&target)?);
				}
				let wide_if = wide.contains(&index) && if_opcodes(instruction).is_some();
				if (is_unconditional(instruction) || wide_if) && index + 1 < length {
					frame_indices.insert(index + 1);
				}
				index += 1;
			} else {
				let start_index = index;
				while index < length && frames[index].is_none() {
					index += 1;
				}
				let start = labels.offset_of(start_index, code_length) as usize;
				let end = labels.offset_of(index, code_length) as usize;
				w[start..end - 1].fill(opcode::NOP);
				w[end - 1] = opcode::ATHROW;

				unreachable.push((start as u16, end as u16));
				frame_indices.insert(start_index);
				if index < length {
					frame_indices.insert(index);
				}
			}
		}
		for exception in &code.exception_table {
			frame_indices.insert(index_of(&exception.handler)?);
		}
	}

	writer.write_u32(code_length as u32)?;
	writer.write_u8_slice(&w)?;

	let mut exception_table = Vec::new();
	for exception in &code.exception_table {
		let start = labels.try_get(&exception.start)?;
		let end = labels.try_get(&exception.end)?;
		let handler = labels.try_get(&exception.handler)?;

		let mut ranges = vec![(start, end)];
		for &range in &unreachable {
			ranges = ranges.into_iter().flat_map(|x| subtract_range(x, range)).collect();
		}
		if !ranges.is_empty() {
			let catch = pool.put_optional(exception.catch.as_ref(), PoolWrite::put_class)?;
			for (start, end) in ranges {
				exception_table.push((start, end, handler, catch));
			}
		}
	}
	writer.write_usize_as_u16(exception_table.len()).context("too many exception table entries")?;
	for (start, end, handler, catch) in exception_table {
		writer.write_u16(start)?;
		writer.write_u16(end)?;
		writer.write_u16(handler)?;
		writer.write_u16(catch)?;
	}

	// We write the attributes into a buffer and count them.
	let mut attribute_count = 0;
	let mut buffer = Vec::new();

	if let (true, Some(frames)) = (compute_frames, &frames) {
		if !frame_indices.is_empty() {
			attribute_count += 1;
			write_attribute(&mut buffer, pool, attribute::STACK_MAP_TABLE, |w, pool| {
				let unreachable_frame = Frame {
					locals: Vec::new(),
					stack: vec![FrameType::Object(ClassName::JAVA_LANG_THROWABLE)],
				};

				w.write_usize_as_u16(frame_indices.len()).context("too many frames")?;
				let mut previous_offset: Option<u16> = None;
				for &index in &frame_indices {
					let offset = labels.offset_of(index, code_length);
					let offset_delta = match previous_offset {
						Some(previous_offset) => offset - previous_offset - 1,
						None => offset,
					};
					previous_offset = Some(offset);

					let frame = frames[index].as_ref().unwrap_or(&unreachable_frame);
					let locals = compact_locals(&frame.locals);

					w.write_u8(frame::FULL_FRAME)?;
					w.write_u16(offset_delta)?;
					w.write_usize_as_u16(locals.len()).context("too many locals in frame")?;
					for value in &locals {
						write_verification_type(w, pool, &labels, code_length, value)?;
					}
					w.write_usize_as_u16(frame.stack.len()).context("too many stack entries in frame")?;
					for value in &frame.stack {
						write_verification_type(w, pool, &labels, code_length, value)?;
					}
				}
				Ok(())
			})?;
		}
	}

	if let Some(line_number_table) = &code.line_numbers {
		attribute_count += 1;
		write_attribute(&mut buffer, pool, attribute::LINE_NUMBER_TABLE, |w, _| {
			w.write_slice(line_number_table,
				|w, len| w.write_usize_as_u16(len).context("too many line numbers"),
				|w, &(start, line_number)| {
					w.write_u16(labels.try_get(&start)?)?;
					w.write_u16(line_number)
				}
			)
		})?;
	}

	if let Some(local_variables) = &code.local_variables {
		let descriptors = local_variables.iter().filter(|lv| lv.descriptor.is_some()).count();
		let signatures = local_variables.iter().filter(|lv| lv.signature.is_some()).count();

		if descriptors > 0 {
			attribute_count += 1;
			write_attribute(&mut buffer, pool, attribute::LOCAL_VARIABLE_TABLE, |w, pool| {
				w.write_usize_as_u16(descriptors).context("too many local variables")?;
				for lv in local_variables {
					if let Some(descriptor) = &lv.descriptor {
						let (start, length) = labels.try_get_range(&lv.range)?;
						w.write_u16(start)?;
						w.write_u16(length)?;
						w.write_u16(pool.put_utf8(lv.name.as_str())?)?;
						w.write_u16(pool.put_utf8(descriptor.as_str())?)?;
						w.write_u16(lv.index.index)?;
					}
				}
				Ok(())
			})?;
		}
		if signatures > 0 {
			attribute_count += 1;
			write_attribute(&mut buffer, pool, attribute::LOCAL_VARIABLE_TYPE_TABLE, |w, pool| {
				w.write_usize_as_u16(signatures).context("too many local variable types")?;
				for lv in local_variables {
					if let Some(signature) = &lv.signature {
						let (start, length) = labels.try_get_range(&lv.range)?;
						w.write_u16(start)?;
						w.write_u16(length)?;
						w.write_u16(pool.put_utf8(lv.name.as_str())?)?;
						w.write_u16(pool.put_utf8(signature.as_str())?)?;
						w.write_u16(lv.index.index)?;
					}
				}
				Ok(())
			})?;
		}
	}

	attribute_count += code.attributes.len();
	write_unknown_attributes(&mut buffer, pool, &code.attributes)?;

	writer.write_usize_as_u16(attribute_count).context("too many attributes on code")?;
	writer.write_u8_slice(&buffer)?;

	Ok(())
}

/// Writes a load or store instruction, using the short forms like `iload_0` where possible.
fn write_local_variable_instruction(w: &mut Vec<u8>, opcode: u8, first_opcode: u8, first_short_opcode: u8, index: u16) -> Result<()> {
	if index < 4 {
		w.write_u8(((opcode - first_opcode) << 2 | index as u8) + first_short_opcode)
	} else if let Ok(index) = u8::try_from(index) {
		w.write_u8(opcode)?;
		w.write_u8(index)
	} else {
		w.write_u8(opcode::WIDE)?;
		w.write_u8(opcode)?;
		w.write_u16(index)
	}
}

fn write_verification_type(w: &mut Vec<u8>, pool: &mut PoolWrite, labels: &Labels, code_length: u16, value: &FrameType) -> Result<()> {
	match value {
		FrameType::Top => w.write_u8(frame::ITEM_TOP),
		FrameType::Integer => w.write_u8(frame::ITEM_INTEGER),
		FrameType::Float => w.write_u8(frame::ITEM_FLOAT),
		FrameType::Long => w.write_u8(frame::ITEM_LONG),
		FrameType::Double => w.write_u8(frame::ITEM_DOUBLE),
		FrameType::Null => w.write_u8(frame::ITEM_NULL),
		FrameType::UninitializedThis => w.write_u8(frame::ITEM_UNINITIALIZED_THIS),
		FrameType::Object(class_name) => {
			w.write_u8(frame::ITEM_OBJECT)?;
			w.write_u16(pool.put_class(class_name)?)
		},
		&FrameType::Uninitialized(new_index) => {
			w.write_u8(frame::ITEM_UNINITIALIZED)?;
			w.write_u16(labels.offset_of(new_index, code_length))
		},
	}
}

fn write_record_component(writer: &mut impl ClassWrite, record_component: &RecordComponent, pool: &mut PoolWrite) -> Result<()> {
	writer.write_u16(pool.put_utf8(record_component.name.as_str())?)?;
	writer.write_u16(pool.put_utf8(record_component.descriptor.as_str())?)?;

	let mut attribute_count = 0;
	let mut buffer = Vec::new();

	if let Some(signature) = &record_component.signature {
		attribute_count += 1;
		write_attribute_fix_length(&mut buffer, pool, attribute::SIGNATURE, 2)?;
		buffer.write_u16(pool.put_utf8(signature.as_str())?)?;
	}

	attribute_count += write_annotation_attributes(&mut buffer, pool,
		&record_component.runtime_visible_annotations,
		&record_component.runtime_invisible_annotations,
		&record_component.runtime_visible_type_annotations,
		&record_component.runtime_invisible_type_annotations,
	)?;

	attribute_count += record_component.attributes.len();
	write_unknown_attributes(&mut buffer, pool, &record_component.attributes)?;

	writer.write_usize_as_u16(attribute_count).context("too many attributes on record component")?;
	writer.write_u8_slice(&buffer)?;

	Ok(())
}

fn write_annotations_attribute(writer: &mut impl ClassWrite, pool: &mut PoolWrite, annotations: &[Annotation]) -> Result<()> {
	writer.write_usize_as_u16(annotations.len()).context("too many annotations")?;
	for annotation in annotations {
		write_annotation(writer, pool, annotation)?;
	}
	Ok(())
}

fn write_parameter_annotations_attribute(writer: &mut impl ClassWrite, pool: &mut PoolWrite, parameter_annotations: &[Vec<Annotation>]) -> Result<()> {
	writer.write_usize_as_u8(parameter_annotations.len()).context("too many parameters with annotations")?;
	for annotations in parameter_annotations {
		write_annotations_attribute(writer, pool, annotations)?;
	}
	Ok(())
}

fn write_annotation(writer: &mut impl ClassWrite, pool: &mut PoolWrite, annotation: &Annotation) -> Result<()> {
	writer.write_u16(pool.put_utf8(annotation.annotation_type.as_str())?)?;
	write_element_value_pairs(writer, pool, &annotation.element_value_pairs)
}

fn write_element_value_pairs(writer: &mut impl ClassWrite, pool: &mut PoolWrite, pairs: &[ElementValuePair]) -> Result<()> {
	writer.write_usize_as_u16(pairs.len()).context("too many element value pairs")?;
	for pair in pairs {
		writer.write_u16(pool.put_utf8(&pair.name)?)?;
		write_element_value(writer, pool, &pair.value)?;
	}
	Ok(())
}

fn write_element_value(writer: &mut impl ClassWrite, pool: &mut PoolWrite, value: &ElementValue) -> Result<()> {
	match value {
		ElementValue::Object(object) => {
			let (tag, index) = match *object {
				Object::Byte(byte) => (b'B', pool.put_integer(byte as i32)?),
				Object::Char(c) => (b'C', pool.put_integer(c as i32)?),
				Object::Double(double) => (b'D', pool.put_double(double)?),
				Object::Float(float) => (b'F', pool.put_float(float)?),
				Object::Integer(integer) => (b'I', pool.put_integer(integer)?),
				Object::Long(long) => (b'J', pool.put_long(long)?),
				Object::Short(short) => (b'S', pool.put_integer(short as i32)?),
				Object::Boolean(boolean) => (b'Z', pool.put_integer(i32::from(boolean))?),
				Object::String(ref string) => (b's', pool.put_utf8(string)?),
			};
			writer.write_u8(tag)?;
			writer.write_u16(index)
		},
		ElementValue::Enum { type_name, const_name } => {
			writer.write_u8(b'e')?;
			writer.write_u16(pool.put_utf8(type_name.as_str())?)?;
			writer.write_u16(pool.put_utf8(const_name)?)
		},
		ElementValue::Class(class) => {
			writer.write_u8(b'c')?;
			writer.write_u16(pool.put_utf8(class)?)
		},
		ElementValue::AnnotationInterface(annotation) => {
			writer.write_u8(b'@')?;
			write_annotation(writer, pool, annotation)
		},
		ElementValue::ArrayType(element_values) => {
			writer.write_u8(b'[')?;
			writer.write_usize_as_u16(element_values.len()).context("too many array elements in element value")?;
			for value in element_values {
				write_element_value(writer, pool, value)?;
			}
			Ok(())
		},
	}
}

fn write_type_annotations_attribute(writer: &mut impl ClassWrite, pool: &mut PoolWrite, type_annotations: &[TypeAnnotation]) -> Result<()> {
	writer.write_usize_as_u16(type_annotations.len()).context("too many type annotations")?;
	for type_annotation in type_annotations {
		write_target_info(writer, type_annotation.target)?;
		write_type_path(writer, &type_annotation.type_path)?;
		write_annotation(writer, pool, &type_annotation.annotation)?;
	}
	Ok(())
}

fn write_target_info(writer: &mut impl ClassWrite, target: TargetInfo) -> Result<()> {
	match target {
		TargetInfo::ClassTypeParameter { index } => {
			writer.write_u8(type_annotation::CLASS_TYPE_PARAMETER)?;
			writer.write_u8(index)
		},
		TargetInfo::MethodTypeParameter { index } => {
			writer.write_u8(type_annotation::METHOD_TYPE_PARAMETER)?;
			writer.write_u8(index)
		},
		TargetInfo::Supertype { index } => {
			writer.write_u8(type_annotation::CLASS_EXTENDS)?;
			writer.write_u16(index)
		},
		TargetInfo::ClassTypeParameterBound { type_parameter_index, bound_index } => {
			writer.write_u8(type_annotation::CLASS_TYPE_PARAMETER_BOUND)?;
			writer.write_u8(type_parameter_index)?;
			writer.write_u8(bound_index)
		},
		TargetInfo::MethodTypeParameterBound { type_parameter_index, bound_index } => {
			writer.write_u8(type_annotation::METHOD_TYPE_PARAMETER_BOUND)?;
			writer.write_u8(type_parameter_index)?;
			writer.write_u8(bound_index)
		},
		TargetInfo::Field => writer.write_u8(type_annotation::FIELD),
		TargetInfo::Return => writer.write_u8(type_annotation::METHOD_RETURN),
		TargetInfo::Receiver => writer.write_u8(type_annotation::METHOD_RECEIVER),
		TargetInfo::FormalParameter { index } => {
			writer.write_u8(type_annotation::METHOD_FORMAL_PARAMETER)?;
			writer.write_u8(index)
		},
		TargetInfo::Throws { index } => {
			writer.write_u8(type_annotation::THROWS)?;
			writer.write_u16(index)
		},
	}
}

fn write_type_path(writer: &mut impl ClassWrite, type_path: &TypePath) -> Result<()> {
	writer.write_usize_as_u8(type_path.path.len()).context("type path too long")?;
	for kind in &type_path.path {
		let (type_path_kind, type_argument_index) = match *kind {
			TypePathKind::ArrayDeeper => (0, 0),
			TypePathKind::NestedDeeper => (1, 0),
			TypePathKind::WildcardBound => (2, 0),
			TypePathKind::TypeArgument { index } => (3, index),
		};
		writer.write_u8(type_path_kind)?;
		writer.write_u8(type_argument_index)?;
	}
	Ok(())
}

fn write_module(writer: &mut impl ClassWrite, pool: &mut PoolWrite, module: &Module) -> Result<()> {
	writer.write_u16(pool.put_module(&module.name)?)?;
	writer.write_u16(module.flags.into())?;
	writer.write_u16(pool.put_optional(module.version.as_deref(), PoolWrite::put_utf8)?)?;
	writer.write_slice(&module.requires,
		|w, len| w.write_usize_as_u16(len).context("too many requires"),
		|w, requires| {
			w.write_u16(pool.put_module(&requires.name)?)?;
			w.write_u16(requires.flags.into())?;
			w.write_u16(pool.put_optional(requires.version.as_deref(), PoolWrite::put_utf8)?)
		}
	)?;
	writer.write_slice(&module.exports,
		|w, len| w.write_usize_as_u16(len).context("too many exports"),
		|w, exports| {
			w.write_u16(pool.put_package(&exports.name)?)?;
			w.write_u16(exports.flags.into())?;
			w.write_slice(&exports.exports_to,
				|w, len| w.write_usize_as_u16(len).context("too many modules to export to"),
				|w, to| w.write_u16(pool.put_module(to)?)
			)
		}
	)?;
	writer.write_slice(&module.opens,
		|w, len| w.write_usize_as_u16(len).context("too many opens"),
		|w, opens| {
			w.write_u16(pool.put_package(&opens.name)?)?;
			w.write_u16(opens.flags.into())?;
			w.write_slice(&opens.opens_to,
				|w, len| w.write_usize_as_u16(len).context("too many modules to open to"),
				|w, to| w.write_u16(pool.put_module(to)?)
			)
		}
	)?;
	writer.write_slice(&module.uses,
		|w, len| w.write_usize_as_u16(len).context("too many uses"),
		|w, uses| w.write_u16(pool.put_class(uses)?)
	)?;
	writer.write_slice(&module.provides,
		|w, len| w.write_usize_as_u16(len).context("too many provides"),
		|w, provides| {
			w.write_u16(pool.put_class(&provides.name)?)?;
			w.write_slice(&provides.provides_with,
				|w, len| w.write_usize_as_u16(len).context("too many implementations provided"),
				|w, provides_with| w.write_u16(pool.put_class(provides_with)?)
			)
		}
	)
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::class_writer::{compute_max_locals, subtract_range};
	use crate::tree::method::{Method, MethodAccess, MethodDescriptor, MethodName};
	use crate::tree::method::code::{Code, Instruction, LvIndex};

	#[test]
	fn ranges() {
		assert_eq!(subtract_range((0, 10), (3, 5)), vec![(0, 3), (5, 10)]);
		assert_eq!(subtract_range((0, 10), (0, 5)), vec![(5, 10)]);
		assert_eq!(subtract_range((4, 6), (0, 10)), vec![]);
		assert_eq!(subtract_range((4, 6), (8, 10)), vec![(4, 6)]);
	}

	#[test]
	fn max_locals() {
		let method = Method::new(MethodAccess::from(0x0001), MethodName::from("f"), MethodDescriptor::from("(JI)V"));
		let mut code = Code::default();
		assert_eq!(compute_max_locals(&method, &code).unwrap(), 4);
		code.instructions.push(Instruction::DStore(LvIndex { index: 4 }).into());
		assert_eq!(compute_max_locals(&method, &code).unwrap(), 6);
	}
}
