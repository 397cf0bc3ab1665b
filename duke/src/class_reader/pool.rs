use anyhow::{anyhow, bail, Context, Result};
use java_string::JavaString;
use crate::class_constants::{handle_kind, pool};
use crate::{ClassRead, jstring};
use crate::tree::class::ClassName;
use crate::tree::field::{ConstantValue, FieldDescriptor, FieldName, FieldRef};
use crate::tree::method::{MethodDescriptor, MethodName, MethodNameAndDesc, MethodRef};
use crate::tree::method::code::{ConstantDynamic, Handle, InvokeDynamic, Loadable};
use crate::tree::module::{ModuleName, PackageName};

/// Dynamic constants may reference other dynamic constants as bootstrap arguments. This limits how deep that goes.
const MAX_DYNAMIC_DEPTH: usize = 64;

/// A bootstrap method as read from the `BootstrapMethods` attribute, with the arguments still being pool indices.
///
/// The arguments are resolved lazily, since they may reference `Dynamic` pool entries, which in turn need this attribute.
#[derive(Debug, Clone)]
pub(crate) struct BootstrapMethodRead {
	pub(crate) handle: Handle,
	pub(crate) arguments: Vec<u16>,
}

#[derive(Debug, Clone)]
enum PoolEntry {
	Utf8(JavaString),
	Integer(i32),
	Float(f32),
	Long(i64),
	Double(f64),
	Class { name_index: u16 },
	String { string_index: u16 },
	FieldRef { class_index: u16, name_and_type_index: u16 },
	MethodRef { class_index: u16, name_and_type_index: u16 },
	InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
	NameAndType { name_index: u16, descriptor_index: u16 },
	MethodHandle { reference_kind: u8, reference_index: u16 },
	MethodType { descriptor_index: u16 },
	Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
	InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
	Module { name_index: u16 },
	Package { name_index: u16 },
}

/// The constant pool of a class file that is being read.
///
/// Index `0` and the slot after each `Long` and `Double` entry are [`None`].
#[derive(Debug)]
pub(crate) struct PoolRead {
	entries: Vec<Option<PoolEntry>>,
}

impl PoolRead {
	pub(crate) fn read(reader: &mut impl ClassRead) -> Result<PoolRead> {
		let count = reader.read_u16()?;
		if count == 0 {
			bail!("`constant_pool_count` must be at least one");
		}

		let mut entries = Vec::with_capacity(count as usize);
		entries.push(None);

		while entries.len() < count as usize {
			let index = entries.len();
			let tag = reader.read_u8()?;
			let entry = (|| Ok(match tag {
				pool::UTF8 => {
					let length = reader.read_u16_as_usize()?;
					PoolEntry::Utf8(jstring::from_vec_to_string(reader.read_u8_vec(length)?)?)
				},
				pool::INTEGER => PoolEntry::Integer(reader.read_i32()?),
				pool::FLOAT => PoolEntry::Float(f32::from_bits(reader.read_u32()?)),
				pool::LONG => PoolEntry::Long(reader.read_i64()?),
				pool::DOUBLE => PoolEntry::Double(f64::from_bits(reader.read_i64()? as u64)),
				pool::CLASS => PoolEntry::Class { name_index: reader.read_u16()? },
				pool::STRING => PoolEntry::String { string_index: reader.read_u16()? },
				pool::FIELD_REF => PoolEntry::FieldRef {
					class_index: reader.read_u16()?,
					name_and_type_index: reader.read_u16()?,
				},
				pool::METHOD_REF => PoolEntry::MethodRef {
					class_index: reader.read_u16()?,
					name_and_type_index: reader.read_u16()?,
				},
				pool::INTERFACE_METHOD_REF => PoolEntry::InterfaceMethodRef {
					class_index: reader.read_u16()?,
					name_and_type_index: reader.read_u16()?,
				},
				pool::NAME_AND_TYPE => PoolEntry::NameAndType {
					name_index: reader.read_u16()?,
					descriptor_index: reader.read_u16()?,
				},
				pool::METHOD_HANDLE => PoolEntry::MethodHandle {
					reference_kind: reader.read_u8()?,
					reference_index: reader.read_u16()?,
				},
				pool::METHOD_TYPE => PoolEntry::MethodType { descriptor_index: reader.read_u16()? },
				pool::DYNAMIC => PoolEntry::Dynamic {
					bootstrap_method_attr_index: reader.read_u16()?,
					name_and_type_index: reader.read_u16()?,
				},
				pool::INVOKE_DYNAMIC => PoolEntry::InvokeDynamic {
					bootstrap_method_attr_index: reader.read_u16()?,
					name_and_type_index: reader.read_u16()?,
				},
				pool::MODULE => PoolEntry::Module { name_index: reader.read_u16()? },
				pool::PACKAGE => PoolEntry::Package { name_index: reader.read_u16()? },
				tag => bail!("unknown constant pool tag {tag}"),
			}))()
				.with_context(|| anyhow!("failed to read constant pool entry {index}"))?;

			let takes_two_slots = matches!(entry, PoolEntry::Long(_) | PoolEntry::Double(_));
			entries.push(Some(entry));
			if takes_two_slots {
				entries.push(None);
			}
		}

		if entries.len() != count as usize {
			bail!("last constant pool entry is a long or double taking up two slots, going past `constant_pool_count` of {count}");
		}

		Ok(PoolRead { entries })
	}

	fn get(&self, index: u16) -> Result<&PoolEntry> {
		self.entries.get(index as usize)
			.and_then(|entry| entry.as_ref())
			.with_context(|| anyhow!("constant pool index {index} is out of bounds or unusable"))
	}

	/// Index `0` means there's nothing, otherwise calls `f`.
	pub(crate) fn get_optional<'a, T>(&'a self, index: u16, f: impl FnOnce(&'a PoolRead, u16) -> Result<T>) -> Result<Option<T>> {
		if index == 0 {
			Ok(None)
		} else {
			f(self, index).map(Some)
		}
	}

	pub(crate) fn get_java_utf8(&self, index: u16) -> Result<JavaString> {
		match self.get(index)? {
			PoolEntry::Utf8(string) => Ok(string.clone()),
			entry => bail!("expected utf8 at index {index}, got {entry:?}"),
		}
	}

	/// Reads an utf8 entry that must be a valid rust string, like any name or descriptor.
	pub(crate) fn get_utf8(&self, index: u16) -> Result<String> {
		self.get_java_utf8(index)?
			.into_string()
			.map_err(|e| anyhow!("utf8 at index {index} contains unpaired surrogates: {e:?}"))
	}

	pub(crate) fn get_class(&self, index: u16) -> Result<ClassName> {
		match self.get(index)? {
			&PoolEntry::Class { name_index } => ClassName::checked(self.get_utf8(name_index)?),
			entry => bail!("expected class at index {index}, got {entry:?}"),
		}
	}

	fn get_name_and_type(&self, index: u16) -> Result<(String, String)> {
		match self.get(index)? {
			&PoolEntry::NameAndType { name_index, descriptor_index } => {
				Ok((self.get_utf8(name_index)?, self.get_utf8(descriptor_index)?))
			},
			entry => bail!("expected name and type at index {index}, got {entry:?}"),
		}
	}

	pub(crate) fn get_method_name_and_type(&self, index: u16) -> Result<MethodNameAndDesc> {
		let (name, desc) = self.get_name_and_type(index)?;
		Ok(MethodNameAndDesc {
			name: MethodName::checked(name)?,
			desc: MethodDescriptor::checked(desc)?,
		})
	}

	pub(crate) fn get_field_ref(&self, index: u16) -> Result<FieldRef> {
		match self.get(index)? {
			&PoolEntry::FieldRef { class_index, name_and_type_index } => {
				let (name, desc) = self.get_name_and_type(name_and_type_index)?;
				Ok(FieldRef {
					class: self.get_class(class_index)?,
					name: FieldName::checked(name)?,
					desc: FieldDescriptor::checked(desc)?,
				})
			},
			entry => bail!("expected field ref at index {index}, got {entry:?}"),
		}
	}

	fn make_method_ref(&self, class_index: u16, name_and_type_index: u16) -> Result<MethodRef> {
		let MethodNameAndDesc { name, desc } = self.get_method_name_and_type(name_and_type_index)?;
		Ok(MethodRef {
			class: self.get_class(class_index)?,
			name,
			desc,
		})
	}

	pub(crate) fn get_method_ref(&self, index: u16) -> Result<MethodRef> {
		match self.get(index)? {
			&PoolEntry::MethodRef { class_index, name_and_type_index } => self.make_method_ref(class_index, name_and_type_index),
			entry => bail!("expected method ref at index {index}, got {entry:?}"),
		}
	}

	pub(crate) fn get_interface_method_ref(&self, index: u16) -> Result<MethodRef> {
		match self.get(index)? {
			&PoolEntry::InterfaceMethodRef { class_index, name_and_type_index } => self.make_method_ref(class_index, name_and_type_index),
			entry => bail!("expected interface method ref at index {index}, got {entry:?}"),
		}
	}

	/// The returned `bool` is `true` if it was an `InterfaceMethodRef`.
	pub(crate) fn get_method_ref_or_interface_method_ref(&self, index: u16) -> Result<(MethodRef, bool)> {
		match self.get(index)? {
			&PoolEntry::MethodRef { class_index, name_and_type_index } => {
				Ok((self.make_method_ref(class_index, name_and_type_index)?, false))
			},
			&PoolEntry::InterfaceMethodRef { class_index, name_and_type_index } => {
				Ok((self.make_method_ref(class_index, name_and_type_index)?, true))
			},
			entry => bail!("expected method ref or interface method ref at index {index}, got {entry:?}"),
		}
	}

	pub(crate) fn get_method_handle(&self, index: u16) -> Result<Handle> {
		match self.get(index)? {
			&PoolEntry::MethodHandle { reference_kind, reference_index } => Ok(match reference_kind {
				handle_kind::GET_FIELD => Handle::GetField(self.get_field_ref(reference_index)?),
				handle_kind::GET_STATIC => Handle::GetStatic(self.get_field_ref(reference_index)?),
				handle_kind::PUT_FIELD => Handle::PutField(self.get_field_ref(reference_index)?),
				handle_kind::PUT_STATIC => Handle::PutStatic(self.get_field_ref(reference_index)?),
				handle_kind::INVOKE_VIRTUAL => Handle::InvokeVirtual(self.get_method_ref(reference_index)?),
				handle_kind::INVOKE_STATIC => {
					let (method_ref, is_interface) = self.get_method_ref_or_interface_method_ref(reference_index)?;
					Handle::InvokeStatic(method_ref, is_interface)
				},
				handle_kind::INVOKE_SPECIAL => {
					let (method_ref, is_interface) = self.get_method_ref_or_interface_method_ref(reference_index)?;
					Handle::InvokeSpecial(method_ref, is_interface)
				},
				handle_kind::NEW_INVOKE_SPECIAL => Handle::NewInvokeSpecial(self.get_method_ref(reference_index)?),
				handle_kind::INVOKE_INTERFACE => Handle::InvokeInterface(self.get_interface_method_ref(reference_index)?),
				kind => bail!("unknown method handle reference kind {kind}"),
			}),
			entry => bail!("expected method handle at index {index}, got {entry:?}"),
		}
	}

	pub(crate) fn get_module(&self, index: u16) -> Result<ModuleName> {
		match self.get(index)? {
			&PoolEntry::Module { name_index } => Ok(self.get_utf8(name_index)?.into()),
			entry => bail!("expected module at index {index}, got {entry:?}"),
		}
	}

	pub(crate) fn get_package(&self, index: u16) -> Result<PackageName> {
		match self.get(index)? {
			&PoolEntry::Package { name_index } => Ok(self.get_utf8(name_index)?.into()),
			entry => bail!("expected package at index {index}, got {entry:?}"),
		}
	}

	pub(crate) fn get_integer(&self, index: u16) -> Result<i32> {
		match self.get(index)? {
			&PoolEntry::Integer(value) => Ok(value),
			entry => bail!("expected integer at index {index}, got {entry:?}"),
		}
	}

	pub(crate) fn get_integer_as_byte(&self, index: u16) -> Result<i8> {
		let value = self.get_integer(index)?;
		i8::try_from(value).with_context(|| anyhow!("integer {value} at index {index} doesn't fit a byte"))
	}

	pub(crate) fn get_integer_as_char(&self, index: u16) -> Result<u16> {
		let value = self.get_integer(index)?;
		u16::try_from(value).with_context(|| anyhow!("integer {value} at index {index} doesn't fit a char"))
	}

	pub(crate) fn get_integer_as_short(&self, index: u16) -> Result<i16> {
		let value = self.get_integer(index)?;
		i16::try_from(value).with_context(|| anyhow!("integer {value} at index {index} doesn't fit a short"))
	}

	pub(crate) fn get_integer_as_boolean(&self, index: u16) -> Result<bool> {
		match self.get_integer(index)? {
			0 => Ok(false),
			1 => Ok(true),
			value => bail!("integer {value} at index {index} is not a boolean"),
		}
	}

	pub(crate) fn get_long(&self, index: u16) -> Result<i64> {
		match self.get(index)? {
			&PoolEntry::Long(value) => Ok(value),
			entry => bail!("expected long at index {index}, got {entry:?}"),
		}
	}

	pub(crate) fn get_float(&self, index: u16) -> Result<f32> {
		match self.get(index)? {
			&PoolEntry::Float(value) => Ok(value),
			entry => bail!("expected float at index {index}, got {entry:?}"),
		}
	}

	pub(crate) fn get_double(&self, index: u16) -> Result<f64> {
		match self.get(index)? {
			&PoolEntry::Double(value) => Ok(value),
			entry => bail!("expected double at index {index}, got {entry:?}"),
		}
	}

	pub(crate) fn get_constant_value(&self, index: u16) -> Result<ConstantValue> {
		match self.get(index)? {
			&PoolEntry::Integer(value) => Ok(ConstantValue::Integer(value)),
			&PoolEntry::Float(value) => Ok(ConstantValue::Float(value)),
			&PoolEntry::Long(value) => Ok(ConstantValue::Long(value)),
			&PoolEntry::Double(value) => Ok(ConstantValue::Double(value)),
			&PoolEntry::String { string_index } => Ok(ConstantValue::String(self.get_java_utf8(string_index)?)),
			entry => bail!("expected constant value at index {index}, got {entry:?}"),
		}
	}

	pub(crate) fn get_loadable(&self, index: u16, bootstrap_methods: &[BootstrapMethodRead]) -> Result<Loadable> {
		self.get_loadable_at_depth(index, bootstrap_methods, 0)
	}

	fn get_loadable_at_depth(&self, index: u16, bootstrap_methods: &[BootstrapMethodRead], depth: usize) -> Result<Loadable> {
		Ok(match self.get(index)? {
			&PoolEntry::Integer(value) => Loadable::Integer(value),
			&PoolEntry::Float(value) => Loadable::Float(value),
			&PoolEntry::Long(value) => Loadable::Long(value),
			&PoolEntry::Double(value) => Loadable::Double(value),
			&PoolEntry::Class { .. } => Loadable::Class(self.get_class(index)?),
			&PoolEntry::String { string_index } => Loadable::String(self.get_java_utf8(string_index)?),
			&PoolEntry::MethodHandle { .. } => Loadable::MethodHandle(self.get_method_handle(index)?),
			&PoolEntry::MethodType { descriptor_index } => Loadable::MethodType(MethodDescriptor::checked(self.get_utf8(descriptor_index)?)?),
			&PoolEntry::Dynamic { bootstrap_method_attr_index, name_and_type_index } => {
				if depth >= MAX_DYNAMIC_DEPTH {
					bail!("dynamic constants nested deeper than {MAX_DYNAMIC_DEPTH} levels at index {index}");
				}
				let (name, desc) = self.get_name_and_type(name_and_type_index)?;
				let (handle, arguments) = self.get_bootstrap_method(bootstrap_method_attr_index, bootstrap_methods, depth + 1)?;
				Loadable::Dynamic(ConstantDynamic {
					name: FieldName::checked(name)?,
					descriptor: FieldDescriptor::checked(desc)?,
					handle,
					arguments,
				})
			},
			entry => bail!("expected loadable constant at index {index}, got {entry:?}"),
		})
	}

	pub(crate) fn get_invoke_dynamic(&self, index: u16, bootstrap_methods: &[BootstrapMethodRead]) -> Result<InvokeDynamic> {
		match self.get(index)? {
			&PoolEntry::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => {
				let MethodNameAndDesc { name, desc } = self.get_method_name_and_type(name_and_type_index)?;
				let (handle, arguments) = self.get_bootstrap_method(bootstrap_method_attr_index, bootstrap_methods, 0)?;
				Ok(InvokeDynamic { name, descriptor: desc, handle, arguments })
			},
			entry => bail!("expected invoke dynamic at index {index}, got {entry:?}"),
		}
	}

	fn get_bootstrap_method(&self, index: u16, bootstrap_methods: &[BootstrapMethodRead], depth: usize) -> Result<(Handle, Vec<Loadable>)> {
		let method = bootstrap_methods.get(index as usize)
			.with_context(|| anyhow!("bootstrap method index {index} out of bounds for {} bootstrap methods", bootstrap_methods.len()))?;

		let arguments = method.arguments.iter()
			.map(|&argument| self.get_loadable_at_depth(argument, bootstrap_methods, depth))
			.collect::<Result<_>>()?;

		Ok((method.handle.clone(), arguments))
	}
}

#[cfg(test)]
mod testing {
	use std::io::Cursor;
	use pretty_assertions::assert_eq;
	use crate::class_reader::pool::PoolRead;
	use crate::tree::method::code::Loadable;

	#[test]
	fn long_takes_two_slots() {
		let bytes = [
			0x00, 0x05, // count
			0x05, 0, 0, 0, 0, 0, 0, 0, 7, // long 7
			0x01, 0x00, 0x01, b'A', // utf8 "A"
			0x07, 0x00, 0x03, // class #3
		];
		let pool = PoolRead::read(&mut Cursor::new(&bytes[..])).unwrap();
		assert_eq!(pool.get_long(1).unwrap(), 7);
		assert!(pool.get_long(2).is_err());
		assert_eq!(pool.get_class(4).unwrap(), "A");
		assert_eq!(pool.get_loadable(1, &[]).unwrap(), Loadable::Long(7));
		assert_eq!(pool.get_optional(0, PoolRead::get_class).unwrap(), None);
	}

	#[test]
	fn long_at_the_end_is_an_error() {
		let bytes = [
			0x00, 0x02,
			0x06, 0, 0, 0, 0, 0, 0, 0, 0,
		];
		assert!(PoolRead::read(&mut Cursor::new(&bytes[..])).is_err());
	}
}
