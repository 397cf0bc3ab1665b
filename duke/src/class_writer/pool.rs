use anyhow::{anyhow, Context, Result};
use indexmap::{IndexMap, IndexSet};
use java_string::JavaStr;
use crate::class_constants::pool;
use crate::{ClassWrite, jstring};
use crate::tree::class::ClassName;
use crate::tree::field::{ConstantValue, FieldRef};
use crate::tree::method::{MethodDescriptor, MethodRef};
use crate::tree::method::code::{ConstantDynamic, Handle, InvokeDynamic, Loadable};
use crate::tree::module::{ModuleName, PackageName};

/// A bootstrap method with the static arguments already put into the constant pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct BootstrapMethodWrite {
	pub(crate) handle_index: u16,
	/// Each index is created from a call to [`PoolWrite::put_loadable`].
	pub(crate) arguments: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolEntry {
	Class { name_index: u16 },
	FieldRef { class_index: u16, name_and_type_index: u16 },
	MethodRef { class_index: u16, name_and_type_index: u16 },
	InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
	String { string_index: u16 },
	Integer { bytes: i32 },
	Float { bytes: u32 },
	Long { bytes: i64 },
	Double { bytes: u64 },
	NameAndType { name_index: u16, descriptor_index: u16 },
	/// Already in the modified UTF-8 encoding.
	Utf8 { bytes: Vec<u8> },
	MethodHandle { reference_kind: u8, reference_index: u16 },
	MethodType { descriptor_index: u16 },
	Dynamic { bootstrap_method_attribute_index: u16, name_and_type_index: u16 },
	InvokeDynamic { bootstrap_method_attribute_index: u16, name_and_type_index: u16 },
	Module { name_index: u16 },
	Package { name_index: u16 },
}

impl PoolEntry {
	fn is_wide(&self) -> bool {
		matches!(self, PoolEntry::Long { .. } | PoolEntry::Double { .. })
	}
}

/// The constant pool of a class file being written.
///
/// Entries are deduplicated, and written in the order they were first put.
#[derive(Debug)]
pub(crate) struct PoolWrite {
	/// The value written as `constant_pool_count` in the class file.
	///
	/// We start at `1` and increment this twice for [`PoolEntry::Double`] and [`PoolEntry::Long`].
	count: u16,
	entries: IndexMap<PoolEntry, u16>,

	/// The entries of the `BootstrapMethods` attribute, the index in the set is the index used by the pool entries.
	bootstrap_methods: IndexSet<BootstrapMethodWrite>,
}

impl PoolWrite {
	pub(crate) fn new() -> PoolWrite {
		PoolWrite {
			count: 1,
			entries: IndexMap::new(),
			bootstrap_methods: IndexSet::new(),
		}
	}

	/// Removes the collected bootstrap methods. Writing these out may still add new entries to the pool.
	pub(crate) fn take_bootstrap_methods(&mut self) -> Vec<BootstrapMethodWrite> {
		std::mem::take(&mut self.bootstrap_methods).into_iter().collect()
	}

	/// Writes the constant pool, starting with the `constant_pool_count`.
	pub(crate) fn write(self, writer: &mut impl ClassWrite) -> Result<()> {
		writer.write_u16(self.count)?;

		for entry in self.entries.into_keys() {
			match entry {
				PoolEntry::Utf8 { bytes } => {
					writer.write_u8(pool::UTF8)?;
					writer.write_usize_as_u16(bytes.len()).context("failed to write length of string")?;
					writer.write_u8_slice(&bytes)?;
				},
				PoolEntry::Integer { bytes } => {
					writer.write_u8(pool::INTEGER)?;
					writer.write_i32(bytes)?;
				},
				PoolEntry::Float { bytes } => {
					writer.write_u8(pool::FLOAT)?;
					writer.write_u32(bytes)?;
				},
				PoolEntry::Long { bytes } => {
					writer.write_u8(pool::LONG)?;
					writer.write_i64(bytes)?;
				},
				PoolEntry::Double { bytes } => {
					writer.write_u8(pool::DOUBLE)?;
					writer.write_u64(bytes)?;
				},
				PoolEntry::Class { name_index } => {
					writer.write_u8(pool::CLASS)?;
					writer.write_u16(name_index)?;
				},
				PoolEntry::String { string_index } => {
					writer.write_u8(pool::STRING)?;
					writer.write_u16(string_index)?;
				},
				PoolEntry::FieldRef { class_index, name_and_type_index } => {
					writer.write_u8(pool::FIELD_REF)?;
					writer.write_u16(class_index)?;
					writer.write_u16(name_and_type_index)?;
				},
				PoolEntry::MethodRef { class_index, name_and_type_index } => {
					writer.write_u8(pool::METHOD_REF)?;
					writer.write_u16(class_index)?;
					writer.write_u16(name_and_type_index)?;
				},
				PoolEntry::InterfaceMethodRef { class_index, name_and_type_index } => {
					writer.write_u8(pool::INTERFACE_METHOD_REF)?;
					writer.write_u16(class_index)?;
					writer.write_u16(name_and_type_index)?;
				},
				PoolEntry::NameAndType { name_index, descriptor_index } => {
					writer.write_u8(pool::NAME_AND_TYPE)?;
					writer.write_u16(name_index)?;
					writer.write_u16(descriptor_index)?;
				},
				PoolEntry::MethodHandle { reference_kind, reference_index } => {
					writer.write_u8(pool::METHOD_HANDLE)?;
					writer.write_u8(reference_kind)?;
					writer.write_u16(reference_index)?;
				},
				PoolEntry::MethodType { descriptor_index } => {
					writer.write_u8(pool::METHOD_TYPE)?;
					writer.write_u16(descriptor_index)?;
				},
				PoolEntry::Dynamic { bootstrap_method_attribute_index, name_and_type_index } => {
					writer.write_u8(pool::DYNAMIC)?;
					writer.write_u16(bootstrap_method_attribute_index)?;
					writer.write_u16(name_and_type_index)?;
				},
				PoolEntry::InvokeDynamic { bootstrap_method_attribute_index, name_and_type_index } => {
					writer.write_u8(pool::INVOKE_DYNAMIC)?;
					writer.write_u16(bootstrap_method_attribute_index)?;
					writer.write_u16(name_and_type_index)?;
				},
				PoolEntry::Module { name_index } => {
					writer.write_u8(pool::MODULE)?;
					writer.write_u16(name_index)?;
				},
				PoolEntry::Package { name_index } => {
					writer.write_u8(pool::PACKAGE)?;
					writer.write_u16(name_index)?;
				},
			}
		}

		Ok(())
	}

	fn put(&mut self, entry: PoolEntry) -> Result<u16> {
		if let Some(&index) = self.entries.get(&entry) {
			return Ok(index);
		}

		let index = self.count;
		let inc = if entry.is_wide() { 2 } else { 1 };
		self.count = self.count.checked_add(inc)
			.with_context(|| anyhow!("pool count overflowed while adding pool entry {entry:?} to pool at index {index}"))?;

		self.entries.insert(entry, index);
		Ok(index)
	}

	/// Puts an entry into the `BootstrapMethods` attribute, returns the index inside that attribute.
	fn put_bootstrap_method(&mut self, handle: &Handle, arguments: &[Loadable]) -> Result<u16> {
		let handle_index = self.put_method_handle(handle)?;
		let arguments = arguments.iter()
			.map(|argument| self.put_loadable(argument))
			.collect::<Result<Vec<_>>>()?;

		let (index, _) = self.bootstrap_methods.insert_full(BootstrapMethodWrite { handle_index, arguments });
		u16::try_from(index)
			.with_context(|| anyhow!("bootstrap methods attribute count overflowed while adding bootstrap method with handle {handle:?}"))
	}

	/// Returns zero if the value is [`None`], otherwise returns the result of the function `f` called on the value of [`Some`].
	pub(crate) fn put_optional<T: ?Sized>(&mut self, value: Option<&T>, f: impl Fn(&mut PoolWrite, &T) -> Result<u16>) -> Result<u16> {
		if let Some(value) = value {
			f(self, value)
		} else {
			Ok(0)
		}
	}

	pub(crate) fn put_utf8(&mut self, value: &str) -> Result<u16> {
		self.put(PoolEntry::Utf8 { bytes: jstring::from_str_to_vec(value).into_owned() })
	}

	pub(crate) fn put_java_utf8(&mut self, value: &JavaStr) -> Result<u16> {
		self.put(PoolEntry::Utf8 { bytes: jstring::from_string_to_vec(value).into_owned() })
	}

	pub(crate) fn put_class(&mut self, value: &ClassName) -> Result<u16> {
		let name_index = self.put_utf8(value.as_str())?;
		self.put(PoolEntry::Class { name_index })
	}

	pub(crate) fn put_package(&mut self, value: &PackageName) -> Result<u16> {
		let name_index = self.put_utf8(value.as_str())?;
		self.put(PoolEntry::Package { name_index })
	}

	pub(crate) fn put_module(&mut self, value: &ModuleName) -> Result<u16> {
		let name_index = self.put_utf8(value.as_str())?;
		self.put(PoolEntry::Module { name_index })
	}

	pub(crate) fn put_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
		let name_index = self.put_utf8(name)?;
		let descriptor_index = self.put_utf8(descriptor)?;
		self.put(PoolEntry::NameAndType { name_index, descriptor_index })
	}

	pub(crate) fn put_field_ref(&mut self, value: &FieldRef) -> Result<u16> {
		let class_index = self.put_class(&value.class)?;
		let name_and_type_index = self.put_name_and_type(value.name.as_str(), value.desc.as_str())?;
		self.put(PoolEntry::FieldRef { class_index, name_and_type_index })
	}

	pub(crate) fn put_method_ref(&mut self, value: &MethodRef) -> Result<u16> {
		self.put_method_ref_or_interface_method_ref(value, false)
	}

	pub(crate) fn put_interface_method_ref(&mut self, value: &MethodRef) -> Result<u16> {
		self.put_method_ref_or_interface_method_ref(value, true)
	}

	/// `true` indicates it's an `InterfaceMethodRef`, `false` that it's a `MethodRef`.
	pub(crate) fn put_method_ref_or_interface_method_ref(&mut self, value: &MethodRef, is_interface: bool) -> Result<u16> {
		let class_index = self.put_class(&value.class)?;
		let name_and_type_index = self.put_name_and_type(value.name.as_str(), value.desc.as_str())?;
		if is_interface {
			self.put(PoolEntry::InterfaceMethodRef { class_index, name_and_type_index })
		} else {
			self.put(PoolEntry::MethodRef { class_index, name_and_type_index })
		}
	}

	pub(crate) fn put_integer(&mut self, value: i32) -> Result<u16> {
		self.put(PoolEntry::Integer { bytes: value })
	}
	pub(crate) fn put_float(&mut self, value: f32) -> Result<u16> {
		self.put(PoolEntry::Float { bytes: value.to_bits() })
	}
	pub(crate) fn put_long(&mut self, value: i64) -> Result<u16> {
		self.put(PoolEntry::Long { bytes: value })
	}
	pub(crate) fn put_double(&mut self, value: f64) -> Result<u16> {
		self.put(PoolEntry::Double { bytes: value.to_bits() })
	}

	fn put_string(&mut self, value: &JavaStr) -> Result<u16> {
		let string_index = self.put_java_utf8(value)?;
		self.put(PoolEntry::String { string_index })
	}

	pub(crate) fn put_method_handle(&mut self, value: &Handle) -> Result<u16> {
		let reference_index = match value {
			Handle::GetField(field) | Handle::GetStatic(field) |
			Handle::PutField(field) | Handle::PutStatic(field) => self.put_field_ref(field)?,
			Handle::InvokeVirtual(method) | Handle::NewInvokeSpecial(method) => self.put_method_ref(method)?,
			&Handle::InvokeStatic(ref method, is_interface) |
			&Handle::InvokeSpecial(ref method, is_interface) => self.put_method_ref_or_interface_method_ref(method, is_interface)?,
			Handle::InvokeInterface(method) => self.put_interface_method_ref(method)?,
		};
		self.put(PoolEntry::MethodHandle { reference_kind: value.kind(), reference_index })
	}

	fn put_method_type(&mut self, value: &MethodDescriptor) -> Result<u16> {
		let descriptor_index = self.put_utf8(value.as_str())?;
		self.put(PoolEntry::MethodType { descriptor_index })
	}

	fn put_dynamic(&mut self, value: &ConstantDynamic) -> Result<u16> {
		let name_and_type_index = self.put_name_and_type(value.name.as_str(), value.descriptor.as_str())?;
		let bootstrap_method_attribute_index = self.put_bootstrap_method(&value.handle, &value.arguments)?;
		self.put(PoolEntry::Dynamic { bootstrap_method_attribute_index, name_and_type_index })
	}

	pub(crate) fn put_invoke_dynamic(&mut self, value: &InvokeDynamic) -> Result<u16> {
		let name_and_type_index = self.put_name_and_type(value.name.as_str(), value.descriptor.as_str())?;
		let bootstrap_method_attribute_index = self.put_bootstrap_method(&value.handle, &value.arguments)?;
		self.put(PoolEntry::InvokeDynamic { bootstrap_method_attribute_index, name_and_type_index })
	}

	/// Stores a loadable constant pool entry, as used by `ldc` and the static arguments of bootstrap methods.
	pub(crate) fn put_loadable(&mut self, value: &Loadable) -> Result<u16> {
		match value {
			&Loadable::Integer(value) => self.put_integer(value),
			&Loadable::Float(value) => self.put_float(value),
			&Loadable::Long(value) => self.put_long(value),
			&Loadable::Double(value) => self.put_double(value),
			Loadable::Class(value) => self.put_class(value),
			Loadable::String(value) => self.put_string(value),
			Loadable::MethodHandle(value) => self.put_method_handle(value),
			Loadable::MethodType(value) => self.put_method_type(value),
			Loadable::Dynamic(value) => self.put_dynamic(value),
		}
	}

	pub(crate) fn put_constant_value(&mut self, value: &ConstantValue) -> Result<u16> {
		match value {
			&ConstantValue::Integer(value) => self.put_integer(value),
			&ConstantValue::Float(value) => self.put_float(value),
			&ConstantValue::Long(value) => self.put_long(value),
			&ConstantValue::Double(value) => self.put_double(value),
			ConstantValue::String(value) => self.put_string(value),
		}
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::class_writer::pool::PoolWrite;
	use crate::tree::class::ClassName;
	use crate::tree::method::code::Loadable;

	#[test]
	fn entries_are_deduplicated() {
		let mut pool = PoolWrite::new();
		let a = pool.put_class(&ClassName::JAVA_LANG_OBJECT).unwrap();
		let b = pool.put_class(&ClassName::JAVA_LANG_OBJECT).unwrap();
		assert_eq!(a, b);
		// the utf8 got index 1, the class index 2
		assert_eq!(a, 2);
		assert_eq!(pool.put_utf8("java/lang/Object").unwrap(), 1);
	}

	#[test]
	fn wide_entries_take_two_indices() {
		let mut pool = PoolWrite::new();
		assert_eq!(pool.put_long(5).unwrap(), 1);
		assert_eq!(pool.put_integer(5).unwrap(), 3);
		assert_eq!(pool.put_loadable(&Loadable::Double(1.0)).unwrap(), 4);
		assert_eq!(pool.put_float(1.0).unwrap(), 6);

		let mut bytes = Vec::new();
		pool.write(&mut bytes).unwrap();
		// count, then long (9 bytes), integer (5), double (9), float (5)
		assert_eq!(&bytes[..2], &[0, 7]);
		assert_eq!(bytes.len(), 2 + 9 + 5 + 9 + 5);
	}
}
