/// An attribute not represented by the tree.
///
/// The bytes are kept as read. Constant pool indices inside them refer to the constant pool of the class file the attribute
/// was read from, and are not remapped on writing.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
	pub name: String,
	pub bytes: Vec<u8>,
}
