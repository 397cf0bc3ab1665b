use std::fmt::{Debug, Formatter};
use anyhow::Result;
use crate::storage::BasicFileAttributes;

pub trait JarEntry {
	fn name(&self) -> &str;

	fn attrs(&self) -> BasicFileAttributes;

	/// Reads the content of the entry.
	fn to_jar_entry_enum(self) -> Result<JarEntryEnum>;
}

/// The data of an entry of a jar.
///
/// An entry is a class if its name ends with `.class`.
///
/// The [`Debug`] implementation doesn't try to print the contents.
pub enum JarEntryEnum {
	Dir,
	Class(Vec<u8>),
	Other(Vec<u8>),
}

impl JarEntryEnum {
	pub(crate) fn from_data(name: &str, data: Vec<u8>) -> JarEntryEnum {
		if name.ends_with(".class") {
			JarEntryEnum::Class(data)
		} else {
			JarEntryEnum::Other(data)
		}
	}

	/// Returns the data of a file, or [`None`] for a directory.
	pub fn into_data(self) -> Option<Vec<u8>> {
		match self {
			JarEntryEnum::Dir => None,
			JarEntryEnum::Class(data) | JarEntryEnum::Other(data) => Some(data),
		}
	}
}

/// [`Debug`] only prints the type, not the contents.
impl Debug for JarEntryEnum {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			JarEntryEnum::Dir => write!(f, "Dir"),
			JarEntryEnum::Class(_) => write!(f, "Class"),
			JarEntryEnum::Other(_) => write!(f, "Other"),
		}
	}
}
