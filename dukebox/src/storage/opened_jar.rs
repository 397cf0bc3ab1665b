use anyhow::Result;
use crate::storage::JarEntry;

/// Represents an opened jar.
///
/// An opened jar can be read.
///
/// Each opened jar has an [`EntryKey`][OpenedJar::EntryKey] type (all implementations here use `usize`)
/// that's used for uniquely identifying each entry. You can retrieve an iterator over these entry
/// keys with [`entry_keys`][OpenedJar::entry_keys], and use the entry key to get a [`JarEntry`] with
/// the [`by_entry_key`][OpenedJar::by_entry_key] method. The entry keys iterate in the order of the archive.
///
/// With the [`names`][OpenedJar::names] and [`by_name`][OpenedJar::by_name] methods, an opened jar
/// supports lookup by file name.
pub trait OpenedJar {
	type EntryKey: Copy;

	type Entry<'a>: JarEntry where Self: 'a;

	fn entry_keys(&self) -> impl Iterator<Item=Self::EntryKey> + 'static;

	fn by_entry_key(&mut self, key: Self::EntryKey) -> Result<Self::Entry<'_>>;

	fn names(&self) -> impl Iterator<Item=(Self::EntryKey, &'_ str)>;

	fn by_name(&mut self, name: &str) -> Result<Option<Self::Entry<'_>>>;

	/// Reads the file with the given name.
	///
	/// Returns [`None`] if there's no such entry, or if the entry is a directory.
	fn read_file(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
		match self.by_name(name)? {
			Some(entry) => Ok(entry.to_jar_entry_enum()?.into_data()),
			None => Ok(None),
		}
	}
}
