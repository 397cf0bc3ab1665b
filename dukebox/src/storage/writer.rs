use std::collections::HashSet;
use std::io::{Seek, Write};
use anyhow::{anyhow, Context, Result};
use zip::ZipWriter;
use crate::storage::BasicFileAttributes;

/// Writes a jar, adding the entries for the parent directories of every file written.
pub struct JarWriter<W: Write + Seek> {
	zip: ZipWriter<W>,
	directories: HashSet<String>,
}

impl<W: Write + Seek> JarWriter<W> {
	pub fn new(writer: W) -> JarWriter<W> {
		JarWriter {
			zip: ZipWriter::new(writer),
			directories: HashSet::new(),
		}
	}

	/// Adds a directory entry, if it wasn't added before. A trailing `/` is optional.
	pub fn add_directory(&mut self, name: &str, attrs: BasicFileAttributes) -> Result<()> {
		let name = name.trim_end_matches('/');
		if name.is_empty() || self.directories.contains(name) {
			return Ok(());
		}

		self.add_parent_directories(name)?;
		self.zip.add_directory(name, attrs.to_file_options())
			.with_context(|| anyhow!("failed to add directory {name:?} to jar"))?;
		self.directories.insert(name.to_owned());
		Ok(())
	}

	fn add_parent_directories(&mut self, name: &str) -> Result<()> {
		if let Some((parent, _)) = name.rsplit_once('/') {
			self.add_directory(parent, BasicFileAttributes::default())?;
		}
		Ok(())
	}

	pub fn write_file(&mut self, name: &str, data: &[u8], attrs: BasicFileAttributes) -> Result<()> {
		self.add_parent_directories(name)?;
		self.zip.start_file(name, attrs.to_file_options())
			.with_context(|| anyhow!("failed to start file {name:?} in jar"))?;
		self.zip.write_all(data)
			.with_context(|| anyhow!("failed to write file {name:?} to jar"))
	}

	pub fn finish(self) -> Result<W> {
		self.zip.finish().context("failed to finish writing jar")
	}
}

#[cfg(test)]
mod testing {
	use std::io::Cursor;
	use pretty_assertions::assert_eq;
	use crate::storage::{BasicFileAttributes, Jar, JarEntry, JarEntryEnum, JarWriter, MemJar, OpenedJar};

	#[test]
	fn write_and_read() {
		let mut writer = JarWriter::new(Cursor::new(Vec::new()));
		writer.write_file("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n", BasicFileAttributes::default()).unwrap();
		writer.write_file("a/b/C.class", &[0xCA, 0xFE, 0xBA, 0xBE], BasicFileAttributes::default()).unwrap();
		writer.add_directory("a/", BasicFileAttributes::default()).unwrap();
		let data = writer.finish().unwrap().into_inner();

		let jar = MemJar::new("test.jar", data);
		let mut opened = jar.open().unwrap();

		let names: Vec<_> = opened.names().map(|(_, name)| name.to_owned()).collect();
		assert_eq!(names, vec!["META-INF/", "META-INF/MANIFEST.MF", "a/", "a/b/", "a/b/C.class"]);

		assert_eq!(opened.read_file("a/b/C.class").unwrap(), Some(vec![0xCA, 0xFE, 0xBA, 0xBE]));
		assert_eq!(opened.read_file("a/b/D.class").unwrap(), None);

		let keys: Vec<_> = opened.entry_keys().collect();
		let mut kinds = Vec::new();
		for key in keys {
			let entry = opened.by_entry_key(key).unwrap();
			let name = entry.name().to_owned();
			let kind = match entry.to_jar_entry_enum().unwrap() {
				JarEntryEnum::Dir => "dir",
				JarEntryEnum::Class(_) => "class",
				JarEntryEnum::Other(_) => "other",
			};
			kinds.push((name, kind));
		}
		assert_eq!(kinds[2], ("a/".to_owned(), "dir"));
		assert_eq!(kinds[4], ("a/b/C.class".to_owned(), "class"));
	}
}
