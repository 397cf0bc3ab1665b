use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use anyhow::{anyhow, Context, Result};
use zip::read::ZipFile;
use zip::ZipArchive;
use crate::storage::{BasicFileAttributes, DirJar, DirJarEntry, FileJar, Jar, JarEntry, JarEntryEnum, JmodJar, MemJar, OpenedDirJar, OpenedJar};

/// Any of the jars of this crate.
#[derive(Debug, Clone)]
pub enum EnumJar {
	File(FileJar),
	Mem(MemJar),
	Jmod(JmodJar),
	Dir(DirJar),
}

impl EnumJar {
	/// Picks the kind of jar from the path: a directory, a `.jmod` file or else a jar file.
	pub fn from_path(path: &Path) -> EnumJar {
		if path.is_dir() {
			EnumJar::Dir(DirJar::new(path))
		} else if path.extension().is_some_and(|extension| extension == "jmod") {
			EnumJar::Jmod(JmodJar::new(path))
		} else {
			EnumJar::File(FileJar::new(path))
		}
	}
}

pub trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

impl Jar for EnumJar {
	type Opened<'a> = EnumOpenedJar<'a> where Self: 'a;

	fn open(&self) -> Result<Self::Opened<'_>> {
		let reader: Box<dyn ReadSeek + '_> = match self {
			EnumJar::File(file) => Box::new(File::open(&file.path)
				.with_context(|| anyhow!("could not open file {file:?}"))?),
			EnumJar::Mem(mem) => Box::new(Cursor::new(mem.data.as_slice())),
			EnumJar::Jmod(jmod) => Box::new(Cursor::new(jmod.read_zip_data()?)),
			EnumJar::Dir(dir) => return Ok(EnumOpenedJar::Dir(dir.open()?)),
		};

		let zip = ZipArchive::new(reader)
			.with_context(|| anyhow!("failed to read zip archive from {self:?}"))?;
		Ok(EnumOpenedJar::Zip(zip))
	}
}

impl From<FileJar> for EnumJar {
	fn from(value: FileJar) -> Self {
		EnumJar::File(value)
	}
}

impl From<MemJar> for EnumJar {
	fn from(value: MemJar) -> Self {
		EnumJar::Mem(value)
	}
}

impl From<JmodJar> for EnumJar {
	fn from(value: JmodJar) -> Self {
		EnumJar::Jmod(value)
	}
}

impl From<DirJar> for EnumJar {
	fn from(value: DirJar) -> Self {
		EnumJar::Dir(value)
	}
}

pub enum EnumOpenedJar<'a> {
	Zip(ZipArchive<Box<dyn ReadSeek + 'a>>),
	Dir(OpenedDirJar),
}

impl OpenedJar for EnumOpenedJar<'_> {
	type EntryKey = usize;

	type Entry<'b> = EnumJarEntry<'b> where Self: 'b;

	fn entry_keys(&self) -> impl Iterator<Item=Self::EntryKey> + 'static {
		match self {
			EnumOpenedJar::Zip(zip) => 0..zip.len(),
			EnumOpenedJar::Dir(dir) => 0..dir.len(),
		}
	}

	fn by_entry_key(&mut self, key: Self::EntryKey) -> Result<Self::Entry<'_>> {
		Ok(match self {
			EnumOpenedJar::Zip(zip) => EnumJarEntry::Zip(zip.by_entry_key(key)?),
			EnumOpenedJar::Dir(dir) => EnumJarEntry::Dir(dir.by_entry_key(key)?),
		})
	}

	fn names(&self) -> impl Iterator<Item=(Self::EntryKey, &'_ str)> {
		let names: Box<dyn Iterator<Item=(usize, &str)> + '_> = match self {
			EnumOpenedJar::Zip(zip) => Box::new(zip.names()),
			EnumOpenedJar::Dir(dir) => Box::new(dir.names()),
		};
		names
	}

	fn by_name(&mut self, name: &str) -> Result<Option<Self::Entry<'_>>> {
		Ok(match self {
			EnumOpenedJar::Zip(zip) => OpenedJar::by_name(zip, name)?.map(EnumJarEntry::Zip),
			EnumOpenedJar::Dir(dir) => dir.by_name(name)?.map(EnumJarEntry::Dir),
		})
	}
}

pub enum EnumJarEntry<'a> {
	Zip(ZipFile<'a>),
	Dir(DirJarEntry),
}

impl JarEntry for EnumJarEntry<'_> {
	fn name(&self) -> &str {
		match self {
			EnumJarEntry::Zip(zip) => JarEntry::name(zip),
			EnumJarEntry::Dir(dir) => dir.name(),
		}
	}

	fn attrs(&self) -> BasicFileAttributes {
		match self {
			EnumJarEntry::Zip(zip) => zip.attrs(),
			EnumJarEntry::Dir(dir) => dir.attrs(),
		}
	}

	fn to_jar_entry_enum(self) -> Result<JarEntryEnum> {
		match self {
			EnumJarEntry::Zip(zip) => zip.to_jar_entry_enum(),
			EnumJarEntry::Dir(dir) => dir.to_jar_entry_enum(),
		}
	}
}
