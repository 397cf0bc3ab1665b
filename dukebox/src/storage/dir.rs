use std::collections::HashMap;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context, Result};
use walkdir::WalkDir;
use crate::storage::{BasicFileAttributes, Jar, JarEntry, JarEntryEnum, OpenedJar};

/// A directory on disk, read like a jar. Directory entries have names ending in `/`.
#[derive(Debug, Clone)]
pub struct DirJar {
	pub(crate) path: PathBuf,
}

impl DirJar {
	pub fn new(path: impl Into<PathBuf>) -> DirJar {
		DirJar { path: path.into() }
	}
}

impl Jar for DirJar {
	type Opened<'a> = OpenedDirJar where Self: 'a;

	fn open(&self) -> Result<Self::Opened<'_>> {
		let mut entries = Vec::new();
		for entry in WalkDir::new(&self.path).min_depth(1).sort_by_file_name() {
			let entry = entry.with_context(|| anyhow!("failed to walk directory {self:?}"))?;

			let name = entry_name(&self.path, entry.path())?;
			let is_dir = entry.file_type().is_dir();
			let name = if is_dir { format!("{name}/") } else { name };

			entries.push(DirJarEntry { name, path: entry.into_path(), is_dir });
		}

		let by_name = entries.iter()
			.enumerate()
			.map(|(index, entry)| (entry.name.clone(), index))
			.collect();

		Ok(OpenedDirJar { entries, by_name })
	}
}

/// The name of a file in the directory, with `/` as separator.
fn entry_name(root: &Path, path: &Path) -> Result<String> {
	let relative = path.strip_prefix(root)
		.with_context(|| anyhow!("path {path:?} is not inside {root:?}"))?;

	let mut parts = Vec::new();
	for component in relative.components() {
		let part = component.as_os_str().to_str()
			.with_context(|| anyhow!("path {path:?} is not valid unicode"))?;
		parts.push(part);
	}
	Ok(parts.join("/"))
}

#[derive(Debug)]
pub struct OpenedDirJar {
	entries: Vec<DirJarEntry>,
	by_name: HashMap<String, usize>,
}

impl OpenedDirJar {
	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}
}

impl OpenedJar for OpenedDirJar {
	type EntryKey = usize;

	type Entry<'a> = DirJarEntry where Self: 'a;

	fn entry_keys(&self) -> impl Iterator<Item=Self::EntryKey> + 'static {
		0..self.entries.len()
	}

	fn by_entry_key(&mut self, key: Self::EntryKey) -> Result<Self::Entry<'_>> {
		self.entries.get(key).cloned()
			.with_context(|| anyhow!("no directory entry with index {key}"))
	}

	fn names(&self) -> impl Iterator<Item=(Self::EntryKey, &'_ str)> {
		self.entries.iter().enumerate().map(|(index, entry)| (index, entry.name.as_str()))
	}

	fn by_name(&mut self, name: &str) -> Result<Option<Self::Entry<'_>>> {
		Ok(self.by_name.get(name).and_then(|&index| self.entries.get(index)).cloned())
	}
}

#[derive(Debug, Clone)]
pub struct DirJarEntry {
	name: String,
	path: PathBuf,
	is_dir: bool,
}

impl JarEntry for DirJarEntry {
	fn name(&self) -> &str {
		&self.name
	}

	fn attrs(&self) -> BasicFileAttributes {
		BasicFileAttributes::default()
	}

	fn to_jar_entry_enum(self) -> Result<JarEntryEnum> {
		if self.is_dir {
			Ok(JarEntryEnum::Dir)
		} else {
			let data = std::fs::read(&self.path)
				.with_context(|| anyhow!("failed to read file {:?}", self.path))?;
			Ok(JarEntryEnum::from_data(&self.name, data))
		}
	}
}
