use std::io::{Read, Seek};
use anyhow::{anyhow, Context, Result};
use log::info;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;
use crate::storage::{BasicFileAttributes, JarEntry, JarEntryEnum, OpenedJar};

impl<R: Read + Seek> OpenedJar for ZipArchive<R> {
	type EntryKey = usize;

	type Entry<'a> = ZipFile<'a> where Self: 'a;

	fn entry_keys(&self) -> impl Iterator<Item=Self::EntryKey> + 'static {
		0..self.len()
	}

	fn by_entry_key(&mut self, key: Self::EntryKey) -> Result<Self::Entry<'_>> {
		self.by_index(key).with_context(|| anyhow!("could not get zip entry with index {key}"))
	}

	fn names(&self) -> impl Iterator<Item=(Self::EntryKey, &'_ str)> {
		(0..self.len()).filter_map(|x| self.name_for_index(x).map(|name| (x, name)))
	}

	fn by_name(&mut self, name: &str) -> Result<Option<Self::Entry<'_>>> {
		match ZipArchive::by_name(self, name) {
			Ok(file) => Ok(Some(file)),
			Err(ZipError::FileNotFound) => Ok(None),
			Err(e) => Err(anyhow!("could not get file {name} from zip: {e}")),
		}
	}
}

impl JarEntry for ZipFile<'_> {
	fn name(&self) -> &str {
		ZipFile::name(self)
	}

	fn attrs(&self) -> BasicFileAttributes {
		BasicFileAttributes {
			last_modified: self.last_modified(),
		}
	}

	fn to_jar_entry_enum(mut self) -> Result<JarEntryEnum> {
		Ok(if self.is_dir() {
			JarEntryEnum::Dir
		} else {
			let data = {
				let capacity = self.size()
					.try_into()
					.unwrap_or_else(|x| {
						info!("size of zip file {:?} doesn't fit in usize: {x:?}", self.name());
						0
					});
				let mut data = Vec::with_capacity(capacity);
				self.read_to_end(&mut data)
					.with_context(|| anyhow!("failed to read zip entry {:?}", self.name()))?;
				data
			};

			JarEntryEnum::from_data(self.name(), data)
		})
	}
}
