use std::fs::File;
use std::path::PathBuf;
use anyhow::{anyhow, Context, Result};
use zip::ZipArchive;
use crate::storage::Jar;

/// A jar (or zip) file on disk.
#[derive(Debug, Clone)]
pub struct FileJar {
	pub(crate) path: PathBuf,
}

impl FileJar {
	pub fn new(path: impl Into<PathBuf>) -> FileJar {
		FileJar { path: path.into() }
	}
}

impl Jar for FileJar {
	type Opened<'a> = ZipArchive<File> where Self: 'a;

	fn open(&self) -> Result<Self::Opened<'_>> {
		let file = File::open(&self.path)
			.with_context(|| anyhow!("could not open file {self:?}"))?;
		ZipArchive::new(file)
			.with_context(|| anyhow!("failed to read zip archive from {self:?}"))
	}
}
