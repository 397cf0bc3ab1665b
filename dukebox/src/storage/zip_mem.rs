use std::fmt::{Debug, Formatter};
use std::io::Cursor;
use anyhow::{anyhow, Context, Result};
use zip::ZipArchive;
use crate::storage::Jar;

/// A jar held in memory.
#[derive(Clone)]
pub struct MemJar {
	pub(crate) name: String,
	pub(crate) data: Vec<u8>,
}

impl Debug for MemJar {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MemJar").field("name", &self.name).finish_non_exhaustive()
	}
}

impl MemJar {
	pub fn new(name: impl Into<String>, data: Vec<u8>) -> MemJar {
		MemJar { name: name.into(), data }
	}
}

impl Jar for MemJar {
	type Opened<'a> = ZipArchive<Cursor<&'a [u8]>> where Self: 'a;

	fn open(&self) -> Result<Self::Opened<'_>> {
		ZipArchive::new(Cursor::new(self.data.as_slice()))
			.with_context(|| anyhow!("failed to read zip archive from {self:?}"))
	}
}
