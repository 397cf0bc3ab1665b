use std::io::Cursor;
use std::path::PathBuf;
use anyhow::{anyhow, bail, Context, Result};
use zip::ZipArchive;
use crate::storage::Jar;

const JMOD_MAGIC: [u8; 4] = [b'J', b'M', 0x01, 0x00];

/// A `.jmod` file, a zip archive after a four byte header. The classes are found under `classes/`.
#[derive(Debug, Clone)]
pub struct JmodJar {
	pub(crate) path: PathBuf,
}

impl JmodJar {
	pub fn new(path: impl Into<PathBuf>) -> JmodJar {
		JmodJar { path: path.into() }
	}

	pub(crate) fn read_zip_data(&self) -> Result<Vec<u8>> {
		let data = std::fs::read(&self.path)
			.with_context(|| anyhow!("could not read file {self:?}"))?;
		strip_jmod_header(data)
			.with_context(|| anyhow!("invalid jmod file {self:?}"))
	}
}

/// Removes the `JM\x01\x00` header in front of the zip archive.
pub(crate) fn strip_jmod_header(mut data: Vec<u8>) -> Result<Vec<u8>> {
	if !data.starts_with(&JMOD_MAGIC) {
		bail!("jmod header doesn't match, expected {JMOD_MAGIC:x?}");
	}
	data.drain(..JMOD_MAGIC.len());
	Ok(data)
}

impl Jar for JmodJar {
	type Opened<'a> = ZipArchive<Cursor<Vec<u8>>> where Self: 'a;

	fn open(&self) -> Result<Self::Opened<'_>> {
		ZipArchive::new(Cursor::new(self.read_zip_data()?))
			.with_context(|| anyhow!("failed to read zip archive from {self:?}"))
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::storage::jmod::strip_jmod_header;

	#[test]
	fn header() {
		assert_eq!(strip_jmod_header(vec![b'J', b'M', 1, 0, b'P', b'K']).unwrap(), vec![b'P', b'K']);
		assert!(strip_jmod_header(vec![b'P', b'K', 3, 4]).is_err());
		assert!(strip_jmod_header(vec![]).is_err());
	}
}
