use anyhow::Result;
use crate::storage::OpenedJar;

/// Represents a `.jar` in some form.
///
/// This can be in memory, like [`MemJar`][crate::MemJar], or on disk, like [`FileJar`][crate::FileJar],
/// [`JmodJar`][crate::JmodJar] and [`DirJar`][crate::DirJar].
///
/// You can [`open`][Jar::open] a jar to get to it's content. See [`OpenedJar`] for more.
pub trait Jar {
	type Opened<'a>: OpenedJar where Self: 'a;

	/// Opens the jar for reading.
	fn open(&self) -> Result<Self::Opened<'_>>;
}
