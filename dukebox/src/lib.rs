//! Storage for the archives classes are read from and written to.
//!
//! A [`Jar`] is something that can be [opened][Jar::open] for reading, like a jar file on disk ([`FileJar`]), a jar in
//! memory ([`MemJar`]), a `.jmod` file ([`JmodJar`]) or a directory of class files ([`DirJar`]). [`EnumJar`] picks the
//! right one for a path. Jars are written with the [`JarWriter`].

pub mod storage;

pub use storage::{
	BasicFileAttributes,
	DirJar,
	EnumJar,
	FileJar,
	Jar,
	JarEntry,
	JarEntryEnum,
	JarWriter,
	JmodJar,
	MemJar,
	OpenedJar,
};
