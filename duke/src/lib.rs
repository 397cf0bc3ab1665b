//! A crate for reading and writing [Java Class Files](https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html).
//!
//! The class file is read into the [`tree`] model, which owns everything (no references into the constant pool remain).
//! Writing builds up a new constant pool and recomputes `max_stack`, `max_locals` and, if requested, the
//! `StackMapTable` attribute.

use std::fmt::Debug;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use anyhow::{anyhow, bail, Context, Result};
use crate::tree::class::ClassFile;
use crate::tree::version::Version;

pub mod tree;
pub mod class_constants;
mod macros;
mod jstring;
mod class_reader;
mod class_writer;

pub use class_writer::frames::{CommonSuperClass, ObjectOnly};

/// Reads a class file.
///
/// Any `StackMapTable` attribute is dropped, since it is recomputed on writing.
pub fn read_class(reader: &mut (impl Read + Seek)) -> Result<ClassFile> {
	class_reader::read(reader)
}

/// Reads a class file from a byte slice.
pub fn read_class_from_slice(bytes: &[u8]) -> Result<ClassFile> {
	read_class(&mut Cursor::new(bytes))
}

/// Options for [`write_class`].
#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
	/// Compute the `StackMapTable` attribute for every method with code.
	///
	/// Only takes effect for class files of version 50 and above, since older versions don't have that attribute.
	/// The `max_stack` and `max_locals` items are always computed.
	pub compute_frames: bool,
}

impl Default for WriterOptions {
	fn default() -> Self {
		WriterOptions { compute_frames: true }
	}
}

/// Writes a class file.
///
/// The `super_classes` is asked for the common super class of two reference types whenever two frames get merged.
pub fn write_class(writer: &mut impl Write, class: &ClassFile, options: WriterOptions, super_classes: &impl CommonSuperClass) -> Result<()> {
	class_writer::write(writer, class, options, super_classes)
		.with_context(|| anyhow!("failed to write class {}", class.name))
}

/// Writes a class file into a new vec.
pub fn write_class_to_vec(class: &ClassFile, options: WriterOptions, super_classes: &impl CommonSuperClass) -> Result<Vec<u8>> {
	let mut vec = Vec::new();
	write_class(&mut vec, class, options, super_classes)?;
	Ok(vec)
}

/// Reads the version of a class file, without looking at anything after it.
///
/// Unlike [`read_class`], this doesn't fail for versions newer than this crate can read.
pub fn read_class_version(bytes: &[u8]) -> Result<Version> {
	class_reader::read_version(&mut Cursor::new(bytes))
}

trait OptionExpansion<T> {
	fn insert_if_empty(&mut self, value: T) -> Result<()>;
}
impl<T> OptionExpansion<T> for Option<T> where T: Debug {
	fn insert_if_empty(&mut self, value: T) -> Result<()> {
		if let Some(old) = self {
			bail!("got {old:?} and {value:?}");
		} else {
			*self = Some(value);
			Ok(())
		}
	}
}

trait ClassRead {
	fn marker(&mut self) -> Result<u64>;
	fn skip(&mut self, n: i64) -> Result<()>;
	/// Runs `f` with the reader at position `pos`, and moves it back to where it was afterwards.
	fn with_pos<T>(&mut self, pos: u64, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T>;

	fn read_n<const N: usize>(&mut self) -> Result<[u8; N]>;
	fn read_u8(&mut self) -> Result<u8> {
		Ok(u8::from_be_bytes(self.read_n().context("couldn't read u8, perhaps the data's end is reached?")?))
	}
	fn read_u16(&mut self) -> Result<u16> {
		Ok(u16::from_be_bytes(self.read_n().context("couldn't read u16, perhaps the data's end is reached?")?))
	}
	fn read_u32(&mut self) -> Result<u32> {
		Ok(u32::from_be_bytes(self.read_n().context("couldn't read u32, perhaps the data's end is reached?")?))
	}
	fn read_i8(&mut self) -> Result<i8> {
		Ok(i8::from_be_bytes(self.read_n().context("couldn't read i8, perhaps the data's end is reached?")?))
	}
	fn read_i16(&mut self) -> Result<i16> {
		Ok(i16::from_be_bytes(self.read_n().context("couldn't read i16, perhaps the data's end is reached?")?))
	}
	fn read_i32(&mut self) -> Result<i32> {
		Ok(i32::from_be_bytes(self.read_n().context("couldn't read i32, perhaps the data's end is reached?")?))
	}
	fn read_i64(&mut self) -> Result<i64> {
		Ok(i64::from_be_bytes(self.read_n().context("couldn't read i64, perhaps the data's end is reached?")?))
	}

	fn read_u8_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_u8()? as usize)
	}
	fn read_u16_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_u16()? as usize)
	}
	fn read_u8_vec(&mut self, size: usize) -> Result<Vec<u8>>;
	fn read_vec<T, S, E>(&mut self, get_size: S, mut get_element: E) -> Result<Vec<T>>
		where
			S: FnOnce(&mut Self) -> Result<usize>,
			E: FnMut(&mut Self) -> Result<T>
	{
		let size = get_size(self)?;
		let mut vec = Vec::with_capacity(size);
		for _ in 0..size {
			vec.push(get_element(self)?);
		}
		Ok(vec)
	}
}
impl<T: Read + Seek> ClassRead for T {
	fn marker(&mut self) -> Result<u64> {
		Ok(self.stream_position()?)
	}
	fn skip(&mut self, n: i64) -> Result<()> {
		self.seek(SeekFrom::Current(n))?;
		Ok(())
	}
	fn with_pos<R>(&mut self, pos: u64, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
		let old = self.stream_position()?;
		self.seek(SeekFrom::Start(pos))?;
		let result = f(self)?;
		self.seek(SeekFrom::Start(old))?;
		Ok(result)
	}

	fn read_n<const N: usize>(&mut self) -> Result<[u8; N]> {
		let mut buf = [0u8; N];
		self.read_exact(&mut buf)?;
		Ok(buf)
	}
	fn read_u8_vec(&mut self, size: usize) -> Result<Vec<u8>> {
		let mut vec = vec![0; size];
		self.read_exact(&mut vec)?;
		Ok(vec)
	}
}

trait ClassWrite {
	fn write_u8(&mut self, a: u8) -> Result<()> {
		self.write_u8_slice(&[a]).context("couldn't write u8")
	}
	fn write_u16(&mut self, value: u16) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes()).context("couldn't write u16")
	}
	fn write_u32(&mut self, value: u32) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes()).context("couldn't write u32")
	}
	fn write_u64(&mut self, value: u64) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes()).context("couldn't write u64")
	}
	fn write_i8(&mut self, value: i8) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes()).context("couldn't write i8")
	}
	fn write_i16(&mut self, value: i16) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes()).context("couldn't write i16")
	}
	fn write_i32(&mut self, value: i32) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes()).context("couldn't write i32")
	}
	fn write_i64(&mut self, value: i64) -> Result<()> {
		self.write_u8_slice(&value.to_be_bytes()).context("couldn't write i64")
	}

	fn write_usize_as_u8(&mut self, value: usize) -> Result<()> {
		self.write_u8(u8::try_from(value).with_context(|| anyhow!("failed to convert {value} to u8 for writing: value too large"))?)
	}
	fn write_usize_as_u16(&mut self, value: usize) -> Result<()> {
		self.write_u16(u16::try_from(value).with_context(|| anyhow!("failed to convert {value} to u16 for writing: value too large"))?)
	}
	fn write_usize_as_u32(&mut self, value: usize) -> Result<()> {
		self.write_u32(u32::try_from(value).with_context(|| anyhow!("failed to convert {value} to u32 for writing: value too large"))?)
	}

	fn write_u8_slice(&mut self, buf: &[u8]) -> Result<()>;
	fn write_slice<'t, T>(
		&mut self,
		slice: &'t [T],
		put_size: impl FnOnce(&mut Self, usize) -> Result<()>,
		mut put_element: impl FnMut(&mut Self, &'t T) -> Result<()>
	) -> Result<()> {
		put_size(self, slice.len())?;
		for value in slice {
			put_element(self, value)?;
		}
		Ok(())
	}
}

impl<T: Write> ClassWrite for T {
	fn write_u8_slice(&mut self, buf: &[u8]) -> Result<()> {
		self.write_all(buf).context("failed to write &[u8]")
	}
}
