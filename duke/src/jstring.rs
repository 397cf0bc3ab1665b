//! Conversion between the modified UTF-8 of class files and rust strings.
//!
//! Modified UTF-8 stores `\0` using two bytes, and supplementary characters as two three byte surrogates.
//! See <https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html#jvms-4.4.7>.

use std::borrow::Cow;
use anyhow::{anyhow, Context, Result};
use java_string::{JavaStr, JavaString};

/// Takes in a vec of data, tries to read it into a [`JavaString`].
pub(crate) fn from_vec_to_string(vec: Vec<u8>) -> Result<JavaString> {
	JavaString::from_modified_utf8(vec)
		.with_context(|| anyhow!("invalid java utf8 contents"))
}

/// Takes in a vec of data, tries to read it into a [`String`].
///
/// Names and descriptors must be representable as a [`String`], so unpaired surrogates are an error here.
pub(crate) fn from_vec_to_rust_string(vec: Vec<u8>) -> Result<String> {
	from_vec_to_string(vec)?
		.into_string()
		.map_err(|e| anyhow!("string contains unpaired surrogates: {e:?}"))
}

/// Takes in a string and writes it out into a vec.
pub(crate) fn from_string_to_vec(string: &JavaStr) -> Cow<[u8]> {
	string.to_modified_utf8()
}

/// Takes in a [`str`] and writes it out into a vec.
pub(crate) fn from_str_to_vec(string: &str) -> Cow<[u8]> {
	JavaStr::from_str(string).to_modified_utf8()
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use java_string::JavaStr;
	use pretty_assertions::assert_eq;
	use crate::jstring::{from_str_to_vec, from_string_to_vec, from_vec_to_rust_string, from_vec_to_string};

	fn round_trip(raw: &[u8], string: &str) -> Result<()> {
		let str = JavaStr::from_str(string);
		assert_eq!(from_string_to_vec(str), raw);
		assert_eq!(from_vec_to_string(raw.to_owned())?, str);
		assert_eq!(from_vec_to_rust_string(raw.to_owned())?, string);
		Ok(())
	}

	#[test]
	fn zero_uses_two_bytes() -> Result<()> {
		round_trip(&[0b1100_0000, 0b1000_0000, b'a', 0b1100_0000, 0b1000_0000], "\0a\0")
	}

	#[test]
	fn bmp() -> Result<()> {
		round_trip(&[
			b'x',
			0b1100_0010, 0b1000_0000,
			0b1110_0001, 0b1000_1000, 0b1011_0100,
			0b1110_1111, 0b1011_1111, 0b1011_1111,
		], "x\u{0080}\u{1234}\u{ffff}")
	}

	#[test]
	fn supplementary_as_surrogate_pair() -> Result<()> {
		round_trip(&[
			0b1110_1101, 0b1010_0000, 0b1000_0000, 0b1110_1101, 0b1011_0000, 0b1000_0000,
			0b1110_1101, 0b1010_1111, 0b1011_1111, 0b1110_1101, 0b1011_1111, 0b1011_1111,
		], "\u{010000}\u{10ffff}")
	}

	#[test]
	fn unpaired_surrogate() -> Result<()> {
		let vec = vec![ 0b1110_1101, 0b1010_0000, 0b1000_0000 ];
		assert_eq!(from_string_to_vec(&from_vec_to_string(vec.clone())?), vec);
		assert!(from_vec_to_rust_string(vec).is_err());
		Ok(())
	}

	#[test]
	fn rust_str() {
		assert_eq!(from_str_to_vec("java/lang/Object").into_owned(), b"java/lang/Object".to_vec());
	}
}
