use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// The version of a class file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
	pub major: u16,
	pub minor: u16,
}

impl Version {
	pub const V1_6: Version = Version::new(50, 0);
	pub const V1_8: Version = Version::new(52, 0);
	pub const V9: Version = Version::new(53, 0);
	pub const V11: Version = Version::new(55, 0);
	pub const V16: Version = Version::new(60, 0);
	pub const V17: Version = Version::new(61, 0);
	pub const V21: Version = Version::new(65, 0);
	/// The newest version this crate can read.
	pub const V23: Version = Version::new(67, 0);

	pub const fn new(major: u16, minor: u16) -> Version {
		Version { major, minor }
	}

	/// Returns `true` if class files of this version need a `StackMapTable` for verification.
	pub fn has_stack_map_frames(self) -> bool {
		self >= Version::V1_6
	}

	/// The class file version as a single `u32`, with the minor version in the high bits.
	pub fn as_u32(self) -> u32 {
		(self.minor as u32) << 16 | self.major as u32
	}
}

impl PartialOrd for Version {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Version {
	fn cmp(&self, other: &Self) -> Ordering {
		self.major.cmp(&other.major)
			.then_with(|| self.minor.cmp(&other.minor))
	}
}

impl Display for Version {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{}", self.major, self.minor)
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::tree::version::Version;

	#[test]
	fn test_cmp() {
		assert!(Version::V17 < Version::V21);
		assert!(Version::V21 <= Version::V21);
		assert!(Version::V21 < Version::new(65, 1));
		assert!(Version::new(66, 0) > Version::new(65, 0xffff));
	}

	#[test]
	fn preview_as_u32() {
		assert_eq!(Version::new(65, 0xffff).as_u32(), 0xFFFF_0041);
		assert_eq!(Version::V1_8.as_u32(), 52);
		assert!(!Version::new(49, 0).has_stack_map_frames());
	}
}
