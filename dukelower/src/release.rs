use std::fmt::{Display, Formatter};
use std::str::FromStr;
use anyhow::{anyhow, bail, Context, Result};
use duke::tree::version::Version;
use crate::passes::Pass;

/// A java release that classes can be converted down to.
///
/// Each release knows the stages that convert a class written for it into one for the release before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Release {
	number: u8,
}

/// How a [`Pass`] is run by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	Once(Pass),
	/// Run the pass again until it reports no more changes.
	FixedPoint(Pass),
}

impl Release {
	pub const JAVA_8: Release = Release { number: 8 };
	pub const JAVA_9: Release = Release { number: 9 };
	pub const JAVA_11: Release = Release { number: 11 };
	pub const JAVA_16: Release = Release { number: 16 };
	pub const JAVA_17: Release = Release { number: 17 };
	pub const JAVA_21: Release = Release { number: 21 };
	pub const JAVA_23: Release = Release { number: 23 };

	const LOWEST: u8 = 8;
	const HIGHEST: u8 = 23;

	pub fn new(number: u8) -> Result<Release> {
		if (Release::LOWEST..=Release::HIGHEST).contains(&number) {
			Ok(Release { number })
		} else {
			bail!("Unsupported java version: {number}")
		}
	}

	/// Finds the release a class file version belongs to. Preview versions belong to the release of their major version.
	pub fn of_version(version: Version) -> Result<Release> {
		version.major.checked_sub(44)
			.and_then(|number| u8::try_from(number).ok())
			.and_then(|number| Release::new(number).ok())
			.with_context(|| anyhow!("Don't know how to downgrade a class of version 0x{:08X}", version.as_u32()))
	}

	pub fn number(self) -> u8 {
		self.number
	}

	/// The class file version of this release.
	pub fn version(self) -> Version {
		Version::new(self.number as u16 + 44, 0)
	}

	/// The character naming this release in the directories of `ct.sym`: `8` and `9`, then `A` for 10, `B` for 11 and so on.
	pub fn catalog_code(self) -> char {
		match self.number {
			number @ 0..=9 => char::from(b'0' + number),
			number => char::from(b'A' + (number - 10)),
		}
	}

	/// The stages converting a class of this release into one of the previous release.
	pub fn stages(self) -> &'static [Stage] {
		match self.number {
			9 => &[Stage::Once(Pass::ModuleRemover), Stage::Once(Pass::DynamicStringConcat)],
			11 => &[Stage::FixedPoint(Pass::ExplicitConstants), Stage::Once(Pass::NestHostToPackage)],
			16 => &[Stage::Once(Pass::RecordToClass)],
			17 => &[Stage::Once(Pass::AlwaysStrictFp), Stage::Once(Pass::UnsealClasses)],
			21 => &[Stage::Once(Pass::DynamicSwitchPatterns), Stage::Once(Pass::MatchExceptionFixer)],
			_ => &[],
		}
	}

	/// The stages converting a class of version `from` down to this release, newest release first.
	///
	/// Returns [`None`] if the class doesn't need converting.
	pub fn stages_from(self, from: Version) -> Result<Option<Vec<Stage>>> {
		if from.major <= self.version().major {
			return Ok(None);
		}
		let from = Release::of_version(from)?;
		Ok(Some(((self.number + 1)..=from.number).rev()
			.flat_map(|number| Release { number }.stages())
			.copied()
			.collect()))
	}
}

impl Display for Release {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.number)
	}
}

impl FromStr for Release {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self> {
		let number = s.strip_prefix("1.").unwrap_or(s);
		let number: u8 = number.parse()
			.with_context(|| anyhow!("Unsupported java version: {s}"))?;
		Release::new(number)
	}
}
