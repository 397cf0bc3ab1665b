use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, trace};
use duke::{CommonSuperClass, WriterOptions};
use duke::tree::class::ClassFile;
use crate::diagnostics::Diagnostics;
use crate::passes::{Lowered, Pass};
use crate::passes::widen::widen_calls;
use crate::release::{Release, Stage};
use crate::symbols::SymbolTable;

/// How often a [`Stage::FixedPoint`] may run its pass before giving up.
const MAX_ROUNDS: usize = 16;

/// What [`Converter::convert_bytes`] did with a class.
#[derive(Debug, Clone, PartialEq)]
pub enum Converted {
	/// The class is already at or below the target release, the original bytes can be used.
	Unchanged,
	Rewritten {
		bytes: Vec<u8>,
		/// `false` if the class references something the target release doesn't have.
		passed_check: bool,
	},
}

/// Converts classes down to a target release.
pub struct Converter<'a> {
	target: Release,
	symbols: Option<&'a SymbolTable<'a>>,
	diagnostics: &'a Diagnostics,
}

impl<'a> Converter<'a> {
	pub fn new(target: Release, diagnostics: &'a Diagnostics) -> Converter<'a> {
		Converter { target, symbols: None, diagnostics }
	}

	/// Also widens calls and checks converted classes with the given symbol table.
	pub fn with_symbols(mut self, symbols: &'a SymbolTable<'a>) -> Converter<'a> {
		self.symbols = Some(symbols);
		self
	}

	pub fn target(&self) -> Release {
		self.target
	}

	/// Runs all stages needed to bring the class down to the target release.
	///
	/// Returns [`None`] if the class is already at or below the target release.
	pub fn convert(&self, class: ClassFile) -> Result<Option<ClassFile>> {
		let Some(stages) = self.target.stages_from(class.version)? else {
			return Ok(None);
		};
		info!("Converting {}", class.name);

		let mut class = class;
		for stage in stages {
			class = match stage {
				Stage::Once(pass) => {
					let lowered = pass.apply(class)?;
					if lowered.is_changed() {
						debug!("{pass} changed {}", lowered.class().name);
					}
					lowered.into_class()
				},
				Stage::FixedPoint(pass) => fixed_point(pass, class)?,
			};
		}

		if let Some(symbols) = self.symbols {
			widen_calls(&mut class, symbols, self.diagnostics)
				.with_context(|| anyhow!("failed to widen calls in {}", class.name))?;
		}

		let mut class = Pass::RemoveAttributes.apply(class)?.into_class();
		class.version = self.target.version();
		Ok(Some(class))
	}

	/// Converts a class file, if needed.
	///
	/// Classes at or below the target release are not even parsed. Converted classes are checked against the symbol
	/// table, if there's one, and written with frames computed using the given class hierarchy.
	pub fn convert_bytes(&self, bytes: &[u8], hierarchy: &impl CommonSuperClass) -> Result<Converted> {
		let version = duke::read_class_version(bytes)?;
		if self.target.stages_from(version)?.is_none() {
			return Ok(Converted::Unchanged);
		}

		let class = duke::read_class_from_slice(bytes)?;
		let name = class.name.clone();
		let Some(class) = self.convert(class).with_context(|| anyhow!("failed to convert class {name}"))? else {
			return Ok(Converted::Unchanged);
		};

		let passed_check = match self.symbols {
			Some(symbols) => symbols.check(&class, self.diagnostics)?,
			None => true,
		};

		let bytes = duke::write_class_to_vec(&class, WriterOptions::default(), hierarchy)
			.with_context(|| anyhow!("failed to write converted class {name}"))?;
		Ok(Converted::Rewritten { bytes, passed_check })
	}
}

/// Runs the pass until it doesn't change the class anymore.
fn fixed_point(pass: Pass, mut class: ClassFile) -> Result<ClassFile> {
	for round in 1..=MAX_ROUNDS {
		match pass.apply(class)? {
			Lowered::Unchanged(unchanged) => return Ok(unchanged),
			Lowered::Changed(changed) => {
				trace!("{pass} changed {} in round {round}", changed.name);
				class = changed;
			},
		}
	}
	bail!("{pass} didn't settle on {} after {MAX_ROUNDS} rounds", class.name)
}
