use std::collections::HashMap;
use anyhow::{anyhow, bail, Context, Result};
use crate::tree::method::code::{Label, LabelRange};

/// Hands out a [`Label`] for each bytecode offset referenced while reading a `Code` attribute.
///
/// Offsets may be anywhere in `0..code_length`, and only the ends of ranges may also be equal to `code_length`.
pub(crate) struct Labels {
	code_length: u16,
	labels: HashMap<u16, Label>,
	next_id: u16,
}

impl Labels {
	pub(crate) fn new(code_length: u16) -> Labels {
		Labels {
			code_length,
			labels: HashMap::with_capacity(code_length as usize / 4),
			next_id: 0,
		}
	}

	fn entry(&mut self, pc: u16) -> Label {
		*self.labels.entry(pc).or_insert_with(|| {
			let label = Label::new(self.next_id);
			self.next_id += 1;
			label
		})
	}

	pub(crate) fn create(&mut self, pc: u16) -> Result<()> {
		self.get_or_create(pc).map(|_| ())
	}

	pub(crate) fn get_or_create(&mut self, pc: u16) -> Result<Label> {
		if pc >= self.code_length {
			bail!("bytecode offset {pc} out of bounds for code length {}", self.code_length);
		}
		Ok(self.entry(pc))
	}

	/// Like [`Labels::get_or_create`], but also allows the offset just after the last instruction.
	pub(crate) fn get_or_create_end(&mut self, pc: u16) -> Result<Label> {
		if pc > self.code_length {
			bail!("end bytecode offset {pc} out of bounds for code length {}", self.code_length);
		}
		Ok(self.entry(pc))
	}

	pub(crate) fn get_or_create_range(&mut self, start_pc: u16, length: u16) -> Result<LabelRange> {
		let end_pc = start_pc.checked_add(length)
			.with_context(|| anyhow!("range starting at {start_pc} with length {length} overflows"))?;
		Ok(LabelRange {
			start: self.get_or_create(start_pc)?,
			end: self.get_or_create_end(end_pc)?,
		})
	}

	pub(crate) fn try_get(&self, pc: u16) -> Result<Label> {
		self.get(pc).with_context(|| anyhow!("no label at bytecode offset {pc}"))
	}

	pub(crate) fn get(&self, pc: u16) -> Option<Label> {
		self.labels.get(&pc).copied()
	}

	pub(crate) fn len(&self) -> usize {
		self.labels.len()
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::class_reader::labels::Labels;
	use crate::tree::method::code::Label;

	#[test]
	fn labels_are_shared_per_offset() {
		let mut labels = Labels::new(10);
		assert_eq!(labels.get_or_create(3).unwrap(), Label::new(0));
		assert_eq!(labels.get_or_create(5).unwrap(), Label::new(1));
		assert_eq!(labels.get_or_create(3).unwrap(), Label::new(0));
		assert!(labels.get_or_create(10).is_err());
		assert_eq!(labels.get_or_create_range(5, 5).unwrap().end, Label::new(2));
		assert!(labels.try_get(7).is_err());
	}
}
