use std::collections::HashMap;
use anyhow::{anyhow, Context, Result};
use crate::tree::method::code::{Label, LabelRange};

/// Keeps track of the bytecode offsets of [`Label`]s and of instructions during one attempt of writing the code.
pub(crate) struct Labels {
	/// The bytecode offset of each instruction, indexed by the position in the instruction list.
	offsets: Vec<u16>,
	labels: HashMap<Label, u16>,
}

impl Labels {
	pub(crate) fn new() -> Labels {
		Labels {
			offsets: Vec::new(),
			labels: HashMap::new(),
		}
	}

	/// Records the next instruction, which starts at `opcode_pos`.
	pub(crate) fn add_instruction(&mut self, label: Option<Label>, opcode_pos: u16) {
		self.offsets.push(opcode_pos);
		if let Some(label) = label {
			self.labels.insert(label, opcode_pos);
		}
	}

	pub(crate) fn add_label(&mut self, label: Label, opcode_pos: u16) {
		self.labels.insert(label, opcode_pos);
	}

	pub(crate) fn get(&self, target: &Label) -> Option<u16> {
		self.labels.get(target).copied()
	}

	pub(crate) fn try_get(&self, target: &Label) -> Result<u16> {
		self.get(target).with_context(|| anyhow!("no bytecode offset for label {target:?}"))
	}

	/// Returns the start offset and the length of the range.
	pub(crate) fn try_get_range(&self, range: &LabelRange) -> Result<(u16, u16)> {
		let start = self.try_get(&range.start)?;
		let end = self.try_get(&range.end)?;
		let length = end.checked_sub(start)
			.with_context(|| anyhow!("range {range:?} ends before it starts"))?;
		Ok((start, length))
	}

	/// The bytecode offset of the instruction with the given index, or the code length for the index after the last one.
	pub(crate) fn offset_of(&self, instruction_index: usize, code_length: u16) -> u16 {
		self.offsets.get(instruction_index).copied().unwrap_or(code_length)
	}

	pub(crate) fn next_attempt(&mut self) {
		self.offsets.clear();
		self.labels.clear();
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::class_writer::labels::Labels;
	use crate::tree::method::code::{Label, LabelRange};

	#[test]
	fn offsets() {
		let mut labels = Labels::new();
		labels.add_instruction(None, 0);
		labels.add_instruction(Some(Label::new(3)), 1);
		labels.add_label(Label::new(4), 5);

		assert_eq!(labels.offset_of(1, 5), 1);
		assert_eq!(labels.offset_of(2, 5), 5);
		assert_eq!(labels.try_get_range(&LabelRange { start: Label::new(3), end: Label::new(4) }).unwrap(), (1, 4));
		assert!(labels.try_get_range(&LabelRange { start: Label::new(4), end: Label::new(3) }).is_err());

		labels.next_attempt();
		assert_eq!(labels.get(&Label::new(3)), None);
	}
}
