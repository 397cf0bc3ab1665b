use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;

/// The maximum length of a line in a manifest, in bytes, not counting the line break.
const LINE_LENGTH: usize = 72;

const MANIFEST_VERSION: &str = "Manifest-Version";

/// A `META-INF/MANIFEST.MF` file.
///
/// Attribute names are compared ignoring ASCII case. The order of the attributes is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Manifest {
	main: IndexMap<String, String>,
	sections: Vec<IndexMap<String, String>>,
}

impl Manifest {
	pub(crate) fn parse(data: &[u8]) -> Result<Manifest> {
		let text = std::str::from_utf8(data).context("manifest is not UTF-8")?;

		let mut manifest = Manifest::default();
		let mut in_main = true;
		let mut section: IndexMap<String, String> = IndexMap::new();
		let mut last_key: Option<String> = None;

		for (number, line) in text.split('\n').enumerate() {
			let line = line.strip_suffix('\r').unwrap_or(line);

			if line.is_empty() {
				if in_main {
					manifest.main = std::mem::take(&mut section);
					in_main = false;
				} else if !section.is_empty() {
					manifest.sections.push(std::mem::take(&mut section));
				}
				last_key = None;
				continue;
			}

			if let Some(continuation) = line.strip_prefix(' ') {
				let value = last_key.as_ref()
					.and_then(|key| section.get_mut(key))
					.with_context(|| anyhow!("continuation line {} of manifest has nothing to continue", number + 1))?;
				value.push_str(continuation);
				continue;
			}

			let Some((key, value)) = line.split_once(": ") else {
				bail!("invalid line {} of manifest: {line:?}", number + 1);
			};
			section.insert(key.to_owned(), value.to_owned());
			last_key = Some(key.to_owned());
		}

		if in_main {
			manifest.main = section;
		} else if !section.is_empty() {
			manifest.sections.push(section);
		}
		Ok(manifest)
	}

	/// Gets a main attribute.
	pub(crate) fn get(&self, key: &str) -> Option<&str> {
		self.main.iter()
			.find(|(k, _)| k.eq_ignore_ascii_case(key))
			.map(|(_, v)| v.as_str())
	}

	pub(crate) fn contains(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	/// Sets a main attribute, replacing the value of an existing one.
	pub(crate) fn insert(&mut self, key: &str, value: impl Into<String>) {
		match self.main.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
			Some((_, v)) => *v = value.into(),
			None => {
				self.main.insert(key.to_owned(), value.into());
			},
		}
	}

	pub(crate) fn is_multi_release(&self) -> bool {
		self.get("Multi-Release").is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
	}

	/// Writes the manifest, with `Manifest-Version` as the first attribute and lines broken at 72 bytes.
	pub(crate) fn to_bytes(&self) -> Vec<u8> {
		let mut out = String::new();

		write_attribute(&mut out, MANIFEST_VERSION, self.get(MANIFEST_VERSION).unwrap_or("1.0"));
		for (key, value) in &self.main {
			if !key.eq_ignore_ascii_case(MANIFEST_VERSION) {
				write_attribute(&mut out, key, value);
			}
		}
		out.push_str("\r\n");

		for section in &self.sections {
			for (key, value) in section {
				write_attribute(&mut out, key, value);
			}
			out.push_str("\r\n");
		}

		out.into_bytes()
	}
}

fn write_attribute(out: &mut String, key: &str, value: &str) {
	let line = format!("{key}: {value}");
	let mut rest = line.as_str();
	// continuation lines start with a space
	let mut limit = LINE_LENGTH;
	while rest.len() > limit {
		let mut at = limit;
		while !rest.is_char_boundary(at) {
			at -= 1;
		}
		let (head, tail) = rest.split_at(at);
		out.push_str(head);
		out.push_str("\r\n ");
		rest = tail;
		limit = LINE_LENGTH - 1;
	}
	out.push_str(rest);
	out.push_str("\r\n");
}
