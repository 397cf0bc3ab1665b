/// Creates a [String] like newtype over a `Cow<'static, str>`.
///
/// The type can be constructed in a `const` context with `from_static`, and from any [`String`] or [`&str`][str]
/// without checking any content. The optional `check = path;` line adds a `checked` constructor, which uses
/// the given function to validate the content.
macro_rules! make_string_like {
	(
		$( #[$doc:meta] )*
		$vis:vis $name:ident;
		$( check = $check:path; )?
	) => {
		$( #[$doc] )*
		#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
		$vis struct $name(std::borrow::Cow<'static, str>);

		impl $name {
			pub const fn from_static(s: &'static str) -> $name {
				$name(std::borrow::Cow::Borrowed(s))
			}

			pub fn as_str(&self) -> &str {
				&self.0
			}

			pub fn into_string(self) -> String {
				self.0.into_owned()
			}

			$(
				#[doc = concat!("Constructs a [`", stringify!($name), "`], checking the content with [`", stringify!($check), "`].")]
				pub fn checked(s: String) -> anyhow::Result<$name> {
					if $check(&s) {
						Ok($name(std::borrow::Cow::Owned(s)))
					} else {
						anyhow::bail!(concat!("invalid ", stringify!($name), ": {:?}"), s)
					}
				}
			)?
		}

		impl From<String> for $name {
			fn from(value: String) -> Self {
				$name(std::borrow::Cow::Owned(value))
			}
		}

		impl From<&str> for $name {
			fn from(value: &str) -> Self {
				$name(std::borrow::Cow::Owned(value.to_owned()))
			}
		}

		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}

		impl PartialEq<str> for $name {
			fn eq(&self, other: &str) -> bool {
				self.0 == other
			}
		}

		impl PartialEq<&str> for $name {
			fn eq(&self, other: &&str) -> bool {
				self.0 == *other
			}
		}

		impl std::fmt::Debug for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				write!(f, "{}({:?})", stringify!($name), self.0)
			}
		}

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(&self.0)
			}
		}
	}
}

/// Creates a flags struct with one `bool` per flag, together with conversions from and to the `u16` of the class file.
macro_rules! make_access_flags {
	(
		$( #[$doc:meta] )*
		$vis:vis $name:ident {
			$( $field:ident = $mask:literal, $text:literal; )*
		}
	) => {
		$( #[$doc] )*
		#[derive(Copy, Clone, Default, Hash, Eq, PartialEq)]
		$vis struct $name {
			$( pub $field: bool, )*
		}

		impl std::fmt::Debug for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(concat!(stringify!($name), " { "))?;
				$( if self.$field { f.write_str(concat!($text, " "))?; } )*
				f.write_str("}")
			}
		}

		impl From<u16> for $name {
			fn from(value: u16) -> Self {
				$name {
					$( $field: value & $mask != 0, )*
				}
			}
		}

		impl From<$name> for u16 {
			fn from(value: $name) -> Self {
				0 $( | (if value.$field { $mask } else { 0 }) )*
			}
		}
	}
}

pub(crate) use make_string_like;
pub(crate) use make_access_flags;
