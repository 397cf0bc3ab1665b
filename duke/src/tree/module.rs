use crate::macros::{make_access_flags, make_string_like};
use crate::tree::class::ClassName;

/// The contents of the `Module` attribute of a `module-info` class.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
	pub name: ModuleName,
	pub flags: ModuleFlags,
	pub version: Option<String>,

	pub requires: Vec<ModuleRequires>,
	pub exports: Vec<ModuleExports>,
	pub opens: Vec<ModuleOpens>,
	pub uses: Vec<ClassName>,
	pub provides: Vec<ModuleProvides>,
}

make_access_flags!(
	pub ModuleFlags {
		is_open      = 0x0010, "open";
		is_synthetic = 0x1000, "synthetic";
		is_mandated  = 0x8000, "mandated";
	}
);

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRequires {
	pub name: ModuleName,
	pub flags: ModuleRequiresFlags,
	pub version: Option<String>,
}

make_access_flags!(
	pub ModuleRequiresFlags {
		is_transitive   = 0x0020, "transitive";
		is_static_phase = 0x0040, "static-phase";
		is_synthetic    = 0x1000, "synthetic";
		is_mandated     = 0x8000, "mandated";
	}
);

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleExports {
	pub name: PackageName,
	pub flags: ModuleExportsFlags,
	pub exports_to: Vec<ModuleName>,
}

make_access_flags!(
	pub ModuleExportsFlags {
		is_synthetic = 0x1000, "synthetic";
		is_mandated  = 0x8000, "mandated";
	}
);

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleOpens {
	pub name: PackageName,
	pub flags: ModuleOpensFlags,
	pub opens_to: Vec<ModuleName>,
}

make_access_flags!(
	pub ModuleOpensFlags {
		is_synthetic = 0x1000, "synthetic";
		is_mandated  = 0x8000, "mandated";
	}
);

/// A `provides <service> with <implementations>` directive.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleProvides {
	pub name: ClassName,
	pub provides_with: Vec<ClassName>,
}

make_string_like!(
	pub ModuleName;
);

make_string_like!(
	/// A package name in internal form, like `java/lang`.
	pub PackageName;
);

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::tree::module::ModuleRequiresFlags;

	#[test]
	fn requires_flags() {
		let flags = ModuleRequiresFlags::from(0x8020);
		assert!(flags.is_transitive && flags.is_mandated);
		assert_eq!(format!("{flags:?}"), "ModuleRequiresFlags { transitive mandated }");
		assert_eq!(u16::from(flags), 0x8020);
	}
}
