use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use duke::CommonSuperClass;
use dukebox::{BasicFileAttributes, EnumJar, FileJar, Jar, JarEntry, JarEntryEnum, JarWriter, OpenedJar};
use dukelower::{ChainedLookup, ClassHierarchy, Converted, Converter, Diagnostics, JarLookup, Release, SymbolTable};
use crate::manifest::Manifest;
use crate::services::Services;

const MANIFEST: &str = "META-INF/MANIFEST.MF";
const MODULE_INFO: &str = "module-info.class";

#[derive(Debug)]
pub(crate) struct Options {
	pub(crate) target: Release,
	pub(crate) input: PathBuf,
	pub(crate) output: PathBuf,
	/// The JDK providing `lib/ct.sym` and `jmods/`.
	pub(crate) java: PathBuf,
	pub(crate) classpath: Vec<PathBuf>,
}

/// Converts the input jar, writing the output jar.
///
/// Returns `false` if some converted class references something the target release doesn't have. The output jar is
/// written anyway.
pub(crate) fn run(options: &Options) -> Result<bool> {
	info!("Building symbol table for java {}", options.target);
	let symbols = SymbolTable::open(&options.java, options.target)
		.with_context(|| anyhow!("failed to load the symbol table from {:?}", options.java))?;
	let diagnostics = Diagnostics::new();

	let classpath: Vec<EnumJar> = options.classpath.iter()
		.filter(|path| {
			let exists = path.exists();
			if !exists {
				warn!("Class path entry {path:?} doesn't exist, ignoring it");
			}
			exists
		})
		.map(|path| EnumJar::from_path(path))
		.collect();

	info!("Reading input {:?}", options.input);
	let input = FileJar::new(&options.input);
	let mut opened = input.open()?;
	let manifest = read_manifest(&mut opened)?;

	let mut lookup = ChainedLookup::new().with(JarLookup::new(input.open()?));
	for jar in &classpath {
		let opened = jar.open()?;
		lookup.push(match jar {
			EnumJar::Jmod(_) => JarLookup::jmod(opened),
			_ => JarLookup::new(opened),
		});
	}
	lookup.push(&symbols);
	let hierarchy = ClassHierarchy::new(lookup, &diagnostics);

	let converter = Converter::new(options.target, &diagnostics).with_symbols(&symbols);

	// an existing output is only replaced once the new one is complete
	let partial = partial_path(&options.output);
	let passed = write_jar(&partial, |writer| convert_jar(&mut opened, manifest, writer, &converter, &hierarchy))?;
	std::fs::rename(&partial, &options.output)
		.with_context(|| anyhow!("failed to move {partial:?} to {:?}", options.output))?;

	let findings = diagnostics.findings();
	debug!("{} diagnostics reported", findings.len());
	Ok(passed)
}

/// The file next to `output` the jar is written to first.
fn partial_path(output: &Path) -> PathBuf {
	let mut name = output.file_name().map(OsString::from).unwrap_or_default();
	name.push(".part");
	output.with_file_name(name)
}

/// Creates the file and lets `write` fill it with a jar. If that fails, the file is removed again.
fn write_jar(path: &Path, write: impl FnOnce(JarWriter<BufWriter<File>>) -> Result<(BufWriter<File>, bool)>) -> Result<bool> {
	let result = File::create(path)
		.with_context(|| anyhow!("failed to create output {path:?}"))
		.and_then(|file| write(JarWriter::new(BufWriter::new(file))))
		.and_then(|(writer, passed)| {
			writer.into_inner()
				.map_err(|e| e.into_error())
				.with_context(|| anyhow!("failed to write output {path:?}"))?;
			Ok(passed)
		});
	if result.is_err() && path.exists() {
		if let Err(e) = std::fs::remove_file(path) {
			warn!("Failed to remove the partially written {path:?}: {e}");
		}
	}
	result
}

/// Reads the manifest of the jar, if there's one.
pub(crate) fn read_manifest(input: &mut impl OpenedJar) -> Result<Manifest> {
	let manifest = match input.read_file(MANIFEST)? {
		Some(data) => Manifest::parse(&data).context("failed to read the manifest")?,
		None => Manifest::default(),
	};
	if manifest.is_multi_release() {
		bail!("Can't process multi-release jars.");
	}
	Ok(manifest)
}

/// Writes the manifest, then converts or copies each entry of the input, and finally writes the service listings.
///
/// When converting to java 8, the `module-info.class` is dropped. Its module name, main class and provided services
/// go into the manifest and the service listings instead.
pub(crate) fn convert_jar<W: Write + Seek>(
	input: &mut impl OpenedJar,
	mut manifest: Manifest,
	mut output: JarWriter<W>,
	converter: &Converter,
	hierarchy: &impl CommonSuperClass,
) -> Result<(W, bool)> {
	let mut services = (converter.target() < Release::JAVA_9).then(Services::default);

	if let Some(services) = &mut services {
		if let Some(data) = input.read_file(MODULE_INFO)? {
			apply_module_info(&data, &mut manifest, services)
				.with_context(|| anyhow!("failed to read {MODULE_INFO}"))?;
		}
	}

	output.write_file(MANIFEST, &manifest.to_bytes(), BasicFileAttributes::default())?;

	let mut passed = true;
	let keys: Vec<_> = input.entry_keys().collect();
	for key in keys {
		let entry = input.by_entry_key(key)?;
		let name = entry.name().to_owned();
		let attrs = entry.attrs();
		if name == MANIFEST {
			continue;
		}

		let data = match entry.to_jar_entry_enum().with_context(|| anyhow!("failed to read {name:?}"))? {
			JarEntryEnum::Dir => {
				output.add_directory(&name, attrs)?;
				continue;
			},
			JarEntryEnum::Class(data) | JarEntryEnum::Other(data) => data,
		};

		if let Some(services) = &mut services {
			if name == MODULE_INFO {
				continue;
			}
			if let Some(service) = Services::service_of(&name) {
				let listing = std::str::from_utf8(&data)
					.with_context(|| anyhow!("service listing {name:?} is not UTF-8"))?;
				services.add_listing(service, listing);
				continue;
			}
		}

		let file_name = name.rsplit('/').next().unwrap_or(&name);
		if file_name.ends_with(".class") && file_name != MODULE_INFO {
			match converter.convert_bytes(&data, hierarchy).with_context(|| anyhow!("failed to convert {name:?}"))? {
				Converted::Unchanged => output.write_file(&name, &data, attrs)?,
				Converted::Rewritten { bytes, passed_check } => {
					passed &= passed_check;
					output.write_file(&name, &bytes, attrs)?;
				},
			}
		} else {
			output.write_file(&name, &data, attrs)?;
		}
	}

	if let Some(services) = &services {
		for (name, listing) in services.files() {
			debug!("Writing service listing {name:?}");
			output.write_file(&name, listing.as_bytes(), BasicFileAttributes::default())?;
		}
	}

	Ok((output.finish()?, passed))
}

fn apply_module_info(data: &[u8], manifest: &mut Manifest, services: &mut Services) -> Result<()> {
	let class = duke::read_class_from_slice(data)?;
	let Some(module) = &class.module else {
		bail!("{MODULE_INFO} has no module attribute");
	};

	info!("Replacing module {} with an automatic module", module.name);
	manifest.insert("Automatic-Module-Name", module.name.as_str());
	if let Some(main_class) = &class.module_main_class {
		if !manifest.contains("Main-Class") {
			manifest.insert("Main-Class", main_class.to_binary_name());
		}
	}
	for provides in &module.provides {
		for provider in &provides.provides_with {
			services.add(provides.name.to_binary_name(), provider.to_binary_name());
		}
	}
	Ok(())
}
