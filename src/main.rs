//! Converts the classes of a jar file so that they run on an older java version.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use dukelower::Release;
use crate::convert::Options;

mod convert;
mod manifest;
mod services;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
	/// Be verbose.
	#[arg(short = 'v', long = "verbose")]
	verbose: bool,

	/// The JDK to read the API of the target version from. Defaults to `$JAVA_HOME`.
	#[arg(long = "java")]
	java: Option<PathBuf>,

	/// The class path used for finding super classes, separated like the `PATH` environment variable.
	#[arg(long = "cp")]
	classpath: Option<OsString>,

	/// The java version to convert to.
	#[arg(long = "target")]
	target: Release,

	/// The jar file to convert.
	#[arg(long = "input")]
	input: PathBuf,

	/// Where to write the converted jar file. Replaces an existing file.
	#[arg(long = "output")]
	output: PathBuf,
}

fn setup_logging(verbose: bool) -> Result<()> {
	let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
	fern::Dispatch::new()
		.format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
		.level(level)
		.chain(std::io::stderr())
		.apply()
		.context("failed to set up logging")
}

fn main() -> Result<ExitCode> {
	let cli = Cli::parse();
	setup_logging(cli.verbose)?;

	let java = match cli.java {
		Some(java) => java,
		None => std::env::var_os("JAVA_HOME")
			.map(PathBuf::from)
			.context("no JDK given with --java, and JAVA_HOME is not set")?,
	};
	let classpath = cli.classpath
		.map(|classpath| std::env::split_paths(&classpath)
			.filter(|path| !path.as_os_str().is_empty())
			.collect())
		.unwrap_or_default();

	let options = Options {
		target: cli.target,
		input: cli.input,
		output: cli.output,
		java,
		classpath,
	};

	if convert::run(&options)? {
		info!("Done");
		Ok(ExitCode::SUCCESS)
	} else {
		error!("Symbol table match failed. The jar file was converted but relies on members not present in the target version.");
		Ok(ExitCode::from(1))
	}
}

#[cfg(test)]
mod testing {
	use clap::Parser;
	use pretty_assertions::assert_eq;
	use dukelower::Release;
	use crate::Cli;

	#[test]
	fn arguments() {
		let cli = Cli::try_parse_from(["dukedown", "--target", "1.8", "--input", "in.jar", "--output", "out.jar", "-v"]).unwrap();
		assert_eq!(cli.target, Release::JAVA_8);
		assert!(cli.verbose);
		assert_eq!(cli.java, None);

		assert!(Cli::try_parse_from(["dukedown", "--target", "7", "--input", "in.jar", "--output", "out.jar"]).is_err());
		assert!(Cli::try_parse_from(["dukedown", "--input", "in.jar", "--output", "out.jar"]).is_err());
	}
}
