//! Android Variant Tooling
//!
//! This is the entry-point of `android-variant`, a command-line tool to
//! resolve the build variants of Android applications. Its main input is the
//! `android-variant.toml` manifest, which describes the projects of an
//! application repository and the signing identities available to them.
//!
//! The CLI is mainly a dispatcher of the operations available in
//! `android_variant::op::*`. It is a simple clap-based CLI that forwards the
//! arguments to `android_variant` and prints the results to standard output.
//! Diagnostics go to standard error, and their verbosity is controlled via
//! `RUST_LOG`.

use android_variant::{descriptor, manifest, op};
use clap;

struct Cli {
    cmd: clap::Command,
}

fn arg_format(
    s: &str,
) -> Result<op::emit::Format, clap::error::Error> {
    s.parse().map_err(
        |_| {
            clap::error::Error::raw(
                clap::error::ErrorKind::ValueValidation,
                "Invalid output format, expected 'json' or 'properties'",
            )
        }
    )
}

fn arg_project() -> clap::Arg {
    clap::Arg::new("project")
        .long("project")
        .value_name("ID")
        .help("Project to operate on, optional if the manifest declares a single project")
}

impl Cli {
    fn new() -> Self {
        let mut cmd;

        cmd = clap::Command::new("android-variant")
            .propagate_version(true)
            .subcommand_required(true)
            .about("Android Variant Tooling")
            .long_about("Resolve and audit the build variants of Android applications")
            .version(clap::crate_version!());

        cmd = cmd.arg(
            clap::Arg::new("manifest")
                .long("manifest")
                .value_name("PATH")
                .help("Path to the variant manifest relative to the working directory")
                .default_value("./android-variant.toml")
                .value_parser(clap::builder::ValueParser::path_buf())
        );

        cmd = cmd.subcommand(
            clap::Command::new("resolve")
                .about("Resolve the effective build configuration of a variant")
                .arg(arg_project())
                .arg(
                    clap::Arg::new("variant")
                        .long("variant")
                        .value_name("NAME")
                        .help("Name of the build variant to resolve")
                        .required(true)
                )
                .arg(
                    clap::Arg::new("format")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Output format")
                        .default_value("json")
                        .value_parser(arg_format)
                )
                .arg(
                    clap::Arg::new("output")
                        .long("output")
                        .value_name("PATH")
                        .help("Write to the given file instead of standard output")
                        .value_parser(clap::builder::ValueParser::path_buf())
                )
        );

        cmd = cmd.subcommand(
            clap::Command::new("audit")
                .about("Report variants that rely on signing fallbacks or development keys")
                .arg(arg_project())
                .arg(
                    clap::Arg::new("strict")
                        .long("strict")
                        .help("Fail if the audit raises any finding")
                        .action(clap::ArgAction::SetTrue)
                )
        );

        cmd = cmd.subcommand(
            clap::Command::new("variants")
                .about("List the declared variants of a project")
                .arg(arg_project())
        );

        Self {
            cmd: cmd,
        }
    }

    fn manifest(
        &self,
        m: &clap::ArgMatches,
    ) -> Result<manifest::Manifest, u8> {
        let path: &std::path::PathBuf = m.get_one("manifest").expect("Manifest-flag lacks a value");

        manifest::Manifest::parse_path(path).map_err(
            |v| {
                eprintln!("Cannot load variant manifest: {}", v);
                1
            }
        )
    }

    fn project<'a>(
        &self,
        manifest: &'a manifest::Manifest,
        m_op: &clap::ArgMatches,
    ) -> Result<&'a descriptor::ProjectDescriptor, u8> {
        let id = m_op.get_one::<String>("project").map(|v| v.as_str());

        manifest.project(id).ok_or_else(
            || {
                match id {
                    Some(v) => eprintln!("Cannot find project '{}' in manifest", v),
                    None => eprintln!("Manifest declares {} projects, select one via '--project'", manifest.projects.len()),
                }
                1
            }
        )
    }

    fn op_resolve(
        &self,
        m: &clap::ArgMatches,
        m_op: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let manifest = self.manifest(m)?;
        let project = self.project(&manifest, m_op)?;
        let variant: &String = m_op.get_one("variant").expect("Variant-flag lacks a value");
        let format = *m_op.get_one("format").expect("Format-flag lacks a value");
        let output: Option<&std::path::PathBuf> = m_op.get_one("output");

        let config = op::resolve::resolve(project, variant, &manifest.registry).map_err(
            |v| {
                eprintln!("Cannot resolve build variant: {}", v);
                1
            }
        )?;

        let content = op::emit::render(&config, format).map_err(
            |v| {
                eprintln!("Cannot render build configuration: {}", v);
                1
            }
        )?;

        match output {
            None => {
                print!("{}", content);
                Ok(())
            },
            Some(path) => {
                op::emit::update_file(path, &content).map(|_| ()).map_err(
                    |v| {
                        eprintln!("Cannot write build configuration: {}", v);
                        1
                    }
                )
            },
        }
    }

    fn op_audit(
        &self,
        m: &clap::ArgMatches,
        m_op: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let manifest = self.manifest(m)?;
        let project = self.project(&manifest, m_op)?;
        let strict = m_op.get_flag("strict");

        let report = op::audit::audit(project, &manifest.registry).map_err(
            |v| {
                eprintln!("Cannot audit project: {}", v);
                1
            }
        )?;

        for config in report.configs.iter() {
            println!(
                "{}: identity '{}' ({}{})",
                config.variant,
                config.signing.identity,
                config.signing.credentials.kind.as_str(),
                if config.signing.fallback { ", fallback" } else { "" },
            );
        }
        for finding in report.findings.iter() {
            println!("finding: {}", finding);
        }

        if strict && !report.is_clean() {
            Err(1)
        } else {
            Ok(())
        }
    }

    fn op_variants(
        &self,
        m: &clap::ArgMatches,
        m_op: &clap::ArgMatches,
    ) -> Result<(), u8> {
        let manifest = self.manifest(m)?;
        let project = self.project(&manifest, m_op)?;

        for name in project.variant_names() {
            println!("{}", name);
        }

        Ok(())
    }

    fn run<I, T>(mut self, args: I) -> Result<(), u8>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let (m, r);

        r = self.cmd.try_get_matches_from_mut(args);

        match r {
            Ok(v) => m = v,
            Err(e) => {
                return match e.kind() {
                    clap::error::ErrorKind::DisplayHelp |
                    clap::error::ErrorKind::DisplayVersion => {
                        e.print().expect("Cannot write to STDERR");
                        Ok(())
                    },
                    _ => {
                        e.print().expect("Cannot write to STDERR");
                        Err(2)
                    }
                }
            }
        }

        match m.subcommand() {
            Some(("resolve", m_op)) => self.op_resolve(&m, m_op),
            Some(("audit", m_op)) => self.op_audit(&m, m_op),
            Some(("variants", m_op)) => self.op_variants(&m, m_op),
            _ => std::unreachable!(),
        }
    }
}

// Install the diagnostics subscriber
//
// Events are written to STDERR, filtered via `RUST_LOG` and defaulting to
// warnings only.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> std::process::ExitCode {
    init_tracing();

    match Cli::new().run(std::env::args_os()) {
        Ok(()) => 0.into(),
        Err(v) => v.into(),
    }
}
