//! Resolved Configuration Emission
//!
//! The `emit` operation renders an effective build configuration for the
//! packaging tools. Two formats are supported: JSON, and Gradle project
//! properties suitable for `gradle.properties` or `--project-prop`.

use crate::descriptor;

/// Emit Errors
///
/// This is the exhaustive list of possible errors raised by the emit
/// operation. See each error for details.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serializing the configuration failed.
    #[error("cannot serialize resolved configuration: {0}")]
    Serialize(#[source] serde_json::Error),
    /// Updating the file at the specified path failed with the given error.
    #[error("cannot update {0:?}: {1}")]
    FileUpdate(std::ffi::OsString, #[source] std::io::Error),
}

/// Output Format
///
/// It implements `FromStr` to allow creation from string representation. Use
/// `as_str()` to get a static string-representation back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Properties,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Properties => "properties",
        }
    }
}

// Parse formats case-insensitively.
impl std::str::FromStr for Format {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("json") {
            Ok(Format::Json)
        } else if s.eq_ignore_ascii_case("properties") {
            Ok(Format::Properties)
        } else {
            Err(())
        }
    }
}

/// Prefix of all emitted Gradle properties.
pub const PROPERTY_PREFIX: &str = "android.variant";

// Escape a property value
//
// Gradle reads property files via `java.util.Properties`, which treats `\`
// as escape character, strips leading whitespace of values, and decodes the
// file as ISO-8859-1. Hence, backslashes and line terminators are escaped,
// leading spaces are protected, and everything outside of printable ASCII
// is written as `\uXXXX` UTF-16 code units.
fn escape_property_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());

    for (i, c) in value.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            ' ' if i == 0 => out.push_str("\\ "),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units).iter() {
                    out.push_str(&format!("\\u{:04X}", unit));
                }
            },
        }
    }

    out
}

// Append a Gradle `KEY=VALUE` line. Keys are fixed ASCII names, values are
// escaped.
fn push_property(
    out: &mut String,
    key: &str,
    value: &dyn std::fmt::Display,
) {
    out.push_str(PROPERTY_PREFIX);
    out.push('.');
    out.push_str(key);
    out.push('=');
    out.push_str(&escape_property_value(&value.to_string()));
    out.push('\n');
}

// Render Gradle project properties
//
// Every scalar field becomes one `android.variant.<key>` line. Rule sources
// are numbered to keep their order, and their count is emitted first so
// consumers know the length of the list. Optional values are
// left out if unset.
fn render_properties(config: &descriptor::EffectiveBuildConfig) -> String {
    let mut out = String::new();

    out.push_str("# Generated by android-variant\n");

    push_property(&mut out, "project", &config.project);
    push_property(&mut out, "name", &config.variant);
    push_property(&mut out, "applicationId", &config.application_id);
    push_property(&mut out, "namespace", &config.namespace);
    push_property(&mut out, "versionCode", &config.version_code);
    push_property(&mut out, "versionName", &config.version_name);

    push_property(&mut out, "compileSdk", &config.compile_sdk);
    push_property(&mut out, "minSdk", &config.min_sdk);
    push_property(&mut out, "targetSdk", &config.target_sdk);

    push_property(&mut out, "jvmTarget", &config.compile_level);
    push_property(&mut out, "sourceCompatibility", &config.source_level);
    push_property(&mut out, "targetCompatibility", &config.target_level);

    push_property(&mut out, "coreLibraryDesugaring", &config.desugaring_enabled);
    if let Some(v) = &config.desugaring_library {
        push_property(&mut out, "coreLibraryDesugaringLibrary", v);
    }

    push_property(&mut out, "minifyEnabled", &config.minify);
    push_property(&mut out, "debuggable", &config.debuggable);
    push_property(&mut out, "proguardFiles", &config.rules.len());
    for (i, rule) in config.rules.iter().enumerate() {
        push_property(&mut out, &format!("proguardFiles.{}", i), rule);
    }

    let signing = &config.signing;
    push_property(&mut out, "signing.identity", &signing.identity);
    push_property(&mut out, "signing.fallback", &signing.fallback);
    push_property(&mut out, "signing.kind", &signing.credentials.kind.as_str());
    match &signing.credentials.location {
        descriptor::KeystoreLocation::AndroidDebug => {
            push_property(&mut out, "signing.storeKind", &"android-debug");
        },
        descriptor::KeystoreLocation::File(v) => {
            push_property(&mut out, "signing.storeKind", &"file");
            push_property(&mut out, "signing.storeFile", &v.display());
        },
    }
    push_property(&mut out, "signing.keyAlias", &signing.credentials.key_alias);
    if let Some(v) = &signing.credentials.store_password_env {
        push_property(&mut out, "signing.storePasswordEnv", v);
    }
    if let Some(v) = &signing.credentials.key_password_env {
        push_property(&mut out, "signing.keyPasswordEnv", v);
    }

    out
}

/// Render configuration
///
/// Render the effective build configuration in the requested format. The
/// output always ends with a newline.
pub fn render(
    config: &descriptor::EffectiveBuildConfig,
    format: Format,
) -> Result<String, Error> {
    match format {
        Format::Json => {
            let mut v = serde_json::to_string_pretty(config).map_err(Error::Serialize)?;
            v.push('\n');
            Ok(v)
        },
        Format::Properties => Ok(render_properties(config)),
    }
}

/// Update a file if required
///
/// This writes the given content to the specified file, but only if the file
/// content does not already match the new content. Thus, the file timestamp
/// is only modified if the content really changed, and builds depending on
/// the file are not needlessly invalidated.
///
/// Note that this reads in the entire file content. Thus, use it only on
/// trusted content.
pub fn update_file(
    path: &std::path::Path,
    content: &str,
) -> Result<bool, Error> {
    let error = |v: std::io::Error| Error::FileUpdate(path.as_os_str().to_os_string(), v);

    // Open the file read+write and create it if it does not exist, yet.
    // A newly created file always counts as updated, even if the content is
    // empty.
    let (mut f, created) = match std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(v) => (v, true),
        Err(v) if v.kind() == std::io::ErrorKind::AlreadyExists => {
            let v = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(error)?;
            (v, false)
        },
        Err(v) => return Err(error(v)),
    };

    // Read the entire file content into memory. Compare raw bytes, so files
    // with invalid UTF-8 are simply replaced.
    let mut old = Vec::new();
    <std::fs::File as std::io::Read>::read_to_end(&mut f, &mut old)
        .map_err(error)?;

    if old == content.as_bytes() {
        return Ok(created);
    }

    // Rewind the position, truncate the file and write the new contents.
    <std::fs::File as std::io::Seek>::rewind(&mut f).map_err(error)?;
    f.set_len(0).map_err(error)?;
    <std::fs::File as std::io::Write>::write_all(&mut f, content.as_bytes())
        .map_err(error)?;

    // Sync the file now to ensure errors are caught properly.
    f.sync_all().map_err(error)?;

    tracing::debug!(path = %path.display(), "updated output file");

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::resolve;

    fn release() -> descriptor::EffectiveBuildConfig {
        resolve::resolve(
            &resolve::tests::ledgerlite(),
            "release",
            &descriptor::SigningIdentityRegistry::with_android_debug(),
        ).unwrap()
    }

    // Verify format parsing
    #[test]
    fn format_parse() {
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("Properties".parse::<Format>().unwrap(), Format::Properties);
        assert!("yaml".parse::<Format>().is_err());
        assert_eq!(Format::Properties.as_str().parse::<Format>().unwrap(), Format::Properties);
    }

    // Render Gradle properties
    //
    // Rule sources must be numbered in order, and the fallback flag must be
    // visible.
    #[test]
    fn render_properties_release() {
        let s = render(&release(), Format::Properties).unwrap();
        let lines: Vec<&str> = s.lines().collect();

        assert!(lines.contains(&"android.variant.applicationId=com.example.ledgerlite"));
        assert!(lines.contains(&"android.variant.jvmTarget=1.8"));
        assert!(lines.contains(&"android.variant.minifyEnabled=true"));
        assert!(lines.contains(&"android.variant.coreLibraryDesugaringLibrary=com.android.tools:desugar_jdk_libs:2.0.4"));
        assert!(lines.contains(&"android.variant.proguardFiles=2"));
        assert!(lines.contains(&"android.variant.proguardFiles.0=platform:proguard-android-optimize.txt"));
        assert!(lines.contains(&"android.variant.proguardFiles.1=proguard-rules.pro"));
        assert!(lines.contains(&"android.variant.signing.identity=debug"));
        assert!(lines.contains(&"android.variant.signing.fallback=true"));
        assert!(lines.contains(&"android.variant.signing.storeKind=android-debug"));
        assert!(!s.contains("signing.storeFile"));
        assert!(!s.contains("signing.storePasswordEnv"));
        assert!(s.ends_with('\n'));
    }

    // Render JSON
    //
    // Parse the output back as generic JSON and check the fields consumers
    // rely on.
    #[test]
    fn render_json_release() {
        let s = render(&release(), Format::Json).unwrap();
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();

        assert_eq!(v["variant"], "release");
        assert_eq!(v["minify"], true);
        assert_eq!(v["compile-level"], "1.8");
        assert_eq!(v["rules"][0]["kind"], "platform");
        assert_eq!(v["rules"][0]["name"], "proguard-android-optimize.txt");
        assert_eq!(v["rules"][1]["kind"], "project");
        assert_eq!(v["signing"]["identity"], "debug");
        assert_eq!(v["signing"]["fallback"], true);
        assert_eq!(v["signing"]["credentials"]["kind"], "development");
    }

    // Verify files are only rewritten if their content changes.
    #[test]
    fn update_file_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variant.properties");

        assert!(update_file(&path, "a=1\n").unwrap());
        assert!(!update_file(&path, "a=1\n").unwrap());
        assert!(update_file(&path, "a=2\n").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a=2\n");

        assert!(update_file(&path, "").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    // Verify creating a file counts as update, even with empty content.
    #[test]
    fn update_file_create_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.properties");

        assert!(update_file(&path, "").unwrap());
        assert!(path.is_file());
        assert!(!update_file(&path, "").unwrap());
    }

    // Verify property values are escaped for `java.util.Properties`
    //
    // Backslashes must survive loading, leading spaces must not be stripped,
    // and non-ASCII text is written as UTF-16 escapes.
    #[test]
    fn escape_property_values() {
        assert_eq!(escape_property_value("proguard-rules.pro"), "proguard-rules.pro");
        assert_eq!(escape_property_value("C:\\keys\\upload.jks"), "C:\\\\keys\\\\upload.jks");
        assert_eq!(escape_property_value(" a b"), "\\ a b");
        assert_eq!(escape_property_value("1.0-\u{df}"), "1.0-\\u00DF");
        assert_eq!(escape_property_value("\u{1f600}"), "\\uD83D\\uDE00");
        assert_eq!(escape_property_value("a\tb\n"), "a\\tb\\n");
    }

    // Render a file-backed identity with a Windows path and a non-ASCII
    // version name
    //
    // The keystore kind is emitted separately from its path, so a file named
    // like the debug keystore marker cannot be mistaken for it.
    #[test]
    fn render_properties_escaped() {
        let mut config = release();
        config.version_name = "1.0-\u{df}".to_string();
        config.signing.credentials = descriptor::SigningIdentity {
            location: descriptor::KeystoreLocation::File("C:\\keys\\upload.jks".into()),
            key_alias: "upload".to_string(),
            store_password_env: None,
            key_password_env: None,
            kind: descriptor::IdentityKind::Release,
        };

        let s = render(&config, Format::Properties).unwrap();
        let lines: Vec<&str> = s.lines().collect();

        assert!(lines.contains(&"android.variant.versionName=1.0-\\u00DF"));
        assert!(lines.contains(&"android.variant.signing.storeKind=file"));
        assert!(lines.contains(&"android.variant.signing.storeFile=C:\\\\keys\\\\upload.jks"));
        assert!(s.is_ascii());

        config.signing.credentials.location = descriptor::KeystoreLocation::File("android-debug".into());
        let s = render(&config, Format::Properties).unwrap();
        assert!(s.contains("android.variant.signing.storeKind=file\n"));
        assert!(s.contains("android.variant.signing.storeFile=android-debug\n"));
    }
}
