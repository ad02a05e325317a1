//! Variant Manifest
//!
//! This is a rust implementation of the Android Variant Manifest Format.
//! Applications use this manifest to describe their Android projects, the
//! build variants of each project, and the signing identities the variants
//! can refer to.
//!
//! The manifest is a TOML file. Version `1` of the format looks like this:
//!
//! ```toml
//! version = 1
//!
//! [signing.upload]
//! store-file = "keys/upload.jks"
//! key-alias = "upload"
//! store-password-env = "UPLOAD_STORE_PASSWORD"
//! key-password-env = "UPLOAD_KEY_PASSWORD"
//!
//! [[project]]
//! id = "ledgerlite"
//! application-id = "com.example.ledgerlite"
//! compile-sdk = 36
//! min-sdk = 21
//! target-sdk = 34
//! desugaring = true
//! desugaring-version = "2.0.4"
//!
//! [project.variant.release]
//! minify = true
//! rules = ["platform:proguard-android-optimize.txt", "proguard-rules.pro"]
//! signing = "upload"
//! ```
//!
//! Every project implicitly declares the `debug` and `release` variants of
//! the Android build tools. Variant tables override them or add new
//! variants. The signing registry implicitly contains the `debug` identity
//! backed by the Android debug keystore, unless the manifest declares its
//! own `debug` identity.
//!
//! The manifest only verifies its own format. Project invariants, like the
//! ordering of SDK levels, are checked when variants are resolved.

use crate::descriptor;
use serde;
use toml;

/// Manifest Errors
///
/// This is the exhaustive list of possible errors raised when loading a
/// manifest. See each error for details.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading the manifest at the specified path failed.
    #[error("cannot read manifest {0:?}: {1}")]
    Read(std::ffi::OsString, #[source] std::io::Error),
    /// The manifest is not valid TOML or does not match the format.
    #[error("cannot parse manifest: {0}")]
    Syntax(#[source] toml::de::Error),
    /// The manifest version is not supported.
    #[error("unsupported manifest version {0}")]
    Version(u32),
    /// Specified key required but missing in manifest.
    #[error("manifest key '{0}' is required but missing")]
    MissingKey(String),
    /// Specified key has an invalid value.
    #[error("manifest key '{0}' has an invalid value")]
    InvalidKey(String),
    /// Two projects use the same identifier.
    #[error("manifest declares project '{0}' more than once")]
    DuplicateProject(String),
}

/// Raw Manifest Signing Table
///
/// Sub-type of `Raw` representing a single entry of the `signing` table.
/// Without `store-file`, the identity refers to the Android debug keystore.
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawSigning {
    /// Path to the keystore relative from the application module.
    pub store_file: Option<String>,
    /// Alias of the key in the keystore.
    pub key_alias: Option<String>,
    /// Name of the environment variable holding the store password.
    pub store_password_env: Option<String>,
    /// Name of the environment variable holding the key password.
    pub key_password_env: Option<String>,
    /// Either `development` or `release`.
    pub kind: Option<String>,
}

/// Raw Manifest Variant Table
///
/// Sub-type of `RawProject` representing a single build variant.
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawVariant {
    pub minify: Option<bool>,
    pub rules: Option<Vec<String>>,
    pub signing: Option<String>,
    pub debuggable: Option<bool>,
}

/// Raw Manifest Project Table
///
/// Sub-type of `Raw` representing a single entry of the `project` array.
/// The options are one-to-one mappings of their equivalents in the Android
/// Gradle Plugin.
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawProject {
    /// Identifier of the project within the manifest.
    pub id: String,

    pub application_id: Option<String>,
    pub namespace: Option<String>,

    pub compile_sdk: Option<u32>,
    pub min_sdk: Option<u32>,
    pub target_sdk: Option<u32>,

    pub version_code: Option<u32>,
    pub version_name: Option<String>,

    pub compile_level: Option<String>,
    pub source_level: Option<String>,
    pub target_level: Option<String>,

    pub desugaring: Option<bool>,
    pub desugaring_version: Option<String>,

    pub default_rules: Option<Vec<String>>,
    pub default_signing: Option<String>,

    #[serde(default)]
    pub variant: std::collections::BTreeMap<String, RawVariant>,
}

/// Raw Manifest Content
///
/// This type contains the raw manifest content as parsed by `toml` and
/// converted into rust types via `serde`.
///
/// Note that content of the type is not verified other than for syntactic
/// correctness required by the given types. Semantic correctness needs to
/// be verified by the caller.
#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Raw {
    /// Version of the manifest format. Only version `1` is currently
    /// supported.
    pub version: u32,

    /// Signing table mapping identity names to their credentials.
    #[serde(default)]
    pub signing: std::collections::BTreeMap<String, RawSigning>,
    /// Project table specifying all applications of the manifest.
    #[serde(default)]
    pub project: Vec<RawProject>,
}

/// Manifest Abstraction
///
/// This type represents a valid and verified manifest. The projects and the
/// signing registry are converted into the descriptor model.
pub struct Manifest {
    /// Project descriptors in manifest order.
    pub projects: Vec<descriptor::ProjectDescriptor>,
    /// Signing registry shared by all projects.
    pub registry: descriptor::SigningIdentityRegistry,
}

impl Raw {
    fn parse_str(content: &str) -> Result<Self, Error> {
        toml::from_str(content).map_err(Error::Syntax)
    }
}

// Check whether a string is a valid identifier
//
// This verifies that the given string consists of only alphanumeric
// characters plus `-`, `_`. Empty identifiers are rejected.
//
// Any unicode alpha/numeric character is allowed.
fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(
        |v| v.is_alphanumeric() || v == '-' || v == '_'
    )
}

// Check whether a string is a valid environment variable name
//
// Only ASCII alphanumerics and `_` are allowed, and the name must not start
// with a digit.
fn is_env_name(s: &str) -> bool {
    s.chars().next().map_or(false, |v| !v.is_ascii_digit())
        && s.chars().all(|v| v.is_ascii_alphanumeric() || v == '_')
}

// Check whether a string is a semantic version
//
// This accepts `MAJOR.MINOR.PATCH` with decimal components, optionally
// followed by a `-` or `+` suffix of ASCII alphanumerics, `.`, `-`, `+`.
fn is_version(s: &str) -> bool {
    let (core, suffix) = match s.find(|v: char| v == '-' || v == '+') {
        Some(i) => (&s[..i], Some(&s[i + 1..])),
        None => (s, None),
    };

    let parts: Vec<&str> = core.split('.').collect();

    parts.len() == 3
        && parts.iter().all(
            |v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit())
        )
        && suffix.map_or(true, |v| {
            !v.is_empty() && v.chars().all(
                |c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '+'
            )
        })
}

// Check whether a string contains no quotes or escapes
//
// This verifies that a string does not contain quotes or backslashes, nor
// any control characters.
//
// We use this as a simple way to guarantee that the strings can be
// interpolated into Gradle scripts and property files.
fn is_quotable(s: &str) -> bool {
    s.chars().all(
        |v| !v.is_control()
            && v != '\\'
            && v != '\''
            && v != '"'
    )
}

// Require a key to be present
fn require<T: Copy>(v: Option<T>, key: &str) -> Result<T, Error> {
    v.ok_or_else(|| Error::MissingKey(key.to_string()))
}

// Verify an optional string with the given predicate.
fn check(v: &Option<String>, key: &str, f: fn(&str) -> bool) -> Result<(), Error> {
    match v {
        Some(v) if !f(v) => Err(Error::InvalidKey(key.to_string())),
        _ => Ok(()),
    }
}

// Parse a language level, defaulting to the oldest level.
fn level(v: &Option<String>, key: &str) -> Result<descriptor::LanguageLevel, Error> {
    match v {
        None => Ok(descriptor::LanguageLevel::default()),
        Some(v) => v.parse().map_err(|_| Error::InvalidKey(key.to_string())),
    }
}

// Parse a list of rule sources. Every entry must be quotable and non-empty.
fn rules(v: &Option<Vec<String>>, key: &str) -> Result<Vec<descriptor::ShrinkingRuleSource>, Error> {
    let mut acc = Vec::new();

    for rule in v.iter().flatten() {
        let source = descriptor::ShrinkingRuleSource::parse(rule);
        if source.name().is_empty() || !is_quotable(rule) {
            return Err(Error::InvalidKey(key.to_string()));
        }
        acc.push(source);
    }

    Ok(acc)
}

// Parse a signing identity reference.
fn identity(v: &str, key: &str) -> Result<descriptor::SigningIdentityRef, Error> {
    if is_identifier(v) {
        Ok(descriptor::SigningIdentityRef::new(v))
    } else {
        Err(Error::InvalidKey(key.to_string()))
    }
}

impl RawSigning {
    /// Convert into a signing identity
    ///
    /// Identities without keystore refer to the Android debug keystore and
    /// default to the development kind. Identities with keystore must name
    /// their key alias and default to the release kind.
    pub fn identity(&self, name: &str) -> Result<descriptor::SigningIdentity, Error> {
        let key = |k: &str| format!("signing.{}.{}", name, k);

        check(&self.key_alias, &key("key-alias"), is_quotable)?;
        check(&self.store_password_env, &key("store-password-env"), is_env_name)?;
        check(&self.key_password_env, &key("key-password-env"), is_env_name)?;

        let kind = match &self.kind {
            None => None,
            Some(v) => Some(
                v.parse::<descriptor::IdentityKind>()
                    .map_err(|_| Error::InvalidKey(key("kind")))?
            ),
        };

        let (location, key_alias, kind) = match &self.store_file {
            None => (
                descriptor::KeystoreLocation::AndroidDebug,
                self.key_alias.clone().unwrap_or_else(|| descriptor::DEBUG_KEY_ALIAS.to_string()),
                kind.unwrap_or(descriptor::IdentityKind::Development),
            ),
            Some(path) => {
                if path.is_empty() || path.chars().any(|v| v.is_control()) {
                    return Err(Error::InvalidKey(key("store-file")));
                }
                (
                    descriptor::KeystoreLocation::File(path.into()),
                    self.key_alias.clone().ok_or_else(|| Error::MissingKey(key("key-alias")))?,
                    kind.unwrap_or(descriptor::IdentityKind::Release),
                )
            },
        };

        Ok(
            descriptor::SigningIdentity {
                location: location,
                key_alias: key_alias,
                store_password_env: self.store_password_env.clone(),
                key_password_env: self.key_password_env.clone(),
                kind: kind,
            }
        )
    }
}

impl RawVariant {
    /// Convert into a build variant
    ///
    /// Unset options are taken from `base`, which is the built-in variant of
    /// the same name, or the `release` variant for new names.
    pub fn variant(
        &self,
        project: &str,
        name: &str,
        base: descriptor::BuildVariant,
    ) -> Result<descriptor::BuildVariant, Error> {
        let key = |k: &str| format!("project.{}.variant.{}.{}", project, name, k);

        let signing = match &self.signing {
            None => base.signing,
            Some(v) => descriptor::SigningSelection::Declared(identity(v, &key("signing"))?),
        };

        Ok(
            descriptor::BuildVariant {
                rules: match self.rules {
                    None => base.rules,
                    Some(_) => rules(&self.rules, &key("rules"))?,
                },
                minify: self.minify.unwrap_or(base.minify),
                signing: signing,
                debuggable: self.debuggable.unwrap_or(base.debuggable),
            }
        )
    }
}

impl RawProject {
    /// Convert into a project descriptor
    ///
    /// Verify the format of all project options and convert them into a
    /// project descriptor. SDK levels are required, everything else has
    /// defaults.
    pub fn descriptor(&self) -> Result<descriptor::ProjectDescriptor, Error> {
        let key = |k: &str| format!("project.{}.{}", self.id, k);

        let application_id = self.application_id.clone()
            .ok_or_else(|| Error::MissingKey(key("application-id")))?;
        if application_id.is_empty() || !is_quotable(&application_id) {
            return Err(Error::InvalidKey(key("application-id")));
        }
        check(&self.namespace, &key("namespace"), is_quotable)?;
        check(&self.version_name, &key("version-name"), is_quotable)?;
        check(&self.desugaring_version, &key("desugaring-version"), is_version)?;

        let default_signing = match &self.default_signing {
            None => descriptor::SigningIdentityRef::default(),
            Some(v) => identity(v, &key("default-signing"))?,
        };

        let mut variants = std::collections::BTreeMap::new();
        variants.insert("debug".to_string(), descriptor::BuildVariant::debug());
        variants.insert("release".to_string(), descriptor::BuildVariant::release());
        for (name, raw) in self.variant.iter() {
            if !is_identifier(name) {
                return Err(Error::InvalidKey(format!("project.{}.variant.{}", self.id, name)));
            }
            let base = variants.remove(name).unwrap_or_else(descriptor::BuildVariant::release);
            variants.insert(name.clone(), raw.variant(&self.id, name, base)?);
        }

        Ok(
            descriptor::ProjectDescriptor {
                id: self.id.clone(),
                namespace: self.namespace.clone().unwrap_or_else(|| application_id.clone()),
                application_id: application_id,

                compile_level: level(&self.compile_level, &key("compile-level"))?,
                source_level: level(&self.source_level, &key("source-level"))?,
                target_level: level(&self.target_level, &key("target-level"))?,

                min_sdk: require(self.min_sdk, &key("min-sdk"))?,
                target_sdk: require(self.target_sdk, &key("target-sdk"))?,
                compile_sdk: require(self.compile_sdk, &key("compile-sdk"))?,

                version_code: self.version_code.unwrap_or(1),
                version_name: self.version_name.clone().unwrap_or_else(|| "1.0".to_string()),

                desugaring_enabled: self.desugaring.unwrap_or(false),
                desugaring_library_version: self.desugaring_version.clone(),

                default_rules: rules(&self.default_rules, &key("default-rules"))?,
                default_signing: default_signing,

                variants: variants,
            }
        )
    }
}

impl Manifest {
    /// Parse manifest from raw
    ///
    /// Take a raw representation of the manifest and perform post-parsing
    /// validation, ensuring the final manifest will not contain invalid
    /// entries.
    fn parse_raw(raw: Raw) -> Result<Self, Error> {
        // We only support version '1'. Any other version number is explicitly
        // defined to be incompatible, so fail parsing.
        //
        // Note that we do support unknown-fields. Hence, it is valid to add
        // more fields to version '1' without breaking backwards compatibility.
        // However, they will be silently ignored by older implementations.
        if raw.version != 1 {
            return Err(Error::Version(raw.version));
        }

        // The debug identity is always available, but can be overridden.
        let mut registry = descriptor::SigningIdentityRegistry::with_android_debug();
        for (name, signing) in raw.signing.iter() {
            if !is_identifier(name) {
                return Err(Error::InvalidKey(format!("signing.{}", name)));
            }
            registry.insert(
                descriptor::SigningIdentityRef::new(name),
                signing.identity(name)?,
            );
        }

        let mut projects: Vec<descriptor::ProjectDescriptor> = Vec::new();
        for project in raw.project.iter() {
            if !is_identifier(&project.id) {
                return Err(Error::InvalidKey(format!("project.{}", project.id)));
            }
            if projects.iter().any(|v| v.id == project.id) {
                return Err(Error::DuplicateProject(project.id.clone()));
            }
            projects.push(project.descriptor()?);
        }

        tracing::debug!(
            projects = projects.len(),
            identities = registry.len(),
            "loaded manifest"
        );

        Ok(
            Self {
                projects: projects,
                registry: registry,
            }
        )
    }

    /// Parse manifest from string
    ///
    /// Parse the given string as a literal manifest in TOML representation.
    /// Content is verified and invalid manifests are refused.
    pub fn parse_str(content: &str) -> Result<Self, Error> {
        Raw::parse_str(content).and_then(Self::parse_raw)
    }

    /// Parse manifest from file-system
    ///
    /// Open the specified file and parse it as a manifest. The content is
    /// verified and invalid manifests are refused. The file is completely
    /// parsed into memory and then closed again before the function returns.
    pub fn parse_path(path: &std::path::Path) -> Result<Self, Error> {
        std::fs::read_to_string(path)
            .map_err(|v| Error::Read(path.as_os_str().to_os_string(), v))
            .and_then(|v| Self::parse_str(&v))
    }

    /// Find project descriptor
    ///
    /// Return the descriptor of the project with the given ID. If no ID is
    /// given, the manifest must declare exactly one project, which is
    /// returned.
    pub fn project(&self, id: Option<&str>) -> Option<&descriptor::ProjectDescriptor> {
        match id {
            Some(id) => self.projects.iter().find(|v| v.id == id),
            None if self.projects.len() == 1 => self.projects.first(),
            None => None,
        }
    }
}
