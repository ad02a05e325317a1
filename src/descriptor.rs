//! Project Descriptor Model
//!
//! This module contains the in-memory model of Android application build
//! descriptors, the signing-identity registry, and the resolved per-variant
//! build configuration. The types carry no behavior beyond simple accessors.
//! Verification of their invariants is left to the operations in
//! `crate::op`.

use serde;

/// Name of the default signing identity
///
/// Variants that do not name a signing identity are signed with the default
/// identity of their project. Unless configured otherwise, this is the
/// Android development identity, registered under this name.
pub const DEFAULT_SIGNING_IDENTITY: &str = "debug";

/// Key alias of the Android debug keystore
pub const DEBUG_KEY_ALIAS: &str = "androiddebugkey";

/// Maven coordinate of the core library desugaring artifacts, without the
/// version.
pub const DESUGARING_LIBRARY: &str = "com.android.tools:desugar_jdk_libs";

/// Language Level
///
/// Java language compatibility tiers supported by the Android build tools.
/// The enum is ordered from oldest to newest, so levels can be compared.
/// It implements `FromStr` to allow creation from string representation. Use
/// `as_str()` to get a static string-representation back.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum LanguageLevel {
    V1_8,
    V11,
    V17,
    V21,
}

impl LanguageLevel {
    /// Get string representation
    ///
    /// Return the string representation of the language level, as used by
    /// `jvmTarget` of the Kotlin compiler. This is guaranteed to be parsable
    /// by the `FromStr` implementation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageLevel::V1_8 => "1.8",
            LanguageLevel::V11 => "11",
            LanguageLevel::V17 => "17",
            LanguageLevel::V21 => "21",
        }
    }
}

impl Default for LanguageLevel {
    fn default() -> Self {
        LanguageLevel::V1_8
    }
}

impl std::fmt::Display for LanguageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Parse language levels from strings
//
// Accepts the plain numeric spelling (`1.8`, `8`, `11`, ...) as well as the
// Gradle spelling (`VERSION_1_8`, `JavaVersion.VERSION_11`, ...).
impl std::str::FromStr for LanguageLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("JavaVersion.").unwrap_or(s);
        let s = s.strip_prefix("VERSION_").unwrap_or(s);

        match s.replace('_', ".").as_str() {
            "1.8" | "8" => Ok(LanguageLevel::V1_8),
            "11" => Ok(LanguageLevel::V11),
            "17" => Ok(LanguageLevel::V17),
            "21" => Ok(LanguageLevel::V21),
            _ => Err(()),
        }
    }
}

impl serde::Serialize for LanguageLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Shrinking Rule Source
///
/// Identifies a single file of code-shrinking rules. Platform sources refer
/// to the default rule files shipped with the Android build tools (what
/// Gradle calls `getDefaultProguardFile()`), project sources refer to rule
/// files of the application module.
#[derive(Clone, Debug, Hash, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "kebab-case")]
pub enum ShrinkingRuleSource {
    Platform(String),
    Project(String),
}

impl ShrinkingRuleSource {
    /// Prefix marking platform sources in their string representation.
    pub const PLATFORM_PREFIX: &'static str = "platform:";

    /// Parse rule source
    ///
    /// Parse a rule source from its string representation. Strings prefixed
    /// with `platform:` denote platform sources, everything else is taken as
    /// the path to a project source.
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix(Self::PLATFORM_PREFIX) {
            Some(v) => ShrinkingRuleSource::Platform(v.to_string()),
            None => ShrinkingRuleSource::Project(s.to_string()),
        }
    }

    /// Return the file name or path of the source, without kind prefix.
    pub fn name(&self) -> &str {
        match self {
            ShrinkingRuleSource::Platform(v) => v,
            ShrinkingRuleSource::Project(v) => v,
        }
    }
}

impl std::fmt::Display for ShrinkingRuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShrinkingRuleSource::Platform(v) => write!(f, "{}{}", Self::PLATFORM_PREFIX, v),
            ShrinkingRuleSource::Project(v) => f.write_str(v),
        }
    }
}

/// Signing Identity Reference
///
/// Name of a signing identity in a `SigningIdentityRegistry`. The reference
/// never carries key material.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct SigningIdentityRef(String);

impl SigningIdentityRef {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SigningIdentityRef {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNING_IDENTITY)
    }
}

impl std::fmt::Display for SigningIdentityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signing Selection
///
/// Selects the signing identity of a variant. Either the variant names an
/// identity explicitly, or it uses the default identity of its project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SigningSelection {
    Declared(SigningIdentityRef),
    Default,
}

/// Build Variant
///
/// Configuration of a single named build variant, corresponding to a Gradle
/// `buildTypes` entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildVariant {
    /// Shrinking rule sources in declaration order.
    pub rules: Vec<ShrinkingRuleSource>,
    /// Whether code shrinking and obfuscation is enabled.
    pub minify: bool,
    /// Signing identity used for the variant.
    pub signing: SigningSelection,
    /// Whether the package is marked debuggable.
    pub debuggable: bool,
}

impl BuildVariant {
    /// Built-in `debug` variant as predefined by the Android build tools.
    pub fn debug() -> Self {
        Self {
            rules: Vec::new(),
            minify: false,
            signing: SigningSelection::Default,
            debuggable: true,
        }
    }

    /// Built-in `release` variant as predefined by the Android build tools.
    pub fn release() -> Self {
        Self {
            rules: Vec::new(),
            minify: false,
            signing: SigningSelection::Default,
            debuggable: false,
        }
    }
}

/// Project Descriptor
///
/// Static build description of a single Android application. Descriptors
/// are immutable once loaded. Several descriptors can coexist, each
/// describing an independent application.
///
/// The descriptor is not verified on construction. `op::resolve::validate()`
/// checks its invariants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectDescriptor {
    /// Local identifier of the project.
    pub id: String,
    /// Globally unique application identifier.
    pub application_id: String,
    /// Namespace of the generated `R` and `BuildConfig` classes.
    pub namespace: String,

    /// Kotlin `jvmTarget`.
    pub compile_level: LanguageLevel,
    /// Java `sourceCompatibility`.
    pub source_level: LanguageLevel,
    /// Java `targetCompatibility`.
    pub target_level: LanguageLevel,

    pub min_sdk: u32,
    pub target_sdk: u32,
    pub compile_sdk: u32,

    pub version_code: u32,
    pub version_name: String,

    /// Whether core library desugaring is enabled.
    pub desugaring_enabled: bool,
    /// Version of the desugaring library. Must be set iff desugaring is
    /// enabled.
    pub desugaring_library_version: Option<String>,

    /// Shrinking rule sources shared by all variants. They precede the
    /// variant-specific sources.
    pub default_rules: Vec<ShrinkingRuleSource>,
    /// Signing identity of variants that do not select one.
    pub default_signing: SigningIdentityRef,

    /// Declared build variants by name.
    pub variants: std::collections::BTreeMap<String, BuildVariant>,
}

impl ProjectDescriptor {
    /// Find a declared variant by name.
    pub fn variant(&self, name: &str) -> Option<&BuildVariant> {
        self.variants.get(name)
    }

    /// Iterate the names of all declared variants in lexicographic order.
    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(|v| v.as_str())
    }
}

/// Keystore Location
///
/// Location of the keystore holding a signing key. `AndroidDebug` refers to
/// the debug keystore managed by the Android build tools (usually
/// `~/.android/debug.keystore`), which is created on demand by the tools.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "kebab-case")]
pub enum KeystoreLocation {
    AndroidDebug,
    File(std::path::PathBuf),
}

/// Signing Identity Kind
///
/// Development identities are shared, well-known keys that must never sign
/// distributed packages.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityKind {
    Development,
    Release,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Development => "development",
            IdentityKind::Release => "release",
        }
    }
}

impl std::str::FromStr for IdentityKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("development") {
            Ok(IdentityKind::Development)
        } else if s.eq_ignore_ascii_case("release") {
            Ok(IdentityKind::Release)
        } else {
            Err(())
        }
    }
}

/// Signing Identity
///
/// Describes where the credentials of a signing identity live. Passwords are
/// referenced by the name of the environment variable holding them.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SigningIdentity {
    pub location: KeystoreLocation,
    pub key_alias: String,
    pub store_password_env: Option<String>,
    pub key_password_env: Option<String>,
    pub kind: IdentityKind,
}

impl SigningIdentity {
    /// Android development identity backed by the debug keystore.
    pub fn android_debug() -> Self {
        Self {
            location: KeystoreLocation::AndroidDebug,
            key_alias: DEBUG_KEY_ALIAS.to_string(),
            store_password_env: None,
            key_password_env: None,
            kind: IdentityKind::Development,
        }
    }
}

/// Signing Identity Registry
///
/// Maps identity names to signing credential locations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SigningIdentityRegistry {
    entries: std::collections::BTreeMap<SigningIdentityRef, SigningIdentity>,
}

impl SigningIdentityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the Android development identity registered
    /// under the default identity name.
    pub fn with_android_debug() -> Self {
        let mut v = Self::new();
        v.insert(SigningIdentityRef::default(), SigningIdentity::android_debug());
        v
    }

    /// Register an identity, replacing any previous entry of the same name.
    pub fn insert(&mut self, name: SigningIdentityRef, identity: SigningIdentity) {
        self.entries.insert(name, identity);
    }

    pub fn get(&self, name: &SigningIdentityRef) -> Option<&SigningIdentity> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SigningIdentityRef, &SigningIdentity)> {
        self.entries.iter()
    }
}

/// Resolved Signing
///
/// Signing identity selected for a resolved variant. `fallback` is set if
/// the variant did not select an identity and the project default was used.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolvedSigning {
    pub identity: SigningIdentityRef,
    pub fallback: bool,
    pub credentials: SigningIdentity,
}

impl ResolvedSigning {
    /// Whether the package would be signed with a development identity.
    pub fn is_development(&self) -> bool {
        self.credentials.kind == IdentityKind::Development
    }
}

/// Effective Build Configuration
///
/// Fully resolved build configuration of a single variant. Values are
/// computed fresh by every resolution and never updated in place.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EffectiveBuildConfig {
    pub project: String,
    pub variant: String,

    pub application_id: String,
    pub namespace: String,
    pub version_code: u32,
    pub version_name: String,

    pub compile_level: LanguageLevel,
    pub source_level: LanguageLevel,
    pub target_level: LanguageLevel,

    pub min_sdk: u32,
    pub target_sdk: u32,
    pub compile_sdk: u32,

    pub desugaring_enabled: bool,
    /// Maven coordinate of the desugaring library, if enabled.
    pub desugaring_library: Option<String>,

    pub minify: bool,
    pub debuggable: bool,
    /// Merged shrinking rule sources. Order is significant.
    pub rules: Vec<ShrinkingRuleSource>,

    pub signing: ResolvedSigning,
}
