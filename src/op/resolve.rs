//! Build Variant Resolution
//!
//! The `resolve` operation turns a project descriptor and a variant name into
//! the effective build configuration of that variant. Resolution is a pure
//! function of its inputs. It never touches the file-system, and a failed
//! resolution never yields a partial configuration.

use crate::descriptor;

/// Resolution Errors
///
/// This is the exhaustive list of possible errors raised by the resolve
/// operation. All of them denote static configuration defects, so retrying
/// with the same inputs fails identically.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The variant is not declared by the project.
    #[error("project '{project}' declares no variant '{variant}'")]
    UnknownVariant { project: String, variant: String },
    /// The signing identity of the variant is missing in the registry.
    #[error("variant '{variant}' of project '{project}' uses unknown signing identity '{identity}'")]
    UnresolvedSigningIdentity { project: String, variant: String, identity: String },
    /// SDK levels are not ordered as `min-sdk <= target-sdk <= compile-sdk`.
    #[error("project '{project}' has invalid SDK range: min-sdk {min}, target-sdk {target}, compile-sdk {compile}")]
    InvalidSdkRange { project: String, min: u32, target: u32, compile: u32 },
    /// Desugaring is enabled, but no library version is declared.
    #[error("project '{project}' enables desugaring but declares no desugaring library version")]
    DesugaringVersionMissing { project: String },
    /// A desugaring library version is declared, but desugaring is disabled.
    #[error("project '{project}' declares desugaring library version '{version}' but has desugaring disabled")]
    DesugaringVersionUnexpected { project: String, version: String },
}

// Return the declared desugaring version, treating blank strings as absent.
fn desugaring_version(descriptor: &descriptor::ProjectDescriptor) -> Option<&str> {
    descriptor.desugaring_library_version
        .as_deref()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Validate project descriptor
///
/// Check the variant-independent invariants of a project descriptor: the SDK
/// levels must be ordered, and a desugaring library version must be declared
/// if, and only if, desugaring is enabled.
///
/// `resolve()` runs this on every call, so a malformed descriptor fails all
/// its variants with the same error.
pub fn validate(descriptor: &descriptor::ProjectDescriptor) -> Result<(), Error> {
    if descriptor.min_sdk > descriptor.target_sdk
        || descriptor.target_sdk > descriptor.compile_sdk
    {
        return Err(Error::InvalidSdkRange {
            project: descriptor.id.clone(),
            min: descriptor.min_sdk,
            target: descriptor.target_sdk,
            compile: descriptor.compile_sdk,
        });
    }

    match (descriptor.desugaring_enabled, desugaring_version(descriptor)) {
        (true, None) => {
            Err(Error::DesugaringVersionMissing {
                project: descriptor.id.clone(),
            })
        },
        (false, Some(v)) => {
            Err(Error::DesugaringVersionUnexpected {
                project: descriptor.id.clone(),
                version: v.to_string(),
            })
        },
        _ => Ok(()),
    }
}

// Merge shrinking rule sources
//
// Project-wide sources come first, followed by the sources of the variant.
// Both lists keep their declaration order. Duplicates are retained, since
// the consumer defines what repeated sources mean.
fn merge_rules(
    descriptor: &descriptor::ProjectDescriptor,
    variant: &descriptor::BuildVariant,
) -> Vec<descriptor::ShrinkingRuleSource> {
    descriptor.default_rules.iter()
        .chain(variant.rules.iter())
        .cloned()
        .collect()
}

// Resolve the signing identity of a variant
//
// Variants without a declared identity use the project default. The result
// records which of the two applied.
fn resolve_signing(
    descriptor: &descriptor::ProjectDescriptor,
    name: &str,
    variant: &descriptor::BuildVariant,
    registry: &descriptor::SigningIdentityRegistry,
) -> Result<descriptor::ResolvedSigning, Error> {
    let (identity, fallback) = match variant.signing {
        descriptor::SigningSelection::Declared(ref v) => (v, false),
        descriptor::SigningSelection::Default => (&descriptor.default_signing, true),
    };

    let credentials = registry.get(identity).ok_or_else(
        || Error::UnresolvedSigningIdentity {
            project: descriptor.id.clone(),
            variant: name.to_string(),
            identity: identity.to_string(),
        }
    )?;

    if fallback {
        tracing::warn!(
            project = %descriptor.id,
            variant = name,
            identity = %identity,
            "variant declares no signing identity, using project default"
        );
    }

    Ok(
        descriptor::ResolvedSigning {
            identity: identity.clone(),
            fallback: fallback,
            credentials: credentials.clone(),
        }
    )
}

/// Resolve build variant
///
/// Compute the effective build configuration of the variant `name` of the
/// given project. The descriptor is validated first (see `validate()`), then
/// the variant is looked up, its shrinking rule sources are merged behind the
/// project-wide sources, and its signing identity is resolved against the
/// registry.
///
/// Repeated calls with identical inputs yield identical results.
pub fn resolve(
    descriptor: &descriptor::ProjectDescriptor,
    name: &str,
    registry: &descriptor::SigningIdentityRegistry,
) -> Result<descriptor::EffectiveBuildConfig, Error> {
    validate(descriptor)?;

    let variant = descriptor.variant(name).ok_or_else(
        || Error::UnknownVariant {
            project: descriptor.id.clone(),
            variant: name.to_string(),
        }
    )?;

    let rules = merge_rules(descriptor, variant);
    let signing = resolve_signing(descriptor, name, variant, registry)?;

    tracing::debug!(
        project = %descriptor.id,
        variant = name,
        minify = variant.minify,
        rules = rules.len(),
        identity = %signing.identity,
        "resolved build variant"
    );

    Ok(
        descriptor::EffectiveBuildConfig {
            project: descriptor.id.clone(),
            variant: name.to_string(),

            application_id: descriptor.application_id.clone(),
            namespace: descriptor.namespace.clone(),
            version_code: descriptor.version_code,
            version_name: descriptor.version_name.clone(),

            compile_level: descriptor.compile_level,
            source_level: descriptor.source_level,
            target_level: descriptor.target_level,

            min_sdk: descriptor.min_sdk,
            target_sdk: descriptor.target_sdk,
            compile_sdk: descriptor.compile_sdk,

            desugaring_enabled: descriptor.desugaring_enabled,
            desugaring_library: desugaring_version(descriptor).map(
                |v| format!("{}:{}", descriptor::DESUGARING_LIBRARY, v)
            ),

            minify: variant.minify,
            debuggable: variant.debuggable,
            rules: rules,

            signing: signing,
        }
    )
}
