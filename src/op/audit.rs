//! Signing Audit
//!
//! The `audit` operation resolves every declared variant of a project and
//! reports signing setups that must not reach distribution: variants that
//! rely on the signing fallback, and non-debuggable variants signed with a
//! development identity.

use crate::descriptor;
use crate::op::resolve;

/// Audit Finding
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Finding {
    /// The variant declares no signing identity and uses the project
    /// default.
    SigningFallback { variant: String, identity: String },
    /// A non-debuggable variant is signed with a development identity.
    DevelopmentIdentity { variant: String, identity: String },
}

impl Finding {
    /// Return the name of the variant the finding applies to.
    pub fn variant(&self) -> &str {
        match self {
            Finding::SigningFallback { variant, .. } => variant,
            Finding::DevelopmentIdentity { variant, .. } => variant,
        }
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Finding::SigningFallback { variant, identity } => {
                write!(f, "variant '{}' falls back to signing identity '{}'", variant, identity)
            },
            Finding::DevelopmentIdentity { variant, identity } => {
                write!(f, "variant '{}' is not debuggable but signed with development identity '{}'", variant, identity)
            },
        }
    }
}

/// Audit Report
///
/// Resolved configurations of all variants of a project, in variant-name
/// order, plus the findings raised for them.
#[derive(Clone, Debug)]
pub struct Report {
    pub project: String,
    pub configs: Vec<descriptor::EffectiveBuildConfig>,
    pub findings: Vec<Finding>,
}

impl Report {
    /// Whether the audit raised no findings.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

// Collect the findings of a single resolved variant.
fn inspect(config: &descriptor::EffectiveBuildConfig, findings: &mut Vec<Finding>) {
    if config.signing.fallback {
        findings.push(Finding::SigningFallback {
            variant: config.variant.clone(),
            identity: config.signing.identity.to_string(),
        });
    }

    if !config.debuggable && config.signing.is_development() {
        findings.push(Finding::DevelopmentIdentity {
            variant: config.variant.clone(),
            identity: config.signing.identity.to_string(),
        });
    }
}

/// Audit project
///
/// Resolve all declared variants of the project and inspect their signing
/// setup. Any resolution failure aborts the audit, since no variant of an
/// invalid project may be packaged.
pub fn audit(
    descriptor: &descriptor::ProjectDescriptor,
    registry: &descriptor::SigningIdentityRegistry,
) -> Result<Report, resolve::Error> {
    let mut configs = Vec::new();
    let mut findings = Vec::new();

    for name in descriptor.variant_names() {
        let config = resolve::resolve(descriptor, name, registry)?;
        inspect(&config, &mut findings);
        configs.push(config);
    }

    tracing::debug!(
        project = %descriptor.id,
        variants = configs.len(),
        findings = findings.len(),
        "audited project"
    );

    Ok(
        Report {
            project: descriptor.id.clone(),
            configs: configs,
            findings: findings,
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::resolve::tests::ledgerlite;

    // Audit the default setup
    //
    // Both variants fall back to the debug identity. Only `release` is
    // flagged for the development identity, since `debug` is debuggable.
    #[test]
    fn audit_fallback() {
        let d = ledgerlite();
        let r = audit(&d, &descriptor::SigningIdentityRegistry::with_android_debug()).unwrap();

        assert_eq!(r.project, "ledgerlite");
        assert_eq!(r.configs.len(), 2);
        assert_eq!(r.configs[0].variant, "debug");
        assert_eq!(r.configs[1].variant, "release");
        assert_eq!(
            r.findings,
            vec![
                Finding::SigningFallback { variant: "debug".to_string(), identity: "debug".to_string() },
                Finding::SigningFallback { variant: "release".to_string(), identity: "debug".to_string() },
                Finding::DevelopmentIdentity { variant: "release".to_string(), identity: "debug".to_string() },
            ],
        );
        assert!(!r.is_clean());
    }

    // Audit a project with a declared release identity
    //
    // The release variant is clean, the debug variant still reports its
    // fallback.
    #[test]
    fn audit_release_identity() {
        let mut d = ledgerlite();
        let mut reg = descriptor::SigningIdentityRegistry::with_android_debug();

        reg.insert(
            descriptor::SigningIdentityRef::new("upload"),
            descriptor::SigningIdentity {
                location: descriptor::KeystoreLocation::File("upload.jks".into()),
                key_alias: "upload".to_string(),
                store_password_env: None,
                key_password_env: None,
                kind: descriptor::IdentityKind::Release,
            },
        );
        d.variants.get_mut("release").unwrap().signing =
            descriptor::SigningSelection::Declared(descriptor::SigningIdentityRef::new("upload"));

        let r = audit(&d, &reg).unwrap();
        assert_eq!(r.findings.len(), 1);
        assert_eq!(r.findings[0].variant(), "debug");
    }

    // Verify an unresolvable variant aborts the audit.
    #[test]
    fn audit_unresolved() {
        let mut d = ledgerlite();
        d.variants.get_mut("debug").unwrap().signing =
            descriptor::SigningSelection::Declared(descriptor::SigningIdentityRef::new("missing"));

        assert!(matches!(
            audit(&d, &descriptor::SigningIdentityRegistry::with_android_debug()),
            Err(resolve::Error::UnresolvedSigningIdentity { .. }),
        ));
    }
}
