//! Manifest-driven resolution
//!
//! Load manifests from disk and resolve their variants end-to-end. The
//! manifest mirrors an application repository with two independently
//! configured Android projects.

use android_variant::{descriptor, manifest, op};

const MANIFEST: &str = r#"
version = 1

[signing.upload]
store-file = "keys/upload.jks"
key-alias = "upload"
store-password-env = "UPLOAD_STORE_PASSWORD"
key-password-env = "UPLOAD_KEY_PASSWORD"

[[project]]
id = "ledgerlite"
application-id = "com.example.ledgerlite"
compile-sdk = 36
min-sdk = 21
target-sdk = 34
source-level = "1.8"
target-level = "1.8"
compile-level = "1.8"
desugaring = true
desugaring-version = "2.0.4"

[project.variant.release]
minify = true
rules = ["platform:proguard-android-optimize.txt", "proguard-rules.pro"]

[[project]]
id = "pantry"
application-id = "com.example.pantry"
namespace = "com.example.pantry.app"
compile-sdk = 36
min-sdk = 23
target-sdk = 35
version-code = 7
version-name = "1.3.0"
source-level = "VERSION_17"
target-level = "VERSION_17"
compile-level = "17"

[project.variant.release]
minify = true
rules = ["platform:proguard-android-optimize.txt", "proguard-rules.pro"]
signing = "upload"
"#;

fn load(content: &str) -> manifest::Manifest {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("android-variant.toml");

    std::fs::write(&path, content).unwrap();
    manifest::Manifest::parse_path(&path).unwrap()
}

// Resolve the release variant of a project without release identity
//
// Minification is on, the rule order is kept, and the debug identity is
// used as visible fallback.
#[test]
fn release_with_debug_fallback() {
    let m = load(MANIFEST);
    let p = m.project(Some("ledgerlite")).unwrap();
    let c = op::resolve::resolve(p, "release", &m.registry).unwrap();

    assert!(c.minify);
    assert_eq!(
        c.rules.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
        ["platform:proguard-android-optimize.txt", "proguard-rules.pro"],
    );
    assert_eq!(c.signing.identity.as_str(), descriptor::DEFAULT_SIGNING_IDENTITY);
    assert!(c.signing.fallback);
    assert_eq!(c.signing.credentials.location, descriptor::KeystoreLocation::AndroidDebug);
    assert_eq!(c.compile_level, descriptor::LanguageLevel::V1_8);
    assert_eq!(c.desugaring_library.as_deref(), Some("com.android.tools:desugar_jdk_libs:2.0.4"));
}

// Projects of one manifest are independent of each other
//
// The second project uses other language levels and its own release
// identity, without affecting the first one.
#[test]
fn independent_projects() {
    let m = load(MANIFEST);
    let p = m.project(Some("pantry")).unwrap();
    let c = op::resolve::resolve(p, "release", &m.registry).unwrap();

    assert_eq!(c.application_id, "com.example.pantry");
    assert_eq!(c.namespace, "com.example.pantry.app");
    assert_eq!((c.version_code, c.version_name.as_str()), (7, "1.3.0"));
    assert_eq!(c.source_level, descriptor::LanguageLevel::V17);
    assert_eq!(c.compile_level, descriptor::LanguageLevel::V17);
    assert!(!c.desugaring_enabled);
    assert_eq!(c.signing.identity.as_str(), "upload");
    assert!(!c.signing.fallback);
    assert_eq!(c.signing.credentials.kind, descriptor::IdentityKind::Release);

    let r = op::audit::audit(p, &m.registry).unwrap();
    assert_eq!(r.findings.len(), 1);
    assert_eq!(r.findings[0].variant(), "debug");

    let r = op::audit::audit(m.project(Some("ledgerlite")).unwrap(), &m.registry).unwrap();
    assert!(r.findings.contains(&op::audit::Finding::DevelopmentIdentity {
        variant: "release".to_string(),
        identity: "debug".to_string(),
    }));
}

// Desugaring without library version fails resolution.
#[test]
fn desugaring_version_missing() {
    let m = load(&MANIFEST.replace("desugaring-version = \"2.0.4\"\n", ""));
    let p = m.project(Some("ledgerlite")).unwrap();

    assert!(matches!(
        op::resolve::resolve(p, "release", &m.registry),
        Err(op::resolve::Error::DesugaringVersionMissing { .. }),
    ));
}

// Undeclared variants fail resolution.
#[test]
fn unknown_variant() {
    let m = load(MANIFEST);
    let p = m.project(Some("ledgerlite")).unwrap();

    match op::resolve::resolve(p, "staging", &m.registry) {
        Err(e @ op::resolve::Error::UnknownVariant { .. }) => {
            assert_eq!(e.to_string(), "project 'ledgerlite' declares no variant 'staging'");
        },
        v => panic!("unexpected result: {:?}", v),
    }
}

// An inverted SDK range fails every variant alike.
#[test]
fn invalid_sdk_range() {
    let m = load(
        &MANIFEST
            .replace("min-sdk = 21", "min-sdk = 30")
            .replace("target-sdk = 34", "target-sdk = 25")
    );
    let p = m.project(Some("ledgerlite")).unwrap();

    for name in ["debug", "release", "staging"] {
        assert!(matches!(
            op::resolve::resolve(p, name, &m.registry),
            Err(op::resolve::Error::InvalidSdkRange { min: 30, target: 25, .. }),
        ));
    }
    assert!(op::audit::audit(p, &m.registry).is_err());
}

// A variant referring to an unregistered identity fails resolution.
#[test]
fn unresolved_signing_identity() {
    let m = load(&MANIFEST.replace("signing = \"upload\"", "signing = \"store\""));
    let p = m.project(Some("pantry")).unwrap();

    assert!(op::resolve::resolve(p, "debug", &m.registry).is_ok());
    assert!(matches!(
        op::resolve::resolve(p, "release", &m.registry),
        Err(op::resolve::Error::UnresolvedSigningIdentity { .. }),
    ));
}

// Emit the resolved configuration to a properties file.
#[test]
fn emit_properties_file() {
    let m = load(MANIFEST);
    let p = m.project(Some("pantry")).unwrap();
    let c = op::resolve::resolve(p, "release", &m.registry).unwrap();
    let s = op::emit::render(&c, op::emit::Format::Properties).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("variant.properties");
    assert!(op::emit::update_file(&path, &s).unwrap());
    assert!(!op::emit::update_file(&path, &s).unwrap());

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("android.variant.signing.storeKind=file\n"));
    assert!(written.contains("android.variant.signing.storeFile=keys/upload.jks\n"));
    assert!(written.contains("android.variant.signing.storePasswordEnv=UPLOAD_STORE_PASSWORD\n"));
    assert!(written.contains("android.variant.sourceCompatibility=17\n"));
}

// Manifests that cannot be read report the path.
#[test]
fn missing_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    assert!(matches!(
        manifest::Manifest::parse_path(&path),
        Err(manifest::Error::Read(..)),
    ));
}

// Emit values that need escaping in a properties file
//
// Windows keystore paths keep their backslashes and non-ASCII version names
// are written as unicode escapes, so the file loads back unchanged.
#[test]
fn emit_properties_escaped() {
    let m = load(r#"
        version = 1

        [signing.upload]
        store-file = 'C:\keys\upload.jks'
        key-alias = "upload"

        [[project]]
        id = "pantry"
        application-id = "com.example.pantry"
        compile-sdk = 36
        min-sdk = 23
        target-sdk = 35
        version-name = "1.0-ß"

        [project.variant.release]
        signing = "upload"
    "#);
    let p = m.project(None).unwrap();
    let c = op::emit::render(
        &op::resolve::resolve(p, "release", &m.registry).unwrap(),
        op::emit::Format::Properties,
    ).unwrap();

    assert!(c.is_ascii());
    assert!(c.contains("android.variant.signing.storeKind=file\n"));
    assert!(c.contains(r"android.variant.signing.storeFile=C:\\keys\\upload.jks"));
    assert!(c.contains(r"android.variant.versionName=1.0-\u00DF"));
}
