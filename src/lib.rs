//! Android Build Variant Resolution
//!
//! This crate resolves the build configuration of Android applications for a
//! given build variant. Android applications are assembled by Gradle and the
//! Android Gradle Plugin, and every application module declares how its
//! package is to be built: the Java language level it is compiled against,
//! whether newer Java library APIs are desugared onto older platform
//! releases, whether release artifacts are shrunk and obfuscated, and which
//! key signs the final package. Each build variant (usually `debug` and
//! `release`) combines these settings differently.
//!
//! The crate does not run Gradle, nor does it compile, shrink, or sign
//! anything. Instead, it takes a static description of an application and a
//! registry of signing identities, and produces the fully resolved
//! configuration of a single variant. The resolved configuration is then
//! handed to whatever packaging tooling performs the actual build.
//!
//! Model
//! -----
//!
//! Applications are described by a [`descriptor::ProjectDescriptor`]. It
//! carries the application identity, the SDK levels, the language levels,
//! the desugaring setup, and the set of declared build variants. Signing
//! keys are never part of a descriptor. Variants refer to signing identities
//! by name, and the names are looked up in a separate
//! [`descriptor::SigningIdentityRegistry`], which only records where the key
//! material lives.
//!
//! Resolution is a pure function of the descriptor, the variant name, and the
//! registry (see [`op::resolve`]). It performs no I/O and keeps no state
//! across calls, hence it can be run for all variants of a project in
//! parallel. Malformed descriptors fail resolution for every variant alike.
//!
//! Variants that do not name a signing identity fall back to the default
//! identity of their project, which is the Android development key unless
//! configured otherwise. The fallback is never silent: the resolved
//! configuration records it, and [`op::audit`] reports it, so applications
//! shipping with a development key can be detected before release.
//!
//! Manifest
//! --------
//!
//! Descriptors and the signing registry are usually loaded from a
//! TOML-formatted manifest, called `android-variant.toml` by default. See
//! [`manifest`] for the format. The `android-variant` command-line tool reads
//! the manifest and exposes resolution, auditing, and rendering of resolved
//! configurations.

pub mod descriptor;
pub mod manifest;

/// Variant Operations
///
/// The `op` module is a collection of all operations that can be performed on
/// project descriptors. Each operation is implemented in a submodule and can
/// be used independently.
pub mod op {
    pub mod audit;
    pub mod emit;
    pub mod resolve;
}
