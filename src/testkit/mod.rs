//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`world`] — `FakeWorld`: kubeconfig, Kubernetes API and backend CLIs
//!   in one scripted state.
//! - [`runtime`] — `FakeRuntime`: an in-memory container engine.
//! - [`settings`] — `FakeSettings`: the desktop settings channel.
//! - [`platform`] — `FakePlatform`: OS capabilities set per test.
//! - [`clock`] — `FakeClock`: virtual time for polling loops.
//! - [`machine`] — `RecordingMachine`: counts machine calls.
//! - [`fixture`] — Canonical collaborators and the wired `Harness`.

pub mod clock;
pub mod fixture;
pub mod machine;
pub mod platform;
pub mod runtime;
pub mod settings;
pub mod world;
