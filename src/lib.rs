//! Workspace facade crate.
//!
//! Re-exports the engine, runtime, and auth crates so a host can depend on
//! `photo-sync-workspace` alone. The `desktop-shims` feature (default) also
//! exposes the reqwest/exiftool adapters and the Google Photos connector.

pub use core_auth as auth;
pub use core_runtime as runtime;
pub use core_sync as sync;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop as desktop;
#[cfg(feature = "desktop-shims")]
pub use provider_google_photos as google_photos;
