//! Game source providers.
//!
//! Every provider maps one origin's on-disk conventions into [`GameEntry`]
//! records behind the [`SourceProvider`] trait.

pub mod command;
pub mod custom;
pub mod entry;
pub mod epic;
pub mod provider;
pub mod shortcut;
pub mod steam;
pub mod xbox;

// Re-export primary types.
pub use custom::CustomProvider;
pub use entry::{GameEntry, ImageHint, LaunchShortcut, ManagedKey, Origin};
pub use epic::EpicProvider;
pub use provider::{Discovery, ProviderCause, ProviderError, SourceProvider, dedup_entries};
pub use steam::SteamProvider;
pub use xbox::XboxProvider;
