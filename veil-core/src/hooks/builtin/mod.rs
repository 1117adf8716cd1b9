//! Built-in hooks
//!
//! | codename | priority | targets |
//! |---|---|---|
//! | `navigator_user_agent` | 100 | all |
//! | `navigator_client_hints` | 90 | all |
//! | `navigator_webdriver` | 80 | all |
//! | `navigator_hardware` | 50 | all |
//! | `webgl` | 1 | all |
//! | `navigator_media_devices` | 0 | main |
//!
//! Every hook is a no-op when the profile lacks its section or the host
//! lacks the API it patches.

mod media_devices;
mod navigator;
mod webgl;

pub use media_devices::NavigatorMediaDevices;
pub use navigator::{NavigatorClientHints, NavigatorHardware, NavigatorUserAgent, NavigatorWebdriver};
pub use webgl::Webgl;

use super::RegistryEntry;

/// One entry per built-in hook
pub fn entries() -> Vec<RegistryEntry> {
    vec![
        RegistryEntry::of::<NavigatorUserAgent>(),
        RegistryEntry::of::<NavigatorClientHints>(),
        RegistryEntry::of::<NavigatorWebdriver>(),
        RegistryEntry::of::<NavigatorHardware>(),
        RegistryEntry::of::<NavigatorMediaDevices>(),
        RegistryEntry::of::<Webgl>(),
    ]
}
