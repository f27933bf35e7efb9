//! Presenters that wire views to the settings repositories and the bus.

mod settings;

pub use settings::{IsValid, SettingsPresenter, SettingsView};
