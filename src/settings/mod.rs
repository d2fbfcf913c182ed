//! Test configuration carried from the CLI, config files and control frames
//! into a running test.
mod live;
mod patch;
mod types;


pub use live::LiveSettings;
pub use patch::SettingsPatch;
pub use types::{RequestMode, TestSettings, UNUSED};
