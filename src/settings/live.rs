use arcshift::ArcShift;

use super::{SettingsPatch, TestSettings};
use crate::error::ValidationError;

/// Hot-swappable settings shared between the orchestrator and a running
/// test. Each holder keeps its own handle; `current` observes the latest
/// published value.
#[derive(Clone)]
pub struct LiveSettings {
    shift: ArcShift<TestSettings>,
}

impl LiveSettings {
    #[must_use]
    pub fn new(settings: TestSettings) -> Self {
        Self {
            shift: ArcShift::new(settings),
        }
    }

    /// Returns the latest published settings.
    pub fn current(&mut self) -> &TestSettings {
        self.shift.get()
    }

    /// Publishes `patch` on top of the latest settings and returns the result.
    ///
    /// # Errors
    ///
    /// Returns the validation error when the merged settings are invalid;
    /// nothing is published in that case.
    pub fn apply(&mut self, patch: &SettingsPatch) -> Result<TestSettings, ValidationError> {
        let mut next = self.shift.get().clone();
        patch.apply_to(&mut next);
        next.validate()?;
        self.shift.update(next.clone());
        Ok(next)
    }
}

impl std::fmt::Debug for LiveSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSettings").finish_non_exhaustive()
    }
}
