//! Checks applied to a script before it reaches the pipeline.

use crate::error::{Result, SandboxError};

/// Declaration every accepted script must contain.
pub const ENTRY_POINT_DECLARATION: &str = "def main():";

/// Default bound on script size, in characters.
pub const DEFAULT_MAX_SCRIPT_CHARS: usize = 50_000;

/// Size and shape bounds for incoming scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    pub max_script_chars: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_script_chars: DEFAULT_MAX_SCRIPT_CHARS,
        }
    }
}

impl ScriptLimits {
    pub fn new(max_script_chars: usize) -> Self {
        Self { max_script_chars }
    }

    /// Reject oversized scripts and scripts without `def main():`.
    ///
    /// The entry-point check is textual; the script is never parsed here.
    pub fn validate(&self, script: &str) -> Result<()> {
        if self.is_too_large(script) {
            return Err(SandboxError::InvalidInput(format!(
                "Script too large (max {}KB)",
                self.max_script_chars / 1000
            )));
        }
        if !script.contains(ENTRY_POINT_DECLARATION) {
            return Err(SandboxError::InvalidInput(
                "Script must contain a 'def main():' function".to_string(),
            ));
        }
        Ok(())
    }

    fn is_too_large(&self, script: &str) -> bool {
        // A string never has more chars than bytes.
        script.len() > self.max_script_chars && script.chars().count() > self.max_script_chars
    }
}
