use serde::{Deserialize, Serialize};

/// Configuration for the conformance gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// When `true`, the first single-object check of a regulated object is
    /// deferred until a batch check has run over its page context. When
    /// `false`, single checks run the rules immediately.
    pub defer_unchecked: bool,
    /// When `true`, a cascading flush whose batch check finds a violation
    /// fails immediately instead of deferring and reporting at close.
    pub fail_fast: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            defer_unchecked: true,
            fail_fast: false,
        }
    }
}

impl GateConfig {
    /// Run rules on every check; nothing is deferred for lack of context.
    pub fn eager() -> Self {
        Self {
            defer_unchecked: false,
            ..Default::default()
        }
    }
}
