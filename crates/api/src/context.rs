use gympal_auth::GuardState;

/// Guard outcome for a request that was allowed through.
///
/// Inserted by the guard middleware; only present on guarded routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GuardContext {
    state: GuardState,
}

impl GuardContext {
    pub fn new(state: GuardState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }
}
