//! Mapping of remote buttons to user defined actions, and the seams to
//! the collaborators that provide bindings and carry actions out.

mod keysym;
mod xdotool;

use std::collections::BTreeMap;

pub use xdotool::XdotoolExecutor;

#[cfg(test)]
use mockall::automock;

pub type ButtonId = u32;

/// Read-only snapshot of the button to action table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionBindings {
    by_button: BTreeMap<ButtonId, String>,
}

impl ActionBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings for the two-button remote.
    pub fn from_pair(
        button1_action: impl Into<String>, button2_action: impl Into<String>,
    ) -> Self {
        Self::new().bind(1, button1_action).bind(2, button2_action)
    }

    pub fn bind(mut self, button_id: ButtonId, action: impl Into<String>) -> Self {
        self.by_button.insert(button_id, action.into());
        self
    }
}

/// Looks up the action bound to `button_id`. Unbound ids and blank actions
/// resolve to nothing, which callers treat as a no-op.
pub fn resolve(button_id: ButtonId, bindings: &ActionBindings) -> Option<&str> {
    bindings
        .by_button
        .get(&button_id)
        .map(|action| action.trim())
        .filter(|action| !action.is_empty())
}

/// Source of the current bindings, queried on every button press.
#[cfg_attr(test, automock)]
pub trait BindingSource: Send + Sync + 'static {
    fn snapshot(&self) -> ActionBindings;
}

/// A fixed snapshot injected at construction.
impl BindingSource for ActionBindings {
    fn snapshot(&self) -> ActionBindings {
        self.clone()
    }
}

/// Carries out a resolved action. Must return promptly; implementations
/// hand the work off instead of waiting for it.
#[cfg_attr(test, automock)]
pub trait ActionExecutor: Send + Sync + 'static {
    fn execute(&self, action: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_bindings() -> ActionBindings {
        ActionBindings::from_pair("pagedown", "pageup")
    }

    #[test]
    fn test_resolve_bound_buttons() {
        let bindings = remote_bindings();

        assert_eq!(resolve(1, &bindings), Some("pagedown"));
        assert_eq!(resolve(2, &bindings), Some("pageup"));
    }

    #[test]
    fn test_resolve_unbound_button() {
        let bindings = remote_bindings();

        assert_eq!(resolve(3, &bindings), None);
        assert_eq!(resolve(0, &bindings), None);
    }

    #[test]
    fn test_resolve_blank_action() {
        let bindings = ActionBindings::from_pair("  ", "pageup");

        assert_eq!(resolve(1, &bindings), None);
        assert_eq!(resolve(2, &bindings), Some("pageup"));
    }

    #[test]
    fn test_unbound_button_never_reaches_executor() {
        let mut executor = MockActionExecutor::new();
        executor.expect_execute().never();

        let bindings = remote_bindings();
        if let Some(action) = resolve(3, &bindings) {
            executor.execute(action);
        }
    }

    #[test]
    fn test_fixed_snapshot_source() {
        let bindings = remote_bindings();

        assert_eq!(bindings.snapshot(), bindings);
    }
}
