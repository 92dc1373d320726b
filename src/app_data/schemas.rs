//! Layout of `remote_config.json`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::actions::ActionBindings;

fn default_btn1_action() -> String {
    "pagedown".to_string()
}

fn default_btn2_action() -> String {
    "pageup".to_string()
}

/// Settings shared with the configuration window. Keys this daemon does
/// not know are kept in `extra` and written back untouched.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_btn1_action")]
    pub btn1_action: String,

    #[serde(default = "default_btn2_action")]
    pub btn2_action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_timeout_secs: Option<u64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            btn1_action: default_btn1_action(),
            btn2_action: default_btn2_action(),
            device_name: None,
            scan_timeout_secs: None,
            extra: Map::new(),
        }
    }
}

impl AppConfig {
    pub fn bindings(&self) -> ActionBindings {
        ActionBindings::from_pair(&self.btn1_action, &self.btn2_action)
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        self.scan_timeout_secs.map(Duration::from_secs)
    }
}
