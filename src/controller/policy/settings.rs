//! # Settings Injection
//!
//! Replaces `{settings:NAME}` placeholders in a policy template with app
//! setting values. Both the `settings` keyword and `NAME` match
//! case-insensitively.

use crate::model::AppSettings;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{settings:([^{}]*)\}").expect("placeholder pattern must compile")
});

/// Render a template with the given app settings
///
/// Settings without a value are skipped and their placeholders stay in the
/// output, as do placeholders naming an unknown setting. Values are inserted
/// literally and the result is not scanned again.
pub fn inject_settings(template: &str, settings: &AppSettings) -> String {
    let mut lookup: HashMap<String, &str> = HashMap::with_capacity(settings.len());
    for (name, value) in settings {
        match value.as_deref() {
            Some(value) if !value.is_empty() => {
                lookup.entry(name.to_lowercase()).or_insert(value);
            }
            _ => warn!(setting = %name, "App setting has no value, skipping"),
        }
    }

    if lookup.is_empty() {
        return template.to_string();
    }

    let mut replaced = 0usize;
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        match lookup.get(&caps[1].to_lowercase()) {
            Some(value) => {
                replaced += 1;
                (*value).to_string()
            }
            None => caps[0].to_string(),
        }
    });
    debug!(replaced = replaced, "Injected app settings");

    rendered.into_owned()
}
