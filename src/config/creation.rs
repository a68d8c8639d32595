//! Snapshot creation configuration.

use serde::{Deserialize, Serialize};

use crate::snapshots::Tag;

/// Settings applied to every snapshot the warden takes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreationConfig {
    /// Tags added to new snapshots on top of the resource's own tags. On a
    /// key collision these win.
    /// Default: `created_by = "snapwarden"`
    #[serde(default = "default_additional_tags")]
    pub additional_tags: Vec<Tag>,
}

impl Default for CreationConfig {
    fn default() -> Self {
        Self {
            additional_tags: default_additional_tags(),
        }
    }
}

impl CreationConfig {
    pub(super) fn validate(&self) -> Result<(), String> {
        if let Some(tag) = self.additional_tags.iter().find(|t| t.key.trim().is_empty()) {
            return Err(format!(
                "creation.additional_tags has a tag with an empty key (value '{}')",
                tag.value
            ));
        }
        Ok(())
    }
}

fn default_additional_tags() -> Vec<Tag> {
    vec![Tag::new("created_by", "snapwarden")]
}
