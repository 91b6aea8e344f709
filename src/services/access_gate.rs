//! Role resolution and enforcement.
//!
//! Role claims arrive already validated by the identity gateway. They are
//! resolved once per request into an [`AccessGate`], which is then passed
//! explicitly to every gallery operation.

use crate::{
    errors::{GalleryError, GalleryResult},
    models::photo::PhotoRecord,
};

/// What a resolved caller may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub view_private: bool,
    pub upload: bool,
    pub toggle_visibility: bool,
    pub delete: bool,
}

/// Mutating operations guarded by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Upload,
    ToggleVisibility,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessGate {
    /// Carries the admin designation: sees everything and may mutate.
    Privileged { claims: Vec<String> },
    /// Sees public photos only, read-only.
    Standard { claims: Vec<String> },
}

impl AccessGate {
    /// Resolve a claim set. Group names compare case-insensitively.
    pub fn resolve(claims: Vec<String>, admin_group: &str) -> Self {
        if claims.iter().any(|c| c.eq_ignore_ascii_case(admin_group)) {
            AccessGate::Privileged { claims }
        } else {
            AccessGate::Standard { claims }
        }
    }

    pub fn claims(&self) -> &[String] {
        match self {
            AccessGate::Privileged { claims } | AccessGate::Standard { claims } => claims,
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, AccessGate::Privileged { .. })
    }

    pub fn permissions(&self) -> Permissions {
        let privileged = self.is_privileged();
        Permissions {
            view_private: privileged,
            upload: privileged,
            toggle_visibility: privileged,
            delete: privileged,
        }
    }

    /// Fail `Forbidden` unless the caller may perform `action`.
    pub fn authorize(&self, action: Action) -> GalleryResult<()> {
        let perms = self.permissions();
        let allowed = match action {
            Action::Upload => perms.upload,
            Action::ToggleVisibility => perms.toggle_visibility,
            Action::Delete => perms.delete,
        };
        if allowed {
            Ok(())
        } else {
            tracing::debug!("denied {:?} for claims {:?}", action, self.claims());
            Err(GalleryError::Forbidden)
        }
    }

    /// Whether the caller may see `record` in a listing.
    pub fn can_view(&self, record: &PhotoRecord) -> bool {
        record.is_public || self.permissions().view_private
    }

    /// Keep only the records the caller may see, preserving order.
    pub fn filter_visible<T, F>(&self, items: Vec<T>, record_of: F) -> Vec<T>
    where
        F: Fn(&T) -> &PhotoRecord,
    {
        items
            .into_iter()
            .filter(|item| self.can_view(record_of(item)))
            .collect()
    }
}
