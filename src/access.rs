//! Access mode and document links.
//!
//! A document is opened through a link of the form
//! `<origin>/canvas/<id>[?viewOnly=true]`. The `viewOnly` flag is read once
//! when the session opens and fixes the access mode for its whole lifetime.

use std::fmt;

use anyhow::{anyhow, Result};
use uuid::Uuid;

use crate::scene::{LockFlags, SceneElement};

/// Query parameter carrying the read-only flag
pub const VIEW_ONLY_PARAM: &str = "viewOnly";

/// Editable or read-only, fixed for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    #[default]
    Editable,
    ReadOnly,
}

impl AccessMode {
    pub fn from_view_only(view_only: bool) -> Self {
        if view_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::Editable
        }
    }

    pub fn is_read_only(self) -> bool {
        self == AccessMode::ReadOnly
    }

    pub fn name(self) -> &'static str {
        match self {
            AccessMode::Editable => "editable",
            AccessMode::ReadOnly => "view-only",
        }
    }
}

/// Opaque document key. Never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a random id for a brand-new document
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which document to open and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    pub id: DocumentId,
    pub access: AccessMode,
}

impl DocumentLink {
    pub fn new(id: DocumentId, access: AccessMode) -> Self {
        Self { id, access }
    }

    /// Link to a freshly minted, editable document
    pub fn fresh() -> Self {
        Self::new(DocumentId::generate(), AccessMode::Editable)
    }

    /// Parse a bare id, a `/canvas/<id>?...` path, or a full URL
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let input = input.split('#').next().unwrap_or_default();
        let (path, query) = match input.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (input, None),
        };

        // Drop scheme and authority of a full URL
        let path = match path.split_once("://") {
            Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
            None => path,
        };

        let id = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("No document id in link: {:?}", input))?;

        let view_only = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .filter_map(|pair| pair.split_once('='))
            .any(|(key, value)| key == VIEW_ONLY_PARAM && value == "true");

        Ok(Self::new(
            DocumentId::new(id),
            AccessMode::from_view_only(view_only),
        ))
    }

    /// Link others can use to open this document
    pub fn share_url(&self, origin: &str, access: AccessMode) -> String {
        let origin = origin.trim_end_matches('/');
        match access {
            AccessMode::Editable => format!("{}/canvas/{}", origin, self.id),
            AccessMode::ReadOnly => {
                format!("{}/canvas/{}?{}=true", origin, self.id, VIEW_ONLY_PARAM)
            }
        }
    }
}

/// Force an element fully locked, whatever it was persisted with
pub fn lock_down(element: &mut SceneElement) {
    element.locks = LockFlags::LOCKED;
    element.hover_cursor = Some("default".to_string());
}
