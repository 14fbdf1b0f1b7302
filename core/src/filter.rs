//! Export eligibility of databases and schema objects

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::Result;
use crate::object::SchemaObject;

/// Decides whether an entity is eligible for export.
///
/// System objects never pass. When an inclusion list is present, kinds that
/// honour it must match it by bare name or by `schema.name` (case-sensitive).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectFilter {
    names: Option<HashSet<String>>,
}

impl ObjectFilter {
    /// Every non-system entity passes
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to the given names. An empty list restricts nothing.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: HashSet<String> = names
            .into_iter()
            .map(|n| n.as_ref().trim_end().to_string())
            .filter(|n| !n.is_empty())
            .collect();

        Self {
            names: if names.is_empty() { None } else { Some(names) },
        }
    }

    /// Parse a newline-delimited list
    pub fn parse(text: &str) -> Self {
        Self::from_names(text.lines())
    }

    /// Load a newline-delimited list from disk
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        Ok(Self::parse(&text))
    }

    /// Whether an inclusion list is in effect
    pub fn is_restricted(&self) -> bool {
        self.names.is_some()
    }

    /// Match a bare name against the inclusion list
    pub fn includes_name(&self, name: &str) -> bool {
        match &self.names {
            None => true,
            Some(names) => names.contains(name),
        }
    }

    fn includes(&self, object: &dyn SchemaObject) -> bool {
        if !object.kind().honours_inclusion_list() {
            return true;
        }
        match (&self.names, object.schema()) {
            (None, _) => true,
            (Some(names), schema) => {
                names.contains(object.name())
                    || schema.is_some_and(|s| names.contains(&format!("{}.{}", s, object.name())))
            }
        }
    }

    /// System check plus inclusion list
    pub fn is_exportable(&self, object: &dyn SchemaObject) -> bool {
        if !Self::passes_system_check(object) {
            return false;
        }
        if !self.includes(object) {
            debug!("Skipping {} {}: not in inclusion list", object.kind(), object.identity());
            return false;
        }
        true
    }

    /// Rejects system objects and objects whose system flag cannot be read
    pub fn passes_system_check(object: &dyn SchemaObject) -> bool {
        match object.is_system_object() {
            Ok(false) => true,
            Ok(true) => {
                debug!("Skipping system {} {}", object.kind(), object.identity());
                false
            }
            Err(e) => {
                warn!(
                    "Dropping {} {}: could not read system flag: {}",
                    object.kind(),
                    object.identity(),
                    e
                );
                false
            }
        }
    }
}
