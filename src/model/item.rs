// File: ./src/model/item.rs
use crate::parser::RecordKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::EnumIter;
use uuid::Uuid;

/// Fresh persistence id for an entity the caller did not supply one for.
pub fn new_entity_id() -> String {
    Uuid::new_v4().to_string()
}

// --- PARSED VIEWS ---
// Flat typed views over one GEDCOM record. Missing optional tags stay
// absent; the only display default is the source title placeholder.

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParsedEvent {
    /// GEDCOM calendar text, kept verbatim (e.g. "ABT 1850").
    pub date: Option<String>,
    pub place: Option<String>,
    /// Source xrefs cited under this event, first-seen order, deduplicated.
    pub source_refs: Vec<String>,
    /// Media object xrefs under this event, first-seen order, deduplicated.
    pub object_refs: Vec<String>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParsedIndividual {
    pub id: Option<String>,
    /// Raw NAME value with the surname slashes removed.
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub surname: Option<String>,
    pub sex: Option<String>,
    pub birth: Option<ParsedEvent>,
    pub death: Option<ParsedEvent>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParsedFamily {
    pub id: Option<String>,
    pub husband: Option<String>,
    pub wife: Option<String>,
    pub children: Vec<String>,
    pub marriage: Option<ParsedEvent>,
    pub divorce: Option<ParsedEvent>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParsedSource {
    pub id: Option<String>,
    /// Falls back to "Untitled Source" when the record has no TITL.
    pub title: String,
    pub author: Option<String>,
    pub publication: Option<String>,
    pub date: Option<String>,
    pub repository: Option<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParsedObject {
    pub id: Option<String>,
    /// Passed through exactly as written; validation comments on it but
    /// never rewrites it.
    pub file_path: String,
    pub format: Option<String>,
    pub title: Option<String>,
    pub notes: Vec<String>,
}

// --- VAMSA DOMAIN RECORDS ---
// Persistence-ready shapes. `id` is the supplied id verbatim, or left unset
// for the persistence layer (the import pipeline fills it before building
// edges). `gedcom_xref` keeps the originating xref for idempotent re-import.

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct VamsaPerson {
    pub id: Option<String>,
    pub gedcom_xref: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub sex: Option<String>,
    pub birth_date: Option<String>,
    pub birth_place: Option<String>,
    pub death_date: Option<String>,
    pub death_place: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Directed: `person_a` is the parent, `person_b` the child.
    ParentChild,
    /// Undirected; each pair is stored exactly once.
    Spouse,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct VamsaRelationship {
    pub id: Option<String>,
    pub kind: RelationshipKind,
    pub person_a: String,
    pub person_b: String,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct VamsaSource {
    pub id: Option<String>,
    pub gedcom_xref: Option<String>,
    pub title: String,
    pub author: Option<String>,
    pub publication: Option<String>,
    pub date: Option<String>,
    pub repository: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct VamsaObject {
    pub id: Option<String>,
    pub gedcom_xref: Option<String>,
    pub file_path: String,
    pub format: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
}

/// Entity-event link: ties a source or media object to a person's event.
/// `event_type` is an open string so custom event types survive import.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub entity_id: String,
    pub person_id: String,
    pub event_type: String,
}

// --- DIAGNOSTICS ---

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, strum::Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MappingErrorKind {
    MissingData,
    InvalidFormat,
    BrokenReference,
}

/// Per-record mapping failure. Collected, never fatal for sibling records.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct MappingError {
    pub kind: MappingErrorKind,
    pub record: RecordKind,
    pub record_id: Option<String>,
    pub field: String,
    pub message: String,
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}]: {}: {}",
            self.record,
            self.record_id.as_deref().unwrap_or("?"),
            self.kind,
            self.field,
            self.message
        )
    }
}

/// Legal-but-suspicious data. Never blocks mapping.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub record: RecordKind,
    pub record_id: Option<String>,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}: {}",
            self.record,
            self.record_id.as_deref().unwrap_or("?"),
            self.field,
            self.message
        )
    }
}

/// Outcome of one import run. Partial-success model: an error for one
/// record never removes another record's mapped output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingResult {
    pub persons: Vec<VamsaPerson>,
    pub relationships: Vec<VamsaRelationship>,
    pub sources: Vec<VamsaSource>,
    pub objects: Vec<VamsaObject>,
    pub links: Vec<Link>,
    pub errors: Vec<MappingError>,
    pub warnings: Vec<ValidationWarning>,
}

impl MappingResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self, kind: MappingErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    pub fn entity_count(&self) -> usize {
        self.persons.len() + self.relationships.len() + self.sources.len() + self.objects.len()
    }

    /// One-line run summary for logs and the import-flow UI.
    pub fn summary(&self) -> String {
        use strum::IntoEnumIterator;
        let mut parts = vec![format!("{} entities", self.entity_count())];
        for kind in MappingErrorKind::iter() {
            let n = self.error_count(kind);
            if n > 0 {
                parts.push(format!("{} {}", n, kind));
            }
        }
        if !self.warnings.is_empty() {
            parts.push(format!("{} warnings", self.warnings.len()));
        }
        parts.join(", ")
    }
}
