// File: ./src/import.rs
// Import pipeline: text -> tokens -> records -> Parsed* -> validated ->
// Vamsa* entities + links, with per-record diagnostics. The whole run is a
// pure function of its input; one record's failure never discards another
// record's output, and re-running on the same bytes is always safe.
use crate::model::extract::{
    self, DiskCheck, MediaFileCheck,
};
use crate::model::item::{
    new_entity_id, MappingError, MappingErrorKind, MappingResult, ParsedEvent,
};
use crate::model::mapper::{
    create_event_object_link, create_event_source_link, map_object, map_person,
    map_relationships, map_source,
};
use crate::parser::{self, GedcomFile, ParseError, Record};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Base directory for media existence probes. `None` disables the one
    /// filesystem touch point of the pipeline.
    pub media_base_dir: Option<PathBuf>,
    /// Escalate absolute media paths from warning to blocking error.
    pub strict_paths: bool,
}

/// Parse and map a complete decoded GEDCOM text. A `ParseError` is fatal
/// (no partial result); everything past the parse degrades per record into
/// `MappingResult::errors` / `warnings`.
pub fn import(text: &str, options: &ImportOptions) -> Result<MappingResult, ParseError> {
    let file = parser::parse(text)?;
    let probe = options.media_base_dir.as_deref().map(DiskCheck::new);
    Ok(map_file(
        &file,
        probe.as_ref().map(|p| p as &dyn MediaFileCheck),
        options,
    ))
}

/// Convenience wrapper for callers holding a file path.
pub fn import_path(path: &Path, options: &ImportOptions) -> anyhow::Result<MappingResult> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read GEDCOM file '{}'", path.display()))?;
    let result = import(&text, options)
        .map_err(|e| anyhow::anyhow!("Failed to parse '{}': {}", path.display(), e))?;
    log::info!("Imported '{}': {}", path.display(), result.summary());
    Ok(result)
}

/// Map an already-parsed file. Exposed separately so callers that need the
/// raw records (e.g. a preview screen) parse once.
pub fn map_file(
    file: &GedcomFile,
    probe: Option<&dyn MediaFileCheck>,
    options: &ImportOptions,
) -> MappingResult {
    let mut result = MappingResult::default();

    // Sources and objects first: person event links target their ids.
    let mut source_ids: HashMap<String, String> = HashMap::new();
    let mut seen = HashSet::new();
    for record in &file.sources {
        if skip_duplicate(record, &mut seen, &mut result.errors) {
            continue;
        }
        let parsed = extract::extract_source(record);
        let mut source = map_source(&parsed, None);
        source.id = Some(new_entity_id());
        if let (Some(xref), Some(id)) = (&source.gedcom_xref, &source.id) {
            source_ids.insert(xref.clone(), id.clone());
        }
        result.sources.push(source);
    }

    let mut object_ids: HashMap<String, String> = HashMap::new();
    let mut seen = HashSet::new();
    for record in &file.objects {
        if skip_duplicate(record, &mut seen, &mut result.errors) {
            continue;
        }
        let parsed = extract::extract_object(record);
        let (mut errors, mut warnings) =
            extract::validate_object(&parsed, probe, options.strict_paths);
        let blocking = !errors.is_empty();
        result.errors.append(&mut errors);
        result.warnings.append(&mut warnings);
        if blocking {
            continue;
        }
        let mut object = map_object(&parsed, None);
        object.id = Some(new_entity_id());
        if let (Some(xref), Some(id)) = (&object.gedcom_xref, &object.id) {
            object_ids.insert(xref.clone(), id.clone());
        }
        result.objects.push(object);
    }

    let mut person_ids: HashMap<String, String> = HashMap::new();
    let mut seen = HashSet::new();
    for record in &file.individuals {
        if skip_duplicate(record, &mut seen, &mut result.errors) {
            continue;
        }
        let parsed = extract::extract_individual(record);
        let mut person = map_person(&parsed, None);
        person.id = Some(new_entity_id());
        let person_id = person.id.clone().unwrap_or_default();
        if let Some(xref) = &person.gedcom_xref {
            person_ids.insert(xref.clone(), person_id.clone());
        }
        if let Some(birth) = &parsed.birth {
            link_event(
                birth, "birth", &person_id, record, &source_ids, &object_ids, &mut result,
            );
        }
        if let Some(death) = &parsed.death {
            link_event(
                death, "death", &person_id, record, &source_ids, &object_ids, &mut result,
            );
        }
        result.persons.push(person);
    }

    let mut seen = HashSet::new();
    for record in &file.families {
        if skip_duplicate(record, &mut seen, &mut result.errors) {
            continue;
        }
        let parsed = extract::extract_family(record);
        let (mut relationships, mut errors) = map_relationships(&parsed, &person_ids);
        result.relationships.append(&mut relationships);
        result.errors.append(&mut errors);

        // Spouse events produce one link per resolvable spouse.
        let spouse_ids: Vec<String> = [&parsed.husband, &parsed.wife]
            .into_iter()
            .flatten()
            .filter_map(|xref| person_ids.get(xref).cloned())
            .collect();
        for (event, event_type) in [(&parsed.marriage, "marriage"), (&parsed.divorce, "divorce")]
        {
            if let Some(event) = event {
                for spouse_id in &spouse_ids {
                    link_event(
                        event, event_type, spouse_id, record, &source_ids, &object_ids,
                        &mut result,
                    );
                }
            }
        }
    }

    if !file.others.is_empty() {
        log::info!(
            "Preserved {} unrecognized top-level record(s) without mapping",
            file.others.len()
        );
    }

    result
}

/// Record ids must be unique per kind: the first occurrence wins, later
/// duplicates are reported and skipped.
fn skip_duplicate(
    record: &Record,
    seen: &mut HashSet<String>,
    errors: &mut Vec<MappingError>,
) -> bool {
    let Some(id) = &record.id else {
        return false;
    };
    if seen.insert(id.clone()) {
        return false;
    }
    log::warn!("Duplicate {} xref '{}', keeping the first", record.kind, id);
    errors.push(MappingError {
        kind: MappingErrorKind::InvalidFormat,
        record: record.kind,
        record_id: Some(id.clone()),
        field: "XREF".to_string(),
        message: format!("duplicate xref '{}'; record skipped", id),
    });
    true
}

/// Turn one event's citations into link records. Pointers to records that
/// are not in the file become `broken_reference` errors and no link; the
/// event's owner is unaffected.
fn link_event(
    event: &ParsedEvent,
    event_type: &str,
    person_id: &str,
    record: &Record,
    source_ids: &HashMap<String, String>,
    object_ids: &HashMap<String, String>,
    result: &mut MappingResult,
) {
    for xref in &event.source_refs {
        match source_ids.get(xref) {
            Some(source_id) => result
                .links
                .push(create_event_source_link(source_id, person_id, event_type)),
            None => result.errors.push(broken_event_ref(record, "SOUR", xref)),
        }
    }
    for xref in &event.object_refs {
        match object_ids.get(xref) {
            Some(object_id) => result
                .links
                .push(create_event_object_link(object_id, person_id, event_type)),
            None => result.errors.push(broken_event_ref(record, "OBJE", xref)),
        }
    }
}

fn broken_event_ref(record: &Record, field: &str, xref: &str) -> MappingError {
    MappingError {
        kind: MappingErrorKind::BrokenReference,
        record: record.kind,
        record_id: record.id.clone(),
        field: field.to_string(),
        message: format!("reference to missing record '{}'", xref),
    }
}
