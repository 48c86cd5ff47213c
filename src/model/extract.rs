// File: ./src/model/extract.rs
// Field extractors: walk one assembled record's tag tree into a typed
// Parsed* view. Total over any well-formed record of the matching kind;
// missing optional tags stay absent rather than failing the record.
use crate::model::item::{
    MappingError, MappingErrorKind, ParsedEvent, ParsedFamily, ParsedIndividual, ParsedObject,
    ParsedSource, ValidationWarning,
};
use crate::parser::{Record, RecordKind};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Display default for sources without a TITL. Real-world producers omit
/// titles routinely; rejecting the record would lose usable citations.
pub const UNTITLED_SOURCE: &str = "Untitled Source";

static FORMAT_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("jpg", "JPEG"),
        ("jpeg", "JPEG"),
        ("tif", "TIFF"),
        ("tiff", "TIFF"),
        ("png", "PNG"),
        ("gif", "GIF"),
        ("bmp", "BMP"),
        ("pdf", "PDF"),
        ("htm", "HTML"),
        ("html", "HTML"),
        ("txt", "TEXT"),
        ("text", "TEXT"),
        ("wav", "WAV"),
        ("mp3", "MP3"),
        ("mp4", "MP4"),
    ])
});

/// Canonical media format for any non-empty token. Known aliases map
/// case-insensitively; unknown tokens pass through upper-cased so future
/// formats survive import.
pub fn normalize_format(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    match FORMAT_ALIASES.get(lower.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => raw.trim().to_uppercase(),
    }
}

/// Resolve CONT/CONC continuations for the line at `idx`, in document
/// order: CONT appends a newline plus its value, CONC appends the value
/// bare. Stops at the first line that is not a continuation child.
fn value_with_continuations(record: &Record, idx: usize) -> String {
    let lines = record.lines();
    let mut text = lines[idx].value.clone();
    let cont_level = lines[idx].level + 1;
    for line in &lines[idx + 1..] {
        if line.level != cont_level {
            break;
        }
        match line.tag.as_str() {
            "CONT" => {
                text.push('\n');
                text.push_str(&line.value);
            }
            "CONC" => text.push_str(&line.value),
            _ => break,
        }
    }
    text
}

fn extract_notes(record: &Record) -> Vec<String> {
    record
        .children("NOTE")
        .into_iter()
        .map(|idx| value_with_continuations(record, idx))
        .collect()
}

fn trimmed_child_value(record: &Record, tag: &str) -> Option<String> {
    record
        .child_value(tag)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Extract one event sub-tree (BIRT, DEAT, MARR, DIV). Returns `None` when
/// the event tag is absent; an event with no recognized detail still
/// returns an empty `ParsedEvent` so "event happened" survives.
fn extract_event(record: &Record, tag: &str) -> Option<ParsedEvent> {
    let idx = record.find_child(tag)?;
    let lines = record.lines();
    let detail_level = lines[idx].level + 1;
    let mut event = ParsedEvent::default();

    for line in record.subtree(idx) {
        if line.level == detail_level {
            match line.tag.as_str() {
                "DATE" if event.date.is_none() => {
                    event.date = Some(line.value.trim().to_string());
                }
                "PLAC" if event.place.is_none() => {
                    event.place = Some(line.value.trim().to_string());
                }
                _ => {}
            }
        }
        // Citations may sit below DATE or other detail lines; collect
        // pointers from the whole sub-tree, first-seen order, exact
        // repeats collapsed to one logical reference.
        if let Some(pointer) = &line.pointer {
            match line.tag.as_str() {
                "SOUR" if !event.source_refs.contains(pointer) => {
                    event.source_refs.push(pointer.clone());
                }
                "OBJE" if !event.object_refs.contains(pointer) => {
                    event.object_refs.push(pointer.clone());
                }
                _ => {}
            }
        }
    }
    Some(event)
}

/// Split a GEDCOM NAME value ("Given /Surname/ suffix") into display,
/// given and surname parts.
fn split_name(raw: &str) -> (Option<String>, Option<String>, Option<String>) {
    let raw = raw.trim();
    if raw.is_empty() {
        return (None, None, None);
    }
    match raw.split_once('/') {
        Some((before, rest)) => {
            let (surname, after) = rest.split_once('/').unwrap_or((rest, ""));
            let display = [before.trim(), surname.trim(), after.trim()]
                .iter()
                .filter(|part| !part.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            let given = Some(before.trim().to_string()).filter(|s| !s.is_empty());
            let surname = Some(surname.trim().to_string()).filter(|s| !s.is_empty());
            (Some(display).filter(|s| !s.is_empty()), given, surname)
        }
        None => (
            Some(raw.to_string()),
            Some(raw.to_string()),
            None,
        ),
    }
}

pub fn extract_individual(record: &Record) -> ParsedIndividual {
    let mut parsed = ParsedIndividual {
        id: record.id.clone(),
        ..Default::default()
    };
    if let Some(raw) = record.child_value("NAME") {
        let (name, given, surname) = split_name(raw);
        parsed.name = name;
        parsed.given_name = given;
        parsed.surname = surname;
    }
    parsed.sex = trimmed_child_value(record, "SEX");
    parsed.birth = extract_event(record, "BIRT");
    parsed.death = extract_event(record, "DEAT");
    parsed.notes = extract_notes(record);
    parsed
}

pub fn extract_family(record: &Record) -> ParsedFamily {
    let lines = record.lines();
    let mut parsed = ParsedFamily {
        id: record.id.clone(),
        ..Default::default()
    };
    parsed.husband = record
        .find_child("HUSB")
        .and_then(|idx| lines[idx].pointer.clone());
    parsed.wife = record
        .find_child("WIFE")
        .and_then(|idx| lines[idx].pointer.clone());
    for idx in record.children("CHIL") {
        if let Some(pointer) = &lines[idx].pointer
            && !parsed.children.contains(pointer)
        {
            parsed.children.push(pointer.clone());
        }
    }
    parsed.marriage = extract_event(record, "MARR");
    parsed.divorce = extract_event(record, "DIV");
    parsed.notes = extract_notes(record);
    parsed
}

pub fn extract_source(record: &Record) -> ParsedSource {
    let mut parsed = ParsedSource {
        id: record.id.clone(),
        ..Default::default()
    };
    parsed.title = record
        .find_child("TITL")
        .map(|idx| value_with_continuations(record, idx).trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED_SOURCE.to_string());
    parsed.author = record
        .find_child("AUTH")
        .map(|idx| value_with_continuations(record, idx).trim().to_string())
        .filter(|v| !v.is_empty());
    parsed.publication = record
        .find_child("PUBL")
        .map(|idx| value_with_continuations(record, idx).trim().to_string())
        .filter(|v| !v.is_empty());
    parsed.date = trimmed_child_value(record, "DATE");
    // Repositories are usually pointers to REPO records; inline values
    // occur in older exports and are kept as-is.
    parsed.repository = record.find_child("REPO").and_then(|idx| {
        let line = &record.lines()[idx];
        line.pointer
            .clone()
            .or_else(|| Some(line.value.trim().to_string()).filter(|v| !v.is_empty()))
    });
    parsed.notes = extract_notes(record);
    parsed
}

pub fn extract_object(record: &Record) -> ParsedObject {
    let lines = record.lines();
    let mut parsed = ParsedObject {
        id: record.id.clone(),
        ..Default::default()
    };
    // 5.5.1 nests FORM under FILE; 5.5 keeps it at level 1. Take the first
    // occurrence anywhere in the record for both.
    if let Some(&idx) = record.descendant_indices("FILE").first() {
        parsed.file_path = lines[idx].value.clone();
    }
    parsed.format = record
        .descendant_indices("FORM")
        .first()
        .map(|&idx| normalize_format(&lines[idx].value))
        .filter(|f| !f.is_empty());
    parsed.title = record
        .descendant_indices("TITL")
        .first()
        .map(|&idx| value_with_continuations(record, idx).trim().to_string())
        .filter(|t| !t.is_empty());
    parsed.notes = extract_notes(record);
    parsed
}

// --- OBJECT VALIDATION ---

/// The single point where this core may touch the filesystem. Injected so
/// everything else stays unit-testable without a disk.
pub trait MediaFileCheck {
    fn exists(&self, path: &Path) -> bool;
}

/// Production probe: resolves relative paths against the media base
/// directory supplied by the caller.
pub struct DiskCheck {
    base_dir: PathBuf,
}

impl DiskCheck {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        DiskCheck {
            base_dir: base_dir.into(),
        }
    }
}

impl MediaFileCheck for DiskCheck {
    fn exists(&self, path: &Path) -> bool {
        self.base_dir.join(path).exists()
    }
}

/// Validate an extracted media object. Blocking errors only for
/// structurally required data that is missing; everything else that is
/// legal but suspicious becomes a warning. `strict_paths` escalates the
/// absolute-path warning to a blocking error (caller policy).
pub fn validate_object(
    parsed: &ParsedObject,
    check: Option<&dyn MediaFileCheck>,
    strict_paths: bool,
) -> (Vec<MappingError>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if parsed.file_path.trim().is_empty() {
        errors.push(MappingError {
            kind: MappingErrorKind::MissingData,
            record: RecordKind::Object,
            record_id: parsed.id.clone(),
            field: "FILE".to_string(),
            message: "file path is empty".to_string(),
        });
        return (errors, warnings);
    }

    let path = Path::new(parsed.file_path.trim());
    if path.is_absolute() {
        let message = format!(
            "Absolute path: '{}' will not survive moving the media folder",
            parsed.file_path.trim()
        );
        if strict_paths {
            errors.push(MappingError {
                kind: MappingErrorKind::InvalidFormat,
                record: RecordKind::Object,
                record_id: parsed.id.clone(),
                field: "FILE".to_string(),
                message,
            });
        } else {
            warnings.push(ValidationWarning {
                record: RecordKind::Object,
                record_id: parsed.id.clone(),
                field: "FILE".to_string(),
                message,
            });
        }
    }

    if let Some(check) = check
        && !check.exists(path)
    {
        warnings.push(ValidationWarning {
            record: RecordKind::Object,
            record_id: parsed.id.clone(),
            field: "FILE".to_string(),
            message: format!("File not found: '{}'", parsed.file_path.trim()),
        });
    }

    (errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn single_record(text: &str) -> Record {
        let file = parse(text).unwrap();
        file.individuals
            .into_iter()
            .chain(file.families)
            .chain(file.sources)
            .chain(file.objects)
            .next()
            .expect("fixture should contain one record")
    }

    #[test]
    fn test_extract_object_file_form_title() {
        let record = single_record(
            "0 @O1@ OBJE\n1 FILE photos/robert_young.jpg\n2 FORM JPEG\n1 TITL Young Robert Portrait\n",
        );
        let parsed = extract_object(&record);
        assert_eq!(parsed.file_path, "photos/robert_young.jpg");
        assert_eq!(parsed.format.as_deref(), Some("JPEG"));
        assert_eq!(parsed.title.as_deref(), Some("Young Robert Portrait"));
    }

    #[test]
    fn test_source_without_title_gets_placeholder() {
        let record = single_record("0 @S1@ SOUR\n1 AUTH Jane Historian\n");
        let parsed = extract_source(&record);
        assert_eq!(parsed.title, "Untitled Source");
        assert_eq!(parsed.author.as_deref(), Some("Jane Historian"));
    }

    #[test]
    fn test_event_source_refs_deduplicate() {
        let record = single_record(
            "0 @I1@ INDI\n1 BIRT\n2 DATE 1 JAN 1900\n2 SOUR @S1@\n2 SOUR @S1@\n2 SOUR @S2@\n",
        );
        let birth = extract_individual(&record).birth.unwrap();
        assert_eq!(birth.source_refs, vec!["S1", "S2"]);
    }

    #[test]
    fn test_event_refs_absent_yields_empty_not_error() {
        let record = single_record("0 @I1@ INDI\n1 NAME A /B/\n");
        let parsed = extract_individual(&record);
        assert!(parsed.birth.is_none());
        let record = single_record("0 @I1@ INDI\n1 BIRT\n");
        let birth = extract_individual(&record).birth.unwrap();
        assert!(birth.source_refs.is_empty());
        assert!(birth.object_refs.is_empty());
    }

    #[test]
    fn test_cont_adds_newline_conc_does_not() {
        let record = single_record(
            "0 @I1@ INDI\n1 NOTE First line\n2 CONT second line, conti\n2 CONC nued without break\n",
        );
        let parsed = extract_individual(&record);
        assert_eq!(
            parsed.notes,
            vec!["First line\nsecond line, continued without break"]
        );
    }

    #[test]
    fn test_continuation_stops_at_next_sibling() {
        let record =
            single_record("0 @I1@ INDI\n1 NOTE one\n1 NOTE two\n2 CONT more of two\n");
        let parsed = extract_individual(&record);
        assert_eq!(parsed.notes, vec!["one", "two\nmore of two"]);
    }

    #[test]
    fn test_name_splits_on_surname_slashes() {
        let record = single_record("0 @I1@ INDI\n1 NAME Robert /Young/ Jr\n1 SEX M\n");
        let parsed = extract_individual(&record);
        assert_eq!(parsed.name.as_deref(), Some("Robert Young Jr"));
        assert_eq!(parsed.given_name.as_deref(), Some("Robert"));
        assert_eq!(parsed.surname.as_deref(), Some("Young"));
        assert_eq!(parsed.sex.as_deref(), Some("M"));
    }

    #[test]
    fn test_name_without_slashes_is_given_only() {
        let record = single_record("0 @I1@ INDI\n1 NAME Madonna\n");
        let parsed = extract_individual(&record);
        assert_eq!(parsed.name.as_deref(), Some("Madonna"));
        assert_eq!(parsed.surname, None);
    }

    #[test]
    fn test_extract_family_pointers() {
        let record = single_record(
            "0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n1 CHIL @I3@\n1 CHIL @I4@\n1 CHIL @I3@\n1 MARR\n2 DATE 5 MAY 1920\n2 PLAC Bergen\n",
        );
        let parsed = extract_family(&record);
        assert_eq!(parsed.husband.as_deref(), Some("I1"));
        assert_eq!(parsed.wife.as_deref(), Some("I2"));
        assert_eq!(parsed.children, vec!["I3", "I4"]);
        let marriage = parsed.marriage.unwrap();
        assert_eq!(marriage.date.as_deref(), Some("5 MAY 1920"));
        assert_eq!(marriage.place.as_deref(), Some("Bergen"));
    }

    #[test]
    fn test_normalize_format_aliases_case_insensitive() {
        assert_eq!(normalize_format("jpg"), "JPEG");
        assert_eq!(normalize_format("JPG"), "JPEG");
        assert_eq!(normalize_format("Jpg"), "JPEG");
        assert_eq!(normalize_format("tif"), "TIFF");
        assert_eq!(normalize_format("jpeg"), "JPEG");
    }

    #[test]
    fn test_normalize_format_unknown_passes_through_uppercased() {
        assert_eq!(normalize_format("webp"), "WEBP");
        assert_eq!(normalize_format("  heic "), "HEIC");
    }

    #[test]
    fn test_validate_empty_path_is_blocking() {
        let parsed = ParsedObject {
            id: Some("O1".to_string()),
            file_path: "   ".to_string(),
            ..Default::default()
        };
        let (errors, warnings) = validate_object(&parsed, None, false);
        assert!(!errors.is_empty());
        assert_eq!(errors[0].kind, MappingErrorKind::MissingData);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_validate_absolute_path_warns() {
        let parsed = ParsedObject {
            id: Some("O1".to_string()),
            file_path: "/abs/path.jpg".to_string(),
            ..Default::default()
        };
        let (errors, warnings) = validate_object(&parsed, None, false);
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("Absolute path"));
    }

    #[test]
    fn test_validate_strict_paths_escalates() {
        let parsed = ParsedObject {
            file_path: "/abs/path.jpg".to_string(),
            ..Default::default()
        };
        let (errors, warnings) = validate_object(&parsed, None, true);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, MappingErrorKind::InvalidFormat);
        assert!(warnings.is_empty());
    }

    struct NeverThere;
    impl MediaFileCheck for NeverThere {
        fn exists(&self, _path: &Path) -> bool {
            false
        }
    }

    #[test]
    fn test_validate_missing_file_warns_only_with_probe() {
        let parsed = ParsedObject {
            file_path: "photos/lost.jpg".to_string(),
            ..Default::default()
        };
        let (errors, warnings) = validate_object(&parsed, None, false);
        assert!(errors.is_empty() && warnings.is_empty());

        let (errors, warnings) = validate_object(&parsed, Some(&NeverThere), false);
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("File not found"));
    }

    struct AlwaysThere;
    impl MediaFileCheck for AlwaysThere {
        fn exists(&self, _path: &Path) -> bool {
            true
        }
    }

    #[test]
    fn test_present_file_yields_no_warning() {
        let parsed = ParsedObject {
            file_path: "photos/here.jpg".to_string(),
            ..Default::default()
        };
        let (errors, warnings) = validate_object(&parsed, Some(&AlwaysThere), false);
        assert!(errors.is_empty() && warnings.is_empty());
    }
}
