// File: ./src/model/mapper.rs
// Pure Parsed* -> Vamsa* transforms. Every field maps 1:1; validation
// already happened in the extractor. An explicit id is used verbatim
// (idempotent re-import/upsert); otherwise the id stays unset for the
// persistence layer.
use crate::model::item::{
    Link, MappingError, MappingErrorKind, ParsedFamily, ParsedIndividual, ParsedObject,
    ParsedSource, RelationshipKind, VamsaObject, VamsaPerson, VamsaRelationship, VamsaSource,
};
use crate::parser::RecordKind;
use std::collections::HashMap;

/// Join a note list into the single stored field. An empty list maps to
/// absent, which is distinct from an empty string ("no notes" vs "notes
/// field never populated").
pub fn join_notes(notes: &[String]) -> Option<String> {
    if notes.is_empty() {
        None
    } else {
        Some(notes.join("\n"))
    }
}

pub fn map_person(parsed: &ParsedIndividual, explicit_id: Option<String>) -> VamsaPerson {
    VamsaPerson {
        id: explicit_id,
        gedcom_xref: parsed.id.clone(),
        name: parsed.name.clone(),
        first_name: parsed.given_name.clone(),
        last_name: parsed.surname.clone(),
        sex: parsed.sex.clone(),
        birth_date: parsed.birth.as_ref().and_then(|e| e.date.clone()),
        birth_place: parsed.birth.as_ref().and_then(|e| e.place.clone()),
        death_date: parsed.death.as_ref().and_then(|e| e.date.clone()),
        death_place: parsed.death.as_ref().and_then(|e| e.place.clone()),
        notes: join_notes(&parsed.notes),
    }
}

pub fn map_source(parsed: &ParsedSource, explicit_id: Option<String>) -> VamsaSource {
    VamsaSource {
        id: explicit_id,
        gedcom_xref: parsed.id.clone(),
        title: parsed.title.clone(),
        author: parsed.author.clone(),
        publication: parsed.publication.clone(),
        date: parsed.date.clone(),
        repository: parsed.repository.clone(),
        notes: join_notes(&parsed.notes),
    }
}

pub fn map_object(parsed: &ParsedObject, explicit_id: Option<String>) -> VamsaObject {
    VamsaObject {
        id: explicit_id,
        gedcom_xref: parsed.id.clone(),
        file_path: parsed.file_path.clone(),
        format: parsed.format.clone(),
        title: parsed.title.clone(),
        notes: join_notes(&parsed.notes),
    }
}

/// Build relationship edges from one family's pointers. `person_ids` maps
/// xref -> persisted person id. Unresolvable pointers become
/// `broken_reference` errors; every resolvable edge is still produced
/// (partial success within the record).
pub fn map_relationships(
    family: &ParsedFamily,
    person_ids: &HashMap<String, String>,
) -> (Vec<VamsaRelationship>, Vec<MappingError>) {
    let mut relationships = Vec::new();
    let mut errors = Vec::new();

    let resolve = |xref: &str, field: &str, errors: &mut Vec<MappingError>| {
        match person_ids.get(xref) {
            Some(id) => Some(id.clone()),
            None => {
                errors.push(MappingError {
                    kind: MappingErrorKind::BrokenReference,
                    record: RecordKind::Family,
                    record_id: family.id.clone(),
                    field: field.to_string(),
                    message: format!("unknown individual '{}'", xref),
                });
                None
            }
        }
    };

    let husband_id = family
        .husband
        .as_deref()
        .and_then(|x| resolve(x, "HUSB", &mut errors));
    let wife_id = family
        .wife
        .as_deref()
        .and_then(|x| resolve(x, "WIFE", &mut errors));

    // One spouse edge per family, stored once.
    if let (Some(husband), Some(wife)) = (&husband_id, &wife_id) {
        relationships.push(VamsaRelationship {
            id: None,
            kind: RelationshipKind::Spouse,
            person_a: husband.clone(),
            person_b: wife.clone(),
        });
    }

    for child_xref in &family.children {
        let Some(child_id) = resolve(child_xref, "CHIL", &mut errors) else {
            continue;
        };
        for parent_id in [&husband_id, &wife_id].into_iter().flatten() {
            relationships.push(VamsaRelationship {
                id: None,
                kind: RelationshipKind::ParentChild,
                person_a: parent_id.clone(),
                person_b: child_id.clone(),
            });
        }
    }

    (relationships, errors)
}

// Link records deliberately do not constrain `event_type`: custom event
// types must round-trip through import.

pub fn create_event_source_link(
    source_id: impl Into<String>,
    person_id: impl Into<String>,
    event_type: impl Into<String>,
) -> Link {
    Link {
        entity_id: source_id.into(),
        person_id: person_id.into(),
        event_type: event_type.into(),
    }
}

pub fn create_event_object_link(
    object_id: impl Into<String>,
    person_id: impl Into<String>,
    event_type: impl Into<String>,
) -> Link {
    Link {
        entity_id: object_id.into(),
        person_id: person_id.into(),
        event_type: event_type.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::ParsedEvent;

    #[test]
    fn test_three_notes_join_with_newlines() {
        let parsed = ParsedIndividual {
            notes: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            ..Default::default()
        };
        let person = map_person(&parsed, None);
        assert_eq!(person.notes.as_deref(), Some("a\nb\nc"));
    }

    #[test]
    fn test_zero_notes_map_to_absent() {
        let person = map_person(&ParsedIndividual::default(), None);
        assert_eq!(person.notes, None);
    }

    #[test]
    fn test_notes_round_trip_through_join_and_split() {
        let sequences: Vec<Vec<String>> = vec![
            vec!["one".to_string()],
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec!["x".to_string(), "".to_string(), "z".to_string()],
        ];
        for notes in sequences {
            let joined = join_notes(&notes).unwrap();
            let split: Vec<String> = joined.split('\n').map(str::to_string).collect();
            assert_eq!(split, notes);
        }
    }

    #[test]
    fn test_map_person_is_idempotent_with_explicit_id() {
        let parsed = ParsedIndividual {
            id: Some("I1".to_string()),
            name: Some("Robert Young".to_string()),
            birth: Some(ParsedEvent {
                date: Some("1 JAN 1900".to_string()),
                place: Some("Oslo".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let first = map_person(&parsed, Some("person-7".to_string()));
        let second = map_person(&parsed, Some("person-7".to_string()));
        assert_eq!(first, second);
        assert_eq!(first.id.as_deref(), Some("person-7"));
        assert_eq!(first.birth_place.as_deref(), Some("Oslo"));
    }

    #[test]
    fn test_explicit_id_used_verbatim_else_unset() {
        let source = ParsedSource {
            title: "Census".to_string(),
            ..Default::default()
        };
        assert_eq!(
            map_source(&source, Some("src-1".to_string())).id.as_deref(),
            Some("src-1")
        );
        assert_eq!(map_source(&source, None).id, None);
    }

    fn family_fixture() -> ParsedFamily {
        ParsedFamily {
            id: Some("F1".to_string()),
            husband: Some("I1".to_string()),
            wife: Some("I2".to_string()),
            children: vec!["I3".to_string()],
            ..Default::default()
        }
    }

    fn ids(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_family_maps_spouse_once_and_directed_parent_edges() {
        let table = ids(&[("I1", "p1"), ("I2", "p2"), ("I3", "p3")]);
        let (rels, errors) = map_relationships(&family_fixture(), &table);
        assert!(errors.is_empty());
        let spouses: Vec<_> = rels
            .iter()
            .filter(|r| r.kind == RelationshipKind::Spouse)
            .collect();
        assert_eq!(spouses.len(), 1);
        let parents: Vec<_> = rels
            .iter()
            .filter(|r| r.kind == RelationshipKind::ParentChild)
            .collect();
        assert_eq!(parents.len(), 2);
        assert!(parents.iter().all(|r| r.person_b == "p3"));
    }

    #[test]
    fn test_unknown_child_is_broken_reference_but_siblings_survive() {
        let mut family = family_fixture();
        family.children.push("I99".to_string());
        let table = ids(&[("I1", "p1"), ("I2", "p2"), ("I3", "p3")]);
        let (rels, errors) = map_relationships(&family, &table);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, MappingErrorKind::BrokenReference);
        assert_eq!(errors[0].field, "CHIL");
        // The known child still produced both directed edges.
        assert_eq!(
            rels.iter()
                .filter(|r| r.kind == RelationshipKind::ParentChild)
                .count(),
            2
        );
    }

    #[test]
    fn test_event_links_accept_custom_event_types() {
        let link = create_event_source_link("s-1", "p-1", "bar_mitzvah");
        assert_eq!(link.event_type, "bar_mitzvah");
        let link = create_event_object_link("o-1", "p-1", "emigration");
        assert_eq!(link.entity_id, "o-1");
    }
}
