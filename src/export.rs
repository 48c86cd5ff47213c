// File: ./src/export.rs
// Render Vamsa entities back to GEDCOM 5.5.1 text. Deterministic for a
// given bundle: xrefs are assigned sequentially in input order so export
// then re-import round-trips cleanly.
use crate::model::item::{
    Link, RelationshipKind, VamsaObject, VamsaPerson, VamsaRelationship, VamsaSource,
};
use std::collections::HashMap;

/// Values longer than this are wrapped with CONC continuation lines;
/// GEDCOM 5.5.1 caps physical lines at 255 characters.
const MAX_VALUE_LEN: usize = 200;

#[derive(Debug, Clone, Default)]
pub struct ExportBundle {
    pub persons: Vec<VamsaPerson>,
    pub relationships: Vec<VamsaRelationship>,
    pub sources: Vec<VamsaSource>,
    pub objects: Vec<VamsaObject>,
    pub links: Vec<Link>,
}

struct FamilyOut {
    husband: Option<String>,
    wife: Option<String>,
    children: Vec<String>,
}

pub fn export(bundle: &ExportBundle) -> String {
    let mut out = String::new();

    // Entity id -> assigned xref, in input order.
    let person_xrefs: HashMap<&str, String> = bundle
        .persons
        .iter()
        .enumerate()
        .filter_map(|(i, p)| Some((p.id.as_deref()?, format!("I{}", i + 1))))
        .collect();
    let source_xrefs: HashMap<&str, String> = bundle
        .sources
        .iter()
        .enumerate()
        .filter_map(|(i, s)| Some((s.id.as_deref()?, format!("S{}", i + 1))))
        .collect();
    let object_xrefs: HashMap<&str, String> = bundle
        .objects
        .iter()
        .enumerate()
        .filter_map(|(i, o)| Some((o.id.as_deref()?, format!("O{}", i + 1))))
        .collect();

    push_line(&mut out, 0, None, "HEAD", "");
    push_line(&mut out, 1, None, "SOUR", "VAMSA");
    push_line(&mut out, 1, None, "GEDC", "");
    push_line(&mut out, 2, None, "VERS", "5.5.1");
    push_line(&mut out, 2, None, "FORM", "LINEAGE-LINKED");
    push_line(&mut out, 1, None, "CHAR", "UTF-8");

    for (i, person) in bundle.persons.iter().enumerate() {
        let xref = format!("I{}", i + 1);
        push_line(&mut out, 0, Some(&xref), "INDI", "");
        if let Some(name) = gedcom_name(person) {
            push_line(&mut out, 1, None, "NAME", &name);
        }
        if let Some(sex) = &person.sex {
            push_line(&mut out, 1, None, "SEX", sex);
        }
        let person_id = person.id.as_deref().unwrap_or("");
        push_event(
            &mut out,
            "BIRT",
            "birth",
            person_id,
            person.birth_date.as_deref(),
            person.birth_place.as_deref(),
            bundle,
            &source_xrefs,
            &object_xrefs,
        );
        push_event(
            &mut out,
            "DEAT",
            "death",
            person_id,
            person.death_date.as_deref(),
            person.death_place.as_deref(),
            bundle,
            &source_xrefs,
            &object_xrefs,
        );
        if let Some(notes) = &person.notes {
            push_text(&mut out, 1, "NOTE", notes);
        }
    }

    for (i, family) in build_families(bundle).iter().enumerate() {
        let xref = format!("F{}", i + 1);
        push_line(&mut out, 0, Some(&xref), "FAM", "");
        if let Some(husband) = family.husband.as_deref()
            && let Some(hx) = person_xrefs.get(husband)
        {
            push_line(&mut out, 1, None, "HUSB", &format!("@{}@", hx));
        }
        if let Some(wife) = family.wife.as_deref()
            && let Some(wx) = person_xrefs.get(wife)
        {
            push_line(&mut out, 1, None, "WIFE", &format!("@{}@", wx));
        }
        for child in &family.children {
            if let Some(cx) = person_xrefs.get(child.as_str()) {
                push_line(&mut out, 1, None, "CHIL", &format!("@{}@", cx));
            }
        }
        push_family_event(&mut out, "MARR", "marriage", family, bundle, &source_xrefs);
        push_family_event(&mut out, "DIV", "divorce", family, bundle, &source_xrefs);
    }

    for (i, source) in bundle.sources.iter().enumerate() {
        let xref = format!("S{}", i + 1);
        push_line(&mut out, 0, Some(&xref), "SOUR", "");
        push_text(&mut out, 1, "TITL", &source.title);
        if let Some(author) = &source.author {
            push_text(&mut out, 1, "AUTH", author);
        }
        if let Some(publication) = &source.publication {
            push_text(&mut out, 1, "PUBL", publication);
        }
        if let Some(date) = &source.date {
            push_line(&mut out, 1, None, "DATE", date);
        }
        if let Some(repository) = &source.repository {
            push_line(&mut out, 1, None, "REPO", repository);
        }
        if let Some(notes) = &source.notes {
            push_text(&mut out, 1, "NOTE", notes);
        }
    }

    for (i, object) in bundle.objects.iter().enumerate() {
        let xref = format!("O{}", i + 1);
        push_line(&mut out, 0, Some(&xref), "OBJE", "");
        push_line(&mut out, 1, None, "FILE", &object.file_path);
        if let Some(format) = &object.format {
            push_line(&mut out, 2, None, "FORM", format);
        }
        if let Some(title) = &object.title {
            push_text(&mut out, 1, "TITL", title);
        }
        if let Some(notes) = &object.notes {
            push_text(&mut out, 1, "NOTE", notes);
        }
    }

    push_line(&mut out, 0, None, "TRLR", "");
    out
}

/// Rebuild FAM groupings from the flat relationship edge list. Spouse
/// edges seed families; each child attaches to the family formed by its
/// parents, creating a parents-only family when no spouse edge exists.
fn build_families(bundle: &ExportBundle) -> Vec<FamilyOut> {
    let sex_of: HashMap<&str, &str> = bundle
        .persons
        .iter()
        .filter_map(|p| Some((p.id.as_deref()?, p.sex.as_deref()?)))
        .collect();
    let ordered = |a: &str, b: &str| -> (Option<String>, Option<String>) {
        // HUSB/WIFE slots follow recorded sex; an undecidable pair keeps
        // the stored order.
        if sex_of.get(b) == Some(&"M") && sex_of.get(a) != Some(&"M") {
            (Some(b.to_string()), Some(a.to_string()))
        } else {
            (Some(a.to_string()), Some(b.to_string()))
        }
    };
    let pair_key = |a: &str, b: &str| -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    };

    let mut families: Vec<FamilyOut> = Vec::new();
    let mut by_parents: HashMap<(String, String), usize> = HashMap::new();

    for edge in &bundle.relationships {
        if edge.kind != RelationshipKind::Spouse {
            continue;
        }
        let key = pair_key(&edge.person_a, &edge.person_b);
        if by_parents.contains_key(&key) {
            continue;
        }
        let (husband, wife) = ordered(&edge.person_a, &edge.person_b);
        by_parents.insert(key, families.len());
        families.push(FamilyOut {
            husband,
            wife,
            children: Vec::new(),
        });
    }

    // Collect each child's parents in edge order.
    let mut child_parents: Vec<(String, Vec<String>)> = Vec::new();
    for edge in &bundle.relationships {
        if edge.kind != RelationshipKind::ParentChild {
            continue;
        }
        match child_parents.iter_mut().find(|(c, _)| *c == edge.person_b) {
            Some((_, parents)) => {
                if !parents.contains(&edge.person_a) {
                    parents.push(edge.person_a.clone());
                }
            }
            None => child_parents.push((edge.person_b.clone(), vec![edge.person_a.clone()])),
        }
    }

    for (child, parents) in child_parents {
        let key = match parents.as_slice() {
            [single] => pair_key(single, ""),
            [a, b, ..] => pair_key(a, b),
            [] => continue,
        };
        let idx = match by_parents.get(&key) {
            Some(&idx) => idx,
            None => {
                let family = match parents.as_slice() {
                    [single] => FamilyOut {
                        husband: Some(single.clone()),
                        wife: None,
                        children: Vec::new(),
                    },
                    [a, b, ..] => {
                        let (husband, wife) = ordered(a, b);
                        FamilyOut {
                            husband,
                            wife,
                            children: Vec::new(),
                        }
                    }
                    [] => unreachable!(),
                };
                by_parents.insert(key, families.len());
                families.push(family);
                families.len() - 1
            }
        };
        families[idx].children.push(child);
    }

    families
}

/// Surname goes back between slashes: "Robert /Young/".
fn gedcom_name(person: &VamsaPerson) -> Option<String> {
    match (&person.first_name, &person.last_name) {
        (Some(first), Some(last)) => Some(format!("{} /{}/", first, last)),
        (Some(first), None) => Some(first.clone()),
        (None, Some(last)) => Some(format!("/{}/", last)),
        (None, None) => person.name.clone(),
    }
}

fn event_links<'a>(
    bundle: &'a ExportBundle,
    person_id: &str,
    event_type: &str,
) -> impl Iterator<Item = &'a Link> {
    let person_id = person_id.to_string();
    let event_type = event_type.to_string();
    bundle
        .links
        .iter()
        .filter(move |l| l.person_id == person_id && l.event_type == event_type)
}

#[allow(clippy::too_many_arguments)]
fn push_event(
    out: &mut String,
    tag: &str,
    event_type: &str,
    person_id: &str,
    date: Option<&str>,
    place: Option<&str>,
    bundle: &ExportBundle,
    source_xrefs: &HashMap<&str, String>,
    object_xrefs: &HashMap<&str, String>,
) {
    let mut citations: Vec<String> = Vec::new();
    if !person_id.is_empty() {
        for link in event_links(bundle, person_id, event_type) {
            let line = if let Some(sx) = source_xrefs.get(link.entity_id.as_str()) {
                format!("SOUR @{}@", sx)
            } else if let Some(ox) = object_xrefs.get(link.entity_id.as_str()) {
                format!("OBJE @{}@", ox)
            } else {
                continue;
            };
            if !citations.contains(&line) {
                citations.push(line);
            }
        }
    }
    if date.is_none() && place.is_none() && citations.is_empty() {
        return;
    }
    push_line(out, 1, None, tag, "");
    if let Some(date) = date {
        push_line(out, 2, None, "DATE", date);
    }
    if let Some(place) = place {
        push_line(out, 2, None, "PLAC", place);
    }
    for citation in citations {
        let (tag, value) = citation.split_once(' ').unwrap_or((citation.as_str(), ""));
        push_line(out, 2, None, tag, value);
    }
}

/// MARR/DIV citations come from spouse-keyed links; entities are emitted
/// once per family even when both spouses carry the link.
fn push_family_event(
    out: &mut String,
    tag: &str,
    event_type: &str,
    family: &FamilyOut,
    bundle: &ExportBundle,
    source_xrefs: &HashMap<&str, String>,
) {
    let mut citations: Vec<&String> = Vec::new();
    for spouse in [&family.husband, &family.wife].into_iter().flatten() {
        for link in event_links(bundle, spouse, event_type) {
            if let Some(sx) = source_xrefs.get(link.entity_id.as_str())
                && !citations.contains(&sx)
            {
                citations.push(sx);
            }
        }
    }
    if citations.is_empty() {
        return;
    }
    push_line(out, 1, None, tag, "");
    for sx in citations {
        push_line(out, 2, None, "SOUR", &format!("@{}@", sx));
    }
}

fn push_line(out: &mut String, level: u8, xref: Option<&str>, tag: &str, value: &str) {
    out.push_str(&level.to_string());
    if let Some(xref) = xref {
        out.push_str(" @");
        out.push_str(xref);
        out.push('@');
    }
    out.push(' ');
    out.push_str(tag);
    if !value.is_empty() {
        out.push(' ');
        out.push_str(value);
    }
    out.push('\n');
}

/// Emit a text value: newlines become CONT children, over-long segments
/// are wrapped with CONC.
fn push_text(out: &mut String, level: u8, tag: &str, text: &str) {
    for (i, segment) in text.split('\n').enumerate() {
        let chunks = wrap_chunks(segment);
        let (first_tag, first_level) = if i == 0 { (tag, level) } else { ("CONT", level + 1) };
        push_line(out, first_level, None, first_tag, chunks[0]);
        for chunk in &chunks[1..] {
            push_line(out, level + 1, None, "CONC", chunk);
        }
    }
}

/// Split at char boundaries every `MAX_VALUE_LEN` characters. Always
/// returns at least one (possibly empty) chunk.
fn wrap_chunks(segment: &str) -> Vec<&str> {
    if segment.chars().count() <= MAX_VALUE_LEN {
        return vec![segment];
    }
    let mut chunks = Vec::new();
    let mut rest = segment;
    while rest.chars().count() > MAX_VALUE_LEN {
        let split = rest
            .char_indices()
            .nth(MAX_VALUE_LEN)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(split);
        chunks.push(head);
        rest = tail;
    }
    chunks.push(rest);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: &str, first: &str, last: &str) -> VamsaPerson {
        VamsaPerson {
            id: Some(id.to_string()),
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_export_emits_header_and_trailer() {
        let text = export(&ExportBundle::default());
        assert!(text.starts_with("0 HEAD\n"));
        assert!(text.contains("2 VERS 5.5.1\n"));
        assert!(text.contains("1 CHAR UTF-8\n"));
        assert!(text.ends_with("0 TRLR\n"));
    }

    #[test]
    fn test_export_assigns_sequential_xrefs() {
        let bundle = ExportBundle {
            persons: vec![person("p1", "A", "B"), person("p2", "C", "D")],
            ..Default::default()
        };
        let text = export(&bundle);
        assert!(text.contains("0 @I1@ INDI\n1 NAME A /B/\n"));
        assert!(text.contains("0 @I2@ INDI\n1 NAME C /D/\n"));
    }

    #[test]
    fn test_export_splits_notes_into_cont() {
        let mut p = person("p1", "A", "B");
        p.notes = Some("line one\nline two".to_string());
        let bundle = ExportBundle {
            persons: vec![p],
            ..Default::default()
        };
        let text = export(&bundle);
        assert!(text.contains("1 NOTE line one\n2 CONT line two\n"));
    }

    #[test]
    fn test_export_wraps_long_values_with_conc() {
        let mut p = person("p1", "A", "B");
        p.notes = Some("x".repeat(450));
        let text = export(&ExportBundle {
            persons: vec![p],
            ..Default::default()
        });
        assert_eq!(text.matches("2 CONC ").count(), 2);
    }

    #[test]
    fn test_spouse_edge_becomes_family() {
        let mut wife = person("p2", "C", "D");
        wife.sex = Some("F".to_string());
        let mut husband = person("p1", "A", "B");
        husband.sex = Some("M".to_string());
        let bundle = ExportBundle {
            persons: vec![husband, wife, person("p3", "E", "B")],
            relationships: vec![
                VamsaRelationship {
                    id: None,
                    kind: RelationshipKind::Spouse,
                    person_a: "p1".to_string(),
                    person_b: "p2".to_string(),
                },
                VamsaRelationship {
                    id: None,
                    kind: RelationshipKind::ParentChild,
                    person_a: "p1".to_string(),
                    person_b: "p3".to_string(),
                },
                VamsaRelationship {
                    id: None,
                    kind: RelationshipKind::ParentChild,
                    person_a: "p2".to_string(),
                    person_b: "p3".to_string(),
                },
            ],
            ..Default::default()
        };
        let text = export(&bundle);
        assert!(text.contains("0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n1 CHIL @I3@\n"));
    }
}
