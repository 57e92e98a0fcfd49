use anyhow::{Result, anyhow};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub target: String,
    pub kind: String,
    pub external: bool,
}

pub fn attr(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attribute in element.attributes() {
        let attribute = attribute?;
        if attribute.key.as_ref() == name {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

pub fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, Relationship>> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut relationships = HashMap::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(&e, b"Id")?, attr(&e, b"Target")?) {
                    let external =
                        attr(&e, b"TargetMode")?.is_some_and(|mode| mode == "External");
                    relationships.insert(
                        id,
                        Relationship {
                            target,
                            kind: attr(&e, b"Type")?.unwrap_or_default(),
                            external,
                        },
                    );
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(anyhow!("failed to parse relationships: {}", err)),
        }
        buf.clear();
    }
    Ok(relationships)
}

// ppt/slides/slide1.xml -> ppt/slides/_rels/slide1.xml.rels
pub fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

pub fn resolve_target(owner: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match owner.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

// Copies the document, leaving out every element (with its children) the
// predicate selects.
pub fn filter_elements<F>(xml: &[u8], mut remove: F) -> Result<Vec<u8>>
where
    F: FnMut(&BytesStart<'_>) -> Result<bool>,
{
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();
    let mut skipping = 0usize;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if skipping > 0 {
                    skipping += 1;
                } else if remove(&e)? {
                    skipping = 1;
                } else {
                    writer.write_event(Event::Start(e))?;
                }
            }
            Ok(Event::End(e)) => {
                if skipping > 0 {
                    skipping -= 1;
                } else {
                    writer.write_event(Event::End(e))?;
                }
            }
            Ok(Event::Empty(e)) => {
                if skipping == 0 && !remove(&e)? {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Ok(Event::Eof) => break,
            Ok(event) => {
                if skipping == 0 {
                    writer.write_event(event)?;
                }
            }
            Err(err) => return Err(anyhow!("failed to parse xml: {}", err)),
        }
        buf.clear();
    }
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_targets() {
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../media/image1.png"),
            "ppt/media/image1.png"
        );
        assert_eq!(
            resolve_target("ppt/presentation.xml", "slides/slide2.xml"),
            "ppt/slides/slide2.xml"
        );
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "/ppt/media/a.png"),
            "ppt/media/a.png"
        );
        assert_eq!(rels_path("ppt/presentation.xml"), "ppt/_rels/presentation.xml.rels");
    }

    #[test]
    fn reads_relationships() {
        let xml = br#"<?xml version="1.0"?><Relationships xmlns="x">
            <Relationship Id="rId1" Type="http://x/slide" Target="slides/slide1.xml"/>
            <Relationship Id="rId2" Type="http://x/hyperlink" Target="https://example.com" TargetMode="External"/>
        </Relationships>"#;
        let rels = parse_relationships(xml).expect("rels");
        assert_eq!(rels["rId1"].target, "slides/slide1.xml");
        assert!(!rels["rId1"].external);
        assert!(rels["rId2"].external);
    }

    #[test]
    fn filter_drops_selected_elements_with_children() {
        let xml = br#"<root><keep a="1"/><drop><inner/></drop><drop/><keep a="2">t</keep></root>"#;
        let out = filter_elements(xml, |e| Ok(e.local_name().as_ref() == b"drop")).expect("filter");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            r#"<root><keep a="1"/><keep a="2">t</keep></root>"#
        );
    }
}
