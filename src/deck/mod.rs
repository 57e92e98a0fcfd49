mod write;
mod xml;

use anyhow::{Context, Result, anyhow};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use zip::ZipArchive;

pub use write::{SlideOutput, write_deck};

use xml::{attr, parse_relationships, rels_path, resolve_target};

pub const EMU_PER_INCH: i64 = 914_400;
pub const DEFAULT_SLIDE_WIDTH: i64 = 9_144_000;
pub const DEFAULT_SLIDE_HEIGHT: i64 = 6_858_000;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const NOTES_SLIDE_TYPE: &str = "/notesSlide";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn new(left: i64, top: i64, width: i64, height: i64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> i64 {
        self.left + self.width
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub name: String,
    pub embed: String,
    pub bounds: Rect,
    pub media: Option<String>,
    pub bytes: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub index: usize,
    pub part: String,
    pub rel_id: String,
    pub notes: Option<String>,
    pub pictures: Vec<Picture>,
}

impl Slide {
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    pub width: i64,
    pub height: i64,
    pub slides: Vec<Slide>,
}

pub fn read_deck(bytes: &[u8]) -> Result<Deck> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).with_context(|| "failed to read pptx archive")?;
    let presentation = read_part(&mut archive, PRESENTATION_PART)?
        .ok_or_else(|| anyhow!("missing {}", PRESENTATION_PART))?;
    let (width, height, slide_ids) = parse_presentation(&presentation)?;
    let relationships = match read_part(&mut archive, &rels_path(PRESENTATION_PART))? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };

    let mut slides = Vec::with_capacity(slide_ids.len());
    for (index, rel_id) in slide_ids.into_iter().enumerate() {
        let relationship = relationships
            .get(&rel_id)
            .ok_or_else(|| anyhow!("slide relationship {} not found", rel_id))?;
        let part = resolve_target(PRESENTATION_PART, &relationship.target);
        let xml = read_part(&mut archive, &part)?
            .ok_or_else(|| anyhow!("missing slide part {}", part))?;
        let slide_rels = match read_part(&mut archive, &rels_path(&part))? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };
        let mut pictures = parse_pictures(&xml)
            .with_context(|| format!("failed to parse {}", part))?;
        for picture in &mut pictures {
            picture.media = slide_rels
                .get(&picture.embed)
                .filter(|rel| !rel.external)
                .map(|rel| resolve_target(&part, &rel.target));
            if let Some(media) = &picture.media {
                picture.bytes = read_part(&mut archive, media)?;
            }
        }
        let notes = slide_rels
            .values()
            .find(|rel| rel.kind.ends_with(NOTES_SLIDE_TYPE))
            .map(|rel| resolve_target(&part, &rel.target));
        slides.push(Slide {
            index,
            part,
            rel_id,
            notes,
            pictures,
        });
    }

    Ok(Deck {
        width,
        height,
        slides,
    })
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<Vec<u8>>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("failed to open {}", name)),
    };
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .with_context(|| format!("failed to read {}", name))?;
    Ok(Some(data))
}

fn parse_presentation(xml: &[u8]) -> Result<(i64, i64, Vec<String>)> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut width = None;
    let mut height = None;
    let mut slide_ids = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"sldSz" => {
                    width = attr(&e, b"cx")?.and_then(|value| value.parse().ok());
                    height = attr(&e, b"cy")?.and_then(|value| value.parse().ok());
                }
                b"sldId" => {
                    if let Some(id) = attr(&e, b"r:id")? {
                        slide_ids.push(id);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(anyhow!("failed to parse presentation xml: {}", err)),
        }
        buf.clear();
    }
    Ok((
        width.unwrap_or(DEFAULT_SLIDE_WIDTH),
        height.unwrap_or(DEFAULT_SLIDE_HEIGHT),
        slide_ids,
    ))
}

#[derive(Default)]
struct PictureBuilder {
    name: String,
    embed: Option<String>,
    bounds: Rect,
}

// Only pictures sitting directly in the slide's shape tree count; grouped
// pictures and placeholders nested elsewhere are ignored.
fn parse_pictures(xml: &[u8]) -> Result<Vec<Picture>> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<PictureBuilder> = None;
    let mut pictures = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"pic" && at_tree_root(&stack) {
                    current = Some(PictureBuilder::default());
                }
                if let Some(builder) = current.as_mut() {
                    read_picture_element(builder, &stack, &e)?;
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                if let Some(builder) = current.as_mut() {
                    read_picture_element(builder, &stack, &e)?;
                }
            }
            Ok(Event::End(_)) => {
                let closed = stack.pop();
                if closed.as_deref() == Some(b"pic".as_slice())
                    && at_tree_root(&stack)
                    && let Some(builder) = current.take()
                    && let Some(embed) = builder.embed
                {
                    pictures.push(Picture {
                        name: builder.name,
                        embed,
                        bounds: builder.bounds,
                        media: None,
                        bytes: None,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(anyhow!("failed to parse slide xml: {}", err)),
        }
        buf.clear();
    }
    Ok(pictures)
}

fn at_tree_root(stack: &[Vec<u8>]) -> bool {
    matches!(stack, [.., parent, tree] if parent.as_slice() == b"cSld" && tree.as_slice() == b"spTree")
}

fn read_picture_element(
    builder: &mut PictureBuilder,
    stack: &[Vec<u8>],
    element: &quick_xml::events::BytesStart<'_>,
) -> Result<()> {
    let parent = stack.last().map(Vec::as_slice);
    let grandparent = stack.len().checked_sub(2).map(|idx| stack[idx].as_slice());
    match element.local_name().as_ref() {
        b"cNvPr" if parent == Some(b"nvPicPr".as_slice()) => {
            builder.name = attr(element, b"name")?.unwrap_or_default();
        }
        b"blip" => {
            builder.embed = attr(element, b"r:embed")?;
        }
        b"off" if parent == Some(b"xfrm".as_slice()) && grandparent == Some(b"spPr".as_slice()) => {
            builder.bounds.left = number_attr(element, b"x")?;
            builder.bounds.top = number_attr(element, b"y")?;
        }
        b"ext" if parent == Some(b"xfrm".as_slice()) && grandparent == Some(b"spPr".as_slice()) => {
            builder.bounds.width = number_attr(element, b"cx")?;
            builder.bounds.height = number_attr(element, b"cy")?;
        }
        _ => {}
    }
    Ok(())
}

fn number_attr(element: &quick_xml::events::BytesStart<'_>, name: &[u8]) -> Result<i64> {
    Ok(attr(element, name)?
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0))
}

#[cfg(test)]
pub(crate) mod fixture;
