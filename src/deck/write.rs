use anyhow::{Context, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use super::xml::{attr, filter_elements, rels_path};
use super::{Deck, EMU_PER_INCH, PRESENTATION_PART, Picture, Rect};
use crate::document::Alignment;
use crate::render::{Paragraph, TextFrame};

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const TEXT_INSET: i64 = EMU_PER_INCH / 10;
const TEXT_BOX_NAME: &str = "Translated Text";

#[derive(Debug, Clone, PartialEq)]
pub struct SlideOutput {
    pub slide_index: usize,
    pub picture: Picture,
    pub text: Option<TextFrame>,
}

pub fn write_deck(source: &[u8], deck: &Deck, outputs: &[SlideOutput]) -> Result<Vec<u8>> {
    let by_part: HashMap<&str, &SlideOutput> = outputs
        .iter()
        .filter_map(|output| {
            deck.slides
                .get(output.slide_index)
                .map(|slide| (slide.part.as_str(), output))
        })
        .collect();

    let mut removed_parts: HashSet<String> = HashSet::new();
    let mut removed_rel_ids: HashSet<String> = HashSet::new();
    for slide in &deck.slides {
        if by_part.contains_key(slide.part.as_str()) {
            continue;
        }
        removed_rel_ids.insert(slide.rel_id.clone());
        removed_parts.insert(slide.part.clone());
        removed_parts.insert(rels_path(&slide.part));
        if let Some(notes) = &slide.notes {
            removed_parts.insert(notes.clone());
            removed_parts.insert(rels_path(notes));
        }
    }

    let mut archive =
        ZipArchive::new(Cursor::new(source)).with_context(|| "failed to read pptx archive")?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let presentation_rels = rels_path(PRESENTATION_PART);

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .with_context(|| "failed to read zip entry")?;
        let name = file.name().to_string();
        let file_options = FileOptions::default().compression_method(file.compression());
        if file.is_dir() {
            writer
                .add_directory(name, file_options)
                .with_context(|| "failed to write zip directory")?;
            continue;
        }
        if removed_parts.contains(&name) {
            continue;
        }

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .with_context(|| format!("failed to read {}", name))?;
        drop(file);

        let output = if let Some(slide) = by_part.get(name.as_str()) {
            slide_xml(slide)?
        } else if name == PRESENTATION_PART {
            filter_elements(&data, |e| {
                Ok(e.local_name().as_ref() == b"sldId"
                    && attr(e, b"r:id")?.is_some_and(|id| removed_rel_ids.contains(&id)))
            })?
        } else if name == presentation_rels {
            filter_elements(&data, |e| {
                Ok(e.local_name().as_ref() == b"Relationship"
                    && attr(e, b"Id")?.is_some_and(|id| removed_rel_ids.contains(&id)))
            })?
        } else if name == CONTENT_TYPES_PART {
            filter_elements(&data, |e| {
                Ok(e.local_name().as_ref() == b"Override"
                    && attr(e, b"PartName")?.is_some_and(|part| {
                        removed_parts.contains(part.trim_start_matches('/'))
                    }))
            })?
        } else {
            data
        };

        writer
            .start_file(name, file_options)
            .with_context(|| "failed to write zip entry")?;
        writer
            .write_all(&output)
            .with_context(|| "failed to write zip content")?;
    }

    let cursor = writer.finish().with_context(|| "failed to finish pptx archive")?;
    Ok(cursor.into_inner())
}

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Result<Self> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(Self { writer })
    }

    fn element(name: &str, attrs: &[(&str, &str)]) -> BytesStart<'static> {
        let mut start = BytesStart::new(name.to_string());
        for attribute in attrs {
            start.push_attribute(*attribute);
        }
        start
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        self.writer
            .write_event(Event::Start(Self::element(name, attrs)))?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        self.writer
            .write_event(Event::Empty(Self::element(name, attrs)))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    fn transform(&mut self, bounds: Rect) -> Result<()> {
        self.open("a:xfrm", &[])?;
        self.empty(
            "a:off",
            &[("x", &bounds.left.to_string()), ("y", &bounds.top.to_string())],
        )?;
        self.empty(
            "a:ext",
            &[
                ("cx", &bounds.width.max(0).to_string()),
                ("cy", &bounds.height.max(0).to_string()),
            ],
        )?;
        self.close("a:xfrm")
    }

    fn into_inner(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

fn slide_xml(output: &SlideOutput) -> Result<Vec<u8>> {
    let mut xml = XmlOut::new()?;
    xml.open("p:sld", &[("xmlns:a", NS_A), ("xmlns:r", NS_R), ("xmlns:p", NS_P)])?;
    xml.open("p:cSld", &[])?;
    xml.open("p:spTree", &[])?;

    xml.open("p:nvGrpSpPr", &[])?;
    xml.empty("p:cNvPr", &[("id", "1"), ("name", "")])?;
    xml.empty("p:cNvGrpSpPr", &[])?;
    xml.empty("p:nvPr", &[])?;
    xml.close("p:nvGrpSpPr")?;
    xml.open("p:grpSpPr", &[])?;
    xml.open("a:xfrm", &[])?;
    xml.empty("a:off", &[("x", "0"), ("y", "0")])?;
    xml.empty("a:ext", &[("cx", "0"), ("cy", "0")])?;
    xml.empty("a:chOff", &[("x", "0"), ("y", "0")])?;
    xml.empty("a:chExt", &[("cx", "0"), ("cy", "0")])?;
    xml.close("a:xfrm")?;
    xml.close("p:grpSpPr")?;

    write_picture(&mut xml, &output.picture)?;
    if let Some(frame) = &output.text {
        write_text_box(&mut xml, frame)?;
    }

    xml.close("p:spTree")?;
    xml.close("p:cSld")?;
    xml.open("p:clrMapOvr", &[])?;
    xml.empty("a:masterClrMapping", &[])?;
    xml.close("p:clrMapOvr")?;
    xml.close("p:sld")?;
    Ok(xml.into_inner())
}

fn write_picture(xml: &mut XmlOut, picture: &Picture) -> Result<()> {
    xml.open("p:pic", &[])?;
    xml.open("p:nvPicPr", &[])?;
    xml.empty("p:cNvPr", &[("id", "2"), ("name", &picture.name)])?;
    xml.open("p:cNvPicPr", &[])?;
    xml.empty("a:picLocks", &[("noChangeAspect", "1")])?;
    xml.close("p:cNvPicPr")?;
    xml.empty("p:nvPr", &[])?;
    xml.close("p:nvPicPr")?;
    xml.open("p:blipFill", &[])?;
    xml.empty("a:blip", &[("r:embed", &picture.embed)])?;
    xml.open("a:stretch", &[])?;
    xml.empty("a:fillRect", &[])?;
    xml.close("a:stretch")?;
    xml.close("p:blipFill")?;
    xml.open("p:spPr", &[])?;
    xml.transform(picture.bounds)?;
    xml.open("a:prstGeom", &[("prst", "rect")])?;
    xml.empty("a:avLst", &[])?;
    xml.close("a:prstGeom")?;
    xml.close("p:spPr")?;
    xml.close("p:pic")
}

fn write_text_box(xml: &mut XmlOut, frame: &TextFrame) -> Result<()> {
    let inset = TEXT_INSET.to_string();
    xml.open("p:sp", &[])?;
    xml.open("p:nvSpPr", &[])?;
    xml.empty("p:cNvPr", &[("id", "3"), ("name", TEXT_BOX_NAME)])?;
    xml.empty("p:cNvSpPr", &[("txBox", "1")])?;
    xml.empty("p:nvPr", &[])?;
    xml.close("p:nvSpPr")?;
    xml.open("p:spPr", &[])?;
    xml.transform(frame.bounds)?;
    xml.open("a:prstGeom", &[("prst", "rect")])?;
    xml.empty("a:avLst", &[])?;
    xml.close("a:prstGeom")?;
    xml.empty("a:noFill", &[])?;
    xml.close("p:spPr")?;

    xml.open("p:txBody", &[])?;
    xml.open(
        "a:bodyPr",
        &[
            ("wrap", "square"),
            ("lIns", &inset),
            ("tIns", &inset),
            ("rIns", &inset),
            ("bIns", &inset),
            ("rtlCol", "0"),
        ],
    )?;
    xml.empty("a:normAutofit", &[])?;
    xml.close("a:bodyPr")?;
    xml.empty("a:lstStyle", &[])?;
    if frame.paragraphs.is_empty() {
        xml.empty("a:p", &[])?;
    }
    for paragraph in &frame.paragraphs {
        write_paragraph(xml, paragraph, frame)?;
    }
    xml.close("p:txBody")?;
    xml.close("p:sp")
}

fn alignment_code(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Left => "l",
        Alignment::Center => "ctr",
        Alignment::Right => "r",
    }
}

fn write_paragraph(xml: &mut XmlOut, paragraph: &Paragraph, frame: &TextFrame) -> Result<()> {
    let spacing = ((frame.line_spacing * 100_000.0).round() as i64).to_string();
    xml.open("a:p", &[])?;
    xml.open("a:pPr", &[("algn", alignment_code(paragraph.alignment))])?;
    xml.open("a:lnSpc", &[])?;
    xml.empty("a:spcPct", &[("val", &spacing)])?;
    xml.close("a:lnSpc")?;
    xml.close("a:pPr")?;
    for run in &paragraph.runs {
        let size = ((run.size_pt * 100.0).round() as i64).to_string();
        xml.open("a:r", &[])?;
        xml.open(
            "a:rPr",
            &[
                ("lang", "en-US"),
                ("sz", &size),
                ("b", if run.bold { "1" } else { "0" }),
                ("dirty", "0"),
            ],
        )?;
        xml.open("a:solidFill", &[])?;
        xml.empty("a:srgbClr", &[("val", &run.color.hex())])?;
        xml.close("a:solidFill")?;
        xml.empty("a:latin", &[("typeface", &frame.font_family)])?;
        xml.close("a:rPr")?;
        xml.open("a:t", &[])?;
        xml.text(&run.text)?;
        xml.close("a:t")?;
        xml.close("a:r")?;
    }
    xml.close("a:p")
}
