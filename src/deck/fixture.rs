use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::Rect;
use crate::test_util::solid_png;

pub struct FixtureSlide {
    picture: Option<(Rect, u32, u32)>,
}

impl FixtureSlide {
    pub fn empty() -> Self {
        Self { picture: None }
    }

    pub fn with_picture(bounds: Rect, width: u32, height: u32) -> Self {
        Self {
            picture: Some((bounds, width, height)),
        }
    }
}

const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const DOC_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub fn build_pptx(size: Option<(i64, i64)>, slides: &[FixtureSlide]) -> Vec<u8> {
    let mut parts: Vec<(String, Vec<u8>)> = Vec::new();

    let mut overrides = String::from(
        r#"<Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>"#,
    );
    for n in 1..=slides.len() {
        overrides.push_str(&format!(
            r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
        ));
    }
    parts.push((
        "[Content_Types].xml".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/>{overrides}</Types>"#
        )
        .into_bytes(),
    ));
    parts.push((
        "_rels/.rels".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{REL_NS}"><Relationship Id="rId1" Type="{DOC_REL}/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#
        )
        .into_bytes(),
    ));

    let ids: String = (0..slides.len())
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 2))
        .collect();
    let size = size
        .map(|(cx, cy)| format!(r#"<p:sldSz cx="{cx}" cy="{cy}"/>"#))
        .unwrap_or_default();
    parts.push((
        "ppt/presentation.xml".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="{DOC_REL}" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:sldIdLst>{ids}</p:sldIdLst>{size}</p:presentation>"#
        )
        .into_bytes(),
    ));
    let slide_rels: String = (0..slides.len())
        .map(|i| {
            format!(
                r#"<Relationship Id="rId{}" Type="{DOC_REL}/slide" Target="slides/slide{}.xml"/>"#,
                i + 2,
                i + 1
            )
        })
        .collect();
    parts.push((
        "ppt/_rels/presentation.xml.rels".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{REL_NS}">{slide_rels}</Relationships>"#
        )
        .into_bytes(),
    ));

    for (i, slide) in slides.iter().enumerate() {
        let n = i + 1;
        let mut rels = format!(
            r#"<Relationship Id="rId1" Type="{DOC_REL}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>"#
        );
        let mut shapes = String::new();
        if let Some((bounds, width, height)) = slide.picture {
            rels.push_str(&format!(
                r#"<Relationship Id="rId2" Type="{DOC_REL}/image" Target="../media/image{n}.png"/>"#
            ));
            shapes = format!(
                r#"<p:pic><p:nvPicPr><p:cNvPr id="4" name="Picture {n}"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
                bounds.left, bounds.top, bounds.width, bounds.height
            );
            parts.push((format!("ppt/media/image{n}.png"), solid_png(width, height)));
        }
        parts.push((
            format!("ppt/slides/slide{n}.xml"),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="{DOC_REL}" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{shapes}</p:spTree></p:cSld></p:sld>"#
            )
            .into_bytes(),
        ));
        parts.push((
            format!("ppt/slides/_rels/slide{n}.xml.rels"),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{REL_NS}">{rels}</Relationships>"#
            )
            .into_bytes(),
        ));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in parts {
        writer.start_file(name, options).expect("start entry");
        writer.write_all(&data).expect("write entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

pub fn entry_names(bytes: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(bytes)).expect("zip");
    archive.file_names().map(str::to_string).collect()
}

pub fn read_entry(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("zip");
    let mut file = archive.by_name(name).expect("entry");
    let mut data = Vec::new();
    file.read_to_end(&mut data).expect("read entry");
    data
}

pub fn slide_texts(bytes: &[u8], part: &str) -> Vec<String> {
    let xml = read_entry(bytes, part);
    let mut reader = Reader::from_reader(Cursor::new(xml.as_slice()));
    let mut buf = Vec::new();
    let mut in_text = false;
    let mut texts = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).expect("xml") {
            Event::Start(e) if e.local_name().as_ref() == b"t" => {
                in_text = true;
                texts.push(String::new());
            }
            Event::End(e) if e.local_name().as_ref() == b"t" => in_text = false,
            Event::Text(e) if in_text => {
                if let Some(last) = texts.last_mut() {
                    last.push_str(&e.unescape().expect("text"));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    texts
}
