#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use slide_translator::error::ProviderError;
use slide_translator::ocr::OcrEngine;
use slide_translator::pool::WorkerPool;
use slide_translator::providers::{
    EngineCache, EngineFactory, HttpReply, HttpRequest, HttpTransport, OfflineEngine,
};
use slide_translator::settings::Settings;
use slide_translator::{Backends, ChainConfig, LanguagePair, Mode, Pipeline};

pub const OCR_TEXT: &str = "Hola a todos.\n\nAdios.";
pub const SLIDE_WIDTH: i64 = 9_144_000;
pub const SLIDE_HEIGHT: i64 = 6_858_000;

const DOC_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_DECL: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

// Picture left offsets in EMU; None is a slide with no picture.
pub fn build_deck(pictures: &[Option<i64>]) -> Vec<u8> {
    let mut parts: Vec<(String, Vec<u8>)> = Vec::new();
    let overrides: String = (1..=pictures.len())
        .map(|n| format!(r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#))
        .collect();
    parts.push((
        "[Content_Types].xml".to_string(),
        format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>{overrides}</Types>"#).into_bytes(),
    ));
    let ids: String = (0..pictures.len())
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 2))
        .collect();
    parts.push((
        "ppt/presentation.xml".to_string(),
        format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {NS_DECL}><p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="{SLIDE_WIDTH}" cy="{SLIDE_HEIGHT}"/></p:presentation>"#).into_bytes(),
    ));
    let rels: String = (0..pictures.len())
        .map(|i| format!(r#"<Relationship Id="rId{}" Type="{DOC_REL}/slide" Target="slides/slide{}.xml"/>"#, i + 2, i + 1))
        .collect();
    parts.push((
        "ppt/_rels/presentation.xml.rels".to_string(),
        format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{REL_NS}">{rels}</Relationships>"#).into_bytes(),
    ));

    for (i, left) in pictures.iter().enumerate() {
        let n = i + 1;
        let mut shapes = String::new();
        let mut slide_rels = String::new();
        if let Some(left) = left {
            slide_rels = format!(r#"<Relationship Id="rId2" Type="{DOC_REL}/image" Target="../media/image{n}.png"/>"#);
            shapes = format!(r#"<p:pic><p:nvPicPr><p:cNvPr id="4" name="Picture {n}"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/></p:blipFill><p:spPr><a:xfrm><a:off x="{left}" y="457200"/><a:ext cx="4000000" cy="3000000"/></a:xfrm></p:spPr></p:pic>"#);
            parts.push((format!("ppt/media/image{n}.png"), slide_png()));
        }
        parts.push((
            format!("ppt/slides/slide{n}.xml"),
            format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld {NS_DECL}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{shapes}</p:spTree></p:cSld></p:sld>"#).into_bytes(),
        ));
        parts.push((
            format!("ppt/slides/_rels/slide{n}.xml.rels"),
            format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{REL_NS}">{slide_rels}</Relationships>"#).into_bytes(),
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

fn slide_png() -> Vec<u8> {
    let image = RgbImage::from_pixel(48, 32, Rgb([250, 250, 250]));
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}

pub fn entry_names(bytes: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(bytes)).expect("zip");
    archive.file_names().map(str::to_string).collect()
}

// Text of every a:t element in a slide part, untrimmed.
pub fn slide_texts(bytes: &[u8], part: &str) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("zip");
    let mut xml = Vec::new();
    archive
        .by_name(part)
        .expect("slide part")
        .read_to_end(&mut xml)
        .expect("read part");
    let mut reader = Reader::from_reader(Cursor::new(xml.as_slice()));
    let mut buf = Vec::new();
    let mut texts = Vec::new();
    let mut in_text = false;
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

pub fn claude_reply(text: &str) -> HttpReply {
    HttpReply::ok(
        serde_json::json!({
            "model": "claude-sonnet-4-20250514",
            "content": [{"type": "text", "text": text}],
            "usage": {"input_tokens": 1520, "output_tokens": 210}
        })
        .to_string(),
    )
}

pub fn openrouter_reply(model: &str, text: &str) -> HttpReply {
    HttpReply::ok(
        serde_json::json!({
            "model": model,
            "choices": [{"message": {"role": "assistant", "content": text}}],
            "usage": {"prompt_tokens": 300, "completion_tokens": 40}
        })
        .to_string(),
    )
}

// Replies are queued per provider name; an empty queue repeats the fallback.
pub struct ScriptedTransport {
    queues: Mutex<HashMap<String, VecDeque<HttpReply>>>,
    fallback: Mutex<HashMap<String, HttpReply>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queues: Mutex::new(HashMap::new()),
            fallback: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, provider: &str, reply: HttpReply) {
        self.queues
            .lock()
            .entry(provider.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn always(&self, provider: &str, reply: HttpReply) {
        self.fallback.lock().insert(provider.to_string(), reply);
    }

    pub fn calls_to(&self, provider: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|request| request.provider == provider)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(&self, request: &HttpRequest) -> Result<HttpReply, ProviderError> {
        self.calls.lock().push(request.clone());
        let queued = self
            .queues
            .lock()
            .get_mut(&request.provider)
            .and_then(VecDeque::pop_front);
        if let Some(reply) = queued {
            return Ok(reply);
        }
        Ok(self
            .fallback
            .lock()
            .get(&request.provider)
            .cloned()
            .unwrap_or_else(|| HttpReply::status(500, "no scripted reply")))
    }
}

pub struct FixedOcr {
    pub calls: AtomicUsize,
}

impl OcrEngine for FixedOcr {
    fn extract(&self, _image: &GrayImage, _language_hint: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(OCR_TEXT.to_string())
    }
}

struct PrefixEngine;

impl OfflineEngine for PrefixEngine {
    fn model_name(&self) -> String {
        "opus-mt-es-en".to_string()
    }

    fn translate_line(&self, line: &str) -> Result<String, ProviderError> {
        Ok(format!("EN {line}"))
    }
}

pub struct PrefixFactory {
    pub created: AtomicUsize,
}

impl EngineFactory for PrefixFactory {
    fn create(&self, _pair: &LanguagePair) -> Result<Arc<dyn OfflineEngine>, ProviderError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(PrefixEngine))
    }
}

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub ocr: Arc<FixedOcr>,
    pub factory: Arc<PrefixFactory>,
    pub pipeline: Pipeline,
}

pub fn test_settings() -> Settings {
    Settings {
        backoff_ms: 0,
        ocr_min_width: 64,
        ..Settings::default()
    }
}

pub fn harness(mode: Mode, source: &str, target: &str, key: Option<&str>) -> Harness {
    let settings = test_settings();
    let transport = ScriptedTransport::new();
    let ocr = Arc::new(FixedOcr {
        calls: AtomicUsize::new(0),
    });
    let factory = Arc::new(PrefixFactory {
        created: AtomicUsize::new(0),
    });
    let backends = Backends {
        transport: transport.clone(),
        ocr: ocr.clone(),
        offline: Arc::new(EngineCache::new(factory.clone(), 4)),
        pool: WorkerPool::new(4),
    };
    let mut config =
        ChainConfig::from_settings(&settings, mode, LanguagePair::new(source, target));
    config.claude_key = None;
    config.openrouter_key = None;
    let config = config.with_key(key.map(str::to_string));
    let pipeline = Pipeline::new(&config, &backends, &settings).expect("pipeline");
    Harness {
        transport,
        ocr,
        factory,
        pipeline,
    }
}
