use super::{
    count_annotations, join_fragments, AnnotationWalk, EngineId, ImageInfo, PageExtraction,
    PdfDocument, PdfEngine,
};
use crate::error::IngestError;
use crate::models::Metadata;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

const ENGINE: &str = "lopdf";
const MAX_PARENT_DEPTH: usize = 32;
const MAX_FORM_DEPTH: usize = 8;

const INFO_FIELDS: [(&[u8], &str); 5] = [
    (b"Title", "document_title"),
    (b"Author", "document_author"),
    (b"Subject", "document_subject"),
    (b"Creator", "document_creator"),
    (b"Producer", "document_producer"),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfEngine;

impl PdfEngine for LopdfEngine {
    fn id(&self) -> EngineId {
        EngineId::Lopdf
    }

    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>, IngestError> {
        let open_error = |details: String| IngestError::EngineOpen {
            engine: ENGINE,
            path: path.to_path_buf(),
            details,
        };

        let document = Document::load(path).map_err(|error| open_error(error.to_string()))?;
        if document.is_encrypted() {
            return Err(open_error("document is encrypted".to_string()));
        }

        let pages = document.get_pages().into_iter().collect();
        let info = document_info(&document);

        Ok(Box::new(LopdfDocument {
            document,
            pages,
            info,
            path: path.to_path_buf(),
        }))
    }
}

struct LopdfDocument {
    document: Document,
    pages: Vec<(u32, ObjectId)>,
    info: Metadata,
    path: PathBuf,
}

impl LopdfDocument {
    fn page(&self, index: usize) -> Result<(u32, ObjectId), IngestError> {
        self.pages
            .get(index)
            .copied()
            .ok_or_else(|| IngestError::PageExtraction {
                page_number: index + 1,
                details: format!("page index out of range (document has {} pages)", self.pages.len()),
            })
    }

    fn operations(&self, page_id: ObjectId) -> lopdf::Result<Vec<Operation>> {
        let bytes = self.document.get_page_content(page_id)?;
        Ok(Content::decode(&bytes)?.operations)
    }

    fn resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        inherited(&self.document, page_id, b"Resources")
            .and_then(|object| resolve(&self.document, object))
            .and_then(|object| object.as_dict().ok())
    }

    fn page_text(&self, page_number: u32, page_id: ObjectId) -> Result<String, IngestError> {
        first_text(
            page_number,
            &[
                ("fonts", &|| self.document.extract_text(&[page_number])),
                ("operators", &|| self.operator_text(page_id)),
                ("blocks", &|| self.block_text(page_id)),
            ],
        )
    }

    fn operator_text(&self, page_id: ObjectId) -> lopdf::Result<String> {
        let operations = self.operations(page_id)?;
        Ok(join_fragments(operations.iter().filter_map(shown_text)))
    }

    fn block_text(&self, page_id: ObjectId) -> lopdf::Result<String> {
        let operations = self.operations(page_id)?;
        let mut blocks = Vec::new();
        self.collect_blocks(&operations, self.resources(page_id), 0, &mut blocks);
        Ok(join_fragments(blocks))
    }

    fn collect_blocks(
        &self,
        operations: &[Operation],
        resources: Option<&Dictionary>,
        depth: usize,
        blocks: &mut Vec<String>,
    ) {
        let mut current: Option<Vec<String>> = None;

        for operation in operations {
            match operation.operator.as_str() {
                "BT" => current = Some(Vec::new()),
                "ET" => {
                    if let Some(fragments) = current.take().filter(|fragments| !fragments.is_empty()) {
                        blocks.push(join_fragments(fragments));
                    }
                }
                "Do" if depth < MAX_FORM_DEPTH => {
                    let Some(form) = xobject(&self.document, resources, operation)
                        .filter(|stream| subtype_is(&stream.dict, b"Form"))
                    else {
                        continue;
                    };
                    let content = form
                        .decompressed_content()
                        .unwrap_or_else(|_| form.content.clone());
                    let Ok(decoded) = Content::decode(&content) else {
                        continue;
                    };
                    let form_resources = form
                        .dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|object| resolve(&self.document, object))
                        .and_then(|object| object.as_dict().ok())
                        .or(resources);
                    self.collect_blocks(&decoded.operations, form_resources, depth + 1, blocks);
                }
                _ => {
                    if let (Some(fragments), Some(text)) = (current.as_mut(), shown_text(operation)) {
                        fragments.push(text);
                    }
                }
            }
        }
    }

    fn page_metadata(&self, page_id: ObjectId) -> Metadata {
        let mut metadata = self.info.clone();

        if let Some([width, height]) = media_box(&self.document, page_id) {
            metadata.insert("page_width".to_string(), Value::from(width));
            metadata.insert("page_height".to_string(), Value::from(height));
        }

        let rotation = inherited(&self.document, page_id, b"Rotate")
            .and_then(|object| resolve(&self.document, object))
            .and_then(|object| object.as_i64().ok())
            .unwrap_or(0);
        metadata.insert("rotation".to_string(), Value::from(rotation.rem_euclid(360)));

        // A page whose annotations cannot be read omits the count.
        if let Some(count) = annotation_count(&self.document, page_id).filter(|count| *count > 0) {
            metadata.insert("annotation_count".to_string(), Value::from(count));
        }

        metadata
    }
}

impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn extract_page(&mut self, index: usize) -> Result<PageExtraction, IngestError> {
        let (page_number, page_id) = self.page(index)?;
        let text = self.page_text(page_number, page_id)?;

        Ok(PageExtraction {
            text,
            metadata: self.page_metadata(page_id),
        })
    }

    fn page_images(&mut self, index: usize) -> Result<Vec<ImageInfo>, IngestError> {
        let (page_number, page_id) = self.page(index)?;
        let operations = self
            .operations(page_id)
            .map_err(|error| IngestError::PageExtraction {
                page_number: page_number as usize,
                details: error.to_string(),
            })?;
        let resources = self.resources(page_id);

        let mut images = Vec::new();
        let mut ctm = IDENTITY;
        let mut saved = Vec::new();

        for operation in &operations {
            match operation.operator.as_str() {
                "q" => saved.push(ctm),
                "Q" => ctm = saved.pop().unwrap_or(IDENTITY),
                "cm" => {
                    if let Some(matrix) = matrix_operands(&operation.operands) {
                        ctm = multiply(&matrix, &ctm);
                    }
                }
                "Do" => {
                    let Some(image) = xobject(&self.document, resources, operation)
                        .filter(|stream| subtype_is(&stream.dict, b"Image"))
                    else {
                        continue;
                    };
                    let dimension = |key: &[u8]| {
                        image
                            .dict
                            .get(key)
                            .ok()
                            .and_then(|object| resolve(&self.document, object))
                            .and_then(|object| object.as_i64().ok())
                    };
                    images.push(ImageInfo {
                        index: images.len(),
                        name: operand_name(operation).unwrap_or_default(),
                        width: dimension(b"Width"),
                        height: dimension(b"Height"),
                        bbox: Some(unit_square_bbox(&ctm)),
                    });
                }
                _ => {}
            }
        }

        Ok(images)
    }

    fn document_metadata(&self) -> Metadata {
        self.info.clone()
    }

    fn close(self: Box<Self>) -> Result<(), IngestError> {
        debug!(path = %self.path.display(), "closing lopdf document");
        Ok(())
    }
}

fn document_info(document: &Document) -> Metadata {
    let mut metadata = Metadata::new();
    let Some(info) = document
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|object| resolve(document, object))
        .and_then(|object| object.as_dict().ok())
    else {
        return metadata;
    };

    for (key, field) in INFO_FIELDS {
        if let Some(value) = info
            .get(key)
            .ok()
            .and_then(|object| resolve(document, object))
            .and_then(decode_text)
            .filter(|value| !value.trim().is_empty())
        {
            metadata.insert(field.to_string(), Value::String(value));
        }
    }

    metadata
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn inherited<'a>(document: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = document.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = document.get_dictionary(parent).ok()?;
    }
    None
}

fn media_box(document: &Document, page_id: ObjectId) -> Option<[f64; 2]> {
    let corners = inherited(document, page_id, b"MediaBox")
        .and_then(|object| resolve(document, object))?
        .as_array()
        .ok()?
        .iter()
        .map(|object| resolve(document, object).and_then(number))
        .collect::<Option<Vec<f64>>>()?;

    match corners.as_slice() {
        [x0, y0, x1, y1] => Some([(x1 - x0).abs(), (y1 - y0).abs()]),
        _ => None,
    }
}

// Tries each text strategy until one yields non-blank text. The page is an
// error only when every strategy failed.
type Strategy<'a> = (&'a str, &'a dyn Fn() -> lopdf::Result<String>);

fn first_text(page_number: u32, strategies: &[Strategy<'_>]) -> Result<String, IngestError> {
    let mut any_succeeded = false;
    let mut last_error = None;
    for (name, strategy) in strategies {
        match strategy() {
            Ok(text) if !text.trim().is_empty() => return Ok(text),
            Ok(_) => {
                any_succeeded = true;
                debug!(page = page_number, strategy = name, "text strategy yielded nothing");
            }
            Err(error) => {
                debug!(page = page_number, strategy = name, %error, "text strategy failed");
                last_error = Some(error);
            }
        }
    }

    match last_error {
        Some(error) if !any_succeeded => Err(IngestError::PageExtraction {
            page_number: page_number as usize,
            details: error.to_string(),
        }),
        _ => Ok(String::new()),
    }
}

fn annotation_count(document: &Document, page_id: ObjectId) -> Option<usize> {
    let page = document.get_dictionary(page_id).ok()?;
    let walk = match page.get(b"Annots") {
        Err(_) => AnnotationWalk::Bulk(Box::new(std::iter::empty::<&Object>())),
        Ok(annots) => AnnotationWalk::Bulk(Box::new(resolve(document, annots)?.as_array().ok()?.iter())),
    };
    Some(count_annotations(walk))
}

fn xobject<'a>(
    document: &'a Document,
    resources: Option<&'a Dictionary>,
    operation: &Operation,
) -> Option<&'a lopdf::Stream> {
    let name = match operation.operands.first()? {
        Object::Name(name) => name,
        _ => return None,
    };
    let xobjects = resources?
        .get(b"XObject")
        .ok()
        .and_then(|object| resolve(document, object))?
        .as_dict()
        .ok()?;
    match resolve(document, xobjects.get(name).ok()?)? {
        Object::Stream(stream) => Some(stream),
        _ => None,
    }
}

fn subtype_is(dict: &Dictionary, subtype: &[u8]) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name.as_slice() == subtype)
}

fn operand_name(operation: &Operation) -> Option<String> {
    match operation.operands.first()? {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

fn shown_text(operation: &Operation) -> Option<String> {
    let operand = match operation.operator.as_str() {
        "Tj" | "'" | "TJ" => operation.operands.first()?,
        "\"" => operation.operands.get(2)?,
        _ => return None,
    };

    let text = match operand {
        Object::Array(items) => items.iter().filter_map(decode_text).collect::<String>(),
        other => decode_text(other)?,
    };
    (!text.is_empty()).then_some(text)
}

// PDF text strings are UTF-16BE when they start with a byte order mark and
// PDFDocEncoding (treated as Latin-1) otherwise.
fn decode_text(object: &Object) -> Option<String> {
    let Object::String(bytes, _) = object else {
        return None;
    };

    if let [0xFE, 0xFF, rest @ ..] = bytes.as_slice() {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }

    Some(bytes.iter().map(|&byte| byte as char).collect())
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    let values = operands.iter().map(number).collect::<Option<Vec<f64>>>()?;
    values.try_into().ok()
}

fn multiply(left: &Matrix, right: &Matrix) -> Matrix {
    let [a1, b1, c1, d1, e1, f1] = *left;
    let [a2, b2, c2, d2, e2, f2] = *right;
    [
        a1 * a2 + b1 * c2,
        a1 * b2 + b1 * d2,
        c1 * a2 + d1 * c2,
        c1 * b2 + d1 * d2,
        e1 * a2 + f1 * c2 + e2,
        e1 * b2 + f1 * d2 + f2,
    ]
}

// Images are painted into the unit square; its image under the CTM is the
// placement on the page.
fn unit_square_bbox(ctm: &Matrix) -> [f64; 4] {
    let [a, b, c, d, e, f] = *ctm;
    let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)].map(|(x, y)| (a * x + c * y + e, b * x + d * y + f));

    let xs = corners.map(|(x, _)| x);
    let ys = corners.map(|(_, y)| y);
    [
        xs.iter().copied().fold(f64::INFINITY, f64::min),
        ys.iter().copied().fold(f64::INFINITY, f64::min),
        xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    ]
}
