// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: page counting and page selection for print jobs, using the
// `lopdf` crate.

use std::collections::HashMap;
use std::path::Path;

use labelwerk_core::error::{LabelwerkError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument, warn};

/// Read-only view of a PDF on disk.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    /// Open a PDF. A missing file is `NotFound`, an unparsable one `PdfError`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LabelwerkError::NotFound(path.display().to_string()));
        }
        let document = Document::load(path).map_err(|err| {
            LabelwerkError::PdfError(format!("failed to open {}: {}", path.display(), err))
        })?;
        debug!(pages = document.get_pages().len(), "PDF loaded");
        Ok(Self { document })
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            LabelwerkError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;
        Ok(Self { document })
    }

    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Build a standalone PDF holding `pages` (1-based) in the given order.
    /// A page listed twice is included once.
    #[instrument(skip(self), fields(pages = pages.len()))]
    pub fn extract_pages(&self, pages: &[u32]) -> Result<Vec<u8>> {
        let page_ids = self.document.get_pages();
        let mut target = Document::with_version("1.5");
        let pages_id = target.new_object_id();
        let mut kids = Vec::with_capacity(pages.len());
        let mut copier = ObjectCopier::new(&self.document, &mut target);

        for &page in pages {
            let source_id: ObjectId = *page_ids.get(&page).ok_or_else(|| {
                LabelwerkError::PdfError(format!(
                    "page {} out of range (document has {} pages)",
                    page,
                    page_ids.len()
                ))
            })?;
            let page_id = copier.copy_reference(source_id).ok_or_else(|| {
                LabelwerkError::PdfError(format!("cannot read page {}", page))
            })?;
            if kids.contains(&page_id) {
                debug!(page, "Page already selected");
                continue;
            }
            if let Some(Object::Dictionary(dict)) = copier.target.objects.get_mut(&page_id) {
                inherit_page_attributes(&self.document, source_id, dict);
                dict.set("Parent", Object::Reference(pages_id));
            }
            kids.push(page_id);
        }

        let mut pages_dict = Dictionary::new();
        pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
        pages_dict.set("Count", Object::Integer(kids.len() as i64));
        pages_dict.set(
            "Kids",
            Object::Array(kids.into_iter().map(Object::Reference).collect()),
        );
        target.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = target.add_object(catalog);
        target.trailer.set("Root", Object::Reference(catalog_id));

        let mut output = Vec::new();
        target.save_to(&mut output).map_err(|err| {
            LabelwerkError::PdfError(format!("failed to serialise page selection: {}", err))
        })?;
        info!(pages = pages.len(), bytes = output.len(), "Pages extracted");
        Ok(output)
    }
}

/// Copy inheritable attributes (MediaBox, Resources...) that the page takes
/// from its ancestors in the source tree.
fn inherit_page_attributes(source: &Document, page_id: ObjectId, dict: &mut Dictionary) {
    const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

    let mut parent = source
        .get_dictionary(page_id)
        .ok()
        .and_then(|d| d.get(b"Parent").ok())
        .and_then(|p| p.as_reference().ok());
    while let Some(parent_id) = parent {
        let Ok(parent_dict) = source.get_dictionary(parent_id) else {
            break;
        };
        for key in INHERITABLE {
            if !dict.has(key)
                && let Ok(value) = parent_dict.get(key)
            {
                dict.set(key.to_vec(), value.clone());
            }
        }
        parent = parent_dict
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok());
    }
}

/// Copies objects from one document into another, following references.
///
/// Each source object is copied once and every later reference to it is
/// pointed at the same copy, so cycles (a link annotation whose `/Dest` names
/// its own page) terminate and shared fonts stay shared. Back-links to the
/// page tree (`/Parent`, an annotation's `/P`) are dropped; the caller
/// re-parents the page.
struct ObjectCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    copied: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            copied: HashMap::new(),
        }
    }

    /// Id of the copy of source object `id`, copying it on first use.
    /// `None` if the source object does not exist.
    fn copy_reference(&mut self, id: ObjectId) -> Option<ObjectId> {
        if let Some(&copied) = self.copied.get(&id) {
            return Some(copied);
        }
        let source = self.source;
        let object = match source.get_object(id) {
            Ok(object) => object,
            Err(err) => {
                warn!(?id, %err, "Unresolvable reference, using Null");
                return None;
            }
        };
        // Reserve the id before descending so references back to this object
        // resolve to it.
        let new_id = self.target.new_object_id();
        self.copied.insert(id, new_id);
        let copy = self.copy(object);
        self.target.objects.insert(new_id, copy);
        Some(new_id)
    }

    fn copy(&mut self, object: &Object) -> Object {
        match object {
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dict(dict)),
            Object::Array(items) => Object::Array(items.iter().map(|item| self.copy(item)).collect()),
            Object::Reference(id) => self
                .copy_reference(*id)
                .map_or(Object::Null, Object::Reference),
            Object::Stream(stream) => {
                Object::Stream(Stream::new(self.copy_dict(&stream.dict), stream.content.clone()))
            }
            other => other.clone(),
        }
    }

    fn copy_dict(&mut self, dict: &Dictionary) -> Dictionary {
        let mut out = Dictionary::new();
        for (key, value) in dict.iter() {
            if key == b"Parent" || key == b"P" {
                continue;
            }
            out.set(key.clone(), self.copy(value));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};

    /// A PDF with `pages` pages, each drawing its own page number.
    fn sample_pdf(pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for n in 1..=pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tj", vec![Object::string_literal(format!("page {n}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let stream = Stream::new(Dictionary::new(), content.encode().expect("encode"));
            let content_id = doc.add_object(stream);
            let mut page = Dictionary::new();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(pages_id));
            page.set("Contents", Object::Reference(content_id));
            kids.push(Object::Reference(doc.add_object(page)));
        }
        let mut pages_dict = Dictionary::new();
        pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
        pages_dict.set("Count", Object::Integer(pages as i64));
        pages_dict.set("Kids", Object::Array(kids));
        pages_dict.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(283),
                Object::Integer(425),
            ]),
        );
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save sample");
        out
    }

    #[test]
    fn counts_pages() {
        let reader = PdfReader::from_bytes(&sample_pdf(4)).expect("load");
        assert_eq!(reader.page_count(), 4);
    }

    #[test]
    fn extracts_selected_pages_with_inherited_media_box() {
        let reader = PdfReader::from_bytes(&sample_pdf(5)).expect("load");
        let bytes = reader.extract_pages(&[2, 4, 5]).expect("extract");
        let extracted = PdfReader::from_bytes(&bytes).expect("reload");
        assert_eq!(extracted.page_count(), 3);

        let (_, first_id) = extracted
            .document
            .get_pages()
            .into_iter()
            .next()
            .expect("first page");
        let page = extracted.document.get_dictionary(first_id).expect("page dict");
        assert!(page.has(b"MediaBox"));
    }

    #[test]
    fn out_of_range_page_is_error() {
        let reader = PdfReader::from_bytes(&sample_pdf(2)).expect("load");
        assert!(matches!(
            reader.extract_pages(&[3]),
            Err(LabelwerkError::PdfError(_))
        ));
    }

    /// Two pages sharing one font; page 1 carries a link annotation whose
    /// destination is page 1 itself.
    fn linked_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let first_id = doc.new_object_id();

        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type1".to_vec()));
        font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
        let font_id = doc.add_object(font);
        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Reference(font_id));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));
        let resources_id = doc.add_object(resources);

        let mut link = Dictionary::new();
        link.set("Type", Object::Name(b"Annot".to_vec()));
        link.set("Subtype", Object::Name(b"Link".to_vec()));
        link.set(
            "Rect",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(50),
                Object::Integer(20),
            ]),
        );
        link.set(
            "Dest",
            Object::Array(vec![Object::Reference(first_id), Object::Name(b"Fit".to_vec())]),
        );
        link.set("P", Object::Reference(first_id));
        let link_id = doc.add_object(link);

        let page = |annots: Option<Object>| {
            let mut page = Dictionary::new();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(pages_id));
            page.set("Resources", Object::Reference(resources_id));
            if let Some(annots) = annots {
                page.set("Annots", annots);
            }
            page
        };
        doc.objects.insert(
            first_id,
            Object::Dictionary(page(Some(Object::Array(vec![Object::Reference(link_id)])))),
        );
        let second_id = doc.add_object(page(None));

        let mut pages_dict = Dictionary::new();
        pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
        pages_dict.set("Count", Object::Integer(2));
        pages_dict.set(
            "Kids",
            Object::Array(vec![Object::Reference(first_id), Object::Reference(second_id)]),
        );
        pages_dict.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(283),
                Object::Integer(425),
            ]),
        );
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save linked sample");
        out
    }

    #[test]
    fn link_back_to_own_page_is_copied_once() {
        let reader = PdfReader::from_bytes(&linked_pdf()).expect("load");
        let bytes = reader.extract_pages(&[1]).expect("extract");
        let extracted = PdfReader::from_bytes(&bytes).expect("reload");
        assert_eq!(extracted.page_count(), 1);

        let doc = &extracted.document;
        let (_, page_id) = doc.get_pages().into_iter().next().expect("page");
        let page = doc.get_dictionary(page_id).expect("page dict");
        let annots = page.get(b"Annots").and_then(Object::as_array).expect("annots");
        let link_id = annots[0].as_reference().expect("link ref");
        let dest = doc
            .get_dictionary(link_id)
            .and_then(|link| link.get(b"Dest"))
            .and_then(Object::as_array)
            .expect("dest");
        assert_eq!(dest[0].as_reference().expect("dest page"), page_id);
    }

    #[test]
    fn shared_font_stays_shared() {
        let reader = PdfReader::from_bytes(&linked_pdf()).expect("load");
        let bytes = reader.extract_pages(&[2, 1, 2]).expect("extract");
        let extracted = PdfReader::from_bytes(&bytes).expect("reload");
        assert_eq!(extracted.page_count(), 2);

        let fonts = extracted
            .document
            .objects
            .values()
            .filter_map(|object| object.as_dict().ok())
            .filter(|dict| {
                dict.get(b"Type")
                    .and_then(Object::as_name)
                    .is_ok_and(|name| name == b"Font")
            })
            .count();
        assert_eq!(fonts, 1);
    }

    #[test]
    fn missing_file_is_not_found() {
        assert!(matches!(
            PdfReader::open("/nonexistent/labels.pdf"),
            Err(LabelwerkError::NotFound(_))
        ));
    }
}
