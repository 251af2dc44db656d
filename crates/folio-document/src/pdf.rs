//! In-process PDF manipulation on top of `lopdf`.
//!
//! Page copies are deep clones: every object reachable from a page (except its
//! `/Parent`) is copied into the destination exactly once, and attributes the
//! page inherits from its page tree are materialised on the copy.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use folio_jobs::{FormValues, PageSelection, PdfToolkit, TransformError, TransformResult};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat, dictionary};
use tracing::{debug, warn};

const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const READ_ONLY_FLAG: i64 = 1;
const TEXT_OPERATORS: [&str; 4] = ["Tj", "TJ", "'", "\""];

/// [`PdfToolkit`] implementation backed by `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfToolkit;

impl LopdfToolkit {
    /// Construct the toolkit.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PdfToolkit for LopdfToolkit {
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> TransformResult<()> {
        let mut target = PageSink::new();
        for input in inputs {
            let source = load("merge", input)?;
            let pages: Vec<ObjectId> = source.get_pages().into_values().collect();
            target.append(&source, &pages);
        }
        debug!(inputs = inputs.len(), pages = target.pages, "merged documents");
        target.save("merge", output)
    }

    fn split(
        &self,
        input: &Path,
        output_dir: &Path,
        selection: Option<&PageSelection>,
        prefix: &str,
    ) -> TransformResult<Vec<PathBuf>> {
        let source = load("split", input)?;
        let pages = source.get_pages();
        let total = u32::try_from(pages.len())
            .map_err(|_| TransformError::failed("split", "document has too many pages"))?;

        let plan: Vec<(String, Vec<u32>)> = match selection {
            Some(selection) => {
                selection
                    .check_bounds(total)
                    .map_err(|reason| TransformError::InvalidRequest {
                        field: "pages",
                        reason,
                    })?;
                selection
                    .ranges()
                    .iter()
                    .enumerate()
                    .map(|(index, range)| {
                        (
                            format!("{prefix}_{}_{}-{}.pdf", index + 1, range.start, range.end),
                            (range.start..=range.end).collect(),
                        )
                    })
                    .collect()
            }
            None => (1..=total)
                .map(|number| (format!("{prefix}_{number}.pdf"), vec![number]))
                .collect(),
        };

        std::fs::create_dir_all(output_dir)
            .map_err(|err| TransformError::io("split", output_dir, err))?;
        let mut written = Vec::with_capacity(plan.len());
        for (name, numbers) in plan {
            let page_ids = numbers
                .into_iter()
                .map(|number| {
                    pages.get(&number).copied().ok_or_else(|| {
                        TransformError::failed("split", format!("page {number} is missing"))
                    })
                })
                .collect::<TransformResult<Vec<_>>>()?;
            let mut target = PageSink::new();
            target.append(&source, &page_ids);
            let path = output_dir.join(name);
            target.save("split", &path)?;
            written.push(path);
        }
        Ok(written)
    }

    fn redact(&self, input: &Path, output: &Path, terms: &[String]) -> TransformResult<()> {
        let mut document = load("redact", input)?;
        let needles: Vec<&[u8]> = terms
            .iter()
            .map(String::as_bytes)
            .filter(|term| !term.is_empty())
            .collect();
        let mut hits = 0_usize;
        if !needles.is_empty() {
            for page_id in document.get_pages().into_values() {
                let raw = document.get_page_content(page_id).map_err(|err| {
                    TransformError::failed("redact", format!("cannot read page content: {err}"))
                })?;
                let mut content = Content::decode(&raw).map_err(|err| {
                    TransformError::failed("redact", format!("cannot decode page content: {err}"))
                })?;
                let page_hits = redact_operations(&mut content, &needles);
                if page_hits == 0 {
                    continue;
                }
                hits += page_hits;
                let encoded = content.encode().map_err(|err| {
                    TransformError::failed("redact", format!("cannot encode page content: {err}"))
                })?;
                document
                    .change_page_content(page_id, encoded)
                    .map_err(|err| {
                        TransformError::failed("redact", format!("cannot update page: {err}"))
                    })?;
            }
        }
        debug!(terms = needles.len(), hits, "redaction applied");
        save(&mut document, "redact", output)
    }

    fn scrub_metadata(&self, input: &Path, output: &Path) -> TransformResult<()> {
        let mut document = load("scrub_metadata", input)?;
        if let Some(Object::Reference(info_id)) = document.trailer.remove(b"Info") {
            document.objects.remove(&info_id);
        }
        if let Ok(catalog) = catalog_mut(&mut document) {
            catalog.remove(b"Metadata");
            catalog.remove(b"PieceInfo");
        }
        for page_id in document.get_pages().into_values() {
            if let Ok(page) = document.get_dictionary_mut(page_id) {
                page.remove(b"Metadata");
                page.remove(b"PieceInfo");
            }
        }
        let pruned = document.prune_objects();
        debug!(pruned = pruned.len(), "metadata scrubbed");
        save(&mut document, "scrub_metadata", output)
    }

    fn fill_form(
        &self,
        input: &Path,
        output: &Path,
        values: &FormValues,
        flatten: bool,
    ) -> TransformResult<()> {
        let mut document = load("fill_form", input)?;
        let fields = collect_fields(&document);
        let mut matched = HashSet::new();
        for field in &fields {
            let value = values
                .get_key_value(&field.full_name)
                .or_else(|| values.get_key_value(&field.partial_name));
            let Ok(dict) = document.get_dictionary_mut(field.id) else {
                continue;
            };
            if let Some((key, value)) = value {
                dict.set(
                    "V",
                    Object::String(value.as_bytes().to_vec(), StringFormat::Literal),
                );
                matched.insert(key.as_str());
            }
            if flatten {
                let flags = dict.get(b"Ff").and_then(Object::as_i64).unwrap_or(0);
                dict.set("Ff", flags | READ_ONLY_FLAG);
            }
        }
        if let Some(acro_form) = acro_form_mut(&mut document) {
            acro_form.set("NeedAppearances", true);
        }
        let unmatched = values.len() - matched.len();
        if unmatched > 0 {
            warn!(unmatched, "form values without a matching field were ignored");
        }
        debug!(fields = fields.len(), filled = matched.len(), flatten, "form filled");
        save(&mut document, "fill_form", output)
    }

    fn extract_text(&self, input: &Path) -> TransformResult<String> {
        let document = load("pdf_to_text", input)?;
        let mut text = String::new();
        for number in document.get_pages().into_keys() {
            let page = document.extract_text(&[number]).map_err(|err| {
                TransformError::failed("pdf_to_text", format!("cannot extract page {number}: {err}"))
            })?;
            text.push_str(&page);
            if !page.ends_with('\n') {
                text.push('\n');
            }
        }
        Ok(text)
    }
}

fn load(operation: &'static str, path: &Path) -> TransformResult<Document> {
    Document::load(path).map_err(|err| {
        debug!(operation, error = %err, "pdf parse failed");
        TransformError::failed(
            operation,
            format!(
                "Error reading PDF file: {}. It might be corrupted or encrypted.",
                path.display()
            ),
        )
    })
}

fn save(document: &mut Document, operation: &'static str, path: &Path) -> TransformResult<()> {
    document
        .save(path)
        .map(|_| ())
        .map_err(|err| TransformError::failed(operation, format!("cannot write PDF: {err}")))
}

fn catalog_mut(document: &mut Document) -> lopdf::Result<&mut Dictionary> {
    let root = document.trailer.get(b"Root")?.as_reference()?;
    document.get_dictionary_mut(root)
}

fn acro_form_mut(document: &mut Document) -> Option<&mut Dictionary> {
    let reference = match catalog_mut(document).ok()?.get(b"AcroForm").ok()? {
        Object::Reference(id) => Some(*id),
        Object::Dictionary(_) => None,
        _ => return None,
    };
    match reference {
        Some(id) => document.get_dictionary_mut(id).ok(),
        None => catalog_mut(document)
            .ok()?
            .get_mut(b"AcroForm")
            .ok()?
            .as_dict_mut()
            .ok(),
    }
}

/// Builds a fresh document one copied page at a time.
struct PageSink {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    pages: usize,
}

impl PageSink {
    fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
            pages: 0,
        }
    }

    /// Copy `page_ids` from `source`, sharing objects the pages have in common.
    fn append(&mut self, source: &Document, page_ids: &[ObjectId]) {
        let pages_id = self.pages_id;
        let mut cloner = ObjectCloner::new(source, &mut self.document);
        for page_id in page_ids {
            let Ok(page) = source.get_dictionary(*page_id) else {
                warn!(?page_id, "page object is not a dictionary; skipped");
                continue;
            };
            let new_id = cloner.reserve(*page_id);
            let mut copy = cloner.clone_dictionary(page);
            for key in INHERITABLE {
                if copy.has(key) {
                    continue;
                }
                if let Some(value) = inherited(source, page, key) {
                    copy.set(key.to_vec(), cloner.clone_object(value));
                }
            }
            copy.set("Parent", pages_id);
            cloner.target.objects.insert(new_id, Object::Dictionary(copy));
            self.kids.push(Object::Reference(new_id));
            self.pages += 1;
        }
    }

    fn save(mut self, operation: &'static str, path: &Path) -> TransformResult<()> {
        let count = i64::try_from(self.kids.len())
            .map_err(|_| TransformError::failed(operation, "too many pages"))?;
        self.document.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.document.trailer.set("Root", catalog_id);
        save(&mut self.document, operation, path)
    }
}

fn inherited<'a>(source: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(id) = parent {
        let node = source.get_dictionary(id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
        if depth > 64 {
            return None;
        }
    }
    None
}

/// Copies an object graph between documents, cloning each referenced object once.
struct ObjectCloner<'a> {
    source: &'a Document,
    target: &'a mut Document,
    mapped: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCloner<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            mapped: HashMap::new(),
        }
    }

    fn reserve(&mut self, source_id: ObjectId) -> ObjectId {
        if let Some(id) = self.mapped.get(&source_id) {
            return *id;
        }
        let id = self.target.new_object_id();
        self.mapped.insert(source_id, id);
        id
    }

    fn clone_dictionary(&mut self, dict: &Dictionary) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.clone_object(value));
        }
        copy
    }

    fn clone_object(&mut self, object: &Object) -> Object {
        match object {
            Object::Reference(id) => self.clone_reference(*id),
            Object::Dictionary(dict) => Object::Dictionary(self.clone_dictionary(dict)),
            Object::Array(items) => {
                Object::Array(items.iter().map(|item| self.clone_object(item)).collect())
            }
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.clone_dictionary(&stream.dict);
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    fn clone_reference(&mut self, id: ObjectId) -> Object {
        if let Some(mapped) = self.mapped.get(&id) {
            return Object::Reference(*mapped);
        }
        let Ok(referenced) = self.source.get_object(id) else {
            warn!(?id, "dangling reference replaced with null");
            return Object::Null;
        };
        let new_id = self.reserve(id);
        let copy = self.clone_object(referenced);
        self.target.objects.insert(new_id, copy);
        Object::Reference(new_id)
    }
}

fn redact_operations(content: &mut Content, needles: &[&[u8]]) -> usize {
    let mut hits = 0;
    for operation in &mut content.operations {
        if !TEXT_OPERATORS.contains(&operation.operator.as_str()) {
            continue;
        }
        for operand in &mut operation.operands {
            hits += redact_operand(operand, needles);
        }
    }
    hits
}

fn redact_operand(operand: &mut Object, needles: &[&[u8]]) -> usize {
    match operand {
        Object::String(bytes, _) => needles
            .iter()
            .map(|needle| blank_occurrences(bytes, needle))
            .sum(),
        Object::Array(items) => items
            .iter_mut()
            .map(|item| redact_operand(item, needles))
            .sum(),
        _ => 0,
    }
}

fn blank_occurrences(haystack: &mut [u8], needle: &[u8]) -> usize {
    if needle.is_empty() || haystack.len() < needle.len() {
        return 0;
    }
    let mut hits = 0;
    let mut index = 0;
    while index + needle.len() <= haystack.len() {
        if &haystack[index..index + needle.len()] == needle {
            haystack[index..index + needle.len()].fill(b' ');
            hits += 1;
            index += needle.len();
        } else {
            index += 1;
        }
    }
    hits
}

struct FormField {
    id: ObjectId,
    full_name: String,
    partial_name: String,
}

fn collect_fields(document: &Document) -> Vec<FormField> {
    let Ok(root) = document.trailer.get(b"Root").and_then(Object::as_reference) else {
        return Vec::new();
    };
    let Ok(catalog) = document.get_dictionary(root) else {
        return Vec::new();
    };
    let acro_form = match catalog.get(b"AcroForm") {
        Ok(Object::Reference(id)) => document.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    let Some(Ok(Object::Array(roots))) = acro_form.map(|form| form.get(b"Fields")) else {
        return Vec::new();
    };

    let mut fields = Vec::new();
    let mut pending: Vec<(ObjectId, String)> = roots
        .iter()
        .filter_map(|field| field.as_reference().ok())
        .map(|id| (id, String::new()))
        .collect();
    let mut seen = HashSet::new();
    while let Some((id, prefix)) = pending.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Ok(dict) = document.get_dictionary(id) else {
            continue;
        };
        let partial = match dict.get(b"T") {
            Ok(Object::String(bytes, _)) => String::from_utf8_lossy(bytes).into_owned(),
            _ => String::new(),
        };
        let full_name = match (prefix.is_empty(), partial.is_empty()) {
            (true, _) => partial.clone(),
            (false, true) => prefix.clone(),
            (false, false) => format!("{prefix}.{partial}"),
        };
        if let Ok(Object::Array(kids)) = dict.get(b"Kids") {
            pending.extend(
                kids.iter()
                    .filter_map(|kid| kid.as_reference().ok())
                    .map(|kid| (kid, full_name.clone())),
            );
        }
        if !partial.is_empty() {
            fields.push(FormField {
                id,
                full_name,
                partial_name: partial,
            });
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use folio_test_support::{PdfFixture, page_count, page_texts};
    use tempfile::TempDir;

    use super::*;

    type TestResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

    fn fixture(dir: &TempDir, name: &str, fixture: &PdfFixture) -> TestResult<PathBuf> {
        let path = dir.path().join(name);
        fixture.write(&path)?;
        Ok(path)
    }

    #[test]
    fn merge_appends_pages_in_input_order() -> TestResult<()> {
        let dir = TempDir::new()?;
        let first = fixture(&dir, "a.pdf", &PdfFixture::new(2))?;
        let second = fixture(&dir, "b.pdf", &PdfFixture::new(3))?;
        let output = dir.path().join("merged.pdf");

        LopdfToolkit::new().merge(&[first, second], &output)?;

        assert_eq!(page_count(&output)?, 5);
        let texts = page_texts(&output)?;
        assert!(texts.get(&2).is_some_and(|text| text.contains("Page 2")));
        assert!(texts.get(&3).is_some_and(|text| text.contains("Page 1")));
        Ok(())
    }

    #[test]
    fn merge_rejects_a_corrupt_input_by_name() -> TestResult<()> {
        let dir = TempDir::new()?;
        let good = fixture(&dir, "good.pdf", &PdfFixture::new(1))?;
        let bad = dir.path().join("bad.pdf");
        std::fs::write(&bad, b"definitely not a pdf")?;

        let err = LopdfToolkit::new()
            .merge(&[good, bad], &dir.path().join("out.pdf"))
            .err()
            .ok_or("corrupt input accepted")?;
        assert!(err.cause().starts_with("Error reading PDF file:"));
        assert!(!dir.path().join("out.pdf").exists());
        Ok(())
    }

    #[test]
    fn split_by_ranges_names_each_part() -> TestResult<()> {
        let dir = TempDir::new()?;
        let input = fixture(&dir, "ten.pdf", &PdfFixture::new(10))?;
        let out = dir.path().join("parts");
        let selection = PageSelection::parse("1,3,5-7")?.ok_or("empty selection")?;

        let parts = LopdfToolkit::new().split(&input, &out, Some(&selection), "split_part")?;

        let names: Vec<_> = parts
            .iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
            .collect();
        assert_eq!(
            names,
            vec!["split_part_1_1-1.pdf", "split_part_2_3-3.pdf", "split_part_3_5-7.pdf"]
        );
        let counts = parts
            .iter()
            .map(|path| page_count(path))
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(counts, vec![1, 1, 3]);
        assert!(page_texts(&parts[2])?.get(&1).is_some_and(|text| text.contains("Page 5")));

        let merged = dir.path().join("remerged.pdf");
        LopdfToolkit::new().merge(&parts, &merged)?;
        assert_eq!(page_count(&merged)?, 5);
        Ok(())
    }

    #[test]
    fn split_without_selection_emits_one_file_per_page() -> TestResult<()> {
        let dir = TempDir::new()?;
        let input = fixture(&dir, "three.pdf", &PdfFixture::new(3))?;

        let parts = LopdfToolkit::new().split(&input, dir.path(), None, "doc")?;

        assert_eq!(parts.len(), 3);
        assert!(parts[2].ends_with("doc_3.pdf"));
        Ok(())
    }

    #[test]
    fn split_out_of_bounds_is_an_invalid_request() -> TestResult<()> {
        let dir = TempDir::new()?;
        let input = fixture(&dir, "two.pdf", &PdfFixture::new(2))?;
        let selection = PageSelection::parse("1-4")?.ok_or("empty selection")?;

        let err = LopdfToolkit::new()
            .split(&input, dir.path(), Some(&selection), "p")
            .err()
            .ok_or("out of bounds accepted")?;
        assert!(matches!(
            err,
            TransformError::InvalidRequest { field: "pages", ref reason } if reason == "Invalid page range: 1-4"
        ));
        Ok(())
    }

    #[test]
    fn redact_removes_terms_from_page_text() -> TestResult<()> {
        let dir = TempDir::new()?;
        let input = fixture(&dir, "secret.pdf", &PdfFixture::new(2).with_text("account 4411 secret"))?;
        let output = dir.path().join("redacted.pdf");

        LopdfToolkit::new().redact(&input, &output, &["4411".to_string(), String::new()])?;

        for text in page_texts(&output)?.values() {
            assert!(!text.contains("4411"));
            assert!(text.contains("secret"));
        }
        Ok(())
    }

    #[test]
    fn scrub_drops_document_info() -> TestResult<()> {
        let dir = TempDir::new()?;
        let input = fixture(&dir, "authored.pdf", &PdfFixture::new(1).with_author("Jane Roe"))?;
        let output = dir.path().join("scrubbed.pdf");

        LopdfToolkit::new().scrub_metadata(&input, &output)?;

        let document = Document::load(&output)?;
        assert!(document.trailer.get(b"Info").is_err());
        let bytes = std::fs::read(&output)?;
        assert!(!bytes.windows(8).any(|window| window == b"Jane Roe"));
        assert_eq!(page_count(&output)?, 1);
        Ok(())
    }

    #[test]
    fn fill_form_sets_values_and_locks_fields() -> TestResult<()> {
        let dir = TempDir::new()?;
        let input = fixture(
            &dir,
            "form.pdf",
            &PdfFixture::new(1).with_text_field("Name").with_text_field("Email"),
        )?;
        let output = dir.path().join("filled.pdf");
        let mut values = FormValues::new();
        values.insert("Name".into(), "Ada".into());
        values.insert("Unknown".into(), "ignored".into());

        LopdfToolkit::new().fill_form(&input, &output, &values, true)?;

        let document = Document::load(&output)?;
        let fields = collect_fields(&document);
        assert_eq!(fields.len(), 2);
        for field in fields {
            let dict = document.get_dictionary(field.id)?;
            assert_eq!(dict.get(b"Ff")?.as_i64()? & READ_ONLY_FLAG, READ_ONLY_FLAG);
            if field.partial_name == "Name" {
                assert!(matches!(dict.get(b"V")?, Object::String(value, _) if value == b"Ada"));
            } else {
                assert!(dict.get(b"V").is_err());
            }
        }
        Ok(())
    }

    #[test]
    fn extract_text_returns_every_page() -> TestResult<()> {
        let dir = TempDir::new()?;
        let input = fixture(&dir, "two.pdf", &PdfFixture::new(2))?;

        let text = LopdfToolkit::new().extract_text(&input)?;

        assert!(text.contains("Page 1"));
        assert!(text.contains("Page 2"));
        Ok(())
    }

    #[test]
    fn blanking_keeps_byte_length() {
        let mut bytes = b"abcabc".to_vec();
        assert_eq!(blank_occurrences(&mut bytes, b"bc"), 2);
        assert_eq!(bytes, b"a  a  ");
    }
}
