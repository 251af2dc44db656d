//! Generated PDF documents for transformation tests.
//!
//! Every page carries a single `Page N` text run so tests can assert on page
//! identity after merge or split. Resources and the media box live on the page
//! tree root, which exercises attribute inheritance in page copies.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};

use crate::FixtureResult;

/// Builder for small, valid PDF documents.
#[derive(Debug, Clone, Default)]
pub struct PdfFixture {
    pages: u32,
    author: Option<String>,
    text_fields: Vec<String>,
    extra_text: Option<String>,
}

impl PdfFixture {
    /// Start a document with `pages` pages.
    #[must_use]
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    /// Record an `/Info` dictionary with the supplied author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Add an AcroForm text field with the given partial name on the first page.
    #[must_use]
    pub fn with_text_field(mut self, name: impl Into<String>) -> Self {
        self.text_fields.push(name.into());
        self
    }

    /// Append an extra text run to every page (for redaction tests).
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.extra_text = Some(text.into());
        self
    }

    /// Serialise the document into memory.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be encoded.
    pub fn to_bytes(&self) -> FixtureResult<Vec<u8>> {
        let mut document = self.build()?;
        let mut buffer = Vec::new();
        document.save_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Write the document to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be encoded or written.
    pub fn write(&self, path: &Path) -> FixtureResult<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    fn build(&self) -> FixtureResult<Document> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        let mut first_page = None;
        for number in 1..=self.pages {
            let content_id = doc.add_object(Stream::new(
                Dictionary::new(),
                self.page_content(number).encode()?,
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            first_page.get_or_insert(page_id);
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => i64::from(self.pages),
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if let Some(page_id) = first_page.filter(|_| !self.text_fields.is_empty()) {
            let fields = self.add_fields(&mut doc, page_id)?;
            catalog.set("AcroForm", dictionary! { "Fields" => fields });
        }
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        if let Some(author) = &self.author {
            let info_id = doc.add_object(dictionary! {
                "Author" => Object::string_literal(author.as_str()),
                "Producer" => Object::string_literal("folio-test-support"),
            });
            doc.trailer.set("Info", info_id);
        }
        Ok(doc)
    }

    fn page_content(&self, number: u32) -> Content {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new(
                "Tj",
                vec![Object::string_literal(format!("Page {number}"))],
            ),
        ];
        if let Some(text) = &self.extra_text {
            operations.push(Operation::new("Td", vec![0.into(), (-36).into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
            ));
        }
        operations.push(Operation::new("ET", vec![]));
        Content { operations }
    }

    fn add_fields(&self, doc: &mut Document, page_id: ObjectId) -> FixtureResult<Vec<Object>> {
        let mut fields = Vec::new();
        for (index, name) in self.text_fields.iter().enumerate() {
            let top = 700 - 40 * i64::try_from(index)?;
            let field_id = doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Widget",
                "FT" => "Tx",
                "T" => Object::string_literal(name.as_str()),
                "Rect" => vec![72.into(), (top - 20).into(), 300.into(), top.into()],
                "P" => page_id,
            });
            fields.push(Object::Reference(field_id));
        }
        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        page.set("Annots", fields.clone());
        Ok(fields)
    }
}

/// Count the pages of the PDF at `path`.
///
/// # Errors
///
/// Returns an error when the document cannot be parsed.
pub fn page_count(path: &Path) -> FixtureResult<usize> {
    Ok(Document::load(path)?.get_pages().len())
}

/// Extract the text of each page, keyed by page number.
///
/// # Errors
///
/// Returns an error when the document cannot be parsed.
pub fn page_texts(path: &Path) -> FixtureResult<BTreeMap<u32, String>> {
    let document = Document::load(path)?;
    let mut texts = BTreeMap::new();
    for number in document.get_pages().keys() {
        texts.insert(*number, document.extract_text(&[*number])?);
    }
    Ok(texts)
}
