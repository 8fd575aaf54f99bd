use crate::error::IngestError;
use lopdf::Document;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Extracted text of a single page, in increasing page order.
#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub const SUPPORTED_PDF_BACKENDS: &[&str] = &["lopdf", "pdf-extract"];

/// Which PDF engine extracts page text. Chosen once per pipeline and fixed
/// for its lifetime. The two engines are interchangeable: for the same
/// well-formed document they yield the same number of page segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfBackend {
    Lopdf,
    PdfExtract,
}

impl PdfBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lopdf => "lopdf",
            Self::PdfExtract => "pdf-extract",
        }
    }
}

impl fmt::Display for PdfBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PdfBackend {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, IngestError> {
        match value {
            "lopdf" => Ok(Self::Lopdf),
            "pdf-extract" => Ok(Self::PdfExtract),
            other => Err(IngestError::InvalidBackend {
                requested: other.to_string(),
                supported: SUPPORTED_PDF_BACKENDS,
            }),
        }
    }
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document = Document::load(path).map_err(|error| IngestError::PdfParse {
            path: path.display().to_string(),
            details: error.to_string(),
        })?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse {
                    path: path.display().to_string(),
                    details: error.to_string(),
                })?;

            // Empty pages stay in: every page must contribute a segment.
            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

#[derive(Default)]
pub struct PdfExtractExtractor;

impl PdfExtractor for PdfExtractExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let pages = pdf_extract::extract_text_by_pages(path).map_err(|error| {
            IngestError::PdfParse {
                path: path.display().to_string(),
                details: error.to_string(),
            }
        })?;

        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(index, text)| PageText {
                number: (index + 1) as u32,
                text,
            })
            .collect())
    }
}

/// Extract one PDF with the configured backend and join its pages.
pub fn extract_pdf_text(backend: PdfBackend, path: &Path) -> Result<String, IngestError> {
    let pages = match backend {
        PdfBackend::Lopdf => LopdfExtractor.extract_pages(path)?,
        PdfBackend::PdfExtract => PdfExtractExtractor.extract_pages(path)?,
    };
    Ok(join_page_texts(&pages))
}

/// Every page contributes one segment prefixed by a line break and a space,
/// the first page included, so segment count always equals page count.
pub fn join_page_texts(pages: &[PageText]) -> String {
    let mut joined = String::new();
    for page in pages {
        joined.push_str("\n ");
        joined.push_str(&page.text);
    }
    joined
}

pub const SUPPORTED_TEXT_ENCODINGS: &[&str] = &["utf-8", "utf-8-lossy", "latin-1"];

/// Decoding applied when reading plain-text sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf8Lossy,
    Latin1,
}

impl TextEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Lossy => "utf-8-lossy",
            Self::Latin1 => "latin-1",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextEncoding {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, IngestError> {
        match value {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "utf-8-lossy" | "utf8-lossy" => Ok(Self::Utf8Lossy),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            other => Err(IngestError::InvalidEncoding {
                requested: other.to_string(),
                supported: SUPPORTED_TEXT_ENCODINGS,
            }),
        }
    }
}

/// Read a plain-text file verbatim with the configured decoding.
/// No page semantics: the whole file is one string.
pub fn read_text_file(path: &Path, encoding: TextEncoding) -> Result<String, IngestError> {
    let bytes = std::fs::read(path)?;
    match encoding {
        TextEncoding::Utf8 => String::from_utf8(bytes).map_err(|error| IngestError::TextDecode {
            path: path.display().to_string(),
            details: error.to_string(),
        }),
        TextEncoding::Utf8Lossy => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        TextEncoding::Latin1 => Ok(bytes.iter().map(|&byte| byte as char).collect()),
    }
}


#[cfg(test)]
mod pdf_roundtrip_tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_two_page_pdf() -> (tempfile::TempDir, PathBuf) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for line in ["alpha page", "beta page"] {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode page content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let dir = tempdir().unwrap();
        let path = dir.path().join("two-pages.pdf");
        doc.save(&path).expect("save pdf");
        (dir, path)
    }

    #[test]
    fn both_backends_see_the_same_page_count() {
        let (_dir, path) = write_two_page_pdf();

        let lopdf_pages = LopdfExtractor.extract_pages(&path).unwrap();
        let extract_pages = PdfExtractExtractor.extract_pages(&path).unwrap();

        assert_eq!(lopdf_pages.len(), 2);
        assert_eq!(lopdf_pages.len(), extract_pages.len());
    }

    #[test]
    fn joined_pdf_text_has_one_segment_per_page() {
        let (_dir, path) = write_two_page_pdf();

        let joined = extract_pdf_text(PdfBackend::Lopdf, &path).unwrap();
        let segments: Vec<&str> = joined.split("\n ").collect();

        // Leading separator, then one segment per page.
        assert_eq!(segments.len(), 3);
        assert!(joined.contains("alpha"));
        assert!(joined.contains("beta"));
    }
}
