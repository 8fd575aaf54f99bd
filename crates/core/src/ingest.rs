use crate::error::IngestError;
use crate::extractor::{extract_pdf_text, read_text_file, PdfBackend, TextEncoding};
use crate::models::{Document, DocumentCollection};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

/// How the pipeline turns one source file into text. Fixed per pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Pdf(PdfBackend),
    Text(TextEncoding),
}

impl SourceFormat {
    fn matches_extension(self, extension: &str) -> bool {
        match self {
            Self::Pdf(_) => extension.eq_ignore_ascii_case("pdf"),
            Self::Text(_) => TEXT_EXTENSIONS
                .iter()
                .any(|candidate| extension.eq_ignore_ascii_case(candidate)),
        }
    }
}

/// Existence check for one source path. Absence is a normal `false`,
/// never an error.
pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}

/// Walk a folder tree and collect the files the given format can read,
/// sorted for deterministic input order.
pub fn discover_source_files(folder: &Path, format: SourceFormat) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| format.matches_extension(extension));

        if matches {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct IngestionReport {
    pub documents: DocumentCollection,
    pub skipped_files: Vec<SkippedFile>,
    pub completed_at: DateTime<Utc>,
}

/// Sequential single-pass loader: resolve, extract, number, append.
///
/// Missing files are skipped with a warning and recorded in the report;
/// a file that exists but cannot be parsed aborts the whole run.
pub struct IngestionPipeline {
    paths: Vec<PathBuf>,
    format: SourceFormat,
}

impl IngestionPipeline {
    pub fn new(paths: Vec<PathBuf>, format: SourceFormat) -> Result<Self, IngestError> {
        if paths.is_empty() {
            return Err(IngestError::InvalidArgument(
                "expecting a non-empty list of source files".to_string(),
            ));
        }

        Ok(Self { paths, format })
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn run(&self) -> Result<IngestionReport, IngestError> {
        let mut documents = DocumentCollection::default();
        let mut skipped_files = Vec::new();
        let mut document_number = 0u64;

        for path in &self.paths {
            if !file_exists(path) {
                warn!(path = %path.display(), "source file does not exist, skipping");
                skipped_files.push(SkippedFile {
                    path: path.clone(),
                    reason: "file does not exist".to_string(),
                });
                continue;
            }

            let content = match self.format {
                SourceFormat::Pdf(backend) => extract_pdf_text(backend, path)?,
                SourceFormat::Text(encoding) => read_text_file(path, encoding)?,
            };

            documents.push(Document {
                content,
                source_path: path.display().to_string(),
                document_number,
            });
            document_number += 1;
        }

        info!(
            loaded = documents.len(),
            skipped = skipped_files.len(),
            "ingestion run finished"
        );

        Ok(IngestionReport {
            documents,
            skipped_files,
            completed_at: Utc::now(),
        })
    }
}
