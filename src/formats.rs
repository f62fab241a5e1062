//! Catalog of source formats the converter knows about.
//!
//! The catalog drives the CLI's `formats` listing and picks a default
//! [`DocumentType`] from a file's extension. Whether a particular upload is
//! accepted is decided separately by the content-type allow-list in
//! [`crate::config::ClientConfig`].

use crate::model::DocumentType;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Broad family a format belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FormatCategory {
    Document,
    Image,
    Spreadsheet,
    Presentation,
    Archive,
    Audio,
    Video,
    Data,
}

impl FormatCategory {
    /// All categories in display order.
    pub const ALL: [FormatCategory; 8] = [
        FormatCategory::Document,
        FormatCategory::Image,
        FormatCategory::Spreadsheet,
        FormatCategory::Presentation,
        FormatCategory::Archive,
        FormatCategory::Audio,
        FormatCategory::Video,
        FormatCategory::Data,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FormatCategory::Document => "Document",
            FormatCategory::Image => "Image",
            FormatCategory::Spreadsheet => "Spreadsheet",
            FormatCategory::Presentation => "Presentation",
            FormatCategory::Archive => "Archive",
            FormatCategory::Audio => "Audio",
            FormatCategory::Video => "Video",
            FormatCategory::Data => "Data",
        }
    }
}

impl fmt::Display for FormatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        FormatCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown format category '{wanted}'"))
    }
}

/// One entry of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFormat {
    pub id: &'static str,
    pub name: &'static str,
    /// Lower-case, without the dot.
    pub extension: &'static str,
    pub category: FormatCategory,
    pub is_supported: bool,
    /// Document type preselected when a file of this format is chosen.
    pub document_type: Option<DocumentType>,
    pub description: &'static str,
}

impl FileFormat {
    /// MIME type for this format's extension.
    pub fn content_type(&self) -> String {
        mime_guess::from_ext(self.extension)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

const fn entry(
    id: &'static str,
    name: &'static str,
    extension: &'static str,
    category: FormatCategory,
    document_type: Option<DocumentType>,
    description: &'static str,
) -> FileFormat {
    FileFormat {
        id,
        name,
        extension,
        category,
        is_supported: true,
        document_type,
        description,
    }
}

static FORMATS: &[FileFormat] = &[
    // Document
    entry("pdf", "PDF", "pdf", FormatCategory::Document, Some(DocumentType::Expense), "Portable Document Format"),
    entry("doc", "DOC", "doc", FormatCategory::Document, Some(DocumentType::Expense), "Microsoft Word Document"),
    entry("docx", "DOCX", "docx", FormatCategory::Document, Some(DocumentType::Expense), "Microsoft Word Document"),
    entry("html", "HTML", "html", FormatCategory::Document, Some(DocumentType::Expense), "HyperText Markup Language"),
    entry("txt", "TXT", "txt", FormatCategory::Document, Some(DocumentType::Expense), "Plain Text File"),
    entry("rtf", "RTF", "rtf", FormatCategory::Document, Some(DocumentType::Expense), "Rich Text Format"),
    entry("odt", "ODT", "odt", FormatCategory::Document, Some(DocumentType::Expense), "OpenDocument Text"),
    entry("pages", "PAGES", "pages", FormatCategory::Document, Some(DocumentType::Expense), "Apple Pages Document"),
    entry("tex", "TEX", "tex", FormatCategory::Document, Some(DocumentType::Expense), "LaTeX Document"),
    entry("md", "MD", "md", FormatCategory::Document, Some(DocumentType::Expense), "Markdown Document"),

    // Image
    entry("jpg", "JPG", "jpg", FormatCategory::Image, Some(DocumentType::Expense), "JPEG Image"),
    entry("jpeg", "JPEG", "jpeg", FormatCategory::Image, Some(DocumentType::Expense), "JPEG Image"),
    entry("png", "PNG", "png", FormatCategory::Image, Some(DocumentType::Expense), "Portable Network Graphics"),
    entry("webp", "WEBP", "webp", FormatCategory::Image, Some(DocumentType::Expense), "WebP Image"),
    entry("tiff", "TIFF", "tiff", FormatCategory::Image, Some(DocumentType::Expense), "Tagged Image File Format"),
    entry("bmp", "BMP", "bmp", FormatCategory::Image, Some(DocumentType::Expense), "Bitmap Image"),
    entry("gif", "GIF", "gif", FormatCategory::Image, Some(DocumentType::Expense), "Graphics Interchange Format"),
    entry("svg", "SVG", "svg", FormatCategory::Image, Some(DocumentType::Expense), "Scalable Vector Graphics"),
    entry("ico", "ICO", "ico", FormatCategory::Image, Some(DocumentType::Expense), "Icon File"),
    entry("psd", "PSD", "psd", FormatCategory::Image, Some(DocumentType::Expense), "Adobe Photoshop Document"),

    // Spreadsheet
    entry("xls", "XLS", "xls", FormatCategory::Spreadsheet, Some(DocumentType::Expense), "Microsoft Excel Spreadsheet"),
    entry("xlsx", "XLSX", "xlsx", FormatCategory::Spreadsheet, Some(DocumentType::Expense), "Microsoft Excel Spreadsheet"),
    entry("csv", "CSV", "csv", FormatCategory::Spreadsheet, Some(DocumentType::Expense), "Comma Separated Values"),
    entry("ods", "ODS", "ods", FormatCategory::Spreadsheet, Some(DocumentType::Expense), "OpenDocument Spreadsheet"),
    entry("numbers", "NUMBERS", "numbers", FormatCategory::Spreadsheet, Some(DocumentType::Expense), "Apple Numbers Spreadsheet"),

    // Presentation
    entry("ppt", "PPT", "ppt", FormatCategory::Presentation, Some(DocumentType::Expense), "Microsoft PowerPoint"),
    entry("pptx", "PPTX", "pptx", FormatCategory::Presentation, Some(DocumentType::Expense), "Microsoft PowerPoint"),
    entry("odp", "ODP", "odp", FormatCategory::Presentation, Some(DocumentType::Expense), "OpenDocument Presentation"),
    entry("key", "KEY", "key", FormatCategory::Presentation, Some(DocumentType::Expense), "Apple Keynote Presentation"),

    // Archive
    entry("zip", "ZIP", "zip", FormatCategory::Archive, Some(DocumentType::Expense), "ZIP Archive"),
    entry("rar", "RAR", "rar", FormatCategory::Archive, Some(DocumentType::Expense), "RAR Archive"),
    entry("7z", "7Z", "7z", FormatCategory::Archive, Some(DocumentType::Expense), "7-Zip Archive"),
    entry("tar", "TAR", "tar", FormatCategory::Archive, Some(DocumentType::Expense), "Tape Archive"),
    entry("gz", "GZ", "gz", FormatCategory::Archive, Some(DocumentType::Expense), "Gzip Archive"),
    entry("bz2", "BZ2", "bz2", FormatCategory::Archive, Some(DocumentType::Expense), "Bzip2 Archive"),

    // Audio
    entry("mp3", "MP3", "mp3", FormatCategory::Audio, Some(DocumentType::Expense), "MPEG Audio Layer 3"),
    entry("wav", "WAV", "wav", FormatCategory::Audio, Some(DocumentType::Expense), "Waveform Audio File"),
    entry("flac", "FLAC", "flac", FormatCategory::Audio, Some(DocumentType::Expense), "Free Lossless Audio Codec"),
    entry("aac", "AAC", "aac", FormatCategory::Audio, Some(DocumentType::Expense), "Advanced Audio Coding"),
    entry("ogg", "OGG", "ogg", FormatCategory::Audio, Some(DocumentType::Expense), "Ogg Vorbis Audio"),
    entry("wma", "WMA", "wma", FormatCategory::Audio, Some(DocumentType::Expense), "Windows Media Audio"),

    // Video
    entry("mp4", "MP4", "mp4", FormatCategory::Video, Some(DocumentType::Expense), "MPEG-4 Video"),
    entry("avi", "AVI", "avi", FormatCategory::Video, Some(DocumentType::Expense), "Audio Video Interleave"),
    entry("mov", "MOV", "mov", FormatCategory::Video, Some(DocumentType::Expense), "QuickTime Movie"),
    entry("wmv", "WMV", "wmv", FormatCategory::Video, Some(DocumentType::Expense), "Windows Media Video"),
    entry("mkv", "MKV", "mkv", FormatCategory::Video, Some(DocumentType::Expense), "Matroska Video"),
    entry("webm", "WEBM", "webm", FormatCategory::Video, Some(DocumentType::Expense), "WebM Video"),

    // Data
    entry("json", "JSON", "json", FormatCategory::Data, Some(DocumentType::Expense), "JavaScript Object Notation"),
    entry("xml", "XML", "xml", FormatCategory::Data, Some(DocumentType::Expense), "Extensible Markup Language"),
    entry("yaml", "YAML", "yaml", FormatCategory::Data, Some(DocumentType::Expense), "YAML Ain't Markup Language"),
    entry("sql", "SQL", "sql", FormatCategory::Data, Some(DocumentType::Expense), "Structured Query Language"),
];

/// Every known format, grouped by category.
pub fn all() -> &'static [FileFormat] {
    FORMATS
}

/// Look a format up by extension, with or without the leading dot.
pub fn by_extension(ext: &str) -> Option<&'static FileFormat> {
    let ext = ext.trim().trim_start_matches('.');
    FORMATS.iter().find(|f| f.extension.eq_ignore_ascii_case(ext))
}

/// Format of a file, from its extension.
pub fn for_file_name(file_name: &str) -> Option<&'static FileFormat> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(by_extension)
}

pub fn by_category(category: FormatCategory) -> Vec<&'static FileFormat> {
    FORMATS.iter().filter(|f| f.category == category).collect()
}

/// Formats whose name or description contains `term`, ignoring case.
/// An empty term matches everything.
pub fn search(term: &str) -> Vec<&'static FileFormat> {
    let term = term.trim().to_lowercase();
    FORMATS
        .iter()
        .filter(|f| {
            f.name.to_lowercase().contains(&term) || f.description.to_lowercase().contains(&term)
        })
        .collect()
}

/// Document type to preselect for `file_name`; EXPENSE when unknown.
pub fn detect_document_type(file_name: &str) -> DocumentType {
    for_file_name(file_name)
        .and_then(|f| f.document_type)
        .unwrap_or_default()
}
