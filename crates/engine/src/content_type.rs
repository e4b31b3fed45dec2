//! Extension-based content classification.
//!
//! Shared by the directory lister (icons, previewability) and downloads
//! (MIME type). Nothing here touches the filesystem.

use std::path::Path;

use serde::Serialize;

/// Extensions whose content is shown in the text preview.
pub const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "json", "xml", "html", "css", "js", "rb", "py", "java", "c", "cpp", "h", "hpp",
    "cs", "php", "sql", "sh", "bat", "ps1", "tsx", "ts",
];

/// Display category of an entry, serialized as the icon-font class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IconClass {
    #[serde(rename = "fa-folder")]
    Folder,
    #[serde(rename = "fa-image")]
    Image,
    #[serde(rename = "fa-video")]
    Video,
    #[serde(rename = "fa-music")]
    Audio,
    #[serde(rename = "fa-file-pdf")]
    Pdf,
    #[serde(rename = "fa-file-word")]
    Word,
    #[serde(rename = "fa-file-excel")]
    Spreadsheet,
    #[serde(rename = "fa-file-powerpoint")]
    Presentation,
    #[serde(rename = "fa-file-archive")]
    Archive,
    #[serde(rename = "fa-file-code")]
    Code,
    #[serde(rename = "fa-file")]
    Generic,
}

impl IconClass {
    /// Icon-font class name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folder => "fa-folder",
            Self::Image => "fa-image",
            Self::Video => "fa-video",
            Self::Audio => "fa-music",
            Self::Pdf => "fa-file-pdf",
            Self::Word => "fa-file-word",
            Self::Spreadsheet => "fa-file-excel",
            Self::Presentation => "fa-file-powerpoint",
            Self::Archive => "fa-file-archive",
            Self::Code => "fa-file-code",
            Self::Generic => "fa-file",
        }
    }

    /// Coarse category: folder, image, video, audio, archive, code,
    /// document or generic.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Archive => "archive",
            Self::Code => "code",
            Self::Pdf | Self::Word | Self::Spreadsheet | Self::Presentation => "document",
            Self::Generic => "generic",
        }
    }
}

/// Lowercased extension without the dot.
fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Whether the file is shown in the text preview.
pub fn is_previewable_text(path: &Path) -> bool {
    extension(path)
        .map(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// MIME type guessed from the extension; unknown maps to
/// `application/octet-stream`.
pub fn mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Icon class for an entry name.
pub fn icon_class(name: &str, is_directory: bool) -> IconClass {
    if is_directory {
        return IconClass::Folder;
    }

    let Some(ext) = extension(Path::new(name)) else {
        return IconClass::Generic;
    };

    match ext.as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" => IconClass::Image,
        "mp4" | "avi" | "mov" | "wmv" | "flv" | "mkv" => IconClass::Video,
        "mp3" | "wav" | "ogg" | "flac" | "m4a" => IconClass::Audio,
        "pdf" => IconClass::Pdf,
        "doc" | "docx" => IconClass::Word,
        "xls" | "xlsx" => IconClass::Spreadsheet,
        "ppt" | "pptx" => IconClass::Presentation,
        "zip" | "rar" | "7z" | "tar" | "gz" => IconClass::Archive,
        ext if TEXT_EXTENSIONS.contains(&ext) => IconClass::Code,
        _ => IconClass::Generic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_previewable_text() {
        assert!(is_previewable_text(Path::new("notes.txt")));
        assert!(is_previewable_text(Path::new("dir/Main.JAVA")));
        assert!(is_previewable_text(Path::new("component.tsx")));
        assert!(!is_previewable_text(Path::new("report.pdf")));
        assert!(!is_previewable_text(Path::new("Makefile")));
        assert!(!is_previewable_text(Path::new(".bashrc")));
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type(Path::new("photo.jpg")), "image/jpeg");
        assert_eq!(mime_type(Path::new("doc.pdf")), "application/pdf");
        assert_eq!(
            mime_type(Path::new("blob.unknownext")),
            "application/octet-stream"
        );
        assert_eq!(mime_type(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_icon_class() {
        assert_eq!(icon_class("photos", true), IconClass::Folder);
        assert_eq!(icon_class("photos.png", true), IconClass::Folder);
        assert_eq!(icon_class("a.PNG", false), IconClass::Image);
        assert_eq!(icon_class("clip.mkv", false), IconClass::Video);
        assert_eq!(icon_class("song.flac", false), IconClass::Audio);
        assert_eq!(icon_class("report.pdf", false), IconClass::Pdf);
        assert_eq!(icon_class("backup.tar.gz", false), IconClass::Archive);
        assert_eq!(icon_class("main.rb", false), IconClass::Code);
        assert_eq!(icon_class("README", false), IconClass::Generic);
    }

    #[test]
    fn test_icon_category() {
        assert_eq!(IconClass::Folder.category(), "folder");
        assert_eq!(IconClass::Word.category(), "document");
        assert_eq!(IconClass::Spreadsheet.category(), "document");
        assert_eq!(IconClass::Generic.category(), "generic");
    }

    #[test]
    fn test_icon_serializes_as_class_name() {
        let json = serde_json::to_string(&IconClass::Presentation).unwrap();
        assert_eq!(json, format!("\"{}\"", IconClass::Presentation.as_str()));
    }
}
