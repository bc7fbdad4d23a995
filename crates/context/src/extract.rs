//! Format-dispatched text extraction for document uploads, per spec §4.7.1.
//! Grounded on `fluent-core::neo4j::document_processor::DocumentExtractor`'s
//! extension-keyed dispatch (`extract_content` matching on `pdf` / plain-text
//! extensions / `docx`), generalized here to also cover presentation
//! formats, which `fluent-core` lists as supported in its upload validator
//! but never actually parses.

use std::io::Read;

use docx_rs::read_docx;

use crate::store::ContextError;

/// The document families §4.7.1 dispatches extraction on. `Presentation`
/// and `WordProcessor` both cover the Office Open XML zip family; `Pdf` and
/// `PlainText` are handled by dedicated parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    WordProcessor,
    Presentation,
    PlainText,
}

impl DocumentKind {
    /// Classifies by file extension first (reliable for uploads with a
    /// filename), falling back to the declared MIME type.
    pub fn classify(filename: &str, content_type: &str) -> DocumentKind {
        let ext = filename.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => return DocumentKind::Pdf,
            "docx" | "doc" | "odt" | "rtf" => return DocumentKind::WordProcessor,
            "pptx" | "ppt" | "odp" => return DocumentKind::Presentation,
            "txt" | "md" | "csv" | "json" | "yaml" | "yml" | "html" | "xml" => return DocumentKind::PlainText,
            _ => {}
        }
        if content_type.contains("pdf") {
            DocumentKind::Pdf
        } else if content_type.contains("presentation") {
            DocumentKind::Presentation
        } else if content_type.contains("wordprocessing") || content_type.contains("msword") {
            DocumentKind::WordProcessor
        } else {
            DocumentKind::PlainText
        }
    }
}

/// Extracts plain text from document bytes according to their dispatched
/// format. Unsupported or corrupt documents surface as `ContextError`.
pub fn extract_text(bytes: &[u8], filename: &str, content_type: &str) -> Result<String, ContextError> {
    match DocumentKind::classify(filename, content_type) {
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::WordProcessor => extract_docx(bytes),
        DocumentKind::Presentation => extract_pptx(bytes),
        DocumentKind::PlainText => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ContextError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ContextError::ExtractionFailed(format!("pdf: {e}")))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ContextError> {
    let docx = read_docx(bytes).map_err(|e| ContextError::ExtractionFailed(format!("docx: {e}")))?;
    let mut text = String::new();
    for child in &docx.document.children {
        push_document_child_text(child, &mut text);
    }
    Ok(text)
}

fn push_document_child_text(child: &docx_rs::DocumentChild, out: &mut String) {
    match child {
        docx_rs::DocumentChild::Paragraph(p) => {
            push_paragraph_text(p, out);
            out.push('\n');
        }
        docx_rs::DocumentChild::Table(t) => {
            for row in &t.rows {
                let docx_rs::TableChild::TableRow(row) = row;
                for cell in &row.cells {
                    let docx_rs::TableRowChild::TableCell(cell) = cell;
                    for content in &cell.children {
                        if let docx_rs::TableCellContent::Paragraph(p) = content {
                            push_paragraph_text(p, out);
                            out.push(' ');
                        }
                    }
                }
            }
            out.push('\n');
        }
        _ => {}
    }
}

fn push_paragraph_text(paragraph: &docx_rs::Paragraph, out: &mut String) {
    for child in &paragraph.children {
        if let docx_rs::ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let docx_rs::RunChild::Text(t) = run_child {
                    out.push_str(&t.text);
                }
            }
        }
    }
}

/// Presentation formats (pptx) are a zip of per-slide XML parts
/// (`ppt/slides/slideN.xml`) with text runs in `<a:t>` elements — the same
/// Office Open XML shape as `.docx`, but `docx_rs` only reads the
/// word-processing part names, so slides are walked directly with `zip` and
/// `quick_xml` instead.
fn extract_pptx(bytes: &[u8]) -> Result<String, ContextError> {
    let reader = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| ContextError::ExtractionFailed(format!("pptx: {e}")))?;

    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|n| n.to_string())
        .collect();
    slide_names.sort_by_key(|n| slide_sort_key(n));

    let mut text = String::new();
    for name in &slide_names {
        let mut file = archive.by_name(name).map_err(|e| ContextError::ExtractionFailed(format!("pptx: {e}")))?;
        let mut xml = String::new();
        file.read_to_string(&mut xml).map_err(|e| ContextError::ExtractionFailed(format!("pptx: {e}")))?;
        extract_a_t_runs(&xml, &mut text);
        text.push('\n');
    }
    Ok(text)
}

/// `slide10.xml` must sort after `slide2.xml`; extracts the numeric suffix.
fn slide_sort_key(name: &str) -> u32 {
    name.trim_start_matches("ppt/slides/slide").trim_end_matches(".xml").parse().unwrap_or(0)
}

fn extract_a_t_runs(xml: &str, out: &mut String) {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    let mut reader = Reader::from_str(xml);
    let mut in_text_run = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text_run = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"t" => in_text_run = false,
            Ok(Event::Text(e)) if in_text_run => {
                let raw = String::from_utf8_lossy(&e.into_inner()).into_owned();
                if let Ok(unescaped) = quick_xml::escape::unescape(&raw) {
                    out.push_str(&unescaped);
                    out.push(' ');
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }
}

/// Decodes image bytes to confirm they're a well-formed, supported image.
/// Returns the detected format's conventional MIME type on success.
pub fn validate_image(bytes: &[u8]) -> Result<&'static str, ContextError> {
    let format = image::guess_format(bytes).map_err(|e| ContextError::InvalidImage(e.to_string()))?;
    image::load_from_memory_with_format(bytes, format).map_err(|e| ContextError::InvalidImage(e.to_string()))?;
    Ok(format.to_mime_type())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(DocumentKind::classify("report.pdf", "application/octet-stream"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::classify("notes.docx", ""), DocumentKind::WordProcessor);
        assert_eq!(DocumentKind::classify("deck.pptx", ""), DocumentKind::Presentation);
        assert_eq!(DocumentKind::classify("readme.txt", ""), DocumentKind::PlainText);
    }

    #[test]
    fn classifies_by_content_type_when_extension_is_unknown() {
        assert_eq!(DocumentKind::classify("upload", "application/pdf"), DocumentKind::Pdf);
        assert_eq!(
            DocumentKind::classify("upload", "application/vnd.openxmlformats-officedocument.presentationml.presentation"),
            DocumentKind::Presentation
        );
    }

    #[test]
    fn extracts_plain_text_verbatim() {
        let text = extract_text(b"hello world", "notes.txt", "text/plain").unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn rejects_corrupt_pdf() {
        let err = extract_text(b"not a real pdf", "fake.pdf", "application/pdf").unwrap_err();
        assert!(matches!(err, ContextError::ExtractionFailed(_)));
    }

    #[test]
    fn validates_a_real_png() {
        let mut png = Vec::new();
        {
            let img = image::RgbImage::new(4, 4);
            let mut cursor = std::io::Cursor::new(&mut png);
            image::DynamicImage::ImageRgb8(img).write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        }
        let mime = validate_image(&png).unwrap();
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn rejects_garbage_as_image() {
        let err = validate_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ContextError::InvalidImage(_)));
    }

    fn build_pptx(slide_texts: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = std::io::Cursor::new(&mut buf);
            let mut zip = zip::ZipWriter::new(cursor);
            let options = zip::write::SimpleFileOptions::default();
            for (i, text) in slide_texts.iter().enumerate() {
                zip.start_file(format!("ppt/slides/slide{}.xml", i + 1), options).unwrap();
                use std::io::Write;
                write!(
                    zip,
                    r#"<p:sld xmlns:a="http://x"><p:txBody><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:txBody></p:sld>"#
                )
                .unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn extracts_slide_text_in_slide_order() {
        let pptx = build_pptx(&["first slide", "second slide", "tenth slide"]);
        let text = extract_pptx(&pptx).unwrap();
        assert!(text.contains("first slide"));
        assert!(text.contains("second slide"));
        assert!(text.contains("tenth slide"));
        let first_pos = text.find("first slide").unwrap();
        let second_pos = text.find("second slide").unwrap();
        assert!(first_pos < second_pos);
    }

    #[test]
    fn extract_text_dispatches_pptx_to_slide_extractor() {
        let pptx = build_pptx(&["only slide"]);
        let text = extract_text(&pptx, "deck.pptx", "").unwrap();
        assert!(text.contains("only slide"));
    }

    #[test]
    fn extracts_paragraph_text_from_a_real_docx() {
        use docx_rs::{Docx, Paragraph, Run};

        let mut buf = Vec::new();
        {
            let docx = Docx::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("hello from docx")));
            docx.pack(std::io::Cursor::new(&mut buf)).unwrap();
        }
        let text = extract_docx(&buf).unwrap();
        assert!(text.contains("hello from docx"));
    }
}
