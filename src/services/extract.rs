// src/services/extract.rs

//! Text extraction from attachment binaries.

use std::sync::Arc;

use lopdf::Document;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};

const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "pre", "blockquote",
];

/// Turns attachment bytes into plain text.
///
/// Failures are [`AppError::Extraction`], kept distinct from the fetch
/// failures that happen before extraction is attempted.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, attachment_id: &str, bytes: &[u8]) -> Result<String>;
}

/// Extractor that picks a reader by sniffing the content.
///
/// - `%PDF` magic: page text via `lopdf`, pages separated by blank lines
/// - HTML markup: block elements via `scraper`, one paragraph each
/// - anything else: UTF-8 text with an optional BOM
#[derive(Debug, Default, Clone, Copy)]
pub struct SniffingExtractor;

impl TextExtractor for SniffingExtractor {
    fn extract(&self, attachment_id: &str, bytes: &[u8]) -> Result<String> {
        let text = if bytes.starts_with(b"%PDF") {
            extract_pdf(bytes).map_err(|e| AppError::extraction(attachment_id, e))?
        } else {
            let decoded = decode_utf8(bytes).map_err(|e| AppError::extraction(attachment_id, e))?;
            if looks_like_html(decoded) {
                extract_html(decoded)
            } else {
                decoded.to_string()
            }
        };

        let text = text.replace("\r\n", "\n");
        if text.trim().is_empty() {
            return Err(AppError::extraction(attachment_id, "no readable text"));
        }
        Ok(text)
    }
}

/// Run an extractor off the async runtime.
pub async fn extract_blocking(
    extractor: Arc<dyn TextExtractor>,
    attachment_id: &str,
    bytes: Vec<u8>,
) -> Result<String> {
    let id = attachment_id.to_string();
    tokio::task::spawn_blocking(move || extractor.extract(&id, &bytes))
        .await
        .map_err(|e| AppError::extraction(attachment_id, format!("extraction task failed: {}", e)))?
}

fn decode_utf8(bytes: &[u8]) -> std::result::Result<&str, String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = std::str::from_utf8(bytes).map_err(|e| format!("not UTF-8 text: {}", e))?;
    if text.contains('\0') {
        return Err("binary content (NUL bytes)".to_string());
    }
    Ok(text)
}

fn looks_like_html(text: &str) -> bool {
    let head: String = text.trim_start().chars().take(512).collect::<String>().to_lowercase();
    head.starts_with("<!doctype html")
        || head.starts_with("<html")
        || (head.starts_with('<') && (head.contains("<body") || head.contains("<p")))
}

fn extract_pdf(bytes: &[u8]) -> std::result::Result<String, String> {
    let document = Document::load_mem(bytes).map_err(|e| format!("unreadable PDF: {}", e))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|e| format!("page {}: {}", page_no, e))?;
        let text = text.trim();
        if !text.is_empty() {
            pages.push(text.to_string());
        }
    }
    Ok(pages.join("\n\n"))
}

fn extract_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = match Selector::parse(&BLOCK_TAGS.join(", ")) {
        Ok(selector) => selector,
        Err(_) => return body_text(&document),
    };

    let blocks: Vec<String> = document
        .select(&selector)
        .filter(|el| !has_block_ancestor(el))
        .map(|el| normalize_whitespace(el.text()))
        .filter(|text| !text.is_empty())
        .collect();

    if blocks.is_empty() {
        body_text(&document)
    } else {
        blocks.join("\n\n")
    }
}

fn has_block_ancestor(element: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| BLOCK_TAGS.contains(&a.value().name()))
}

fn body_text(document: &Html) -> String {
    match Selector::parse("body") {
        Ok(body) => document
            .select(&body)
            .next()
            .map(|b| normalize_whitespace(b.text()))
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

fn normalize_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    fn extract(bytes: &[u8]) -> Result<String> {
        SniffingExtractor.extract("att", bytes)
    }

    fn one_page_pdf(text: &str) -> Vec<u8> {
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
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_plain_text_with_bom() {
        let text = extract(b"\xEF\xBB\xBFFirst line\r\n\r\nSecond").unwrap();
        assert_eq!(text, "First line\n\nSecond");
    }

    #[test]
    fn test_html_blocks_become_paragraphs() {
        let html = b"<!DOCTYPE html><html><head><title>t</title></head><body>\
            <h1>Notice</h1><p>The  office is\n closed.</p>\
            <ul><li><p>Monday</p></li><li>Tuesday</li></ul></body></html>";
        let text = extract(html).unwrap();
        assert_eq!(text, "Notice\n\nThe office is closed.\n\nMonday\n\nTuesday");
    }

    #[test]
    fn test_html_without_blocks_uses_body_text() {
        let text = extract(b"<html><body><div>Just a <span>div</span></div></body></html>").unwrap();
        assert_eq!(text, "Just a div");
    }

    #[test]
    fn test_pdf_text() {
        let text = extract(&one_page_pdf("Quarterly budget report")).unwrap();
        assert!(text.contains("Quarterly budget report"), "got {text:?}");
    }

    #[test]
    fn test_unreadable_inputs_are_extraction_errors() {
        for bytes in [
            b"%PDF-1.4 truncated garbage".as_slice(),
            b"\xFF\xFE\x00\x01binary".as_slice(),
            b"text\0with nul".as_slice(),
            b"   \n\n  ".as_slice(),
            b"<html><body></body></html>".as_slice(),
        ] {
            let err = extract(bytes).unwrap_err();
            assert!(
                matches!(err, AppError::Extraction { ref attachment_id, .. } if attachment_id == "att"),
                "bytes {bytes:?} gave {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_extract_blocking() {
        let extractor: Arc<dyn TextExtractor> = Arc::new(SniffingExtractor);
        let text = extract_blocking(extractor, "att", b"hello".to_vec()).await.unwrap();
        assert_eq!(text, "hello");
    }
}
