//! Plain text and rich document readers.
//!
//! Plain text is decoded with an encoding fallback chain. Rich documents
//! (DOCX, HTML, RTF) have their markup stripped while paragraph breaks are
//! kept. Everything ends up in [`normalize`].

use crate::extract::ExtractError;
use scraper::{ElementRef, Html, Selector};
use std::io::Read;
use std::path::Path;

/// Upper bound on the decompressed size of `word/document.xml`.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

fn unreadable(path: &Path, e: impl std::fmt::Display) -> ExtractError {
    ExtractError::UnreadableFile(format!("{}: {}", path.display(), e))
}

/// Read and normalize a plain text file.
pub fn read_plain(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| unreadable(path, e))?;
    let text = decode_text(&bytes).map_err(|e| unreadable(path, e))?;
    Ok(normalize(&text))
}

/// Read a rich document and strip its markup.
pub fn read_rich(path: &Path, extension: &str) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| unreadable(path, e))?;
    let text = match extension {
        "docx" => docx_text(&bytes).map_err(|e| unreadable(path, e))?,
        "rtf" => rtf_text(&decode_text(&bytes).map_err(|e| unreadable(path, e))?),
        "html" | "htm" => html_text(&decode_text(&bytes).map_err(|e| unreadable(path, e))?),
        other => return Err(ExtractError::UnsupportedFileType(other.to_string())),
    };
    Ok(normalize(&text))
}

/// Decode bytes as UTF-8, UTF-16 (with BOM) or Windows-1252, in that order.
///
/// Content with NUL bytes and no UTF-16 BOM is treated as binary.
pub fn decode_text(bytes: &[u8]) -> Result<String, String> {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8(rest.to_vec()).map_err(|e| e.to_string());
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    if bytes.contains(&0) {
        return Err("binary content".to_string());
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            tracing::debug!("content is not UTF-8, decoding as Windows-1252");
            Ok(bytes.iter().map(|&b| cp1252_char(b)).collect())
        }
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Result<String, String> {
    if bytes.len() % 2 != 0 {
        return Err("odd byte count in UTF-16 content".to_string());
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| e.to_string())
}

/// Windows-1252 byte to char. Undefined slots map to their C1 control point.
fn cp1252_char(byte: u8) -> char {
    const HIGH: [char; 32] = [
        '€', '\u{81}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{8D}', 'Ž',
        '\u{8F}', '\u{90}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ',
        '\u{9D}', 'ž', 'Ÿ',
    ];
    match byte {
        0x80..=0x9F => HIGH[(byte - 0x80) as usize],
        _ => byte as char,
    }
}

/// Normalize line endings and whitespace, keeping paragraph breaks.
///
/// Each line has its inner whitespace collapsed; any run of blank lines
/// becomes a single empty line.
pub fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(text.len());
    let mut pending_break = false;

    for line in text.lines() {
        let cleaned = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.is_empty() {
            pending_break = true;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_break { "\n\n" } else { "\n" });
        }
        pending_break = false;
        out.push_str(&cleaned);
    }

    out
}

/// Text of a DOCX body: runs joined, one line per paragraph (table cells included).
pub fn docx_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| format!("word/document.xml: {e}"))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| e.to_string())?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err("word/document.xml exceeds size limit".to_string());
    }

    docx_body_text(&xml)
}

fn docx_body_text(xml: &[u8]) -> Result<String, String> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push(' '),
                b"br" | b"cr" => out.push('\n'),
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| e.to_string())?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

/// Readable text of an HTML page.
///
/// Prefers the main content area and its paragraphs, headings and list
/// items; falls back to every visible text node of the document.
pub fn html_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let main_selectors = ["article", "main", "[role='main']", "body"];

    for selector_str in main_selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = block_text(element);
                if !text.trim().is_empty() {
                    return text;
                }
            }
        }
    }

    visible_text(&document)
}

fn block_text(root: ElementRef<'_>) -> String {
    let Ok(blocks) = Selector::parse("p, h1, h2, h3, h4, h5, h6, li") else {
        return String::new();
    };

    let paragraphs: Vec<String> = root
        .select(&blocks)
        .map(|element| element.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .collect();

    paragraphs.join("\n\n")
}

fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|e| e.name().to_string()))
            .is_some_and(|name| matches!(name.as_str(), "script" | "style" | "noscript" | "title"));
        if !hidden && !text.trim().is_empty() {
            out.push_str(text.trim());
            out.push('\n');
        }
    }
    out
}

/// Destinations whose content is metadata rather than body text.
const RTF_SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "header",
    "headerl",
    "headerr",
    "footer",
    "footerl",
    "footerr",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
    "xmlnstbl",
    "themedata",
    "datastore",
    "latentstyles",
];

/// Strip RTF control words and groups, keeping body text.
pub fn rtf_text(rtf: &str) -> String {
    let chars: Vec<char> = rtf.chars().collect();
    let mut out = String::with_capacity(rtf.len() / 2);
    // Skip flag per open group; a group inherits its parent's flag.
    let mut groups: Vec<bool> = vec![false];
    let mut unicode_fallback = 1usize;
    let mut pending_fallback = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let skipping = groups.last().copied().unwrap_or(false);
        match chars[i] {
            '{' => {
                groups.push(skipping);
                i += 1;
            }
            '}' => {
                if groups.len() > 1 {
                    groups.pop();
                }
                i += 1;
            }
            '\\' => {
                i += 1;
                let Some(&next) = chars.get(i) else { break };
                if next.is_ascii_alphabetic() {
                    let start = i;
                    while i < chars.len() && chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().collect();
                    let param_start = i;
                    if i < chars.len() && chars[i] == '-' {
                        i += 1;
                    }
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    let param: Option<i32> = chars[param_start..i]
                        .iter()
                        .collect::<String>()
                        .parse()
                        .ok();
                    if i < chars.len() && chars[i] == ' ' {
                        i += 1;
                    }

                    if RTF_SKIPPED_DESTINATIONS.contains(&word.as_str()) {
                        if let Some(flag) = groups.last_mut() {
                            *flag = true;
                        }
                        continue;
                    }
                    if skipping {
                        continue;
                    }
                    match word.as_str() {
                        "par" | "line" | "sect" | "page" | "row" => out.push('\n'),
                        "tab" | "cell" => out.push(' '),
                        "emdash" => out.push('—'),
                        "endash" => out.push('–'),
                        "lquote" => out.push('‘'),
                        "rquote" => out.push('’'),
                        "ldblquote" => out.push('“'),
                        "rdblquote" => out.push('”'),
                        "bullet" => out.push('•'),
                        "uc" => unicode_fallback = param.unwrap_or(1).max(0) as usize,
                        "u" => {
                            if let Some(code) = param {
                                // Negative values encode code points above 32767.
                                let code = if code < 0 { code + 65536 } else { code } as u32;
                                if let Some(ch) = char::from_u32(code) {
                                    out.push(ch);
                                }
                                pending_fallback = unicode_fallback;
                            }
                        }
                        _ => {}
                    }
                } else {
                    i += 1;
                    match next {
                        '*' => {
                            if let Some(flag) = groups.last_mut() {
                                *flag = true;
                            }
                        }
                        '\'' => {
                            let hex: String = chars.iter().skip(i).take(2).collect();
                            i += hex.chars().count();
                            if pending_fallback > 0 {
                                pending_fallback -= 1;
                            } else if !skipping {
                                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                                    out.push(cp1252_char(byte));
                                }
                            }
                        }
                        '\\' | '{' | '}' if !skipping => out.push(next),
                        '~' if !skipping => out.push(' '),
                        '_' if !skipping => out.push('-'),
                        '\n' | '\r' if !skipping => out.push('\n'),
                        _ => {}
                    }
                }
            }
            '\r' | '\n' => i += 1,
            ch => {
                i += 1;
                if pending_fallback > 0 {
                    pending_fallback -= 1;
                } else if !skipping {
                    out.push(ch);
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn normalize_preserves_paragraphs_and_collapses_space() {
        let text = "  Title  \r\n\r\n\r\nBody   line one\nline\ttwo\n\n\n";
        assert_eq!(normalize(text), "Title\n\nBody line one\nline two");
    }

    #[test]
    fn decodes_utf8_with_bom() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFhello").unwrap(), "hello");
    }

    #[test]
    fn decodes_utf16_le_with_bom() {
        let bytes = [0xFF, 0xFE, b'h', 0, b'i', 0];
        assert_eq!(decode_text(&bytes).unwrap(), "hi");
    }

    #[test]
    fn falls_back_to_windows_1252() {
        // "café" with a 1252 é and a curly apostrophe
        let bytes = [b'c', b'a', b'f', 0xE9, b' ', 0x92, b's'];
        assert_eq!(decode_text(&bytes).unwrap(), "café ’s");
    }

    #[test]
    fn rejects_binary_content() {
        assert!(decode_text(&[0x7F, 0x45, 0x4C, 0x46, 0x00, 0x01]).is_err());
    }

    #[test]
    fn read_plain_reports_unreadable_binary() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(&[0, 1, 2, 3, 0]).unwrap();
        assert!(matches!(
            read_plain(file.path()),
            Err(ExtractError::UnreadableFile(_))
        ));
    }

    #[test]
    fn html_prefers_main_content() {
        let html = r#"<html><head><title>T</title><script>var x = 1;</script></head>
            <body><nav><li>Home</li></nav>
            <article><h1>Heading</h1><p>First   paragraph.</p><p>Second paragraph.</p></article>
            </body></html>"#;
        assert_eq!(html_text(html), "Heading\n\nFirst paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn html_without_blocks_uses_visible_text() {
        let html = "<html><head><style>p{}</style></head><body><div>Loose text</div></body></html>";
        let text = normalize(&html_text(html));
        assert_eq!(text, "Loose text");
    }

    #[test]
    fn rtf_strips_control_words_and_tables() {
        let rtf = r"{\rtf1\ansi{\fonttbl{\f0 Times New Roman;}}{\colortbl;\red0\green0\blue0;}
\f0\fs24 Hello \b world\b0 .\par
Caf\'e9 {\*\generator Riched20;}time\par
}";
        assert_eq!(normalize(&rtf_text(rtf)), "Hello world.\nCafé time");
    }

    #[test]
    fn rtf_decodes_unicode_escapes_and_skips_fallback() {
        let rtf = r"{\rtf1 caf\u233?s\par}";
        assert_eq!(normalize(&rtf_text(rtf)), "cafés");
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let xml = br#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>
<w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>
<w:p><w:r><w:t>Second &amp; last</w:t></w:r></w:p>
</w:body></w:document>"#;

        let mut zipped = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut zipped));
            writer
                .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(xml).unwrap();
            writer.finish().unwrap();
        }

        let text = normalize(&docx_text(&zipped).unwrap());
        assert_eq!(text, "Hello world\nSecond & last");
    }

    #[test]
    fn docx_without_document_part_fails() {
        assert!(docx_text(b"not a zip").is_err());
    }
}
