//! Word template filling
//!
//! A `.docx` is a zip of XML parts. Placeholders (`{{ name }}`) live in the
//! text runs of the body, headers and footers. Word often splits a
//! placeholder over several runs when it was typed with pauses or spell
//! checked, so the run markup inside a placeholder is removed before
//! substitution.

use std::io::{Cursor, Read, Write};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::context::Context;
use crate::RenderError;

/// Main body part; a package without it is not a Word document
pub const DOCUMENT_PART: &str = "word/document.xml";

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid regex"))
}

fn split_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\{(?:<[^>]*>)+\{")
}

fn split_close() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\}(?:<[^>]*>)+\}")
}

fn placeholder_span() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\{\{(?:[^{}<]|<[^>]*>)*?\}\}")
}

/// Opening or closing `<w:p>` tag; `<w:pPr>` and `<w:proofErr>` do not match
fn paragraph_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"</?w:p[\s/>]")
}

fn markup() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"<[^>]*>")
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}")
}

/// Whether a package part carries substitutable text
pub fn is_text_part(name: &str) -> bool {
    name == DOCUMENT_PART
        || (name.starts_with("word/header") && name.ends_with(".xml"))
        || (name.starts_with("word/footer") && name.ends_with(".xml"))
}

/// Join placeholders that Word split across runs
///
/// Repairs stay within one paragraph: a stray `{{` is never joined with a
/// `}}` from a later paragraph.
pub fn repair_split_placeholders(xml: &str) -> String {
    let xml = within_paragraph(split_open(), xml, |_| "{{".to_string());
    let xml = within_paragraph(split_close(), &xml, |_| "}}".to_string());
    within_paragraph(placeholder_span(), &xml, |span| markup().replace_all(span, "").into_owned())
}

/// Rewrite the matches of `re` that do not cross a paragraph boundary
fn within_paragraph(re: &Regex, xml: &str, rewrite: impl Fn(&str) -> String) -> String {
    re.replace_all(xml, |caps: &Captures<'_>| {
        let span = &caps[0];
        if paragraph_tag().is_match(span) {
            span.to_string()
        } else {
            rewrite(span)
        }
    })
    .into_owned()
}

/// Replace resolvable placeholders; unresolved ones are left untouched
pub fn substitute(xml: &str, context: &Context) -> String {
    let repaired = repair_split_placeholders(xml);
    placeholder()
        .replace_all(&repaired, |caps: &Captures<'_>| match context.lookup(&caps[1]) {
            Some(value) => escape_xml(&value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Placeholder names used by a part, after run repair
pub fn placeholders(xml: &str) -> Vec<String> {
    let repaired = repair_split_placeholders(xml);
    let mut names: Vec<String> = placeholder()
        .captures_iter(&repaired)
        .map(|c| c[1].to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Fill every text part of a `.docx` package
pub fn fill_docx(template: &[u8], context: &Context) -> Result<Vec<u8>, RenderError> {
    let mut archive = ZipArchive::new(Cursor::new(template))?;
    if archive.by_name(DOCUMENT_PART).is_err() {
        return Err(RenderError::NotADocument(format!("missing {DOCUMENT_PART}")));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if entry.is_dir() {
            continue;
        }

        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        writer.start_file(name.as_str(), options)?;
        if is_text_part(&name) {
            let xml = String::from_utf8(buf)
                .map_err(|e| RenderError::NotADocument(format!("{name} is not UTF-8: {e}")))?;
            writer.write_all(substitute(&xml, context).as_bytes())?;
        } else {
            writer.write_all(&buf)?;
        }
    }

    Ok(writer.finish()?.into_inner())
}

/// Placeholder names used anywhere in a `.docx` package
pub fn docx_placeholders(template: &[u8]) -> Result<Vec<String>, RenderError> {
    let mut archive = ZipArchive::new(Cursor::new(template))?;
    let mut names = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !is_text_part(entry.name()) {
            continue;
        }
        let mut xml = String::new();
        entry.read_to_string(&mut xml)?;
        names.extend(placeholders(&xml));
    }
    names.sort();
    names.dedup();
    Ok(names)
}
