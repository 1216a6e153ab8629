use encoding_rs::WINDOWS_1252;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, StringFormat, Stream, dictionary};

use super::layout::{Page, PageGeometry};

/// Encode for a `WinAnsiEncoding` font. Characters with no Windows-1252 byte
/// are written as `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    let (bytes, _, had_errors) = WINDOWS_1252.encode(text);
    if !had_errors {
        return bytes.into_owned();
    }
    let mut buf = [0u8; 4];
    text.chars()
        .map(|c| match WINDOWS_1252.encode(c.encode_utf8(&mut buf)) {
            (bytes, _, false) if bytes.len() == 1 => bytes[0],
            _ => b'?',
        })
        .collect()
}

fn text_operations(page: &Page, font_size: f32) -> Vec<Operation> {
    let mut ops = Vec::with_capacity(page.lines.len() * 5);
    for line in &page.lines {
        let font = if line.heading { "F2" } else { "F1" };
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![font.into(), font_size.into()]));
        ops.push(Operation::new("Td", vec![line.x.into(), line.y.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(win_ansi(&line.text), StringFormat::Literal)],
        ));
        ops.push(Operation::new("ET", vec![]));
    }
    ops
}

/// Serialize laid-out pages to PDF bytes, one PDF page per layout page.
///
/// # Errors
///
/// Returns an error if a content stream cannot be encoded or the document
/// cannot be written.
pub fn render_pdf(pages: &[Page], geometry: &PageGeometry) -> Result<Vec<u8>, lopdf::Error> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => regular_id, "F2" => bold_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let content = Content {
            operations: text_operations(page, geometry.font_size),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).unwrap_or(i64::MAX);
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                geometry.page_width.into(),
                geometry.page_height.into(),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}
