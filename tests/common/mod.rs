#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use lopdf::{Document, Object, Stream, StringFormat, dictionary};

/// Fixed composition time so outputs are reproducible.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// A one-page PDF with no attachments.
pub fn minimal_pdf() -> Vec<u8> {
    save(base_document(1, false))
}

/// A PDF/A-style base: output intent, trailer ID and `pages` pages.
pub fn pdfa_base(pages: usize) -> Vec<u8> {
    save(base_document(pages, true))
}

/// A one-page PDF carrying `data` as an embedded file named `filename`.
pub fn pdf_with_attachment(filename: &str, data: &[u8]) -> Vec<u8> {
    let mut doc = base_document(1, false);
    let stream_id = doc.add_object(Stream::new(
        dictionary! { "Type" => "EmbeddedFile" },
        data.to_vec(),
    ));
    let filespec_id = doc.add_object(dictionary! {
        "Type" => "Filespec",
        "F" => Object::string_literal(filename),
        "EF" => dictionary! { "F" => Object::Reference(stream_id) },
    });
    let catalog_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    let catalog = doc.get_object_mut(catalog_id).unwrap().as_dict_mut().unwrap();
    catalog.set(
        "Names",
        dictionary! {
            "EmbeddedFiles" => dictionary! {
                "Names" => vec![Object::string_literal(filename), Object::Reference(filespec_id)],
            },
        },
    );
    save(doc)
}

fn base_document(pages: usize, pdfa: bool) -> Document {
    let mut doc = Document::with_version("1.7");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => Object::Reference(font_id),
        },
    });
    let mut kids = Vec::new();
    for n in 0..pages {
        let content = Stream::new(
            dictionary! {},
            format!("BT /F1 12 Tf 100 700 Td (Invoice page {n}) Tj ET").into_bytes(),
        );
        let content_id = doc.add_object(content);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Contents" => Object::Reference(content_id),
            "Resources" => Object::Reference(resources_id),
        });
        kids.push(Object::Reference(page_id));
    }
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => pages as i64,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    };
    if pdfa {
        let profile_id = doc.add_object(Stream::new(
            dictionary! { "N" => 3 },
            b"fake icc profile".to_vec(),
        ));
        catalog.set(
            "OutputIntents",
            vec![Object::Dictionary(dictionary! {
                "Type" => "OutputIntent",
                "S" => "GTS_PDFA1",
                "OutputConditionIdentifier" => Object::string_literal("sRGB"),
                "DestOutputProfile" => Object::Reference(profile_id),
            })],
        );
        let id = Object::String(b"0123456789abcdef".to_vec(), StringFormat::Hexadecimal);
        doc.trailer.set("ID", vec![id.clone(), id]);
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}
