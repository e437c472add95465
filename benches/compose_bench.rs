use chrono::{NaiveDate, TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lopdf::{Document, Object, Stream, dictionary};

use facturx::xml::XmlDocument;
use facturx::{Attachment, ComposeOptions, Flavor, Invoice, OpenOptions, Resources};

fn base_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for n in 0..pages {
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            format!("BT /F1 12 Tf 100 700 Td (Page {n}) Tj ET").into_bytes(),
        ));
        kids.push(Object::Reference(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Contents" => Object::Reference(content_id),
        })));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn filled_invoice(pages: usize) -> Invoice {
    let options = OpenOptions::new().flavor("factur-x").level("en16931");
    let mut invoice = Invoice::from_bytes_with(base_pdf(pages), &options).unwrap();
    invoice.set("seller", "Benchmark GmbH").unwrap();
    invoice.set("buyer", "Kunde AG").unwrap();
    invoice.set("invoice_number", "BENCH-001").unwrap();
    invoice
        .set("issue_date", NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
        .unwrap();
    invoice
}

fn compose_options() -> ComposeOptions {
    ComposeOptions::new().timestamp(Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap())
}

// ── Field access ───────────────────────────────────────────────────

fn bench_field_access(c: &mut Criterion) {
    let mut invoice = filled_invoice(1);
    c.bench_function("get_field", |b| {
        b.iter(|| black_box(invoice.get(black_box("seller"))));
    });
    c.bench_function("set_field", |b| {
        b.iter(|| black_box(invoice.set("invoice_number", black_box("BENCH-002"))));
    });
    c.bench_function("snapshot", |b| {
        b.iter(|| black_box(invoice.snapshot()));
    });
}

// ── Validation ─────────────────────────────────────────────────────

fn bench_validate(c: &mut Criterion) {
    let invoice = filled_invoice(1);
    c.bench_function("schema_validate_en16931", |b| {
        b.iter(|| black_box(invoice.validate()));
    });
    let xml = invoice.xml_bytes().unwrap();
    c.bench_function("xml_parse_detect", |b| {
        b.iter(|| {
            let doc = XmlDocument::parse(black_box(&xml)).unwrap();
            black_box(Flavor::detect(&doc))
        });
    });
}

// ── PDF ────────────────────────────────────────────────────────────

fn bench_compose(c: &mut Criterion) {
    let small = filled_invoice(1);
    let large = filled_invoice(50);
    let options = compose_options();
    c.bench_function("compose_1_page", |b| {
        b.iter(|| black_box(small.to_pdf_bytes(black_box(&options))));
    });
    c.bench_function("compose_50_pages", |b| {
        b.iter(|| black_box(large.to_pdf_bytes(black_box(&options))));
    });

    let with_attachment =
        compose_options().attachment(Attachment::new("timesheet.csv", vec![b'x'; 64 * 1024]));
    c.bench_function("compose_with_64k_attachment", |b| {
        b.iter(|| black_box(small.to_pdf_bytes(black_box(&with_attachment))));
    });
}

fn bench_open(c: &mut Criterion) {
    let composed = filled_invoice(1).to_pdf_bytes(&compose_options()).unwrap();
    c.bench_function("open_composed_pdf", |b| {
        b.iter(|| black_box(Invoice::from_bytes(black_box(composed.clone()))));
    });
    let blank = base_pdf(1);
    c.bench_function("open_blank_from_template", |b| {
        b.iter(|| {
            black_box(Invoice::from_bytes_with(
                black_box(blank.clone()),
                &OpenOptions::new().resources(Resources::embedded()),
            ))
        });
    });
}

criterion_group!(
    benches,
    bench_field_access,
    bench_validate,
    bench_compose,
    bench_open
);
criterion_main!(benches);
