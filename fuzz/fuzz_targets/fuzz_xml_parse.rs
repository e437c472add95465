#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must not panic: errors are fine, panics are bugs.
    if let Ok(doc) = facturx::xml::XmlDocument::parse(data) {
        if let Ok(flavor) = facturx::Flavor::detect(&doc) {
            let _ = facturx::schema::validate_flavor(&doc, &flavor, &facturx::Resources::embedded());
        }
        let _ = doc.to_bytes();
    }
});
