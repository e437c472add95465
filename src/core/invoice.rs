use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::FacturXError;
use super::access::{self, FieldSnapshot, FieldValue};
use crate::flavor::{Flavor, Resources};
use crate::pdf::{self, ComposeOptions, Composition, HeaderInfo, PdfMetadata};
use crate::schema;
use crate::xml::XmlDocument;

/// How to open an invoice PDF.
///
/// The flavor and level hints only apply when the PDF carries no invoice
/// XML yet and a blank template is instantiated.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    flavor: Option<String>,
    level: Option<String>,
    resources: Resources,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flavor(mut self, flavor: impl Into<String>) -> Self {
        self.flavor = Some(flavor.into());
        self
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }
}

/// Serialization of a field snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Yaml,
}

impl FromStr for SnapshotFormat {
    type Err = FacturXError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(FacturXError::Serialization(format!(
                "unknown snapshot format '{other}', expected json or yaml"
            ))),
        }
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        })
    }
}

/// A PDF invoice with its structured XML representation.
///
/// The XML tree is the single source of truth: field access reads and
/// writes it directly, and every save serializes it afresh.
#[derive(Debug, Clone)]
pub struct Invoice {
    xml: XmlDocument,
    flavor: Flavor,
    pdf: Vec<u8>,
    resources: Resources,
}

impl Invoice {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FacturXError> {
        Self::open_with(path, &OpenOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self, FacturXError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening invoice PDF");
        Self::from_bytes_with(std::fs::read(path)?, options)
    }

    pub fn from_bytes(pdf: impl Into<Vec<u8>>) -> Result<Self, FacturXError> {
        Self::from_bytes_with(pdf, &OpenOptions::default())
    }

    /// Load the embedded invoice XML, or instantiate a blank template when
    /// the PDF has none. Either way the XML is schema-validated.
    pub fn from_bytes_with(
        pdf: impl Into<Vec<u8>>,
        options: &OpenOptions,
    ) -> Result<Self, FacturXError> {
        let pdf = pdf.into();
        let document = pdf::load_pdf(&pdf)?;
        let resources = options.resources.clone();

        let (xml, flavor) = match pdf::find_invoice_xml(&document)? {
            Some(embedded) => {
                let xml = XmlDocument::parse(&embedded.data)?;
                let flavor = Flavor::detect(&xml)?;
                if options.flavor.is_some() || options.level.is_some() {
                    debug!("flavor hints ignored for a PDF with embedded XML");
                }
                (xml, flavor)
            }
            None => {
                let flavor =
                    Flavor::from_hints(options.flavor.as_deref(), options.level.as_deref())?;
                info!(%flavor, "PDF has no invoice XML, starting from template");
                (template(&flavor, &resources)?, flavor)
            }
        };
        schema::validate_flavor(&xml, &flavor, &resources)?;

        Ok(Self {
            xml,
            flavor,
            pdf,
            resources,
        })
    }

    /// Replace the XML with externally supplied invoice XML.
    ///
    /// Flavor and level are detected from the new document, which must pass
    /// schema validation; on failure the invoice is left unchanged.
    pub fn load_xml(&mut self, xml: &[u8]) -> Result<(), FacturXError> {
        let doc = XmlDocument::parse(xml)?;
        let flavor = Flavor::detect(&doc)?;
        schema::validate_flavor(&doc, &flavor, &self.resources)?;
        info!(%flavor, "invoice XML replaced");
        self.xml = doc;
        self.flavor = flavor;
        Ok(())
    }

    /// Discard the current XML in favour of a blank template.
    pub fn reset_to_template(&mut self, flavor: &str, level: &str) -> Result<(), FacturXError> {
        let flavor = Flavor::new(flavor, level)?;
        let doc = template(&flavor, &self.resources)?;
        schema::validate_flavor(&doc, &flavor, &self.resources)?;
        info!(%flavor, "invoice XML reset to template");
        self.xml = doc;
        self.flavor = flavor;
        Ok(())
    }

    pub fn flavor(&self) -> &Flavor {
        &self.flavor
    }

    /// Canonical attachment filename of the current flavor.
    pub fn attachment_filename(&self) -> &'static str {
        self.flavor.attachment_filename()
    }

    /// XMP conformance level string of the current level.
    pub fn conformance(&self) -> &'static str {
        self.flavor.conformance()
    }

    pub fn xml(&self) -> &XmlDocument {
        &self.xml
    }

    /// Direct access for data the field table does not map.
    pub fn xml_mut(&mut self) -> &mut XmlDocument {
        &mut self.xml
    }

    /// The base PDF the invoice was opened from.
    pub fn pdf_bytes(&self) -> &[u8] {
        &self.pdf
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    // -----------------------------------------------------------------------
    // Field access
    // -----------------------------------------------------------------------

    /// Value of `field`; `Ok(None)` when the document has no matching node.
    ///
    /// Date fields yield [`FieldValue::Date`], everything else text.
    pub fn get(&self, field: &str) -> Result<Option<FieldValue>, FacturXError> {
        access::get_field(&self.xml, &self.flavor, field)
    }

    pub fn get_text(&self, field: &str) -> Result<Option<String>, FacturXError> {
        Ok(self.get(field)?.map(|value| value.to_string()))
    }

    pub fn get_date(&self, field: &str) -> Result<Option<NaiveDate>, FacturXError> {
        Ok(self.get(field)?.and_then(|value| value.as_date()))
    }

    /// Write `field`. Fails when the path matches no node or several nodes;
    /// nodes are never created.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<(), FacturXError> {
        access::set_field(&mut self.xml, &self.flavor, field, value.into())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Schema validation for the current flavor and level.
    pub fn validate(&self) -> Result<(), FacturXError> {
        schema::validate_flavor(&self.xml, &self.flavor, &self.resources)
    }

    /// Required fields that are absent or empty.
    pub fn missing_required_fields(&self) -> Result<Vec<&'static str>, FacturXError> {
        access::missing_required(&self.xml, &self.flavor)
    }

    /// Schema-valid and every required field filled in. Never fails.
    pub fn is_valid(&self) -> bool {
        if self.validate().is_err() {
            return false;
        }
        match self.missing_required_fields() {
            Ok(missing) if missing.is_empty() => true,
            Ok(missing) => {
                for field in missing {
                    warn!(field, "required field is absent or empty");
                }
                false
            }
            Err(e) => {
                warn!(error = %e, "required field check failed");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Export
    // -----------------------------------------------------------------------

    /// Canonical XML serialization, as embedded into the PDF.
    pub fn xml_bytes(&self) -> Result<Vec<u8>, FacturXError> {
        self.xml.to_bytes()
    }

    pub fn write_xml(&self, path: impl AsRef<Path>) -> Result<(), FacturXError> {
        let path = path.as_ref();
        std::fs::write(path, self.xml_bytes()?)?;
        info!(path = %path.display(), "invoice XML written");
        Ok(())
    }

    /// Every field of the table with the text stored in the XML, dates
    /// included in their raw format 102 form.
    pub fn snapshot(&self) -> Result<FieldSnapshot, FacturXError> {
        access::snapshot(&self.xml, &self.flavor)
    }

    pub fn snapshot_string(&self, format: SnapshotFormat) -> Result<String, FacturXError> {
        let snapshot = self.snapshot()?;
        match format {
            SnapshotFormat::Json => serde_json::to_string_pretty(&snapshot)
                .map_err(|e| FacturXError::Serialization(e.to_string())),
            SnapshotFormat::Yaml => serde_yaml::to_string(&snapshot)
                .map_err(|e| FacturXError::Serialization(e.to_string())),
        }
    }

    pub fn write_snapshot(
        &self,
        path: impl AsRef<Path>,
        format: SnapshotFormat,
    ) -> Result<(), FacturXError> {
        let path = path.as_ref();
        std::fs::write(path, self.snapshot_string(format)?)?;
        info!(path = %path.display(), %format, "field snapshot written");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // PDF output
    // -----------------------------------------------------------------------

    /// Seller, number, issue date and type code, all required to describe the PDF.
    pub fn header_info(&self) -> Result<HeaderInfo, FacturXError> {
        let text = |field: &str| -> Result<String, FacturXError> {
            match access::field_text(&self.xml, &self.flavor, field)? {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                _ => Err(FacturXError::MetadataIncomplete(format!(
                    "field '{field}' is absent or empty"
                ))),
            }
        };
        let seller = text("seller")?;
        let number = text("invoice_number")?;
        let doc_type = text("type")?;
        let date = self.get_date("issue_date")?.ok_or_else(|| {
            FacturXError::MetadataIncomplete("field 'issue_date' is absent or empty".into())
        })?;
        Ok(HeaderInfo {
            seller,
            number,
            date,
            doc_type,
        })
    }

    /// Descriptive metadata: the override if one is set, else derived from the header.
    pub fn pdf_metadata(&self, options: &ComposeOptions) -> Result<PdfMetadata, FacturXError> {
        match options.override_values() {
            Some(values) => Ok(PdfMetadata::from_override(values)),
            None => self.header_info().map(|header| PdfMetadata::from_header(&header)),
        }
    }

    /// Compose the output PDF in memory.
    pub fn to_pdf_bytes(&self, options: &ComposeOptions) -> Result<Vec<u8>, FacturXError> {
        let metadata = self.pdf_metadata(options)?;
        pdf::compose(
            &self.pdf,
            Composition {
                flavor: &self.flavor,
                xml: self.xml_bytes()?,
                metadata: &metadata,
                options,
                resources: &self.resources,
            },
        )
    }

    /// Compose and write the output PDF; returns the number of bytes written.
    pub fn write_pdf(
        &self,
        path: impl AsRef<Path>,
        options: &ComposeOptions,
    ) -> Result<usize, FacturXError> {
        let path = path.as_ref();
        let bytes = self.to_pdf_bytes(options)?;
        std::fs::write(path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "invoice PDF written");
        Ok(bytes.len())
    }
}

fn template(flavor: &Flavor, resources: &Resources) -> Result<XmlDocument, FacturXError> {
    let source = resources.require(flavor.template_resource(), flavor.name(), flavor.level())?;
    XmlDocument::parse_str(&source)
}
