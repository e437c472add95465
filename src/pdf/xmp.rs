use chrono::{DateTime, Utc};

use super::info::{PdfMetadata, xmp_timestamp};
use crate::core::FacturXError;
use crate::flavor::{Flavor, Resources};
use crate::xml::{Element, XmlDocument};

const NS_X: &str = "adobe:ns:meta/";
const NS_RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
const NS_PDF: &str = "http://ns.adobe.com/pdf/1.3/";
const NS_XMP: &str = "http://ns.adobe.com/xap/1.0/";
const NS_PDFAID: &str = "http://www.aiim.org/pdfa/ns/id/";

const PACKET_BEGIN: &str = "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n";
const PACKET_END: &str = "<?xpacket end=\"w\"?>";

/// Inputs of the XMP metadata packet.
pub(crate) struct XmpPacket<'a> {
    pub flavor: &'a Flavor,
    pub metadata: &'a PdfMetadata,
    pub producer: &'a str,
    pub creator_tool: &'a str,
    pub timestamp: DateTime<Utc>,
}

impl XmpPacket<'_> {
    /// Serialize the packet, wrapped in `xpacket` processing instructions.
    pub fn to_bytes(&self, resources: &Resources) -> Result<Vec<u8>, FacturXError> {
        let extension = self.extension_schema(resources)?;
        let timestamp = xmp_timestamp(self.timestamp);
        let xmp = self.flavor.xmp();

        let rdf = Element::new("rdf:RDF", Some(NS_RDF))
            .with_namespace_declaration("rdf", NS_RDF)
            .with_child(
                description("pdfaid", NS_PDFAID)
                    .with_child(leaf("pdfaid:part", NS_PDFAID, "3"))
                    .with_child(leaf("pdfaid:conformance", NS_PDFAID, "B")),
            )
            .with_child(
                description("dc", NS_DC)
                    .with_child(
                        Element::new("dc:title", Some(NS_DC))
                            .with_child(alt(&self.metadata.title)),
                    )
                    .with_child(
                        Element::new("dc:creator", Some(NS_DC)).with_child(
                            Element::new("rdf:Seq", Some(NS_RDF))
                                .with_child(leaf("rdf:li", NS_RDF, &self.metadata.author)),
                        ),
                    )
                    .with_child(
                        Element::new("dc:description", Some(NS_DC))
                            .with_child(alt(&self.metadata.subject)),
                    ),
            )
            .with_child(
                description("pdf", NS_PDF).with_child(leaf("pdf:Producer", NS_PDF, self.producer)),
            )
            .with_child(
                description("xmp", NS_XMP)
                    .with_child(leaf("xmp:CreatorTool", NS_XMP, self.creator_tool))
                    .with_child(leaf("xmp:CreateDate", NS_XMP, &timestamp))
                    .with_child(leaf("xmp:ModifyDate", NS_XMP, &timestamp)),
            )
            .with_child(extension)
            .with_child(
                description(&xmp.prefix, &xmp.namespace)
                    .with_attribute(&format!("{}:ConformanceLevel", xmp.prefix), self.flavor.conformance())
                    .with_attribute(
                        &format!("{}:DocumentFileName", xmp.prefix),
                        self.flavor.attachment_filename(),
                    )
                    .with_attribute(&format!("{}:DocumentType", xmp.prefix), xmp.document_type.as_str())
                    .with_attribute(&format!("{}:Version", xmp.prefix), xmp.version.as_str()),
            );

        let root = Element::new("x:xmpmeta", Some(NS_X))
            .with_namespace_declaration("x", NS_X)
            .with_child(rdf);

        let mut packet = PACKET_BEGIN.as_bytes().to_vec();
        packet.extend(XmlDocument::new(root).serialize(false)?);
        packet.extend_from_slice(PACKET_END.as_bytes());
        Ok(packet)
    }

    /// The second `rdf:Description` of the flavor's extension template.
    fn extension_schema(&self, resources: &Resources) -> Result<Element, FacturXError> {
        let template = &self.flavor.xmp().template;
        let source = resources.require(template, self.flavor.name(), self.flavor.level())?;
        let doc = XmlDocument::parse_str(&source)?;
        let rdf = doc
            .root()
            .find(&|e| e.local_name() == "RDF" && e.namespace() == Some(NS_RDF))
            .ok_or_else(|| FacturXError::Resource(format!("{template}: no rdf:RDF element")))?;
        rdf.child_elements()
            .filter(|e| e.local_name() == "Description" && e.namespace() == Some(NS_RDF))
            .nth(1)
            .cloned()
            .ok_or_else(|| {
                FacturXError::Resource(format!("{template}: missing extension schema description"))
            })
    }
}

fn description(prefix: &str, namespace: &str) -> Element {
    Element::new("rdf:Description", Some(NS_RDF))
        .with_namespace_declaration(prefix, namespace)
        .with_attribute("rdf:about", "")
}

fn leaf(name: &str, namespace: &str, text: &str) -> Element {
    Element::new(name, Some(namespace)).with_text(text)
}

fn alt(text: &str) -> Element {
    let mut li = leaf("rdf:li", NS_RDF, text);
    li.set_attribute("xml:lang", "x-default");
    Element::new("rdf:Alt", Some(NS_RDF)).with_child(li)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn packet(flavor: &Flavor) -> Vec<u8> {
        let metadata = PdfMetadata {
            author: "Acme Corp".into(),
            keywords: "Invoice, Factur-X".into(),
            title: "Acme Corp: Invoice INV-1".into(),
            subject: "Factur-X Invoice INV-1 dated 2024-05-01 issued by Acme Corp".into(),
        };
        XmpPacket {
            flavor,
            metadata: &metadata,
            producer: "producer",
            creator_tool: "tool",
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        }
        .to_bytes(&Resources::embedded())
        .unwrap()
    }

    #[test]
    fn packet_is_wrapped_and_parseable() {
        let flavor = Flavor::new("factur-x", "en16931").unwrap();
        let bytes = packet(&flavor);
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("<?xpacket begin=\"\u{feff}\""));
        assert!(text.ends_with("<?xpacket end=\"w\"?>"));

        let doc = XmlDocument::parse(&bytes).unwrap();
        assert_eq!(doc.root().local_name(), "xmpmeta");
        let rdf = doc.root().child_elements().next().unwrap();
        assert_eq!(rdf.namespace(), Some(NS_RDF));
        let descriptions: Vec<_> = rdf.child_elements().collect();
        assert_eq!(descriptions.len(), 6);
        let fx = descriptions[5];
        assert_eq!(fx.attribute("fx:ConformanceLevel"), Some("EN 16931"));
        assert_eq!(fx.attribute("fx:DocumentFileName"), Some("factur-x.xml"));
        assert_eq!(fx.attribute("fx:DocumentType"), Some("INVOICE"));
        assert_eq!(fx.attribute("fx:Version"), Some("1.0"));
    }

    #[test]
    fn descriptive_fields() {
        let flavor = Flavor::new("factur-x", "minimum").unwrap();
        let text = String::from_utf8(packet(&flavor)).unwrap();
        assert!(text.contains("<rdf:li xml:lang=\"x-default\">Acme Corp: Invoice INV-1</rdf:li>"));
        assert!(text.contains("<pdfaid:part>3</pdfaid:part>"));
        assert!(text.contains("<pdf:Producer>producer</pdf:Producer>"));
        assert!(text.contains("<xmp:CreateDate>2024-05-01T10:00:00+00:00</xmp:CreateDate>"));
        assert!(text.contains("<pdfaSchema:prefix>fx</pdfaSchema:prefix>"));
    }

    #[test]
    fn zugferd_uses_its_own_namespace() {
        let flavor = Flavor::new("zugferd", "comfort").unwrap();
        let text = String::from_utf8(packet(&flavor)).unwrap();
        assert!(text.contains("xmlns:zf=\"urn:ferd:pdfa:CrossIndustryDocument:invoice:1p0#\""));
        assert!(text.contains("zf:ConformanceLevel=\"COMFORT\""));
        assert!(text.contains("zf:DocumentFileName=\"ZUGFeRD-invoice.xml\""));
    }
}
