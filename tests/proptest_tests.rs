//! Property-based tests for field access and composition.

mod common;

use chrono::NaiveDate;
use facturx::xml::PathExpr;
use facturx::{ComposeOptions, FacturXError, FieldValue, Invoice, OpenOptions};
use proptest::prelude::*;

use common::{fixed_time, minimal_pdf};

fn blank(level: &str) -> Invoice {
    let options = OpenOptions::new().flavor("factur-x").level(level);
    Invoice::from_bytes_with(minimal_pdf(), &options).unwrap()
}

fn any_date() -> impl Strategy<Value = NaiveDate> {
    (1000i32..=9999, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

/// Printable text without leading or trailing whitespace.
fn any_text() -> impl Strategy<Value = String> {
    "[A-Za-z0-9äöüßé&<>\"' .,-]{0,40}".prop_map(|s| s.trim().to_string())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn date_fields_round_trip(date in any_date()) {
        let mut invoice = blank("basic");
        for field in ["issue_date", "due_date", "delivery_date"] {
            invoice.set(field, date).unwrap();
            prop_assert_eq!(invoice.get_date(field).unwrap(), Some(date));
        }
        prop_assert!(invoice.validate().is_ok());
    }

    #[test]
    fn text_fields_round_trip(text in any_text()) {
        let mut invoice = blank("en16931");
        for field in ["seller", "buyer", "note", "buyer_reference"] {
            invoice.set(field, text.clone()).unwrap();
            prop_assert_eq!(invoice.get(field).unwrap(), Some(FieldValue::Text(text.clone())));
        }
    }

    #[test]
    fn fields_survive_composition(seller in "[A-Za-z][A-Za-z0-9 ]{0,20}[a-z]", number in "[A-Z]{3}-[0-9]{1,6}", date in any_date()) {
        let mut invoice = blank("minimum");
        invoice.set("seller", seller.clone()).unwrap();
        invoice.set("invoice_number", number.clone()).unwrap();
        invoice.set("issue_date", date).unwrap();

        let bytes = invoice
            .to_pdf_bytes(&ComposeOptions::new().timestamp(fixed_time()))
            .unwrap();
        let reopened = Invoice::from_bytes(bytes).unwrap();
        prop_assert_eq!(reopened.get_text("seller").unwrap(), Some(seller));
        prop_assert_eq!(reopened.get_text("invoice_number").unwrap(), Some(number));
        prop_assert_eq!(reopened.get_date("issue_date").unwrap(), Some(date));
    }

    #[test]
    fn duplicated_nodes_always_refuse_writes(copies in 1usize..5, value in any_text()) {
        let mut invoice = blank("minimum");
        let parent = PathExpr::parse("//ram:ApplicableHeaderTradeAgreement/ram:BuyerTradeParty")
            .unwrap()
            .select(invoice.xml())
            .unwrap()
            .remove(0);
        let name = invoice
            .xml()
            .select("//ram:BuyerTradeParty/ram:Name")
            .unwrap()[0]
            .clone();
        for _ in 0..copies {
            invoice.xml_mut().element_mut(&parent).unwrap().push(name.clone());
        }

        let err = invoice.set("buyer", value).unwrap_err();
        let is_ambiguous = matches!(err, FacturXError::AmbiguousFieldPath { matches, .. } if matches == copies + 1);
        prop_assert!(is_ambiguous);
    }
}
