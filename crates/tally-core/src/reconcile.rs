//! Receipt reconciliation
//!
//! Model extractions are unreliable about which monetary fields they fill
//! in: some documents report only a grand total, others every intermediate
//! subtotal, and the numbers frequently disagree. Reconciliation turns that
//! partial, possibly self-contradictory input into a fully-specified record
//! with fixed arithmetic between the fields.
//!
//! The policy is "trust explicit non-zero values; derive everything else
//! bottom-up from the line items". That makes the derivation total (it
//! never fails - zero is the universal default), deterministic, and
//! idempotent: re-running it on its own output changes nothing, because
//! every field is already non-zero and therefore preserved. All defaulting
//! lives here; nothing else in the crate patches these fields ad hoc.

use crate::amount::Amount;
use crate::receipt::{RegularReceipt, TransportationTicket};

/// Fill in and enforce the arithmetic between a receipt's monetary fields.
///
/// The steps run in a fixed order because each may depend on the previous
/// one's output:
///
/// 1. `items_total` defaults to the exact sum of line item totals.
/// 2. `subtotal` defaults to that sum, minus tax when the document says
///    item prices already include tax; then clamps at zero.
/// 3. `pretax_total` is the subtotal; `posttax_total` adds tax, clamped.
/// 4. `total` defaults to `posttax_total + tip + gratuity`; `final_total`
///    defaults to `total`. Explicit non-zero values for either are
///    preserved verbatim.
/// 5. Every monetary field is quantized to 2 decimals last.
///
/// Line items must already be normalized (`LineItem::normalize`); their
/// totals are summed at full precision, never via floats.
pub fn reconcile(receipt: &mut RegularReceipt) {
    let items_sum: Amount = receipt.line_items.iter().map(|li| li.total_price).sum();

    if receipt.items_total.is_zero() {
        receipt.items_total = items_sum;
    }

    if receipt.subtotal.is_zero() {
        receipt.subtotal = if receipt.tax_included_in_items {
            items_sum.saturating_sub(receipt.tax)
        } else {
            items_sum
        };
    }

    receipt.pretax_total = receipt.subtotal.quantize();
    // both operands are non-negative, so the >= 0 clamp holds structurally
    receipt.posttax_total = (receipt.pretax_total + receipt.tax).quantize();

    let computed_total = (receipt.posttax_total + receipt.tip + receipt.gratuity).quantize();
    if receipt.total.is_zero() {
        receipt.total = computed_total;
    }
    if receipt.final_total.is_zero() {
        receipt.final_total = receipt.total;
    }

    receipt.subtotal = receipt.subtotal.quantize();
    receipt.tax = receipt.tax.quantize();
    receipt.tip = receipt.tip.quantize();
    receipt.gratuity = receipt.gratuity.quantize();
    receipt.total = receipt.total.quantize();
    receipt.display_subtotal = receipt.display_subtotal.quantize();
    receipt.items_total = receipt.items_total.quantize();
    receipt.pretax_total = receipt.pretax_total.quantize();
    receipt.posttax_total = receipt.posttax_total.quantize();
    receipt.final_total = receipt.final_total.quantize();
}

/// Reconcile a transportation ticket: `total` defaults to `fare + taxes`;
/// an explicit non-zero total is preserved. Either of `fare`/`total` can
/// back-fill the other upstream in classification.
pub fn reconcile_ticket(ticket: &mut TransportationTicket) {
    ticket.fare = ticket.fare.quantize();
    ticket.taxes = ticket.taxes.quantize();
    if ticket.total.is_zero() {
        ticket.total = (ticket.fare + ticket.taxes).quantize();
    } else {
        ticket.total = ticket.total.quantize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::LineItem;
    use uuid::Uuid;

    fn item(name: &str, quantity: f64, unit_price: &str) -> LineItem {
        let mut li = LineItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            quantity,
            unit_price: Amount::parse(unit_price).unwrap(),
            total_price: Amount::ZERO,
            assignments: vec![],
        };
        li.normalize().unwrap();
        li
    }

    fn receipt_with(items: Vec<LineItem>) -> RegularReceipt {
        RegularReceipt {
            is_receipt: true,
            merchant: None,
            date: None,
            line_items: items,
            subtotal: Amount::ZERO,
            tax: Amount::ZERO,
            tip: Amount::ZERO,
            gratuity: Amount::ZERO,
            total: Amount::ZERO,
            payment_method: None,
            tax_included_in_items: false,
            display_subtotal: Amount::ZERO,
            items_total: Amount::ZERO,
            pretax_total: Amount::ZERO,
            posttax_total: Amount::ZERO,
            final_total: Amount::ZERO,
        }
    }

    #[test]
    fn test_derives_everything_from_line_items() {
        let mut r = receipt_with(vec![
            item("Sausage Omurice", 2.0, "23.00"),
            item("Curry Chicken Sandwich", 1.0, "18.00"),
        ]);
        r.tax = Amount::parse("5.80").unwrap();
        r.tip = Amount::parse("12.80").unwrap();

        reconcile(&mut r);

        assert_eq!(r.items_total.to_string(), "64.00");
        assert_eq!(r.subtotal.to_string(), "64.00");
        assert_eq!(r.pretax_total.to_string(), "64.00");
        assert_eq!(r.posttax_total.to_string(), "69.80");
        assert_eq!(r.total.to_string(), "82.60");
        assert_eq!(r.final_total.to_string(), "82.60");
    }

    #[test]
    fn test_tax_included_in_items_branch() {
        // Items sum to 100.00 with tax baked in: subtotal backs the tax out
        let mut r = receipt_with(vec![item("Set menu", 1.0, "100.00")]);
        r.tax = Amount::parse("8.00").unwrap();
        r.tax_included_in_items = true;

        reconcile(&mut r);

        assert_eq!(r.subtotal.to_string(), "92.00");
        assert_eq!(r.posttax_total.to_string(), "100.00");
        assert_eq!(r.total.to_string(), "100.00");
    }

    #[test]
    fn test_explicit_total_preserved() {
        let mut r = receipt_with(vec![item("Set menu", 1.0, "100.00")]);
        r.tax = Amount::parse("8.00").unwrap();
        r.tax_included_in_items = true;
        r.total = Amount::parse("999.00").unwrap();

        reconcile(&mut r);

        // Trusted verbatim, never recomputed from components
        assert_eq!(r.total.to_string(), "999.00");
        assert_eq!(r.final_total.to_string(), "999.00");
    }

    #[test]
    fn test_explicit_subtotal_preserved() {
        let mut r = receipt_with(vec![item("Widget", 1.0, "50.00")]);
        r.subtotal = Amount::parse("45.00").unwrap(); // discount printed on the document
        r.tax = Amount::parse("4.50").unwrap();

        reconcile(&mut r);

        assert_eq!(r.subtotal.to_string(), "45.00");
        assert_eq!(r.pretax_total.to_string(), "45.00");
        assert_eq!(r.posttax_total.to_string(), "49.50");
        // items_total still reflects the raw item sum
        assert_eq!(r.items_total.to_string(), "50.00");
    }

    #[test]
    fn test_subtotal_clamped_at_zero() {
        // Tax larger than the item sum with tax-included: clamp, don't go negative
        let mut r = receipt_with(vec![item("Sticker", 1.0, "1.00")]);
        r.tax = Amount::parse("5.00").unwrap();
        r.tax_included_in_items = true;

        reconcile(&mut r);

        assert_eq!(r.subtotal.to_string(), "0.00");
        assert_eq!(r.posttax_total.to_string(), "5.00");
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut r = receipt_with(vec![
            item("Sausage Omurice", 2.0, "23.00"),
            item("Curry Chicken Sandwich", 1.0, "18.00"),
        ]);
        r.tax = Amount::parse("5.80").unwrap();
        r.tip = Amount::parse("12.80").unwrap();

        reconcile(&mut r);
        let first = serde_json::to_string(&r).unwrap();
        reconcile(&mut r);
        let second = serde_json::to_string(&r).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_sum_invariant_over_odd_prices() {
        // Prices chosen to expose float drift if it existed
        let prices = ["0.10", "0.20", "1.13", "7.07", "19.99", "0.01", "3.33"];
        let items: Vec<LineItem> = prices.iter().map(|p| item("x", 1.0, p)).collect();
        let expected: Amount = items.iter().map(|li| li.total_price).sum();

        let mut r = receipt_with(items);
        reconcile(&mut r);

        assert_eq!(r.items_total, expected.quantize());
        assert_eq!(r.items_total.to_string(), "31.83");
    }

    #[test]
    fn test_empty_receipt_reconciles_to_zeros() {
        // Reconciliation never fails; zero is the universal default
        let mut r = receipt_with(vec![]);
        reconcile(&mut r);
        assert_eq!(r.total.to_string(), "0.00");
        assert_eq!(r.final_total.to_string(), "0.00");
    }

    #[test]
    fn test_gratuity_and_tip_both_added() {
        let mut r = receipt_with(vec![item("Banquet", 1.0, "200.00")]);
        r.tax = Amount::parse("16.00").unwrap();
        r.tip = Amount::parse("20.00").unwrap();
        r.gratuity = Amount::parse("36.00").unwrap();

        reconcile(&mut r);

        assert_eq!(r.posttax_total.to_string(), "216.00");
        assert_eq!(r.total.to_string(), "272.00");
    }

    #[test]
    fn test_ticket_total_from_fare_and_taxes() {
        let mut t: TransportationTicket = serde_json::from_value(serde_json::json!({
            "document_type": "transportation_ticket",
            "fare": 20.0,
            "taxes": 1.5
        }))
        .unwrap();
        reconcile_ticket(&mut t);
        assert_eq!(t.total.to_string(), "21.50");
    }

    #[test]
    fn test_ticket_explicit_total_preserved() {
        let mut t: TransportationTicket = serde_json::from_value(serde_json::json!({
            "document_type": "transportation_ticket",
            "fare": 20.0,
            "taxes": 1.5,
            "total": 25.0
        }))
        .unwrap();
        reconcile_ticket(&mut t);
        assert_eq!(t.total.to_string(), "25.00");
    }
}
