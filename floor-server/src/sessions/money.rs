//! Money calculation utilities using rust_decimal for precision
//!
//! All monetary math runs on `Decimal` and converts to `f64` only at the
//! serialization boundary. Prices are gross (tax-inclusive); the tax
//! share is decomposed out of the gross, never added on top.

use crate::sessions::traits::SessionError;
use rust_decimal::prelude::*;
use shared::session::{
    AdjustmentKind, OrderItemInput, PaymentLineInput, PaymentRecord, PaymentSummaryItem,
    SessionSnapshot,
};

/// Rounding to 2 decimal places, half away from zero
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum allowed price per item
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per item
const MAX_QUANTITY: i32 = 9999;
/// Maximum allowed payment amount
const MAX_PAYMENT_AMOUNT: f64 = 1_000_000.0;
/// Maximum allowed tax rate in percent
const MAX_TAX_RATE: f64 = 100.0;

/// Validate that a f64 value is finite (not NaN, not Infinity)
#[inline]
fn require_finite(value: f64, field_name: &str) -> Result<(), SessionError> {
    if !value.is_finite() {
        return Err(SessionError::InvalidOperation(format!(
            "{} must be a finite number, got {}",
            field_name, value
        )));
    }
    Ok(())
}

// ========== Conversions ==========

pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Round to money precision (2 dp, half away from zero)
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

// ========== Validation ==========

/// Validate an incoming order item
pub fn validate_order_item(item: &OrderItemInput) -> Result<(), SessionError> {
    require_finite(item.unit_price, "unit_price")?;
    require_finite(item.tax_rate, "tax_rate")?;

    if item.unit_price < 0.0 || item.unit_price > MAX_PRICE {
        return Err(SessionError::InvalidOperation(format!(
            "unit_price out of range: {}",
            item.unit_price
        )));
    }
    if item.quantity <= 0 || item.quantity > MAX_QUANTITY {
        return Err(SessionError::InvalidOperation(format!(
            "quantity out of range: {}",
            item.quantity
        )));
    }
    if item.tax_rate < 0.0 || item.tax_rate > MAX_TAX_RATE {
        return Err(SessionError::InvalidOperation(format!(
            "tax_rate out of range: {}",
            item.tax_rate
        )));
    }
    if item.name.trim().is_empty() {
        return Err(SessionError::InvalidOperation(
            "item name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validate one tender leg of a payment
pub fn validate_payment_line(line: &PaymentLineInput) -> Result<(), SessionError> {
    require_finite(line.amount, "payment amount")?;
    if line.amount <= 0.0 || line.amount > MAX_PAYMENT_AMOUNT {
        return Err(SessionError::InvalidOperation(format!(
            "payment amount out of range: {}",
            line.amount
        )));
    }
    if line.method.trim().is_empty() {
        return Err(SessionError::InvalidOperation(
            "payment method must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validate a manual adjustment amount (sign comes from the kind)
pub fn validate_adjustment(amount: f64) -> Result<(), SessionError> {
    require_finite(amount, "adjustment amount")?;
    if amount <= 0.0 || amount > MAX_PAYMENT_AMOUNT {
        return Err(SessionError::InvalidOperation(format!(
            "adjustment amount out of range: {}",
            amount
        )));
    }
    Ok(())
}

// ========== Tax Decomposition ==========

/// Split a gross amount into (net, tax) for a percent tax rate.
///
/// net = gross / (1 + rate), rounded to money precision;
/// tax = gross - net, so the pair always sums back to the gross.
pub fn decompose_gross(gross: Decimal, tax_rate_percent: f64) -> (Decimal, Decimal) {
    let rate = to_decimal(tax_rate_percent) / Decimal::ONE_HUNDRED;
    let divisor = Decimal::ONE + rate;
    if divisor <= Decimal::ZERO {
        return (gross, Decimal::ZERO);
    }
    let net = round_money(gross / divisor);
    let tax = gross - net;
    (net, tax)
}

// ========== Settlement ==========

/// Recompute every derived monetary field on a snapshot.
///
/// Per-line gross/net/tax are written onto billable lines (zeroed on
/// others), then rolled up into subtotals; approved discounts and
/// charges adjust the gross and net while the tax share stays as
/// decomposed from the billable lines.
pub fn recalculate_totals(snapshot: &mut SessionSnapshot) {
    let mut subtotal_gross = Decimal::ZERO;
    let mut subtotal_net = Decimal::ZERO;
    let mut subtotal_tax = Decimal::ZERO;

    for item in snapshot.items.iter_mut() {
        if !item.is_billable() {
            item.line_gross = 0.0;
            item.line_net = 0.0;
            item.line_tax = 0.0;
            continue;
        }

        let gross = round_money(to_decimal(item.unit_price) * Decimal::from(item.quantity));
        let (net, tax) = decompose_gross(gross, item.tax_rate);

        item.line_gross = to_f64(gross);
        item.line_net = to_f64(net);
        item.line_tax = to_f64(tax);

        subtotal_gross += gross;
        subtotal_net += net;
        subtotal_tax += tax;
    }

    let mut discount_total = Decimal::ZERO;
    let mut charge_total = Decimal::ZERO;
    for adjustment in &snapshot.adjustments {
        match adjustment.kind {
            AdjustmentKind::Discount => discount_total += to_decimal(adjustment.amount),
            AdjustmentKind::Charge => charge_total += to_decimal(adjustment.amount),
        }
    }
    discount_total = round_money(discount_total);
    charge_total = round_money(charge_total);

    // Discounts and charges are tax-exclusive: they move gross and net
    // by the same amount, the decomposed tax share is untouched. A
    // discount can never push the bill below zero.
    let mut grand_gross = subtotal_gross - discount_total + charge_total;
    let mut grand_net = subtotal_net - discount_total + charge_total;
    if grand_gross < Decimal::ZERO {
        grand_gross = Decimal::ZERO;
    }
    if grand_net < Decimal::ZERO {
        grand_net = Decimal::ZERO;
    }

    let total_paid = round_money(
        snapshot
            .payments
            .iter()
            .map(|p| to_decimal(p.amount))
            .sum::<Decimal>(),
    );
    let change = (total_paid - grand_gross).max(Decimal::ZERO);

    snapshot.subtotal_gross = to_f64(round_money(subtotal_gross));
    snapshot.subtotal_net = to_f64(round_money(subtotal_net));
    snapshot.subtotal_tax = to_f64(round_money(subtotal_tax));
    snapshot.discount_total = to_f64(discount_total);
    snapshot.charge_total = to_f64(charge_total);
    snapshot.grand_total_gross = to_f64(round_money(grand_gross));
    snapshot.grand_total_net = to_f64(round_money(grand_net));
    snapshot.grand_total_tax = to_f64(round_money(subtotal_tax));
    snapshot.total_paid = to_f64(total_paid);
    snapshot.change = if snapshot.payments.is_empty() {
        0.0
    } else {
        to_f64(round_money(change))
    };
}

/// Roll payment records up per method, preserving first-seen order
pub fn summarize_payments(payments: &[PaymentRecord]) -> Vec<PaymentSummaryItem> {
    let mut summary: Vec<PaymentSummaryItem> = Vec::new();
    for payment in payments {
        match summary.iter_mut().find(|s| s.method == payment.method) {
            Some(entry) => {
                entry.amount =
                    to_f64(round_money(to_decimal(entry.amount) + to_decimal(payment.amount)));
            }
            None => summary.push(PaymentSummaryItem {
                method: payment.method.clone(),
                amount: payment.amount,
            }),
        }
    }
    summary
}

/// Sum of tender legs
pub fn sum_payment_lines(lines: &[PaymentLineInput]) -> Decimal {
    round_money(lines.iter().map(|l| to_decimal(l.amount)).sum::<Decimal>())
}

/// Tender covers the bill within the money tolerance
pub fn is_payment_sufficient(paid: Decimal, required: Decimal) -> bool {
    paid >= required - MONEY_TOLERANCE
}
