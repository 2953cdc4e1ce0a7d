//! Per-step checkout validation.
//!
//! Each validator returns a field-to-message map; an empty map means the
//! step is complete. Messages are shown inline next to the field, so they
//! name the problem without repeating the field label.

use driftwood_core::{CheckoutStep, Email};

use super::{BillingInfo, CheckoutState, FieldErrors, PaymentInfo, PaymentMethod, ShippingInfo};

const REQUIRED: &str = "This field is required";

fn require(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.insert(field.to_owned(), REQUIRED.to_owned());
    }
}

/// Validate the shipping step.
///
/// All contact and address fields are required except the second address
/// line. The email must have the `local@domain` shape.
#[must_use]
pub fn validate_shipping(shipping: &ShippingInfo) -> FieldErrors {
    let mut errors = FieldErrors::new();
    require(&mut errors, "first_name", &shipping.first_name);
    require(&mut errors, "last_name", &shipping.last_name);
    require(&mut errors, "phone", &shipping.phone);
    require(&mut errors, "address1", &shipping.address1);
    require(&mut errors, "city", &shipping.city);
    require(&mut errors, "state", &shipping.state);
    require(&mut errors, "postal_code", &shipping.postal_code);
    require(&mut errors, "country", &shipping.country);

    if shipping.email.trim().is_empty() {
        errors.insert("email".to_owned(), REQUIRED.to_owned());
    } else if Email::parse(shipping.email.trim()).is_err() {
        errors.insert(
            "email".to_owned(),
            "Enter a valid email address".to_owned(),
        );
    }
    errors
}

/// Validate the billing step.
///
/// Vacuously valid when the billing address mirrors shipping.
#[must_use]
pub fn validate_billing(billing: &BillingInfo) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if billing.same_as_shipping {
        return errors;
    }
    require(&mut errors, "address1", &billing.address1);
    require(&mut errors, "city", &billing.city);
    require(&mut errors, "state", &billing.state);
    require(&mut errors, "postal_code", &billing.postal_code);
    require(&mut errors, "country", &billing.country);
    errors
}

/// Validate the payment step.
///
/// Card details are checked for shape only; whether the card is actually
/// chargeable is the gateway's call. Non-card methods are selectable but
/// cannot complete a checkout yet.
#[must_use]
pub fn validate_payment(payment: &PaymentInfo) -> FieldErrors {
    let mut errors = FieldErrors::new();
    match payment.method {
        PaymentMethod::Card => {
            let card = &payment.card;
            if !card_number_plausible(&card.number) {
                errors.insert(
                    "card_number".to_owned(),
                    "Enter a valid card number".to_owned(),
                );
            }
            if !expiry_plausible(&card.expiry) {
                errors.insert(
                    "card_expiry".to_owned(),
                    "Enter the expiry as MM/YY".to_owned(),
                );
            }
            if !cvv_plausible(&card.cvv) {
                errors.insert(
                    "card_cvv".to_owned(),
                    "Enter the 3 or 4 digit security code".to_owned(),
                );
            }
            require(&mut errors, "card_holder_name", &card.holder_name);
        }
        PaymentMethod::Paypal | PaymentMethod::BankTransfer => {
            errors.insert(
                "method".to_owned(),
                "This payment method is not available yet".to_owned(),
            );
        }
    }
    errors
}

/// Validate one step of a checkout state.
#[must_use]
pub fn validate_step(state: &CheckoutState, step: CheckoutStep) -> FieldErrors {
    match step {
        CheckoutStep::Shipping => validate_shipping(&state.shipping),
        CheckoutStep::Billing => validate_billing(&state.billing),
        CheckoutStep::Payment => validate_payment(&state.payment),
    }
}

/// 13-19 digits once separators are stripped.
fn card_number_plausible(number: &str) -> bool {
    let digits: Vec<char> = number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    (13..=19).contains(&digits.len()) && digits.iter().all(char::is_ascii_digit)
}

/// `MM/YY` with a month in 1-12. Expired cards are the gateway's concern.
fn expiry_plausible(expiry: &str) -> bool {
    let Some((month, year)) = expiry.trim().split_once('/') else {
        return false;
    };
    if month.len() != 2 || year.len() != 2 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    month.parse::<u8>().is_ok_and(|m| (1..=12).contains(&m))
}

fn cvv_plausible(cvv: &str) -> bool {
    let cvv = cvv.trim();
    (3..=4).contains(&cvv.len()) && cvv.bytes().all(|b| b.is_ascii_digit())
}
