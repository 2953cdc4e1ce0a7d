//! The checkout state machine.
//!
//! Checkout is a pure state-transition function `(state, action) -> state`
//! with no I/O and no UI binding, so every rule is unit-testable. The state
//! itself is serializable and lives in the browser session for the duration
//! of one checkout attempt.

pub mod validate;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use driftwood_core::CheckoutStep;

pub use validate::{validate_billing, validate_payment, validate_shipping, validate_step};

/// Field-to-message validation errors; an empty map means valid.
pub type FieldErrors = BTreeMap<String, String>;

/// Shipping contact and address draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Billing address draft.
///
/// When `same_as_shipping` is set, the address fields are ignored and the
/// billing snapshot is taken from shipping at submission time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingInfo {
    pub same_as_shipping: bool,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Selectable payment methods.
///
/// Only `Card` is completable in this engine; other methods are reserved for
/// future gateway bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Card,
    Paypal,
    BankTransfer,
}

/// Card details draft, as typed by the shopper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDraft {
    /// Card number, separators allowed.
    pub number: String,
    /// Expiry in `MM/YY` form.
    pub expiry: String,
    /// 3-4 digit card verification value.
    pub cvv: String,
    /// Cardholder name as printed.
    pub holder_name: String,
}

/// Payment method draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub card: CardDraft,
}

/// One checkout attempt's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckoutState {
    /// The step currently shown.
    pub step: CheckoutStep,
    /// Shipping draft.
    pub shipping: ShippingInfo,
    /// Billing draft.
    pub billing: BillingInfo,
    /// Payment draft.
    pub payment: PaymentInfo,
    /// Validation errors for the current step.
    pub errors: FieldErrors,
    /// Single in-flight guard; while set, further submissions are rejected
    /// before any network call.
    pub is_processing: bool,
}

impl CheckoutState {
    /// Claim the in-flight guard.
    ///
    /// Returns `false` if a submission is already in flight.
    pub const fn begin_submit(&mut self) -> bool {
        if self.is_processing {
            false
        } else {
            self.is_processing = true;
            true
        }
    }
}

/// Actions the UI layer can dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckoutAction {
    /// Replace the shipping draft.
    UpdateShipping(ShippingInfo),
    /// Replace the billing draft.
    UpdateBilling(BillingInfo),
    /// Replace the payment draft.
    UpdatePayment(PaymentInfo),
    /// Validate the current step and advance on success.
    NextStep,
    /// Step backward; never validates, never clears data.
    PrevStep,
    /// Claim the in-flight guard.
    BeginSubmit,
    /// Release the in-flight guard after a submission settles.
    FinishSubmit,
    /// Reset to a fresh checkout (completion or abandonment).
    Reset,
}

/// The pure transition function.
///
/// Forward movement is gated by validation of the current step; backward
/// movement always succeeds. Updating a draft clears the error map, since
/// the previous validation no longer reflects the fields.
#[must_use]
pub fn transition(state: CheckoutState, action: CheckoutAction) -> CheckoutState {
    let mut state = state;
    match action {
        CheckoutAction::UpdateShipping(shipping) => {
            state.shipping = shipping;
            state.errors.clear();
        }
        CheckoutAction::UpdateBilling(billing) => {
            state.billing = billing;
            state.errors.clear();
        }
        CheckoutAction::UpdatePayment(payment) => {
            state.payment = payment;
            state.errors.clear();
        }
        CheckoutAction::NextStep => {
            let errors = validate_step(&state, state.step);
            if errors.is_empty() {
                state.errors.clear();
                if let Some(next) = state.step.next() {
                    state.step = next;
                }
            } else {
                state.errors = errors;
            }
        }
        CheckoutAction::PrevStep => {
            if let Some(prev) = state.step.prev() {
                state.step = prev;
            }
            state.errors.clear();
        }
        CheckoutAction::BeginSubmit => {
            let _ = state.begin_submit();
        }
        CheckoutAction::FinishSubmit => {
            state.is_processing = false;
        }
        CheckoutAction::Reset => {
            state = CheckoutState::default();
        }
    }
    state
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::test_support::{valid_card, valid_shipping};
    use super::*;

    #[test]
    fn test_next_step_blocked_by_missing_fields() {
        let state = CheckoutState::default();
        let state = transition(state, CheckoutAction::NextStep);
        assert_eq!(state.step, CheckoutStep::Shipping);
        assert!(!state.errors.is_empty());
    }

    #[test]
    fn test_next_step_advances_exactly_one() {
        let state = transition(
            CheckoutState::default(),
            CheckoutAction::UpdateShipping(valid_shipping()),
        );
        let state = transition(state, CheckoutAction::NextStep);
        assert_eq!(state.step, CheckoutStep::Billing);
        assert!(state.errors.is_empty());
    }

    #[test]
    fn test_prev_step_never_validates_or_clears() {
        let mut state = transition(
            CheckoutState::default(),
            CheckoutAction::UpdateShipping(valid_shipping()),
        );
        state = transition(state, CheckoutAction::NextStep);
        assert_eq!(state.step, CheckoutStep::Billing);

        state = transition(state, CheckoutAction::PrevStep);
        assert_eq!(state.step, CheckoutStep::Shipping);
        assert_eq!(state.shipping, valid_shipping());
    }

    #[test]
    fn test_prev_step_at_first_step_stays() {
        let state = transition(CheckoutState::default(), CheckoutAction::PrevStep);
        assert_eq!(state.step, CheckoutStep::Shipping);
    }

    #[test]
    fn test_billing_same_as_shipping_skips_validation() {
        let mut state = transition(
            CheckoutState::default(),
            CheckoutAction::UpdateShipping(valid_shipping()),
        );
        state = transition(state, CheckoutAction::NextStep);
        state = transition(
            state,
            CheckoutAction::UpdateBilling(BillingInfo {
                same_as_shipping: true,
                ..BillingInfo::default()
            }),
        );
        state = transition(state, CheckoutAction::NextStep);
        assert_eq!(state.step, CheckoutStep::Payment);
    }

    #[test]
    fn test_payment_step_has_no_next() {
        let mut state = transition(
            CheckoutState::default(),
            CheckoutAction::UpdateShipping(valid_shipping()),
        );
        state = transition(state, CheckoutAction::NextStep);
        state = transition(
            state,
            CheckoutAction::UpdateBilling(BillingInfo {
                same_as_shipping: true,
                ..BillingInfo::default()
            }),
        );
        state = transition(state, CheckoutAction::NextStep);
        state = transition(state, CheckoutAction::UpdatePayment(valid_card()));
        state = transition(state, CheckoutAction::NextStep);
        assert_eq!(state.step, CheckoutStep::Payment);
    }

    #[test]
    fn test_begin_submit_guard() {
        let mut state = CheckoutState::default();
        assert!(state.begin_submit());
        assert!(!state.begin_submit());
        state = transition(state, CheckoutAction::FinishSubmit);
        assert!(state.begin_submit());
    }

    #[test]
    fn test_reset_returns_fresh_state() {
        let mut state = transition(
            CheckoutState::default(),
            CheckoutAction::UpdateShipping(valid_shipping()),
        );
        state.is_processing = true;
        let state = transition(state, CheckoutAction::Reset);
        assert_eq!(state, CheckoutState::default());
    }

    #[test]
    fn test_update_clears_stale_errors() {
        let state = transition(CheckoutState::default(), CheckoutAction::NextStep);
        assert!(!state.errors.is_empty());
        let state = transition(state, CheckoutAction::UpdateShipping(valid_shipping()));
        assert!(state.errors.is_empty());
    }
}
