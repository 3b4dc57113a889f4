//! Checkout flow controller: shipping, then payment, then confirmation.

use common::{Money, UserId};
use domain::{CartService, CheckoutStep, PaymentForm, ShippingForm};
use store::Store;
use uuid::Uuid;

use crate::{CheckoutError, CheckoutLine, OrderWriter, PlaceOrder, Placement, Result};

/// Draft state for one user's checkout.
///
/// Each draft carries its own idempotency key, so confirming the same draft
/// twice returns the first order instead of writing a second one. The key is
/// replaced once an order goes through.
pub struct CheckoutFlow<S> {
    writer: OrderWriter<S>,
    carts: CartService<S>,
    user_id: UserId,
    step: CheckoutStep,
    shipping: Option<ShippingForm>,
    payment: Option<PaymentForm>,
    attempt_key: String,
}

impl<S: Store + Clone> CheckoutFlow<S> {
    pub fn new(writer: OrderWriter<S>, user_id: UserId) -> Self {
        let carts = CartService::new(writer.store().clone());
        Self {
            writer,
            carts,
            user_id,
            step: CheckoutStep::default(),
            shipping: None,
            payment: None,
            attempt_key: Uuid::new_v4().to_string(),
        }
    }
}

impl<S: Store> CheckoutFlow<S> {
    pub fn step(&self) -> CheckoutStep {
        self.step
    }

    pub fn shipping(&self) -> Option<&ShippingForm> {
        self.shipping.as_ref()
    }

    pub fn payment(&self) -> Option<&PaymentForm> {
        self.payment.as_ref()
    }

    /// Key attached to the order placed from this draft.
    pub fn attempt_key(&self) -> &str {
        &self.attempt_key
    }

    fn require(&self, step: CheckoutStep, action: &'static str) -> Result<()> {
        if self.step != step {
            return Err(CheckoutError::InvalidStep {
                step: self.step,
                action,
            });
        }
        Ok(())
    }

    /// Stores the shipping draft and moves to payment if it validates.
    ///
    /// An invalid form is still kept as the draft so the user can correct it.
    pub fn submit_shipping(&mut self, form: ShippingForm) -> Result<CheckoutStep> {
        self.require(CheckoutStep::Shipping, "submit shipping details")?;
        let result = form.validate();
        self.shipping = Some(form);
        result?;
        self.step = CheckoutStep::Payment;
        Ok(self.step)
    }

    /// Stores the payment draft and moves to confirmation if it validates.
    pub fn submit_payment(&mut self, form: PaymentForm) -> Result<CheckoutStep> {
        self.require(CheckoutStep::Payment, "submit payment details")?;
        let result = form.validate();
        self.payment = Some(form);
        result?;
        self.step = CheckoutStep::Confirmation;
        Ok(self.step)
    }

    /// Goes back one step, keeping both drafts.
    pub fn back(&mut self) -> CheckoutStep {
        self.step = self.step.back();
        self.step
    }

    /// Places the order for the current cart.
    ///
    /// On success the cart is emptied and retired and the draft starts over.
    /// On failure the flow stays at confirmation with the draft intact.
    #[tracing::instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn confirm(&mut self, shipping: Money, tax: Money) -> Result<Placement> {
        self.require(CheckoutStep::Confirmation, "place the order")?;
        let form = self.shipping.as_ref().ok_or(CheckoutError::InvalidStep {
            step: self.step,
            action: "place the order without shipping details",
        })?;

        let cart_lines = self.carts.items(self.user_id).await?;
        let lines: Vec<CheckoutLine> = cart_lines.iter().map(CheckoutLine::from).collect();

        let mut request = PlaceOrder::from_form(form, lines, shipping, tax, Money::zero())?
            .for_user(self.user_id)
            .with_idempotency_key(self.attempt_key.clone());
        // an out-of-range total is left for the writer to reject
        request.total = request.expected_total().unwrap_or_default();

        let placement = self.writer.place(request).await?;

        self.retire_cart().await;
        self.reset();
        Ok(placement)
    }

    /// Empties and deactivates the cart. The order already exists, so
    /// failures here are only logged.
    async fn retire_cart(&self) {
        let store = self.writer.store();
        let cart = match store.get_active_cart(self.user_id).await {
            Ok(Some(cart)) => cart,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load cart after checkout");
                return;
            }
        };
        if let Err(e) = store.clear_cart(cart.id).await {
            tracing::warn!(cart_id = %cart.id, error = %e, "Could not clear cart after checkout");
        }
        if let Err(e) = store.deactivate_cart(cart.id).await {
            tracing::warn!(cart_id = %cart.id, error = %e, "Could not deactivate cart after checkout");
        }
    }

    fn reset(&mut self) {
        self.step = CheckoutStep::Shipping;
        self.shipping = None;
        self.payment = None;
        self.attempt_key = Uuid::new_v4().to_string();
    }
}
