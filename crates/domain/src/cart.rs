//! Per-user cart access.

use common::{CartItemId, Money, ProductId, UserId};
use serde::Serialize;
use store::{Cart, CartItem, NewCartItem, Product, Store, StoreError};

use crate::DomainError;

/// A cart line joined with the product it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,
    pub product_name: String,
    pub unit_price: Money,
    pub image: Option<String>,
    /// Stock at the time the cart was read.
    pub stock: i32,
}

impl CartLine {
    fn join(item: CartItem, product: &Product) -> Self {
        Self {
            item,
            product_name: product.name.clone(),
            unit_price: product.price,
            image: product.thumbnail().map(String::from),
            stock: product.stock,
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.item.quantity)
    }
}

/// The active cart with its joined lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub cart: Cart,
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
}

/// Units a line may hold; negative stock counts as none.
fn available(product: &Product) -> u32 {
    u32::try_from(product.stock).unwrap_or(0)
}

/// Service for the signed-in user's active cart.
#[derive(Clone)]
pub struct CartService<S> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the user's active cart, creating one if none exists.
    #[tracing::instrument(skip(self))]
    pub async fn active_cart(&self, user_id: UserId) -> Result<Cart, DomainError> {
        if let Some(cart) = self.store.get_active_cart(user_id).await? {
            return Ok(cart);
        }
        match self.store.create_cart(user_id).await {
            Ok(cart) => Ok(cart),
            // another request created it first
            Err(StoreError::Conflict(_)) => self
                .store
                .get_active_cart(user_id)
                .await?
                .ok_or_else(|| StoreError::not_found("Cart", user_id).into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn product(&self, product_id: ProductId) -> Result<Product, DomainError> {
        self.store
            .get_product(product_id)
            .await?
            .ok_or(DomainError::ProductNotFound(product_id))
    }

    /// Lines of the active cart joined with their products.
    ///
    /// Lines whose product has since been deleted are left out.
    #[tracing::instrument(skip(self))]
    pub async fn items(&self, user_id: UserId) -> Result<Vec<CartLine>, DomainError> {
        let cart = self.active_cart(user_id).await?;
        let items = self.store.list_cart_items(cart.id).await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            match self.store.get_product(item.product_id).await? {
                Some(product) => lines.push(CartLine::join(item, &product)),
                None => {
                    tracing::warn!(product_id = %item.product_id, "Cart line refers to a missing product");
                }
            }
        }
        Ok(lines)
    }

    /// The active cart, its lines and subtotal.
    pub async fn view(&self, user_id: UserId) -> Result<CartView, DomainError> {
        let cart = self.active_cart(user_id).await?;
        let lines = self.items(user_id).await?;
        let subtotal = lines.iter().map(CartLine::line_total).sum();
        Ok(CartView {
            cart,
            lines,
            subtotal,
        })
    }

    pub async fn subtotal(&self, user_id: UserId) -> Result<Money, DomainError> {
        let lines = self.items(user_id).await?;
        Ok(lines.iter().map(CartLine::line_total).sum())
    }

    /// Adds units to the cart, merging with an existing line for the same variant.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        item: NewCartItem,
    ) -> Result<CartItem, DomainError> {
        if item.quantity == 0 {
            return Err(DomainError::InvalidQuantity(item.quantity));
        }
        let product = self.product(item.product_id).await?;
        let cart = self.active_cart(user_id).await?;

        let existing = self
            .store
            .list_cart_items(cart.id)
            .await?
            .into_iter()
            .find(|line| line.same_line(&item))
            .map(|line| line.quantity)
            .unwrap_or(0);

        let requested = existing.saturating_add(item.quantity);
        if requested > available(&product) {
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                requested,
                available: product.stock,
            });
        }

        let line = self
            .store
            .upsert_cart_item(
                cart.id,
                NewCartItem {
                    quantity: requested,
                    ..item
                },
            )
            .await?;
        Ok(line)
    }

    /// Sets a line's quantity. Zero removes the line and returns `None`.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Option<CartItem>, DomainError> {
        let cart = self.active_cart(user_id).await?;
        if quantity == 0 {
            self.store.remove_cart_item(cart.id, item_id).await?;
            return Ok(None);
        }

        let line = self
            .store
            .list_cart_items(cart.id)
            .await?
            .into_iter()
            .find(|line| line.id == item_id)
            .ok_or_else(|| StoreError::not_found("CartItem", item_id))?;

        let product = self.product(line.product_id).await?;
        if quantity > available(&product) {
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                requested: quantity,
                available: product.stock,
            });
        }

        let line = self
            .store
            .update_cart_item_quantity(cart.id, item_id, quantity)
            .await?;
        Ok(Some(line))
    }

    /// Removes a line. Returns false if the cart had no such line.
    pub async fn remove_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<bool, DomainError> {
        let cart = self.active_cart(user_id).await?;
        Ok(self.store.remove_cart_item(cart.id, item_id).await?)
    }

    pub async fn clear(&self, user_id: UserId) -> Result<(), DomainError> {
        let cart = self.active_cart(user_id).await?;
        self.store.clear_cart(cart.id).await?;
        Ok(())
    }

    /// Folds a guest cart into the user's active cart after sign-in.
    ///
    /// Matching lines have their quantities summed, every line is capped at
    /// the product's stock, and lines for unknown or sold-out products are
    /// dropped.
    #[tracing::instrument(skip(self, guest_lines), fields(lines = guest_lines.len()))]
    pub async fn merge_guest_cart(
        &self,
        user_id: UserId,
        guest_lines: Vec<NewCartItem>,
    ) -> Result<CartView, DomainError> {
        let cart = self.active_cart(user_id).await?;
        let mut current = self.store.list_cart_items(cart.id).await?;

        for guest in guest_lines {
            if guest.quantity == 0 {
                continue;
            }
            let Some(product) = self.store.get_product(guest.product_id).await? else {
                tracing::debug!(product_id = %guest.product_id, "Skipping unknown product in guest cart");
                continue;
            };

            let existing = current
                .iter()
                .find(|line| line.same_line(&guest))
                .map(|line| line.quantity)
                .unwrap_or(0);
            let merged = existing.saturating_add(guest.quantity).min(available(&product));
            if merged == 0 || merged == existing {
                continue;
            }

            let line = self
                .store
                .upsert_cart_item(
                    cart.id,
                    NewCartItem {
                        quantity: merged,
                        ..guest
                    },
                )
                .await?;
            current.retain(|l| l.id != line.id);
            current.push(line);
        }

        self.view(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{InMemoryStore, NewProduct, ProductStore};

    async fn setup(stock: i32) -> (CartService<InMemoryStore>, Product) {
        let store = InMemoryStore::new();
        let mut new = NewProduct::new("Field Jacket", Money::from_cents(12000), stock);
        new.images = vec!["data:image/png;base64,AAAA".to_string()];
        let product = store.insert_product(new).await.unwrap();
        (CartService::new(store), product)
    }

    #[tokio::test]
    async fn test_active_cart_is_created_once() {
        let (service, _) = setup(1).await;
        let user = UserId::new();

        let first = service.active_cart(user).await.unwrap();
        let second = service.active_cart(user).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_add_item_merges_and_checks_stock() {
        let (service, product) = setup(3).await;
        let user = UserId::new();

        service
            .add_item(user, NewCartItem::new(product.id, 2))
            .await
            .unwrap();
        let line = service
            .add_item(user, NewCartItem::new(product.id, 1))
            .await
            .unwrap();
        assert_eq!(line.quantity, 3);

        let over = service.add_item(user, NewCartItem::new(product.id, 1)).await;
        assert!(matches!(
            over,
            Err(DomainError::InsufficientStock {
                requested: 4,
                available: 3,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_add_item_rejects_zero_and_unknown() {
        let (service, product) = setup(3).await;
        let user = UserId::new();

        assert!(matches!(
            service.add_item(user, NewCartItem::new(product.id, 0)).await,
            Err(DomainError::InvalidQuantity(0))
        ));
        assert!(matches!(
            service
                .add_item(user, NewCartItem::new(ProductId::new(), 1))
                .await,
            Err(DomainError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_items_join_product_details() {
        let (service, product) = setup(5).await;
        let user = UserId::new();
        service
            .add_item(user, NewCartItem::new(product.id, 2))
            .await
            .unwrap();

        let view = service.view(user).await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].product_name, "Field Jacket");
        assert_eq!(
            view.lines[0].image.as_deref(),
            Some("data:image/png;base64,AAAA")
        );
        assert_eq!(view.subtotal.cents(), 24000);
        assert_eq!(service.subtotal(user).await.unwrap().cents(), 24000);
    }

    #[tokio::test]
    async fn test_update_quantity_zero_removes() {
        let (service, product) = setup(5).await;
        let user = UserId::new();
        let line = service
            .add_item(user, NewCartItem::new(product.id, 2))
            .await
            .unwrap();

        let updated = service.update_quantity(user, line.id, 4).await.unwrap();
        assert_eq!(updated.unwrap().quantity, 4);

        assert!(matches!(
            service.update_quantity(user, line.id, 6).await,
            Err(DomainError::InsufficientStock { .. })
        ));

        assert!(service.update_quantity(user, line.id, 0).await.unwrap().is_none());
        assert!(service.items(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let (service, product) = setup(5).await;
        let user = UserId::new();
        let line = service
            .add_item(user, NewCartItem::new(product.id, 1))
            .await
            .unwrap();

        assert!(service.remove_item(user, line.id).await.unwrap());
        assert!(!service.remove_item(user, line.id).await.unwrap());

        service
            .add_item(user, NewCartItem::new(product.id, 1))
            .await
            .unwrap();
        service.clear(user).await.unwrap();
        assert!(service.items(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merge_guest_cart_sums_caps_and_skips() {
        let (service, product) = setup(4).await;
        let user = UserId::new();
        service
            .add_item(user, NewCartItem::new(product.id, 3))
            .await
            .unwrap();

        let view = service
            .merge_guest_cart(
                user,
                vec![
                    NewCartItem::new(product.id, 2),
                    NewCartItem::new(ProductId::new(), 1),
                ],
            )
            .await
            .unwrap();

        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].item.quantity, 4);
    }

    #[tokio::test]
    async fn test_merge_skips_sold_out_products() {
        let (service, product) = setup(0).await;
        let user = UserId::new();

        let view = service
            .merge_guest_cart(user, vec![NewCartItem::new(product.id, 2)])
            .await
            .unwrap();
        assert!(view.lines.is_empty());
    }
}
