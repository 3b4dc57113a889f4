//! Admin product management.

use common::ProductId;
use store::{NewProduct, Product, ProductQuery, ProductUpdate, Store, StoreError};

use crate::{DomainError, ValidationErrors};

/// Images are stored inline as base64 data URLs.
fn is_embedded_image(image: &str) -> bool {
    let Some(rest) = image.strip_prefix("data:image/") else {
        return false;
    };
    match rest.split_once(";base64,") {
        Some((subtype, payload)) => !subtype.is_empty() && !payload.is_empty(),
        None => false,
    }
}

fn check_images(errors: &mut ValidationErrors, images: &[String]) {
    if images.iter().any(|image| !is_embedded_image(image)) {
        errors.add("images", "must be base64 data:image URLs");
    }
}

fn validate_new(product: &NewProduct) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if product.name.trim().is_empty() {
        errors.add("name", "is required");
    }
    if product.price.is_negative() {
        errors.add("price", "must not be negative");
    }
    if product.stock < 0 {
        errors.add("stock", "must not be negative");
    }
    check_images(&mut errors, &product.images);
    errors.into_result()
}

fn validate_update(update: &ProductUpdate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Some(ref name) = update.name
        && name.trim().is_empty()
    {
        errors.add("name", "is required");
    }
    if let Some(price) = update.price
        && price.is_negative()
    {
        errors.add("price", "must not be negative");
    }
    if let Some(stock) = update.stock
        && stock < 0
    {
        errors.add("stock", "must not be negative");
    }
    if let Some(ref images) = update.images {
        check_images(&mut errors, images);
    }
    errors.into_result()
}

/// Service for catalog reads and admin product writes.
#[derive(Clone)]
pub struct CatalogService<S> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn list(&self, query: ProductQuery) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.list_products(query).await?)
    }

    pub async fn get(&self, id: ProductId) -> Result<Product, DomainError> {
        self.store
            .get_product(id)
            .await?
            .ok_or(DomainError::ProductNotFound(id))
    }

    /// Products with fewer than `threshold` units, negative stock included.
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<Product>, DomainError> {
        self.list(ProductQuery::new().low_stock_below(threshold)).await
    }

    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create(&self, product: NewProduct) -> Result<Product, DomainError> {
        validate_new(&product)?;
        let product = self.store.insert_product(product).await?;
        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, DomainError> {
        validate_update(&update)?;
        match self.store.update_product(id, update).await {
            Ok(product) => Ok(product),
            Err(StoreError::NotFound { .. }) => Err(DomainError::ProductNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), DomainError> {
        if !self.store.delete_product(id).await? {
            return Err(DomainError::ProductNotFound(id));
        }
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use store::InMemoryStore;

    fn service() -> CatalogService<InMemoryStore> {
        CatalogService::new(InMemoryStore::new())
    }

    #[test]
    fn test_embedded_image_shapes() {
        assert!(is_embedded_image("data:image/jpeg;base64,/9j/4AAQ"));
        assert!(!is_embedded_image("https://cdn.example.com/a.png"));
        assert!(!is_embedded_image("data:image/;base64,AAAA"));
        assert!(!is_embedded_image("data:image/png;base64,"));
        assert!(!is_embedded_image("data:text/plain;base64,AAAA"));
    }

    #[tokio::test]
    async fn test_create_validates() {
        let service = service();
        let mut bad = NewProduct::new("  ", Money::from_cents(-1), -2);
        bad.images = vec!["/img/a.png".to_string()];

        let Err(DomainError::Validation(errors)) = service.create(bad).await else {
            panic!("expected validation error");
        };
        assert!(errors.has("name"));
        assert!(errors.has("price"));
        assert!(errors.has("stock"));
        assert!(errors.has("images"));
    }

    #[tokio::test]
    async fn test_create_update_delete() {
        let service = service();
        let product = service
            .create(NewProduct::new("Beanie", Money::from_cents(1800), 12))
            .await
            .unwrap();

        let updated = service
            .update(
                product.id,
                ProductUpdate {
                    stock: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.stock, 2);
        assert_eq!(service.low_stock(5).await.unwrap().len(), 1);

        service.delete(product.id).await.unwrap();
        assert!(matches!(
            service.get(product.id).await,
            Err(DomainError::ProductNotFound(_))
        ));
        assert!(matches!(
            service.delete(product.id).await,
            Err(DomainError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_rejects_negative_stock() {
        let service = service();
        let product = service
            .create(NewProduct::new("Beanie", Money::from_cents(1800), 12))
            .await
            .unwrap();

        let result = service
            .update(
                product.id,
                ProductUpdate {
                    stock: Some(-1),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(service.get(product.id).await.unwrap().stock, 12);
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let result = service()
            .update(ProductId::new(), ProductUpdate::default())
            .await;
        assert!(matches!(result, Err(DomainError::ProductNotFound(_))));
    }
}
