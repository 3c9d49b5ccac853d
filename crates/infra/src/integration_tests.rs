//! Integration tests for the reconciliation pipeline.
//!
//! Tests: payload → CatalogService → CatalogStore → EventBus
//!
//! Verifies:
//! - Create/update scenarios end with the expected persisted variant set
//! - Phase 1 failures write nothing and publish nothing
//! - Phase 2 failures are isolated per item and never flip `success`
//! - Revalidation fires once Phase 1 committed
//!
//! The Postgres test runs only when `DATABASE_URL` is set.

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use std::time::Duration;

    use storefront_catalog::{
        AttributeInput, Category, ProductDetail, ProductPayload, ProductStatus, Revalidation, RevalidationReason,
        VariantChange, VariantInput, ViewKey,
    };
    use storefront_core::{AttributeId, CategoryId, Price, ProductId, VariantId};
    use storefront_events::{EventBus, InMemoryEventBus, Subscription};

    use crate::catalog_service::{ATTRIBUTE_CREATED, CatalogService, PRODUCT_CREATED, PRODUCT_DELETED, PRODUCT_UPDATED};
    use crate::config::CatalogConfig;
    use crate::error::{CatalogError, StoreError};
    use crate::mutation::MutationReport;
    use crate::store::{Fault, InMemoryCatalogStore, Operation, PostgresCatalogStore};

    type Bus = Arc<InMemoryEventBus<Revalidation>>;

    struct Fixture {
        service: CatalogService<InMemoryCatalogStore, Bus>,
        store: InMemoryCatalogStore,
        bus: Bus,
        tools: Category,
        size: AttributeId,
    }

    impl Fixture {
        fn subscribe(&self) -> Subscription<Revalidation> {
            self.bus.subscribe()
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(CatalogConfig::default()).await
    }

    async fn fixture_with(config: CatalogConfig) -> Fixture {
        storefront_observability::init_for_tests();

        let store = InMemoryCatalogStore::new();
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let service = CatalogService::new(store.clone(), bus.clone(), config);

        let tools = service.create_category("Tools", None).await.unwrap();
        let size = service.create_attribute("Size").await.attribute.unwrap().id;

        Fixture {
            service,
            store,
            bus,
            tools,
            size,
        }
    }

    fn price(units: i64) -> Price {
        Price::from_units(units).unwrap()
    }

    fn payload(category: CategoryId, variants: Vec<VariantInput>) -> ProductPayload {
        ProductPayload {
            name: "Hammer".to_string(),
            description: Some("Steel claw hammer".to_string()),
            image: None,
            status: ProductStatus::Visible,
            category,
            has_variant: true,
            slug: None,
            variants,
        }
    }

    fn sized(units: i64, size: AttributeId, value: &str) -> VariantInput {
        VariantInput::new_variant(price(units), vec![AttributeInput::new(size, value)])
    }

    /// Scenario A setup: Hammer with Small at 100 and Large at 150.
    async fn create_hammer(fx: &Fixture) -> (ProductId, ProductDetail) {
        let report = fx
            .service
            .create_product(payload(
                fx.tools.id,
                vec![sized(100, fx.size, "Small"), sized(150, fx.size, "Large")],
            ))
            .await;
        assert!(report.is_success(), "{}", report.result.message);

        let id = report.product_id.unwrap();
        let detail = fx.service.get_product(id).await.unwrap().unwrap();
        (id, detail)
    }

    fn resubmit(detail: &ProductDetail) -> Vec<VariantInput> {
        detail
            .variants
            .iter()
            .map(|v| {
                VariantInput::existing(
                    v.id,
                    v.price,
                    v.attributes
                        .iter()
                        .map(|a| AttributeInput::new(a.attribute_id, a.value.clone()))
                        .collect(),
                )
            })
            .collect()
    }

    fn variant_with(detail: &ProductDetail, size: AttributeId, value: &str) -> VariantId {
        detail
            .variants
            .iter()
            .find(|v| v.attribute(size) == Some(value))
            .map(|v| v.id)
            .unwrap()
    }

    #[tokio::test]
    async fn scenario_a_create_with_two_sized_variants() {
        let fx = fixture().await;
        let (_, detail) = create_hammer(&fx).await;

        assert_eq!(detail.product.slug, "hammer");
        assert!(detail.product.is_visible());
        assert_eq!(
            detail.variants.iter().map(|v| v.price).collect::<Vec<_>>(),
            vec![price(100), price(150)]
        );
        assert!(detail.variants.iter().all(|v| v.attributes.len() == 1));
        assert_eq!(detail.variants[0].attribute(fx.size), Some("Small"));
        assert_eq!(detail.variants[1].attribute(fx.size), Some("Large"));
    }

    #[tokio::test]
    async fn create_reports_every_variant_in_submission_order() {
        let fx = fixture().await;
        let report = fx
            .service
            .create_product(payload(
                fx.tools.id,
                vec![
                    sized(100, fx.size, "Small"),
                    VariantInput::placeholder("temp-1700000000000", price(150), vec![]),
                ],
            ))
            .await;

        assert_eq!(report.result.message, PRODUCT_CREATED);
        let changes: Vec<VariantChange> = report.applied().map(|a| a.change).collect();
        assert_eq!(
            changes,
            vec![
                VariantChange::Create { position: 0 },
                VariantChange::Create { position: 1 },
            ]
        );

        let detail = fx.service.get_product(report.product_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(
            detail.variants.iter().map(|v| v.id).collect::<Vec<_>>(),
            report.created_ids()
        );
    }

    #[tokio::test]
    async fn scenario_b_update_reprices_and_drops_omitted_variant() {
        let fx = fixture().await;
        let (id, detail) = create_hammer(&fx).await;
        let small = variant_with(&detail, fx.size, "Small");
        let large = variant_with(&detail, fx.size, "Large");

        let report = fx
            .service
            .update_product(
                id,
                payload(
                    fx.tools.id,
                    vec![VariantInput::existing(
                        large,
                        price(160),
                        vec![AttributeInput::new(fx.size, "Large")],
                    )],
                ),
            )
            .await;

        assert!(report.is_success());
        assert_eq!(report.result.message, PRODUCT_UPDATED);

        let detail = fx.service.get_product(id).await.unwrap().unwrap();
        assert_eq!(detail.variants.len(), 1);
        assert_eq!(detail.variants[0].id, large);
        assert_eq!(detail.variants[0].price, price(160));
        assert!(fx.store.attribute_value_row(small, fx.size).await.is_none());
        assert_eq!(fx.store.attribute_value_count().await, 1);
    }

    #[tokio::test]
    async fn scenario_c_changed_value_replaces_the_row() {
        let fx = fixture().await;
        let (id, detail) = create_hammer(&fx).await;
        let large = variant_with(&detail, fx.size, "Large");
        let before = fx.store.attribute_value_row(large, fx.size).await.unwrap();

        let mut variants = resubmit(&detail);
        for v in &mut variants {
            if v.id.as_deref() == Some(large.to_string().as_str()) {
                v.attributes = vec![AttributeInput::new(fx.size, "XL")];
            }
        }
        let report = fx.service.update_product(id, payload(fx.tools.id, variants)).await;
        assert!(report.is_success());

        let after = fx.store.attribute_value_row(large, fx.size).await.unwrap();
        assert_ne!(before, after);

        let detail = fx.service.get_product(id).await.unwrap().unwrap();
        assert_eq!(detail.variant(large).unwrap().attribute(fx.size), Some("XL"));
        assert_eq!(detail.attribute_value_count(), 2);
    }

    #[tokio::test]
    async fn scenario_d_failed_item_is_isolated() {
        let fx = fixture().await;
        let (id, detail) = create_hammer(&fx).await;
        let large = variant_with(&detail, fx.size, "Large");

        fx.store.inject(
            Operation::InsertVariant,
            1,
            Fault::Fail(StoreError::backend("connection reset by peer")),
        );

        let mut update = payload(
            fx.tools.id,
            vec![
                VariantInput::existing(large, price(155), vec![AttributeInput::new(fx.size, "Large")]),
                sized(200, fx.size, "XL"),
                sized(300, fx.size, "XXL"),
            ],
        );
        update.name = "Sledgehammer".to_string();

        let report = fx.service.update_product(id, update).await;

        assert!(report.is_success());
        assert_eq!(report.result.message, PRODUCT_UPDATED);

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].change, VariantChange::Create { position: 1 });
        assert_eq!(
            failures[0].error,
            CatalogError::Store("connection reset by peer".to_string())
        );

        let detail = fx.service.get_product(id).await.unwrap().unwrap();
        assert_eq!(detail.product.name, "Sledgehammer");
        assert_eq!(detail.product.slug, "hammer");
        let prices: Vec<Price> = detail.variants.iter().map(|v| v.price).collect();
        assert_eq!(prices, vec![price(155), price(300)]);
    }

    #[tokio::test]
    async fn resubmitting_current_state_changes_nothing() {
        let fx = fixture().await;
        let (id, detail) = create_hammer(&fx).await;

        let mut rows_before = HashMap::new();
        for v in &detail.variants {
            rows_before.insert(v.id, fx.store.attribute_value_row(v.id, fx.size).await.unwrap());
        }

        let report = fx
            .service
            .update_product(id, payload(fx.tools.id, resubmit(&detail)))
            .await;

        assert!(report.is_success());
        assert_eq!(report.failures().count(), 0);
        assert!(
            report
                .applied()
                .all(|a| matches!(a.change, VariantChange::Update { .. }))
        );

        let after = fx.service.get_product(id).await.unwrap().unwrap();
        assert_eq!(after.variants, detail.variants);
        for v in &after.variants {
            assert_eq!(
                fx.store.attribute_value_row(v.id, fx.size).await,
                rows_before.get(&v.id).copied()
            );
        }
    }

    #[tokio::test]
    async fn variants_round_trip_with_all_attributes() {
        let fx = fixture().await;
        let color = fx.service.create_attribute("Color").await.attribute.unwrap().id;
        let grip = fx.service.create_attribute("Grip").await.attribute.unwrap().id;

        let submitted: Vec<VariantInput> = (0..4)
            .map(|i| {
                VariantInput::new_variant(
                    price(100 + i),
                    vec![
                        AttributeInput::new(fx.size, format!("S{i}")),
                        AttributeInput::new(color, format!("C{i}")),
                        AttributeInput::new(grip, format!("G{i}")),
                    ],
                )
            })
            .collect();

        let report = fx
            .service
            .create_product(payload(fx.tools.id, submitted.clone()))
            .await;
        assert!(report.is_success());

        let detail = fx.service.get_product(report.product_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(detail.variants.len(), 4);
        assert_eq!(detail.attribute_value_count(), 12);

        for (input, id) in submitted.iter().zip(report.created_ids()) {
            let variant = detail.variant(id).unwrap();
            assert_eq!(variant.price, input.price);
            for attribute in &input.attributes {
                assert_eq!(variant.attribute(attribute.attribute_id), Some(attribute.value.as_str()));
            }
        }
    }

    #[tokio::test]
    async fn single_variant_product_keeps_one_bare_variant() {
        let fx = fixture().await;
        let mut single = payload(
            fx.tools.id,
            vec![sized(80, fx.size, "Small"), sized(90, fx.size, "Large")],
        );
        single.has_variant = false;

        let report = fx.service.create_product(single).await;
        assert!(report.is_success());

        let detail = fx.service.get_product(report.product_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(detail.variants.len(), 1);
        assert_eq!(detail.variants[0].price, price(80));
        assert_eq!(detail.attribute_value_count(), 0);
    }

    #[tokio::test]
    async fn switching_to_single_variant_strips_attributes() {
        let fx = fixture().await;
        let (id, detail) = create_hammer(&fx).await;

        let mut single = payload(fx.tools.id, resubmit(&detail));
        single.has_variant = false;
        let report = fx.service.update_product(id, single).await;
        assert!(report.is_success());

        let after = fx.service.get_product(id).await.unwrap().unwrap();
        assert_eq!(after.variants.len(), 1);
        assert_eq!(after.variants[0].id, detail.variants[0].id);
        assert_eq!(after.attribute_value_count(), 0);
        assert!(!after.product.has_variant);
    }

    #[tokio::test]
    async fn single_variant_product_without_price_is_rejected() {
        let fx = fixture().await;
        let mut empty = payload(fx.tools.id, vec![]);
        empty.has_variant = false;

        let report = fx.service.create_product(empty).await;
        assert!(!report.is_success());
        assert!(report.result.message.starts_with("validation failed"));
        assert_eq!(fx.store.variant_count().await, 0);
    }

    #[tokio::test]
    async fn missing_category_fails_without_writes_or_publication() {
        let fx = fixture().await;
        let (id, detail) = create_hammer(&fx).await;
        let sub = fx.subscribe();

        let missing = CategoryId::new();
        let mut update = payload(missing, vec![]);
        update.name = "Ghost".to_string();
        let report = fx.service.update_product(id, update).await;

        assert!(!report.is_success());
        assert_eq!(report.result.message, format!("category {missing} not found"));
        assert!(report.revalidated.is_empty());
        assert!(sub.drain().is_empty());

        let after = fx.service.get_product(id).await.unwrap().unwrap();
        assert_eq!(after, detail);
    }

    #[tokio::test]
    async fn create_in_missing_category_fails() {
        let fx = fixture().await;
        let report = fx.service.create_product(payload(CategoryId::new(), vec![])).await;

        assert!(!report.is_success());
        assert!(report.result.message.ends_with("not found"));
        assert!(report.product_id.is_none());
    }

    #[tokio::test]
    async fn unknown_product_update_is_not_found() {
        let fx = fixture().await;
        let ghost = ProductId::new();

        let report = fx.service.update_product(ghost, payload(fx.tools.id, vec![])).await;
        assert_eq!(report.result.message, format!("product {ghost} not found"));
    }

    #[tokio::test]
    async fn foreign_variant_id_fails_in_isolation() {
        let fx = fixture().await;
        let (id, _) = create_hammer(&fx).await;

        let mut renamed = payload(
            fx.tools.id,
            vec![VariantInput {
                id: Some("clx9abc123".to_string()),
                price: price(5),
                attributes: vec![],
            }],
        );
        renamed.name = "Sledgehammer".to_string();
        let report = fx.service.update_product(id, renamed).await;

        assert!(report.is_success(), "{}", report.result.message);
        assert_eq!(report.result.message, PRODUCT_UPDATED);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].change, VariantChange::Unrecognized { position: 0 });
        assert_eq!(failures[0].error, CatalogError::not_found("variant 'clx9abc123'"));

        let detail = fx.service.get_product(id).await.unwrap().unwrap();
        assert_eq!(detail.product.name, "Sledgehammer");
        assert_eq!(detail.product.slug, "hammer");
        assert!(detail.variants.is_empty());
        assert_eq!(fx.store.attribute_value_count().await, 0);
    }

    #[tokio::test]
    async fn repeated_variant_id_applies_in_order() {
        let fx = fixture().await;
        let (id, detail) = create_hammer(&fx).await;
        let large = variant_with(&detail, fx.size, "Large");

        let report = fx
            .service
            .update_product(
                id,
                payload(
                    fx.tools.id,
                    vec![
                        VariantInput::existing(large, price(170), vec![AttributeInput::new(fx.size, "XL")]),
                        VariantInput::existing(large, price(160), vec![AttributeInput::new(fx.size, "Large")]),
                    ],
                ),
            )
            .await;

        assert!(report.is_success());
        assert_eq!(report.failures().count(), 0);
        assert_eq!(report.applied().count(), 2);

        let detail = fx.service.get_product(id).await.unwrap().unwrap();
        assert_eq!(detail.variants.len(), 1);
        assert_eq!(detail.variants[0].id, large);
        assert_eq!(detail.variants[0].price, price(160));
        assert_eq!(detail.variants[0].attribute(fx.size), Some("Large"));
        assert_eq!(fx.store.attribute_value_count().await, 1);
    }

    #[tokio::test]
    async fn stale_variant_id_fails_in_isolation() {
        let fx = fixture().await;
        let (id, detail) = create_hammer(&fx).await;
        let stale = VariantId::new();

        let mut variants = resubmit(&detail);
        variants.push(VariantInput::existing(stale, price(99), vec![]));
        let report = fx.service.update_product(id, payload(fx.tools.id, variants)).await;

        assert!(report.is_success());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].change, VariantChange::Update { id: stale });
        assert_eq!(failures[0].error, CatalogError::not_found(format!("variant {stale}")));
        assert_eq!(fx.store.variant_count().await, 2);
    }

    #[tokio::test]
    async fn duplicate_slug_is_a_constraint_violation() {
        let fx = fixture().await;
        create_hammer(&fx).await;

        let report = fx.service.create_product(payload(fx.tools.id, vec![])).await;
        assert!(!report.is_success());
        assert_eq!(
            report.result.message,
            "constraint violated: products.slug 'hammer' already exists"
        );

        let mut explicit = payload(fx.tools.id, vec![]);
        explicit.slug = Some("  Hammer -- Pro!  ".to_string());
        let report = fx.service.create_product(explicit).await;
        assert!(report.is_success());

        let detail = fx.service.get_product(report.product_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(detail.product.slug, "hammer-pro");
    }

    #[tokio::test]
    async fn slug_survives_renames() {
        let fx = fixture().await;
        let (id, detail) = create_hammer(&fx).await;

        let mut renamed = payload(fx.tools.id, resubmit(&detail));
        renamed.name = "Claw Hammer".to_string();
        renamed.slug = Some("claw-hammer".to_string());
        fx.service.update_product(id, renamed).await;

        let after = fx.service.get_product(id).await.unwrap().unwrap();
        assert_eq!(after.product.name, "Claw Hammer");
        assert_eq!(after.product.slug, "hammer");
    }

    #[tokio::test]
    async fn phase_one_timeout_rolls_everything_back() {
        let fx = fixture_with(CatalogConfig::default().with_budgets(Duration::from_millis(50), Duration::from_secs(1))).await;
        let (id, detail) = create_hammer(&fx).await;

        fx.store
            .inject(Operation::DeleteVariants, 1, Fault::Delay(Duration::from_millis(300)));

        let mut update = payload(fx.tools.id, vec![]);
        update.name = "Sledgehammer".to_string();
        let report = fx.service.update_product(id, update).await;

        assert!(!report.is_success());
        assert_eq!(
            report.result.message,
            "transaction timed out after 50ms (product transaction)"
        );
        assert_eq!(fx.service.get_product(id).await.unwrap().unwrap(), detail);
    }

    #[tokio::test]
    async fn phase_one_store_failure_writes_nothing() {
        let fx = fixture().await;
        let (id, detail) = create_hammer(&fx).await;

        fx.store.inject(
            Operation::Commit,
            1,
            Fault::Fail(StoreError::backend("could not serialize access")),
        );

        let mut update = payload(fx.tools.id, vec![]);
        update.name = "Sledgehammer".to_string();
        let report = fx.service.update_product(id, update).await;

        assert!(!report.is_success());
        assert_eq!(report.result.message, "storage error: could not serialize access");
        assert!(report.variants.is_empty());
        assert_eq!(fx.service.get_product(id).await.unwrap().unwrap(), detail);
    }

    #[tokio::test]
    async fn phase_two_timeout_is_isolated() {
        let fx = fixture_with(CatalogConfig::default().with_budgets(Duration::from_secs(1), Duration::from_millis(50))).await;
        let (id, detail) = create_hammer(&fx).await;
        let small = variant_with(&detail, fx.size, "Small");

        fx.store
            .inject(Operation::UpdateVariantPrice, 1, Fault::Delay(Duration::from_millis(300)));

        let report = fx
            .service
            .update_product(
                id,
                payload(
                    fx.tools.id,
                    vec![
                        VariantInput::existing(small, price(120), vec![AttributeInput::new(fx.size, "Small")]),
                        sized(175, fx.size, "Medium"),
                    ],
                ),
            )
            .await;

        assert!(report.is_success());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            failures[0].error,
            CatalogError::TransactionTimeout {
                scope: "variant transaction",
                ..
            }
        ));

        let after = fx.service.get_product(id).await.unwrap().unwrap();
        assert_eq!(after.variant(small).unwrap().price, price(100));
        assert_eq!(after.variants.len(), 2);
        assert!(after.variants.iter().any(|v| v.attribute(fx.size) == Some("Medium")));
    }

    #[tokio::test]
    async fn duplicate_attribute_ids_keep_the_last_value() {
        let fx = fixture().await;
        let report = fx
            .service
            .create_product(payload(
                fx.tools.id,
                vec![VariantInput::new_variant(
                    price(100),
                    vec![
                        AttributeInput::new(fx.size, "Small"),
                        AttributeInput::new(fx.size, "Medium"),
                    ],
                )],
            ))
            .await;

        let detail = fx.service.get_product(report.product_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(detail.attribute_value_count(), 1);
        assert_eq!(detail.variants[0].attribute(fx.size), Some("Medium"));
    }

    #[tokio::test]
    async fn revalidation_follows_phase_one_commit() {
        let fx = fixture().await;
        let sub = fx.subscribe();
        let (id, detail) = create_hammer(&fx).await;

        let created = sub.try_recv().unwrap();
        assert_eq!(created.reason, RevalidationReason::ProductCreated);
        assert_eq!(created.product_id, id);

        // Every Phase 2 item fails; the views still refresh.
        fx.store.inject(
            Operation::UpdateVariantPrice,
            1,
            Fault::Fail(StoreError::backend("disk full")),
        );
        fx.store.inject(
            Operation::UpdateVariantPrice,
            2,
            Fault::Fail(StoreError::backend("disk full")),
        );
        let report = fx
            .service
            .update_product(id, payload(fx.tools.id, resubmit(&detail)))
            .await;
        assert!(report.is_success());
        assert_eq!(report.failures().count(), 2);

        let updated = sub.try_recv().unwrap();
        assert_eq!(updated.reason, RevalidationReason::ProductUpdated);
        assert_eq!(updated.keys, report.revalidated);
        assert!(updated.keys.contains(&ViewKey::Home));
        assert!(updated.keys.contains(&ViewKey::ProductDetail {
            slug: "hammer".to_string()
        }));
        assert!(updated.keys.contains(&ViewKey::CategoryListing { category: fx.tools.id }));
        assert!(updated.keys.contains(&ViewKey::AdminProductDetail { product: id }));
    }

    #[tokio::test]
    async fn moving_category_refreshes_both_listings() {
        let fx = fixture().await;
        let garden = fx.service.create_category("Garden", None).await.unwrap();
        let (id, detail) = create_hammer(&fx).await;

        let report = fx
            .service
            .update_product(id, payload(garden.id, resubmit(&detail)))
            .await;

        let listings: HashSet<&ViewKey> = report
            .revalidated
            .iter()
            .filter(|k| matches!(k, ViewKey::CategoryListing { .. }))
            .collect();
        assert!(listings.contains(&ViewKey::CategoryListing { category: fx.tools.id }));
        assert!(listings.contains(&ViewKey::CategoryListing { category: garden.id }));
    }

    #[tokio::test]
    async fn child_category_refreshes_parent_and_sub_listing() {
        let fx = fixture().await;
        let hammers = fx.service.create_category("Hammers", Some(fx.tools.id)).await.unwrap();
        let sub = fx.subscribe();

        let report = fx
            .service
            .create_product(payload(hammers.id, vec![sized(100, fx.size, "Small")]))
            .await;
        assert!(report.is_success());

        let created = sub.try_recv().unwrap();
        assert_eq!(created.keys, report.revalidated);
        assert!(created.keys.contains(&ViewKey::CategoryListing { category: fx.tools.id }));
        assert!(created.keys.contains(&ViewKey::SubCategoryListing {
            parent: fx.tools.id,
            category: hammers.id
        }));
        assert!(!created.keys.contains(&ViewKey::CategoryListing { category: hammers.id }));

        let id = report.product_id.unwrap();
        fx.service.set_featured(id, true).await.unwrap();
        assert_eq!(sub.try_recv().unwrap().keys, report.revalidated);
    }

    #[tokio::test]
    async fn delete_cascades_and_is_not_repeatable() {
        let fx = fixture().await;
        let (id, _) = create_hammer(&fx).await;
        let sub = fx.subscribe();

        let result = fx.service.delete_product(id).await;
        assert!(result.success);
        assert_eq!(result.message, PRODUCT_DELETED);
        assert_eq!(sub.try_recv().unwrap().reason, RevalidationReason::ProductDeleted);

        assert!(fx.service.get_product(id).await.unwrap().is_none());
        assert_eq!(fx.store.variant_count().await, 0);
        assert_eq!(fx.store.attribute_value_count().await, 0);

        let again = fx.service.delete_product(id).await;
        assert!(!again.success);
        assert_eq!(again.message, format!("product {id} not found"));
    }

    #[tokio::test]
    async fn status_and_featured_flags() {
        let fx = fixture().await;
        let (id, _) = create_hammer(&fx).await;
        let sub = fx.subscribe();

        fx.service.set_product_status(id, ProductStatus::Archived).await.unwrap();
        fx.service.set_featured(id, true).await.unwrap();

        let detail = fx.service.get_product(id).await.unwrap().unwrap();
        assert_eq!(detail.product.status, ProductStatus::Archived);
        assert!(detail.product.featured);

        let reasons: Vec<RevalidationReason> = sub.drain().into_iter().map(|r| r.reason).collect();
        assert_eq!(
            reasons,
            vec![RevalidationReason::StatusChanged, RevalidationReason::FeaturedChanged]
        );

        let ghost = ProductId::new();
        assert_eq!(
            fx.service.set_featured(ghost, true).await,
            Err(CatalogError::not_found(format!("product {ghost}")))
        );
    }

    #[tokio::test]
    async fn attribute_dictionary() {
        let fx = fixture().await;

        let created = fx.service.create_attribute("  Color ").await;
        assert!(created.result.success);
        assert_eq!(created.result.message, ATTRIBUTE_CREATED);
        assert_eq!(created.attribute.as_ref().unwrap().name, "Color");

        let duplicate = fx.service.create_attribute("Size").await;
        assert!(!duplicate.result.success);
        assert!(duplicate.attribute.is_none());
        assert_eq!(
            duplicate.result.message,
            "constraint violated: attributes.name 'Size' already exists"
        );

        let blank = fx.service.create_attribute("   ").await;
        assert!(blank.result.message.starts_with("validation failed"));

        let names: Vec<String> = fx
            .service
            .list_attributes()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Color".to_string(), "Size".to_string()]);
    }

    fn assert_report_shape(report: &MutationReport, applied: usize) {
        assert!(report.is_success(), "{}", report.result.message);
        assert_eq!(report.applied().count(), applied);
        assert_eq!(report.failures().count(), 0);
    }

    #[tokio::test]
    async fn postgres_store_reconciles_variants() -> anyhow::Result<()> {
        let config = CatalogConfig::from_env();
        if config.database_url.is_none() {
            eprintln!("DATABASE_URL not set; skipping postgres test");
            return Ok(());
        }
        storefront_observability::init_for_tests();

        let store = PostgresCatalogStore::connect(&config).await?;
        store.migrate().await?;
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let service = CatalogService::new(store, bus, config);

        let run = uuid::Uuid::now_v7().simple().to_string();
        let tools = service.create_category(&format!("Tools {run}"), None).await?;
        let size = service
            .create_attribute(&format!("Size {run}"))
            .await
            .attribute
            .ok_or_else(|| anyhow::anyhow!("attribute was not created"))?
            .id;

        let mut create = payload(
            tools.id,
            vec![sized(100, size, "Small"), sized(150, size, "Large")],
        );
        create.slug = Some(format!("hammer {run}"));
        let report = service.create_product(create).await;
        assert_report_shape(&report, 2);

        let id = report.product_id.ok_or_else(|| anyhow::anyhow!("no product id"))?;
        let detail = service.get_product(id).await?.ok_or_else(|| anyhow::anyhow!("product missing"))?;
        assert_eq!(detail.product.slug, format!("hammer-{run}"));
        let large = variant_with(&detail, size, "Large");

        let report = service
            .update_product(
                id,
                payload(
                    tools.id,
                    vec![VariantInput::existing(large, price(160), vec![AttributeInput::new(size, "XL")])],
                ),
            )
            .await;
        assert_report_shape(&report, 1);

        let detail = service.get_product(id).await?.ok_or_else(|| anyhow::anyhow!("product missing"))?;
        assert_eq!(detail.variants.len(), 1);
        assert_eq!(detail.variants[0].price, price(160));
        assert_eq!(detail.variants[0].attribute(size), Some("XL"));

        let deleted = service.delete_product(id).await;
        assert!(deleted.success);
        assert!(service.get_product(id).await?.is_none());
        Ok(())
    }
}
