//! # Catalog Repository
//!
//! Store-scoped master data: stores, customers, services, products,
//! discount/point rules, prepaid plans. These rows carry no business rule
//! beyond field validation; the interesting behavior lives in the pricing
//! engine and the ledgers that reference them.
//!
//! ## Tenancy
//! Every lookup filters by `store_id`. A hit under the wrong store returns
//! exactly what a miss returns; callers cannot distinguish "not yours" from
//! "not there".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use clipper_core::validation::validate_name;
use clipper_core::{
    Customer, CustomerBalances, DiscountAppliesTo, DiscountRule, DiscountRuleType, Money,
    PointRule, PointRuleType, PrepaidPlan, Product, ProductKind, Service, Store,
};

use crate::error::{DbError, DbResult};

// =============================================================================
// New-Row Parameter Structs
// =============================================================================

/// Parameters for creating a discount rule. `position` is assigned by the
/// repository (next slot for the store), never by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiscountRule {
    pub name: String,
    pub rule_type: DiscountRuleType,
    pub value: i64,
    pub applies_to: DiscountAppliesTo,
    pub target_id: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// Parameters for creating a point rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPointRule {
    pub name: String,
    pub rule_type: PointRuleType,
    pub value: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for master-data operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Stores
    // -------------------------------------------------------------------------

    /// Creates a store (tenant root).
    pub async fn create_store(&self, name: &str) -> DbResult<Store> {
        validate_name(name).map_err(clipper_core::CoreError::from)?;

        let store = Store {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };

        debug!(id = %store.id, name = %store.name, "Creating store");

        sqlx::query("INSERT INTO stores (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&store.id)
            .bind(&store.name)
            .bind(store.created_at)
            .execute(&self.pool)
            .await?;

        Ok(store)
    }

    // -------------------------------------------------------------------------
    // Customers
    // -------------------------------------------------------------------------

    /// Creates a customer under a store.
    pub async fn create_customer(
        &self,
        store_id: &str,
        name: &str,
        phone: Option<&str>,
        memo: Option<&str>,
    ) -> DbResult<Customer> {
        validate_name(name).map_err(clipper_core::CoreError::from)?;

        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            store_id: store_id.to_string(),
            name: name.trim().to_string(),
            phone: phone.map(str::to_string),
            memo: memo.map(str::to_string),
            created_at: Utc::now(),
        };

        debug!(id = %customer.id, store_id = %store_id, "Creating customer");

        sqlx::query(
            "INSERT INTO customers (id, store_id, name, phone, memo, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&customer.id)
        .bind(&customer.store_id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.memo)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Gets a customer by id, scoped to a store.
    pub async fn get_customer(&self, store_id: &str, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, store_id, name, phone, memo, created_at
             FROM customers WHERE id = ?1 AND store_id = ?2",
        )
        .bind(id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Computed point and prepaid balances for a customer.
    ///
    /// Both figures are sums over ledger rows at read time; there is no
    /// stored counter to drift.
    pub async fn customer_balances(
        &self,
        store_id: &str,
        customer_id: &str,
    ) -> DbResult<CustomerBalances> {
        self.get_customer(store_id, customer_id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", customer_id))?;

        let point_balance: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(points_delta), 0)
             FROM point_transactions WHERE store_id = ?1 AND customer_id = ?2",
        )
        .bind(store_id)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        let prepaid_balance: i64 = sqlx::query_scalar(
            "SELECT COALESCE((
                 SELECT SUM(s.value_amount) FROM prepaid_sales s
                 WHERE s.store_id = ?1 AND s.customer_id = ?2
             ), 0) - COALESCE((
                 SELECT SUM(u.amount_used) FROM prepaid_usages u
                 JOIN prepaid_sales s ON s.id = u.prepaid_sale_id
                 WHERE s.store_id = ?1 AND s.customer_id = ?2
             ), 0)",
        )
        .bind(store_id)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(CustomerBalances {
            point_balance,
            prepaid_balance: Money::from_minor(prepaid_balance),
        })
    }

    // -------------------------------------------------------------------------
    // Services & Products
    // -------------------------------------------------------------------------

    /// Creates a service on the store's menu.
    pub async fn create_service(
        &self,
        store_id: &str,
        name: &str,
        category_id: Option<&str>,
        list_price: Money,
    ) -> DbResult<Service> {
        validate_name(name).map_err(clipper_core::CoreError::from)?;

        let service = Service {
            id: Uuid::new_v4().to_string(),
            store_id: store_id.to_string(),
            category_id: category_id.map(str::to_string),
            name: name.trim().to_string(),
            list_price,
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %service.id, store_id = %store_id, "Creating service");

        sqlx::query(
            "INSERT INTO services (id, store_id, category_id, name, list_price, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&service.id)
        .bind(&service.store_id)
        .bind(&service.category_id)
        .bind(&service.name)
        .bind(service.list_price)
        .bind(service.is_active)
        .bind(service.created_at)
        .execute(&self.pool)
        .await?;

        Ok(service)
    }

    /// Gets a service by id, scoped to a store.
    pub async fn get_service(&self, store_id: &str, id: &str) -> DbResult<Option<Service>> {
        let service = sqlx::query_as::<_, Service>(
            "SELECT id, store_id, category_id, name, list_price, is_active, created_at
             FROM services WHERE id = ?1 AND store_id = ?2",
        )
        .bind(id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(service)
    }

    /// Creates a product.
    pub async fn create_product(
        &self,
        store_id: &str,
        name: &str,
        kind: ProductKind,
        retail_unit_price: Money,
    ) -> DbResult<Product> {
        validate_name(name).map_err(clipper_core::CoreError::from)?;

        let product = Product {
            id: Uuid::new_v4().to_string(),
            store_id: store_id.to_string(),
            name: name.trim().to_string(),
            kind,
            retail_unit_price,
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %product.id, store_id = %store_id, "Creating product");

        sqlx::query(
            "INSERT INTO products (id, store_id, name, kind, retail_unit_price, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&product.id)
        .bind(&product.store_id)
        .bind(&product.name)
        .bind(product.kind)
        .bind(product.retail_unit_price)
        .bind(product.is_active)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by id, scoped to a store.
    pub async fn get_product(&self, store_id: &str, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, store_id, name, kind, retail_unit_price, is_active, created_at
             FROM products WHERE id = ?1 AND store_id = ?2",
        )
        .bind(id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    // -------------------------------------------------------------------------
    // Discount & Point Rules
    // -------------------------------------------------------------------------

    /// Creates a discount rule at the next position for the store.
    pub async fn create_discount_rule(
        &self,
        store_id: &str,
        rule: NewDiscountRule,
    ) -> DbResult<DiscountRule> {
        validate_name(&rule.name).map_err(clipper_core::CoreError::from)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(id = %id, store_id = %store_id, "Creating discount rule");

        // Position is assigned inside the INSERT so two admins adding rules
        // concurrently cannot claim the same slot.
        sqlx::query(
            "INSERT INTO discount_rules
                 (id, store_id, name, rule_type, value, applies_to, target_id,
                  starts_at, ends_at, position, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                 (SELECT COALESCE(MAX(position), 0) + 1 FROM discount_rules WHERE store_id = ?2),
                 ?10)",
        )
        .bind(&id)
        .bind(store_id)
        .bind(rule.name.trim())
        .bind(rule.rule_type)
        .bind(rule.value)
        .bind(rule.applies_to)
        .bind(&rule.target_id)
        .bind(rule.starts_at)
        .bind(rule.ends_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let created = sqlx::query_as::<_, DiscountRule>(
            "SELECT id, store_id, name, rule_type, value, applies_to, target_id,
                    starts_at, ends_at, position, created_at
             FROM discount_rules WHERE id = ?1",
        )
        .bind(&id)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Lists a store's discount rules in precedence order.
    pub async fn list_discount_rules(&self, store_id: &str) -> DbResult<Vec<DiscountRule>> {
        let rules = sqlx::query_as::<_, DiscountRule>(
            "SELECT id, store_id, name, rule_type, value, applies_to, target_id,
                    starts_at, ends_at, position, created_at
             FROM discount_rules WHERE store_id = ?1
             ORDER BY position",
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }

    /// Creates a point rule at the next position for the store.
    pub async fn create_point_rule(
        &self,
        store_id: &str,
        rule: NewPointRule,
    ) -> DbResult<PointRule> {
        validate_name(&rule.name).map_err(clipper_core::CoreError::from)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(id = %id, store_id = %store_id, "Creating point rule");

        sqlx::query(
            "INSERT INTO point_rules
                 (id, store_id, name, rule_type, value, starts_at, ends_at, position, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7,
                 (SELECT COALESCE(MAX(position), 0) + 1 FROM point_rules WHERE store_id = ?2),
                 ?8)",
        )
        .bind(&id)
        .bind(store_id)
        .bind(rule.name.trim())
        .bind(rule.rule_type)
        .bind(rule.value)
        .bind(rule.starts_at)
        .bind(rule.ends_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let created = sqlx::query_as::<_, PointRule>(
            "SELECT id, store_id, name, rule_type, value, starts_at, ends_at, position, created_at
             FROM point_rules WHERE id = ?1",
        )
        .bind(&id)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Lists a store's point rules in precedence order.
    pub async fn list_point_rules(&self, store_id: &str) -> DbResult<Vec<PointRule>> {
        let rules = sqlx::query_as::<_, PointRule>(
            "SELECT id, store_id, name, rule_type, value, starts_at, ends_at, position, created_at
             FROM point_rules WHERE store_id = ?1
             ORDER BY position",
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }

    // -------------------------------------------------------------------------
    // Prepaid Plans
    // -------------------------------------------------------------------------

    /// Creates a sellable prepaid plan.
    pub async fn create_prepaid_plan(
        &self,
        store_id: &str,
        name: &str,
        price_paid: Money,
        value_amount: Money,
    ) -> DbResult<PrepaidPlan> {
        validate_name(name).map_err(clipper_core::CoreError::from)?;

        let plan = PrepaidPlan {
            id: Uuid::new_v4().to_string(),
            store_id: store_id.to_string(),
            name: name.trim().to_string(),
            price_paid,
            value_amount,
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %plan.id, store_id = %store_id, "Creating prepaid plan");

        sqlx::query(
            "INSERT INTO prepaid_plans (id, store_id, name, price_paid, value_amount, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&plan.id)
        .bind(&plan.store_id)
        .bind(&plan.name)
        .bind(plan.price_paid)
        .bind(plan.value_amount)
        .bind(plan.is_active)
        .bind(plan.created_at)
        .execute(&self.pool)
        .await?;

        Ok(plan)
    }

    /// Gets a prepaid plan by id, scoped to a store.
    pub async fn get_prepaid_plan(&self, store_id: &str, id: &str) -> DbResult<Option<PrepaidPlan>> {
        let plan = sqlx::query_as::<_, PrepaidPlan>(
            "SELECT id, store_id, name, price_paid, value_amount, is_active, created_at
             FROM prepaid_plans WHERE id = ?1 AND store_id = ?2",
        )
        .bind(id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(plan)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_round_trip() {
        let db = test_db().await;
        let catalog = db.catalog();

        let store = catalog.create_store("Shear Genius").await.unwrap();
        let customer = catalog
            .create_customer(&store.id, "Dana", Some("010-1234"), None)
            .await
            .unwrap();

        let fetched = catalog
            .get_customer(&store.id, &customer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.name, "Dana");
        assert_eq!(fetched.phone.as_deref(), Some("010-1234"));
    }

    #[tokio::test]
    async fn test_cross_store_lookup_behaves_like_missing() {
        let db = test_db().await;
        let catalog = db.catalog();

        let store_a = catalog.create_store("Store A").await.unwrap();
        let store_b = catalog.create_store("Store B").await.unwrap();
        let customer = catalog
            .create_customer(&store_a.id, "Dana", None, None)
            .await
            .unwrap();

        // Same id, wrong store: indistinguishable from a miss.
        let foreign = catalog.get_customer(&store_b.id, &customer.id).await.unwrap();
        assert!(foreign.is_none());

        let missing = catalog.get_customer(&store_b.id, "no-such-id").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_discount_rule_positions_are_sequential_per_store() {
        let db = test_db().await;
        let catalog = db.catalog();
        let store = catalog.create_store("Store").await.unwrap();

        let rule = |name: &str| NewDiscountRule {
            name: name.to_string(),
            rule_type: DiscountRuleType::Percent,
            value: 10,
            applies_to: DiscountAppliesTo::AllServices,
            target_id: None,
            starts_at: None,
            ends_at: None,
        };

        let first = catalog.create_discount_rule(&store.id, rule("first")).await.unwrap();
        let second = catalog.create_discount_rule(&store.id, rule("second")).await.unwrap();

        assert_eq!(first.position, 1);
        assert_eq!(second.position, 2);

        let listed = catalog.list_discount_rules(&store.id).await.unwrap();
        assert_eq!(
            listed.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["first", "second"]
        );
    }

    #[tokio::test]
    async fn test_customer_balances_start_at_zero() {
        let db = test_db().await;
        let catalog = db.catalog();
        let store = catalog.create_store("Store").await.unwrap();
        let customer = catalog.create_customer(&store.id, "Dana", None, None).await.unwrap();

        let balances = catalog.customer_balances(&store.id, &customer.id).await.unwrap();
        assert_eq!(balances.point_balance, 0);
        assert!(balances.prepaid_balance.is_zero());
    }

    #[tokio::test]
    async fn test_customer_balances_cross_store_is_not_found() {
        let db = test_db().await;
        let catalog = db.catalog();
        let store_a = catalog.create_store("A").await.unwrap();
        let store_b = catalog.create_store("B").await.unwrap();
        let customer = catalog.create_customer(&store_a.id, "Dana", None, None).await.unwrap();

        let err = catalog
            .customer_balances(&store_b.id, &customer.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let db = test_db().await;
        let err = db.catalog().create_store("   ").await.unwrap_err();
        assert!(matches!(err, DbError::Core(_)));
    }
}
