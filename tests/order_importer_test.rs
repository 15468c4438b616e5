// ==========================================
// 对账导入器集成测试
// ==========================================
// 覆盖: 新建 / 跳过 / 覆盖 / 客户补建 / 目录价回退 / 单订单失败
// ==========================================


use async_trait::async_trait;
use marketplace_order_import::domain::{
    CustomerRecord, NewCustomer, OrderItemRecord, OrderRecord, ProductRecord,
};
use marketplace_order_import::repository::{RepositoryError, RepositoryResult};
use marketplace_order_import::{
    CellValue, ImportOptions, OrderImporter, OrderStore, RawRow, RowNormalizer, SqliteOrderStore,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use test_helpers::*;

const SKIP: ImportOptions = ImportOptions {
    skip_duplicates: true,
    update_existing: false,
};

const UPDATE: ImportOptions = ImportOptions {
    skip_duplicates: false,
    update_existing: true,
};

#[tokio::test]
async fn test_import_creates_order_with_items() {
    let (_temp, store) = create_test_store().unwrap();
    seed_products(&store, &[("LP-1", 20.0), ("LP-2", 15.5)]).unwrap();

    let orders = vec![canonical_order("A1", "jane@example.com")];
    let items = vec![
        canonical_item("A1", "LP-1", 2, 19.0),
        canonical_item("A1", "LP-2", 1, 15.5),
    ];

    let importer = OrderImporter::new(store.clone());
    let result = importer.import(&orders, &items, SKIP).await.unwrap();

    assert_eq!(result.created, 1);
    assert_eq!(result.updated, 0);
    assert_eq!(result.skipped, 0);
    assert!(result.errors.is_empty());
    println!("✓ 步骤1: 订单新建成功");

    let (order_id, record) = store.find_order("A1").unwrap().expect("订单应已写入");
    assert_eq!(record.subtotal, 53.5);
    assert_eq!(record.total, 53.5);
    assert_eq!(record.shipping_name.as_deref(), Some("Jane Doe"));
    assert!(record.customer_id.is_some());

    let written = store.list_order_items(order_id).await.unwrap();
    assert_eq!(written.len(), 2);
    assert!(written.iter().all(|item| item.order_id == order_id));
    assert!(written.iter().all(|item| item.product_id.is_some()));
    println!("✓ 步骤2: 订单头与明细校验通过");
}

#[tokio::test]
async fn test_normalize_then_import_single_row() {
    let (_temp, store) = create_test_store().unwrap();
    seed_products(&store, &[("SKU1", 12.0)]).unwrap();

    let row: RawRow = [
        ("order_number", "A1"),
        ("customer_email", "x@y.com"),
        ("order_date", "2024-01-05"),
        ("product_sku", "SKU1"),
        ("quantity", "2"),
        ("unit_price", "9.99"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), CellValue::from(v)))
    .collect();

    let skus: HashSet<String> = ["SKU1".to_string()].into_iter().collect();
    let parsed = RowNormalizer::generic().parse(&[row], &HashSet::new(), &skus);
    assert_eq!(parsed.orders.len(), 1);
    assert_eq!(parsed.items.len(), 1);
    assert!(parsed.warnings.is_empty());
    println!("✓ 步骤1: 单行规范化无警告");

    let importer = OrderImporter::new(store.clone());
    let result = importer
        .import(&parsed.orders, &parsed.items, ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(result.created, 1);
    assert_eq!(result.updated, 0);
    assert_eq!(result.skipped, 0);
    assert!(result.errors.is_empty());

    let (order_id, _) = store.find_order("A1").unwrap().unwrap();
    let written = store.list_order_items(order_id).await.unwrap();
    assert_eq!(written[0].quantity, 2);
    assert_eq!(written[0].unit_price, 9.99);
    println!("✓ 步骤2: 导入结果 created=1");
}

#[tokio::test]
async fn test_reimport_with_skip_duplicates_is_idempotent() {
    let (_temp, store) = create_test_store().unwrap();
    seed_products(&store, &[("LP-1", 20.0)]).unwrap();

    let orders = vec![
        canonical_order("A1", "jane@example.com"),
        canonical_order("A2", "bob@example.com"),
    ];
    let items = vec![
        canonical_item("A1", "LP-1", 1, 20.0),
        canonical_item("A2", "LP-1", 3, 20.0),
    ];
    let importer = OrderImporter::new(store.clone());

    let first = importer.import(&orders, &items, SKIP).await.unwrap();
    assert_eq!(first.created, 2);

    let second = importer.import(&orders, &items, SKIP).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 2);
    assert!(second.errors.is_empty());

    let (order_id, _) = store.find_order("A2").unwrap().unwrap();
    assert_eq!(store.list_order_items(order_id).await.unwrap().len(), 1);
    assert_eq!(store.count_customers().unwrap(), 2);
}

#[tokio::test]
async fn test_default_options_skip_existing_orders() {
    let (_temp, store) = create_test_store().unwrap();
    let orders = vec![canonical_order("A1", "jane@example.com")];
    let items = vec![canonical_item("A1", "LP-1", 1, 10.0)];
    let importer = OrderImporter::new(store.clone());

    importer
        .import(&orders, &items, ImportOptions::default())
        .await
        .unwrap();

    let changed = vec![canonical_item("A1", "LP-1", 5, 10.0)];
    let result = importer
        .import(&orders, &changed, ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(result.skipped, 1);
    assert_eq!(result.updated, 0);

    let (order_id, record) = store.find_order("A1").unwrap().unwrap();
    assert_eq!(record.subtotal, 10.0);
    assert_eq!(store.list_order_items(order_id).await.unwrap()[0].quantity, 1);
}

#[tokio::test]
async fn test_update_existing_replaces_items() {
    let (_temp, store) = create_test_store().unwrap();
    seed_products(&store, &[("LP-1", 20.0), ("LP-2", 12.0), ("LP-3", 30.0)]).unwrap();
    let importer = OrderImporter::new(store.clone());

    let orders = vec![canonical_order("A1", "jane@example.com")];
    let items = vec![
        canonical_item("A1", "LP-1", 1, 20.0),
        canonical_item("A1", "LP-2", 2, 12.0),
    ];
    importer.import(&orders, &items, SKIP).await.unwrap();
    let (original_id, _) = store.find_order("A1").unwrap().unwrap();
    println!("✓ 步骤1: 初次导入完成");

    let mut changed_order = canonical_order("A1", "jane@example.com");
    changed_order.notes = Some("gift wrap".to_string());
    let changed_items = vec![canonical_item("A1", "LP-3", 1, 30.0)];

    let result = importer
        .import(&[changed_order], &changed_items, UPDATE)
        .await
        .unwrap();
    assert_eq!(result.updated, 1);
    assert_eq!(result.created, 0);
    println!("✓ 步骤2: 覆盖导入完成");

    let (order_id, record) = store.find_order("A1").unwrap().unwrap();
    assert_eq!(order_id, original_id);
    assert_eq!(record.notes.as_deref(), Some("gift wrap"));
    assert_eq!(record.subtotal, 30.0);

    let written = store.list_order_items(order_id).await.unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].sku, "LP-3");
    println!("✓ 步骤3: 旧明细已被替换");
}

#[tokio::test]
async fn test_skip_duplicates_wins_over_update_existing() {
    let (_temp, store) = create_test_store().unwrap();
    let importer = OrderImporter::new(store.clone());
    let orders = vec![canonical_order("A1", "jane@example.com")];

    importer
        .import(&orders, &[canonical_item("A1", "LP-1", 1, 10.0)], SKIP)
        .await
        .unwrap();

    let both = ImportOptions {
        skip_duplicates: true,
        update_existing: true,
    };
    let result = importer
        .import(&orders, &[canonical_item("A1", "LP-1", 4, 10.0)], both)
        .await
        .unwrap();

    assert_eq!(result.skipped, 1);
    assert_eq!(result.updated, 0);
    let (_, record) = store.find_order("A1").unwrap().unwrap();
    assert_eq!(record.subtotal, 10.0);
}

#[tokio::test]
async fn test_unknown_sku_and_catalogue_price_fallback() {
    let (_temp, store) = create_test_store().unwrap();
    seed_products(&store, &[("LP-1", 25.0)]).unwrap();
    let importer = OrderImporter::new(store.clone());

    let orders = vec![canonical_order("A1", "jane@example.com")];
    let items = vec![
        canonical_item("A1", "LP-1", 2, 0.0),
        canonical_item("A1", "NOT-IN-CATALOGUE", 1, 7.5),
    ];

    let result = importer.import(&orders, &items, SKIP).await.unwrap();
    assert_eq!(result.created, 1);

    let (order_id, record) = store.find_order("A1").unwrap().unwrap();
    let written = store.list_order_items(order_id).await.unwrap();
    let by_sku: HashMap<&str, &OrderItemRecord> =
        written.iter().map(|item| (item.sku.as_str(), item)).collect();

    let known = by_sku["LP-1"];
    assert_eq!(known.unit_price, 25.0);
    assert_eq!(known.total_price, 50.0);
    assert_eq!(known.format.as_deref(), Some("LP"));

    let unknown = by_sku["NOT-IN-CATALOGUE"];
    assert_eq!(unknown.product_id, None);
    assert_eq!(unknown.unit_price, 7.5);
    assert_eq!(unknown.unit_cost, None);

    assert_eq!(record.subtotal, 57.5);
}

#[tokio::test]
async fn test_customers_created_once_and_matched_case_insensitively() {
    let (_temp, store) = create_test_store().unwrap();
    let importer = OrderImporter::new(store.clone());

    let orders = vec![
        canonical_order("A1", "Jane@Example.com"),
        canonical_order("A2", "jane@example.com"),
    ];
    let result = importer.import(&orders, &[], SKIP).await.unwrap();
    assert_eq!(result.created, 2);
    assert_eq!(store.count_customers().unwrap(), 1);

    let (_, a1) = store.find_order("A1").unwrap().unwrap();
    let (_, a2) = store.find_order("A2").unwrap().unwrap();
    assert_eq!(a1.customer_id, a2.customer_id);
    println!("✓ 步骤1: 同批次同一客户只补建一次");

    let later = vec![canonical_order("A3", "  JANE@EXAMPLE.COM ")];
    importer.import(&later, &[], SKIP).await.unwrap();
    assert_eq!(store.count_customers().unwrap(), 1);

    let (_, a3) = store.find_order("A3").unwrap().unwrap();
    assert_eq!(a3.customer_id, a1.customer_id);
    println!("✓ 步骤2: 后续批次按邮箱匹配已有客户");
}

// ==========================================
// 单订单写失败: 其余订单继续导入
// ==========================================

/// 指定订单号写入失败的存储
struct FailingStore {
    inner: Arc<SqliteOrderStore>,
    fail_order_number: &'static str,
}

#[async_trait]
impl OrderStore for FailingStore {
    async fn list_order_numbers(&self) -> RepositoryResult<HashMap<String, i64>> {
        self.inner.list_order_numbers().await
    }

    async fn list_products_by_sku(&self) -> RepositoryResult<HashMap<String, ProductRecord>> {
        self.inner.list_products_by_sku().await
    }

    async fn list_customers_by_email(
        &self,
        emails: &[String],
    ) -> RepositoryResult<HashMap<String, i64>> {
        self.inner.list_customers_by_email(emails).await
    }

    async fn insert_customers(
        &self,
        customers: Vec<NewCustomer>,
    ) -> RepositoryResult<Vec<CustomerRecord>> {
        self.inner.insert_customers(customers).await
    }

    async fn insert_order(&self, order: &OrderRecord) -> RepositoryResult<i64> {
        if order.order_number == self.fail_order_number {
            return Err(RepositoryError::DatabaseQueryError("模拟写入失败".to_string()));
        }
        self.inner.insert_order(order).await
    }

    async fn update_order(&self, order_id: i64, order: &OrderRecord) -> RepositoryResult<()> {
        self.inner.update_order(order_id, order).await
    }

    async fn delete_order_items(&self, order_id: i64) -> RepositoryResult<usize> {
        self.inner.delete_order_items(order_id).await
    }

    async fn insert_order_items(&self, items: &[OrderItemRecord]) -> RepositoryResult<usize> {
        self.inner.insert_order_items(items).await
    }

    async fn list_order_items(&self, order_id: i64) -> RepositoryResult<Vec<OrderItemRecord>> {
        self.inner.list_order_items(order_id).await
    }
}

#[tokio::test]
async fn test_single_order_failure_does_not_abort_batch() {
    let (_temp, store) = create_test_store().unwrap();
    let failing = Arc::new(FailingStore {
        inner: store.clone(),
        fail_order_number: "A2",
    });
    let importer = OrderImporter::new(failing);

    let orders = vec![
        canonical_order("A1", "a@example.com"),
        canonical_order("A2", "b@example.com"),
        canonical_order("A3", "c@example.com"),
    ];
    let items = vec![
        canonical_item("A1", "LP-1", 1, 10.0),
        canonical_item("A2", "LP-1", 1, 10.0),
        canonical_item("A3", "LP-1", 1, 10.0),
    ];

    let result = importer.import(&orders, &items, SKIP).await.unwrap();

    assert_eq!(result.created, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("A2"));

    assert!(store.find_order("A1").unwrap().is_some());
    assert!(store.find_order("A2").unwrap().is_none());
    assert!(store.find_order("A3").unwrap().is_some());
}
