// ==========================================
// 订单导入系统 - 对账导入器
// ==========================================
// 阶段 4: 规范化订单 → 客户/商品对账 → 新建或覆盖订单
// ==========================================
// 流程:
// 1. 一次性读取 订单号 / 商品目录 / 客户
// 2. 补建缺失客户（批量）
// 3. 逐个订单: 判重 → 组装明细 → 写入
// 约束: 单订单写失败只记录错误，不中断整批；无全局事务
// ==========================================

use crate::domain::order::{
    CanonicalOrder, CanonicalOrderItem, ImportOptions, ImportResult, NewCustomer,
    OrderDisposition, OrderItemRecord, OrderRecord, OrderWrite, ProductRecord,
};
use crate::importer::error::ImporterResult;
use crate::repository::error::RepositoryResult;
use crate::repository::order_store::OrderStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// ReconcileContext - 单次导入的查找缓存
// ==========================================
// 生命周期: 每次 import 调用新建，随调用结束丢弃
#[derive(Debug, Default)]
pub struct ReconcileContext {
    /// 订单号 → 订单 id（本次新建的订单会追加进来）
    pub order_ids: HashMap<String, i64>,
    /// SKU → 商品
    pub products: HashMap<String, ProductRecord>,
    /// 小写邮箱 → 客户 id
    pub customers: HashMap<String, i64>,
}

impl ReconcileContext {
    /// 读取订单号、商品目录，并补建本批次缺失的客户
    pub async fn load<S>(store: &S, orders: &[CanonicalOrder]) -> RepositoryResult<Self>
    where
        S: OrderStore + ?Sized,
    {
        let order_ids = store.list_order_numbers().await?;
        let products = store.list_products_by_sku().await?;
        let customers = resolve_customers(store, orders).await?;

        debug!(
            existing_orders = order_ids.len(),
            products = products.len(),
            customers = customers.len(),
            "对账上下文加载完成"
        );

        Ok(Self {
            order_ids,
            products,
            customers,
        })
    }

    fn customer_id(&self, email: &str) -> Option<i64> {
        self.customers.get(&email.trim().to_lowercase()).copied()
    }
}

/// 读取已有客户并批量新建缺失客户，返回 小写邮箱 → id
async fn resolve_customers<S>(
    store: &S,
    orders: &[CanonicalOrder],
) -> RepositoryResult<HashMap<String, i64>>
where
    S: OrderStore + ?Sized,
{
    let mut seen = HashSet::new();
    let emails: Vec<String> = orders
        .iter()
        .map(|o| o.customer_email.trim().to_lowercase())
        .filter(|email| seen.insert(email.clone()))
        .collect();

    let mut customers = store.list_customers_by_email(&emails).await?;

    let mut pending = HashSet::new();
    let missing: Vec<NewCustomer> = orders
        .iter()
        .filter_map(|order| {
            let email = order.customer_email.trim().to_lowercase();
            if customers.contains_key(&email) || !pending.insert(email.clone()) {
                return None;
            }
            Some(new_customer(email, order))
        })
        .collect();

    if !missing.is_empty() {
        let created = store.insert_customers(missing).await?;
        info!(created = created.len(), "补建客户完成");
        for record in created {
            customers.insert(record.email.to_lowercase(), record.id);
        }
    }

    Ok(customers)
}

/// 按首个空格拆分姓名
fn split_name(name: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return (None, None);
    };

    match name.split_once(' ') {
        Some((first, last)) => {
            let last = last.trim();
            (
                Some(first.to_string()),
                (!last.is_empty()).then(|| last.to_string()),
            )
        }
        None => (Some(name.to_string()), None),
    }
}

fn new_customer(email: String, order: &CanonicalOrder) -> NewCustomer {
    let (first_name, last_name) = split_name(order.customer_name.as_deref());
    NewCustomer {
        email,
        first_name,
        last_name,
        phone: order.shipping_phone.clone(),
    }
}

// ==========================================
// OrderImporter - 对账导入器
// ==========================================
pub struct OrderImporter<S>
where
    S: OrderStore + ?Sized,
{
    store: Arc<S>,
}

impl<S> OrderImporter<S>
where
    S: OrderStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 导入规范化订单（生成新的 run_id）
    ///
    /// # 参数
    /// - orders: 规范化订单（每个订单号一条）
    /// - items: 规范化订单行（按订单号关联）
    /// - options: 重复订单处理策略
    ///
    /// # 返回
    /// - Ok(ImportResult): 新建/覆盖/跳过计数 + 单订单错误
    /// - Err: 初始批量读取或客户补建失败
    pub async fn import(
        &self,
        orders: &[CanonicalOrder],
        items: &[CanonicalOrderItem],
        options: ImportOptions,
    ) -> ImporterResult<ImportResult> {
        let run_id = Uuid::new_v4().to_string();
        self.import_with_run_id(&run_id, orders, items, options).await
    }

    /// 使用调用方给定的 run_id 导入
    #[instrument(skip(self, orders, items), fields(orders = orders.len(), items = items.len()))]
    pub async fn import_with_run_id(
        &self,
        run_id: &str,
        orders: &[CanonicalOrder],
        items: &[CanonicalOrderItem],
        options: ImportOptions,
    ) -> ImporterResult<ImportResult> {
        info!(
            skip_duplicates = options.skip_duplicates,
            update_existing = options.update_existing,
            "开始对账导入"
        );

        let mut ctx = ReconcileContext::load(self.store.as_ref(), orders).await?;

        let mut items_by_order: HashMap<&str, Vec<&CanonicalOrderItem>> = HashMap::new();
        for item in items {
            items_by_order
                .entry(item.order_number.as_str())
                .or_default()
                .push(item);
        }

        let mut result = ImportResult::default();
        for order in orders {
            let order_items = items_by_order
                .get(order.order_number.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            let disposition = match self.reconcile_order(&mut ctx, order, order_items, options).await {
                Ok(disposition) => disposition,
                Err(e) => {
                    warn!(order_number = %order.order_number, error = %e, "订单写入失败");
                    result
                        .errors
                        .push(format!("订单 {} 导入失败: {}", order.order_number, e));
                    OrderDisposition::Failed
                }
            };

            debug!(order_number = %order.order_number, ?disposition, "订单处理完成");
            match disposition {
                OrderDisposition::Created => result.created += 1,
                OrderDisposition::Updated => result.updated += 1,
                OrderDisposition::Skipped => result.skipped += 1,
                OrderDisposition::Failed => {}
            }
        }

        info!(
            run_id = %run_id,
            created = result.created,
            updated = result.updated,
            skipped = result.skipped,
            failed = result.errors.len(),
            "对账导入完成"
        );

        Ok(result)
    }

    async fn reconcile_order(
        &self,
        ctx: &mut ReconcileContext,
        order: &CanonicalOrder,
        items: &[&CanonicalOrderItem],
        options: ImportOptions,
    ) -> RepositoryResult<OrderDisposition> {
        let existing_id = ctx.order_ids.get(&order.order_number).copied();

        if existing_id.is_some() && (options.skip_duplicates || !options.update_existing) {
            return Ok(OrderDisposition::Skipped);
        }

        let (item_records, subtotal) = build_item_records(ctx, items);
        let record = build_order_record(ctx, order, subtotal);

        let order_id = self
            .store
            .save_order(OrderWrite {
                existing_id,
                order: record,
                items: item_records,
            })
            .await?;

        if existing_id.is_some() {
            Ok(OrderDisposition::Updated)
        } else {
            ctx.order_ids.insert(order.order_number.clone(), order_id);
            Ok(OrderDisposition::Created)
        }
    }
}

/// 组装订单明细，返回 (明细, 小计)
fn build_item_records(
    ctx: &ReconcileContext,
    items: &[&CanonicalOrderItem],
) -> (Vec<OrderItemRecord>, f64) {
    let mut subtotal = 0.0;
    let records = items
        .iter()
        .map(|item| {
            let product = ctx.products.get(&item.sku);

            // 行内价格优先，缺失时取目录价
            let unit_price = if item.unit_price > 0.0 {
                item.unit_price
            } else {
                product.map(|p| p.price).unwrap_or(0.0)
            };
            let total_price = unit_price * item.quantity as f64;
            subtotal += total_price;

            OrderItemRecord {
                order_id: 0,
                product_id: product.map(|p| p.id),
                sku: item.sku.clone(),
                description: item
                    .product_name
                    .clone()
                    .or_else(|| product.and_then(|p| p.name.clone())),
                artist: product.and_then(|p| p.artist.clone()),
                format: product.and_then(|p| p.format.clone()),
                quantity: item.quantity,
                unit_price,
                unit_cost: product.and_then(|p| p.cost),
                supplier_id: product.and_then(|p| p.supplier_id),
                total_price,
            }
        })
        .collect();

    (records, subtotal)
}

fn build_order_record(ctx: &ReconcileContext, order: &CanonicalOrder, subtotal: f64) -> OrderRecord {
    OrderRecord {
        order_number: order.order_number.clone(),
        order_date: order.order_date,
        customer_id: ctx.customer_id(&order.customer_email),
        status: order.status,
        payment_status: order.payment_status,
        source: order.source.clone(),
        notes: order.notes.clone(),
        shipping_name: order.customer_name.clone(),
        shipping_address: order.shipping_address.clone(),
        shipping_address_line2: order.shipping_address_line2.clone(),
        shipping_city: order.shipping_city.clone(),
        shipping_postal_code: order.shipping_postal_code.clone(),
        shipping_country: order.shipping_country.clone(),
        shipping_phone: order.shipping_phone.clone(),
        subtotal,
        // 不含税费与运费
        total: subtotal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(
            split_name(Some("Jane Mary Doe")),
            (Some("Jane".to_string()), Some("Mary Doe".to_string()))
        );
        assert_eq!(split_name(Some("Cher")), (Some("Cher".to_string()), None));
        assert_eq!(split_name(Some("  ")), (None, None));
        assert_eq!(split_name(None), (None, None));
    }

    #[test]
    fn test_item_price_falls_back_to_catalogue() {
        let mut ctx = ReconcileContext::default();
        ctx.products.insert(
            "LP-1".to_string(),
            ProductRecord {
                id: 7,
                sku: "LP-1".to_string(),
                name: Some("Kind of Blue".to_string()),
                artist: Some("Miles Davis".to_string()),
                format: Some("LP".to_string()),
                price: 20.0,
                cost: Some(9.0),
                supplier_id: Some(3),
            },
        );

        let known = CanonicalOrderItem {
            order_number: "A1".to_string(),
            sku: "LP-1".to_string(),
            quantity: 2,
            unit_price: 0.0,
            product_name: None,
        };
        let unknown = CanonicalOrderItem {
            order_number: "A1".to_string(),
            sku: "??".to_string(),
            quantity: 3,
            unit_price: 0.0,
            product_name: Some("Mystery".to_string()),
        };

        let (records, subtotal) = build_item_records(&ctx, &[&known, &unknown]);

        assert_eq!(records[0].unit_price, 20.0);
        assert_eq!(records[0].total_price, 40.0);
        assert_eq!(records[0].product_id, Some(7));
        assert_eq!(records[0].description.as_deref(), Some("Kind of Blue"));
        assert_eq!(records[0].supplier_id, Some(3));
        assert_eq!(records[1].unit_price, 0.0);
        assert_eq!(records[1].product_id, None);
        assert_eq!(records[1].description.as_deref(), Some("Mystery"));
        assert_eq!(subtotal, 40.0);
    }
}
