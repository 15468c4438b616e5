// ==========================================
// 订单导入系统 - 订单/客户/商品 存储 Trait
// ==========================================
// 职责: 定义对账导入所需的数据访问接口（不包含实现）
// 红线: Repository 不含业务规则，只做数据读写
// ==========================================

use crate::domain::order::{
    CustomerRecord, NewCustomer, OrderItemRecord, OrderRecord, OrderWrite, ProductRecord,
};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use std::collections::HashMap;

// ==========================================
// OrderStore Trait
// ==========================================
// 用途: 对账导入读写
// 实现者: SqliteOrderStore（使用 rusqlite）
#[async_trait]
pub trait OrderStore: Send + Sync {
    // ===== 批量读取 =====

    /// 已存在的订单号 → 订单 id
    async fn list_order_numbers(&self) -> RepositoryResult<HashMap<String, i64>>;

    /// 商品目录（SKU → 商品）
    async fn list_products_by_sku(&self) -> RepositoryResult<HashMap<String, ProductRecord>>;

    /// 按邮箱查询客户
    ///
    /// # 返回
    /// - 小写邮箱 → 客户 id（只包含已存在的客户）
    async fn list_customers_by_email(
        &self,
        emails: &[String],
    ) -> RepositoryResult<HashMap<String, i64>>;

    /// 批量新建客户
    ///
    /// # 返回
    /// - 新建客户的 id + email
    async fn insert_customers(
        &self,
        customers: Vec<NewCustomer>,
    ) -> RepositoryResult<Vec<CustomerRecord>>;

    // ===== 单订单写入 =====

    /// 新建订单，返回订单 id
    async fn insert_order(&self, order: &OrderRecord) -> RepositoryResult<i64>;

    /// 覆盖已有订单的订单头
    async fn update_order(&self, order_id: i64, order: &OrderRecord) -> RepositoryResult<()>;

    /// 删除订单的全部明细，返回删除条数
    async fn delete_order_items(&self, order_id: i64) -> RepositoryResult<usize>;

    /// 批量写入订单明细，返回写入条数
    async fn insert_order_items(&self, items: &[OrderItemRecord]) -> RepositoryResult<usize>;

    /// 查询订单明细
    async fn list_order_items(&self, order_id: i64) -> RepositoryResult<Vec<OrderItemRecord>>;

    /// 写入单个订单（订单头 + 全量替换明细）
    ///
    /// 默认实现按 写订单头 → 删除旧明细 → 写新明细 组合基础操作；
    /// 支持事务的实现应覆盖为单事务。
    ///
    /// # 返回
    /// - 订单 id
    async fn save_order(&self, write: OrderWrite) -> RepositoryResult<i64> {
        let OrderWrite {
            existing_id,
            order,
            mut items,
        } = write;

        let order_id = match existing_id {
            Some(id) => {
                self.update_order(id, &order).await?;
                self.delete_order_items(id).await?;
                id
            }
            None => self.insert_order(&order).await?,
        };

        for item in &mut items {
            item.order_id = order_id;
        }
        self.insert_order_items(&items).await?;

        Ok(order_id)
    }
}
