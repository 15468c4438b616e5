// ==========================================
// 订单导入系统 - SQLite 订单存储实现
// ==========================================
// 职责: 实现 OrderStore（使用 rusqlite）
// 约束: 单个订单的订单头 + 明细替换在同一事务内完成
// ==========================================

use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::order::{
    CustomerRecord, NewCustomer, OrderItemRecord, OrderRecord, OrderWrite, ProductRecord,
};
use crate::domain::types::{OrderStatus, PaymentStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::order_store::OrderStore;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

const ORDER_COLUMNS: &str = "order_number, order_date, customer_id, status, payment_status, \
     source, notes, shipping_name, shipping_address, shipping_address_line2, shipping_city, \
     shipping_postal_code, shipping_country, shipping_phone, subtotal, total";

const ITEM_COLUMNS: &str = "order_id, product_id, sku, description, artist, format, quantity, \
     unit_price, unit_cost, supplier_id, total_price";

// ==========================================
// SqliteOrderStore
// ==========================================
pub struct SqliteOrderStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteOrderStore {
    /// 打开数据库并确保表结构存在
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(|e| {
            RepositoryError::DatabaseConnectionError(format!("{}: {}", db_path, e))
        })?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（调用方负责建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 商品目录维护（导入流程不写商品）=====

    /// 新增或按 SKU 覆盖商品，返回商品 id
    pub fn upsert_product(&self, product: &ProductRecord) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO products (sku, name, artist, format, price, cost, supplier_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(sku) DO UPDATE SET
                name = ?2, artist = ?3, format = ?4, price = ?5, cost = ?6, supplier_id = ?7
            "#,
            params![
                product.sku,
                product.name,
                product.artist,
                product.format,
                product.price,
                product.cost,
                product.supplier_id,
            ],
        )?;

        let id = conn.query_row(
            "SELECT id FROM products WHERE sku = ?1",
            params![product.sku],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// 按订单号查询订单（id + 订单头）
    pub fn find_order(&self, order_number: &str) -> RepositoryResult<Option<(i64, OrderRecord)>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT id, {} FROM orders WHERE order_number = ?1", ORDER_COLUMNS);
        let found = conn
            .query_row(&sql, params![order_number], |row| {
                Ok((row.get::<_, i64>(0)?, order_from_row(row, 1)?))
            })
            .optional()?;
        Ok(found)
    }

    /// 客户总数
    pub fn count_customers(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ===== 事务 =====

    fn begin_tx(conn: &Connection) -> RepositoryResult<Transaction<'_>> {
        conn.unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(format!("开启事务失败: {}", e)))
    }

    fn commit_tx(tx: Transaction<'_>) -> RepositoryResult<()> {
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(format!("提交事务失败: {}", e)))
    }

    // ===== 连接/事务内的写入 =====

    fn insert_order_tx(conn: &Connection, order: &OrderRecord) -> RepositoryResult<i64> {
        conn.execute(
            &format!(
                "INSERT INTO orders ({}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                ORDER_COLUMNS
            ),
            params![
                order.order_number,
                order.order_date,
                order.customer_id,
                order.status.as_str(),
                order.payment_status.as_str(),
                order.source,
                order.notes,
                order.shipping_name,
                order.shipping_address,
                order.shipping_address_line2,
                order.shipping_city,
                order.shipping_postal_code,
                order.shipping_country,
                order.shipping_phone,
                order.subtotal,
                order.total,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_order_tx(conn: &Connection, order_id: i64, order: &OrderRecord) -> RepositoryResult<()> {
        let affected = conn.execute(
            r#"
            UPDATE orders SET
                order_number = ?2, order_date = ?3, customer_id = ?4, status = ?5,
                payment_status = ?6, source = ?7, notes = ?8, shipping_name = ?9,
                shipping_address = ?10, shipping_address_line2 = ?11, shipping_city = ?12,
                shipping_postal_code = ?13, shipping_country = ?14, shipping_phone = ?15,
                subtotal = ?16, total = ?17, updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                order_id,
                order.order_number,
                order.order_date,
                order.customer_id,
                order.status.as_str(),
                order.payment_status.as_str(),
                order.source,
                order.notes,
                order.shipping_name,
                order.shipping_address,
                order.shipping_address_line2,
                order.shipping_city,
                order.shipping_postal_code,
                order.shipping_country,
                order.shipping_phone,
                order.subtotal,
                order.total,
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            });
        }
        Ok(())
    }

    fn delete_order_items_tx(conn: &Connection, order_id: i64) -> RepositoryResult<usize> {
        let deleted = conn.execute("DELETE FROM order_items WHERE order_id = ?1", params![order_id])?;
        Ok(deleted)
    }

    fn insert_order_items_tx(conn: &Connection, items: &[OrderItemRecord]) -> RepositoryResult<usize> {
        let mut stmt = conn.prepare(&format!(
            "INSERT INTO order_items ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            ITEM_COLUMNS
        ))?;

        let mut count = 0;
        for item in items {
            stmt.execute(params![
                item.order_id,
                item.product_id,
                item.sku,
                item.description,
                item.artist,
                item.format,
                item.quantity,
                item.unit_price,
                item.unit_cost,
                item.supplier_id,
                item.total_price,
            ])?;
            count += 1;
        }
        Ok(count)
    }
}

fn order_from_row(row: &Row, offset: usize) -> rusqlite::Result<OrderRecord> {
    let status: String = row.get(offset + 3)?;
    let payment_status: String = row.get(offset + 4)?;

    Ok(OrderRecord {
        order_number: row.get(offset)?,
        order_date: row.get(offset + 1)?,
        customer_id: row.get(offset + 2)?,
        status: OrderStatus::from_name(&status).unwrap_or_default(),
        payment_status: PaymentStatus::from_name(&payment_status).unwrap_or_default(),
        source: row.get(offset + 5)?,
        notes: row.get(offset + 6)?,
        shipping_name: row.get(offset + 7)?,
        shipping_address: row.get(offset + 8)?,
        shipping_address_line2: row.get(offset + 9)?,
        shipping_city: row.get(offset + 10)?,
        shipping_postal_code: row.get(offset + 11)?,
        shipping_country: row.get(offset + 12)?,
        shipping_phone: row.get(offset + 13)?,
        subtotal: row.get(offset + 14)?,
        total: row.get(offset + 15)?,
    })
}

fn item_from_row(row: &Row) -> rusqlite::Result<OrderItemRecord> {
    Ok(OrderItemRecord {
        order_id: row.get(0)?,
        product_id: row.get(1)?,
        sku: row.get(2)?,
        description: row.get(3)?,
        artist: row.get(4)?,
        format: row.get(5)?,
        quantity: row.get(6)?,
        unit_price: row.get(7)?,
        unit_cost: row.get(8)?,
        supplier_id: row.get(9)?,
        total_price: row.get(10)?,
    })
}

#[async_trait]
impl OrderStore for SqliteOrderStore {
    async fn list_order_numbers(&self) -> RepositoryResult<HashMap<String, i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT order_number, id FROM orders")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

        let mut map = HashMap::new();
        for row in rows {
            let (number, id) = row?;
            map.insert(number, id);
        }
        Ok(map)
    }

    async fn list_products_by_sku(&self) -> RepositoryResult<HashMap<String, ProductRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, sku, name, artist, format, price, cost, supplier_id FROM products",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ProductRecord {
                id: row.get(0)?,
                sku: row.get(1)?,
                name: row.get(2)?,
                artist: row.get(3)?,
                format: row.get(4)?,
                price: row.get(5)?,
                cost: row.get(6)?,
                supplier_id: row.get(7)?,
            })
        })?;

        let mut map = HashMap::new();
        for row in rows {
            let product = row?;
            map.insert(product.sku.clone(), product);
        }
        Ok(map)
    }

    async fn list_customers_by_email(
        &self,
        emails: &[String],
    ) -> RepositoryResult<HashMap<String, i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT id FROM customers WHERE lower(email) = ?1 LIMIT 1")?;

        let mut map = HashMap::new();
        for email in emails {
            let key = email.trim().to_lowercase();
            if key.is_empty() || map.contains_key(&key) {
                continue;
            }
            let id: Option<i64> = stmt.query_row(params![key], |row| row.get(0)).optional()?;
            if let Some(id) = id {
                map.insert(key, id);
            }
        }
        Ok(map)
    }

    async fn insert_customers(
        &self,
        customers: Vec<NewCustomer>,
    ) -> RepositoryResult<Vec<CustomerRecord>> {
        let conn = self.get_conn()?;
        let tx = Self::begin_tx(&conn)?;

        let mut created = Vec::with_capacity(customers.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO customers (email, first_name, last_name, phone) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for customer in &customers {
                stmt.execute(params![
                    customer.email,
                    customer.first_name,
                    customer.last_name,
                    customer.phone,
                ])?;
                created.push(CustomerRecord {
                    id: tx.last_insert_rowid(),
                    email: customer.email.clone(),
                });
            }
        }

        Self::commit_tx(tx)?;
        Ok(created)
    }

    async fn insert_order(&self, order: &OrderRecord) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::insert_order_tx(&conn, order)
    }

    async fn update_order(&self, order_id: i64, order: &OrderRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::update_order_tx(&conn, order_id, order)
    }

    async fn delete_order_items(&self, order_id: i64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        Self::delete_order_items_tx(&conn, order_id)
    }

    async fn insert_order_items(&self, items: &[OrderItemRecord]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = Self::begin_tx(&conn)?;
        let count = Self::insert_order_items_tx(&tx, items)?;
        Self::commit_tx(tx)?;
        Ok(count)
    }

    async fn list_order_items(&self, order_id: i64) -> RepositoryResult<Vec<OrderItemRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM order_items WHERE order_id = ?1 ORDER BY id",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![order_id], item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// 单事务: 订单头 + 删除旧明细 + 写入新明细
    async fn save_order(&self, write: OrderWrite) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let tx = Self::begin_tx(&conn)?;

        let order_id = match write.existing_id {
            Some(id) => {
                Self::update_order_tx(&tx, id, &write.order)?;
                Self::delete_order_items_tx(&tx, id)?;
                id
            }
            None => Self::insert_order_tx(&tx, &write.order)?,
        };

        let items: Vec<OrderItemRecord> = write
            .items
            .into_iter()
            .map(|item| OrderItemRecord { order_id, ..item })
            .collect();
        Self::insert_order_items_tx(&tx, &items)?;

        Self::commit_tx(tx)?;
        Ok(order_id)
    }
}
