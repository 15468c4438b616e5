// ==========================================
// 订单导入系统 - 订单领域模型
// ==========================================
// 职责: 规范化订单/订单行、导入警告、导入结果、落库记录
// 生命周期: Canonical* / ImportWarning / ImportResult 仅在单次导入内存在
// ==========================================

use crate::domain::types::{CellValue, OrderStatus, PaymentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 原始行（列名 → 单元格）
pub type RawRow = HashMap<String, CellValue>;

// ==========================================
// RawSheet - 文件读取结果
// ==========================================
// 用途: 文件读取层 → 识别/规范化层的输入
#[derive(Debug, Clone, Default)]
pub struct RawSheet {
    pub file_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

// ==========================================
// CanonicalOrder - 规范化订单
// ==========================================
// 同一批次中每个 order_number 只有一条（首行建立）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalOrder {
    pub order_number: String,
    pub order_date: DateTime<Utc>,
    pub customer_email: String,
    pub customer_name: Option<String>,

    // ===== 收货信息 =====
    pub shipping_address: Option<String>,
    pub shipping_address_line2: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_country: Option<String>,
    pub shipping_phone: Option<String>,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub source: Option<String>,
    pub notes: Option<String>,
}

// ==========================================
// CanonicalOrderItem - 规范化订单行
// ==========================================
// 通过 order_number 值关联订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalOrderItem {
    pub order_number: String,
    pub sku: String,
    pub quantity: u32,   // >= 1
    pub unit_price: f64, // >= 0
    pub product_name: Option<String>,
}

// ==========================================
// 导入警告
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    UnknownSku,
    DuplicateOrder,
    InvalidDate,
    MissingField,
}

impl WarningKind {
    /// 是否导致整行被跳过
    pub fn skips_row(&self) -> bool {
        matches!(self, WarningKind::MissingField | WarningKind::InvalidDate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportWarning {
    pub kind: WarningKind,
    pub message: String,
    pub row: Option<usize>, // 1 起，含表头行
    pub order_number: Option<String>,
    pub sku: Option<String>,
}

// ==========================================
// ParseResult - 规范化输出
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseResult {
    pub orders: Vec<CanonicalOrder>,
    pub items: Vec<CanonicalOrderItem>,
    pub warnings: Vec<ImportWarning>,
}

impl ParseResult {
    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &ImportWarning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}

// ==========================================
// ImportOptions / ImportResult
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub skip_duplicates: bool,
    pub update_existing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// 单个订单的最终处置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDisposition {
    Skipped,
    Created,
    Updated,
    Failed,
}

// ==========================================
// 仓储记录（落库形态）
// ==========================================

/// 商品目录记录（按 SKU 批量读取）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: i64,
    pub sku: String,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub format: Option<String>,
    pub price: f64,
    pub cost: Option<f64>,
    pub supplier_id: Option<i64>,
}

/// 待新建客户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// 已存在客户（id + email）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: i64,
    pub email: String,
}

/// 订单行（写入 orders 表）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_number: String,
    pub order_date: DateTime<Utc>,
    pub customer_id: Option<i64>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub shipping_name: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_address_line2: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_country: Option<String>,
    pub shipping_phone: Option<String>,
    pub subtotal: f64,
    pub total: f64,
}

/// 订单明细行（写入 order_items 表）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub order_id: i64,
    pub product_id: Option<i64>,
    pub sku: String,
    pub description: Option<String>,
    pub artist: Option<String>,
    pub format: Option<String>,
    pub quantity: u32,
    pub unit_price: f64,
    pub unit_cost: Option<f64>,
    pub supplier_id: Option<i64>,
    pub total_price: f64,
}

/// 单个订单的一次写入（新建或覆盖）
#[derive(Debug, Clone, PartialEq)]
pub struct OrderWrite {
    /// Some(id) 表示覆盖已有订单
    pub existing_id: Option<i64>,
    pub order: OrderRecord,
    /// order_id 在写入时由仓储回填
    pub items: Vec<OrderItemRecord>,
}
