// ==========================================
// 订单导入系统 - 平台配置注册表
// ==========================================
// 职责: 固定的平台配置目录（列映射 + 值转换 + 识别特征）
// 约束: 进程启动后只读，按 id 查找，运行期不可修改
// ==========================================

use crate::domain::types::{CellValue, OrderStatus, PaymentStatus};
use crate::importer::value_transformer as vt;
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;
use tracing::warn;

// ==========================================
// 规范字段名
// ==========================================
pub mod fields {
    pub const ORDER_NUMBER: &str = "order_number";
    pub const ORDER_DATE: &str = "order_date";
    pub const CUSTOMER_EMAIL: &str = "customer_email";
    pub const CUSTOMER_NAME: &str = "customer_name";
    pub const SHIPPING_ADDRESS: &str = "shipping_address";
    pub const SHIPPING_ADDRESS_LINE2: &str = "shipping_address_line2";
    pub const SHIPPING_CITY: &str = "shipping_city";
    pub const SHIPPING_POSTAL_CODE: &str = "shipping_postal_code";
    pub const SHIPPING_COUNTRY: &str = "shipping_country";
    pub const SHIPPING_PHONE: &str = "shipping_phone";
    pub const STATUS: &str = "status";
    pub const PAYMENT_STATUS: &str = "payment_status";
    pub const SOURCE: &str = "source";
    pub const NOTES: &str = "notes";
    pub const PRODUCT_SKU: &str = "product_sku";
    pub const PRODUCT_NAME: &str = "product_name";
    pub const QUANTITY: &str = "quantity";
    pub const UNIT_PRICE: &str = "unit_price";
    pub const ITEMS: &str = "items";

    pub const ALL: [&str; 19] = [
        ORDER_NUMBER,
        ORDER_DATE,
        CUSTOMER_EMAIL,
        CUSTOMER_NAME,
        SHIPPING_ADDRESS,
        SHIPPING_ADDRESS_LINE2,
        SHIPPING_CITY,
        SHIPPING_POSTAL_CODE,
        SHIPPING_COUNTRY,
        SHIPPING_PHONE,
        STATUS,
        PAYMENT_STATUS,
        SOURCE,
        NOTES,
        PRODUCT_SKU,
        PRODUCT_NAME,
        QUANTITY,
        UNIT_PRICE,
        ITEMS,
    ];
}

// ==========================================
// ValueTransformers - 按规范字段的值转换函数
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct ValueTransformers {
    pub order_date: fn(&CellValue) -> Option<DateTime<Utc>>,
    pub unit_price: fn(&CellValue) -> f64,
    pub quantity: fn(&CellValue) -> u32,
    pub status: fn(&str) -> OrderStatus,
    pub payment_status: fn(&str) -> PaymentStatus,
}

impl ValueTransformers {
    /// 无平台上下文时使用的通用转换
    pub const GENERIC: ValueTransformers = ValueTransformers {
        order_date: vt::parse_date,
        unit_price: vt::parse_price,
        quantity: vt::parse_quantity,
        status: vt::normalize_generic_status,
        payment_status: vt::normalize_generic_payment,
    };
}

impl Default for ValueTransformers {
    fn default() -> Self {
        Self::GENERIC
    }
}

// ==========================================
// MarketplaceProfile - 平台配置
// ==========================================
#[derive(Debug)]
pub struct MarketplaceProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// 源列名（精确、大小写敏感）→ 规范字段
    pub header_mapping: &'static [(&'static str, &'static str)],
    pub value_transformers: ValueTransformers,
    /// 具有识别意义的列名
    pub identifying_headers: &'static [&'static str],
    /// 文件名匹配模式（正则，大小写不敏感），按顺序匹配
    pub file_name_patterns: &'static [&'static str],
}

pub static DISCOGS: MarketplaceProfile = MarketplaceProfile {
    id: "discogs",
    name: "Discogs",
    description: "Discogs Marketplace 订单导出 (Orders → Export)",
    header_mapping: &[
        ("order_num", fields::ORDER_NUMBER),
        ("order_date", fields::ORDER_DATE),
        ("status", fields::STATUS),
        ("buyer", fields::CUSTOMER_NAME),
        ("buyer_email", fields::CUSTOMER_EMAIL),
        ("shipping_address", fields::SHIPPING_ADDRESS),
        ("item_id", fields::PRODUCT_SKU),
        ("item_price", fields::UNIT_PRICE),
        ("description", fields::PRODUCT_NAME),
        ("comments", fields::NOTES),
    ],
    value_transformers: ValueTransformers {
        order_date: vt::parse_date,
        unit_price: vt::parse_price,
        quantity: vt::parse_quantity,
        status: vt::normalize_discogs_status,
        payment_status: vt::normalize_discogs_payment,
    },
    identifying_headers: &[
        "order_num",
        "release_id",
        "media_condition",
        "sleeve_condition",
        "buyer",
    ],
    file_name_patterns: &[r"discogs"],
};

pub static BANDCAMP: MarketplaceProfile = MarketplaceProfile {
    id: "bandcamp",
    name: "Bandcamp",
    description: "Bandcamp 销售报表 (Tools → Sales report)",
    header_mapping: &[
        ("bandcamp transaction id", fields::ORDER_NUMBER),
        ("date", fields::ORDER_DATE),
        ("buyer name", fields::CUSTOMER_NAME),
        ("buyer email", fields::CUSTOMER_EMAIL),
        ("buyer phone", fields::SHIPPING_PHONE),
        ("buyer note", fields::NOTES),
        ("ship to street", fields::SHIPPING_ADDRESS),
        ("ship to street 2", fields::SHIPPING_ADDRESS_LINE2),
        ("ship to city", fields::SHIPPING_CITY),
        ("ship to zip", fields::SHIPPING_POSTAL_CODE),
        ("ship to country", fields::SHIPPING_COUNTRY),
        ("sku", fields::PRODUCT_SKU),
        ("item name", fields::PRODUCT_NAME),
        ("quantity", fields::QUANTITY),
        ("item price", fields::UNIT_PRICE),
    ],
    value_transformers: ValueTransformers {
        order_date: vt::parse_date,
        unit_price: vt::parse_price,
        quantity: vt::parse_quantity,
        status: vt::normalize_bandcamp_status,
        payment_status: vt::normalize_bandcamp_payment,
    },
    identifying_headers: &[
        "bandcamp transaction id",
        "paypal transaction id",
        "item url",
        "ship to street",
        "catalog number",
    ],
    file_name_patterns: &[r"bandcamp"],
};

pub static EBAY: MarketplaceProfile = MarketplaceProfile {
    id: "ebay",
    name: "eBay",
    description: "eBay Seller Hub 订单报表",
    header_mapping: &[
        ("Order Number", fields::ORDER_NUMBER),
        ("Sale Date", fields::ORDER_DATE),
        ("Buyer Name", fields::CUSTOMER_NAME),
        ("Buyer Email", fields::CUSTOMER_EMAIL),
        ("Buyer Address 1", fields::SHIPPING_ADDRESS),
        ("Buyer Address 2", fields::SHIPPING_ADDRESS_LINE2),
        ("Buyer City", fields::SHIPPING_CITY),
        ("Buyer Zip", fields::SHIPPING_POSTAL_CODE),
        ("Buyer Country", fields::SHIPPING_COUNTRY),
        ("Ship To Phone", fields::SHIPPING_PHONE),
        ("Order Status", fields::STATUS),
        ("Custom Label", fields::PRODUCT_SKU),
        ("Item Title", fields::PRODUCT_NAME),
        ("Quantity", fields::QUANTITY),
        ("Sold For", fields::UNIT_PRICE),
    ],
    value_transformers: ValueTransformers {
        order_date: vt::parse_ebay_date,
        unit_price: vt::parse_price_with_currency_code,
        quantity: vt::parse_quantity,
        status: vt::normalize_ebay_status,
        payment_status: vt::normalize_ebay_payment,
    },
    identifying_headers: &[
        "Sales Record Number",
        "Buyer Username",
        "Custom Label",
        "Sold For",
        "Paid On Date",
    ],
    file_name_patterns: &[r"ebay", r"^ordersreport"],
};

/// 注册顺序即识别优先顺序
pub static PROFILES: [&MarketplaceProfile; 3] = [&DISCOGS, &BANDCAMP, &EBAY];

// ==========================================
// MarketplaceRegistry - 平台注册表
// ==========================================
pub struct RegistryEntry {
    pub profile: &'static MarketplaceProfile,
    pub file_name_regexes: Vec<Regex>,
}

pub struct MarketplaceRegistry {
    entries: Vec<RegistryEntry>,
}

impl MarketplaceRegistry {
    fn new() -> Self {
        let entries = PROFILES
            .into_iter()
            .map(|profile| RegistryEntry {
                profile,
                file_name_regexes: compile_patterns(profile),
            })
            .collect();

        Self { entries }
    }

    /// 全局注册表（首次访问时编译文件名模式）
    pub fn global() -> &'static Self {
        static REGISTRY: OnceLock<MarketplaceRegistry> = OnceLock::new();
        REGISTRY.get_or_init(MarketplaceRegistry::new)
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn profiles(&self) -> impl Iterator<Item = &'static MarketplaceProfile> + '_ {
        self.entries.iter().map(|e| e.profile)
    }

    pub fn get(&self, id: &str) -> Option<&'static MarketplaceProfile> {
        self.profiles().find(|p| p.id == id)
    }
}

fn compile_patterns(profile: &MarketplaceProfile) -> Vec<Regex> {
    profile
        .file_name_patterns
        .iter()
        .filter_map(|pattern| {
            let mut builder = RegexBuilder::new(pattern);
            builder.case_insensitive(true);
            match builder.build() {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(marketplace = profile.id, pattern = %pattern, error = %e, "文件名模式编译失败");
                    None
                }
            }
        })
        .collect()
}
