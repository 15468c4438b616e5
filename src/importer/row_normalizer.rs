// ==========================================
// 订单导入系统 - 行规范化器
// ==========================================
// 阶段 3: 原始行 → 规范化订单 + 订单行 + 警告
// 约束: 无 I/O，行级问题记为警告，不中断整批
// ==========================================
// 行号约定: 第 i 条数据行（0 起）报告为 i + 2（表头为第 1 行）
// ==========================================

use crate::domain::order::{
    CanonicalOrder, CanonicalOrderItem, ImportWarning, ParseResult, RawRow, WarningKind,
};
use crate::domain::types::CellValue;
use crate::importer::header_mapping::{default_mapping, HeaderMapping};
use crate::importer::marketplace_profile::{fields, MarketplaceProfile, ValueTransformers};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// 打包订单行: 条目分隔符
const PACKED_ITEM_SEPARATOR: char = ';';
/// 打包订单行: 字段分隔符 (sku:qty:price)
const PACKED_FIELD_SEPARATOR: char = ':';

pub struct RowNormalizer {
    /// 规范字段 → 源列名（按映射顺序）
    sources: HashMap<String, Vec<String>>,
    transformers: ValueTransformers,
    profile_id: Option<&'static str>,
}

impl RowNormalizer {
    /// 使用合并后的映射与识别出的平台构造
    pub fn new(mapping: &HeaderMapping, profile: Option<&'static MarketplaceProfile>) -> Self {
        let mut sources: HashMap<String, Vec<String>> = HashMap::new();
        for (source, target) in mapping {
            sources.entry(target.clone()).or_default().push(source.clone());
        }

        Self {
            sources,
            transformers: profile.map(|p| p.value_transformers).unwrap_or_default(),
            profile_id: profile.map(|p| p.id),
        }
    }

    /// 无平台上下文（仅通用映射 + 通用转换）
    pub fn generic() -> Self {
        Self::new(&default_mapping(), None)
    }

    /// 规范化全部行
    ///
    /// # 参数
    /// - rows: 原始行（空行已由读取层跳过）
    /// - existing_order_numbers: 目标库中已存在的订单号（仅用于提示）
    /// - existing_skus: 商品目录中的 SKU
    pub fn parse(
        &self,
        rows: &[RawRow],
        existing_order_numbers: &HashSet<String>,
        existing_skus: &HashSet<String>,
    ) -> ParseResult {
        let mut result = ParseResult::default();
        let mut seen_orders: HashSet<String> = HashSet::new();

        for (i, row) in rows.iter().enumerate() {
            let row_number = i + 2;

            // ===== 1. 必填字段 =====
            let (order_number, customer_email) = match (
                self.text(row, fields::ORDER_NUMBER),
                self.text(row, fields::CUSTOMER_EMAIL),
            ) {
                (Some(number), Some(email)) => (number, email),
                (number, _) => {
                    let missing = if number.is_none() {
                        fields::ORDER_NUMBER
                    } else {
                        fields::CUSTOMER_EMAIL
                    };
                    result.warnings.push(ImportWarning {
                        kind: WarningKind::MissingField,
                        message: format!("第 {} 行缺少必填字段 {}", row_number, missing),
                        row: Some(row_number),
                        order_number: number,
                        sku: None,
                    });
                    continue;
                }
            };

            // ===== 2. 订单日期 =====
            let date_cell = self.cell(row, fields::ORDER_DATE);
            let order_date = match date_cell.and_then(|c| (self.transformers.order_date)(c)) {
                Some(date) => date,
                None => {
                    let raw = date_cell.map(CellValue::as_text).unwrap_or_default();
                    result.warnings.push(ImportWarning {
                        kind: WarningKind::InvalidDate,
                        message: format!("第 {} 行订单日期无法解析: '{}'", row_number, raw),
                        row: Some(row_number),
                        order_number: Some(order_number),
                        sku: None,
                    });
                    continue;
                }
            };

            // ===== 3/4. 同批次首行建立订单 =====
            if seen_orders.insert(order_number.clone()) {
                if existing_order_numbers.contains(&order_number) {
                    result.warnings.push(ImportWarning {
                        kind: WarningKind::DuplicateOrder,
                        message: format!("订单 {} 已存在", order_number),
                        row: Some(row_number),
                        order_number: Some(order_number.clone()),
                        sku: None,
                    });
                }

                result.orders.push(self.build_order(
                    row,
                    order_number.clone(),
                    order_date,
                    customer_email,
                ));
            }

            // ===== 5/6. 订单行 =====
            for item in self.extract_items(row, &order_number) {
                if !existing_skus.contains(&item.sku) {
                    result.warnings.push(ImportWarning {
                        kind: WarningKind::UnknownSku,
                        message: format!("订单 {} 中的 SKU {} 不在商品目录中", order_number, item.sku),
                        row: Some(row_number),
                        order_number: Some(order_number.clone()),
                        sku: Some(item.sku.clone()),
                    });
                }
                result.items.push(item);
            }
        }

        debug!(
            marketplace = self.profile_id.unwrap_or("generic"),
            rows = rows.len(),
            orders = result.orders.len(),
            items = result.items.len(),
            warnings = result.warnings.len(),
            skipped_rows = result.warnings.iter().filter(|w| w.kind.skips_row()).count(),
            "行规范化完成"
        );

        result
    }

    /// 字段对应的首个非空单元格
    fn cell<'a>(&self, row: &'a RawRow, field: &str) -> Option<&'a CellValue> {
        self.sources
            .get(field)?
            .iter()
            .filter_map(|source| row.get(source))
            .find(|cell| !cell.is_empty())
    }

    fn text(&self, row: &RawRow, field: &str) -> Option<String> {
        self.cell(row, field).and_then(CellValue::non_empty_text)
    }

    fn build_order(
        &self,
        row: &RawRow,
        order_number: String,
        order_date: DateTime<Utc>,
        customer_email: String,
    ) -> CanonicalOrder {
        // 缺列时空串落到平台缺省状态
        let status =
            (self.transformers.status)(&self.text(row, fields::STATUS).unwrap_or_default());
        let payment_status = (self.transformers.payment_status)(
            &self.text(row, fields::PAYMENT_STATUS).unwrap_or_default(),
        );

        CanonicalOrder {
            order_number,
            order_date,
            customer_email,
            customer_name: self.text(row, fields::CUSTOMER_NAME),
            shipping_address: self.text(row, fields::SHIPPING_ADDRESS),
            shipping_address_line2: self.text(row, fields::SHIPPING_ADDRESS_LINE2),
            shipping_city: self.text(row, fields::SHIPPING_CITY),
            shipping_postal_code: self.text(row, fields::SHIPPING_POSTAL_CODE),
            shipping_country: self.text(row, fields::SHIPPING_COUNTRY),
            shipping_phone: self.text(row, fields::SHIPPING_PHONE),
            status,
            payment_status,
            source: self
                .text(row, fields::SOURCE)
                .or_else(|| self.profile_id.map(str::to_string)),
            notes: self.text(row, fields::NOTES),
        }
    }

    /// 平铺布局与打包布局可在同一行同时出现
    fn extract_items(&self, row: &RawRow, order_number: &str) -> Vec<CanonicalOrderItem> {
        let mut items = Vec::new();

        if let Some(sku) = self.text(row, fields::PRODUCT_SKU) {
            let quantity = (self.transformers.quantity)(
                self.cell(row, fields::QUANTITY).unwrap_or(&CellValue::Empty),
            );
            let unit_price = self
                .cell(row, fields::UNIT_PRICE)
                .map(|c| (self.transformers.unit_price)(c))
                .unwrap_or(0.0);

            items.push(CanonicalOrderItem {
                order_number: order_number.to_string(),
                sku,
                quantity,
                unit_price,
                product_name: self.text(row, fields::PRODUCT_NAME),
            });
        }

        if let Some(packed) = self.text(row, fields::ITEMS) {
            items.extend(
                packed
                    .split(PACKED_ITEM_SEPARATOR)
                    .filter_map(|entry| self.parse_packed_entry(entry, order_number)),
            );
        }

        items
    }

    fn parse_packed_entry(&self, entry: &str, order_number: &str) -> Option<CanonicalOrderItem> {
        let mut parts = entry.split(PACKED_FIELD_SEPARATOR).map(str::trim);
        let sku = parts.next().filter(|s| !s.is_empty())?;
        let quantity = (self.transformers.quantity)(&CellValue::from(parts.next().unwrap_or("")));
        let unit_price = (self.transformers.unit_price)(&CellValue::from(parts.next().unwrap_or("")));

        Some(CanonicalOrderItem {
            order_number: order_number.to_string(),
            sku: sku.to_string(),
            quantity,
            unit_price,
            product_name: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{OrderStatus, PaymentStatus};
    use crate::importer::header_mapping::{HeaderMappingResolver, HeaderOverrides};
    use crate::importer::marketplace_profile::{DISCOGS, EBAY};
    use crate::importer::order_import_trait::HeaderMappingResolver as _;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), CellValue::from(*v)))
            .collect()
    }

    fn set(values: &[&str]) -> HashSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_row_scenario() {
        let rows = vec![row(&[
            ("order_number", "A1"),
            ("customer_email", "x@y.com"),
            ("order_date", "2024-01-05"),
            ("product_sku", "SKU1"),
            ("quantity", "2"),
            ("unit_price", "9.99"),
        ])];

        let result = RowNormalizer::generic().parse(&rows, &set(&[]), &set(&["SKU1"]));

        assert_eq!(result.orders.len(), 1);
        assert_eq!(result.orders[0].order_number, "A1");
        assert_eq!(result.orders[0].status, OrderStatus::Delivered);
        assert_eq!(result.orders[0].payment_status, PaymentStatus::Paid);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].sku, "SKU1");
        assert_eq!(result.items[0].quantity, 2);
        assert!((result.items[0].unit_price - 9.99).abs() < 1e-9);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_email_skips_row() {
        let rows = vec![row(&[
            ("order_number", "A1"),
            ("order_date", "2024-01-05"),
            ("product_sku", "SKU1"),
        ])];

        let result = RowNormalizer::generic().parse(&rows, &set(&[]), &set(&["SKU1"]));

        assert!(result.orders.is_empty());
        assert!(result.items.is_empty());
        let warnings: Vec<_> = result.warnings_of(WarningKind::MissingField).collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].row, Some(2));
    }

    #[test]
    fn test_invalid_date_skips_row() {
        let rows = vec![row(&[
            ("order_number", "A1"),
            ("customer_email", "x@y.com"),
            ("order_date", "not a date"),
            ("product_sku", "SKU1"),
        ])];

        let result = RowNormalizer::generic().parse(&rows, &set(&[]), &set(&["SKU1"]));

        assert!(result.orders.is_empty());
        assert!(result.items.is_empty());
        assert_eq!(result.warnings_of(WarningKind::InvalidDate).count(), 1);
    }

    #[test]
    fn test_same_order_number_merges_items() {
        let rows = vec![
            row(&[
                ("order_number", "A1"),
                ("customer_email", "x@y.com"),
                ("order_date", "2024-01-05"),
                ("product_sku", "SKU1"),
                ("notes", "first"),
            ]),
            row(&[
                ("order_number", "A1"),
                ("customer_email", "other@y.com"),
                ("order_date", "2024-02-01"),
                ("product_sku", "SKU2"),
                ("notes", "second"),
            ]),
        ];

        let result = RowNormalizer::generic().parse(&rows, &set(&[]), &set(&["SKU1", "SKU2"]));

        assert_eq!(result.orders.len(), 1);
        assert_eq!(result.orders[0].customer_email, "x@y.com");
        assert_eq!(result.orders[0].notes.as_deref(), Some("first"));
        let skus: Vec<_> = result.items.iter().map(|i| i.sku.as_str()).collect();
        assert_eq!(skus, vec!["SKU1", "SKU2"]);
    }

    #[test]
    fn test_duplicate_order_is_informational_and_once() {
        let rows = vec![
            row(&[
                ("order_number", "A1"),
                ("customer_email", "x@y.com"),
                ("order_date", "2024-01-05"),
                ("product_sku", "SKU1"),
            ]),
            row(&[
                ("order_number", "A1"),
                ("customer_email", "x@y.com"),
                ("order_date", "2024-01-05"),
                ("product_sku", "SKU2"),
            ]),
        ];

        let result = RowNormalizer::generic().parse(&rows, &set(&["A1"]), &set(&["SKU1", "SKU2"]));

        assert_eq!(result.orders.len(), 1);
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.warnings_of(WarningKind::DuplicateOrder).count(), 1);
    }

    #[test]
    fn test_unknown_sku_kept_with_warning() {
        let rows = vec![row(&[
            ("order_number", "A1"),
            ("customer_email", "x@y.com"),
            ("order_date", "2024-01-05"),
            ("product_sku", "NOPE"),
            ("unit_price", "5"),
        ])];

        let result = RowNormalizer::generic().parse(&rows, &set(&[]), &set(&["SKU1"]));

        assert_eq!(result.items.len(), 1);
        let warnings: Vec<_> = result.warnings_of(WarningKind::UnknownSku).collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].sku.as_deref(), Some("NOPE"));
    }

    #[test]
    fn test_packed_and_flat_items_on_same_row() {
        let rows = vec![row(&[
            ("order_number", "A1"),
            ("customer_email", "x@y.com"),
            ("order_date", "2024-01-05"),
            ("product_sku", "SKU1"),
            ("items", "SKU2:3:4.50; SKU3:1:10 ;;"),
        ])];

        let result =
            RowNormalizer::generic().parse(&rows, &set(&[]), &set(&["SKU1", "SKU2", "SKU3"]));

        let items: Vec<_> = result
            .items
            .iter()
            .map(|i| (i.sku.as_str(), i.quantity))
            .collect();
        assert_eq!(items, vec![("SKU1", 1), ("SKU2", 3), ("SKU3", 1)]);
        assert!((result.items[1].unit_price - 4.5).abs() < 1e-9);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_bad_quantity_and_price_use_defaults() {
        let rows = vec![row(&[
            ("order_number", "A1"),
            ("customer_email", "x@y.com"),
            ("order_date", "2024-01-05"),
            ("product_sku", "SKU1"),
            ("quantity", "abc"),
            ("unit_price", "n/a"),
        ])];

        let result = RowNormalizer::generic().parse(&rows, &set(&[]), &set(&["SKU1"]));
        assert_eq!(result.items[0].quantity, 1);
        assert_eq!(result.items[0].unit_price, 0.0);
    }

    #[test]
    fn test_discogs_profile_mapping_and_source() {
        let mapping = HeaderMappingResolver.resolve(
            &default_mapping(),
            Some(&DISCOGS),
            &HeaderOverrides::new(),
        );
        let normalizer = RowNormalizer::new(&mapping, Some(&DISCOGS));
        let rows = vec![row(&[
            ("order_num", "1234-5"),
            ("buyer_email", "buyer@example.com"),
            ("buyer", "Jane Doe"),
            ("order_date", "05/01/2024"),
            ("item_id", "LP-001"),
            ("item_price", "€1.234,56"),
        ])];

        let result = normalizer.parse(&rows, &set(&[]), &set(&["LP-001"]));

        assert_eq!(result.orders.len(), 1);
        let order = &result.orders[0];
        assert_eq!(order.customer_name.as_deref(), Some("Jane Doe"));
        assert_eq!(order.source.as_deref(), Some("discogs"));
        assert_eq!(order.order_date.format("%Y-%m-%d").to_string(), "2024-01-05");
        assert!((result.items[0].unit_price - 1234.56).abs() < 1e-9);
    }

    #[test]
    fn test_missing_status_uses_marketplace_default() {
        let mapping =
            HeaderMappingResolver.resolve(&default_mapping(), Some(&EBAY), &HeaderOverrides::new());
        let normalizer = RowNormalizer::new(&mapping, Some(&EBAY));
        let rows = vec![row(&[
            ("Order Number", "12-1"),
            ("Buyer Email", "a@b.com"),
            ("Sale Date", "Jan-05-24"),
        ])];

        let result = normalizer.parse(&rows, &set(&[]), &set(&[]));
        assert_eq!(result.orders[0].status, OrderStatus::Processing);
        assert_eq!(result.orders[0].payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_numeric_order_number_from_excel() {
        let mut r = row(&[("customer_email", "x@y.com"), ("product_sku", "SKU1")]);
        r.insert("order_number".to_string(), CellValue::Number(1001.0));
        r.insert("order_date".to_string(), CellValue::Number(45296.0));

        let result = RowNormalizer::generic().parse(&[r], &set(&[]), &set(&["SKU1"]));
        assert_eq!(result.orders[0].order_number, "1001");
        assert_eq!(
            result.orders[0].order_date.format("%Y-%m-%d").to_string(),
            "2024-01-05"
        );
    }
}
