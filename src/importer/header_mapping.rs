// ==========================================
// 订单导入系统 - 列映射合并
// ==========================================
// 阶段 2: 通用映射 < 平台映射 < 用户覆盖
// 约束: 不校验目标字段合法性，未知目标字段由规范化器忽略
// ==========================================

use crate::importer::marketplace_profile::{fields, MarketplaceProfile};
use crate::importer::order_import_trait::HeaderMappingResolver as HeaderMappingResolverTrait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// 源列名 → 规范字段（有序，结果确定）
pub type HeaderMapping = BTreeMap<String, String>;

/// 用户覆盖（按平台 id）
pub type HeaderOverrides = HashMap<String, Vec<HeaderMappingOverride>>;

/// 用户自定义列映射（外部配置，导入流程只读）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMappingOverride {
    pub source_column: String,
    pub target_field: String,
}

impl HeaderMappingOverride {
    pub fn new(source_column: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            source_column: source_column.into(),
            target_field: target_field.into(),
        }
    }
}

/// 无平台上下文时可识别的通用列名
const GENERIC_ALIASES: &[(&str, &str)] = &[
    ("Order Number", fields::ORDER_NUMBER),
    ("Order ID", fields::ORDER_NUMBER),
    ("order_id", fields::ORDER_NUMBER),
    ("Order Date", fields::ORDER_DATE),
    ("Date", fields::ORDER_DATE),
    ("date", fields::ORDER_DATE),
    ("Email", fields::CUSTOMER_EMAIL),
    ("email", fields::CUSTOMER_EMAIL),
    ("Customer Email", fields::CUSTOMER_EMAIL),
    ("Customer Name", fields::CUSTOMER_NAME),
    ("Name", fields::CUSTOMER_NAME),
    ("Address", fields::SHIPPING_ADDRESS),
    ("City", fields::SHIPPING_CITY),
    ("Postal Code", fields::SHIPPING_POSTAL_CODE),
    ("Country", fields::SHIPPING_COUNTRY),
    ("Phone", fields::SHIPPING_PHONE),
    ("Status", fields::STATUS),
    ("Payment Status", fields::PAYMENT_STATUS),
    ("Notes", fields::NOTES),
    ("SKU", fields::PRODUCT_SKU),
    ("sku", fields::PRODUCT_SKU),
    ("Product Name", fields::PRODUCT_NAME),
    ("Qty", fields::QUANTITY),
    ("Quantity", fields::QUANTITY),
    ("Price", fields::UNIT_PRICE),
    ("Unit Price", fields::UNIT_PRICE),
    ("Items", fields::ITEMS),
];

/// 通用映射: 规范字段名本身 + 常见别名
pub fn default_mapping() -> HeaderMapping {
    fields::ALL
        .iter()
        .map(|field| (field.to_string(), field.to_string()))
        .chain(
            GENERIC_ALIASES
                .iter()
                .map(|(source, target)| (source.to_string(), target.to_string())),
        )
        .collect()
}

pub struct HeaderMappingResolver;

impl HeaderMappingResolverTrait for HeaderMappingResolver {
    fn resolve(
        &self,
        default_mapping: &HeaderMapping,
        profile: Option<&MarketplaceProfile>,
        custom_overrides: &HeaderOverrides,
    ) -> HeaderMapping {
        let mut mapping = default_mapping.clone();

        let Some(profile) = profile else {
            return mapping;
        };

        for (source, target) in profile.header_mapping {
            mapping.insert(source.to_string(), target.to_string());
        }

        let overrides = custom_overrides.get(profile.id).map(Vec::as_slice).unwrap_or(&[]);
        for o in overrides {
            mapping.insert(o.source_column.clone(), o.target_field.clone());
        }

        debug!(
            marketplace = profile.id,
            entries = mapping.len(),
            overrides = overrides.len(),
            "列映射合并完成"
        );
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::marketplace_profile::{DISCOGS, EBAY};

    #[test]
    fn test_default_mapping_contains_identity() {
        let mapping = default_mapping();
        for field in fields::ALL {
            assert_eq!(mapping.get(field).map(String::as_str), Some(field));
        }
        assert_eq!(
            mapping.get("Order Number").map(String::as_str),
            Some(fields::ORDER_NUMBER)
        );
    }

    #[test]
    fn test_no_profile_uses_default_only() {
        let mut overrides = HeaderOverrides::new();
        overrides.insert(
            "discogs".to_string(),
            vec![HeaderMappingOverride::new("x", fields::NOTES)],
        );

        let resolved = HeaderMappingResolver.resolve(&default_mapping(), None, &overrides);
        assert_eq!(resolved, default_mapping());
    }

    #[test]
    fn test_profile_overrides_default() {
        let resolved =
            HeaderMappingResolver.resolve(&default_mapping(), Some(&DISCOGS), &HeaderOverrides::new());
        assert_eq!(
            resolved.get("order_num").map(String::as_str),
            Some(fields::ORDER_NUMBER)
        );
        // Discogs 的 status 列仍映射为 status
        assert_eq!(resolved.get("status").map(String::as_str), Some(fields::STATUS));
    }

    #[test]
    fn test_user_override_wins() {
        let mut overrides = HeaderOverrides::new();
        overrides.insert(
            "ebay".to_string(),
            vec![
                HeaderMappingOverride::new("Sold For", fields::NOTES),
                HeaderMappingOverride::new("Total Price", fields::UNIT_PRICE),
                HeaderMappingOverride::new("Weird", "not_a_field"),
            ],
        );

        let resolved = HeaderMappingResolver.resolve(&default_mapping(), Some(&EBAY), &overrides);
        assert_eq!(resolved.get("Sold For").map(String::as_str), Some(fields::NOTES));
        assert_eq!(
            resolved.get("Total Price").map(String::as_str),
            Some(fields::UNIT_PRICE)
        );
        assert_eq!(resolved.get("Weird").map(String::as_str), Some("not_a_field"));
    }

    #[test]
    fn test_overrides_for_other_profile_ignored() {
        let mut overrides = HeaderOverrides::new();
        overrides.insert(
            "bandcamp".to_string(),
            vec![HeaderMappingOverride::new("order_num", fields::NOTES)],
        );

        let resolved = HeaderMappingResolver.resolve(&default_mapping(), Some(&DISCOGS), &overrides);
        assert_eq!(
            resolved.get("order_num").map(String::as_str),
            Some(fields::ORDER_NUMBER)
        );
    }

    #[test]
    fn test_override_serde_round_trip() {
        let json = r#"[{"source_column":"Ref","target_field":"order_number"}]"#;
        let parsed: Vec<HeaderMappingOverride> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, vec![HeaderMappingOverride::new("Ref", fields::ORDER_NUMBER)]);
    }
}
