// ==========================================
// 订单导入系统 - 导入层
// ==========================================
// 职责: 第三方平台订单导出文件 → 规范化订单 → 对账写入
// 流程: 读取 → 平台识别 → 列映射合并 → 行规范化 → 对账导入
// 支持: Excel, CSV
// ==========================================

// 模块声明
pub mod error;
pub mod file_parser;
pub mod header_mapping;
pub mod marketplace_detector;
pub mod marketplace_profile;
pub mod order_import_trait;
pub mod order_importer;
pub mod row_normalizer;
pub mod value_transformer;

// 重导出核心类型
pub use error::{ImportError, ImporterResult};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use header_mapping::{
    default_mapping, HeaderMapping, HeaderMappingOverride,
    HeaderMappingResolver as HeaderMappingResolverImpl, HeaderOverrides,
};
pub use marketplace_detector::MarketplaceDetector as MarketplaceDetectorImpl;
pub use marketplace_profile::{
    fields, MarketplaceProfile, MarketplaceRegistry, ValueTransformers, BANDCAMP, DISCOGS, EBAY,
    PROFILES,
};
pub use order_importer::{OrderImporter, ReconcileContext};
pub use row_normalizer::RowNormalizer;

// 重导出 Trait 接口
pub use order_import_trait::{FileParser, HeaderMappingResolver, MarketplaceDetector};
