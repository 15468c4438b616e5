// ==========================================
// 订单导入系统 - 核心库
// ==========================================
// 职责: 第三方平台（Discogs / Bandcamp / eBay）订单导出文件的
//       识别、规范化与对账导入
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 识别 / 映射 / 规范化 / 对账
pub mod importer;

// 配置层 - 列映射覆盖与导入选项
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 调用方接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CellValue, OrderStatus, PaymentStatus};

// 领域实体
pub use domain::{
    CanonicalOrder, CanonicalOrderItem, ImportOptions, ImportResult, ImportWarning, ParseResult,
    RawRow, RawSheet, WarningKind,
};

// 导入管道
pub use importer::{
    MarketplaceDetectorImpl, MarketplaceProfile, MarketplaceRegistry, OrderImporter,
    RowNormalizer,
};

// 存储
pub use repository::{OrderStore, SqliteOrderStore};

// API
pub use api::{ImportApi, ImportApiResponse, ImportPreview};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "订单导入系统";
