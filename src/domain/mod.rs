// ==========================================
// 订单导入系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod order;
pub mod types;

// 重导出核心类型
pub use order::{
    CanonicalOrder, CanonicalOrderItem, CustomerRecord, ImportOptions, ImportResult,
    ImportWarning, NewCustomer, OrderDisposition, OrderItemRecord, OrderRecord, OrderWrite,
    ParseResult, ProductRecord, RawRow, RawSheet, WarningKind,
};
pub use types::{CellValue, OrderStatus, PaymentStatus};
