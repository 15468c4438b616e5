// ==========================================
// 订单导入系统 - API 层
// ==========================================
// 职责: 提供面向调用方（命令行 / 界面）的导入接口
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportApiResponse, ImportPreview};
