// ==========================================
// 订单导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入流程所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::order::ImportOptions;
use crate::importer::header_mapping::HeaderMappingOverride;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入流程所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 列映射覆盖 =====

    /// 获取某个平台的用户自定义列映射
    ///
    /// # 参数
    /// - marketplace_id: 平台 id（如 "discogs"）
    ///
    /// # 返回
    /// - Vec<HeaderMappingOverride>: 未配置时为空
    async fn get_header_overrides(
        &self,
        marketplace_id: &str,
    ) -> Result<Vec<HeaderMappingOverride>, Box<dyn Error>>;

    // ===== 导入选项 =====

    /// 获取默认导入选项（调用方未指定时使用）
    ///
    /// # 默认值
    /// - skip_duplicates = false
    /// - update_existing = false
    async fn get_default_import_options(&self) -> Result<ImportOptions, Box<dyn Error>>;
}
