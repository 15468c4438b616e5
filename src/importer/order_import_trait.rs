// ==========================================
// 订单导入系统 - 导入管道 Trait
// ==========================================
// 职责: 定义导入管道各阶段接口（不包含实现）
// ==========================================

use crate::domain::order::RawSheet;
use crate::importer::error::ImporterResult;
use crate::importer::header_mapping::{HeaderMapping, HeaderOverrides};
use crate::importer::marketplace_profile::MarketplaceProfile;
use std::path::Path;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（阶段 0）
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件为表头 + 原始行记录
    ///
    /// # 参数
    /// - file_path: 文件路径
    ///
    /// # 返回
    /// - Ok(RawSheet): 文件名、表头、行记录（空行已跳过）
    /// - Err: 文件不存在、格式不支持、解析失败
    fn parse_sheet(&self, file_path: &Path) -> ImporterResult<RawSheet>;
}

// ==========================================
// MarketplaceDetector Trait
// ==========================================
// 用途: 平台识别接口（阶段 1）
// 实现者: MarketplaceDetectorImpl
pub trait MarketplaceDetector: Send + Sync {
    /// 根据文件名和表头识别来源平台
    ///
    /// # 优先级
    /// 1. 文件名模式匹配（注册顺序，首个命中）
    /// 2. 识别列包含匹配 >= 2 个
    /// 3. 任一识别列完全相等（大小写不敏感）
    ///
    /// # 返回
    /// - Some(profile): 识别成功
    /// - None: 无法识别，调用方只使用通用映射
    fn detect(&self, file_name: &str, headers: &[String]) -> Option<&'static MarketplaceProfile>;
}

// ==========================================
// HeaderMappingResolver Trait
// ==========================================
// 用途: 列映射合并接口（阶段 2）
// 实现者: HeaderMappingResolverImpl
pub trait HeaderMappingResolver: Send + Sync {
    /// 合并映射: 通用映射 < 平台映射 < 用户覆盖
    ///
    /// # 参数
    /// - default_mapping: 通用映射
    /// - profile: 识别出的平台（None 时仅用通用映射）
    /// - custom_overrides: 按平台 id 存储的用户覆盖
    fn resolve(
        &self,
        default_mapping: &HeaderMapping,
        profile: Option<&MarketplaceProfile>,
        custom_overrides: &HeaderOverrides,
    ) -> HeaderMapping;
}
