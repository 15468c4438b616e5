// ==========================================
// 订单导入API
// ==========================================
// 职责: 串联 读取 → 平台识别 → 列映射合并 → 行规范化 → 对账导入
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{config_keys, ConfigManager, ImportConfigReader};
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::order::{ImportOptions, ImportResult, ImportWarning, ParseResult};
use crate::importer::{
    default_mapping, HeaderMappingOverride, HeaderMappingResolver,
    HeaderMappingResolverImpl, HeaderOverrides, ImportError, MarketplaceDetector, MarketplaceDetectorImpl,
    MarketplaceProfile, MarketplaceRegistry, OrderImporter, RowNormalizer, UniversalFileParser,
};
use crate::repository::{OrderStore, SqliteOrderStore};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;

/// 预览结果（只解析，不写库）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPreview {
    /// 文件名
    pub file_name: String,
    /// 识别出的平台 id（未识别为 None）
    pub marketplace: Option<String>,
    /// 表头
    pub headers: Vec<String>,
    /// 非空数据行数
    pub total_rows: usize,
    /// 规范化结果
    pub parse: ParseResult,
}

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    /// 本次导入 id
    pub run_id: String,
    pub file_name: String,
    pub marketplace: Option<String>,
    pub total_rows: usize,
    /// 规范化得到的订单/订单行数量
    pub parsed_orders: usize,
    pub parsed_items: usize,
    /// 规范化阶段的警告
    pub warnings: Vec<ImportWarning>,
    /// 对账导入结果
    pub result: ImportResult,
    /// 导入耗时（毫秒）
    pub elapsed_ms: i64,
}

/// 订单导入API
pub struct ImportApi {
    store: Arc<SqliteOrderStore>,
    config: Arc<ConfigManager>,
    parser: UniversalFileParser,
    detector: MarketplaceDetectorImpl,
}

impl ImportApi {
    /// 打开数据库（不存在则建表），订单存储与配置共用一个连接
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        ensure_schema(&conn).map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        let conn = Arc::new(Mutex::new(conn));

        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;

        Ok(Self {
            store: Arc::new(SqliteOrderStore::from_connection(conn)),
            config: Arc::new(config),
            parser: UniversalFileParser,
            detector: MarketplaceDetectorImpl::new(),
        })
    }

    pub fn store(&self) -> Arc<SqliteOrderStore> {
        self.store.clone()
    }

    pub fn config(&self) -> Arc<ConfigManager> {
        self.config.clone()
    }

    /// 解析并规范化单个文件（不写库）
    #[instrument(skip(self, file_path), fields(file = %file_path.as_ref().display()))]
    pub async fn preview_file<P: AsRef<Path>>(&self, file_path: P) -> ApiResult<ImportPreview> {
        let sheet = self.parser.parse(file_path.as_ref())?;
        let profile = self.detector.detect(&sheet.file_name, &sheet.headers);
        info!(
            marketplace = profile.map(|p| p.id).unwrap_or("generic"),
            rows = sheet.rows.len(),
            "文件解析完成"
        );

        let overrides = self.load_overrides(profile).await?;
        let mapping = HeaderMappingResolverImpl.resolve(&default_mapping(), profile, &overrides);

        let existing_orders: HashSet<String> =
            self.store.list_order_numbers().await?.into_keys().collect();
        let existing_skus: HashSet<String> =
            self.store.list_products_by_sku().await?.into_keys().collect();

        let parse = RowNormalizer::new(&mapping, profile).parse(
            &sheet.rows,
            &existing_orders,
            &existing_skus,
        );

        info!(
            orders = parse.orders.len(),
            items = parse.items.len(),
            warnings = parse.warnings.len(),
            "规范化完成"
        );

        Ok(ImportPreview {
            file_name: sheet.file_name,
            marketplace: profile.map(|p| p.id.to_string()),
            headers: sheet.headers,
            total_rows: sheet.rows.len(),
            parse,
        })
    }

    /// 并发预览多个文件，结果与输入顺序一致
    pub async fn preview_files(&self, file_paths: &[String]) -> Vec<ApiResult<ImportPreview>> {
        join_all(file_paths.iter().map(|path| self.preview_file(path))).await
    }

    /// 导入单个文件
    ///
    /// # 参数
    /// - file_path: 文件路径（.csv / .xlsx / .xls）
    /// - options: 导入选项（None 时读取配置中的默认值）
    #[instrument(skip(self, file_path, options), fields(run_id))]
    pub async fn import_file<P: AsRef<Path>>(
        &self,
        file_path: P,
        options: Option<ImportOptions>,
    ) -> ApiResult<ImportApiResponse> {
        let start_time = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        let preview = self.preview_file(file_path).await?;

        let options = match options {
            Some(options) => options,
            None => self
                .config
                .get_default_import_options()
                .await
                .map_err(|e| ImportError::ConfigReadError {
                    key: format!(
                        "{}, {}",
                        config_keys::IMPORT_SKIP_DUPLICATES,
                        config_keys::IMPORT_UPDATE_EXISTING
                    ),
                    message: e.to_string(),
                })?,
        };

        let importer = OrderImporter::new(self.store.clone());
        let result = importer
            .import_with_run_id(&run_id, &preview.parse.orders, &preview.parse.items, options)
            .await?;

        let elapsed_ms = start_time.elapsed().as_millis() as i64;
        info!(elapsed_ms, "文件导入完成");

        Ok(ImportApiResponse {
            run_id,
            file_name: preview.file_name,
            marketplace: preview.marketplace,
            total_rows: preview.total_rows,
            parsed_orders: preview.parse.orders.len(),
            parsed_items: preview.parse.items.len(),
            warnings: preview.parse.warnings,
            result,
            elapsed_ms,
        })
    }

    /// 保存某个平台的自定义列映射
    pub fn save_header_overrides(
        &self,
        marketplace_id: &str,
        overrides: &[HeaderMappingOverride],
    ) -> ApiResult<()> {
        if MarketplaceRegistry::global().get(marketplace_id).is_none() {
            return Err(ApiError::InvalidInput(format!(
                "未知平台: {}",
                marketplace_id
            )));
        }

        self.config
            .set_header_overrides(marketplace_id, overrides)
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    async fn load_overrides(
        &self,
        profile: Option<&MarketplaceProfile>,
    ) -> ApiResult<HeaderOverrides> {
        let mut overrides = HeaderOverrides::new();
        if let Some(profile) = profile {
            let list = self
                .config
                .get_header_overrides(profile.id)
                .await
                .map_err(|e| ImportError::ConfigReadError {
                    key: config_keys::header_mapping_key(profile.id),
                    message: e.to_string(),
                })?;
            if !list.is_empty() {
                overrides.insert(profile.id.to_string(), list);
            }
        }
        Ok(overrides)
    }
}
