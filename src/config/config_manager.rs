// ==========================================
// 订单导入系统 - 配置管理器
// ==========================================
// 职责: 导入配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::{configure_sqlite_connection, ensure_schema, open_sqlite_connection};
use crate::domain::order::ImportOptions;
use crate::importer::header_mapping::{HeaderMappingOverride, HeaderOverrides};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, Box<dyn Error>> {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };

        match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => {
                warn!(config_key = key, raw_value = %raw, "布尔配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    // ===== 列映射覆盖 =====

    /// 保存某个平台的用户自定义列映射（整体替换）
    pub fn set_header_overrides(
        &self,
        marketplace_id: &str,
        overrides: &[HeaderMappingOverride],
    ) -> Result<(), Box<dyn Error>> {
        let value = serde_json::to_string(overrides)?;
        self.set_global_config_value(&config_keys::header_mapping_key(marketplace_id), &value)
    }

    /// 读取全部平台的用户自定义列映射
    pub fn list_header_overrides(&self) -> Result<HeaderOverrides, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' AND key LIKE ?1 ORDER BY key",
        )?;
        let rows = stmt.query_map(params![format!("{}%", config_keys::HEADER_MAPPING_PREFIX)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut overrides = HeaderOverrides::new();
        for row in rows {
            let (key, value) = row?;
            let Some(marketplace_id) = key.strip_prefix(config_keys::HEADER_MAPPING_PREFIX) else {
                continue;
            };
            match serde_json::from_str::<Vec<HeaderMappingOverride>>(&value) {
                Ok(list) => {
                    overrides.insert(marketplace_id.to_string(), list);
                }
                Err(e) => {
                    warn!(config_key = %key, error = %e, "列映射配置格式错误，已忽略");
                }
            }
        }

        Ok(overrides)
    }

    // ===== 导入选项 =====

    /// 保存默认导入选项
    pub fn set_default_import_options(&self, options: ImportOptions) -> Result<(), Box<dyn Error>> {
        self.set_global_config_value(
            config_keys::IMPORT_SKIP_DUPLICATES,
            &options.skip_duplicates.to_string(),
        )?;
        self.set_global_config_value(
            config_keys::IMPORT_UPDATE_EXISTING,
            &options.update_existing.to_string(),
        )
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_header_overrides(
        &self,
        marketplace_id: &str,
    ) -> Result<Vec<HeaderMappingOverride>, Box<dyn Error>> {
        let key = config_keys::header_mapping_key(marketplace_id);
        let Some(raw) = self.get_config_value(&key)? else {
            return Ok(Vec::new());
        };

        let overrides = serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(config_key = %key, error = %e, "列映射配置格式错误，使用空配置");
            Vec::new()
        });
        Ok(overrides)
    }

    async fn get_default_import_options(&self) -> Result<ImportOptions, Box<dyn Error>> {
        Ok(ImportOptions {
            skip_duplicates: self.get_bool_or(config_keys::IMPORT_SKIP_DUPLICATES, false)?,
            update_existing: self.get_bool_or(config_keys::IMPORT_UPDATE_EXISTING, false)?,
        })
    }
}

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    /// 列映射覆盖前缀（header_mapping/{marketplace_id}，值为 JSON 数组）
    pub const HEADER_MAPPING_PREFIX: &str = "header_mapping/";

    // 导入选项
    pub const IMPORT_SKIP_DUPLICATES: &str = "import.skip_duplicates";
    pub const IMPORT_UPDATE_EXISTING: &str = "import.update_existing";

    pub fn header_mapping_key(marketplace_id: &str) -> String {
        format!("{}{}", HEADER_MAPPING_PREFIX, marketplace_id.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn manager() -> (NamedTempFile, ConfigManager) {
        let temp_file = NamedTempFile::new().unwrap();
        let manager = ConfigManager::new(temp_file.path().to_str().unwrap()).unwrap();
        (temp_file, manager)
    }

    #[tokio::test]
    async fn test_header_overrides_round_trip() {
        let (_temp, manager) = manager();
        let overrides = vec![HeaderMappingOverride::new("Ref", "order_number")];

        manager.set_header_overrides("discogs", &overrides).unwrap();

        assert_eq!(manager.get_header_overrides("discogs").await.unwrap(), overrides);
        assert!(manager.get_header_overrides("ebay").await.unwrap().is_empty());

        let all = manager.list_header_overrides().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("discogs"), Some(&overrides));
    }

    #[tokio::test]
    async fn test_malformed_overrides_ignored() {
        let (_temp, manager) = manager();
        manager
            .set_global_config_value(&config_keys::header_mapping_key("ebay"), "not json")
            .unwrap();

        assert!(manager.get_header_overrides("ebay").await.unwrap().is_empty());
        assert!(manager.list_header_overrides().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_import_options() {
        let (_temp, manager) = manager();
        assert_eq!(
            manager.get_default_import_options().await.unwrap(),
            ImportOptions::default()
        );

        manager
            .set_default_import_options(ImportOptions {
                skip_duplicates: true,
                update_existing: false,
            })
            .unwrap();
        let options = manager.get_default_import_options().await.unwrap();
        assert!(options.skip_duplicates);
        assert!(!options.update_existing);
    }
}
