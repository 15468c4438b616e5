// ==========================================
// 订单导入系统 - 平台识别器实现
// ==========================================
// 职责: 文件名 + 表头 → 平台配置
// 约束: 纯函数，无副作用，无持久状态
// ==========================================

use crate::importer::marketplace_profile::{MarketplaceProfile, MarketplaceRegistry};
use crate::importer::order_import_trait::MarketplaceDetector as MarketplaceDetectorTrait;
use tracing::debug;

/// 判定为表头命中所需的最少识别列数
const MIN_HEADER_MATCHES: usize = 2;

pub struct MarketplaceDetector {
    registry: &'static MarketplaceRegistry,
}

impl MarketplaceDetector {
    pub fn new() -> Self {
        Self {
            registry: MarketplaceRegistry::global(),
        }
    }

    /// 按文件名匹配
    fn match_file_name(&self, file_name: &str) -> Option<&'static MarketplaceProfile> {
        self.registry
            .entries()
            .iter()
            .find(|entry| entry.file_name_regexes.iter().any(|re| re.is_match(file_name)))
            .map(|entry| entry.profile)
    }

    /// 按识别列包含匹配计数
    fn match_header_set(&self, headers: &[String]) -> Option<&'static MarketplaceProfile> {
        let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

        self.registry.profiles().find(|profile| {
            let hits = profile
                .identifying_headers
                .iter()
                .filter(|ident| {
                    let ident = ident.to_lowercase();
                    lowered.iter().any(|h| h.contains(&ident))
                })
                .count();
            hits >= MIN_HEADER_MATCHES
        })
    }

    /// 任一识别列完全相等
    fn match_single_header(&self, headers: &[String]) -> Option<&'static MarketplaceProfile> {
        self.registry.profiles().find(|profile| {
            profile.identifying_headers.iter().any(|ident| {
                headers
                    .iter()
                    .any(|h| h.trim().eq_ignore_ascii_case(ident))
            })
        })
    }
}

impl Default for MarketplaceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketplaceDetectorTrait for MarketplaceDetector {
    fn detect(&self, file_name: &str, headers: &[String]) -> Option<&'static MarketplaceProfile> {
        if let Some(profile) = self.match_file_name(file_name) {
            debug!(marketplace = profile.id, file_name, "按文件名识别平台");
            return Some(profile);
        }

        if let Some(profile) = self.match_header_set(headers) {
            debug!(marketplace = profile.id, "按表头识别平台");
            return Some(profile);
        }

        if let Some(profile) = self.match_single_header(headers) {
            debug!(marketplace = profile.id, "按单个识别列识别平台");
            return Some(profile);
        }

        debug!(file_name, header_count = headers.len(), "未识别出平台");
        None
    }
}
