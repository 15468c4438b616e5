// ==========================================
// 订单导入系统 - 命令行入口
// ==========================================
// 用法:
//   order-import <file> [db_path] [--skip-duplicates] [--update-existing] [--dry-run]
//
// 说明:
// - db_path 缺省时使用 ORDER_IMPORT_DB_PATH 或用户数据目录
// - 未指定 --skip-duplicates / --update-existing 时读取配置中的默认导入选项
// - --dry-run 只解析和规范化，不写库
// - 结果以 JSON 输出到 stdout，日志输出到 stderr
// ==========================================

use anyhow::{bail, Context};
use marketplace_order_import::db::default_db_path;
use marketplace_order_import::{logging, ImportApi, ImportOptions, APP_NAME, VERSION};

const USAGE: &str =
    "用法: order-import <file> [db_path] [--skip-duplicates] [--update-existing] [--dry-run]";

#[derive(Debug, Default)]
struct CliArgs {
    file: String,
    db_path: Option<String>,
    skip_duplicates: bool,
    update_existing: bool,
    dry_run: bool,
}

impl CliArgs {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Self> {
        let mut parsed = CliArgs::default();
        let mut positional = Vec::new();

        for arg in args {
            match arg.as_str() {
                "--skip-duplicates" => parsed.skip_duplicates = true,
                "--update-existing" => parsed.update_existing = true,
                "--dry-run" => parsed.dry_run = true,
                flag if flag.starts_with("--") => bail!("未知参数: {}\n{}", flag, USAGE),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        parsed.file = positional.next().context(USAGE)?;
        parsed.db_path = positional.next();
        if let Some(extra) = positional.next() {
            bail!("多余参数: {}\n{}", extra, USAGE);
        }

        Ok(parsed)
    }

    /// 两个开关都未给出时交给配置决定
    fn options(&self) -> Option<ImportOptions> {
        (self.skip_duplicates || self.update_existing).then_some(ImportOptions {
            skip_duplicates: self.skip_duplicates,
            update_existing: self.update_existing,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args = CliArgs::parse(std::env::args().skip(1))?;
    let db_path = args.db_path.clone().unwrap_or_else(default_db_path);

    tracing::info!(version = VERSION, db_path = %db_path, "{} 启动", APP_NAME);

    let api = ImportApi::new(&db_path).context("初始化导入接口失败")?;

    let output = if args.dry_run {
        let preview = api.preview_file(&args.file).await?;
        serde_json::to_string_pretty(&preview)?
    } else {
        let response = api.import_file(&args.file, args.options()).await?;
        serde_json::to_string_pretty(&response)?
    };

    println!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_flags_and_positionals() {
        let parsed = CliArgs::parse(args(&["orders.csv", "db.sqlite", "--skip-duplicates"])).unwrap();
        assert_eq!(parsed.file, "orders.csv");
        assert_eq!(parsed.db_path.as_deref(), Some("db.sqlite"));
        assert_eq!(
            parsed.options(),
            Some(ImportOptions {
                skip_duplicates: true,
                update_existing: false,
            })
        );
    }

    #[test]
    fn test_no_flags_defers_to_config() {
        let parsed = CliArgs::parse(args(&["orders.csv"])).unwrap();
        assert!(parsed.options().is_none());
        assert!(!parsed.dry_run);
    }

    #[test]
    fn test_missing_file_and_unknown_flag() {
        assert!(CliArgs::parse(args(&[])).is_err());
        assert!(CliArgs::parse(args(&["a.csv", "--force"])).is_err());
        assert!(CliArgs::parse(args(&["a.csv", "db", "extra"])).is_err());
    }
}
