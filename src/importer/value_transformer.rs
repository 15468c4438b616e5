// ==========================================
// 订单导入系统 - 值转换函数库
// ==========================================
// 职责: 价格/数量/日期/订单状态/支付状态 标准化
// 约束: 全部为全函数，不返回错误，失败时给出缺省值
// ==========================================

use crate::domain::types::{CellValue, OrderStatus, PaymentStatus};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

/// 需剥离的货币符号
const CURRENCY_SYMBOLS: [char; 5] = ['€', '$', '£', '¥', '₹'];

/// Excel 1900 纪元序列号与 Unix 纪元之间的天数差（已含 1900 伪闰年修正）
pub const EXCEL_EPOCH_OFFSET_DAYS: f64 = 25569.0;

const SECONDS_PER_DAY: f64 = 86400.0;

/// 序列号换算出的年份必须大于此值，否则视为格式残留
const MIN_PLAUSIBLE_YEAR: i32 = 1990;

// ==========================================
// 价格
// ==========================================

/// 解析价格，失败返回 0.0，负数按 0.0 处理
pub fn parse_price(value: &CellValue) -> f64 {
    let parsed = match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => parse_price_text(s),
        _ => None,
    };

    match parsed {
        Some(p) if p.is_finite() && p > 0.0 => p,
        _ => 0.0,
    }
}

fn parse_price_text(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
        .collect();

    let commas = cleaned.matches(',').count();
    let dots = cleaned.matches('.').count();

    // 同时出现逗号和点时，后出现者为小数点
    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) if commas > 1 => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        (None, Some(_)) if dots > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    normalized.parse::<f64>().ok()
}

/// 解析带 ISO 货币代码的价格（如 "EUR 12,50" / "US $9.99"）
pub fn parse_price_with_currency_code(value: &CellValue) -> f64 {
    match value {
        CellValue::Text(s) => {
            let stripped: String = s.chars().filter(|c| !c.is_alphabetic()).collect();
            parse_price(&CellValue::Text(stripped))
        }
        other => parse_price(other),
    }
}

// ==========================================
// 数量
// ==========================================

/// 解析数量，失败或 <= 0 返回 1
pub fn parse_quantity(value: &CellValue) -> u32 {
    let parsed = match value {
        CellValue::Number(n) if n.is_finite() => Some(n.trunc() as i64),
        CellValue::Text(s) => parse_quantity_text(s.trim()),
        _ => None,
    };

    match parsed {
        Some(q) if q >= 1 => u32::try_from(q).unwrap_or(u32::MAX),
        _ => 1,
    }
}

fn parse_quantity_text(text: &str) -> Option<i64> {
    if let Ok(q) = text.parse::<i64>() {
        return Some(q);
    }
    if let Some(f) = text.parse::<f64>().ok().filter(|f| f.is_finite()) {
        return Some(f.trunc() as i64);
    }

    // 取前导数字（"2 pcs" → 2）
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().ok()
}

// ==========================================
// 日期
// ==========================================

/// 解析订单日期
///
/// # 尝试顺序
/// 1. ISO-8601（完整时间戳或 YYYY-MM-DD 前缀）
/// 2. DD/MM/YYYY
/// 3. YYYYMMDD（紧凑格式）
/// 4. Excel 序列号（数字或数字字符串）
pub fn parse_date(value: &CellValue) -> Option<DateTime<Utc>> {
    match value {
        CellValue::Number(n) => excel_serial_to_datetime(*n),
        CellValue::Text(s) => parse_date_text(s.trim()),
        _ => None,
    }
}

fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }

    if let Some(dt) = parse_iso_date(text).or_else(|| parse_day_month_year(text)) {
        return Some(dt);
    }

    // 8 位数字只按 YYYYMMDD 解析，不再当作序列号
    if is_compact_date_shape(text) {
        return parse_compact_date(text);
    }

    text.parse::<f64>()
        .ok()
        .and_then(excel_serial_to_datetime)
}

fn parse_iso_date(text: &str) -> Option<DateTime<Utc>> {
    let prefix = text.get(..10)?;
    let date = NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()?;

    // 带偏移的时间保留原始日历日期与时刻
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local().and_utc());
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}

fn parse_day_month_year(text: &str) -> Option<DateTime<Utc>> {
    let token = text.split_whitespace().next()?;
    let parts: Vec<&str> = token.split('/').collect();
    if parts.len() != 3 || parts[2].len() != 4 {
        return None;
    }

    let day = parts[0].parse::<u32>().ok()?;
    let month = parts[1].parse::<u32>().ok()?;
    let year = parts[2].parse::<i32>().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}

fn is_compact_date_shape(text: &str) -> bool {
    text.len() == 8 && text.chars().all(|c| c.is_ascii_digit())
}

fn parse_compact_date(text: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(text, "%Y%m%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}

/// Excel 序列号 → UTC 时间（小数部分保留为当日时间）
pub fn excel_serial_to_datetime(serial: f64) -> Option<DateTime<Utc>> {
    if !serial.is_finite() {
        return None;
    }

    let seconds = ((serial - EXCEL_EPOCH_OFFSET_DAYS) * SECONDS_PER_DAY).round() as i64;
    let dt = DateTime::<Utc>::from_timestamp(seconds, 0)?;

    if dt.year() > MIN_PLAUSIBLE_YEAR {
        Some(dt)
    } else {
        None
    }
}

/// eBay 报表日期（"Jan-05-24" 等），标准格式优先
pub fn parse_ebay_date(value: &CellValue) -> Option<DateTime<Utc>> {
    if let Some(dt) = parse_date(value) {
        return Some(dt);
    }

    let text = value.as_text();
    let token = text.split_whitespace().next().unwrap_or_default();
    ["%b-%d-%y", "%b-%d-%Y", "%d-%b-%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(token, format).ok())
        .or_else(|| NaiveDate::parse_from_str(&text, "%d %b %Y").ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ==========================================
// 状态词表
// ==========================================

/// 大小写不敏感的词表查找（完全相等或包含），未命中返回 default
pub fn lookup_status<T: Copy>(value: &str, table: &[(&str, T)], default: T) -> T {
    let lower = value.trim().to_lowercase();
    if lower.is_empty() {
        return default;
    }

    table
        .iter()
        .find(|(key, _)| lower == *key || lower.contains(key))
        .map(|(_, status)| *status)
        .unwrap_or(default)
}

const GENERIC_STATUS_TABLE: &[(&str, OrderStatus)] = &[
    ("pending", OrderStatus::Pending),
    ("processing", OrderStatus::Processing),
    ("confirmed", OrderStatus::Confirmed),
    ("shipped", OrderStatus::Shipped),
    ("delivered", OrderStatus::Delivered),
    ("completed", OrderStatus::Delivered),
    ("cancelled", OrderStatus::Cancelled),
    ("canceled", OrderStatus::Cancelled),
    ("refunded", OrderStatus::Refunded),
];

const GENERIC_PAYMENT_TABLE: &[(&str, PaymentStatus)] = &[
    ("refunded", PaymentStatus::Refunded),
    ("pending", PaymentStatus::Pending),
    ("unpaid", PaymentStatus::Pending),
    ("paid", PaymentStatus::Paid),
];

// Discogs 订单状态原文: "New Order" / "Invoice Sent" / "Payment Received" / "Cancelled (Non-Paying Buyer)" ...
const DISCOGS_STATUS_TABLE: &[(&str, OrderStatus)] = &[
    ("cancel", OrderStatus::Cancelled),
    ("refund", OrderStatus::Refunded),
    ("shipped", OrderStatus::Shipped),
    ("payment received", OrderStatus::Confirmed),
    ("in progress", OrderStatus::Processing),
    ("payment pending", OrderStatus::Pending),
    ("invoice sent", OrderStatus::Pending),
    ("new order", OrderStatus::Pending),
    ("buyer contacted", OrderStatus::Pending),
];

const DISCOGS_PAYMENT_TABLE: &[(&str, PaymentStatus)] = &[
    ("refund", PaymentStatus::Refunded),
    ("payment pending", PaymentStatus::Pending),
    ("invoice sent", PaymentStatus::Pending),
    ("new order", PaymentStatus::Pending),
    ("buyer contacted", PaymentStatus::Pending),
];

// "unshipped" 必须先于 "shipped"
const BANDCAMP_STATUS_TABLE: &[(&str, OrderStatus)] = &[
    ("refund", OrderStatus::Refunded),
    ("cancel", OrderStatus::Cancelled),
    ("unshipped", OrderStatus::Confirmed),
    ("shipped", OrderStatus::Shipped),
    ("pending", OrderStatus::Pending),
];

const BANDCAMP_PAYMENT_TABLE: &[(&str, PaymentStatus)] = &[
    ("refund", PaymentStatus::Refunded),
    ("pending", PaymentStatus::Pending),
];

const EBAY_STATUS_TABLE: &[(&str, OrderStatus)] = &[
    ("cancel", OrderStatus::Cancelled),
    ("refund", OrderStatus::Refunded),
    ("return", OrderStatus::Refunded),
    ("awaiting payment", OrderStatus::Pending),
    ("awaiting shipment", OrderStatus::Processing),
    ("shipped", OrderStatus::Shipped),
    ("delivered", OrderStatus::Delivered),
    ("completed", OrderStatus::Delivered),
];

const EBAY_PAYMENT_TABLE: &[(&str, PaymentStatus)] = &[
    ("refund", PaymentStatus::Refunded),
    ("awaiting payment", PaymentStatus::Pending),
    ("unpaid", PaymentStatus::Pending),
];

pub fn normalize_generic_status(value: &str) -> OrderStatus {
    lookup_status(value, GENERIC_STATUS_TABLE, OrderStatus::Delivered)
}

pub fn normalize_generic_payment(value: &str) -> PaymentStatus {
    lookup_status(value, GENERIC_PAYMENT_TABLE, PaymentStatus::Paid)
}

pub fn normalize_discogs_status(value: &str) -> OrderStatus {
    lookup_status(value, DISCOGS_STATUS_TABLE, OrderStatus::Delivered)
}

pub fn normalize_discogs_payment(value: &str) -> PaymentStatus {
    lookup_status(value, DISCOGS_PAYMENT_TABLE, PaymentStatus::Paid)
}

pub fn normalize_bandcamp_status(value: &str) -> OrderStatus {
    lookup_status(value, BANDCAMP_STATUS_TABLE, OrderStatus::Confirmed)
}

pub fn normalize_bandcamp_payment(value: &str) -> PaymentStatus {
    lookup_status(value, BANDCAMP_PAYMENT_TABLE, PaymentStatus::Paid)
}

pub fn normalize_ebay_status(value: &str) -> OrderStatus {
    lookup_status(value, EBAY_STATUS_TABLE, OrderStatus::Processing)
}

pub fn normalize_ebay_payment(value: &str) -> PaymentStatus {
    lookup_status(value, EBAY_PAYMENT_TABLE, PaymentStatus::Paid)
}
