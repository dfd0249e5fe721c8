//! NumberFormat Module
//!
//! Excel Number Format Stringを分類し、セルの生の値に表示書式を適用します。
//!
//! 書式文字列の完全な文法は扱いません。先頭セクションのトークンから
//! 「General / テキスト / 日付時刻 / パーセント / 数値」のいずれかに分類し、
//! 分類ごとの規則で表示文字列を生成します。

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use super::sections::{split_sections, FormatSection};
use super::tokens::FormatToken;
use crate::api::DateFormat;

/// Excelが表現できる最大のシリアル値（9999-12-31）
const MAX_SERIAL: f64 = 2_958_465.0;

/// 書式の分類
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FormatKind {
    /// "General"、または解釈できない書式（指数、分数など）
    General,
    /// テキスト書式（"@"）
    Text,
    /// 日付・時刻書式
    DateTime {
        has_date: bool,
        has_time: bool,
        elapsed: bool,
    },
    /// パーセント書式
    Percent(DigitLayout),
    /// 一般の数値書式
    Number(DigitLayout),
}

/// 数値書式の桁構成
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct DigitLayout {
    /// 整数部の"0"の数（ゼロ埋め桁数）
    pub int_zeros: usize,
    /// 小数部の"0"の数（最小小数桁）
    pub min_decimals: usize,
    /// 小数部のプレースホルダー数（最大小数桁）
    pub max_decimals: usize,
    /// 千の位区切りを使うか
    pub grouping: bool,
    /// 末尾の","による1000分の1スケーリング回数
    pub scale_thousands: usize,
}

/// 解析済みの表示書式
#[derive(Debug, Clone)]
pub(crate) struct NumberFormat {
    kind: FormatKind,
}

/// 日付変換のコンテキスト
#[derive(Debug, Clone, Copy)]
pub(crate) struct DateContext<'a> {
    /// 1904年エポックを使用するか
    pub date1904: bool,
    /// 日付のみの値に使う出力形式
    pub date_format: &'a DateFormat,
}

impl NumberFormat {
    /// 書式文字列を分類する
    pub fn parse(format_code: &str) -> Self {
        let trimmed = format_code.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("general") {
            return Self {
                kind: FormatKind::General,
            };
        }

        let sections = split_sections(trimmed);
        // 負数・ゼロ・テキストのセクションは表示に使わない
        let first = FormatSection::parse(sections.first().map(String::as_str).unwrap_or(""));

        Self {
            kind: classify(&first),
        }
    }

    /// 分類結果
    #[cfg(test)]
    pub fn kind(&self) -> &FormatKind {
        &self.kind
    }

    /// 生の値（`<v>`のテキスト）に表示書式を適用する
    ///
    /// 数値として解釈できない値は、そのまま返します。
    pub fn apply(&self, raw: &str, ctx: DateContext<'_>) -> String {
        let value = match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => return raw.to_string(),
        };

        match &self.kind {
            FormatKind::General | FormatKind::Text => normalize_general(raw, value),
            FormatKind::DateTime {
                has_date,
                has_time,
                elapsed,
            } => format_serial(value, *has_date, *has_time, *elapsed, ctx)
                .unwrap_or_else(|| raw.to_string()),
            FormatKind::Percent(layout) => {
                let mut out = format_fixed(value * 100.0, layout);
                out.push('%');
                out
            }
            FormatKind::Number(layout) => format_fixed(value, layout),
        }
    }
}

fn classify(section: &FormatSection) -> FormatKind {
    let tokens = &section.tokens;

    if section.has_date() || section.has_time() {
        return FormatKind::DateTime {
            has_date: section.has_date(),
            has_time: section.has_time(),
            elapsed: tokens.iter().any(|t| matches!(t, FormatToken::Elapsed(_))),
        };
    }

    if tokens
        .iter()
        .any(|t| matches!(t, FormatToken::Exponent | FormatToken::Fraction | FormatToken::General))
    {
        return FormatKind::General;
    }

    let has_digits = tokens.iter().any(FormatToken::is_digit);
    if !has_digits {
        if tokens.contains(&FormatToken::TextPlaceholder) {
            return FormatKind::Text;
        }
        return FormatKind::General;
    }

    let layout = digit_layout(tokens);
    if tokens.contains(&FormatToken::Percent) {
        FormatKind::Percent(layout)
    } else {
        FormatKind::Number(layout)
    }
}

fn digit_layout(tokens: &[FormatToken]) -> DigitLayout {
    let mut layout = DigitLayout::default();
    let decimal_pos = tokens.iter().position(|t| *t == FormatToken::DecimalPoint);
    let last_digit = tokens.iter().rposition(FormatToken::is_digit);

    for (i, token) in tokens.iter().enumerate() {
        let in_fraction = decimal_pos.is_some_and(|d| i > d);
        match token {
            FormatToken::Zero if in_fraction => {
                layout.min_decimals += 1;
                layout.max_decimals += 1;
            }
            FormatToken::Hash | FormatToken::Question if in_fraction => {
                layout.max_decimals += 1;
            }
            FormatToken::Zero => layout.int_zeros += 1,
            FormatToken::ThousandSeparator => {
                let followed_by_digit = tokens[i + 1..]
                    .iter()
                    .take_while(|t| **t != FormatToken::DecimalPoint)
                    .any(FormatToken::is_digit);
                if !in_fraction && followed_by_digit {
                    layout.grouping = true;
                } else if last_digit.is_some_and(|last| i > last) {
                    layout.scale_thousands += 1;
                }
            }
            _ => {}
        }
    }
    layout
}

/// General書式: 整数値の浮動小数は整数表記に、それ以外は生の文字列のまま
fn normalize_general(raw: &str, value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        raw.to_string()
    }
}

/// 固定小数点で整形する（小数桁、ゼロ埋め、千の位区切り）
fn format_fixed(value: f64, layout: &DigitLayout) -> String {
    let mut value = value;
    for _ in 0..layout.scale_thousands {
        value /= 1000.0;
    }

    let mut text = format!("{:.*}", layout.max_decimals, value.abs());
    if layout.max_decimals > layout.min_decimals {
        if let Some(dot) = text.find('.') {
            let min_len = dot + 1 + layout.min_decimals;
            while text.len() > min_len && text.ends_with('0') {
                text.pop();
            }
            if text.ends_with('.') {
                text.pop();
            }
        }
    }

    let (int_part, frac_part) = match text.find('.') {
        Some(dot) => (text[..dot].to_string(), Some(text[dot + 1..].to_string())),
        None => (text.clone(), None),
    };

    let mut int_part = int_part;
    while int_part.len() < layout.int_zeros {
        int_part.insert(0, '0');
    }
    if layout.grouping {
        int_part = add_thousand_separators(&int_part);
    }

    let is_zero = text.chars().all(|c| c == '0' || c == '.');
    let mut out = String::new();
    if value < 0.0 && !is_zero {
        out.push('-');
    }
    out.push_str(&int_part);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(&frac);
    }
    out
}

/// 千の位区切りを挿入
fn add_thousand_separators(digits: &str) -> String {
    let len = digits.len();
    let mut result = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result
}

/// Excelシリアル値を日付・時刻文字列に変換する
///
/// - 1900年システム: 1899-12-30起算で、うるう年バグ分の1日を加算する
/// - 1904年システム: 1904-01-01起算
fn format_serial(
    value: f64,
    has_date: bool,
    has_time: bool,
    elapsed: bool,
    ctx: DateContext<'_>,
) -> Option<String> {
    if !(0.0..=MAX_SERIAL).contains(&value) {
        return None;
    }

    let total_seconds = (value * 86400.0).round() as i64;

    if elapsed && !has_date {
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        return Some(format!("{}:{:02}:{:02}", hours, minutes, seconds));
    }

    let days = total_seconds.div_euclid(86400);
    let seconds_of_day = total_seconds.rem_euclid(86400) as u32;

    let (epoch, offset) = if ctx.date1904 {
        (NaiveDate::from_ymd_opt(1904, 1, 1)?, 0)
    } else {
        (NaiveDate::from_ymd_opt(1899, 12, 30)?, 1)
    };
    let date = epoch.checked_add_signed(Duration::days(days + offset))?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds_of_day, 0)?;
    let datetime = NaiveDateTime::new(date, time);

    let text = match (has_date, has_time) {
        (true, false) => match ctx.date_format {
            DateFormat::Iso8601 => datetime.format("%Y-%m-%d").to_string(),
            DateFormat::Custom(pattern) => datetime.format(pattern).to_string(),
        },
        (false, _) => datetime.format("%H:%M:%S").to_string(),
        (true, true) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    static ISO: DateFormat = DateFormat::Iso8601;

    fn ctx() -> DateContext<'static> {
        DateContext {
            date1904: false,
            date_format: &ISO,
        }
    }

    fn apply(code: &str, raw: &str) -> String {
        NumberFormat::parse(code).apply(raw, ctx())
    }

    #[test]
    fn test_general_normalizes_integers() {
        assert_eq!(apply("General", "3.0"), "3");
        assert_eq!(apply("General", "42"), "42");
        assert_eq!(apply("General", "1E3"), "1000");
        assert_eq!(apply("General", "0.1"), "0.1");
        assert_eq!(apply("General", "abc"), "abc");
        assert_eq!(apply("", "7.0"), "7");
    }

    #[test]
    fn test_unrecognized_formats_fall_back_to_general() {
        assert_eq!(*NumberFormat::parse("0.00E+00").kind(), FormatKind::General);
        assert_eq!(*NumberFormat::parse("# ?/?").kind(), FormatKind::General);
        assert_eq!(apply("0.00E+00", "1200"), "1200");
        assert_eq!(apply("@", "5.0"), "5");
    }

    #[test]
    fn test_date_serial() {
        assert_eq!(apply("yyyy-mm-dd", "44200"), "2021-01-05");
        assert_eq!(apply("mm-dd-yy", "44200"), "2021-01-05");
        assert_eq!(apply("[$-411]ge.m.d", "44200"), "2021-01-05");
        assert!(matches!(
            NumberFormat::parse("yyyy\"年\"m\"月\"d\"日\"").kind(),
            FormatKind::DateTime { has_date: true, .. }
        ));
    }

    #[test]
    fn test_time_and_datetime() {
        assert_eq!(apply("h:mm:ss", "0.5"), "12:00:00");
        assert_eq!(apply("h:mm AM/PM", "0.75"), "18:00:00");
        assert_eq!(apply("m/d/yy h:mm", "44200.25"), "2021-01-05 06:00:00");
        assert_eq!(apply("[h]:mm:ss", "1.5"), "36:00:00");
    }

    #[test]
    fn test_date_passthrough_for_invalid_serials() {
        assert_eq!(apply("yyyy-mm-dd", "-1"), "-1");
        assert_eq!(apply("yyyy-mm-dd", "n/a"), "n/a");
        assert_eq!(apply("yyyy-mm-dd", "99999999"), "99999999");
    }

    #[test]
    fn test_date1904_and_custom_format() {
        let custom = DateFormat::Custom("%Y/%m/%d".to_string());
        let fmt = NumberFormat::parse("yyyy-mm-dd");
        let out = fmt.apply(
            "0",
            DateContext {
                date1904: true,
                date_format: &custom,
            },
        );
        assert_eq!(out, "1904/01/01");
    }

    #[test]
    fn test_percent() {
        assert_eq!(apply("0%", "0.5"), "50%");
        assert_eq!(apply("0.00%", "0.1234"), "12.34%");
        assert_eq!(apply("0.0%", "-0.05"), "-5.0%");
    }

    #[test]
    fn test_numeric_layouts() {
        assert_eq!(apply("0", "3.6"), "4");
        assert_eq!(apply("0.00", "3.14159"), "3.14");
        assert_eq!(apply("#,##0", "1234567"), "1,234,567");
        assert_eq!(apply("#,##0.00", "1234.5"), "1,234.50");
        assert_eq!(apply("#,##0.00", "-1234.5"), "-1,234.50");
        assert_eq!(apply("000", "7"), "007");
        assert_eq!(apply("0.0#", "2.5"), "2.5");
        assert_eq!(apply("0.0#", "2.567"), "2.57");
        assert_eq!(apply("#,##0,", "1234567"), "1,235");
        assert_eq!(apply("0.00", "-0.001"), "0.00");
    }

    #[test]
    fn test_currency_builtin_uses_digit_structure() {
        assert_eq!(apply("$#,##0.00_);($#,##0.00)", "1234.5"), "1,234.50");
        assert_eq!(apply("_(* #,##0_);_(* (#,##0);_(* \"-\"_);_(@_)", "1000"), "1,000");
    }

    #[test]
    fn test_add_thousand_separators() {
        assert_eq!(add_thousand_separators("1"), "1");
        assert_eq!(add_thousand_separators("1000"), "1,000");
        assert_eq!(add_thousand_separators("123456"), "123,456");
    }
}
