//! FormatToken Module
//!
//! Excel Number Format Stringのトークン定義を提供します。

/// フォーマットトークン
///
/// Excel Number Format Stringを解析した際に生成されるトークンです。
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FormatToken {
    /// 年（例: "yyyy" -> 4桁, "yy" -> 2桁）
    Year(usize),

    /// 月（例: "mm" -> 2桁, "m" -> 1桁）
    Month(usize),

    /// 日（例: "dd" -> 2桁, "d" -> 1桁）
    Day(usize),

    /// 時（例: "hh" -> 2桁, "h" -> 1桁）
    Hour(usize),

    /// 分（"h"の後、または"s"の前にある"m"）
    Minute(usize),

    /// 秒（例: "ss" -> 2桁, "s" -> 1桁）
    Second(usize),

    /// 経過時間（"[h]", "[mm]", "[ss]"）
    Elapsed(char),

    /// 午前/午後（"AM/PM", "A/P"）
    AmPm,

    /// 桁プレースホルダー "0"
    Zero,

    /// 桁プレースホルダー "#"
    Hash,

    /// 桁プレースホルダー "?"
    Question,

    /// 小数点
    DecimalPoint,

    /// 千の位区切り
    ThousandSeparator,

    /// パーセント記号
    Percent,

    /// 指数表記（"E+", "E-"）
    Exponent,

    /// 分数の区切り "/"
    Fraction,

    /// リテラル文字列（引用符、バックスラッシュ、その他の記号）
    Literal(String),

    /// ブラケット指定（色、ロケール、条件）
    Bracket(String),

    /// テキストプレースホルダー（"@"）
    TextPlaceholder,

    /// "General"キーワード
    General,
}

impl FormatToken {
    /// 日付クラスのトークンか（年・月・日）
    pub fn is_date_class(&self) -> bool {
        matches!(
            self,
            FormatToken::Year(_) | FormatToken::Month(_) | FormatToken::Day(_)
        )
    }

    /// 時刻クラスのトークンか（時・分・秒・経過時間・午前/午後）
    pub fn is_time_class(&self) -> bool {
        matches!(
            self,
            FormatToken::Hour(_)
                | FormatToken::Minute(_)
                | FormatToken::Second(_)
                | FormatToken::Elapsed(_)
                | FormatToken::AmPm
        )
    }

    /// トークンが日付・時刻関連かどうかを判定
    pub fn is_datetime(&self) -> bool {
        self.is_date_class() || self.is_time_class()
    }

    /// 桁プレースホルダーか
    pub fn is_digit(&self) -> bool {
        matches!(
            self,
            FormatToken::Zero | FormatToken::Hash | FormatToken::Question
        )
    }
}
