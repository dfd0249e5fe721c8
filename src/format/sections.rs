//! FormatSection Module
//!
//! Excel Number Format Stringのセクション分割とトークン化を提供します。

use super::tokens::FormatToken;

/// フォーマットの1セクション
#[derive(Debug, Clone)]
pub(crate) struct FormatSection {
    /// フォーマットトークン
    pub tokens: Vec<FormatToken>,
}

impl FormatSection {
    /// セクション文字列をトークン化する
    pub fn parse(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];
            match ch {
                '"' => {
                    let mut literal = String::new();
                    i += 1;
                    while i < chars.len() && chars[i] != '"' {
                        literal.push(chars[i]);
                        i += 1;
                    }
                    tokens.push(FormatToken::Literal(literal));
                }
                '\\' => {
                    if let Some(&next) = chars.get(i + 1) {
                        tokens.push(FormatToken::Literal(next.to_string()));
                        i += 1;
                    }
                }
                // パディング指定（"_)" や "* "）は次の1文字ごと読み飛ばす
                '_' | '*' => {
                    i += 1;
                }
                '[' => {
                    let mut content = String::new();
                    i += 1;
                    while i < chars.len() && chars[i] != ']' {
                        content.push(chars[i]);
                        i += 1;
                    }
                    let lower = content.to_ascii_lowercase();
                    let elapsed = lower
                        .chars()
                        .next()
                        .filter(|c| matches!(c, 'h' | 'm' | 's'))
                        .filter(|c| lower.chars().all(|x| x == *c));
                    match elapsed {
                        Some(unit) => tokens.push(FormatToken::Elapsed(unit)),
                        None => tokens.push(FormatToken::Bracket(content)),
                    }
                }
                'y' | 'Y' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' | 'm' | 'M' => {
                    let lower = ch.to_ascii_lowercase();
                    let mut count = 1;
                    while chars
                        .get(i + 1)
                        .is_some_and(|c| c.to_ascii_lowercase() == lower)
                    {
                        count += 1;
                        i += 1;
                    }
                    tokens.push(match lower {
                        'y' => FormatToken::Year(count),
                        'd' => FormatToken::Day(count),
                        'h' => FormatToken::Hour(count),
                        's' => FormatToken::Second(count),
                        _ => FormatToken::Month(count),
                    });
                }
                'e' | 'E' if matches!(chars.get(i + 1), Some('+') | Some('-')) => {
                    tokens.push(FormatToken::Exponent);
                    i += 1;
                }
                'a' | 'A' if starts_with_ignore_case(&chars[i..], "am/pm") => {
                    tokens.push(FormatToken::AmPm);
                    i += 4;
                }
                'a' | 'A' if starts_with_ignore_case(&chars[i..], "a/p") => {
                    tokens.push(FormatToken::AmPm);
                    i += 2;
                }
                'g' | 'G' if starts_with_ignore_case(&chars[i..], "general") => {
                    tokens.push(FormatToken::General);
                    i += 6;
                }
                '0' => tokens.push(FormatToken::Zero),
                '#' => tokens.push(FormatToken::Hash),
                '?' => tokens.push(FormatToken::Question),
                '.' => tokens.push(FormatToken::DecimalPoint),
                ',' => tokens.push(FormatToken::ThousandSeparator),
                '%' => tokens.push(FormatToken::Percent),
                '/' => tokens.push(FormatToken::Fraction),
                '@' => tokens.push(FormatToken::TextPlaceholder),
                other => tokens.push(FormatToken::Literal(other.to_string())),
            }
            i += 1;
        }

        resolve_minutes(&mut tokens);
        Self { tokens }
    }

    /// セクションに日付クラスのトークンが含まれるか
    pub fn has_date(&self) -> bool {
        self.tokens.iter().any(FormatToken::is_date_class)
    }

    /// セクションに時刻クラスのトークンが含まれるか
    pub fn has_time(&self) -> bool {
        self.tokens.iter().any(FormatToken::is_time_class)
    }
}

/// Excel Number Format Stringを`;`でセクションに分割する
///
/// 引用符とブラケットの内側にある`;`は区切りとして扱いません。
pub(crate) fn split_sections(format_string: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in format_string.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if !in_quotes => {
                escaped = true;
                current.push(ch);
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '[' if !in_quotes => {
                in_brackets = true;
                current.push(ch);
            }
            ']' if !in_quotes => {
                in_brackets = false;
                current.push(ch);
            }
            ';' if !in_brackets && !in_quotes => {
                sections.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    sections.push(current);
    sections
}

/// "m"を分と月に振り分ける
///
/// 直前の日付時刻トークンが時、または直後の日付時刻トークンが秒であれば分。
fn resolve_minutes(tokens: &mut [FormatToken]) {
    let positions: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_datetime())
        .map(|(i, _)| i)
        .collect();

    for (k, &pos) in positions.iter().enumerate() {
        let FormatToken::Month(count) = tokens[pos] else {
            continue;
        };
        let after_hour = k > 0
            && matches!(
                tokens[positions[k - 1]],
                FormatToken::Hour(_) | FormatToken::Elapsed('h')
            );
        let before_second = positions.get(k + 1).is_some_and(|&next| {
            matches!(
                tokens[next],
                FormatToken::Second(_) | FormatToken::Elapsed('s')
            )
        });
        if after_hour || before_second {
            tokens[pos] = FormatToken::Minute(count);
        }
    }
}

fn starts_with_ignore_case(chars: &[char], pattern: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    chars.len() >= pattern.len()
        && chars
            .iter()
            .zip(pattern.iter())
            .all(|(a, b)| a.to_ascii_lowercase() == *b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<FormatToken> {
        FormatSection::parse(text).tokens
    }

    #[test]
    fn test_split_sections() {
        assert_eq!(split_sections("0;-0;\"zero\""), vec!["0", "-0", "\"zero\""]);
        assert_eq!(split_sections("\"a;b\"0"), vec!["\"a;b\"0"]);
        assert_eq!(split_sections("General"), vec!["General"]);
    }

    #[test]
    fn test_date_tokens() {
        let t = tokens("yyyy-mm-dd");
        assert_eq!(t[0], FormatToken::Year(4));
        assert_eq!(t[2], FormatToken::Month(2));
        assert_eq!(t[4], FormatToken::Day(2));
    }

    #[test]
    fn test_minute_disambiguation() {
        let t = tokens("h:mm");
        assert_eq!(t[2], FormatToken::Minute(2));

        let t = tokens("mm:ss");
        assert_eq!(t[0], FormatToken::Minute(2));

        let t = tokens("m/d/yy h:mm");
        assert_eq!(t[0], FormatToken::Month(1));
        assert!(t.contains(&FormatToken::Minute(2)));
    }

    #[test]
    fn test_quoted_literals_are_not_tokens() {
        let section = FormatSection::parse("0\"days\"");
        assert!(!section.has_date());
        assert!(!section.has_time());

        let section = FormatSection::parse("yyyy\"年\"m\"月\"");
        assert!(section.has_date());
    }

    #[test]
    fn test_brackets() {
        let t = tokens("[Red][$-411]0");
        assert_eq!(t[0], FormatToken::Bracket("Red".to_string()));
        assert_eq!(t[1], FormatToken::Bracket("$-411".to_string()));

        let section = FormatSection::parse("[h]:mm:ss");
        assert_eq!(section.tokens[0], FormatToken::Elapsed('h'));
        assert!(section.has_time());
        assert!(!section.has_date());
    }

    #[test]
    fn test_ampm_and_general() {
        assert!(tokens("h:mm AM/PM").contains(&FormatToken::AmPm));
        assert!(tokens("h a/p").contains(&FormatToken::AmPm));
        assert_eq!(tokens("General"), vec![FormatToken::General]);
    }

    #[test]
    fn test_exponent_and_padding() {
        assert!(tokens("0.00E+00").contains(&FormatToken::Exponent));
        let t = tokens("_(#,##0_)");
        assert!(!t.iter().any(|x| matches!(x, FormatToken::Literal(s) if s == "(")));
    }
}
