//! Shared Strings Module
//!
//! 共有文字列テーブル（`xl/sharedStrings.xml`）をストリーミングで読み込みます。

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::XlsxToMdError;

/// 共有文字列テーブルを解析する
///
/// 各`si`について、直下の`t`、またはリッチテキストの`r/t`を連結した値を返します。
/// ふりがな（`rPh`）のテキストは含めません。
pub(crate) fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, XlsxToMdError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();

    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => phonetic_depth += 1,
                b"t" if phonetic_depth == 0 => in_text = true,
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"si" {
                    strings.push(String::new());
                }
            }
            Event::Text(e) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(std::str::from_utf8(&e)?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    log::debug!("loaded {} shared strings", strings.len());
    Ok(strings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_rich_text() {
        let xml = br#"<sst count="3" uniqueCount="3">
<si><t>Hello</t></si>
<si><r><rPr><b/></rPr><t>Bold</t></r><r><t xml:space="preserve"> text</t></r></si>
<si/>
<si><t>a &amp; b</t></si>
</sst>"#;
        let strings = parse_shared_strings(xml).unwrap();
        assert_eq!(strings, vec!["Hello", "Bold text", "", "a & b"]);
    }

    #[test]
    fn test_phonetic_runs_are_excluded() {
        let xml = r#"<sst><si><t>漢字</t><rPh sb="0" eb="2"><t>カンジ</t></rPh><phoneticPr fontId="1"/></si></sst>"#;
        let strings = parse_shared_strings(xml.as_bytes()).unwrap();
        assert_eq!(strings, vec!["漢字"]);
    }
}
