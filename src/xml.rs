//! XML Tree Module
//!
//! quick-xmlのイベントストリームから、タグ・属性・テキスト・子要素を持つ
//! 汎用のツリー（`XmlNode`）を構築するモジュール。
//!
//! スタイルパーツのそのままの出力、描画パーツの解析、未対応要素の生XML記録に使用します。
//! ワークシートのように大きなパーツはストリーミングで読み、必要な部分木だけを
//! `read_element`でツリー化します。

use std::collections::BTreeMap;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::XlsxToMdError;

/// XML要素のタグ付きツリー表現
///
/// 属性は出現順に保持します。シリアライズ時は
/// `{"tag", "attrs"(キー順), "text"?, "children"?}`の形になります。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlNode {
    /// 名前空間接頭辞を除いたローカル名（例: `twoCellAnchor`）
    pub tag: String,
    /// 接頭辞付きの要素名（例: `xdr:twoCellAnchor`）
    pub name: String,
    /// 属性（接頭辞付きキー, 値）
    pub attrs: Vec<(String, String)>,
    /// 直下のテキスト
    pub text: Option<String>,
    /// 子要素
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// バイト列全体を解析し、ルート要素を返す
    pub fn parse(xml: &[u8]) -> Result<XmlNode, XlsxToMdError> {
        let mut reader = Reader::from_reader(xml);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let start = e.into_owned();
                    buf.clear();
                    return read_element(&mut reader, &start, &mut buf);
                }
                Event::Empty(e) => return XmlNode::from_start(&e),
                Event::Eof => {
                    return Err(XlsxToMdError::Xml("document has no root element".to_string()))
                }
                _ => {}
            }
            buf.clear();
        }
    }

    /// 開始タグから子要素を持たないノードを生成する
    ///
    /// `xmlns`宣言は属性に含めません。
    pub fn from_start(e: &BytesStart) -> Result<XmlNode, XlsxToMdError> {
        let name = std::str::from_utf8(e.name().as_ref())?.to_string();
        let tag = std::str::from_utf8(e.local_name().as_ref())?.to_string();

        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr =
                attr.map_err(|e| XlsxToMdError::Xml(format!("XML attribute error: {}", e)))?;
            let key = std::str::from_utf8(attr.key.as_ref())?;
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }
            let value = attr.unescape_value()?.into_owned();
            attrs.push((key.to_string(), value));
        }

        Ok(XmlNode {
            tag,
            name,
            attrs,
            text: None,
            children: Vec::new(),
        })
    }

    /// ローカル名で属性値を取得する（`r:id`は`id`でも`r:id`でも引ける）
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .or_else(|| self.attrs.iter().find(|(k, _)| local_part(k) == key))
            .map(|(_, v)| v.as_str())
    }

    /// 属性値を数値として取得する（解析できない値は`None`）
    pub fn attr_parse<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.attr(key).and_then(|v| v.trim().parse().ok())
    }

    /// OOXMLの真偽値属性（`1`/`true`）を判定する
    pub fn attr_flag(&self, key: &str) -> bool {
        matches!(self.attr(key), Some("1") | Some("true"))
    }

    /// 指定ローカル名の最初の子要素
    pub fn child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// 指定ローカル名の子要素すべて
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// 深さ優先で最初に見つかった子孫要素（自身は含まない）
    pub fn find(&self, tag: &str) -> Option<&XmlNode> {
        for child in &self.children {
            if child.tag == tag {
                return Some(child);
            }
            if let Some(found) = child.find(tag) {
                return Some(found);
            }
        }
        None
    }

    /// 子孫要素を文書順で列挙する
    pub fn descendants<'a>(&'a self, tag: &str, out: &mut Vec<&'a XmlNode>) {
        for child in &self.children {
            if child.tag == tag {
                out.push(child);
            }
            child.descendants(tag, out);
        }
    }

    /// 直下テキスト（なければ空文字列）
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// 要素をXML文字列へ再シリアライズする
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&quick_xml::escape::escape(value.as_str()));
            out.push('"');
        }
        if self.text.is_none() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(&quick_xml::escape::escape(text.as_str()));
        }
        for child in &self.children {
            child.write_xml(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl Serialize for XmlNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let text = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty());

        let mut len = 2;
        if text.is_some() {
            len += 1;
        }
        if !self.children.is_empty() {
            len += 1;
        }

        let attrs: BTreeMap<&str, &str> = self
            .attrs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("tag", &self.tag)?;
        map.serialize_entry("attrs", &attrs)?;
        if let Some(text) = text {
            map.serialize_entry("text", text)?;
        }
        if !self.children.is_empty() {
            map.serialize_entry("children", &self.children)?;
        }
        map.end()
    }
}

/// 開始タグ`start`を読んだ直後から、対応する終了タグまでを部分木として読み込む
///
/// ストリーミング解析中に、必要な要素だけをツリー化するために使用します。
pub fn read_element<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    buf: &mut Vec<u8>,
) -> Result<XmlNode, XlsxToMdError> {
    let mut stack = vec![XmlNode::from_start(start)?];

    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => stack.push(XmlNode::from_start(&e)?),
            Event::Empty(e) => {
                let node = XmlNode::from_start(&e)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                if let Some(current) = stack.last_mut() {
                    current.text.get_or_insert_with(String::new).push_str(&text);
                }
            }
            Event::CData(e) => {
                let text = std::str::from_utf8(&e)?.to_string();
                if let Some(current) = stack.last_mut() {
                    current.text.get_or_insert_with(String::new).push_str(&text);
                }
            }
            Event::End(_) => {
                let mut node = stack
                    .pop()
                    .ok_or_else(|| XlsxToMdError::Xml("unbalanced end tag".to_string()))?;
                // 子要素間のインデントはテキストとして残さない
                if !node.children.is_empty()
                    && node.text.as_deref().is_some_and(|t| t.trim().is_empty())
                {
                    node.text = None;
                }
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Ok(node),
                }
            }
            Event::Eof => {
                return Err(XlsxToMdError::Xml(format!(
                    "unexpected end of document inside <{}>",
                    stack.first().map(|n| n.name.as_str()).unwrap_or("?")
                )))
            }
            _ => {}
        }
    }
}

/// 開始タグのローカル名を文字列で取得する
pub fn local_name(e: &BytesStart) -> Result<String, XlsxToMdError> {
    Ok(std::str::from_utf8(e.local_name().as_ref())?.to_string())
}

fn local_part(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}
