//! Package Module
//!
//! OOXMLパッケージ（ZIPアーカイブ）をメモリに読み込み、
//! パーツの取得、コンテンツタイプ、リレーションシップの解決を提供するモジュール。

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use sha2::{Digest, Sha256};
use zip::ZipArchive;

use crate::error::XlsxToMdError;
use crate::reference::{rels_path_for, resolve_target};
use crate::security::{validate_zip_path, SecurityConfig};
use crate::types::SourceMetadata;
use crate::xml::XmlNode;

/// ZIPローカルファイルヘッダのマジックナンバー
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// リレーションシップの1項目
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// 解決済みのターゲット（外部ターゲットは生の値）
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// リレーションシップタイプが`/<suffix>`で終わるか
    pub fn is_type(&self, suffix: &str) -> bool {
        self.rel_type
            .rsplit('/')
            .next()
            .is_some_and(|last| last == suffix)
    }
}

/// メモリ上に展開されたOOXMLパッケージ
///
/// アーカイブは読み込み後に破棄され、以後は不変のエントリマップのみを共有します。
#[derive(Debug)]
pub(crate) struct Package {
    entries: BTreeMap<String, Vec<u8>>,
    content_types: BTreeMap<String, String>,
    metadata: SourceMetadata,
}

impl Package {
    /// バイト列からパッケージを読み込む
    ///
    /// # 引数
    ///
    /// * `bytes` - パッケージ全体
    /// * `file_name` - 来歴情報に記録するファイル名
    /// * `security` - セキュリティ制限
    ///
    /// # エラー
    ///
    /// * `UnsupportedFormat` - ZIPのマジックナンバーで始まらない場合
    /// * `SecurityViolation` - 制限を超えた場合、危険なエントリ名を含む場合
    /// * `Zip` - アーカイブが破損している場合
    pub fn from_bytes(
        bytes: &[u8],
        file_name: Option<String>,
        security: &SecurityConfig,
    ) -> Result<Self, XlsxToMdError> {
        if !bytes.starts_with(ZIP_MAGIC) {
            return Err(XlsxToMdError::UnsupportedFormat(
                "input is not a ZIP package".to_string(),
            ));
        }
        security.check_input_size(bytes.len() as u64)?;

        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let zip_entries = archive.len();
        security.check_entry_count(zip_entries)?;

        let mut entries = BTreeMap::new();
        let mut total: u64 = 0;
        for i in 0..zip_entries {
            let file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            validate_zip_path(&name)?;
            total = security.check_entry_size(&name, file.size(), total)?;

            // 宣言サイズを偽装したエントリに備え、上限+1バイトで打ち切る
            let mut data = Vec::with_capacity(file.size().min(security.max_file_size) as usize);
            file.take(security.max_file_size + 1).read_to_end(&mut data)?;
            if data.len() as u64 > security.max_file_size {
                return Err(XlsxToMdError::SecurityViolation(format!(
                    "Entry {} exceeds its declared size",
                    name
                )));
            }
            entries.insert(name, data);
        }
        drop(archive);

        let metadata = SourceMetadata {
            file_name,
            file_size_bytes: bytes.len() as u64,
            sha256: format!("{:x}", Sha256::digest(bytes)),
            zip_entries,
        };
        log::debug!(
            "loaded package: {} entries, {} bytes",
            zip_entries,
            metadata.file_size_bytes
        );

        let mut package = Self {
            entries,
            content_types: BTreeMap::new(),
            metadata,
        };
        package.content_types = package.load_content_types()?;
        Ok(package)
    }

    /// 来歴情報
    pub fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    /// パーツのバイト列
    pub fn part(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    /// パーツをツリーとして解析する（存在しなければ`None`）
    pub fn parse_part(&self, path: &str) -> Result<Option<XmlNode>, XlsxToMdError> {
        match self.part(path) {
            Some(bytes) => Ok(Some(XmlNode::parse(bytes)?)),
            None => Ok(None),
        }
    }

    /// パーツのリレーションシップを文書順で返す（`.rels`がなければ空）
    pub fn relationships(&self, part: &str) -> Result<Vec<Relationship>, XlsxToMdError> {
        let rels_path = if part.is_empty() {
            "_rels/.rels".to_string()
        } else {
            rels_path_for(part)
        };
        let Some(root) = self.parse_part(&rels_path)? else {
            return Ok(Vec::new());
        };

        let mut rels = Vec::new();
        for rel in root.children_named("Relationship") {
            let (Some(id), Some(target)) = (rel.attr("Id"), rel.attr("Target")) else {
                continue;
            };
            if target.is_empty() {
                continue;
            }
            let external = rel.attr("TargetMode") == Some("External");
            rels.push(Relationship {
                id: id.to_string(),
                rel_type: rel.attr("Type").unwrap_or_default().to_string(),
                target: if external {
                    target.to_string()
                } else {
                    resolve_target(part, target)
                },
                external,
            });
        }
        Ok(rels)
    }

    /// パーツのコンテンツタイプ
    ///
    /// `[Content_Types].xml`、拡張子からの推測、`application/octet-stream`の順に決定します。
    pub fn content_type(&self, path: &str) -> String {
        let key = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        if let Some(ct) = self.content_types.get(&key) {
            return ct.clone();
        }
        guess_content_type(path)
            .unwrap_or("application/octet-stream")
            .to_string()
    }

    /// すべてのエントリに`Default`（拡張子）を割り当て、`Override`で上書きする
    fn load_content_types(&self) -> Result<BTreeMap<String, String>, XlsxToMdError> {
        let mut types = BTreeMap::new();
        let Some(root) = self.parse_part("[Content_Types].xml")? else {
            return Ok(types);
        };

        let mut defaults = BTreeMap::new();
        for child in &root.children {
            let Some(ct) = child.attr("ContentType").filter(|c| !c.is_empty()) else {
                continue;
            };
            match child.tag.as_str() {
                "Default" => {
                    if let Some(ext) = child.attr("Extension").filter(|e| !e.is_empty()) {
                        defaults.insert(ext.to_ascii_lowercase(), ct.to_string());
                    }
                }
                "Override" => {
                    if let Some(part) = child.attr("PartName").filter(|p| !p.is_empty()) {
                        types.insert(part.to_string(), ct.to_string());
                    }
                }
                _ => {}
            }
        }

        for name in self.entries.keys() {
            let key = format!("/{}", name);
            if types.contains_key(&key) {
                continue;
            }
            if let Some(ct) = extension_of(name).and_then(|ext| defaults.get(&ext)) {
                types.insert(key, ct.clone());
            }
        }
        Ok(types)
    }
}

fn extension_of(path: &str) -> Option<String> {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// 拡張子からメディアタイプを推測する
pub(crate) fn guess_content_type(path: &str) -> Option<&'static str> {
    let ct = match extension_of(path)?.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/vnd.microsoft.icon",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        "xml" => "application/xml",
        _ => return None,
    };
    Some(ct)
}
