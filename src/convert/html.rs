//! HTMLコンバーター（UTF-8として読み込み、そのまま渡す）

use crate::api::SupportedFormat;
use crate::convert::{ConvertedDocument, DocumentConverter};
use crate::error::Result;
use crate::security::SecurityConfig;

/// HTMLファイル用コンバーター
#[derive(Debug, Clone, Default)]
pub struct HtmlConverter {
    security: SecurityConfig,
}

impl HtmlConverter {
    pub fn new(security: SecurityConfig) -> Self {
        Self { security }
    }
}

impl DocumentConverter for HtmlConverter {
    fn format(&self) -> SupportedFormat {
        SupportedFormat::Html
    }

    fn security(&self) -> &SecurityConfig {
        &self.security
    }

    fn convert_bytes(&self, bytes: &[u8]) -> Result<ConvertedDocument> {
        // BOMは除去し、不正なUTF-8は置換文字にする
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        Ok(ConvertedDocument {
            markup: String::from_utf8_lossy(bytes).into_owned(),
        })
    }
}
