//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入”和“流水线输出”解耦：
//! - `SourceFile` 表示用户选中的原始文件（不可变）
//! - `PixelDimensions` 表示像素尺寸
//! - `ValidationOutcome` 表示非抛出式校验结果
//! - `ProcessingResult` 表示可直接展示的处理结果

use std::path::Path;

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use serde::Serialize;

use super::ImageError;

/// 用户选中的原始文件。
///
/// 字节使用 `Bytes` 持有，克隆只增加引用计数。
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    media_type: String,
    bytes: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// 从磁盘读取文件，媒体类型按内容签名识别。
    ///
    /// 无法识别签名时声明为 `application/octet-stream`，交由校验器拒绝。
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let media_type = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or("application/octet-stream");
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        log::debug!("📁 已读取本地文件 - {} ({}, {} bytes)", name, media_type, bytes.len());

        Ok(Self::new(name, media_type, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 声明的媒体类型（未经解码确认）。
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// 字节长度。
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

/// 像素尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelDimensions {
    pub width: u32,
    pub height: u32,
}

impl PixelDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn longer_edge(&self) -> u32 {
        self.width.max(self.height)
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// 校验结果：是否通过 + 可选的人类可读错误。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(message.into()),
        }
    }

    /// 转为 `Result`，便于在流水线中使用 `?`。
    pub fn into_result(self) -> Result<(), ImageError> {
        match (self.is_valid, self.error) {
            (true, _) => Ok(()),
            (false, Some(message)) => Err(ImageError::Validation(message)),
            (false, None) => Err(ImageError::Validation("Invalid file.".to_string())),
        }
    }
}

/// 重新编码后的图片载荷。
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub media_type: &'static str,
    pub bytes: Bytes,
}

/// 处理阶段输出：展示层直接消费的结果。
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    #[serde(skip)]
    pub encoded: EncodedImage,
    pub original_size: u64,
    pub processed_size: u64,
    pub original_dimensions: PixelDimensions,
    pub dimensions: PixelDimensions,
    pub was_resized: bool,
}

impl ProcessingResult {
    /// 可直接用于展示的 Data URL。
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.encoded.media_type,
            general_purpose::STANDARD.encode(&self.encoded.bytes)
        )
    }

    /// 相对原始体积节省的百分比。
    pub fn compression_ratio(&self) -> f64 {
        super::validation::compression_ratio(self.original_size, self.processed_size)
    }
}
