//! # 编解码能力模块
//!
//! ## 设计思路
//!
//! 解码 / 编码能力作为可注入的外部协作者（`ImageCodec`），而不是全局状态。
//! 生产环境使用基于 `image` crate 的 `RasterCodec`，测试可替换为替身实现
//! （模拟解码失败、编码器不可用、慢解码等）。
//!
//! ## 实现思路
//!
//! - `probe`：只读 header 获取尺寸，默认实现回退到完整解码。
//!   EXIF 方向为 90° / 270° 时交换宽高，报告的是显示尺寸。
//! - `decode`：完整解码为 `DynamicImage`，并按 EXIF 方向摆正像素。
//! - 解码失败只返回通用提示，底层错误细节写入 debug 日志。
//! - `encode`：按输出格式与质量重新编码；JPEG 先转 RGB8（JPEG 不支持 alpha）。

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};

use super::source::PixelDimensions;
use super::ImageError;

/// 输出编码格式，保持与源文件一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    /// 由声明媒体类型推导输出格式，`image/jpg` 视为 `image/jpeg`。
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// 图片编解码能力。
///
/// 方法均为同步阻塞调用，由 `ImageHandler` 放到阻塞线程池执行。
pub trait ImageCodec: Send + Sync + 'static {
    /// 探测像素尺寸。
    fn probe(&self, bytes: &[u8]) -> Result<PixelDimensions, ImageError> {
        let (width, height) = self.decode(bytes)?.dimensions();
        Ok(PixelDimensions::new(width, height))
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, ImageError>;

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Vec<u8>, ImageError>;
}

/// 基于 `image` crate 的默认编解码实现。
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCodec;

const PROBE_FAILED_MESSAGE: &str = "Failed to load image for dimension checking";
const DECODE_FAILED_MESSAGE: &str = "Failed to load image";

/// 旋转 90° / 270° 的方向会交换显示宽高。
fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

fn decode_failure(message: &'static str) -> impl Fn(image::ImageError) -> ImageError {
    move |e| {
        log::debug!("🔍 {}: {}", message, e);
        ImageError::Decode(message.to_string())
    }
}

fn open_decoder<'a>(
    bytes: &'a [u8],
    message: &'static str,
) -> Result<impl ImageDecoder + 'a, ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| {
            log::debug!("🔍 {}: {}", message, e);
            ImageError::Decode(message.to_string())
        })?;

    if reader.format().is_none() {
        log::debug!("🔍 {}: unrecognised image signature", message);
        return Err(ImageError::Decode(message.to_string()));
    }

    reader.into_decoder().map_err(decode_failure(message))
}

/// 读取 EXIF 方向；没有或无法解析时按原样处理。
fn read_orientation(decoder: &mut impl ImageDecoder) -> Orientation {
    decoder.orientation().unwrap_or_else(|e| {
        log::debug!("🔍 EXIF orientation unreadable, keeping stored layout: {}", e);
        Orientation::NoTransforms
    })
}

impl ImageCodec for RasterCodec {
    fn probe(&self, bytes: &[u8]) -> Result<PixelDimensions, ImageError> {
        let mut decoder = open_decoder(bytes, PROBE_FAILED_MESSAGE)?;
        let (width, height) = decoder.dimensions();

        if swaps_axes(read_orientation(&mut decoder)) {
            return Ok(PixelDimensions::new(height, width));
        }
        Ok(PixelDimensions::new(width, height))
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, ImageError> {
        let mut decoder = open_decoder(bytes, DECODE_FAILED_MESSAGE)?;
        let orientation = read_orientation(&mut decoder);

        let mut image =
            DynamicImage::from_decoder(decoder).map_err(decode_failure(DECODE_FAILED_MESSAGE))?;
        image.apply_orientation(orientation);
        Ok(image)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Vec<u8>, ImageError> {
        let mut buffer = Vec::new();

        let written = match format {
            OutputFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
                DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)
            }
            OutputFormat::Png => image.write_with_encoder(PngEncoder::new(&mut buffer)),
        };

        written.map_err(|e| ImageError::Processing(format!("Failed to encode image: {}", e)))?;

        if buffer.is_empty() {
            return Err(ImageError::Processing(
                "Encoder produced an empty payload".to_string(),
            ));
        }

        Ok(buffer)
    }
}


/// 在 JPEG 的 SOI 之后插入只含 Orientation 标签的 APP1 (EXIF) 段。
#[cfg(test)]
pub(crate) fn with_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "expected a JPEG stream");

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\0\x2A\0\0\0\x08");
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_be_bytes());

    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(&tiff);
    let segment_len = u16::try_from(payload.len() + 2).expect("segment length");

    let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}
