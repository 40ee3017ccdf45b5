//! # 尺寸计算与降采样流水线模块
//!
//! ## 设计思路
//!
//! 将“像素限制 → 目标尺寸计算 → 降采样”集中管理。
//! 优先做像素预算检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 长边不超过阈值时原样通过（`was_resized = false`）
//! 2. 宽 ≥ 高：宽固定为阈值，高按比例四舍五入；否则高固定为阈值
//! 3. 优先使用 `fast_image_resize`，失败时回退 `image::resize_exact`

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Rgba};

use super::source::PixelDimensions;
use super::ImageError;

/// 目标尺寸计算结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDimensions {
    pub dimensions: PixelDimensions,
    pub needs_resize: bool,
}

/// 按比例计算缩放目标尺寸。
///
/// 被固定的一边恰好等于 `max_dimension`，另一边四舍五入且不小于 1。
///
/// # 示例
/// ```rust
/// use fashion_upload::image_handler::{calculate_target_dimensions, PixelDimensions};
///
/// let target = calculate_target_dimensions(PixelDimensions::new(4000, 2000), 1920);
/// assert_eq!(target.dimensions, PixelDimensions::new(1920, 960));
/// assert!(target.needs_resize);
/// ```
pub fn calculate_target_dimensions(original: PixelDimensions, max_dimension: u32) -> TargetDimensions {
    let PixelDimensions { width, height } = original;

    if width <= max_dimension && height <= max_dimension {
        return TargetDimensions {
            dimensions: original,
            needs_resize: false,
        };
    }

    let max = f64::from(max_dimension);
    let dimensions = if width >= height {
        let scaled = (max * f64::from(height) / f64::from(width)).round() as u32;
        PixelDimensions::new(max_dimension, scaled.max(1))
    } else {
        let scaled = (max * f64::from(width) / f64::from(height)).round() as u32;
        PixelDimensions::new(scaled.max(1), max_dimension)
    };

    TargetDimensions {
        dimensions,
        needs_resize: true,
    }
}

/// 校验像素数量是否超过配置上限。
pub(crate) fn validate_pixel_limits(
    dimensions: PixelDimensions,
    max_decoded_pixels: u64,
) -> Result<(), ImageError> {
    let pixels = dimensions.pixel_count();

    if pixels > max_decoded_pixels {
        return Err(ImageError::ResourceLimit(format!(
            "Image is too large to decode: {} pixels (limit: {} pixels)",
            pixels, max_decoded_pixels
        )));
    }

    Ok(())
}

/// 将图片缩放到目标尺寸。
pub(crate) fn resize_to(
    image: DynamicImage,
    target: PixelDimensions,
    filter: FilterType,
) -> DynamicImage {
    if image.width() == target.width && image.height() == target.height {
        return image;
    }

    log::info!(
        "🧩 按比例降采样：{}x{} -> {}x{}（filter={:?}）",
        image.width(),
        image.height(),
        target.width,
        target.height,
        filter
    );

    match resize_with_fast_image_resize(&image, target.width, target.height, filter) {
        Ok(resized) => resized,
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 降采样失败，回退 image::resize_exact：{}", err);
            image.resize_exact(target.width, target.height, filter)
        }
    }
}

fn resize_with_fast_image_resize(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<DynamicImage, ImageError> {
    let src = image.to_rgba8();
    let (src_width, src_height) = src.dimensions();

    let src_image = fr::images::Image::from_vec_u8(
        src_width,
        src_height,
        src.into_raw(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| ImageError::Processing(format!("Failed to build source buffer: {}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ImageError::Processing(format!("fast_image_resize failed: {}", e)))?;

    let rgba = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(target_width, target_height, dst_image.into_vec())
        .ok_or_else(|| ImageError::Processing("Resized buffer has an unexpected length".to_string()))?;

    Ok(DynamicImage::ImageRgba8(rgba))
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}
