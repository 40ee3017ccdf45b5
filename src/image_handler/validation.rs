//! # 校验模块
//!
//! ## 设计思路
//!
//! 校验是纯函数：只看声明元数据（类型 / 体积）或已探测的尺寸，不做任何副作用。
//! 失败不抛错，而是返回 `ValidationOutcome`，由调用侧决定如何展示。
//!
//! ## 实现思路
//!
//! - `validate_file`：类型 → 体积上限 → 空文件，顺序固定，首个失败即返回。
//! - `validate_dimensions`：最小边 → 上限（缩放阈值的倍数，比缩放阈值宽松）。
//! - 附带体积 / 尺寸格式化与压缩率计算，供展示层复用。

use super::source::{PixelDimensions, SourceFile, ValidationOutcome};
use super::ImageConfig;

pub const UNSUPPORTED_TYPE_MESSAGE: &str = "Please upload a PNG or JPG image.";
pub const EMPTY_FILE_MESSAGE: &str = "File appears to be empty.";

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// 按声明元数据校验文件。
///
/// # 示例
/// ```rust
/// use fashion_upload::image_handler::{validate_file, ImageConfig, SourceFile};
///
/// let file = SourceFile::new("look.gif", "image/gif", vec![1u8, 2, 3]);
/// let outcome = validate_file(&file, &ImageConfig::default());
/// assert!(!outcome.is_valid);
/// assert_eq!(outcome.error.as_deref(), Some("Please upload a PNG or JPG image."));
/// ```
pub fn validate_file(file: &SourceFile, config: &ImageConfig) -> ValidationOutcome {
    let accepted = config
        .accepted_media_types
        .iter()
        .any(|media_type| media_type == file.media_type());
    if !accepted {
        return ValidationOutcome::invalid(UNSUPPORTED_TYPE_MESSAGE);
    }

    if file.size() > config.max_file_size {
        return ValidationOutcome::invalid(format!(
            "File size must be less than {}.",
            format_file_size(config.max_file_size)
        ));
    }

    if file.size() == 0 {
        return ValidationOutcome::invalid(EMPTY_FILE_MESSAGE);
    }

    ValidationOutcome::valid()
}

/// 按探测到的尺寸校验。
///
/// 上限为 `max_dimension * dimension_limit_multiplier`，超过缩放阈值但未超上限的图片会被缩小而不是拒绝。
pub fn validate_dimensions(dimensions: PixelDimensions, config: &ImageConfig) -> ValidationOutcome {
    let min = config.min_dimension.max(1);
    if dimensions.width < min || dimensions.height < min {
        return ValidationOutcome::invalid(format!(
            "Image dimensions must be at least {}x{} pixels.",
            min, min
        ));
    }

    let upper = config.dimension_upper_bound();
    if dimensions.width > upper || dimensions.height > upper {
        return ValidationOutcome::invalid(format!(
            "Image dimensions are too large. Maximum supported: {}x{} pixels.",
            upper, upper
        ));
    }

    ValidationOutcome::valid()
}

/// 人类可读体积：`0 Bytes`、`1.5 KB`、`10 MB`。
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let fixed = format!("{:.2}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[unit])
}

pub fn format_dimensions(width: u32, height: u32) -> String {
    format!("{} × {} pixels", width, height)
}

/// 节省体积百分比；体积变大时为负数。
pub fn compression_ratio(original_size: u64, processed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    (original_size as f64 - processed_size as f64) / original_size as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_of(media_type: &str, size: usize) -> SourceFile {
        SourceFile::new("upload", media_type, vec![0u8; size])
    }

    #[test]
    fn rejects_gif_with_exact_message() {
        let outcome = validate_file(&file_of("image/gif", 128), &ImageConfig::default());
        assert_eq!(outcome, ValidationOutcome::invalid("Please upload a PNG or JPG image."));
    }

    #[test]
    fn accepts_all_three_declared_types() {
        let config = ImageConfig::default();
        for media_type in ["image/jpeg", "image/jpg", "image/png"] {
            assert!(validate_file(&file_of(media_type, 16), &config).is_valid, "{}", media_type);
        }
    }

    #[test]
    fn size_limit_is_inclusive() {
        let config = ImageConfig::default();

        let at_limit = validate_file(&file_of("image/png", 10_485_760), &config);
        assert!(at_limit.is_valid);

        let over_limit = validate_file(&file_of("image/png", 10_485_761), &config);
        assert_eq!(
            over_limit.error.as_deref(),
            Some("File size must be less than 10 MB.")
        );
    }

    #[test]
    fn rejects_zero_byte_file_regardless_of_type() {
        let config = ImageConfig::default();
        for media_type in ["image/png", "image/jpeg", "image/gif", ""] {
            assert!(!validate_file(&file_of(media_type, 0), &config).is_valid);
        }
        assert_eq!(
            validate_file(&file_of("image/png", 0), &config).error.as_deref(),
            Some(EMPTY_FILE_MESSAGE)
        );
    }

    #[test]
    fn dimension_bounds_use_the_looser_upper_limit() {
        let config = ImageConfig::default();

        assert!(validate_dimensions(PixelDimensions::new(3840, 3840), &config).is_valid);
        assert!(validate_dimensions(PixelDimensions::new(2500, 100), &config).is_valid);
        assert_eq!(
            validate_dimensions(PixelDimensions::new(3841, 10), &config).error.as_deref(),
            Some("Image dimensions are too large. Maximum supported: 3840x3840 pixels.")
        );
    }

    #[test]
    fn dimension_minimum_is_enforced() {
        let mut config = ImageConfig::default();
        config.min_dimension = 64;

        assert_eq!(
            validate_dimensions(PixelDimensions::new(63, 500), &config).error.as_deref(),
            Some("Image dimensions must be at least 64x64 pixels.")
        );
    }

    #[test]
    fn file_sizes_are_formatted_like_the_upload_form() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10 MB");
        assert_eq!(format_file_size(1_234_567), "1.18 MB");
    }

    #[test]
    fn compression_ratio_handles_empty_original() {
        assert_eq!(compression_ratio(0, 10), 0.0);
        assert_eq!(compression_ratio(200, 50), 75.0);
        assert!(compression_ratio(100, 150) < 0.0);
        assert_eq!(format_dimensions(1920, 960), "1920 × 960 pixels");
    }
}
