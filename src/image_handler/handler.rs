//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ImageHandler` 负责校验 / 探测 / 处理三个阶段的编排与配置管理，不感知展示层。
//! 编解码能力通过泛型参数注入，默认使用 `RasterCodec`。
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<ImageConfig>>` 支持运行时切换性能档位。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 编解码在 `spawn_blocking` 中执行：解码开始与编码开始是两个显式挂起点。
//! - 每次探测 / 处理都持有一个 `ObjectUrl`，函数返回（含 `?` 提前返回）时自动释放。
//! - 记录 `decode/encode/total` 阶段耗时，便于性能诊断。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use bytes::Bytes;
use image::GenericImageView;

use super::codec::{ImageCodec, OutputFormat, RasterCodec};
use super::object_url::ObjectUrlStore;
use super::pipeline::{calculate_target_dimensions, resize_to, validate_pixel_limits};
use super::source::{EncodedImage, PixelDimensions, ProcessingResult, SourceFile, ValidationOutcome};
use super::validation::validate_file;
use super::{ImageConfig, ImageError, ImagePerformanceProfile};

/// 图片处理器。
///
/// 封装了配置状态、编解码能力与临时句柄登记表。
pub struct ImageHandler<C: ImageCodec = RasterCodec> {
    config: Arc<RwLock<ImageConfig>>,
    codec: Arc<C>,
    object_urls: ObjectUrlStore,
}

impl ImageHandler<RasterCodec> {
    /// 使用默认编解码能力创建处理器。
    ///
    /// # 示例
    /// ```rust
    /// use fashion_upload::image_handler::{ImageConfig, ImageHandler};
    ///
    /// let handler = ImageHandler::new(ImageConfig::default());
    /// assert_eq!(handler.config_snapshot()?.max_dimension, 1920);
    /// # Ok::<(), fashion_upload::image_handler::ImageError>(())
    /// ```
    pub fn new(config: ImageConfig) -> Self {
        Self::with_codec(config, RasterCodec)
    }
}

impl<C: ImageCodec> ImageHandler<C> {
    /// 注入自定义编解码能力（服务端实现或测试替身）。
    pub fn with_codec(config: ImageConfig, codec: C) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            codec: Arc::new(codec),
            object_urls: ObjectUrlStore::new(),
        }
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次请求链路使用一致参数。
    pub fn config_snapshot(&self) -> Result<ImageConfig, ImageError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| ImageError::Processing("image config lock poisoned".to_string()))
    }

    /// 设置性能档位。
    pub fn set_performance_profile(&self, profile: ImagePerformanceProfile) -> Result<(), ImageError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| ImageError::Processing("image config lock poisoned".to_string()))?;
        config.apply_performance_profile(profile);

        log::info!(
            "⚙️ 已切换图片性能档位：{}（filter={:?}）",
            profile.as_str(),
            config.resize_filter
        );

        Ok(())
    }

    pub fn get_performance_profile(&self) -> Result<ImagePerformanceProfile, ImageError> {
        Ok(self.config_snapshot()?.performance_profile)
    }

    /// 临时句柄登记表（诊断用）。
    pub fn object_urls(&self) -> &ObjectUrlStore {
        &self.object_urls
    }

    /// 按声明元数据校验文件。
    pub fn validate(&self, file: &SourceFile) -> Result<ValidationOutcome, ImageError> {
        let config = self.config_snapshot()?;
        Ok(validate_file(file, &config))
    }

    /// 探测像素尺寸。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use fashion_upload::image_handler::{ImageConfig, ImageHandler, SourceFile};
    ///
    /// # async fn demo() -> Result<(), fashion_upload::image_handler::ImageError> {
    /// let handler = ImageHandler::new(ImageConfig::default());
    /// let file = SourceFile::new("look.png", "image/png", std::fs::read("look.png").unwrap());
    /// let dimensions = handler.probe_dimensions(&file).await?;
    /// println!("{}x{}", dimensions.width, dimensions.height);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn probe_dimensions(&self, file: &SourceFile) -> Result<PixelDimensions, ImageError> {
        let config = self.config_snapshot()?;
        self.probe_with(file, &config).await
    }

    /// 处理主入口：解码、按需缩放、重新编码。
    pub async fn process_image(&self, file: &SourceFile) -> Result<ProcessingResult, ImageError> {
        let config = self.config_snapshot()?;
        self.process_with(file, &config).await
    }

    pub(crate) async fn probe_with(
        &self,
        file: &SourceFile,
        config: &ImageConfig,
    ) -> Result<PixelDimensions, ImageError> {
        let url = self.object_urls.create(file.bytes().clone())?;
        let bytes = url.resolve()?;
        let codec = Arc::clone(&self.codec);

        let dimensions = run_blocking(move || codec.probe(&bytes)).await?;
        validate_pixel_limits(dimensions, config.max_decoded_pixels)?;

        log::debug!(
            "📐 尺寸探测完成 - {}: {}x{}（{}）",
            file.name(),
            dimensions.width,
            dimensions.height,
            url.href()
        );

        Ok(dimensions)
    }

    pub(crate) async fn process_with(
        &self,
        file: &SourceFile,
        config: &ImageConfig,
    ) -> Result<ProcessingResult, ImageError> {
        let format = OutputFormat::from_media_type(file.media_type()).ok_or_else(|| {
            ImageError::Processing(format!("No encoder available for {}", file.media_type()))
        })?;

        let url = self.object_urls.create(file.bytes().clone())?;
        let bytes = url.resolve()?;
        let total_start = Instant::now();

        let decode_start = Instant::now();
        let codec = Arc::clone(&self.codec);
        let max_decoded_pixels = config.max_decoded_pixels;
        let max_dimension = config.max_dimension;
        let filter = config.resize_filter;
        let (original_dimensions, needs_resize, rendered) = run_blocking(move || {
            let header = codec.probe(&bytes)?;
            validate_pixel_limits(header, max_decoded_pixels)?;

            let decoded = codec.decode(&bytes)?;
            let (width, height) = decoded.dimensions();
            let original = PixelDimensions::new(width, height);
            let target = calculate_target_dimensions(original, max_dimension);
            let rendered = if target.needs_resize {
                resize_to(decoded, target.dimensions, filter)
            } else {
                decoded
            };

            Ok((original, target.needs_resize, rendered))
        })
        .await?;
        let decode_elapsed = decode_start.elapsed();

        let encode_start = Instant::now();
        let codec = Arc::clone(&self.codec);
        let quality = config.encode_quality;
        let (dimensions, payload) = run_blocking(move || {
            let (width, height) = rendered.dimensions();
            let payload = codec.encode(&rendered, format, quality)?;
            Ok((PixelDimensions::new(width, height), payload))
        })
        .await?;
        let encode_elapsed = encode_start.elapsed();

        log::info!(
            "✅ 图片处理完成 - {} {}x{} -> {}x{} {} -> {} bytes decode={}ms encode={}ms total={}ms",
            url.href(),
            original_dimensions.width,
            original_dimensions.height,
            dimensions.width,
            dimensions.height,
            file.size(),
            payload.len(),
            decode_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(ProcessingResult {
            original_size: file.size(),
            processed_size: payload.len() as u64,
            original_dimensions,
            dimensions,
            was_resized: needs_resize,
            encoded: EncodedImage {
                media_type: format.media_type(),
                bytes: Bytes::from(payload),
            },
        })
    }
}

/// 在阻塞线程池执行编解码，保持 async 运行时不被阻塞。
async fn run_blocking<T, F>(work: F) -> Result<T, ImageError>
where
    F: FnOnce() -> Result<T, ImageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ImageError::Processing(format!("Image worker failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Rgba};

    fn gradient_bytes(width: u32, height: u32, format: OutputFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
        }));
        RasterCodec
            .encode(&img, format, 90)
            .expect("failed to encode test image")
    }

    struct NoEncoderCodec;

    impl ImageCodec for NoEncoderCodec {
        fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, ImageError> {
            RasterCodec.decode(bytes)
        }

        fn encode(&self, _: &DynamicImage, _: OutputFormat, _: u8) -> Result<Vec<u8>, ImageError> {
            Err(ImageError::Processing("Canvas context not available".to_string()))
        }
    }

    #[tokio::test]
    async fn small_png_is_passed_through_unresized() {
        let handler = ImageHandler::new(ImageConfig::default());
        let file = SourceFile::new("small.png", "image/png", gradient_bytes(640, 480, OutputFormat::Png));

        let result = handler.process_image(&file).await.expect("process should succeed");

        assert!(!result.was_resized);
        assert_eq!(result.dimensions, PixelDimensions::new(640, 480));
        assert_eq!(result.original_dimensions, result.dimensions);
        assert_eq!(result.encoded.media_type, "image/png");
        assert_eq!(result.processed_size, result.encoded.bytes.len() as u64);
        assert_eq!(handler.object_urls().live_count(), 0);
    }

    #[tokio::test]
    async fn portrait_jpeg_is_clamped_on_height() {
        let handler = ImageHandler::new(ImageConfig::default());
        let file = SourceFile::new("tall.jpg", "image/jpg", gradient_bytes(1200, 2400, OutputFormat::Jpeg));

        let result = handler.process_image(&file).await.expect("process should succeed");

        assert!(result.was_resized);
        assert_eq!(result.dimensions, PixelDimensions::new(960, 1920));
        assert_eq!(result.encoded.media_type, "image/jpeg");
        assert!(result.data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn exif_rotated_jpeg_is_sized_as_displayed() {
        let handler = ImageHandler::new(ImageConfig::default());
        let stored = gradient_bytes(4000, 2000, OutputFormat::Jpeg);
        let file = SourceFile::new(
            "phone.jpg",
            "image/jpeg",
            crate::image_handler::codec::with_exif_orientation(&stored, 6),
        );

        let probed = handler.probe_dimensions(&file).await.expect("probe should succeed");
        assert_eq!(probed, PixelDimensions::new(2000, 4000));

        let result = handler.process_image(&file).await.expect("process should succeed");
        assert!(result.was_resized);
        assert_eq!(result.original_dimensions, PixelDimensions::new(2000, 4000));
        assert_eq!(result.dimensions, PixelDimensions::new(960, 1920));

        // the re-encoded payload carries no orientation tag, so it reads upright
        assert_eq!(
            RasterCodec.probe(&result.encoded.bytes).expect("probe output"),
            PixelDimensions::new(960, 1920)
        );
        assert_eq!(handler.object_urls().live_count(), 0);
    }

    #[tokio::test]
    async fn probe_releases_handle_on_decode_failure() {
        let handler = ImageHandler::new(ImageConfig::default());
        let file = SourceFile::new("broken.png", "image/png", b"definitely not a png".to_vec());

        let result = handler.probe_dimensions(&file).await;

        assert!(matches!(result, Err(ImageError::Decode(_))));
        assert_eq!(handler.object_urls().live_count(), 0);
        assert_eq!(handler.object_urls().revoked_total(), 1);
    }

    #[tokio::test]
    async fn encoder_failure_yields_processing_error_without_leaking() {
        let handler = ImageHandler::with_codec(ImageConfig::default(), NoEncoderCodec);
        let file = SourceFile::new("look.png", "image/png", gradient_bytes(32, 32, OutputFormat::Png));

        let result = handler.process_image(&file).await;

        assert_eq!(
            result.map(|r| r.dimensions),
            Err(ImageError::Processing("Canvas context not available".to_string()))
        );
        assert_eq!(handler.object_urls().live_count(), 0);
    }

    #[tokio::test]
    async fn pixel_budget_is_checked_before_decode() {
        let mut config = ImageConfig::default();
        config.max_decoded_pixels = 1_000;
        let handler = ImageHandler::new(config);
        let file = SourceFile::new("look.png", "image/png", gradient_bytes(100, 100, OutputFormat::Png));

        let result = handler.process_image(&file).await;

        assert!(matches!(result, Err(ImageError::ResourceLimit(_))));
    }

    #[test]
    fn validate_uses_current_config() {
        let mut config = ImageConfig::default();
        config.max_file_size = 16;
        let handler = ImageHandler::new(config);
        let file = SourceFile::new("look.png", "image/png", vec![0u8; 17]);

        let outcome = handler.validate(&file).expect("validate");

        assert_eq!(outcome.error.as_deref(), Some("File size must be less than 16 Bytes."));
    }

    #[test]
    fn performance_profile_switches_filter() {
        let handler = ImageHandler::new(ImageConfig::default());
        handler
            .set_performance_profile(ImagePerformanceProfile::Quality)
            .expect("switch profile");

        assert_eq!(
            handler.get_performance_profile().expect("read profile"),
            ImagePerformanceProfile::Quality
        );
        assert_eq!(
            handler.config_snapshot().expect("snapshot").resize_filter,
            image::imageops::FilterType::CatmullRom
        );
    }
}
