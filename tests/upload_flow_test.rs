// End-to-end checks for the upload preparation flow
use fashion_upload::image_handler::{
    ImageCodec, ImageConfig, ImageHandler, OutputFormat, PixelDimensions, RasterCodec,
    SelectionOutcome, SourceFile, UploadPhase, UploadSession, validate_file,
};
use image::{DynamicImage, ImageBuffer, Rgba};

fn encode_gradient(width: u32, height: u32, format: OutputFormat) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        let r = (x % 255) as u8;
        let g = (y % 255) as u8;
        let b = ((x + y) % 255) as u8;
        Rgba([r, g, b, 255])
    });

    RasterCodec
        .encode(&DynamicImage::ImageRgba8(img), format, 90)
        .expect("failed to encode test image")
}

#[tokio::test]
async fn large_landscape_jpeg_is_downscaled_to_threshold() {
    let handler = ImageHandler::new(ImageConfig::default());
    let file = SourceFile::new(
        "runway.jpg",
        "image/jpeg",
        encode_gradient(4000, 2000, OutputFormat::Jpeg),
    );

    let result = handler.process_image(&file).await.expect("process should succeed");

    assert!(result.was_resized);
    assert_eq!(result.original_dimensions, PixelDimensions::new(4000, 2000));
    assert_eq!(result.dimensions, PixelDimensions::new(1920, 960));
    assert_eq!(result.original_size, file.size());
    assert!(result.processed_size <= result.original_size);
    assert!(result.compression_ratio() >= 0.0);
    assert_eq!(handler.object_urls().live_count(), 0);
}

#[tokio::test]
async fn processing_a_processed_image_again_is_a_no_op() {
    let handler = ImageHandler::new(ImageConfig::default());
    let file = SourceFile::new(
        "street.png",
        "image/png",
        encode_gradient(2600, 1300, OutputFormat::Png),
    );

    let first = handler.process_image(&file).await.expect("first pass");
    assert!(first.was_resized);
    assert_eq!(first.dimensions, PixelDimensions::new(1920, 960));

    let again = SourceFile::new("street-processed.png", first.encoded.media_type, first.encoded.bytes.clone());
    let second = handler.process_image(&again).await.expect("second pass");

    assert!(!second.was_resized);
    assert_eq!(second.dimensions, first.dimensions);
    assert_eq!(second.original_dimensions, first.dimensions);
}

#[test]
fn validator_boundaries() {
    let config = ImageConfig::default();

    let gif = SourceFile::new("look.gif", "image/gif", vec![7u8; 32]);
    assert_eq!(
        validate_file(&gif, &config).error.as_deref(),
        Some("Please upload a PNG or JPG image.")
    );

    let at_limit = SourceFile::new("max.png", "image/png", vec![0u8; 10_485_760]);
    assert!(validate_file(&at_limit, &config).is_valid);

    let over_limit = SourceFile::new("big.png", "image/png", vec![0u8; 10_485_761]);
    assert!(!validate_file(&over_limit, &config).is_valid);

    let empty = SourceFile::new("empty.jpg", "image/jpeg", Vec::<u8>::new());
    assert!(!validate_file(&empty, &config).is_valid);
}

#[tokio::test]
async fn session_walks_picker_selection_to_done() {
    let session = UploadSession::new(ImageHandler::new(ImageConfig::default()));
    let file = SourceFile::new(
        "vintage.jpg",
        "image/jpg",
        encode_gradient(2400, 3000, OutputFormat::Jpeg),
    );

    let outcome = session.select_from_picker(file).await;

    let SelectionOutcome::Completed(result) = outcome else {
        panic!("expected completed upload");
    };
    assert_eq!(result.dimensions, PixelDimensions::new(1536, 1920));
    assert!(result.data_url().starts_with("data:image/jpeg;base64,"));
    assert!(matches!(session.state().phase, UploadPhase::Done(_)));
    assert!(session.current_error().is_none());
}
