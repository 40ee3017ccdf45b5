//! # 时尚图片上传预处理 — 演示入口
//!
//! 按顺序把命令行给出的图片路径当作“文件选择器”输入送入同一个上传会话，
//! 每个文件输出一行 JSON 摘要。业务逻辑详见 `lib.rs` 架构文档。
//!
//! ```text
//! fashion-upload [--profile quality|balanced|speed] <image>...
//! ```
//!
//! 设置 `FASHION_UPLOAD_CONFIG=<path>` 可从 JSON 文件加载 `ImageConfig`。

use std::path::{Path, PathBuf};

use fashion_upload::error::AppError;
use fashion_upload::image_handler::{
    ImageConfig, ImageHandler, ImagePerformanceProfile, SelectionOutcome, SourceFile, UploadSession,
    format_dimensions, format_file_size,
};
use serde_json::json;

const CONFIG_ENV: &str = "FASHION_UPLOAD_CONFIG";

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run().await {
        log::error!("运行失败: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let (profile, paths) = parse_args(std::env::args().skip(1))?;

    let config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => ImageConfig::load_from_path(Path::new(&path))?,
        None => ImageConfig::default(),
    };

    let handler = ImageHandler::new(config);
    if let Some(profile) = profile {
        handler.set_performance_profile(profile)?;
    }
    let session = UploadSession::new(handler);

    for path in paths {
        let file = SourceFile::from_path(&path).await?;
        let summary = match session.select_from_picker(file).await {
            SelectionOutcome::Completed(result) => json!({
                "file": path.display().to_string(),
                "status": "done",
                "was_resized": result.was_resized,
                "original": {
                    "size": format_file_size(result.original_size),
                    "dimensions": format_dimensions(result.original_dimensions.width, result.original_dimensions.height),
                },
                "processed": {
                    "size": format_file_size(result.processed_size),
                    "dimensions": format_dimensions(result.dimensions.width, result.dimensions.height),
                    "media_type": result.encoded.media_type,
                },
                "compression_ratio": format!("{:.1}%", result.compression_ratio()),
            }),
            SelectionOutcome::Rejected(error) => json!({
                "file": path.display().to_string(),
                "status": "failed",
                "error": error,
            }),
            SelectionOutcome::Superseded => json!({
                "file": path.display().to_string(),
                "status": "superseded",
            }),
        };
        println!("{summary}");
    }

    Ok(())
}

fn parse_args(
    mut args: impl Iterator<Item = String>,
) -> Result<(Option<ImagePerformanceProfile>, Vec<PathBuf>), AppError> {
    let mut profile = None;
    let mut paths = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "--profile" {
            let value = args
                .next()
                .ok_or_else(|| AppError::Config("--profile requires a value".to_string()))?;
            profile = Some(ImagePerformanceProfile::from_str(&value)?);
        } else {
            paths.push(PathBuf::from(arg));
        }
    }

    if paths.is_empty() {
        return Err(AppError::Config(
            "usage: fashion-upload [--profile quality|balanced|speed] <image>...".to_string(),
        ));
    }

    Ok((profile, paths))
}
