// 二维码生成，输出 PNG 字节

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};

const MIN_DIMENSION: u32 = 300;

#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("PNG encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// 余额页面的公开地址
pub fn balance_url(frontend_url: &str, uuid: &str) -> String {
    format!("{}/balance/{}", frontend_url.trim_end_matches('/'), uuid)
}

pub fn render_png(data: &str) -> Result<Vec<u8>, QrError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)?;
    let pixels = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
        .quiet_zone(true)
        .build();

    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(pixels).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}
