//! Login QR rendering for terminals and browsers.

use {
    base64::Engine as _,
    image::{ImageBuffer, ImageFormat, Luma},
    qrcode::{Color, EcLevel, QrCode},
};

/// Pixels per QR module in the PNG rendering.
const MODULE_PX: u32 = 8;
/// Light modules around the code, as scanners expect.
const QUIET_ZONE: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("QR payload is empty")]
    Empty,
    #[error("failed to encode QR payload: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("failed to encode PNG: {0}")]
    Png(#[from] image::ImageError),
}

fn encode(payload: &str) -> Result<QrCode, QrError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(QrError::Empty);
    }
    Ok(QrCode::with_error_correction_level(
        payload.as_bytes(),
        EcLevel::L,
    )?)
}

/// Render as unicode half blocks, two module rows per text line.
pub fn render_terminal(payload: &str) -> Result<String, QrError> {
    Ok(encode(payload)?
        .render::<qrcode::render::unicode::Dense1x2>()
        .quiet_zone(true)
        .build())
}

/// Render as a grayscale PNG.
pub fn render_png(payload: &str) -> Result<Vec<u8>, QrError> {
    let code = encode(payload)?;
    let modules = code.width() as u32;
    let size = (modules + QUIET_ZONE * 2) * MODULE_PX;

    let img = ImageBuffer::from_fn(size, size, |x, y| {
        let (mx, my) = (x / MODULE_PX, y / MODULE_PX);
        let inside = (QUIET_ZONE..QUIET_ZONE + modules).contains(&mx)
            && (QUIET_ZONE..QUIET_ZONE + modules).contains(&my);
        if !inside {
            return Luma([255u8]);
        }
        match code[((mx - QUIET_ZONE) as usize, (my - QUIET_ZONE) as usize)] {
            Color::Dark => Luma([0u8]),
            Color::Light => Luma([255u8]),
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Render as a `data:image/png;base64,...` URL for an `<img src>`.
pub fn render_data_url(payload: &str) -> Result<String, QrError> {
    let png = render_png(payload)?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}
