//! Terminal QR rendering for device pairing.

use chorus_core::error::ChorusError;
use qrcode::{Color, EcLevel, QrCode};

/// Render a QR code with Unicode half blocks, two module rows per text line.
pub fn generate_qr_terminal(qr_data: &str) -> Result<String, ChorusError> {
    let code = QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::L)
        .map_err(|e| ChorusError::Channel(format!("QR generation failed: {e}")))?;

    let width = code.width();
    let colors = code.into_colors();
    let dark = |row: usize, col: usize| row < width && colors[row * width + col] == Color::Dark;

    let mut out = String::with_capacity(width * (width / 2 + 1) * 3);
    for row in (0..width).step_by(2) {
        for col in 0..width {
            out.push(match (dark(row, col), dark(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }
    Ok(out)
}
