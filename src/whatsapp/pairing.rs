//! Pairing challenge display.

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use qrcode::QrCode;
use qrcode::render::unicode::Dense1x2;
use qrcode::types::QrError;
use tracing::{info, warn};

/// Shows a pairing challenge (QR payload) to the operator.
pub trait PairingRenderer: Send + Sync {
    fn render(&self, qr: &str);
}

/// Draws the pairing QR code on the terminal.
#[derive(Debug, Clone, Copy)]
pub struct TerminalQrRenderer {
    clear_screen: bool,
}

impl TerminalQrRenderer {
    /// Creates a renderer; `clear_screen` wipes the terminal before drawing.
    #[must_use]
    pub const fn new(clear_screen: bool) -> Self {
        Self { clear_screen }
    }
}

impl Default for TerminalQrRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PairingRenderer for TerminalQrRenderer {
    fn render(&self, qr: &str) {
        let art = match render_qr(qr) {
            Ok(art) => art,
            Err(e) => {
                warn!("Failed to render QR code ({}), raw payload: {}", e, qr);
                return;
            }
        };

        let mut stdout = io::stdout().lock();
        if self.clear_screen {
            let _ = execute!(stdout, Clear(ClearType::All), MoveTo(0, 0));
        }
        let _ = writeln!(stdout, "{art}");
        let _ = writeln!(
            stdout,
            "Scan this code with WhatsApp: Settings > Linked devices > Link a device"
        );
        let _ = stdout.flush();

        info!("Waiting for QR code scan...");
    }
}

/// Renders a payload as a QR code made of Unicode half blocks.
///
/// Colors are inverted so the code reads on dark terminals.
pub fn render_qr(payload: &str) -> Result<String, QrError> {
    let code = QrCode::new(payload.as_bytes())?;
    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_qr_produces_block_art() {
        let art = render_qr("2@abcdef,ghijkl,mnopqr,stuvwx").unwrap();
        assert!(art.lines().count() > 10);
        assert!(art.contains('█') || art.contains('▀') || art.contains('▄'));
    }

    #[test]
    fn test_render_qr_rejects_oversized_payload() {
        let payload = "x".repeat(10_000);
        assert!(render_qr(&payload).is_err());
    }
}
