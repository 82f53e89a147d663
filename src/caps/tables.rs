//! Static resolution tables for the three WFD mode families.
//!
//! Each family is a 32-bit bitmap. Bit 0 is reserved (the "unknown" point
//! of the enumeration); defined modes occupy bits 1 and up, so e.g.
//! 1280x720p30 in the CEA family is bit 6 (`0x40`). A lookup of a defined
//! bit always yields a mode with a non-zero width.

use super::VideoMode;

const fn mode(width: u32, height: u32, framerate: u32, interleaved: bool) -> VideoMode {
    VideoMode {
        width,
        height,
        framerate,
        interleaved,
    }
}

/// CEA modes, indexed by bit position - 1.
pub(super) const CEA_MODES: [VideoMode; 17] = [
    mode(640, 480, 60, false),
    mode(720, 480, 60, false),
    mode(720, 480, 60, true),
    mode(720, 576, 50, false),
    mode(720, 576, 50, true),
    mode(1280, 720, 30, false),
    mode(1280, 720, 60, false),
    mode(1920, 1080, 30, false),
    mode(1920, 1080, 60, false),
    mode(1920, 1080, 60, true),
    mode(1280, 720, 25, false),
    mode(1280, 720, 50, false),
    mode(1920, 1080, 25, false),
    mode(1920, 1080, 50, false),
    mode(1920, 1080, 50, true),
    mode(1280, 720, 24, false),
    mode(1920, 1080, 24, false),
];

/// VESA modes, indexed by bit position - 1.
pub(super) const VESA_MODES: [VideoMode; 30] = [
    mode(800, 600, 30, false),
    mode(800, 600, 60, false),
    mode(1024, 768, 30, false),
    mode(1024, 768, 60, false),
    mode(1152, 864, 30, false),
    mode(1152, 864, 60, false),
    mode(1280, 768, 30, false),
    mode(1280, 768, 60, false),
    mode(1280, 800, 30, false),
    mode(1280, 800, 60, false),
    mode(1360, 768, 30, false),
    mode(1360, 768, 60, false),
    mode(1366, 768, 30, false),
    mode(1366, 768, 60, false),
    mode(1280, 1024, 30, false),
    mode(1280, 1024, 60, false),
    mode(1400, 1050, 30, false),
    mode(1400, 1050, 60, false),
    mode(1440, 900, 30, false),
    mode(1440, 900, 60, false),
    mode(1600, 900, 30, false),
    mode(1600, 900, 60, false),
    mode(1600, 1200, 30, false),
    mode(1600, 1200, 60, false),
    mode(1680, 1024, 30, false),
    mode(1680, 1024, 60, false),
    mode(1680, 1050, 30, false),
    mode(1680, 1050, 60, false),
    mode(1920, 1200, 30, false),
    mode(1920, 1200, 60, false),
];

/// Handheld modes, indexed by bit position - 1. All progressive.
pub(super) const HH_MODES: [VideoMode; 12] = [
    mode(800, 480, 30, false),
    mode(800, 480, 60, false),
    mode(854, 480, 30, false),
    mode(854, 480, 60, false),
    mode(864, 480, 30, false),
    mode(864, 480, 60, false),
    mode(640, 360, 30, false),
    mode(640, 360, 60, false),
    mode(960, 540, 30, false),
    mode(960, 540, 60, false),
    mode(848, 480, 30, false),
    mode(848, 480, 60, false),
];
