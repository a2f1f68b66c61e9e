//! GDEP073E01 display-controller protocol.
//!
//! The controller takes 4-bit color codes packed two per byte, high nibble
//! first, and is driven by a fixed command script over SPI. The SPI
//! transport itself lives outside this crate behind the [`DisplayBus`]
//! trait; this module owns the command sequences, the timing contract and
//! the index-to-code packing.

/// Controller opcodes, from the GDEP073E01 datasheet.
pub mod command {
    /// Panel setting
    pub const PSR: u8 = 0x00;
    /// Power setting
    pub const PWR: u8 = 0x01;
    /// Power off
    pub const POF: u8 = 0x02;
    /// Power off sequence setting
    pub const POFS: u8 = 0x03;
    /// Power on
    pub const PON: u8 = 0x04;
    /// Booster soft start 1
    pub const BTST1: u8 = 0x05;
    /// Booster soft start 2
    pub const BTST2: u8 = 0x06;
    /// Deep sleep
    pub const DSLP: u8 = 0x07;
    /// Booster soft start 3
    pub const BTST3: u8 = 0x08;
    /// Data transmission start
    pub const DTM: u8 = 0x10;
    /// Display refresh
    pub const DRF: u8 = 0x12;
    /// Internal power control
    pub const IPC: u8 = 0x13;
    /// PLL control
    pub const PLL: u8 = 0x30;
    /// Temperature sensor enable
    pub const TSE: u8 = 0x41;
    /// VCOM and data interval setting
    pub const CDI: u8 = 0x50;
    /// Gate/source non-overlap period
    pub const TCON: u8 = 0x60;
    /// Resolution setting
    pub const TRES: u8 = 0x61;
    /// VCOM DC setting
    pub const VDCS: u8 = 0x82;
    /// T-VCOM DC setting
    pub const T_VDCS: u8 = 0x84;
    /// Gate scan direction
    pub const AGID: u8 = 0x86;
    /// Command header
    pub const CMDH: u8 = 0xAA;
    /// Cascade setting
    pub const CCSET: u8 = 0xE0;
    /// Power saving
    pub const PWS: u8 = 0xE3;
    /// Temperature sensor write
    pub const TSSET: u8 = 0xE6;
}

/// Number of colors the controller can address.
pub const CONTROLLER_PALETTE_SIZE: usize = 6;

/// Native panel width in pixels.
pub const PANEL_WIDTH: usize = 800;
/// Native panel height in pixels.
pub const PANEL_HEIGHT: usize = 480;

/// The fixed initialization script: (opcode, payload) pairs sent once
/// after reset, before any frame data.
pub const INIT_SEQUENCE: &[(u8, &[u8])] = &[
    (command::CMDH, &[0x49, 0x55, 0x20, 0x08, 0x09, 0x18]),
    (command::PWR, &[0x3F, 0x00, 0x32, 0x2A, 0x0E, 0x2A]),
    (command::PSR, &[0x5F, 0x69]),
    (command::POFS, &[0x00, 0x54, 0x00, 0x44]),
    (command::BTST1, &[0x40, 0x1F, 0x1F, 0x2C]),
    (command::BTST2, &[0x6F, 0x1F, 0x16, 0x25]),
    (command::BTST3, &[0x6F, 0x1F, 0x1F, 0x22]),
    (command::IPC, &[0x00, 0x04]),
    (command::PLL, &[0x02]),
    (command::TSE, &[0x00]),
    (command::CDI, &[0x3F]),
    (command::TCON, &[0x02, 0x00]),
    (command::TRES, &[0x03, 0x20, 0x01, 0xE0]),
    (command::VDCS, &[0x1E]),
    (command::T_VDCS, &[0x01]),
    (command::AGID, &[0x00]),
    (command::PWS, &[0x2F]),
    (command::CCSET, &[0x00]),
    (command::TSSET, &[0x00]),
];

/// Map a dithered palette index to the controller's color code.
///
/// The controller skips code 4, so indices 4 and 5 shift up by one. The
/// mapping is keyed to the controller's code space, not to any particular
/// palette declaration order. Out-of-range indices clamp to the last color.
#[inline]
pub fn controller_code(index: u8) -> u8 {
    let index = index.min(CONTROLLER_PALETTE_SIZE as u8 - 1);
    if index >= 4 {
        index + 1
    } else {
        index
    }
}

/// Pack palette indices into the controller's 4-bit-per-cell data stream,
/// two codes per byte with the first pixel in the high nibble. An odd
/// tail pixel is padded with a zero low nibble.
pub fn pack_frame(indices: &[u8]) -> Vec<u8> {
    indices
        .chunks(2)
        .map(|pair| {
            let high = controller_code(pair[0]);
            let low = pair.get(1).copied().map(controller_code).unwrap_or(0);
            (high << 4) | (low & 0x0F)
        })
        .collect()
}

/// The transport seam to the SPI driver and GPIO lines.
///
/// Implementations hold the data/command line according to the per-byte
/// contract: low while the opcode byte is on the wire, high for payload.
pub trait DisplayBus {
    /// Send a single opcode byte with the data/command line low.
    fn write_command(&mut self, opcode: u8);
    /// Send payload bytes with the data/command line high.
    fn write_data(&mut self, data: &[u8]);
    /// Whether the controller reports busy (busy line pulled low).
    fn busy(&mut self) -> bool;
    /// Block for the given number of milliseconds.
    fn delay_ms(&mut self, ms: u64);
}

/// Busy-poll cadence.
const BUSY_POLL_MS: u64 = 10;
/// Refresh can take this long on a cold panel.
pub const REFRESH_TIMEOUT_MS: u64 = 45_000;
const POWER_TIMEOUT_MS: u64 = 400;
const RESET_TIMEOUT_MS: u64 = 1_000;

/// Driver state machine for the GDEP073E01 controller.
pub struct Gdep073e01<B: DisplayBus> {
    bus: B,
}

impl<B: DisplayBus> Gdep073e01<B> {
    /// Wrap a transport.
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Release the transport.
    pub fn into_inner(self) -> B {
        self.bus
    }

    fn send(&mut self, opcode: u8, data: &[u8]) {
        self.bus.write_command(opcode);
        if !data.is_empty() {
            self.bus.write_data(data);
        }
    }

    /// Poll the busy line at a 10 ms cadence until it deasserts or the
    /// timeout elapses. A timeout is logged and the state machine moves on.
    ///
    /// A line that is already high at entry means the panel gives no busy
    /// signal at all (pulled up by the host); the full timeout is waited
    /// out to be safe.
    fn busy_wait(&mut self, timeout_ms: u64) {
        if !self.bus.busy() {
            self.bus.delay_ms(timeout_ms);
            return;
        }

        let mut waited = 0u64;
        while self.bus.busy() {
            self.bus.delay_ms(BUSY_POLL_MS);
            waited += BUSY_POLL_MS;
            if waited >= timeout_ms {
                tracing::warn!(timeout_ms, "display busy-wait timed out");
                return;
            }
        }
    }

    /// Run the fixed initialization script. The host must have pulsed the
    /// reset line beforehand.
    pub fn init(&mut self) {
        self.busy_wait(RESET_TIMEOUT_MS);
        for &(opcode, data) in INIT_SEQUENCE {
            self.send(opcode, data);
        }
    }

    /// Transfer a full frame of palette indices and refresh the panel:
    /// data, power on, refresh (up to 45 s busy), power off.
    pub fn display_frame(&mut self, indices: &[u8]) {
        self.init();

        let frame = pack_frame(indices);
        self.send(command::DTM, &frame);

        self.send(command::PON, &[]);
        self.busy_wait(POWER_TIMEOUT_MS);

        self.send(command::DRF, &[0x00]);
        self.busy_wait(REFRESH_TIMEOUT_MS);

        self.send(command::POF, &[0x00]);
        self.busy_wait(POWER_TIMEOUT_MS);
    }

    /// Put the controller into deep sleep. Only a reset pulse wakes it.
    pub fn deep_sleep(&mut self) {
        self.send(command::DSLP, &[0xA5]);
    }
}
