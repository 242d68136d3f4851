//! Compile-time configuration for CamDeck
//! RP2040 button panel driving a Blackmagic camera over USB networking

// ===================================================================
// USB Configuration
// ===================================================================

pub const USB_VID: u16 = 0xc0de;
pub const USB_PID: u16 = 0xcafe;
pub const USB_MANUFACTURER: &str = "CamDeck";
pub const USB_PRODUCT: &str = "CamDeck USB Ethernet";
pub const USB_SERIAL: &str = "CAMDECK00001";
pub const USB_MAX_POWER_MA: u16 = 100;

/// MAC address presented to the USB host side of the NCM link
pub const USB_HOST_MAC: [u8; 6] = [0x88, 0x88, 0x88, 0x88, 0x88, 0x88];
/// MAC address of our own network interface
pub const USB_DEVICE_MAC: [u8; 6] = [0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC];
pub const USB_NCM_MTU: usize = 1514;

// ===================================================================
// Network Configuration
// ===================================================================

pub const OWN_IP: [u8; 4] = [10, 0, 7, 5];
pub const OWN_PREFIX_LEN: u8 = 24;

pub const CAMERA_IP: [u8; 4] = [10, 0, 7, 16];
pub const CAMERA_PORT: u16 = 80;
pub const CAMERA_HOST: &str = "Micro-Studio-Camera-4K-G2.local";
pub const API_PREFIX: &str = "/control/api/v1/";

// Fixed seed, the link is point-to-point over USB
pub const NET_RANDOM_SEED: u64 = 0x0a00_0705_c0de_cafe;

// ===================================================================
// HTTP Request Engine
// ===================================================================

/// Requests tracked at once (active plus completed-but-unconsumed)
pub const MAX_IN_FLIGHT: usize = 4;
/// Largest fully formatted request
pub const REQUEST_CAPACITY: usize = 512;
/// Response accumulator per request, excess bytes are dropped
pub const RESPONSE_CAPACITY: usize = 2048;
/// Largest fragment delivered by one socket read
pub const SOCKET_CHUNK_SIZE: usize = 256;
pub const SOCKET_RX_BUFFER: usize = 2048;
pub const SOCKET_TX_BUFFER: usize = 1024;
pub const REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Socket workers. A worker stays taken until its socket is fully closed,
/// which outlasts the request slot in the engine.
pub const SOCKET_WORKERS: usize = 2 * MAX_IN_FLIGHT;
/// TCP sockets in the embassy-net stack, one per worker
pub const NET_SOCKET_SLOTS: usize = SOCKET_WORKERS;

/// Control loop period
pub const CONTROL_POLL_MS: u64 = 2;

// ===================================================================
// Camera API Endpoints (relative to API_PREFIX)
// ===================================================================

pub const PATH_GAIN: &str = "video/gain";
pub const PATH_WHITE_BALANCE: &str = "video/whiteBalance";
pub const PATH_WHITE_BALANCE_AUTO: &str = "video/whiteBalance/doAuto";
pub const PATH_RECORD: &str = "transports/0/record";
pub const PATH_STOP: &str = "transports/0/stop";
pub const PATH_AUTO_FOCUS: &str = "lens/focus/doAutoFocus";

pub const KEY_GAIN: &str = "gain";
pub const KEY_WHITE_BALANCE: &str = "whiteBalance";
pub const KEY_RECORDING: &str = "recording";

// ===================================================================
// Camera Parameter Ranges
// ===================================================================

pub const GAIN_MIN_DB: i32 = -12;
pub const GAIN_MAX_DB: i32 = 36;
pub const GAIN_STEP_DB: i32 = 6;
pub const GAIN_DEFAULT_DB: i32 = 0;
pub const NATIVE_GAIN_DB: i32 = 18;

pub const WB_MIN_K: i32 = 1800;
pub const WB_MAX_K: i32 = 9900;
pub const WB_STEP_K: i32 = 100;
pub const WB_DEFAULT_K: i32 = 3000;
pub const WB_PRESETS_K: [i32; 5] = [2800, 4000, 5200, 6000, 7000];

/// Highest cursor row (0 = gain, 1 = white balance)
pub const CURSOR_MAX: u8 = 1;

// ===================================================================
// Button Timing
// ===================================================================

pub const MAX_BUTTONS: usize = 4;

pub const TWO_BUTTON_DEBOUNCE_MS: u32 = 200;
pub const TWO_BUTTON_LONG_PRESS_MS: u32 = 800;

pub const THREE_BUTTON_DEBOUNCE_MS: u32 = 50;
pub const THREE_BUTTON_LONG_PRESS_MS: u32 = 500;

// ===================================================================
// GPIO Pin Assignments - Raspberry Pi Pico
// ===================================================================

// Two-button board (Pico-LCD-1.14 style carrier)
pub const TWO_BUTTON_KEY_A_PIN: u8 = 15;
pub const TWO_BUTTON_KEY_B_PIN: u8 = 17;

// Three-button board, grounds are plain GPIOs driven low
pub const THREE_BUTTON_RECORD_PIN: u8 = 14;
pub const THREE_BUTTON_FOCUS_PIN: u8 = 10;
pub const THREE_BUTTON_AUX_PIN: u8 = 13;
pub const THREE_BUTTON_GROUND_PINS: [u8; 3] = [11, 12, 15];

// Status display on SPI1
pub const DISPLAY_DC_PIN: u8 = 8;
pub const DISPLAY_CS_PIN: u8 = 9;
pub const DISPLAY_SCK_PIN: u8 = 10;
pub const DISPLAY_MOSI_PIN: u8 = 11;
pub const DISPLAY_RST_PIN: u8 = 12;
pub const DISPLAY_BL_PIN: u8 = 13;
pub const SPI_BAUDRATE: u32 = 10_000_000;

pub const LED_STATUS_PIN: u8 = 25;

// ===================================================================
// Display Geometry (ST7789, 1.14" 240x135, landscape)
// ===================================================================

pub const DISPLAY_WIDTH: u32 = 240;
pub const DISPLAY_HEIGHT: u32 = 135;
pub const DISPLAY_X_OFFSET: u16 = 40;
pub const DISPLAY_Y_OFFSET: u16 = 53;

// ===================================================================
// ST7789 Display Commands
// ===================================================================

pub const ST7789_SWRESET: u8 = 0x01; // Software reset
pub const ST7789_SLPOUT: u8 = 0x11; // Sleep out
pub const ST7789_NORON: u8 = 0x13; // Normal display mode
pub const ST7789_INVON: u8 = 0x21; // Display inversion on
pub const ST7789_DISPON: u8 = 0x29; // Display on
pub const ST7789_CASET: u8 = 0x2A; // Column address set
pub const ST7789_RASET: u8 = 0x2B; // Row address set
pub const ST7789_RAMWR: u8 = 0x2C; // Memory write
pub const ST7789_MADCTL: u8 = 0x36; // Memory data access control
pub const ST7789_COLMOD: u8 = 0x3A; // Color mode

pub const ST7789_MADCTL_LANDSCAPE: u8 = 0x70;
pub const ST7789_COLOR_MODE_16BIT: u8 = 0x05; // RGB565 format
