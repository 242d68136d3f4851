//! Application supervisor and monitoring
//!
//! Startup banner and a slow heartbeat that reports uptime and whether the
//! USB network link is configured.

use embassy_net::Stack;
use embassy_time::{Duration, Timer};

use crate::board::{Board, BoardConfig};
use crate::config::*;
use crate::types::APP_VERSION;

/// Seconds between status reports
const STATUS_INTERVAL_S: u32 = 60;

/// Application supervisor responsible for monitoring and lifecycle management
pub struct AppSupervisor {
    board: Board,
    uptime_seconds: u32,
    last_heartbeat: u32,
    link_up: bool,
}

impl AppSupervisor {
    pub fn new_for_board(board: Board) -> Self {
        Self {
            board,
            uptime_seconds: 0,
            last_heartbeat: 0,
            link_up: false,
        }
    }

    /// Print application startup banner with board information
    pub fn print_startup_banner(&self) {
        let board = self.board;
        let [a, b, c, d] = OWN_IP;
        let [ca, cb, cc, cd] = CAMERA_IP;

        info!("========================================");
        info!(
            "CamDeck v{}.{}.{}",
            APP_VERSION.major, APP_VERSION.minor, APP_VERSION.patch
        );
        info!("Camera control panel");
        info!("========================================");
        info!("Board: {} ({} buttons)", board.board_name(), board.buttons().len());
        info!("Display: {}", if board.has_display() { "ST7789 240x135" } else { "none" });
        info!("USB: VID=0x{:04X} PID=0x{:04X} (CDC-NCM)", USB_VID, USB_PID);
        info!("Own address: {}.{}.{}.{}/{}", a, b, c, d, OWN_PREFIX_LEN);
        info!("Camera: {} at {}.{}.{}.{}:{}", CAMERA_HOST, ca, cb, cc, cd, CAMERA_PORT);
        info!("========================================");
    }

    /// Run the supervisor loop, logging link changes as they happen
    pub async fn run(&mut self, stack: Stack<'static>) -> ! {
        info!("Application supervisor started");

        loop {
            Timer::after(Duration::from_secs(10)).await;
            self.uptime_seconds += 10;

            let link_up = stack.is_config_up();
            if link_up != self.link_up {
                if link_up {
                    info!("USB network link up");
                } else {
                    warn!("USB network link down");
                }
                self.link_up = link_up;
            }

            if self.uptime_seconds - self.last_heartbeat >= STATUS_INTERVAL_S {
                self.print_status();
                self.last_heartbeat = self.uptime_seconds;
            }
        }
    }

    fn print_status(&self) {
        let minutes = self.uptime_seconds / 60;
        let hours = minutes / 60;
        let remaining_minutes = minutes % 60;
        let link = if self.link_up { "up" } else { "down" };

        if hours > 0 {
            info!("Status: Uptime {}h{}m, link {}", hours, remaining_minutes, link);
        } else {
            info!("Status: Uptime {}m, link {}", minutes, link);
        }
    }
}
