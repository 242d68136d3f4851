//! Hardware bring-up and the long-running hardware tasks
//!
//! Pin setup per board, the per-button edge tasks that feed the registry,
//! the control loop task and the status LED.

use embassy_executor::{SendSpawner, SpawnError};
use embassy_net::Stack;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::spi::{self, Spi};
use embassy_rp::usb::Driver;
use embassy_rp::Peripherals;
use embassy_time::{Duration, Instant, Ticker, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use heapless::Vec;
use static_cell::StaticCell;

use crate::board::{Board, BoardConfig};
use crate::buttons::{ButtonRegistry, EdgeOutcome};
use crate::channels::DISPLAY_SIGNAL;
use crate::config::*;
use crate::controller::Controller;
use crate::display::{Panel, St7789};
use crate::net::NetTransport;
use crate::usb::UsbDriver;
use crate::Irqs;

/// Button input together with its GPIO number
pub struct ButtonPin {
    pub pin: u8,
    pub input: Input<'static>,
}

/// Display peripherals, only present on boards with a panel
pub struct DisplayPins {
    pub panel: Panel,
    pub backlight: Output<'static>,
}

/// Everything the board owns after pin setup
pub struct BoardPins {
    pub usb: UsbDriver,
    pub status_led: Output<'static>,
    pub buttons: Vec<ButtonPin, MAX_BUTTONS>,
    pub display: Option<DisplayPins>,
}

fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

// ===================================================================
// Pin Setup
// ===================================================================

/// Claim the pins for `board`. Button order matches `board.buttons()`.
pub fn create_pins_for_board(p: Peripherals, board: Board) -> BoardPins {
    static GROUNDS: StaticCell<Vec<Output<'static>, 3>> = StaticCell::new();

    let usb = Driver::new(p.USB, Irqs);
    let status_led = Output::new(p.PIN_25, Level::Low);
    let mut buttons = Vec::new();

    let display = match board {
        Board::TwoButton => {
            let _ = buttons.push(ButtonPin {
                pin: TWO_BUTTON_KEY_A_PIN,
                input: Input::new(p.PIN_15, Pull::Up),
            });
            let _ = buttons.push(ButtonPin {
                pin: TWO_BUTTON_KEY_B_PIN,
                input: Input::new(p.PIN_17, Pull::Up),
            });

            let mut spi_config = spi::Config::default();
            spi_config.frequency = SPI_BAUDRATE;
            let spi = Spi::new_blocking_txonly(p.SPI1, p.PIN_10, p.PIN_11, spi_config);
            let cs = Output::new(p.PIN_9, Level::High);
            let device = match ExclusiveDevice::new_no_delay(spi, cs) {
                Ok(device) => device,
                Err(never) => match never {},
            };
            let dc = Output::new(p.PIN_8, Level::Low);
            let rst = Output::new(p.PIN_12, Level::High);

            Some(DisplayPins {
                panel: St7789::new(device, dc, rst),
                backlight: Output::new(p.PIN_13, Level::Low),
            })
        }
        Board::ThreeButton => {
            let _ = buttons.push(ButtonPin {
                pin: THREE_BUTTON_RECORD_PIN,
                input: Input::new(p.PIN_14, Pull::Up),
            });
            let _ = buttons.push(ButtonPin {
                pin: THREE_BUTTON_FOCUS_PIN,
                input: Input::new(p.PIN_10, Pull::Up),
            });
            let _ = buttons.push(ButtonPin {
                pin: THREE_BUTTON_AUX_PIN,
                input: Input::new(p.PIN_13, Pull::Up),
            });

            // Outputs reset their pads on drop, so the grounds live forever
            let mut grounds = Vec::new();
            let _ = grounds.push(Output::new(p.PIN_11, Level::Low));
            let _ = grounds.push(Output::new(p.PIN_12, Level::Low));
            let _ = grounds.push(Output::new(p.PIN_15, Level::Low));
            GROUNDS.init(grounds);
            debug!("Ground pins {} driven low", board.ground_pins());

            None
        }
    };

    BoardPins {
        usb,
        status_led,
        buttons,
        display,
    }
}

/// Register every button of `board`, sampling the current pin levels
pub fn build_registry(board: Board, pins: &[ButtonPin]) -> ButtonRegistry {
    let mut registry = ButtonRegistry::new();
    let now = now_ms();

    for (spec, pin) in board.buttons().iter().zip(pins) {
        let pressed = spec.is_active(pin.input.is_high());
        if pressed {
            warn!("{} held at startup, ignored until released", spec.name);
        }
        if let Err(e) = registry.register(*spec, pressed, now) {
            error!("Failed to register {}: {}", spec.name, e);
        }
    }

    registry
}

// ===================================================================
// Task Spawning
// ===================================================================

/// Spawn one edge task per button on the high priority executor
pub fn spawn_button_tasks(
    spawner: &SendSpawner,
    registry: &'static ButtonRegistry,
    pins: Vec<ButtonPin, MAX_BUTTONS>,
) -> Result<(), SpawnError> {
    for (button, pin) in registry.iter().map(|(_, b)| b).zip(pins) {
        spawner.spawn(button_edge_task(
            registry,
            pin,
            button.spec.debounce_ms,
        ))?;
    }
    Ok(())
}

// ===================================================================
// Task Implementations
// ===================================================================

/// Feed every level change of one pin into the registry.
///
/// After an edge the pin is sampled again once the debounce window has
/// passed, so a release that landed inside the window is not lost.
#[embassy_executor::task(pool_size = MAX_BUTTONS)]
pub async fn button_edge_task(registry: &'static ButtonRegistry, mut pin: ButtonPin, debounce_ms: u32) {
    info!("Button task started on GPIO{}", pin.pin);

    loop {
        pin.input.wait_for_any_edge().await;
        let outcome = registry.on_edge(pin.pin, pin.input.is_high(), now_ms());
        if let Some((id, outcome)) = outcome {
            trace!("GPIO{} button {} {}", pin.pin, id.0, outcome);
        }

        Timer::after(Duration::from_millis(u64::from(debounce_ms) + 1)).await;
        if let Some((_, EdgeOutcome::Pressed | EdgeOutcome::Released(_))) =
            registry.on_edge(pin.pin, pin.input.is_high(), now_ms())
        {
            debug!("GPIO{} settled after debounce", pin.pin);
        }
    }
}

/// Main control loop: engine, sequencer and button dispatch
#[embassy_executor::task]
pub async fn control_task(board: Board, registry: &'static ButtonRegistry) {
    let mut controller = Controller::new(board, NetTransport::new());
    let mut ticker = Ticker::every(Duration::from_millis(CONTROL_POLL_MS));

    info!("Control loop started for {} board", board.board_name());

    if board.has_display() {
        DISPLAY_SIGNAL.signal(*controller.state());
    }

    loop {
        ticker.next().await;
        let changed = controller.poll(registry, Instant::now().as_millis());
        if changed && board.has_display() {
            DISPLAY_SIGNAL.signal(*controller.state());
        }
    }
}

/// Status LED: slow heartbeat with the link configured, fast blink without
#[embassy_executor::task]
pub async fn status_task(mut status_led: Output<'static>, stack: Stack<'static>) {
    info!("Status LED task started");

    loop {
        let (on, off) = if stack.is_config_up() {
            (100, 900)
        } else {
            (100, 100)
        };
        status_led.set_high();
        Timer::after(Duration::from_millis(on)).await;
        status_led.set_low();
        Timer::after(Duration::from_millis(off)).await;
    }
}
