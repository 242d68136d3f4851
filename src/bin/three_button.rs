//! CamDeck - three-button board
//!
//! This binary builds firmware for the RECORD / FOCUS / AUX panel:
//! - RECORD toggles recording
//! - FOCUS triggers autofocus, long press toggles native gain
//! - AUX cycles white balance presets, long press runs auto white balance

#![cfg_attr(target_os = "none", no_std, no_main)]

#[cfg(target_os = "none")]
mod firmware {
    use camdeck::board::Board;
    use camdeck::buttons::ButtonRegistry;
    use camdeck::config::*;
    use camdeck::*;
    use defmt::*;
    use defmt_rtt as _;
    use embassy_executor::{Executor, InterruptExecutor};
    use embassy_net::{Stack, StackResources};
    use embassy_rp::interrupt;
    use embassy_rp::interrupt::{InterruptExt, Priority};
    use panic_halt as _;
    use static_cell::StaticCell;

    // Set compile-time board selection
    const BOARD: Board = Board::ThreeButton;

    // Button edges run above the network stack
    static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();
    static EXECUTOR_LOW: StaticCell<Executor> = StaticCell::new();
    static REGISTRY: StaticCell<ButtonRegistry> = StaticCell::new();
    static NET_RESOURCES: StaticCell<StackResources<NET_SOCKET_SLOTS>> = StaticCell::new();

    #[interrupt]
    unsafe fn SWI_IRQ_1() {
        EXECUTOR_HIGH.on_interrupt()
    }

    #[cortex_m_rt::entry]
    fn main() -> ! {
        let p = embassy_rp::init(Default::default());

        let supervisor = supervisor::AppSupervisor::new_for_board(BOARD);
        supervisor.print_startup_banner();

        let pins = hardware::create_pins_for_board(p, BOARD);
        let registry: &'static ButtonRegistry =
            REGISTRY.init(hardware::build_registry(BOARD, &pins.buttons));

        interrupt::SWI_IRQ_1.set_priority(Priority::P2);
        let high_spawner = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
        unwrap!(hardware::spawn_button_tasks(&high_spawner, registry, pins.buttons));

        let executor = EXECUTOR_LOW.init(Executor::new());
        executor.run(|spawner| {
            let link = usb::init(pins.usb);
            unwrap!(spawner.spawn(usb::usb_task(link.device)));
            unwrap!(spawner.spawn(usb::usb_ncm_task(link.ncm_runner)));

            let (stack, runner) = embassy_net::new(
                link.net_device,
                net::net_config(),
                NET_RESOURCES.init(StackResources::new()),
                NET_RANDOM_SEED,
            );
            unwrap!(spawner.spawn(net::net_task(runner)));
            for slot in 0..SOCKET_WORKERS {
                unwrap!(spawner.spawn(net::socket_worker(stack, slot)));
            }
            unwrap!(spawner.spawn(hardware::control_task(BOARD, registry)));
            unwrap!(spawner.spawn(hardware::status_task(pins.status_led, stack)));
            unwrap!(spawner.spawn(supervisor_task(supervisor, stack)));

            info!("{} firmware initialized, waiting for USB host", BOARD);
        })
    }

    #[embassy_executor::task]
    async fn supervisor_task(mut supervisor: supervisor::AppSupervisor, stack: Stack<'static>) {
        supervisor.run(stack).await
    }
}

// Host builds (tests) only need a stub entry point
#[cfg(not(target_os = "none"))]
fn main() {}
