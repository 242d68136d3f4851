//! USB CDC-NCM network function
//!
//! The panel enumerates as a USB Ethernet adapter. The NCM class is bridged
//! into an embassy-net device so the camera is reachable over TCP.

use embassy_rp::peripherals;
use embassy_rp::usb::Driver;
use embassy_usb::class::cdc_ncm::embassy_net::{Device, Runner, State as NetState};
use embassy_usb::class::cdc_ncm::{CdcNcmClass, State};
use embassy_usb::{Builder, Config, UsbDevice};
use static_cell::StaticCell;

use crate::config::*;

pub type UsbDriver = Driver<'static, peripherals::USB>;
pub type NcmDevice = Device<'static, USB_NCM_MTU>;
pub type NcmRunner = Runner<'static, UsbDriver, USB_NCM_MTU>;

// ===================================================================
// USB Configuration
// ===================================================================

fn create_usb_config() -> Config<'static> {
    let mut config = Config::new(USB_VID, USB_PID);
    config.manufacturer = Some(USB_MANUFACTURER);
    config.product = Some(USB_PRODUCT);
    config.serial_number = Some(USB_SERIAL);
    config.max_power = USB_MAX_POWER_MA;
    // RP2040 USB hardware limitation (max 64 bytes)
    config.max_packet_size_0 = 64;

    // Composite with IAD so hosts bind the NCM driver
    config.device_class = 0xEF;
    config.device_sub_class = 0x02;
    config.device_protocol = 0x01;
    config.composite_with_iads = true;

    config
}

/// Everything `main` needs to spawn the USB side of the link
pub struct UsbNetwork {
    pub device: UsbDevice<'static, UsbDriver>,
    pub ncm_runner: NcmRunner,
    pub net_device: NcmDevice,
}

/// Build the USB device and the NCM network device. Call once.
pub fn init(driver: UsbDriver) -> UsbNetwork {
    static CONFIG_DESC: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUF: StaticCell<[u8; 128]> = StaticCell::new();
    static NCM_STATE: StaticCell<State> = StaticCell::new();
    static NET_STATE: StaticCell<NetState<USB_NCM_MTU, 4, 4>> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        create_usb_config(),
        &mut CONFIG_DESC.init([0; 256])[..],
        &mut BOS_DESC.init([0; 256])[..],
        &mut [], // no MS OS descriptors
        &mut CONTROL_BUF.init([0; 128])[..],
    );

    let class = CdcNcmClass::new(&mut builder, NCM_STATE.init(State::new()), USB_HOST_MAC, 64);
    let device = builder.build();

    let (ncm_runner, net_device) = class
        .into_embassy_net_device::<USB_NCM_MTU, 4, 4>(NET_STATE.init(NetState::new()), USB_DEVICE_MAC);

    info!("USB NCM configured ({:04x}:{:04x})", USB_VID, USB_PID);

    UsbNetwork {
        device,
        ncm_runner,
        net_device,
    }
}

#[embassy_executor::task]
pub async fn usb_task(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    device.run().await
}

#[embassy_executor::task]
pub async fn usb_ncm_task(runner: NcmRunner) -> ! {
    runner.run().await
}
