//! USB HID transport backed by the `hidapi` crate.
//!
//! The controller enumerates as a vendor HID device with 64-byte reports.
//! Its address is the USB serial number.

use std::sync::Arc;
use std::time::Duration;

use hidapi::{HidApi, HidDevice, HidError};
use log::{debug, info};
use parking_lot::Mutex;

use crate::error::TransportError;

use super::transport::{Connector, LinkParams, Transport};

pub const USB_VID: u16 = 0x31CB;
pub const USB_PIDS: [u16; 2] = [0x00A1, 0x00A2];

const REPORT_SIZE: usize = 64;

/// hidapi on Windows expects the report id in front of every write.
const LINK: LinkParams = LinkParams {
    report_size: REPORT_SIZE,
    leading_pad: if cfg!(windows) { Some(0x00) } else { None },
};

fn device_error(e: HidError) -> TransportError {
    TransportError::Device(e.to_string())
}

/// Opens SMCP controllers by serial number.
pub struct HidConnector {
    api: Mutex<HidApi>,
}

impl HidConnector {
    pub fn new() -> Result<Self, TransportError> {
        let api = HidApi::new().map_err(device_error)?;
        Ok(Self {
            api: Mutex::new(api),
        })
    }
}

impl Connector for HidConnector {
    fn connect(&self, address: &str) -> Result<Arc<dyn Transport>, TransportError> {
        let mut api = self.api.lock();
        api.refresh_devices().map_err(device_error)?;

        let info = api
            .device_list()
            .find(|d| {
                d.vendor_id() == USB_VID
                    && USB_PIDS.contains(&d.product_id())
                    && d.serial_number() == Some(address)
            })
            .ok_or_else(|| TransportError::NotFound(address.to_owned()))?;

        let device = info.open_device(&api).map_err(device_error)?;
        info!("hid: opened {:04X}:{:04X} serial {}", USB_VID, info.product_id(), address);
        Ok(Arc::new(HidTransport {
            device: Mutex::new(Some(device)),
        }))
    }

    fn enumerate(&self, filter: Option<&str>) -> Result<Vec<String>, TransportError> {
        let mut api = self.api.lock();
        api.refresh_devices().map_err(device_error)?;

        let ports = api
            .device_list()
            .filter(|d| d.vendor_id() == USB_VID && USB_PIDS.contains(&d.product_id()))
            .filter_map(|d| d.serial_number().map(str::to_owned))
            .filter(|serial| filter.is_none_or(|f| f == serial.as_str()))
            .collect();
        Ok(ports)
    }
}

/// An open HID controller.
pub struct HidTransport {
    device: Mutex<Option<HidDevice>>,
}

impl Transport for HidTransport {
    fn write(&self, report: &[u8]) -> Result<(), TransportError> {
        let device = self.device.lock();
        let device = device.as_ref().ok_or(TransportError::Disconnected)?;
        device.write(report).map_err(device_error)?;
        Ok(())
    }

    fn read(&self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let device = self.device.lock();
        let device = device.as_ref().ok_or(TransportError::Disconnected)?;
        let mut buf = [0u8; REPORT_SIZE];
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let n = device.read_timeout(&mut buf, millis).map_err(device_error)?;
        Ok(buf[..n].to_vec())
    }

    fn close(&self) {
        if self.device.lock().take().is_some() {
            debug!("hid: device closed");
        }
    }

    fn link(&self) -> LinkParams {
        LINK
    }
}
