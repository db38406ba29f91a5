//! Serial port line channel
//!
//! Provides port enumeration and a [`LineChannel`] over a USB/ACM serial
//! device. Reads use a short port timeout and reassemble lines in a local
//! buffer, so `read_line` can honour its own deadline.

use super::LineChannel;
use fiberkit_core::{Error, ProtocolError, Result};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Per-read timeout on the port itself.
const PORT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Information about an available serial port
#[derive(Debug, Clone, Serialize)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

/// List serial ports a printer board could be attached to
///
/// Filters to:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => Ok(ports
            .iter()
            .filter(|port| is_printer_port(&port.port_name))
            .map(|port| {
                let info = SerialPortInfo::new(&port.port_name, port_description(port));
                match &port.port_type {
                    serialport::SerialPortType::UsbPort(usb_info) => {
                        let info = info.with_usb_ids(usb_info.vid, usb_info.pid);
                        match &usb_info.manufacturer {
                            Some(mfg) => info.with_manufacturer(mfg),
                            None => info,
                        }
                    }
                    _ => info,
                }
            })
            .collect()),
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(Error::other(format!("Failed to enumerate ports: {}", e)))
        }
    }
}

fn is_printer_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial-")
        || port_name.starts_with("/dev/cu.usbmodem")
}

fn port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Line channel over an open serial port
pub struct SerialLineChannel {
    port: Box<dyn serialport::SerialPort>,
    name: String,
    pending: Vec<u8>,
}

impl SerialLineChannel {
    /// Open `port_name` at `baud_rate` (8N1, no flow control)
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(PORT_READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", port_name, e);
                Error::other(format!("Failed to open port {}: {}", port_name, e))
            })?;

        tracing::info!("Opened {} at {} baud", port_name, baud_rate);
        Ok(Self {
            port,
            name: port_name.to_string(),
            pending: Vec::new(),
        })
    }

    /// Open the first listed port that accepts an open at `baud_rate`
    pub fn open_first(baud_rate: u32) -> Result<Self> {
        for info in list_ports()? {
            match Self::open(&info.port_name, baud_rate) {
                Ok(channel) => return Ok(channel),
                Err(e) => tracing::debug!("Skipping {}: {}", info.port_name, e),
            }
        }
        Err(Error::other("No serial port found."))
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=end).collect();
        Some(String::from_utf8_lossy(&raw).trim().to_string())
    }
}

impl LineChannel for SerialLineChannel {
    fn write_line(&mut self, line: &str) -> Result<()> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.port.write_all(&bytes).map_err(io_error)?;
        self.port.flush().map_err(io_error)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }

        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 256];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => return Err(ProtocolError::ChannelClosed.into()),
                Ok(n) => {
                    self.pending.extend_from_slice(&buf[..n]);
                    if let Some(line) = self.take_line() {
                        return Ok(Some(line));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => return Err(io_error(e)),
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.pending.clear();
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(|e| Error::other(format!("Failed to clear buffers: {}", e)))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

fn io_error(e: io::Error) -> Error {
    ProtocolError::Io {
        reason: e.to_string(),
    }
    .into()
}
