//! Laser driver detection and control.

use std::thread::sleep;
use std::time::Duration;

use palaser_core::control::LaserControl;
use palaser_core::{LaserState, Sequence};
use rusb::{Context, Direction, Recipient, RequestType, TransferType, UsbContext};
use tracing::{debug, info, warn};

use crate::error::{HidError, HidResult};
use crate::protocol::{
    ADC_CHANNELS, ADC_OFFSET, CONTROL_INTERFACE, FALLBACK_IN_ENDPOINT, HID_SET_REPORT, LASER_PID,
    LASER_VID, Opcodes, OUTPUT_REPORT_VALUE, REPORT_LEN,
};
use crate::report::{InputReport, OutputReport, sequence_reports};

/// Bytes an input report needs to carry the state byte and every ADC channel.
const MIN_INPUT_LEN: usize = ADC_OFFSET + 2 * ADC_CHANNELS as usize;

/// Connection settings for the laser driver.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// HID interface number
    pub interface: u8,
    /// Timeout of a single USB transfer
    pub timeout: Duration,
    /// Pause after each command report
    pub command_delay: Duration,
    /// Reads per state query; the first report after a command is often stale
    pub state_reads: u8,
    /// Pad output reports to the full report size
    pub pad_reports: bool,
    /// Firmware opcode table
    pub opcodes: Opcodes,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            vendor_id: LASER_VID,
            product_id: LASER_PID,
            interface: CONTROL_INTERFACE,
            timeout: Duration::from_millis(1000),
            command_delay: Duration::from_millis(10),
            state_reads: 2,
            pad_reports: cfg!(windows),
            opcodes: Opcodes::default(),
        }
    }
}

/// Raw report transport underneath [`LaserDriver`].
pub trait ReportLink {
    /// Send one output report, returning the number of bytes written.
    ///
    /// # Errors
    /// Returns an error if the transfer fails.
    fn write_report(&mut self, data: &[u8]) -> HidResult<usize>;

    /// Receive one input report.
    ///
    /// # Errors
    /// Returns an error if the transfer fails.
    fn read_report(&mut self, buf: &mut [u8; REPORT_LEN]) -> HidResult<usize>;
}

/// `rusb` transport: SET_REPORT control transfers out, interrupt reads in.
pub struct UsbLink {
    handle: rusb::DeviceHandle<Context>,
    interface: u8,
    endpoint: u8,
    timeout: Duration,
}

impl UsbLink {
    /// Open the first device matching the configured IDs.
    ///
    /// Returns `Ok(None)` if no such device is attached, or if libusb cannot
    /// be initialised on this host.
    ///
    /// # Errors
    /// Returns an error if the device is present but cannot be opened or
    /// claimed.
    pub fn open(settings: &DriverSettings) -> HidResult<Option<Self>> {
        Self::open_in(Context::new(), settings)
    }

    fn open_in(
        context: rusb::Result<Context>,
        settings: &DriverSettings,
    ) -> HidResult<Option<Self>> {
        let context = match context {
            Ok(context) => context,
            Err(e) => {
                warn!(error = %e, "Failed to initialise libusb");
                return Ok(None);
            }
        };

        let Some(device) = find_device(&context, settings.vendor_id, settings.product_id) else {
            debug!("No laser driver found");
            return Ok(None);
        };

        let mut handle = device.open()?;
        if rusb::supports_detach_kernel_driver() {
            // The kernel binds usbhid to the board; it must let go before claiming
            handle.set_auto_detach_kernel_driver(true)?;
        }
        handle.claim_interface(settings.interface)?;

        let endpoint = find_in_endpoint(&device, settings.interface).unwrap_or_else(|| {
            warn!(
                endpoint = FALLBACK_IN_ENDPOINT,
                "No interrupt IN endpoint in descriptor, using fallback"
            );
            FALLBACK_IN_ENDPOINT
        });

        info!(
            bus = device.bus_number(),
            address = device.address(),
            endpoint,
            "Laser driver opened"
        );

        Ok(Some(Self { handle, interface: settings.interface, endpoint, timeout: settings.timeout }))
    }
}

impl ReportLink for UsbLink {
    fn write_report(&mut self, data: &[u8]) -> HidResult<usize> {
        let request_type =
            rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface);
        let written = self.handle.write_control(
            request_type,
            HID_SET_REPORT,
            OUTPUT_REPORT_VALUE,
            u16::from(self.interface),
            data,
            self.timeout,
        )?;
        Ok(written)
    }

    fn read_report(&mut self, buf: &mut [u8; REPORT_LEN]) -> HidResult<usize> {
        Ok(self.handle.read_interrupt(self.endpoint, buf, self.timeout)?)
    }
}

impl Drop for UsbLink {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(self.interface) {
            debug!(error = %e, "Failed to release laser driver interface");
        }
    }
}

/// An open laser driver board.
pub struct LaserDriver<L = UsbLink> {
    link: L,
    opcodes: Opcodes,
    command_delay: Duration,
    state_reads: u8,
    pad_reports: bool,
}

impl LaserDriver<UsbLink> {
    /// Attempt to open a connected laser driver.
    ///
    /// # Errors
    /// Returns an error if a device is found but cannot be opened.
    pub fn detect(settings: &DriverSettings) -> HidResult<Option<Self>> {
        Ok(UsbLink::open(settings)?.map(|link| Self::with_link(link, settings)))
    }
}

impl<L: ReportLink> LaserDriver<L> {
    /// Wrap an already open report link.
    pub fn with_link(link: L, settings: &DriverSettings) -> Self {
        Self {
            link,
            opcodes: settings.opcodes,
            command_delay: settings.command_delay,
            state_reads: settings.state_reads.max(1),
            pad_reports: settings.pad_reports,
        }
    }

    fn send(&mut self, report: &OutputReport) -> HidResult<()> {
        let wire = report.to_wire(self.pad_reports);
        let written = self.link.write_report(&wire)?;
        if written == wire.len() {
            debug!(opcode = report.opcode(), len = written, "Report sent");
        } else {
            warn!(opcode = report.opcode(), expected = wire.len(), written, "Short report write");
        }
        if !self.command_delay.is_zero() {
            sleep(self.command_delay);
        }
        Ok(())
    }

    fn command(&mut self, opcode: u8) -> HidResult<()> {
        self.send(&OutputReport::command(opcode))
    }

    /// Read `state_reads` reports and keep the last one.
    fn read(&mut self) -> HidResult<InputReport> {
        let mut buf = [0u8; REPORT_LEN];
        let mut read = 0;
        for _ in 0..self.state_reads {
            buf.fill(0);
            read = self.link.read_report(&mut buf)?;
            if read < REPORT_LEN {
                debug!(read, "Short input report");
            }
        }
        if read < MIN_INPUT_LEN {
            return Err(HidError::ProtocolError(format!(
                "input report too short ({read} of {MIN_INPUT_LEN} bytes)"
            )));
        }
        Ok(InputReport::new(buf))
    }
}

impl<L: ReportLink> LaserControl for LaserDriver<L> {
    fn laser_state(&mut self) -> palaser_core::Result<LaserState> {
        let state = self.read()?.laser_state()?;
        debug!(?state, "Laser state read");
        Ok(state)
    }

    fn turn_off(&mut self) -> palaser_core::Result<()> {
        self.command(self.opcodes.hardware_sequence_disable)?;
        self.command(self.opcodes.laser_off)?;
        Ok(())
    }

    fn send_frequency_word(&mut self, word: u16) -> palaser_core::Result<()> {
        self.send(&OutputReport::command(self.opcodes.frequency_word).with_u16(word))?;
        Ok(())
    }

    fn enable_hardware_sequence(&mut self) -> palaser_core::Result<()> {
        Ok(self.command(self.opcodes.hardware_sequence_enable)?)
    }

    fn set_sequence_mode(&mut self, mode: u8) -> palaser_core::Result<()> {
        self.send(&OutputReport::command(self.opcodes.sequence_mode).with_u8(mode))?;
        Ok(())
    }

    fn clear_sequence(&mut self) -> palaser_core::Result<()> {
        Ok(self.command(self.opcodes.clear_sequence)?)
    }

    fn upload_sequence(&mut self, sequence: &Sequence) -> palaser_core::Result<()> {
        let reports = sequence_reports(&self.opcodes, sequence)?;
        debug!(reports = reports.len(), "Uploading sequence");
        for report in &reports {
            self.send(report)?;
        }
        Ok(())
    }

    fn enable_timer(&mut self) -> palaser_core::Result<()> {
        Ok(self.command(self.opcodes.timer_enable)?)
    }

    fn disable_timer(&mut self) -> palaser_core::Result<()> {
        Ok(self.command(self.opcodes.timer_disable)?)
    }

    fn set_interrupt_period(&mut self, period_ms: u32) -> palaser_core::Result<()> {
        self.send(&OutputReport::command(self.opcodes.interrupt_period).with_u32(period_ms))?;
        Ok(())
    }

    fn enable_dac(&mut self) -> palaser_core::Result<()> {
        Ok(self.command(self.opcodes.dac_enable)?)
    }

    fn disable_dac(&mut self) -> palaser_core::Result<()> {
        Ok(self.command(self.opcodes.dac_disable)?)
    }

    fn set_dac(&mut self, millivolts: u16) -> palaser_core::Result<()> {
        self.send(&OutputReport::command(self.opcodes.dac_value).with_u16(millivolts))?;
        Ok(())
    }

    fn sample_adc(&mut self, channel: u8) -> palaser_core::Result<u16> {
        self.command(self.opcodes.adc_acquire)?;
        let raw = self.read()?.adc(channel)?;
        debug!(channel, raw, "ADC sampled");
        Ok(raw)
    }
}

fn find_device<T: UsbContext>(
    context: &T,
    vendor_id: u16,
    product_id: u16,
) -> Option<rusb::Device<T>> {
    let devices = match context.devices() {
        Ok(d) => d,
        Err(e) => {
            debug!(error = %e, "Failed to enumerate USB devices");
            return None;
        }
    };

    devices.iter().find(|device| {
        device
            .device_descriptor()
            .is_ok_and(|desc| desc.vendor_id() == vendor_id && desc.product_id() == product_id)
    })
}

/// First interrupt IN endpoint of `interface` in the active configuration.
fn find_in_endpoint<T: UsbContext>(device: &rusb::Device<T>, interface: u8) -> Option<u8> {
    let config = device.active_config_descriptor().ok()?;
    config
        .interfaces()
        .filter(|iface| iface.number() == interface)
        .flat_map(|iface| iface.descriptors())
        .flat_map(|desc| desc.endpoint_descriptors().collect::<Vec<_>>())
        .find(|ep| ep.direction() == Direction::In && ep.transfer_type() == TransferType::Interrupt)
        .map(|ep| ep.address())
}
