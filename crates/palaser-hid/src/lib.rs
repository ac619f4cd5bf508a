//! PaLaser HID - USB transport for the Particulars laser driver board.
//!
//! The board enumerates as a HID device but speaks a vendor protocol:
//! commands travel as SET_REPORT control transfers and the state comes back
//! on the interrupt IN endpoint. [`LaserDriver`] implements
//! [`palaser_core::LaserControl`] on top of that.

pub mod device;
pub mod error;
pub mod protocol;
pub mod report;

pub use device::{DriverSettings, LaserDriver};
pub use error::{HidError, HidResult};
pub use protocol::Opcodes;
