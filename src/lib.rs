//! Builds, validates and freezes USB descriptor sets for composite
//! devices, with a stock profile for a CDC-ACM serial function.
//!
//! Records are constructed with their length, type and count fields
//! computed rather than supplied, assembled into a configuration whose
//! totals are derived from its contents, and checked as a whole before
//! being frozen into wire bytes. Validation collects every violation
//! it finds instead of stopping at the first.
//!
//! ```
//! use descriptry::usb::prelude::*;
//! use descriptry::{
//!     assemble, build_cdc_acm_function, build_device_identity,
//!     ConfigParams, DeviceParams, EndpointParams,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let device = build_device_identity(
//!     &DeviceParams::new(0x1234, 0x5678))?;
//! let function = build_cdc_acm_function(
//!     InterfaceNum(0),
//!     EndpointParams {
//!         address: EndpointAddr(0x81),
//!         transfer_type: EndpointType::Interrupt,
//!         max_packet_size: 16,
//!         interval: 64,
//!     },
//!     [
//!         EndpointParams {
//!             address: EndpointAddr(0x02),
//!             transfer_type: EndpointType::Bulk,
//!             max_packet_size: 512,
//!             interval: 128,
//!         },
//!         EndpointParams {
//!             address: EndpointAddr(0x83),
//!             transfer_type: EndpointType::Bulk,
//!             max_packet_size: 512,
//!             interval: 128,
//!         },
//!     ])?;
//! let set = assemble(&device, &ConfigParams::default(), &[function])?;
//! assert_eq!(set.config_bytes().len(), 75);
//! # Ok(())
//! # }
//! ```
//!
//! The frozen images are plain position-independent bytes. Getting them
//! into device flash, and telling the controller where they live at
//! boot, is the firmware's job and out of scope here: a target serves
//! `device_bytes` and `config_bytes` from wherever its build system
//! placed them.

#[macro_use]
extern crate bitfield;

pub mod builder;
pub mod set;
pub mod usb;
pub mod util;
pub mod validation;

pub use builder::{
    assemble,
    build_cdc_acm_function,
    build_device_identity,
    ConfigParams,
    DescriptorSetBuilder,
    DeviceParams,
    EndpointEntry,
    EndpointParams,
    FunctionBuilder,
    FunctionGroup,
    InterfaceGroup,
};
pub use set::{DescriptorSet, DescriptorView};
pub use validation::{BuildError, Violation};
