//! Invariant checks over a proposed descriptor set, and the violation
//! taxonomy they report.
//!
//! Checks accumulate: a set with several problems reports every one of
//! them in a single pass, rather than stopping at the first.

use std::mem::size_of;

use itertools::Itertools;
use log::warn;
use thiserror::Error;

use crate::builder::{FunctionGroup, InterfaceGroup};
use crate::usb::prelude::*;

/// One way a proposed descriptor set breaks the rules.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Violation {
    /// A field holds a value outside its legal range.
    #[error("{field} value {value} invalid: {constraint}")]
    InvalidField {
        field: &'static str,
        value: u16,
        constraint: &'static str,
    },
    /// More than one function claims the same interface number.
    #[error("interface number {number} claimed by functions {functions:?}")]
    InterfaceNumberConflict {
        number: InterfaceNum,
        /// Positions of every claiming function, in ascending order.
        functions: Vec<usize>,
    },
    /// An endpoint's address direction bit contradicts its declared role.
    #[error("endpoint 0x{address:02X} is {actual} by address \
             but declared {declared}")]
    EndpointDirectionMismatch {
        address: u8,
        declared: Direction,
        actual: Direction,
    },
    /// A record refers to something the set does not define.
    #[error("{referrer} {detail}")]
    CrossReference {
        referrer: &'static str,
        detail: String,
    },
    /// The declared total length disagrees with the encoded records.
    #[error("declared total length {declared} but records walk to \
             {walked} bytes")]
    SizeMismatch {
        declared: u16,
        walked: u16,
    },
}

/// Returned when assembly rejects a set. Carries every violation found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildError {
    pub violations: Vec<Violation>,
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "descriptor set rejected with {} violation{}",
               self.violations.len(),
               if self.violations.len() == 1 { "" } else { "s" })?;
        for violation in &self.violations {
            write!(f, "\n  - {violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildError {}

// EP0 packet sizes USB 2.0 permits.
const VALID_EP0_SIZES: [u8; 4] = [8, 16, 32, 64];

pub(crate) fn check_device(desc: &DeviceDescriptor) -> Vec<Violation> {
    let mut violations = Vec::new();
    if !VALID_EP0_SIZES.contains(&desc.max_packet_size_0) {
        violations.push(Violation::InvalidField {
            field: "bMaxPacketSize0",
            value: desc.max_packet_size_0 as u16,
            constraint: "must be 8, 16, 32 or 64",
        });
    }
    if desc.num_configurations == 0 {
        violations.push(Violation::InvalidField {
            field: "bNumConfigurations",
            value: 0,
            constraint: "device must offer at least one configuration",
        });
    }
    violations
}

pub(crate) fn check_endpoint(declared: Direction,
                             desc: &EndpointDescriptor)
    -> Vec<Violation>
{
    let mut violations = Vec::new();
    let address = desc.endpoint_address;
    if address.direction() != declared {
        violations.push(Violation::EndpointDirectionMismatch {
            address: address.0,
            declared,
            actual: address.direction(),
        });
    }
    let endpoint_type = desc.attributes.endpoint_type();
    let max_packet_size: u16 = desc.max_packet_size;
    if max_packet_size == 0 {
        violations.push(Violation::InvalidField {
            field: "wMaxPacketSize",
            value: 0,
            constraint: "must not be zero",
        });
    } else if max_packet_size > endpoint_type.max_packet_ceiling() {
        violations.push(Violation::InvalidField {
            field: "wMaxPacketSize",
            value: max_packet_size,
            constraint: "exceeds the limit for this transfer type",
        });
    }
    if endpoint_type == EndpointType::Bulk && desc.interval != 0 {
        // Hosts ignore the interval on bulk endpoints, so a nonzero
        // value is tolerated. The stock table ships one.
        warn!("Bulk endpoint 0x{:02X} declares interval {}, \
               which hosts ignore",
              address.0, desc.interval);
    }
    violations
}

pub(crate) fn check_interface(group: &InterfaceGroup) -> Vec<Violation> {
    let mut violations = Vec::new();
    let desc = &group.descriptor;
    if desc.num_endpoints as usize != group.endpoints.len() {
        violations.push(Violation::InvalidField {
            field: "bNumEndpoints",
            value: desc.num_endpoints as u16,
            constraint: "does not match the endpoints the interface carries",
        });
    }
    for endpoint in &group.endpoints {
        violations.extend(check_endpoint(endpoint.role,
                                         &endpoint.descriptor));
    }
    violations
}

fn check_function(index: usize,
                  function: &FunctionGroup,
                  defined: &[InterfaceNum])
    -> Vec<Violation>
{
    let mut violations = Vec::new();

    let actual: Vec<InterfaceNum> = function.interfaces.iter()
        .map(|group| group.descriptor.interface_number)
        .collect();

    match &function.association {
        None if actual.len() > 1 => {
            violations.push(Violation::CrossReference {
                referrer: "function",
                detail: format!(
                    "{index} spans {} interfaces \
                     but carries no interface association",
                    actual.len()),
            });
        }
        None => {}
        Some(assoc) => {
            let spanned: Vec<InterfaceNum> =
                assoc.spanned_interfaces().collect();
            if spanned != actual {
                violations.push(Violation::CrossReference {
                    referrer: "interface association",
                    detail: format!(
                        "covers interfaces {:?} \
                         but function {index} defines {:?}",
                        spanned.iter().map(|n| n.0).collect::<Vec<u8>>(),
                        actual.iter().map(|n| n.0).collect::<Vec<u8>>()),
                });
            }
        }
    }

    for group in &function.interfaces {
        for record in &group.class_specific {
            match record {
                Descriptor::CdcUnion(union) => {
                    let targets = [
                        ("master", union.master_interface),
                        ("slave", union.slave_interface),
                    ];
                    for (role, target) in targets {
                        if !defined.contains(&target) {
                            violations.push(Violation::CrossReference {
                                referrer: "union functional descriptor",
                                detail: format!(
                                    "references {role} interface {target} \
                                     which is not defined"),
                            });
                        }
                    }
                }
                Descriptor::CdcCallManagement(call_mgmt) => {
                    let target = call_mgmt.data_interface;
                    if !defined.contains(&target) {
                        violations.push(Violation::CrossReference {
                            referrer: "call management functional descriptor",
                            detail: format!(
                                "references data interface {target} \
                                 which is not defined"),
                        });
                    }
                }
                _ => {}
            }
        }
    }

    violations
}

/// Run every structural check over a proposed set.
///
/// The returned order is deterministic for a given function list, and
/// conflict reports are symmetric in the functions involved.
pub(crate) fn validate(device: &DeviceDescriptor,
                       config: &ConfigDescriptor,
                       functions: &[FunctionGroup])
    -> Vec<Violation>
{
    let mut violations = check_device(device);

    let claims: Vec<(u8, usize)> = functions.iter().enumerate()
        .flat_map(|(index, function)| function.interface_numbers()
            .map(move |number| (number.0, index)))
        .collect();
    for (number, claimants) in claims.into_iter()
        .into_group_map()
        .into_iter()
        .sorted_by_key(|(number, _)| *number)
    {
        if claimants.len() > 1 {
            violations.push(Violation::InterfaceNumberConflict {
                number: InterfaceNum(number),
                functions: claimants.into_iter().sorted().collect(),
            });
        }
    }

    let defined: Vec<InterfaceNum> = functions.iter()
        .flat_map(|function| function.interface_numbers())
        .collect();

    for (index, function) in functions.iter().enumerate() {
        violations.extend(check_function(index, function, &defined));
        for group in &function.interfaces {
            violations.extend(check_interface(group));
        }
    }

    // A device that groups interfaces with associations must say so at
    // device level, and vice versa.
    let any_association = functions.iter()
        .any(|function| function.association.is_some());
    let advertises_associations =
        device.device_class == class::MISCELLANEOUS
        && device.device_subclass == IAD_DEVICE_SUBCLASS
        && device.device_protocol == IAD_DEVICE_PROTOCOL;
    if any_association && !advertises_associations {
        violations.push(Violation::CrossReference {
            referrer: "device descriptor",
            detail: format!(
                "class triple 0x{:02X}/0x{:02X}/0x{:02X} does not \
                 advertise the interface association convention",
                device.device_class,
                device.device_subclass,
                device.device_protocol),
        });
    }
    if advertises_associations && !any_association {
        violations.push(Violation::CrossReference {
            referrer: "device descriptor",
            detail: "advertises the interface association convention \
                     but no function carries one".to_string(),
        });
    }

    if config.max_power > 250 {
        // Whether to grant an over-budget draw is host policy.
        warn!("Configuration requests {}mA, over the 500mA bus budget",
              config.max_power as u16 * 2);
    }

    let num_interfaces = defined.iter()
        .map(|number| number.0)
        .unique()
        .count();
    if config.num_interfaces as usize != num_interfaces {
        violations.push(Violation::InvalidField {
            field: "bNumInterfaces",
            value: config.num_interfaces as u16,
            constraint: "does not match the interfaces the functions define",
        });
    }
    if num_interfaces == 0 {
        violations.push(Violation::InvalidField {
            field: "bNumInterfaces",
            value: 0,
            constraint: "configuration must define at least one interface",
        });
    }

    let expected_total = (size_of::<ConfigDescriptor>()
        + functions.iter()
            .map(|function| function.wire_length())
            .sum::<usize>()) as u16;
    let declared_total: u16 = config.total_length;
    if declared_total != expected_total {
        violations.push(Violation::SizeMismatch {
            declared: declared_total,
            walked: expected_total,
        });
    }

    for address in functions.iter()
        .flat_map(|function| function.interfaces.iter())
        .flat_map(|group| group.endpoints.iter())
        .map(|endpoint| endpoint.descriptor.endpoint_address.0)
        .duplicates()
    {
        // Address reuse across interfaces is unusual but a host will
        // enumerate it, so it is logged rather than rejected.
        warn!("Endpoint address 0x{address:02X} is used by \
               more than one interface");
    }

    violations
}

/// Re-walk an encoded configuration image by its length bytes and
/// compare against the declared total, returning a violation if the
/// two disagree.
pub(crate) fn check_config_image(bytes: &[u8], declared: u16)
    -> Option<Violation>
{
    let mut offset = 0;
    while offset + 2 <= bytes.len() {
        let length = bytes[offset] as usize;
        if length < 2 || offset + length > bytes.len() {
            break;
        }
        offset += length;
    }
    let walked = offset as u16;
    if walked == declared && offset == bytes.len() {
        None
    } else {
        Some(Violation::SizeMismatch {
            declared,
            walked,
        })
    }
}
