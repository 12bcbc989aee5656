use std::mem::size_of;

use bytemuck_derive::{Pod, Zeroable};
use bytemuck::pod_read_unaligned;
use num_enum::{IntoPrimitive, FromPrimitive};
use derive_more::{From, Into, Display};
use usb_ids::FromId;

/// Class codes used by the stock composite profile.
pub mod class {
    /// Communications and CDC Control.
    pub const CDC_CONTROL: u8 = 0x02;
    /// CDC Data.
    pub const CDC_DATA: u8 = 0x0A;
    /// Miscellaneous, used at device level by IAD-grouped composites.
    pub const MISCELLANEOUS: u8 = 0xEF;

    /// Abstract Control Model subclass of CDC Control.
    pub const CDC_SUBCLASS_ACM: u8 = 0x02;
}

/// Device-level subclass/protocol pair that advertises the interface
/// association convention alongside `class::MISCELLANEOUS`.
pub const IAD_DEVICE_SUBCLASS: u8 = 0x02;
pub const IAD_DEVICE_PROTOCOL: u8 = 0x01;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default,
         Pod, Zeroable, From, Into, Display)]
#[repr(transparent)]
pub struct StringId(pub u8);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default,
         Pod, Zeroable, From, Into, Display)]
#[repr(transparent)]
pub struct ConfigNum(pub u8);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default,
         Pod, Zeroable, From, Into, Display)]
#[repr(transparent)]
pub struct InterfaceNum(pub u8);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default,
         Pod, Zeroable, From, Into, Display)]
#[repr(transparent)]
pub struct EndpointNum(pub u8);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default,
         Pod, Zeroable, From, Into, Display)]
#[repr(transparent)]
pub struct EndpointAddr(pub u8);

impl EndpointAddr {
    pub fn number(&self) -> EndpointNum {
        EndpointNum(self.0 & 0x7F)
    }

    pub fn direction(&self) -> Direction {
        if self.0 & 0x80 == 0 {
            Direction::Out
        } else {
            Direction::In
        }
    }

    pub fn from_parts(number: EndpointNum, direction: Direction) -> Self {
        EndpointAddr((direction as u8) << 7 | number.0 & 0x7F)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default,
         Pod, Zeroable, From, Into, Display)]
#[repr(transparent)]
pub struct EndpointAttr(pub u8);

impl EndpointAttr {
    pub fn endpoint_type(&self) -> EndpointType {
        EndpointType::from(self.0 & 0x03)
    }

    pub fn from_type(endpoint_type: EndpointType) -> Self {
        EndpointAttr(endpoint_type as u8)
    }
}

bitfield! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
    #[repr(C)]
    pub struct ConfigAttributes(u8);
    /// Reserved-set-to-one bit, historically "bus powered".
    pub bool, bus_powered, set_bus_powered: 7;
    pub bool, self_powered, set_self_powered: 6;
    pub bool, remote_wakeup, set_remote_wakeup: 5;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum EndpointType {
    #[default]
    Control     = 0,
    Isochronous = 1,
    Bulk        = 2,
    Interrupt   = 3,
}

impl EndpointType {
    /// Largest wMaxPacketSize this transfer type can carry, taken at the
    /// most permissive USB 2.0 speed since a descriptor table does not
    /// know which speed the link will train to.
    pub fn max_packet_ceiling(&self) -> u16 {
        use EndpointType::*;
        match self {
            Control     => 64,
            Isochronous => 1023,
            Bulk        => 512,
            Interrupt   => 1024,
        }
    }
}

impl std::fmt::Display for EndpointType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", match self {
            EndpointType::Control     => "control",
            EndpointType::Isochronous => "isochronous",
            EndpointType::Bulk        => "bulk",
            EndpointType::Interrupt   => "interrupt",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Direction {
    #[default]
    Out = 0,
    In = 1,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", match self {
            Direction::In  => "IN",
            Direction::Out => "OUT",
        })
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct BCDVersion {
    pub minor: u8,
    pub major: u8,
}

impl std::fmt::Display for BCDVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:X}.{:02X}", self.major, self.minor)
    }
}

impl From<u16> for BCDVersion {
    fn from(bcd: u16) -> BCDVersion {
        BCDVersion {
            minor: bcd.to_le_bytes()[0],
            major: bcd.to_le_bytes()[1],
        }
    }
}

impl From<BCDVersion> for u16 {
    fn from(version: BCDVersion) -> u16 {
        u16::from_le_bytes([version.minor, version.major])
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DescriptorType {
    Device = 1,
    Configuration = 2,
    String = 3,
    Interface = 4,
    Endpoint = 5,
    DeviceQualifier = 6,
    OtherSpeedConfiguration = 7,
    InterfacePower = 8,
    InterfaceAssociation = 0x0B,
    CsInterface = 0x24,
    #[default]
    Unknown = 0xFF,
}

impl DescriptorType {
    pub fn expected_length(&self) -> Option<usize> {
        use DescriptorType::*;
        match self {
            Device =>
                Some(size_of::<DeviceDescriptor>()),
            Configuration =>
                Some(size_of::<ConfigDescriptor>()),
            InterfaceAssociation =>
                Some(size_of::<InterfaceAssociationDescriptor>()),
            Interface =>
                Some(size_of::<InterfaceDescriptor>()),
            Endpoint =>
                Some(size_of::<EndpointDescriptor>()),
            _ =>
                None
        }
    }

    pub fn description(self) -> &'static str {
        use DescriptorType::*;
        match self {
            Device => "device",
            Configuration => "configuration",
            String => "string",
            Interface => "interface",
            Endpoint => "endpoint",
            DeviceQualifier => "device qualifier",
            OtherSpeedConfiguration => "other speed configuration",
            InterfacePower => "interface power",
            InterfaceAssociation => "interface association",
            CsInterface => "class-specific interface",
            Unknown => "unknown",
        }
    }
}

/// Functional descriptor subtypes within a CS_INTERFACE record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum CdcSubtype {
    Header = 0x00,
    CallManagement = 0x01,
    Acm = 0x02,
    Union = 0x06,
    #[default]
    Unknown = 0xFF,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default,
         Pod, Zeroable, From, Into, Display)]
#[repr(transparent)]
pub struct DeviceField(pub u8);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default,
         Pod, Zeroable, From, Into, Display)]
#[repr(transparent)]
pub struct ConfigField(pub u8);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default,
         Pod, Zeroable, From, Into, Display)]
#[repr(transparent)]
pub struct IfaceAssocField(pub u8);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default,
         Pod, Zeroable, From, Into, Display)]
#[repr(transparent)]
pub struct InterfaceField(pub u8);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default,
         Pod, Zeroable, From, Into, Display)]
#[repr(transparent)]
pub struct EndpointField(pub u8);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default,
         Pod, Zeroable, From, Into, Display)]
#[repr(transparent)]
pub struct CdcField(pub u8);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DeviceDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub usb_version: BCDVersion,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    pub max_packet_size_0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_version: BCDVersion,
    pub manufacturer_str_id: StringId,
    pub product_str_id: StringId,
    pub serial_str_id: StringId,
    pub num_configurations: u8
}

#[allow(clippy::useless_format)]
impl DeviceDescriptor {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        pod_read_unaligned::<DeviceDescriptor>(bytes)
    }

    pub fn bytes(&self) -> [u8; 18] {
        [
            self.length,
            self.descriptor_type,
            self.usb_version.minor,
            self.usb_version.major,
            self.device_class,
            self.device_subclass,
            self.device_protocol,
            self.max_packet_size_0,
            self.vendor_id.to_le_bytes()[0],
            self.vendor_id.to_le_bytes()[1],
            self.product_id.to_le_bytes()[0],
            self.product_id.to_le_bytes()[1],
            self.device_version.minor,
            self.device_version.major,
            self.manufacturer_str_id.0,
            self.product_str_id.0,
            self.serial_str_id.0,
            self.num_configurations,
        ]
    }

    pub fn field_text(&self, id: DeviceField) -> String {
        match id.0 {
        0  => format!("Length: {} bytes", self.length),
        1  => format!("Type: 0x{:02X}", self.descriptor_type),
        2  => format!("USB Version: {}", self.usb_version),
        3  => format!("Class: 0x{:02X}{}", self.device_class,
            usb_ids::Class::from_id(self.device_class)
                .map_or_else(String::new, |c| format!(": {}", c.name()))),
        4  => format!("Subclass: 0x{:02X}{}", self.device_subclass,
            usb_ids::SubClass::from_cid_scid(
                    self.device_class, self.device_subclass)
                .map_or_else(String::new, |s| format!(": {}", s.name()))),
        5  => format!("Protocol: 0x{:02X}{}", self.device_protocol,
            usb_ids::Protocol::from_cid_scid_pid(
                    self.device_class, self.device_subclass,
                    self.device_protocol)
                .map_or_else(String::new, |p| format!(": {}", p.name()))),
        6  => format!("Max EP0 packet size: {} bytes", self.max_packet_size_0),
        7  => format!("Vendor ID: 0x{:04X}{}", self.vendor_id,
            usb_ids::Vendor::from_id(self.vendor_id)
                .map_or_else(String::new, |v| format!(": {}", v.name()))),
        8  => format!("Product ID: 0x{:04X}{}", self.product_id,
            usb_ids::Device::from_vid_pid(self.vendor_id, self.product_id)
                .map_or_else(String::new, |d| format!(": {}", d.name()))),
        9  => format!("Version: {}", self.device_version),
        10 => format!("Manufacturer string: {}",
                      fmt_str_id(self.manufacturer_str_id)),
        11 => format!("Product string: {}",
                      fmt_str_id(self.product_str_id)),
        12 => format!("Serial string: {}",
                      fmt_str_id(self.serial_str_id)),
        i  => format!("Error: Invalid field ID {i}")
        }
    }

    pub const NUM_FIELDS: usize = 13;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C, packed)]
pub struct ConfigDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub total_length: u16,
    pub num_interfaces: u8,
    pub config_value: u8,
    pub config_str_id: StringId,
    pub attributes: ConfigAttributes,
    pub max_power: u8
}

#[allow(clippy::useless_format)]
impl ConfigDescriptor {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        pod_read_unaligned::<ConfigDescriptor>(bytes)
    }

    pub fn bytes(&self) -> [u8; 9] {
        let total_length: u16 = self.total_length;
        [
            self.length,
            self.descriptor_type,
            total_length.to_le_bytes()[0],
            total_length.to_le_bytes()[1],
            self.num_interfaces,
            self.config_value,
            self.config_str_id.0,
            self.attributes.0,
            self.max_power,
        ]
    }

    pub fn field_text(&self, id: ConfigField) -> String {
        match id.0 {
        0 => format!("Length: {} bytes", self.length),
        1 => format!("Type: 0x{:02X}", self.descriptor_type),
        2 => format!("Total length: {} bytes", {
            let length: u16 = self.total_length; length }),
        3 => format!("Number of interfaces: {}", self.num_interfaces),
        4 => format!("Configuration number: {}", self.config_value),
        5 => format!("Configuration string: {}",
                     fmt_str_id(self.config_str_id)),
        6 => {
            let attributes = self.attributes;
            let mut flags = vec![
                if attributes.self_powered() {
                    "self-powered"
                } else {
                    "bus-powered"
                }
            ];
            if attributes.remote_wakeup() {
                flags.push("remote wakeup");
            }
            format!("Attributes: 0x{:02X} ({})", attributes.0,
                    flags.join(", "))
        },
        7 => format!("Max power: {}mA", self.max_power as u16 * 2),
        i => format!("Error: Invalid field ID {i}")
        }
    }

    pub const NUM_FIELDS: usize = 8;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct InterfaceAssociationDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub first_interface: InterfaceNum,
    pub interface_count: u8,
    pub function_class: u8,
    pub function_subclass: u8,
    pub function_protocol: u8,
    pub function_str_id: StringId,
}

#[allow(clippy::useless_format)]
impl InterfaceAssociationDescriptor {
    pub fn new(first_interface: InterfaceNum,
               interface_count: u8,
               function_class: u8,
               function_subclass: u8,
               function_protocol: u8)
        -> Self
    {
        InterfaceAssociationDescriptor {
            length: size_of::<Self>() as u8,
            descriptor_type: DescriptorType::InterfaceAssociation as u8,
            first_interface,
            interface_count,
            function_class,
            function_subclass,
            function_protocol,
            function_str_id: StringId(0),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        pod_read_unaligned::<InterfaceAssociationDescriptor>(bytes)
    }

    pub fn bytes(&self) -> [u8; 8] {
        [
            self.length,
            self.descriptor_type,
            self.first_interface.0,
            self.interface_count,
            self.function_class,
            self.function_subclass,
            self.function_protocol,
            self.function_str_id.0,
        ]
    }

    /// Interface numbers this association claims to span.
    pub fn spanned_interfaces(&self)
        -> impl Iterator<Item = InterfaceNum> + use<>
    {
        let first = self.first_interface.0;
        (first .. first.saturating_add(self.interface_count))
            .map(InterfaceNum)
    }

    pub fn field_text(&self, id: IfaceAssocField) -> String {
        match id.0 {
        0 => format!("Length: {} bytes", self.length),
        1 => format!("Type: 0x{:02X}", self.descriptor_type),
        2 => format!("First interface: {}", self.first_interface),
        3 => format!("Interface count: {}", self.interface_count),
        4 => format!("Function class: 0x{:02X}{}", self.function_class,
            usb_ids::Class::from_id(self.function_class)
                .map_or_else(String::new, |c| format!(": {}", c.name()))),
        5 => format!("Function subclass: 0x{:02X}", self.function_subclass),
        6 => format!("Function protocol: 0x{:02X}", self.function_protocol),
        7 => format!("Function string: {}",
                     fmt_str_id(self.function_str_id)),
        i => format!("Error: Invalid field ID {i}")
        }
    }

    pub const NUM_FIELDS: usize = 8;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C, packed)]
pub struct InterfaceDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub interface_number: InterfaceNum,
    pub alternate_setting: u8,
    pub num_endpoints: u8,
    pub interface_class: u8,
    pub interface_subclass: u8,
    pub interface_protocol: u8,
    pub interface_str_id: StringId,
}

#[allow(clippy::useless_format)]
impl InterfaceDescriptor {
    pub fn new(interface_number: InterfaceNum,
               interface_class: u8,
               interface_subclass: u8,
               interface_protocol: u8,
               num_endpoints: u8)
        -> Self
    {
        InterfaceDescriptor {
            length: size_of::<Self>() as u8,
            descriptor_type: DescriptorType::Interface as u8,
            interface_number,
            alternate_setting: 0,
            num_endpoints,
            interface_class,
            interface_subclass,
            interface_protocol,
            interface_str_id: StringId(0),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        pod_read_unaligned::<InterfaceDescriptor>(bytes)
    }

    pub fn bytes(&self) -> [u8; 9] {
        [
            self.length,
            self.descriptor_type,
            self.interface_number.0,
            self.alternate_setting,
            self.num_endpoints,
            self.interface_class,
            self.interface_subclass,
            self.interface_protocol,
            self.interface_str_id.0,
        ]
    }

    pub fn field_text(&self, id: InterfaceField) -> String {
        match id.0 {
        0 => format!("Length: {} bytes", self.length),
        1 => format!("Type: 0x{:02X}", self.descriptor_type),
        2 => format!("Interface number: {}", self.interface_number),
        3 => format!("Alternate setting: {}", self.alternate_setting),
        4 => format!("Number of endpoints: {}", self.num_endpoints),
        5 => format!("Class: 0x{:02X}{}", self.interface_class,
            usb_ids::Class::from_id(self.interface_class)
                .map_or_else(String::new, |c| format!(": {}", c.name()))),
        6 => format!("Subclass: 0x{:02X}{}", self.interface_subclass,
            usb_ids::SubClass::from_cid_scid(
                    self.interface_class, self.interface_subclass)
                .map_or_else(String::new, |s| format!(": {}", s.name()))),
        7 => format!("Protocol: 0x{:02X}{}", self.interface_protocol,
            usb_ids::Protocol::from_cid_scid_pid(
                    self.interface_class, self.interface_subclass,
                    self.interface_protocol)
                .map_or_else(String::new, |p| format!(": {}", p.name()))),
        8 => format!("Interface string: {}",
                     fmt_str_id(self.interface_str_id)),
        i => format!("Error: Invalid field ID {i}")
        }
    }

    pub const NUM_FIELDS: usize = 9;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C, packed)]
pub struct EndpointDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub endpoint_address: EndpointAddr,
    pub attributes: EndpointAttr,
    pub max_packet_size: u16,
    pub interval: u8,
}

#[allow(clippy::useless_format)]
impl EndpointDescriptor {
    pub fn new(endpoint_address: EndpointAddr,
               endpoint_type: EndpointType,
               max_packet_size: u16,
               interval: u8)
        -> Self
    {
        EndpointDescriptor {
            length: size_of::<Self>() as u8,
            descriptor_type: DescriptorType::Endpoint as u8,
            endpoint_address,
            attributes: EndpointAttr::from_type(endpoint_type),
            max_packet_size,
            interval,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        pod_read_unaligned::<EndpointDescriptor>(bytes)
    }

    pub fn bytes(&self) -> [u8; 7] {
        let max_packet_size: u16 = self.max_packet_size;
        [
            self.length,
            self.descriptor_type,
            self.endpoint_address.0,
            self.attributes.0,
            max_packet_size.to_le_bytes()[0],
            max_packet_size.to_le_bytes()[1],
            self.interval,
        ]
    }

    pub fn field_text(&self, id: EndpointField) -> String {
        match id.0 {
        0 => format!("Length: {} bytes", self.length),
        1 => format!("Type: 0x{:02X}", self.descriptor_type),
        2 => format!("Endpoint address: 0x{:02X} (EP{} {})",
                     self.endpoint_address.0,
                     self.endpoint_address.number(),
                     self.endpoint_address.direction()),
        3 => format!("Attributes: 0x{:02X} ({})",
                     self.attributes.0,
                     self.attributes.endpoint_type()),
        4 => format!("Max packet size: {} bytes", {
            let size: u16 = self.max_packet_size; size }),
        5 => format!("Interval: 0x{:02X}", self.interval),
        i => format!("Error: Invalid field ID {i}")
        }
    }

    pub const NUM_FIELDS: usize = 6;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct CdcHeaderDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub subtype: u8,
    pub cdc_version: BCDVersion,
}

#[allow(clippy::useless_format)]
impl CdcHeaderDescriptor {
    pub fn new(cdc_version: BCDVersion) -> Self {
        CdcHeaderDescriptor {
            length: size_of::<Self>() as u8,
            descriptor_type: DescriptorType::CsInterface as u8,
            subtype: CdcSubtype::Header as u8,
            cdc_version,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        pod_read_unaligned::<CdcHeaderDescriptor>(bytes)
    }

    pub fn bytes(&self) -> [u8; 5] {
        [
            self.length,
            self.descriptor_type,
            self.subtype,
            self.cdc_version.minor,
            self.cdc_version.major,
        ]
    }

    pub fn field_text(&self, id: CdcField) -> String {
        match id.0 {
        0 => format!("Length: {} bytes", self.length),
        1 => format!("Type: 0x{:02X}, subtype 0x{:02X} (header)",
                     self.descriptor_type, self.subtype),
        2 => format!("CDC version: {}", self.cdc_version),
        i => format!("Error: Invalid field ID {i}")
        }
    }

    pub const NUM_FIELDS: usize = 3;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct CdcAcmDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub subtype: u8,
    pub capabilities: u8,
}

#[allow(clippy::useless_format)]
impl CdcAcmDescriptor {
    pub fn new(capabilities: u8) -> Self {
        CdcAcmDescriptor {
            length: size_of::<Self>() as u8,
            descriptor_type: DescriptorType::CsInterface as u8,
            subtype: CdcSubtype::Acm as u8,
            capabilities,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        pod_read_unaligned::<CdcAcmDescriptor>(bytes)
    }

    pub fn bytes(&self) -> [u8; 4] {
        [
            self.length,
            self.descriptor_type,
            self.subtype,
            self.capabilities,
        ]
    }

    pub fn field_text(&self, id: CdcField) -> String {
        match id.0 {
        0 => format!("Length: {} bytes", self.length),
        1 => format!("Type: 0x{:02X}, subtype 0x{:02X} (ACM)",
                     self.descriptor_type, self.subtype),
        2 => format!("Capabilities: 0x{:02X}", self.capabilities),
        i => format!("Error: Invalid field ID {i}")
        }
    }

    pub const NUM_FIELDS: usize = 3;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct CdcUnionDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub subtype: u8,
    pub master_interface: InterfaceNum,
    pub slave_interface: InterfaceNum,
}

#[allow(clippy::useless_format)]
impl CdcUnionDescriptor {
    pub fn new(master_interface: InterfaceNum,
               slave_interface: InterfaceNum)
        -> Self
    {
        CdcUnionDescriptor {
            length: size_of::<Self>() as u8,
            descriptor_type: DescriptorType::CsInterface as u8,
            subtype: CdcSubtype::Union as u8,
            master_interface,
            slave_interface,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        pod_read_unaligned::<CdcUnionDescriptor>(bytes)
    }

    pub fn bytes(&self) -> [u8; 5] {
        [
            self.length,
            self.descriptor_type,
            self.subtype,
            self.master_interface.0,
            self.slave_interface.0,
        ]
    }

    pub fn field_text(&self, id: CdcField) -> String {
        match id.0 {
        0 => format!("Length: {} bytes", self.length),
        1 => format!("Type: 0x{:02X}, subtype 0x{:02X} (union)",
                     self.descriptor_type, self.subtype),
        2 => format!("Master interface: {}", self.master_interface),
        3 => format!("Slave interface: {}", self.slave_interface),
        i => format!("Error: Invalid field ID {i}")
        }
    }

    pub const NUM_FIELDS: usize = 4;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct CdcCallManagementDescriptor {
    pub length: u8,
    pub descriptor_type: u8,
    pub subtype: u8,
    pub capabilities: u8,
    pub data_interface: InterfaceNum,
}

#[allow(clippy::useless_format)]
impl CdcCallManagementDescriptor {
    pub fn new(capabilities: u8, data_interface: InterfaceNum) -> Self {
        CdcCallManagementDescriptor {
            length: size_of::<Self>() as u8,
            descriptor_type: DescriptorType::CsInterface as u8,
            subtype: CdcSubtype::CallManagement as u8,
            capabilities,
            data_interface,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        pod_read_unaligned::<CdcCallManagementDescriptor>(bytes)
    }

    pub fn bytes(&self) -> [u8; 5] {
        [
            self.length,
            self.descriptor_type,
            self.subtype,
            self.capabilities,
            self.data_interface.0,
        ]
    }

    pub fn field_text(&self, id: CdcField) -> String {
        match id.0 {
        0 => format!("Length: {} bytes", self.length),
        1 => format!("Type: 0x{:02X}, subtype 0x{:02X} (call management)",
                     self.descriptor_type, self.subtype),
        2 => format!("Capabilities: 0x{:02X}", self.capabilities),
        3 => format!("Data interface: {}", self.data_interface),
        i => format!("Error: Invalid field ID {i}")
        }
    }

    pub const NUM_FIELDS: usize = 4;
}

/// A single descriptor record of any kind understood by this crate.
///
/// Unknown type tags are preserved as `Other` with their raw bytes, so
/// that a walk over foreign bytes is lossless.
#[derive(Clone, Debug, PartialEq)]
pub enum Descriptor {
    Device(DeviceDescriptor),
    Configuration(ConfigDescriptor),
    InterfaceAssociation(InterfaceAssociationDescriptor),
    Interface(InterfaceDescriptor),
    CdcHeader(CdcHeaderDescriptor),
    CdcAcm(CdcAcmDescriptor),
    CdcUnion(CdcUnionDescriptor),
    CdcCallManagement(CdcCallManagementDescriptor),
    Endpoint(EndpointDescriptor),
    Other(DescriptorType, Vec<u8>),
}

impl Descriptor {
    /// Decode one record from its exact wire bytes.
    ///
    /// The slice must be a whole record: first byte its length, second
    /// its type tag. A record whose length does not match its type is
    /// preserved as `Other` rather than reinterpreted.
    pub fn decode(bytes: &[u8]) -> Descriptor {
        use Descriptor as D;
        if bytes.len() < 2 {
            return D::Other(DescriptorType::Unknown, bytes.to_vec());
        }
        let desc_type = DescriptorType::from(bytes[1]);
        if let Some(expected) = desc_type.expected_length() {
            if bytes.len() != expected {
                return D::Other(desc_type, bytes.to_vec());
            }
        }
        match desc_type {
            DescriptorType::Device =>
                D::Device(DeviceDescriptor::from_bytes(bytes)),
            DescriptorType::Configuration =>
                D::Configuration(ConfigDescriptor::from_bytes(bytes)),
            DescriptorType::InterfaceAssociation =>
                D::InterfaceAssociation(
                    InterfaceAssociationDescriptor::from_bytes(bytes)),
            DescriptorType::Interface =>
                D::Interface(InterfaceDescriptor::from_bytes(bytes)),
            DescriptorType::Endpoint =>
                D::Endpoint(EndpointDescriptor::from_bytes(bytes)),
            DescriptorType::CsInterface if bytes.len() >= 3 => {
                match (CdcSubtype::from(bytes[2]), bytes.len()) {
                    (CdcSubtype::Header, 5) =>
                        D::CdcHeader(
                            CdcHeaderDescriptor::from_bytes(bytes)),
                    (CdcSubtype::Acm, 4) =>
                        D::CdcAcm(
                            CdcAcmDescriptor::from_bytes(bytes)),
                    (CdcSubtype::Union, 5) =>
                        D::CdcUnion(
                            CdcUnionDescriptor::from_bytes(bytes)),
                    (CdcSubtype::CallManagement, 5) =>
                        D::CdcCallManagement(
                            CdcCallManagementDescriptor::from_bytes(bytes)),
                    _ => D::Other(desc_type, bytes.to_vec()),
                }
            },
            _ => D::Other(desc_type, bytes.to_vec()),
        }
    }

    /// The record's leading length byte.
    pub fn length(&self) -> u8 {
        use Descriptor::*;
        match self {
            Device(desc) => desc.length,
            Configuration(desc) => desc.length,
            InterfaceAssociation(desc) => desc.length,
            Interface(desc) => desc.length,
            CdcHeader(desc) => desc.length,
            CdcAcm(desc) => desc.length,
            CdcUnion(desc) => desc.length,
            CdcCallManagement(desc) => desc.length,
            Endpoint(desc) => desc.length,
            Other(_, bytes) => bytes.first().copied().unwrap_or(0),
        }
    }

    pub fn descriptor_type(&self) -> DescriptorType {
        use Descriptor::*;
        match self {
            Device(_) => DescriptorType::Device,
            Configuration(_) => DescriptorType::Configuration,
            InterfaceAssociation(_) => DescriptorType::InterfaceAssociation,
            Interface(_) => DescriptorType::Interface,
            CdcHeader(_) | CdcAcm(_) | CdcUnion(_) | CdcCallManagement(_) =>
                DescriptorType::CsInterface,
            Endpoint(_) => DescriptorType::Endpoint,
            Other(desc_type, _) => *desc_type,
        }
    }

    /// Wire encoding of this record.
    pub fn bytes(&self) -> Vec<u8> {
        use Descriptor::*;
        match self {
            Device(desc) => desc.bytes().to_vec(),
            Configuration(desc) => desc.bytes().to_vec(),
            InterfaceAssociation(desc) => desc.bytes().to_vec(),
            Interface(desc) => desc.bytes().to_vec(),
            CdcHeader(desc) => desc.bytes().to_vec(),
            CdcAcm(desc) => desc.bytes().to_vec(),
            CdcUnion(desc) => desc.bytes().to_vec(),
            CdcCallManagement(desc) => desc.bytes().to_vec(),
            Endpoint(desc) => desc.bytes().to_vec(),
            Other(_, bytes) => bytes.clone(),
        }
    }

    /// One-line summary used when listing a set.
    pub fn description(&self) -> String {
        use Descriptor::*;
        match self {
            Device(desc) => format!(
                "Device 0x{:04X}:0x{:04X}, USB {}",
                desc.vendor_id, desc.product_id, desc.usb_version),
            Configuration(desc) => format!(
                "Configuration {}: {} interfaces, {} bytes total",
                desc.config_value, desc.num_interfaces,
                { let length: u16 = desc.total_length; length }),
            InterfaceAssociation(desc) => format!(
                "Interface association: {} interfaces from {}",
                desc.interface_count, desc.first_interface),
            Interface(desc) => format!(
                "Interface {}: class 0x{:02X}{}",
                desc.interface_number, desc.interface_class,
                usb_ids::Class::from_id(desc.interface_class)
                    .map_or_else(String::new,
                                 |c| format!(" ({})", c.name()))),
            CdcHeader(desc) => format!(
                "CDC header: version {}", desc.cdc_version),
            CdcAcm(desc) => format!(
                "CDC abstract control management: capabilities 0x{:02X}",
                desc.capabilities),
            CdcUnion(desc) => format!(
                "CDC union: master {}, slave {}",
                desc.master_interface, desc.slave_interface),
            CdcCallManagement(desc) => format!(
                "CDC call management: data interface {}",
                desc.data_interface),
            Endpoint(desc) => format!(
                "Endpoint 0x{:02X}: {} {}, max packet {} bytes",
                desc.endpoint_address.0,
                desc.attributes.endpoint_type(),
                desc.endpoint_address.direction(),
                { let size: u16 = desc.max_packet_size; size }),
            Other(desc_type, bytes) => format!(
                "Unrecognised descriptor ({}), {} bytes",
                desc_type.description(), bytes.len()),
        }
    }

    /// Field text for every field of this record, one line per field.
    pub fn field_text_lines(&self) -> Vec<String> {
        use Descriptor::*;
        match self {
            Device(desc) =>
                (0..DeviceDescriptor::NUM_FIELDS)
                    .map(|i| desc.field_text(DeviceField(i as u8)))
                    .collect(),
            Configuration(desc) =>
                (0..ConfigDescriptor::NUM_FIELDS)
                    .map(|i| desc.field_text(ConfigField(i as u8)))
                    .collect(),
            InterfaceAssociation(desc) =>
                (0..InterfaceAssociationDescriptor::NUM_FIELDS)
                    .map(|i| desc.field_text(IfaceAssocField(i as u8)))
                    .collect(),
            Interface(desc) =>
                (0..InterfaceDescriptor::NUM_FIELDS)
                    .map(|i| desc.field_text(InterfaceField(i as u8)))
                    .collect(),
            CdcHeader(desc) =>
                (0..CdcHeaderDescriptor::NUM_FIELDS)
                    .map(|i| desc.field_text(CdcField(i as u8)))
                    .collect(),
            CdcAcm(desc) =>
                (0..CdcAcmDescriptor::NUM_FIELDS)
                    .map(|i| desc.field_text(CdcField(i as u8)))
                    .collect(),
            CdcUnion(desc) =>
                (0..CdcUnionDescriptor::NUM_FIELDS)
                    .map(|i| desc.field_text(CdcField(i as u8)))
                    .collect(),
            CdcCallManagement(desc) =>
                (0..CdcCallManagementDescriptor::NUM_FIELDS)
                    .map(|i| desc.field_text(CdcField(i as u8)))
                    .collect(),
            Endpoint(desc) =>
                (0..EndpointDescriptor::NUM_FIELDS)
                    .map(|i| desc.field_text(EndpointField(i as u8)))
                    .collect(),
            Other(..) => Vec::new(),
        }
    }
}

/// Walks a flat byte table, yielding one decoded record per
/// length-prefixed entry. Stops at the first malformed length byte
/// rather than guessing at framing.
pub struct DescriptorIterator<'bytes> {
    bytes: &'bytes [u8],
    offset: usize,
}

impl<'bytes> DescriptorIterator<'bytes> {
    pub fn from(bytes: &'bytes [u8]) -> Self {
        DescriptorIterator {
            bytes,
            offset: 0
        }
    }
}

impl Iterator for DescriptorIterator<'_> {
    type Item = Descriptor;

    fn next(&mut self) -> Option<Descriptor> {
        let remaining_bytes = &self.bytes[self.offset..];
        if remaining_bytes.len() < 2 {
            return None;
        }
        let desc_length = remaining_bytes[0] as usize;
        if desc_length < 2 || desc_length > remaining_bytes.len() {
            return None;
        }
        self.offset += desc_length;
        Some(Descriptor::decode(&remaining_bytes[..desc_length]))
    }
}

fn fmt_str_id(id: StringId) -> String {
    match id.0 {
        0 => "(none)".to_string(),
        _ => format!("#{id}")
    }
}

pub mod prelude {
    #[allow(unused_imports)]
    pub use super::{
        class,
        BCDVersion,
        CdcAcmDescriptor,
        CdcCallManagementDescriptor,
        CdcHeaderDescriptor,
        CdcSubtype,
        CdcUnionDescriptor,
        ConfigAttributes,
        ConfigDescriptor,
        ConfigNum,
        Descriptor,
        DescriptorIterator,
        DescriptorType,
        DeviceDescriptor,
        Direction,
        EndpointAddr,
        EndpointAttr,
        EndpointDescriptor,
        EndpointNum,
        EndpointType,
        InterfaceAssociationDescriptor,
        InterfaceDescriptor,
        InterfaceNum,
        StringId,
        IAD_DEVICE_PROTOCOL,
        IAD_DEVICE_SUBCLASS,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tags() {
        let iad = InterfaceAssociationDescriptor::new(
            InterfaceNum(0), 2, 0x02, 0x02, 0x01);
        assert_eq!(iad.bytes()[0], 8);
        assert_eq!(iad.bytes()[1], 0x0B);

        let iface = InterfaceDescriptor::new(
            InterfaceNum(1), class::CDC_DATA, 0, 0, 2);
        assert_eq!(iface.bytes()[0], 9);
        assert_eq!(iface.bytes()[1], 0x04);

        let endpoint = EndpointDescriptor::new(
            EndpointAddr(0x81), EndpointType::Interrupt, 16, 64);
        assert_eq!(endpoint.bytes(), [7, 0x05, 0x81, 0x03, 16, 0, 64]);

        let header = CdcHeaderDescriptor::new(BCDVersion::from(0x0110));
        assert_eq!(header.bytes(), [5, 0x24, 0x00, 0x10, 0x01]);

        let acm = CdcAcmDescriptor::new(0x06);
        assert_eq!(acm.bytes(), [4, 0x24, 0x02, 0x06]);

        let union = CdcUnionDescriptor::new(InterfaceNum(0), InterfaceNum(1));
        assert_eq!(union.bytes(), [5, 0x24, 0x06, 0, 1]);

        let call_mgmt = CdcCallManagementDescriptor::new(0, InterfaceNum(1));
        assert_eq!(call_mgmt.bytes(), [5, 0x24, 0x01, 0x00, 1]);
    }

    #[test]
    fn test_length_byte_matches_encoding() {
        let records = [
            Descriptor::InterfaceAssociation(
                InterfaceAssociationDescriptor::new(
                    InterfaceNum(0), 2, 0x02, 0x02, 0x01)),
            Descriptor::Interface(
                InterfaceDescriptor::new(
                    InterfaceNum(0), class::CDC_CONTROL,
                    class::CDC_SUBCLASS_ACM, 0, 1)),
            Descriptor::CdcHeader(
                CdcHeaderDescriptor::new(BCDVersion::from(0x0110))),
            Descriptor::CdcAcm(CdcAcmDescriptor::new(0x06)),
            Descriptor::CdcUnion(
                CdcUnionDescriptor::new(InterfaceNum(0), InterfaceNum(1))),
            Descriptor::CdcCallManagement(
                CdcCallManagementDescriptor::new(0, InterfaceNum(1))),
            Descriptor::Endpoint(
                EndpointDescriptor::new(
                    EndpointAddr(0x02), EndpointType::Bulk, 512, 0)),
        ];
        for record in &records {
            let bytes = record.bytes();
            assert_eq!(bytes.len(), record.length() as usize);
            assert_eq!(bytes[0], record.length());
        }
    }

    #[test]
    fn test_endpoint_addr_parts() {
        let addr = EndpointAddr(0x83);
        assert_eq!(addr.number(), EndpointNum(3));
        assert_eq!(addr.direction(), Direction::In);
        assert_eq!(
            EndpointAddr::from_parts(EndpointNum(3), Direction::In), addr);

        let addr = EndpointAddr(0x02);
        assert_eq!(addr.number(), EndpointNum(2));
        assert_eq!(addr.direction(), Direction::Out);
    }

    #[test]
    fn test_bcd_version() {
        let version = BCDVersion::from(0x0200);
        assert_eq!(version.major, 0x02);
        assert_eq!(version.minor, 0x00);
        assert_eq!(format!("{version}"), "2.00");
        assert_eq!(u16::from(version), 0x0200);
    }

    #[test]
    fn test_decode_round_trip() {
        let endpoint = EndpointDescriptor::new(
            EndpointAddr(0x83), EndpointType::Bulk, 512, 128);
        match Descriptor::decode(&endpoint.bytes()) {
            Descriptor::Endpoint(decoded) => assert_eq!(decoded, endpoint),
            other => panic!("Expected endpoint but got {other:?}"),
        }

        let union = CdcUnionDescriptor::new(InterfaceNum(0), InterfaceNum(1));
        match Descriptor::decode(&union.bytes()) {
            Descriptor::CdcUnion(decoded) => assert_eq!(decoded, union),
            other => panic!("Expected union but got {other:?}"),
        }
    }

    #[test]
    fn test_iterator_walks_all_records() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(
            &InterfaceDescriptor::new(
                InterfaceNum(0), class::CDC_CONTROL,
                class::CDC_SUBCLASS_ACM, 0, 1).bytes());
        bytes.extend_from_slice(
            &CdcHeaderDescriptor::new(BCDVersion::from(0x0110)).bytes());
        bytes.extend_from_slice(
            &EndpointDescriptor::new(
                EndpointAddr(0x81), EndpointType::Interrupt, 16, 64).bytes());
        // An unrecognised record must be preserved, not skipped.
        bytes.extend_from_slice(&[3, 0x30, 0xAA]);

        let types: Vec<DescriptorType> = DescriptorIterator::from(&bytes)
            .map(|desc| desc.descriptor_type())
            .collect();
        assert_eq!(types, vec![
            DescriptorType::Interface,
            DescriptorType::CsInterface,
            DescriptorType::Endpoint,
            DescriptorType::Unknown,
        ]);
    }

    #[test]
    fn test_iterator_stops_at_malformed_length() {
        let endpoint = EndpointDescriptor::new(
            EndpointAddr(0x81), EndpointType::Interrupt, 16, 64);
        let mut bytes = endpoint.bytes().to_vec();
        // A zero length byte cannot advance the walk.
        bytes.extend_from_slice(&[0, 0x05, 1, 2, 3]);
        let records: Vec<Descriptor> =
            DescriptorIterator::from(&bytes).collect();
        assert_eq!(records.len(), 1);
    }
}
