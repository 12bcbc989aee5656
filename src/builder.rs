//! Construction of descriptor sets: device identity, function layout,
//! and assembly into frozen wire form.

use std::mem::size_of;

use itertools::Itertools;

use crate::set::DescriptorSet;
use crate::usb::prelude::*;
use crate::validation::{self, BuildError, Violation};

// Functional descriptor defaults for the stock ACM profile: line
// coding, serial state and send-break on the control channel, no
// call management over the data channel.
const ACM_CAPABILITIES: u8 = 0x06;
const CALL_MGMT_CAPABILITIES: u8 = 0x00;
const CDC_VERSION: u16 = 0x0110;

/// Inputs for the device descriptor.
///
/// The class triple is not an input: a device built here always
/// advertises the interface association convention, since its functions
/// are grouped that way.
#[derive(Copy, Clone, Debug)]
pub struct DeviceParams {
    pub vendor_id: u16,
    pub product_id: u16,
    pub usb_version: BCDVersion,
    pub device_version: BCDVersion,
    pub max_packet_size_0: u8,
}

impl DeviceParams {
    /// Stock values for everything but the identifying IDs.
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        DeviceParams {
            vendor_id,
            product_id,
            usb_version: BCDVersion::from(0x0200),
            device_version: BCDVersion::from(0x0100),
            max_packet_size_0: 64,
        }
    }
}

/// Inputs for the configuration descriptor. Defaults match the stock
/// table: configuration 1, bus powered, 500mA.
#[derive(Copy, Clone, Debug)]
pub struct ConfigParams {
    pub config_value: u8,
    pub self_powered: bool,
    pub remote_wakeup: bool,
    /// Encoded in 2mA units, as the wire field is.
    pub max_power: u8,
}

impl Default for ConfigParams {
    fn default() -> Self {
        ConfigParams {
            config_value: 1,
            self_powered: false,
            remote_wakeup: false,
            max_power: 250,
        }
    }
}

/// Inputs for one endpoint descriptor.
#[derive(Copy, Clone, Debug)]
pub struct EndpointParams {
    pub address: EndpointAddr,
    pub transfer_type: EndpointType,
    pub max_packet_size: u16,
    pub interval: u8,
}

/// An endpoint together with the data role its interface gives it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EndpointEntry {
    pub role: Direction,
    pub descriptor: EndpointDescriptor,
}

impl EndpointEntry {
    /// Build the endpoint record for a declared role, rejecting it if
    /// the address contradicts the role or the packet size is out of
    /// range for the transfer type.
    pub fn new(role: Direction, params: &EndpointParams)
        -> Result<Self, Violation>
    {
        let entry = EndpointEntry {
            role,
            descriptor: EndpointDescriptor::new(
                params.address,
                params.transfer_type,
                params.max_packet_size,
                params.interval),
        };
        match validation::check_endpoint(role, &entry.descriptor)
            .into_iter()
            .next()
        {
            Some(violation) => Err(violation),
            None => Ok(entry),
        }
    }
}

/// One interface and every record that rides under it: the interface
/// descriptor itself, class-specific records, then endpoints.
#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceGroup {
    pub descriptor: InterfaceDescriptor,
    pub class_specific: Vec<Descriptor>,
    pub endpoints: Vec<EndpointEntry>,
}

impl InterfaceGroup {
    pub fn new(number: InterfaceNum,
               interface_class: u8,
               interface_subclass: u8,
               interface_protocol: u8,
               class_specific: Vec<Descriptor>,
               endpoints: Vec<EndpointEntry>)
        -> Self
    {
        let descriptor = InterfaceDescriptor::new(
            number,
            interface_class,
            interface_subclass,
            interface_protocol,
            endpoints.len() as u8);
        InterfaceGroup {
            descriptor,
            class_specific,
            endpoints,
        }
    }
}

/// One function: an optional association record plus the interfaces it
/// spans, in wire order.
///
/// Fields are open so a proposed set can be perturbed before assembly;
/// `assemble` re-validates whatever it is handed.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionGroup {
    pub association: Option<InterfaceAssociationDescriptor>,
    pub interfaces: Vec<InterfaceGroup>,
}

impl FunctionGroup {
    pub fn interface_numbers(&self)
        -> impl Iterator<Item = InterfaceNum> + '_
    {
        self.interfaces.iter()
            .map(|group| group.descriptor.interface_number)
    }

    /// Records in wire order: association first, then each interface
    /// followed by its class-specific records and endpoints.
    pub fn descriptors(&self) -> Vec<Descriptor> {
        let mut records = Vec::new();
        if let Some(association) = &self.association {
            records.push(Descriptor::InterfaceAssociation(*association));
        }
        for group in &self.interfaces {
            records.push(Descriptor::Interface(group.descriptor));
            records.extend(group.class_specific.iter().cloned());
            records.extend(group.endpoints.iter()
                .map(|endpoint| Descriptor::Endpoint(endpoint.descriptor)));
        }
        records
    }

    /// Total encoded size of this function's records.
    pub fn wire_length(&self) -> usize {
        self.descriptors().iter()
            .map(|desc| desc.bytes().len())
            .sum()
    }
}

/// Lays out the interfaces of one function, numbering them upwards
/// from a base.
pub struct FunctionBuilder {
    first_interface: InterfaceNum,
    function_class: u8,
    function_subclass: u8,
    function_protocol: u8,
    interfaces: Vec<InterfaceGroup>,
}

impl FunctionBuilder {
    pub fn new(first_interface: InterfaceNum,
               function_class: u8,
               function_subclass: u8,
               function_protocol: u8)
        -> Self
    {
        FunctionBuilder {
            first_interface,
            function_class,
            function_subclass,
            function_protocol,
            interfaces: Vec::new(),
        }
    }

    /// Append an interface, numbered after the ones already added.
    /// Fails if the number would not fit in the wire field.
    pub fn interface(mut self,
                     interface_class: u8,
                     interface_subclass: u8,
                     interface_protocol: u8,
                     class_specific: Vec<Descriptor>,
                     endpoints: Vec<EndpointEntry>)
        -> Result<Self, Violation>
    {
        let number =
            self.first_interface.0 as u16 + self.interfaces.len() as u16;
        if number > u8::MAX as u16 {
            return Err(Violation::InvalidField {
                field: "bInterfaceNumber",
                value: number,
                constraint: "interface numbers must not exceed 255",
            });
        }
        self.interfaces.push(InterfaceGroup::new(
            InterfaceNum(number as u8),
            interface_class,
            interface_subclass,
            interface_protocol,
            class_specific,
            endpoints));
        Ok(self)
    }

    /// Finish the function. A multi-interface function gets an
    /// association record spanning exactly its interfaces; a
    /// single-interface function does not need one.
    pub fn build(self) -> FunctionGroup {
        let association = if self.interfaces.len() > 1 {
            Some(InterfaceAssociationDescriptor::new(
                self.first_interface,
                self.interfaces.len() as u8,
                self.function_class,
                self.function_subclass,
                self.function_protocol))
        } else {
            None
        };
        FunctionGroup {
            association,
            interfaces: self.interfaces,
        }
    }
}

/// Build the device descriptor for a composite device.
pub fn build_device_identity(params: &DeviceParams)
    -> Result<DeviceDescriptor, Violation>
{
    let desc = DeviceDescriptor {
        length: size_of::<DeviceDescriptor>() as u8,
        descriptor_type: DescriptorType::Device as u8,
        usb_version: params.usb_version,
        device_class: class::MISCELLANEOUS,
        device_subclass: IAD_DEVICE_SUBCLASS,
        device_protocol: IAD_DEVICE_PROTOCOL,
        max_packet_size_0: params.max_packet_size_0,
        vendor_id: params.vendor_id,
        product_id: params.product_id,
        device_version: params.device_version,
        manufacturer_str_id: StringId(0),
        product_str_id: StringId(0),
        serial_str_id: StringId(0),
        num_configurations: 1,
    };
    match validation::check_device(&desc).into_iter().next() {
        Some(violation) => Err(violation),
        None => Ok(desc),
    }
}

/// Build a two-interface CDC-ACM function: a control interface carrying
/// the functional descriptors and an interrupt notification endpoint,
/// and a data interface carrying a bulk pair.
///
/// `data_endpoints` is ordered OUT then IN.
pub fn build_cdc_acm_function(interface_base: InterfaceNum,
                              control_endpoint: EndpointParams,
                              data_endpoints: [EndpointParams; 2])
    -> Result<FunctionGroup, Violation>
{
    if control_endpoint.transfer_type != EndpointType::Interrupt {
        return Err(Violation::InvalidField {
            field: "bmAttributes",
            value: control_endpoint.transfer_type as u16,
            constraint: "ACM notification endpoint must be interrupt",
        });
    }
    for params in &data_endpoints {
        if params.transfer_type != EndpointType::Bulk {
            return Err(Violation::InvalidField {
                field: "bmAttributes",
                value: params.transfer_type as u16,
                constraint: "CDC data endpoints must be bulk",
            });
        }
    }

    let control_interface = interface_base;
    let data_interface = match interface_base.0.checked_add(1) {
        Some(number) => InterfaceNum(number),
        None => return Err(Violation::InvalidField {
            field: "bInterfaceNumber",
            value: interface_base.0 as u16 + 1,
            constraint: "interface numbers must not exceed 255",
        }),
    };

    let notification = EndpointEntry::new(Direction::In,
                                          &control_endpoint)?;
    let data_out = EndpointEntry::new(Direction::Out, &data_endpoints[0])?;
    let data_in = EndpointEntry::new(Direction::In, &data_endpoints[1])?;

    let class_specific = vec![
        Descriptor::CdcHeader(
            CdcHeaderDescriptor::new(BCDVersion::from(CDC_VERSION))),
        Descriptor::CdcAcm(
            CdcAcmDescriptor::new(ACM_CAPABILITIES)),
        Descriptor::CdcUnion(
            CdcUnionDescriptor::new(control_interface, data_interface)),
        Descriptor::CdcCallManagement(
            CdcCallManagementDescriptor::new(CALL_MGMT_CAPABILITIES,
                                             data_interface)),
    ];

    // Function-level triple is CDC / ACM / AT commands.
    Ok(FunctionBuilder::new(interface_base,
                            class::CDC_CONTROL,
                            class::CDC_SUBCLASS_ACM,
                            0x01)
        .interface(class::CDC_CONTROL, class::CDC_SUBCLASS_ACM, 0x00,
                   class_specific, vec![notification])?
        .interface(class::CDC_DATA, 0x00, 0x00,
                   Vec::new(), vec![data_out, data_in])?
        .build())
}

/// Accumulates functions against a device identity, refusing an
/// interface claim that collides with one already added.
pub struct DescriptorSetBuilder {
    device: DeviceDescriptor,
    functions: Vec<FunctionGroup>,
}

impl DescriptorSetBuilder {
    pub fn new(device: DeviceDescriptor) -> Self {
        DescriptorSetBuilder {
            device,
            functions: Vec::new(),
        }
    }

    pub fn add_function(&mut self, function: FunctionGroup)
        -> Result<&mut Self, Violation>
    {
        for number in function.interface_numbers() {
            for (index, existing) in self.functions.iter().enumerate() {
                if existing.interface_numbers().contains(&number) {
                    return Err(Violation::InterfaceNumberConflict {
                        number,
                        functions: vec![index, self.functions.len()],
                    });
                }
            }
        }
        self.functions.push(function);
        Ok(self)
    }

    pub fn functions(&self) -> &[FunctionGroup] {
        &self.functions
    }

    pub fn assemble(&self, config: &ConfigParams)
        -> Result<DescriptorSet, BuildError>
    {
        assemble(&self.device, config, &self.functions)
    }
}

/// Validate a whole proposed set and freeze it into wire form.
///
/// Violations are collected across the entire set before anything is
/// rejected, so a single call reports everything wrong with it.
pub fn assemble(device: &DeviceDescriptor,
                config: &ConfigParams,
                functions: &[FunctionGroup])
    -> Result<DescriptorSet, BuildError>
{
    let wire_length = size_of::<ConfigDescriptor>()
        + functions.iter()
            .map(FunctionGroup::wire_length)
            .sum::<usize>();
    if wire_length > u16::MAX as usize {
        return Err(BuildError {
            violations: vec![Violation::InvalidField {
                field: "wTotalLength",
                value: u16::MAX,
                constraint: "configuration image exceeds 65535 bytes",
            }],
        });
    }
    let total_length = wire_length as u16;
    let num_interfaces = functions.iter()
        .flat_map(FunctionGroup::interface_numbers)
        .map(|number| number.0)
        .unique()
        .count() as u8;

    let mut attributes = ConfigAttributes(0);
    attributes.set_bus_powered(true);
    attributes.set_self_powered(config.self_powered);
    attributes.set_remote_wakeup(config.remote_wakeup);

    let config_desc = ConfigDescriptor {
        length: size_of::<ConfigDescriptor>() as u8,
        descriptor_type: DescriptorType::Configuration as u8,
        total_length,
        num_interfaces,
        config_value: config.config_value,
        config_str_id: StringId(0),
        attributes,
        max_power: config.max_power,
    };

    let violations = validation::validate(device, &config_desc, functions);
    if !violations.is_empty() {
        return Err(BuildError { violations });
    }

    let mut records = vec![
        Descriptor::Device(*device),
        Descriptor::Configuration(config_desc),
    ];
    for function in functions {
        records.extend(function.descriptors());
    }

    let set = DescriptorSet::freeze(records);

    // The frozen image is re-walked by its length bytes as a last
    // defence against a record lying about its size.
    if let Some(violation) =
        validation::check_config_image(set.config_bytes(), total_length)
    {
        return Err(BuildError { violations: vec![violation] });
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usb::{CdcCallManagementDescriptor, CdcUnionDescriptor};

    fn stock_endpoints() -> (EndpointParams, [EndpointParams; 2]) {
        let control = EndpointParams {
            address: EndpointAddr(0x81),
            transfer_type: EndpointType::Interrupt,
            max_packet_size: 16,
            interval: 64,
        };
        let data = [
            EndpointParams {
                address: EndpointAddr(0x02),
                transfer_type: EndpointType::Bulk,
                max_packet_size: 512,
                interval: 128,
            },
            EndpointParams {
                address: EndpointAddr(0x83),
                transfer_type: EndpointType::Bulk,
                max_packet_size: 512,
                interval: 128,
            },
        ];
        (control, data)
    }

    fn stock_device() -> DeviceDescriptor {
        build_device_identity(&DeviceParams::new(0x1234, 0x5678))
            .expect("stock device must build")
    }

    fn stock_function(base: u8) -> FunctionGroup {
        let (control, data) = stock_endpoints();
        // Shift endpoint numbers along with the interface base so
        // multi-function tests keep addresses distinct. Base 0 is the
        // stock layout: 0x81, 0x02, 0x83.
        let block = (base / 2) * 3;
        let control = EndpointParams {
            address: EndpointAddr(0x80 | (1 + block)),
            ..control
        };
        let data = [
            EndpointParams {
                address: EndpointAddr(2 + block),
                ..data[0]
            },
            EndpointParams {
                address: EndpointAddr(0x80 | (3 + block)),
                ..data[1]
            },
        ];
        build_cdc_acm_function(InterfaceNum(base), control, data)
            .expect("stock function must build")
    }

    #[test]
    fn test_device_identity() {
        let device = stock_device();
        assert_eq!(device.device_class, class::MISCELLANEOUS);
        assert_eq!(device.device_subclass, IAD_DEVICE_SUBCLASS);
        assert_eq!(device.device_protocol, IAD_DEVICE_PROTOCOL);
        assert_eq!(device.num_configurations, 1);
        assert_eq!(device.bytes(), [
            18, 0x01, 0x00, 0x02, 0xEF, 0x02, 0x01, 64,
            0x34, 0x12, 0x78, 0x56, 0x00, 0x01, 0, 0, 0, 1,
        ]);

        for size in [8, 16, 32, 64] {
            let mut params = DeviceParams::new(0x1234, 0x5678);
            params.max_packet_size_0 = size;
            assert!(build_device_identity(&params).is_ok());
        }

        let mut params = DeviceParams::new(0x1234, 0x5678);
        params.max_packet_size_0 = 0;
        assert_eq!(build_device_identity(&params),
                   Err(Violation::InvalidField {
                       field: "bMaxPacketSize0",
                       value: 0,
                       constraint: "must be 8, 16, 32 or 64",
                   }));
    }

    #[test]
    fn test_cdc_acm_function_shape() {
        let function = stock_function(0);

        let association = function.association
            .expect("two-interface function must carry an association");
        assert_eq!(association.first_interface, InterfaceNum(0));
        assert_eq!(association.interface_count, 2);
        assert_eq!(association.function_class, class::CDC_CONTROL);
        assert_eq!(association.function_subclass, class::CDC_SUBCLASS_ACM);
        assert_eq!(association.function_protocol, 0x01);

        assert_eq!(function.interfaces.len(), 2);
        let control = &function.interfaces[0];
        let data = &function.interfaces[1];

        assert_eq!(control.descriptor.interface_number, InterfaceNum(0));
        assert_eq!(control.descriptor.interface_class, class::CDC_CONTROL);
        assert_eq!(control.descriptor.num_endpoints, 1);
        assert_eq!(control.endpoints.len(), 1);
        assert_eq!(data.descriptor.interface_number, InterfaceNum(1));
        assert_eq!(data.descriptor.interface_class, class::CDC_DATA);
        assert_eq!(data.descriptor.num_endpoints, 2);
        assert_eq!(data.endpoints.len(), 2);

        let subtypes: Vec<DescriptorType> = control.class_specific.iter()
            .map(|desc| desc.descriptor_type())
            .collect();
        assert_eq!(subtypes, vec![DescriptorType::CsInterface; 4]);
        match &control.class_specific[2] {
            Descriptor::CdcUnion(union) => {
                assert_eq!(union.master_interface, InterfaceNum(0));
                assert_eq!(union.slave_interface, InterfaceNum(1));
            }
            other => panic!("Expected union descriptor, got {other:?}"),
        }
        match &control.class_specific[3] {
            Descriptor::CdcCallManagement(call_mgmt) => {
                assert_eq!(call_mgmt.data_interface, InterfaceNum(1));
            }
            other => panic!("Expected call management, got {other:?}"),
        }
    }

    #[test]
    fn test_stock_table_assembles() {
        let set = assemble(&stock_device(),
                           &ConfigParams::default(),
                           &[stock_function(0)])
            .expect("stock table must assemble");

        assert_eq!(set.len(), 12);
        assert_eq!(set.bytes().len(), 93);
        assert_eq!(set.device_bytes().len(), 18);
        assert_eq!(set.config_bytes().len(), 75);

        match set.lookup(1).map(|view| view.record.clone()) {
            Some(Descriptor::Configuration(config)) => {
                let total_length: u16 = config.total_length;
                assert_eq!(total_length, 75);
                assert_eq!(config.num_interfaces, 2);
                assert_eq!(config.config_value, 1);
                assert_eq!(config.attributes.0, 0x80);
                assert_eq!(config.max_power, 250);
            }
            other => panic!("Expected configuration, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_control_transfer_type() {
        let (control, data) = stock_endpoints();
        let control = EndpointParams {
            transfer_type: EndpointType::Bulk,
            ..control
        };
        assert_eq!(
            build_cdc_acm_function(InterfaceNum(0), control, data),
            Err(Violation::InvalidField {
                field: "bmAttributes",
                value: EndpointType::Bulk as u16,
                constraint: "ACM notification endpoint must be interrupt",
            }));
    }

    #[test]
    fn test_data_in_endpoint_with_out_address() {
        let (control, data) = stock_endpoints();
        // Hand the IN slot an address with the direction bit clear.
        let data = [
            data[0],
            EndpointParams {
                address: EndpointAddr(0x02),
                ..data[1]
            },
        ];
        assert_eq!(
            build_cdc_acm_function(InterfaceNum(0), control, data),
            Err(Violation::EndpointDirectionMismatch {
                address: 0x02,
                declared: Direction::In,
                actual: Direction::Out,
            }));
    }

    #[test]
    fn test_assemble_rechecks_perturbed_roles() {
        let mut function = stock_function(0);
        // Flip the notification endpoint's declared role after the
        // fact; assembly must catch it even though the builder did not.
        function.interfaces[0].endpoints[0].role = Direction::Out;

        let error = assemble(&stock_device(),
                             &ConfigParams::default(),
                             &[function])
            .expect_err("perturbed set must be rejected");
        assert_eq!(error.violations, vec![
            Violation::EndpointDirectionMismatch {
                address: 0x81,
                declared: Direction::Out,
                actual: Direction::In,
            }
        ]);
    }

    #[test]
    fn test_union_reference_to_missing_interface() {
        let mut function = stock_function(0);
        function.interfaces[0].class_specific[2] =
            Descriptor::CdcUnion(CdcUnionDescriptor::new(
                InterfaceNum(0), InterfaceNum(5)));

        let error = assemble(&stock_device(),
                             &ConfigParams::default(),
                             &[function])
            .expect_err("dangling reference must be rejected");
        assert_eq!(error.violations, vec![
            Violation::CrossReference {
                referrer: "union functional descriptor",
                detail: "references slave interface 5 \
                         which is not defined".to_string(),
            }
        ]);
    }

    #[test]
    fn test_call_management_reference_to_missing_interface() {
        let mut function = stock_function(0);
        function.interfaces[0].class_specific[3] =
            Descriptor::CdcCallManagement(
                CdcCallManagementDescriptor::new(0, InterfaceNum(7)));

        let error = assemble(&stock_device(),
                             &ConfigParams::default(),
                             &[function])
            .expect_err("dangling reference must be rejected");
        assert_eq!(error.violations, vec![
            Violation::CrossReference {
                referrer: "call management functional descriptor",
                detail: "references data interface 7 \
                         which is not defined".to_string(),
            }
        ]);
    }

    #[test]
    fn test_interface_numbers_cannot_exceed_255() {
        // The CDC function's data interface would be 256.
        let (control, data) = stock_endpoints();
        assert_eq!(
            build_cdc_acm_function(InterfaceNum(255), control, data),
            Err(Violation::InvalidField {
                field: "bInterfaceNumber",
                value: 256,
                constraint: "interface numbers must not exceed 255",
            }));

        // Interface 255 itself is fine; the one after it is not.
        let overflowed = FunctionBuilder::new(InterfaceNum(255), 0xFF, 0, 0)
            .interface(0xFF, 0x00, 0x00, Vec::new(), Vec::new())
            .expect("interface 255 must be accepted")
            .interface(0xFF, 0x00, 0x00, Vec::new(), Vec::new());
        assert_eq!(
            overflowed.err(),
            Some(Violation::InvalidField {
                field: "bInterfaceNumber",
                value: 256,
                constraint: "interface numbers must not exceed 255",
            }));
    }

    #[test]
    fn test_device_class_lockstep() {
        // Associations present, device not advertising them.
        let mut device = stock_device();
        device.device_class = 0x00;
        device.device_subclass = 0x00;
        device.device_protocol = 0x00;
        let error = assemble(&device,
                             &ConfigParams::default(),
                             &[stock_function(0)])
            .expect_err("mismatched device class must be rejected");
        assert_eq!(error.violations.len(), 1);
        assert!(matches!(error.violations[0],
                         Violation::CrossReference {
                             referrer: "device descriptor", ..
                         }));

        // Device advertising associations, none present.
        let mut function = stock_function(0);
        function.association = None;
        let error = assemble(&stock_device(),
                             &ConfigParams::default(),
                             &[function])
            .expect_err("stripped association must be rejected");
        assert_eq!(error.violations.len(), 2);
        assert!(matches!(error.violations[0],
                         Violation::CrossReference {
                             referrer: "function", ..
                         }));
        assert!(matches!(error.violations[1],
                         Violation::CrossReference {
                             referrer: "device descriptor", ..
                         }));
    }

    #[test]
    fn test_conflict_reported_once_per_number_with_all_claimants() {
        let functions = [stock_function(0), stock_function(0)];
        let error = assemble(&stock_device(),
                             &ConfigParams::default(),
                             &functions)
            .expect_err("conflicting claims must be rejected");
        assert_eq!(error.violations, vec![
            Violation::InterfaceNumberConflict {
                number: InterfaceNum(0),
                functions: vec![0, 1],
            },
            Violation::InterfaceNumberConflict {
                number: InterfaceNum(1),
                functions: vec![0, 1],
            },
        ]);

        // The report is symmetric in the functions involved: two
        // different functions overlapping on interface 1 produce the
        // same violation whichever order they appear in.
        let forward = assemble(&stock_device(),
                               &ConfigParams::default(),
                               &[stock_function(0), stock_function(1)])
            .expect_err("overlapping claims must be rejected");
        let reversed = assemble(&stock_device(),
                                &ConfigParams::default(),
                                &[stock_function(1), stock_function(0)])
            .expect_err("overlapping claims must be rejected");
        assert_eq!(forward.violations, vec![
            Violation::InterfaceNumberConflict {
                number: InterfaceNum(1),
                functions: vec![0, 1],
            },
        ]);
        assert_eq!(forward.violations, reversed.violations);
    }

    #[test]
    fn test_function_order_changes_wire_not_validity() {
        let forward = assemble(&stock_device(),
                               &ConfigParams::default(),
                               &[stock_function(0), stock_function(2)])
            .expect("disjoint functions must assemble");
        let reversed = assemble(&stock_device(),
                                &ConfigParams::default(),
                                &[stock_function(2), stock_function(0)])
            .expect("disjoint functions must assemble");

        assert_eq!(forward.bytes().len(), reversed.bytes().len());
        assert_eq!(forward.device_bytes(), reversed.device_bytes());
        assert_ne!(forward.bytes(), reversed.bytes());
    }

    #[test]
    fn test_assemble_collects_every_violation() {
        let mut device = stock_device();
        device.max_packet_size_0 = 0;
        let error = assemble(&device,
                             &ConfigParams::default(),
                             &[stock_function(0), stock_function(0)])
            .expect_err("broken set must be rejected");

        // One pass reports the bad device field and both conflicts.
        assert_eq!(error.violations.len(), 3);
        assert!(matches!(error.violations[0],
                         Violation::InvalidField {
                             field: "bMaxPacketSize0", ..
                         }));
        assert!(error.violations[1..].iter().all(
            |violation| matches!(
                violation, Violation::InterfaceNumberConflict { .. })));
    }

    #[test]
    fn test_builder_rejects_conflicting_claim_on_add() {
        let mut builder = DescriptorSetBuilder::new(stock_device());
        builder.add_function(stock_function(0))
            .expect("first claim must succeed");
        builder.add_function(stock_function(2))
            .expect("disjoint claim must succeed");

        assert_eq!(
            builder.add_function(stock_function(1)).err(),
            Some(Violation::InterfaceNumberConflict {
                number: InterfaceNum(1),
                functions: vec![0, 2],
            }));

        // The rejected function must not have been retained.
        assert_eq!(builder.functions().len(), 2);
        let set = builder.assemble(&ConfigParams::default())
            .expect("accepted functions must assemble");
        assert_eq!(set.config_bytes().len(),
                   9 + 2 * (8 + 9 + 5 + 4 + 5 + 5 + 7 + 9 + 7 + 7));
    }

    #[test]
    fn test_single_interface_function_needs_no_association() {
        let endpoint = EndpointEntry::new(Direction::In, &EndpointParams {
            address: EndpointAddr(0x81),
            transfer_type: EndpointType::Interrupt,
            max_packet_size: 64,
            interval: 10,
        }).expect("endpoint must build");

        // A plain vendor-specific interface, grouped as one function.
        let function = FunctionBuilder::new(InterfaceNum(0), 0xFF, 0, 0)
            .interface(0xFF, 0x00, 0x00, Vec::new(), vec![endpoint])
            .expect("interface number must be in range")
            .build();
        assert!(function.association.is_none());

        let mut device = stock_device();
        device.device_class = 0xFF;
        device.device_subclass = 0x00;
        device.device_protocol = 0x00;
        let set = assemble(&device, &ConfigParams::default(), &[function])
            .expect("single-interface set must assemble");
        assert_eq!(set.config_bytes().len(), 9 + 9 + 7);
    }
}
