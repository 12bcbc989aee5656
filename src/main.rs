//! Command-line tool that builds the stock CDC-ACM descriptor table
//! and dumps it record by record.

use std::process::ExitCode;

use anyhow::{Context, Error, bail};

use descriptry::builder::{
    assemble,
    build_cdc_acm_function,
    build_device_identity,
    ConfigParams,
    DeviceParams,
    EndpointParams,
    FunctionGroup,
};
use descriptry::set::DescriptorSet;
use descriptry::usb::prelude::*;
use descriptry::util::Bytes;

// Placeholder IDs used when none are given on the command line.
const DEFAULT_VENDOR_ID: u16 = 0x1234;
const DEFAULT_PRODUCT_ID: u16 = 0x5678;

const USAGE: &str = "Usage: descriptry [VID:PID]

Builds the stock CDC-ACM descriptor table for the given IDs (hex)
and prints every record with its wire bytes.";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Error> {
    let args: Vec<String> = std::env::args().collect();
    let (vendor_id, product_id) = match args.len() {
        1 => (DEFAULT_VENDOR_ID, DEFAULT_PRODUCT_ID),
        2 if args[1] == "--help" => {
            println!("{USAGE}");
            return Ok(());
        }
        2 if args[1] == "--version" => {
            println!("descriptry {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        2 => parse_ids(&args[1])?,
        _ => bail!("{USAGE}"),
    };

    let device = build_device_identity(
        &DeviceParams::new(vendor_id, product_id))?;
    let set = assemble(&device,
                       &ConfigParams::default(),
                       &[stock_function()?])?;
    print_set(&set);
    Ok(())
}

fn parse_ids(arg: &str) -> Result<(u16, u16), Error> {
    let Some((vid, pid)) = arg.split_once(':') else {
        bail!("Expected VID:PID, got '{arg}'");
    };
    let vendor_id =
        u16::from_str_radix(vid.trim_start_matches("0x"), 16)
            .with_context(|| format!("Invalid vendor ID '{vid}'"))?;
    let product_id =
        u16::from_str_radix(pid.trim_start_matches("0x"), 16)
            .with_context(|| format!("Invalid product ID '{pid}'"))?;
    Ok((vendor_id, product_id))
}

/// The stock function layout: notification on EP1 IN, data on EP2 OUT
/// and EP3 IN.
fn stock_function() -> Result<FunctionGroup, Error> {
    Ok(build_cdc_acm_function(
        InterfaceNum(0),
        EndpointParams {
            address: EndpointAddr(0x81),
            transfer_type: EndpointType::Interrupt,
            max_packet_size: 16,
            interval: 64,
        },
        [
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
        ])?)
}

fn print_set(set: &DescriptorSet) {
    println!("Descriptor set: {} records, {} bytes",
             set.len(), set.bytes().len());
    println!("Device request serves {} bytes, \
              configuration request serves {} bytes",
             set.device_bytes().len(), set.config_bytes().len());
    for view in set.iter() {
        println!();
        println!("[{}] at offset {}: {}",
                 view.index, view.offset, view.record.description());
        println!("    {}", Bytes::first(32, view.bytes));
        for line in view.record.field_text_lines() {
            println!("      {line}");
        }
    }
}
