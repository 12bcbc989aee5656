//! The frozen result of assembly: decoded records, their wire image,
//! and the byte ranges tying the two together.

use std::ops::Range;

use crate::usb::prelude::*;

/// An assembled, validated, immutable descriptor set.
///
/// The record list and wire image are fixed when the set is frozen and
/// cannot be modified through this API, so a set can be handed to a
/// transport task and served from directly.
#[derive(Debug)]
pub struct DescriptorSet {
    records: Vec<Descriptor>,
    bytes: Vec<u8>,
    offsets: Vec<Range<usize>>,
}

/// A borrowed view of one record in a frozen set.
#[derive(Copy, Clone, Debug)]
pub struct DescriptorView<'set> {
    /// Position of the record in wire order.
    pub index: usize,
    /// Byte offset of the record within the full image.
    pub offset: usize,
    pub record: &'set Descriptor,
    pub bytes: &'set [u8],
}

impl DescriptorSet {
    /// Freeze an ordered record list into its wire image.
    pub(crate) fn freeze(records: Vec<Descriptor>) -> Self {
        let mut bytes = Vec::new();
        let mut offsets = Vec::with_capacity(records.len());
        for record in &records {
            let start = bytes.len();
            bytes.extend_from_slice(&record.bytes());
            offsets.push(start..bytes.len());
        }
        DescriptorSet {
            records,
            bytes,
            offsets,
        }
    }

    /// Number of records in the set.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up one record by its position in wire order.
    pub fn lookup(&self, index: usize) -> Option<DescriptorView<'_>> {
        let range = self.offsets.get(index)?;
        Some(DescriptorView {
            index,
            offset: range.start,
            record: &self.records[index],
            bytes: &self.bytes[range.clone()],
        })
    }

    /// Views of every record in wire order.
    pub fn iter(&self) -> impl Iterator<Item = DescriptorView<'_>> {
        (0..self.records.len()).filter_map(|index| self.lookup(index))
    }

    /// The full wire image: device descriptor followed by the
    /// configuration image.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The device descriptor's bytes, as served for a GET_DESCRIPTOR
    /// device request.
    pub fn device_bytes(&self) -> &[u8] {
        match self.offsets.first() {
            Some(range) => &self.bytes[range.clone()],
            None => &[],
        }
    }

    /// The configuration image: the configuration descriptor and every
    /// record under it, as served for a GET_DESCRIPTOR configuration
    /// request.
    pub fn config_bytes(&self) -> &[u8] {
        match self.offsets.get(1) {
            Some(range) => &self.bytes[range.start..],
            None => &[],
        }
    }
}
