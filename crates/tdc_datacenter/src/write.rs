//! Encoding data centers
//!

use indexmap::IndexSet;
use std::{
    collections::VecDeque,
    io::{Cursor, Write},
};
use tracing::{debug, instrument};

use crate::{
    cipher::Cipher,
    error::{DataError, Result},
    node::{Node, ROOT_NAME, VALUE_ATTRIBUTE},
    options::SaveOptions,
    payload::{seal_payload, RawDataCenter, NAME_BUCKETS, VALUE_BUCKETS},
    region::{Region, SegmentedRegion},
    string_table::StringTableWriter,
    types::{Address, ContainerHeader, RawAttribute, RawKeys, RawNode, FORMAT_VERSION},
    value::{DataCenterKeys, DataCenterValue},
};

/// Highest index the keys field of a node record can hold
const MAX_KEYS_INDEX: usize = (u16::MAX >> 4) as usize;

/// Lays out a node tree into the regions of a payload
///
/// Nodes are visited breadth first starting at the root, which always lands at address (0, 0). Every node's
/// children occupy one contiguous block of node records and its attributes one contiguous block of attribute
/// records, with the value attribute last.
#[derive(Debug)]
pub struct DataCenterWriter {
    names: StringTableWriter,
    values: StringTableWriter,
    keys: IndexSet<RawKeys>,
    nodes: SegmentedRegion<RawNode>,
    attributes: SegmentedRegion<RawAttribute>,
}

impl Default for DataCenterWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DataCenterWriter {
    pub fn new() -> Self {
        Self {
            names: StringTableWriter::new(NAME_BUCKETS),
            values: StringTableWriter::new(VALUE_BUCKETS),
            keys: IndexSet::from([RawKeys::default()]),
            nodes: SegmentedRegion::new(),
            attributes: SegmentedRegion::new(),
        }
    }

    /// Add `root` and everything below it. Can only be called once per writer.
    #[instrument(skip_all, fields(root = root.name()), err)]
    pub fn write_tree(&mut self, root: Node<'_>) -> Result<()> {
        let root_address = self.nodes.allocate(1, "nodes")?;
        let mut queue = VecDeque::from([(root, root_address)]);

        while let Some((node, address)) = queue.pop_front() {
            let name = if address == root_address {
                ROOT_NAME
            } else {
                node.name()
            };

            let mut raw = RawNode {
                name_index: self.name_index(name)?,
                keys_info: self.keys_index(node.keys())? << 4,
                ..Default::default()
            };

            let attribute_count = node.attribute_count() + usize::from(node.value().is_some());
            raw.attribute_count = checked_count(attribute_count, "attributes")?;
            raw.attribute_address = self.attributes.allocate(attribute_count, "attributes")?;

            let value = node
                .value()
                .map(|value| (VALUE_ATTRIBUTE, DataCenterValue::String(value.into())));
            let attributes = node
                .attributes()
                .map(|(name, value)| (name, value.clone()))
                .chain(value);

            for (offset, (name, value)) in attributes.enumerate() {
                let record = RawAttribute {
                    name_index: self.name_index(name)?,
                    type_info: value.type_info(),
                    value: self.encode_value(&value)?,
                };
                *self
                    .attributes
                    .get_mut(offset_address(raw.attribute_address, offset))
                    .expect("attribute block was allocated above") = record;
            }

            raw.child_count = checked_count(node.child_count(), "children")?;
            raw.child_address = self.nodes.allocate(node.child_count(), "nodes")?;

            for (offset, child) in node.children().enumerate() {
                queue.push_back((child, offset_address(raw.child_address, offset)));
            }

            *self
                .nodes
                .get_mut(address)
                .expect("node record was allocated with its parent") = raw;
        }

        debug!(
            nodes = self.nodes.len(),
            attributes = self.attributes.len(),
            names = self.names.len(),
            values = self.values.len(),
            keys = self.keys.len(),
            "laid out tree"
        );

        Ok(())
    }

    fn name_index(&mut self, name: &str) -> Result<u16> {
        let entry = self.names.add(name)?;
        u16::try_from(entry.index).map_err(|_| {
            DataError::TooMany {
                what: "names",
                count: entry.index as usize,
                max: u16::MAX as usize,
            }
            .into()
        })
    }

    fn keys_index(&mut self, keys: &DataCenterKeys) -> Result<u16> {
        let mut raw = RawKeys::default();
        for (slot, name) in raw.names.iter_mut().zip(keys.names()) {
            *slot = self.name_index(name)?;
        }

        let (index, _) = self.keys.insert_full(raw);
        if index > MAX_KEYS_INDEX {
            return Err(DataError::TooMany {
                what: "key sets",
                count: index + 1,
                max: MAX_KEYS_INDEX + 1,
            }
            .into());
        }

        Ok(index as u16)
    }

    fn encode_value(&mut self, value: &DataCenterValue) -> Result<u32> {
        Ok(match value {
            DataCenterValue::Int(v) => *v as u32,
            DataCenterValue::Single(v) => v.to_bits(),
            DataCenterValue::Boolean(v) => u32::from(*v),
            DataCenterValue::String(v) => self.values.add(v)?.address.to_bits(),
        })
    }

    /// Produce the finished regions
    pub fn finish(self) -> RawDataCenter {
        RawDataCenter {
            names: self.names.finish(),
            values: self.values.finish(),
            keys: Region {
                elements: self.keys.into_iter().collect(),
            },
            nodes: self.nodes,
            attributes: self.attributes,
        }
    }
}

fn checked_count(count: usize, what: &'static str) -> Result<u16> {
    u16::try_from(count).map_err(|_| {
        DataError::TooMany {
            what,
            count,
            max: u16::MAX as usize,
        }
        .into()
    })
}

/// Address of the record `offset` places after `start` in the same segment
fn offset_address(start: Address, offset: usize) -> Address {
    Address::new(start.segment, start.element + offset as u16)
}

fn seal(raw: &RawDataCenter, cipher: &Cipher, options: &SaveOptions) -> Result<Vec<u8>> {
    let header = ContainerHeader {
        version: FORMAT_VERSION,
        revision: options.revision,
        architecture: options.architecture,
        compression: options.compression,
    };

    let payload = raw.write(options.architecture)?;

    let mut sealed = Cursor::new(Vec::new());
    seal_payload(&header, cipher, &payload, &mut sealed)?;

    Ok(sealed.into_inner())
}

/// Write `root` and its subtree as a complete data center
#[instrument(skip_all, fields(revision = options.revision, compression = ?options.compression), err)]
pub fn save<W: Write>(root: Node<'_>, mut writer: W, options: &SaveOptions) -> Result<()> {
    let cipher = options.cipher()?;

    let mut dc = DataCenterWriter::new();
    dc.write_tree(root)?;
    let sealed = seal(&dc.finish(), &cipher, options)?;

    writer.write_all(&sealed)?;
    writer.flush()?;

    Ok(())
}

/// Write `root` and its subtree to an asynchronous stream
///
/// Yields to the runtime between stages. Dropping the future cancels the write.
#[cfg(feature = "tokio")]
pub async fn save_async<W>(root: Node<'_>, mut writer: W, options: &SaveOptions) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    use tokio::io::AsyncWriteExt;

    let cipher = options.cipher()?;

    let mut dc = DataCenterWriter::new();
    dc.write_tree(root)?;
    tokio::task::yield_now().await;

    let sealed = seal(&dc.finish(), &cipher, options)?;
    tokio::task::yield_now().await;

    writer.write_all(&sealed).await?;
    writer.flush().await?;

    Ok(())
}
