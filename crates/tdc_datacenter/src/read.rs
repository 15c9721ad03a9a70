//! Decoding data centers
//!

use indexmap::IndexMap;
use std::{
    io::{Cursor, Read},
    ops::Range,
    sync::{Arc, OnceLock},
};
use tracing::{debug, instrument, trace};

use crate::{
    data_center::DataCenter,
    error::{DataError, Result},
    node::{NodeData, NodeId, VALUE_ATTRIBUTE},
    options::{LoadOptions, LoaderMode},
    payload::{open_payload, read_header},
    region::{Region, SegmentedRegion},
    string_table::StringTable,
    types::{Address, ContainerHeader, RawAttribute, RawKeys, RawNode},
    value::{DataCenterKeys, DataCenterValue, EXTENSION_BOOLEAN, TYPE_INT, TYPE_SINGLE, TYPE_STRING},
};

/// Decoded string tables and raw node regions that nodes are materialized from
#[derive(Debug)]
pub(crate) struct Backing {
    names: StringTable,
    values: StringTable,
    keys: Vec<DataCenterKeys>,
    nodes: SegmentedRegion<RawNode>,
    attributes: SegmentedRegion<RawAttribute>,
    offsets: Vec<usize>,
    strict: bool,
}

impl Backing {
    fn new(
        names: StringTable,
        values: StringTable,
        keys: Region<RawKeys>,
        nodes: SegmentedRegion<RawNode>,
        attributes: SegmentedRegion<RawAttribute>,
        strict: bool,
    ) -> Result<Self> {
        let keys = keys
            .elements
            .iter()
            .map(|raw| {
                raw.names
                    .iter()
                    .filter(|index| **index != 0)
                    .map(|index| lookup_name(&names, *index, "key name index").cloned())
                    .collect::<Result<Vec<_>>>()
                    .map(DataCenterKeys::from_names)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            names,
            values,
            keys,
            offsets: nodes.offsets(),
            nodes,
            attributes,
            strict,
        })
    }

    /// Total number of node records
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    fn id_of(&self, address: Address) -> NodeId {
        self.offsets[address.segment as usize] + address.element as usize
    }

    pub fn address_of(&self, id: NodeId) -> Address {
        // Empty segments share their offset with the next one, the last match is the owner.
        let segment = self.offsets.partition_point(|offset| *offset <= id) - 1;
        Address::new(segment as u16, (id - self.offsets[segment]) as u16)
    }

    /// Ids of the children of a node record, without decoding the node
    pub fn child_ids(&self, id: NodeId) -> Range<NodeId> {
        match self.nodes.get(self.address_of(id), "node") {
            Ok(raw) if raw.child_count > 0 => {
                let first = self.id_of(raw.child_address);
                first..first + raw.child_count as usize
            }
            _ => 0..0,
        }
    }

    /// Decode a single node record, checking every reference it holds
    pub fn decode(&self, id: NodeId) -> Result<NodeData> {
        let address = self.address_of(id);
        let raw = *self.nodes.get(address, "node")?;

        let name = lookup_name(&self.names, raw.name_index, "node name index")?.clone();

        let keys_index = raw.keys_index() as usize;
        let keys = match self.keys.get(keys_index) {
            Some(keys) => keys.clone(),
            None if keys_index == 0 => DataCenterKeys::none(),
            None => {
                return Err(DataError::OutOfBounds {
                    field: "node keys index",
                    value: keys_index as i64,
                    bounds: 0..self.keys.len() as i64,
                }
                .into())
            }
        };

        if self.strict && raw.flags() != 0 {
            return Err(DataError::InvalidNodeFlags {
                node: address,
                flags: raw.flags(),
            }
            .into());
        }

        let mut value = None;
        let mut attributes = IndexMap::with_capacity(raw.attribute_count as usize);

        if raw.attribute_count > 0 {
            let records = self.attributes.get_range(
                raw.attribute_address,
                raw.attribute_count as usize,
                "node attributes",
            )?;

            for record in records {
                let name = lookup_name(&self.names, record.name_index, "attribute name index")?;
                let decoded = decode_value(record, name, &self.values)?;

                if &**name == VALUE_ATTRIBUTE {
                    match decoded {
                        DataCenterValue::String(text) => value = Some(text),
                        _ => return Err(DataError::InvalidValueAttribute(address).into()),
                    }
                    continue;
                }

                if attributes.insert(name.clone(), decoded).is_some() && self.strict {
                    return Err(DataError::DuplicateAttribute {
                        node: address,
                        name: name.to_string(),
                    }
                    .into());
                }
            }
        }

        let children = if raw.child_count > 0 {
            self.nodes
                .get_range(raw.child_address, raw.child_count as usize, "node children")?;
            let first = self.id_of(raw.child_address);
            (first..first + raw.child_count as usize).collect()
        } else {
            Vec::new()
        };

        Ok(NodeData {
            name,
            value,
            keys,
            attributes,
            children,
        })
    }
}

fn lookup_name<'a>(names: &'a StringTable, index: u16, field: &'static str) -> Result<&'a Arc<str>> {
    match (index as usize).checked_sub(1) {
        Some(index) => names.get_by_index(index),
        None => Err(DataError::OutOfBounds {
            field,
            value: -1,
            bounds: 0..names.len() as i64,
        }
        .into()),
    }
}

fn decode_value(record: &RawAttribute, name: &str, values: &StringTable) -> Result<DataCenterValue> {
    let code = record.type_info & 0b11;
    let extension = record.type_info >> 2;

    Ok(match (code, extension) {
        (TYPE_INT, 0) => DataCenterValue::Int(record.value as i32),
        (TYPE_INT, EXTENSION_BOOLEAN) => match record.value {
            0 => DataCenterValue::Boolean(false),
            1 => DataCenterValue::Boolean(true),
            value => {
                return Err(DataError::InvalidBoolean {
                    name: name.to_owned(),
                    value,
                }
                .into())
            }
        },
        (TYPE_SINGLE, 0) => DataCenterValue::Single(f32::from_bits(record.value)),
        (TYPE_STRING, 0) => {
            DataCenterValue::String(values.get_by_address(Address::from_bits(record.value))?.clone())
        }
        _ => {
            return Err(DataError::InvalidAttributeType {
                name: name.to_owned(),
                type_info: record.type_info,
            }
            .into())
        }
    })
}

/// Walk every node reachable from the root, checking that each record is referenced at most once.
///
/// Returns the parent of every node record, and the decoded nodes themselves when `keep` is set.
#[instrument(skip(backing), fields(nodes = backing.len()), err)]
fn validate(backing: &Backing, keep: bool) -> Result<(Vec<Option<NodeId>>, Vec<OnceLock<NodeData>>)> {
    if backing.nodes.segments.first().map_or(true, Vec::is_empty) {
        return Err(DataError::MissingRoot.into());
    }

    let total = backing.len();
    let mut parents = vec![None; total];
    let mut visited = vec![false; total];
    let mut slots: Vec<OnceLock<NodeData>> = Vec::new();
    if keep {
        slots.resize_with(total, OnceLock::new);
    }

    let mut stack = vec![0];
    visited[0] = true;

    while let Some(id) = stack.pop() {
        let data = backing.decode(id)?;

        for &child in &data.children {
            if std::mem::replace(&mut visited[child], true) {
                return Err(DataError::SharedNode(backing.address_of(child)).into());
            }
            parents[child] = Some(id);
            stack.push(child);
        }

        if keep {
            slots[id]
                .set(data)
                .expect("each record is visited once");
        }
    }

    debug!(
        reachable = visited.iter().filter(|v| **v).count(),
        total, "validated node records"
    );

    Ok((parents, slots))
}

/// The step a [`DataCenterReader`] performs next
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadState {
    /// Check the options
    Start,
    /// Read the header, then decrypt and decompress the payload
    ReadHeader,
    /// Decode the names and values tables
    ReadStringTables,
    /// Decode the keys, node and attribute regions
    ReadNodeRegions,
    /// Validate the node records and build every node
    Materialize,
    /// Validate the node records, keeping them around to build nodes from on access
    DeferMaterialize,
    /// A data center is ready
    Done,
}

/// Decodes a data center one stage at a time
///
/// Every call to [`DataCenterReader::advance`] runs one stage. Any error aborts the whole read.
pub struct DataCenterReader<'a> {
    options: &'a LoadOptions,
    input: &'a [u8],
    state: ReadState,
    header: Option<ContainerHeader>,
    payload: Vec<u8>,
    position: u64,
    tables: Option<(StringTable, StringTable)>,
    backing: Option<Backing>,
    output: Option<DataCenter>,
}

impl<'a> DataCenterReader<'a> {
    /// Prepare to decode a complete container held in memory
    pub fn new(input: &'a [u8], options: &'a LoadOptions) -> Self {
        Self {
            options,
            input,
            state: ReadState::Start,
            header: None,
            payload: Vec::new(),
            position: 0,
            tables: None,
            backing: None,
            output: None,
        }
    }

    /// The stage that runs next
    pub fn state(&self) -> ReadState {
        self.state
    }

    /// Run the next stage, returning the stage after it
    #[instrument(skip(self), fields(state = ?self.state), err)]
    pub fn advance(&mut self) -> Result<ReadState> {
        self.state = match self.state {
            ReadState::Start => {
                self.options.validate()?;
                ReadState::ReadHeader
            }
            ReadState::ReadHeader => {
                let header = read_header(&mut Cursor::new(self.input))?;
                let cipher = self.options.cipher(header.revision)?;
                self.payload = open_payload(&header, &cipher, &self.input[ContainerHeader::SIZE..])?;
                self.header = Some(header);
                ReadState::ReadStringTables
            }
            ReadState::ReadStringTables => {
                let architecture = self.header().architecture;
                let strict = self.options.strict;
                let mut reader = Cursor::new(self.payload.as_slice());

                let names = StringTable::read(&mut reader, architecture, strict)?;
                let values = StringTable::read(&mut reader, architecture, strict)?;
                trace!(names = names.len(), values = values.len(), "read string tables");

                self.position = reader.position();
                self.tables = Some((names, values));
                ReadState::ReadNodeRegions
            }
            ReadState::ReadNodeRegions => {
                let architecture = self.header().architecture;
                let mut reader = Cursor::new(self.payload.as_slice());
                reader.set_position(self.position);

                let keys = Region::read(&mut reader, architecture, false)?;
                let nodes = SegmentedRegion::<RawNode>::read(&mut reader, architecture)?;
                let attributes = SegmentedRegion::<RawAttribute>::read(&mut reader, architecture)?;

                if self.options.strict {
                    nodes.check_addressable("node")?;
                    attributes.check_addressable("attribute")?;
                }

                let (names, values) = self
                    .tables
                    .take()
                    .expect("string tables are read before the node regions");
                self.backing = Some(Backing::new(
                    names,
                    values,
                    keys,
                    nodes,
                    attributes,
                    self.options.strict,
                )?);
                self.payload = Vec::new();
                match self.options.mode {
                    LoaderMode::Eager => ReadState::Materialize,
                    LoaderMode::Lazy | LoaderMode::Transient => ReadState::DeferMaterialize,
                }
            }
            ReadState::Materialize => {
                let backing = self
                    .backing
                    .take()
                    .expect("node regions are read before materializing");

                let (parents, nodes) = validate(&backing, true)?;
                self.output = Some(DataCenter::from_parts(
                    nodes,
                    parents,
                    None,
                    self.options.mode,
                    self.options.mutability,
                ));
                ReadState::Done
            }
            ReadState::DeferMaterialize => {
                let backing = self
                    .backing
                    .take()
                    .expect("node regions are read before materializing");

                let (parents, _) = validate(&backing, false)?;
                // Transient data centers decode on every access and never fill slots.
                let mut nodes = Vec::new();
                if self.options.mode == LoaderMode::Lazy {
                    nodes.resize_with(backing.len(), OnceLock::new);
                }
                self.output = Some(DataCenter::from_parts(
                    nodes,
                    parents,
                    Some(backing),
                    self.options.mode,
                    self.options.mutability,
                ));
                ReadState::Done
            }
            ReadState::Done => ReadState::Done,
        };

        Ok(self.state)
    }

    fn header(&self) -> &ContainerHeader {
        self.header
            .as_ref()
            .expect("header is read before the payload is decoded")
    }

    /// Run every remaining stage and return the data center
    pub fn finish(mut self) -> Result<DataCenter> {
        while self.advance()? != ReadState::Done {}
        self.into_output()
    }

    pub(crate) fn into_output(self) -> Result<DataCenter> {
        self.output.ok_or_else(|| DataError::MissingRoot.into())
    }
}

/// Read a complete data center from `reader`
pub fn load<R: Read>(mut reader: R, options: &LoadOptions) -> Result<DataCenter> {
    options.validate()?;

    let mut input = Vec::new();
    reader.read_to_end(&mut input)?;

    DataCenterReader::new(&input, options).finish()
}

/// Read a complete data center from an asynchronous `reader`
///
/// Yields to the runtime between stages. Dropping the future cancels the read.
#[cfg(feature = "tokio")]
pub async fn load_async<R>(mut reader: R, options: &LoadOptions) -> Result<DataCenter>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    options.validate()?;

    let mut input = Vec::new();
    reader.read_to_end(&mut input).await?;

    let mut decoder = DataCenterReader::new(&input, options);
    while decoder.advance()? != ReadState::Done {
        tokio::task::yield_now().await;
    }

    decoder.into_output()
}
