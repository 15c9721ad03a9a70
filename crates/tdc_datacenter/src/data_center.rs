//! The data center document and the entry points for loading and saving it

use std::{
    borrow::Cow,
    fmt::{self, Debug},
    io::{Read, Write},
    sync::OnceLock,
};
use tracing::instrument;

use crate::{
    error::Result,
    node::{Node, NodeData, NodeId, NodeMut, ROOT_NAME},
    options::{LoadOptions, LoaderMode, Mutability, SaveOptions},
    read::{self, Backing},
    write,
};

/// A data center tree
///
/// ```
/// # fn doit() -> tdc_datacenter::error::Result<()>
/// # {
/// use tdc_datacenter::{DataCenter, LoadOptions, SaveOptions};
///
/// let mut dc = DataCenter::create();
/// let mut root = dc.root_mut();
/// let mut item = root.create_child("Item")?;
/// item.add_attribute("id", 1)?;
///
/// let mut buf = Vec::new();
/// dc.save(&mut buf, &SaveOptions::default())?;
///
/// let loaded = DataCenter::load(&buf[..], &LoadOptions::default())?;
/// assert_eq!(loaded.root(), dc.root());
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct DataCenter {
    nodes: Vec<OnceLock<NodeData>>,
    parents: Vec<Option<NodeId>>,
    backing: Option<Backing>,
    mode: LoaderMode,
    mutability: Mutability,
}

impl Debug for DataCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataCenter")
            .field("mode", &self.mode)
            .field("mutability", &self.mutability)
            .field("nodes", &self.parents.len())
            .finish()
    }
}

impl DataCenter {
    /// A new, mutable data center holding only an empty root
    pub fn create() -> Self {
        Self {
            nodes: vec![OnceLock::from(NodeData::new(ROOT_NAME.into()))],
            parents: vec![None],
            backing: None,
            mode: LoaderMode::Eager,
            mutability: Mutability::Mutable,
        }
    }

    pub(crate) fn from_parts(
        nodes: Vec<OnceLock<NodeData>>,
        parents: Vec<Option<NodeId>>,
        backing: Option<Backing>,
        mode: LoaderMode,
        mutability: Mutability,
    ) -> Self {
        Self {
            nodes,
            parents,
            backing,
            mode,
            mutability,
        }
    }

    /// Read a data center, materializing and verifying it as the options say
    #[instrument(skip_all, fields(mode = ?options.mode, strict = options.strict), err)]
    pub fn load<R: Read>(reader: R, options: &LoadOptions) -> Result<Self> {
        read::load(reader, options)
    }

    /// Read a data center from an asynchronous stream
    #[cfg(feature = "tokio")]
    pub async fn load_async<R>(reader: R, options: &LoadOptions) -> Result<Self>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        read::load_async(reader, options).await
    }

    /// Write the whole tree
    #[instrument(skip_all, fields(revision = options.revision, architecture = ?options.architecture), err)]
    pub fn save<W: Write>(&self, writer: W, options: &SaveOptions) -> Result<()> {
        write::save(self.root(), writer, options)
    }

    /// Write the whole tree to an asynchronous stream
    #[cfg(feature = "tokio")]
    pub async fn save_async<W>(&self, writer: W, options: &SaveOptions) -> Result<()>
    where
        W: tokio::io::AsyncWrite + Unpin,
    {
        write::save_async(self.root(), writer, options).await
    }

    pub fn root(&self) -> Node<'_> {
        self.node(0)
    }

    /// Write access to the root. Every mutator fails if the data center is immutable.
    pub fn root_mut(&mut self) -> NodeMut<'_> {
        NodeMut::new(self, 0)
    }

    /// How nodes are materialized
    pub fn mode(&self) -> LoaderMode {
        self.mode
    }

    pub fn is_immutable(&self) -> bool {
        self.mutability == Mutability::Immutable
    }

    pub(crate) fn node(&self, id: NodeId) -> Node<'_> {
        let data = match self.mode {
            LoaderMode::Transient => Cow::Owned(materialize(self.backing.as_ref(), id)),
            _ => Cow::Borrowed(
                self.nodes[id].get_or_init(|| materialize(self.backing.as_ref(), id)),
            ),
        };

        Node::new(self, id, data)
    }

    pub(crate) fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id).copied().flatten()
    }

    pub(crate) fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        let slot = &mut self.nodes[id];
        if slot.get().is_none() {
            let _ = slot.set(materialize(self.backing.as_ref(), id));
        }
        slot.get_mut().expect("slot was filled above")
    }

    /// Add a node to the arena
    pub(crate) fn push(&mut self, data: NodeData, parent: NodeId) -> NodeId {
        self.nodes.push(OnceLock::from(data));
        self.parents.push(Some(parent));
        self.nodes.len() - 1
    }

    /// Drop a detached subtree from the arena
    pub(crate) fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];

        while let Some(id) = stack.pop() {
            self.parents[id] = None;

            match self.nodes[id].take() {
                Some(data) => stack.extend(data.children),
                None => {
                    if let Some(backing) = &self.backing {
                        stack.extend(backing.child_ids(id));
                    }
                }
            }
        }
    }
}

fn materialize(backing: Option<&Backing>, id: NodeId) -> NodeData {
    backing
        .expect("only loaded data centers have unmaterialized nodes")
        .decode(id)
        .expect("node records are validated during load")
}
