//! Nodes of a data center tree.
//!
//! Nodes live in an arena owned by their [`DataCenter`] and refer to their children and parent by index. A [`Node`]
//! is a read-only view of one arena slot, a [`NodeMut`] additionally exposes the mutators.

use indexmap::IndexMap;
use std::{
    borrow::Cow,
    fmt::{self, Debug},
    sync::Arc,
};

use crate::{
    data_center::DataCenter,
    error::{ArgumentError, Error, Result},
    value::{DataCenterKeys, DataCenterValue},
};

/// Index of a node in its data center's arena
pub(crate) type NodeId = usize;

/// Name of the root node
pub const ROOT_NAME: &str = "__root__";

/// Name of the string attribute holding a node's value
pub const VALUE_ATTRIBUTE: &str = "__value__";

/// Content of a single node
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct NodeData {
    pub name: Arc<str>,
    pub value: Option<Arc<str>>,
    pub keys: DataCenterKeys,
    pub attributes: IndexMap<Arc<str>, DataCenterValue>,
    pub children: Vec<NodeId>,
}

impl NodeData {
    pub fn new(name: Arc<str>) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }
}

/// A read-only view of a node
///
/// For transient data centers the view owns its decoded content, otherwise it borrows the arena slot.
#[derive(Clone)]
pub struct Node<'a> {
    dc: &'a DataCenter,
    id: NodeId,
    data: Cow<'a, NodeData>,
}

impl Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name())
            .field("value", &self.value())
            .field("keys", &self.data.keys)
            .field("attributes", &self.data.attributes)
            .field("children", &self.child_count())
            .finish()
    }
}

/// Two nodes are equal when their names, values, keys, attributes and children are, in order.
impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
            && self.value() == other.value()
            && self.keys() == other.keys()
            && self.attributes().eq(other.attributes())
            && self.children().eq(other.children())
    }
}

impl<'a> Node<'a> {
    pub(crate) fn new(dc: &'a DataCenter, id: NodeId, data: Cow<'a, NodeData>) -> Self {
        Self { dc, id, data }
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// The text value of the node, if it has one
    pub fn value(&self) -> Option<&str> {
        self.data.value.as_deref()
    }

    pub fn keys(&self) -> &DataCenterKeys {
        &self.data.keys
    }

    /// Attributes in their stored order, not including the value
    pub fn attributes(&self) -> impl ExactSizeIterator<Item = (&str, &DataCenterValue)> {
        self.data
            .attributes
            .iter()
            .map(|(name, value)| (&**name, value))
    }

    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&DataCenterValue> {
        self.data.attributes.get(name)
    }

    pub fn attribute_count(&self) -> usize {
        self.data.attributes.len()
    }

    pub fn has_attributes(&self) -> bool {
        !self.data.attributes.is_empty()
    }

    /// Children in their stored order
    pub fn children(&self) -> impl ExactSizeIterator<Item = Node<'a>> + '_ {
        let dc = self.dc;
        self.data.children.iter().map(move |id| dc.node(*id))
    }

    /// Children with the given name
    pub fn children_named<'s>(&'s self, name: &'s str) -> impl Iterator<Item = Node<'a>> + 's {
        self.children().filter(move |child| child.name() == name)
    }

    pub fn child(&self, index: usize) -> Option<Node<'a>> {
        self.data.children.get(index).map(|id| self.dc.node(*id))
    }

    pub fn child_count(&self) -> usize {
        self.data.children.len()
    }

    pub fn has_children(&self) -> bool {
        !self.data.children.is_empty()
    }

    /// The node this node is a child of, `None` for the root
    pub fn parent(&self) -> Option<Node<'a>> {
        self.dc.parent_of(self.id).map(|id| self.dc.node(id))
    }

    /// Whether every mutator on this node's tree fails
    pub fn is_immutable(&self) -> bool {
        self.dc.is_immutable()
    }
}

/// A node of a data center that may be changed
///
/// On immutable data centers every mutator fails with [`Error::ImmutableNode`] and leaves the tree unchanged.
pub struct NodeMut<'a> {
    dc: &'a mut DataCenter,
    id: NodeId,
}

impl Debug for NodeMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.as_node(), f)
    }
}

impl<'a> NodeMut<'a> {
    pub(crate) fn new(dc: &'a mut DataCenter, id: NodeId) -> Self {
        Self { dc, id }
    }

    /// Read-only view of this node
    pub fn as_node(&self) -> Node<'_> {
        self.dc.node(self.id)
    }

    /// Give up write access, keeping a read-only view
    pub fn into_node(self) -> Node<'a> {
        let dc: &'a DataCenter = self.dc;
        dc.node(self.id)
    }

    fn check(&self) -> Result<()> {
        if self.dc.is_immutable() {
            return Err(Error::ImmutableNode);
        }
        Ok(())
    }

    fn data(&mut self) -> &mut NodeData {
        self.dc.data_mut(self.id)
    }

    /// Set or clear the text value
    pub fn set_value(&mut self, value: Option<&str>) -> Result<()> {
        self.check()?;
        self.data().value = value.map(Arc::from);
        Ok(())
    }

    /// Replace the key names
    pub fn set_keys(&mut self, keys: DataCenterKeys) -> Result<()> {
        self.check()?;
        self.data().keys = keys;
        Ok(())
    }

    /// Append a new, empty child and return it
    pub fn create_child(&mut self, name: &str) -> Result<NodeMut<'_>> {
        self.check()?;
        if name.is_empty() {
            return Err(ArgumentError::EmptyName.into());
        }

        let child = self.dc.push(NodeData::new(name.into()), self.id);
        self.data().children.push(child);

        Ok(NodeMut::new(self.dc, child))
    }

    /// Write access to a child
    pub fn child_mut(&mut self, index: usize) -> Option<NodeMut<'_>> {
        let child = self.as_node().data.children.get(index).copied()?;
        Some(NodeMut::new(self.dc, child))
    }

    /// Remove the child at `index` together with its subtree, returning whether there was one
    pub fn remove_child(&mut self, index: usize) -> Result<bool> {
        self.check()?;

        let children = &mut self.data().children;
        if index >= children.len() {
            return Ok(false);
        }
        let child = children.remove(index);
        self.dc.release(child);

        Ok(true)
    }

    /// Remove every child
    pub fn clear_children(&mut self) -> Result<()> {
        self.check()?;

        for child in std::mem::take(&mut self.data().children) {
            self.dc.release(child);
        }

        Ok(())
    }

    /// Add an attribute, failing if one with the same name exists
    pub fn add_attribute(&mut self, name: &str, value: impl Into<DataCenterValue>) -> Result<()> {
        self.check()?;
        check_attribute_name(name)?;

        let attributes = &mut self.data().attributes;
        if attributes.contains_key(name) {
            return Err(ArgumentError::AttributeExists(name.to_owned()).into());
        }
        attributes.insert(name.into(), value.into());

        Ok(())
    }

    /// Add an attribute or replace the value of an existing one in place
    pub fn set_attribute(&mut self, name: &str, value: impl Into<DataCenterValue>) -> Result<()> {
        self.check()?;
        check_attribute_name(name)?;

        let attributes = &mut self.data().attributes;
        match attributes.get_mut(name) {
            Some(existing) => *existing = value.into(),
            None => {
                attributes.insert(name.into(), value.into());
            }
        }

        Ok(())
    }

    /// Remove an attribute, returning whether it existed
    pub fn remove_attribute(&mut self, name: &str) -> Result<bool> {
        self.check()?;
        Ok(self.data().attributes.shift_remove(name).is_some())
    }

    /// Remove every attribute
    pub fn clear_attributes(&mut self) -> Result<()> {
        self.check()?;
        self.data().attributes.clear();
        Ok(())
    }
}

fn check_attribute_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ArgumentError::EmptyName.into());
    }
    if name == VALUE_ATTRIBUTE {
        return Err(ArgumentError::ReservedAttribute(name.to_owned()).into());
    }
    Ok(())
}
