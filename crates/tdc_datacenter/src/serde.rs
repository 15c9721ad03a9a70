use serde::{
    ser::{SerializeMap, SerializeSeq, SerializeStruct},
    Serialize, Serializer,
};

use crate::{
    node::Node,
    value::{DataCenterKeys, DataCenterValue},
};

impl Serialize for DataCenterValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            DataCenterValue::Int(v) => serializer.serialize_i32(*v),
            DataCenterValue::Single(v) => serializer.serialize_f32(*v),
            DataCenterValue::String(v) => serializer.serialize_str(v),
            DataCenterValue::Boolean(v) => serializer.serialize_bool(*v),
        }
    }
}

impl Serialize for DataCenterKeys {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for name in self.names() {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

struct Attributes<'a, 'n>(&'n Node<'a>);

impl Serialize for Attributes<'_, '_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.attribute_count()))?;
        for (name, value) in self.0.attributes() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct Children<'a, 'n>(&'n Node<'a>);

impl Serialize for Children<'_, '_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.0.child_count()))?;
        for child in self.0.children() {
            seq.serialize_element(&child)?;
        }
        seq.end()
    }
}

/// Nodes serialize as `{ name, value, keys, attributes, children }`, with empty fields left out
impl Serialize for Node<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut node = serializer.serialize_struct("Node", 5)?;
        node.serialize_field("name", self.name())?;

        match self.value() {
            Some(value) => node.serialize_field("value", value)?,
            None => node.skip_field("value")?,
        }

        if self.keys().is_empty() {
            node.skip_field("keys")?;
        } else {
            node.serialize_field("keys", self.keys())?;
        }

        if self.has_attributes() {
            node.serialize_field("attributes", &Attributes(self))?;
        } else {
            node.skip_field("attributes")?;
        }

        if self.has_children() {
            node.serialize_field("children", &Children(self))?;
        } else {
            node.skip_field("children")?;
        }

        node.end()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::data_center::DataCenter;
    use crate::error::Result;
    use crate::value::DataCenterKeys;

    #[test]
    fn node_to_json() -> Result<()> {
        let mut dc = DataCenter::create();
        let mut root = dc.root_mut();
        let mut item = root.create_child("Item")?;
        item.set_keys(DataCenterKeys::new(["id"])?)?;
        item.add_attribute("id", 3)?;
        item.add_attribute("heavy", false)?;
        item.set_value(Some("text"))?;

        let json = serde_json::to_value(dc.root()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "name": "__root__",
                "children": [{
                    "name": "Item",
                    "value": "text",
                    "keys": ["id"],
                    "attributes": { "id": 3, "heavy": false },
                }],
            })
        );

        Ok(())
    }
}
