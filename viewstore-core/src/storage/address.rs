/*
    address.rs - Identity of a logical collection

    An index address is (index type, name, optional family id). Indexes in a
    family share a name and are told apart by the family id.

    Key layout inside the shared key space:
    - data:     b'd' ++ type byte ++ encoded(name, family_id) ++ index-specific suffix
    - metadata: b'm' ++ encoded(name, family_id)

    The metadata key leaves the type out so that a list and a map of the same
    name find the same type record.
*/

use crate::storage::errors::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::fmt;

const DATA_TAG: u8 = b'd';
const METADATA_TAG: u8 = b'm';

/// Kind of a logical collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    List,
    Map,
}

impl IndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::List => "list",
            IndexType::Map => "map",
        }
    }

    fn key_byte(&self) -> u8 {
        match self {
            IndexType::List => 0,
            IndexType::Map => 1,
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Address of a logical collection within a view
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexAddress {
    index_type: IndexType,
    name: String,
    family_id: Option<Vec<u8>>,
}

impl IndexAddress {
    /// Address of a standalone index
    pub fn new(index_type: IndexType, name: impl Into<String>) -> Self {
        IndexAddress {
            index_type,
            name: name.into(),
            family_id: None,
        }
    }

    /// Address of a member of an index family
    pub fn in_family(index_type: IndexType, name: impl Into<String>, family_id: impl AsRef<[u8]>) -> Self {
        IndexAddress {
            index_type,
            name: name.into(),
            family_id: Some(family_id.as_ref().to_vec()),
        }
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family_id(&self) -> Option<&[u8]> {
        self.family_id.as_deref()
    }

    /// Prefix under which all entries of this index are stored
    pub fn data_prefix(&self) -> Vec<u8> {
        self.encode_with_tag(&[DATA_TAG, self.index_type.key_byte()])
    }

    /// Key of the record holding the type of this index
    pub fn metadata_key(&self) -> Vec<u8> {
        self.encode_with_tag(&[METADATA_TAG])
    }

    fn encode_with_tag(&self, tag: &[u8]) -> Vec<u8> {
        let family_len = self.family_id.as_ref().map_or(0, Vec::len);
        let mut out = Vec::with_capacity(tag.len() + 4 + self.name.len() + 1 + 4 + family_len);
        out.extend_from_slice(tag);
        // Length prefixes keep "list1" from being a prefix of "list123".
        out.extend_from_slice(&(self.name.len() as u32).to_be_bytes());
        out.extend_from_slice(self.name.as_bytes());
        match &self.family_id {
            None => out.push(0),
            Some(id) => {
                out.push(1);
                out.extend_from_slice(&(id.len() as u32).to_be_bytes());
                out.extend_from_slice(id);
            }
        }
        out
    }

    /// Check that the name is usable as an index name
    ///
    /// Names must be non-empty, at most `max_len` bytes long and consist of
    /// ASCII letters, digits, `_`, `-` and `.`.
    pub fn validate(&self, max_len: usize) -> StorageResult<()> {
        if self.name.is_empty() {
            return Err(StorageError::InvalidArgument("index name must not be empty".to_string()));
        }
        if self.name.len() > max_len {
            return Err(StorageError::InvalidArgument(format!(
                "index name '{}' is longer than {} bytes",
                self.name, max_len
            )));
        }
        let valid = self
            .name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.');
        if !valid {
            return Err(StorageError::InvalidArgument(format!(
                "index name '{}' contains invalid characters",
                self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Display for IndexAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.family_id {
            None => write!(f, "{}:{}", self.index_type, self.name),
            Some(id) => write!(f, "{}:{}[{}]", self.index_type, self.name, hex::encode(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_of_similar_names_do_not_overlap() {
        let a = IndexAddress::new(IndexType::List, "List1").data_prefix();
        let b = IndexAddress::new(IndexType::List, "List123").data_prefix();
        assert!(!b.starts_with(&a));
        assert!(!a.starts_with(&b));
    }

    #[test]
    fn test_family_members_are_distinct() {
        let plain = IndexAddress::new(IndexType::Map, "wallets");
        let first = IndexAddress::in_family(IndexType::Map, "wallets", [1u8]);
        let second = IndexAddress::in_family(IndexType::Map, "wallets", [2u8]);

        assert_ne!(plain.data_prefix(), first.data_prefix());
        assert_ne!(first.data_prefix(), second.data_prefix());
        assert!(!first.data_prefix().starts_with(&plain.data_prefix()));
    }

    #[test]
    fn test_types_share_metadata_but_not_data() {
        let list = IndexAddress::new(IndexType::List, "things");
        let map = IndexAddress::new(IndexType::Map, "things");
        assert_eq!(list.metadata_key(), map.metadata_key());
        assert!(!map.data_prefix().starts_with(&list.data_prefix()));
        assert!(!list.data_prefix().starts_with(&map.data_prefix()));
    }

    #[test]
    fn test_metadata_key_differs_from_data_prefix() {
        let addr = IndexAddress::new(IndexType::List, "txs");
        assert_ne!(addr.metadata_key(), addr.data_prefix());
    }

    #[test]
    fn test_name_validation() {
        assert!(IndexAddress::new(IndexType::List, "test_list.v-1").validate(64).is_ok());
        assert!(matches!(
            IndexAddress::new(IndexType::List, "").validate(64),
            Err(StorageError::InvalidArgument(_))
        ));
        assert!(matches!(
            IndexAddress::new(IndexType::List, "bad name").validate(64),
            Err(StorageError::InvalidArgument(_))
        ));
        assert!(matches!(
            IndexAddress::new(IndexType::List, "abcdef").validate(5),
            Err(StorageError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(IndexAddress::new(IndexType::Map, "m").to_string(), "map:m");
        assert_eq!(
            IndexAddress::in_family(IndexType::List, "l", [0xab]).to_string(),
            "list:l[ab]"
        );
    }
}
