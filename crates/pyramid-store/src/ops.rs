//! Request shapes sent to the block store

use pyramid_content::{Block, BlockId, BlockType, ChapterId};
use serde::{Deserialize, Serialize};

/// Immediate-persist insert request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertBlock {
    /// Target chapter
    pub chapter_id: ChapterId,
    /// Block type
    #[serde(flatten)]
    pub block_type: BlockType,
    /// Initial content
    pub content: String,
    /// Order key computed by the client
    pub order: f64,
    /// Neighbour the block was inserted after, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_block_id: Option<BlockId>,
}

/// One staged mutation in a batch save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BatchOp {
    /// Overwrite a block's mutable fields
    Update {
        /// Target block
        block_id: BlockId,
        /// Full content
        content: String,
        /// Block type
        block_type: BlockType,
        /// Order key
        order: f64,
    },
    /// Change only a block's order key
    Reorder {
        /// Target block
        block_id: BlockId,
        /// Order key
        order: f64,
    },
    /// Remove a block
    Delete {
        /// Target block
        block_id: BlockId,
    },
}

impl BatchOp {
    /// Update carrying a block's current state
    #[must_use]
    pub fn update_from(block: &Block) -> Self {
        Self::Update {
            block_id: block.id,
            content: block.content.clone(),
            block_type: block.block_type,
            order: block.order,
        }
    }

    /// Key-only update for a block
    #[inline]
    #[must_use]
    pub fn reorder(block_id: BlockId, order: f64) -> Self {
        Self::Reorder { block_id, order }
    }

    /// Delete shorthand
    #[inline]
    #[must_use]
    pub fn delete(block_id: BlockId) -> Self {
        Self::Delete { block_id }
    }

    /// Target block
    #[inline]
    #[must_use]
    pub fn block_id(&self) -> BlockId {
        match self {
            Self::Update { block_id, .. }
            | Self::Reorder { block_id, .. }
            | Self::Delete { block_id } => *block_id,
        }
    }

    /// Whether this is a delete
    #[inline]
    #[must_use]
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_op_wire_shape() {
        let id = BlockId::new();
        let json = serde_json::to_value(BatchOp::delete(id)).unwrap();
        assert_eq!(json["op"], "delete");
        assert_eq!(json["block_id"], id.to_string());

        let block = pyramid_content::Block::new(ChapterId::new(), BlockType::Code, "fn x() {}", 2.5);
        let json = serde_json::to_value(BatchOp::update_from(&block)).unwrap();
        assert_eq!(json["op"], "update");
        assert_eq!(json["content"], "fn x() {}");
        assert_eq!(json["block_type"]["type"], "code");
        assert_eq!(json["order"], 2.5);

        let json = serde_json::to_value(BatchOp::reorder(id, 3.0)).unwrap();
        assert_eq!(json["op"], "reorder");
        assert_eq!(json["order"], 3.0);
        assert!(json.get("content").is_none());
    }
}
