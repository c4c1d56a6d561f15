//! Collection commands over the durable [`CollectionStore`].
//!
//! All nine commands share one handler type; [`CollectionOp`] selects the
//! operation and its argument contract.

use async_trait::async_trait;
use issola_core::command::{Command, CommandArgs, CommandName, required_str};
use issola_core::error::CommandError;
use issola_memory::CollectionStore;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOp {
    AddValueToKey,
    RemoveValueFromKey,
    GetKeyValue,
    AddItemTo,
    RemoveItemFrom,
    ChangeItem,
    RemoveItem,
    FindItem,
    IncrementItem,
}

impl CollectionOp {
    pub const ALL: [CollectionOp; 9] = [
        CollectionOp::AddValueToKey,
        CollectionOp::RemoveValueFromKey,
        CollectionOp::GetKeyValue,
        CollectionOp::AddItemTo,
        CollectionOp::RemoveItemFrom,
        CollectionOp::ChangeItem,
        CollectionOp::RemoveItem,
        CollectionOp::FindItem,
        CollectionOp::IncrementItem,
    ];

    fn name(self) -> CommandName {
        match self {
            Self::AddValueToKey => CommandName::AddValueToKey,
            Self::RemoveValueFromKey => CommandName::RemoveValueFromKey,
            Self::GetKeyValue => CommandName::GetKeyValue,
            Self::AddItemTo => CommandName::AddItemTo,
            Self::RemoveItemFrom => CommandName::RemoveItemFrom,
            Self::ChangeItem => CommandName::ChangeItem,
            Self::RemoveItem => CommandName::RemoveItem,
            Self::FindItem => CommandName::FindItem,
            Self::IncrementItem => CommandName::IncrementItem,
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::AddValueToKey => "Add value to a list in the collection",
            Self::RemoveValueFromKey => "Remove value from a list in the collection",
            Self::GetKeyValue => "Get the value stored under a key",
            Self::AddItemTo => "Add item to a group in the collection",
            Self::RemoveItemFrom => "Remove item from a group in the collection",
            Self::ChangeItem => "Rename a key in the collection",
            Self::RemoveItem => "Remove a key from the collection",
            Self::FindItem => "Check whether a key exists",
            Self::IncrementItem => "Increment a counter",
        }
    }

    fn required_args(self) -> &'static [&'static str] {
        match self {
            Self::AddValueToKey | Self::RemoveValueFromKey => &["target", "value"],
            Self::AddItemTo | Self::RemoveItemFrom => &["item", "target"],
            Self::ChangeItem => &["target", "item"],
            Self::GetKeyValue | Self::RemoveItem | Self::FindItem | Self::IncrementItem => {
                &["target"]
            }
        }
    }
}

pub struct CollectionCommand {
    op: CollectionOp,
    store: Arc<CollectionStore>,
}

impl CollectionCommand {
    pub fn new(op: CollectionOp, store: Arc<CollectionStore>) -> Self {
        Self { op, store }
    }

    /// One command per collection operation, all sharing `store`.
    pub fn all(store: Arc<CollectionStore>) -> Vec<Self> {
        CollectionOp::ALL
            .into_iter()
            .map(|op| Self::new(op, Arc::clone(&store)))
            .collect()
    }
}

#[async_trait]
impl Command for CollectionCommand {
    fn name(&self) -> &str {
        self.op.name().as_str()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    fn required_args(&self) -> &[&'static str] {
        self.op.required_args()
    }

    async fn execute(&self, args: CommandArgs) -> Result<String, CommandError> {
        let target = required_str(&args, "target")?;
        let store = &self.store;

        let out = match self.op {
            CollectionOp::AddValueToKey => {
                let value = required_str(&args, "value")?;
                if store.add_value_to_key(&target, &value).await? {
                    format!("Added '{value}' to '{target}'.")
                } else {
                    format!("'{value}' is already in '{target}'.")
                }
            }
            CollectionOp::RemoveValueFromKey => {
                let value = required_str(&args, "value")?;
                if store.remove_value_from_key(&target, &value).await? {
                    format!("Removed '{value}' from '{target}'.")
                } else {
                    format!("'{value}' is not in '{target}'.")
                }
            }
            CollectionOp::GetKeyValue => match store.get_key_value(&target).await {
                Some(value) => value.to_string(),
                None => "Key not found".into(),
            },
            CollectionOp::AddItemTo => {
                let item = required_str(&args, "item")?;
                store.add_item_to(&item, &target).await?;
                format!("Added '{item}' to '{target}'.")
            }
            CollectionOp::RemoveItemFrom => {
                let item = required_str(&args, "item")?;
                if store.remove_item_from(&item, &target).await? {
                    format!("Removed '{item}' from '{target}'.")
                } else {
                    format!("'{item}' is not in '{target}'.")
                }
            }
            CollectionOp::ChangeItem => {
                let new_key = required_str(&args, "item")?;
                if store.change_item(&target, &new_key).await? {
                    format!("Renamed '{target}' to '{new_key}'.")
                } else {
                    "Key not found".into()
                }
            }
            CollectionOp::RemoveItem => {
                if store.remove_item(&target).await? {
                    format!("Removed '{target}'.")
                } else {
                    "Key not found".into()
                }
            }
            CollectionOp::FindItem => store.find_item(&target).await.to_string(),
            CollectionOp::IncrementItem => {
                let count = store.increment_item(&target).await?;
                format!("'{target}' is now {count}.")
            }
        };
        Ok(out)
    }
}
