//! Keymap edits as history actions. Each action returns the action that
//! reverses it, built from the same constructors, so undo and redo chain
//! indefinitely.

use studio_shared::domain::{BehaviorBinding, LayerId};

use super::link::DeviceLink;
use crate::command_stack::Action;

pub(crate) fn set_binding(
    link: DeviceLink,
    layer_id: LayerId,
    key_position: u32,
    binding: BehaviorBinding,
    previous: BehaviorBinding,
) -> Action {
    Action::new(
        format!("set binding (layer {layer_id}, key {key_position})"),
        move || {
            let link = link.clone();
            async move {
                link.set_layer_binding(layer_id, key_position, binding)
                    .await?;
                anyhow::Ok(set_binding(link, layer_id, key_position, previous, binding))
            }
        },
    )
}

pub(crate) fn add_layer(link: DeviceLink) -> Action {
    Action::new("add layer", move || {
        let link = link.clone();
        async move {
            let added = link.add_layer().await?;
            anyhow::Ok(remove_layer(link, added.index, added.layer.id))
        }
    })
}

pub(crate) fn remove_layer(link: DeviceLink, layer_index: u32, layer_id: LayerId) -> Action {
    Action::new(format!("remove layer {layer_id}"), move || {
        let link = link.clone();
        async move {
            link.remove_layer(layer_index).await?;
            anyhow::Ok(restore_layer(link, layer_id, layer_index))
        }
    })
}

pub(crate) fn restore_layer(link: DeviceLink, layer_id: LayerId, at_index: u32) -> Action {
    Action::new(format!("restore layer {layer_id}"), move || {
        let link = link.clone();
        async move {
            link.restore_layer(layer_id, at_index).await?;
            anyhow::Ok(remove_layer(link, at_index, layer_id))
        }
    })
}

pub(crate) fn rename_layer(
    link: DeviceLink,
    layer_id: LayerId,
    name: String,
    previous: String,
) -> Action {
    Action::new(format!("rename layer {layer_id}"), move || {
        let link = link.clone();
        let name = name.clone();
        let previous = previous.clone();
        async move {
            link.set_layer_name(layer_id, name.clone()).await?;
            anyhow::Ok(rename_layer(link, layer_id, previous, name))
        }
    })
}

pub(crate) fn move_layer(link: DeviceLink, start_index: u32, dest_index: u32) -> Action {
    Action::new(
        format!("move layer {start_index} to {dest_index}"),
        move || {
            let link = link.clone();
            async move {
                link.move_layer(start_index, dest_index).await?;
                anyhow::Ok(move_layer(link, dest_index, start_index))
            }
        },
    )
}
