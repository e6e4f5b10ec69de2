mod layer;

pub use layer::{
    compute_slot, construct_onion, dead_drop_index, open_dead_drop_layer, open_inner_payload,
    open_reply, peel_chain_layer, wrap_reply, ChainLayer, ConstructedOnion, DeadDropBody,
    DeadDropLayer, OnionError,
};
