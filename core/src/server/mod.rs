//! Chain server roles (spec §4.2-§4.4): the coordinator, the stateless
//! intermediate mix stages, and the dead-drop rendezvous engine. Each
//! role is its own type rather than a trait object hierarchy — the
//! Design Notes call for injected, value-typed topology instead of
//! servers holding references to each other, and these types hold no
//! reference to their neighbors at all; the round driver that wires them
//! together lives in the simulation harness (`mixchain-cli`).

pub mod deaddrop;
pub mod front;
pub mod middle;
pub mod spreading;
