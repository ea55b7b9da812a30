//! Test fixtures.

mod two_node;

pub use two_node::{LinkPeer, LinkRegistry, TwoNodeFixture, wait_until};
