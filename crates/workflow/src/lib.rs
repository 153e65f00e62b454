//! Operator conversations.
//!
//! Every chat with the bot runs through a [`Dispatcher`], which owns one
//! conversation per chat: a book [`selection`] flow or a channel
//! [`reconcile`] flow. Both end in calls to the delivery pipeline.
//! [`ChatQueues`] feeds it events, each chat's in arrival order.

mod choice;
mod destination;
pub mod dispatcher;
pub mod error;
mod flow;
mod normalize;
mod queue;
pub mod reconcile;
pub mod selection;
mod shortid;
#[cfg(test)]
mod testing;

pub use crate::choice::{Choice, Quantity, UnknownChoice};
pub use crate::destination::parse_destination;
pub use crate::dispatcher::{Conversation, Dispatcher};
pub use crate::flow::{Input, Reply, Services};
pub use crate::normalize::normalize;
pub use crate::queue::ChatQueues;
pub use crate::reconcile::{Gap, GapItem, diff};
pub use crate::shortid::{ShortIdIndex, fingerprint};
