use crate::event::{EventKind, FromMe};

/// Whether an event means a human operator took over the chat.
///
/// Only a confirmed owner-sent new message pauses. `Unknown` never does.
pub fn should_pause(kind: &EventKind, from_me: FromMe) -> bool {
    kind.is_upsert() && from_me == FromMe::Yes
}
