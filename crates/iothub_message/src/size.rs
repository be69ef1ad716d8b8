//! Size accounting against the hub's request ceiling.
//!
//! The hub rejects requests larger than [`MAXIMUM_MESSAGE_SIZE`]. Each
//! message is charged a fixed overhead for its envelope plus its body, and
//! each application property a fixed overhead plus its key and value bytes.
//! Lengths are raw byte lengths, never the base64 or JSON-escaped form.

use crate::message::Properties;

/// Largest request the hub accepts, in bytes.
pub const MAXIMUM_MESSAGE_SIZE: usize = 255 * 1024 - 1;

/// Fixed cost charged per message.
pub const MAXIMUM_PAYLOAD_OVERHEAD: usize = 384;

/// Fixed cost charged per application property.
pub const MAXIMUM_PROPERTY_OVERHEAD: usize = 16;

/// Returns the accounted wire size of a message.
pub fn accounted_size(body_len: usize, properties: &Properties) -> usize {
    properties
        .iter()
        .fold(MAXIMUM_PAYLOAD_OVERHEAD + body_len, |total, (k, v)| {
            total + MAXIMUM_PROPERTY_OVERHEAD + k.len() + v.len()
        })
}

/// Returns true if a message of this shape can ever be sent.
pub fn fits(body_len: usize, properties: &Properties) -> bool {
    accounted_size(body_len, properties) <= MAXIMUM_MESSAGE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_message_costs_overhead() {
        assert_eq!(accounted_size(0, &Properties::new()), 384);
    }

    #[test]
    fn properties_add_overhead_and_bytes() {
        let props: Properties = [("a", "b"), ("key", "value")].into_iter().collect();
        assert_eq!(accounted_size(10, &props), 384 + 10 + (16 + 2) + (16 + 8));
    }

    #[test]
    fn ceiling_is_inclusive() {
        let body = MAXIMUM_MESSAGE_SIZE - MAXIMUM_PAYLOAD_OVERHEAD;
        assert!(fits(body, &Properties::new()));
        assert!(!fits(body + 1, &Properties::new()));
    }

    #[test]
    fn property_headroom_is_exact() {
        let body = MAXIMUM_MESSAGE_SIZE - MAXIMUM_PAYLOAD_OVERHEAD - (16 + 1 + 1);

        let fitting: Properties = [("a", "b")].into_iter().collect();
        assert!(fits(body, &fitting));

        let one_over: Properties = [("aa", "b")].into_iter().collect();
        assert!(!fits(body, &one_over));
    }

    proptest! {
        #[test]
        fn size_grows_with_every_property(
            body_len in 0usize..4096,
            pairs in prop::collection::vec(("[a-z]{1,8}", "[a-z0-9]{0,16}"), 0..8),
        ) {
            let props: Properties = pairs.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let expected = props
                .iter()
                .map(|(k, v)| 16 + k.len() + v.len())
                .sum::<usize>()
                + 384
                + body_len;
            prop_assert_eq!(accounted_size(body_len, &props), expected);
            prop_assert_eq!(fits(body_len, &props), expected <= MAXIMUM_MESSAGE_SIZE);
        }
    }
}
