//! The content header that precedes every message body

use crate::codec::{Reader, Writer};
use crate::error::Error;
use crate::properties::BasicProperties;
use crate::registry::class;

/// Header frame payload: `class-id | weight (= 0) | body-size | properties`.
///
/// `body_size` is the total octet count of the body, which may then arrive
/// split over any number of body frames.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentHeader {
    pub class_id: u16,
    pub body_size: u64,
    pub properties: BasicProperties,
}

impl ContentHeader {
    pub fn for_basic(body_size: u64, properties: BasicProperties) -> Self {
        Self {
            class_id: class::BASIC,
            body_size,
            properties,
        }
    }

    pub fn encode(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.class_id);
        w.write_short(0); // weight, reserved
        w.write_longlong(self.body_size);
        self.properties.encode(w)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        let class_id = r.read_short()?;
        let weight = r.read_short()?;
        if weight != 0 {
            return Err(Error::NonZeroWeight(weight));
        }
        let body_size = r.read_longlong()?;
        let properties = BasicProperties::decode(&mut r)?;
        Ok(Self {
            class_id,
            body_size,
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::WireDialect;

    #[test]
    fn header_round_trips() {
        let header = ContentHeader::for_basic(
            10_000,
            BasicProperties {
                delivery_mode: Some(1),
                ..Default::default()
            },
        );
        let mut w = Writer::new(WireDialect::Rabbit);
        header.encode(&mut w).unwrap();
        let buf = w.into_bytes();
        assert_eq!(ContentHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn nonzero_weight_is_rejected() {
        let raw = [0, 60, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(ContentHeader::decode(&raw), Err(Error::NonZeroWeight(1)));
    }
}
