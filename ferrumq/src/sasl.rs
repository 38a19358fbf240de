//! SASL mechanisms for `connection.start-ok`

use bytes::Bytes;
use ferrumq_wire::{FieldTable, FieldValue, WireDialect, Writer};

use crate::error::Error;

/// The authentication mechanism offered in `start-ok`.
///
/// The chosen mechanism must appear in the broker's `connection.start`
/// mechanism list; `Plain` is what every RabbitMQ deployment accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaslMechanism {
    #[default]
    Plain,
    AmqPlain,
    /// Identity is taken from the transport (e.g. a client certificate);
    /// the response carries no credentials
    External,
}

impl SaslMechanism {
    pub fn name(&self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::AmqPlain => "AMQPLAIN",
            SaslMechanism::External => "EXTERNAL",
        }
    }

    /// Builds the opaque `start-ok.response` for these credentials.
    pub fn response(&self, user: &str, password: &str) -> Result<Bytes, Error> {
        match self {
            SaslMechanism::Plain => {
                let mut out = Vec::with_capacity(user.len() + password.len() + 2);
                out.push(0);
                out.extend_from_slice(user.as_bytes());
                out.push(0);
                out.extend_from_slice(password.as_bytes());
                Ok(Bytes::from(out))
            }
            SaslMechanism::AmqPlain => {
                // the response is the table body, without the length prefix
                let mut table = FieldTable::new();
                table.insert("LOGIN", FieldValue::from(user));
                table.insert("PASSWORD", FieldValue::from(password));
                let mut w = Writer::new(WireDialect::Rabbit);
                table.encode(&mut w).map_err(Error::Encoding)?;
                Ok(w.into_bytes().slice(4..))
            }
            SaslMechanism::External => Ok(Bytes::new()),
        }
    }

    /// Whether the broker's space-separated mechanism list offers this one.
    pub(crate) fn offered_in(&self, mechanisms: &[u8]) -> bool {
        mechanisms
            .split(|b| *b == b' ')
            .any(|m| m == self.name().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_response_is_nul_delimited() {
        let response = SaslMechanism::Plain.response("guest", "guest").unwrap();
        assert_eq!(&response[..], b"\x00guest\x00guest");
    }

    #[test]
    fn amqplain_response_is_a_table_body() {
        let response = SaslMechanism::AmqPlain.response("guest", "secret").unwrap();
        let mut expected = Vec::new();
        expected.push(5);
        expected.extend_from_slice(b"LOGIN");
        expected.push(b'S');
        expected.extend_from_slice(&5u32.to_be_bytes());
        expected.extend_from_slice(b"guest");
        expected.push(8);
        expected.extend_from_slice(b"PASSWORD");
        expected.push(b'S');
        expected.extend_from_slice(&6u32.to_be_bytes());
        expected.extend_from_slice(b"secret");
        assert_eq!(&response[..], &expected[..]);
    }

    #[test]
    fn external_response_is_empty() {
        assert!(SaslMechanism::External.response("u", "p").unwrap().is_empty());
    }

    #[test]
    fn mechanism_offer_matching() {
        assert!(SaslMechanism::Plain.offered_in(b"PLAIN AMQPLAIN"));
        assert!(SaslMechanism::AmqPlain.offered_in(b"PLAIN AMQPLAIN"));
        assert!(!SaslMechanism::External.offered_in(b"PLAIN AMQPLAIN"));
    }
}
