//! Tx-class methods (class id 90), server-local transactions

use crate::codec::{Reader, Writer};
use crate::error::Error;

macro_rules! empty_method {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl $name {
            pub fn encode_args(&self, _w: &mut Writer) -> Result<(), Error> {
                Ok(())
            }

            pub fn decode_args(_r: &mut Reader<'_>) -> Result<Self, Error> {
                Ok(Self)
            }
        }
    };
}

empty_method!(
    /// Puts the channel in transactional mode.
    Select
);
empty_method!(SelectOk);
empty_method!(
    /// Commits all publishes and acks issued since the last commit/rollback.
    Commit
);
empty_method!(CommitOk);
empty_method!(Rollback);
empty_method!(RollbackOk);
