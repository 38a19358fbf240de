//! Selects the field-type letters emitted into tables and arrays

/// Which tag letters are emitted for narrow integer field values.
///
/// RabbitMQ's dialect has distinct tags for every integer width; the strict
/// 0-9-1 dialect collapses the narrower widths onto `I` (long) and `L`
/// (long-long). Decoding always accepts both dialects regardless of this
/// setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireDialect {
    /// RabbitMQ field-type letters (the common case)
    #[default]
    Rabbit,
    /// Plain AMQP 0-9-1 letters; narrow integers widen to `I`/`L`
    Strict091,
}
