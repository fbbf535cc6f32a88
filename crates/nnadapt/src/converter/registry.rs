use std::fmt;

use crate::core::graph::Graph;
use crate::core::operation::{Operation, OperationKind};
use crate::error::{ConfigErrorCode, Error, Result};

/// Lowers one operation into the backend builder held by `C`.
pub type ConvertFn<C> = fn(&mut C, &Graph, &Operation) -> Result<()>;

/// Backend-specific acceptance predicate; `Err` carries the rejection reason.
pub type ValidateFn = fn(&Graph, &Operation) -> std::result::Result<(), String>;

/// One row of a converter table.
pub struct ConverterEntry<C> {
    pub name: &'static str,
    pub convert: ConvertFn<C>,
    pub validate: Option<ValidateFn>,
}

impl<C> Clone for ConverterEntry<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for ConverterEntry<C> {}

impl<C> fmt::Debug for ConverterEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterEntry")
            .field("name", &self.name)
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

/// Collects converter rows before freezing them into a [`ConverterRegistry`].
pub struct RegistryBuilder<C> {
    backend: String,
    entries: Vec<Option<ConverterEntry<C>>>,
}

impl<C> RegistryBuilder<C> {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            entries: vec![None; OperationKind::COUNT],
        }
    }

    pub fn register(&mut self, kind: OperationKind, name: &'static str, convert: ConvertFn<C>) -> Result<()> {
        self.insert(
            kind,
            ConverterEntry {
                name,
                convert,
                validate: None,
            },
        )
    }

    pub fn register_with_validator(
        &mut self,
        kind: OperationKind,
        name: &'static str,
        convert: ConvertFn<C>,
        validate: ValidateFn,
    ) -> Result<()> {
        self.insert(
            kind,
            ConverterEntry {
                name,
                convert,
                validate: Some(validate),
            },
        )
    }

    /// Registering the same converter name twice for a kind is a no-op; a
    /// different name for an occupied kind is rejected.
    fn insert(&mut self, kind: OperationKind, entry: ConverterEntry<C>) -> Result<()> {
        let slot = &mut self.entries[kind.index()];
        match slot {
            Some(existing) if existing.name == entry.name => Ok(()),
            Some(existing) => Err(Error::config(
                ConfigErrorCode::DuplicateConverter,
                format!(
                    "{} already maps {} to {}, refusing {}",
                    self.backend, kind, existing.name, entry.name
                ),
            )),
            None => {
                *slot = Some(entry);
                Ok(())
            }
        }
    }

    pub fn build(self) -> ConverterRegistry<C> {
        ConverterRegistry {
            backend: self.backend,
            entries: self.entries.into_boxed_slice(),
        }
    }
}

/// Immutable kind → converter table of one backend driver.
///
/// Lookup indexes a dense array by the kind ordinal. Entries are plain
/// function pointers, so a built registry is `Send + Sync` and can be shared
/// across compile threads by reference.
pub struct ConverterRegistry<C> {
    backend: String,
    entries: Box<[Option<ConverterEntry<C>>]>,
}

impl<C> ConverterRegistry<C> {
    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn get(&self, kind: OperationKind) -> Option<&ConverterEntry<C>> {
        self.entries.get(kind.index()).and_then(Option::as_ref)
    }

    pub fn contains(&self, kind: OperationKind) -> bool {
        self.get(kind).is_some()
    }

    /// Registered kinds in ordinal order.
    pub fn kinds(&self) -> impl Iterator<Item = OperationKind> + '_ {
        OperationKind::ALL
            .iter()
            .copied()
            .filter(move |kind| self.contains(*kind))
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs the entry's predicate; a missing converter is a rejection.
    pub fn check(&self, graph: &Graph, op: &Operation) -> std::result::Result<(), String> {
        match self.get(op.kind) {
            None => Err(format!("{} has no converter for {}", self.backend, op.kind)),
            Some(ConverterEntry {
                validate: Some(validate),
                ..
            }) => validate(graph, op),
            Some(_) => Ok(()),
        }
    }
}

impl<C> fmt::Debug for ConverterRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("backend", &self.backend)
            .field("kinds", &self.kinds().map(OperationKind::name).collect::<Vec<_>>())
            .finish()
    }
}

/// Declares a converter table the way backends list their lowering routines.
///
/// ```ignore
/// register_converters!(builder, {
///     Relu => unary_activations::convert_unary_activations,
///     Softplus => unary_activations::convert_unary_activations [validate = check_softplus],
/// })?;
/// ```
#[macro_export]
macro_rules! register_converters {
    (@one $builder:ident, $kind:ident, $convert:path) => {
        $builder.register(
            $crate::core::operation::OperationKind::$kind,
            stringify!($convert),
            $convert,
        )
    };
    (@one $builder:ident, $kind:ident, $convert:path, $validate:path) => {
        $builder.register_with_validator(
            $crate::core::operation::OperationKind::$kind,
            stringify!($convert),
            $convert,
            $validate,
        )
    };
    ($builder:expr, { $($kind:ident => $convert:path $([validate = $validate:path])?),* $(,)? }) => {{
        let builder = &mut $builder;
        let mut result: $crate::error::Result<()> = Ok(());
        $(
            if result.is_ok() {
                result = $crate::register_converters!(@one builder, $kind, $convert $(, $validate)?);
            }
        )*
        result
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        seen: Vec<OperationKind>,
    }

    fn record(ctx: &mut Recorder, _graph: &Graph, op: &Operation) -> Result<()> {
        ctx.seen.push(op.kind);
        Ok(())
    }

    fn record_other(ctx: &mut Recorder, graph: &Graph, op: &Operation) -> Result<()> {
        record(ctx, graph, op)
    }

    fn never(_graph: &Graph, _op: &Operation) -> std::result::Result<(), String> {
        Err("never".into())
    }

    #[test]
    fn same_name_registration_is_idempotent() {
        let mut builder = RegistryBuilder::<Recorder>::new("test");
        builder.register(OperationKind::Relu, "record", record).unwrap();
        builder.register(OperationKind::Relu, "record", record).unwrap();
        let registry = builder.build();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(OperationKind::Relu).map(|e| e.name), Some("record"));
    }

    #[test]
    fn different_converter_for_same_kind_is_rejected() {
        let mut builder = RegistryBuilder::<Recorder>::new("test");
        builder.register(OperationKind::Relu, "record", record).unwrap();
        let err = builder
            .register(OperationKind::Relu, "record_other", record_other)
            .expect_err("second converter for RELU");
        assert_eq!(err.config_code(), Some(ConfigErrorCode::DuplicateConverter));
        assert_eq!(builder.build().get(OperationKind::Relu).map(|e| e.name), Some("record"));
    }

    #[test]
    fn table_macro_registers_every_row() {
        let mut builder = RegistryBuilder::<Recorder>::new("test");
        crate::register_converters!(builder, {
            Relu => record,
            Tanh => record,
            Stack => record [validate = never],
        })
        .unwrap();
        let registry = builder.build();
        assert_eq!(
            registry.kinds().collect::<Vec<_>>(),
            vec![OperationKind::Relu, OperationKind::Stack, OperationKind::Tanh]
        );
        assert!(registry.get(OperationKind::Stack).and_then(|e| e.validate).is_some());
        assert!(!registry.contains(OperationKind::Exp));
    }

    #[test]
    fn registry_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConverterRegistry<Recorder>>();
    }
}
