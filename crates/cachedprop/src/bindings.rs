//! Shared definition of accessor types
//!
//! `Accessor` and `SyncAccessor` differ only in the receiver their write and
//! remove functions take and in how slots are locked. The struct, builders,
//! getters, `Clone` and `Debug` are generated here so both stay in step.

/// Define an accessor struct over `T`/`V` with the given function bounds.
///
/// The bounds are bracketed token lists, e.g. `[Fn(&mut T, V)]`; `Send + Sync`
/// is added to each.
macro_rules! accessor_bindings {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            compute: [$($compute:tt)+],
            write: [$($write:tt)+],
            remove: [$($remove:tt)+],
        }
    ) => {
        $(#[$meta])*
        pub struct $name<T, V> {
            id: $crate::accessor::AccessorId,
            label: &'static str,
            doc: Option<std::sync::Arc<str>>,
            compute: Option<std::sync::Arc<dyn $($compute)+ + Send + Sync>>,
            write: Option<std::sync::Arc<dyn $($write)+ + Send + Sync>>,
            remove: Option<std::sync::Arc<dyn $($remove)+ + Send + Sync>>,
        }

        impl<T, V> $name<T, V> {
            /// Create an accessor with no functions bound
            pub fn unbound(label: &'static str) -> Self {
                Self {
                    id: $crate::accessor::AccessorId::next(),
                    label,
                    doc: None,
                    compute: None,
                    write: None,
                    remove: None,
                }
            }

            /// Replace the compute function
            ///
            /// The new accessor gets a fresh slot, since it derives a different value.
            pub fn with_read<F>(&self, compute: F) -> Self
            where
                F: $($compute)+ + Send + Sync + 'static,
            {
                Self {
                    id: $crate::accessor::AccessorId::next(),
                    compute: Some(std::sync::Arc::new(compute)),
                    ..self.clone()
                }
            }

            /// Replace the write function, sharing this accessor's slot
            pub fn with_write<F>(&self, write: F) -> Self
            where
                F: $($write)+ + Send + Sync + 'static,
            {
                Self {
                    write: Some(std::sync::Arc::new(write)),
                    ..self.clone()
                }
            }

            /// Replace the remove function, sharing this accessor's slot
            pub fn with_remove<F>(&self, remove: F) -> Self
            where
                F: $($remove)+ + Send + Sync + 'static,
            {
                Self {
                    remove: Some(std::sync::Arc::new(remove)),
                    ..self.clone()
                }
            }

            /// Attach documentation text
            pub fn with_doc(&self, doc: impl Into<std::sync::Arc<str>>) -> Self {
                Self {
                    doc: Some(doc.into()),
                    ..self.clone()
                }
            }

            /// Slot identity
            pub fn id(&self) -> $crate::accessor::AccessorId {
                self.id
            }

            /// Accessor label
            pub fn label(&self) -> &'static str {
                self.label
            }

            /// Documentation text, if any
            pub fn doc(&self) -> Option<&str> {
                self.doc.as_deref()
            }

            /// Check if a compute function is bound
            pub fn is_readable(&self) -> bool {
                self.compute.is_some()
            }

            /// Check if a write function is bound
            pub fn is_writable(&self) -> bool {
                self.write.is_some()
            }

            /// Check if a remove function is bound
            pub fn is_deletable(&self) -> bool {
                self.remove.is_some()
            }
        }

        impl<T, V> Clone for $name<T, V> {
            fn clone(&self) -> Self {
                Self {
                    id: self.id,
                    label: self.label,
                    doc: self.doc.clone(),
                    compute: self.compute.clone(),
                    write: self.write.clone(),
                    remove: self.remove.clone(),
                }
            }
        }

        impl<T, V> std::fmt::Debug for $name<T, V> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("id", &self.id)
                    .field("label", &self.label)
                    .field("readable", &self.is_readable())
                    .field("writable", &self.is_writable())
                    .field("deletable", &self.is_deletable())
                    .finish()
            }
        }
    };
}
