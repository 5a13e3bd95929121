//! Macros for declaring state and event enums.

/// Declare a fieldless enum usable as a machine state.
///
/// Derives everything the engine needs (`Clone`, `Copy`, `Eq`, `Ord`, `Hash`,
/// `Debug`, serde) and implements [`State`](crate::core::State) with the
/// variant name as `name()`. The serde derives go through fsmkit's own serde,
/// so callers need no serde dependency of their own.
///
/// # Example
///
/// ```
/// use fsmkit::state_enum;
/// use fsmkit::core::State;
///
/// state_enum! {
///     pub enum Door {
///         Open,
///         Closed,
///     }
/// }
///
/// assert_eq!(Door::Closed.name(), "Closed");
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $crate::__fsm_enum! {
            $crate::core::State;
            $(#[$meta])*
            $vis enum $name {
                $(
                    $(#[$variant_meta])*
                    $variant
                ),*
            }
        }
    };
}

/// Declare a fieldless enum usable as a machine event.
///
/// Same derives as [`state_enum!`], implementing
/// [`Event`](crate::core::Event) instead.
///
/// ```
/// use fsmkit::event_enum;
/// use fsmkit::core::Event;
///
/// event_enum! {
///     pub enum DoorEvent {
///         Push,
///         Pull,
///     }
/// }
///
/// assert_eq!(DoorEvent::Push.name(), "Push");
/// ```
#[macro_export]
macro_rules! event_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $crate::__fsm_enum! {
            $crate::core::Event;
            $(#[$meta])*
            $vis enum $name {
                $(
                    $(#[$variant_meta])*
                    $variant
                ),*
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __fsm_enum {
    (
        $trait:path;
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),*
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Debug,
            $crate::__serde::Serialize,
            $crate::__serde::Deserialize,
        )]
        #[serde(crate = "fsmkit::__serde")]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $trait for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }
        }
    };
}
