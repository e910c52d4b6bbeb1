//! Typed arena indices.
//!
//! Every id is an index into a store that lives exactly as long as one loaded
//! scene. Loading a new scene starts all counters from zero again.

use serde::Serialize;

macro_rules! arena_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
            pub struct $name(pub usize);

            impl $name {
                pub fn index(self) -> usize {
                    self.0
                }
            }

            impl From<usize> for $name {
                fn from(index: usize) -> Self {
                    Self(index)
                }
            }

            impl From<$name> for usize {
                fn from(id: $name) -> usize {
                    id.0
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}#{}", stringify!($name), self.0)
                }
            }
        )*
    };
}

arena_id!(
    /// Scene-graph node.
    NodeId,
    MeshId,
    MaterialId,
    TextureId,
    MediaId,
    TextId,
    ViewpointId,
    /// DefinedItem in the symbol table.
    ItemId,
    SensorId,
    TimeSensorId,
    InterpolatorId,
    EventUtilityId,
    ScriptId,
    /// Resolved wiring record.
    ObjectId,
    /// Baked keyframe animation, issued per scene-load session.
    AnimationId,
);
