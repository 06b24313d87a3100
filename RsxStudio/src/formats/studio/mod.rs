//! Studio model decoding
//!
//! One normalized model is produced from any supported revision. Layouts
//! differ per [`StudioVersion`]; every decoder dispatches on the version
//! through the constant tables in [`layout`].

pub mod anim;
pub mod bones;
pub mod header;
pub mod layout;
pub mod model;
pub mod movement;
pub mod sequence;
pub mod tables;
pub mod version;
pub mod vertex;

pub use anim::{AnimDesc, AnimFlags, DecodedBoneTrack, ExternalBuffers, TrackFlags, decode_track};
pub use bones::{Bone, IkChain, JiggleBone, ProceduralBone};
pub use header::{HardwareGroup, NormalizedHeader};
pub use model::{LodSummary, ModelSources, ModelSummary, StudioModel};
pub use movement::RootMotion;
pub use sequence::{AnimationClip, SeqDesc, Sequence, SequenceSource, WeightList};
pub use tables::{Attachment, BodyPart, Hitbox, HitboxSet, Texture};
pub use version::{LayoutFamily, StudioVersion, VertexSource};
pub use vertex::{LegacyVertexFiles, Lod, Mesh, MeshVertex, VertexWeight};
