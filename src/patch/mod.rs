pub mod descriptor;
pub mod engine;
pub mod guard;
pub mod splice;

pub use descriptor::{DescriptorError, Edit, Guard, Insertion, PatchDescriptor, Placement};
pub use engine::{ContentPatch, FilePatch, Outcome, PatchError, WriteMode, apply_file, patch_content};
pub use guard::is_applied;
pub use splice::{LineEnding, splice};
