//! Camera identity, interior/exterior orientation and the collinearity
//! transforms built from them.

mod id;
mod model;
mod pose;
mod transform;

pub use id::{CameraId, CameraPosition};
pub use model::{CameraModel, CameraSpec, Intrinsics};
pub use pose::{check_orthonormal, rotation_matrix, Pose, ROTATION_TOLERANCE};
pub use transform::{ForwardTransform, InverseTransform};
