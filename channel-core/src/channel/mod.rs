pub mod combination;
pub mod detector;
pub mod line;
pub mod registry;
pub mod validator;
pub mod window;

pub use combination::ChannelCombination;
pub use detector::{ChannelDetector, DetectorSnapshot};
pub use line::{build_line, Line, LineKind, PairKey};
pub use registry::ChannelRegistry;
pub use validator::{LineValidator, Penetration, PenetrationReport, Rejection, Validation};
pub use window::WindowStore;
