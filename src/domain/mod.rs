mod codec;
mod countdown;
mod duration;
mod summary;
mod types;

pub use codec::*;
pub use countdown::*;
pub use duration::*;
pub use summary::*;
pub use types::*;
