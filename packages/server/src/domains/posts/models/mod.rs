pub mod media;
pub mod post;
pub mod source;
pub mod tag;

pub use media::*;
pub use post::*;
pub use source::*;
pub use tag::*;
