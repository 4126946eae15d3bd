pub mod session;
pub mod text_pair;

pub use session::SessionRecord;
pub use text_pair::TextPair;
