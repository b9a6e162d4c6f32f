pub use uuid::{uuid, Uuid};

mod backend;
pub use backend::Backend;

mod comment;
pub use comment::{Comment, CommentId, NewComment};

mod dish;
pub use dish::{DishDump, DishId};

mod error;
pub use error::Error;

mod page;
pub use page::Paginated;

mod reaction;
pub use reaction::{Reaction, ReactionId, ReactionType, ReactionsForComment};

mod user;
pub use user::UserId;

pub type Time = chrono::DateTime<chrono::Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

// The `validate` functions throughout recette-api check what the type system
// cannot: user-provided strings end up in the document store and in the
// rendered tree, so they must be non-empty and free of NUL bytes.

pub fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::NullByteInString(String::from(s)));
    }
    Ok(())
}

pub fn validate_content(s: &str) -> Result<(), Error> {
    validate_string(s)?;
    if s.trim().is_empty() {
        return Err(Error::EmptyContent);
    }
    Ok(())
}
