mod audit;
pub use audit::{audit, Anomaly};

mod phantom;
pub use phantom::{Mutation, PhantomEntry, PhantomKey, ReactionChange, StateChange};

mod reconciler;
pub use reconciler::Reconciler;

mod session;
pub use session::CommentSession;

mod tree;
pub use tree::{build_tree, CommentNode, CommentTree, ReactionSummary};

#[cfg(test)]
mod test_util;

pub mod api {
    pub use recette_api::*;
}
