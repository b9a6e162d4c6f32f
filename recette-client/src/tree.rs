use std::{
    cmp::Reverse,
    collections::{BTreeMap, HashMap, HashSet},
};

use crate::api::{Comment, CommentId, Paginated, Reaction, ReactionType, UserId};

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ReactionSummary {
    pub total_reaction: usize,

    /// Every reaction type is present, with a count of zero if need be
    pub reaction_counts: BTreeMap<ReactionType, usize>,

    /// Reaction of the user viewing the tree, if any
    pub viewer_reaction: Option<Reaction>,
}

impl ReactionSummary {
    pub fn empty() -> ReactionSummary {
        ReactionSummary {
            total_reaction: 0,
            reaction_counts: ReactionType::zeroed_counts(),
            viewer_reaction: None,
        }
    }

    pub fn compute(reactions: &[Reaction], viewer: Option<UserId>) -> ReactionSummary {
        let mut res = ReactionSummary::empty();
        res.total_reaction = reactions.len();
        for r in reactions {
            *res.reaction_counts.entry(r.reaction_type).or_insert(0) += 1;
        }
        res.viewer_reaction =
            viewer.and_then(|v| reactions.iter().find(|r| r.user_id == v).cloned());
        res
    }
}

// Reply chains have no depth bound: Clone, PartialEq and Drop walk the tree
// with explicit stacks.
#[derive(Debug, Eq, serde::Deserialize, serde::Serialize)]
pub struct CommentNode {
    pub comment: Comment,

    /// 0 for top-level comments
    pub depth: usize,

    /// Replies, newest first
    pub children: Vec<CommentNode>,

    pub reaction_summary: ReactionSummary,

    /// Set if this comment reflects a local change the server did not confirm yet
    pub pending: bool,
}

impl CommentNode {
    fn leaf(comment: Comment, depth: usize, reaction_summary: ReactionSummary) -> CommentNode {
        CommentNode {
            comment,
            depth,
            children: Vec::new(),
            reaction_summary,
            pending: false,
        }
    }

    /// Copy of this node, without its children
    fn shallow_clone(&self) -> CommentNode {
        CommentNode {
            comment: self.comment.clone(),
            depth: self.depth,
            children: Vec::with_capacity(self.children.len()),
            reaction_summary: self.reaction_summary.clone(),
            pending: self.pending,
        }
    }

    /// Every node of this subtree in display order, each with the position of
    /// its parent in the returned list
    fn preorder(&self) -> Vec<(&CommentNode, Option<usize>)> {
        let mut res = Vec::new();
        let mut stack = vec![(self, None)];
        while let Some((n, parent)) = stack.pop() {
            let pos = res.len();
            res.push((n, parent));
            stack.extend(n.children.iter().rev().map(|c| (c, Some(pos))));
        }
        res
    }

    /// Number of nodes in this subtree, self included
    pub fn len(&self) -> usize {
        let mut res = 0;
        let mut stack = vec![self];
        while let Some(n) = stack.pop() {
            res += 1;
            stack.extend(n.children.iter());
        }
        res
    }

    pub fn find(&self, id: &CommentId) -> Option<&CommentNode> {
        let mut stack = vec![self];
        while let Some(n) = stack.pop() {
            if n.comment.id == *id {
                return Some(n);
            }
            stack.extend(n.children.iter());
        }
        None
    }
}

/// Links nodes listed in pre-order with their parent position into a forest
fn assemble(nodes: Vec<(CommentNode, Option<usize>)>) -> Vec<CommentNode> {
    let mut parents = Vec::with_capacity(nodes.len());
    let mut built = Vec::with_capacity(nodes.len());
    for (n, parent) in nodes {
        parents.push(parent);
        built.push(Some(n));
    }
    let mut roots = Vec::new();
    // Descendants come after their ancestors, so going backwards every node is
    // complete by the time it is moved into its parent
    for i in (0..built.len()).rev() {
        let mut n = match built[i].take() {
            Some(n) => n,
            None => continue,
        };
        n.children.reverse();
        match parents[i].and_then(|p| built.get_mut(p)).and_then(|p| p.as_mut()) {
            Some(p) => p.children.push(n),
            None => roots.push(n),
        }
    }
    roots.reverse();
    roots
}

impl Clone for CommentNode {
    fn clone(&self) -> CommentNode {
        let nodes = self
            .preorder()
            .into_iter()
            .map(|(n, parent)| (n.shallow_clone(), parent))
            .collect();
        // A single subtree always assembles into a single root
        assemble(nodes)
            .pop()
            .unwrap_or_else(|| self.shallow_clone())
    }
}

impl PartialEq for CommentNode {
    fn eq(&self, other: &CommentNode) -> bool {
        let (a, b) = (self.preorder(), other.preorder());
        a.len() == b.len()
            && a.iter().zip(b.iter()).all(|((a, pa), (b, pb))| {
                pa == pb
                    && a.comment == b.comment
                    && a.depth == b.depth
                    && a.children.len() == b.children.len()
                    && a.reaction_summary == b.reaction_summary
                    && a.pending == b.pending
            })
    }
}

impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut n) = stack.pop() {
            stack.append(&mut n.children);
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentTree {
    /// Top-level comments, newest first
    pub roots: Vec<CommentNode>,
    pub total_root_count: usize,

    /// Number of comments reachable in the tree, replies included
    pub total_comment_count: usize,
}

impl CommentTree {
    pub fn find(&self, id: &CommentId) -> Option<&CommentNode> {
        self.roots.iter().find_map(|r| r.find(id))
    }

    /// `page` is 1-based, page 0 is handled like page 1
    pub fn paginate(&self, page: usize, per_page: usize) -> Paginated<CommentNode> {
        let page = page.max(1);
        let items = match per_page {
            0 => Vec::new(),
            _ => self
                .roots
                .iter()
                .skip((page - 1).saturating_mul(per_page))
                .take(per_page)
                .cloned()
                .collect(),
        };
        Paginated {
            items,
            total: self.total_root_count,
            page,
            per_page,
        }
    }

    pub(crate) fn mark_pending(&mut self, pending: &HashSet<CommentId>) {
        let mut stack = self.roots.iter_mut().collect::<Vec<_>>();
        while let Some(n) = stack.pop() {
            n.pending = pending.contains(&n.comment.id);
            stack.extend(n.children.iter_mut());
        }
    }
}

fn sort_newest_first(comments: &mut [&Comment]) {
    comments.sort_unstable_by_key(|c| (Reverse(c.created_at), c.id));
}

/// Builds the forest of active comments.
///
/// Replies whose parent is missing, inactive or attached to another dish are
/// dropped together with their whole subtree. Comments that are unreachable
/// from a top-level comment (eg. because of a parent cycle) are dropped too.
pub fn build_tree(
    comments: &[Comment],
    reactions: &HashMap<CommentId, Vec<Reaction>>,
    viewer: Option<UserId>,
) -> CommentTree {
    // First pass: index the active comments
    let mut by_id = HashMap::with_capacity(comments.len());
    let mut children: HashMap<CommentId, Vec<&Comment>> = HashMap::new();
    let mut roots = Vec::new();
    for c in comments.iter().filter(|c| c.is_active) {
        if by_id.insert(c.id, c).is_some() {
            tracing::warn!(comment=?c.id, "duplicate comment id, keeping the last one");
        }
    }
    for c in by_id.values() {
        match c.parent_id {
            None => roots.push(*c),
            Some(p) => children.entry(p).or_default().push(*c),
        }
    }
    for (parent, replies) in children.iter_mut() {
        match by_id.get(parent) {
            None => tracing::debug!(
                ?parent,
                num_replies = replies.len(),
                "dropping replies to missing or deleted comment"
            ),
            Some(p) => {
                for r in replies.iter().filter(|r| r.dish_id != p.dish_id) {
                    tracing::debug!(
                        comment=?r.id,
                        ?parent,
                        "dropping reply to comment of another dish"
                    );
                }
                let dish_id = p.dish_id;
                replies.retain(|r| r.dish_id == dish_id);
            }
        }
        sort_newest_first(replies);
    }
    sort_newest_first(&mut roots);

    // Second pass: walk the index from the roots, in display order
    let mut visited = HashSet::with_capacity(by_id.len());
    let mut stack = roots
        .into_iter()
        .filter(|r| visited.insert(r.id))
        .map(|r| (r, 0, None))
        .collect::<Vec<_>>();
    stack.reverse();
    let mut nodes = Vec::with_capacity(by_id.len());
    while let Some((c, depth, parent)) = stack.pop() {
        let pos = nodes.len();
        let summary = ReactionSummary::compute(
            reactions.get(&c.id).map(|r| &r[..]).unwrap_or(&[]),
            viewer,
        );
        nodes.push((CommentNode::leaf(c.clone(), depth, summary), parent));
        let replies = children.get(&c.id).map(|r| &r[..]).unwrap_or(&[]);
        let first = stack.len();
        stack.extend(
            replies
                .iter()
                .filter(|r| visited.insert(r.id))
                .map(|r| (*r, depth + 1, Some(pos))),
        );
        stack[first..].reverse();
    }

    let total_comment_count = nodes.len();
    let roots = assemble(nodes);
    CommentTree {
        total_root_count: roots.len(),
        total_comment_count,
        roots,
    }
}
