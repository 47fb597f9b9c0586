//! Nested comment threads

use super::Comment;
use std::collections::{HashMap, HashSet};

/// A comment and its replies
#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

/// Comments arranged by `parent_id`, siblings in arrival order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentThread {
    roots: Vec<CommentNode>,
}

impl CommentThread {
    /// Build a thread from a flat list.
    ///
    /// A comment whose parent is missing (or part of a cycle) is placed at the
    /// root level.
    pub fn build(comments: Vec<Comment>) -> Self {
        let ids: HashSet<u64> = comments.iter().map(|c| c.id).collect();

        let mut children: HashMap<u64, Vec<Comment>> = HashMap::new();
        let mut roots = Vec::new();
        for comment in comments {
            match comment.parent_id {
                Some(parent) if parent != comment.id && ids.contains(&parent) => {
                    children.entry(parent).or_default().push(comment)
                }
                _ => roots.push(comment),
            }
        }

        let mut placed = HashSet::new();
        let mut thread = Self {
            roots: roots
                .into_iter()
                .map(|c| attach(c, &mut children, &mut placed))
                .collect(),
        };

        // Whatever is left hangs off a cycle and never reached a root
        let mut leftover: Vec<Comment> = children.into_values().flatten().collect();
        leftover.sort_by_key(|c| c.id);
        for comment in leftover {
            if !placed.contains(&comment.id) {
                let mut orphans = HashMap::new();
                let node = attach(comment, &mut orphans, &mut placed);
                thread.roots.push(node);
            }
        }

        thread
    }

    /// Add a new comment under its parent, or at the root level
    pub fn insert(&mut self, comment: Comment) {
        if let Some(parent_id) = comment.parent_id {
            if let Some(parent) = find_mut(&mut self.roots, parent_id) {
                parent.replies.push(CommentNode {
                    comment,
                    replies: Vec::new(),
                });
                return;
            }
        }
        self.roots.push(CommentNode {
            comment,
            replies: Vec::new(),
        });
    }

    pub fn roots(&self) -> &[CommentNode] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.walk().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Depth-first listing with nesting depth, as rendered on the page
    pub fn walk(&self) -> Vec<(usize, &Comment)> {
        let mut out = Vec::new();
        let mut stack: Vec<(usize, &CommentNode)> =
            self.roots.iter().rev().map(|n| (0, n)).collect();

        while let Some((depth, node)) = stack.pop() {
            out.push((depth, &node.comment));
            stack.extend(node.replies.iter().rev().map(|n| (depth + 1, n)));
        }
        out
    }
}

fn attach(
    comment: Comment,
    children: &mut HashMap<u64, Vec<Comment>>,
    placed: &mut HashSet<u64>,
) -> CommentNode {
    placed.insert(comment.id);

    let mut replies = Vec::new();
    for reply in children.remove(&comment.id).unwrap_or_default() {
        if !placed.contains(&reply.id) {
            replies.push(attach(reply, children, placed));
        }
    }

    CommentNode { comment, replies }
}

fn find_mut(nodes: &mut [CommentNode], id: u64) -> Option<&mut CommentNode> {
    for node in nodes {
        if node.comment.id == id {
            return Some(node);
        }
        if let Some(found) = find_mut(&mut node.replies, id) {
            return Some(found);
        }
    }
    None
}
