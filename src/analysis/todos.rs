//! Work-marker extraction.
//!
//! Comments carrying `TODO`, `FIXME`, `XXX` or `HACK` become [`Todo`]
//! entries with an estimated priority; every other comment is kept as a
//! plain [`Comment`].

use lazy_static::lazy_static;
use regex::Regex;

use super::CommentFact;
use crate::aggregate::{Comment, Todo, TodoPriority};

lazy_static! {
    /// Pattern to match TODO/FIXME markers
    static ref TODO_PATTERN: Regex = Regex::new(
        r"(?i)\b(TODO|FIXME|XXX|HACK)\b"
    ).unwrap();

    static ref HIGH_PRIORITY: Regex = Regex::new(r"(?i)urgent|critical|fixme|bug").unwrap();

    static ref MEDIUM_PRIORITY: Regex = Regex::new(r"(?i)important|needed|should").unwrap();
}

/// Whether a comment carries a work marker.
pub fn is_todo(text: &str) -> bool {
    TODO_PATTERN.is_match(text)
}

/// Estimate a marker's priority from its wording.
pub fn estimate_priority(text: &str) -> TodoPriority {
    if HIGH_PRIORITY.is_match(text) {
        TodoPriority::High
    } else if MEDIUM_PRIORITY.is_match(text) {
        TodoPriority::Medium
    } else {
        TodoPriority::Low
    }
}

/// Partition comments into plain comments and TODOs, keeping line order.
pub fn partition_comments(comments: &[CommentFact]) -> (Vec<Comment>, Vec<Todo>) {
    let mut plain = Vec::new();
    let mut todos = Vec::new();

    for comment in comments {
        if is_todo(&comment.text) {
            todos.push(Todo {
                line: comment.line,
                text: comment.text.clone(),
                priority: estimate_priority(&comment.text),
            });
        } else {
            plain.push(Comment {
                line: comment.line,
                text: comment.text.clone(),
            });
        }
    }

    (plain, todos)
}
