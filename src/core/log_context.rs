//! Per-thread diagnostic context and its immutable snapshots
//!
//! This module provides:
//! - `ThreadContext`: the calling thread's key-value map and ordered stack
//! - `ContextMap` / `ContextStack`: immutable snapshots carried by events
//! - `ContextProvider`: the seam the publisher snapshots through
//! - `ContextGuard` / `StackGuard`: RAII guards for scoped entries
//!
//! Both thread-local structures are copy-on-write: a snapshot is an `Arc`
//! clone, and the next mutation copies the data if a snapshot is still
//! alive. A published event therefore never observes later mutations.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Immutable snapshot of a thread's key-value context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextMap(Arc<BTreeMap<String, String>>);

impl ContextMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Insert on this copy only; other holders of the snapshot are unaffected
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        Arc::make_mut(&mut self.0).insert(key.into(), value.into());
    }

    /// True if both snapshots share the same storage
    pub fn ptr_eq(&self, other: &ContextMap) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Format entries as key=value pairs
    pub fn format_fields(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ContextMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_fields())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ContextMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ContextMap(Arc::new(
            iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }
}

/// Immutable snapshot of a thread's context stack, bottom first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextStack(Arc<Vec<String>>);

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn peek(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ContextStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for ContextStack {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ContextStack(Arc::new(iter.into_iter().map(Into::into).collect()))
    }
}

thread_local! {
    static CONTEXT: RefCell<(ContextMap, ContextStack)> =
        RefCell::new((ContextMap::default(), ContextStack::default()));
}

/// The calling thread's diagnostic context
///
/// # Example
///
/// ```
/// use rust_async_logger::core::ThreadContext;
///
/// ThreadContext::put("request_id", "abc-123");
/// let snapshot = ThreadContext::map_snapshot();
/// ThreadContext::put("request_id", "def-456");
///
/// assert_eq!(snapshot.get("request_id"), Some("abc-123"));
/// ThreadContext::clear_all();
/// ```
pub struct ThreadContext;

impl ThreadContext {
    pub fn put(key: impl Into<String>, value: impl Into<String>) {
        CONTEXT.with(|ctx| ctx.borrow_mut().0.insert(key, value));
    }

    pub fn get(key: &str) -> Option<String> {
        CONTEXT.with(|ctx| ctx.borrow().0.get(key).map(str::to_string))
    }

    pub fn remove(key: &str) {
        CONTEXT.with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            if ctx.0.contains_key(key) {
                Arc::make_mut(&mut ctx.0 .0).remove(key);
            }
        });
    }

    pub fn clear_map() {
        CONTEXT.with(|ctx| ctx.borrow_mut().0 = ContextMap::default());
    }

    pub fn push(message: impl Into<String>) {
        CONTEXT.with(|ctx| Arc::make_mut(&mut ctx.borrow_mut().1 .0).push(message.into()));
    }

    pub fn pop() -> Option<String> {
        CONTEXT.with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            if ctx.1.is_empty() {
                None
            } else {
                Arc::make_mut(&mut ctx.1 .0).pop()
            }
        })
    }

    pub fn peek() -> Option<String> {
        CONTEXT.with(|ctx| ctx.borrow().1.peek().map(str::to_string))
    }

    pub fn stack_depth() -> usize {
        CONTEXT.with(|ctx| ctx.borrow().1.len())
    }

    pub fn clear_stack() {
        CONTEXT.with(|ctx| ctx.borrow_mut().1 = ContextStack::default());
    }

    pub fn clear_all() {
        Self::clear_map();
        Self::clear_stack();
    }

    /// Immutable copy of the map at this instant
    #[inline]
    pub fn map_snapshot() -> ContextMap {
        CONTEXT.with(|ctx| ctx.borrow().0.clone())
    }

    /// Immutable copy of the stack at this instant
    #[inline]
    pub fn stack_snapshot() -> ContextStack {
        CONTEXT.with(|ctx| ctx.borrow().1.clone())
    }

    /// Put a key for the lifetime of the returned guard
    #[must_use = "the entry is removed when the guard is dropped"]
    pub fn scoped(key: impl Into<String>, value: impl Into<String>) -> ContextGuard {
        let key = key.into();
        Self::put(key.clone(), value);
        ContextGuard { key }
    }

    /// Push a stack entry for the lifetime of the returned guard
    #[must_use = "the entry is popped when the guard is dropped"]
    pub fn scoped_push(message: impl Into<String>) -> StackGuard {
        Self::push(message);
        StackGuard {
            depth: Self::stack_depth() - 1,
        }
    }
}

/// RAII guard for a scoped context map entry
pub struct ContextGuard {
    key: String,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        ThreadContext::remove(&self.key);
    }
}

/// RAII guard for a scoped stack entry
///
/// Dropping truncates the stack back to the depth it had before the push.
pub struct StackGuard {
    depth: usize,
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        CONTEXT.with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            if ctx.1.len() > self.depth {
                Arc::make_mut(&mut ctx.1 .0).truncate(self.depth);
            }
        });
    }
}

/// Supplies context snapshots to the publisher on the calling thread
pub trait ContextProvider: Send + Sync {
    fn context_map(&self) -> ContextMap;
    fn context_stack(&self) -> ContextStack;
}

/// Default provider reading [`ThreadContext`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadContextProvider;

impl ContextProvider for ThreadContextProvider {
    #[inline]
    fn context_map(&self) -> ContextMap {
        ThreadContext::map_snapshot()
    }

    #[inline]
    fn context_stack(&self) -> ContextStack {
        ThreadContext::stack_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_survives_mutation() {
        ThreadContext::clear_all();
        ThreadContext::put("user", "alice");
        ThreadContext::push("outer");

        let map = ThreadContext::map_snapshot();
        let stack = ThreadContext::stack_snapshot();

        ThreadContext::put("user", "bob");
        ThreadContext::put("extra", "1");
        ThreadContext::push("inner");

        assert_eq!(map.get("user"), Some("alice"));
        assert!(!map.contains_key("extra"));
        assert_eq!(stack.as_slice(), &["outer".to_string()]);
        assert_eq!(ThreadContext::get("user").as_deref(), Some("bob"));
        assert_eq!(ThreadContext::stack_depth(), 2);
        ThreadContext::clear_all();
    }

    #[test]
    fn test_snapshot_without_mutation_shares_storage() {
        ThreadContext::clear_all();
        ThreadContext::put("k", "v");
        let a = ThreadContext::map_snapshot();
        let b = ThreadContext::map_snapshot();
        assert!(a.ptr_eq(&b));
        ThreadContext::clear_all();
    }

    #[test]
    fn test_guards_restore_previous_state() {
        ThreadContext::clear_all();
        ThreadContext::push("base");
        {
            let _key = ThreadContext::scoped("request_id", "r-1");
            let _frame = ThreadContext::scoped_push("handler");
            ThreadContext::push("nested-without-guard");
            assert_eq!(ThreadContext::get("request_id").as_deref(), Some("r-1"));
            assert_eq!(ThreadContext::stack_depth(), 3);
        }
        assert_eq!(ThreadContext::get("request_id"), None);
        assert_eq!(ThreadContext::stack_depth(), 1);
        assert_eq!(ThreadContext::peek().as_deref(), Some("base"));
        ThreadContext::clear_all();
    }

    #[test]
    fn test_context_is_per_thread() {
        ThreadContext::clear_all();
        ThreadContext::put("owner", "main");
        let seen = std::thread::spawn(|| ThreadContext::get("owner"))
            .join()
            .expect("thread panicked");
        assert_eq!(seen, None);
        ThreadContext::clear_all();
    }

    #[test]
    fn test_pop_on_empty_stack() {
        ThreadContext::clear_all();
        assert_eq!(ThreadContext::pop(), None);
        ThreadContext::push("a");
        assert_eq!(ThreadContext::pop().as_deref(), Some("a"));
    }

    #[test]
    fn test_insert_on_copy_does_not_touch_original() {
        let original: ContextMap = [("a", "1")].into_iter().collect();
        let mut copy = original.clone();
        copy.insert("b", "2");
        assert_eq!(original.len(), 1);
        assert_eq!(copy.len(), 2);
        assert_eq!(copy.format_fields(), "a=1 b=2");
    }
}
