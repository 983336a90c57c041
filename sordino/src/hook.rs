/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Hook actions and the per-module set of interception targets.

use std::fmt;
use std::ops::BitOr;
use std::ops::BitOrAssign;
use std::sync::Arc;

use crate::call::CallContext;
use crate::error::Error;
use crate::module::RawArg;

/// Handler running before the original function.
pub type PreHook = Arc<dyn Fn(&mut dyn CallContext) -> Result<(), Error> + Send + Sync>;

/// Handler running after the original function returns.
pub type PostHook = Arc<dyn Fn(&mut dyn CallContext) -> Result<(), Error> + Send + Sync>;

/// Handler standing in for the original function. Its return value is what
/// the caller receives; the original never runs.
pub type ReplaceHook = Arc<dyn Fn(&mut dyn CallContext) -> Result<RawArg, Error> + Send + Sync>;

/// What to do when an intercepted function is called.
#[derive(Clone)]
pub enum HookAction {
    /// Run the original, bracketed by optional pre and post handlers.
    Wrap {
        /// Runs before the original function.
        pre: Option<PreHook>,
        /// Runs after the original function returns.
        post: Option<PostHook>,
    },
    /// Never run the original.
    Replace {
        /// Runs instead of the original function.
        substitute: ReplaceHook,
    },
}

impl fmt::Debug for HookAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookAction::Wrap { pre, post } => f
                .debug_struct("Wrap")
                .field("pre", &pre.is_some())
                .field("post", &post.is_some())
                .finish(),
            HookAction::Replace { .. } => f.debug_struct("Replace").finish_non_exhaustive(),
        }
    }
}

/// One exported symbol paired with the action to take on its calls.
#[derive(Debug, Clone)]
pub struct InterceptionTarget {
    /// The exported function to intercept, by name.
    pub symbol: String,
    /// What to do on each call.
    pub action: HookAction,
}

/// The set of interceptions a tool wants installed in one module.
///
/// Built by chaining, and composed across sources with `|`:
///
/// ```
/// use sordino::HookSet;
///
/// let mut hooks = HookSet::new();
/// hooks
///     .wrap_pre("snd_pcm_writei", |_call| Ok(()))
///     .replace_fixed("snd_pcm_wait", 1);
/// let combined = hooks | HookSet::new();
/// assert_eq!(combined.len(), 2);
/// ```
#[derive(Debug, Default, Clone)]
pub struct HookSet {
    targets: Vec<InterceptionTarget>,
}

impl HookSet {
    /// An empty set.
    pub fn new() -> Self {
        Default::default()
    }

    /// Wrap `symbol` with both a pre and a post handler.
    pub fn wrap<P, Q>(&mut self, symbol: impl Into<String>, pre: P, post: Q) -> &mut Self
    where
        P: Fn(&mut dyn CallContext) -> Result<(), Error> + Send + Sync + 'static,
        Q: Fn(&mut dyn CallContext) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.targets.push(InterceptionTarget {
            symbol: symbol.into(),
            action: HookAction::Wrap {
                pre: Some(Arc::new(pre)),
                post: Some(Arc::new(post)),
            },
        });
        self
    }

    /// Wrap `symbol` with a pre handler only.
    pub fn wrap_pre<P>(&mut self, symbol: impl Into<String>, pre: P) -> &mut Self
    where
        P: Fn(&mut dyn CallContext) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.targets.push(InterceptionTarget {
            symbol: symbol.into(),
            action: HookAction::Wrap {
                pre: Some(Arc::new(pre)),
                post: None,
            },
        });
        self
    }

    /// Wrap `symbol` with a post handler only.
    pub fn wrap_post<Q>(&mut self, symbol: impl Into<String>, post: Q) -> &mut Self
    where
        Q: Fn(&mut dyn CallContext) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.targets.push(InterceptionTarget {
            symbol: symbol.into(),
            action: HookAction::Wrap {
                pre: None,
                post: Some(Arc::new(post)),
            },
        });
        self
    }

    /// Replace `symbol` with a substitute handler.
    pub fn replace<R>(&mut self, symbol: impl Into<String>, substitute: R) -> &mut Self
    where
        R: Fn(&mut dyn CallContext) -> Result<RawArg, Error> + Send + Sync + 'static,
    {
        self.targets.push(InterceptionTarget {
            symbol: symbol.into(),
            action: HookAction::Replace {
                substitute: Arc::new(substitute),
            },
        });
        self
    }

    /// Replace `symbol` with a substitute that always returns `value`.
    pub fn replace_fixed(&mut self, symbol: impl Into<String>, value: RawArg) -> &mut Self {
        self.replace(symbol, move |_call| Ok(value))
    }

    /// Number of targets in the set.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// True if the set has no targets.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterate over the targets.
    pub fn iter(&self) -> std::slice::Iter<'_, InterceptionTarget> {
        self.targets.iter()
    }
}

impl BitOr for HookSet {
    type Output = Self;

    fn bitor(mut self, rhs: Self) -> Self {
        self |= rhs;
        self
    }
}

impl BitOrAssign for HookSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.targets.extend(rhs.targets);
    }
}

impl Extend<InterceptionTarget> for HookSet {
    fn extend<I: IntoIterator<Item = InterceptionTarget>>(&mut self, iter: I) {
        self.targets.extend(iter);
    }
}

impl FromIterator<InterceptionTarget> for HookSet {
    fn from_iter<I: IntoIterator<Item = InterceptionTarget>>(iter: I) -> Self {
        HookSet {
            targets: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for HookSet {
    type Item = InterceptionTarget;
    type IntoIter = std::vec::IntoIter<InterceptionTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.into_iter()
    }
}

impl<'a> IntoIterator for &'a HookSet {
    type Item = &'a InterceptionTarget;
    type IntoIter = std::slice::Iter<'a, InterceptionTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chains() {
        let mut hooks = HookSet::new();
        hooks
            .wrap("a", |_call| Ok(()), |_call| Ok(()))
            .wrap_pre("b", |_call| Ok(()))
            .wrap_post("c", |_call| Ok(()))
            .replace_fixed("d", 7);
        assert_eq!(hooks.len(), 4);
        let symbols: Vec<&str> = hooks.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn union_preserves_order() {
        let mut left = HookSet::new();
        left.wrap_pre("first", |_call| Ok(()));
        let mut right = HookSet::new();
        right.wrap_pre("second", |_call| Ok(()));
        let combined = left | right;
        let symbols: Vec<&str> = combined.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["first", "second"]);
    }

    #[test]
    fn collect_from_iterator() {
        let mut hooks = HookSet::new();
        hooks.wrap_pre("x", |_call| Ok(())).replace_fixed("y", 0);
        let rebuilt: HookSet = hooks.clone().into_iter().collect();
        assert_eq!(rebuilt.len(), 2);
    }

    #[test]
    fn action_shapes() {
        let mut hooks = HookSet::new();
        hooks.wrap_pre("p", |_call| Ok(())).replace_fixed("r", 1);
        let mut iter = hooks.iter();
        match &iter.next().unwrap().action {
            HookAction::Wrap { pre, post } => {
                assert!(pre.is_some());
                assert!(post.is_none());
            }
            HookAction::Replace { .. } => panic!("expected a wrap"),
        }
        assert!(matches!(
            iter.next().unwrap().action,
            HookAction::Replace { .. }
        ));
    }
}
