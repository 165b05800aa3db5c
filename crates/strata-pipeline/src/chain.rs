//! Ordered stage chains and branches.
//!
//! A [`Chain`] is an ordered list of nodes. Each node is either a stage or a
//! branch that picks one of two sub-chains at execution time. Chains are
//! built with consuming methods and handed to [`Pipeline::branch`] (or the
//! builder) as branch arms.
//!
//! [`Pipeline::branch`]: crate::Pipeline::branch

use crate::context::Context;
use crate::stage::Stage;
use std::sync::Arc;

/// A fallible predicate over the execution context.
pub type Predicate = Arc<dyn Fn(&Context) -> anyhow::Result<bool> + Send + Sync>;

/// What happens after a branch's chosen sub-chain runs out of stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BranchMode {
    /// The parent chain continues with the node after the branch.
    #[default]
    Rejoin,
    /// The chosen sub-chain is the end of the inbound path.
    Terminal,
}

/// A named fork between two sub-chains.
#[derive(Clone)]
pub(crate) struct Branch {
    name: String,
    predicate: Predicate,
    on_true: Chain,
    on_false: Chain,
    mode: BranchMode,
}

impl Branch {
    pub(crate) fn new(
        name: String,
        predicate: Predicate,
        on_true: Chain,
        on_false: Chain,
        mode: BranchMode,
    ) -> Self {
        Self {
            name,
            predicate,
            on_true,
            on_false,
            mode,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) const fn mode(&self) -> BranchMode {
        self.mode
    }

    pub(crate) fn evaluate(&self, ctx: &Context) -> anyhow::Result<bool> {
        (self.predicate)(ctx)
    }

    pub(crate) fn arm(&self, taken: bool) -> &Chain {
        if taken {
            &self.on_true
        } else {
            &self.on_false
        }
    }
}

impl std::fmt::Debug for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Branch")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("on_true", &self.on_true)
            .field("on_false", &self.on_false)
            .finish_non_exhaustive()
    }
}

/// A node of a chain.
#[derive(Clone)]
pub(crate) enum Node {
    Stage(Arc<dyn Stage>),
    Branch(Branch),
}

impl Node {
    pub(crate) fn name(&self) -> &str {
        match self {
            Self::Stage(stage) => stage.name(),
            Self::Branch(branch) => branch.name(),
        }
    }

    /// Number of stages in this node, counting both arms of a branch.
    pub(crate) fn stage_count(&self) -> usize {
        match self {
            Self::Stage(_) => 1,
            Self::Branch(branch) => {
                branch.on_true.stage_count() + branch.on_false.stage_count()
            }
        }
    }

    /// Whether this node or anything nested in it has an empty name.
    pub(crate) fn has_empty_name(&self) -> bool {
        match self {
            Self::Stage(stage) => stage.name().is_empty(),
            Self::Branch(branch) => {
                branch.name.is_empty()
                    || branch.on_true.has_empty_name()
                    || branch.on_false.has_empty_name()
            }
        }
    }
}

/// An ordered list of stages and branches.
///
/// # Example
///
/// ```
/// use strata_pipeline::{Chain, FnStage};
///
/// let admin = Chain::new()
///     .stage(FnStage::new("audit"))
///     .stage(FnStage::new("admin-handler"));
///
/// assert_eq!(admin.len(), 2);
/// assert_eq!(admin.stage_names(), vec!["audit", "admin-handler"]);
/// ```
#[derive(Clone, Default)]
pub struct Chain {
    nodes: Vec<Node>,
}

impl Chain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage<S: Stage>(mut self, stage: S) -> Self {
        self.nodes.push(Node::Stage(Arc::new(stage)));
        self
    }

    /// Appends a shared stage.
    ///
    /// The same stage instance may appear in several chains.
    #[must_use]
    pub fn shared(mut self, stage: Arc<dyn Stage>) -> Self {
        self.nodes.push(Node::Stage(stage));
        self
    }

    /// Appends a rejoining branch with an infallible predicate.
    #[must_use]
    pub fn branch<P>(
        self,
        name: impl Into<String>,
        predicate: P,
        on_true: Chain,
        on_false: Chain,
    ) -> Self
    where
        P: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.try_branch(name, move |ctx| Ok(predicate(ctx)), on_true, on_false)
    }

    /// Appends a rejoining branch with a fallible predicate.
    #[must_use]
    pub fn try_branch<P>(
        self,
        name: impl Into<String>,
        predicate: P,
        on_true: Chain,
        on_false: Chain,
    ) -> Self
    where
        P: Fn(&Context) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.fork(name, predicate, on_true, on_false, BranchMode::Rejoin)
    }

    /// Appends a terminal branch with an infallible predicate.
    ///
    /// Nodes after a terminal branch are never entered.
    #[must_use]
    pub fn branch_terminal<P>(
        self,
        name: impl Into<String>,
        predicate: P,
        on_true: Chain,
        on_false: Chain,
    ) -> Self
    where
        P: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.try_branch_terminal(name, move |ctx| Ok(predicate(ctx)), on_true, on_false)
    }

    /// Appends a terminal branch with a fallible predicate.
    #[must_use]
    pub fn try_branch_terminal<P>(
        self,
        name: impl Into<String>,
        predicate: P,
        on_true: Chain,
        on_false: Chain,
    ) -> Self
    where
        P: Fn(&Context) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.fork(name, predicate, on_true, on_false, BranchMode::Terminal)
    }

    fn fork<P>(
        mut self,
        name: impl Into<String>,
        predicate: P,
        on_true: Chain,
        on_false: Chain,
        mode: BranchMode,
    ) -> Self
    where
        P: Fn(&Context) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.nodes.push(Node::Branch(Branch::new(
            name.into(),
            Arc::new(predicate),
            on_true,
            on_false,
            mode,
        )));
        self
    }

    /// Number of top-level nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the chain has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of stages, counting every stage nested in branches.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.nodes.iter().map(Node::stage_count).sum()
    }

    /// Names of every stage in registration order.
    ///
    /// Branch arms are flattened `on_true` first.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(self.stage_count());
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        for node in &self.nodes {
            match node {
                Node::Stage(stage) => names.push(stage.name()),
                Node::Branch(branch) => {
                    branch.on_true.collect_names(names);
                    branch.on_false.collect_names(names);
                }
            }
        }
    }

    pub(crate) fn has_empty_name(&self) -> bool {
        self.nodes.iter().any(Node::has_empty_name)
    }

    pub(crate) fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.nodes.iter().map(Node::name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::FnStage;
    use crate::testing::empty_request;

    fn stages(names: &[&str]) -> Chain {
        names
            .iter()
            .fold(Chain::new(), |chain, name| chain.stage(FnStage::new(*name)))
    }

    #[test]
    fn test_empty_chain() {
        let chain = Chain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.stage_count(), 0);
        assert!(chain.stage_names().is_empty());
    }

    #[test]
    fn test_branch_counts_both_arms() {
        let chain = stages(&["a"]).branch(
            "split",
            |_| true,
            stages(&["b1", "b2"]),
            stages(&["c1"]),
        );
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.stage_count(), 4);
        assert_eq!(chain.stage_names(), vec!["a", "b1", "b2", "c1"]);
    }

    #[test]
    fn test_nested_branches_flatten() {
        let inner = Chain::new().branch("inner", |_| false, stages(&["x"]), stages(&["y"]));
        let chain = Chain::new().branch("outer", |_| true, inner, stages(&["z"]));
        assert_eq!(chain.stage_names(), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_empty_name_detection() {
        assert!(!stages(&["a", "b"]).has_empty_name());
        assert!(stages(&["a", ""]).has_empty_name());

        let unnamed_branch = Chain::new().branch("", |_| true, Chain::new(), Chain::new());
        assert!(unnamed_branch.has_empty_name());

        let nested = Chain::new().branch("ok", |_| true, Chain::new(), stages(&[""]));
        assert!(nested.has_empty_name());
    }

    #[test]
    fn test_branch_arm_selection() {
        let chain = Chain::new().branch(
            "by-path",
            |ctx| ctx.path().starts_with("/admin"),
            stages(&["admin"]),
            stages(&["public"]),
        );
        let Node::Branch(branch) = &chain.nodes()[0] else {
            panic!("expected a branch node");
        };

        let admin = Context::new(empty_request("/admin/users"));
        let public = Context::new(empty_request("/health"));

        assert!(branch.evaluate(&admin).unwrap());
        assert!(!branch.evaluate(&public).unwrap());
        assert_eq!(branch.arm(true).stage_names(), vec!["admin"]);
        assert_eq!(branch.arm(false).stage_names(), vec!["public"]);
        assert_eq!(branch.mode(), BranchMode::Rejoin);
    }

    #[test]
    fn test_terminal_branch_mode() {
        let chain = Chain::new().branch_terminal(
            "map-when",
            |_| true,
            stages(&["only"]),
            Chain::new(),
        );
        let Node::Branch(branch) = &chain.nodes()[0] else {
            panic!("expected a branch node");
        };
        assert_eq!(branch.mode(), BranchMode::Terminal);
    }

    #[test]
    fn test_fallible_terminal_branch() {
        let chain = Chain::new().try_branch_terminal(
            "map-when",
            |_| Err(anyhow::anyhow!("no route")),
            stages(&["only"]),
            Chain::new(),
        );
        let Node::Branch(branch) = &chain.nodes()[0] else {
            panic!("expected a branch node");
        };
        assert_eq!(branch.mode(), BranchMode::Terminal);
        let ctx = Context::new(empty_request("/"));
        assert!(branch.evaluate(&ctx).is_err());
    }

    #[test]
    fn test_debug_lists_node_names() {
        let chain = stages(&["a"]).branch("split", |_| true, Chain::new(), Chain::new());
        assert_eq!(format!("{chain:?}"), r#"["a", "split"]"#);
    }
}
