// Equivalence rewrites - the eight transformations over algebra trees
//
// Every rule is a total function tree -> tree that preserves the result
// set. Traversal is bottom-up (post-order): children are transformed
// before the node itself. Rules never alias their input; they consume
// the tree and build a fresh one. Attribute placement problems degrade
// to warnings, never errors: a rule that cannot prove a rewrite safe
// leaves the match site unchanged.

use crate::algebra::PlanNode;
use crate::condition::Condition;
use std::collections::HashSet;

/// Identifier of one rewrite rule; also the alphabet of the genetic
/// search chromosomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleId {
    /// Split a conjunctive selection into a chain of single-atom selects.
    DecomposeSelections,
    /// Swap two stacked selections.
    SwapSelections,
    /// Collapse a selection chain into one conjunctive selection.
    CombineSelections,
    /// Distribute projections over joins, tree-wide.
    PushProjections,
    /// Distribute selections over joins, tree-wide.
    PushSelections,
    /// Turn a selection over a cartesian product into a theta-join.
    CartesianToJoin,
    /// Swap the operands of every join.
    CommuteJoins,
    /// Rotate left-deep join pairs into right-deep shape.
    AssociateJoins,
}

impl RuleId {
    pub const ALL: [RuleId; 8] = [
        RuleId::DecomposeSelections,
        RuleId::SwapSelections,
        RuleId::CombineSelections,
        RuleId::PushProjections,
        RuleId::PushSelections,
        RuleId::CartesianToJoin,
        RuleId::CommuteJoins,
        RuleId::AssociateJoins,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RuleId::DecomposeSelections => "decompose-selections",
            RuleId::SwapSelections => "swap-selections",
            RuleId::CombineSelections => "combine-selections",
            RuleId::PushProjections => "push-projections",
            RuleId::PushSelections => "push-selections",
            RuleId::CartesianToJoin => "cartesian-to-join",
            RuleId::CommuteJoins => "commute-joins",
            RuleId::AssociateJoins => "associate-joins",
        }
    }

    pub fn apply(self, tree: PlanNode) -> PlanNode {
        match self {
            RuleId::DecomposeSelections => decompose_selections(tree),
            RuleId::SwapSelections => swap_selections(tree),
            RuleId::CombineSelections => combine_selections(tree),
            RuleId::PushProjections => push_projections(tree),
            RuleId::PushSelections => push_selections(tree),
            RuleId::CartesianToJoin => cartesian_to_join(tree),
            RuleId::CommuteJoins => commute_joins(tree),
            RuleId::AssociateJoins => associate_joins(tree),
        }
    }
}

/// Which side of a binary operator an atom or attribute belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
    /// References attributes of both sides, or an ambiguous qualifier.
    Both,
    /// No resolvable attribute reference.
    Unknown,
}

fn qualifier(attr: &str) -> Option<String> {
    attr.split_once('.').map(|(q, _)| q.to_lowercase())
}

/// Classify a single attribute reference against the two scopes.
/// Unqualified references are unresolvable by design: the front-end
/// rewrites every alias to `relation.attr` before rules run.
fn attribute_side(attr: &str, left: &HashSet<String>, right: &HashSet<String>) -> Side {
    let Some(qualifier) = qualifier(attr) else {
        return Side::Unknown;
    };
    match (left.contains(&qualifier), right.contains(&qualifier)) {
        (true, true) => {
            tracing::warn!(attribute = attr, "attribute resolves to both join sides");
            Side::Both
        }
        (true, false) => Side::Left,
        (false, true) => Side::Right,
        (false, false) => Side::Unknown,
    }
}

/// Classify a whole atom: Left/Right only when every referenced
/// attribute resolves to that single side.
fn atom_side(atom: &Condition, left: &HashSet<String>, right: &HashSet<String>) -> Side {
    let attrs = atom.attributes();
    if attrs.is_empty() {
        return Side::Unknown;
    }

    let mut any_left = false;
    let mut any_right = false;
    for attr in &attrs {
        match attribute_side(attr, left, right) {
            Side::Left => any_left = true,
            Side::Right => any_right = true,
            Side::Both => return Side::Both,
            Side::Unknown => return Side::Unknown,
        }
    }
    match (any_left, any_right) {
        (true, false) => Side::Left,
        (false, true) => Side::Right,
        (true, true) => Side::Both,
        (false, false) => Side::Unknown,
    }
}

fn wrap_select(atoms: Vec<Condition>, node: PlanNode) -> PlanNode {
    match Condition::conjoin(atoms) {
        Some(condition) => PlanNode::select(condition, node),
        None => node,
    }
}

/// Re-wrap a sigma chain (collected top-down) around a node.
fn rewrap_sigmas(sigmas: Vec<Condition>, node: PlanNode) -> PlanNode {
    sigmas
        .into_iter()
        .rev()
        .fold(node, |acc, condition| PlanNode::select(condition, acc))
}

// ----------------------------------------------------------------------------
// R1 - Conjunctive selection decomposition
// ----------------------------------------------------------------------------

/// Split every selection whose condition is an AND of `k >= 2` atoms
/// into a chain of `k` single-atom selections. The chain keeps the
/// in-order flattening of the AND tree, first atom on top. OR atoms are
/// indivisible.
pub fn decompose_selections(node: PlanNode) -> PlanNode {
    let node = node.map_inputs(&mut decompose_selections);
    match node {
        PlanNode::Select { condition, input } => {
            let atoms: Vec<Condition> =
                condition.conjuncts().into_iter().cloned().collect();
            if atoms.len() < 2 {
                return PlanNode::Select { condition, input };
            }
            let mut tree = *input;
            for atom in atoms.into_iter().rev() {
                tree = PlanNode::select(atom, tree);
            }
            tree
        }
        other => other,
    }
}

// ----------------------------------------------------------------------------
// R2 - Selection commutativity
// ----------------------------------------------------------------------------

/// Swap the conditions of every stacked selection pair. Whether the
/// reordering pays off is the enumerator's call.
pub fn swap_selections(node: PlanNode) -> PlanNode {
    let node = node.map_inputs(&mut swap_selections);
    match node {
        PlanNode::Select { condition, input } => match *input {
            PlanNode::Select {
                condition: inner,
                input: grandchild,
            } => PlanNode::select(inner, PlanNode::select(condition, *grandchild)),
            other => PlanNode::select(condition, other),
        },
        other => other,
    }
}

// ----------------------------------------------------------------------------
// R3 - Combine selections
// ----------------------------------------------------------------------------

/// Inverse of R1: collapse a selection chain into one conjunctive
/// selection. Bottom-up traversal folds the whole chain in a single
/// pass, which makes the rule idempotent.
pub fn combine_selections(node: PlanNode) -> PlanNode {
    let node = node.map_inputs(&mut combine_selections);
    match node {
        PlanNode::Select { condition, input } => match *input {
            PlanNode::Select {
                condition: inner,
                input: grandchild,
            } => PlanNode::Select {
                condition: Condition::and(condition, inner),
                input: grandchild,
            },
            other => PlanNode::select(condition, other),
        },
        other => other,
    }
}

// ----------------------------------------------------------------------------
// R4 - Cartesian product + selection => join
// ----------------------------------------------------------------------------

/// Turn a selection over a cartesian product into a theta-join carrying
/// the atoms that reference both sides. Single-side atoms move below
/// the join; atoms that resolve nowhere stay above it. Without at least
/// one cross-side atom the site is left unchanged: a join needs a
/// condition.
pub fn cartesian_to_join(node: PlanNode) -> PlanNode {
    let node = node.map_inputs(&mut cartesian_to_join);
    let (condition, input) = match node {
        PlanNode::Select { condition, input } => (condition, input),
        other => return other,
    };
    let (left, right) = match *input {
        PlanNode::CartesianProduct { left, right } => (left, right),
        other => return PlanNode::select(condition, other),
    };

    let left_scope = left.name_scope();
    let right_scope = right.name_scope();

    let mut left_atoms = Vec::new();
    let mut right_atoms = Vec::new();
    let mut cross_atoms = Vec::new();
    let mut residual_atoms = Vec::new();
    for atom in condition.conjuncts() {
        match atom_side(atom, &left_scope, &right_scope) {
            Side::Left => left_atoms.push(atom.clone()),
            Side::Right => right_atoms.push(atom.clone()),
            Side::Both => cross_atoms.push(atom.clone()),
            Side::Unknown => residual_atoms.push(atom.clone()),
        }
    }

    let Some(theta) = Condition::conjoin(cross_atoms) else {
        return PlanNode::Select {
            condition,
            input: Box::new(PlanNode::CartesianProduct { left, right }),
        };
    };

    let new_left = wrap_select(left_atoms, *left);
    let new_right = wrap_select(right_atoms, *right);
    let join = PlanNode::join(theta, new_left, new_right);
    wrap_select(residual_atoms, join)
}

// ----------------------------------------------------------------------------
// R5 - Join commutativity
// ----------------------------------------------------------------------------

/// Swap the operands of every theta-join and natural join. The
/// condition is unchanged; hash joins keep their build/probe order.
pub fn commute_joins(node: PlanNode) -> PlanNode {
    let node = node.map_inputs(&mut commute_joins);
    match node {
        PlanNode::Join {
            condition,
            left,
            right,
        } => PlanNode::Join {
            condition,
            left: right,
            right: left,
        },
        PlanNode::NaturalJoin { left, right } => PlanNode::NaturalJoin {
            left: right,
            right: left,
        },
        other => other,
    }
}

// ----------------------------------------------------------------------------
// R6 - Join associativity
// ----------------------------------------------------------------------------

/// Rotate `(A join B) join C` into `A join (B join C)` when the
/// combined condition atoms can be partitioned so that each join only
/// references attributes reachable below it. Sites where the partition
/// fails are left unchanged; natural joins and hash joins are not
/// rotated.
pub fn associate_joins(node: PlanNode) -> PlanNode {
    let node = node.map_inputs(&mut associate_joins);
    let (condition, left, right) = match node {
        PlanNode::Join {
            condition,
            left,
            right,
        } => (condition, left, right),
        other => return other,
    };
    let (inner_condition, a, b) = match *left {
        PlanNode::Join {
            condition,
            left,
            right,
        } => (condition, left, right),
        other => {
            return PlanNode::Join {
                condition,
                left: Box::new(other),
                right,
            };
        }
    };

    let rebuild = |condition: Condition, inner: Condition, a, b, c| PlanNode::Join {
        condition,
        left: Box::new(PlanNode::Join {
            condition: inner,
            left: a,
            right: b,
        }),
        right: c,
    };

    let scope_bc: HashSet<String> = b
        .name_scope()
        .union(&right.name_scope())
        .cloned()
        .collect();
    let scope_abc: HashSet<String> =
        scope_bc.union(&a.name_scope()).cloned().collect();

    let atoms: Vec<Condition> = inner_condition
        .conjuncts()
        .into_iter()
        .chain(condition.conjuncts())
        .cloned()
        .collect();

    let mut inner_atoms = Vec::new();
    let mut outer_atoms = Vec::new();
    for atom in &atoms {
        let attrs = atom.attributes();
        let within = |scope: &HashSet<String>| {
            attrs
                .iter()
                .all(|attr| qualifier(attr).is_some_and(|q| scope.contains(&q)))
        };
        if attrs.is_empty() {
            outer_atoms.push(atom.clone());
        } else if within(&scope_bc) {
            inner_atoms.push(atom.clone());
        } else if within(&scope_abc) {
            outer_atoms.push(atom.clone());
        } else {
            // Unresolvable reference: the rotation cannot be proven safe.
            return rebuild(condition, inner_condition, a, b, right);
        }
    }

    let (Some(outer), Some(inner)) = (
        Condition::conjoin(outer_atoms),
        Condition::conjoin(inner_atoms),
    ) else {
        return rebuild(condition, inner_condition, a, b, right);
    };

    PlanNode::Join {
        condition: outer,
        left: a,
        right: Box::new(PlanNode::Join {
            condition: inner,
            left: b,
            right,
        }),
    }
}

// ----------------------------------------------------------------------------
// R7 - Selection distribution over join
// ----------------------------------------------------------------------------

/// Push the atoms of a selection over a join down to the side they
/// reference, repeatedly: an atom keeps descending through joins and
/// through projections that retain its attributes until it rests
/// directly above the subtree that supplies it. Atoms spanning both
/// sides, with ambiguous qualifiers, or with no resolvable attributes
/// stay above the join.
pub fn push_selections(node: PlanNode) -> PlanNode {
    let node = node.map_inputs(&mut push_selections);
    let (condition, input) = match node {
        PlanNode::Select { condition, input } => (condition, input),
        other => return other,
    };
    match *input {
        PlanNode::Join {
            condition: theta,
            left,
            right,
        } => distribute_selection(condition, Some(theta), *left, *right),
        PlanNode::NaturalJoin { left, right } => {
            distribute_selection(condition, None, *left, *right)
        }
        // Selection commutes with a projection that keeps every
        // attribute the condition reads.
        PlanNode::Project {
            attributes,
            input: inner,
        } if projection_covers(&attributes, &condition) => PlanNode::project(
            attributes,
            push_selections(PlanNode::select(condition, *inner)),
        ),
        other => PlanNode::select(condition, other),
    }
}

fn distribute_selection(
    condition: Condition,
    theta: Option<Condition>,
    left: PlanNode,
    right: PlanNode,
) -> PlanNode {
    let left_scope = left.name_scope();
    let right_scope = right.name_scope();

    let mut left_atoms = Vec::new();
    let mut right_atoms = Vec::new();
    let mut residual_atoms = Vec::new();
    for atom in condition.conjuncts() {
        match atom_side(atom, &left_scope, &right_scope) {
            Side::Left => left_atoms.push(atom.clone()),
            Side::Right => right_atoms.push(atom.clone()),
            Side::Both | Side::Unknown => residual_atoms.push(atom.clone()),
        }
    }

    let new_left = match Condition::conjoin(left_atoms) {
        Some(pushed) => push_selections(PlanNode::select(pushed, left)),
        None => left,
    };
    let new_right = match Condition::conjoin(right_atoms) {
        Some(pushed) => push_selections(PlanNode::select(pushed, right)),
        None => right,
    };
    let join = remake_join(theta, new_left, new_right);
    wrap_select(residual_atoms, join)
}

/// True when the projection keeps every attribute the condition reads.
fn projection_covers(attributes: &[String], condition: &Condition) -> bool {
    attributes.iter().any(|attr| attr == "*")
        || condition
            .attributes()
            .iter()
            .all(|attr| attributes.contains(attr))
}

/// Rebuild a join node from its optional theta condition.
fn remake_join(theta: Option<Condition>, left: PlanNode, right: PlanNode) -> PlanNode {
    match theta {
        Some(condition) => PlanNode::join(condition, left, right),
        None => PlanNode::natural_join(left, right),
    }
}

// ----------------------------------------------------------------------------
// R8 - Projection distribution over join (and push-pi)
// ----------------------------------------------------------------------------

/// Tree-wide projection push-down: applies the distribution at every
/// PROJECT node, bottom-up, and re-runs on the output until the
/// projections created on the join sides stop moving. The fixpoint is
/// what makes the rule idempotent.
pub fn push_projections(node: PlanNode) -> PlanNode {
    let node = node.map_inputs(&mut push_projections);
    match node {
        project @ PlanNode::Project { .. } => {
            let result = distribute_projection_over_join(project.clone());
            if result == project {
                result
            } else {
                push_projections(result)
            }
        }
        other => other,
    }
}

/// One application of the projection distribution at a PROJECT site.
/// The projection looks through a chain of selections to find a join;
/// the selections are preserved in the output. Each side of the join
/// receives a projection of the attributes it supplies plus the
/// attributes the join condition and the skipped selections still need;
/// the outer projection is kept only when such support attributes were
/// added. Ambiguous attributes go to the left side with a warning.
pub fn distribute_projection_over_join(node: PlanNode) -> PlanNode {
    let (attributes, input) = match node {
        PlanNode::Project { attributes, input } => (attributes, input),
        other => return other,
    };

    // A wildcard projection cannot be partitioned.
    if attributes.iter().any(|attr| attr == "*" || attr.ends_with(".*")) {
        return PlanNode::Project { attributes, input };
    }

    let mut sigmas = Vec::new();
    let mut cursor = *input;
    while let PlanNode::Select {
        condition,
        input: inner,
    } = cursor
    {
        sigmas.push(condition);
        cursor = *inner;
    }

    let (theta, left, right) = match cursor {
        PlanNode::Join {
            condition,
            left,
            right,
        } => (Some(condition), *left, *right),
        PlanNode::NaturalJoin { left, right } => (None, *left, *right),
        other => {
            // No join below: put the site back together unchanged.
            return PlanNode::Project {
                attributes,
                input: Box::new(rewrap_sigmas(sigmas, other)),
            };
        }
    };

    let left_scope = left.name_scope();
    let right_scope = right.name_scope();

    // Attributes the pushed-down projections must keep alive: the join
    // condition plus every selection the projection skipped over.
    let mut support = theta.as_ref().map(|c| c.attributes()).unwrap_or_default();
    for sigma in &sigmas {
        for attr in sigma.attributes() {
            if !support.contains(&attr) {
                support.push(attr);
            }
        }
    }

    let mut l1: Vec<String> = Vec::new();
    let mut l2: Vec<String> = Vec::new();
    for attr in &attributes {
        match attribute_side(attr, &left_scope, &right_scope) {
            Side::Left => l1.push(attr.clone()),
            Side::Right => l2.push(attr.clone()),
            Side::Both | Side::Unknown => {
                tracing::warn!(
                    attribute = attr.as_str(),
                    "ambiguous projection attribute assigned to left side"
                );
                l1.push(attr.clone());
            }
        }
    }

    let mut l3: Vec<String> = Vec::new();
    let mut l4: Vec<String> = Vec::new();
    for attr in &support {
        match attribute_side(attr, &left_scope, &right_scope) {
            Side::Left if !l1.contains(attr) && !l3.contains(attr) => l3.push(attr.clone()),
            Side::Right if !l2.contains(attr) && !l4.contains(attr) => l4.push(attr.clone()),
            _ => {}
        }
    }

    let left_list: Vec<String> = l1.iter().chain(l3.iter()).cloned().collect();
    let right_list: Vec<String> = l2.iter().chain(l4.iter()).cloned().collect();

    // A side is only wrapped when it does not already carry exactly the
    // projection this pass would add; re-running the rule then leaves
    // the site unchanged.
    let already_pushed = |side: &PlanNode, list: &[String]| match side {
        PlanNode::Project { attributes, .. } => attributes.as_slice() == list,
        _ => false,
    };
    let wrap_left = !left_list.is_empty() && !already_pushed(&left, &left_list);
    let wrap_right = !right_list.is_empty() && !already_pushed(&right, &right_list);
    if !wrap_left && !wrap_right {
        return PlanNode::Project {
            attributes,
            input: Box::new(rewrap_sigmas(sigmas, remake_join(theta, left, right))),
        };
    }

    let new_left = if wrap_left {
        PlanNode::project(left_list, left)
    } else {
        left
    };
    let new_right = if wrap_right {
        PlanNode::project(right_list, right)
    } else {
        right
    };

    let rebuilt = rewrap_sigmas(sigmas, remake_join(theta, new_left, new_right));
    if l3.is_empty() && l4.is_empty() {
        rebuilt
    } else {
        PlanNode::Project {
            attributes,
            input: Box::new(rebuilt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> PlanNode {
        PlanNode::table(name, None)
    }

    fn leaf(text: &str) -> Condition {
        Condition::leaf(text)
    }

    #[test]
    fn test_decompose_produces_single_atom_chain() {
        let tree = PlanNode::select(
            Condition::and(
                leaf("a = 1"),
                Condition::and(leaf("b = 2"), leaf("c = 3")),
            ),
            table("t"),
        );

        let result = decompose_selections(tree);
        let rendered = result.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "SELECT: a = 1");
        assert_eq!(lines[1], "  SELECT: b = 2");
        assert_eq!(lines[2], "    SELECT: c = 3");
        assert_eq!(lines[3], "      TABLE: t");
    }

    #[test]
    fn test_decompose_keeps_or_atoms_whole() {
        let tree = PlanNode::select(
            Condition::and(Condition::or(leaf("a = 1"), leaf("b = 2")), leaf("c = 3")),
            table("t"),
        );

        let result = decompose_selections(tree);
        match &result {
            PlanNode::Select { condition, input } => {
                assert!(matches!(condition, Condition::Or(_, _)));
                assert!(matches!(**input, PlanNode::Select { .. }));
            }
            _ => panic!("expected SELECT root"),
        }
    }

    #[test]
    fn test_decompose_is_idempotent() {
        let tree = PlanNode::select(
            Condition::and(leaf("a = 1"), leaf("b = 2")),
            table("t"),
        );
        let once = decompose_selections(tree);
        let twice = decompose_selections(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_combine_inverts_decompose() {
        let original = PlanNode::select(
            Condition::and(leaf("a = 1"), leaf("b = 2")),
            table("t"),
        );
        let round_trip = combine_selections(decompose_selections(original.clone()));
        assert_eq!(round_trip, original);
    }

    #[test]
    fn test_combine_is_idempotent() {
        let chain = PlanNode::select(
            leaf("a = 1"),
            PlanNode::select(leaf("b = 2"), PlanNode::select(leaf("c = 3"), table("t"))),
        );
        let once = combine_selections(chain);
        let twice = combine_selections(once.clone());
        assert_eq!(once, twice);

        match once {
            PlanNode::Select { condition, .. } => {
                assert_eq!(condition.conjuncts().len(), 3);
            }
            _ => panic!("expected a single SELECT"),
        }
    }

    #[test]
    fn test_swap_exchanges_stacked_selections() {
        let tree = PlanNode::select(
            leaf("a = 1"),
            PlanNode::select(leaf("b = 2"), table("t")),
        );
        let swapped = swap_selections(tree);
        let rendered = swapped.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "SELECT: b = 2");
        assert_eq!(lines[1], "  SELECT: a = 1");
    }

    #[test]
    fn test_cartesian_to_join_partitions_atoms() {
        let tree = PlanNode::select(
            Condition::and(
                leaf("employees.dept_id = departments.id"),
                Condition::and(leaf("employees.age > 20"), leaf("departments.budget > 5")),
            ),
            PlanNode::cartesian_product(table("employees"), table("departments")),
        );

        let result = cartesian_to_join(tree);
        match &result {
            PlanNode::Join {
                condition,
                left,
                right,
            } => {
                assert_eq!(condition.to_string(), "employees.dept_id = departments.id");
                match (&**left, &**right) {
                    (
                        PlanNode::Select { condition: l, .. },
                        PlanNode::Select { condition: r, .. },
                    ) => {
                        assert_eq!(l.to_string(), "employees.age > 20");
                        assert_eq!(r.to_string(), "departments.budget > 5");
                    }
                    _ => panic!("expected selections pushed to both sides"),
                }
            }
            _ => panic!("expected JOIN root, got {}", result.tag()),
        }
        assert_eq!(result.tables(), vec!["employees", "departments"]);
    }

    #[test]
    fn test_cartesian_without_cross_atoms_is_untouched() {
        let tree = PlanNode::select(
            leaf("employees.age > 20"),
            PlanNode::cartesian_product(table("employees"), table("departments")),
        );
        let result = cartesian_to_join(tree.clone());
        assert_eq!(result, tree);
    }

    #[test]
    fn test_commute_swaps_operands() {
        let tree = PlanNode::join(
            leaf("a.id = b.id"),
            table("a"),
            table("b"),
        );
        let swapped = commute_joins(tree);
        assert_eq!(swapped.tables(), vec!["b", "a"]);
    }

    #[test]
    fn test_associate_rotates_left_deep_pair() {
        let tree = PlanNode::join(
            leaf("b.y = c.y"),
            PlanNode::join(leaf("a.x = b.x"), table("a"), table("b")),
            table("c"),
        );

        let rotated = associate_joins(tree);
        match &rotated {
            PlanNode::Join {
                condition,
                left,
                right,
            } => {
                assert_eq!(condition.to_string(), "a.x = b.x");
                assert!(matches!(**left, PlanNode::Table { .. }));
                match &**right {
                    PlanNode::Join { condition, .. } => {
                        assert_eq!(condition.to_string(), "b.y = c.y");
                    }
                    _ => panic!("expected inner JOIN on the right"),
                }
            }
            _ => panic!("expected JOIN root"),
        }
        assert_eq!(rotated.tables(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_associate_aborts_without_valid_partition() {
        // Both conditions need `a`; nothing can move inside.
        let tree = PlanNode::join(
            leaf("a.y = c.y"),
            PlanNode::join(leaf("a.x = b.x"), table("a"), table("b")),
            table("c"),
        );
        let result = associate_joins(tree.clone());
        assert_eq!(result, tree);
    }

    #[test]
    fn test_push_selections_splits_by_side() {
        let tree = PlanNode::select(
            Condition::and(
                leaf("students.age > 20"),
                Condition::and(
                    leaf("departments.budget > 100000"),
                    leaf("students.dept_id = departments.id"),
                ),
            ),
            PlanNode::join(
                leaf("students.dept_id = departments.id"),
                table("students"),
                table("departments"),
            ),
        );

        let result = push_selections(tree);
        // The spanning atom stays above the join; single-side atoms land
        // directly above their tables.
        match &result {
            PlanNode::Select { condition, input } => {
                assert_eq!(condition.to_string(), "students.dept_id = departments.id");
                match &**input {
                    PlanNode::Join { left, right, .. } => {
                        match (&**left, &**right) {
                            (
                                PlanNode::Select { condition: l, .. },
                                PlanNode::Select { condition: r, .. },
                            ) => {
                                assert_eq!(l.to_string(), "students.age > 20");
                                assert_eq!(r.to_string(), "departments.budget > 100000");
                            }
                            _ => panic!("expected selections above both tables"),
                        }
                    }
                    _ => panic!("expected JOIN under residual SELECT"),
                }
            }
            _ => panic!("expected residual SELECT root"),
        }
    }

    #[test]
    fn test_push_selections_preserves_tables() {
        let tree = PlanNode::select(
            leaf("students.age > 20"),
            PlanNode::join(
                leaf("students.dept_id = departments.id"),
                table("students"),
                table("departments"),
            ),
        );
        let before = tree.tables();
        let result = push_selections(tree);
        assert_eq!(result.tables(), before);
    }

    #[test]
    fn test_distribute_projection_adds_support_columns() {
        let tree = PlanNode::project(
            vec!["students.name".to_string(), "departments.dept_name".to_string()],
            PlanNode::join(
                leaf("students.dept_id = departments.id"),
                table("students"),
                table("departments"),
            ),
        );

        let result = push_projections(tree);
        match &result {
            PlanNode::Project { attributes, input } => {
                assert_eq!(
                    attributes,
                    &vec![
                        "students.name".to_string(),
                        "departments.dept_name".to_string()
                    ]
                );
                match &**input {
                    PlanNode::Join { left, right, .. } => {
                        match (&**left, &**right) {
                            (
                                PlanNode::Project { attributes: l, .. },
                                PlanNode::Project { attributes: r, .. },
                            ) => {
                                assert_eq!(
                                    l,
                                    &vec![
                                        "students.name".to_string(),
                                        "students.dept_id".to_string()
                                    ]
                                );
                                assert_eq!(
                                    r,
                                    &vec![
                                        "departments.dept_name".to_string(),
                                        "departments.id".to_string()
                                    ]
                                );
                            }
                            _ => panic!("expected projections on both join sides"),
                        }
                    }
                    _ => panic!("expected JOIN under outer projection"),
                }
            }
            _ => panic!("expected outer PROJECT to remain"),
        }
    }

    #[test]
    fn test_distribute_projection_drops_redundant_outer() {
        // The join condition only uses projected attributes, so no
        // support columns are added and the outer projection goes away.
        let tree = PlanNode::project(
            vec!["students.id".to_string(), "departments.id".to_string()],
            PlanNode::join(
                leaf("students.id = departments.id"),
                table("students"),
                table("departments"),
            ),
        );

        let result = push_projections(tree);
        assert!(matches!(result, PlanNode::Join { .. }));
    }

    #[test]
    fn test_push_projections_is_idempotent() {
        let tree = PlanNode::project(
            vec!["students.name".to_string(), "departments.dept_name".to_string()],
            PlanNode::select(
                leaf("students.age > 20"),
                PlanNode::join(
                    leaf("students.dept_id = departments.id"),
                    table("students"),
                    table("departments"),
                ),
            ),
        );

        let once = push_projections(tree);
        let twice = push_projections(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_projection_keeps_skipped_selection_attributes() {
        let tree = PlanNode::project(
            vec!["students.name".to_string()],
            PlanNode::select(
                leaf("departments.budget > 100000"),
                PlanNode::join(
                    leaf("students.dept_id = departments.id"),
                    table("students"),
                    table("departments"),
                ),
            ),
        );

        let result = push_projections(tree);
        // departments.budget is only needed by the skipped selection; the
        // right-side projection must keep it alive.
        let rendered = result.render();
        assert!(rendered.contains("departments.budget"));
        match &result {
            PlanNode::Project { input, .. } => {
                assert!(matches!(**input, PlanNode::Select { .. }));
            }
            _ => panic!("expected outer PROJECT"),
        }
    }

    #[test]
    fn test_wildcard_projection_is_not_distributed() {
        let tree = PlanNode::project(
            vec!["*".to_string()],
            PlanNode::join(
                leaf("a.id = b.id"),
                table("a"),
                table("b"),
            ),
        );
        let result = push_projections(tree.clone());
        assert_eq!(result, tree);
    }

    #[test]
    fn test_every_rule_preserves_table_multiset() {
        let tree = PlanNode::project(
            vec!["students.name".to_string(), "projects.project_name".to_string()],
            PlanNode::select(
                Condition::and(
                    leaf("students.age > 20"),
                    leaf("departments.budget > 100000"),
                ),
                PlanNode::join(
                    leaf("students.project_id = projects.id"),
                    PlanNode::join(
                        leaf("students.dept_id = departments.id"),
                        table("students"),
                        table("departments"),
                    ),
                    table("projects"),
                ),
            ),
        );

        let mut expected = tree.tables();
        expected.sort();
        for rule in RuleId::ALL {
            let mut tables = rule.apply(tree.clone()).tables();
            tables.sort();
            assert_eq!(tables, expected, "rule {} changed the table set", rule.name());
        }
    }
}
