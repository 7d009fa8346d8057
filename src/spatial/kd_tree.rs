use crate::error::SpatialError;
use crate::math::point::axis_offset;
use crate::math::{squared_distance, Point};

/// Insertion-order identifier of a point stored in a [`KdTree`].
pub type NodeId = usize;

/// Result of a nearest-neighbour query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest {
    /// Insertion-order identifier of the closest stored point.
    pub index: NodeId,
    /// Squared distance from the query to that point.
    pub squared_distance: f64,
}

#[derive(Debug, Clone)]
struct Node<const D: usize> {
    point: Point<D>,
    depth: usize,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// Incremental k-d tree over `D`-dimensional points.
///
/// Nodes live in a flat arena in insertion order, so a node's slot doubles
/// as the identifier returned by [`KdTree::insert`] and [`KdTree::find_nearest`].
/// The split axis of a node is its depth modulo `D`. Points whose coordinate
/// on that axis is strictly smaller go left, everything else goes right.
///
/// The tree only grows: there is no removal and no rebalancing.
#[derive(Debug, Clone)]
pub struct KdTree<const D: usize> {
    nodes: Vec<Node<D>>,
}

impl<const D: usize> Default for KdTree<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> KdTree<D> {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Creates an empty tree with room for `capacity` points.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Number of stored points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no point has been inserted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the `index`-th inserted point.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::IndexOutOfRange`] if `index >= len()`.
    pub fn point_at(&self, index: NodeId) -> Result<&Point<D>, SpatialError> {
        self.nodes
            .get(index)
            .map(|node| &node.point)
            .ok_or(SpatialError::IndexOutOfRange {
                index,
                len: self.nodes.len(),
            })
    }

    /// Iterates over the stored points in insertion order.
    pub fn points(&self) -> impl ExactSizeIterator<Item = &Point<D>> + '_ {
        self.nodes.iter().map(|node| &node.point)
    }

    /// Depth of the deepest node, counting the root as depth 1.
    #[must_use]
    pub fn height(&self) -> usize {
        self.nodes.iter().map(|node| node.depth + 1).max().unwrap_or(0)
    }

    /// Inserts `point` and returns its identifier, which is always `len() - 1`
    /// after the call.
    pub fn insert(&mut self, point: Point<D>) -> NodeId {
        let id = self.nodes.len();

        let depth = if self.nodes.is_empty() {
            0
        } else {
            let mut current = 0;
            loop {
                let node = &self.nodes[current];
                let go_left = axis_offset(&point, &node.point, node.depth % D) < 0.0;
                let next = if go_left { node.left } else { node.right };
                match next {
                    Some(child) => current = child,
                    None => {
                        let depth = node.depth + 1;
                        let parent = &mut self.nodes[current];
                        if go_left {
                            parent.left = Some(id);
                        } else {
                            parent.right = Some(id);
                        }
                        break depth;
                    }
                }
            }
        };

        self.nodes.push(Node {
            point,
            depth,
            left: None,
            right: None,
        });
        id
    }

    /// Finds the stored point closest to `query`.
    ///
    /// Returns `None` when the tree is empty. Among equidistant points the
    /// first one reached by the search wins, so identical insertion histories
    /// always give identical answers.
    #[must_use]
    pub fn find_nearest(&self, query: &Point<D>) -> Option<Nearest> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut best = Nearest {
            index: 0,
            squared_distance: f64::INFINITY,
        };

        // (node, lower bound on the squared distance from the query to its subtree)
        let mut stack: Vec<(NodeId, f64)> = vec![(0, 0.0)];
        while let Some((id, bound)) = stack.pop() {
            if bound >= best.squared_distance {
                continue;
            }

            let node = &self.nodes[id];
            let dist = squared_distance(query, &node.point);
            if dist < best.squared_distance {
                best = Nearest {
                    index: id,
                    squared_distance: dist,
                };
            }

            let offset = axis_offset(query, &node.point, node.depth % D);
            let (near, far) = if offset < 0.0 {
                (node.left, node.right)
            } else {
                (node.right, node.left)
            };

            // Far side is pushed first so the near side is explored before it.
            if let Some(far) = far {
                stack.push((far, bound.max(offset * offset)));
            }
            if let Some(near) = near {
                stack.push((near, bound));
            }
        }

        Some(best)
    }
}
