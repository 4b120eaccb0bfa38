//! Single-linkage grouping of points closer than a cutoff distance.

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::Point3;

/// Disjoint sets over `0..n` whose representative is always the smallest member.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    /// Returns `true` if the two elements were in different sets.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        let (keep, absorb) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[absorb] = keep;
        true
    }

    /// Members of every set, each ascending, sets ordered by their smallest member.
    pub fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut slot_of_root = vec![usize::MAX; self.parent.len()];
        for i in 0..self.parent.len() {
            let root = self.find(i);
            if slot_of_root[root] == usize::MAX {
                slot_of_root[root] = groups.len();
                groups.push(Vec::new());
            }
            groups[slot_of_root[root]].push(i);
        }
        groups
    }
}

/// Groups points connected by chains of pairwise distances `<= cutoff`.
///
/// Groups are returned as ascending index lists ordered by their smallest index, so the result
/// depends only on the point order, never on kd-tree traversal order. Coincident points are
/// linked directly and enter the kd-tree once.
pub fn link_within(points: &[Point3<f64>], cutoff: f64) -> Vec<Vec<usize>> {
    let mut sets = UnionFind::new(points.len());
    if points.len() < 2 || cutoff.is_nan() || cutoff < 0.0 {
        return sets.groups();
    }

    let coords: Vec<[f64; 3]> = points.iter().map(|p| [p.x, p.y, p.z]).collect();
    let mut order: Vec<usize> = (0..coords.len()).collect();
    order.sort_by(|&a, &b| {
        let (ca, cb) = (&coords[a], &coords[b]);
        ca[0]
            .total_cmp(&cb[0])
            .then(ca[1].total_cmp(&cb[1]))
            .then(ca[2].total_cmp(&cb[2]))
    });

    let mut unique: Vec<[f64; 3]> = Vec::new();
    let mut owners: Vec<usize> = Vec::new();
    for &i in &order {
        match unique.last() {
            Some(last) if *last == coords[i] => {
                if let Some(&owner) = owners.last() {
                    sets.union(owner, i);
                }
            }
            _ => {
                unique.push(coords[i]);
                owners.push(i);
            }
        }
    }
    if unique.len() < 2 {
        return sets.groups();
    }

    let tree: ImmutableKdTree<f64, 3> = ImmutableKdTree::new_from_slice(&unique);
    let cutoff_sq = cutoff * cutoff;
    // The kd-tree query is widened slightly; membership is decided by the exact test below.
    let query_sq = cutoff_sq * (1.0 + 1e-9) + f64::MIN_POSITIVE;

    for (u, query) in unique.iter().enumerate() {
        for neighbour in tree.within_unsorted::<SquaredEuclidean>(query, query_sq) {
            let v = neighbour.item as usize;
            if v > u && (points[owners[u]] - points[owners[v]]).norm_squared() <= cutoff_sq {
                sets.union(owners[u], owners[v]);
            }
        }
    }
    sets.groups()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_keeps_smallest_member_as_root() {
        let mut uf = UnionFind::new(5);
        assert!(uf.union(4, 2));
        assert!(uf.union(2, 3));
        assert!(!uf.union(3, 4));
        assert_eq!(uf.find(4), 2);
        assert_eq!(uf.groups(), vec![vec![0], vec![1], vec![2, 3, 4]]);
    }

    #[test]
    fn link_within_chains_transitively() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        assert_eq!(link_within(&points, 1.0), vec![vec![0, 2, 3], vec![1]]);
    }

    #[test]
    fn link_within_treats_cutoff_as_inclusive() {
        let points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 1.7, 0.0)];
        assert_eq!(link_within(&points, 1.7), vec![vec![0, 1]]);
        assert_eq!(link_within(&points, 1.69), vec![vec![0], vec![1]]);
    }

    #[test]
    fn link_within_handles_trivial_inputs() {
        assert!(link_within(&[], 1.0).is_empty());
        assert_eq!(link_within(&[Point3::origin()], 1.0), vec![vec![0]]);
    }

    #[test]
    fn link_within_groups_many_coincident_points() {
        let points = vec![Point3::new(4.0, 4.0, 4.0); 40];
        let expected: Vec<usize> = (0..40).collect();
        assert_eq!(link_within(&points, 1.7), vec![expected]);
    }

    #[test]
    fn link_within_handles_many_points_sharing_one_axis_value() {
        let chained: Vec<Point3<f64>> = (0..40)
            .map(|i| Point3::new(4.0, i as f64 * 0.5, 0.0))
            .collect();
        let expected: Vec<usize> = (0..40).collect();
        assert_eq!(link_within(&chained, 1.7), vec![expected]);

        let spread: Vec<Point3<f64>> = (0..40)
            .map(|i| Point3::new(4.0, i as f64 * 10.0, 0.0))
            .collect();
        let singletons: Vec<Vec<usize>> = (0..40).map(|i| vec![i]).collect();
        assert_eq!(link_within(&spread, 1.7), singletons);
    }

    #[test]
    fn link_within_joins_duplicates_with_their_neighbours() {
        let mut points = vec![Point3::new(0.0, 0.0, 0.0); 35];
        points.push(Point3::new(1.0, 0.0, 0.0));
        points.push(Point3::new(9.0, 0.0, 0.0));
        let groups = link_within(&points, 1.0);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], (0..36).collect::<Vec<_>>());
        assert_eq!(groups[1], vec![36]);
    }
}
