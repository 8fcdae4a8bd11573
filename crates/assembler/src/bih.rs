// Bounding interval hierarchy
// Flat-array BIH matching the runtime loader's node layout: each node is
// three u32 words, the split axis lives in the top two bits of the first
// word, clip planes are stored as raw f32 bit patterns. Building
// partitions by spatial median on the longest axis, cuts away empty space
// where the population allows it, and keeps leaves as index ranges into
// the final object ordering.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use vmap_shared::math::AaBox;

use crate::error::Result;

const MAX_TREE_DEPTH: usize = 64;

/// Sentinel for "no split axis chosen yet".
const NO_AXIS: usize = usize::MAX;

/// Access to an object's bounding box, the only capability the builder
/// needs from its input.
pub trait HasBounds {
    fn bounds(&self) -> AaBox;
}

impl HasBounds for AaBox {
    fn bounds(&self) -> AaBox {
        *self
    }
}

impl<T: HasBounds> HasBounds for &T {
    fn bounds(&self) -> AaBox {
        (**self).bounds()
    }
}

#[derive(Clone, Debug)]
pub struct Bih {
    bounds: AaBox,
    tree: Vec<u32>,
    objects: Vec<u32>,
}

impl Bih {
    /// A valid tree over zero objects: one dummy leaf.
    fn empty() -> Self {
        Self {
            bounds: AaBox::default(),
            tree: vec![3 << 30, 0, 0],
            objects: Vec::new(),
        }
    }

    /// Build over the given object ordering. The resulting leaf object
    /// order is deterministic for a given input order, which callers rely
    /// on to correlate objects with their leaf positions.
    pub fn build<T: HasBounds>(prims: &[T], leaf_size: u32) -> Self {
        if prims.is_empty() {
            return Self::empty();
        }

        let prim_bounds: Vec<AaBox> = prims.iter().map(HasBounds::bounds).collect();
        let mut bounds = prim_bounds[0];
        for pb in &prim_bounds[1..] {
            bounds.merge(pb.min);
            bounds.merge(pb.max);
        }

        let mut indices: Vec<u32> = (0..prim_bounds.len() as u32).collect();
        let mut builder = TreeBuilder {
            prim_bounds: &prim_bounds,
            indices: &mut indices,
            tree: vec![3 << 30, 0, 0],
            leaf_size: leaf_size.max(1) as i32,
        };
        builder.subdivide(0, prim_bounds.len() as i32 - 1, bounds, bounds, 0, 1);
        let tree = builder.tree;

        Self {
            bounds,
            tree,
            objects: indices,
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.bounds.write_to(writer)?;
        writer.write_u32::<LittleEndian>(self.tree.len() as u32)?;
        for word in &self.tree {
            writer.write_u32::<LittleEndian>(*word)?;
        }
        writer.write_u32::<LittleEndian>(self.objects.len() as u32)?;
        for obj in &self.objects {
            writer.write_u32::<LittleEndian>(*obj)?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn object_order(&self) -> &[u32] {
        &self.objects
    }
}

struct TreeBuilder<'a> {
    prim_bounds: &'a [AaBox],
    indices: &'a mut Vec<u32>,
    tree: Vec<u32>,
    leaf_size: i32,
}

impl TreeBuilder<'_> {
    fn make_leaf(&mut self, node_index: usize, left: u32, right: u32) {
        self.tree[node_index] = (3 << 30) | left;
        self.tree[node_index + 1] = right - left + 1;
    }

    /// Append one unfilled node, returning its index.
    fn grow_node(&mut self) -> usize {
        let next = self.tree.len();
        self.tree.extend_from_slice(&[0, 0, 0]);
        next
    }

    fn subdivide(
        &mut self,
        left: i32,
        mut right: i32,
        mut grid_box: AaBox,
        mut node_box: AaBox,
        mut node_index: usize,
        depth: usize,
    ) {
        if (right - left + 1) <= self.leaf_size || depth >= MAX_TREE_DEPTH {
            self.make_leaf(node_index, left as u32, right as u32);
            return;
        }

        let right_orig = right;
        let mut axis = NO_AXIS;
        let mut split = f32::NAN;
        let mut clip_l;
        let mut clip_r;
        let mut prev_clip = f32::NAN;
        let mut was_left = true;

        loop {
            let prev_axis = axis;
            let prev_split = split;

            // split the longest axis of the remaining grid at its midpoint
            let extent = grid_box.max.sub(grid_box.min);
            axis = if extent.x >= extent.y && extent.x >= extent.z {
                0
            } else if extent.y >= extent.z {
                1
            } else {
                2
            };
            split = 0.5 * (grid_box.min.axis(axis) + grid_box.max.axis(axis));

            clip_l = f32::NEG_INFINITY;
            clip_r = f32::INFINITY;
            let mut node_l = f32::INFINITY;
            let mut node_r = f32::NEG_INFINITY;

            // partition by box center; track the clip planes of both sides
            let mut i = left;
            while i <= right {
                let obj = self.indices[i as usize] as usize;
                let min_b = self.prim_bounds[obj].min.axis(axis);
                let max_b = self.prim_bounds[obj].max.axis(axis);
                let center = (min_b + max_b) * 0.5;
                if center <= split {
                    i += 1;
                    if clip_l < max_b {
                        clip_l = max_b;
                    }
                } else {
                    self.indices.swap(i as usize, right as usize);
                    right -= 1;
                    if clip_r > min_b {
                        clip_r = min_b;
                    }
                }
                node_l = node_l.min(min_b);
                node_r = node_r.max(max_b);
            }

            // cut away empty space when the population occupies a clearly
            // smaller slab of the node
            if node_l > node_box.min.axis(axis) && node_r < node_box.max.axis(axis) {
                let node_w = node_box.max.axis(axis) - node_box.min.axis(axis);
                let populated_w = node_r - node_l;
                if 1.3 * populated_w < node_w {
                    let next_index = self.grow_node();
                    self.tree[node_index] = ((axis as u32) << 30) | (1 << 29) | next_index as u32;
                    self.tree[node_index + 1] = node_l.to_bits();
                    self.tree[node_index + 2] = node_r.to_bits();
                    node_box.min.set_axis(axis, node_l);
                    node_box.max.set_axis(axis, node_r);
                    self.subdivide(left, right_orig, grid_box, node_box, next_index, depth + 1);
                    return;
                }
            }

            if right == right_orig {
                // everything landed left of the split plane
                if prev_axis == axis && same_split(prev_split, split) {
                    self.make_leaf(node_index, left as u32, right as u32);
                    return;
                }
                grid_box.max.set_axis(axis, split);
                if clip_l <= split {
                    prev_clip = clip_l;
                    was_left = true;
                    continue;
                }
                prev_clip = f32::NAN;
            } else if left > right {
                // everything landed right of the split plane
                right = right_orig;
                if prev_axis == axis && same_split(prev_split, split) {
                    self.make_leaf(node_index, left as u32, right as u32);
                    return;
                }
                grid_box.min.set_axis(axis, split);
                if clip_r >= split {
                    prev_clip = clip_r;
                    was_left = false;
                    continue;
                }
                prev_clip = f32::NAN;
            } else {
                // a real partition; materialize a deferred one-sided clip
                // node first if the previous round produced one
                if prev_axis != NO_AXIS && !prev_clip.is_nan() {
                    let next_index = self.grow_node();
                    if was_left {
                        self.tree[node_index] = ((prev_axis as u32) << 30) | next_index as u32;
                        self.tree[node_index + 1] = prev_clip.to_bits();
                        self.tree[node_index + 2] = f32::INFINITY.to_bits();
                    } else {
                        self.tree[node_index] =
                            ((prev_axis as u32) << 30) | (next_index as u32).wrapping_sub(3);
                        self.tree[node_index + 1] = f32::NEG_INFINITY.to_bits();
                        self.tree[node_index + 2] = prev_clip.to_bits();
                    }
                    node_index = next_index;
                }
                break;
            }
        }

        // allocate children; a one-sided split reuses the slot before/after
        let n_left = right - left + 1;
        let n_right = right_orig - right;
        let mut next_index = self.tree.len();
        if n_left > 0 {
            self.grow_node();
        } else {
            next_index -= 3;
        }
        if n_right > 0 {
            self.grow_node();
        }

        self.tree[node_index] = ((axis as u32) << 30) | next_index as u32;
        self.tree[node_index + 1] = clip_l.to_bits();
        self.tree[node_index + 2] = clip_r.to_bits();

        let mut grid_box_l = grid_box;
        let mut grid_box_r = grid_box;
        let mut node_box_l = node_box;
        let mut node_box_r = node_box;
        grid_box_l.max.set_axis(axis, split);
        grid_box_r.min.set_axis(axis, split);
        node_box_l.max.set_axis(axis, clip_l);
        node_box_r.min.set_axis(axis, clip_r);

        if n_left > 0 {
            self.subdivide(left, right, grid_box_l, node_box_l, next_index, depth + 1);
        }
        if n_right > 0 {
            self.subdivide(right + 1, right_orig, grid_box_r, node_box_r, next_index + 3, depth + 1);
        }
    }
}

fn same_split(prev: f32, current: f32) -> bool {
    !prev.is_nan() && (prev - current).abs() < 1e-6
}
