// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Expansion of primitive numbers into vertex indices.

use swr_common::geometry::Topology;
use swr_common::DrawData;

/// The positions (within the draw call's vertex or index range) of the three vertices of
/// `primitive`.
///
/// `total` is the number of primitives of the draw call, needed to close line loops.
/// Points and lines repeat their last vertex so every primitive has three.
pub(crate) fn primitive_vertices(topology: Topology, primitive: u32, total: u32) -> [u32; 3] {
    let i = primitive;

    match topology {
        Topology::PointList => [i, i, i],
        Topology::LineList => [2 * i, 2 * i + 1, 2 * i + 1],
        Topology::LineStrip => [i, i + 1, i + 1],
        Topology::LineLoop => {
            let next = (i + 1) % total;
            [i, next, next]
        }
        Topology::TriangleList => [3 * i, 3 * i + 1, 3 * i + 2],
        // Odd triangles swap their last two vertices to keep the winding consistent.
        Topology::TriangleStrip => [i, i + (i & 1) + 1, i + (!i & 1) + 1],
        Topology::TriangleFan => [i + 1, i + 2, 0],
    }
}

/// Fill `output` with the vertex indices of `count` primitives starting at `first`,
/// resolved through the index buffer (or base vertex) of `data`.
pub(crate) fn assemble(
    output: &mut Vec<[u32; 3]>,
    topology: Topology,
    first: u32,
    count: u32,
    total: u32,
    data: &DrawData,
) {
    output.clear();
    output.extend((first..first + count).map(|primitive| {
        primitive_vertices(topology, primitive, total).map(|i| data.vertex_index(i))
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use swr_common::draw_data::IndexView;
    use swr_common::geometry::IndexFormat;
    use swr_common::Buffer;

    fn all(topology: Topology, total: u32) -> Vec<[u32; 3]> {
        (0..total)
            .map(|i| primitive_vertices(topology, i, total))
            .collect()
    }

    #[test]
    fn points_and_lines_repeat_their_last_vertex() {
        assert_eq!(all(Topology::PointList, 2), [[0, 0, 0], [1, 1, 1]]);
        assert_eq!(all(Topology::LineList, 2), [[0, 1, 1], [2, 3, 3]]);
        assert_eq!(all(Topology::LineStrip, 2), [[0, 1, 1], [1, 2, 2]]);
    }

    #[test]
    fn line_loop_closes() {
        assert_eq!(all(Topology::LineLoop, 3), [[0, 1, 1], [1, 2, 2], [2, 0, 0]]);
    }

    #[test]
    fn triangles() {
        assert_eq!(all(Topology::TriangleList, 2), [[0, 1, 2], [3, 4, 5]]);
        assert_eq!(all(Topology::TriangleFan, 2), [[1, 2, 0], [2, 3, 0]]);
    }

    #[test]
    fn strips_alternate_winding() {
        assert_eq!(
            all(Topology::TriangleStrip, 4),
            [[0, 1, 2], [1, 3, 2], [2, 3, 4], [3, 5, 4]]
        );
    }

    #[test]
    fn every_topology_stays_within_its_vertex_count() {
        for topology in [
            Topology::PointList,
            Topology::LineList,
            Topology::LineStrip,
            Topology::LineLoop,
            Topology::TriangleList,
            Topology::TriangleStrip,
            Topology::TriangleFan,
        ] {
            let vertices = topology.vertex_count(5);
            for primitive in all(topology, 5) {
                assert!(primitive.iter().all(|&v| u64::from(v) < vertices));
            }
        }
    }

    #[test]
    fn indices_go_through_the_index_buffer() {
        let data = DrawData {
            indices: Some(IndexView {
                buffer: Arc::new(Buffer::new(vec![9, 8, 7, 6, 5, 4])),
                format: IndexFormat::U8,
                first: 0,
            }),
            ..DrawData::default()
        };

        let mut output = Vec::new();
        assemble(&mut output, Topology::TriangleList, 1, 1, 2, &data);
        assert_eq!(output, [[6, 5, 4]]);

        let data = DrawData {
            base_vertex: 100,
            ..DrawData::default()
        };
        assemble(&mut output, Topology::LineStrip, 0, 2, 2, &data);
        assert_eq!(output, [[100, 101, 101], [101, 102, 102]]);
    }
}
