// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for routine resolution and caching.

use crate::util::{config, pack, prepare, rect_triangles, renderer, TestBackend, GREEN, RED};
use swr_cpu::swr_common::geometry::Topology;
use swr_cpu::swr_common::{CacheStats, Stage};
use swr_cpu::{Error, SlotState};

#[test]
fn identical_resubmission_hits_the_cache() {
    let backend = TestBackend::default();
    let log = backend.log.clone();
    let (mut renderer, target) = renderer(backend, config(4), 8, 8);
    prepare(
        &mut renderer,
        rect_triangles(&[[1.0, 1.0, 7.0, 5.0], [0.0, 3.0, 2.0, 8.0]]),
        RED,
        0,
    );

    renderer.draw(Topology::TriangleList, 0, 2, true).unwrap();
    renderer.synchronize();
    let first = target.to_vec();

    target.fill(0);
    renderer.draw(Topology::TriangleList, 0, 2, true).unwrap();
    renderer.synchronize();

    assert_eq!(target.to_vec(), first);
    assert_eq!(log.total_compiles(), 3);
    for stage in [Stage::Vertex, Stage::Setup, Stage::Pixel] {
        assert_eq!(
            renderer.routine_cache_stats(stage),
            CacheStats { hits: 1, misses: 1 },
            "{stage} cache"
        );
    }
}

#[test]
fn draws_without_update_reuse_the_previous_routines() {
    let backend = TestBackend::default();
    let log = backend.log.clone();
    let (mut renderer, _target) = renderer(backend, config(2), 4, 4);
    prepare(&mut renderer, rect_triangles(&[[0.0, 0.0, 4.0, 4.0]]), RED, 0);

    renderer.draw(Topology::TriangleList, 0, 1, true).unwrap();
    renderer.backend_mut().shader = 7;
    renderer.draw(Topology::TriangleList, 0, 1, false).unwrap();
    assert_eq!(log.total_compiles(), 3);

    renderer.draw(Topology::TriangleList, 0, 1, true).unwrap();
    assert_eq!(log.total_compiles(), 6);
    assert_eq!(renderer.backend().shader, 7);
}

#[test]
fn fingerprints_differing_in_one_field_do_not_share() {
    let backend = TestBackend::default();
    let log = backend.log.clone();
    let (mut renderer, _target) = renderer(backend, config(2), 4, 4);
    prepare(&mut renderer, rect_triangles(&[[0.0, 0.0, 4.0, 4.0]]), RED, 0);

    renderer.draw(Topology::TriangleList, 0, 1, true).unwrap();
    renderer.draw(Topology::LineStrip, 0, 1, true).unwrap();
    renderer.synchronize();

    // Only the setup fingerprint depends on the primitive type.
    assert_eq!(log.compiles(Stage::Vertex), 1);
    assert_eq!(log.compiles(Stage::Setup), 2);
    assert_eq!(log.compiles(Stage::Pixel), 1);
}

#[test]
fn invalidation_regenerates_every_stage() {
    let backend = TestBackend::default();
    let log = backend.log.clone();
    let (mut renderer, _target) = renderer(backend, config(2), 4, 4);
    prepare(&mut renderer, rect_triangles(&[[0.0, 0.0, 4.0, 4.0]]), RED, 0);

    renderer.draw(Topology::TriangleList, 0, 1, true).unwrap();
    renderer.invalidate_routines();
    renderer.draw(Topology::TriangleList, 0, 1, false).unwrap();
    renderer.synchronize();

    assert_eq!(log.total_compiles(), 6);
}

#[test]
fn failed_generation_abandons_the_draw_call() {
    let backend = TestBackend {
        fail: Some(Stage::Pixel),
        ..TestBackend::default()
    };
    let log = backend.log.clone();
    let (mut renderer, target) = renderer(backend, config(2), 4, 4);
    prepare(&mut renderer, rect_triangles(&[[0.0, 0.0, 4.0, 4.0]]), GREEN, 0);

    let err = renderer
        .draw(Topology::TriangleList, 0, 1, true)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::OutOfMemory {
            stage: Stage::Pixel,
            ..
        }
    ));
    assert!(renderer
        .slot_states()
        .iter()
        .all(|state| *state == SlotState::Free));
    assert_eq!(target.lock_count(), 0);
    assert_eq!(log.compiles(Stage::Pixel), 0);

    renderer.backend_mut().fail = None;
    renderer.draw(Topology::TriangleList, 0, 1, false).unwrap();
    renderer.synchronize();

    // The vertex and setup routines were cached by the failed attempt.
    assert_eq!(log.compiles(Stage::Vertex), 1);
    assert_eq!(log.compiles(Stage::Setup), 1);
    assert_eq!(log.compiles(Stage::Pixel), 1);
    assert!(target.to_vec().iter().all(|&texel| texel == pack(GREEN)));
}
