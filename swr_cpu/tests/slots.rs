// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the draw-call ring: back-pressure, resource locking and release.

use crate::util::{config, prepare, rect_triangles, renderer, Gate, TestBackend, RED};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use swr_cpu::swr_common::geometry::{IndexFormat, Topology};
use swr_cpu::swr_common::Buffer;
use swr_cpu::{DrawType, PipelineConfig, SlotState};

fn gated() -> (TestBackend, Arc<Gate>) {
    let gate = Gate::closed();
    let backend = TestBackend {
        gate: Some(gate.clone()),
        ..TestBackend::default()
    };
    (backend, gate)
}

#[test]
fn full_ring_blocks_until_the_oldest_draw_call_is_released() {
    let (backend, gate) = gated();
    let config = PipelineConfig {
        draw_capacity: 2,
        ..config(2)
    };
    let (mut renderer, target) = renderer(backend, config, 4, 4);
    prepare(&mut renderer, rect_triangles(&[[0.0, 0.0, 4.0, 4.0]]), RED, 0);

    renderer.draw(Topology::TriangleList, 0, 1, true).unwrap();
    renderer.draw(Topology::TriangleList, 0, 1, false).unwrap();
    assert_eq!(renderer.slot_states(), vec![SlotState::InFlight(1); 2]);

    let submitted = Arc::new(AtomicBool::new(false));
    let submitter = {
        let submitted = submitted.clone();
        thread::spawn(move || {
            renderer.draw(Topology::TriangleList, 0, 1, false).unwrap();
            submitted.store(true, Ordering::SeqCst);
            renderer
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!submitted.load(Ordering::SeqCst));

    gate.open();
    let renderer = submitter.join().unwrap();
    assert!(submitted.load(Ordering::SeqCst));

    renderer.synchronize();
    assert_eq!(renderer.slot_states(), vec![SlotState::Free; 2]);
    assert_eq!(target.lock_count(), 0);
}

#[test]
fn resources_stay_locked_while_in_flight() {
    let (backend, gate) = gated();
    let (mut renderer, target) = renderer(backend, config(2), 4, 4);
    let vertices = rect_triangles(&[[0.0, 0.0, 4.0, 4.0]]);
    let indices = Arc::new(Buffer::from_pod(&[0_u8, 1, 2]));
    prepare(&mut renderer, vertices.clone(), RED, 0);
    renderer.set_index_buffer(Some(indices.clone()));

    renderer
        .draw(
            DrawType::indexed(Topology::TriangleList, IndexFormat::U8),
            0,
            1,
            true,
        )
        .unwrap();
    assert_eq!(vertices.lock_count(), 1);
    assert_eq!(indices.lock_count(), 1);
    assert_eq!(target.lock_count(), 1);

    gate.open();
    renderer.synchronize();
    assert_eq!(vertices.lock_count(), 0);
    assert_eq!(indices.lock_count(), 0);
    assert_eq!(target.lock_count(), 0);
}

#[test]
fn every_draw_call_is_eventually_released() {
    let config = PipelineConfig {
        draw_capacity: 4,
        ..config(4)
    };
    let (mut renderer, target) = renderer(TestBackend::default(), config, 8, 8);
    let vertices = rect_triangles(&[[0.0, 0.0, 8.0, 8.0]; 9]);
    prepare(&mut renderer, vertices.clone(), RED, 0);

    for count in (0..40).map(|i| i % 10) {
        renderer.draw(Topology::TriangleList, 0, count, false).unwrap();
    }
    renderer.synchronize();

    assert_eq!(renderer.slot_states(), vec![SlotState::Free; 4]);
    assert_eq!(vertices.lock_count(), 0);
    assert_eq!(target.lock_count(), 0);
}

#[test]
fn zero_primitive_draw_calls_never_occupy_a_slot() {
    let (backend, gate) = gated();
    let log = backend.log.clone();
    let (mut renderer, target) = renderer(backend, config(2), 4, 4);
    prepare(&mut renderer, rect_triangles(&[[0.0, 0.0, 4.0, 4.0]]), RED, 0);

    renderer.draw(Topology::TriangleList, 0, 0, true).unwrap();
    assert!(renderer
        .slot_states()
        .iter()
        .all(|state| *state == SlotState::Free));
    assert_eq!(target.lock_count(), 0);

    gate.open();
    renderer.synchronize();
    assert!(log.tags_per_cluster(2).iter().all(Vec::is_empty));
    assert!(target.to_vec().iter().all(|&texel| texel == 0));
}

#[test]
fn concurrent_synchronize_calls_all_return() {
    let (backend, gate) = gated();
    let (mut renderer, target) = renderer(backend, config(3), 4, 4);
    prepare(&mut renderer, rect_triangles(&[[0.0, 0.0, 4.0, 4.0]]), RED, 0);
    renderer.draw(Topology::TriangleList, 0, 1, true).unwrap();

    let renderer = &renderer;
    thread::scope(|scope| {
        for _ in 0..3 {
            scope.spawn(move || renderer.synchronize());
        }

        thread::sleep(Duration::from_millis(50));
        gate.open();
    });

    assert!(renderer
        .slot_states()
        .iter()
        .all(|state| *state == SlotState::Free));
    assert_eq!(target.lock_count(), 0);
}
