mod util;
use util::*;

use mesh_ami::algs::communicator::{CommTag, Communicator, LocalComm, Wait};
use mesh_ami::algs::reduction::{all_gather, reduce_sum, reduce_sum_count};
use mesh_ami::coupling::ami::gather_surface;
use mesh_ami::data::dict::PatchDict;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[test]
fn local_round_trip() {
    let tag = CommTag::new(0x1000);
    let world = LocalComm::world(2);
    let _ = world[0].isend(1, tag, b"hello");
    let got = world[1].irecv(0, tag).wait().unwrap();
    assert_eq!(&got, b"hello");
}

#[test]
fn local_fifo_order() {
    let tag = CommTag::new(0x1001);
    let world = LocalComm::world(2);
    for i in 0..10u8 {
        let _ = world[0].isend(1, tag, &[i]);
    }
    let out: Vec<u8> = (0..10).map(|_| world[1].irecv(0, tag).wait().unwrap()[0]).collect();
    assert_eq!(out, (0u8..10).collect::<Vec<_>>());
}

#[test]
fn gathers_arrive_in_rank_order() {
    let results = run_ranks(4, |comm: LocalComm| {
        let mine = vec![comm.rank() as u64; comm.rank() + 1];
        all_gather(&comm, CommTag::new(0x1002), &mine).unwrap()
    });
    for gathered in &results {
        for (rank, payload) in gathered.iter().enumerate() {
            assert_eq!(payload, &vec![rank as u64; rank + 1]);
        }
    }
}

#[test]
fn sums_are_bitwise_identical_on_every_rank() {
    let mut rng = SmallRng::seed_from_u64(3);
    let values: Vec<f64> = (0..5).map(|_| rng.gen_range(-1e3..1e3)).collect();
    let expected = values.iter().fold(0.0, |acc, v| acc + v);
    let results = run_ranks(5, |comm: LocalComm| {
        let sum = reduce_sum(&comm, CommTag::new(0x1003), values[comm.rank()]).unwrap();
        let count = reduce_sum_count(&comm, CommTag::new(0x1004), comm.rank()).unwrap();
        (sum, count)
    });
    for (sum, count) in results {
        assert_eq!(sum.to_bits(), expected.to_bits());
        assert_eq!(count, 10);
    }
}

#[test]
fn gathered_surface_matches_the_undivided_patch() {
    let whole = grid_patch("g", 5, 3, [0.0, 0.0], [5.0, 3.0], 0.0, true, PatchDict::wall());
    let mut rng = SmallRng::seed_from_u64(17);
    let pieces = decompose(&whole, 3, &mut rng);
    let reference = whole.surface();
    let results = run_ranks(3, |comm: LocalComm| {
        gather_surface(&comm, "g", &pieces[comm.rank()].surface()).unwrap()
    });
    for surface in results {
        assert_eq!(surface.global_ids(), reference.global_ids());
        assert_eq!(surface.polygons(), reference.polygons());
        for (a, b) in surface.areas().iter().zip(reference.areas()) {
            assert_vec_close(*a, *b, 1e-15);
        }
    }
}
